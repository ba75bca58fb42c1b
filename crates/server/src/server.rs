use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{analysis, auth, expenses, groups, members, user};
use crate::auth::AuthConfig;
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub auth: Arc<AuthConfig>,
}

impl ServerState {
    pub fn new(engine: Engine, auth: AuthConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            auth: Arc::new(auth),
        }
    }
}

/// HTTP limits applied to every route.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Largest accepted request body, receipts included.
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Requests still running after `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: ServerState, config: &ServerConfig) -> Router {
    let authenticated = Router::new()
        .route("/me", get(user::me))
        .route("/groups", get(groups::list).post(groups::group_new))
        .route(
            "/groups/{id}",
            get(groups::get)
                .put(groups::update)
                .delete(groups::remove)
                .post(groups::remove),
        )
        .route("/groups/{id}/leave", post(groups::leave))
        .route("/groups/{id}/archive", post(groups::archive))
        .route("/groups/{id}/owner", post(groups::transfer_owner))
        .route(
            "/groups/{id}/members",
            get(members::list).post(members::add),
        )
        .route(
            "/groups/{id}/members/{member_id}",
            delete(members::remove),
        )
        .route("/invites/{code}/join", post(groups::join))
        .route(
            "/groups/{id}/expenses",
            get(expenses::list).post(expenses::expense_new),
        )
        .route("/groups/{id}/expenses/ai", post(expenses::expense_ai_new))
        .route(
            "/groups/{id}/expenses/receipt",
            post(expenses::expense_receipt_new),
        )
        .route("/groups/{id}/analysis", get(analysis::get))
        .route("/groups/{id}/export.csv", get(analysis::export_csv))
        .route(
            "/expenses/{id}",
            get(expenses::get).delete(expenses::remove),
        )
        .route("/expenses/{id}/dispute", post(expenses::dispute))
        .route("/expenses/{id}/status", post(expenses::set_status))
        .route("/expenses/{id}/approval", post(expenses::approval))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));

    Router::new()
        .route("/health", get(health))
        .merge(authenticated)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(timeout_layer(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn run_with_listener<F>(
    state: ServerState,
    config: ServerConfig,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state, &config))
        .with_graceful_shutdown(shutdown)
        .await
}

pub fn spawn_with_listener(
    state: ServerState,
    config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) =
            run_with_listener(state, config, listener, std::future::pending()).await
        {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::{
        body::Body,
        http::{Request, Response},
    };
    use tower::{ServiceBuilder, ServiceExt};

    use super::*;

    #[tokio::test]
    async fn stalled_requests_get_request_timeout() {
        let service = ServiceBuilder::new()
            .layer(timeout_layer(Duration::from_millis(20)))
            .service_fn(|_request: Request<Body>| {
                std::future::pending::<Result<Response<Body>, Infallible>>()
            });
        let response = service.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
