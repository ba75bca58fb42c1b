use api_types::error::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use auth::{AuthConfig, Claims, mint_token};
pub use extractor::HttpExtractor;
pub use server::{ServerConfig, ServerState, router, run_with_listener, spawn_with_listener};

mod analysis;
mod auth;
mod expenses;
mod extractor;
mod groups;
mod json;
mod members;
mod server;
mod user;
mod views;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Engine(EngineError),
    /// Engine failure of a named operation (`dispute`, `delete`, `leave`, ...).
    #[error("{1}")]
    Action(&'static str, EngineError),
    /// Malformed request detected at the HTTP edge.
    #[error("{0}")]
    Generic(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl ServerError {
    pub(crate) fn action(action: &'static str) -> impl FnOnce(EngineError) -> ServerError {
        move |err| ServerError::Action(action, err)
    }
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_)
        | EngineError::InvalidExpense(_)
        | EngineError::InvalidArithmetic(_) => StatusCode::BAD_REQUEST,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidTransition(_)
        | EngineError::MissingReason(_)
        | EngineError::Conflict(_)
        | EngineError::ExistingKey(_)
        | EngineError::OwnerCannotLeave(_) => StatusCode::CONFLICT,
        EngineError::CurrencyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::ExpenseCreationFailed(_) => StatusCode::BAD_GATEWAY,
        EngineError::ExpenseCreationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        EngineError::CorruptLedger(_) | EngineError::Export(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn code_for_engine_error(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(_) => "VALIDATION_ERROR",
        EngineError::InvalidExpense(_) => "INVALID_EXPENSE",
        EngineError::InvalidArithmetic(_) => "INVALID_ARITHMETIC",
        EngineError::CurrencyMismatch(_) => "CURRENCY_MISMATCH",
        EngineError::KeyNotFound(_) => "NOT_FOUND",
        EngineError::Forbidden(_) => "FORBIDDEN",
        EngineError::InvalidTransition(_) => "INVALID_TRANSITION",
        EngineError::MissingReason(_) => "MISSING_REASON",
        EngineError::Conflict(_) => "CONFLICT",
        EngineError::ExistingKey(_) => "ALREADY_EXISTS",
        EngineError::OwnerCannotLeave(_) => "OWNER_CANNOT_LEAVE",
        EngineError::ExpenseCreationFailed(_) => "EXPENSE_CREATION_FAILED",
        EngineError::ExpenseCreationTimeout(_) => "EXPENSE_CREATION_TIMEOUT",
        EngineError::CorruptLedger(_) | EngineError::Export(_) | EngineError::Database(_) => {
            "INTERNAL_ERROR"
        }
    }
}

fn message_for_engine_error(err: EngineError, action: Option<&str>) -> String {
    if err.is_internal() {
        tracing::error!(action, "internal error: {err}");
        return "internal server error".to_string();
    }
    err.to_string()
}

fn engine_error_response(err: EngineError, action: Option<&'static str>) -> (StatusCode, ErrorBody) {
    let status = status_for_engine_error(&err);
    let code = code_for_engine_error(&err).to_string();
    let error = message_for_engine_error(err, action);
    (
        status,
        ErrorBody {
            error,
            code,
            action: action.map(str::to_string),
        },
    )
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => engine_error_response(err, None),
            ServerError::Action(action, err) => engine_error_response(err, Some(action)),
            ServerError::Generic(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error,
                    code: "VALIDATION_ERROR".to_string(),
                    action: None,
                },
            ),
            ServerError::Unauthorized(error) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error,
                    code: "UNAUTHORIZED".to_string(),
                    action: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn state_conflicts_map_to_409() {
        for err in [
            EngineError::ExistingKey("x".to_string()),
            EngineError::InvalidTransition("x".to_string()),
            EngineError::MissingReason("x".to_string()),
            EngineError::OwnerCannotLeave("x".to_string()),
            EngineError::Conflict("x".to_string()),
        ] {
            assert_eq!(ServerError::from(err).into_response().status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn bad_input_maps_to_400() {
        let res = ServerError::from(EngineError::InvalidExpense("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn currency_mismatch_maps_to_422() {
        let res = ServerError::from(EngineError::CurrencyMismatch("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn upstream_failures_map_to_gateway_errors() {
        let res = ServerError::from(EngineError::ExpenseCreationFailed("x".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let res = ServerError::from(EngineError::ExpenseCreationTimeout("x".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn internal_errors_hide_details() {
        let (status, body) =
            engine_error_response(EngineError::CorruptLedger("shares drifted".to_string()), None);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal server error");
        assert_eq!(body.code, "INTERNAL_ERROR");

        let (status, body) =
            engine_error_response(EngineError::Export("writer closed".to_string()), None);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal server error");
    }

    #[test]
    fn action_is_carried_in_the_body() {
        let (_, body) = engine_error_response(
            EngineError::OwnerCannotLeave("transfer ownership first".to_string()),
            Some("leave"),
        );
        assert_eq!(body.action.as_deref(), Some("leave"));
        assert_eq!(body.code, "OWNER_CANNOT_LEAVE");
    }
}
