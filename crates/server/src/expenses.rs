//! Expense API endpoints.

use api_types::expense::{
    ApprovalDecision, Dispute, ExpenseAiNew, ExpenseListQuery, ExpenseNew, ExpenseView,
    StatusChange,
};
use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, Query, State, multipart::MultipartRejection, rejection::QueryRejection,
    },
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};
use engine::{ExpenseCmd, ExpenseFilter, ReceiptUpload, User};

use crate::{
    ServerError,
    json::ValidJson,
    server::ServerState,
    views::{
        approval_from_api, expense_view, parse_amount, parse_status_filter, split_from_api,
        status_from_api,
    },
};

static IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");
static NEXT_CURSOR: HeaderName = HeaderName::from_static("x-next-cursor");

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ServerError> {
    headers
        .get(&IDEMPOTENCY_KEY)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| ServerError::Generic("Idempotency-Key must be ASCII".to_string()))
        })
        .transpose()
}

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    query: Result<Query<ExpenseListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Query(query) = query.map_err(|rejection| ServerError::Generic(rejection.body_text()))?;
    let filter = ExpenseFilter {
        statuses: query
            .status
            .as_deref()
            .map(parse_status_filter)
            .transpose()?
            .filter(|statuses| !statuses.is_empty()),
        ..Default::default()
    };

    let page = state
        .engine
        .expenses(group_id, filter, query.limit, query.cursor.as_deref(), user.id)
        .await?;

    let mut headers = HeaderMap::new();
    if let Some(cursor) = page.next_cursor {
        let value = HeaderValue::from_str(&cursor)
            .map_err(|_| ServerError::Generic("unencodable cursor".to_string()))?;
        headers.insert(NEXT_CURSOR.clone(), value);
    }
    let items: Vec<ExpenseView> = page
        .items
        .iter()
        .map(|expense| expense_view(expense, user.id))
        .collect();
    Ok((headers, Json(items)))
}

pub async fn expense_new(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    headers: HeaderMap,
    ValidJson(payload): ValidJson<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let currency = state.engine.group(group_id, user.id).await?.group.currency;
    let amount = parse_amount(&payload.amount, currency)?;

    let mut cmd = ExpenseCmd::new(group_id, user.id, amount.minor(), payload.description);
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }
    if let Some(payer_id) = payload.payer_id {
        cmd = cmd.payer(payer_id);
    }
    if let Some(split) = payload.split {
        cmd = cmd.split(split_from_api(split, currency)?);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.idempotency_key(key);
    }

    let expense = state
        .engine
        .new_expense(cmd)
        .await
        .map_err(ServerError::action("create"))?;
    Ok((StatusCode::CREATED, Json(expense_view(&expense, user.id))))
}

pub async fn expense_ai_new(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    headers: HeaderMap,
    ValidJson(payload): ValidJson<ExpenseAiNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let key = idempotency_key(&headers)?;
    let expense = state
        .engine
        .new_expense_from_text(
            group_id,
            &payload.text_input,
            payload.user_name.as_deref(),
            key.as_deref(),
            user.id,
        )
        .await
        .map_err(ServerError::action("create_ai"))?;
    Ok((StatusCode::CREATED, Json(expense_view(&expense, user.id))))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServerError {
    ServerError::Generic(format!("invalid multipart body: {}", err.body_text()))
}

pub async fn expense_receipt_new(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut multipart =
        multipart.map_err(|rejection| ServerError::Generic(rejection.body_text()))?;

    let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut caption: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("receipt").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((bytes.to_vec(), file_name, content_type));
            }
            Some("caption") => {
                caption = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let Some((bytes, file_name, content_type)) = file else {
        return Err(ServerError::Generic("missing `file` field".to_string()));
    };
    let upload = ReceiptUpload {
        bytes,
        file_name,
        content_type,
        caption,
    };
    let expense = state
        .engine
        .new_expense_from_receipt(group_id, upload, user.id)
        .await
        .map_err(ServerError::action("create_receipt"))?;
    Ok((StatusCode::CREATED, Json(expense_view(&expense, user.id))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(expense_id): Path<i64>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(expense_id, user.id).await?;
    Ok(Json(expense_view(&expense, user.id)))
}

pub async fn dispute(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(expense_id): Path<i64>,
    ValidJson(payload): ValidJson<Dispute>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state
        .engine
        .dispute_expense(expense_id, &payload.reason, user.id)
        .await
        .map_err(ServerError::action("dispute"))?;
    Ok(Json(expense_view(&expense, user.id)))
}

pub async fn set_status(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(expense_id): Path<i64>,
    ValidJson(payload): ValidJson<StatusChange>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state
        .engine
        .set_expense_status(
            expense_id,
            status_from_api(payload.status),
            payload.reason.as_deref(),
            user.id,
        )
        .await
        .map_err(ServerError::action("status"))?;
    Ok(Json(expense_view(&expense, user.id)))
}

pub async fn approval(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(expense_id): Path<i64>,
    ValidJson(payload): ValidJson<ApprovalDecision>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state
        .engine
        .record_approval(expense_id, approval_from_api(payload.decision), user.id)
        .await
        .map_err(ServerError::action("approval"))?;
    Ok(Json(expense_view(&expense, user.id)))
}

pub async fn remove(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(expense_id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(expense_id, user.id)
        .await
        .map_err(ServerError::action("delete"))?;
    Ok(StatusCode::NO_CONTENT)
}
