use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::chat::{
    ChatMessage, ChatThread, MessageListQuery, OpenThreadRequest, PostMessageRequest,
};

const THREAD_COLUMNS: &str =
    "id, tenant_id, subject, status, opened_by, closed_at, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, tenant_id, thread_id, sender_id, body, created_at";

/// POST /api/chat/threads - open a support thread
pub async fn open_thread(
    Extension(db): Extension<TenantDb>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<OpenThreadRequest>,
) -> Result<(StatusCode, Json<ChatThread>), ApiError> {
    if request.subject.trim().is_empty() {
        return Err(ApiError::unprocessable_entity("Thread subject is required"));
    }

    let mut tx = db.begin().await?;
    let thread = sqlx::query_as::<_, ChatThread>(&format!(
        r#"
        INSERT INTO chat_threads (tenant_id, subject, status, opened_by)
        VALUES ($1, $2, 'open', $3)
        RETURNING {}
        "#,
        THREAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(request.subject.trim())
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(thread)))
}

/// GET /api/chat/threads
pub async fn list_threads(
    Extension(db): Extension<TenantDb>,
) -> Result<Json<Vec<ChatThread>>, ApiError> {
    let mut tx = db.begin().await?;
    let threads = sqlx::query_as::<_, ChatThread>(&format!(
        "SELECT {} FROM chat_threads WHERE tenant_id = $1 ORDER BY updated_at DESC",
        THREAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;
    Ok(Json(threads))
}

/// POST /api/chat/threads/:id/messages - post into an open thread
pub async fn post_message(
    Extension(db): Extension<TenantDb>,
    Extension(auth): Extension<AuthUser>,
    Path(thread_id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    if request.body.trim().is_empty() {
        return Err(ApiError::unprocessable_entity("Message body is required"));
    }

    let mut tx = db.begin().await?;
    let thread = fetch_thread(&mut tx, db.tenant_id(), thread_id).await?;
    if thread.status != "open" {
        return Err(ApiError::conflict("Thread is closed"));
    }

    let message = sqlx::query_as::<_, ChatMessage>(&format!(
        r#"
        INSERT INTO chat_messages (tenant_id, thread_id, sender_id, body)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        MESSAGE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(thread_id)
    .bind(auth.user_id)
    .bind(request.body.trim())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE chat_threads SET updated_at = now() WHERE tenant_id = $1 AND id = $2")
        .bind(db.tenant_id())
        .bind(thread_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/threads/:id/messages - oldest first, created_at cursor
pub async fn list_messages(
    Extension(db): Extension<TenantDb>,
    Path(thread_id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let (limit, _) = super::page_limits(query.limit, None);

    let mut tx = db.begin().await?;
    // 404 for unknown threads instead of an empty list
    fetch_thread(&mut tx, db.tenant_id(), thread_id).await?;

    let messages = sqlx::query_as::<_, ChatMessage>(&format!(
        r#"
        SELECT {}
        FROM chat_messages
        WHERE tenant_id = $1 AND thread_id = $2
          AND ($3::timestamptz IS NULL OR created_at > $3)
        ORDER BY created_at ASC
        LIMIT $4
        "#,
        MESSAGE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(thread_id)
    .bind(query.after)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;

    Ok(Json(messages))
}

/// POST /api/chat/threads/:id/close
pub async fn close_thread(
    Extension(db): Extension<TenantDb>,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<ChatThread>, ApiError> {
    let mut tx = db.begin().await?;
    let thread = fetch_thread(&mut tx, db.tenant_id(), thread_id).await?;
    if thread.status != "open" {
        return Err(ApiError::conflict("Thread is already closed"));
    }

    let thread = sqlx::query_as::<_, ChatThread>(&format!(
        r#"
        UPDATE chat_threads
        SET status = 'closed', closed_at = now(), updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        THREAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(thread_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(thread))
}

async fn fetch_thread(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<ChatThread, ApiError> {
    sqlx::query_as::<_, ChatThread>(&format!(
        "SELECT {} FROM chat_threads WHERE tenant_id = $1 AND id = $2",
        THREAD_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Chat thread {} not found", id)))
}
