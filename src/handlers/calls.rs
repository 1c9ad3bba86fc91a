// src/handlers/calls.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::call::{
        CallCorrection, CallLog, ContactSubmission, FollowUpHistory, FollowUpQueueEntry,
        FollowUpRequest, RecordedFollowUp, SubmissionResult,
    },
};

// =============================================================================
//  ÁREA 1: CONTATOS E PRIMEIRA LIGAÇÃO
// =============================================================================

// POST /api/calls
#[utoipa::path(
    post,
    path = "/api/calls",
    tag = "Calls",
    request_body = ContactSubmission,
    responses(
        (status = 201, description = "Lead criado ou primeira ligação registrada", body = SubmissionResult),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "O lead já tem primeira ligação")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ContactSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let result = app_state.call_service.submit_contact(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// GET /api/calls/my
#[utoipa::path(
    get,
    path = "/api/calls/my",
    tag = "Calls",
    responses((status = 200, description = "Ligações do vendedor, mais recentes primeiro", body = [CallLog])),
    security(("api_jwt" = []))
)]
pub async fn list_my_calls(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CallLog>>, AppError> {
    let calls = app_state.call_service.list_my_calls(&user).await?;
    Ok(Json(calls))
}

// GET /api/calls/{id}
#[utoipa::path(
    get,
    path = "/api/calls/{id}",
    tag = "Calls",
    params(("id" = Uuid, Path, description = "ID da ligação")),
    responses(
        (status = 200, description = "Ligação", body = CallLog),
        (status = 403, description = "Sem acesso"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_call(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CallLog>, AppError> {
    let call = app_state.call_service.get_call(&user, id).await?;
    Ok(Json(call))
}

// PUT /api/calls/{id}
#[utoipa::path(
    put,
    path = "/api/calls/{id}",
    tag = "Calls",
    params(("id" = Uuid, Path, description = "ID da ligação")),
    request_body = CallCorrection,
    responses(
        (status = 200, description = "Primeira ligação corrigida", body = CallLog),
        (status = 403, description = "Sem acesso"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn correct_call(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CallCorrection>,
) -> Result<Json<CallLog>, AppError> {
    let call = app_state.call_service.correct_call(&user, id, payload).await?;
    Ok(Json(call))
}

// =============================================================================
//  ÁREA 2: FOLLOW-UPS
// =============================================================================

// POST /api/calls/{id}/follow-up
#[utoipa::path(
    post,
    path = "/api/calls/{id}/follow-up",
    tag = "Follow-ups",
    params(("id" = Uuid, Path, description = "ID da ligação")),
    request_body = FollowUpRequest,
    responses(
        (status = 201, description = "Follow-up registrado", body = RecordedFollowUp),
        (status = 403, description = "Sem acesso"),
        (status = 404, description = "Não encontrada"),
        (status = 409, description = "Ligação encerrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_follow_up(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FollowUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let recorded = app_state.call_service.record_follow_up(&user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

// GET /api/calls/{id}/follow-up-history
#[utoipa::path(
    get,
    path = "/api/calls/{id}/follow-up-history",
    tag = "Follow-ups",
    params(("id" = Uuid, Path, description = "ID da ligação")),
    responses(
        (status = 200, description = "Ligação e todos os follow-ups em ordem de criação", body = FollowUpHistory),
        (status = 403, description = "Sem acesso"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn follow_up_history(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FollowUpHistory>, AppError> {
    let history = app_state.call_service.follow_up_history(&user, id).await?;
    Ok(Json(history))
}

// GET /api/calls/follow-ups
#[utoipa::path(
    get,
    path = "/api/calls/follow-ups",
    tag = "Follow-ups",
    responses((status = 200, description = "Fila de follow-ups do vendedor", body = [FollowUpQueueEntry])),
    security(("api_jwt" = []))
)]
pub async fn follow_up_queue(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<FollowUpQueueEntry>>, AppError> {
    let queue = app_state.call_service.follow_up_queue(&user, Utc::now()).await?;
    Ok(Json(queue))
}
