// src/handlers/leads.rs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::lead::Lead,
};

// GET /api/leads/my
#[utoipa::path(
    get,
    path = "/api/leads/my",
    tag = "Leads",
    responses((status = 200, description = "Leads do vendedor, mais recentes primeiro", body = [Lead])),
    security(("api_jwt" = []))
)]
pub async fn list_my_leads(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Lead>>, AppError> {
    let leads = app_state.call_service.list_my_leads(&user).await?;
    Ok(Json(leads))
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 403, description = "Sem acesso"),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>, AppError> {
    let lead = app_state.call_service.get_lead(&user, id).await?;
    Ok(Json(lead))
}
