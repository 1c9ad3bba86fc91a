// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::AdminUser,
    models::{
        auth::SalespersonEntry,
        dashboard::{AdminCallRow, AdminLeadRow, KpiSummary, PerformanceCard, ReportQuery},
    },
};

// GET /api/admin/kpis
#[utoipa::path(
    get,
    path = "/api/admin/kpis",
    tag = "Dashboard",
    params(ReportQuery),
    responses(
        (status = 200, description = "KPIs do período", body = KpiSummary),
        (status = 400, description = "Data inválida"),
        (status = 403, description = "Somente ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_kpis(
    State(app_state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<KpiSummary>, AppError> {
    tracing::debug!("📊 KPIs solicitados por {}", admin.user.id);
    let kpis = app_state.dashboard_service.kpis(&query).await?;
    Ok(Json(kpis))
}

// GET /api/admin/performance-cards
#[utoipa::path(
    get,
    path = "/api/admin/performance-cards",
    tag = "Dashboard",
    params(ReportQuery),
    responses(
        (status = 200, description = "Um card por vendedor", body = [PerformanceCard]),
        (status = 403, description = "Somente ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_performance_cards(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<PerformanceCard>>, AppError> {
    let cards = app_state.dashboard_service.performance_cards(&query).await?;
    Ok(Json(cards))
}

// GET /api/admin/salespersons
#[utoipa::path(
    get,
    path = "/api/admin/salespersons",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Vendedores por nome", body = [SalespersonEntry]),
        (status = 403, description = "Somente ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_salespersons(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<SalespersonEntry>>, AppError> {
    let entries = app_state.dashboard_service.salespersons().await?;
    Ok(Json(entries))
}

// GET /api/admin/leads
#[utoipa::path(
    get,
    path = "/api/admin/leads",
    tag = "Dashboard",
    params(ReportQuery),
    responses(
        (status = 200, description = "Leads com o nome do vendedor", body = [AdminLeadRow]),
        (status = 403, description = "Somente ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<AdminLeadRow>>, AppError> {
    let rows = app_state.dashboard_service.admin_leads(&query).await?;
    Ok(Json(rows))
}

// GET /api/admin/calls
#[utoipa::path(
    get,
    path = "/api/admin/calls",
    tag = "Dashboard",
    params(ReportQuery),
    responses(
        (status = 200, description = "Ligações com o nome do vendedor", body = [AdminCallRow]),
        (status = 403, description = "Somente ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_calls(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<AdminCallRow>>, AppError> {
    let rows = app_state.dashboard_service.admin_calls(&query).await?;
    Ok(Json(rows))
}
