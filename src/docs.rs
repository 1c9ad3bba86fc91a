// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Calls ---
        handlers::calls::submit_contact,
        handlers::calls::list_my_calls,
        handlers::calls::get_call,
        handlers::calls::correct_call,

        // --- Follow-ups ---
        handlers::calls::record_follow_up,
        handlers::calls::follow_up_history,
        handlers::calls::follow_up_queue,

        // --- Leads ---
        handlers::leads::list_my_leads,
        handlers::leads::get_lead,

        // --- Dashboard ---
        handlers::dashboard::get_kpis,
        handlers::dashboard::get_performance_cards,
        handlers::dashboard::list_salespersons,
        handlers::dashboard::list_leads,
        handlers::dashboard::list_calls,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::SalespersonEntry,

            // --- Leads ---
            models::lead::LeadStatus,
            models::lead::Lead,

            // --- Calls ---
            models::call::CallStatus,
            models::call::CallLog,
            models::call::CallFollowUp,
            models::call::ContactSubmission,
            models::call::FollowUpRequest,
            models::call::CallCorrection,
            models::call::SubmissionResult,
            models::call::RecordedFollowUp,
            models::call::FollowUpHistory,
            models::call::FollowUpQueueEntry,

            // --- Dashboard ---
            models::dashboard::KpiSummary,
            models::dashboard::PerformanceCard,
            models::dashboard::AdminLeadRow,
            models::dashboard::AdminCallRow,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Calls", description = "Contatos e Primeira Ligação"),
        (name = "Follow-ups", description = "Histórico e Fila de Follow-ups"),
        (name = "Leads", description = "Leads do Vendedor"),
        (name = "Dashboard", description = "KPIs e Relatórios do Admin")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/calls",
            "/api/calls/{id}/follow-up",
            "/api/calls/follow-ups",
            "/api/admin/kpis",
            "/api/leads/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "rota sem documentação: {}", path);
        }
    }
}
