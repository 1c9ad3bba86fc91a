// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{NewUser, Role, User},
        call::{CallFollowUp, CallLog, CallStatus, CallTransition, JoinedFollowUp, NewCallLog, NewFollowUp},
        dashboard::{ActivityCounts, DateRange},
        lead::{Lead, LeadSource, LeadStatus, NewLead},
    },
};

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub salesperson_id: Option<Uuid>,
    // Vazio = qualquer status
    pub statuses: Vec<LeadStatus>,
    pub range: DateRange,
}

#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    pub salesperson_id: Option<Uuid>,
    pub status: Option<CallStatus>,
    pub range: DateRange,
    // Só ligações com follow-up estritamente depois deste instante
    pub follow_up_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FollowUpFilter {
    pub call_id: Option<Uuid>,
    // Quem registrou o follow-up
    pub salesperson_id: Option<Uuid>,
    // Dono da ligação
    pub call_salesperson_id: Option<Uuid>,
    pub call_status: Option<CallStatus>,
    pub range: DateRange,
    pub follow_up_after: Option<DateTime<Utc>>,
}

/// Escopo das contagens de KPI: cada entidade é filtrada pelo próprio `created_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityScope {
    pub salesperson_id: Option<Uuid>,
    pub range: DateRange,
}

/// Armazenamento de usuários, leads, ligações e follow-ups.
///
/// As operações `record_*` e `apply_call_transition` são atômicas: ou tudo é gravado,
/// ou nada muda.
#[async_trait]
pub trait SalesStore: Send + Sync {
    // --- Usuários ---
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Ordenados por nome.
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError>;

    // --- Leads ---
    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError>;
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;
    /// Lead do vendedor com esse telefone: o mais novo sem ligação, senão o mais novo.
    async fn find_lead_by_contact(
        &self,
        contact_number: &str,
        salesperson_id: Uuid,
    ) -> Result<Option<Lead>, AppError>;
    /// Mais recentes primeiro.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError>;

    // --- Ligações ---
    async fn find_call(&self, id: Uuid) -> Result<Option<CallLog>, AppError>;
    async fn find_call_by_lead(&self, lead_id: Uuid) -> Result<Option<CallLog>, AppError>;
    /// Mais recentes primeiro.
    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallLog>, AppError>;

    /// Cria o lead (se novo), a primeira ligação e ajusta o status do lead.
    /// Falha com `DuplicateFirstCall` se o lead já tiver ligação.
    async fn record_first_call(
        &self,
        lead: LeadSource,
        call: NewCallLog,
        lead_status: LeadStatus,
    ) -> Result<(Lead, CallLog), AppError>;

    /// Insere o follow-up e aplica a transição da ligação.
    async fn record_follow_up(
        &self,
        follow_up: NewFollowUp,
        transition: &CallTransition,
    ) -> Result<(CallFollowUp, CallLog), AppError>;

    async fn apply_call_transition(&self, transition: &CallTransition) -> Result<CallLog, AppError>;

    // --- Follow-ups ---
    /// Mais antigos primeiro.
    async fn list_follow_ups(&self, filter: &FollowUpFilter) -> Result<Vec<JoinedFollowUp>, AppError>;

    // --- Relatórios ---
    async fn count_activity(
        &self,
        scope: &ActivityScope,
        now: DateTime<Utc>,
    ) -> Result<ActivityCounts, AppError>;

    // --- Lembretes ---
    /// Marca o lembrete de `(call_id, follow_up_at)` como enviado.
    /// Retorna `false` se já estava marcado.
    async fn claim_reminder(
        &self,
        call_id: Uuid,
        follow_up_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}
