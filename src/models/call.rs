// src/models/call.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, FromRow, Postgres, Type,
};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::lead::Lead;

// --- ENUMS ---

// Mapeia o CREATE TYPE call_status do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "call_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CallStatus {
    Open,
    Closed,
}

/// Resultado de uma ligação. No banco é TEXT com o texto exibido ("Not Picked", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallOutcome {
    Connected,
    Busy,
    NotPicked,
    CutInBetween,
    Purchased,
    NotRequired,
    Other(String),
}

impl CallOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            CallOutcome::Connected => "Connected",
            CallOutcome::Busy => "Busy",
            CallOutcome::NotPicked => "Not Picked",
            CallOutcome::CutInBetween => "Cut-In Between",
            CallOutcome::Purchased => "Purchased",
            CallOutcome::NotRequired => "Not Required",
            CallOutcome::Other(text) => text,
        }
    }

    /// Resultados que mantêm a ligação aberta aguardando follow-up.
    pub fn needs_follow_up(&self) -> bool {
        matches!(
            self,
            CallOutcome::Connected
                | CallOutcome::Busy
                | CallOutcome::NotPicked
                | CallOutcome::CutInBetween
        )
    }

    /// Resultados que encerram a ligação.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallOutcome::Purchased | CallOutcome::NotRequired)
    }

    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<String> for CallOutcome {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Connected" => CallOutcome::Connected,
            "Busy" => CallOutcome::Busy,
            "Not Picked" => CallOutcome::NotPicked,
            "Cut-In Between" => CallOutcome::CutInBetween,
            "Purchased" => CallOutcome::Purchased,
            "Not Required" => CallOutcome::NotRequired,
            _ => CallOutcome::Other(value),
        }
    }
}

impl From<&str> for CallOutcome {
    fn from(value: &str) -> Self {
        CallOutcome::from(value.to_string())
    }
}

impl From<CallOutcome> for String {
    fn from(outcome: CallOutcome) -> Self {
        match outcome {
            CallOutcome::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Armazenado como TEXT
impl Type<Postgres> for CallOutcome {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for CallOutcome {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <String as Decode<Postgres>>::decode(value)?;
        Ok(CallOutcome::from(text))
    }
}

impl Encode<'_, Postgres> for CallOutcome {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

// --- PRIMEIRA LIGAÇÃO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallLog {
    pub id: Uuid,
    // Código visível, ex: "CALL-3FA9C2D1"
    pub call_code: String,
    pub lead_id: Option<Uuid>,
    pub salesperson_id: Uuid,

    // Cópia dos dados do lead no momento da ligação
    pub client_name: String,
    pub contact_number: String,
    pub query_source: Option<String>,
    pub query_product: Option<String>,
    pub region: Option<String>,

    // Resultado da PRIMEIRA ligação. Follow-ups nunca alteram este campo.
    #[schema(value_type = String, example = "Connected")]
    pub call_outcome: CallOutcome,
    pub remark: Option<String>,

    pub status: CallStatus,
    pub follow_up_datetime: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CallLog {
    pub fn is_open(&self) -> bool {
        self.status == CallStatus::Open
    }

    /// Próximo follow-up pendente: o do follow-up mais recente, se houver algum,
    /// senão o da própria ligação. Ligações encerradas não têm pendência.
    pub fn pending_follow_up(&self, latest: Option<&CallFollowUp>) -> Option<DateTime<Utc>> {
        if !self.is_open() {
            return None;
        }
        match latest {
            Some(follow_up) => follow_up.follow_up_datetime,
            None => self.follow_up_datetime,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCallLog {
    pub call_code: String,
    pub salesperson_id: Uuid,
    pub client_name: String,
    pub contact_number: String,
    pub query_source: Option<String>,
    pub query_product: Option<String>,
    pub region: Option<String>,
    pub call_outcome: CallOutcome,
    pub remark: Option<String>,
    pub status: CallStatus,
    pub follow_up_datetime: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Novo estado de uma ligação (e do seu lead) gravado atomicamente.
#[derive(Debug, Clone)]
pub struct CallTransition {
    pub call_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub call_outcome: CallOutcome,
    pub remark: Option<String>,
    pub status: CallStatus,
    pub follow_up_datetime: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CallTransition {
    /// Ajusta a transição ao estado gravado no momento da escrita:
    /// uma ligação já CLOSED continua CLOSED, com o completed_at original.
    pub fn over(&self, current: &CallLog) -> Self {
        if current.is_open() {
            return self.clone();
        }
        Self {
            status: CallStatus::Closed,
            follow_up_datetime: None,
            completed_at: current.completed_at.or(self.completed_at),
            ..self.clone()
        }
    }
}

// --- FOLLOW-UPS (histórico somente de inserção) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallFollowUp {
    pub id: Uuid,
    pub call_id: Uuid,
    pub salesperson_id: Uuid,
    #[schema(value_type = String)]
    pub outcome: CallOutcome,
    pub remark: Option<String>,
    pub follow_up_datetime: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFollowUp {
    pub call_id: Uuid,
    pub salesperson_id: Uuid,
    pub outcome: CallOutcome,
    pub remark: Option<String>,
    pub follow_up_datetime: Option<DateTime<Utc>>,
}

/// Follow-up com os dados da ligação à qual pertence.
#[derive(Debug, Clone, FromRow)]
pub struct JoinedFollowUp {
    #[sqlx(flatten)]
    pub follow_up: CallFollowUp,
    pub client_name: String,
    pub call_salesperson_id: Uuid,
    pub call_status: CallStatus,
}

// --- REQUISIÇÕES ---

fn validate_outcome(outcome: &CallOutcome) -> Result<(), ValidationError> {
    if outcome.is_blank() {
        let mut error = ValidationError::new("required");
        error.message = Some("O resultado da ligação é obrigatório.".into());
        return Err(error);
    }
    Ok(())
}

/// Envio de contato: sem resultado cria só o lead, com resultado registra a primeira ligação.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default)]
    #[validate(length(min = 1, message = "O nome do cliente é obrigatório."))]
    pub client_name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "O número de contato é obrigatório."))]
    pub contact_number: String,

    pub query_source: Option<String>,
    pub query_product: Option<String>,
    pub region: Option<String>,

    #[schema(value_type = Option<String>, example = "Connected")]
    pub call_outcome: Option<CallOutcome>,
    pub remark: Option<String>,
    pub follow_up_datetime: Option<DateTime<Utc>>,
}

impl ContactSubmission {
    /// Resultado informado, ignorando texto vazio.
    pub fn outcome(&self) -> Option<&CallOutcome> {
        self.call_outcome.as_ref().filter(|o| !o.is_blank())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    #[validate(custom(function = "validate_outcome"))]
    #[schema(value_type = String, example = "Busy")]
    pub call_outcome: CallOutcome,
    pub remark: Option<String>,
    pub follow_up_datetime: Option<DateTime<Utc>>,
}

/// Correção dos campos da primeira ligação (fora do histórico de follow-ups).
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallCorrection {
    #[validate(custom(function = "validate_outcome"))]
    #[schema(value_type = Option<String>)]
    pub call_outcome: Option<CallOutcome>,
    pub remark: Option<String>,
}

// --- RESPOSTAS ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionResult {
    LeadCreated { lead: Lead },
    FirstCallLogged { lead: Lead, call: CallLog },
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordedFollowUp {
    pub follow_up: CallFollowUp,
    pub call: CallLog,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpHistory {
    pub call: CallLog,
    pub follow_ups: Vec<CallFollowUp>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQueueEntry {
    pub call_id: Uuid,
    pub call_code: String,
    pub client_name: String,
    #[schema(value_type = String)]
    pub last_outcome: CallOutcome,
    pub follow_up_datetime: Option<DateTime<Utc>>,
    pub is_overdue: bool,
}
