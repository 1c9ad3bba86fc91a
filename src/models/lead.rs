// src/models/lead.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

// Mapeia o CREATE TYPE lead_status do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    New,
    Called,
    Closed,
}

// --- LEAD (contato antes da primeira ligação) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,

    pub client_name: String,
    pub contact_number: String,

    pub query_source: Option<String>,
    pub query_product: Option<String>,
    pub region: Option<String>,

    // Dono do lead, nunca muda depois da criação
    pub salesperson_id: Uuid,

    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLead {
    pub client_name: String,
    pub contact_number: String,
    pub query_source: Option<String>,
    pub query_product: Option<String>,
    pub region: Option<String>,
    pub salesperson_id: Uuid,
    pub status: LeadStatus,
}

/// Origem do lead de uma primeira ligação: já existente ou criado na mesma transação.
#[derive(Debug, Clone)]
pub enum LeadSource {
    Existing(Lead),
    New(NewLead),
}
