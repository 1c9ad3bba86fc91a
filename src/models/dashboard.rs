// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};

use super::{call::CallLog, lead::Lead};

/// Intervalo fechado `[start, end]`; `None` significa sem limite daquele lado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub const ALL_TIME: DateRange = DateRange { start: None, end: None };

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start) && self.end.is_none_or(|end| instant <= end)
    }
}

// Parâmetros de período vindos da query string (todos opcionais)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeParams {
    pub single_date: Option<String>,
    pub month: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub span: Option<String>,
}

// Filtros das telas de admin: vendedor + período
// (sem `flatten`: o serde_urlencoded não lida bem com ele)
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[param(value_type = Option<String>)]
    pub salesperson_id: Option<Uuid>,
    pub single_date: Option<String>,
    pub month: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub span: Option<String>,
}

// `?salesperson_id=` (vazio) equivale a não filtrar
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text).map(Some).map_err(serde::de::Error::custom),
    }
}

impl ReportQuery {
    pub fn range_params(&self) -> RangeParams {
        RangeParams {
            single_date: self.single_date.clone(),
            month: self.month.clone(),
            from_date: self.from_date.clone(),
            to_date: self.to_date.clone(),
            span: self.span.clone(),
        }
    }
}

/// Contagens brutas lidas do banco para um escopo (vendedor + período).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityCounts {
    pub total_leads: i64,
    pub new_leads: i64,
    pub called_leads: i64,
    pub total_calls: i64,
    pub closed_calls: i64,
    pub purchased_calls: i64,
    pub purchased_follow_ups: i64,
    pub pending_follow_ups: i64,
}

// 1. Cards de KPI do admin
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub total_leads: i64,
    pub new_leads: i64,
    pub called_leads: i64,
    pub total_calls: i64,
    pub closed_calls: i64,
    pub purchased: i64,
    pub pending_followups: i64,
    pub conversion_rate: Decimal,
}

// 2. Um card por vendedor
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceCard {
    pub salesperson_id: Uuid,
    pub salesperson: String,
    #[serde(flatten)]
    pub kpis: KpiSummary,
}

// 3. Listagens do admin com o nome do vendedor
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminLeadRow {
    #[serde(flatten)]
    pub lead: Lead,
    pub salesperson: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminCallRow {
    #[serde(flatten)]
    pub call: CallLog,
    pub salesperson: String,
    pub is_follow_up: bool,
    pub is_overdue: bool,
}
