// src/services/dashboard_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ActivityScope, CallFilter, LeadFilter, SalesStore},
    models::{
        auth::{Role, SalespersonEntry, User},
        dashboard::{ActivityCounts, AdminCallRow, AdminLeadRow, DateRange, KpiSummary, PerformanceCard, ReportQuery},
    },
    services::{call_service::latest_follow_ups, date_range::resolve_date_range},
};

/// `round(100 × purchased / total_calls, 2)`, zero quando não há ligações.
pub fn conversion_rate(purchased: i64, total_calls: i64) -> Decimal {
    if total_calls == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(purchased) * Decimal::ONE_HUNDRED / Decimal::from(total_calls))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl From<ActivityCounts> for KpiSummary {
    fn from(counts: ActivityCounts) -> Self {
        // Primeira ligação e follow-up são contados separadamente (pode haver contagem dupla)
        let purchased = counts.purchased_calls + counts.purchased_follow_ups;
        KpiSummary {
            total_leads: counts.total_leads,
            new_leads: counts.new_leads,
            called_leads: counts.called_leads,
            total_calls: counts.total_calls,
            closed_calls: counts.closed_calls,
            purchased,
            pending_followups: counts.pending_follow_ups,
            conversion_rate: conversion_rate(purchased, counts.total_calls),
        }
    }
}

// Relatórios do painel de admin
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn SalesStore>,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(store: Arc<dyn SalesStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    fn resolve(&self, query: &ReportQuery, now: DateTime<Utc>) -> Result<DateRange, AppError> {
        resolve_date_range(&query.range_params(), now, self.offset)
    }

    pub async fn kpis(&self, query: &ReportQuery) -> Result<KpiSummary, AppError> {
        self.kpis_at(query, Utc::now()).await
    }

    pub async fn kpis_at(&self, query: &ReportQuery, now: DateTime<Utc>) -> Result<KpiSummary, AppError> {
        let range = self.resolve(query, now)?;
        let scope = ActivityScope { salesperson_id: query.salesperson_id, range };
        let counts = self.store.count_activity(&scope, now).await?;
        Ok(KpiSummary::from(counts))
    }

    /// Um card por vendedor, cada um com o mesmo cálculo dos KPIs filtrado por ele.
    pub async fn performance_cards(&self, query: &ReportQuery) -> Result<Vec<PerformanceCard>, AppError> {
        self.performance_cards_at(query, Utc::now()).await
    }

    pub async fn performance_cards_at(
        &self,
        query: &ReportQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<PerformanceCard>, AppError> {
        let range = self.resolve(query, now)?;
        let salespersons = self.store.list_users_by_role(Role::Salesperson).await?;

        let mut cards = Vec::with_capacity(salespersons.len());
        for user in salespersons {
            let scope = ActivityScope { salesperson_id: Some(user.id), range };
            let counts = self.store.count_activity(&scope, now).await?;
            cards.push(PerformanceCard {
                salesperson_id: user.id,
                salesperson: user.name,
                kpis: KpiSummary::from(counts),
            });
        }
        Ok(cards)
    }

    pub async fn salespersons(&self) -> Result<Vec<SalespersonEntry>, AppError> {
        let users = self.store.list_users_by_role(Role::Salesperson).await?;
        Ok(users
            .into_iter()
            .map(|u| SalespersonEntry { id: u.id, name: u.name })
            .collect())
    }

    pub async fn admin_leads(&self, query: &ReportQuery) -> Result<Vec<AdminLeadRow>, AppError> {
        let range = self.resolve(query, Utc::now())?;
        let leads = self
            .store
            .list_leads(&LeadFilter { salesperson_id: query.salesperson_id, range, ..LeadFilter::default() })
            .await?;

        let names = self.user_names().await?;
        Ok(leads
            .into_iter()
            .map(|lead| AdminLeadRow { salesperson: name_of(&names, lead.salesperson_id), lead })
            .collect())
    }

    pub async fn admin_calls(&self, query: &ReportQuery) -> Result<Vec<AdminCallRow>, AppError> {
        self.admin_calls_at(query, Utc::now()).await
    }

    pub async fn admin_calls_at(
        &self,
        query: &ReportQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<AdminCallRow>, AppError> {
        let range = self.resolve(query, now)?;
        let calls = self
            .store
            .list_calls(&CallFilter { salesperson_id: query.salesperson_id, range, ..CallFilter::default() })
            .await?;

        let names = self.user_names().await?;
        let latest = latest_follow_ups(self.store.as_ref(), query.salesperson_id).await?;

        Ok(calls
            .into_iter()
            .map(|call| {
                let pending = call.pending_follow_up(latest.get(&call.id));
                AdminCallRow {
                    salesperson: name_of(&names, call.salesperson_id),
                    is_follow_up: call.is_open(),
                    is_overdue: pending.is_some_and(|at| at < now),
                    call,
                }
            })
            .collect())
    }

    // Vendedores e admins (um admin também pode registrar ligações)
    async fn user_names(&self) -> Result<HashMap<Uuid, String>, AppError> {
        let mut users: Vec<User> = self.store.list_users_by_role(Role::Salesperson).await?;
        users.extend(self.store.list_users_by_role(Role::Admin).await?);
        Ok(users.into_iter().map(|u| (u.id, u.name)).collect())
    }
}

fn name_of(names: &HashMap<Uuid, String>, id: Uuid) -> String {
    names.get(&id).cloned().unwrap_or_else(|| "Desconhecido".to_string())
}
