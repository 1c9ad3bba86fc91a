// src/db/memory_store.rs
//
// SalesStore em memória para os testes dos serviços.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ActivityScope, CallFilter, FollowUpFilter, LeadFilter, SalesStore},
    models::{
        auth::{NewUser, Role, User},
        call::{
            CallFollowUp, CallLog, CallOutcome, CallStatus, CallTransition, JoinedFollowUp, NewCallLog,
            NewFollowUp,
        },
        dashboard::ActivityCounts,
        lead::{Lead, LeadSource, LeadStatus, NewLead},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    leads: Vec<Lead>,
    calls: Vec<CallLog>,
    follow_ups: Vec<CallFollowUp>,
    reminders: HashSet<(Uuid, DateTime<Utc>)>,
    // Leituras desses usuários falham, como um banco fora do ar
    unavailable: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().expect("memory store lock poisoned");
        f(&mut tables)
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.lock().expect("memory store lock poisoned");
        f(&tables)
    }

    // --- Sementes para os testes (datas controladas) ---

    pub fn seed_user(&self, name: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        };
        self.with(|t| t.users.push(user.clone()));
        user
    }

    pub fn seed_lead(&self, lead: Lead) {
        self.with(|t| t.leads.push(lead));
    }

    pub fn seed_call(&self, call: CallLog) {
        self.with(|t| t.calls.push(call));
    }

    pub fn seed_follow_up(&self, follow_up: CallFollowUp) {
        self.with(|t| t.follow_ups.push(follow_up));
    }

    pub fn make_unavailable(&self, user_id: Uuid) {
        self.with(|t| t.unavailable.insert(user_id));
    }

    fn check_available(&self, user_id: Option<Uuid>) -> Result<(), AppError> {
        match user_id {
            Some(id) if self.read(|t| t.unavailable.contains(&id)) => {
                Err(AppError::InternalServerError(anyhow::anyhow!("usuário {} indisponível", id)))
            }
            _ => Ok(()),
        }
    }

    pub fn lead_count(&self) -> usize {
        self.read(|t| t.leads.len())
    }

    pub fn call_count(&self) -> usize {
        self.read(|t| t.calls.len())
    }
}

fn new_lead_row(lead: &NewLead, now: DateTime<Utc>) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        client_name: lead.client_name.clone(),
        contact_number: lead.contact_number.clone(),
        query_source: lead.query_source.clone(),
        query_product: lead.query_product.clone(),
        region: lead.region.clone(),
        salesperson_id: lead.salesperson_id,
        status: lead.status,
        created_at: now,
    }
}

fn apply_transition(tables: &mut Tables, transition: &CallTransition) -> Result<CallLog, AppError> {
    let call = tables
        .calls
        .iter_mut()
        .find(|c| c.id == transition.call_id)
        .ok_or(AppError::NotFound("Ligação"))?;
    let transition = &transition.over(call);

    call.call_outcome = transition.call_outcome.clone();
    call.remark = transition.remark.clone();
    call.status = transition.status;
    call.follow_up_datetime = transition.follow_up_datetime;
    call.completed_at = transition.completed_at;
    let updated = call.clone();

    if let (CallStatus::Closed, Some(lead_id)) = (transition.status, transition.lead_id) {
        if let Some(lead) = tables.leads.iter_mut().find(|l| l.id == lead_id) {
            lead.status = LeadStatus::Closed;
        }
    }
    Ok(updated)
}

fn join(tables: &Tables, follow_up: &CallFollowUp) -> Option<JoinedFollowUp> {
    let call = tables.calls.iter().find(|c| c.id == follow_up.call_id)?;
    Some(JoinedFollowUp {
        follow_up: follow_up.clone(),
        client_name: call.client_name.clone(),
        call_salesperson_id: call.salesperson_id,
        call_status: call.status,
    })
}

#[async_trait]
impl SalesStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        self.with(|t| {
            if t.users.iter().any(|u| u.email == user.email) {
                return Err(AppError::EmailAlreadyExists);
            }
            let row = User {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                role: user.role,
                created_at: Utc::now(),
            };
            t.users.push(row.clone());
            Ok(row)
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.check_available(Some(id))?;
        Ok(self.read(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.read(|t| t.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
        Ok(self.read(|t| {
            let mut users: Vec<User> = t.users.iter().filter(|u| u.role == role).cloned().collect();
            users.sort_by(|a, b| a.name.cmp(&b.name));
            users
        }))
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        let row = new_lead_row(&lead, Utc::now());
        self.with(|t| t.leads.push(row.clone()));
        Ok(row)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.read(|t| t.leads.iter().find(|l| l.id == id).cloned()))
    }

    async fn find_lead_by_contact(
        &self,
        contact_number: &str,
        salesperson_id: Uuid,
    ) -> Result<Option<Lead>, AppError> {
        // Prefere o lead mais novo ainda sem ligação
        Ok(self.read(|t| {
            t.leads
                .iter()
                .enumerate()
                .filter(|(_, l)| l.contact_number == contact_number && l.salesperson_id == salesperson_id)
                .max_by_key(|(i, l)| {
                    let called = t.calls.iter().any(|c| c.lead_id == Some(l.id));
                    (!called, l.created_at, *i)
                })
                .map(|(_, l)| l.clone())
        }))
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        self.check_available(filter.salesperson_id)?;
        Ok(self.read(|t| {
            let mut leads: Vec<Lead> = t
                .leads
                .iter()
                .filter(|l| filter.salesperson_id.is_none_or(|id| l.salesperson_id == id))
                .filter(|l| filter.statuses.is_empty() || filter.statuses.contains(&l.status))
                .filter(|l| filter.range.contains(l.created_at))
                .cloned()
                .collect();
            leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            leads
        }))
    }

    async fn find_call(&self, id: Uuid) -> Result<Option<CallLog>, AppError> {
        Ok(self.read(|t| t.calls.iter().find(|c| c.id == id).cloned()))
    }

    async fn find_call_by_lead(&self, lead_id: Uuid) -> Result<Option<CallLog>, AppError> {
        Ok(self.read(|t| t.calls.iter().find(|c| c.lead_id == Some(lead_id)).cloned()))
    }

    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallLog>, AppError> {
        Ok(self.read(|t| {
            let mut calls: Vec<CallLog> = t
                .calls
                .iter()
                .filter(|c| filter.salesperson_id.is_none_or(|id| c.salesperson_id == id))
                .filter(|c| filter.status.is_none_or(|s| c.status == s))
                .filter(|c| filter.range.contains(c.created_at))
                .filter(|c| match filter.follow_up_after {
                    Some(after) => c.follow_up_datetime.is_some_and(|at| at > after),
                    None => true,
                })
                .cloned()
                .collect();
            calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            calls
        }))
    }

    async fn record_first_call(
        &self,
        lead: LeadSource,
        call: NewCallLog,
        lead_status: LeadStatus,
    ) -> Result<(Lead, CallLog), AppError> {
        let now = Utc::now();
        self.with(|t| {
            let lead = match lead {
                LeadSource::Existing(lead) => lead,
                LeadSource::New(new_lead) => new_lead_row(&new_lead, now),
            };
            if t.calls.iter().any(|c| c.lead_id == Some(lead.id)) {
                return Err(AppError::DuplicateFirstCall { lead_id: lead.id });
            }

            let row = CallLog {
                id: Uuid::new_v4(),
                call_code: call.call_code,
                lead_id: Some(lead.id),
                salesperson_id: call.salesperson_id,
                client_name: call.client_name,
                contact_number: call.contact_number,
                query_source: call.query_source,
                query_product: call.query_product,
                region: call.region,
                call_outcome: call.call_outcome,
                remark: call.remark,
                status: call.status,
                follow_up_datetime: call.follow_up_datetime,
                completed_at: call.completed_at,
                created_at: now,
            };

            let lead = Lead { status: lead_status, ..lead };
            match t.leads.iter_mut().find(|l| l.id == lead.id) {
                Some(existing) => *existing = lead.clone(),
                None => t.leads.push(lead.clone()),
            }
            t.calls.push(row.clone());
            Ok((lead, row))
        })
    }

    async fn record_follow_up(
        &self,
        follow_up: NewFollowUp,
        transition: &CallTransition,
    ) -> Result<(CallFollowUp, CallLog), AppError> {
        let now = Utc::now();
        self.with(|t| {
            match t.calls.iter().find(|c| c.id == transition.call_id) {
                None => return Err(AppError::NotFound("Ligação")),
                Some(current) if !current.is_open() => return Err(AppError::CallClosed(current.id)),
                Some(_) => {}
            }
            let call = apply_transition(t, transition)?;
            let row = CallFollowUp {
                id: Uuid::new_v4(),
                call_id: follow_up.call_id,
                salesperson_id: follow_up.salesperson_id,
                outcome: follow_up.outcome,
                remark: follow_up.remark,
                follow_up_datetime: follow_up.follow_up_datetime,
                created_at: now,
            };
            t.follow_ups.push(row.clone());
            Ok((row, call))
        })
    }

    async fn apply_call_transition(&self, transition: &CallTransition) -> Result<CallLog, AppError> {
        self.with(|t| apply_transition(t, transition))
    }

    async fn list_follow_ups(&self, filter: &FollowUpFilter) -> Result<Vec<JoinedFollowUp>, AppError> {
        Ok(self.read(|t| {
            let mut rows: Vec<JoinedFollowUp> = t
                .follow_ups
                .iter()
                .filter_map(|f| join(t, f))
                .filter(|j| filter.call_id.is_none_or(|id| j.follow_up.call_id == id))
                .filter(|j| filter.salesperson_id.is_none_or(|id| j.follow_up.salesperson_id == id))
                .filter(|j| filter.call_salesperson_id.is_none_or(|id| j.call_salesperson_id == id))
                .filter(|j| filter.call_status.is_none_or(|s| j.call_status == s))
                .filter(|j| filter.range.contains(j.follow_up.created_at))
                .filter(|j| match filter.follow_up_after {
                    Some(after) => j.follow_up.follow_up_datetime.is_some_and(|at| at > after),
                    None => true,
                })
                .collect();
            // Estável: empates mantêm a ordem de inserção
            rows.sort_by_key(|j| j.follow_up.created_at);
            rows
        }))
    }

    async fn count_activity(
        &self,
        scope: &ActivityScope,
        now: DateTime<Utc>,
    ) -> Result<ActivityCounts, AppError> {
        Ok(self.read(|t| {
            let owned = |owner: Uuid| scope.salesperson_id.is_none_or(|id| id == owner);

            let leads: Vec<&Lead> = t
                .leads
                .iter()
                .filter(|l| owned(l.salesperson_id) && scope.range.contains(l.created_at))
                .collect();
            let calls: Vec<&CallLog> = t
                .calls
                .iter()
                .filter(|c| owned(c.salesperson_id) && scope.range.contains(c.created_at))
                .collect();
            let count = |n: usize| n as i64;

            ActivityCounts {
                total_leads: count(leads.len()),
                new_leads: count(leads.iter().filter(|l| l.status == LeadStatus::New).count()),
                called_leads: count(leads.iter().filter(|l| l.status == LeadStatus::Called).count()),
                total_calls: count(calls.len()),
                closed_calls: count(calls.iter().filter(|c| c.status == CallStatus::Closed).count()),
                purchased_calls: count(
                    calls.iter().filter(|c| c.call_outcome == CallOutcome::Purchased).count(),
                ),
                purchased_follow_ups: count(
                    t.follow_ups
                        .iter()
                        .filter(|f| owned(f.salesperson_id) && scope.range.contains(f.created_at))
                        .filter(|f| f.outcome == CallOutcome::Purchased)
                        .count(),
                ),
                pending_follow_ups: count(
                    calls
                        .iter()
                        .filter(|c| c.status == CallStatus::Open)
                        .filter(|c| c.follow_up_datetime.is_some_and(|at| at <= now))
                        .count(),
                ),
            }
        }))
    }

    async fn claim_reminder(
        &self,
        call_id: Uuid,
        follow_up_at: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self.with(|t| t.reminders.insert((call_id, follow_up_at))))
    }
}
