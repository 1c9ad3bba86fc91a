// src/services/call_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{CallFilter, FollowUpFilter, LeadFilter, SalesStore},
    models::{
        auth::User,
        call::{
            CallCorrection, CallFollowUp, CallLog, CallOutcome, CallStatus, CallTransition,
            ContactSubmission, FollowUpHistory, FollowUpQueueEntry, FollowUpRequest, NewCallLog,
            NewFollowUp, RecordedFollowUp, SubmissionResult,
        },
        lead::{Lead, LeadSource, LeadStatus, NewLead},
    },
};

/// Código visível da ligação: "CALL-" + 8 hex maiúsculos.
pub fn generate_call_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CALL-{}", hex[..8].to_uppercase())
}

/// Follow-up mais recente de cada ligação aberta (opcionalmente só as de um dono).
pub async fn latest_follow_ups(
    store: &dyn SalesStore,
    call_owner: Option<Uuid>,
) -> Result<HashMap<Uuid, CallFollowUp>, AppError> {
    let rows = store
        .list_follow_ups(&FollowUpFilter {
            call_salesperson_id: call_owner,
            call_status: Some(CallStatus::Open),
            ..FollowUpFilter::default()
        })
        .await?;

    // Vêm em ordem de criação: o último inserido vence
    Ok(rows
        .into_iter()
        .map(|row| (row.follow_up.call_id, row.follow_up))
        .collect())
}

// Ciclo de vida Lead → Ligação → Follow-up
#[derive(Clone)]
pub struct CallService {
    store: Arc<dyn SalesStore>,
}

impl CallService {
    pub fn new(store: Arc<dyn SalesStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    //  1. ENVIO DE CONTATO (LEAD OU PRIMEIRA LIGAÇÃO)
    // =========================================================================

    pub async fn submit_contact(
        &self,
        actor: &User,
        submission: ContactSubmission,
    ) -> Result<SubmissionResult, AppError> {
        submission.validate()?;

        let outcome = submission.outcome().cloned();
        match outcome {
            None => {
                let lead = self.create_lead(actor, submission).await?;
                Ok(SubmissionResult::LeadCreated { lead })
            }
            Some(outcome) => {
                let (lead, call) = self.log_first_call(actor, submission, outcome).await?;
                Ok(SubmissionResult::FirstCallLogged { lead, call })
            }
        }
    }

    // Sem resultado: sempre cria um lead NEW (não há deduplicação aqui)
    async fn create_lead(&self, actor: &User, submission: ContactSubmission) -> Result<Lead, AppError> {
        let lead = self
            .store
            .insert_lead(NewLead {
                client_name: submission.client_name,
                contact_number: submission.contact_number,
                query_source: submission.query_source,
                query_product: submission.query_product,
                region: submission.region,
                salesperson_id: actor.id,
                status: LeadStatus::New,
            })
            .await?;

        tracing::info!("📇 Lead {} criado por {}", lead.id, actor.id);
        Ok(lead)
    }

    async fn log_first_call(
        &self,
        actor: &User,
        submission: ContactSubmission,
        outcome: CallOutcome,
    ) -> Result<(Lead, CallLog), AppError> {
        // 1. Busca o lead do vendedor com esse telefone (ou prepara um novo)
        let source = match self
            .store
            .find_lead_by_contact(&submission.contact_number, actor.id)
            .await?
        {
            Some(lead) => {
                // 2. Uma única primeira ligação por lead
                if self.store.find_call_by_lead(lead.id).await?.is_some() {
                    return Err(AppError::DuplicateFirstCall { lead_id: lead.id });
                }
                LeadSource::Existing(lead)
            }
            None => LeadSource::New(NewLead {
                client_name: submission.client_name.clone(),
                contact_number: submission.contact_number.clone(),
                query_source: submission.query_source.clone(),
                query_product: submission.query_product.clone(),
                region: submission.region.clone(),
                salesperson_id: actor.id,
                status: LeadStatus::Called,
            }),
        };

        // 3. Classifica o resultado
        let (status, follow_up_datetime, completed_at) = if outcome.needs_follow_up() {
            (CallStatus::Open, submission.follow_up_datetime, None)
        } else {
            (CallStatus::Closed, None, Some(Utc::now()))
        };
        let lead_status = match status {
            CallStatus::Open => LeadStatus::Called,
            CallStatus::Closed => LeadStatus::Closed,
        };

        let (lead, call) = self
            .store
            .record_first_call(
                source,
                NewCallLog {
                    call_code: generate_call_code(),
                    salesperson_id: actor.id,
                    client_name: submission.client_name,
                    contact_number: submission.contact_number,
                    query_source: submission.query_source,
                    query_product: submission.query_product,
                    region: submission.region,
                    call_outcome: outcome,
                    remark: submission.remark,
                    status,
                    follow_up_datetime,
                    completed_at,
                },
                lead_status,
            )
            .await?;

        tracing::info!(
            "📞 Primeira ligação {} ({}) registrada para o lead {}: {:?}",
            call.call_code,
            call.call_outcome,
            lead.id,
            call.status
        );
        Ok((lead, call))
    }

    // =========================================================================
    //  2. FOLLOW-UPS
    // =========================================================================

    pub async fn record_follow_up(
        &self,
        actor: &User,
        call_id: Uuid,
        request: FollowUpRequest,
    ) -> Result<RecordedFollowUp, AppError> {
        request.validate()?;
        let call = self.load_call(actor, call_id).await?;

        // CLOSED é terminal
        if !call.is_open() {
            return Err(AppError::CallClosed(call.id));
        }

        let closes = request.call_outcome.is_terminal();
        let transition = CallTransition {
            call_id: call.id,
            lead_id: call.lead_id,
            // O resultado da primeira ligação nunca muda por follow-up
            call_outcome: call.call_outcome.clone(),
            remark: call.remark.clone(),
            status: if closes { CallStatus::Closed } else { CallStatus::Open },
            follow_up_datetime: if closes { None } else { request.follow_up_datetime },
            completed_at: if closes { Some(Utc::now()) } else { None },
        };

        let (follow_up, call) = self
            .store
            .record_follow_up(
                NewFollowUp {
                    call_id: call.id,
                    salesperson_id: actor.id,
                    outcome: request.call_outcome,
                    remark: request.remark,
                    follow_up_datetime: request.follow_up_datetime,
                },
                &transition,
            )
            .await?;

        tracing::info!(
            "🔁 Follow-up ({}) registrado na ligação {}: {:?}",
            follow_up.outcome,
            call.call_code,
            call.status
        );
        Ok(RecordedFollowUp { follow_up, call })
    }

    // =========================================================================
    //  3. CORREÇÃO DA PRIMEIRA LIGAÇÃO
    // =========================================================================

    pub async fn correct_call(
        &self,
        actor: &User,
        call_id: Uuid,
        correction: CallCorrection,
    ) -> Result<CallLog, AppError> {
        correction.validate()?;
        let call = self.load_call(actor, call_id).await?;

        let call_outcome = correction.call_outcome.unwrap_or_else(|| call.call_outcome.clone());
        let remark = correction.remark.or_else(|| call.remark.clone());

        // Resultado terminal força o encerramento; completed_at só é gravado uma vez
        let (status, follow_up_datetime, completed_at) = if call_outcome.is_terminal() {
            (CallStatus::Closed, None, call.completed_at.or_else(|| Some(Utc::now())))
        } else {
            (call.status, call.follow_up_datetime, call.completed_at)
        };

        let updated = self
            .store
            .apply_call_transition(&CallTransition {
                call_id: call.id,
                lead_id: call.lead_id,
                call_outcome,
                remark,
                status,
                follow_up_datetime,
                completed_at,
            })
            .await?;

        tracing::info!("✏️ Ligação {} corrigida por {}", updated.call_code, actor.id);
        Ok(updated)
    }

    // =========================================================================
    //  4. LEITURAS
    // =========================================================================

    pub async fn list_my_leads(&self, actor: &User) -> Result<Vec<Lead>, AppError> {
        self.store
            .list_leads(&LeadFilter { salesperson_id: Some(actor.id), ..LeadFilter::default() })
            .await
    }

    pub async fn get_lead(&self, actor: &User, lead_id: Uuid) -> Result<Lead, AppError> {
        let lead = self
            .store
            .find_lead(lead_id)
            .await?
            .ok_or(AppError::NotFound("Lead"))?;

        if !actor.can_access(lead.salesperson_id) {
            return Err(AppError::Forbidden);
        }
        Ok(lead)
    }

    pub async fn list_my_calls(&self, actor: &User) -> Result<Vec<CallLog>, AppError> {
        self.store
            .list_calls(&CallFilter { salesperson_id: Some(actor.id), ..CallFilter::default() })
            .await
    }

    pub async fn get_call(&self, actor: &User, call_id: Uuid) -> Result<CallLog, AppError> {
        self.load_call(actor, call_id).await
    }

    pub async fn follow_up_history(&self, actor: &User, call_id: Uuid) -> Result<FollowUpHistory, AppError> {
        let call = self.load_call(actor, call_id).await?;

        // Histórico completo, sem filtrar por resultado
        let follow_ups = self
            .store
            .list_follow_ups(&FollowUpFilter { call_id: Some(call.id), ..FollowUpFilter::default() })
            .await?
            .into_iter()
            .map(|row| row.follow_up)
            .collect();

        Ok(FollowUpHistory { call, follow_ups })
    }

    /// Fila de follow-ups do vendedor: uma entrada por ligação aberta, no horário pendente atual.
    pub async fn follow_up_queue(
        &self,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<Vec<FollowUpQueueEntry>, AppError> {
        let calls = self
            .store
            .list_calls(&CallFilter {
                salesperson_id: Some(actor.id),
                status: Some(CallStatus::Open),
                ..CallFilter::default()
            })
            .await?;

        let latest = latest_follow_ups(self.store.as_ref(), Some(actor.id)).await?;

        let mut queue: Vec<FollowUpQueueEntry> = calls
            .into_iter()
            .map(|call| {
                let last = latest.get(&call.id);
                let pending = call.pending_follow_up(last);
                FollowUpQueueEntry {
                    call_id: call.id,
                    call_code: call.call_code.clone(),
                    client_name: call.client_name.clone(),
                    last_outcome: last.map_or_else(|| call.call_outcome.clone(), |f| f.outcome.clone()),
                    follow_up_datetime: pending,
                    is_overdue: pending.is_some_and(|at| at < now),
                }
            })
            .collect();

        // Sem horário vai para o fim
        queue.sort_by_key(|entry| (entry.follow_up_datetime.is_none(), entry.follow_up_datetime));
        Ok(queue)
    }

    async fn load_call(&self, actor: &User, call_id: Uuid) -> Result<CallLog, AppError> {
        let call = self
            .store
            .find_call(call_id)
            .await?
            .ok_or(AppError::NotFound("Ligação"))?;

        if !actor.can_access(call.salesperson_id) {
            return Err(AppError::Forbidden);
        }
        Ok(call)
    }
}
