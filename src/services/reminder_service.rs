// src/services/reminder_service.rs

use std::{collections::HashMap, fmt::Write as _, sync::Arc};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CallFilter, FollowUpFilter, LeadFilter, SalesStore},
    models::{auth::{Role, User}, call::CallStatus, lead::LeadStatus},
    services::{call_service::latest_follow_ups, mailer::NotificationSender},
};

const TIME_FORMAT: &str = "%d %b %I:%M %p";

/// Antecedência do lembrete: 15 min para follow-ups marcados com menos de 1h, senão 30 min.
pub fn reminder_offset(created_at: DateTime<Utc>, follow_up_at: DateTime<Utc>) -> Duration {
    if follow_up_at - created_at < Duration::minutes(60) {
        Duration::minutes(15)
    } else {
        Duration::minutes(30)
    }
}

/// Um follow-up futuro que pode gerar lembrete (da ligação ou de uma linha de follow-up).
#[derive(Debug, Clone)]
struct ReminderCandidate {
    call_id: Uuid,
    salesperson_id: Uuid,
    client_name: String,
    created_at: DateTime<Utc>,
    follow_up_at: DateTime<Utc>,
}

impl ReminderCandidate {
    fn reminder_at(&self) -> DateTime<Utc> {
        self.follow_up_at - reminder_offset(self.created_at, self.follow_up_at)
    }

    fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let at = self.reminder_at();
        at <= now && now < at + window
    }
}

// Os dois jobs do agendador: lembretes de follow-up e resumo diário
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn SalesStore>,
    notifier: Arc<dyn NotificationSender>,
    window: Duration,
    offset: FixedOffset,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn SalesStore>,
        notifier: Arc<dyn NotificationSender>,
        window: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self { store, notifier, window, offset }
    }

    fn format_time(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.offset).format(TIME_FORMAT).to_string()
    }

    // =========================================================================
    //  1. LEMBRETES DE FOLLOW-UP
    // =========================================================================

    pub async fn run_followup_reminders(&self) -> Result<usize, AppError> {
        self.run_followup_reminders_at(Utc::now()).await
    }

    /// Envia os lembretes cuja janela contém `now`. Retorna quantos envios foram tentados;
    /// falhas de entrega ficam só no log do mailer.
    pub async fn run_followup_reminders_at(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let candidates = self.collect_candidates(now).await?;
        let mut users: HashMap<Uuid, Option<User>> = HashMap::new();
        let mut attempted = 0;

        for candidate in candidates.iter().filter(|c| c.is_due(now, self.window)) {
            // Erro em um destinatário não interrompe os demais
            match self.remind(candidate, now, &mut users).await {
                Ok(true) => attempted += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    "🔥 Lembrete da ligação {} para {} falhou: {}",
                    candidate.call_id,
                    candidate.salesperson_id,
                    e
                ),
            }
        }

        tracing::debug!("⏰ Ciclo de lembretes: {} candidatos, {} tentativas", candidates.len(), attempted);
        Ok(attempted)
    }

    async fn remind(
        &self,
        candidate: &ReminderCandidate,
        now: DateTime<Utc>,
        users: &mut HashMap<Uuid, Option<User>>,
    ) -> Result<bool, AppError> {
        if !users.contains_key(&candidate.salesperson_id) {
            let user = self.store.find_user(candidate.salesperson_id).await?;
            users.insert(candidate.salesperson_id, user);
        }
        let Some(Some(user)) = users.get(&candidate.salesperson_id) else {
            tracing::warn!("Vendedor {} não encontrado, lembrete ignorado", candidate.salesperson_id);
            return Ok(false);
        };

        // Marca antes de enviar: a mesma (ligação, horário) nunca sai duas vezes
        if !self
            .store
            .claim_reminder(candidate.call_id, candidate.follow_up_at, now)
            .await?
        {
            return Ok(false);
        }

        let subject = format!("Lembrete de follow-up: {}", candidate.client_name);
        let body = format!(
            "Olá {},\n\nVocê tem um follow-up com {} às {}.\n",
            user.name,
            candidate.client_name,
            self.format_time(candidate.follow_up_at)
        );
        self.notifier.send(&user.email, &subject, &body).await;
        Ok(true)
    }

    // Ligações abertas com follow-up futuro + linhas de follow-up dessas ligações
    async fn collect_candidates(&self, now: DateTime<Utc>) -> Result<Vec<ReminderCandidate>, AppError> {
        let calls = self
            .store
            .list_calls(&CallFilter {
                status: Some(CallStatus::Open),
                follow_up_after: Some(now),
                ..CallFilter::default()
            })
            .await?;
        let follow_ups = self
            .store
            .list_follow_ups(&FollowUpFilter {
                call_status: Some(CallStatus::Open),
                follow_up_after: Some(now),
                ..FollowUpFilter::default()
            })
            .await?;

        let from_calls = calls.into_iter().filter_map(|call| {
            Some(ReminderCandidate {
                call_id: call.id,
                salesperson_id: call.salesperson_id,
                created_at: call.created_at,
                follow_up_at: call.follow_up_datetime?,
                client_name: call.client_name,
            })
        });
        let from_follow_ups = follow_ups.into_iter().filter_map(|row| {
            Some(ReminderCandidate {
                call_id: row.follow_up.call_id,
                salesperson_id: row.follow_up.salesperson_id,
                created_at: row.follow_up.created_at,
                follow_up_at: row.follow_up.follow_up_datetime?,
                client_name: row.client_name,
            })
        });

        Ok(from_calls.chain(from_follow_ups).collect())
    }

    // =========================================================================
    //  2. RESUMO DIÁRIO
    // =========================================================================

    pub async fn run_daily_summary(&self) -> Result<usize, AppError> {
        self.run_daily_summary_at(Utc::now()).await
    }

    /// Um e-mail por vendedor, mesmo sem pendências. Retorna quantos envios foram tentados.
    pub async fn run_daily_summary_at(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let salespersons = self.store.list_users_by_role(Role::Salesperson).await?;
        let subject = format!("Resumo diário de pendências ({})", now.with_timezone(&self.offset).format("%d %b"));
        let mut attempted = 0;

        for user in &salespersons {
            let body = match self.summary_body(user).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!("🔥 Resumo diário de {} falhou: {}", user.id, e);
                    continue;
                }
            };
            self.notifier.send(&user.email, &subject, &body).await;
            attempted += 1;
        }

        tracing::info!("📬 Resumo diário: {} de {} vendedores", attempted, salespersons.len());
        Ok(attempted)
    }

    async fn summary_body(&self, user: &User) -> Result<String, AppError> {
        let leads = self
            .store
            .list_leads(&LeadFilter {
                salesperson_id: Some(user.id),
                statuses: vec![LeadStatus::New, LeadStatus::Called],
                ..LeadFilter::default()
            })
            .await?;
        let open_calls = self
            .store
            .list_calls(&CallFilter {
                salesperson_id: Some(user.id),
                status: Some(CallStatus::Open),
                ..CallFilter::default()
            })
            .await?;
        let latest = latest_follow_ups(self.store.as_ref(), Some(user.id)).await?;

        let mut body = format!("Olá {},\n\nLeads pendentes:\n", user.name);
        if leads.is_empty() {
            body.push_str("  Nenhum lead pendente.\n");
        }
        for lead in &leads {
            let source = lead.query_source.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("Unknown");
            let _ = writeln!(body, "  - {} ({})", lead.client_name, source);
        }

        body.push_str("\nFollow-ups pendentes:\n");
        if open_calls.is_empty() {
            body.push_str("  Nenhum follow-up pendente.\n");
        }
        for call in &open_calls {
            let when = call
                .pending_follow_up(latest.get(&call.id))
                .map_or_else(|| "sem horário".to_string(), |at| self.format_time(at));
            let _ = writeln!(body, "  - {} — {}", call.client_name, when);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{
            call::{CallFollowUp, CallLog, CallOutcome},
            lead::Lead,
        },
        services::mailer::{testing::RecordingTransport, Mailer},
    };
    use chrono::TimeZone;
    use rstest::rstest;

    struct Fixture {
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
        service: ReminderService,
    }

    fn fixture_with(transport: RecordingTransport) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let mailer = Arc::new(Mailer::new("desk@example.com", transport.clone()));
        let service = ReminderService::new(
            store.clone(),
            mailer,
            Duration::minutes(5),
            FixedOffset::east_opt(0).unwrap(),
        );
        Fixture { store, transport, service }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingTransport::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    fn open_call(owner: &User, client: &str, created_at: DateTime<Utc>, follow_up_at: Option<DateTime<Utc>>) -> CallLog {
        CallLog {
            id: Uuid::new_v4(),
            call_code: "CALL-0000ABCD".into(),
            lead_id: None,
            salesperson_id: owner.id,
            client_name: client.into(),
            contact_number: "555-0100".into(),
            query_source: None,
            query_product: None,
            region: None,
            call_outcome: CallOutcome::Busy,
            remark: None,
            status: CallStatus::Open,
            follow_up_datetime: follow_up_at,
            completed_at: None,
            created_at,
        }
    }

    #[rstest]
    #[case(40, 15)]
    #[case(59, 15)]
    #[case(60, 30)]
    #[case(120, 30)]
    fn offset_depends_on_gap(#[case] gap: i64, #[case] offset: i64) {
        assert_eq!(reminder_offset(t0(), t0() + Duration::minutes(gap)), Duration::minutes(offset));
    }

    #[rstest]
    #[case(24, 0)]
    #[case(25, 1)]
    #[case(29, 1)]
    #[case(30, 0)]
    #[tokio::test]
    async fn short_gap_fires_only_inside_its_window(#[case] minutes_after: i64, #[case] expected: usize) {
        let f = fixture();
        let seller = f.store.seed_user("Ravi", Role::Salesperson);
        f.store.seed_call(open_call(&seller, "Acme", t0(), Some(t0() + Duration::minutes(40))));

        let sent = f
            .service
            .run_followup_reminders_at(t0() + Duration::minutes(minutes_after))
            .await
            .unwrap();
        assert_eq!(sent, expected);
    }

    #[tokio::test]
    async fn long_gap_uses_thirty_minute_offset() {
        let f = fixture();
        let seller = f.store.seed_user("Ravi", Role::Salesperson);
        f.store.seed_call(open_call(&seller, "Acme", t0(), Some(t0() + Duration::minutes(120))));

        assert_eq!(f.service.run_followup_reminders_at(t0() + Duration::minutes(75)).await.unwrap(), 0);
        assert_eq!(f.service.run_followup_reminders_at(t0() + Duration::minutes(90)).await.unwrap(), 1);

        let delivered = f.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, "ravi@example.com");
        assert!(delivered[0].body.contains("Acme"));
        assert!(delivered[0].body.contains("15 Jun 12:00 PM"));
    }

    #[tokio::test]
    async fn overlapping_polls_never_double_send() {
        let f = fixture();
        let seller = f.store.seed_user("Ravi", Role::Salesperson);
        let call = open_call(&seller, "Acme", t0(), Some(t0() + Duration::minutes(40)));

        // Follow-up remarcado para o mesmo horário da ligação
        f.store.seed_follow_up(CallFollowUp {
            id: Uuid::new_v4(),
            call_id: call.id,
            salesperson_id: seller.id,
            outcome: CallOutcome::NotPicked,
            remark: None,
            follow_up_datetime: call.follow_up_datetime,
            created_at: t0(),
        });
        f.store.seed_call(call);

        let now = t0() + Duration::minutes(26);
        assert_eq!(f.service.run_followup_reminders_at(now).await.unwrap(), 1);
        assert_eq!(f.service.run_followup_reminders_at(now).await.unwrap(), 0);
        assert_eq!(f.service.run_followup_reminders_at(now + Duration::minutes(2)).await.unwrap(), 0);
        assert_eq!(f.transport.delivered().len(), 1);
    }

    #[tokio::test]
    async fn closed_and_past_follow_ups_are_ignored() {
        let f = fixture();
        let seller = f.store.seed_user("Ravi", Role::Salesperson);
        let mut closed = open_call(&seller, "Closed Co", t0(), Some(t0() + Duration::minutes(40)));
        closed.status = CallStatus::Closed;
        closed.completed_at = Some(t0());
        f.store.seed_call(closed);
        f.store.seed_call(open_call(&seller, "Late Co", t0(), Some(t0() + Duration::minutes(20))));

        let sent = f.service.run_followup_reminders_at(t0() + Duration::minutes(25)).await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn failing_recipient_does_not_abort_the_batch() {
        let f = fixture_with(RecordingTransport::failing_for("ravi@example.com"));
        let ravi = f.store.seed_user("Ravi", Role::Salesperson);
        let anya = f.store.seed_user("Anya", Role::Salesperson);
        let follow_up_at = Some(t0() + Duration::minutes(40));
        f.store.seed_call(open_call(&ravi, "Acme", t0(), follow_up_at));
        f.store.seed_call(open_call(&anya, "Globex", t0(), follow_up_at));

        let sent = f.service.run_followup_reminders_at(t0() + Duration::minutes(25)).await.unwrap();

        assert_eq!(sent, 2);
        let delivered = f.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, "anya@example.com");
    }

    #[tokio::test]
    async fn follow_up_rows_drive_their_own_reminders() {
        let f = fixture();
        let ravi = f.store.seed_user("Ravi", Role::Salesperson);
        let boss = f.store.seed_user("Boss", Role::Admin);

        // A ligação em si não tem horário futuro; só a linha de follow-up agenda
        let call = open_call(&ravi, "Acme", t0(), None);
        f.store.seed_follow_up(CallFollowUp {
            id: Uuid::new_v4(),
            call_id: call.id,
            salesperson_id: boss.id,
            outcome: CallOutcome::Busy,
            remark: None,
            follow_up_datetime: Some(t0() + Duration::minutes(140)),
            created_at: t0() + Duration::minutes(100),
        });
        f.store.seed_call(call);

        // Intervalo de 40 min desde o registro do follow-up: antecedência de 15 min
        assert_eq!(f.service.run_followup_reminders_at(t0() + Duration::minutes(112)).await.unwrap(), 0);
        assert_eq!(f.service.run_followup_reminders_at(t0() + Duration::minutes(126)).await.unwrap(), 1);

        let delivered = f.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, "boss@example.com");
        assert!(delivered[0].body.contains("Olá Boss"));
        assert!(delivered[0].body.contains("15 Jun 12:20 PM"));
    }

    #[tokio::test]
    async fn unreadable_recipient_does_not_stop_the_cycle() {
        let f = fixture();
        let anya = f.store.seed_user("Anya", Role::Salesperson);
        let ravi = f.store.seed_user("Ravi", Role::Salesperson);
        let follow_up_at = Some(t0() + Duration::minutes(40));
        f.store.seed_call(open_call(&anya, "Acme", t0(), follow_up_at));
        f.store.seed_call(open_call(&ravi, "Globex", t0(), follow_up_at));
        f.store.make_unavailable(anya.id);

        let reminders = f.service.run_followup_reminders_at(t0() + Duration::minutes(25)).await.unwrap();
        assert_eq!(reminders, 1);

        let summaries = f.service.run_daily_summary_at(t0()).await.unwrap();
        assert_eq!(summaries, 1);

        let recipients: Vec<String> = f.transport.delivered().into_iter().map(|m| m.to).collect();
        assert_eq!(recipients, ["ravi@example.com", "ravi@example.com"]);
    }

    #[tokio::test]
    async fn daily_summary_always_sends() {
        let f = fixture();
        f.store.seed_user("Ravi", Role::Salesperson);
        f.store.seed_user("Boss", Role::Admin);

        let sent = f.service.run_daily_summary_at(t0()).await.unwrap();

        assert_eq!(sent, 1);
        let delivered = f.transport.delivered();
        assert_eq!(delivered[0].to, "ravi@example.com");
        assert!(delivered[0].body.contains("Nenhum lead pendente."));
        assert!(delivered[0].body.contains("Nenhum follow-up pendente."));
    }

    #[tokio::test]
    async fn daily_summary_lists_pending_work_at_current_instant() {
        let f = fixture();
        let seller = f.store.seed_user("Ravi", Role::Salesperson);
        f.store.seed_lead(Lead {
            id: Uuid::new_v4(),
            client_name: "Initech".into(),
            contact_number: "555-0199".into(),
            query_source: None,
            query_product: None,
            region: None,
            salesperson_id: seller.id,
            status: crate::models::lead::LeadStatus::New,
            created_at: t0(),
        });

        let call = open_call(&seller, "Acme", t0(), Some(t0() + Duration::hours(1)));
        f.store.seed_follow_up(CallFollowUp {
            id: Uuid::new_v4(),
            call_id: call.id,
            salesperson_id: seller.id,
            outcome: CallOutcome::Busy,
            remark: None,
            follow_up_datetime: Some(t0() + Duration::hours(8)),
            created_at: t0() + Duration::minutes(5),
        });
        f.store.seed_call(call);

        f.service.run_daily_summary_at(t0()).await.unwrap();

        let body = &f.transport.delivered()[0].body;
        assert!(body.contains("Initech (Unknown)"));
        assert!(body.contains("Acme — 15 Jun 06:00 PM"));
        assert!(!body.contains("11:00 AM"));
    }
}
