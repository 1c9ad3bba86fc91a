// src/jobs.rs
//
// Gatilhos periódicos do agendador. Os serviços não guardam estado de timer.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use tokio::sync::watch;

use crate::services::{date_range::to_utc, reminder_service::ReminderService};

/// Próxima ocorrência de `at` (horário local em `offset`) estritamente depois de `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset).naive_local();
    let today = local_now.date().and_time(at);
    let next = if today > local_now { today } else { today + chrono::Duration::days(1) };
    to_utc(next, offset)
}

/// Sobe as duas tarefas (lembretes e resumo diário). Enviar `true` no canal encerra ambas.
pub fn spawn_scheduler(
    service: ReminderService,
    poll: Duration,
    summary_at: NaiveTime,
    offset: FixedOffset,
) -> watch::Sender<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(reminder_loop(service.clone(), poll, shutdown_rx.clone()));
    tokio::spawn(daily_summary_loop(service, summary_at, offset, shutdown_rx));

    shutdown_tx
}

// Cada ciclo termina antes do próximo tick: nunca há dois ciclos simultâneos
async fn reminder_loop(service: ReminderService, poll: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval_timer = tokio::time::interval(poll);
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval_timer.tick() => {
                match service.run_followup_reminders().await {
                    Ok(0) => {}
                    Ok(attempted) => tracing::info!("⏰ {} lembretes de follow-up processados", attempted),
                    Err(e) => tracing::error!("🔥 Falha no ciclo de lembretes: {}", e),
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Agendador de lembretes encerrado");
                    break;
                }
            }
        }
    }
}

async fn daily_summary_loop(
    service: ReminderService,
    at: NaiveTime,
    offset: FixedOffset,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let next = next_daily_run(now, at, offset);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!("📬 Próximo resumo diário em {}", next);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = service.run_daily_summary().await {
                    tracing::error!("🔥 Falha no resumo diário: {}", e);
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Agendador do resumo diário encerrado");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn eight_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(20, 0, 0).unwrap()
    }

    #[rstest]
    // 10:00 UTC = 15:30 IST → hoje às 20:00 IST (14:30 UTC)
    #[case(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(), Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap())]
    // Exatamente 20:00 IST → amanhã
    #[case(Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap(), Utc.with_ymd_and_hms(2024, 6, 16, 14, 30, 0).unwrap())]
    // 20:00 UTC = 01:30 IST do dia 16 → 20:00 IST do dia 16
    #[case(Utc.with_ymd_and_hms(2024, 6, 15, 20, 0, 0).unwrap(), Utc.with_ymd_and_hms(2024, 6, 16, 14, 30, 0).unwrap())]
    fn next_run_is_the_next_local_occurrence(#[case] now: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        assert_eq!(next_daily_run(now, eight_pm(), ist()), expected);
    }

    #[test]
    fn month_rollover_is_handled() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            next_daily_run(now, eight_pm(), utc),
            Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap()
        );
    }
}
