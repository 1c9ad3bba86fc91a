// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{FixedOffset, NaiveTime};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{PgSalesStore, SalesStore},
    services::{
        auth::AuthService,
        call_service::CallService,
        dashboard_service::DashboardService,
        mailer::{LogTransport, Mailer},
        reminder_service::ReminderService,
    },
};

/// Admin criado na inicialização, se configurado.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    // Fuso fixo usado para "dia"/"mês" e para formatar horários nos e-mails
    pub utc_offset: FixedOffset,
    pub reminder_poll: Duration,
    pub reminder_window: chrono::Duration,
    pub daily_summary_at: NaiveTime,
    pub mail_from: String,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        // Vazio conta como ausente
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{} deve ser definida", key));

        let utc_offset = var("APP_UTC_OFFSET").unwrap_or_else(|| "+05:30".into());
        let utc_offset = FixedOffset::from_str(&utc_offset)
            .map_err(|e| anyhow!("APP_UTC_OFFSET inválido ({}): {}", utc_offset, e))?;

        let poll_minutes = parse_minutes(var("REMINDER_POLL_MINUTES"), 5).context("REMINDER_POLL_MINUTES inválido")?;
        let window_minutes =
            parse_minutes(var("REMINDER_WINDOW_MINUTES"), 5).context("REMINDER_WINDOW_MINUTES inválido")?;
        if poll_minutes > window_minutes {
            tracing::warn!(
                "⚠️ Intervalo de verificação ({} min) maior que a janela ({} min): lembretes podem ser perdidos",
                poll_minutes,
                window_minutes
            );
        }

        let summary_at = var("DAILY_SUMMARY_AT").unwrap_or_else(|| "20:00".into());
        let daily_summary_at = NaiveTime::parse_from_str(&summary_at, "%H:%M")
            .with_context(|| format!("DAILY_SUMMARY_AT inválido: {}", summary_at))?;

        let bootstrap_admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                name: var("ADMIN_NAME").unwrap_or_else(|| "Admin".into()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            utc_offset,
            reminder_poll: Duration::from_secs(poll_minutes * 60),
            reminder_window: chrono::Duration::minutes(window_minutes as i64),
            daily_summary_at,
            mail_from: var("MAIL_FROM").unwrap_or_else(|| "Sales Desk <no-reply@salesdesk.local>".into()),
            bootstrap_admin,
        })
    }
}

fn parse_minutes(raw: Option<String>, default: u64) -> anyhow::Result<u64> {
    match raw {
        None => Ok(default),
        Some(text) => {
            let minutes: u64 = text.parse()?;
            if minutes == 0 {
                return Err(anyhow!("deve ser maior que zero"));
            }
            Ok(minutes)
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub call_service: CallService,
    pub dashboard_service: DashboardService,
    pub reminder_service: ReminderService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn SalesStore> = Arc::new(PgSalesStore::new(db_pool.clone()));
        let mailer = Arc::new(Mailer::new(config.mail_from.clone(), Arc::new(LogTransport)));

        Ok(Self {
            auth_service: AuthService::new(store.clone(), config.jwt_secret.clone()),
            call_service: CallService::new(store.clone()),
            dashboard_service: DashboardService::new(store.clone(), config.utc_offset),
            reminder_service: ReminderService::new(
                store.clone(),
                mailer,
                config.reminder_window,
                config.utc_offset,
            ),
            db_pool,
        })
    }
}
