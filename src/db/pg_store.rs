// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ActivityScope, CallFilter, FollowUpFilter, LeadFilter, SalesStore},
    models::{
        auth::{NewUser, Role, User},
        call::{CallFollowUp, CallLog, CallStatus, CallTransition, JoinedFollowUp, NewCallLog, NewFollowUp},
        dashboard::ActivityCounts,
        lead::{Lead, LeadSource, LeadStatus, NewLead},
    },
};

// Índice parcial que garante uma única primeira ligação por lead (ver migrations/)
const FIRST_CALL_INDEX: &str = "idx_call_logs_lead_id";

// Implementação do SalesStore sobre PostgreSQL
#[derive(Clone)]
pub struct PgSalesStore {
    pool: PgPool,
}

impl PgSalesStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =========================================================================
//  HELPERS (aceitam pool ou transação)
// =========================================================================

async fn insert_lead_with<'e, E>(executor: E, lead: &NewLead) -> Result<Lead, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let lead = sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads (
            id, client_name, contact_number, query_source, query_product, region,
            salesperson_id, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&lead.client_name)
    .bind(&lead.contact_number)
    .bind(&lead.query_source)
    .bind(&lead.query_product)
    .bind(&lead.region)
    .bind(lead.salesperson_id)
    .bind(lead.status)
    .fetch_one(executor)
    .await?;

    Ok(lead)
}

// Bloqueia a linha da ligação até o fim da transação
async fn lock_call_with<'e, E>(executor: E, call_id: Uuid) -> Result<CallLog, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, CallLog>("SELECT * FROM call_logs WHERE id = $1 FOR UPDATE")
        .bind(call_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Ligação"))
}

async fn update_call_with<'e, E>(executor: E, transition: &CallTransition) -> Result<CallLog, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let call = sqlx::query_as::<_, CallLog>(
        r#"
        UPDATE call_logs
        SET call_outcome = $2,
            remark = $3,
            status = $4,
            follow_up_datetime = $5,
            completed_at = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(transition.call_id)
    .bind(&transition.call_outcome)
    .bind(&transition.remark)
    .bind(transition.status)
    .bind(transition.follow_up_datetime)
    .bind(transition.completed_at)
    .fetch_optional(executor)
    .await?
    .ok_or(AppError::NotFound("Ligação"))?;

    Ok(call)
}

async fn close_lead_with<'e, E>(executor: E, transition: &CallTransition) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    if let (CallStatus::Closed, Some(lead_id)) = (transition.status, transition.lead_id) {
        sqlx::query("UPDATE leads SET status = 'CLOSED' WHERE id = $1")
            .bind(lead_id)
            .execute(executor)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl SalesStore for PgSalesStore {
    // =========================================================================
    //  USUÁRIOS
    // =========================================================================

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Converte violação de chave única em um erro mais amigável
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::EmailAlreadyExists;
                }
            }
            e.into()
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY name ASC")
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    // =========================================================================
    //  LEADS
    // =========================================================================

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        insert_lead_with(&self.pool, &lead).await
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn find_lead_by_contact(
        &self,
        contact_number: &str,
        salesperson_id: Uuid,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.* FROM leads l
            WHERE l.contact_number = $1 AND l.salesperson_id = $2
            ORDER BY
                EXISTS (SELECT 1 FROM call_logs c WHERE c.lead_id = l.id) ASC,
                l.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_number)
        .bind(salesperson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::uuid IS NULL OR salesperson_id = $1)
              AND (cardinality($2::lead_status[]) = 0 OR status = ANY($2))
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.salesperson_id)
        .bind(filter.statuses.clone())
        .bind(filter.range.start)
        .bind(filter.range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    // =========================================================================
    //  LIGAÇÕES
    // =========================================================================

    async fn find_call(&self, id: Uuid) -> Result<Option<CallLog>, AppError> {
        let call = sqlx::query_as::<_, CallLog>("SELECT * FROM call_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(call)
    }

    async fn find_call_by_lead(&self, lead_id: Uuid) -> Result<Option<CallLog>, AppError> {
        let call = sqlx::query_as::<_, CallLog>("SELECT * FROM call_logs WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(call)
    }

    async fn list_calls(&self, filter: &CallFilter) -> Result<Vec<CallLog>, AppError> {
        let calls = sqlx::query_as::<_, CallLog>(
            r#"
            SELECT * FROM call_logs
            WHERE ($1::uuid IS NULL OR salesperson_id = $1)
              AND ($2::call_status IS NULL OR status = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
              AND ($5::timestamptz IS NULL OR follow_up_datetime > $5)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.salesperson_id)
        .bind(filter.status)
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.follow_up_after)
        .fetch_all(&self.pool)
        .await?;
        Ok(calls)
    }

    async fn record_first_call(
        &self,
        lead: LeadSource,
        call: NewCallLog,
        lead_status: LeadStatus,
    ) -> Result<(Lead, CallLog), AppError> {
        // --- INÍCIO DA TRANSAÇÃO ---
        let mut tx = self.pool.begin().await?;

        let lead = match lead {
            LeadSource::Existing(lead) => lead,
            LeadSource::New(new_lead) => insert_lead_with(&mut *tx, &new_lead).await?,
        };

        let lead_id = lead.id;
        let call = sqlx::query_as::<_, CallLog>(
            r#"
            INSERT INTO call_logs (
                id, call_code, lead_id, salesperson_id,
                client_name, contact_number, query_source, query_product, region,
                call_outcome, remark, status, follow_up_datetime, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&call.call_code)
        .bind(lead_id)
        .bind(call.salesperson_id)
        .bind(&call.client_name)
        .bind(&call.contact_number)
        .bind(&call.query_source)
        .bind(&call.query_product)
        .bind(&call.region)
        .bind(&call.call_outcome)
        .bind(&call.remark)
        .bind(call.status)
        .bind(call.follow_up_datetime)
        .bind(call.completed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some(FIRST_CALL_INDEX) {
                    return AppError::DuplicateFirstCall { lead_id };
                }
            }
            e.into()
        })?;

        let lead = sqlx::query_as::<_, Lead>("UPDATE leads SET status = $2 WHERE id = $1 RETURNING *")
            .bind(lead_id)
            .bind(lead_status)
            .fetch_one(&mut *tx)
            .await?;

        // Se falhar antes daqui, o drop da transação faz o rollback
        tx.commit().await?;
        // --- FIM DA TRANSAÇÃO ---

        Ok((lead, call))
    }

    async fn record_follow_up(
        &self,
        follow_up: NewFollowUp,
        transition: &CallTransition,
    ) -> Result<(CallFollowUp, CallLog), AppError> {
        let mut tx = self.pool.begin().await?;

        // Outro follow-up pode ter encerrado a ligação depois da leitura do serviço
        let current = lock_call_with(&mut *tx, transition.call_id).await?;
        if !current.is_open() {
            return Err(AppError::CallClosed(current.id));
        }

        let follow_up = sqlx::query_as::<_, CallFollowUp>(
            r#"
            INSERT INTO call_follow_ups (
                id, call_id, salesperson_id, outcome, remark, follow_up_datetime
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(follow_up.call_id)
        .bind(follow_up.salesperson_id)
        .bind(&follow_up.outcome)
        .bind(&follow_up.remark)
        .bind(follow_up.follow_up_datetime)
        .fetch_one(&mut *tx)
        .await?;

        let call = update_call_with(&mut *tx, transition).await?;
        close_lead_with(&mut *tx, transition).await?;

        tx.commit().await?;

        Ok((follow_up, call))
    }

    async fn apply_call_transition(&self, transition: &CallTransition) -> Result<CallLog, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_call_with(&mut *tx, transition.call_id).await?;
        let transition = transition.over(&current);

        let call = update_call_with(&mut *tx, &transition).await?;
        close_lead_with(&mut *tx, &transition).await?;

        tx.commit().await?;

        Ok(call)
    }

    // =========================================================================
    //  FOLLOW-UPS
    // =========================================================================

    async fn list_follow_ups(&self, filter: &FollowUpFilter) -> Result<Vec<JoinedFollowUp>, AppError> {
        let rows = sqlx::query_as::<_, JoinedFollowUp>(
            r#"
            SELECT
                f.*,
                c.client_name,
                c.salesperson_id AS call_salesperson_id,
                c.status AS call_status
            FROM call_follow_ups f
            INNER JOIN call_logs c ON c.id = f.call_id
            WHERE ($1::uuid IS NULL OR f.call_id = $1)
              AND ($2::uuid IS NULL OR f.salesperson_id = $2)
              AND ($3::uuid IS NULL OR c.salesperson_id = $3)
              AND ($4::call_status IS NULL OR c.status = $4)
              AND ($5::timestamptz IS NULL OR f.created_at >= $5)
              AND ($6::timestamptz IS NULL OR f.created_at <= $6)
              AND ($7::timestamptz IS NULL OR f.follow_up_datetime > $7)
            ORDER BY f.created_at ASC
            "#,
        )
        .bind(filter.call_id)
        .bind(filter.salesperson_id)
        .bind(filter.call_salesperson_id)
        .bind(filter.call_status)
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.follow_up_after)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    //  RELATÓRIOS
    // =========================================================================

    async fn count_activity(
        &self,
        scope: &ActivityScope,
        now: DateTime<Utc>,
    ) -> Result<ActivityCounts, AppError> {
        // Snapshot consistente das três tabelas
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let (total_leads, new_leads, called_leads): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'NEW'),
                COUNT(*) FILTER (WHERE status = 'CALLED')
            FROM leads
            WHERE ($1::uuid IS NULL OR salesperson_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(scope.salesperson_id)
        .bind(scope.range.start)
        .bind(scope.range.end)
        .fetch_one(&mut *tx)
        .await?;

        let (total_calls, closed_calls, purchased_calls, pending_follow_ups): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'CLOSED'),
                    COUNT(*) FILTER (WHERE call_outcome = 'Purchased'),
                    COUNT(*) FILTER (
                        WHERE status = 'OPEN'
                          AND follow_up_datetime IS NOT NULL
                          AND follow_up_datetime <= $4
                    )
                FROM call_logs
                WHERE ($1::uuid IS NULL OR salesperson_id = $1)
                  AND ($2::timestamptz IS NULL OR created_at >= $2)
                  AND ($3::timestamptz IS NULL OR created_at <= $3)
                "#,
            )
            .bind(scope.salesperson_id)
            .bind(scope.range.start)
            .bind(scope.range.end)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let (purchased_follow_ups,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM call_follow_ups
            WHERE outcome = 'Purchased'
              AND ($1::uuid IS NULL OR salesperson_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(scope.salesperson_id)
        .bind(scope.range.start)
        .bind(scope.range.end)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ActivityCounts {
            total_leads,
            new_leads,
            called_leads,
            total_calls,
            closed_calls,
            purchased_calls,
            purchased_follow_ups,
            pending_follow_ups,
        })
    }

    // =========================================================================
    //  LEMBRETES
    // =========================================================================

    async fn claim_reminder(
        &self,
        call_id: Uuid,
        follow_up_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminder_deliveries (call_id, follow_up_at, sent_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (call_id, follow_up_at) DO NOTHING
            "#,
        )
        .bind(call_id)
        .bind(follow_up_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
