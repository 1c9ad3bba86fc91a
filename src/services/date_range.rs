// src/services/date_range.rs

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{
    common::error::AppError,
    models::dashboard::{DateRange, RangeParams},
};

/// Converte os parâmetros opcionais de período em um intervalo concreto.
///
/// A primeira regra que casar vence:
/// 1. `single_date` → o dia inteiro;
/// 2. `month` (YYYY-MM) → o mês inteiro;
/// 3. `from_date` / `to_date` → cada lado independente;
/// 4. `span` (`today`, `week`, `month`) → até `now`;
/// 5. nada → sem limites.
///
/// Dias e meses são do calendário local de `offset`. Strings vazias contam como ausentes.
pub fn resolve_date_range(
    params: &RangeParams,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<DateRange, AppError> {
    if let Some(raw) = present(&params.single_date) {
        let day = parse_day("single_date", raw)?;
        return Ok(DateRange {
            start: Some(to_utc(start_of_day(day), offset)),
            end: Some(to_utc(end_of_day(day), offset)),
        });
    }

    if let Some(raw) = present(&params.month) {
        let first = parse_month(raw)?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| date_error("month", raw))?;
        return Ok(DateRange {
            start: Some(to_utc(start_of_day(first), offset)),
            end: Some(to_utc(start_of_day(next) - Duration::microseconds(1), offset)),
        });
    }

    let start = present(&params.from_date)
        .map(|raw| parse_day("from_date", raw).map(|day| to_utc(start_of_day(day), offset)))
        .transpose()?;
    let end = present(&params.to_date)
        .map(|raw| parse_day("to_date", raw).map(|day| to_utc(end_of_day(day), offset)))
        .transpose()?;
    if start.is_some() || end.is_some() {
        return Ok(DateRange { start, end });
    }

    let local_now = now.with_timezone(&offset).naive_local();
    let span_start = match present(&params.span) {
        Some("today") => Some(to_utc(start_of_day(local_now.date()), offset)),
        Some("week") => Some(now - Duration::days(7)),
        Some("month") => local_now
            .date()
            .with_day(1)
            .map(|first| to_utc(start_of_day(first), offset)),
        Some(other) => {
            tracing::debug!("Período '{}' desconhecido, usando todo o histórico", other);
            None
        }
        None => None,
    };

    Ok(match span_start {
        Some(start) => DateRange { start: Some(start), end: Some(now) },
        None => DateRange::ALL_TIME,
    })
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_day(field: &'static str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| date_error(field, raw))
}

fn parse_month(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").map_err(|_| date_error("month", raw))
}

fn date_error(field: &'static str, raw: &str) -> AppError {
    AppError::DateParse { field, value: raw.to_string() }
}

fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

// 23:59:59.999999
fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    start_of_day(day) + Duration::days(1) - Duration::microseconds(1)
}

/// Horário local (no `offset`) para UTC.
pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}
