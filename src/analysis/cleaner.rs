//! Sheet cleaning.
//!
//! Turns raw string tables into typed records: dates are parsed, numeric
//! gaps are imputed, rows without their required keys are dropped and
//! duplicate user/session identifiers are collapsed to the first row.

use super::aggregator::median;
use crate::error::DataError;
use crate::loader::{RawDataset, RawTable};
use crate::models::columns::*;
use crate::models::{OrderRecord, SessionRecord, Table, UserRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// The three sheets after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedData {
    pub users: Table<UserRecord>,
    pub sessions: Table<SessionRecord>,
    pub orders: Table<OrderRecord>,
}

/// Clean all three sheets. Any malformed sheet halts the run.
pub fn clean(raw: &RawDataset, date_formats: &[String]) -> Result<CleanedData, DataError> {
    let users = clean_users(&raw.users, date_formats)?;
    let sessions = clean_sessions(&raw.sessions, date_formats)?;
    let orders = clean_orders(&raw.orders, date_formats)?;

    info!(
        "Dataset dimensions: UserDetails {}x{}, CookingSessions {}x{}, OrderDetails {}x{}",
        users.len(),
        users.columns.len(),
        sessions.len(),
        sessions.columns.len(),
        orders.len(),
        orders.columns.len()
    );

    Ok(CleanedData {
        users,
        sessions,
        orders,
    })
}

/// Clean the users sheet. Blank ages take the median of the known ages.
pub fn clean_users(raw: &RawTable, date_formats: &[String]) -> Result<Table<UserRecord>, DataError> {
    let user_id = require(raw, USER_ID)?;
    let age = require(raw, AGE)?;
    let registration = require(raw, REGISTRATION_DATE)?;
    let user_name = raw.column_index(USER_NAME);
    let location = raw.column_index(LOCATION);
    let phone = raw.column_index(PHONE);
    let email = raw.column_index(EMAIL);
    let favorite_meal = raw.column_index(FAVORITE_MEAL);
    let total_orders = raw.column_index(TOTAL_ORDERS);

    let mut issues = SoftIssues::default();

    // The median is taken before any row is dropped.
    let ages: Vec<Option<f64>> = raw
        .rows
        .iter()
        .map(|row| number(row, Some(age), AGE, &mut issues))
        .collect();
    let known: Vec<f64> = ages.iter().flatten().copied().collect();
    let median_age = median(&known);
    let imputed = ages.iter().filter(|a| a.is_none()).count();
    if imputed > 0 {
        debug!("{}: imputed {} blank ages with median {:?}", raw.name, imputed, median_age);
    }

    let mut rows = Vec::with_capacity(raw.len());
    let mut seen = HashSet::new();
    let mut dropped = 0;
    let mut duplicates = 0;

    for (i, row) in raw.rows.iter().enumerate() {
        let registration_date = strict_timestamp(raw, row, registration, i, date_formats)?;

        let Some(id) = text(row, Some(user_id)) else {
            dropped += 1;
            continue;
        };
        if !seen.insert(id.clone()) {
            duplicates += 1;
            continue;
        }

        rows.push(UserRecord {
            user_id: id,
            user_name: text(row, user_name),
            age: ages[i].or(median_age),
            location: text(row, location),
            registration_date,
            phone: text(row, phone),
            email: text(row, email),
            favorite_meal: text(row, favorite_meal),
            total_orders: number(row, total_orders, TOTAL_ORDERS, &mut issues),
        });
    }

    issues.report(&raw.name);
    report_dropped(&raw.name, dropped, duplicates);

    Ok(Table::new(known_columns(raw, USER_COLUMNS), rows))
}

/// Clean the cooking sessions sheet. Bad start/end times become null.
pub fn clean_sessions(
    raw: &RawTable,
    date_formats: &[String],
) -> Result<Table<SessionRecord>, DataError> {
    let session_id = require(raw, SESSION_ID)?;
    let user_id = require(raw, USER_ID)?;
    let dish_name = require(raw, DISH_NAME)?;
    let start = require(raw, SESSION_START)?;
    let end = require(raw, SESSION_END)?;
    let duration = require(raw, DURATION)?;
    let meal_type = raw.column_index(MEAL_TYPE);
    let session_rating = raw.column_index(SESSION_RATING);
    let time_of_day = raw.column_index(TIME_OF_DAY);

    let mut issues = SoftIssues::default();
    let mut rows = Vec::with_capacity(raw.len());
    let mut seen = HashSet::new();
    let mut dropped = 0;
    let mut duplicates = 0;

    for row in &raw.rows {
        let session_start = lenient_timestamp(row, start, SESSION_START, date_formats, &mut issues);
        let session_end = lenient_timestamp(row, end, SESSION_END, date_formats, &mut issues);
        let duration_mins = number(row, Some(duration), DURATION, &mut issues)
            .map(|d| d.trunc() as i64)
            .unwrap_or(0);

        let (Some(user), Some(dish)) = (text(row, Some(user_id)), text(row, Some(dish_name))) else {
            dropped += 1;
            continue;
        };

        let id = text(row, Some(session_id));
        if let Some(ref id) = id {
            if !seen.insert(id.clone()) {
                duplicates += 1;
                continue;
            }
        }

        rows.push(SessionRecord {
            session_id: id,
            user_id: user,
            dish_name: dish,
            meal_type: text(row, meal_type),
            session_start,
            session_end,
            duration_mins,
            session_rating: number(row, session_rating, SESSION_RATING, &mut issues),
            time_of_day: text(row, time_of_day),
        });
    }

    issues.report(&raw.name);
    report_dropped(&raw.name, dropped, duplicates);

    Ok(Table::new(known_columns(raw, SESSION_COLUMNS), rows))
}

/// Clean the orders sheet. Blank amounts become 0.0.
pub fn clean_orders(raw: &RawTable, date_formats: &[String]) -> Result<Table<OrderRecord>, DataError> {
    let order_id = require(raw, ORDER_ID)?;
    let user_id = require(raw, USER_ID)?;
    let session_id = require(raw, SESSION_ID)?;
    let order_date = require(raw, ORDER_DATE)?;
    let amount = require(raw, AMOUNT)?;
    let order_status = raw.column_index(ORDER_STATUS);
    let rating = raw.column_index(RATING);
    let meal_type = raw.column_index(MEAL_TYPE);
    let dish_name = raw.column_index(DISH_NAME);
    let time_of_day = raw.column_index(TIME_OF_DAY);

    let mut issues = SoftIssues::default();
    let mut rows = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for (i, row) in raw.rows.iter().enumerate() {
        let date = strict_timestamp(raw, row, order_date, i, date_formats)?;
        let amount_usd = number(row, Some(amount), AMOUNT, &mut issues).unwrap_or(0.0);

        let (Some(user), Some(id)) = (text(row, Some(user_id)), text(row, Some(order_id))) else {
            dropped += 1;
            continue;
        };

        rows.push(OrderRecord {
            order_id: id,
            user_id: user,
            order_date: date,
            session_id: text(row, Some(session_id)),
            amount_usd,
            order_status: text(row, order_status),
            rating: number(row, rating, RATING, &mut issues),
            meal_type: text(row, meal_type),
            dish_name: text(row, dish_name),
            time_of_day: text(row, time_of_day),
        });
    }

    issues.report(&raw.name);
    report_dropped(&raw.name, dropped, 0);

    Ok(Table::new(known_columns(raw, ORDER_COLUMNS), rows))
}

/// Parse a timestamp: RFC 3339 first, then each format as a date-time,
/// then each format as a bare date at midnight.
pub fn parse_timestamp(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn require(raw: &RawTable, column: &str) -> Result<usize, DataError> {
    raw.column_index(column).ok_or_else(|| DataError::MissingColumn {
        table: raw.name.clone(),
        column: column.to_string(),
    })
}

/// Columns of the sheet the typed record models, in sheet order.
fn known_columns(raw: &RawTable, known: &[&str]) -> Vec<String> {
    raw.headers
        .iter()
        .filter(|h| known.contains(&h.as_str()))
        .cloned()
        .collect()
}

fn text(row: &[Option<String>], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i)).and_then(|cell| cell.clone())
}

fn number(
    row: &[Option<String>],
    idx: Option<usize>,
    column: &'static str,
    issues: &mut SoftIssues,
) -> Option<f64> {
    let value = text(row, idx)?;
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            issues.note(column);
            None
        }
    }
}

fn strict_timestamp(
    raw: &RawTable,
    row: &[Option<String>],
    idx: usize,
    row_index: usize,
    formats: &[String],
) -> Result<Option<NaiveDateTime>, DataError> {
    let Some(value) = text(row, Some(idx)) else {
        return Ok(None);
    };

    parse_timestamp(&value, formats)
        .map(Some)
        .ok_or_else(|| DataError::UnparseableValue {
            table: raw.name.clone(),
            column: raw.headers[idx].clone(),
            row: row_index + 1,
            value,
        })
}

fn lenient_timestamp(
    row: &[Option<String>],
    idx: usize,
    column: &'static str,
    formats: &[String],
    issues: &mut SoftIssues,
) -> Option<NaiveDateTime> {
    let value = text(row, Some(idx))?;
    let parsed = parse_timestamp(&value, formats);
    if parsed.is_none() {
        issues.note(column);
    }
    parsed
}

/// Per-column tally of values that could not be parsed and were nulled.
#[derive(Default)]
struct SoftIssues {
    counts: BTreeMap<&'static str, usize>,
}

impl SoftIssues {
    fn note(&mut self, column: &'static str) {
        *self.counts.entry(column).or_default() += 1;
    }

    fn report(&self, table: &str) {
        for (column, count) in &self.counts {
            warn!(
                "{}: {} unparseable value(s) in `{}` treated as missing",
                table, count, column
            );
        }
    }
}

fn report_dropped(table: &str, dropped: usize, duplicates: usize) {
    if dropped > 0 {
        warn!("{}: dropped {} row(s) missing a required key", table, dropped);
    }
    if duplicates > 0 {
        warn!("{}: dropped {} row(s) with a duplicate identifier", table, duplicates);
    }
}
