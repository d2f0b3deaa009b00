//! Business insight extraction.
//!
//! Each category scans one analysis view for its extremal row and formats
//! the figures behind it. A category that cannot be derived is reported
//! as a failure and the remaining categories still run.

use super::aggregator::median;
use crate::error::InsightError;
use crate::models::columns::*;
use crate::models::{AnalysisResult, Insight, InsightFailure, InsightReport, Stat, SummaryRow, SummaryTable};
use tracing::{debug, warn};

pub const REVENUE: &str = "Revenue Insights";
pub const DEMOGRAPHICS: &str = "Customer Demographics";
pub const OPERATIONS: &str = "Operational Insights";
pub const LOCATIONS: &str = "Location Performance";
pub const SESSIONS: &str = "Session Insights";
pub const MENU: &str = "Menu Optimization";

/// Most dishes named in the menu optimization finding.
const MAX_LOW_PERFORMERS: usize = 3;

type Extractor = fn(&AnalysisResult) -> Result<Insight, InsightError>;

const EXTRACTORS: [(&str, Extractor); 6] = [
    (REVENUE, revenue_insight),
    (DEMOGRAPHICS, demographics_insight),
    (OPERATIONS, operations_insight),
    (LOCATIONS, location_insight),
    (SESSIONS, session_insight),
    (MENU, menu_insight),
];

/// Derive every insight category in order.
pub fn extract(result: &AnalysisResult) -> InsightReport {
    let mut report = InsightReport::default();

    for (category, extractor) in EXTRACTORS {
        match extractor(result) {
            Ok(insight) => {
                debug!("{}: {}", category, insight.key_finding);
                report.insights.push(insight);
            }
            Err(error) => {
                warn!("{}: {}", category, error);
                report.failures.push(InsightFailure {
                    category: category.to_string(),
                    error,
                });
            }
        }
    }

    report
}

/// Meal type with the highest revenue.
fn revenue_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let table = &result.meal_analysis;
    let top = idxmax(table, AMOUNT, Stat::Sum)?;

    Ok(Insight::new(REVENUE, format!("Top performing meal type: {}", top.key))
        .with_metric("Total Revenue", currency(cell(table, top, AMOUNT, Stat::Sum)))
        .with_metric("Average Order Value", currency(cell(table, top, AMOUNT, Stat::Mean)))
        .with_metric("Average Rating", rating(cell(table, top, RATING, Stat::Mean))))
}

/// Age group whose users order the most on average.
fn demographics_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let table = &result.age_analysis;
    let top = idxmax(table, TOTAL_ORDERS, Stat::Mean)?;

    Ok(Insight::new(DEMOGRAPHICS, format!("Most active age group: {}", top.key))
        .with_metric("Average orders", fixed(cell(table, top, TOTAL_ORDERS, Stat::Mean), 1))
        .with_metric(
            "Average session rating",
            rating(cell(table, top, SESSION_RATING, Stat::Mean)),
        ))
}

/// Time of day with the most orders.
fn operations_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let table = &result.time_analysis;
    let top = idxmax(table, ORDER_ID, Stat::Count)?;

    Ok(Insight::new(OPERATIONS, format!("Peak ordering time: {}", top.key))
        .with_metric("Average order value", currency(cell(table, top, AMOUNT, Stat::Mean)))
        .with_metric("Average rating", rating(cell(table, top, RATING, Stat::Mean))))
}

/// Location with the most orders in total.
fn location_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let table = &result.location_metrics;
    let top = idxmax(table, TOTAL_ORDERS, Stat::Sum)?;

    Ok(Insight::new(LOCATIONS, format!("Top performing location: {}", top.key))
        .with_metric("Total orders", whole(cell(table, top, TOTAL_ORDERS, Stat::Sum)))
        .with_metric(
            "Average rating",
            rating(cell(table, top, SESSION_RATING, Stat::Mean)),
        ))
}

fn session_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let metrics = &result.session_metrics;
    let duration = metrics.avg_session_duration.ok_or_else(|| InsightError::NoData {
        table: "session_metrics".to_string(),
        column: DURATION.to_string(),
    })?;

    Ok(Insight::new(
        SESSIONS,
        format!("Average session duration: {:.1} minutes", duration),
    )
    .with_metric("Average session duration", format!("{:.1} minutes", duration))
    .with_metric("Average session rating", rating(metrics.avg_session_rating))
    .with_metric("Average orders per user", fixed(metrics.avg_orders_per_user, 1))
    .with_metric("Total unique users", metrics.total_unique_users.to_string()))
}

/// Dishes rated and ordered below the median of all dishes.
fn menu_insight(result: &AnalysisResult) -> Result<Insight, InsightError> {
    let table = &result.dish_analysis;
    let rating_idx = require(table, RATING, Stat::Mean)?;
    let count_idx = require(table, ORDER_ID, Stat::Count)?;

    let median_of = |idx: usize| {
        let values: Vec<f64> = table.rows.iter().filter_map(|r| r.values[idx]).collect();
        median(&values)
    };
    let median_rating = median_of(rating_idx);
    let median_count = median_of(count_idx);

    let below = |value: Option<f64>, threshold: Option<f64>| match (value, threshold) {
        (Some(v), Some(t)) => v < t,
        _ => false,
    };
    let low: Vec<&SummaryRow> = table
        .rows
        .iter()
        .filter(|r| below(r.values[rating_idx], median_rating) && below(r.values[count_idx], median_count))
        .collect();

    let finding = if low.is_empty() {
        "No low-performing dishes were identified.".to_string()
    } else {
        let names: Vec<&str> = low
            .iter()
            .take(MAX_LOW_PERFORMERS)
            .map(|r| r.key.as_str())
            .collect();
        format!("Consider reviewing these low-performing dishes: {}", names.join(", "))
    };

    Ok(Insight::new(MENU, finding)
        .with_metric("Median dish rating", rating(median_rating))
        .with_metric("Median orders per dish", fixed(median_count, 1))
        .with_metric("Low-performing dishes", low.len().to_string()))
}

/// Row with the largest value in a column; the first row wins a tie.
pub fn idxmax<'a>(table: &'a SummaryTable, source: &str, stat: Stat) -> Result<&'a SummaryRow, InsightError> {
    let idx = require(table, source, stat)?;

    let mut best: Option<(&SummaryRow, f64)> = None;
    for row in &table.rows {
        if let Some(value) = row.values[idx] {
            if best.map_or(true, |(_, current)| value > current) {
                best = Some((row, value));
            }
        }
    }

    best.map(|(row, _)| row).ok_or_else(|| InsightError::NoData {
        table: table.name.clone(),
        column: format!("{} {}", source, stat),
    })
}

fn require(table: &SummaryTable, source: &str, stat: Stat) -> Result<usize, InsightError> {
    table
        .column_index(source, stat)
        .ok_or_else(|| InsightError::MissingDependency {
            table: table.name.clone(),
            column: format!("{} {}", source, stat),
        })
}

/// A supporting figure for a row already located in `table`; `None` when
/// the table lacks the column or the group has no value.
fn cell(table: &SummaryTable, row: &SummaryRow, source: &str, stat: Stat) -> Option<f64> {
    table.column_index(source, stat).and_then(|idx| row.values[idx])
}

/// `$1,234.56`
pub fn currency(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${}", group_thousands(&format!("{:.2}", v))),
        None => "n/a".to_string(),
    }
}

/// `4.3/5`
pub fn rating(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}/5", v),
        None => "n/a".to_string(),
    }
}

fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

fn whole(value: Option<f64>) -> String {
    match value {
        Some(v) => group_thousands(&format!("{:.0}", v)),
        None => "n/a".to_string(),
    }
}

/// Insert thousands separators into the integer part of a formatted number.
fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
