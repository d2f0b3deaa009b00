//! Analysis pipeline.
//!
//! Cleans the raw sheets, joins them into the two analysis views,
//! computes the grouped summaries and derives insights from them.

pub mod aggregator;
pub mod cleaner;
pub mod insights;
pub mod merger;

use crate::error::DataError;
use crate::loader::RawDataset;
use crate::models::{AnalysisResult, DatasetCounts, InsightReport};
use tracing::info;

/// Everything one run of the pipeline produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub counts: DatasetCounts,
    pub result: AnalysisResult,
    pub insights: InsightReport,
}

/// Run the whole pipeline over a loaded dataset.
pub fn run(raw: &RawDataset, date_formats: &[String]) -> Result<Analysis, DataError> {
    let cleaned = cleaner::clean(raw, date_formats)?;
    let (user_sessions, session_orders) =
        merger::merge(&cleaned.users, &cleaned.sessions, &cleaned.orders);

    let counts = DatasetCounts {
        users: cleaned.users.len(),
        sessions: cleaned.sessions.len(),
        orders: cleaned.orders.len(),
        user_sessions: user_sessions.len(),
        session_orders: session_orders.len(),
    };

    let result = aggregator::aggregate(&user_sessions, &session_orders);
    let insights = insights::extract(&result);

    info!(
        "Derived {} insight(s), {} categor{} failed",
        insights.insights.len(),
        insights.failures.len(),
        if insights.failures.len() == 1 { "y" } else { "ies" }
    );

    Ok(Analysis {
        counts,
        result,
        insights,
    })
}
