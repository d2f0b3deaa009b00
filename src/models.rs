//! Data models for the session analytics pipeline.
//!
//! This module contains the typed records for the three source sheets,
//! the joined views built from them, and the summary tables, insights
//! and report structures produced downstream.

use crate::error::InsightError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names as they appear in the exported sheets.
pub mod columns {
    pub const USER_ID: &str = "User ID";
    pub const USER_NAME: &str = "User Name";
    pub const AGE: &str = "Age";
    pub const LOCATION: &str = "Location";
    pub const REGISTRATION_DATE: &str = "Registration Date";
    pub const PHONE: &str = "Phone";
    pub const EMAIL: &str = "Email";
    pub const FAVORITE_MEAL: &str = "Favorite Meal";
    pub const TOTAL_ORDERS: &str = "Total Orders";

    pub const SESSION_ID: &str = "Session ID";
    pub const DISH_NAME: &str = "Dish Name";
    pub const MEAL_TYPE: &str = "Meal Type";
    pub const SESSION_START: &str = "Session Start";
    pub const SESSION_END: &str = "Session End";
    pub const DURATION: &str = "Duration (mins)";
    pub const SESSION_RATING: &str = "Session Rating";
    pub const TIME_OF_DAY: &str = "Time of Day";

    pub const ORDER_ID: &str = "Order ID";
    pub const ORDER_DATE: &str = "Order Date";
    pub const ORDER_STATUS: &str = "Order Status";
    pub const AMOUNT: &str = "Amount (USD)";
    pub const RATING: &str = "Rating";

    /// Derived column, never present in a sheet.
    pub const AGE_GROUP: &str = "Age Group";

    pub const USER_COLUMNS: &[&str] = &[
        USER_ID,
        USER_NAME,
        AGE,
        LOCATION,
        REGISTRATION_DATE,
        PHONE,
        EMAIL,
        FAVORITE_MEAL,
        TOTAL_ORDERS,
    ];

    pub const SESSION_COLUMNS: &[&str] = &[
        SESSION_ID,
        USER_ID,
        DISH_NAME,
        MEAL_TYPE,
        SESSION_START,
        SESSION_END,
        DURATION,
        SESSION_RATING,
        TIME_OF_DAY,
    ];

    pub const ORDER_COLUMNS: &[&str] = &[
        ORDER_ID,
        USER_ID,
        ORDER_DATE,
        MEAL_TYPE,
        DISH_NAME,
        ORDER_STATUS,
        AMOUNT,
        TIME_OF_DAY,
        RATING,
        SESSION_ID,
    ];
}

/// Typed rows together with the column names the source sheet provided.
///
/// Optional columns missing from a sheet are missing from `columns`, so a
/// summary built downstream can tell "absent" apart from "all null".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table<R> {
    pub columns: Vec<String>,
    pub rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(columns: Vec<String>, rows: Vec<R>) -> Self {
        Self { columns, rows }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row of the `UserDetails` sheet after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub user_id: String,
    pub user_name: Option<String>,
    /// Imputed with the sheet median when blank.
    pub age: Option<f64>,
    pub location: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub favorite_meal: Option<String>,
    pub total_orders: Option<f64>,
}

/// A row of the `CookingSessions` sheet after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: Option<String>,
    pub user_id: String,
    pub dish_name: String,
    pub meal_type: Option<String>,
    pub session_start: Option<NaiveDateTime>,
    pub session_end: Option<NaiveDateTime>,
    /// Whole minutes; blank durations become 0.
    pub duration_mins: i64,
    pub session_rating: Option<f64>,
    pub time_of_day: Option<String>,
}

/// A row of the `OrderDetails` sheet after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub user_id: String,
    pub order_date: Option<NaiveDateTime>,
    pub session_id: Option<String>,
    /// Blank amounts become 0.0.
    pub amount_usd: f64,
    pub order_status: Option<String>,
    pub rating: Option<f64>,
    pub meal_type: Option<String>,
    pub dish_name: Option<String>,
    pub time_of_day: Option<String>,
}

/// One session joined with its (possibly missing) user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSessionRow {
    pub session: SessionRecord,
    pub user: Option<UserRecord>,
}

impl UserSessionRow {
    pub fn age(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.age)
    }

    pub fn age_group(&self) -> Option<AgeGroup> {
        self.age().and_then(AgeGroup::from_age)
    }

    pub fn location(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.location.as_deref())
    }

    pub fn total_orders(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.total_orders)
    }
}

/// One order joined with its (possibly missing) session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOrderRow {
    pub order: OrderRecord,
    pub session: Option<SessionRecord>,
}

impl SessionOrderRow {
    /// Time-of-day bucket, preferring the order sheet over the session sheet.
    pub fn time_of_day(&self) -> Option<&str> {
        self.order.time_of_day.as_deref().or_else(|| {
            self.session
                .as_ref()
                .and_then(|s| s.time_of_day.as_deref())
        })
    }
}

pub type UserSessionView = Table<UserSessionRow>;
pub type SessionOrderView = Table<SessionOrderRow>;

/// Age bracket with right-closed boundaries (0,25], (25,35], (35,45], (45,55], (55,100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "18-25")]
    UpTo25,
    #[serde(rename = "26-35")]
    From26To35,
    #[serde(rename = "36-45")]
    From36To45,
    #[serde(rename = "46-55")]
    From46To55,
    #[serde(rename = "55+")]
    Over55,
}

impl AgeGroup {
    /// Bucket an age; anything outside (0, 100] has no group.
    pub fn from_age(age: f64) -> Option<Self> {
        if !(age > 0.0 && age <= 100.0) {
            return None;
        }

        let group = if age <= 25.0 {
            AgeGroup::UpTo25
        } else if age <= 35.0 {
            AgeGroup::From26To35
        } else if age <= 45.0 {
            AgeGroup::From36To45
        } else if age <= 55.0 {
            AgeGroup::From46To55
        } else {
            AgeGroup::Over55
        };

        Some(group)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::UpTo25 => "18-25",
            AgeGroup::From26To35 => "26-35",
            AgeGroup::From36To45 => "36-45",
            AgeGroup::From46To55 => "46-55",
            AgeGroup::Over55 => "55+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statistic computed over one source column within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    /// Number of non-null values.
    Count,
    /// Number of distinct non-null values.
    Nunique,
    Sum,
    Mean,
    Median,
}

impl Stat {
    /// Whether the statistic always yields a whole number.
    pub fn is_integral(&self) -> bool {
        matches!(self, Stat::Count | Stat::Nunique)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Count => write!(f, "count"),
            Stat::Nunique => write!(f, "nunique"),
            Stat::Sum => write!(f, "sum"),
            Stat::Mean => write!(f, "mean"),
            Stat::Median => write!(f, "median"),
        }
    }
}

/// A column of a summary table: a source column and the statistic applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumn {
    pub source: String,
    pub stat: Stat,
}

impl MetricColumn {
    pub fn new(source: &str, stat: Stat) -> Self {
        Self {
            source: source.to_string(),
            stat,
        }
    }
}

impl fmt::Display for MetricColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.stat)
    }
}

/// One group of a summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key: String,
    /// Parallel to `SummaryTable::columns`; `None` where no value exists.
    pub values: Vec<Option<f64>>,
}

/// A grouped summary view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    /// Name of the view, e.g. `meal_analysis`.
    pub name: String,
    /// Column the rows are grouped by.
    pub group_by: String,
    pub columns: Vec<MetricColumn>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn column_index(&self, source: &str, stat: Stat) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.source == source && c.stat == stat)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
impl SummaryTable {
    pub fn has_column(&self, source: &str, stat: Stat) -> bool {
        self.column_index(source, stat).is_some()
    }

    pub fn row(&self, key: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    /// Look up a single cell by group key and column.
    pub fn value(&self, key: &str, source: &str, stat: Stat) -> Option<f64> {
        let idx = self.column_index(source, stat)?;
        self.row(key).and_then(|r| r.values[idx])
    }

    /// Drop a column in place, returning whether it existed.
    pub fn remove_column(&mut self, source: &str, stat: Stat) -> bool {
        match self.column_index(source, stat) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.values.remove(idx);
                }
                true
            }
            None => false,
        }
    }
}

/// Scalar session statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    #[serde(rename = "Avg Session Duration")]
    pub avg_session_duration: Option<f64>,
    #[serde(rename = "Median Session Duration")]
    pub median_session_duration: Option<f64>,
    #[serde(rename = "Avg Session Rating")]
    pub avg_session_rating: Option<f64>,
    #[serde(rename = "Total Unique Users")]
    pub total_unique_users: usize,
    #[serde(rename = "Avg Orders per User")]
    pub avg_orders_per_user: Option<f64>,
}

/// The seven analysis views produced by aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub order_analysis: SummaryTable,
    pub age_analysis: SummaryTable,
    pub location_metrics: SummaryTable,
    pub meal_analysis: SummaryTable,
    pub time_analysis: SummaryTable,
    pub session_metrics: SessionMetrics,
    pub dish_analysis: SummaryTable,
}

impl AnalysisResult {
    /// The grouped tables in presentation order.
    pub fn tables(&self) -> [&SummaryTable; 6] {
        [
            &self.order_analysis,
            &self.age_analysis,
            &self.location_metrics,
            &self.meal_analysis,
            &self.time_analysis,
            &self.dish_analysis,
        ]
    }
}

/// A named, already formatted figure backing an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    pub value: String,
}

/// A human-readable finding derived from one analysis view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: String,
    pub key_finding: String,
    pub metrics: Vec<InsightMetric>,
}

impl Insight {
    pub fn new(category: &str, key_finding: String) -> Self {
        Self {
            category: category.to_string(),
            key_finding,
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, name: &str, value: String) -> Self {
        self.metrics.push(InsightMetric {
            name: name.to_string(),
            value,
        });
        self
    }
}

#[cfg(test)]
impl Insight {
    pub fn metric(&self, name: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }
}

/// A category whose insight could not be derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightFailure {
    pub category: String,
    pub error: InsightError,
}

/// Insights in category order plus the categories that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub failures: Vec<InsightFailure>,
}

impl InsightReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Row counts of the cleaned and merged tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub users: usize,
    pub sessions: usize,
    pub orders: usize,
    pub user_sessions: usize,
    pub session_orders: usize,
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Directory the sheets were read from.
    pub input_path: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    pub counts: DatasetCounts,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub analysis: AnalysisResult,
    pub insights: InsightReport,
    /// General guidance appended after the findings.
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SummaryTable {
        SummaryTable {
            name: "meal_analysis".to_string(),
            group_by: "Order Meal Type".to_string(),
            columns: vec![
                MetricColumn::new(columns::ORDER_ID, Stat::Count),
                MetricColumn::new(columns::RATING, Stat::Mean),
            ],
            rows: vec![
                SummaryRow {
                    key: "Dinner".to_string(),
                    values: vec![Some(3.0), Some(4.5)],
                },
                SummaryRow {
                    key: "Lunch".to_string(),
                    values: vec![Some(1.0), None],
                },
            ],
        }
    }

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(25.0), Some(AgeGroup::UpTo25));
        assert_eq!(AgeGroup::from_age(25.5), Some(AgeGroup::From26To35));
        assert_eq!(AgeGroup::from_age(35.0), Some(AgeGroup::From26To35));
        assert_eq!(AgeGroup::from_age(45.0), Some(AgeGroup::From36To45));
        assert_eq!(AgeGroup::from_age(55.0), Some(AgeGroup::From46To55));
        assert_eq!(AgeGroup::from_age(60.0), Some(AgeGroup::Over55));
        assert_eq!(AgeGroup::from_age(100.0), Some(AgeGroup::Over55));
    }

    #[test]
    fn test_age_group_out_of_range() {
        assert_eq!(AgeGroup::from_age(0.0), None);
        assert_eq!(AgeGroup::from_age(-4.0), None);
        assert_eq!(AgeGroup::from_age(100.5), None);
        assert_eq!(AgeGroup::from_age(f64::NAN), None);
    }

    #[test]
    fn test_age_group_ordering_and_labels() {
        assert!(AgeGroup::UpTo25 < AgeGroup::Over55);
        assert_eq!(AgeGroup::From36To45.to_string(), "36-45");
        assert_eq!(
            serde_json::to_string(&AgeGroup::Over55).unwrap(),
            "\"55+\""
        );
    }

    #[test]
    fn test_summary_table_lookup() {
        let table = sample_table();
        assert_eq!(table.value("Dinner", columns::RATING, Stat::Mean), Some(4.5));
        assert_eq!(table.value("Lunch", columns::RATING, Stat::Mean), None);
        assert_eq!(table.value("Brunch", columns::ORDER_ID, Stat::Count), None);
        assert!(!table.has_column(columns::RATING, Stat::Count));
    }

    #[test]
    fn test_summary_table_remove_column() {
        let mut table = sample_table();
        assert!(table.remove_column(columns::RATING, Stat::Mean));
        assert!(!table.remove_column(columns::RATING, Stat::Mean));
        assert_eq!(table.columns.len(), 1);
        assert!(table.rows.iter().all(|r| r.values.len() == 1));
    }

    #[test]
    fn test_insight_metrics() {
        let insight = Insight::new("Revenue Insights", "Top".to_string())
            .with_metric("Total Revenue", "$10.00".to_string());
        assert_eq!(insight.metric("Total Revenue"), Some("$10.00"));
        assert_eq!(insight.metric("Average Rating"), None);
    }

    #[test]
    fn test_session_metrics_serialized_names() {
        let metrics = SessionMetrics {
            total_unique_users: 4,
            ..SessionMetrics::default()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"Total Unique Users\":4"));
        assert!(json.contains("\"Avg Session Rating\":null"));
    }
}
