//! Grouped summary statistics.
//!
//! This module builds the seven analysis views from the joined tables.
//! Grouping never touches its input: derived keys such as the age group
//! are computed on read.

use super::merger::{ORDER_DISH_NAME, ORDER_MEAL_TYPE, ORDER_TIME_OF_DAY, SESSION_TIME_OF_DAY};
use crate::models::columns::*;
use crate::models::{
    AnalysisResult, MetricColumn, SessionMetrics, SessionOrderRow, SessionOrderView, Stat,
    SummaryRow, SummaryTable, Table, UserSessionRow, UserSessionView,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use tracing::{debug, warn};

/// A single cell read from a view row.
#[derive(Debug, Clone, Copy)]
enum Cell<'a> {
    Number(f64),
    Text(&'a str),
}

/// A source column of a view, how to read it, and the statistics wanted.
struct Measure<R> {
    column: &'static str,
    read: fn(&R) -> Option<Cell<'_>>,
    stats: &'static [Stat],
}

/// Compute every analysis view.
pub fn aggregate(user_sessions: &UserSessionView, session_orders: &SessionOrderView) -> AnalysisResult {
    debug!(
        "Aggregating {} session rows and {} order rows",
        user_sessions.len(),
        session_orders.len()
    );
    if user_sessions.is_empty() {
        warn!("No sessions to aggregate; session views will be empty");
    }
    if session_orders.is_empty() {
        warn!("No orders to aggregate; order views will be empty");
    }

    AnalysisResult {
        order_analysis: order_analysis(session_orders),
        age_analysis: age_analysis(user_sessions),
        location_metrics: location_metrics(user_sessions),
        meal_analysis: meal_analysis(session_orders),
        time_analysis: time_analysis(session_orders),
        session_metrics: session_metrics(user_sessions),
        dish_analysis: dish_analysis(session_orders),
    }
}

/// Orders by status: volume, revenue and rating.
pub fn order_analysis(view: &SessionOrderView) -> SummaryTable {
    summarize(
        "order_analysis",
        view,
        ORDER_STATUS,
        view.has_column(ORDER_STATUS),
        |row: &SessionOrderRow| row.order.order_status.clone(),
        &[
            Measure { column: ORDER_ID, read: order_id, stats: &[Stat::Count] },
            Measure { column: AMOUNT, read: amount, stats: &[Stat::Sum, Stat::Mean, Stat::Median] },
            Measure { column: RATING, read: rating, stats: &[Stat::Mean, Stat::Count] },
        ],
    )
}

/// Sessions by the user's age bracket.
pub fn age_analysis(view: &UserSessionView) -> SummaryTable {
    summarize(
        "age_analysis",
        view,
        AGE_GROUP,
        view.has_column(AGE),
        UserSessionRow::age_group,
        &[
            Measure { column: USER_ID, read: session_user_id, stats: &[Stat::Count] },
            Measure { column: TOTAL_ORDERS, read: total_orders, stats: &[Stat::Mean] },
            Measure { column: SESSION_RATING, read: session_rating, stats: &[Stat::Mean] },
            Measure { column: DURATION, read: duration, stats: &[Stat::Mean] },
        ],
    )
}

/// Sessions by the user's location. Sessions without a known user have no location.
pub fn location_metrics(view: &UserSessionView) -> SummaryTable {
    summarize(
        "location_metrics",
        view,
        LOCATION,
        view.has_column(LOCATION),
        |row: &UserSessionRow| row.location().map(String::from),
        &[
            Measure { column: USER_ID, read: session_user_id, stats: &[Stat::Nunique] },
            Measure { column: TOTAL_ORDERS, read: total_orders, stats: &[Stat::Sum, Stat::Mean] },
            Measure { column: SESSION_RATING, read: session_rating, stats: &[Stat::Mean] },
        ],
    )
}

/// Orders by the meal type recorded on the order.
pub fn meal_analysis(view: &SessionOrderView) -> SummaryTable {
    summarize(
        "meal_analysis",
        view,
        ORDER_MEAL_TYPE,
        view.has_column(ORDER_MEAL_TYPE),
        |row: &SessionOrderRow| row.order.meal_type.clone(),
        &[
            Measure { column: ORDER_ID, read: order_id, stats: &[Stat::Count] },
            Measure { column: AMOUNT, read: amount, stats: &[Stat::Sum, Stat::Mean] },
            Measure { column: RATING, read: rating, stats: &[Stat::Mean] },
        ],
    )
}

/// Orders by time-of-day bucket.
pub fn time_analysis(view: &SessionOrderView) -> SummaryTable {
    let present = view.has_column(ORDER_TIME_OF_DAY) || view.has_column(SESSION_TIME_OF_DAY);
    summarize(
        "time_analysis",
        view,
        TIME_OF_DAY,
        present,
        |row: &SessionOrderRow| row.time_of_day().map(String::from),
        &[
            Measure { column: ORDER_ID, read: order_id, stats: &[Stat::Count] },
            Measure { column: AMOUNT, read: amount, stats: &[Stat::Mean, Stat::Sum] },
            Measure { column: RATING, read: rating, stats: &[Stat::Mean] },
        ],
    )
}

/// Orders by the dish named on the order.
pub fn dish_analysis(view: &SessionOrderView) -> SummaryTable {
    summarize(
        "dish_analysis",
        view,
        ORDER_DISH_NAME,
        view.has_column(ORDER_DISH_NAME),
        |row: &SessionOrderRow| row.order.dish_name.clone(),
        &[
            Measure { column: ORDER_ID, read: order_id, stats: &[Stat::Count] },
            Measure { column: AMOUNT, read: amount, stats: &[Stat::Sum, Stat::Mean] },
            Measure { column: RATING, read: rating, stats: &[Stat::Mean, Stat::Count] },
        ],
    )
}

/// Scalar statistics over all sessions.
pub fn session_metrics(view: &UserSessionView) -> SessionMetrics {
    let durations: Vec<f64> = view
        .rows
        .iter()
        .map(|r| r.session.duration_mins as f64)
        .collect();
    let ratings: Vec<f64> = view
        .rows
        .iter()
        .filter_map(|r| r.session.session_rating)
        .collect();
    let orders: Vec<f64> = view.rows.iter().filter_map(|r| r.total_orders()).collect();
    let users: HashSet<&str> = view
        .rows
        .iter()
        .map(|r| r.session.user_id.as_str())
        .collect();

    SessionMetrics {
        avg_session_duration: mean(&durations).map(round2),
        median_session_duration: median(&durations).map(round2),
        avg_session_rating: mean(&ratings).map(round2),
        total_unique_users: users.len(),
        avg_orders_per_user: mean(&orders).map(round2),
    }
}

/// Rows ordered by one metric, highest first.
///
/// Rows without a value sort last; ties keep key order. Returns nothing
/// if the table lacks the column.
pub fn top_rows<'a>(table: &'a SummaryTable, source: &str, stat: Stat, n: usize) -> Vec<&'a SummaryRow> {
    let Some(idx) = table.column_index(source, stat) else {
        return Vec::new();
    };

    let mut rows: Vec<&SummaryRow> = table.rows.iter().collect();
    rows.sort_by(|a, b| match (a.values[idx], b.values[idx]) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.key.cmp(&b.key)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.key.cmp(&b.key),
    });
    rows.truncate(n);

    rows
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Round to two decimal places, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Group rows by key and compute each measure's statistics per group.
///
/// Rows with a null key are skipped. Measures whose column is not in the
/// view are left out of the result.
fn summarize<R, K, F>(
    name: &str,
    view: &Table<R>,
    group_by: &str,
    key_present: bool,
    key: F,
    measures: &[Measure<R>],
) -> SummaryTable
where
    K: Ord + Display,
    F: Fn(&R) -> Option<K>,
{
    let measures: Vec<&Measure<R>> = measures
        .iter()
        .filter(|m| view.has_column(m.column))
        .collect();

    let columns: Vec<MetricColumn> = measures
        .iter()
        .flat_map(|m| m.stats.iter().map(|stat| MetricColumn::new(m.column, *stat)))
        .collect();

    if !key_present {
        warn!("{}: column `{}` is not available, table left empty", name, group_by);
        return SummaryTable {
            name: name.to_string(),
            group_by: group_by.to_string(),
            columns,
            rows: Vec::new(),
        };
    }

    let mut groups: BTreeMap<K, Vec<&R>> = BTreeMap::new();
    for row in &view.rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row);
        }
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (k, members) in groups {
        let mut values = Vec::with_capacity(columns.len());
        for measure in &measures {
            let cells: Vec<Cell<'_>> = members.iter().filter_map(|r| (measure.read)(*r)).collect();
            for stat in measure.stats {
                values.push(compute(*stat, &cells));
            }
        }
        rows.push(SummaryRow {
            key: k.to_string(),
            values,
        });
    }

    let table = SummaryTable {
        name: name.to_string(),
        group_by: group_by.to_string(),
        columns,
        rows,
    };
    debug!("{}: {} groups by `{}`", name, table.len(), group_by);

    table
}

fn compute(stat: Stat, cells: &[Cell<'_>]) -> Option<f64> {
    let numbers: Vec<f64> = cells
        .iter()
        .filter_map(|c| match c {
            Cell::Number(v) => Some(*v),
            Cell::Text(_) => None,
        })
        .collect();

    let value = match stat {
        Stat::Count => Some(cells.len() as f64),
        Stat::Nunique => Some(distinct(cells) as f64),
        Stat::Sum => Some(numbers.iter().sum()),
        Stat::Mean => mean(&numbers),
        Stat::Median => median(&numbers),
    };

    value.map(round2)
}

fn distinct(cells: &[Cell<'_>]) -> usize {
    let mut seen = HashSet::new();
    for cell in cells {
        let repr = match cell {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.to_string(),
        };
        seen.insert(repr);
    }
    seen.len()
}

// Readers for the measured columns.

fn order_id(row: &SessionOrderRow) -> Option<Cell<'_>> {
    Some(Cell::Text(&row.order.order_id))
}

fn amount(row: &SessionOrderRow) -> Option<Cell<'_>> {
    Some(Cell::Number(row.order.amount_usd))
}

fn rating(row: &SessionOrderRow) -> Option<Cell<'_>> {
    row.order.rating.map(Cell::Number)
}

fn session_user_id(row: &UserSessionRow) -> Option<Cell<'_>> {
    Some(Cell::Text(&row.session.user_id))
}

fn total_orders(row: &UserSessionRow) -> Option<Cell<'_>> {
    row.total_orders().map(Cell::Number)
}

fn session_rating(row: &UserSessionRow) -> Option<Cell<'_>> {
    row.session.session_rating.map(Cell::Number)
}

fn duration(row: &UserSessionRow) -> Option<Cell<'_>> {
    Some(Cell::Number(row.session.duration_mins as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cleaner::clean;
    use crate::analysis::merger::merge;
    use crate::config::InputConfig;
    use crate::loader::{RawDataset, RawTable};

    fn views(users: &str, sessions: &str, orders: &str) -> (UserSessionView, SessionOrderView) {
        let dataset = RawDataset {
            users: RawTable::from_reader("UserDetails", users.as_bytes()).unwrap(),
            sessions: RawTable::from_reader("CookingSessions", sessions.as_bytes()).unwrap(),
            orders: RawTable::from_reader("OrderDetails", orders.as_bytes()).unwrap(),
        };
        let cleaned = clean(&dataset, &InputConfig::default().date_formats).unwrap();
        merge(&cleaned.users, &cleaned.sessions, &cleaned.orders)
    }

    fn three_user_views() -> (UserSessionView, SessionOrderView) {
        views(
            "User ID,Age,Location,Registration Date,Total Orders\n\
             U1,24,Austin,2023-01-01,4\n\
             U2,36,Boston,2023-01-01,8\n\
             U3,60,Austin,2023-01-01,2\n",
            "Session ID,User ID,Dish Name,Meal Type,Session Start,Session End,Duration (mins),Session Rating\n\
             S1,U1,Pasta,Dinner,,,30,4.0\n\
             S2,U2,Salad,Lunch,,,20,5.0\n\
             S3,U3,Pasta,Dinner,,,40,3.0\n",
            "Order ID,User ID,Order Date,Meal Type,Dish Name,Order Status,Amount (USD),Time of Day,Rating,Session ID\n\
             O1,U1,2024-01-01,Dinner,Pasta,Completed,10,Night,4,S1\n\
             O2,U2,2024-01-01,Lunch,Salad,Completed,20,Day,5,S2\n\
             O3,U3,2024-01-01,Dinner,Pasta,Completed,30,Night,3,S3\n",
        )
    }

    #[test]
    fn test_order_analysis_single_status() {
        let (_, session_orders) = three_user_views();
        let table = order_analysis(&session_orders);

        assert_eq!(table.len(), 1);
        assert_eq!(table.value("Completed", ORDER_ID, Stat::Count), Some(3.0));
        assert_eq!(table.value("Completed", AMOUNT, Stat::Sum), Some(60.0));
        assert_eq!(table.value("Completed", AMOUNT, Stat::Mean), Some(20.0));
        assert_eq!(table.value("Completed", AMOUNT, Stat::Median), Some(20.0));
        assert_eq!(table.value("Completed", RATING, Stat::Count), Some(3.0));
    }

    #[test]
    fn test_age_analysis_one_row_per_bracket() {
        let (user_sessions, _) = three_user_views();
        let table = age_analysis(&user_sessions);

        let keys: Vec<&str> = table.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["18-25", "36-45", "55+"]);
        for key in keys {
            assert_eq!(table.value(key, USER_ID, Stat::Count), Some(1.0));
        }
        assert_eq!(table.value("36-45", TOTAL_ORDERS, Stat::Mean), Some(8.0));
        assert_eq!(table.value("55+", DURATION, Stat::Mean), Some(40.0));
    }

    #[test]
    fn test_location_metrics() {
        let (user_sessions, _) = three_user_views();
        let table = location_metrics(&user_sessions);

        assert_eq!(table.value("Austin", USER_ID, Stat::Nunique), Some(2.0));
        assert_eq!(table.value("Austin", TOTAL_ORDERS, Stat::Sum), Some(6.0));
        assert_eq!(table.value("Austin", TOTAL_ORDERS, Stat::Mean), Some(3.0));
        assert_eq!(table.value("Austin", SESSION_RATING, Stat::Mean), Some(3.5));
        assert_eq!(table.value("Boston", USER_ID, Stat::Nunique), Some(1.0));
    }

    #[test]
    fn test_location_metrics_skip_sessions_of_unknown_users() {
        let (user_sessions, _) = views(
            "User ID,Age,Location,Registration Date,Total Orders\n\
             U1,24,Austin,2023-01-01,4\n\
             U2,36,Boston,2023-01-01,8\n",
            "Session ID,User ID,Dish Name,Session Start,Session End,Duration (mins),Session Rating\n\
             S1,U1,Pasta,,,30,4.0\n\
             S2,U404,Pasta,,,20,1.0\n\
             S3,U2,Salad,,,25,5.0\n\
             S4,U1,Soup,,,15,3.0\n",
            "Order ID,User ID,Order Date,Amount (USD),Session ID\n",
        );
        assert_eq!(user_sessions.len(), 4);

        let table = location_metrics(&user_sessions);

        let keys: Vec<&str> = table.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Austin", "Boston"]);
        let idx = table.column_index(USER_ID, Stat::Nunique).unwrap();
        let counted: f64 = table.rows.iter().filter_map(|r| r.values[idx]).sum();
        assert_eq!(counted, 2.0);
        assert_eq!(table.value("Austin", USER_ID, Stat::Nunique), Some(1.0));
        assert_eq!(table.value("Austin", SESSION_RATING, Stat::Mean), Some(3.5));
        assert_eq!(table.value("Boston", SESSION_RATING, Stat::Mean), Some(5.0));
    }

    #[test]
    fn test_meal_time_and_dish_analysis() {
        let (_, session_orders) = three_user_views();

        let meals = meal_analysis(&session_orders);
        assert_eq!(meals.group_by, "Order Meal Type");
        assert_eq!(meals.value("Dinner", AMOUNT, Stat::Sum), Some(40.0));
        assert_eq!(meals.value("Lunch", RATING, Stat::Mean), Some(5.0));

        let times = time_analysis(&session_orders);
        assert_eq!(times.value("Night", ORDER_ID, Stat::Count), Some(2.0));
        assert_eq!(times.value("Day", AMOUNT, Stat::Mean), Some(20.0));

        let dishes = dish_analysis(&session_orders);
        assert_eq!(dishes.value("Pasta", RATING, Stat::Mean), Some(3.5));
        assert_eq!(dishes.value("Pasta", RATING, Stat::Count), Some(2.0));
    }

    #[test]
    fn test_session_metrics() {
        let (user_sessions, _) = three_user_views();
        let metrics = session_metrics(&user_sessions);

        assert_eq!(metrics.avg_session_duration, Some(30.0));
        assert_eq!(metrics.median_session_duration, Some(30.0));
        assert_eq!(metrics.avg_session_rating, Some(4.0));
        assert_eq!(metrics.total_unique_users, 3);
        assert_eq!(metrics.avg_orders_per_user, Some(4.67));
    }

    #[test]
    fn test_group_counts_sum_to_order_count() {
        let (_, session_orders) = views(
            "User ID,Age,Registration Date\nU1,30,\n",
            "Session ID,User ID,Dish Name,Session Start,Session End,Duration (mins)\nS1,U1,Soup,,,10\n",
            "Order ID,User ID,Order Date,Order Status,Amount (USD),Session ID\n\
             O1,U1,,Completed,5,S1\n\
             O2,U1,,Canceled,7,S1\n\
             O3,U1,,Completed,,S9\n\
             O4,U1,,Pending,1,\n",
        );

        let table = order_analysis(&session_orders);
        let idx = table.column_index(ORDER_ID, Stat::Count).unwrap();
        let total: f64 = table.rows.iter().filter_map(|r| r.values[idx]).sum();
        assert_eq!(total as usize, session_orders.len());
    }

    #[test]
    fn test_missing_rating_column_is_omitted() {
        let (_, session_orders) = views(
            "User ID,Age,Registration Date\nU1,30,\n",
            "Session ID,User ID,Dish Name,Session Start,Session End,Duration (mins)\nS1,U1,Soup,,,10\n",
            "Order ID,User ID,Order Date,Dish Name,Amount (USD),Session ID\nO1,U1,,Soup,5,S1\n",
        );

        let dishes = dish_analysis(&session_orders);
        assert!(dishes.has_column(AMOUNT, Stat::Sum));
        assert!(!dishes.has_column(RATING, Stat::Mean));
        assert_eq!(dishes.len(), 1);
    }

    #[test]
    fn test_missing_group_column_gives_empty_table() {
        let (_, session_orders) = views(
            "User ID,Age,Registration Date\nU1,30,\n",
            "Session ID,User ID,Dish Name,Session Start,Session End,Duration (mins)\nS1,U1,Soup,,,10\n",
            "Order ID,User ID,Order Date,Amount (USD),Session ID\nO1,U1,,5,S1\n",
        );

        let times = time_analysis(&session_orders);
        assert!(times.is_empty());
        assert!(times.has_column(ORDER_ID, Stat::Count));
    }

    #[test]
    fn test_time_of_day_falls_back_to_session() {
        let (_, session_orders) = views(
            "User ID,Age,Registration Date\nU1,30,\n",
            "Session ID,User ID,Dish Name,Session Start,Session End,Duration (mins),Time of Day\n\
             S1,U1,Soup,,,10,Morning\n",
            "Order ID,User ID,Order Date,Amount (USD),Session ID\nO1,U1,,5,S1\nO2,U1,,5,S2\n",
        );

        let times = time_analysis(&session_orders);
        assert_eq!(times.len(), 1);
        assert_eq!(times.value("Morning", ORDER_ID, Stat::Count), Some(1.0));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let (user_sessions, session_orders) = three_user_views();
        let before = (user_sessions.clone(), session_orders.clone());

        let first = aggregate(&user_sessions, &session_orders);
        let second = aggregate(&user_sessions, &session_orders);

        assert_eq!(first, second);
        assert_eq!((user_sessions, session_orders), before);
    }

    #[test]
    fn test_empty_views() {
        let user_sessions = UserSessionView::new(vec![AGE.to_string()], Vec::new());
        let session_orders = SessionOrderView::new(Vec::new(), Vec::new());
        let result = aggregate(&user_sessions, &session_orders);

        assert!(result.tables().iter().all(|t| t.is_empty()));
        assert_eq!(result.session_metrics.avg_session_duration, None);
        assert_eq!(result.session_metrics.total_unique_users, 0);
    }

    #[test]
    fn test_top_rows() {
        let (_, session_orders) = three_user_views();
        let dishes = dish_analysis(&session_orders);

        let top = top_rows(&dishes, AMOUNT, Stat::Sum, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].key, "Pasta");

        let all = top_rows(&dishes, AMOUNT, Stat::Sum, 10);
        assert_eq!(all.len(), 2);
        assert!(top_rows(&dishes, "Missing", Stat::Sum, 3).is_empty());
    }

    #[test]
    fn test_stat_helpers() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(round2(4.666_666), 4.67);
        assert_eq!(round2(-1.005_1), -1.01);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(mean(&[0.25, 0.0]).map(round2), Some(0.12));
    }
}
