//! Table joins.
//!
//! Sessions are left-joined onto users and orders onto sessions. Every
//! left row survives exactly once; unmatched rows carry `None` for the
//! right side. Shared column names are renamed explicitly per side.

use crate::models::columns::*;
use crate::models::{
    OrderRecord, SessionOrderRow, SessionOrderView, SessionRecord, Table, UserRecord,
    UserSessionRow, UserSessionView,
};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const ORDER_DISH_NAME: &str = "Order Dish Name";
pub const ORDER_MEAL_TYPE: &str = "Order Meal Type";
pub const ORDER_TIME_OF_DAY: &str = "Order Time of Day";
pub const SESSION_TIME_OF_DAY: &str = "Session Time of Day";

/// How a join names its columns.
#[derive(Debug, Clone, Copy)]
pub struct JoinNaming {
    /// Column matched on; kept once under its own name.
    pub key: &'static str,
    pub left_qualifier: &'static str,
    pub right_qualifier: &'static str,
    /// Columns always qualified on both sides, whether or not both sides have them.
    pub qualified: &'static [&'static str],
}

/// Sessions onto users. The two sheets share only the key.
pub const USER_SESSION_JOIN: JoinNaming = JoinNaming {
    key: USER_ID,
    left_qualifier: "Session",
    right_qualifier: "User",
    qualified: &[],
};

/// Orders onto sessions. Yields `Order Meal Type` / `Session Meal Type` and so on.
pub const SESSION_ORDER_JOIN: JoinNaming = JoinNaming {
    key: SESSION_ID,
    left_qualifier: "Order",
    right_qualifier: "Session",
    qualified: &[USER_ID, DISH_NAME, MEAL_TYPE, TIME_OF_DAY],
};

/// Build both joined views.
pub fn merge(
    users: &Table<UserRecord>,
    sessions: &Table<SessionRecord>,
    orders: &Table<OrderRecord>,
) -> (UserSessionView, SessionOrderView) {
    let user_sessions = join_users(sessions, users);
    let session_orders = join_sessions(orders, sessions);

    debug!(
        "Merged views: {} user-session rows ({} columns), {} session-order rows ({} columns)",
        user_sessions.len(),
        user_sessions.columns.len(),
        session_orders.len(),
        session_orders.columns.len()
    );

    (user_sessions, session_orders)
}

/// Left join of sessions with users on `User ID`.
pub fn join_users(sessions: &Table<SessionRecord>, users: &Table<UserRecord>) -> UserSessionView {
    let mut by_id: HashMap<&str, &UserRecord> = HashMap::with_capacity(users.len());
    for user in &users.rows {
        by_id.entry(user.user_id.as_str()).or_insert(user);
    }

    let rows: Vec<UserSessionRow> = sessions
        .rows
        .iter()
        .map(|session| UserSessionRow {
            session: session.clone(),
            user: by_id.get(session.user_id.as_str()).map(|u| (*u).clone()),
        })
        .collect();

    let unmatched = rows.iter().filter(|r| r.user.is_none()).count();
    if unmatched > 0 {
        warn!("{} session(s) reference an unknown user", unmatched);
    }

    Table::new(
        joined_columns(&sessions.columns, &users.columns, &USER_SESSION_JOIN),
        rows,
    )
}

/// Left join of orders with sessions on `Session ID`.
pub fn join_sessions(
    orders: &Table<OrderRecord>,
    sessions: &Table<SessionRecord>,
) -> SessionOrderView {
    let mut by_id: HashMap<&str, &SessionRecord> = HashMap::with_capacity(sessions.len());
    for session in &sessions.rows {
        if let Some(ref id) = session.session_id {
            by_id.entry(id.as_str()).or_insert(session);
        }
    }

    let rows: Vec<SessionOrderRow> = orders
        .rows
        .iter()
        .map(|order| SessionOrderRow {
            order: order.clone(),
            session: order
                .session_id
                .as_deref()
                .and_then(|id| by_id.get(id))
                .map(|s| (*s).clone()),
        })
        .collect();

    let unmatched = rows.iter().filter(|r| r.session.is_none()).count();
    if unmatched > 0 {
        warn!("{} order(s) reference an unknown session", unmatched);
    }

    Table::new(
        joined_columns(&orders.columns, &sessions.columns, &SESSION_ORDER_JOIN),
        rows,
    )
}

/// Column list of a joined view: left columns, then right columns without
/// the key. Shared or designated columns become `"<qualifier> <column>"`.
pub fn joined_columns(left: &[String], right: &[String], naming: &JoinNaming) -> Vec<String> {
    let qualify = |column: &str, other: &[String]| {
        column != naming.key
            && (naming.qualified.contains(&column) || other.iter().any(|c| c == column))
    };

    let mut columns = Vec::with_capacity(left.len() + right.len());

    for column in left {
        if qualify(column, right) {
            columns.push(format!("{} {}", naming.left_qualifier, column));
        } else {
            columns.push(column.clone());
        }
    }

    for column in right {
        if column == naming.key {
            if !left.contains(column) {
                columns.push(column.clone());
            }
        } else if qualify(column, left) {
            columns.push(format!("{} {}", naming.right_qualifier, column));
        } else {
            columns.push(column.clone());
        }
    }

    columns
}
