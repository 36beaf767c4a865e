// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription filters.

use serde::{Deserialize, Serialize};

/// Filter attached to a table subscription.
///
/// The server interprets the filter; the client only stores and replays it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableQuery {
    /// Every row of the table.
    #[default]
    All,
    /// A raw SQL query.
    Sql(String),
}

impl TableQuery {
    /// Renders the query as SQL for `table`.
    pub fn to_sql(&self, table: &str) -> String {
        match self {
            TableQuery::All => format!("SELECT * FROM {table}"),
            TableQuery::Sql(sql) => sql.clone(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TableQuery::All)
    }
}

impl From<&str> for TableQuery {
    fn from(sql: &str) -> Self {
        TableQuery::Sql(sql.to_string())
    }
}

impl From<String> for TableQuery {
    fn from(sql: String) -> Self {
        TableQuery::Sql(sql)
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
