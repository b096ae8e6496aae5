//! Query objects that are built once and executed against any [`Queryable`].

use crate::clause::{FilterCondition, Placeholders, build_where_body};
use crate::error::DbError;
use crate::handle::Queryable;
use crate::values::{FilterValue, SqlValue};
use sqlx::postgres::PgRow;

pub const ALL_COLUMNS_AS_ASTERISK: &str = "*";
pub const COUNT_ONE: &str = "COUNT(1)";
pub const COUNT_ONE_AS_RECORD_COUNT: &str = "COUNT(1) AS record_count";

/// Statement text plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// Produces one row.
pub trait QueryRowTask {
    fn row_query(&self) -> BuiltQuery;
}

/// Produces many rows.
pub trait QueryTask {
    fn rows_query(&self) -> BuiltQuery;
}

/// Produces an affected-row count.
pub trait ExecTask {
    fn exec_query(&self) -> BuiltQuery;
}

pub async fn fetch_row<Q, T>(handle: &mut Q, task: &T) -> Result<PgRow, DbError>
where
    Q: Queryable,
    T: QueryRowTask + ?Sized,
{
    let BuiltQuery { sql, args } = task.row_query();
    handle.query_row(&sql, args).await
}

pub async fn fetch_rows<Q, T>(handle: &mut Q, task: &T) -> Result<Vec<PgRow>, DbError>
where
    Q: Queryable,
    T: QueryTask + ?Sized,
{
    let BuiltQuery { sql, args } = task.rows_query();
    handle.query(&sql, args).await
}

pub async fn execute_task<Q, T>(handle: &mut Q, task: &T) -> Result<u64, DbError>
where
    Q: Queryable,
    T: ExecTask + ?Sized,
{
    let BuiltQuery { sql, args } = task.exec_query();
    handle.execute(&sql, args).await
}

/// Appends ` WHERE <body>` when there are conditions and returns their bind values.
fn push_where(sql: &mut String, conditions: &[FilterCondition], start_index: usize) -> Vec<SqlValue> {
    let (args, body) = build_where_body(conditions, start_index);
    if !body.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&body);
    }
    args
}

/// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    columns: Vec<String>,
    conditions: Vec<FilterCondition>,
    order_by: Option<String>,
    limit: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// No columns means `*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn filters(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let columns = if self.columns.is_empty() {
            ALL_COLUMNS_AS_ASTERISK.to_string()
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.table);
        let args = push_where(&mut sql, &self.conditions, 1);

        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        BuiltQuery { sql, args }
    }
}

impl QueryRowTask for SelectQuery {
    fn row_query(&self) -> BuiltQuery {
        self.build()
    }
}

impl QueryTask for SelectQuery {
    fn rows_query(&self) -> BuiltQuery {
        self.build()
    }
}

/// `INSERT INTO <table> (<columns>) VALUES (...) [RETURNING ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    table: String,
    values: Vec<(String, FilterValue)>,
    returning: Vec<String>,
}

impl InsertQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let mut placeholders = Placeholders::starting_at(1);
        let columns: Vec<&str> = self.values.iter().map(|(column, _)| column.as_str()).collect();
        let values: Vec<String> = self
            .values
            .iter()
            .map(|(_, value)| placeholders.render(value))
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            values.join(", ")
        );
        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }

        BuiltQuery {
            sql,
            args: placeholders.into_values(),
        }
    }
}

impl ExecTask for InsertQuery {
    fn exec_query(&self) -> BuiltQuery {
        self.build()
    }
}

/// With `returning` columns, the inserted row can be read back directly.
impl QueryRowTask for InsertQuery {
    fn row_query(&self) -> BuiltQuery {
        self.build()
    }
}

/// `UPDATE <table> SET ... [WHERE ...]`
///
/// Condition placeholders continue after the assignment placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    table: String,
    assignments: Vec<(String, FilterValue)>,
    conditions: Vec<FilterCondition>,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn filters(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let mut placeholders = Placeholders::starting_at(1);
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| format!("{}={}", column, placeholders.render(value)))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        let next_index = placeholders.next_index();
        let mut args = placeholders.into_values();
        args.extend(push_where(&mut sql, &self.conditions, next_index));

        BuiltQuery { sql, args }
    }
}

impl ExecTask for UpdateQuery {
    fn exec_query(&self) -> BuiltQuery {
        self.build()
    }
}

/// `DELETE FROM <table> [WHERE ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    table: String,
    conditions: Vec<FilterCondition>,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let mut sql = format!("DELETE FROM {}", self.table);
        let args = push_where(&mut sql, &self.conditions, 1);
        BuiltQuery { sql, args }
    }
}

impl ExecTask for DeleteQuery {
    fn exec_query(&self) -> BuiltQuery {
        self.build()
    }
}
