//! Builds the body of a parameterized `WHERE` clause from structured conditions.

use crate::values::{FilterValue, SqlValue};

/// The token placed after a condition. The last condition normally has `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connector {
    And,
    Or,
    #[default]
    None,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::None => "",
        }
    }
}

/// One `column = value` test plus the connector that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub value: FilterValue,
    pub connector: Connector,
}

impl FilterCondition {
    pub fn new(
        column: impl Into<String>,
        value: impl Into<FilterValue>,
        connector: Connector,
    ) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            connector,
        }
    }
}

/// Hands out `$n` placeholders and collects the literals bound to them.
///
/// Database variables are rendered inline and leave the counter untouched.
#[derive(Debug)]
pub(crate) struct Placeholders {
    next: usize,
    values: Vec<SqlValue>,
}

impl Placeholders {
    pub(crate) fn starting_at(index: usize) -> Self {
        Self {
            next: index,
            values: Vec::new(),
        }
    }

    pub(crate) fn render(&mut self, value: &FilterValue) -> String {
        match value {
            FilterValue::Variable(variable) => variable.to_sql(),
            FilterValue::Literal(literal) => {
                let placeholder = format!("${}", self.next);
                self.values.push(literal.clone());
                self.next += 1;
                placeholder
            }
        }
    }

    pub(crate) fn next_index(&self) -> usize {
        self.next
    }

    pub(crate) fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Turns `conditions` into `(bound_values, clause_text)`.
///
/// Placeholders are numbered from `start_index`. The text has no leading `WHERE`;
/// callers splice it into their statement and append `bound_values` after any
/// parameters they already bound.
pub fn build_where_body(
    conditions: &[FilterCondition],
    start_index: usize,
) -> (Vec<SqlValue>, String) {
    let mut placeholders = Placeholders::starting_at(start_index);
    let mut tokens: Vec<String> = Vec::with_capacity(conditions.len() * 2);

    for condition in conditions {
        let value_text = placeholders.render(&condition.value);
        tokens.push(format!("{}={}", condition.column, value_text));

        let connector = condition.connector.as_sql();
        if !connector.is_empty() {
            tokens.push(connector.to_string());
        }
    }

    (placeholders.into_values(), tokens.join(" "))
}
