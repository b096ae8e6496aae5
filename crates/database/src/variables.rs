use std::fmt;

/// A value the database computes itself.
///
/// Variables are written into the statement text verbatim and never bound as
/// parameters. The set is closed: anything that is not one of these variants is a
/// literal and goes through a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseVariable {
    /// `CURRENT_TIMESTAMP AT TIME ZONE 'utc'`
    CurrentTimestampUtc,
    /// `uuid_generate_v4()`
    UuidGenerateV4,
    /// `lastval()`
    LastVal,
    /// SQL `NULL`.
    Null,
    /// `nextval('<sequence>')`
    NextVal(String),
}

impl DatabaseVariable {
    /// The next value of the named sequence.
    pub fn next_val(sequence: impl Into<String>) -> Self {
        DatabaseVariable::NextVal(sequence.into())
    }

    /// Renders the SQL fragment for this variable.
    pub fn to_sql(&self) -> String {
        match self {
            DatabaseVariable::CurrentTimestampUtc => "CURRENT_TIMESTAMP AT TIME ZONE 'utc'".to_string(),
            DatabaseVariable::UuidGenerateV4 => "uuid_generate_v4()".to_string(),
            DatabaseVariable::LastVal => "lastval()".to_string(),
            DatabaseVariable::Null => "NULL".to_string(),
            // Sequence names end up inside a string literal.
            DatabaseVariable::NextVal(sequence) => {
                format!("nextval('{}')", sequence.replace('\'', "''"))
            }
        }
    }
}

impl fmt::Display for DatabaseVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
