use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: IdentifierKind, name: String },
    InvalidRange { from: u64, to: u64 },
    InvalidQuery { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Projection,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Table => write!(f, "table"),
            IdentifierKind::Column => write!(f, "column"),
            IdentifierKind::Projection => write!(f, "projection"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, name } => {
                write!(f, "invalid {kind} identifier '{name}'")
            }
            QueryError::InvalidRange { from, to } => {
                write!(f, "invalid range: from {from} is past to {to}")
            }
            QueryError::InvalidQuery { reason } => write!(f, "invalid query: {reason}"),
        }
    }
}

impl std::error::Error for QueryError {}
