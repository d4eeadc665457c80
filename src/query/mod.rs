pub mod compiler;
pub mod error;
pub mod executor;
pub mod plan;

pub use compiler::{CommandKind, CompiledStatement, Statement, compile};
pub use error::QueryError;
pub use executor::{
    Executor, HealthReport, HealthStatus, QueryOutcome, QueryTelemetryEvent, QueryTelemetryHook,
};
pub use plan::{Order, OrderOptions, QuerySpec, Record};
