use crate::envelope::{Envelope, EnvelopeError, QueryData};
use crate::error::ShimError;
use crate::query::compiler::{CompiledStatement, Statement, compile};
use crate::query::error::QueryError;
use crate::query::executor::{Executor, shape_rows};
use crate::query::plan::{CompareOp, Order, OrderOptions, Predicate, QuerySpec, Record};
use crate::value::IntoValue;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;

/// Fluent handle for one chain against one table.
///
/// Chain methods never fail; bad input is reported by the terminal trigger.
/// Awaiting the handle runs it, as does [`TableQuery::execute`], which can be
/// called repeatedly and recompiles only if the chain changed in between.
pub struct TableQuery {
    executor: Arc<Executor>,
    spec: QuerySpec,
    statement: Statement,
    statement_revision: u64,
    compiled: Mutex<Option<MemoizedStatement>>,
}

struct MemoizedStatement {
    key: (u64, u64),
    statement: Arc<CompiledStatement>,
}

impl TableQuery {
    pub(crate) fn new(executor: Arc<Executor>, table: impl Into<String>) -> Self {
        Self {
            executor,
            spec: QuerySpec::new(table),
            statement: Statement::Select,
            statement_revision: 0,
            compiled: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn select(mut self, projection: &str) -> Self {
        self.spec.set_projection(projection);
        self
    }

    pub fn eq<V: IntoValue>(self, column: &str, value: V) -> Self {
        self.compare(column, CompareOp::Eq, value)
    }

    pub fn equals<V: IntoValue>(self, column: &str, value: V) -> Self {
        self.eq(column, value)
    }

    pub fn neq<V: IntoValue>(self, column: &str, value: V) -> Self {
        self.compare(column, CompareOp::Ne, value)
    }

    pub fn not_equals<V: IntoValue>(self, column: &str, value: V) -> Self {
        self.neq(column, value)
    }

    /// `pattern` is bound as-is; `%` and `_` keep their wildcard meaning.
    pub fn like(self, column: &str, pattern: &str) -> Self {
        self.compare(column, CompareOp::Like, pattern)
    }

    pub fn in_<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.spec.push_predicate(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(IntoValue::into_value).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.spec.set_order(column, order);
        self
    }

    pub fn order(self, column: &str, options: OrderOptions) -> Self {
        self.order_by(column, Order::from_ascending(options.ascending))
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.spec.set_limit(count);
        self
    }

    /// Inclusive, zero-based row range.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.spec.set_range(from, to);
        self
    }

    pub fn single(mut self) -> Self {
        self.spec.set_single_row();
        self
    }

    pub fn insert(self, record: Record) -> Self {
        self.with_statement(Statement::Insert(record))
    }

    /// Like [`TableQuery::insert`] for a JSON object; key order is kept.
    pub fn insert_json(self, record: JsonValue) -> Self {
        match Record::try_from(record) {
            Ok(record) => self.insert(record),
            Err(err) => self.defer(err),
        }
    }

    /// Updates every row matched by the accumulated filters, or every row of
    /// the table when there are none.
    pub fn update(self, record: Record) -> Self {
        self.with_statement(Statement::Update(record))
    }

    pub fn update_json(self, record: JsonValue) -> Self {
        match Record::try_from(record) {
            Ok(record) => self.update(record),
            Err(err) => self.defer(err),
        }
    }

    /// Deletes every row matched by the accumulated filters, or every row of
    /// the table when there are none. Deleted rows are returned.
    pub fn delete(self) -> Self {
        self.with_statement(Statement::Delete)
    }

    /// Compiles the chain, reusing the previous output if nothing changed.
    pub fn compile(&self) -> Result<Arc<CompiledStatement>, QueryError> {
        let key = (self.spec.revision(), self.statement_revision);
        let mut memo = self.compiled.lock();
        if let Some(m) = memo.as_ref().filter(|m| m.key == key) {
            return Ok(Arc::clone(&m.statement));
        }
        let statement = Arc::new(compile(&self.spec, &self.statement)?);
        *memo = Some(MemoizedStatement {
            key,
            statement: Arc::clone(&statement),
        });
        Ok(statement)
    }

    pub async fn execute(&self) -> Envelope<QueryData> {
        let compiled = match self.compile() {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!(table = self.spec.table(), error = %err, "chain rejected before dispatch");
                return Envelope::err(ShimError::from(err));
            }
        };
        match self.executor.run(self.spec.table(), &compiled).await {
            Ok(outcome) => Envelope {
                data: shape_rows(compiled.command(), self.spec.is_single_row(), outcome.rows),
                error: None,
            },
            Err(err) => Envelope::err(err),
        }
    }

    /// Runs the chain and keeps only the data slot.
    pub async fn data(&self) -> Option<QueryData> {
        self.execute().await.data
    }

    /// Runs the chain and keeps only the error slot.
    pub async fn error(&self) -> Option<EnvelopeError> {
        self.execute().await.error
    }

    fn compare<V: IntoValue>(mut self, column: &str, op: CompareOp, value: V) -> Self {
        self.spec.push_predicate(Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into_value(),
        });
        self
    }

    fn with_statement(mut self, statement: Statement) -> Self {
        self.statement = statement;
        self.statement_revision = self.statement_revision.wrapping_add(1);
        self
    }

    fn defer(mut self, err: QueryError) -> Self {
        self.spec.defer_error(err);
        self
    }
}

impl IntoFuture for TableQuery {
    type Output = Envelope<QueryData>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.execute().await })
    }
}

impl std::fmt::Debug for TableQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableQuery")
            .field("spec", &self.spec)
            .field("statement", &self.statement.command())
            .finish()
    }
}
