use crate::query::error::{IdentifierKind, QueryError};
use crate::query::plan::{Predicate, QuerySpec, Record};
use crate::value::Value;
use serde::Serialize;
use std::fmt::Write as _;

/// Upper bound on bound parameters in one statement (postgres wire limit).
pub const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Select => "SELECT",
            CommandKind::Insert => "INSERT",
            CommandKind::Update => "UPDATE",
            CommandKind::Delete => "DELETE",
        }
    }
}

/// The operation a chain terminates in.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select,
    Insert(Record),
    Update(Record),
    Delete,
}

impl Statement {
    pub fn command(&self) -> CommandKind {
        match self {
            Statement::Select => CommandKind::Select,
            Statement::Insert(_) => CommandKind::Insert,
            Statement::Update(_) => CommandKind::Update,
            Statement::Delete => CommandKind::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    command: CommandKind,
    sql: String,
    inline_sql: String,
    params: Vec<Value>,
}

impl CompiledStatement {
    pub fn command(&self) -> CommandKind {
        self.command
    }

    /// Statement text with `$n` placeholders. This is what gets sent.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Statement text with every placeholder replaced by its literal. For
    /// display and logs only; never executed.
    pub fn to_inline_sql(&self) -> &str {
        &self.inline_sql
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Builds the placeholder text and the inline text side by side so the two
/// can never drift apart.
#[derive(Default)]
struct SqlWriter {
    sql: String,
    inline: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
        self.inline.push_str(s);
    }

    fn push_value(&mut self, value: &Value) {
        self.params.push(value.clone());
        let _ = write!(self.sql, "${}", self.params.len());
        self.inline.push_str(&value.to_sql_literal());
    }

    fn finish(self, command: CommandKind) -> Result<CompiledStatement, QueryError> {
        if self.params.len() > MAX_BIND_PARAMS {
            return Err(QueryError::InvalidQuery {
                reason: format!(
                    "statement binds {} parameters, maximum is {MAX_BIND_PARAMS}",
                    self.params.len()
                ),
            });
        }
        Ok(CompiledStatement {
            command,
            sql: self.sql,
            inline_sql: self.inline,
            params: self.params,
        })
    }
}

/// Renders `spec` as one statement of the given kind.
///
/// Clause order is fixed and absent clauses are omitted. UPDATE and DELETE
/// with no predicates target every row of the table.
pub fn compile(spec: &QuerySpec, statement: &Statement) -> Result<CompiledStatement, QueryError> {
    if let Some(err) = spec.deferred_error() {
        return Err(err.clone());
    }
    validate_identifier(spec.table(), IdentifierKind::Table)?;
    for predicate in spec.predicates() {
        validate_identifier(predicate.column(), IdentifierKind::Column)?;
    }

    let mut w = SqlWriter::default();
    match statement {
        Statement::Select => {
            validate_projection(spec.projection())?;
            w.push_str("SELECT ");
            w.push_str(spec.projection());
            w.push_str(" FROM ");
            w.push_str(spec.table());
            write_where(&mut w, spec.predicates());
            if let Some((column, order)) = spec.order() {
                validate_identifier(column, IdentifierKind::Column)?;
                w.push_str(" ORDER BY ");
                w.push_str(column);
                w.push_str(" ");
                w.push_str(order.as_sql());
            }
            check_row_bound("limit", spec.effective_limit())?;
            check_row_bound("offset", spec.effective_offset())?;
            if let Some(limit) = spec.effective_limit() {
                w.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(offset) = spec.effective_offset() {
                w.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Statement::Insert(record) => {
            validate_record(record, "insert")?;
            w.push_str("INSERT INTO ");
            w.push_str(spec.table());
            w.push_str(" (");
            w.push_str(&record.columns().collect::<Vec<_>>().join(", "));
            w.push_str(") VALUES (");
            for (i, (_, value)) in record.iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                w.push_value(value);
            }
            w.push_str(") RETURNING *");
        }
        Statement::Update(record) => {
            validate_record(record, "update")?;
            w.push_str("UPDATE ");
            w.push_str(spec.table());
            w.push_str(" SET ");
            for (i, (column, value)) in record.iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                w.push_str(column);
                w.push_str(" = ");
                w.push_value(value);
            }
            write_where(&mut w, spec.predicates());
            w.push_str(" RETURNING *");
        }
        Statement::Delete => {
            w.push_str("DELETE FROM ");
            w.push_str(spec.table());
            write_where(&mut w, spec.predicates());
            w.push_str(" RETURNING *");
        }
    }
    w.finish(statement.command())
}

fn write_where(w: &mut SqlWriter, predicates: &[Predicate]) {
    if predicates.is_empty() {
        return;
    }
    w.push_str(" WHERE ");
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            w.push_str(" AND ");
        }
        match predicate {
            Predicate::Compare { column, op, value } => {
                w.push_str(column);
                w.push_str(" ");
                w.push_str(op.as_sql());
                w.push_str(" ");
                w.push_value(value);
            }
            // `IN ()` is rejected by postgres; an empty set matches nothing.
            Predicate::In { values, .. } if values.is_empty() => w.push_str("FALSE"),
            Predicate::In { column, values } => {
                w.push_str(column);
                w.push_str(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        w.push_str(", ");
                    }
                    w.push_value(value);
                }
                w.push_str(")");
            }
        }
    }
}

/// Postgres takes LIMIT and OFFSET as bigint.
fn check_row_bound(clause: &str, bound: Option<u64>) -> Result<(), QueryError> {
    match bound {
        Some(n) if i64::try_from(n).is_err() => Err(QueryError::InvalidQuery {
            reason: format!("{clause} {n} exceeds {}", i64::MAX),
        }),
        _ => Ok(()),
    }
}

fn validate_record(record: &Record, op: &str) -> Result<(), QueryError> {
    if record.is_empty() {
        return Err(QueryError::InvalidQuery {
            reason: format!("{op} requires at least one column"),
        });
    }
    for column in record.columns() {
        validate_identifier(column, IdentifierKind::Column)?;
    }
    Ok(())
}

/// Accepts `name` or `qualifier.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut parts = 0;
    for part in name.split('.') {
        parts += 1;
        if parts > 2 || !is_simple_identifier(part) {
            return false;
        }
    }
    parts > 0
}

fn is_simple_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_identifier(name: &str, kind: IdentifierKind) -> Result<(), QueryError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

/// `*`, or a comma list of `col`, `tbl.col`, `tbl.*`, each optionally
/// followed by `AS alias`.
fn validate_projection(projection: &str) -> Result<(), QueryError> {
    let invalid = || QueryError::InvalidIdentifier {
        kind: IdentifierKind::Projection,
        name: projection.to_string(),
    };
    if projection == "*" {
        return Ok(());
    }
    for item in projection.split(',') {
        let tokens: Vec<&str> = item.split_whitespace().collect();
        let (path, alias) = match tokens.as_slice() {
            [path] => (*path, None),
            [path, kw, alias] if kw.eq_ignore_ascii_case("as") => (*path, Some(*alias)),
            _ => return Err(invalid()),
        };
        let path_ok = match path.strip_suffix(".*") {
            Some(qualifier) => is_simple_identifier(qualifier),
            None => is_identifier(path),
        };
        if !path_ok || alias.is_some_and(|a| !is_simple_identifier(a)) {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CommandKind, Statement, compile, is_identifier};
    use crate::query::error::{IdentifierKind, QueryError};
    use crate::query::plan::{CompareOp, Order, Predicate, QuerySpec, Record};
    use crate::value::{Value, lit};

    fn eq(column: &str, value: Value) -> Predicate {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    #[test]
    fn select_without_state_is_bare() {
        let out = compile(&QuerySpec::new("agents"), &Statement::Select).expect("compile");
        assert_eq!(out.sql(), "SELECT * FROM agents");
        assert!(out.params().is_empty());
        assert_eq!(out.command(), CommandKind::Select);
    }

    #[test]
    fn select_renders_clauses_in_fixed_order() {
        let mut spec = QuerySpec::new("tasks");
        spec.set_range(20, 29);
        spec.set_order("created_at", Order::Desc);
        spec.push_predicate(eq("status", lit("pending")));
        spec.push_predicate(Predicate::Compare {
            column: "owner".into(),
            op: CompareOp::Ne,
            value: lit(7_i64),
        });
        let out = compile(&spec, &Statement::Select).expect("compile");
        assert_eq!(
            out.sql(),
            "SELECT * FROM tasks WHERE status = $1 AND owner != $2 ORDER BY created_at DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            out.to_inline_sql(),
            "SELECT * FROM tasks WHERE status = 'pending' AND owner != 7 ORDER BY created_at DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(out.params(), &[lit("pending"), lit(7_i64)]);
    }

    #[test]
    fn in_list_binds_each_member() {
        let mut spec = QuerySpec::new("tasks");
        spec.push_predicate(Predicate::In {
            column: "id".into(),
            values: vec![lit(1_i64), lit(2_i64), lit(3_i64)],
        });
        let out = compile(&spec, &Statement::Select).expect("compile");
        assert_eq!(out.sql(), "SELECT * FROM tasks WHERE id IN ($1, $2, $3)");
        assert_eq!(out.to_inline_sql(), "SELECT * FROM tasks WHERE id IN (1, 2, 3)");
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut spec = QuerySpec::new("tasks");
        spec.push_predicate(Predicate::In {
            column: "id".into(),
            values: Vec::new(),
        });
        spec.push_predicate(eq("status", lit("done")));
        let out = compile(&spec, &Statement::Select).expect("compile");
        assert_eq!(out.sql(), "SELECT * FROM tasks WHERE FALSE AND status = $1");
    }

    #[test]
    fn insert_uses_record_key_order() {
        let record = Record::new().set("name", "x").set("is_default", false);
        let out = compile(&QuerySpec::new("agents"), &Statement::Insert(record)).expect("compile");
        assert_eq!(
            out.sql(),
            "INSERT INTO agents (name, is_default) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(
            out.to_inline_sql(),
            "INSERT INTO agents (name, is_default) VALUES ('x', FALSE) RETURNING *"
        );
    }

    #[test]
    fn update_numbers_set_values_before_where_values() {
        let mut spec = QuerySpec::new("agents");
        spec.push_predicate(eq("agent_id", lit("a1")));
        let record = Record::new().set("name", "renamed").set("version", 2_i64);
        let out = compile(&spec, &Statement::Update(record)).expect("compile");
        assert_eq!(
            out.sql(),
            "UPDATE agents SET name = $1, version = $2 WHERE agent_id = $3 RETURNING *"
        );
        assert_eq!(out.params().len(), 3);
    }

    #[test]
    fn update_and_delete_without_predicates_target_whole_table() {
        let spec = QuerySpec::new("sessions");
        let update = compile(&spec, &Statement::Update(Record::new().set("active", false)))
            .expect("compile");
        let delete = compile(&spec, &Statement::Delete).expect("compile");
        assert_eq!(update.sql(), "UPDATE sessions SET active = $1 RETURNING *");
        assert_eq!(delete.sql(), "DELETE FROM sessions RETURNING *");
    }

    #[test]
    fn delete_ignores_pagination_and_ordering() {
        let mut spec = QuerySpec::new("threads");
        spec.push_predicate(eq("thread_id", lit("t1")));
        spec.set_order("created_at", Order::Asc);
        spec.set_limit(5);
        let out = compile(&spec, &Statement::Delete).expect("compile");
        assert_eq!(out.sql(), "DELETE FROM threads WHERE thread_id = $1 RETURNING *");
    }

    #[test]
    fn empty_record_is_rejected() {
        let err = compile(&QuerySpec::new("agents"), &Statement::Insert(Record::new()))
            .expect_err("empty insert");
        assert!(matches!(err, QueryError::InvalidQuery { .. }));
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        let mut spec = QuerySpec::new("tasks; DROP TABLE tasks");
        assert!(matches!(
            compile(&spec, &Statement::Select),
            Err(QueryError::InvalidIdentifier {
                kind: IdentifierKind::Table,
                ..
            })
        ));

        spec = QuerySpec::new("tasks");
        spec.push_predicate(eq("status = status OR 1", lit(1_i64)));
        assert!(matches!(
            compile(&spec, &Statement::Select),
            Err(QueryError::InvalidIdentifier {
                kind: IdentifierKind::Column,
                ..
            })
        ));

        spec = QuerySpec::new("tasks");
        spec.set_projection("id, (select 1)");
        assert!(matches!(
            compile(&spec, &Statement::Select),
            Err(QueryError::InvalidIdentifier {
                kind: IdentifierKind::Projection,
                ..
            })
        ));
    }

    #[test]
    fn projection_accepts_qualified_names_and_aliases() {
        let mut spec = QuerySpec::new("agents");
        spec.set_projection("agents.*, name AS display_name, public.agents.id");
        let err = compile(&spec, &Statement::Select).expect_err("three-part name");
        assert!(matches!(err, QueryError::InvalidIdentifier { .. }));

        spec.set_projection("agents.*, name AS display_name, agents.id");
        let out = compile(&spec, &Statement::Select).expect("compile");
        assert_eq!(
            out.sql(),
            "SELECT agents.*, name AS display_name, agents.id FROM agents"
        );
    }

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("created_at"));
        assert!(is_identifier("public.agents"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a.b.c"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("a."));
    }

    #[test]
    fn row_bounds_past_bigint_are_rejected() {
        let mut spec = QuerySpec::new("events");
        spec.set_limit(u64::MAX);
        let err = compile(&spec, &Statement::Select).expect_err("limit too large");
        assert!(matches!(err, QueryError::InvalidQuery { .. }));

        spec.set_range(u64::MAX - 1, u64::MAX - 1);
        let err = compile(&spec, &Statement::Select).expect_err("offset too large");
        assert_eq!(
            err.to_string(),
            format!("invalid query: offset {} exceeds {}", u64::MAX - 1, i64::MAX)
        );

        spec.set_limit(i64::MAX as u64);
        assert!(compile(&spec, &Statement::Select).is_ok());
    }

    #[test]
    fn deferred_range_error_wins_over_everything() {
        let mut spec = QuerySpec::new("bad table");
        spec.set_range(3, 1);
        assert_eq!(
            compile(&spec, &Statement::Select),
            Err(QueryError::InvalidRange { from: 3, to: 1 })
        );
    }
}
