//! Render the query AST to SQL.
//!
//! Output is accumulated into a `String` buffer that is threaded through
//! every clause renderer; concatenation order is the byte order of the
//! final SQL, which is also what fixes parameter placeholder numbering.
//! Parameters referenced from the AST (`Expr::Param`) carry their own
//! index and render as `$ix+1`; only [`Renderer::insert`] assigns numbers
//! itself, threading a counter across rows and values.

use crate::ddl::ColumnType;
use crate::error::RenderError;
use crate::expr::{Expr, FragmentPart, InRhs, IntervalCount, OverWindow};
use crate::query::{
    BoolOp, BooleanExpr, CteSource, Distinct, JoinQual, OrderBy, Query, Source, WindowDef,
};
use crate::{quote_name, quote_table, single_quote};

type Result<T> = std::result::Result<T, RenderError>;

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// SQL type used for map columns and casts.
    pub map_type: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            map_type: "jsonb".to_string(),
        }
    }
}

/// Renders queries and migration commands to PostgreSQL SQL.
///
/// The renderer holds only configuration; every method is a pure function
/// of its input and the renderer can be shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    pub(crate) config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

/// A value slot in an INSERT row.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValue {
    /// Renders as `DEFAULT`
    Default,
    /// Renders as the next `$n`
    Value,
    /// An inlined subquery carrying its expected parameter count, which
    /// advances the row counter past the subquery's own placeholders.
    Query { query: Query, params: usize },
}

/// The ON CONFLICT clause of an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// No clause; conflicts surface as constraint violations.
    Raise,
    /// `ON CONFLICT <target> DO NOTHING`
    Nothing(ConflictTarget),
    /// `ON CONFLICT <target> DO UPDATE SET col = EXCLUDED.col, …`
    Replace {
        fields: Vec<String>,
        target: ConflictTarget,
    },
    /// `ON CONFLICT <target> DO UPDATE SET …` from a full query; the
    /// INSERT target gains an alias so the query can refer to it.
    Update { query: Query, target: ConflictTarget },
}

/// What an ON CONFLICT clause conflicts on.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictTarget {
    None,
    Columns(Vec<String>),
    Constraint(String),
    Fragment(String),
}

/// One WHERE condition of a statement-level update/delete.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `"field" = $n`
    Bind(String),
    /// `"field" IS NULL`
    IsNull(String),
}

impl Filter {
    pub fn bind(field: impl Into<String>) -> Self {
        Filter::Bind(field.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }
}

// ============================================================================
// Source naming
// ============================================================================

/// Alias table for one query: a triple per source, index-aligned with
/// `query.sources`.
#[derive(Debug)]
pub(crate) struct SourceNames(Vec<SourceName>);

#[derive(Debug)]
pub(crate) struct SourceName {
    /// Quoted table for real tables; subqueries and fragments render at
    /// the callsite instead.
    rendered: Option<String>,
    alias: String,
    schema: Option<String>,
}

impl SourceNames {
    pub(crate) fn build(query: &Query) -> Result<Self> {
        let names = query
            .sources
            .iter()
            .enumerate()
            .map(|(ix, source)| {
                Ok(match source {
                    Source::Table {
                        name,
                        schema,
                        prefix,
                    } => SourceName {
                        rendered: Some(quote_table(prefix.as_deref(), name)?),
                        alias: format!("{}{ix}", alias_letter(name)),
                        schema: schema.clone(),
                    },
                    Source::Subquery(_) => SourceName {
                        rendered: None,
                        alias: format!("s{ix}"),
                        schema: None,
                    },
                    Source::Fragment(_) => SourceName {
                        rendered: None,
                        alias: format!("f{ix}"),
                        schema: None,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SourceNames(names))
    }

    fn get(&self, ix: usize) -> &SourceName {
        &self.0[ix]
    }

    fn alias(&self, ix: usize) -> &str {
        &self.0[ix].alias
    }
}

fn alias_letter(name: &str) -> char {
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => c,
        _ => 't',
    }
}

// ============================================================================
// Statement entry points
// ============================================================================

impl Renderer {
    /// Render a SELECT.
    pub fn all(&self, query: &Query) -> Result<String> {
        let mut buf = String::new();
        self.render_all(query, &mut buf)?;
        Ok(buf)
    }

    /// Render an UPDATE driven by a full query (SET operations, joined
    /// sources lowered into FROM, RETURNING from the select list).
    pub fn update_all(&self, query: &Query) -> Result<String> {
        let mut buf = String::new();
        self.render_update_all(query, None, &mut buf)?;
        Ok(buf)
    }

    /// Render a DELETE driven by a full query; joins lower into USING.
    pub fn delete_all(&self, query: &Query) -> Result<String> {
        let mut buf = String::new();
        let sources = SourceNames::build(query)?;
        self.cte(query, &sources, &mut buf)?;
        buf.push_str("DELETE FROM ");
        let (from, alias) = self.get_source(query, &sources, query.from.source)?;
        buf.push_str(&from);
        buf.push_str(" AS ");
        buf.push_str(alias);
        let extra = self.using_join(query, "USING", "delete_all", &sources, &mut buf)?;
        self.where_with(extra, query, &sources, &mut buf)?;
        self.returning_query(query, &sources, &mut buf)?;
        Ok(buf)
    }

    /// Render a multi-row INSERT. Parameter numbering starts at 1 and
    /// advances across rows; `header` empty means all-defaults rows.
    pub fn insert(
        &self,
        prefix: Option<&str>,
        table: &str,
        header: &[&str],
        rows: &[Vec<InsertValue>],
        on_conflict: &OnConflict,
        returning: &[&str],
    ) -> Result<String> {
        let mut buf = String::from("INSERT INTO ");
        buf.push_str(&quote_table(prefix, table)?);
        self.insert_as(on_conflict, &mut buf)?;
        if header.is_empty() {
            buf.push_str(" VALUES ");
            for i in 0..rows.len() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str("(DEFAULT)");
            }
        } else {
            buf.push_str(" (");
            push_quoted_names(header, &mut buf)?;
            buf.push_str(") VALUES ");
            let mut counter = 1usize;
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push('(');
                for (j, value) in row.iter().enumerate() {
                    if j > 0 {
                        buf.push(',');
                    }
                    match value {
                        InsertValue::Default => buf.push_str("DEFAULT"),
                        InsertValue::Query { query, params } => {
                            buf.push('(');
                            self.render_all(query, &mut buf)?;
                            buf.push(')');
                            counter += params;
                        }
                        InsertValue::Value => {
                            buf.push('$');
                            buf.push_str(&counter.to_string());
                            counter += 1;
                        }
                    }
                }
                buf.push(')');
            }
        }
        self.on_conflict(on_conflict, &mut buf)?;
        push_returning(returning, &mut buf)?;
        Ok(buf)
    }

    /// Render a single-row UPDATE by field list and primary-key filters.
    pub fn update(
        &self,
        prefix: Option<&str>,
        table: &str,
        fields: &[&str],
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<String> {
        let mut buf = String::from("UPDATE ");
        buf.push_str(&quote_table(prefix, table)?);
        buf.push_str(" SET ");
        let mut counter = 1usize;
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            buf.push_str(&quote_name(field)?);
            buf.push_str(" = $");
            buf.push_str(&counter.to_string());
            counter += 1;
        }
        buf.push_str(" WHERE ");
        push_filters(filters, &mut counter, &mut buf)?;
        push_returning(returning, &mut buf)?;
        Ok(buf)
    }

    /// Render a single-row DELETE by primary-key filters.
    pub fn delete(
        &self,
        prefix: Option<&str>,
        table: &str,
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<String> {
        let mut buf = String::from("DELETE FROM ");
        buf.push_str(&quote_table(prefix, table)?);
        buf.push_str(" WHERE ");
        let mut counter = 1usize;
        push_filters(filters, &mut counter, &mut buf)?;
        push_returning(returning, &mut buf)?;
        Ok(buf)
    }
}

/// SQL probing for a table in the current schema; returns the statement
/// and its parameter list.
pub fn table_exists_query(table: &str) -> (String, Vec<String>) {
    (
        "SELECT true FROM information_schema.tables \
         WHERE table_name = $1 AND table_schema = current_schema() LIMIT 1"
            .to_string(),
        vec![table.to_string()],
    )
}

// ============================================================================
// Clause renderers
// ============================================================================

impl Renderer {
    pub(crate) fn render_all(&self, query: &Query, buf: &mut String) -> Result<()> {
        let sources = SourceNames::build(query)?;
        self.cte(query, &sources, buf)?;
        buf.push_str("SELECT");
        let distinct_exprs = self.distinct(query.distinct.as_ref(), &sources, buf)?;
        buf.push(' ');
        self.select_fields(query.select.as_deref(), &sources, buf)?;
        self.from(query, &sources, buf)?;
        self.join(query, &sources, buf)?;
        self.boolean(" WHERE ", &query.wheres, &sources, buf)?;
        self.group_by(query, &sources, buf)?;
        self.boolean(" HAVING ", &query.havings, &sources, buf)?;
        self.window(query, &sources, buf)?;
        self.combinations(query, buf)?;
        self.order_by(query, distinct_exprs, &sources, buf)?;
        self.limit(query, &sources, buf)?;
        self.offset(query, &sources, buf)?;
        lock(query, buf);
        Ok(())
    }

    pub(crate) fn render_update_all(
        &self,
        query: &Query,
        head: Option<&str>,
        buf: &mut String,
    ) -> Result<()> {
        let sources = SourceNames::build(query)?;
        self.cte(query, &sources, buf)?;
        match head {
            Some(head) => buf.push_str(head),
            None => {
                let (from, alias) = self.get_source(query, &sources, query.from.source)?;
                buf.push_str("UPDATE ");
                buf.push_str(&from);
                buf.push_str(" AS ");
                buf.push_str(alias);
                buf.push_str(" SET ");
            }
        }
        self.update_fields(query, &sources, buf)?;
        let extra = self.using_join(query, "FROM", "update_all", &sources, buf)?;
        self.where_with(extra, query, &sources, buf)?;
        self.returning_query(query, &sources, buf)
    }

    fn cte(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        let Some(with) = &query.with_ctes else {
            return Ok(());
        };
        if with.queries.is_empty() {
            return Ok(());
        }
        buf.push_str("WITH ");
        if with.recursive {
            buf.push_str("RECURSIVE ");
        }
        for (i, (name, cte)) in with.queries.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            buf.push_str(&quote_name(name)?);
            buf.push_str(" AS ");
            match cte {
                CteSource::Query(query) => {
                    buf.push('(');
                    self.render_all(query, buf)?;
                    buf.push(')');
                }
                CteSource::Expr(expr) => self.expr(expr, sources, buf)?,
            }
        }
        buf.push(' ');
        Ok(())
    }

    fn distinct<'a>(
        &self,
        distinct: Option<&'a Distinct>,
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<&'a [OrderBy]> {
        match distinct {
            None => Ok(&[]),
            Some(Distinct::Plain) => {
                buf.push_str(" DISTINCT");
                Ok(&[])
            }
            Some(Distinct::On(exprs)) if exprs.is_empty() => Ok(&[]),
            Some(Distinct::On(exprs)) => {
                buf.push_str(" DISTINCT ON (");
                for (i, order) in exprs.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    self.expr(&order.expr, sources, buf)?;
                }
                buf.push(')');
                Ok(exprs)
            }
        }
    }

    fn select_fields(
        &self,
        fields: Option<&[Expr]>,
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<()> {
        let fields = fields.unwrap_or(&[]);
        if fields.is_empty() {
            buf.push_str("TRUE");
            return Ok(());
        }
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            match field {
                Expr::SourceRef(ix) => {
                    let source = sources.get(*ix);
                    if source.schema.is_none() {
                        return Err(RenderError::MissingSchema {
                            source_name: source
                                .rendered
                                .clone()
                                .unwrap_or_else(|| source.alias.clone()),
                        });
                    }
                    buf.push_str(&source.alias);
                }
                other => self.expr(other, sources, buf)?,
            }
        }
        Ok(())
    }

    fn from(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if !query.from.hints.is_empty() {
            return Err(RenderError::unsupported(
                "table hints are not supported by PostgreSQL",
            ));
        }
        let (from, alias) = self.get_source(query, sources, query.from.source)?;
        buf.push_str(" FROM ");
        buf.push_str(&from);
        buf.push_str(" AS ");
        buf.push_str(alias);
        Ok(())
    }

    fn join(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        for join in &query.joins {
            if !join.hints.is_empty() {
                return Err(RenderError::unsupported(
                    "table hints are not supported by PostgreSQL",
                ));
            }
            buf.push(' ');
            buf.push_str(join.qual.as_sql());
            let (source, alias) = self.get_source(query, sources, join.source)?;
            buf.push_str(&source);
            buf.push_str(" AS ");
            buf.push_str(alias);
            if join.qual != JoinQual::Cross {
                buf.push_str(" ON ");
                self.paren_expr(&join.on, sources, buf)?;
            }
        }
        Ok(())
    }

    /// Lower joins into a FROM/USING clause for UPDATE/DELETE; only inner
    /// joins can be expressed there. Returns the ON expressions to be
    /// folded into WHERE.
    fn using_join(
        &self,
        query: &Query,
        prefix: &str,
        kind: &str,
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<Vec<BooleanExpr>> {
        if query.joins.is_empty() {
            return Ok(Vec::new());
        }
        buf.push(' ');
        buf.push_str(prefix);
        buf.push(' ');
        for (i, join) in query.joins.iter().enumerate() {
            if join.qual != JoinQual::Inner {
                return Err(RenderError::unsupported(format!(
                    "PostgreSQL supports only inner joins on {kind}"
                )));
            }
            if i > 0 {
                buf.push_str(", ");
            }
            let (source, alias) = self.get_source(query, sources, join.source)?;
            buf.push_str(&source);
            buf.push_str(" AS ");
            buf.push_str(alias);
        }
        Ok(query
            .joins
            .iter()
            .filter(|join| join.on != Expr::Bool(true))
            .map(|join| BooleanExpr {
                op: BoolOp::And,
                expr: join.on.clone(),
            })
            .collect())
    }

    fn where_with(
        &self,
        mut extra: Vec<BooleanExpr>,
        query: &Query,
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<()> {
        extra.extend(query.wheres.iter().cloned());
        self.boolean(" WHERE ", &extra, sources, buf)
    }

    /// Render a boolean clause. Runs of the same operator flatten; when
    /// the operator changes, the accumulated left side is wrapped in
    /// parentheses so precedence stays visible.
    fn boolean(
        &self,
        name: &str,
        exprs: &[BooleanExpr],
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<()> {
        let Some((first, rest)) = exprs.split_first() else {
            return Ok(());
        };
        let mut acc = String::new();
        self.paren_expr(&first.expr, sources, &mut acc)?;
        let mut current = first.op;
        for clause in rest {
            if clause.op != current {
                acc.insert(0, '(');
                acc.push(')');
                current = clause.op;
            }
            acc.push_str(match clause.op {
                BoolOp::And => " AND ",
                BoolOp::Or => " OR ",
            });
            self.paren_expr(&clause.expr, sources, &mut acc)?;
        }
        buf.push_str(name);
        buf.push_str(&acc);
        Ok(())
    }

    fn group_by(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if query.group_bys.is_empty() {
            return Ok(());
        }
        buf.push_str(" GROUP BY ");
        for (i, expr) in query.group_bys.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            self.expr(expr, sources, buf)?;
        }
        Ok(())
    }

    fn window(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if query.windows.is_empty() {
            return Ok(());
        }
        buf.push_str(" WINDOW ");
        for (i, (name, def)) in query.windows.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            buf.push_str(&quote_name(name)?);
            buf.push_str(" AS ");
            self.window_def(def, sources, buf)?;
        }
        Ok(())
    }

    fn window_def(&self, def: &WindowDef, sources: &SourceNames, buf: &mut String) -> Result<()> {
        buf.push('(');
        let mut wrote = false;
        if !def.partition_by.is_empty() {
            buf.push_str("PARTITION BY ");
            for (i, expr) in def.partition_by.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                self.expr(expr, sources, buf)?;
            }
            wrote = true;
        }
        if !def.order_by.is_empty() {
            if wrote {
                buf.push(' ');
            }
            buf.push_str("ORDER BY ");
            for (i, order) in def.order_by.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                self.order_by_expr(order, sources, buf)?;
            }
            wrote = true;
        }
        if let Some(frame) = &def.frame {
            if wrote {
                buf.push(' ');
            }
            self.expr(frame, sources, buf)?;
        }
        buf.push(')');
        Ok(())
    }

    fn combinations(&self, query: &Query, buf: &mut String) -> Result<()> {
        for (kind, combined) in &query.combinations {
            buf.push(' ');
            buf.push_str(kind.as_sql());
            buf.push_str(" (");
            self.render_all(combined, buf)?;
            buf.push(')');
        }
        Ok(())
    }

    fn order_by(
        &self,
        query: &Query,
        distinct: &[OrderBy],
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<()> {
        let merged = order_by_concat(distinct, &query.order_bys);
        if merged.is_empty() {
            return Ok(());
        }
        buf.push_str(" ORDER BY ");
        for (i, order) in merged.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            self.order_by_expr(order, sources, buf)?;
        }
        Ok(())
    }

    fn order_by_expr(&self, order: &OrderBy, sources: &SourceNames, buf: &mut String) -> Result<()> {
        self.expr(&order.expr, sources, buf)?;
        buf.push_str(order.dir.suffix());
        Ok(())
    }

    fn limit(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if let Some(limit) = &query.limit {
            buf.push_str(" LIMIT ");
            self.expr(limit, sources, buf)?;
        }
        Ok(())
    }

    fn offset(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if let Some(offset) = &query.offset {
            buf.push_str(" OFFSET ");
            self.expr(offset, sources, buf)?;
        }
        Ok(())
    }

    fn update_fields(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        use crate::query::UpdateKind;

        for (i, op) in query.updates.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            buf.push_str(&quote_name(&op.field)?);
            buf.push_str(" = ");
            let qualified = |buf: &mut String| -> Result<()> {
                buf.push_str(sources.alias(query.from.source));
                buf.push('.');
                buf.push_str(&quote_name(&op.field)?);
                Ok(())
            };
            match op.kind {
                UpdateKind::Set => self.expr(&op.value, sources, buf)?,
                UpdateKind::Inc => {
                    qualified(buf)?;
                    buf.push_str(" + ");
                    self.expr(&op.value, sources, buf)?;
                }
                UpdateKind::Push => {
                    buf.push_str("array_append(");
                    qualified(buf)?;
                    buf.push_str(", ");
                    self.expr(&op.value, sources, buf)?;
                    buf.push(')');
                }
                UpdateKind::Pull => {
                    buf.push_str("array_remove(");
                    qualified(buf)?;
                    buf.push_str(", ");
                    self.expr(&op.value, sources, buf)?;
                    buf.push(')');
                }
            }
        }
        Ok(())
    }

    fn returning_query(&self, query: &Query, sources: &SourceNames, buf: &mut String) -> Result<()> {
        let Some(fields) = &query.select else {
            return Ok(());
        };
        buf.push_str(" RETURNING ");
        self.select_fields(Some(fields), sources, buf)
    }

    fn insert_as(&self, on_conflict: &OnConflict, buf: &mut String) -> Result<()> {
        if let OnConflict::Update { query, .. } = on_conflict {
            let sources = SourceNames::build(query)?;
            buf.push_str(" AS ");
            buf.push_str(sources.alias(query.from.source));
        }
        Ok(())
    }

    fn on_conflict(&self, on_conflict: &OnConflict, buf: &mut String) -> Result<()> {
        match on_conflict {
            OnConflict::Raise => Ok(()),
            OnConflict::Nothing(target) => {
                buf.push_str(" ON CONFLICT ");
                self.conflict_target(target, buf)?;
                buf.push_str("DO NOTHING");
                Ok(())
            }
            OnConflict::Replace { fields, target } => {
                buf.push_str(" ON CONFLICT ");
                self.conflict_target(target, buf)?;
                buf.push_str("DO UPDATE SET ");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    let quoted = quote_name(field)?;
                    buf.push_str(&quoted);
                    buf.push_str(" = EXCLUDED.");
                    buf.push_str(&quoted);
                }
                Ok(())
            }
            OnConflict::Update { query, target } => {
                buf.push_str(" ON CONFLICT ");
                self.conflict_target(target, buf)?;
                buf.push_str("DO ");
                self.render_update_all(query, Some("UPDATE SET "), buf)
            }
        }
    }

    fn conflict_target(&self, target: &ConflictTarget, buf: &mut String) -> Result<()> {
        match target {
            ConflictTarget::None => {}
            ConflictTarget::Columns(columns) => {
                buf.push('(');
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                push_quoted_names(&names, buf)?;
                buf.push_str(") ");
            }
            ConflictTarget::Constraint(name) => {
                buf.push_str("ON CONSTRAINT ");
                buf.push_str(&quote_name(name)?);
                buf.push(' ');
            }
            ConflictTarget::Fragment(fragment) => {
                buf.push_str(fragment);
                buf.push(' ');
            }
        }
        Ok(())
    }

    fn get_source<'a>(
        &self,
        query: &Query,
        sources: &'a SourceNames,
        ix: usize,
    ) -> Result<(String, &'a str)> {
        let entry = sources.get(ix);
        let rendered = match (&entry.rendered, &query.sources[ix]) {
            (Some(rendered), _) => rendered.clone(),
            (None, Source::Subquery(subquery)) => {
                let mut out = String::from("(");
                self.render_all(subquery, &mut out)?;
                out.push(')');
                out
            }
            (None, Source::Fragment(parts)) => {
                let mut out = String::new();
                self.fragment(parts, sources, &mut out)?;
                out
            }
            (None, Source::Table { name, prefix, .. }) => quote_table(prefix.as_deref(), name)?,
        };
        Ok((rendered, &entry.alias))
    }
}

fn lock(query: &Query, buf: &mut String) {
    if let Some(lock) = &query.lock {
        buf.push(' ');
        buf.push_str(lock);
    }
}

/// Merge DISTINCT ON expressions with the explicit ORDER BY list: a shared
/// leading prefix is emitted once.
fn order_by_concat<'a>(left: &'a [OrderBy], right: &'a [OrderBy]) -> Vec<&'a OrderBy> {
    match (left.split_first(), right.split_first()) {
        (Some((l, left_rest)), Some((r, right_rest))) if l == r => {
            let mut merged = vec![l];
            merged.extend(order_by_concat(left_rest, right_rest));
            merged
        }
        _ => left.iter().chain(right.iter()).collect(),
    }
}

fn push_quoted_names(names: &[&str], buf: &mut String) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push_str(&quote_name(name)?);
    }
    Ok(())
}

fn push_returning(returning: &[&str], buf: &mut String) -> Result<()> {
    if returning.is_empty() {
        return Ok(());
    }
    buf.push_str(" RETURNING ");
    push_quoted_names(returning, buf)
}

fn push_filters(filters: &[Filter], counter: &mut usize, buf: &mut String) -> Result<()> {
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            buf.push_str(" AND ");
        }
        match filter {
            Filter::Bind(field) => {
                buf.push_str(&quote_name(field)?);
                buf.push_str(" = $");
                buf.push_str(&counter.to_string());
                *counter += 1;
            }
            Filter::IsNull(field) => {
                buf.push_str(&quote_name(field)?);
                buf.push_str(" IS NULL");
            }
        }
    }
    Ok(())
}

// ============================================================================
// Expressions
// ============================================================================

impl Renderer {
    pub(crate) fn expr(&self, expr: &Expr, sources: &SourceNames, buf: &mut String) -> Result<()> {
        match expr {
            Expr::Integer(value) => buf.push_str(&value.to_string()),
            Expr::Float(value) => {
                buf.push_str(&format!("{value:?}"));
                buf.push_str("::float");
            }
            Expr::Bool(true) => buf.push_str("TRUE"),
            Expr::Bool(false) => buf.push_str("FALSE"),
            Expr::Null => buf.push_str("NULL"),
            Expr::String(value) => buf.push_str(&single_quote(value)),
            Expr::Decimal(value) => buf.push_str(&value.to_string()),
            Expr::Bytes(bytes) => {
                buf.push_str("'\\x");
                for byte in bytes {
                    buf.push_str(&format!("{byte:02x}"));
                }
                buf.push_str("'::bytea");
            }
            Expr::Tagged { value, ty } => {
                self.expr(value, sources, buf)?;
                buf.push_str("::");
                buf.push_str(&self.tagged_type(ty));
            }
            Expr::Param(ix) => {
                buf.push('$');
                buf.push_str(&(ix + 1).to_string());
            }
            Expr::Field { source, field } => {
                buf.push_str(sources.alias(*source));
                buf.push('.');
                buf.push_str(&quote_name(field)?);
            }
            Expr::SourceRef(ix) => buf.push_str(sources.alias(*ix)),
            Expr::Subquery(query) => {
                buf.push('(');
                self.render_all(query, buf)?;
                buf.push(')');
            }
            Expr::Binary { op, left, right } => {
                self.binary_operand(left, sources, buf)?;
                buf.push(' ');
                buf.push_str(op.as_sql());
                buf.push(' ');
                self.binary_operand(right, sources, buf)?;
            }
            Expr::Call {
                name,
                args,
                distinct,
            } => {
                buf.push_str(name);
                buf.push('(');
                if *distinct {
                    buf.push_str("DISTINCT ");
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    self.expr(arg, sources, buf)?;
                }
                buf.push(')');
            }
            Expr::In { left, rhs } => match rhs {
                InRhs::List(items) if items.is_empty() => buf.push_str("false"),
                InRhs::List(items) => {
                    self.expr(left, sources, buf)?;
                    buf.push_str(" IN (");
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            buf.push(',');
                        }
                        self.expr(item, sources, buf)?;
                    }
                    buf.push(')');
                }
                InRhs::Param(ix) => {
                    self.expr(left, sources, buf)?;
                    buf.push_str(" = ANY($");
                    buf.push_str(&(ix + 1).to_string());
                    buf.push(')');
                }
                InRhs::Subquery(query) => {
                    self.expr(left, sources, buf)?;
                    buf.push_str(" = ANY((");
                    self.render_all(query, buf)?;
                    buf.push_str("))");
                }
            },
            Expr::IsNull(inner) => {
                self.expr(inner, sources, buf)?;
                buf.push_str(" IS NULL");
            }
            Expr::Not(inner) => {
                buf.push_str("NOT (");
                self.expr(inner, sources, buf)?;
                buf.push(')');
            }
            Expr::Fragment(parts) => self.fragment(parts, sources, buf)?,
            Expr::DatetimeAdd {
                datetime,
                count,
                unit,
            } => {
                self.expr(datetime, sources, buf)?;
                push_cast_unless_tagged(datetime, "timestamp", buf);
                buf.push_str(" + ");
                self.interval(count, unit, sources, buf)?;
            }
            Expr::DateAdd { date, count, unit } => {
                buf.push('(');
                self.expr(date, sources, buf)?;
                push_cast_unless_tagged(date, "date", buf);
                buf.push_str(" + ");
                self.interval(count, unit, sources, buf)?;
                buf.push_str(")::date");
            }
            Expr::Filter { agg, condition } => {
                self.expr(agg, sources, buf)?;
                buf.push_str(" FILTER (WHERE ");
                self.expr(condition, sources, buf)?;
                buf.push(')');
            }
            Expr::Over { agg, window } => {
                self.expr(agg, sources, buf)?;
                buf.push_str(" OVER ");
                match window {
                    OverWindow::Name(name) => buf.push_str(&quote_name(name)?),
                    OverWindow::Def(def) => self.window_def(def, sources, buf)?,
                }
            }
            Expr::CountStar => buf.push_str("count(*)"),
            Expr::List(items) => {
                buf.push_str("ARRAY[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    self.expr(item, sources, buf)?;
                }
                buf.push(']');
            }
            Expr::Tuple(items) => {
                buf.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    self.expr(item, sources, buf)?;
                }
                buf.push(')');
            }
        }
        Ok(())
    }

    fn paren_expr(&self, expr: &Expr, sources: &SourceNames, buf: &mut String) -> Result<()> {
        buf.push('(');
        self.expr(expr, sources, buf)?;
        buf.push(')');
        Ok(())
    }

    /// Operands that are themselves binary operations are parenthesized so
    /// nesting stays unambiguous.
    fn binary_operand(&self, expr: &Expr, sources: &SourceNames, buf: &mut String) -> Result<()> {
        if matches!(expr, Expr::Binary { .. }) {
            self.paren_expr(expr, sources, buf)
        } else {
            self.expr(expr, sources, buf)
        }
    }

    fn fragment(&self, parts: &[FragmentPart], sources: &SourceNames, buf: &mut String) -> Result<()> {
        let wrap = matches!(parts.first(), Some(FragmentPart::Raw(raw)) if starts_with_select(raw));
        if wrap {
            buf.push('(');
        }
        for part in parts {
            match part {
                FragmentPart::Raw(raw) => buf.push_str(raw),
                FragmentPart::Expr(expr) => self.expr(expr, sources, buf)?,
            }
        }
        if wrap {
            buf.push(')');
        }
        Ok(())
    }

    fn interval(
        &self,
        count: &IntervalCount,
        unit: &str,
        sources: &SourceNames,
        buf: &mut String,
    ) -> Result<()> {
        match count {
            IntervalCount::Int(count) => {
                buf.push_str("interval '");
                buf.push_str(&count.to_string());
                buf.push(' ');
                buf.push_str(unit);
                buf.push('\'');
            }
            IntervalCount::Float(count) => {
                buf.push_str("interval '");
                buf.push_str(&format!("{count:?}"));
                buf.push(' ');
                buf.push_str(unit);
                buf.push('\'');
            }
            IntervalCount::Expr(count) => {
                buf.push('(');
                self.expr(count, sources, buf)?;
                buf.push_str("::numeric * interval '1 ");
                buf.push_str(unit);
                buf.push_str("')");
            }
        }
        Ok(())
    }

    /// Database type for a cast. Plain integers widen to `bigint` so the
    /// cast never truncates a larger parameter.
    fn tagged_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Id | ColumnType::Integer => "bigint".to_string(),
            ColumnType::Array(inner) => format!("{}[]", self.tagged_type(inner)),
            other => self.db_type(other),
        }
    }
}

/// Cast `expr` to `ty` unless it already carries an explicit type tag.
fn push_cast_unless_tagged(expr: &Expr, ty: &str, buf: &mut String) {
    if !matches!(expr, Expr::Tagged { .. }) {
        buf.push_str("::");
        buf.push_str(ty);
    }
}

/// The scalar-subquery heuristic: a fragment whose first raw part starts
/// with `select` needs parentheses to be usable inside an expression.
/// A first part that is pure whitespace defeats the check; that asymmetry
/// is intentional and load-bearing for existing fragments.
fn starts_with_select(raw: &str) -> bool {
    raw.len() > 6
        && raw.is_char_boundary(6)
        && raw[..6].eq_ignore_ascii_case("select")
        && raw[6..].starts_with(|c: char| c.is_ascii_whitespace())
}

// ============================================================================
// Tests
// ============================================================================
