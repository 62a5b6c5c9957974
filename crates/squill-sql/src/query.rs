//! The query AST consumed by the renderer.
//!
//! A [`Query`] is a normalized description of one SELECT (or of the query
//! part of an UPDATE/DELETE): every table, subquery or fragment it touches
//! sits in `sources`, and the FROM clause and joins refer to sources by
//! index. Expressions refer to sources the same way, which is what lets
//! the renderer assign stable aliases up front.

use crate::expr::{Expr, FragmentPart};

/// A normalized query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub sources: Vec<Source>,
    pub from: From,
    pub joins: Vec<Join>,
    pub wheres: Vec<BooleanExpr>,
    pub havings: Vec<BooleanExpr>,
    pub group_bys: Vec<Expr>,
    pub order_bys: Vec<OrderBy>,
    pub windows: Vec<(String, WindowDef)>,
    pub with_ctes: Option<WithCtes>,
    pub combinations: Vec<(Combination, Query)>,
    pub distinct: Option<Distinct>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub lock: Option<String>,
    /// Select field list. `None` means no projection was given; an empty
    /// list renders as `SELECT TRUE`.
    pub select: Option<Vec<Expr>>,
    /// SET operations for UPDATE rendering.
    pub updates: Vec<UpdateOp>,
}

/// An entity in FROM/JOIN position.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Table {
        name: String,
        /// Tag of the data shape mapped onto this table, when one exists.
        /// Selecting a whole source (`Expr::SourceRef`) requires it.
        schema: Option<String>,
        prefix: Option<String>,
    },
    Subquery(Box<Query>),
    Fragment(Vec<FragmentPart>),
}

impl Source {
    pub fn table(name: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            schema: None,
            prefix: None,
        }
    }

    pub fn schema_table(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            schema: Some(schema.into()),
            prefix: None,
        }
    }
}

/// The FROM clause: a source index plus table hints.
///
/// Hints must stay empty; PostgreSQL has no hint syntax and the renderer
/// rejects them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct From {
    pub source: usize,
    pub hints: Vec<String>,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub qual: JoinQual,
    pub source: usize,
    pub on: Expr,
    pub hints: Vec<String>,
}

/// Join qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinQual {
    Inner,
    InnerLateral,
    Left,
    LeftLateral,
    Right,
    Full,
    Cross,
}

impl JoinQual {
    /// The SQL keywords for this qualifier, including the trailing space.
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinQual::Inner => "INNER JOIN ",
            JoinQual::InnerLateral => "INNER JOIN LATERAL ",
            JoinQual::Left => "LEFT OUTER JOIN ",
            JoinQual::LeftLateral => "LEFT OUTER JOIN LATERAL ",
            JoinQual::Right => "RIGHT OUTER JOIN ",
            JoinQual::Full => "FULL OUTER JOIN ",
            JoinQual::Cross => "CROSS JOIN ",
        }
    }
}

/// One conjunct/disjunct of a WHERE or HAVING clause.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpr {
    pub op: BoolOp,
    pub expr: Expr,
}

/// How a [`BooleanExpr`] combines with the clause accumulated before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// An ORDER BY element.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub dir: OrderDir,
    pub expr: Expr,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            dir: OrderDir::Asc,
            expr,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            dir: OrderDir::Desc,
            expr,
        }
    }
}

/// Sort direction. Plain ascending is implicit in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    AscNullsFirst,
    AscNullsLast,
    Desc,
    DescNullsFirst,
    DescNullsLast,
}

impl OrderDir {
    /// Direction suffix, empty for plain ascending.
    pub fn suffix(self) -> &'static str {
        match self {
            OrderDir::Asc => "",
            OrderDir::AscNullsFirst => " ASC NULLS FIRST",
            OrderDir::AscNullsLast => " ASC NULLS LAST",
            OrderDir::Desc => " DESC",
            OrderDir::DescNullsFirst => " DESC NULLS FIRST",
            OrderDir::DescNullsLast => " DESC NULLS LAST",
        }
    }
}

/// A named window definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowDef {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    /// Frame clause, e.g. a fragment holding `ROWS BETWEEN …`.
    pub frame: Option<Box<Expr>>,
}

/// The WITH clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WithCtes {
    pub recursive: bool,
    pub queries: Vec<(String, CteSource)>,
}

/// Body of one common table expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CteSource {
    Query(Box<Query>),
    Expr(Expr),
}

/// SELECT distinctness.
#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    Plain,
    /// `DISTINCT ON (…)`; the expressions are also prepended to ORDER BY.
    On(Vec<OrderBy>),
}

/// A set operation appended to a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    Union,
    UnionAll,
    Except,
    ExceptAll,
    Intersect,
    IntersectAll,
}

impl Combination {
    /// The SQL keywords for this set operation.
    pub fn as_sql(self) -> &'static str {
        match self {
            Combination::Union => "UNION",
            Combination::UnionAll => "UNION ALL",
            Combination::Except => "EXCEPT",
            Combination::ExceptAll => "EXCEPT ALL",
            Combination::Intersect => "INTERSECT",
            Combination::IntersectAll => "INTERSECT ALL",
        }
    }
}

/// One assignment of an UPDATE's SET clause.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    pub kind: UpdateKind,
    pub field: String,
    pub value: Expr,
}

/// How an [`UpdateOp`] combines the new value with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// `col = expr`
    Set,
    /// `col = alias.col + expr`
    Inc,
    /// `col = array_append(alias.col, expr)`
    Push,
    /// `col = array_remove(alias.col, expr)`
    Pull,
}

// ============================================================================
// Builder-style constructors
// ============================================================================

impl Query {
    /// A query over a single table with no schema tag.
    pub fn from_table(name: impl Into<String>) -> Self {
        Self::from_source(Source::table(name))
    }

    /// A query over a single table carrying a schema tag.
    pub fn from_schema(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::from_source(Source::schema_table(name, schema))
    }

    /// A query whose FROM position holds an arbitrary source.
    pub fn from_source(source: Source) -> Self {
        Query {
            sources: vec![source],
            ..Default::default()
        }
    }

    pub fn select(mut self, fields: impl IntoIterator<Item = Expr>) -> Self {
        self.select = Some(fields.into_iter().collect());
        self
    }

    /// Add a join; the joined source is appended to `sources`.
    pub fn join(mut self, qual: JoinQual, source: Source, on: Expr) -> Self {
        let ix = self.sources.len();
        self.sources.push(source);
        self.joins.push(Join {
            qual,
            source: ix,
            on,
            hints: Vec::new(),
        });
        self
    }

    pub fn and_where(mut self, expr: Expr) -> Self {
        self.wheres.push(BooleanExpr {
            op: BoolOp::And,
            expr,
        });
        self
    }

    pub fn or_where(mut self, expr: Expr) -> Self {
        self.wheres.push(BooleanExpr {
            op: BoolOp::Or,
            expr,
        });
        self
    }

    pub fn and_having(mut self, expr: Expr) -> Self {
        self.havings.push(BooleanExpr {
            op: BoolOp::And,
            expr,
        });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_bys.push(expr);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_bys.push(order);
        self
    }

    pub fn window(mut self, name: impl Into<String>, def: WindowDef) -> Self {
        self.windows.push((name.into(), def));
        self
    }

    pub fn with(mut self, name: impl Into<String>, cte: CteSource) -> Self {
        self.with_ctes
            .get_or_insert_with(WithCtes::default)
            .queries
            .push((name.into(), cte));
        self
    }

    pub fn recursive(mut self) -> Self {
        self.with_ctes.get_or_insert_with(WithCtes::default).recursive = true;
        self
    }

    pub fn combine(mut self, kind: Combination, query: Query) -> Self {
        self.combinations.push((kind, query));
        self
    }

    pub fn distinct(mut self, distinct: Distinct) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }

    pub fn offset(mut self, expr: Expr) -> Self {
        self.offset = Some(expr);
        self
    }

    pub fn lock(mut self, clause: impl Into<String>) -> Self {
        self.lock = Some(clause.into());
        self
    }

    fn update_op(mut self, kind: UpdateKind, field: impl Into<String>, value: Expr) -> Self {
        self.updates.push(UpdateOp {
            kind,
            field: field.into(),
            value,
        });
        self
    }

    pub fn set(self, field: impl Into<String>, value: Expr) -> Self {
        self.update_op(UpdateKind::Set, field, value)
    }

    pub fn inc(self, field: impl Into<String>, value: Expr) -> Self {
        self.update_op(UpdateKind::Inc, field, value)
    }

    pub fn push(self, field: impl Into<String>, value: Expr) -> Self {
        self.update_op(UpdateKind::Push, field, value)
    }

    pub fn pull(self, field: impl Into<String>, value: Expr) -> Self {
        self.update_op(UpdateKind::Pull, field, value)
    }
}
