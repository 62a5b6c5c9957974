//! SQL expressions.

use rust_decimal::Decimal;

use crate::ddl::ColumnType;
use crate::query::{Query, WindowDef};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An integer literal
    Integer(i64),
    /// A float literal, rendered with a `::float` cast
    Float(f64),
    /// A boolean literal
    Bool(bool),
    /// NULL
    Null,
    /// A string literal
    String(String),
    /// An arbitrary-precision decimal literal
    Decimal(Decimal),
    /// A binary literal, rendered as `'\xHH…'::bytea`
    Bytes(Vec<u8>),
    /// A value with an explicit database type cast: `expr::type`
    Tagged { value: Box<Expr>, ty: ColumnType },
    /// A positional parameter; index 0 renders as `$1`
    Param(usize),
    /// A field of a source: `alias."field"`
    Field { source: usize, field: String },
    /// A bare reference to a source, rendered as its alias
    SourceRef(usize),
    /// A scalar subquery, rendered in parentheses
    Subquery(Box<Query>),
    /// Binary operation (e.g. `a = b`, `a AND b`)
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call; `distinct` renders `name(DISTINCT args)`
    Call {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// Membership test against a list, a list-valued parameter or a subquery
    In { left: Box<Expr>, rhs: InRhs },
    /// `expr IS NULL`
    IsNull(Box<Expr>),
    /// `NOT (expr)`
    Not(Box<Expr>),
    /// Raw SQL interleaved with expressions
    Fragment(Vec<FragmentPart>),
    /// `expr + interval 'N unit'` with a `::timestamp` coercion
    DatetimeAdd {
        datetime: Box<Expr>,
        count: IntervalCount,
        unit: String,
    },
    /// Like [`Expr::DatetimeAdd`] but coerced to and cast back to `::date`
    DateAdd {
        date: Box<Expr>,
        count: IntervalCount,
        unit: String,
    },
    /// `agg FILTER (WHERE condition)`
    Filter {
        agg: Box<Expr>,
        condition: Box<Expr>,
    },
    /// `agg OVER name` or `agg OVER (window definition)`
    Over { agg: Box<Expr>, window: OverWindow },
    /// `count(*)`
    CountStar,
    /// A list literal: `ARRAY[…]`
    List(Vec<Expr>),
    /// A parenthesized group: `(e1,…,en)`
    Tuple(Vec<Expr>),
}

/// Right-hand side of an `IN` test.
#[derive(Debug, Clone, PartialEq)]
pub enum InRhs {
    /// `x IN (a,b,c)`; an empty list renders as `false`
    List(Vec<Expr>),
    /// A parameter holding a list: `x = ANY($n)`
    Param(usize),
    /// `x = ANY((SELECT …))`
    Subquery(Box<Query>),
}

/// The window an aggregate ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum OverWindow {
    /// A window declared in the query's WINDOW clause, by name
    Name(String),
    /// An inline window definition
    Def(WindowDef),
}

/// One part of a raw SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPart {
    Raw(String),
    Expr(Expr),
}

/// The count operand of interval arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum IntervalCount {
    Int(i64),
    Float(f64),
    Expr(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    LtEq,
    GtEq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    ILike,
    Like,
}

impl BinOp {
    /// The SQL token for this operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::ILike => "ILIKE",
            BinOp::Like => "LIKE",
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Expr {
    pub fn param(ix: usize) -> Self {
        Expr::Param(ix)
    }

    pub fn field(source: usize, field: impl Into<String>) -> Self {
        Expr::Field {
            source,
            field: field.into(),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args: args.into_iter().collect(),
            distinct: false,
        }
    }

    pub fn fragment(parts: impl IntoIterator<Item = FragmentPart>) -> Self {
        Expr::Fragment(parts.into_iter().collect())
    }

    fn binary(self, op: BinOp, other: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        self.binary(BinOp::Eq, other)
    }

    pub fn ne(self, other: Expr) -> Self {
        self.binary(BinOp::NotEq, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        self.binary(BinOp::Lt, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        self.binary(BinOp::Gt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        self.binary(BinOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        self.binary(BinOp::Or, other)
    }

    pub fn ilike(self, pattern: Expr) -> Self {
        self.binary(BinOp::ILike, pattern)
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn in_list(self, items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::In {
            left: Box::new(self),
            rhs: InRhs::List(items.into_iter().collect()),
        }
    }

    pub fn in_param(self, ix: usize) -> Self {
        Expr::In {
            left: Box::new(self),
            rhs: InRhs::Param(ix),
        }
    }

    pub fn in_subquery(self, query: Query) -> Self {
        Expr::In {
            left: Box::new(self),
            rhs: InRhs::Subquery(Box::new(query)),
        }
    }

    pub fn tagged(self, ty: ColumnType) -> Self {
        Expr::Tagged {
            value: Box::new(self),
            ty,
        }
    }
}
