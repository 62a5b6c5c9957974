//! PostgreSQL SQL generation from a typed AST.
//!
//! Build queries and migration commands as data, then render them to
//! wire-ready SQL with `$1, $2, …` placeholders. Rendering is pure: no
//! I/O, no shared state, and every entry point is a plain function of its
//! input, so the renderer can be used concurrently without synchronization.
//!
//! The crate is split into the query side ([`Query`] and [`Expr`],
//! consumed by [`Renderer::all`], [`Renderer::update_all`],
//! [`Renderer::delete_all`] and the statement-level insert/update/delete
//! entry points) and the migration side ([`ddl`], consumed by
//! [`Renderer::execute_ddl`], which yields one or more statements per
//! command).

mod error;
mod expr;
mod query;
mod render;

pub mod ddl;

pub use error::*;
pub use expr::*;
pub use query::*;
pub use render::*;

/// Quote a SQL identifier (table, column, constraint or window name).
///
/// Identifiers are always double-quoted. A name that itself contains a
/// double quote is rejected rather than escaped: identifiers come from
/// code, never from user data, so an embedded quote is a bug upstream.
pub fn quote_name(name: &str) -> Result<String, RenderError> {
    if name.contains('"') {
        return Err(RenderError::BadIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Quote a possibly schema-qualified table name.
pub fn quote_table(prefix: Option<&str>, name: &str) -> Result<String, RenderError> {
    match prefix {
        Some(prefix) => Ok(format!("{}.{}", quote_name(prefix)?, quote_name(name)?)),
        None => quote_name(name),
    }
}

/// Escape the inside of a string literal: `'` is doubled.
pub fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render a single-quoted string literal.
pub fn single_quote(s: &str) -> String {
    format!("'{}'", escape_string(s))
}
