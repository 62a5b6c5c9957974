//! Migration commands and their DDL rendering.
//!
//! Each command renders to an ordered list of statements: the primary DDL
//! first, then any `COMMENT ON …` statements, so a caller can execute them
//! in sequence. Comments cannot ride along inside the DDL statement
//! itself, which is why the output is a list and its order is part of the
//! contract.

use crate::error::RenderError;
use crate::render::Renderer;
use crate::{escape_string, quote_name, quote_table, single_quote};

type Result<T> = std::result::Result<T, RenderError>;

/// Column types understood by the type mapper. Anything not listed here
/// passes through verbatim via [`ColumnType::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Id,
    Serial,
    BigSerial,
    BinaryId,
    String,
    Binary,
    Integer,
    Map,
    UtcDatetime,
    NaiveDatetime,
    UtcDatetimeUsec,
    NaiveDatetimeUsec,
    Time,
    TimeUsec,
    Array(Box<ColumnType>),
    Other(std::string::String),
}

/// A table in a migration command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub prefix: Option<String>,
    pub comment: Option<String>,
    /// Raw options appended to CREATE TABLE, e.g. a partition clause.
    pub options: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A foreign-key column descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub table: String,
    pub column: String,
    pub prefix: Option<String>,
    /// Column type; serial types lower to their plain integer forms.
    pub ty: ColumnType,
    /// Constraint name; defaults to `<table>_<column>_fkey`.
    pub name: Option<String>,
    pub on_delete: ReferenceAction,
    pub on_update: ReferenceAction,
}

impl Reference {
    pub fn new(table: impl Into<String>) -> Self {
        Reference {
            table: table.into(),
            column: "id".to_string(),
            prefix: None,
            ty: ColumnType::BigSerial,
            name: None,
            on_delete: ReferenceAction::Nothing,
            on_update: ReferenceAction::Nothing,
        }
    }
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAction {
    /// No clause emitted.
    Nothing,
    NilifyAll,
    DeleteAll,
    UpdateAll,
    Restrict,
}

impl ReferenceAction {
    fn as_sql(self) -> Option<&'static str> {
        match self {
            ReferenceAction::Nothing => None,
            ReferenceAction::NilifyAll => Some("SET NULL"),
            ReferenceAction::DeleteAll | ReferenceAction::UpdateAll => Some("CASCADE"),
            ReferenceAction::Restrict => Some("RESTRICT"),
        }
    }
}

/// An index in a migration command.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub prefix: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub concurrently: bool,
    pub using: Option<String>,
    pub where_clause: Option<String>,
    pub comment: Option<String>,
}

impl Index {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = IndexColumn>,
    ) -> Self {
        Index {
            name: name.into(),
            table: table.into(),
            prefix: None,
            columns: columns.into_iter().collect(),
            unique: false,
            concurrently: false,
            using: None,
            where_clause: None,
            comment: None,
        }
    }
}

/// An index column: a plain column name (quoted) or a raw expression.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexColumn {
    Name(String),
    Expr(String),
}

/// A CHECK or EXCLUDE table constraint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraint {
    pub name: String,
    pub table: String,
    pub prefix: Option<String>,
    pub check: Option<String>,
    pub exclude: Option<String>,
    pub comment: Option<String>,
}

impl Constraint {
    pub fn check(name: impl Into<String>, table: impl Into<String>, expr: impl Into<String>) -> Self {
        Constraint {
            name: name.into(),
            table: table.into(),
            check: Some(expr.into()),
            ..Default::default()
        }
    }
}

/// A column default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<DefaultValue>),
    Map(serde_json::Value),
    /// Raw SQL passed through, e.g. `now()`.
    Fragment(String),
}

/// Options attached to a column change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnOpts {
    pub primary_key: bool,
    pub null: Option<bool>,
    pub default: Option<DefaultValue>,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub comment: Option<String>,
}

/// What a column is: a plain type or a foreign-key reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    Type(ColumnType),
    Reference(Reference),
}

/// One column-level change inside a create or alter command.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Add {
        name: String,
        spec: ColumnSpec,
        opts: ColumnOpts,
    },
    AddIfNotExists {
        name: String,
        spec: ColumnSpec,
        opts: ColumnOpts,
    },
    Modify {
        name: String,
        spec: ColumnSpec,
        opts: ColumnOpts,
        /// The column's previous spec; a previous reference has its
        /// constraint dropped before the type change.
        from: Option<ColumnSpec>,
    },
    Remove {
        name: String,
    },
    RemoveIfExists {
        name: String,
    },
}

impl ColumnChange {
    pub fn add(name: impl Into<String>, spec: ColumnSpec, opts: ColumnOpts) -> Self {
        ColumnChange::Add {
            name: name.into(),
            spec,
            opts,
        }
    }

    fn pk_name(&self) -> Option<&str> {
        match self {
            ColumnChange::Add { name, opts, .. }
            | ColumnChange::AddIfNotExists { name, opts, .. }
            | ColumnChange::Modify { name, opts, .. }
                if opts.primary_key =>
            {
                Some(name)
            }
            _ => None,
        }
    }
}

/// A migration command.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlCommand {
    CreateTable {
        if_not_exists: bool,
        table: Table,
        columns: Vec<ColumnChange>,
    },
    DropTable {
        if_exists: bool,
        table: Table,
    },
    AlterTable {
        table: Table,
        changes: Vec<ColumnChange>,
    },
    CreateIndex {
        if_not_exists: bool,
        index: Index,
    },
    DropIndex {
        if_exists: bool,
        index: Index,
    },
    RenameTable {
        current: Table,
        to: Table,
    },
    RenameColumn {
        table: Table,
        current: String,
        to: String,
    },
    CreateConstraint(Constraint),
    DropConstraint {
        if_exists: bool,
        constraint: Constraint,
    },
    /// Raw SQL passed through as a single statement.
    Raw(String),
}

// ============================================================================
// Rendering
// ============================================================================

impl Renderer {
    /// Render a migration command to its ordered statement list.
    pub fn execute_ddl(&self, command: &DdlCommand) -> Result<Vec<String>> {
        match command {
            DdlCommand::CreateTable {
                if_not_exists,
                table,
                columns,
            } => {
                let mut stmt = String::from(if *if_not_exists {
                    "CREATE TABLE IF NOT EXISTS "
                } else {
                    "CREATE TABLE "
                });
                stmt.push_str(&quote_table(table.prefix.as_deref(), &table.name)?);
                let defs = columns
                    .iter()
                    .map(|change| self.column_definition(table, change))
                    .collect::<Result<Vec<_>>>()?;
                let mut body = defs.join(", ");
                push_pk_definition(columns, ", ", &mut body)?;
                if !body.is_empty() {
                    stmt.push_str(" (");
                    stmt.push_str(&body);
                    stmt.push(')');
                }
                if let Some(options) = &table.options {
                    stmt.push(' ');
                    stmt.push_str(options);
                }
                let mut statements = vec![stmt];
                statements.extend(self.table_comment(table)?);
                statements.extend(self.column_comments(table, columns)?);
                Ok(statements)
            }

            DdlCommand::DropTable { if_exists, table } => Ok(vec![format!(
                "DROP TABLE {}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                quote_table(table.prefix.as_deref(), &table.name)?
            )]),

            DdlCommand::AlterTable { table, changes } => {
                let mut stmt = String::from("ALTER TABLE ");
                stmt.push_str(&quote_table(table.prefix.as_deref(), &table.name)?);
                stmt.push(' ');
                let parts = changes
                    .iter()
                    .map(|change| self.column_change(table, change))
                    .collect::<Result<Vec<_>>>()?;
                stmt.push_str(&parts.join(", "));
                push_pk_definition(changes, ", ADD ", &mut stmt)?;
                let mut statements = vec![stmt];
                statements.extend(self.table_comment(table)?);
                statements.extend(self.column_comments(table, changes)?);
                Ok(statements)
            }

            DdlCommand::CreateIndex {
                if_not_exists,
                index,
            } => {
                if *if_not_exists && index.concurrently {
                    return Err(RenderError::unsupported(
                        "concurrent index creation cannot be combined with if-not-exists emulation",
                    ));
                }
                let mut stmt = String::from("CREATE ");
                if index.unique {
                    stmt.push_str("UNIQUE ");
                }
                stmt.push_str("INDEX ");
                if index.concurrently {
                    stmt.push_str("CONCURRENTLY ");
                }
                stmt.push_str(&quote_name(&index.name)?);
                stmt.push_str(" ON ");
                stmt.push_str(&quote_table(index.prefix.as_deref(), &index.table)?);
                if let Some(using) = &index.using {
                    stmt.push_str(" USING ");
                    stmt.push_str(using);
                }
                stmt.push_str(" (");
                for (i, column) in index.columns.iter().enumerate() {
                    if i > 0 {
                        stmt.push_str(", ");
                    }
                    match column {
                        IndexColumn::Name(name) => stmt.push_str(&quote_name(name)?),
                        IndexColumn::Expr(expr) => stmt.push_str(expr),
                    }
                }
                stmt.push(')');
                if let Some(where_clause) = &index.where_clause {
                    stmt.push_str(" WHERE ");
                    stmt.push_str(where_clause);
                }
                if *if_not_exists {
                    stmt = format!(
                        "DO $$ BEGIN {stmt}; EXCEPTION WHEN duplicate_table THEN END; $$;"
                    );
                }
                let mut statements = vec![stmt];
                if let Some(comment) = &index.comment {
                    statements.push(format!(
                        "COMMENT ON INDEX {} IS {}",
                        quote_table(index.prefix.as_deref(), &index.name)?,
                        single_quote(comment)
                    ));
                }
                Ok(statements)
            }

            DdlCommand::DropIndex { if_exists, index } => {
                let mut stmt = String::from("DROP INDEX ");
                if index.concurrently {
                    stmt.push_str("CONCURRENTLY ");
                }
                if *if_exists {
                    stmt.push_str("IF EXISTS ");
                }
                stmt.push_str(&quote_table(index.prefix.as_deref(), &index.name)?);
                Ok(vec![stmt])
            }

            DdlCommand::RenameTable { current, to } => Ok(vec![format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_table(current.prefix.as_deref(), &current.name)?,
                quote_name(&to.name)?
            )]),

            DdlCommand::RenameColumn { table, current, to } => Ok(vec![format!(
                "ALTER TABLE {} RENAME {} TO {}",
                quote_table(table.prefix.as_deref(), &table.name)?,
                quote_name(current)?,
                quote_name(to)?
            )]),

            DdlCommand::CreateConstraint(constraint) => {
                let body = match (&constraint.check, &constraint.exclude) {
                    (Some(check), None) => format!("CHECK ({check})"),
                    (None, Some(exclude)) => format!("EXCLUDE USING {exclude}"),
                    _ => {
                        return Err(RenderError::unsupported(
                            "a constraint must define exactly one of check or exclude",
                        ))
                    }
                };
                let mut statements = vec![format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    quote_table(constraint.prefix.as_deref(), &constraint.table)?,
                    quote_name(&constraint.name)?,
                    body
                )];
                if let Some(comment) = &constraint.comment {
                    statements.push(format!(
                        "COMMENT ON CONSTRAINT {} ON {} IS {}",
                        quote_name(&constraint.name)?,
                        quote_table(constraint.prefix.as_deref(), &constraint.table)?,
                        single_quote(comment)
                    ));
                }
                Ok(statements)
            }

            DdlCommand::DropConstraint {
                if_exists,
                constraint,
            } => Ok(vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}{}",
                quote_table(constraint.prefix.as_deref(), &constraint.table)?,
                if *if_exists { "IF EXISTS " } else { "" },
                quote_name(&constraint.name)?
            )]),

            DdlCommand::Raw(sql) => Ok(vec![sql.clone()]),
        }
    }

    /// Column definition inside CREATE TABLE parentheses.
    fn column_definition(&self, table: &Table, change: &ColumnChange) -> Result<String> {
        match change {
            ColumnChange::Add { name, spec, opts } => {
                let mut def = quote_name(name)?;
                def.push(' ');
                def.push_str(&self.spec_type(spec, opts));
                def.push_str(&self.column_options(spec, opts)?);
                if let ColumnSpec::Reference(reference) = spec {
                    def.push_str(&self.reference_expr(reference, table, name)?);
                }
                Ok(def)
            }
            _ => Err(RenderError::unsupported(
                "only added columns are allowed when creating a table",
            )),
        }
    }

    /// One comma-separated element of an ALTER TABLE body.
    fn column_change(&self, table: &Table, change: &ColumnChange) -> Result<String> {
        match change {
            ColumnChange::Add { .. } => Ok(format!(
                "ADD COLUMN {}",
                self.added_column(table, change)?
            )),
            ColumnChange::AddIfNotExists { name, spec, opts } => {
                let add = ColumnChange::Add {
                    name: name.clone(),
                    spec: spec.clone(),
                    opts: opts.clone(),
                };
                Ok(format!(
                    "ADD COLUMN IF NOT EXISTS {}",
                    self.added_column(table, &add)?
                ))
            }
            ColumnChange::Modify {
                name,
                spec,
                opts,
                from,
            } => {
                let quoted = quote_name(name)?;
                let mut out = String::new();
                if let Some(ColumnSpec::Reference(previous)) = from {
                    out.push_str("DROP CONSTRAINT ");
                    out.push_str(&self.reference_name(previous, table, name)?);
                    out.push_str(", ");
                }
                out.push_str("ALTER COLUMN ");
                out.push_str(&quoted);
                out.push_str(" TYPE ");
                out.push_str(&self.spec_type(spec, opts));
                if let ColumnSpec::Reference(reference) = spec {
                    out.push_str(", ADD");
                    out.push_str(&self.reference_expr(reference, table, name)?);
                }
                match opts.null {
                    Some(true) => {
                        out.push_str(", ALTER COLUMN ");
                        out.push_str(&quoted);
                        out.push_str(" DROP NOT NULL");
                    }
                    Some(false) => {
                        out.push_str(", ALTER COLUMN ");
                        out.push_str(&quoted);
                        out.push_str(" SET NOT NULL");
                    }
                    None => {}
                }
                if let Some(default) = &opts.default {
                    out.push_str(", ALTER COLUMN ");
                    out.push_str(&quoted);
                    out.push_str(" SET");
                    out.push_str(&self.default_expr(default, spec_column_type(spec))?);
                }
                Ok(out)
            }
            ColumnChange::Remove { name } => Ok(format!("DROP COLUMN {}", quote_name(name)?)),
            ColumnChange::RemoveIfExists { name } => {
                Ok(format!("DROP COLUMN IF EXISTS {}", quote_name(name)?))
            }
        }
    }

    fn added_column(&self, table: &Table, change: &ColumnChange) -> Result<String> {
        self.column_definition(table, change)
    }

    fn spec_type(&self, spec: &ColumnSpec, opts: &ColumnOpts) -> String {
        match spec {
            ColumnSpec::Type(ty) => self.column_type(ty, opts),
            ColumnSpec::Reference(reference) => self.reference_column_type(reference, opts),
        }
    }

    /// DEFAULT and NULL options, in that order.
    fn column_options(&self, spec: &ColumnSpec, opts: &ColumnOpts) -> Result<String> {
        let mut out = String::new();
        if let Some(default) = &opts.default {
            out.push_str(&self.default_expr(default, spec_column_type(spec))?);
        }
        match opts.null {
            Some(true) => out.push_str(" NULL"),
            Some(false) => out.push_str(" NOT NULL"),
            None => {}
        }
        Ok(out)
    }

    fn default_expr(&self, default: &DefaultValue, ty: &ColumnType) -> Result<String> {
        match default {
            DefaultValue::Null => Ok(" DEFAULT NULL".to_string()),
            DefaultValue::String(value) => {
                check_default_string(value)?;
                Ok(format!(" DEFAULT '{}'", escape_string(value)))
            }
            DefaultValue::Integer(value) => Ok(format!(" DEFAULT {value}")),
            DefaultValue::Float(value) => Ok(format!(" DEFAULT {value:?}")),
            DefaultValue::Bool(value) => Ok(format!(" DEFAULT {value}")),
            DefaultValue::Map(value) => {
                let json = serde_json::to_string(value)
                    .map_err(|err| RenderError::BadDefault(err.to_string()))?;
                Ok(format!(" DEFAULT {}", single_quote(&json)))
            }
            DefaultValue::Array(items) => {
                let element_ty = match ty {
                    ColumnType::Array(inner) => inner,
                    other => other,
                };
                let elements = items
                    .iter()
                    .map(default_element)
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!(
                    " DEFAULT ARRAY[{}]::{}[]",
                    elements.join(","),
                    self.db_type(element_ty)
                ))
            }
            DefaultValue::Fragment(expr) => Ok(format!(" DEFAULT {expr}")),
        }
    }

    fn reference_column_type(&self, reference: &Reference, opts: &ColumnOpts) -> String {
        match &reference.ty {
            ColumnType::Serial => "integer".to_string(),
            ColumnType::BigSerial => "bigint".to_string(),
            other => self.column_type(other, opts),
        }
    }

    fn reference_expr(&self, reference: &Reference, table: &Table, column: &str) -> Result<String> {
        let mut out = format!(
            " CONSTRAINT {} REFERENCES {}({})",
            self.reference_name(reference, table, column)?,
            quote_table(
                reference
                    .prefix
                    .as_deref()
                    .or(table.prefix.as_deref()),
                &reference.table
            )?,
            quote_name(&reference.column)?
        );
        if let Some(action) = reference.on_delete.as_sql() {
            out.push_str(" ON DELETE ");
            out.push_str(action);
        }
        if let Some(action) = reference.on_update.as_sql() {
            out.push_str(" ON UPDATE ");
            out.push_str(action);
        }
        Ok(out)
    }

    fn reference_name(&self, reference: &Reference, table: &Table, column: &str) -> Result<String> {
        match &reference.name {
            Some(name) => quote_name(name),
            None => quote_name(&format!("{}_{}_fkey", table.name, column)),
        }
    }

    fn table_comment(&self, table: &Table) -> Result<Vec<String>> {
        let Some(comment) = &table.comment else {
            return Ok(Vec::new());
        };
        Ok(vec![format!(
            "COMMENT ON TABLE {} IS {}",
            quote_table(table.prefix.as_deref(), &table.name)?,
            single_quote(comment)
        )])
    }

    fn column_comments(&self, table: &Table, changes: &[ColumnChange]) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for change in changes {
            let (name, comment) = match change {
                ColumnChange::Add { name, opts, .. }
                | ColumnChange::AddIfNotExists { name, opts, .. }
                | ColumnChange::Modify { name, opts, .. } => match &opts.comment {
                    Some(comment) => (name, comment),
                    None => continue,
                },
                _ => continue,
            };
            statements.push(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                quote_table(table.prefix.as_deref(), &table.name)?,
                quote_name(name)?,
                single_quote(comment)
            ));
        }
        Ok(statements)
    }

    /// Base type name, before size/precision decoration.
    pub(crate) fn db_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Id | ColumnType::Integer => "integer".to_string(),
            ColumnType::Serial => "serial".to_string(),
            ColumnType::BigSerial => "bigserial".to_string(),
            ColumnType::BinaryId => "uuid".to_string(),
            ColumnType::String => "varchar".to_string(),
            ColumnType::Binary => "bytea".to_string(),
            ColumnType::Map => self.config.map_type.clone(),
            ColumnType::UtcDatetime
            | ColumnType::NaiveDatetime
            | ColumnType::UtcDatetimeUsec
            | ColumnType::NaiveDatetimeUsec => "timestamp".to_string(),
            ColumnType::Time | ColumnType::TimeUsec => "time".to_string(),
            ColumnType::Array(inner) => format!("{}[]", self.db_type(inner)),
            ColumnType::Other(name) => name.clone(),
        }
    }

    /// Full column type with size/precision/scale decoration.
    pub(crate) fn column_type(&self, ty: &ColumnType, opts: &ColumnOpts) -> String {
        match ty {
            ColumnType::Array(inner) => format!("{}[]", self.column_type(inner, opts)),
            // Second-precision timestamps unless asked otherwise.
            ColumnType::Time | ColumnType::UtcDatetime | ColumnType::NaiveDatetime => {
                format!("{}({})", self.db_type(ty), opts.precision.unwrap_or(0))
            }
            ColumnType::TimeUsec | ColumnType::UtcDatetimeUsec | ColumnType::NaiveDatetimeUsec => {
                match opts.precision {
                    Some(precision) => format!("{}({precision})", self.db_type(ty)),
                    None => self.db_type(ty),
                }
            }
            _ => {
                let name = self.db_type(ty);
                if let Some(size) = opts.size {
                    format!("{name}({size})")
                } else if let Some(precision) = opts.precision {
                    format!("{name}({precision},{})", opts.scale.unwrap_or(0))
                } else if *ty == ColumnType::String {
                    format!("{name}(255)")
                } else {
                    name
                }
            }
        }
    }
}

fn spec_column_type(spec: &ColumnSpec) -> &ColumnType {
    match spec {
        ColumnSpec::Type(ty) => ty,
        ColumnSpec::Reference(reference) => &reference.ty,
    }
}

fn push_pk_definition(columns: &[ColumnChange], prefix: &str, buf: &mut String) -> Result<()> {
    let pks: Vec<&str> = columns.iter().filter_map(ColumnChange::pk_name).collect();
    if pks.is_empty() {
        return Ok(());
    }
    buf.push_str(prefix);
    buf.push_str("PRIMARY KEY (");
    for (i, pk) in pks.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push_str(&quote_name(pk)?);
    }
    buf.push(')');
    Ok(())
}

fn check_default_string(value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(RenderError::BadDefault(
            "default string values cannot contain null bytes".to_string(),
        ));
    }
    Ok(())
}

fn default_element(element: &DefaultValue) -> Result<String> {
    match element {
        DefaultValue::Null => Ok("NULL".to_string()),
        DefaultValue::String(value) => {
            check_default_string(value)?;
            Ok(single_quote(value))
        }
        DefaultValue::Integer(value) => Ok(value.to_string()),
        DefaultValue::Float(value) => Ok(format!("{value:?}")),
        DefaultValue::Bool(value) => Ok(value.to_string()),
        _ => Err(RenderError::BadDefault(
            "array defaults may only hold scalar elements".to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;

    fn renderer() -> Renderer {
        Renderer::default()
    }

    fn ddl(command: &DdlCommand) -> Vec<String> {
        renderer().execute_ddl(command).unwrap()
    }

    #[test]
    fn create_table_with_reference() {
        let command = DdlCommand::CreateTable {
            if_not_exists: false,
            table: Table::new("posts"),
            columns: vec![
                ColumnChange::add(
                    "id",
                    ColumnSpec::Type(ColumnType::Serial),
                    ColumnOpts {
                        primary_key: true,
                        ..Default::default()
                    },
                ),
                ColumnChange::add(
                    "author_id",
                    ColumnSpec::Reference(Reference {
                        on_delete: ReferenceAction::DeleteAll,
                        ..Reference::new("users")
                    }),
                    ColumnOpts {
                        null: Some(false),
                        ..Default::default()
                    },
                ),
            ],
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"CREATE TABLE "posts" ("id" serial, "author_id" bigint NOT NULL CONSTRAINT "posts_author_id_fkey" REFERENCES "users"("id") ON DELETE CASCADE, PRIMARY KEY ("id"))"#
            ]
        );
    }

    #[test]
    fn create_table_emits_comments_after_the_table() {
        let command = DdlCommand::CreateTable {
            if_not_exists: true,
            table: Table {
                comment: Some("tracking".to_string()),
                ..Table::new("events")
            },
            columns: vec![ColumnChange::add(
                "payload",
                ColumnSpec::Type(ColumnType::Map),
                ColumnOpts {
                    comment: Some("raw body".to_string()),
                    ..Default::default()
                },
            )],
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"CREATE TABLE IF NOT EXISTS "events" ("payload" jsonb)"#.to_string(),
                r#"COMMENT ON TABLE "events" IS 'tracking'"#.to_string(),
                r#"COMMENT ON COLUMN "events"."payload" IS 'raw body'"#.to_string(),
            ]
        );
    }

    #[test]
    fn create_table_with_prefix_and_options() {
        let command = DdlCommand::CreateTable {
            if_not_exists: false,
            table: Table {
                prefix: Some("tenant".to_string()),
                options: Some("PARTITION BY RANGE (inserted_at)".to_string()),
                ..Table::new("events")
            },
            columns: vec![ColumnChange::add(
                "inserted_at",
                ColumnSpec::Type(ColumnType::NaiveDatetime),
                ColumnOpts::default(),
            )],
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"CREATE TABLE "tenant"."events" ("inserted_at" timestamp(0)) PARTITION BY RANGE (inserted_at)"#
            ]
        );
    }

    #[test]
    fn column_defaults() {
        let columns = vec![
            ColumnChange::add(
                "title",
                ColumnSpec::Type(ColumnType::String),
                ColumnOpts {
                    default: Some(DefaultValue::String("it's".to_string())),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "views",
                ColumnSpec::Type(ColumnType::Integer),
                ColumnOpts {
                    default: Some(DefaultValue::Integer(0)),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "visible",
                ColumnSpec::Type(ColumnType::Other("boolean".to_string())),
                ColumnOpts {
                    default: Some(DefaultValue::Bool(true)),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "tags",
                ColumnSpec::Type(ColumnType::Array(Box::new(ColumnType::String))),
                ColumnOpts {
                    default: Some(DefaultValue::Array(vec![
                        DefaultValue::String("a".to_string()),
                        DefaultValue::String("b".to_string()),
                    ])),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "meta",
                ColumnSpec::Type(ColumnType::Map),
                ColumnOpts {
                    default: Some(DefaultValue::Map(serde_json::json!({"a": 1}))),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "inserted_at",
                ColumnSpec::Type(ColumnType::NaiveDatetime),
                ColumnOpts {
                    default: Some(DefaultValue::Fragment("now()".to_string())),
                    ..Default::default()
                },
            ),
        ];
        let command = DdlCommand::CreateTable {
            if_not_exists: false,
            table: Table::new("posts"),
            columns,
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"CREATE TABLE "posts" ("title" varchar(255) DEFAULT 'it''s', "views" integer DEFAULT 0, "visible" boolean DEFAULT true, "tags" varchar(255)[] DEFAULT ARRAY['a','b']::varchar[], "meta" jsonb DEFAULT '{"a":1}', "inserted_at" timestamp(0) DEFAULT now())"#
            ]
        );
    }

    #[test]
    fn null_byte_in_default_rejected() {
        let command = DdlCommand::CreateTable {
            if_not_exists: false,
            table: Table::new("posts"),
            columns: vec![ColumnChange::add(
                "title",
                ColumnSpec::Type(ColumnType::String),
                ColumnOpts {
                    default: Some(DefaultValue::String("bad\0value".to_string())),
                    ..Default::default()
                },
            )],
        };
        assert!(matches!(
            renderer().execute_ddl(&command),
            Err(RenderError::BadDefault(_))
        ));
    }

    #[test]
    fn alter_table_changes() {
        let command = DdlCommand::AlterTable {
            table: Table::new("posts"),
            changes: vec![
                ColumnChange::add(
                    "summary",
                    ColumnSpec::Type(ColumnType::Other("text".to_string())),
                    ColumnOpts::default(),
                ),
                ColumnChange::AddIfNotExists {
                    name: "score".to_string(),
                    spec: ColumnSpec::Type(ColumnType::Integer),
                    opts: ColumnOpts::default(),
                },
                ColumnChange::Modify {
                    name: "title".to_string(),
                    spec: ColumnSpec::Type(ColumnType::String),
                    opts: ColumnOpts {
                        size: Some(512),
                        null: Some(false),
                        default: Some(DefaultValue::String("untitled".to_string())),
                        ..Default::default()
                    },
                    from: None,
                },
                ColumnChange::Remove {
                    name: "legacy".to_string(),
                },
                ColumnChange::RemoveIfExists {
                    name: "older".to_string(),
                },
            ],
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"ALTER TABLE "posts" ADD COLUMN "summary" text, ADD COLUMN IF NOT EXISTS "score" integer, ALTER COLUMN "title" TYPE varchar(512), ALTER COLUMN "title" SET NOT NULL, ALTER COLUMN "title" SET DEFAULT 'untitled', DROP COLUMN "legacy", DROP COLUMN IF EXISTS "older""#
            ]
        );
    }

    #[test]
    fn modify_reference_drops_previous_constraint() {
        let command = DdlCommand::AlterTable {
            table: Table::new("posts"),
            changes: vec![ColumnChange::Modify {
                name: "author_id".to_string(),
                spec: ColumnSpec::Reference(Reference {
                    on_delete: ReferenceAction::NilifyAll,
                    ..Reference::new("users")
                }),
                opts: ColumnOpts::default(),
                from: Some(ColumnSpec::Reference(Reference::new("users"))),
            }],
        };
        assert_eq!(
            ddl(&command),
            vec![
                r#"ALTER TABLE "posts" DROP CONSTRAINT "posts_author_id_fkey", ALTER COLUMN "author_id" TYPE bigint, ADD CONSTRAINT "posts_author_id_fkey" REFERENCES "users"("id") ON DELETE SET NULL"#
            ]
        );
    }

    #[test]
    fn alter_table_adds_primary_key_last() {
        let command = DdlCommand::AlterTable {
            table: Table::new("events"),
            changes: vec![ColumnChange::add(
                "id",
                ColumnSpec::Type(ColumnType::BigSerial),
                ColumnOpts {
                    primary_key: true,
                    ..Default::default()
                },
            )],
        };
        assert_eq!(
            ddl(&command),
            vec![r#"ALTER TABLE "events" ADD COLUMN "id" bigserial, ADD PRIMARY KEY ("id")"#]
        );
    }

    #[test]
    fn create_index_variants() {
        let mut index = Index::new(
            "posts_author_id_index",
            "posts",
            [IndexColumn::Name("author_id".to_string())],
        );
        assert_eq!(
            ddl(&DdlCommand::CreateIndex {
                if_not_exists: false,
                index: index.clone()
            }),
            vec![r#"CREATE INDEX "posts_author_id_index" ON "posts" ("author_id")"#]
        );

        index.unique = true;
        index.concurrently = true;
        index.using = Some("gin".to_string());
        index.where_clause = Some("deleted_at IS NULL".to_string());
        index
            .columns
            .push(IndexColumn::Expr("lower(title)".to_string()));
        assert_eq!(
            ddl(&DdlCommand::CreateIndex {
                if_not_exists: false,
                index
            }),
            vec![
                r#"CREATE UNIQUE INDEX CONCURRENTLY "posts_author_id_index" ON "posts" USING gin ("author_id", lower(title)) WHERE deleted_at IS NULL"#
            ]
        );
    }

    #[test]
    fn create_index_if_not_exists_is_wrapped() {
        let index = Index::new("events_day_index", "events", [IndexColumn::Name("day".into())]);
        assert_eq!(
            ddl(&DdlCommand::CreateIndex {
                if_not_exists: true,
                index
            }),
            vec![
                r#"DO $$ BEGIN CREATE INDEX "events_day_index" ON "events" ("day"); EXCEPTION WHEN duplicate_table THEN END; $$;"#
            ]
        );
    }

    #[test]
    fn create_index_if_not_exists_rejects_concurrently() {
        let index = Index {
            concurrently: true,
            ..Index::new("events_day_index", "events", [IndexColumn::Name("day".into())])
        };
        assert!(matches!(
            renderer().execute_ddl(&DdlCommand::CreateIndex {
                if_not_exists: true,
                index
            }),
            Err(RenderError::Unsupported(_))
        ));
    }

    #[test]
    fn drop_index_variants() {
        let index = Index {
            concurrently: true,
            ..Index::new("posts_title_index", "posts", [])
        };
        assert_eq!(
            ddl(&DdlCommand::DropIndex {
                if_exists: true,
                index
            }),
            vec![r#"DROP INDEX CONCURRENTLY IF EXISTS "posts_title_index""#]
        );
    }

    #[test]
    fn renames() {
        assert_eq!(
            ddl(&DdlCommand::RenameTable {
                current: Table {
                    prefix: Some("tenant".to_string()),
                    ..Table::new("posts")
                },
                to: Table::new("articles"),
            }),
            vec![r#"ALTER TABLE "tenant"."posts" RENAME TO "articles""#]
        );
        assert_eq!(
            ddl(&DdlCommand::RenameColumn {
                table: Table::new("posts"),
                current: "title".to_string(),
                to: "headline".to_string(),
            }),
            vec![r#"ALTER TABLE "posts" RENAME "title" TO "headline""#]
        );
    }

    #[test]
    fn constraints() {
        let check = Constraint {
            comment: Some("sanity".to_string()),
            ..Constraint::check("price_must_be_positive", "products", "price > 0")
        };
        assert_eq!(
            ddl(&DdlCommand::CreateConstraint(check)),
            vec![
                r#"ALTER TABLE "products" ADD CONSTRAINT "price_must_be_positive" CHECK (price > 0)"#
                    .to_string(),
                r#"COMMENT ON CONSTRAINT "price_must_be_positive" ON "products" IS 'sanity'"#
                    .to_string(),
            ]
        );

        let exclude = Constraint {
            name: "reservations_overlap".to_string(),
            table: "reservations".to_string(),
            exclude: Some("gist (room WITH =, during WITH &&)".to_string()),
            ..Default::default()
        };
        assert_eq!(
            ddl(&DdlCommand::CreateConstraint(exclude)),
            vec![
                r#"ALTER TABLE "reservations" ADD CONSTRAINT "reservations_overlap" EXCLUDE USING gist (room WITH =, during WITH &&)"#
            ]
        );

        assert_eq!(
            ddl(&DdlCommand::DropConstraint {
                if_exists: true,
                constraint: Constraint::check("price_must_be_positive", "products", ""),
            }),
            vec![r#"ALTER TABLE "products" DROP CONSTRAINT IF EXISTS "price_must_be_positive""#]
        );
    }

    #[test]
    fn drop_table_and_raw_passthrough() {
        assert_eq!(
            ddl(&DdlCommand::DropTable {
                if_exists: true,
                table: Table::new("posts")
            }),
            vec![r#"DROP TABLE IF EXISTS "posts""#]
        );
        assert_eq!(
            ddl(&DdlCommand::Raw("VACUUM ANALYZE".to_string())),
            vec!["VACUUM ANALYZE"]
        );
    }

    #[test]
    fn type_decoration() {
        let r = renderer();
        let plain = ColumnOpts::default();
        assert_eq!(r.column_type(&ColumnType::String, &plain), "varchar(255)");
        assert_eq!(
            r.column_type(
                &ColumnType::String,
                &ColumnOpts {
                    size: Some(40),
                    ..Default::default()
                }
            ),
            "varchar(40)"
        );
        assert_eq!(
            r.column_type(
                &ColumnType::Other("numeric".to_string()),
                &ColumnOpts {
                    precision: Some(10),
                    scale: Some(2),
                    ..Default::default()
                }
            ),
            "numeric(10,2)"
        );
        assert_eq!(
            r.column_type(
                &ColumnType::Other("numeric".to_string()),
                &ColumnOpts {
                    precision: Some(10),
                    ..Default::default()
                }
            ),
            "numeric(10,0)"
        );
        assert_eq!(r.column_type(&ColumnType::UtcDatetime, &plain), "timestamp(0)");
        assert_eq!(r.column_type(&ColumnType::Time, &plain), "time(0)");
        assert_eq!(
            r.column_type(&ColumnType::UtcDatetimeUsec, &plain),
            "timestamp"
        );
        assert_eq!(
            r.column_type(
                &ColumnType::NaiveDatetimeUsec,
                &ColumnOpts {
                    precision: Some(3),
                    ..Default::default()
                }
            ),
            "timestamp(3)"
        );
        assert_eq!(r.column_type(&ColumnType::BinaryId, &plain), "uuid");
        assert_eq!(r.column_type(&ColumnType::Binary, &plain), "bytea");
        assert_eq!(
            r.column_type(&ColumnType::Array(Box::new(ColumnType::Integer)), &plain),
            "integer[]"
        );
        assert_eq!(r.column_type(&ColumnType::Id, &plain), "integer");
    }

    #[test]
    fn map_type_is_configurable() {
        let r = Renderer::new(crate::render::RenderConfig {
            map_type: "json".to_string(),
        });
        assert_eq!(r.column_type(&ColumnType::Map, &ColumnOpts::default()), "json");
    }

    #[test]
    fn serial_references_lower_to_plain_integers() {
        let r = renderer();
        let opts = ColumnOpts::default();
        assert_eq!(
            r.reference_column_type(
                &Reference {
                    ty: ColumnType::Serial,
                    ..Reference::new("users")
                },
                &opts
            ),
            "integer"
        );
        assert_eq!(r.reference_column_type(&Reference::new("users"), &opts), "bigint");
    }
}
