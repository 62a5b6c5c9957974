//! Driver-facing helpers around the SQL renderer.
//!
//! [`squill_sql`] renders queries and migration commands to SQL text; this
//! crate covers the pieces that need to know about the PostgreSQL driver:
//!
//! - decoding constraint violations out of server errors ([`constraints`])
//! - classifying server notice severities for logging ([`logs`])
//! - thin pass-throughs over [`tokio_postgres::Client`] plus a prepared
//!   statement cache with reset signalling ([`exec`])

pub mod constraints;
pub mod exec;
pub mod logs;

pub use squill_sql::{RenderConfig, RenderError, Renderer};

use thiserror::Error;

/// Errors from driver-facing operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Result type for driver-facing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Port used when the connection options leave it unset.
pub const DEFAULT_PORT: u16 = 5432;

/// Connection options lowered into a [`tokio_postgres::Config`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub application_name: Option<String>,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        ConnectOptions {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Build the driver configuration, applying [`DEFAULT_PORT`] when no
    /// port was given.
    pub fn config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.host(&self.host);
        config.port(self.port.unwrap_or(DEFAULT_PORT));
        config.user(&self.user);
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(dbname) = &self.dbname {
            config.dbname(dbname);
        }
        if let Some(application_name) = &self.application_name {
            config.application_name(application_name);
        }
        config
    }
}
