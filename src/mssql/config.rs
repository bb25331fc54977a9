use tiberius::{AuthMethod, Client, Config as TiberiusConfig};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use crate::error::SqlProcError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Options for connecting to SQL Server.
#[derive(Debug, Clone)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub trust_cert: bool,
    pub application_name: Option<String>,
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            trust_cert: false,
            application_name: None,
        }
    }

    #[must_use]
    pub fn builder(
        server: String,
        database: String,
        user: String,
        password: String,
    ) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server, database, user, password)
    }

    /// Build the `tiberius` configuration for these options.
    #[must_use]
    pub fn to_tiberius_config(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.database(&self.database);
        config.port(self.port.unwrap_or(1433));
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
        }
        if let Some(app) = &self.application_name {
            config.application_name(app);
        }
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.opts.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn application_name(mut self, application_name: Option<String>) -> Self {
        self.opts.application_name = application_name;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }
}

/// Parse an ADO.NET style connection string
/// (`server=tcp:host,1433;database=app;user id=sa;password=...`).
///
/// # Errors
///
/// Returns `SqlProcError::ConfigError` if the string cannot be parsed.
pub fn config_from_connection_string(connection_string: &str) -> Result<TiberiusConfig, SqlProcError> {
    if connection_string.trim().is_empty() {
        return Err(SqlProcError::ConfigError(
            "connection string is empty".to_string(),
        ));
    }
    TiberiusConfig::from_ado_string(connection_string)
        .map_err(|e| SqlProcError::ConfigError(format!("invalid connection string: {e}")))
}
