use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Config as TiberiusConfig};

use crate::error::SprocDbError;

const DEFAULT_PORT: u16 = 1433;

/// Options for connecting to SQL Server.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Schema prepended to procedure names by `load_stored_proc`.
    #[serde(default)]
    pub default_schema: Option<String>,
    #[serde(default)]
    pub trust_cert: bool,
}

impl std::fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .field("instance_name", &self.instance_name)
            .field("default_schema", &self.default_schema)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
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
            default_schema: None,
            trust_cert: false,
        }
    }

    #[must_use]
    pub fn builder(server: String, database: String, user: String, password: String) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server, database, user, password)
    }

    /// Read options from `SPROC_MSSQL_*` environment variables.
    ///
    /// `SERVER`, `DATABASE`, `USER`, and `PASSWORD` are required; `PORT`, `INSTANCE`,
    /// `SCHEMA`, and `TRUST_CERT` (`1`/`true`) are optional.
    ///
    /// # Errors
    /// `ConfigError` naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self, SprocDbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SprocDbError> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| SprocDbError::ConfigError(format!("{key} is not set")))
        };

        let port = lookup("SPROC_MSSQL_PORT")
            .map(|raw| {
                raw.parse::<u16>().map_err(|e| {
                    SprocDbError::ConfigError(format!("SPROC_MSSQL_PORT `{raw}` is invalid: {e}"))
                })
            })
            .transpose()?;
        let trust_cert = lookup("SPROC_MSSQL_TRUST_CERT")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        Ok(Self {
            server: required("SPROC_MSSQL_SERVER")?,
            database: required("SPROC_MSSQL_DATABASE")?,
            user: required("SPROC_MSSQL_USER")?,
            password: required("SPROC_MSSQL_PASSWORD")?,
            port,
            instance_name: lookup("SPROC_MSSQL_INSTANCE"),
            default_schema: lookup("SPROC_MSSQL_SCHEMA"),
            trust_cert,
        })
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn with_default_schema(mut self, schema: Option<String>) -> Self {
        self.default_schema = schema;
        self
    }

    pub(crate) fn tiberius_config(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.database(&self.database);
        config.port(self.port.unwrap_or(DEFAULT_PORT));
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
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
    pub fn default_schema(mut self, schema: &str) -> Self {
        self.opts.default_schema = Some(schema.to_string());
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust: bool) -> Self {
        self.opts.trust_cert = trust;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_required_and_optional_variables() {
        let opts = MssqlOptions::from_lookup(env(&[
            ("SPROC_MSSQL_SERVER", "db.local"),
            ("SPROC_MSSQL_DATABASE", "hr"),
            ("SPROC_MSSQL_USER", "sa"),
            ("SPROC_MSSQL_PASSWORD", "secret"),
            ("SPROC_MSSQL_PORT", "14330"),
            ("SPROC_MSSQL_SCHEMA", "dbo"),
            ("SPROC_MSSQL_TRUST_CERT", "true"),
        ]))
        .unwrap();
        assert_eq!(opts.port, Some(14330));
        assert_eq!(opts.default_schema.as_deref(), Some("dbo"));
        assert!(opts.trust_cert);
        assert!(opts.instance_name.is_none());
    }

    #[test]
    fn missing_or_bad_variables_are_config_errors() {
        let missing = MssqlOptions::from_lookup(env(&[("SPROC_MSSQL_SERVER", "db")]));
        assert!(matches!(missing, Err(SprocDbError::ConfigError(ref m)) if m.contains("SPROC_MSSQL_DATABASE")));

        let bad_port = MssqlOptions::from_lookup(env(&[
            ("SPROC_MSSQL_SERVER", "db"),
            ("SPROC_MSSQL_PORT", "not-a-port"),
        ]));
        assert!(matches!(bad_port, Err(SprocDbError::ConfigError(ref m)) if m.contains("PORT")));
    }

    #[test]
    fn password_is_never_serialized_or_printed() {
        let opts = MssqlOptions::builder("db".into(), "hr".into(), "sa".into(), "secret".into())
            .default_schema("dbo")
            .finish();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{opts:?}").contains("secret"));

        let back: MssqlOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.default_schema.as_deref(), Some("dbo"));
        assert!(back.password.is_empty());
    }
}
