//! Handles settings for the application.
//!
//! Values come from an optional `settings.toml` (path overridable through
//! `TANDEM_SETTINGS`) layered under environment variables, e.g.
//! `DATABASE_URL`, `PORT` or `ENCRYPTION_KEY`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deployment {
    Development,
    Staging,
    Production,
}

impl Deployment {
    /// Unknown names yield `None`; they never fall back to development.
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    /// Deployments that refuse to start without an identity verifier.
    pub fn requires_identity(self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub env: String,
    pub database_url: String,
    pub bind: String,
    pub port: u16,
    pub log_level: String,
    pub encryption_key: Option<String>,
    pub cors_allowed_origins: Option<String>,
    pub ynab_base_url: String,
    pub identity_credentials_file: Option<String>,
    pub identity_credentials_json: Option<String>,
    pub identity_credentials_base64: Option<String>,
    pub identity_jwks_url: Option<String>,
    pub legacy_query_auth: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let path = std::env::var("TANDEM_SETTINGS").unwrap_or_else(|_| "settings".to_string());
        Self::from_sources(Some(&path), Environment::default())
    }

    pub fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("env", "development")?
            .set_default("database_url", "sqlite:./tandem.db?mode=rwc")?
            .set_default("bind", "127.0.0.1")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("ynab_base_url", ynab_sync::DEFAULT_BASE_URL)?
            .set_default("legacy_query_auth", true)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    pub fn deployment(&self) -> Result<Deployment, ConfigError> {
        Deployment::parse(&self.env).ok_or_else(|| {
            ConfigError::Message(format!(
                "unknown ENV {:?}, expected development, staging or production",
                self.env
            ))
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        match self.cors_allowed_origins.as_deref() {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_identity_credentials(&self) -> bool {
        [
            &self.identity_credentials_json,
            &self.identity_credentials_base64,
            &self.identity_credentials_file,
        ]
        .iter()
        .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_env(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_sources(None, Environment::default().source(Some(map))).unwrap()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = from_env(&[]);
        assert_eq!(settings.database_url, "sqlite:./tandem.db?mode=rwc");
        assert_eq!(settings.address(), "127.0.0.1:3000");
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.ynab_base_url, "https://api.ynab.com/v1");
        assert!(settings.legacy_query_auth);
        assert!(settings.encryption_key.is_none());
        assert_eq!(settings.deployment().unwrap(), Deployment::Development);
        assert_eq!(settings.cors_origins().len(), 2);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = from_env(&[
            ("ENV", "production"),
            ("PORT", "8080"),
            ("BIND", "0.0.0.0"),
            ("LEGACY_QUERY_AUTH", "false"),
            ("ENCRYPTION_KEY", "secret"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]);
        assert_eq!(settings.address(), "0.0.0.0:8080");
        assert!(!settings.legacy_query_auth);
        assert_eq!(settings.encryption_key.as_deref(), Some("secret"));
        assert_eq!(
            settings.cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(settings.deployment().unwrap().requires_identity());
        assert!(!settings.has_identity_credentials());
    }

    #[test]
    fn deployment_aliases() {
        assert_eq!(Deployment::parse("dev"), Some(Deployment::Development));
        assert_eq!(Deployment::parse("PROD"), Some(Deployment::Production));
        assert_eq!(Deployment::parse("staging"), Some(Deployment::Staging));
        assert!(!Deployment::Development.requires_identity());
    }

    #[test]
    fn unknown_env_is_refused() {
        assert_eq!(Deployment::parse(""), None);
        for value in ["prd", "live", "qa"] {
            assert_eq!(Deployment::parse(value), None);
            assert!(from_env(&[("ENV", value)]).deployment().is_err());
        }
    }
}
