//! Runtime configuration read from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    Rest,
    #[default]
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "postgrest" | "supabase" => Ok(BackendKind::Rest),
            "sqlite" | "local" => Ok(BackendKind::Sqlite),
            other => Err(Error::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Business identity printed on documents.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "Your Company".to_string(),
            phone: None,
            email: None,
            website: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub database_path: PathBuf,
    pub logo_url: Option<String>,
    pub company: CompanyProfile,
    /// Fraction, e.g. `0.08` for 8%.
    pub estimate_tax_rate: f64,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            backend_url: None,
            backend_key: None,
            database_path: PathBuf::from("crm.db"),
            logo_url: None,
            company: CompanyProfile::default(),
            estimate_tax_rate: 0.0,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AppConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(kind) = get("CRM_BACKEND") {
            config.backend = kind.parse()?;
        }
        config.backend_url = get("CRM_BACKEND_URL");
        config.backend_key = get("CRM_BACKEND_KEY");
        if let Some(path) = get("CRM_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        config.logo_url = get("CRM_LOGO_URL");

        if let Some(name) = get("CRM_COMPANY_NAME") {
            config.company.name = name;
        }
        config.company.phone = get("CRM_COMPANY_PHONE");
        config.company.email = get("CRM_COMPANY_EMAIL");
        config.company.website = get("CRM_COMPANY_WEBSITE");

        if let Some(rate) = get("CRM_ESTIMATE_TAX_RATE") {
            let rate: f64 = rate
                .parse()
                .map_err(|_| Error::Config(format!("CRM_ESTIMATE_TAX_RATE is not a number: '{rate}'")))?;
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::Config(format!("CRM_ESTIMATE_TAX_RATE out of range: {rate}")));
            }
            config.estimate_tax_rate = rate;
        }

        if let Some(filter) = get("CRM_LOG") {
            config.log_filter = filter;
        }
        config.log_json = get("CRM_LOG_JSON").map(|v| parse_bool(&v)).unwrap_or(false);

        if config.backend == BackendKind::Rest {
            if config.backend_url.is_none() {
                return Err(Error::Config("CRM_BACKEND_URL is required for the rest backend".to_string()));
            }
            if config.backend_key.is_none() {
                return Err(Error::Config("CRM_BACKEND_KEY is required for the rest backend".to_string()));
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_to_local_sqlite() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database_path, PathBuf::from("crm.db"));
        assert_eq!(config.estimate_tax_rate, 0.0);
    }

    #[test]
    fn rest_backend_needs_url_and_key() {
        assert!(load(&[("CRM_BACKEND", "rest")]).is_err());
        assert!(load(&[("CRM_BACKEND", "rest"), ("CRM_BACKEND_URL", "https://x.test")]).is_err());
        let config = load(&[
            ("CRM_BACKEND", "REST"),
            ("CRM_BACKEND_URL", "https://x.test"),
            ("CRM_BACKEND_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(config.backend, BackendKind::Rest);
        assert_eq!(config.backend_key.as_deref(), Some("anon"));
    }

    #[test]
    fn reads_company_and_tax_settings() {
        let config = load(&[
            ("CRM_COMPANY_NAME", "Acme Plumbing"),
            ("CRM_COMPANY_PHONE", " 555-0100 "),
            ("CRM_COMPANY_EMAIL", ""),
            ("CRM_ESTIMATE_TAX_RATE", "0.08"),
            ("CRM_LOG_JSON", "true"),
        ])
        .unwrap();
        assert_eq!(config.company.name, "Acme Plumbing");
        assert_eq!(config.company.phone.as_deref(), Some("555-0100"));
        assert_eq!(config.company.email, None);
        assert_eq!(config.estimate_tax_rate, 0.08);
        assert!(config.log_json);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("CRM_BACKEND", "mongo")]).is_err());
        assert!(load(&[("CRM_ESTIMATE_TAX_RATE", "eight")]).is_err());
        assert!(load(&[("CRM_ESTIMATE_TAX_RATE", "-1")]).is_err());
    }
}
