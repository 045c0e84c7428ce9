use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CivicError, Result};
use crate::types::DepartmentContext;

/// Top-level configuration for the civic services assistant.
///
/// Loaded once at startup from TOML and shared immutably. Branding and
/// department profiles live here rather than in global state; `load`
/// rejects a file whose department table does not cover every context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub brand: BrandConfig,
    #[serde(default = "default_departments")]
    pub departments: BTreeMap<String, DepartmentProfile>,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            brand: BrandConfig::default(),
            departments: default_departments(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PortalConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check that the department table is exactly the closed context set
    /// and that numeric settings are coherent.
    pub fn validate(&self) -> Result<()> {
        for key in self.departments.keys() {
            if DepartmentContext::from_id(key).is_none() {
                return Err(CivicError::Config(format!(
                    "unknown department '{}' in [departments]",
                    key
                )));
            }
        }
        for dept in DepartmentContext::ALL {
            match self.departments.get(dept.as_str()) {
                None => {
                    return Err(CivicError::Config(format!(
                        "missing profile for department '{}'",
                        dept
                    )))
                }
                Some(profile) if profile.name.trim().is_empty() => {
                    return Err(CivicError::Config(format!(
                        "department '{}' has an empty name",
                        dept
                    )))
                }
                Some(_) => {}
            }
        }
        if self.brand.name.trim().is_empty() {
            return Err(CivicError::Config("brand.name must not be empty".into()));
        }
        if self.chat.latency_min_ms > self.chat.latency_max_ms {
            return Err(CivicError::Config(format!(
                "chat.latency_min_ms ({}) exceeds chat.latency_max_ms ({})",
                self.chat.latency_min_ms, self.chat.latency_max_ms
            )));
        }
        if self.chat.max_message_length == 0 {
            return Err(CivicError::Config(
                "chat.max_message_length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Profile for a department.
    ///
    /// Validation guarantees presence; an unvalidated config missing the
    /// entry falls back to the built-in default profile.
    pub fn department(&self, dept: DepartmentContext) -> DepartmentProfile {
        self.departments
            .get(dept.as_str())
            .cloned()
            .unwrap_or_else(|| DepartmentProfile::builtin(dept))
    }

    /// Application id safe for use as a collection path segment.
    pub fn sanitized_app_id(&self) -> String {
        sanitize_app_id(&self.general.app_id)
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_app_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Application id scoping the message collections.
    pub app_id: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            app_id: "default-app-id".to_string(),
        }
    }
}

/// Portal branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    pub name: String,
    pub domain: String,
    pub description: String,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: "CommunitySphere".to_string(),
            domain: ".gov".to_string(),
            description: "The Unified Citizen Services Portal".to_string(),
        }
    }
}

/// Display profile of one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentProfile {
    pub name: String,
    pub brand: String,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub query_suggestion: String,
}

impl DepartmentProfile {
    fn new(name: &str, brand: &str, hero_title: &str, hero_subtitle: &str, suggestion: &str) -> Self {
        Self {
            name: name.to_string(),
            brand: brand.to_string(),
            hero_title: hero_title.to_string(),
            hero_subtitle: hero_subtitle.to_string(),
            query_suggestion: suggestion.to_string(),
        }
    }

    /// Built-in profile for a department.
    pub fn builtin(dept: DepartmentContext) -> Self {
        match dept {
            DepartmentContext::Home => Self::new(
                "Home",
                "CommunitySphere",
                "Welcome to CommunitySphere",
                "The Unified Citizen Services Portal",
                "What services can you help me with?",
            ),
            DepartmentContext::Tax => Self::new(
                "Tax Office",
                "TaxCentral",
                "Annual Tax Assessment",
                "Review your obligations and submit required fiscal documentation.",
                "How do I file my taxes?",
            ),
            DepartmentContext::Vehicle => Self::new(
                "Vehicle Services",
                "AutoReg",
                "Vehicle Services Portal",
                "Renew registrations, pay fines, and manage titles online.",
                "How to register my vehicle?",
            ),
            DepartmentContext::Benefits => Self::new(
                "Unemployment",
                "LaborAssist",
                "Unemployment Assistance",
                "Supporting the workforce during transitions with financial aid and job placement.",
                "Apply for childcare benefits",
            ),
            DepartmentContext::Housing => Self::new(
                "Housing Authority",
                "CityHomes",
                "Affordable Housing Initiative",
                "Connecting families with safe, affordable, and sustainable housing options.",
                "How to apply for housing?",
            ),
            DepartmentContext::Waste => Self::new(
                "Waste Services",
                "CleanCity",
                "Collection & Recycling",
                "Find your pickup schedule, request bulk collection, and recycle responsibly.",
                "When is my trash collected?",
            ),
        }
    }
}

fn default_departments() -> BTreeMap<String, DepartmentProfile> {
    DepartmentContext::ALL
        .into_iter()
        .map(|d| (d.as_str().to_string(), DepartmentProfile::builtin(d)))
        .collect()
}

/// Chat behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Lower bound of the simulated router latency.
    pub latency_min_ms: u64,
    /// Upper bound of the simulated router latency. Zero disables it.
    pub latency_max_ms: u64,
    /// Longest accepted user message, in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            latency_min_ms: 400,
            latency_max_ms: 1500,
            max_message_length: 2000,
        }
    }
}

/// Which document store backs the transcripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file used by the sqlite backend.
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            sqlite_path: "civic-data/messages.db".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// In-memory identity provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Custom sign-in tokens accepted by the provider, mapped to the uid
    /// they resolve to.
    pub custom_tokens: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PortalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.brand.name, "CommunitySphere");
        assert_eq!(config.departments.len(), DepartmentContext::ALL.len());
        assert_eq!(config.chat.latency_min_ms, 400);
        assert_eq!(config.chat.latency_max_ms, 1500);
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config(
            r#"
[brand]
name = "LocalSphere"

[chat]
latency_min_ms = 0
latency_max_ms = 0
"#,
        );
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.brand.name, "LocalSphere");
        assert_eq!(config.brand.domain, ".gov");
        assert_eq!(config.chat.latency_max_ms, 0);
        assert_eq!(config.department(DepartmentContext::Tax).name, "Tax Office");
    }

    #[test]
    fn test_load_rejects_missing_department() {
        let file = create_temp_config(
            r#"
[departments.tax]
name = "Revenue"
brand = "Rev"
hero_title = "t"
hero_subtitle = "s"
query_suggestion = "q"
"#,
        );
        let err = PortalConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CivicError::Config(_)));
        assert!(err.to_string().contains("missing profile"));
    }

    #[test]
    fn test_validate_rejects_unknown_department() {
        let mut config = PortalConfig::default();
        config.departments.insert(
            "parks".into(),
            DepartmentProfile::builtin(DepartmentContext::Home),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown department 'parks'"));
    }

    #[test]
    fn test_validate_rejects_inverted_latency() {
        let mut config = PortalConfig::default();
        config.chat.latency_min_ms = 2000;
        config.chat.latency_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[[[ nope");
        assert!(PortalConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PortalConfig::load_or_default(Path::new("/does/not/exist/civic.toml"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.app_id, "default-app-id");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("civic.toml");
        let mut config = PortalConfig::default();
        config.server.port = 9999;
        config
            .identity
            .custom_tokens
            .insert("tok-1".into(), "u1".into());
        config.save(&path).unwrap();

        let loaded = PortalConfig::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9999);
        assert_eq!(loaded.identity.custom_tokens.get("tok-1").unwrap(), "u1");
        assert_eq!(loaded.departments, config.departments);
    }

    #[test]
    fn test_sanitize_app_id() {
        assert_eq!(sanitize_app_id("city portal/v2.1"), "city_portal_v2_1");
        assert_eq!(sanitize_app_id("ok-id_9"), "ok-id_9");
    }
}
