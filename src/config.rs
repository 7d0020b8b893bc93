use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub outbound: OutboundConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Folder scanned for incoming documents
    #[serde(default = "default_inbox")]
    pub inbox: PathBuf,
    /// Staging folder for outbound email copies; relative paths are
    /// resolved against the inbox
    #[serde(default = "default_outbound")]
    pub outbound: PathBuf,
    /// Ordered rules file (YAML mapping of key -> [patterns, actions, destinations])
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            inbox: default_inbox(),
            outbound: default_outbound(),
            rules_file: default_rules_file(),
        }
    }
}

impl WatchConfig {
    /// Absolute outbound staging directory
    pub fn outbound_dir(&self) -> PathBuf {
        if self.outbound.is_absolute() {
            self.outbound.clone()
        } else {
            self.inbox.join(&self.outbound)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Hard timeout for external converters, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Argv template for PDF extraction; `{input}` is replaced by the file
    /// path, output is read from stdout unless `{output}` appears
    #[serde(default = "default_pdf_converter")]
    pub pdf_converter: Vec<String>,
    /// Argv template for EPUB extraction
    #[serde(default = "default_epub_converter")]
    pub epub_converter: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            pdf_converter: default_pdf_converter(),
            epub_converter: default_epub_converter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Per-kind overrides for the default (unclassified) destination folder,
    /// keyed by the kind's config name (e.g. "pdf", "figure")
    #[serde(default)]
    pub default_folders: HashMap<String, String>,
    /// Custom collision token; when unset, collisions rename sequentially
    /// ("name 1.ext", "name 2.ext", ...)
    #[serde(default)]
    pub increment_token: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_folders: HashMap::new(),
            increment_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Argv template for the delivery command, with `{recipient}`,
    /// `{subject}` and `{attachment}` placeholders. Empty disables the
    /// delivery pass; staged files then wait for an external agent.
    #[serde(default)]
    pub command: Vec<String>,
    /// Hard timeout for the delivery command, in seconds
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_delivery_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_inbox() -> PathBuf {
    PathBuf::from(".")
}

fn default_outbound() -> PathBuf {
    PathBuf::from("to_be_emailed")
}

fn default_rules_file() -> PathBuf {
    PathBuf::from("rules.yaml")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_delivery_timeout_secs() -> u64 {
    60
}

fn default_pdf_converter() -> Vec<String> {
    ["pdftotext", "-f", "1", "-l", "10", "{input}", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_epub_converter() -> Vec<String> {
    ["ebook-convert", "{input}", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::Config(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.watch.inbox.as_os_str().is_empty() {
            return Err(TriageError::Config(
                "watch.inbox cannot be empty".to_string(),
            ));
        }
        if self.watch.outbound.as_os_str().is_empty() {
            return Err(TriageError::Config(
                "watch.outbound cannot be empty".to_string(),
            ));
        }

        if self.extract.timeout_secs == 0 {
            return Err(TriageError::Config(
                "extract.timeout_secs must be at least 1".to_string(),
            ));
        }

        for (name, template) in [
            ("extract.pdf_converter", &self.extract.pdf_converter),
            ("extract.epub_converter", &self.extract.epub_converter),
        ] {
            if template.is_empty() {
                return Err(TriageError::Config(format!("{} cannot be empty", name)));
            }
            if !template.iter().any(|a| a.contains("{input}")) {
                return Err(TriageError::Config(format!(
                    "{} must contain an {{input}} placeholder",
                    name
                )));
            }
        }

        if !self.outbound.command.is_empty() {
            if !self
                .outbound
                .command
                .iter()
                .any(|a| a.contains("{attachment}"))
            {
                return Err(TriageError::Config(
                    "outbound.command must contain an {attachment} placeholder".to_string(),
                ));
            }
            if self.outbound.timeout_secs == 0 {
                return Err(TriageError::Config(
                    "outbound.timeout_secs must be at least 1".to_string(),
                ));
            }
        }

        if let Some(token) = &self.routing.increment_token {
            if token.is_empty() {
                return Err(TriageError::Config(
                    "routing.increment_token cannot be an empty string".to_string(),
                ));
            }
        }

        for (kind, folder) in &self.routing.default_folders {
            if folder.is_empty() {
                return Err(TriageError::Config(format!(
                    "routing.default_folders.{} cannot be empty",
                    kind
                )));
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.watch.inbox, PathBuf::from("."));
        assert_eq!(config.watch.outbound, PathBuf::from("to_be_emailed"));
        assert_eq!(config.watch.rules_file, PathBuf::from("rules.yaml"));
        assert_eq!(config.extract.timeout_secs, 30);
        assert!(config.extract.pdf_converter.contains(&"{input}".to_string()));
        assert!(config.routing.increment_token.is_none());
        assert!(config.routing.default_folders.is_empty());
        assert!(!config.execution.dry_run);
    }

    #[test]
    fn test_outbound_dir_resolution() {
        let mut config = Config::default();
        config.watch.inbox = PathBuf::from("/watch/inbox");

        assert_eq!(
            config.watch.outbound_dir(),
            PathBuf::from("/watch/inbox/to_be_emailed")
        );

        config.watch.outbound = PathBuf::from("/elsewhere/staging");
        assert_eq!(
            config.watch.outbound_dir(),
            PathBuf::from("/elsewhere/staging")
        );
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_timeout_zero() {
        let mut config = Config::default();
        config.extract.timeout_secs = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least 1"));
    }

    #[test]
    fn test_config_validation_converter_missing_placeholder() {
        let mut config = Config::default();
        config.extract.pdf_converter = vec!["pdftotext".to_string()];
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("{input} placeholder"));
    }

    #[test]
    fn test_config_validation_outbound_command() {
        let mut config = Config::default();
        // empty command is fine: delivery pass disabled
        assert!(config.validate().is_ok());

        config.outbound.command = vec!["sendmail".to_string()];
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("{attachment} placeholder"));

        config.outbound.command =
            vec!["sendmail".to_string(), "{recipient}".to_string(), "{attachment}".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_increment_token() {
        let mut config = Config::default();
        config.routing.increment_token = Some(String::new());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("increment_token"));
    }

    #[test]
    fn test_config_validation_empty_default_folder() {
        let mut config = Config::default();
        config
            .routing
            .default_folders
            .insert("pdf".to_string(), String::new());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("default_folders.pdf"));
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.watch.inbox = PathBuf::from("/downloads");
        config.execution.dry_run = true;
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.watch.inbox, PathBuf::from("/downloads"));
        assert!(loaded.execution.dry_run);
        assert_eq!(loaded.extract.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-doc-triage-config-12345.toml");

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.watch.rules_file, PathBuf::from("rules.yaml"));
        assert_eq!(config.extract.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        tokio::fs::write(path, "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(path).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let partial_config = r#"
[watch]
inbox = "/users/me/Downloads"

[execution]
dry_run = true

[routing]
increment_token = "-"

[routing.default_folders]
figure = "images"
"#;
        tokio::fs::write(path, partial_config).await.unwrap();

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.watch.inbox, PathBuf::from("/users/me/Downloads"));
        assert!(config.execution.dry_run);
        assert_eq!(config.routing.increment_token.as_deref(), Some("-"));
        assert_eq!(
            config.routing.default_folders.get("figure").map(String::as_str),
            Some("images")
        );

        // Defaults still present
        assert_eq!(config.extract.timeout_secs, 30);
        assert_eq!(config.watch.outbound, PathBuf::from("to_be_emailed"));
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::create_example(path).await.unwrap();

        assert!(path.exists());
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.extract.timeout_secs, 30);
    }
}
