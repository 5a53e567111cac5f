//! Run configuration
//!
//! TOML file with environment overrides. The config only carries knobs; the
//! engine modules own their semantics. Every option has a default so a
//! minimal file with just the two endpoints is enough to run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::api::resilience::{ResilienceConfig, RetryConfig, WorkerConfig};
use crate::migrate::schema::{self, EntityKind};
use crate::migrate::select::SelectionCriterion;

pub const DEFAULT_CONFIG_FILE: &str = "metaport.toml";

fn default_batch_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

fn default_max_workers() -> usize {
    8
}

/// One catalog instance endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    /// JWT bearer token; usually supplied via environment instead
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self { output_dir: default_output_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportSection {
    #[serde(default = "default_output_dir")]
    pub input_dir: PathBuf,
    #[serde(default)]
    pub update_existing: bool,
    #[serde(default = "default_true")]
    pub skip_on_error: bool,
    #[serde(default)]
    pub create_missing_dependencies: bool,
    /// Optional ordering hint, validated against the dependency graph
    #[serde(default)]
    pub import_order: Option<Vec<String>>,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            input_dir: default_output_dir(),
            update_existing: false,
            skip_on_error: true,
            create_missing_dependencies: false,
            import_order: None,
        }
    }
}

/// Selective migration: root domains plus linkage flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectiveSection {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub linked_data_products_only: bool,
    #[serde(default)]
    pub linked_assets_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvancedSection {
    /// Seconds per remote call
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Milliseconds before the first retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub source: EndpointConfig,
    #[serde(default)]
    pub target: EndpointConfig,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub selective: SelectiveSection,
    /// Per-kind include flags; an empty table means every kind
    #[serde(default)]
    pub entities: BTreeMap<String, bool>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub include_system_entities: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub advanced: AdvancedSection,
}

impl MigrationConfig {
    /// Load from a TOML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        // .env files are a convenience for tokens; absence is fine.
        dotenvy::dotenv().ok();
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: MigrationConfig = toml::from_str(&body)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("METAPORT_SOURCE_URL") {
            self.source.url = url;
        }
        if let Ok(token) = std::env::var("METAPORT_SOURCE_TOKEN") {
            self.source.token = Some(token);
        }
        if let Ok(url) = std::env::var("METAPORT_TARGET_URL") {
            self.target.url = url;
        }
        if let Ok(token) = std::env::var("METAPORT_TARGET_TOKEN") {
            self.target.token = Some(token);
        }
        if let Ok(dir) = std::env::var("METAPORT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("METAPORT_INPUT_DIR") {
            self.import.input_dir = PathBuf::from(dir);
        }
    }

    /// Kinds enabled by the `entities` table. An empty table enables every
    /// registered kind; unknown keys are configuration errors.
    pub fn enabled_kinds(&self) -> Result<BTreeSet<EntityKind>> {
        if self.entities.is_empty() {
            return Ok(schema::all_kinds().iter().copied().collect());
        }
        let mut kinds = BTreeSet::new();
        for (name, enabled) in &self.entities {
            let kind = EntityKind::parse(name)?;
            if *enabled {
                kinds.insert(kind);
            }
        }
        Ok(kinds)
    }

    /// Selection criterion implied by the `selective` section.
    pub fn criterion(&self) -> SelectionCriterion {
        if self.selective.domains.is_empty() {
            return SelectionCriterion::All;
        }
        SelectionCriterion::Linked {
            domains: self.selective.domains.iter().cloned().collect(),
            data_products: self.selective.linked_data_products_only,
            assets: self.selective.linked_assets_only,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.advanced.max_retries.max(1),
            base_delay: Duration::from_millis(self.advanced.retry_delay),
            request_timeout: Duration::from_secs(self.advanced.request_timeout),
            ..RetryConfig::default()
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig { max_workers: self.advanced.max_workers }
    }

    /// Combined resilience configuration from the `advanced` section.
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig { retry: self.retry_config(), workers: self.worker_config() }
    }

    /// Parsed `import.import_order` hint.
    pub fn order_hint(&self) -> Result<Option<Vec<EntityKind>>> {
        match &self.import.import_order {
            None => Ok(None),
            Some(names) => {
                let kinds = names
                    .iter()
                    .map(|name| EntityKind::parse(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(kinds))
            }
        }
    }
}
