//! `shadepack.yaml` configuration.
//!
//! ```yaml
//! name: ExampleMod
//! version: 1.5.0-pre2
//! origins:
//!   - build/classes
//!   - libs/dep-a.jar
//! exclude_patterns: ["**/NOTICE"]
//! mapping: mappings/mcp.srg
//! signing_key: keys/private_key.pem
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::archive::{archive_file_name, Compression, DEFAULT_NAME_TEMPLATE};
use crate::error::{PackError, PackResult};
use crate::filter::DEFAULT_EXCLUDES;
use crate::merge::ServicePolicy;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "shadepack.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfig {
    /// Archive base name.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub classifier: String,
    #[serde(default = "default_template")]
    pub archive_name_template: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Module output first, then shaded dependencies.
    #[serde(default)]
    pub origins: Vec<PathBuf>,
    #[serde(default = "default_excludes")]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub merge_service_files: bool,
    #[serde(default)]
    pub preserve_empty_directories: bool,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub mapping: Option<PathBuf>,
    #[serde(default)]
    pub signing_key: Option<PathBuf>,
}

fn default_template() -> String {
    DEFAULT_NAME_TEMPLATE.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build/libs")
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl PackConfig {
    /// Minimal config; every optional field takes its default.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            classifier: String::new(),
            archive_name_template: default_template(),
            output_dir: default_output_dir(),
            origins: Vec::new(),
            exclude_patterns: default_excludes(),
            merge_service_files: true,
            preserve_empty_directories: false,
            compression: Compression::default(),
            mapping: None,
            signing_key: None,
        }
    }

    /// Load from a YAML file, resolving relative paths against its directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parse from a YAML string. Paths are kept as written.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse config YAML")
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output_dir);
        self.origins.iter_mut().for_each(resolve);
        if let Some(p) = self.mapping.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.signing_key.as_mut() {
            resolve(p);
        }
    }

    pub fn service_policy(&self) -> ServicePolicy {
        if self.merge_service_files {
            ServicePolicy::Merge
        } else {
            ServicePolicy::FirstWins
        }
    }

    pub fn archive_file_name(&self) -> String {
        archive_file_name(
            &self.archive_name_template,
            &self.name,
            &self.version,
            &self.classifier,
        )
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(self.archive_file_name())
    }

    /// Checks that need no filesystem access.
    pub fn validate(&self) -> PackResult<()> {
        let fail = |message: &str| {
            Err(PackError::Config {
                message: message.to_string(),
            })
        };
        if self.name.trim().is_empty() {
            return fail("name must not be empty");
        }
        if self.version.trim().is_empty() {
            return fail("version must not be empty");
        }
        if self.origins.is_empty() {
            return fail("at least one origin is required");
        }
        let file_name = self.archive_file_name();
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(PackError::Config {
                message: format!("archive name '{}' is not a plain file name", file_name),
            });
        }
        Ok(())
    }
}
