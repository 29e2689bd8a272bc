// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Run settings, project files and stack configuration.
//!
//! Settings come either from `STACKHOST_*` environment variables, as set by
//! the engine when it launches a program, or from a `stackhost.yaml` project
//! file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::deferred::{Deferred, Payload};

#[cfg(test)]
#[path = "./settings_test.rs"]
mod settings_test;

/// Prefix of every environment variable read by [`RunSettings::from_vars`].
pub const ENV_PREFIX: &str = "STACKHOST_";

/// Name of the project file.
pub const PROJECT_FILE: &str = "stackhost.yaml";

const DEFAULT_PARALLELISM: usize = 48;

/// API version for project files.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "stackhost/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// Per-stack section of a project file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StackSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Configuration values, keyed by `key` or `namespace:key`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, serde_yaml::Value>,

    /// Configuration keys whose values are secret.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_keys: Vec<String>,
}

/// A `stackhost.yaml` project file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectSpec {
    pub api: ApiVersion,

    /// Project name, the second segment of every URN.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub stacks: IndexMap<String, StackSpec>,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl ProjectSpec {
    /// Parse a project from YAML.
    pub fn from_yaml<S: Into<String>>(yaml: S) -> crate::Result<Self> {
        let yaml = yaml.into();

        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        match with_version.api {
            ApiVersion::V0 => {
                serde_yaml::from_value(value).map_err(|e| crate::Error::InvalidYaml {
                    error: e,
                    yaml_content: yaml,
                })
            }
        }
    }

    /// Load a project from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut spec = Self::from_yaml(yaml)?;
        spec.source_path = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Find the project file in `dir` or the closest ancestor holding one.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|d| d.join(PROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Check names and configuration keys.
    pub fn validate(&self) -> crate::Result<()> {
        if !is_valid_name(&self.name) {
            return Err(crate::Error::InvalidSettings(format!(
                "invalid project name '{}'",
                self.name
            )));
        }
        for (stack, spec) in &self.stacks {
            if !is_valid_name(stack) {
                return Err(crate::Error::InvalidSettings(format!(
                    "invalid stack name '{stack}'"
                )));
            }
            let mut keys = HashSet::new();
            for key in spec.config.keys() {
                let full = full_key(&self.name, key)?;
                if !keys.insert(full.clone()) {
                    return Err(crate::Error::InvalidSettings(format!(
                        "stack {stack}: configuration key {full} is set more than once"
                    )));
                }
            }
            for secret in &spec.secret_keys {
                let full = full_key(&self.name, secret)?;
                if !keys.contains(&full) {
                    return Err(crate::Error::InvalidSettings(format!(
                        "stack {stack}: secret key {full} has no value"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Settings for running one stack of this project.
    pub fn settings(&self, stack: &str) -> crate::Result<RunSettings> {
        let spec = self.stacks.get(stack).ok_or_else(|| {
            crate::Error::InvalidSettings(format!(
                "stack '{stack}' is not defined in project {}",
                self.name
            ))
        })?;
        let mut config = StackConfig::new(&self.name);
        for (key, value) in &spec.config {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_json::to_string(other)?,
            };
            config.insert(key, value)?;
        }
        for key in &spec.secret_keys {
            config.mark_secret(key)?;
        }
        let mut settings = RunSettings::new(&self.name, stack);
        settings.organization = spec.organization.clone();
        settings.config = config;
        Ok(settings)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// How a program run is set up.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub project: String,
    pub stack: String,
    pub organization: Option<String>,
    /// A preview: resources are planned, not created.
    pub dry_run: bool,
    /// Upper bound on concurrent registrations the engine should expect.
    pub parallelism: usize,
    pub config: StackConfig,
}

impl RunSettings {
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        let project = project.into();
        Self {
            config: StackConfig::new(&project),
            project,
            stack: stack.into(),
            organization: None,
            dry_run: false,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from `STACKHOST_*` variables.
    ///
    /// `PROJECT` and `STACK` are required. `CONFIG` holds a JSON object of
    /// configuration values and `CONFIG_SECRET_KEYS` a JSON list of the keys
    /// among them that are secret.
    pub fn from_vars<I, K, V>(vars: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: IndexMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(ENV_PREFIX)
                    .map(|name| (name.to_string(), v.into()))
            })
            .collect();
        let required = |name: &str| {
            vars.get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    crate::Error::InvalidSettings(format!("{ENV_PREFIX}{name} is not set"))
                })
        };
        let mut settings = Self::new(required("PROJECT")?, required("STACK")?);
        settings.organization = vars.get("ORGANIZATION").filter(|v| !v.is_empty()).cloned();
        if let Some(dry_run) = vars.get("DRY_RUN") {
            settings.dry_run = parse_bool(dry_run).ok_or_else(|| {
                crate::Error::InvalidSettings(format!(
                    "{ENV_PREFIX}DRY_RUN must be true or false, got '{dry_run}'"
                ))
            })?;
        }
        if let Some(parallelism) = vars.get("PARALLELISM") {
            settings.parallelism = parallelism.parse().map_err(|_| {
                crate::Error::InvalidSettings(format!(
                    "{ENV_PREFIX}PARALLELISM must be a number, got '{parallelism}'"
                ))
            })?;
        }
        if let Some(config) = vars.get("CONFIG") {
            settings.config = StackConfig::from_json(
                &settings.project,
                config,
                vars.get("CONFIG_SECRET_KEYS").map(String::as_str),
            )?;
        }
        tracing::debug!(
            project = %settings.project,
            stack = %settings.stack,
            dry_run = settings.dry_run,
            "loaded run settings"
        );
        Ok(settings)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Namespace a configuration key with the project when it has none.
///
/// `ns:config:key` is accepted as an older spelling of `ns:key`.
fn full_key(project: &str, key: &str) -> crate::Result<String> {
    let parts: Vec<_> = key.split(':').collect();
    let full = match parts.as_slice() {
        [key] => format!("{project}:{key}"),
        [namespace, key] => format!("{namespace}:{key}"),
        [namespace, "config", key] => format!("{namespace}:{key}"),
        _ => {
            return Err(crate::Error::InvalidSettings(format!(
                "invalid configuration key '{key}'"
            )));
        }
    };
    if full.split(':').any(str::is_empty) {
        return Err(crate::Error::InvalidSettings(format!(
            "invalid configuration key '{key}'"
        )));
    }
    Ok(full)
}

/// Configuration values of the stack being run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackConfig {
    project: String,
    values: IndexMap<String, String>,
    secret_keys: HashSet<String>,
}

impl StackConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    /// Parse the JSON forms handed over by the engine.
    pub fn from_json(
        project: &str,
        values: &str,
        secret_keys: Option<&str>,
    ) -> crate::Result<Self> {
        let mut config = Self::new(project);
        let values: IndexMap<String, serde_json::Value> = serde_json::from_str(values)?;
        for (key, value) in values {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            config.insert(&key, value)?;
        }
        if let Some(secret_keys) = secret_keys {
            let keys: Vec<String> = serde_json::from_str(secret_keys)?;
            for key in keys {
                config.mark_secret(&key)?;
            }
        }
        Ok(config)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> crate::Result<()> {
        let key = full_key(&self.project, key)?;
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn mark_secret(&mut self, key: &str) -> crate::Result<()> {
        let key = full_key(&self.project, key)?;
        self.secret_keys.insert(key);
        Ok(())
    }

    pub fn is_secret(&self, key: &str) -> bool {
        full_key(&self.project, key).is_ok_and(|key| self.secret_keys.contains(&key))
    }

    /// Fully qualified keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Read a value. Secret keys come back as secret values.
    pub fn get(&self, key: &str) -> Option<Deferred<String>> {
        let full = full_key(&self.project, key).ok()?;
        let value = self.values.get(&full)?.clone();
        Some(if self.secret_keys.contains(&full) {
            Deferred::secret(value)
        } else {
            Deferred::known(value)
        })
    }

    pub fn require(&self, key: &str) -> crate::Result<Deferred<String>> {
        self.get(key).ok_or_else(|| {
            crate::Error::InvalidSettings(format!(
                "missing required configuration variable '{}'",
                full_key(&self.project, key).unwrap_or_else(|_| key.to_string())
            ))
        })
    }

    /// Read a value holding JSON, such as a number or an object.
    pub fn get_object<T>(&self, key: &str) -> crate::Result<Option<Deferred<T>>>
    where
        T: DeserializeOwned + Payload,
    {
        let full = full_key(&self.project, key)?;
        let Some(raw) = self.values.get(&full) else {
            return Ok(None);
        };
        let value: T = serde_json::from_str(raw)?;
        Ok(Some(if self.secret_keys.contains(&full) {
            Deferred::secret(value)
        } else {
            Deferred::known(value)
        }))
    }
}
