// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Resource options and how option bags combine.

use std::fmt;
use std::time::Duration;

use crate::alias::Alias;
use crate::deferred::Deferred;
use crate::resource::{Resource, Transformation};

#[cfg(test)]
#[path = "./options_test.rs"]
mod options_test;

/// Engine-side timeouts for the create, update and delete operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomTimeouts {
    pub create: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl CustomTimeouts {
    /// Render a timeout the way the engine parses durations.
    pub fn format(timeout: Option<Duration>) -> String {
        timeout
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_default()
    }
}

/// Options shared by every kind of resource.
#[derive(Clone, Default)]
pub struct CommonOptions {
    /// Adopt an existing resource with this id instead of creating one.
    pub id: Option<Deferred<String>>,
    pub parent: Option<Resource>,
    pub depends_on: Vec<Resource>,
    /// Unset means "same as the parent".
    pub protect: Option<bool>,
    pub ignore_changes: Vec<String>,
    pub replace_on_changes: Vec<String>,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
    pub provider: Option<Resource>,
    pub custom_timeouts: Option<CustomTimeouts>,
    pub retain_on_delete: Option<bool>,
    pub transformations: Vec<Transformation>,
    pub aliases: Vec<Alias>,
    /// Look up an existing resource by URN.
    pub urn: Option<String>,
}

impl CommonOptions {
    /// Merge two option bags into a new one.
    ///
    /// Scalars in `b` win unless absent, lists are concatenated `a` then `b`,
    /// and protection is never downgraded.
    pub fn merge(a: &Self, b: &Self) -> Self {
        Self {
            id: b.id.clone().or_else(|| a.id.clone()),
            parent: b.parent.clone().or_else(|| a.parent.clone()),
            depends_on: concat(&a.depends_on, &b.depends_on),
            protect: match (a.protect, b.protect) {
                (None, None) => None,
                (x, y) => Some(x.unwrap_or(false) || y.unwrap_or(false)),
            },
            ignore_changes: concat(&a.ignore_changes, &b.ignore_changes),
            replace_on_changes: concat(&a.replace_on_changes, &b.replace_on_changes),
            version: b.version.clone().or_else(|| a.version.clone()),
            plugin_download_url: b
                .plugin_download_url
                .clone()
                .or_else(|| a.plugin_download_url.clone()),
            provider: b.provider.clone().or_else(|| a.provider.clone()),
            custom_timeouts: b
                .custom_timeouts
                .clone()
                .or_else(|| a.custom_timeouts.clone()),
            retain_on_delete: b.retain_on_delete.or(a.retain_on_delete),
            transformations: concat(&a.transformations, &b.transformations),
            aliases: concat(&a.aliases, &b.aliases),
            urn: b.urn.clone().or_else(|| a.urn.clone()),
        }
    }
}

impl fmt::Debug for CommonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonOptions")
            .field("parent", &self.parent)
            .field("depends_on", &self.depends_on)
            .field("protect", &self.protect)
            .field("version", &self.version)
            .field("provider", &self.provider)
            .field("aliases", &self.aliases.len())
            .field("transformations", &self.transformations.len())
            .field("urn", &self.urn)
            .finish_non_exhaustive()
    }
}

/// Options for resources managed by a provider.
#[derive(Debug, Clone, Default)]
pub struct CustomResourceOptions {
    pub common: CommonOptions,
    pub delete_before_replace: Option<bool>,
    /// Output properties the engine should treat as secret.
    pub additional_secret_outputs: Vec<String>,
    /// Import an existing resource with this id.
    pub import_id: Option<String>,
}

impl CustomResourceOptions {
    pub fn merge(a: &Self, b: &Self) -> Self {
        Self {
            common: CommonOptions::merge(&a.common, &b.common),
            delete_before_replace: b.delete_before_replace.or(a.delete_before_replace),
            additional_secret_outputs: concat(
                &a.additional_secret_outputs,
                &b.additional_secret_outputs,
            ),
            import_id: b.import_id.clone().or_else(|| a.import_id.clone()),
        }
    }
}

/// Options for component resources that group other resources.
#[derive(Debug, Clone, Default)]
pub struct ComponentResourceOptions {
    pub common: CommonOptions,
    /// Providers handed down to children, one per package.
    pub providers: Vec<Resource>,
}

impl ComponentResourceOptions {
    pub fn merge(a: &Self, b: &Self) -> Self {
        Self {
            common: CommonOptions::merge(&a.common, &b.common),
            providers: concat(&a.providers, &b.providers),
        }
    }

    /// Reject option bags that name a provider both ways.
    pub fn validate(&self) -> crate::Result<()> {
        if self.common.provider.is_some() && !self.providers.is_empty() {
            return Err(crate::Error::IdentityConflict(
                "do not supply both 'provider' and 'providers' options to a component".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options for either kind of resource.
#[derive(Debug, Clone)]
pub enum ResourceOptions {
    Custom(CustomResourceOptions),
    Component(ComponentResourceOptions),
}

impl ResourceOptions {
    pub fn common(&self) -> &CommonOptions {
        match self {
            Self::Custom(opts) => &opts.common,
            Self::Component(opts) => &opts.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonOptions {
        match self {
            Self::Custom(opts) => &mut opts.common,
            Self::Component(opts) => &mut opts.common,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Custom(_) => Ok(()),
            Self::Component(opts) => opts.validate(),
        }
    }
}

impl From<CustomResourceOptions> for ResourceOptions {
    fn from(value: CustomResourceOptions) -> Self {
        Self::Custom(value)
    }
}

impl From<ComponentResourceOptions> for ResourceOptions {
    fn from(value: ComponentResourceOptions) -> Self {
        Self::Component(value)
    }
}

fn concat<T: Clone>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter().chain(b).cloned().collect()
}
