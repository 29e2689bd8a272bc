// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Lookup of resource types that are known to this process.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::resource::ResourceKind;

#[cfg(test)]
#[path = "./registry_test.rs"]
mod registry_test;

/// A `major.minor.patch` package version.
///
/// A leading `v` is accepted and any pre-release or build suffix is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        let parts = core
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| crate::Error::InvalidVersion(s.to_string()))
            })
            .collect::<crate::Result<Vec<_>>>()?;
        match parts.as_slice() {
            [major] => Ok(Self::new(*major, 0, 0)),
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(crate::Error::InvalidVersion(s.to_string())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A resource type this process can rehydrate from a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredType {
    pub type_token: String,
    /// `None` registers the type for every version.
    pub version: Option<Version>,
    pub kind: ResourceKind,
}

impl RegisteredType {
    pub fn new(type_token: impl Into<String>, version: Option<Version>, kind: ResourceKind) -> Self {
        Self {
            type_token: type_token.into(),
            version,
            kind,
        }
    }
}

type Entries = HashMap<String, Vec<RegisteredType>>;
type Loader = Box<dyn FnOnce() -> Entries + Send>;

/// Registered resource types, keyed by type token.
///
/// The table is built at most once, on first lookup, and only read afterwards.
pub struct TypeRegistry {
    entries: Lazy<Entries, Loader>,
}

impl TypeRegistry {
    pub fn new(types: impl IntoIterator<Item = RegisteredType>) -> Self {
        let entries = index(types);
        Self::from_loader(Box::new(move || entries))
    }

    /// A registry whose contents are produced by `load` on first use.
    pub fn lazy<F>(load: F) -> Self
    where
        F: FnOnce() -> Vec<RegisteredType> + Send + 'static,
    {
        Self::from_loader(Box::new(move || index(load())))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn from_loader(loader: Loader) -> Self {
        Self {
            entries: Lazy::new(loader),
        }
    }

    /// Find the registration to use for a type token.
    ///
    /// With a requested version, the highest registered version of the same
    /// major that is at least the requested one wins. Without one, the
    /// highest registered version wins. Failing both, the first entry that
    /// was registered for every version is used.
    pub fn resolve(&self, type_token: &str, version: Option<&Version>) -> Option<&RegisteredType> {
        let candidates = self.entries.get(type_token)?;
        let versioned = candidates.iter().filter_map(|entry| {
            entry.version.map(|v| (v, entry))
        });
        let best = match version {
            Some(requested) => versioned
                .filter(|(v, _)| v.major == requested.major && v >= requested)
                .max_by_key(|(v, _)| *v),
            None => versioned.max_by_key(|(v, _)| *v),
        };
        let found = best
            .map(|(_, entry)| entry)
            .or_else(|| candidates.iter().find(|entry| entry.version.is_none()));
        if found.is_none() {
            tracing::debug!(%type_token, ?version, "no registered type matches");
        }
        found
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Lazy::get(&self.entries) {
            Some(entries) => f
                .debug_struct("TypeRegistry")
                .field("types", &entries.len())
                .finish(),
            None => f.write_str("TypeRegistry(<not loaded>)"),
        }
    }
}

fn index(types: impl IntoIterator<Item = RegisteredType>) -> Entries {
    let mut entries = Entries::new();
    for entry in types {
        entries
            .entry(entry.type_token.clone())
            .or_default()
            .push(entry);
    }
    entries
}
