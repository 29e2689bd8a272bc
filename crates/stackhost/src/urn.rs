// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Resource URNs: `urn:pulumi:<stack>::<project>::<qualified type>::<name>`.
//!
//! The qualified type of a child resource is its parent's qualified type and
//! its own type joined with `$`, except for children of the root stack.

use std::fmt;
use std::str::FromStr;

use crate::deferred::Deferred;

#[cfg(test)]
#[path = "./urn_test.rs"]
mod urn_test;

pub const URN_PREFIX: &str = "urn:pulumi:";

/// Type of the synthetic resource every tree is rooted at.
pub const ROOT_STACK_TYPE: &str = "pulumi:pulumi:Stack";

/// Type prefix shared by all provider resources.
pub const PROVIDER_TYPE_PREFIX: &str = "pulumi:providers:";

const SEPARATOR: &str = "::";

/// Compute a URN from its parts.
pub fn create_urn(
    name: &str,
    type_: &str,
    parent_urn: Option<&str>,
    project: &str,
    stack: &str,
) -> String {
    let prefix = match parent_urn.and_then(|p| p.parse::<Urn>().ok()) {
        Some(parent) if parent.qualified_type != ROOT_STACK_TYPE => format!(
            "{URN_PREFIX}{}{SEPARATOR}{}{SEPARATOR}{}$",
            parent.stack, parent.project, parent.qualified_type
        ),
        _ => format!("{URN_PREFIX}{stack}{SEPARATOR}{project}{SEPARATOR}"),
    };
    format!("{prefix}{type_}{SEPARATOR}{name}")
}

/// Compute a URN whose parent URN may not be known yet.
pub fn create(
    name: &str,
    type_: &str,
    parent_urn: Option<&Deferred<String>>,
    project: &str,
    stack: &str,
) -> Deferred<String> {
    let (name, type_, project, stack) = (
        name.to_string(),
        type_.to_string(),
        project.to_string(),
        stack.to_string(),
    );
    match parent_urn {
        None => Deferred::known(create_urn(&name, &type_, None, &project, &stack)),
        Some(parent) => parent.map(move |parent| {
            create_urn(&name, &type_, Some(&parent), &project, &stack)
        }),
    }
}

/// The package a type token belongs to.
///
/// `aws:s3/bucket:Bucket` belongs to `aws`; the provider type
/// `pulumi:providers:aws` belongs to `aws` as well.
pub fn package_of(type_: &str) -> &str {
    match type_.strip_prefix(PROVIDER_TYPE_PREFIX) {
        Some(package) => package,
        None => type_.split(':').next().unwrap_or(type_),
    }
}

/// A parsed URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urn {
    pub stack: String,
    pub project: String,
    pub qualified_type: String,
    pub name: String,
}

impl Urn {
    /// The resource's own type token, the last `$` segment of the qualified type.
    pub fn type_token(&self) -> &str {
        self.qualified_type
            .rsplit('$')
            .next()
            .unwrap_or(&self.qualified_type)
    }

    /// Qualified type of the parent, if the resource is nested.
    pub fn parent_type(&self) -> Option<&str> {
        self.qualified_type.rsplit_once('$').map(|(parent, _)| parent)
    }
}

impl FromStr for Urn {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let rest = s
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| crate::Error::InvalidUrn(s.to_string()))?;
        // names may themselves contain the separator, so only split three times
        let mut parts = rest.splitn(4, SEPARATOR);
        let mut next = || {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .ok_or_else(|| crate::Error::InvalidUrn(s.to_string()))
        };
        Ok(Self {
            stack: next()?,
            project: next()?,
            qualified_type: next()?,
            name: next()?,
        })
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URN_PREFIX}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.stack, self.project, self.qualified_type, self.name
        )
    }
}
