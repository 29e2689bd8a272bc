// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Aliases: previous identities a resource should still answer to.

use crate::deferred::Deferred;
use crate::resource::Resource;
use crate::urn;

#[cfg(test)]
#[path = "./alias_test.rs"]
mod alias_test;

/// Where an alias says the resource used to live.
#[derive(Debug, Clone, Default)]
enum AliasParent {
    /// Same parent as the resource has now.
    #[default]
    Inherit,
    Resource(Resource),
    Urn(Deferred<String>),
    NoParent,
}

/// A previous identity of a resource.
///
/// Either a literal URN, or a set of identity fields where any field left
/// out defaults to the resource's current value.
#[derive(Debug, Clone, Default)]
pub struct Alias {
    urn: Option<Deferred<String>>,
    name: Option<String>,
    type_: Option<String>,
    project: Option<String>,
    stack: Option<String>,
    parent: AliasParent,
}

/// The current identity of the resource an alias is attached to.
#[derive(Debug, Clone, Copy)]
pub struct AliasDefaults<'a> {
    pub name: &'a str,
    pub type_: &'a str,
    pub project: &'a str,
    pub stack: &'a str,
    pub parent: Option<&'a Resource>,
}

impl Alias {
    /// An alias that is exactly the given URN.
    pub fn from_urn(urn: impl Into<String>) -> Self {
        Self {
            urn: Some(Deferred::known(urn.into())),
            ..Default::default()
        }
    }

    pub fn builder() -> AliasBuilder {
        AliasBuilder::default()
    }

    /// Resolve this alias to a URN using the resource's identity for
    /// every field the alias leaves out.
    pub fn collapse(&self, defaults: AliasDefaults<'_>) -> Deferred<String> {
        if let Some(urn) = &self.urn {
            return urn.clone();
        }
        let name = self.name.as_deref().unwrap_or(defaults.name);
        let type_ = self.type_.as_deref().unwrap_or(defaults.type_);
        let project = self.project.as_deref().unwrap_or(defaults.project);
        let stack = self.stack.as_deref().unwrap_or(defaults.stack);
        let parent_urn = match &self.parent {
            AliasParent::Inherit => defaults.parent.map(|p| p.urn().clone()),
            AliasParent::Resource(parent) => Some(parent.urn().clone()),
            AliasParent::Urn(parent_urn) => Some(parent_urn.clone()),
            AliasParent::NoParent => None,
        };
        urn::create(name, type_, parent_urn.as_ref(), project, stack)
    }
}

/// Collects alias fields and checks that at most one parent is named.
#[derive(Debug, Default)]
pub struct AliasBuilder {
    name: Option<String>,
    type_: Option<String>,
    project: Option<String>,
    stack: Option<String>,
    parent: Option<Resource>,
    parent_urn: Option<Deferred<String>>,
    no_parent: bool,
}

impl AliasBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn parent(mut self, parent: &Resource) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn parent_urn(mut self, parent_urn: Deferred<String>) -> Self {
        self.parent_urn = Some(parent_urn);
        self
    }

    pub fn no_parent(mut self) -> Self {
        self.no_parent = true;
        self
    }

    pub fn build(self) -> crate::Result<Alias> {
        let parent = match (self.parent, self.parent_urn, self.no_parent) {
            (None, None, false) => AliasParent::Inherit,
            (Some(parent), None, false) => AliasParent::Resource(parent),
            (None, Some(parent_urn), false) => AliasParent::Urn(parent_urn),
            (None, None, true) => AliasParent::NoParent,
            _ => {
                return Err(crate::Error::IdentityConflict(
                    "an alias may specify only one of parent, parent URN or no parent".to_string(),
                ));
            }
        };
        Ok(Alias {
            urn: None,
            name: self.name,
            type_: self.type_,
            project: self.project,
            stack: self.stack,
            parent,
        })
    }
}

/// Alias a child inherits from one of its parent's aliases.
///
/// When the child's name starts with the parent's name, that prefix is
/// replaced by the name in the parent alias, so renaming a component also
/// renames the children it named after itself.
pub fn inherited_child_alias(
    child_name: &str,
    parent_name: &str,
    parent_alias: &Deferred<String>,
    child_type: &str,
) -> Deferred<String> {
    let (child_name, parent_name, child_type) = (
        child_name.to_string(),
        parent_name.to_string(),
        child_type.to_string(),
    );
    parent_alias.apply(move |alias_urn| match alias_urn.parse::<urn::Urn>() {
        Ok(parent) => {
            let alias_name = child_name
                .strip_prefix(&parent_name)
                .map(|suffix| format!("{}{suffix}", parent.name))
                .unwrap_or_else(|| child_name.clone());
            Deferred::known(urn::create_urn(
                &alias_name,
                &child_type,
                Some(&alias_urn),
                &parent.project,
                &parent.stack,
            ))
        }
        Err(_) => {
            tracing::debug!(%alias_urn, "ignoring unparsable parent alias");
            Deferred::unknown()
        }
    })
}
