// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Resources and the resolution of their identity.
//!
//! A resource's identity (parent, providers, protection, aliases and
//! transformations) is computed synchronously while it is constructed, before
//! its registration is handed to the engine. Children read these fields from
//! their parent without waiting on it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::alias::{inherited_child_alias, AliasDefaults};
use crate::convert::{Converter, Value};
use crate::deferred::{Deferred, OutputData, ResourceSet};
use crate::descriptor::TypeDescriptor;
use crate::input::Input;
use crate::options::ResourceOptions;
use crate::urn::{self, Urn};
use crate::wire::{WireStruct, UNKNOWN_SENTINEL};

#[cfg(test)]
#[path = "./resource_test.rs"]
mod resource_test;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// What kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Managed by a provider, has an id.
    Custom,
    /// Groups other resources, has no id.
    Component,
    /// A provider instance; a custom resource of its own.
    Provider,
    /// A reference to a resource whose type is not known locally.
    Dependency,
}

impl ResourceKind {
    pub fn has_id(&self) -> bool {
        !matches!(self, Self::Component)
    }

    /// Whether a resource of this kind can stand in for `target`.
    ///
    /// Dependency placeholders are assignable to everything: their real
    /// type is simply not available in this process.
    pub fn is_assignable_to(&self, target: ResourceKind) -> bool {
        *self == target
            || matches!(
                (self, target),
                (Self::Provider, Self::Custom) | (Self::Dependency, _)
            )
    }
}

/// Arguments a transformation sees.
#[derive(Debug, Clone)]
pub struct TransformationArgs {
    pub type_: String,
    pub name: String,
    pub custom: bool,
    pub props: IndexMap<String, Input>,
    pub options: ResourceOptions,
}

/// Replacement properties and options returned by a transformation.
#[derive(Debug, Clone)]
pub struct TransformationResult {
    pub props: IndexMap<String, Input>,
    pub options: ResourceOptions,
}

type TransformationFn =
    dyn Fn(&TransformationArgs) -> Option<TransformationResult> + Send + Sync;

/// A hook that may rewrite a resource's properties and options before it is
/// registered. Returning `None` leaves the resource unchanged.
#[derive(Clone)]
pub struct Transformation(Arc<TransformationFn>);

impl Transformation {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TransformationArgs) -> Option<TransformationResult> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, args: &TransformationArgs) -> Option<TransformationResult> {
        (self.0)(args)
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformation")
    }
}

struct ResourceState {
    serial: u64,
    kind: ResourceKind,
    type_: String,
    name: String,
    urn: Deferred<String>,
    id: Option<Deferred<String>>,
    outputs: Deferred<WireStruct>,
    parent: Option<Resource>,
    children: DashMap<u64, Weak<ResourceState>>,
    providers: IndexMap<String, Resource>,
    provider: Option<Resource>,
    aliases: Vec<Deferred<String>>,
    transformations: Vec<Transformation>,
    protect: bool,
    package_version: Option<String>,
}

/// Shared handle to a resource.
///
/// Handles compare equal when they refer to the same resource instance.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceState>,
}

impl Resource {
    /// A reference to a resource known only by its URN.
    pub fn dependency(urn: impl Into<String>, id: Option<String>) -> Self {
        Self::from_state(ResourceState {
            kind: ResourceKind::Dependency,
            type_: String::new(),
            name: String::new(),
            urn: Deferred::known(urn.into()),
            id: Some(deferred_id(id)),
            ..ResourceState::detached()
        })
    }

    /// A resource of a locally registered type, rebuilt from a reference.
    pub fn rehydrated(
        kind: ResourceKind,
        urn: &Urn,
        id: Option<String>,
        package_version: Option<String>,
    ) -> Self {
        Self::from_state(ResourceState {
            kind,
            type_: urn.type_token().to_string(),
            name: urn.name.clone(),
            urn: Deferred::known(urn.to_string()),
            id: kind.has_id().then(|| deferred_id(id)),
            package_version,
            ..ResourceState::detached()
        })
    }

    pub(crate) fn from_identity(
        identity: ResolvedIdentity,
        urn: Deferred<String>,
        id: Option<Deferred<String>>,
        outputs: Deferred<WireStruct>,
    ) -> Self {
        let resource = Self::from_state(ResourceState {
            serial: 0,
            kind: identity.kind,
            type_: identity.type_,
            name: identity.name,
            urn,
            id,
            outputs,
            parent: identity.parent,
            children: DashMap::new(),
            providers: identity.providers,
            provider: identity.provider,
            aliases: identity.aliases,
            transformations: identity.transformations,
            protect: identity.protect,
            package_version: identity.package_version,
        });
        if let Some(parent) = resource.parent() {
            parent.add_child(&resource);
        }
        resource
    }

    fn from_state(mut state: ResourceState) -> Self {
        state.serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::new(state),
        }
    }

    /// Process-unique number of this resource instance.
    pub fn serial(&self) -> u64 {
        self.inner.serial
    }

    pub fn kind(&self) -> ResourceKind {
        self.inner.kind
    }

    pub fn type_(&self) -> &str {
        &self.inner.type_
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn urn(&self) -> &Deferred<String> {
        &self.inner.urn
    }

    /// The provider-assigned id; `None` for components.
    pub fn id(&self) -> Option<&Deferred<String>> {
        self.inner.id.as_ref()
    }

    /// Output properties returned by the engine.
    pub fn outputs(&self) -> &Deferred<WireStruct> {
        &self.inner.outputs
    }

    pub fn parent(&self) -> Option<&Resource> {
        self.inner.parent.as_ref()
    }

    /// Children registered under this resource so far.
    pub fn children(&self) -> Vec<Resource> {
        let mut children: Vec<_> = self
            .inner
            .children
            .iter()
            .filter_map(|entry| {
                entry.value().upgrade().map(|inner| Resource { inner })
            })
            .collect();
        children.sort_by_key(Resource::serial);
        children
    }

    /// Providers handed down to children, keyed by package.
    pub fn providers(&self) -> &IndexMap<String, Resource> {
        &self.inner.providers
    }

    /// The provider this resource is managed by.
    pub fn provider(&self) -> Option<&Resource> {
        self.inner.provider.as_ref()
    }

    /// The provider a child of the given type would inherit.
    pub fn provider_for(&self, type_: &str) -> Option<Resource> {
        self.inner.providers.get(urn::package_of(type_)).cloned()
    }

    pub fn aliases(&self) -> &[Deferred<String>] {
        &self.inner.aliases
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.inner.transformations
    }

    pub fn protect(&self) -> bool {
        self.inner.protect
    }

    pub fn package_version(&self) -> Option<&str> {
        self.inner.package_version.as_deref()
    }

    fn add_child(&self, child: &Resource) {
        self.inner
            .children
            .insert(child.serial(), Arc::downgrade(&child.inner));
    }

    /// The `<urn>::<id>` string the engine uses to refer to a provider.
    pub async fn provider_reference(&self) -> String {
        let urn = self.urn().value().await.unwrap_or_default();
        let id = match self.id() {
            Some(id) => id.data().await,
            None => OutputData::unknown(),
        };
        let id = match id.value {
            Some(id) if id.is_empty() => UNKNOWN_SENTINEL.to_string(),
            Some(id) => id,
            None => UNKNOWN_SENTINEL.to_string(),
        };
        format!("{urn}::{id}")
    }

    /// Read one output property as a typed value.
    pub async fn output(
        &self,
        name: &str,
        descriptor: &TypeDescriptor,
        converter: &Converter,
    ) -> crate::Result<OutputData<Value>> {
        let outputs = self.outputs().data().await;
        let object = match outputs.value {
            Some(object) if outputs.known => object,
            _ => {
                return Ok(OutputData::new(
                    None,
                    false,
                    outputs.secret,
                    ResourceSet::single(self),
                ));
            }
        };
        let wire = object.get(name).cloned().unwrap_or_default();
        let context = format!("{}({name})", self.type_());
        let mut data = converter.convert(&context, &wire, descriptor)?.data;
        data.secret |= outputs.secret;
        data.resources.insert(self);
        Ok(data)
    }
}

impl ResourceState {
    fn detached() -> Self {
        Self {
            serial: 0,
            kind: ResourceKind::Dependency,
            type_: String::new(),
            name: String::new(),
            urn: Deferred::unknown(),
            id: None,
            outputs: Deferred::known(WireStruct::new()),
            parent: None,
            children: DashMap::new(),
            providers: IndexMap::new(),
            provider: None,
            aliases: Vec::new(),
            transformations: Vec::new(),
            protect: false,
            package_version: None,
        }
    }
}

fn deferred_id(id: Option<String>) -> Deferred<String> {
    match id {
        Some(id) if !id.is_empty() && id != UNKNOWN_SENTINEL => Deferred::known(id),
        _ => Deferred::unknown(),
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.serial() == other.serial()
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial().hash(state);
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.type_().is_empty() {
            write!(f, "Resource(#{} {:?})", self.serial(), self.kind())
        } else {
            write!(f, "Resource({}::{})", self.type_(), self.name())
        }
    }
}

/// The settled identity of a resource that is about to be registered.
#[derive(Debug)]
pub(crate) struct ResolvedIdentity {
    pub kind: ResourceKind,
    pub type_: String,
    pub name: String,
    pub props: IndexMap<String, Input>,
    pub options: ResourceOptions,
    pub parent: Option<Resource>,
    pub transformations: Vec<Transformation>,
    pub providers: IndexMap<String, Resource>,
    pub provider: Option<Resource>,
    pub protect: bool,
    pub aliases: Vec<Deferred<String>>,
    pub package_version: Option<String>,
}

/// What the user asked for when declaring a resource.
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    pub kind: ResourceKind,
    pub type_: String,
    pub name: String,
    pub props: IndexMap<String, Input>,
    pub options: ResourceOptions,
}

/// Project and stack a resource is declared in, plus the tree root.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentityScope<'a> {
    pub project: &'a str,
    pub stack: &'a str,
    pub root: Option<&'a Resource>,
}

/// Resolve the full identity of a resource before it is registered.
///
/// Runs the transformations, merges inherited options, resolves providers
/// and collapses aliases. Any conflict is reported here, before anything is
/// sent to the engine.
pub(crate) fn resolve_identity(
    scope: IdentityScope<'_>,
    declaration: ResourceDeclaration,
) -> crate::Result<ResolvedIdentity> {
    let ResourceDeclaration {
        kind,
        type_,
        name,
        mut props,
        mut options,
    } = declaration;

    if type_.is_empty() || name.is_empty() {
        return Err(crate::Error::unsupported(
            format!("{type_}::{name}"),
            "resources need both a type and a name",
        ));
    }
    match (kind, &options) {
        (ResourceKind::Custom | ResourceKind::Provider, ResourceOptions::Custom(_))
        | (ResourceKind::Component, ResourceOptions::Component(_)) => {}
        _ => {
            return Err(crate::Error::unsupported(
                format!("{type_}::{name}"),
                format!("{kind:?} resources cannot take these options"),
            ));
        }
    }
    options.validate()?;

    let parent = options.common().parent.clone().or_else(|| scope.root.cloned());

    // own transformations first, then every ancestor's
    let mut transformations = options.common().transformations.clone();
    if let Some(parent) = &parent {
        transformations.extend(parent.transformations().iter().cloned());
    }
    for transformation in &transformations {
        let args = TransformationArgs {
            type_: type_.clone(),
            name: name.clone(),
            custom: kind.has_id(),
            props: props.clone(),
            options: options.clone(),
        };
        let Some(result) = transformation.apply(&args) else {
            continue;
        };
        // an absent parent means the root stack
        let new_parent = result.options.common().parent.clone().or_else(|| scope.root.cloned());
        if !same_resource(new_parent.as_ref(), parent.as_ref()) {
            return Err(crate::Error::TransformationParentChanged {
                type_: type_.clone(),
                name: name.clone(),
            });
        }
        if result.options.is_custom() != options.is_custom() {
            return Err(crate::Error::unsupported(
                format!("{type_}::{name}"),
                "transformations cannot change the kind of a resource",
            ));
        }
        props = result.props;
        options = result.options;
    }
    options.validate()?;
    tracing::debug!(%type_, %name, transformations = transformations.len(), "transformations applied");

    let common = options.common();
    let protect = common
        .protect
        .unwrap_or_else(|| parent.as_ref().is_some_and(Resource::protect));

    let mut providers = parent
        .as_ref()
        .map(|p| p.providers().clone())
        .unwrap_or_default();
    let provider = match (&options, kind) {
        (ResourceOptions::Custom(opts), ResourceKind::Custom) => match &opts.common.provider {
            Some(explicit) => {
                providers.insert(
                    urn::package_of(explicit.type_()).to_string(),
                    explicit.clone(),
                );
                Some(explicit.clone())
            }
            None => parent.as_ref().and_then(|p| p.provider_for(&type_)),
        },
        (ResourceOptions::Component(opts), _) => {
            for p in opts.common.provider.iter().chain(&opts.providers) {
                providers.insert(urn::package_of(p.type_()).to_string(), p.clone());
            }
            None
        }
        _ => None,
    };
    tracing::debug!(%type_, %name, protect, providers = providers.len(), "options merged");

    let defaults = AliasDefaults {
        name: &name,
        type_: &type_,
        project: scope.project,
        stack: scope.stack,
        parent: parent.as_ref(),
    };
    let mut aliases: Vec<_> = common.aliases.iter().map(|a| a.collapse(defaults)).collect();
    if let Some(parent) = &parent {
        aliases.extend(
            parent
                .aliases()
                .iter()
                .map(|alias| inherited_child_alias(&name, parent.name(), alias, &type_)),
        );
    }
    let package_version = common.version.clone();

    Ok(ResolvedIdentity {
        kind,
        type_,
        name,
        props,
        parent,
        transformations,
        providers,
        provider,
        protect,
        aliases,
        package_version,
        options,
    })
}

fn same_resource(a: Option<&Resource>, b: Option<&Resource>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
