// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Registering resources with the engine.
//!
//! Declaring a resource resolves its identity synchronously, hands back a
//! [`Resource`] whose URN, id and outputs are still pending, and spawns a
//! task that serializes the registration and sends it to the [`Engine`].
//! The engine's answer completes the pending values.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::convert::{Converter, Value};
use crate::deferred::{Completer, Deferred, OutputData, ResourceSet};
use crate::descriptor::TypeDescriptor;
use crate::deserializer::Deserializer;
use crate::input::Input;
use crate::options::{
    ComponentResourceOptions,
    CustomResourceOptions,
    CustomTimeouts,
    ResourceOptions,
};
use crate::registry::TypeRegistry;
use crate::resource::{
    resolve_identity,
    IdentityScope,
    Resource,
    ResourceDeclaration,
    ResourceKind,
};
use crate::serializer::Serializer;
use crate::settings::RunSettings;
use crate::urn::{PROVIDER_TYPE_PREFIX, ROOT_STACK_TYPE};
use crate::wire::WireStruct;

#[cfg(test)]
#[path = "./deployment_test.rs"]
mod deployment_test;

/// Everything the engine needs to register one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterResourceRequest {
    pub type_: String,
    pub name: String,
    /// URN of the parent, absent only for the root stack.
    pub parent: Option<String>,
    pub custom: bool,
    pub object: WireStruct,
    /// URNs each property depends on.
    pub property_dependencies: IndexMap<String, Vec<String>>,
    /// URNs of every resource this one depends on.
    pub dependencies: Vec<String>,
    /// `<urn>::<id>` of the provider managing a custom resource.
    pub provider: Option<String>,
    /// Provider references by package, handed to remote components.
    pub providers: IndexMap<String, String>,
    pub protect: bool,
    pub aliases: Vec<String>,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
    pub import_id: Option<String>,
    pub ignore_changes: Vec<String>,
    pub replace_on_changes: Vec<String>,
    pub delete_before_replace: bool,
    pub additional_secret_outputs: Vec<String>,
    pub custom_timeouts: Option<CustomTimeouts>,
    pub retain_on_delete: Option<bool>,
    /// A component implemented by a provider rather than in this process.
    pub remote: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterResourceResponse {
    pub urn: String,
    /// Empty or absent during a preview when the id is not known yet.
    pub id: Option<String>,
    pub object: WireStruct,
}

/// Asks the engine for the state of an existing resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResourceRequest {
    pub type_: String,
    pub name: String,
    pub id: String,
    pub parent: Option<String>,
    pub properties: WireStruct,
    pub dependencies: Vec<String>,
    pub provider: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResourceResponse {
    pub urn: String,
    pub properties: WireStruct,
}

/// The orchestration engine on the other side of the wire.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> crate::Result<RegisterResourceResponse>;

    async fn read_resource(&self, request: ReadResourceRequest) -> crate::Result<ReadResourceResponse>;

    async fn register_resource_outputs(&self, urn: String, outputs: WireStruct) -> crate::Result<()>;
}

/// A program run: the root stack and every resource registered under it.
pub struct Deployment {
    settings: RunSettings,
    engine: Arc<dyn Engine>,
    converter: Converter,
    /// Bounds the engine calls in flight.
    limit: Arc<Semaphore>,
    root: OnceCell<Resource>,
    tasks: Mutex<JoinSet<crate::Result<()>>>,
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("project", &self.settings.project)
            .field("stack", &self.settings.stack)
            .field("dry_run", &self.settings.dry_run)
            .field("root", &self.root.get())
            .finish_non_exhaustive()
    }
}

/// The placeholders a registration task completes.
struct Completion {
    urn: Completer<String>,
    id: Option<Completer<String>>,
    outputs: Completer<WireStruct>,
}

impl Completion {
    fn fail(self) {
        self.urn.resolve_unknown();
        if let Some(id) = self.id {
            id.resolve_unknown();
        }
        self.outputs.resolve_unknown();
    }
}

impl Deployment {
    /// Start a run and register its root stack.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        settings: RunSettings,
        engine: Arc<dyn Engine>,
        registry: Arc<TypeRegistry>,
    ) -> crate::Result<Arc<Self>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(crate::Error::Registration(
                "deployments need a running Tokio runtime".to_string(),
            ));
        }
        let deployment = Arc::new(Self {
            converter: Converter::new(Deserializer::new(registry)),
            limit: Arc::new(Semaphore::new(settings.parallelism.max(1))),
            settings,
            engine,
            root: OnceCell::new(),
            tasks: Mutex::new(JoinSet::new()),
        });
        let name = format!("{}-{}", deployment.settings.project, deployment.settings.stack);
        let root = deployment.register(
            ResourceDeclaration {
                kind: ResourceKind::Component,
                type_: ROOT_STACK_TYPE.to_string(),
                name,
                props: IndexMap::new(),
                options: ComponentResourceOptions::default().into(),
            },
            false,
        )?;
        deployment
            .root
            .set(root)
            .map_err(|_| crate::Error::Registration("root stack registered twice".to_string()))?;
        Ok(deployment)
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// The synthetic stack resource every resource descends from.
    pub fn root(&self) -> Option<&Resource> {
        self.root.get()
    }

    pub fn register_custom(
        &self,
        type_: &str,
        name: &str,
        props: IndexMap<String, Input>,
        options: CustomResourceOptions,
    ) -> crate::Result<Resource> {
        self.register(
            ResourceDeclaration {
                kind: ResourceKind::Custom,
                type_: type_.to_string(),
                name: name.to_string(),
                props,
                options: options.into(),
            },
            false,
        )
    }

    /// Register a component. Remote components are constructed by a provider.
    pub fn register_component(
        &self,
        type_: &str,
        name: &str,
        props: IndexMap<String, Input>,
        options: ComponentResourceOptions,
        remote: bool,
    ) -> crate::Result<Resource> {
        self.register(
            ResourceDeclaration {
                kind: ResourceKind::Component,
                type_: type_.to_string(),
                name: name.to_string(),
                props,
                options: options.into(),
            },
            remote,
        )
    }

    /// Register a provider for `package`.
    pub fn register_provider(
        &self,
        package: &str,
        name: &str,
        props: IndexMap<String, Input>,
        options: CustomResourceOptions,
    ) -> crate::Result<Resource> {
        self.register(
            ResourceDeclaration {
                kind: ResourceKind::Provider,
                type_: format!("{PROVIDER_TYPE_PREFIX}{package}"),
                name: name.to_string(),
                props,
                options: options.into(),
            },
            false,
        )
    }

    /// Record the outputs of a component once they are known.
    pub fn register_outputs(&self, resource: &Resource, outputs: IndexMap<String, Input>) {
        let engine = Arc::clone(&self.engine);
        let resource = resource.clone();
        self.spawn(async move {
            let mut serializer = Serializer::new(true);
            let context = format!("{}({})", resource.type_(), resource.name());
            let serialized = serializer.serialize_properties(&context, &outputs).await?;
            let Some(urn) = resource.urn().value().await else {
                tracing::debug!(%context, "skipping outputs of a resource without a urn");
                return Ok(());
            };
            engine.register_resource_outputs(urn, serialized.object).await
        });
    }

    /// Record the outputs of the root stack.
    pub fn register_stack_outputs(&self, outputs: IndexMap<String, Input>) -> crate::Result<()> {
        let root = self.root().ok_or_else(|| {
            crate::Error::Registration("the root stack is not registered".to_string())
        })?;
        self.register_outputs(root, outputs);
        Ok(())
    }

    /// Read one output of a registered resource as a typed value.
    pub async fn output(
        &self,
        resource: &Resource,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> crate::Result<OutputData<Value>> {
        resource.output(name, descriptor, &self.converter).await
    }

    /// Wait for every registration, returning the first failure.
    pub async fn wait(&self) -> crate::Result<()> {
        let mut first_error = None;
        loop {
            // registrations may spawn while we wait, so drain in rounds
            let mut tasks = std::mem::take(
                &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                let result = joined.map_err(|err| {
                    crate::Error::Registration(format!("registration task failed: {err}"))
                });
                if let Err(err) = result.and_then(|r| r) {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        tracing::error!(%err, "registration failed");
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spawn(task);
    }

    fn register(&self, declaration: ResourceDeclaration, remote: bool) -> crate::Result<Resource> {
        let scope = IdentityScope {
            project: &self.settings.project,
            stack: &self.settings.stack,
            root: self.root.get(),
        };
        let mut identity = resolve_identity(scope, declaration)?;
        let props = std::mem::take(&mut identity.props);
        let options = identity.options.clone();
        let kind = identity.kind;

        let (urn_completer, urn) = Deferred::pending();
        let (id_completer, id) = match kind.has_id() {
            true => {
                let (completer, id) = Deferred::pending();
                (Some(completer), Some(id))
            }
            false => (None, None),
        };
        let (outputs_completer, outputs) = Deferred::pending();
        let resource = Resource::from_identity(identity, urn, id, outputs);
        tracing::debug!(type_ = resource.type_(), name = resource.name(), "registration dispatched");

        let completion = Completion {
            urn: urn_completer,
            id: id_completer,
            outputs: outputs_completer,
        };
        let task = Registration {
            engine: Arc::clone(&self.engine),
            limit: Arc::clone(&self.limit),
            dry_run: self.settings.dry_run,
            resource: resource.clone(),
            props,
            options,
            remote,
        };
        self.spawn(task.run(completion));
        Ok(resource)
    }
}

/// One registration on its way to the engine.
struct Registration {
    engine: Arc<dyn Engine>,
    limit: Arc<Semaphore>,
    dry_run: bool,
    resource: Resource,
    props: IndexMap<String, Input>,
    options: ResourceOptions,
    remote: bool,
}

impl Registration {
    async fn run(self, completion: Completion) -> crate::Result<()> {
        let type_ = self.resource.type_().to_string();
        let name = self.resource.name().to_string();
        let dry_run = self.dry_run;
        let result = match self.read_id().await {
            Some(id) => self.read(id).await,
            None => self.register().await,
        };
        match result {
            Ok(response) => {
                tracing::debug!(%type_, %name, urn = %response.urn, "registration complete");
                completion.urn.resolve(response.urn);
                if let Some(completer) = completion.id {
                    match response.id {
                        Some(id) if !id.is_empty() || !dry_run => completer.resolve(id),
                        _ => completer.resolve_unknown(),
                    }
                }
                completion.outputs.resolve(response.object);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%type_, %name, %err, "registration failed");
                completion.fail();
                Err(crate::Error::Registration(format!("{type_}::{name}: {err}")))
            }
        }
    }

    /// The id of an existing resource to read instead of registering.
    ///
    /// An id that is not known yet is sent as the empty string.
    async fn read_id(&self) -> Option<String> {
        let ResourceOptions::Custom(custom) = &self.options else {
            return None;
        };
        let id = custom.common.id.as_ref()?;
        Some(id.value().await.unwrap_or_default())
    }

    async fn register(&self) -> crate::Result<RegisterResourceResponse> {
        let request = self.request().await?;
        let _permit = self.acquire().await?;
        self.engine.register_resource(request).await
    }

    async fn read(&self, id: String) -> crate::Result<RegisterResourceResponse> {
        let request = self.request().await?;
        let _permit = self.acquire().await?;
        let response = self
            .engine
            .read_resource(ReadResourceRequest {
                type_: request.type_,
                name: request.name,
                id: id.clone(),
                parent: request.parent,
                properties: request.object,
                dependencies: request.dependencies,
                provider: request.provider,
                version: request.version,
            })
            .await?;
        Ok(RegisterResourceResponse {
            urn: response.urn,
            id: Some(id),
            object: response.properties,
        })
    }

    async fn acquire(&self) -> crate::Result<tokio::sync::SemaphorePermit<'_>> {
        self.limit
            .acquire()
            .await
            .map_err(|err| crate::Error::Registration(err.to_string()))
    }

    async fn request(&self) -> crate::Result<RegisterResourceRequest> {
        let resource = &self.resource;
        let common = self.options.common();
        let context = format!("{}({})", resource.type_(), resource.name());

        let mut serializer = Serializer::new(true);
        let serialized = serializer.serialize_properties(&context, &self.props).await?;

        let mut dependencies = serializer.into_dependent_resources();
        for dependency in &common.depends_on {
            dependencies.insert(dependency);
        }
        let mut property_dependencies = IndexMap::new();
        for (name, resources) in &serialized.property_dependencies {
            property_dependencies.insert(name.clone(), urns(resources).await);
        }

        let parent = match resource.parent() {
            Some(parent) => parent.urn().value().await,
            None => None,
        };
        let provider = match resource.provider() {
            Some(provider) => Some(provider.provider_reference().await),
            None => None,
        };
        let mut providers = IndexMap::new();
        if self.remote {
            for (package, provider) in resource.providers() {
                providers.insert(package.clone(), provider.provider_reference().await);
            }
        }
        // unknown aliases are skipped one by one
        let mut aliases = Vec::with_capacity(resource.aliases().len());
        for alias in resource.aliases() {
            let data = alias.data().await;
            match data.value {
                Some(urn) if data.known => aliases.push(urn),
                _ => tracing::debug!(%context, "skipping an alias that is not known"),
            }
        }
        let aliases = aliases.into_iter().unique().collect();

        let mut request = RegisterResourceRequest {
            type_: resource.type_().to_string(),
            name: resource.name().to_string(),
            parent,
            custom: resource.kind().has_id(),
            object: serialized.object,
            property_dependencies,
            dependencies: urns(&dependencies).await,
            provider,
            providers,
            protect: resource.protect(),
            aliases,
            version: common.version.clone(),
            plugin_download_url: common.plugin_download_url.clone(),
            ignore_changes: common.ignore_changes.clone(),
            replace_on_changes: common.replace_on_changes.clone(),
            custom_timeouts: common.custom_timeouts.clone(),
            retain_on_delete: common.retain_on_delete,
            remote: self.remote,
            ..Default::default()
        };
        if let ResourceOptions::Custom(custom) = &self.options {
            request.import_id = custom.import_id.clone();
            request.delete_before_replace = custom.delete_before_replace.unwrap_or(false);
            request.additional_secret_outputs = custom.additional_secret_outputs.clone();
        }
        Ok(request)
    }
}

/// Known URNs of a set of resources, in order.
async fn urns(resources: &ResourceSet) -> Vec<String> {
    let mut urns = Vec::with_capacity(resources.len());
    for resource in resources.iter() {
        if let Some(urn) = resource.urn().value().await {
            if !urns.contains(&urn) {
                urns.push(urn);
            }
        }
    }
    urns
}
