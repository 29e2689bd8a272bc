// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Turning in-memory [`Input`] values into wire values.

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::deferred::ResourceSet;
use crate::input::Input;
use crate::resource::Resource;
use crate::wire::{Signature, WireStruct, WireValue};

#[cfg(test)]
#[path = "./serializer_test.rs"]
mod serializer_test;

/// A serialized property bag and what each property depends on.
#[derive(Debug, Default)]
pub struct SerializedProperties {
    pub object: WireStruct,
    pub property_dependencies: IndexMap<String, ResourceSet>,
}

/// Serializes values, collecting every resource they depend on.
#[derive(Debug, Default)]
pub struct Serializer {
    keep_resources: bool,
    dependent_resources: ResourceSet,
}

impl Serializer {
    /// With `keep_resources`, resources are written as references instead of
    /// being reduced to their id or URN.
    pub fn new(keep_resources: bool) -> Self {
        Self {
            keep_resources,
            dependent_resources: ResourceSet::new(),
        }
    }

    pub fn dependent_resources(&self) -> &ResourceSet {
        &self.dependent_resources
    }

    pub fn into_dependent_resources(self) -> ResourceSet {
        self.dependent_resources
    }

    /// Serialize one value. `context` names the value in errors.
    pub fn serialize<'a>(
        &'a mut self,
        context: &'a str,
        input: &'a Input,
    ) -> BoxFuture<'a, crate::Result<WireValue>> {
        async move {
            tracing::trace!(%context, kind = input.kind(), "serialize");
            let wire = match input {
                Input::Null => WireValue::Null,
                Input::Bool(b) => WireValue::Bool(*b),
                Input::Int(i) => WireValue::Number(*i as f64),
                Input::Double(d) => WireValue::Number(*d),
                Input::String(s) => WireValue::String(s.clone()),
                Input::Deferred(deferred) => {
                    let data = deferred.data().await;
                    self.dependent_resources.extend(&data.resources);
                    let value = match data.value {
                        Some(value) if data.known => value,
                        _ => return Ok(WireValue::unknown()),
                    };
                    let inner = self.serialize(context, &value).await?;
                    if data.secret {
                        WireValue::secret(inner)
                    } else {
                        inner
                    }
                }
                Input::List(items) => {
                    let mut list = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        let context = format!("{context}[{index}]");
                        list.push(self.serialize(&context, item).await?);
                    }
                    WireValue::List(list)
                }
                Input::Map(entries) => {
                    let mut fields = WireStruct::new();
                    for (key, value) in entries {
                        let Input::String(key) = key else {
                            return Err(crate::Error::unsupported(
                                context,
                                format!("map keys must be strings, found {}", key.kind()),
                            ));
                        };
                        let context = format!("{context}.{key}");
                        let wire = self.serialize(&context, value).await?;
                        fields.insert(key.clone(), wire);
                    }
                    WireValue::Struct(fields)
                }
                Input::Enum(value) => {
                    let projection = value.to_wire();
                    if !matches!(
                        projection,
                        Input::Int(_) | Input::Double(_) | Input::String(_)
                    ) {
                        return Err(crate::Error::unsupported(
                            context,
                            format!(
                                "enum {} must project to a number or a string, not {}",
                                value.type_name(),
                                projection.kind()
                            ),
                        ));
                    }
                    self.serialize(context, &projection).await?
                }
                Input::Resource(resource) => self.serialize_resource(resource).await,
                Input::Asset(asset) => asset.to_wire(),
                Input::Archive(archive) => archive.to_wire(),
                Input::Future(_) => {
                    return Err(crate::Error::unsupported(
                        context,
                        "bare futures cannot be serialized, wrap them in a Deferred",
                    ));
                }
            };
            Ok(wire)
        }
        .boxed()
    }

    async fn serialize_resource(&mut self, resource: &Resource) -> WireValue {
        self.dependent_resources.insert(resource);
        let urn = deferred_string(resource.urn().data().await);
        let id = match resource.id() {
            Some(id) => Some(deferred_string(id.data().await)),
            None => None,
        };
        if !self.keep_resources {
            return id.unwrap_or(urn);
        }
        let mut fields = WireValue::signature_struct(Signature::ResourceReference);
        fields.insert("urn".to_string(), urn);
        if let Some(id) = id {
            fields.insert("id".to_string(), id);
        }
        if let Some(version) = resource.package_version() {
            fields.insert(
                "packageVersion".to_string(),
                WireValue::String(version.to_string()),
            );
        }
        WireValue::Struct(fields)
    }

    /// Serialize a resource's property bag.
    ///
    /// Properties that serialize to null are left out. Each remaining
    /// property records the resources it depends on.
    pub async fn serialize_properties(
        &mut self,
        context: &str,
        props: &IndexMap<String, Input>,
    ) -> crate::Result<SerializedProperties> {
        let mut serialized = SerializedProperties::default();
        for (name, value) in props {
            let mut nested = Serializer::new(self.keep_resources);
            let context = format!("{context}.{name}");
            let wire = nested.serialize(&context, value).await?;
            if wire.is_null() {
                tracing::trace!(%context, "dropping null property");
                continue;
            }
            let dependencies = nested.into_dependent_resources();
            self.dependent_resources.extend(&dependencies);
            serialized.object.insert(name.clone(), wire);
            serialized
                .property_dependencies
                .insert(name.clone(), dependencies);
        }
        Ok(serialized)
    }
}

fn deferred_string(data: crate::deferred::OutputData<String>) -> WireValue {
    match data.value {
        Some(value) if data.known => WireValue::String(value),
        _ => WireValue::unknown(),
    }
}
