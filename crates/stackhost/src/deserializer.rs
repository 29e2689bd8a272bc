// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Turning wire values back into loosely typed [`Decoded`] values.
//!
//! Secret wrappers are peeled off first, then the unknown sentinel is
//! recognized, then signature structs become assets, archives and resources.
//! Everything else decodes by its wire kind.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::asset::{Archive, Asset};
use crate::deferred::{OutputData, ResourceSet};
use crate::registry::{TypeRegistry, Version};
use crate::resource::Resource;
use crate::urn::Urn;
use crate::wire::{Signature, WireStruct, WireValue, INTERNAL_PROPERTY_PREFIX};

#[cfg(test)]
#[path = "./deserializer_test.rs"]
mod deserializer_test;

/// A decoded wire value. `None` entries are nested values that are unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Option<Decoded>>),
    Map(IndexMap<String, Option<Decoded>>),
    Resource(Resource),
    Asset(Asset),
    Archive(Archive),
}

impl Decoded {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Resource(_) => "resource",
            Self::Asset(_) => "asset",
            Self::Archive(_) => "archive",
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn entry(f: &mut fmt::Formatter<'_>, value: &Option<Decoded>) -> fmt::Result {
            match value {
                Some(value) => write!(f, "{value}"),
                None => f.write_str("<unknown>"),
            }
        }
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&crate::descriptor::format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    entry(f, item)?;
                }
                f.write_str("]")
            }
            Self::Map(fields) => {
                f.write_str("{")?;
                for (index, (key, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: ")?;
                    entry(f, value)?;
                }
                f.write_str("}")
            }
            Self::Resource(resource) => write!(f, "{resource:?}"),
            Self::Asset(asset) => write!(f, "{asset:?}"),
            Self::Archive(archive) => write!(f, "{archive:?}"),
        }
    }
}

/// A decoded value with its known, secret and dependency metadata.
pub type DecodedValue = OutputData<Decoded>;

/// Decodes wire values, rehydrating resource references through a registry.
#[derive(Debug, Clone)]
pub struct Deserializer {
    registry: Arc<TypeRegistry>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::empty()))
    }
}

impl Deserializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn deserialize(&self, wire: &WireValue) -> crate::Result<DecodedValue> {
        self.deserialize_at("value", wire)
    }

    /// Decode a value, naming it `context` in errors.
    pub fn deserialize_at(&self, context: &str, wire: &WireValue) -> crate::Result<DecodedValue> {
        let mut secret = false;
        let mut current = wire;
        loop {
            if current.is_unknown() {
                tracing::trace!(%context, secret, "unknown value");
                return Ok(OutputData::new(None, false, secret, ResourceSet::new()));
            }
            let signature = current
                .signature()
                .map_err(|message| crate::Error::malformed(context, message))?;
            let decoded = match (signature, current) {
                (Some(Signature::Secret), WireValue::Struct(fields)) => {
                    current = fields.get("value").ok_or_else(|| {
                        crate::Error::malformed(context, "secret is missing its value")
                    })?;
                    secret = true;
                    continue;
                }
                (Some(Signature::Asset), WireValue::Struct(fields)) => {
                    OutputData::known(Decoded::Asset(Asset::from_wire(context, fields)?))
                }
                (Some(Signature::Archive), WireValue::Struct(fields)) => {
                    OutputData::known(Decoded::Archive(Archive::from_wire(context, fields)?))
                }
                (Some(Signature::ResourceReference), WireValue::Struct(fields)) => {
                    let resource = self.resource_reference(context, fields)?;
                    let resources = ResourceSet::single(&resource);
                    OutputData::known(Decoded::Resource(resource)).with_resources(resources)
                }
                _ => self.decode_plain(context, current)?,
            };
            let secret = secret || decoded.secret;
            return Ok(decoded.with_secret(secret));
        }
    }

    fn decode_plain(&self, context: &str, wire: &WireValue) -> crate::Result<DecodedValue> {
        tracing::trace!(%context, kind = wire.kind(), "deserialize");
        let decoded = match wire {
            WireValue::Null => Decoded::Null,
            WireValue::Bool(b) => Decoded::Bool(*b),
            WireValue::Number(n) => Decoded::Number(*n),
            WireValue::String(s) => Decoded::String(s.clone()),
            WireValue::List(items) => {
                let mut summary = Summary::default();
                let mut list = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let child = self.deserialize_at(&format!("{context}[{index}]"), item)?;
                    list.push(summary.absorb(child));
                }
                return Ok(summary.finish(Decoded::List(list)));
            }
            WireValue::Struct(fields) => {
                let mut summary = Summary::default();
                let mut map = IndexMap::with_capacity(fields.len());
                for (key, value) in fields {
                    if key.starts_with(INTERNAL_PROPERTY_PREFIX) {
                        continue;
                    }
                    let child = self.deserialize_at(&format!("{context}.{key}"), value)?;
                    map.insert(key.clone(), summary.absorb(child));
                }
                return Ok(summary.finish(Decoded::Map(map)));
            }
        };
        Ok(OutputData::known(decoded))
    }

    fn resource_reference(&self, context: &str, fields: &WireStruct) -> crate::Result<Resource> {
        let urn = match fields.get("urn") {
            Some(WireValue::String(urn)) => urn,
            Some(other) => {
                return Err(crate::Error::malformed(
                    context,
                    format!("resource reference urn must be a string, got {}", other.kind()),
                ));
            }
            None => {
                return Err(crate::Error::malformed(
                    context,
                    "resource reference is missing its urn",
                ));
            }
        };
        let parsed: Urn = urn
            .parse()
            .map_err(|_| crate::Error::malformed(context, format!("invalid urn '{urn}'")))?;
        let id = optional_string(context, fields, "id")?;
        let package_version = optional_string(context, fields, "packageVersion")?
            .filter(|version| !version.is_empty());
        let version = package_version
            .as_deref()
            .map(str::parse::<Version>)
            .transpose()
            .map_err(|err| crate::Error::malformed(context, err.to_string()))?;

        match self.registry.resolve(parsed.type_token(), version.as_ref()) {
            Some(registered) => Ok(Resource::rehydrated(
                registered.kind,
                &parsed,
                id,
                package_version,
            )),
            None => {
                tracing::debug!(%urn, "unregistered resource type, keeping a dependency");
                Ok(Resource::dependency(urn.clone(), id))
            }
        }
    }
}

fn optional_string(
    context: &str,
    fields: &WireStruct,
    key: &str,
) -> crate::Result<Option<String>> {
    match fields.get(key) {
        None => Ok(None),
        Some(WireValue::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(crate::Error::malformed(
            context,
            format!("resource reference {key} must be a string, got {}", other.kind()),
        )),
    }
}

/// Folds child metadata into the metadata of a list or map.
struct Summary {
    known: bool,
    secret: bool,
    resources: ResourceSet,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            known: true,
            secret: false,
            resources: ResourceSet::new(),
        }
    }
}

impl Summary {
    fn absorb(&mut self, child: DecodedValue) -> Option<Decoded> {
        self.known &= child.known;
        self.secret |= child.secret;
        self.resources.extend(&child.resources);
        child.value
    }

    fn finish(self, value: Decoded) -> DecodedValue {
        // partially known aggregates keep their known parts
        OutputData {
            value: Some(value),
            known: self.known,
            secret: self.secret,
            resources: self.resources,
        }
    }
}
