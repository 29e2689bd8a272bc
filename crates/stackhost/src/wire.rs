// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! The canonical value form exchanged with the engine.
//!
//! A [`WireValue`] mirrors the protobuf `google.protobuf.Value` shape used by
//! the engine protocol. Structs that carry [`SIGNATURE_KEY`] are special
//! encodings for secrets, resource references, assets and archives.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./wire_test.rs"]
mod wire_test;

/// Reserved struct key that marks a special encoding.
pub const SIGNATURE_KEY: &str = "4dabf18193072939515e22adb298388d";

/// Signature of a secret wrapper: `{sig, value}`.
pub const SECRET_SIG: &str = "1b47061264138c4ac30d75fd1eb44270";

/// Signature of a resource reference: `{sig, urn, id?, packageVersion?}`.
pub const RESOURCE_REFERENCE_SIG: &str = "5cf8f73096256a8f31e491e813e4eb8e";

/// Signature of an asset: `{sig, path|text|uri}`.
pub const ASSET_SIG: &str = "c44067f5952c0a294b673a41bacd8c17";

/// Signature of an archive: `{sig, path|uri|assets}`.
pub const ARCHIVE_SIG: &str = "0def7320c3a5731c473e5ecbe6d01bc7";

/// Stand-in for values that are not available yet (during preview).
pub const UNKNOWN_SENTINEL: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Struct keys with this prefix are engine bookkeeping.
pub const INTERNAL_PROPERTY_PREFIX: &str = "__";

/// Ordered struct payload. Equality ignores order, serialization keeps it.
pub type WireStruct = IndexMap<String, WireValue>;

/// Tagged union of everything that can travel over the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<WireValue>),
    Struct(WireStruct),
}

/// The special encodings selected by [`SIGNATURE_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Secret,
    ResourceReference,
    Asset,
    Archive,
}

impl Signature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => SECRET_SIG,
            Self::ResourceReference => RESOURCE_REFERENCE_SIG,
            Self::Asset => ASSET_SIG,
            Self::Archive => ARCHIVE_SIG,
        }
    }

    fn from_sig(sig: &str) -> Option<Self> {
        match sig {
            SECRET_SIG => Some(Self::Secret),
            RESOURCE_REFERENCE_SIG => Some(Self::ResourceReference),
            ASSET_SIG => Some(Self::Asset),
            ARCHIVE_SIG => Some(Self::Archive),
            _ => None,
        }
    }
}

impl WireValue {
    /// The unknown sentinel as a wire string.
    pub fn unknown() -> Self {
        Self::String(UNKNOWN_SENTINEL.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::String(s) if s == UNKNOWN_SENTINEL)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Start a signature struct of the given kind.
    pub fn signature_struct(sig: Signature) -> WireStruct {
        let mut fields = WireStruct::new();
        fields.insert(
            SIGNATURE_KEY.to_string(),
            WireValue::String(sig.as_str().to_string()),
        );
        fields
    }

    /// Wrap a value in a secret signature struct.
    pub fn secret(inner: WireValue) -> Self {
        let mut fields = Self::signature_struct(Signature::Secret);
        fields.insert("value".to_string(), inner);
        Self::Struct(fields)
    }

    /// Read the signature of a struct value.
    ///
    /// Returns `Ok(None)` for ordinary values and an error message when the
    /// signature key is present but does not name a known encoding.
    pub fn signature(&self) -> std::result::Result<Option<Signature>, String> {
        let Self::Struct(fields) = self else {
            return Ok(None);
        };
        match fields.get(SIGNATURE_KEY) {
            None => Ok(None),
            Some(Self::String(sig)) => Signature::from_sig(sig)
                .map(Some)
                .ok_or_else(|| format!("unrecognized signature '{sig}'")),
            Some(other) => Err(format!("signature must be a string, got {}", other.kind())),
        }
    }

    /// Short name of the wire kind, used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&WireStruct> {
        match self {
            Self::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Render as JSON, keeping struct field order.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the JSON rendering of a wire value.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for WireValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(value: Vec<WireValue>) -> Self {
        Self::List(value)
    }
}

impl From<WireStruct> for WireValue {
    fn from(value: WireStruct) -> Self {
        Self::Struct(value)
    }
}

/// Build a [`WireStruct`] from `(key, value)` pairs.
pub fn wire_struct<K, V, I>(fields: I) -> WireStruct
where
    K: Into<String>,
    V: Into<WireValue>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
