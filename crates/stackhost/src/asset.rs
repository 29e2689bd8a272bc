// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Assets and archives: blobs of content the engine uploads on our behalf.

use indexmap::IndexMap;

use crate::wire::{Signature, WireStruct, WireValue};

/// A single blob of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    /// A file on the local filesystem.
    File(String),
    /// Inline text content.
    String(String),
    /// A remote location the engine fetches (`file://`, `http(s)://`).
    Remote(String),
}

/// A collection of assets and nested archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Archive {
    /// An archive file on disk (tar, tgz, zip, jar).
    File(String),
    /// A remote archive.
    Remote(String),
    /// Named entries, each an asset or another archive.
    Assets(IndexMap<String, AssetOrArchive>),
}

/// Entry of an [`Archive::Assets`] map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOrArchive {
    Asset(Asset),
    Archive(Archive),
}

impl Asset {
    pub fn to_wire(&self) -> WireValue {
        let mut fields = WireValue::signature_struct(Signature::Asset);
        let (key, value) = match self {
            Self::File(path) => ("path", path),
            Self::String(text) => ("text", text),
            Self::Remote(uri) => ("uri", uri),
        };
        fields.insert(key.to_string(), WireValue::String(value.clone()));
        WireValue::Struct(fields)
    }

    /// Read an asset from a struct already known to carry the asset signature.
    pub fn from_wire(context: &str, fields: &WireStruct) -> crate::Result<Self> {
        match single_location(context, "asset", fields, &["path", "text", "uri"])? {
            ("path", v) => Ok(Self::File(v)),
            ("text", v) => Ok(Self::String(v)),
            (_, v) => Ok(Self::Remote(v)),
        }
    }
}

impl Archive {
    pub fn to_wire(&self) -> WireValue {
        let mut fields = WireValue::signature_struct(Signature::Archive);
        match self {
            Self::File(path) => {
                fields.insert("path".to_string(), WireValue::String(path.clone()));
            }
            Self::Remote(uri) => {
                fields.insert("uri".to_string(), WireValue::String(uri.clone()));
            }
            Self::Assets(assets) => {
                let nested = assets
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.to_wire()))
                    .collect();
                fields.insert("assets".to_string(), WireValue::Struct(nested));
            }
        }
        WireValue::Struct(fields)
    }

    /// Read an archive from a struct already known to carry the archive signature.
    pub fn from_wire(context: &str, fields: &WireStruct) -> crate::Result<Self> {
        if let Some(assets) = fields.get("assets") {
            let WireValue::Struct(entries) = assets else {
                return Err(crate::Error::malformed(
                    context,
                    format!("archive assets must be a struct, got {}", assets.kind()),
                ));
            };
            let mut decoded = IndexMap::new();
            for (name, entry) in entries {
                let entry_context = format!("{context}[{name}]");
                decoded.insert(name.clone(), AssetOrArchive::from_wire(&entry_context, entry)?);
            }
            return Ok(Self::Assets(decoded));
        }
        match single_location(context, "archive", fields, &["path", "uri"])? {
            ("path", v) => Ok(Self::File(v)),
            (_, v) => Ok(Self::Remote(v)),
        }
    }
}

impl AssetOrArchive {
    pub fn to_wire(&self) -> WireValue {
        match self {
            Self::Asset(asset) => asset.to_wire(),
            Self::Archive(archive) => archive.to_wire(),
        }
    }

    pub fn from_wire(context: &str, value: &WireValue) -> crate::Result<Self> {
        let sig = value
            .signature()
            .map_err(|message| crate::Error::malformed(context, message))?;
        match (sig, value) {
            (Some(Signature::Asset), WireValue::Struct(fields)) => {
                Asset::from_wire(context, fields).map(Self::Asset)
            }
            (Some(Signature::Archive), WireValue::Struct(fields)) => {
                Archive::from_wire(context, fields).map(Self::Archive)
            }
            _ => Err(crate::Error::malformed(
                context,
                "archive entries must be assets or archives",
            )),
        }
    }
}

/// Find the one location field of an asset or archive struct.
fn single_location(
    context: &str,
    what: &str,
    fields: &WireStruct,
    keys: &[&'static str],
) -> crate::Result<(&'static str, String)> {
    let mut found = None;
    for key in keys {
        let Some(value) = fields.get(*key) else {
            continue;
        };
        let WireValue::String(s) = value else {
            return Err(crate::Error::malformed(
                context,
                format!("{what} field '{key}' must be a string, got {}", value.kind()),
            ));
        };
        if found.is_some() {
            return Err(crate::Error::malformed(
                context,
                format!("{what} must have exactly one of: {}", keys.join(", ")),
            ));
        }
        found = Some((*key, s.clone()));
    }
    found.ok_or_else(|| {
        crate::Error::malformed(
            context,
            format!("{what} is missing one of: {}", keys.join(", ")),
        )
    })
}
