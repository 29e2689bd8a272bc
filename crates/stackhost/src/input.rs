// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! In-memory values accepted by the serializer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use indexmap::IndexMap;

use crate::asset::{Archive, Asset};
use crate::deferred::{Deferred, Payload};
use crate::resource::Resource;

/// An enum-like value with a single projection onto the wire.
///
/// The projection must be an [`Input::Int`], [`Input::Double`] or
/// [`Input::String`]; anything else is rejected by the serializer.
pub trait WireEnum: fmt::Debug + Send + Sync {
    /// Name of the enum type, used in messages.
    fn type_name(&self) -> &str;

    fn to_wire(&self) -> Input;
}

/// Any value that can be handed to the serializer.
#[derive(Clone)]
pub enum Input {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Deferred(Deferred<Input>),
    List(Vec<Input>),
    /// Key/value pairs. Only string keys are serializable.
    Map(Vec<(Input, Input)>),
    Enum(Arc<dyn WireEnum>),
    Resource(Resource),
    Asset(Asset),
    Archive(Archive),
    /// A bare future. Always rejected: wrap it in a [`Deferred`] instead.
    Future(Shared<BoxFuture<'static, Input>>),
}

impl Input {
    /// Build a string-keyed map.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Input)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Input::String(k.into()), v))
                .collect(),
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Deferred(_) => "deferred",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Enum(_) => "enum",
            Self::Resource(_) => "resource",
            Self::Asset(_) => "asset",
            Self::Archive(_) => "archive",
            Self::Future(_) => "future",
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::Deferred(v) => v.fmt(f),
            Self::List(v) => f.debug_list().entries(v).finish(),
            Self::Map(v) => f
                .debug_map()
                .entries(v.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::Enum(v) => v.fmt(f),
            Self::Resource(v) => v.fmt(f),
            Self::Asset(v) => v.fmt(f),
            Self::Archive(v) => v.fmt(f),
            Self::Future(_) => f.write_str("Future(..)"),
        }
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Input {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<i64> for Input {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Input {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<Input>> From<Vec<T>> for Input {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Input>> From<IndexMap<String, T>> for Input {
    fn from(value: IndexMap<String, T>) -> Self {
        Self::object(value.into_iter().map(|(k, v)| (k, v.into())))
    }
}

impl<T: Into<Input>> From<BTreeMap<String, T>> for Input {
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::object(value.into_iter().map(|(k, v)| (k, v.into())))
    }
}

impl<T: Into<Input> + Payload> From<Deferred<T>> for Input {
    fn from(value: Deferred<T>) -> Self {
        Self::Deferred(value.map(Into::into))
    }
}

impl From<Resource> for Input {
    fn from(value: Resource) -> Self {
        Self::Resource(value)
    }
}

impl From<Asset> for Input {
    fn from(value: Asset) -> Self {
        Self::Asset(value)
    }
}

impl From<Archive> for Input {
    fn from(value: Archive) -> Self {
        Self::Archive(value)
    }
}
