// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Deferred values: futures that carry known, secret and dependency metadata.
//!
//! A [`Deferred<T>`] resolves to an [`OutputData<T>`]. While a deployment is
//! being previewed, many values are not available yet; those resolve with
//! `known == false` and no value, and every combinator stops calling user code
//! as soon as it sees one. Secrecy only ever spreads: combining a secret with
//! anything yields a secret, unless [`Deferred::declassify`] is used.

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;

use crate::resource::Resource;

#[cfg(test)]
#[path = "./deferred_test.rs"]
mod deferred_test;

/// Bounds every deferred payload must satisfy.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

/// Set of resources a value depends on, in insertion order.
#[derive(Clone, Default)]
pub struct ResourceSet(IndexMap<u64, Resource>);

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(resource: &Resource) -> Self {
        let mut set = Self::new();
        set.insert(resource);
        set
    }

    pub fn insert(&mut self, resource: &Resource) {
        self.0
            .entry(resource.serial())
            .or_insert_with(|| resource.clone());
    }

    pub fn extend(&mut self, other: &ResourceSet) {
        for resource in other.iter() {
            self.insert(resource);
        }
    }

    pub fn union(mut self, other: &ResourceSet) -> Self {
        self.extend(other);
        self
    }

    pub fn contains(&self, resource: &Resource) -> bool {
        self.0.contains_key(&resource.serial())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.values()).finish()
    }
}

impl PartialEq for ResourceSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.keys().all(|k| other.0.contains_key(k))
    }
}

/// The settled state of a [`Deferred`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutputData<T> {
    /// The value; `None` whenever `known` is false, except for decoded
    /// lists and maps, which keep their known parts.
    pub value: Option<T>,
    pub known: bool,
    pub secret: bool,
    pub resources: ResourceSet,
}

impl<T> OutputData<T> {
    pub fn known(value: T) -> Self {
        Self {
            value: Some(value),
            known: true,
            secret: false,
            resources: ResourceSet::new(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: None,
            known: false,
            secret: false,
            resources: ResourceSet::new(),
        }
    }

    /// Build data from raw parts, dropping the value when it is not known.
    pub fn new(value: Option<T>, known: bool, secret: bool, resources: ResourceSet) -> Self {
        Self {
            value: if known { value } else { None },
            known,
            secret,
            resources,
        }
    }

    pub fn with_secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_resources(mut self, resources: ResourceSet) -> Self {
        self.resources = resources;
        self
    }

    /// Transform the value, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OutputData<U> {
        OutputData {
            value: self.value.map(f),
            known: self.known,
            secret: self.secret,
            resources: self.resources,
        }
    }
}

/// A value that may not be available yet.
pub struct Deferred<T> {
    inner: Shared<BoxFuture<'static, OutputData<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Payload> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peek() {
            Some(data) if !data.known => f.write_str("Deferred(<unknown>)"),
            Some(data) if data.secret => f.write_str("Deferred(<secret>)"),
            Some(_) => f.write_str("Deferred(<resolved>)"),
            None => f.write_str("Deferred(<pending>)"),
        }
    }
}

impl<T: Payload> Deferred<T> {
    /// Wrap a future that produces the settled data.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = OutputData<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    pub fn from_data(data: OutputData<T>) -> Self {
        Self::from_future(futures::future::ready(data))
    }

    /// A known, non-secret value.
    pub fn known(value: T) -> Self {
        Self::from_data(OutputData::known(value))
    }

    /// A known secret value.
    pub fn secret(value: T) -> Self {
        Self::from_data(OutputData::known(value).with_secret(true))
    }

    /// A value that will not be available during this run.
    pub fn unknown() -> Self {
        Self::from_data(OutputData::unknown())
    }

    /// A placeholder and the handle that completes it.
    ///
    /// If the handle is dropped without completing, the placeholder resolves
    /// as unknown.
    pub fn pending() -> (Completer<T>, Self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let deferred = Self::from_future(async move {
            match rx.await {
                Ok(data) => data,
                Err(_) => {
                    tracing::debug!("deferred value abandoned before completion");
                    OutputData::unknown()
                }
            }
        });
        (Completer { tx }, deferred)
    }

    /// Wait for the value to settle.
    pub async fn data(&self) -> OutputData<T> {
        self.inner.clone().await
    }

    /// Wait for the value, `None` if it is unknown.
    pub async fn value(&self) -> Option<T> {
        self.data().await.value
    }

    pub async fn is_known(&self) -> bool {
        self.data().await.known
    }

    pub async fn is_secret(&self) -> bool {
        self.data().await.secret
    }

    /// Transform the value once it is known.
    ///
    /// `f` is never invoked for unknown values.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Payload,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let source = self.clone();
        Deferred::from_future(async move {
            let data = source.data().await;
            if !data.known {
                return OutputData::new(None, false, data.secret, data.resources);
            }
            data.map(f)
        })
    }

    /// Chain a computation that produces another deferred value.
    ///
    /// Unknown inputs short-circuit without invoking `f`. Otherwise the result
    /// keeps the inner value's known bit, is secret if either side is, and
    /// depends on the resources of both.
    pub fn apply<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Payload,
        F: FnOnce(T) -> Deferred<U> + Send + 'static,
    {
        let source = self.clone();
        Deferred::from_future(async move {
            let outer = source.data().await;
            let value = match outer.value {
                Some(value) if outer.known => value,
                _ => return OutputData::new(None, false, outer.secret, outer.resources),
            };
            let inner = f(value).data().await;
            OutputData::new(
                inner.value,
                inner.known,
                inner.secret || outer.secret,
                outer.resources.union(&inner.resources),
            )
        })
    }

    /// Combine every input into one list, waiting for all of them to settle.
    pub fn all<I>(items: I) -> Deferred<Vec<T>>
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let items: Vec<_> = items.into_iter().collect();
        Deferred::from_future(async move {
            let settled = futures::future::join_all(items.iter().map(|item| item.data())).await;
            let mut known = true;
            let mut secret = false;
            let mut resources = ResourceSet::new();
            let mut values = Vec::with_capacity(settled.len());
            for data in settled {
                known &= data.known;
                secret |= data.secret;
                resources.extend(&data.resources);
                if let Some(value) = data.value {
                    values.push(value);
                }
            }
            OutputData::new(Some(values), known, secret, resources)
        })
    }

    /// Combine two values of different types.
    pub fn combine2<U: Payload>(&self, other: &Deferred<U>) -> Deferred<(T, U)> {
        let (left, right) = (self.clone(), other.clone());
        Deferred::from_future(async move {
            let (a, b) = futures::join!(left.data(), right.data());
            let known = a.known && b.known;
            let value = match (a.value, b.value) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            };
            OutputData::new(value, known, a.secret || b.secret, a.resources.union(&b.resources))
        })
    }

    /// Mark the value as secret.
    pub fn secretify(&self) -> Self {
        self.with_secret(true)
    }

    /// Remove the secret mark. The only way secrecy is ever dropped.
    pub fn declassify(&self) -> Self {
        self.with_secret(false)
    }

    fn with_secret(&self, secret: bool) -> Self {
        let source = self.clone();
        Self::from_future(async move { source.data().await.with_secret(secret) })
    }

    /// Record an extra resource dependency.
    pub fn with_dependency(&self, resource: &Resource) -> Self {
        self.with_dependencies(ResourceSet::single(resource))
    }

    pub fn with_dependencies(&self, resources: ResourceSet) -> Self {
        let source = self.clone();
        Self::from_future(async move {
            let mut data = source.data().await;
            data.resources.extend(&resources);
            data
        })
    }
}

/// Completes a [`Deferred::pending`] placeholder exactly once.
pub struct Completer<T> {
    tx: tokio::sync::oneshot::Sender<OutputData<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, data: OutputData<T>) {
        // the receiving side may have been dropped, which is fine
        let _ = self.tx.send(data);
    }

    pub fn resolve(self, value: T) {
        self.complete(OutputData::known(value));
    }

    pub fn resolve_unknown(self) {
        self.complete(OutputData::unknown());
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completer")
    }
}
