// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! stackhost - language host SDK for declaring infrastructure resources
//!
//! This crate provides the pieces a program needs to declare resources and
//! exchange them with an orchestration engine over its wire protocol.
//!
//! # Overview
//!
//! Resource properties are [`Deferred`] values: they may not be known until
//! the engine answers, may be secret, and remember the resources they depend
//! on. The [`Serializer`] turns declared inputs into [`WireValue`]s, the
//! [`Deserializer`] decodes engine answers back into known, unknown and
//! secret data, and the [`Converter`] shapes decoded data to a
//! [`TypeDescriptor`].
//!
//! Every [`Resource`] has a URN derived from its stack, project, parent type
//! chain and name. Options such as aliases, providers and protection are
//! inherited from the parent when not set.
//!
//! # Example
//!
//! ```yaml
//! # stackhost.yaml
//! api: stackhost/v0
//! name: web
//! description: "A static website"
//!
//! stacks:
//!   dev:
//!     config:
//!       aws:region: us-west-2
//!       token: s3cr3t
//!     secret_keys:
//!       - token
//! ```

pub mod alias;
pub mod asset;
pub mod convert;
pub mod deferred;
pub mod deployment;
pub mod descriptor;
pub mod deserializer;
pub mod error;
pub mod input;
pub mod options;
pub mod registry;
pub mod resource;
pub mod serializer;
pub mod settings;
pub mod urn;
pub mod wire;

pub use alias::{Alias, AliasBuilder};
pub use asset::{Archive, Asset, AssetOrArchive};
pub use convert::{Conversion, Convertible, Converter, TypeMismatch, Value};
pub use deferred::{Completer, Deferred, OutputData, ResourceSet};
pub use deployment::{
    Deployment,
    Engine,
    ReadResourceRequest,
    ReadResourceResponse,
    RegisterResourceRequest,
    RegisterResourceResponse,
};
pub use descriptor::{
    CompositeDescriptor,
    EnumConstant,
    EnumDescriptor,
    FieldDescriptor,
    PrimitiveKind,
    TypeDescriptor,
};
pub use deserializer::{Decoded, DecodedValue, Deserializer};
pub use error::{Error, Result};
pub use input::{Input, WireEnum};
pub use options::{
    CommonOptions,
    ComponentResourceOptions,
    CustomResourceOptions,
    CustomTimeouts,
    ResourceOptions,
};
pub use registry::{RegisteredType, TypeRegistry, Version};
pub use resource::{Resource, ResourceKind, Transformation, TransformationArgs, TransformationResult};
pub use serializer::{SerializedProperties, Serializer};
pub use settings::{ProjectSpec, RunSettings, StackConfig, PROJECT_FILE};
pub use urn::Urn;
pub use wire::{Signature, WireStruct, WireValue};
