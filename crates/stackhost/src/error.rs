// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for stackhost operations.

use miette::Diagnostic;
use thiserror::Error;

/// Convenience Result type with stackhost Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting values or resolving resources.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// A signature struct was present but its fields were missing or mistyped
    #[error("{context}: malformed wire value: {message}")]
    #[diagnostic(code(stackhost::malformed_wire_value))]
    MalformedWireValue { context: String, message: String },

    /// A decoded struct does not fit the declared composite fields
    #[error("{context}: {message}")]
    #[diagnostic(
        code(stackhost::schema_violation),
        help("The engine returned data that the declared type does not describe")
    )]
    SchemaViolation { context: String, message: String },

    /// Conflicting identity options were given to a resource
    #[error("Identity conflict: {0}")]
    #[diagnostic(code(stackhost::identity_conflict))]
    IdentityConflict(String),

    /// A transformation tried to move a resource to another parent
    #[error("Transformations cannot change the parent of resource {type_}::{name}")]
    #[diagnostic(
        code(stackhost::transformation_parent_changed),
        help("Return options with the same parent the resource was declared with")
    )]
    TransformationParentChanged { type_: String, name: String },

    /// A value or type descriptor outside of the supported set
    #[error("{context}: unsupported shape: {message}")]
    #[diagnostic(code(stackhost::unsupported_shape))]
    UnsupportedShape { context: String, message: String },

    /// No enum constant projects to the decoded value
    #[error("{context}: {value} is not a valid value, expected one of: {expected}")]
    #[diagnostic(code(stackhost::enum_mismatch))]
    EnumMismatch {
        context: String,
        value: String,
        expected: String,
    },

    /// A decoded value has a different kind than the declared type
    #[error("{context}: expected {expected}, found {found}")]
    #[diagnostic(code(stackhost::type_mismatch))]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// Neither side of an either type accepted the value
    #[error("{context}: value matched neither alternative: {left}; {right}")]
    #[diagnostic(code(stackhost::either_mismatch))]
    EitherMismatch {
        context: String,
        left: String,
        right: String,
    },

    /// The engine rejected or failed a resource registration
    #[error("Resource registration failed: {0}")]
    #[diagnostic(code(stackhost::registration_failed))]
    Registration(String),

    /// A string could not be parsed as a resource URN
    #[error("Invalid URN: {0}")]
    #[diagnostic(
        code(stackhost::invalid_urn),
        help("URNs look like urn:pulumi:<stack>::<project>::<type>::<name>")
    )]
    InvalidUrn(String),

    /// A version string could not be parsed
    #[error("Invalid version: {0}")]
    #[diagnostic(code(stackhost::invalid_version))]
    InvalidVersion(String),

    /// Run settings are missing or inconsistent
    #[error("Invalid settings: {0}")]
    #[diagnostic(code(stackhost::invalid_settings))]
    InvalidSettings(String),

    /// Invalid YAML in a project file
    #[error("Invalid stackhost.yaml file: {error}")]
    #[diagnostic(
        code(stackhost::invalid_yaml),
        help("Check YAML syntax and ensure 'api: stackhost/v0' is present")
    )]
    InvalidYaml {
        #[source]
        error: serde_yaml::Error,
        yaml_content: String,
    },

    /// Failed to read a file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(stackhost::read_failed))]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// JSON error passthrough
    #[error(transparent)]
    #[diagnostic(code(stackhost::json_error))]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedWireValue {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            context: context.into(),
            message: message.into(),
        }
    }
}
