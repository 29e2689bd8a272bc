// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Type descriptors that drive conversion from decoded wire values.
//!
//! Descriptors may be cyclic: a composite's field list is attached after the
//! composite itself exists, so a field can refer back to its own composite.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use once_cell::sync::OnceCell;

use crate::resource::ResourceKind;
use crate::wire::WireValue;

#[cfg(test)]
#[path = "./descriptor_test.rs"]
mod descriptor_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Double,
    String,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
        }
    }
}

/// The shape a decoded value is expected to have.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Optional(Box<TypeDescriptor>),
    Either(Box<TypeDescriptor>, Box<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    /// Key and value descriptors. Only string keys are valid.
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Enum(Arc<EnumDescriptor>),
    Composite(Arc<CompositeDescriptor>),
    /// A resource of the given kind; `None` accepts any kind.
    Resource(Option<ResourceKind>),
    /// Any decoded value, kept as is.
    Opaque,
}

impl TypeDescriptor {
    pub fn bool() -> Self {
        Self::Primitive(PrimitiveKind::Bool)
    }

    pub fn int() -> Self {
        Self::Primitive(PrimitiveKind::Int)
    }

    pub fn double() -> Self {
        Self::Primitive(PrimitiveKind::Double)
    }

    pub fn string() -> Self {
        Self::Primitive(PrimitiveKind::String)
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn either(left: TypeDescriptor, right: TypeDescriptor) -> Self {
        Self::Either(Box::new(left), Box::new(right))
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    /// A map with string keys.
    pub fn map(value: TypeDescriptor) -> Self {
        Self::Map(Box::new(Self::string()), Box::new(value))
    }

    /// Check that every reachable descriptor can be converted to.
    pub fn validate(&self) -> crate::Result<()> {
        self.validate_with(&DeclaredFields)
    }

    /// Like [`Self::validate`], reading composite fields from `table`.
    pub fn validate_with(&self, table: &dyn FieldTable) -> crate::Result<()> {
        let mut seen = HashSet::new();
        self.validate_inner(table, &mut seen)
    }

    fn validate_inner(
        &self,
        table: &dyn FieldTable,
        seen: &mut HashSet<*const CompositeDescriptor>,
    ) -> crate::Result<()> {
        match self {
            Self::Primitive(_) | Self::Resource(_) | Self::Opaque => Ok(()),
            Self::Optional(inner) | Self::List(inner) => inner.validate_inner(table, seen),
            Self::Either(left, right) => {
                left.validate_inner(table, seen)?;
                right.validate_inner(table, seen)
            }
            Self::Map(key, value) => {
                if !matches!(**key, Self::Primitive(PrimitiveKind::String)) {
                    return Err(crate::Error::unsupported(
                        self.to_string(),
                        format!("map keys must be strings, not {key}"),
                    ));
                }
                value.validate_inner(table, seen)
            }
            Self::Enum(descriptor) => descriptor.validate(),
            Self::Composite(descriptor) => {
                if !seen.insert(Arc::as_ptr(descriptor)) {
                    return Ok(());
                }
                descriptor.validate_inner(table, seen)
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => f.write_str(kind.name()),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Either(left, right) => write!(f, "either<{left}, {right}>"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Map(key, value) => write!(f, "map<{key}, {value}>"),
            Self::Enum(descriptor) => f.write_str(&descriptor.name),
            Self::Composite(descriptor) => f.write_str(&descriptor.name),
            Self::Resource(Some(kind)) => write!(f, "resource<{kind:?}>"),
            Self::Resource(None) => f.write_str("resource"),
            Self::Opaque => f.write_str("any"),
        }
    }
}

/// One named constant of an enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstant {
    pub name: String,
    /// The scalar this constant is written as on the wire.
    pub projection: WireValue,
}

impl EnumConstant {
    pub fn new(name: impl Into<String>, projection: impl Into<WireValue>) -> Self {
        Self {
            name: name.into(),
            projection: projection.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub name: String,
    pub underlying: PrimitiveKind,
    pub constants: Vec<EnumConstant>,
}

impl EnumDescriptor {
    pub fn new(
        name: impl Into<String>,
        underlying: PrimitiveKind,
        constants: impl IntoIterator<Item = EnumConstant>,
    ) -> Self {
        Self {
            name: name.into(),
            underlying,
            constants: constants.into_iter().collect(),
        }
    }

    /// The constant projected to the given scalar.
    pub fn find(&self, value: &WireValue) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.projection == *value)
    }

    /// The constant written as the underlying type's zero value, if any.
    pub fn zero(&self) -> Option<&EnumConstant> {
        let zero = match self.underlying {
            PrimitiveKind::String => WireValue::String(String::new()),
            _ => WireValue::Number(0.0),
        };
        self.find(&zero)
    }

    /// Every projection in declaration order, for messages.
    pub fn expected(&self) -> String {
        self.constants
            .iter()
            .map(|c| match &c.projection {
                WireValue::Number(n) => format_number(*n),
                WireValue::String(s) => s.clone(),
                other => other.kind().to_string(),
            })
            .join(", ")
    }

    pub fn validate(&self) -> crate::Result<()> {
        let expected_kind = match self.underlying {
            PrimitiveKind::Bool => {
                return Err(crate::Error::unsupported(
                    &self.name,
                    "enums must be backed by a number or a string",
                ));
            }
            PrimitiveKind::String => "string",
            PrimitiveKind::Int | PrimitiveKind::Double => "number",
        };
        if let Some(constant) = self
            .constants
            .iter()
            .find(|c| c.projection.kind() != expected_kind)
        {
            return Err(crate::Error::unsupported(
                &self.name,
                format!(
                    "constant {} is a {}, expected a {expected_kind}",
                    constant.name,
                    constant.projection.kind()
                ),
            ));
        }
        Ok(())
    }
}

/// Render a number the way users wrote it: integral values without a fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A named field of a composite type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The wire name of the field.
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: false,
        }
    }
}

/// A type built from named fields.
pub struct CompositeDescriptor {
    pub name: String,
    fields: OnceCell<Vec<FieldDescriptor>>,
}

impl CompositeDescriptor {
    /// A composite whose fields are attached later with [`Self::set_fields`].
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields: OnceCell::new(),
        })
    }

    pub fn with_fields(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Arc<Self> {
        let fields = OnceCell::with_value(fields.into_iter().collect());
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    /// Attach the field list. Fields can only be set once.
    pub fn set_fields(&self, fields: impl IntoIterator<Item = FieldDescriptor>) -> crate::Result<()> {
        self.fields
            .set(fields.into_iter().collect())
            .map_err(|_| crate::Error::unsupported(&self.name, "fields were already set"))
    }

    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        self.fields.get().map(Vec::as_slice)
    }

    fn validate_inner(
        &self,
        table: &dyn FieldTable,
        seen: &mut HashSet<*const CompositeDescriptor>,
    ) -> crate::Result<()> {
        let fields = table.fields(self).ok_or_else(|| {
            crate::Error::unsupported(&self.name, "no fields are declared for this type")
        })?;
        if let Some(duplicate) = fields.iter().map(|f| &f.name).duplicates().next() {
            return Err(crate::Error::unsupported(
                &self.name,
                format!("field {duplicate} is declared more than once"),
            ));
        }
        for field in fields {
            field.descriptor.validate_inner(table, seen)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CompositeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // fields may refer back to this composite, so only list their names
        let names = self
            .fields()
            .map(|fields| fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>());
        f.debug_struct("CompositeDescriptor")
            .field("name", &self.name)
            .field("fields", &names)
            .finish()
    }
}

/// Supplies the named fields of a composite type.
pub trait FieldTable: Send + Sync {
    fn fields<'a>(&self, composite: &'a CompositeDescriptor) -> Option<&'a [FieldDescriptor]>;
}

/// Reads the fields declared on the descriptor itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredFields;

impl FieldTable for DeclaredFields {
    fn fields<'a>(&self, composite: &'a CompositeDescriptor) -> Option<&'a [FieldDescriptor]> {
        composite.fields()
    }
}
