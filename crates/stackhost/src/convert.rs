// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Type-directed conversion of wire values into [`Value`]s.
//!
//! Conversion is lenient about scalars: a value of the wrong kind is
//! replaced by the zero value of the expected type and reported as a
//! [`TypeMismatch`] warning. Structural problems (a list where a map was
//! declared, unknown or missing composite fields) are errors. While an
//! `Either` alternative is being tried the converter is strict, so that a
//! mismatch moves on to the other alternative instead of producing zeros.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::deferred::OutputData;
use crate::descriptor::{
    format_number,
    CompositeDescriptor,
    DeclaredFields,
    EnumDescriptor,
    FieldTable,
    PrimitiveKind,
    TypeDescriptor,
};
use crate::deserializer::{Decoded, Deserializer};
use crate::input::Input;
use crate::resource::{Resource, ResourceKind};
use crate::wire::WireValue;

#[cfg(test)]
#[path = "./convert_test.rs"]
mod convert_test;

/// A converted value, shaped by the descriptor it was converted against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// An optional value that was not present.
    Absent,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Enum {
        type_name: String,
        constant: String,
        projection: WireValue,
    },
    Composite {
        type_name: String,
        fields: IndexMap<String, Value>,
    },
    Left(Box<Value>),
    Right(Box<Value>),
    Resource(Resource),
    Opaque(Decoded),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Absent => "absent",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Enum { .. } => "enum",
            Self::Composite { .. } => "composite",
            Self::Left(_) | Self::Right(_) => "either",
            Self::Resource(_) => "resource",
            Self::Opaque(_) => "opaque",
        }
    }
}

/// A scalar that did not have the declared type and was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub context: String,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.context, self.expected, self.found
        )
    }
}

/// The result of a conversion and the mismatches it tolerated.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub data: OutputData<Value>,
    pub warnings: Vec<TypeMismatch>,
}

/// Converts wire values against type descriptors.
#[derive(Clone)]
pub struct Converter {
    deserializer: Deserializer,
    fields: Arc<dyn FieldTable>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("deserializer", &self.deserializer)
            .finish_non_exhaustive()
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Deserializer::default())
    }
}

impl Converter {
    pub fn new(deserializer: Deserializer) -> Self {
        Self {
            deserializer,
            fields: Arc::new(DeclaredFields),
        }
    }

    /// Use another source for the fields of composite types.
    pub fn with_field_table(mut self, fields: Arc<dyn FieldTable>) -> Self {
        self.fields = fields;
        self
    }

    pub fn deserializer(&self) -> &Deserializer {
        &self.deserializer
    }

    /// Convert a wire value into a value of the described type.
    ///
    /// Unknown values, including values with unknown parts, convert to
    /// unknown without looking at the descriptor's shape.
    pub fn convert(
        &self,
        context: &str,
        wire: &WireValue,
        descriptor: &TypeDescriptor,
    ) -> crate::Result<Conversion> {
        descriptor.validate_with(self.fields.as_ref())?;
        let decoded = self.deserializer.deserialize_at(context, wire)?;
        if !decoded.known {
            return Ok(Conversion {
                data: OutputData::new(None, false, decoded.secret, decoded.resources),
                warnings: Vec::new(),
            });
        }
        let mut pass = Pass::lenient();
        let null = Decoded::Null;
        let value = self.convert_decoded(
            &mut pass,
            context,
            decoded.value.as_ref().unwrap_or(&null),
            descriptor,
        )?;
        Ok(Conversion {
            data: OutputData::new(Some(value), true, decoded.secret, decoded.resources),
            warnings: pass.warnings,
        })
    }

    /// Convert straight into a Rust type.
    pub fn convert_typed<T: Convertible>(
        &self,
        context: &str,
        wire: &WireValue,
    ) -> crate::Result<OutputData<T>> {
        let conversion = self.convert(context, wire, &T::descriptor())?;
        let OutputData {
            value,
            known,
            secret,
            resources,
        } = conversion.data;
        let value = value
            .map(|value| T::from_value(context, value))
            .transpose()?;
        Ok(OutputData::new(value, known, secret, resources))
    }

    fn convert_decoded(
        &self,
        pass: &mut Pass,
        context: &str,
        decoded: &Decoded,
        descriptor: &TypeDescriptor,
    ) -> crate::Result<Value> {
        match descriptor {
            TypeDescriptor::Optional(inner) => match decoded {
                Decoded::Null => Ok(Value::Absent),
                _ => self.convert_decoded(pass, context, decoded, inner),
            },
            TypeDescriptor::Primitive(kind) => convert_primitive(pass, context, decoded, *kind),
            TypeDescriptor::Either(left, right) => {
                self.convert_either(context, decoded, left, right)
            }
            TypeDescriptor::Opaque => Ok(Value::Opaque(decoded.clone())),
            // reference-like types pass null through untouched
            _ if matches!(decoded, Decoded::Null) => Ok(Value::Null),
            TypeDescriptor::Enum(descriptor) => convert_enum(pass, context, decoded, descriptor),
            TypeDescriptor::List(element) => {
                let Decoded::List(items) = decoded else {
                    return Err(shape_error(context, "list", decoded));
                };
                let null = Decoded::Null;
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let context = format!("{context}[{index}]");
                        self.convert_decoded(pass, &context, item.as_ref().unwrap_or(&null), element)
                    })
                    .collect::<crate::Result<Vec<_>>>()
                    .map(Value::List)
            }
            TypeDescriptor::Map(_, value) => {
                let Decoded::Map(fields) = decoded else {
                    return Err(shape_error(context, "map", decoded));
                };
                let null = Decoded::Null;
                let mut map = IndexMap::with_capacity(fields.len());
                for (key, item) in fields {
                    let context = format!("{context}[{key}]");
                    let item = item.as_ref().unwrap_or(&null);
                    map.insert(key.clone(), self.convert_decoded(pass, &context, item, value)?);
                }
                Ok(Value::Map(map))
            }
            TypeDescriptor::Composite(composite) => {
                self.convert_composite(pass, context, decoded, composite)
            }
            TypeDescriptor::Resource(kind) => match decoded {
                Decoded::Resource(resource) if accepts(*kind, resource.kind()) => {
                    Ok(Value::Resource(resource.clone()))
                }
                _ => pass.mismatch(
                    context,
                    descriptor.to_string(),
                    found(decoded),
                    Value::Null,
                ),
            },
        }
    }

    /// Try each side strictly; an either fitting neither side is an error
    /// even in a lenient conversion.
    fn convert_either(
        &self,
        context: &str,
        decoded: &Decoded,
        left: &TypeDescriptor,
        right: &TypeDescriptor,
    ) -> crate::Result<Value> {
        let mut strict = Pass::strict();
        let left_err = match self.convert_decoded(&mut strict, context, decoded, left) {
            Ok(value) => return Ok(Value::Left(Box::new(value))),
            Err(err) => err,
        };
        let mut strict = Pass::strict();
        let right_err = match self.convert_decoded(&mut strict, context, decoded, right) {
            Ok(value) => return Ok(Value::Right(Box::new(value))),
            Err(err) => err,
        };
        tracing::debug!(%context, %left_err, %right_err, "no alternative matched");
        Err(crate::Error::EitherMismatch {
            context: context.to_string(),
            left: left_err.to_string(),
            right: right_err.to_string(),
        })
    }

    fn convert_composite(
        &self,
        pass: &mut Pass,
        context: &str,
        decoded: &Decoded,
        composite: &CompositeDescriptor,
    ) -> crate::Result<Value> {
        let Decoded::Map(entries) = decoded else {
            return Err(shape_error(context, &composite.name, decoded));
        };
        let fields = self.fields.fields(composite).ok_or_else(|| {
            crate::Error::unsupported(&composite.name, "no fields are declared for this type")
        })?;
        if let Some(unknown) = entries
            .keys()
            .find(|key| !fields.iter().any(|f| &f.name == *key))
        {
            return Err(crate::Error::schema(
                format!("{}({unknown})", composite.name),
                format!("{unknown} is not a field of {}", composite.name),
            ));
        }
        let null = Decoded::Null;
        let mut values = IndexMap::with_capacity(fields.len());
        for field in fields {
            let context = format!("{}({})", composite.name, field.name);
            let value = match entries.get(&field.name) {
                Some(item) => {
                    let item = item.as_ref().unwrap_or(&null);
                    self.convert_decoded(pass, &context, item, &field.descriptor)?
                }
                None if field.required => {
                    return Err(crate::Error::schema(
                        context,
                        "required field is missing",
                    ));
                }
                None => Value::Absent,
            };
            values.insert(field.name.clone(), value);
        }
        Ok(Value::Composite {
            type_name: composite.name.clone(),
            fields: values,
        })
    }
}

/// How mismatched scalars are treated.
struct Pass {
    strict: bool,
    warnings: Vec<TypeMismatch>,
}

impl Pass {
    fn lenient() -> Self {
        Self {
            strict: false,
            warnings: Vec::new(),
        }
    }

    fn strict() -> Self {
        Self {
            strict: true,
            warnings: Vec::new(),
        }
    }

    fn mismatch(
        &mut self,
        context: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
        zero: Value,
    ) -> crate::Result<Value> {
        let mismatch = TypeMismatch {
            context: context.to_string(),
            expected: expected.into(),
            found: found.into(),
        };
        if self.strict {
            return Err(crate::Error::TypeMismatch {
                context: mismatch.context,
                expected: mismatch.expected,
                found: mismatch.found,
            });
        }
        tracing::warn!(%mismatch, "type mismatch, using the zero value");
        self.warnings.push(mismatch);
        Ok(zero)
    }
}

fn found(decoded: &Decoded) -> String {
    match decoded {
        Decoded::Number(n) => format!("number {}", format_number(*n)),
        Decoded::String(s) => format!("string {s:?}"),
        Decoded::Bool(b) => format!("bool {b}"),
        other => other.kind().to_string(),
    }
}

fn shape_error(context: &str, expected: &str, decoded: &Decoded) -> crate::Error {
    crate::Error::schema(
        context,
        format!("expected {expected}, found {}", found(decoded)),
    )
}

fn accepts(declared: Option<ResourceKind>, actual: ResourceKind) -> bool {
    declared.is_none_or(|declared| actual.is_assignable_to(declared))
}

fn zero_of(kind: PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::Bool => Value::Bool(false),
        PrimitiveKind::Int => Value::Int(0),
        PrimitiveKind::Double => Value::Double(0.0),
        PrimitiveKind::String => Value::String(String::new()),
    }
}

fn convert_primitive(
    pass: &mut Pass,
    context: &str,
    decoded: &Decoded,
    kind: PrimitiveKind,
) -> crate::Result<Value> {
    match (kind, decoded) {
        (_, Decoded::Null) => Ok(zero_of(kind)),
        (PrimitiveKind::Bool, Decoded::Bool(b)) => Ok(Value::Bool(*b)),
        (PrimitiveKind::Int, Decoded::Number(n))
            if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 =>
        {
            Ok(Value::Int(*n as i32))
        }
        (PrimitiveKind::Double, Decoded::Number(n)) => Ok(Value::Double(*n)),
        (PrimitiveKind::String, Decoded::String(s)) => Ok(Value::String(s.clone())),
        _ => pass.mismatch(context, kind.name(), found(decoded), zero_of(kind)),
    }
}

fn convert_enum(
    pass: &mut Pass,
    context: &str,
    decoded: &Decoded,
    descriptor: &EnumDescriptor,
) -> crate::Result<Value> {
    // any scalar is looked up; only non-scalars are tolerated as mismatches
    let scalar = match decoded {
        Decoded::String(s) => WireValue::String(s.clone()),
        Decoded::Number(n) => WireValue::Number(*n),
        _ => {
            let zero = descriptor
                .zero()
                .map(|constant| enum_value(descriptor, constant.name.clone(), &constant.projection))
                .unwrap_or(Value::Null);
            return pass.mismatch(context, &descriptor.name, found(decoded), zero);
        }
    };
    match descriptor.find(&scalar) {
        Some(constant) => Ok(enum_value(descriptor, constant.name.clone(), &constant.projection)),
        None => Err(crate::Error::EnumMismatch {
            context: context.to_string(),
            value: match &scalar {
                WireValue::Number(n) => format_number(*n),
                WireValue::String(s) => s.clone(),
                other => other.kind().to_string(),
            },
            expected: descriptor.expected(),
        }),
    }
}

fn enum_value(descriptor: &EnumDescriptor, constant: String, projection: &WireValue) -> Value {
    Value::Enum {
        type_name: descriptor.name.clone(),
        constant,
        projection: projection.clone(),
    }
}

/// Rust types that know their own descriptor.
pub trait Convertible: Sized {
    fn descriptor() -> TypeDescriptor;

    /// Read a converted value back. `context` names the value in errors.
    fn from_value(context: &str, value: Value) -> crate::Result<Self>;

    fn into_input(self) -> Input;
}

fn unexpected(context: &str, expected: &str, value: &Value) -> crate::Error {
    crate::Error::TypeMismatch {
        context: context.to_string(),
        expected: expected.to_string(),
        found: value.kind().to_string(),
    }
}

macro_rules! convertible_scalar {
    ($ty:ty, $variant:ident, $descriptor:expr, $name:literal) => {
        impl Convertible for $ty {
            fn descriptor() -> TypeDescriptor {
                $descriptor
            }

            fn from_value(context: &str, value: Value) -> crate::Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(unexpected(context, $name, &other)),
                }
            }

            fn into_input(self) -> Input {
                Input::from(self)
            }
        }
    };
}

convertible_scalar!(bool, Bool, TypeDescriptor::bool(), "bool");
convertible_scalar!(i32, Int, TypeDescriptor::int(), "int");
convertible_scalar!(f64, Double, TypeDescriptor::double(), "double");
convertible_scalar!(String, String, TypeDescriptor::string(), "string");

impl<T: Convertible> Convertible for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }

    fn from_value(context: &str, value: Value) -> crate::Result<Self> {
        match value {
            Value::Absent | Value::Null => Ok(None),
            other => T::from_value(context, other).map(Some),
        }
    }

    fn into_input(self) -> Input {
        self.map(T::into_input).unwrap_or(Input::Null)
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::descriptor())
    }

    fn from_value(context: &str, value: Value) -> crate::Result<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| T::from_value(&format!("{context}[{index}]"), item))
                .collect(),
            other => Err(unexpected(context, "list", &other)),
        }
    }

    fn into_input(self) -> Input {
        Input::List(self.into_iter().map(T::into_input).collect())
    }
}

fn map_entries<T: Convertible>(
    context: &str,
    value: Value,
) -> crate::Result<impl Iterator<Item = crate::Result<(String, T)>>> {
    let Value::Map(fields) = value else {
        return Err(unexpected(context, "map", &value));
    };
    let context = context.to_string();
    Ok(fields.into_iter().map(move |(key, item)| {
        let item = T::from_value(&format!("{context}[{key}]"), item)?;
        Ok((key, item))
    }))
}

impl<T: Convertible> Convertible for IndexMap<String, T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }

    fn from_value(context: &str, value: Value) -> crate::Result<Self> {
        map_entries(context, value)?.collect()
    }

    fn into_input(self) -> Input {
        Input::object(self.into_iter().map(|(k, v)| (k, v.into_input())))
    }
}

impl<T: Convertible> Convertible for BTreeMap<String, T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(T::descriptor())
    }

    fn from_value(context: &str, value: Value) -> crate::Result<Self> {
        map_entries(context, value)?.collect()
    }

    fn into_input(self) -> Input {
        Input::object(self.into_iter().map(|(k, v)| (k, v.into_input())))
    }
}
