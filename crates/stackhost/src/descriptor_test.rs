// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn sizes() -> Arc<EnumDescriptor> {
    Arc::new(EnumDescriptor::new(
        "Size",
        PrimitiveKind::Int,
        [
            EnumConstant::new("Small", 4),
            EnumConstant::new("Medium", 6),
            EnumConstant::new("Large", 8),
        ],
    ))
}

#[rstest]
fn test_validate_self_referencing_composite() {
    let node = CompositeDescriptor::new("Node");
    node.set_fields([
        FieldDescriptor::required("value", TypeDescriptor::int()),
        FieldDescriptor::optional(
            "next",
            TypeDescriptor::optional(TypeDescriptor::Composite(node.clone())),
        ),
        FieldDescriptor::optional(
            "children",
            TypeDescriptor::list(TypeDescriptor::Composite(node.clone())),
        ),
    ])
    .expect("Should set fields once");
    TypeDescriptor::Composite(node)
        .validate()
        .expect("Cyclic descriptors should validate");
}

#[rstest]
fn test_fields_can_only_be_set_once() {
    let node = CompositeDescriptor::with_fields("Node", Vec::new());
    assert!(node.set_fields(Vec::new()).is_err());
}

#[rstest]
fn test_composite_without_fields_is_unsupported() {
    let pending = CompositeDescriptor::new("Pending");
    assert!(matches!(
        TypeDescriptor::Composite(pending).validate(),
        Err(crate::Error::UnsupportedShape { .. })
    ));
}

#[rstest]
fn test_duplicate_fields_are_unsupported() {
    let dup = CompositeDescriptor::with_fields(
        "Dup",
        [
            FieldDescriptor::required("a", TypeDescriptor::int()),
            FieldDescriptor::optional("a", TypeDescriptor::string()),
        ],
    );
    let err = TypeDescriptor::Composite(dup)
        .validate()
        .expect_err("Duplicate fields should fail");
    assert!(err.to_string().contains("field a"), "got: {err}");
}

#[rstest]
fn test_map_keys_must_be_strings() {
    let desc = TypeDescriptor::Map(
        Box::new(TypeDescriptor::int()),
        Box::new(TypeDescriptor::string()),
    );
    assert!(matches!(
        desc.validate(),
        Err(crate::Error::UnsupportedShape { .. })
    ));
    TypeDescriptor::map(TypeDescriptor::string())
        .validate()
        .expect("String keyed maps are fine");
}

#[rstest]
fn test_enum_validation() {
    sizes().validate().expect("Int enum should validate");

    let flags = EnumDescriptor::new("Flag", PrimitiveKind::Bool, [EnumConstant::new("On", true)]);
    assert!(flags.validate().is_err());

    let mixed = EnumDescriptor::new(
        "Mixed",
        PrimitiveKind::String,
        [EnumConstant::new("A", "a"), EnumConstant::new("B", 2)],
    );
    assert!(mixed.validate().is_err());
}

#[rstest]
fn test_enum_lookup() {
    let sizes = sizes();
    assert_eq!(
        sizes.find(&WireValue::Number(6.0)).map(|c| c.name.as_str()),
        Some("Medium")
    );
    assert!(sizes.zero().is_none());
    assert_eq!(sizes.expected(), "4, 6, 8");
}

#[rstest]
fn test_display() {
    let desc = TypeDescriptor::map(TypeDescriptor::list(TypeDescriptor::optional(
        TypeDescriptor::Enum(sizes()),
    )));
    assert_eq!(desc.to_string(), "map<string, list<optional<Size>>>");
}
