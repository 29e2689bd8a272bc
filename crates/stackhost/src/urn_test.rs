// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

const STACK_URN: &str = "urn:pulumi:dev::web::pulumi:pulumi:Stack::web-dev";

#[rstest]
fn test_create_urn_without_parent() {
    let urn = create_urn("bucket", "aws:s3/bucket:Bucket", None, "web", "dev");
    assert_eq!(urn, "urn:pulumi:dev::web::aws:s3/bucket:Bucket::bucket");
}

#[rstest]
fn test_create_urn_under_root_stack_has_no_type_prefix() {
    let urn = create_urn("bucket", "aws:s3/bucket:Bucket", Some(STACK_URN), "web", "dev");
    assert_eq!(urn, "urn:pulumi:dev::web::aws:s3/bucket:Bucket::bucket");
}

#[rstest]
fn test_create_urn_nested() {
    let parent = "urn:pulumi:dev::web::my:index:Site::site";
    let urn = create_urn("bucket", "aws:s3/bucket:Bucket", Some(parent), "other", "other");
    assert_eq!(
        urn,
        "urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::bucket"
    );

    let grandchild = create_urn("obj", "aws:s3/object:Object", Some(&urn), "web", "dev");
    assert_eq!(
        grandchild,
        "urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket$aws:s3/object:Object::obj"
    );
}

#[rstest]
#[tokio::test]
async fn test_create_with_pending_parent() {
    let (completer, parent) = Deferred::pending();
    let urn = create("child", "my:index:Child", Some(&parent), "web", "dev");
    completer.resolve("urn:pulumi:dev::web::my:index:Parent::p".to_string());
    assert_eq!(
        urn.value().await.as_deref(),
        Some("urn:pulumi:dev::web::my:index:Parent$my:index:Child::child")
    );
}

#[rstest]
fn test_parse_urn() {
    let urn: Urn = "urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::my::bucket"
        .parse()
        .expect("Should parse urn");
    assert_eq!(urn.stack, "dev");
    assert_eq!(urn.project, "web");
    assert_eq!(urn.type_token(), "aws:s3/bucket:Bucket");
    assert_eq!(urn.parent_type(), Some("my:index:Site"));
    assert_eq!(urn.name, "my::bucket");
    assert_eq!(
        urn.to_string(),
        "urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::my::bucket"
    );
}

#[rstest]
#[case("not-a-urn")]
#[case("urn:pulumi:dev::web")]
#[case("urn:pulumi:dev::web::type::")]
fn test_parse_invalid_urn(#[case] input: &str) {
    assert!(input.parse::<Urn>().is_err());
}

#[rstest]
#[case("aws:s3/bucket:Bucket", "aws")]
#[case("pulumi:providers:gcp", "gcp")]
#[case("kubernetes", "kubernetes")]
fn test_package_of(#[case] type_: &str, #[case] expected: &str) {
    assert_eq!(package_of(type_), expected);
}
