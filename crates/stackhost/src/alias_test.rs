// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn defaults<'a>(parent: Option<&'a Resource>) -> AliasDefaults<'a> {
    AliasDefaults {
        name: "bucket",
        type_: "aws:s3/bucket:Bucket",
        project: "web",
        stack: "dev",
        parent,
    }
}

#[rstest]
#[tokio::test]
async fn test_literal_urn_wins() {
    let alias = Alias::from_urn("urn:pulumi:dev::web::aws:s3/bucket:Bucket::old");
    let urn = alias.collapse(defaults(None)).value().await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::aws:s3/bucket:Bucket::old")
    );
}

#[rstest]
#[tokio::test]
async fn test_missing_fields_default_to_resource() {
    let alias = Alias::builder()
        .name("old-bucket")
        .build()
        .expect("Should build alias");
    let urn = alias.collapse(defaults(None)).value().await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::aws:s3/bucket:Bucket::old-bucket")
    );
}

#[rstest]
#[tokio::test]
async fn test_parent_defaults_to_current_parent() {
    let parent = Resource::dependency("urn:pulumi:dev::web::my:index:Site::site", None);
    let alias = Alias::builder()
        .stack("prod")
        .build()
        .expect("Should build alias");
    let urn = alias.collapse(defaults(Some(&parent))).value().await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::bucket"),
        "a non-root parent decides the stack and project prefix"
    );
}

#[rstest]
#[tokio::test]
async fn test_no_parent_drops_current_parent() {
    let parent = Resource::dependency("urn:pulumi:dev::web::my:index:Site::site", None);
    let alias = Alias::builder()
        .no_parent()
        .build()
        .expect("Should build alias");
    let urn = alias.collapse(defaults(Some(&parent))).value().await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::aws:s3/bucket:Bucket::bucket")
    );
}

#[rstest]
#[tokio::test]
async fn test_parent_urn_alias() {
    let alias = Alias::builder()
        .parent_urn(Deferred::known(
            "urn:pulumi:dev::web::my:index:Old::old".to_string(),
        ))
        .build()
        .expect("Should build alias");
    let urn = alias.collapse(defaults(None)).value().await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::my:index:Old$aws:s3/bucket:Bucket::bucket")
    );
}

#[rstest]
fn test_only_one_parent_may_be_named() {
    let parent = Resource::dependency("urn:pulumi:dev::web::my:index:Site::site", None);
    let result = Alias::builder().parent(&parent).no_parent().build();
    assert!(matches!(result, Err(crate::Error::IdentityConflict(_))));

    let result = Alias::builder()
        .parent(&parent)
        .parent_urn(Deferred::known("urn:pulumi:dev::web::a:b:C::c".to_string()))
        .build();
    assert!(matches!(result, Err(crate::Error::IdentityConflict(_))));
}

#[rstest]
#[tokio::test]
async fn test_inherited_child_alias_renames_prefix() {
    let parent_alias = Deferred::known("urn:pulumi:dev::web::my:index:Site::old-site".to_string());
    let urn = inherited_child_alias("site-bucket", "site", &parent_alias, "aws:s3/bucket:Bucket")
        .value()
        .await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::old-site-bucket")
    );
}

#[rstest]
#[tokio::test]
async fn test_inherited_child_alias_keeps_unrelated_name() {
    let parent_alias = Deferred::known("urn:pulumi:dev::web::my:index:Site::old-site".to_string());
    let urn = inherited_child_alias("logs", "site", &parent_alias, "aws:s3/bucket:Bucket")
        .value()
        .await;
    assert_eq!(
        urn.as_deref(),
        Some("urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::logs")
    );
}

#[rstest]
#[tokio::test]
async fn test_inherited_child_alias_of_garbage_is_unknown() {
    let parent_alias = Deferred::known("garbage".to_string());
    let alias = inherited_child_alias("logs", "site", &parent_alias, "aws:s3/bucket:Bucket");
    assert!(!alias.is_known().await);
}
