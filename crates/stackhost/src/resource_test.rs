// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::{fixture, rstest};

use super::*;
use crate::alias::Alias;
use crate::options::{
    CommonOptions,
    ComponentResourceOptions,
    CustomResourceOptions,
};

const STACK_URN: &str = "urn:pulumi:dev::web::pulumi:pulumi:Stack::web-dev";

#[fixture]
fn root() -> Resource {
    let urn: Urn = STACK_URN.parse().expect("Should parse stack urn");
    Resource::rehydrated(ResourceKind::Component, &urn, None, None)
}

fn declare(
    root: &Resource,
    kind: ResourceKind,
    type_: &str,
    name: &str,
    options: ResourceOptions,
) -> crate::Result<Resource> {
    let scope = IdentityScope {
        project: "web",
        stack: "dev",
        root: Some(root),
    };
    let identity = resolve_identity(
        scope,
        ResourceDeclaration {
            kind,
            type_: type_.to_string(),
            name: name.to_string(),
            props: IndexMap::new(),
            options,
        },
    )?;
    let urn = urn::create(
        &identity.name,
        &identity.type_,
        identity.parent.as_ref().map(Resource::urn),
        "web",
        "dev",
    );
    let id = kind.has_id().then(|| Deferred::known(format!("{name}-id")));
    Ok(Resource::from_identity(
        identity,
        urn,
        id,
        Deferred::known(WireStruct::new()),
    ))
}

fn custom(parent: Option<&Resource>, provider: Option<&Resource>) -> ResourceOptions {
    CustomResourceOptions {
        common: CommonOptions {
            parent: parent.cloned(),
            provider: provider.cloned(),
            ..Default::default()
        },
        ..Default::default()
    }
    .into()
}

fn component(common: CommonOptions, providers: Vec<Resource>) -> ResourceOptions {
    ComponentResourceOptions { common, providers }.into()
}

#[rstest]
#[case(ResourceKind::Custom, ResourceKind::Custom, true)]
#[case(ResourceKind::Provider, ResourceKind::Custom, true)]
#[case(ResourceKind::Custom, ResourceKind::Provider, false)]
#[case(ResourceKind::Component, ResourceKind::Custom, false)]
#[case(ResourceKind::Dependency, ResourceKind::Component, true)]
fn test_kind_assignability(
    #[case] kind: ResourceKind,
    #[case] target: ResourceKind,
    #[case] expected: bool,
) {
    assert_eq!(kind.is_assignable_to(target), expected);
}

#[rstest]
#[tokio::test]
async fn test_dependency_with_sentinel_id_is_unknown() {
    let dep = Resource::dependency("urn:pulumi:dev::web::a:b:C::c", Some(UNKNOWN_SENTINEL.into()));
    let id = dep.id().expect("Dependencies always have an id");
    assert!(!id.is_known().await);
    assert_eq!(
        dep.urn().value().await.as_deref(),
        Some("urn:pulumi:dev::web::a:b:C::c")
    );
}

#[rstest]
#[tokio::test]
async fn test_child_is_parented_to_root(root: Resource) {
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        custom(None, None),
    )
    .expect("Should declare bucket");
    assert_eq!(bucket.parent(), Some(&root));
    assert_eq!(root.children(), vec![bucket.clone()]);
    assert_eq!(
        bucket.urn().value().await.as_deref(),
        Some("urn:pulumi:dev::web::aws:s3/bucket:Bucket::bucket")
    );
}

#[rstest]
fn test_custom_inherits_provider_from_component(root: Resource) {
    let aws = declare(
        &root,
        ResourceKind::Provider,
        "pulumi:providers:aws",
        "east",
        custom(None, None),
    )
    .expect("Should declare provider");
    let site = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(CommonOptions::default(), vec![aws.clone()]),
    )
    .expect("Should declare component");
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        custom(Some(&site), None),
    )
    .expect("Should declare bucket");
    assert_eq!(bucket.provider(), Some(&aws));

    let other = declare(
        &root,
        ResourceKind::Custom,
        "gcp:storage:Bucket",
        "other",
        custom(Some(&site), None),
    )
    .expect("Should declare bucket");
    assert_eq!(other.provider(), None, "providers only apply to their package");
}

#[rstest]
fn test_explicit_provider_is_handed_down(root: Resource) {
    let aws = declare(
        &root,
        ResourceKind::Provider,
        "pulumi:providers:aws",
        "east",
        custom(None, None),
    )
    .expect("Should declare provider");
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        custom(None, Some(&aws)),
    )
    .expect("Should declare bucket");
    assert_eq!(bucket.provider(), Some(&aws));
    assert_eq!(bucket.provider_for("aws:s3/object:Object"), Some(aws));
}

#[rstest]
fn test_protect_is_inherited(root: Resource) {
    let site = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(
            CommonOptions {
                protect: Some(true),
                ..Default::default()
            },
            Vec::new(),
        ),
    )
    .expect("Should declare component");
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        custom(Some(&site), None),
    )
    .expect("Should declare bucket");
    assert!(bucket.protect());
}

#[rstest]
fn test_component_with_provider_and_providers_fails(root: Resource) {
    let aws = declare(
        &root,
        ResourceKind::Provider,
        "pulumi:providers:aws",
        "east",
        custom(None, None),
    )
    .expect("Should declare provider");
    let result = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(
            CommonOptions {
                provider: Some(aws.clone()),
                ..Default::default()
            },
            vec![aws],
        ),
    );
    assert!(matches!(result, Err(crate::Error::IdentityConflict(_))));
}

#[rstest]
fn test_options_must_match_kind(root: Resource) {
    let result = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        custom(None, None),
    );
    assert!(matches!(result, Err(crate::Error::UnsupportedShape { .. })));
}

#[rstest]
fn test_parent_transformation_rewrites_child(root: Resource) {
    let protect_all = Transformation::new(|args: &TransformationArgs| {
        let mut options = args.options.clone();
        options.common_mut().protect = Some(true);
        Some(TransformationResult {
            props: args.props.clone(),
            options,
        })
    });
    let site = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(
            CommonOptions {
                transformations: vec![protect_all],
                ..Default::default()
            },
            Vec::new(),
        ),
    )
    .expect("Should declare component");
    assert!(site.protect(), "own transformations apply to the resource itself");
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        custom(Some(&site), None),
    )
    .expect("Should declare bucket");
    assert!(bucket.protect());
    assert_eq!(bucket.transformations().len(), 1);
}

#[rstest]
fn test_transformation_cannot_change_parent(root: Resource) {
    let other = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(CommonOptions::default(), Vec::new()),
    )
    .expect("Should declare component");
    let reparent = Transformation::new(move |args: &TransformationArgs| {
        let mut options = args.options.clone();
        options.common_mut().parent = Some(other.clone());
        Some(TransformationResult {
            props: args.props.clone(),
            options,
        })
    });
    let options = CustomResourceOptions {
        common: CommonOptions {
            transformations: vec![reparent],
            ..Default::default()
        },
        ..Default::default()
    };
    let result = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        options.into(),
    );
    assert!(matches!(
        result,
        Err(crate::Error::TransformationParentChanged { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn test_children_inherit_parent_aliases(root: Resource) {
    let site = declare(
        &root,
        ResourceKind::Component,
        "my:index:Site",
        "site",
        component(
            CommonOptions {
                aliases: vec![Alias::builder()
                    .name("old-site")
                    .build()
                    .expect("Should build alias")],
                ..Default::default()
            },
            Vec::new(),
        ),
    )
    .expect("Should declare component");
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "site-bucket",
        custom(Some(&site), None),
    )
    .expect("Should declare bucket");

    let site_aliases = Deferred::all(site.aliases().to_vec()).value().await;
    assert_eq!(
        site_aliases,
        Some(vec!["urn:pulumi:dev::web::my:index:Site::old-site".to_string()])
    );
    let bucket_aliases = Deferred::all(bucket.aliases().to_vec()).value().await;
    assert_eq!(
        bucket_aliases,
        Some(vec![
            "urn:pulumi:dev::web::my:index:Site$aws:s3/bucket:Bucket::old-site-bucket"
                .to_string()
        ])
    );
}

#[rstest]
#[tokio::test]
async fn test_provider_reference(root: Resource) {
    let aws = declare(
        &root,
        ResourceKind::Provider,
        "pulumi:providers:aws",
        "east",
        custom(None, None),
    )
    .expect("Should declare provider");
    assert_eq!(
        aws.provider_reference().await,
        "urn:pulumi:dev::web::pulumi:providers:aws::east::east-id"
    );

    let pending = Resource::dependency("urn:pulumi:dev::web::pulumi:providers:aws::p", None);
    assert_eq!(
        pending.provider_reference().await,
        format!("urn:pulumi:dev::web::pulumi:providers:aws::p::{UNKNOWN_SENTINEL}")
    );
}

#[rstest]
fn test_transformation_may_name_the_implicit_root(root: Resource) {
    let stack = root.clone();
    let explicit_root = Transformation::new(move |args: &TransformationArgs| {
        let mut options = args.options.clone();
        options.common_mut().parent = Some(stack.clone());
        Some(TransformationResult {
            props: args.props.clone(),
            options,
        })
    });
    let options = CustomResourceOptions {
        common: CommonOptions {
            transformations: vec![explicit_root],
            ..Default::default()
        },
        ..Default::default()
    };
    let bucket = declare(
        &root,
        ResourceKind::Custom,
        "aws:s3/bucket:Bucket",
        "bucket",
        options.into(),
    )
    .expect("Naming the root stack keeps the same parent");
    assert_eq!(bucket.parent(), Some(&root));
}
