// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use rstest::rstest;

use super::*;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[rstest]
#[tokio::test]
async fn test_map_known() {
    let value = Deferred::known(20).map(|v| v + 1);
    let data = value.data().await;
    assert_eq!(data.value, Some(21));
    assert!(data.known);
    assert!(!data.secret);
}

#[rstest]
#[tokio::test]
async fn test_map_keeps_secret() {
    let value = Deferred::secret("hunter2".to_string()).map(|s| s.len());
    let data = value.data().await;
    assert_eq!(data.value, Some(7));
    assert!(data.secret);
}

#[rstest]
#[tokio::test]
async fn test_map_never_runs_on_unknown() {
    let calls = counter();
    let seen = calls.clone();
    let value = Deferred::<i32>::unknown().map(move |v| {
        seen.fetch_add(1, Ordering::SeqCst);
        v * 2
    });
    let data = value.data().await;
    assert!(!data.known);
    assert_eq!(data.value, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn test_apply_never_runs_on_unknown() {
    let calls = counter();
    let seen = calls.clone();
    let value = Deferred::<i32>::unknown().secretify().apply(move |v| {
        seen.fetch_add(1, Ordering::SeqCst);
        Deferred::known(v.to_string())
    });
    let data = value.data().await;
    assert!(!data.known);
    assert!(data.secret, "unknown result keeps the input secret bit");
    assert_eq!(data.value, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case(false, false, false)]
#[case(true, false, true)]
#[case(false, true, true)]
#[case(true, true, true)]
#[tokio::test]
async fn test_apply_secret_is_inherited_from_both_ends(
    #[case] outer_secret: bool,
    #[case] inner_secret: bool,
    #[case] expected: bool,
) {
    let outer = if outer_secret {
        Deferred::secret(2)
    } else {
        Deferred::known(2)
    };
    let value = outer.apply(move |v| {
        if inner_secret {
            Deferred::secret(v * 10)
        } else {
            Deferred::known(v * 10)
        }
    });
    let data = value.data().await;
    assert_eq!(data.value, Some(20));
    assert_eq!(data.secret, expected);
}

#[rstest]
#[tokio::test]
async fn test_apply_takes_inner_known_bit() {
    let value = Deferred::known(1).apply(|_| Deferred::<String>::unknown());
    let data = value.data().await;
    assert!(!data.known);
    assert_eq!(data.value, None);
}

#[rstest]
#[tokio::test]
async fn test_all_known_and_secret() {
    let combined = Deferred::all(vec![
        Deferred::known(1),
        Deferred::secret(2),
        Deferred::known(3),
    ]);
    let data = combined.data().await;
    assert!(data.known);
    assert!(data.secret);
    assert_eq!(data.value, Some(vec![1, 2, 3]));
}

#[rstest]
#[tokio::test]
async fn test_all_with_unknown_input() {
    let combined = Deferred::all(vec![Deferred::known(1), Deferred::unknown()]);
    let data = combined.data().await;
    assert!(!data.known);
    assert_eq!(data.value, None);
}

#[rstest]
#[tokio::test]
async fn test_all_waits_for_pending_inputs() {
    let (completer, pending) = Deferred::pending();
    let combined = Deferred::all(vec![Deferred::known(1), pending]);
    let handle = tokio::spawn(async move { combined.data().await });
    completer.complete(OutputData::known(2).with_secret(true));
    let data = handle.await.unwrap();
    assert_eq!(data.value, Some(vec![1, 2]));
    assert!(data.secret);
}

#[rstest]
#[tokio::test]
async fn test_combine2() {
    let pair = Deferred::known("a".to_string()).combine2(&Deferred::secret(5));
    let data = pair.data().await;
    assert_eq!(data.value, Some(("a".to_string(), 5)));
    assert!(data.secret);
}

#[rstest]
#[tokio::test]
async fn test_secretify_then_declassify() {
    let value = Deferred::known(true).secretify();
    assert!(value.is_secret().await);
    let plain = value.declassify();
    assert!(!plain.is_secret().await);
    assert_eq!(plain.value().await, Some(true));
}

#[rstest]
#[tokio::test]
async fn test_declassify_keeps_unknown() {
    let value = Deferred::<u8>::unknown().secretify().declassify();
    let data = value.data().await;
    assert!(!data.known);
    assert!(!data.secret);
}

#[rstest]
#[tokio::test]
async fn test_dropped_completer_resolves_unknown() {
    let (completer, pending) = Deferred::<String>::pending();
    drop(completer);
    assert!(!pending.is_known().await);
}

#[rstest]
#[tokio::test]
async fn test_dependencies_accumulate() {
    let a = Resource::dependency("urn:pulumi:dev::proj::test:index:Thing::a", None);
    let b = Resource::dependency("urn:pulumi:dev::proj::test:index:Thing::b", None);
    let left = Deferred::known(1).with_dependency(&a);
    let right = left.apply(move |v| Deferred::known(v + 1).with_dependency(&b));
    let data = right.data().await;
    assert_eq!(data.resources.len(), 2);
}

fn deferred(value: i32, known: bool, secret: bool) -> Deferred<i32> {
    let value = if known {
        Deferred::known(value)
    } else {
        Deferred::unknown()
    };
    if secret { value.secretify() } else { value }
}

proptest! {
    #[test]
    fn map_runs_only_on_known_values(value in any::<i32>(), known in any::<bool>(), secret in any::<bool>()) {
        let calls = counter();
        let seen = calls.clone();
        let mapped = deferred(value, known, secret).map(move |v| {
            seen.fetch_add(1, Ordering::SeqCst);
            i64::from(v) + 1
        });
        let data = futures::executor::block_on(mapped.data());
        prop_assert_eq!(calls.load(Ordering::SeqCst), usize::from(known));
        prop_assert_eq!(data.known, known);
        prop_assert_eq!(data.secret, secret);
        prop_assert_eq!(data.value, known.then(|| i64::from(value) + 1));
    }

    #[test]
    fn apply_runs_only_on_known_values(
        value in any::<i32>(),
        outer_known in any::<bool>(),
        outer_secret in any::<bool>(),
        inner_known in any::<bool>(),
        inner_secret in any::<bool>(),
    ) {
        let calls = counter();
        let seen = calls.clone();
        let chained = deferred(value, outer_known, outer_secret).apply(move |v| {
            seen.fetch_add(1, Ordering::SeqCst);
            deferred(v, inner_known, inner_secret)
        });
        let data = futures::executor::block_on(chained.data());
        prop_assert_eq!(calls.load(Ordering::SeqCst), usize::from(outer_known));
        if outer_known {
            prop_assert_eq!(data.known, inner_known);
            prop_assert_eq!(data.secret, outer_secret || inner_secret);
        } else {
            prop_assert!(!data.known);
            prop_assert_eq!(data.secret, outer_secret);
        }
        prop_assert_eq!(data.value.is_some(), data.known);
    }

    #[test]
    fn all_combines_every_bit(items in proptest::collection::vec((any::<i32>(), any::<bool>(), any::<bool>()), 0..8)) {
        let combined = Deferred::all(
            items.iter().map(|&(value, known, secret)| deferred(value, known, secret)),
        );
        let data = futures::executor::block_on(combined.data());
        prop_assert_eq!(data.known, items.iter().all(|&(_, known, _)| known));
        prop_assert_eq!(data.secret, items.iter().any(|&(_, _, secret)| secret));
        if data.known {
            let values: Vec<i32> = items.iter().map(|&(value, _, _)| value).collect();
            prop_assert_eq!(data.value, Some(values));
        }
    }
}
