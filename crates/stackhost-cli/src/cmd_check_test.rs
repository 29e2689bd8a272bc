// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

const PROJECT: &str = r#"
api: stackhost/v0
name: web
stacks:
  dev:
    config:
      aws:region: us-west-2
      token: abc
    secret_keys: [token]
"#;

fn check(file: &Path, stack: Option<&str>, strict: bool) -> CmdCheck {
    CmdCheck {
        file: file.to_path_buf(),
        stack: stack.map(String::from),
        strict,
    }
}

#[rstest]
#[tokio::test]
async fn test_check_finds_project_in_parent() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(stackhost::PROJECT_FILE), PROJECT).unwrap();
    let nested = tmp.path().join("src");
    std::fs::create_dir(&nested).unwrap();

    let code = check(&nested, None, true).run().await.expect("Should check");
    assert_eq!(code, 0);
}

#[rstest]
#[tokio::test]
async fn test_check_unknown_stack_fails() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join(stackhost::PROJECT_FILE);
    std::fs::write(&file, PROJECT).unwrap();

    let result = check(&file, Some("prod"), false).run().await;
    assert!(result.is_err());
}

#[rstest]
#[case(false, 0)]
#[case(true, 1)]
#[tokio::test]
async fn test_check_without_stacks(#[case] strict: bool, #[case] expected: i32) {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join(stackhost::PROJECT_FILE);
    std::fs::write(&file, "api: stackhost/v0\nname: web\n").unwrap();

    let code = check(&file, None, strict).run().await.expect("Should check");
    assert_eq!(code, expected);
}

#[rstest]
#[tokio::test]
async fn test_check_missing_project() {
    let tmp = TempDir::new().unwrap();
    let code = check(tmp.path(), None, false).run().await.expect("Should report");
    assert_eq!(code, 1);
}
