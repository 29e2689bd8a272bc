// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use rstest::rstest;

use super::*;

#[derive(Parser)]
struct TestOpt {
    #[clap(flatten)]
    logging: Logging,
}

fn logging(args: &[&str]) -> Logging {
    TestOpt::try_parse_from(std::iter::once("stackhost").chain(args.iter().copied()))
        .expect("Should parse logging flags")
        .logging
}

#[rstest]
#[case::default(&[], "warn,stackhost=warn,stackhost_cli=warn")]
#[case::verbose(&["-v"], "warn,stackhost=info,stackhost_cli=info")]
#[case::very_verbose(&["-vvv"], "warn,stackhost=trace,stackhost_cli=trace")]
#[case::quiet(&["--quiet"], "error,stackhost=error,stackhost_cli=error")]
#[case::explicit(&["-v", "--log-filter", "stackhost::deployment=trace"], "stackhost::deployment=trace")]
#[case::blank_filter(&["-vv", "--log-filter", " "], "warn,stackhost=debug,stackhost_cli=debug")]
fn test_directives(#[case] args: &[&str], #[case] expected: &str) {
    assert_eq!(logging(args).directives(), expected);
}

#[rstest]
fn test_directives_are_valid_filters() {
    for args in [&[][..], &["-v"], &["-vvvv"], &["-q"]] {
        let directives = logging(args).directives();
        EnvFilter::try_new(&directives).expect("Should build a filter");
    }
}

#[rstest]
fn test_quiet_conflicts_with_verbose() {
    let result = TestOpt::try_parse_from(["stackhost", "-q", "-v"]);
    assert!(result.is_err());
}

#[rstest]
fn test_compact_format() {
    assert_eq!(logging(&["--log-format", "compact"]).log_format, LogFormat::Compact);
    assert_eq!(logging(&[]).log_format, LogFormat::Full);
}
