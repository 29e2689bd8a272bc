// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `stackhost decode` command.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use stackhost::{Deserializer, WireValue};

/// Decode a JSON wire value and show what a program would see
#[derive(Debug, Args)]
pub struct CmdDecode {
    /// The wire value as JSON, read from --file or stdin when omitted
    value: Option<String>,

    /// Read the wire value from PATH ('-' for stdin)
    #[clap(short, long, conflicts_with = "value")]
    file: Option<PathBuf>,
}

impl CmdDecode {
    pub async fn run(&mut self) -> Result<i32> {
        let json = self.read_input()?;
        let wire = WireValue::from_json(&json)?;
        let decoded = Deserializer::default().deserialize(&wire)?;

        match &decoded.value {
            Some(value) => println!("{value}"),
            None => println!("{}", "<unknown>".yellow()),
        }
        println!();
        println!("{:>10} {}", "known:".bold(), flag(decoded.known));
        println!("{:>10} {}", "secret:".bold(), flag(decoded.secret));
        if !decoded.resources.is_empty() {
            println!("{:>10}", "resources:".bold());
            for resource in decoded.resources.iter() {
                let urn = resource.urn().value().await.unwrap_or_default();
                println!("  - {}", urn.cyan());
            }
        }
        Ok(0)
    }

    fn read_input(&self) -> Result<String> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        match self.file.as_deref() {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to read {}", path.display())),
            _ => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .into_diagnostic()
                    .wrap_err("Failed to read stdin")?;
                Ok(buf)
            }
        }
    }
}

fn flag(value: bool) -> colored::ColoredString {
    match value {
        true => "yes".green(),
        false => "no".red(),
    }
}
