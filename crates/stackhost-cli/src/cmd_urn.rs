// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `stackhost urn` command.

use clap::Args;
use colored::Colorize;
use miette::Result;
use stackhost::urn::{create_urn, Urn};

/// Build a URN from its parts, or take an existing one apart
#[derive(Debug, Args)]
pub struct CmdUrn {
    /// The resource type token, or a full URN with --parse
    #[clap(value_name = "TYPE")]
    type_: String,

    /// The resource name
    #[clap(required_unless_present = "parse")]
    name: Option<String>,

    /// URN of the parent resource
    #[clap(long)]
    parent: Option<String>,

    /// Project the resource belongs to
    #[clap(long, env = "STACKHOST_PROJECT", default_value = "project")]
    project: String,

    /// Stack the resource belongs to
    #[clap(long, env = "STACKHOST_STACK", default_value = "dev")]
    stack: String,

    /// Treat the first argument as a URN and show its parts
    #[clap(long)]
    parse: bool,
}

impl CmdUrn {
    pub async fn run(&mut self) -> Result<i32> {
        if self.parse {
            let urn: Urn = self.type_.parse()?;
            println!("{:>10} {}", "stack:".bold(), urn.stack);
            println!("{:>10} {}", "project:".bold(), urn.project);
            println!("{:>10} {}", "type:".bold(), urn.type_token().cyan());
            if let Some(parent) = urn.parent_type() {
                println!("{:>10} {}", "parent:".bold(), parent);
            }
            println!("{:>10} {}", "name:".bold(), urn.name.green());
            return Ok(0);
        }

        if let Some(parent) = &self.parent {
            // create_urn drops parents it cannot parse
            parent.parse::<Urn>()?;
        }
        let name = self.name.as_deref().unwrap_or_default();
        println!(
            "{}",
            create_urn(
                name,
                &self.type_,
                self.parent.as_deref(),
                &self.project,
                &self.stack
            )
        );
        Ok(0)
    }
}
