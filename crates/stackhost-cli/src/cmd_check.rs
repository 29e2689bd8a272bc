// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Validate a project file and the settings of its stacks.

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use miette::Result;
use stackhost::ProjectSpec;

#[cfg(test)]
#[path = "./cmd_check_test.rs"]
mod cmd_check_test;

/// Validate a stackhost.yaml project file
#[derive(Debug, Args)]
pub struct CmdCheck {
    /// Project file, or a directory to search upwards from
    #[clap(short, long, default_value = ".")]
    file: PathBuf,

    /// Only check the named stack
    #[clap(short, long)]
    stack: Option<String>,

    /// Exit with error when the project defines no stacks
    #[clap(long)]
    strict: bool,
}

impl CmdCheck {
    pub async fn run(&mut self) -> Result<i32> {
        let Some(path) = locate(&self.file) else {
            eprintln!(
                "{} no {} found from {}",
                "Error:".red(),
                stackhost::PROJECT_FILE,
                self.file.display()
            );
            return Ok(1);
        };
        tracing::debug!(path = %path.display(), "checking project");

        let spec = ProjectSpec::load(&path)?;
        spec.validate()?;
        println!("{} {} ({})", "✓".green(), spec.name.bold(), path.display());
        if let Some(description) = &spec.description {
            println!("  {}", description.dimmed());
        }

        let stacks: Vec<&String> = match &self.stack {
            Some(stack) => vec![stack],
            None => spec.stacks.keys().collect(),
        };
        if stacks.is_empty() {
            if self.strict {
                eprintln!("{} the project defines no stacks", "Error:".red());
                return Ok(1);
            }
            println!("  {}", "(no stacks)".dimmed());
            return Ok(0);
        }

        for stack in stacks {
            let settings = spec.settings(stack)?;
            let secrets = settings
                .config
                .keys()
                .filter(|key| settings.config.is_secret(key))
                .count();
            println!(
                "  {} {} [{} value(s), {} secret]",
                "-".dimmed(),
                stack.cyan(),
                settings.config.keys().count(),
                secrets.to_string().yellow()
            );
        }
        Ok(0)
    }
}

/// The project file named by `path`, searching upwards for directories.
fn locate(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let dir = std::fs::canonicalize(path).ok()?;
    ProjectSpec::find(&dir)
}
