// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! stackhost - diagnostic command line for the stackhost language host

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_check;
mod cmd_decode;
mod cmd_urn;
mod logging;

use cmd_check::CmdCheck;
use cmd_decode::CmdDecode;
use cmd_urn::CmdUrn;
use logging::Logging;

#[derive(Parser)]
#[clap(
    name = "stackhost",
    about = "Inspect wire values, URNs and project files",
    version,
    long_about = "Diagnostic tools for programs that declare resources through stackhost"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a JSON wire value
    Decode(CmdDecode),

    /// Build or take apart a resource URN
    Urn(CmdUrn),

    /// Validate a stackhost.yaml project file
    Check(CmdCheck),
}

impl Command {
    async fn run(self) -> Result<i32> {
        match self {
            Self::Decode(mut cmd) => cmd.run().await,
            Self::Urn(mut cmd) => cmd.run().await,
            Self::Check(mut cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Opt { logging, cmd } = Opt::parse();
    logging.init()?;
    tracing::debug!(level = %logging.level(), "logging configured");
    let code = cmd.run().await?;
    std::process::exit(code);
}
