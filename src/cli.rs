//! CLI struct definitions for the `diamond` command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "diamond",
    version = env!("CARGO_PKG_VERSION"),
    about = "Route selectors to independently deployed facets through one entry point."
)]
pub(crate) struct Cli {
    /// Store directory holding the diamond database and audit log.
    #[clap(long, global = true, default_value = crate::core::store::DEFAULT_STORE_DIR)]
    pub root: PathBuf,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the entry point from a deploy manifest (diamond.toml)
    Deploy {
        #[clap(long, default_value = "diamond.toml")]
        config: PathBuf,
        /// Write the deployment report to this path.
        #[clap(long)]
        out: Option<PathBuf>,
        /// Name recorded in the audit log.
        #[clap(long, default_value = "deployer")]
        actor: String,
    },

    /// Apply a cut plan (JSON) as the given caller
    Cut {
        /// Caller address, or a label hashed into one.
        #[clap(long)]
        caller: String,
        #[clap(long)]
        plan: PathBuf,
    },

    /// Add an init route, invoke it once, and remove it
    SafeInit {
        #[clap(long)]
        caller: String,
        /// Module spec (JSON) to deploy before running the init.
        #[clap(long)]
        spec: Option<PathBuf>,
        /// Init module address; defaults to the spec's address.
        #[clap(long)]
        target: Option<String>,
        /// Init selector or signature; defaults to the module's only selector.
        #[clap(long)]
        selector: Option<String>,
        /// Hex payload passed to the init call.
        #[clap(long, default_value = "0x")]
        payload: String,
    },

    /// Dispatch a call through the entry point
    Call {
        #[clap(long)]
        caller: String,
        /// Selector or signature.
        #[clap(long)]
        selector: String,
        #[clap(long, default_value = "0x")]
        payload: String,
    },

    /// Inspect current routes
    Loupe(LoupeCli),

    /// Print the base storage slot of a namespace
    Slot {
        name: String,
        /// Print the slots of these fields instead of the base.
        #[clap(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Print the selector of one or more function signatures
    Selector { signatures: Vec<String> },

    /// Show the most recent audit events
    Audit {
        #[clap(long, default_value = "20")]
        last: usize,
    },
}

impl Command {
    /// Name reported in the JSON envelope.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Cut { .. } => "cut",
            Command::SafeInit { .. } => "safe-init",
            Command::Call { .. } => "call",
            Command::Loupe(_) => "loupe",
            Command::Slot { .. } => "slot",
            Command::Selector { .. } => "selector",
            Command::Audit { .. } => "audit",
        }
    }
}

#[derive(clap::Args, Debug)]
pub(crate) struct LoupeCli {
    #[clap(subcommand)]
    pub command: LoupeCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LoupeCommand {
    /// Every module with its selectors
    Facets,
    /// Selectors routed to one module
    Selectors {
        #[clap(long)]
        facet: String,
    },
    /// Module answering one selector
    Lookup {
        #[clap(long)]
        selector: String,
    },
}
