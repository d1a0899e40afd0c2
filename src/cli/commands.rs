//! CLI command definitions

use clap::{Parser, Subcommand};
use tollgate::gate::PolicyMode;

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(about = "Bearer-token admission gateway for WebSocket channels", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Token signing secret
    #[arg(long, env = "TOLLGATE_SECRET", global = true)]
    pub secret: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:3000", env = "TOLLGATE_BIND")]
        bind: String,

        /// Lifetime of issued credentials, in seconds
        #[arg(long, default_value_t = 3600, env = "TOLLGATE_TTL")]
        ttl: u64,

        /// Namespace admitted under strict policy (can be repeated)
        ///
        /// Examples:
        ///   tollgate serve --strict secret --strict area51
        #[arg(long = "strict")]
        strict: Vec<String>,

        /// Namespace admitted under permissive policy (can be repeated)
        #[arg(long = "permissive")]
        permissive: Vec<String>,

        /// Policy for the default namespace: strict or permissive
        #[arg(long, default_value = "permissive")]
        default_policy: PolicyMode,
    },

    /// Mint and inspect credentials
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a credential signed with the configured secret
    Issue {
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },

    /// Decode and verify a credential
    Inspect {
        /// Credential string, with or without the Bearer prefix
        token: String,
    },
}
