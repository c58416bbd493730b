use std::path::PathBuf;

use alloy::primitives::{Address, Bytes};
use clap::{Parser, Subcommand};

/// Command line interface definition
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Network preset or custom network name
    #[arg(long, short, global = true)]
    pub network: Option<String>,

    /// JSON-RPC endpoint override
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Directory searched for compiler artifacts
    #[arg(long, short, global = true, env = "ARTIFACTS_DIR", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Deployment manifest path, `deployments/<network>.json` by default
    #[arg(long, short, global = true)]
    pub manifest: Option<PathBuf>,

    /// Log file directory override
    #[arg(long, short, global = true)]
    pub log_path: Option<String>,
}

impl Cli {
    pub fn manifest_path(&self, network: &str) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| default_manifest_path(network, None))
    }
}

/// `deployments/<network>.json`, or `deployments/<network>-<suffix>.json`
/// for deployments kept apart from the main one.
pub fn default_manifest_path(network: &str, suffix: Option<&str>) -> PathBuf {
    let file = match suffix {
        Some(suffix) => format!("{}-{}.json", network, suffix),
        None => format!("{}.json", network),
    };
    PathBuf::from("deployments").join(file)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy collateral, factory, token pair and protocol, then register it
    Deploy {
        /// Reuse steps recorded in the manifest
        #[arg(long)]
        resume: bool,
    },
    /// Deploy a protocol for an existing token pair and register it
    RegisterProtocol,
    /// Submit a deployed contract for explorer source verification
    Verify {
        /// Artifact name of the contract
        #[arg(long)]
        contract: String,
        /// Deployed address, `IMPLEMENTATION_ADDRESS` by default
        #[arg(long)]
        address: Option<Address>,
        /// ABI encoded constructor arguments
        #[arg(long)]
        constructor_args: Option<Bytes>,
    },
    /// Upgrade the protocol proxy to a new implementation
    Upgrade {
        /// Artifact name of the new implementation
        #[arg(long, default_value = "VolmexProtocol")]
        contract: String,
    },
    /// Deploy a new implementation and propose the upgrade to the multisig
    ProposeUpgrade {
        /// Artifact name of the new implementation
        #[arg(long, default_value = "VolmexProtocol")]
        contract: String,
        /// Write the proposal to this file instead of posting it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Transfer proxy admin ownership to the multisig
    TransferOwnership,
    /// Transfer protocol ownership and token admin roles to the multisig
    TransferRoles,
    /// Replay a position token's transfers and compare with its total supply
    AuditSupply {
        /// Token address
        token: Address,
        /// First block to replay
        #[arg(long, default_value_t = 0)]
        from_block: u64,
    },
    /// Print the deployment manifest and the live protocol state
    Show,
}
