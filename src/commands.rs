//! CLI command definitions
//!
//! Defines the clap commands for the ledger-e2e CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run YAML test scenarios against the configured networks
    Test {
        /// Paths to the YAML test scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Run scenarios concurrently (they must use disjoint accounts)
        #[arg(long)]
        parallel: bool,
    },

    /// Send tokens and wait until the transaction is committed
    Send {
        /// Network (chain id)
        network: String,

        /// Sender role, or address:<addr>
        from: String,

        /// Recipient role, or address:<addr>
        to: String,

        /// Amount, e.g. 1000stake
        amount: String,

        /// Validator index to submit through
        #[arg(long, default_value_t = 0)]
        validator: usize,

        /// Expect the transaction to fail
        #[arg(long)]
        expect_error: bool,
    },

    /// Send the same amount to several recipients in one transaction
    MultiSend {
        /// Network (chain id)
        network: String,

        /// Sender role, or address:<addr>
        from: String,

        /// Amount per recipient, e.g. 1000stake
        amount: String,

        /// Recipient roles, or address:<addr>
        #[arg(required = true)]
        to: Vec<String>,

        /// Validator index to submit through
        #[arg(long, default_value_t = 0)]
        validator: usize,

        /// Expect the transaction to fail
        #[arg(long)]
        expect_error: bool,
    },

    /// Query an account balance
    Balance {
        /// Network (chain id)
        network: String,

        /// Account role, or address:<addr>
        account: String,

        /// Denomination (default: configured denom)
        #[arg(long)]
        denom: Option<String>,

        /// Validator index to query
        #[arg(long, default_value_t = 0)]
        validator: usize,
    },

    /// Latest block height reported by a validator
    Height {
        /// Network (chain id)
        network: String,

        /// Validator index
        #[arg(long, default_value_t = 0)]
        validator: usize,
    },

    /// Show the configured networks, validators and accounts
    Topology,

    /// Classify relayer JSON output from a file or stdin
    RelayerScan {
        /// Log file, or '-' for stdin
        input: String,
    },
}
