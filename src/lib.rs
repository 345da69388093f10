//! ledger-e2e - End-to-end test harness for multi-node ledger networks
//!
//! The harness builds client command lines ([`tx`]), runs them inside
//! validator contexts ([`exec`]), classifies the outcome ([`validate`]) and
//! waits for eventually-consistent state ([`poll`]). [`harness::Harness`] ties
//! these together over a read-only [`topology::ChainTopology`].

pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod harness;
pub mod poll;
pub mod query;
pub mod relayer;
pub mod testing;
pub mod topology;
pub mod tx;
pub mod validate;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use exec::{ExecutionRequest, ExecutionResult, Executor};
pub use harness::{Harness, Target};
pub use query::{ChainQuery, TxRecord};
pub use topology::{Account, ChainTopology};
pub use tx::Coin;
pub use validate::Validator;
