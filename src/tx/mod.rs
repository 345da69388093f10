//! Transaction command composition and coin amounts

pub mod builder;
mod coin;

pub use builder::{
    build, with_flag, without_flag, CommandTemplate, FlagOverride, OptionSet, Positional,
};
pub use coin::Coin;
