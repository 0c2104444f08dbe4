//! Rule registry: the Space → Group → Rule hierarchy operators edit.
//!
//! - `types`: entities, mutation inputs and `RegistryError`
//! - `core`: `RuleRegistry`, the single writer that validates, persists and
//!   schedules route refreshes

mod core;
mod types;

#[cfg(test)]
mod tests;

pub use core::RuleRegistry;
pub use types::{
    Group, GroupUpdate, HeaderEntry, RegistryError, Rule, Space, SpaceDetail, SpaceUpdate,
    DEFAULT_RULE_TYPE, METHOD_ALL,
};
