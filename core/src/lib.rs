//! LendLens core: aggregation, pacing, insight and funnel derivation for
//! the merchant-lending analytics dashboard.
//!
//! Everything here is a pure function of loaded snapshot rows plus static
//! configuration. Only `loader` and `config` touch the filesystem.

pub mod aggregation;
pub mod concentration;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod funnel;
pub mod insight;
pub mod loader;
pub mod pacing;
pub mod prior_period;
pub mod rows;
pub mod trend;
pub mod types;
pub mod view_state;
