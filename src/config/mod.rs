//! Monitor Configuration Module
//!
//! Every tunable constant of the analytics engine, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `EDGE_PHM_CONFIG` environment variable (path to TOML file)
//! 2. `edge_phm.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! ```ignore
//! let config = MonitorConfig::load();
//! let engine = MonitorEngine::new(&config);
//! ```
//!
//! The configuration is passed explicitly to the engine; there is no global
//! instance, so several engines with different settings can coexist in one
//! process (and in one test binary).

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;
