//! Command-line driver for the vigil protocol: configuration loading, logging
//! setup and JSON scripts replayed against an in-memory deployment.

pub mod config;
pub mod logging;
pub mod script;

pub use config::{LoggingConfig, NodeConfig, SimulationConfig, DEFAULT_CONFIG_FILE};
pub use script::{Script, ScriptReport, ScriptRunner, Step, StepOutcome};
