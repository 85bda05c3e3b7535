//! The `/config` pipeline: discovery, serial collection, reconciliation,
//! mass configuration and packaging.

pub mod configure;
pub mod discovery;
pub mod fanout;
pub mod inventory;
pub mod package;
pub mod run;
pub mod serials;
pub mod workspace;

pub use run::{ConfigRun, RunSettings};
