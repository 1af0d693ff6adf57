//! Atomic editor for the EXAConf cluster configuration file.
//!
//! The document model lives in the `exa-config` crate; this crate holds the
//! mutation operations used by the `exaconf` command line tool.

pub mod job;
pub mod ops;
