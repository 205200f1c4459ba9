//! plughost core - platform-independent plugin launching and output relaying
//!
//! This crate provides the stream relay that forwards a plugin's output to
//! the host, the launcher state machine, and the traits platform crates and
//! RPC layers implement.

mod config;
mod dispatch;
mod error;
mod launcher;
mod process;
mod process_manager_trait;
pub mod relay;
mod stdio;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use launcher::*;
pub use process::*;
pub use process_manager_trait::*;
pub use stdio::*;
