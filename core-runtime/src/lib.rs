//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the Aria player core:
//! - Event bus used by every other crate to notify observers
//! - Logging and tracing bootstrap
//! - Core configuration
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other workspace members
//! depend on. It establishes the logging conventions and the event
//! broadcasting mechanism used throughout the system. It deliberately has no
//! knowledge of playback, storage or networking: those crates depend on this
//! one, never the other way around.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
