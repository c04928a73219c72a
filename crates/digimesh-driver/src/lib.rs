//! DigiMesh Module Driver
//!
//! Drives a DigiMesh radio module attached to a serial port: programs it in
//! command mode at startup, then exchanges API frames with it.
//!
//! # Overview
//!
//! - [`MeshModule`]: the facade. Register access, data transmission,
//!   discovery, trace route and link quality tests.
//! - [`ReadLoop`]: background thread feeding received bytes through the
//!   reassembler and forwarding the decoded frames over a channel.
//! - [`ModuleEvent`]: what a decoded frame means to an application.
//! - [`ModuleConfig`]: YAML configuration.
//! - [`RawLog`]: per-session log of every frame sent and received.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use digimesh_driver::{MeshModule, ModuleConfig, ModuleEvent, ReadLoop};
//! use digimesh_api::{Address64, ReadOutcome};
//!
//! let module = Arc::new(MeshModule::open(ModuleConfig::from_file("digimesh.yaml")?)?);
//! let (reader, frames) = ReadLoop::spawn(module.clone(), module.config().poll_interval());
//!
//! module.send_text(&Address64::parse("0013a200", "41526b9c")?, "hello")?;
//! for outcome in frames.iter() {
//!     if let ReadOutcome::Frames(batch) = outcome {
//!         for event in batch.frames.iter().filter_map(ModuleEvent::from_frame) {
//!             println!("{}", event);
//!         }
//!     }
//! }
//! reader.stop();
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod module;
pub mod raw_log;
pub mod read_loop;
pub mod serial;
pub mod telemetry;

pub use config::{ModuleConfig, TimingConfig, TRACKED_REGISTERS};
pub use error::{DriverError, DriverResult};
pub use events::ModuleEvent;
pub use module::{MeshModule, NeighborTarget, DEFAULT_LINK_TEST_ITERATIONS, DEFAULT_LINK_TEST_PAYLOAD};
pub use raw_log::RawLog;
pub use read_loop::ReadLoop;
pub use serial::{find_port, SerialPortChannel};
