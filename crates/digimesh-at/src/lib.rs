//! DigiMesh Command Mode
//!
//! Configuration of a DigiMesh module over its text command interface,
//! sharing the serial line with API frames.
//!
//! # Protocol Overview
//!
//! - **Entry**: silence for the guard time, then `+++`; the module replies `OK\r`
//! - **Commands**: `AT<XX>[value]\r` get or set a register
//! - **Apply / persist**: `ATAC\r` applies, `ATWR\r` writes to flash
//! - **Exit**: `ATCN\r`, acknowledged with `OK\r`
//!
//! If the module does not answer the first entry, [`CommandModeSession`]
//! probes every standard baud rate until it does.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use digimesh_at::{CommandModeSession, SessionTiming, SystemClock};
//!
//! let mut session = CommandModeSession::new(Arc::new(SystemClock), SessionTiming::default());
//! session.program_registers(&mut port, &[("ID".into(), "7fff".into())], 9600)?;
//! let id = session.read_register(&mut port, "ID")?;
//! ```

mod codec;
mod commands;
mod error;
mod port;
mod session;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use port::*;
pub use session::*;
