//! DigiMesh API Frame Protocol
//!
//! Types and utilities for talking to a DigiMesh radio module in API mode.
//! Every message on the serial line is a frame:
//!
//! ```text
//! [0x7E][length: u16 BE][frame data: length bytes][checksum: u8]
//! ```
//!
//! where the frame data starts with a frame type byte. In API mode 2 the
//! reserved bytes `0x7E 0x7D 0x11 0x13` are escaped after the delimiter.
//!
//! - **Requests** (host → module): local/remote AT commands, transmit and
//!   explicit transmit requests. See [`Request`].
//! - **Responses** (module → host): AT responses, received packets, transmit
//!   status and route information. See [`Response`].
//!
//! Outbound constructors read the destination and API mode from
//! [`ModuleRegisters`]; decoding a local AT response writes the returned value
//! back into it.
//!
//! # Example
//!
//! ```rust,ignore
//! use digimesh_api::{ApiMode, FrameReassembler, LocalAtCommand, ModuleRegisters, ReadOutcome, Request};
//!
//! let mut registers = ModuleRegisters::new();
//! let query = Request::from(LocalAtCommand::new(&registers, "ID", None, 0x52));
//! port.write_all(&query.to_bytes()?)?;
//!
//! let mut reassembler = FrameReassembler::new();
//! if let ReadOutcome::Frames(batch) = reassembler.feed(&received, ApiMode::ApiEscaped, &mut registers) {
//!     for frame in batch.frames {
//!         println!("{}", frame);
//!     }
//! }
//! ```

mod codec;
mod constants;
mod dispatch;
mod error;
mod escape;
mod frame;
mod registers;
mod requests;
mod responses;
mod types;

pub use codec::*;
pub use constants::*;
pub use dispatch::*;
pub use error::*;
pub use escape::*;
pub use frame::*;
pub use registers::*;
pub use requests::*;
pub use responses::*;
pub use types::*;
