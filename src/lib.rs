//! # rsext - WebSocket-family extension negotiation
//!
//! `rsext` manages protocol extensions for framed bidirectional messaging
//! protocols: the negotiation header grammar, RSV bit reservation, and the
//! per-message processing pipeline.
//!
//! ## Features
//!
//! - **Strict header grammar** with full quoting and duplicate-parameter
//!   handling
//! - **Composable negotiation** of independently written extensions with
//!   RSV conflict resolution
//! - **Direction-aware pipeline** applying sessions in server-decided
//!   order, reversed for incoming messages
//! - **Sans-I/O design**: no transport, no framing, no blocking
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rsext::ExtensionManager;
//!
//! let mut manager = ExtensionManager::new();
//! manager.add(Box::new(my_extension));
//!
//! // Client role:
//! if let Some(offer) = manager.generate_offer() {
//!     // send offer in the handshake, then:
//!     manager.activate(&response_header)?;
//! }
//!
//! let outgoing = manager.process_outgoing_message(message)?;
//! ```

pub mod error;
pub mod extension;
pub mod header;
pub mod manager;
pub mod message;

pub use error::{Error, Result};
pub use extension::{Extension, RsvBits, Session, PERMESSAGE};
pub use header::{parse_header, serialize_params, Params, ParsedOffers, Value};
pub use manager::ExtensionManager;
pub use message::Message;
