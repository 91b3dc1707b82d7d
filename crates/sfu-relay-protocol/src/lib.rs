//! Shared protocol definitions for the SFU signaling relay

pub mod messages;
pub mod sfu;
pub mod types;

pub use messages::{ClientMessage, ServerMessage};
pub use sfu::{SfuMessage, SfuRequest};
pub use types::*;
