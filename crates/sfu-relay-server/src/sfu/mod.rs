//! Upstream sessions to the SFU
//!
//! Every client connection gets its own long-lived control socket to the SFU.
//! Media never passes through here; only signaling frames do.

mod session;

pub use session::{SessionState, SfuSession};
