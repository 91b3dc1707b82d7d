//! Shared registries for connections, rooms and peer/stream bindings.
//!
//! Each registry owns its lock; callers only go through the methods here and
//! no lock is held across network I/O.

mod connections;
mod rooms;
mod streams;

pub use connections::ConnectionRegistry;
pub use rooms::RoomRegistry;
pub use streams::PeerStreamIndex;
