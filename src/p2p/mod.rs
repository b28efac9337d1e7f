pub mod message;
pub mod peer;
pub mod sync;

pub use message::PeerMessage;
pub use peer::{PeerError, PeerRegistry, spawn_peer};
pub use sync::{SyncAction, handle_message};
