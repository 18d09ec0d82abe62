// Public API
pub use hub::{BroadcastHub, Listener, ListenerId};

// Internal modules
mod hub;
