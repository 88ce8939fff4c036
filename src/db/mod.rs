//! Storage layer: local SQLite store and the remote document store.

pub mod firestore;
pub mod local;
pub mod memory;
pub mod remote;

pub use firestore::FirestoreRemote;
pub use local::LocalStore;
pub use memory::MemoryRemote;
pub use remote::{RemoteStore, SharedRemote, TimeoutRemote};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Parent of the per-user `movies` subcollection
    pub const FAVORITES: &str = "favorites";
    pub const MOVIES: &str = "movies";
}
