// Store adapter contract and its supporting pieces
pub mod cache;                 // LRU cache and last-known snapshot slots
pub mod id_generator;          // Chronologically sortable push keys
pub mod memory_store;          // In-process RemoteStore
pub mod security;              // Identity and admin gating
pub mod subscription;          // Snapshot streams
pub mod traits;                // RemoteStore / AuthProvider seams

pub use cache::{Cache, SnapshotCache};
pub use id_generator::PushKeyGenerator;
pub use memory_store::MemoryStore;
pub use security::{AdminGate, AllowListAuthProvider, Identity, StaticAuthProvider};
pub use subscription::{Snapshot, Subscription, SubscriptionId};
pub use traits::{AuthProvider, RemoteStore};
