//! # vera-session
//!
//! Session coordination for a multi-window VERA session.
//!
//! One browser-less process (the launcher) owns the session: it holds the
//! singleton lock, tracks which windows are alive from their heartbeats, opens
//! missing windows and pushes the signed-in user's credential to them. Every
//! window runs a small lifecycle that announces itself, heartbeats and listens
//! for session updates.
//!
//! ## Key Concepts
//!
//! - **Bus**: broadcast channel every participant publishes to and listens on
//! - **Role**: what a window is (`primary`, `secondary`) or `launcher`
//! - **Registry**: the launcher's map of role to last time it was heard from
//! - **Lock**: durable flag making sure only one launcher coordinates

pub mod bus;
pub mod clock;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod identity;
pub mod lifecycle;
pub mod lock;
pub mod logging;
pub mod paths;
pub mod protocol;
pub mod registry;
mod schedule;
pub mod spawner;
pub mod termination;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use bus::{BusEndpoint, LocalBus, SessionTransport, Subscription};
pub use config::{CoordinatorConfig, SessionSettings};
pub use context::SessionContext;
pub use coordinator::{activate, Activation, CoordinatorError, CoordinatorHandle};
pub use identity::{IdentityProvider, StaticIdentity, UserIdentity};
pub use lifecycle::{WindowHandle, WindowSession};
pub use lock::{FileLockStore, LockStore, MemoryLockStore};
pub use protocol::{Role, SessionMessage};
pub use registry::RegistryEntry;
pub use spawner::{WindowSpawner, WindowTarget};
