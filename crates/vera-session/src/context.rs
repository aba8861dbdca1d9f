//! SessionContext - everything one session participant needs.
//!
//! A window or the launcher never reaches for process-wide globals. It gets a
//! `SessionContext` holding its bus endpoint, the lock storage, the clock and
//! its termination hooks. Tests build contexts around an in-memory bus,
//! [`MemoryLockStore`] and [`ManualClock`](crate::clock::ManualClock).
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │     SessionTransport     │
//!                  │   (one per session)      │
//!                  └────────────┬─────────────┘
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!   ┌────────────────┐ ┌────────────────┐ ┌────────────────┐
//!   │ SessionContext │ │ SessionContext │ │ SessionContext │
//!   │   (launcher)   │ │   (primary)    │ │  (secondary)   │
//!   │ endpoint+hooks │ │ endpoint+hooks │ │ endpoint+hooks │
//!   └────────────────┘ └────────────────┘ └────────────────┘
//! ```

use std::sync::Arc;

use crate::bus::{BusEndpoint, LocalBus, SessionTransport};
use crate::clock::{Clock, SystemClock};
use crate::lock::{LockStore, MemoryLockStore};
use crate::termination::TerminationHooks;

/// Configuration for building a SessionContext.
#[derive(Default)]
pub struct SessionContextBuilder {
    transport: Option<Arc<dyn SessionTransport>>,
    lock_store: Option<Arc<dyn LockStore>>,
    clock: Option<Arc<dyn Clock>>,
    termination: Option<Arc<TerminationHooks>>,
}

impl SessionContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join an existing session transport.
    pub fn transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a specific lock storage (file-backed in production).
    pub fn lock_store(mut self, store: Arc<dyn LockStore>) -> Self {
        self.lock_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use existing termination hooks (for sharing with a signal handler).
    pub fn termination(mut self, hooks: Arc<TerminationHooks>) -> Self {
        self.termination = Some(hooks);
        self
    }

    /// Build the SessionContext. Unset parts get a fresh local bus, an
    /// in-memory lock, the system clock and empty hooks.
    pub fn build(self) -> SessionContext {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(LocalBus::new()));
        let lock_store = self
            .lock_store
            .unwrap_or_else(|| Arc::new(MemoryLockStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let termination = self
            .termination
            .unwrap_or_else(|| Arc::new(TerminationHooks::new()));

        SessionContext {
            endpoint: BusEndpoint::new(Arc::clone(&transport)),
            transport,
            lock_store,
            clock,
            termination,
        }
    }
}

/// One participant's view of the session.
///
/// Cloning shares the same endpoint identity; use [`SessionContext::sibling`]
/// for a new participant.
#[derive(Clone)]
pub struct SessionContext {
    transport: Arc<dyn SessionTransport>,
    /// This participant's bus endpoint.
    pub endpoint: BusEndpoint,
    /// Storage for the launcher singleton flag.
    pub lock_store: Arc<dyn LockStore>,
    pub clock: Arc<dyn Clock>,
    /// Hooks run when this participant's process terminates.
    pub termination: Arc<TerminationHooks>,
}

impl SessionContext {
    pub fn builder() -> SessionContextBuilder {
        SessionContextBuilder::new()
    }

    /// Another participant in the same session.
    ///
    /// Shares the transport, lock storage and clock; gets its own endpoint
    /// and its own termination hooks.
    pub fn sibling(&self) -> SessionContext {
        SessionContext::builder()
            .transport(Arc::clone(&self.transport))
            .lock_store(Arc::clone(&self.lock_store))
            .clock(Arc::clone(&self.clock))
            .build()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::builder().build()
    }
}
