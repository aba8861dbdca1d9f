//! Session message bus.
//!
//! A one-to-many, fire-and-forget broadcast scoped to a session. Every
//! participant (a window or the launcher) talks through its own
//! [`BusEndpoint`]; a message published from an endpoint reaches every other
//! endpoint's subscribers but never its own.
//!
//! Delivery is at-most-once with no acknowledgement or persistence: a message
//! published before anyone listens is simply lost, and a subscriber that falls
//! more than the channel capacity behind skips the overflow.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vera_session::bus::{BusEndpoint, LocalBus};
//! use vera_session::protocol::{window_ready, Role};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = Arc::new(LocalBus::new());
//! let launcher = BusEndpoint::new(bus.clone());
//! let window = BusEndpoint::new(bus);
//!
//! let _sub = launcher.subscribe(|inbound| println!("{inbound:?}"));
//! window.publish(&window_ready(Role::Primary));
//! # }
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::{Frame, Inbound, SessionMessage};

/// Default channel capacity for the bus.
/// Subscribers lagging further than this lose the oldest messages.
const DEFAULT_CAPACITY: usize = 1024;

/// Identity of one bus participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(pub String);

impl EndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame plus the endpoint that published it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: EndpointId,
    pub frame: Frame,
}

/// Broadcast transport underneath the bus.
///
/// Implementations must fan every envelope out to all current listeners and
/// must never block the sender.
pub trait SessionTransport: Send + Sync {
    /// Hand an envelope to every current listener. Never fails; with no
    /// listeners the envelope is dropped.
    fn send(&self, envelope: Envelope);

    /// Start listening. Only envelopes sent after this call are received.
    fn listen(&self) -> broadcast::Receiver<Envelope>;
}

/// In-memory transport backed by a tokio broadcast channel.
pub struct LocalBus {
    sender: broadcast::Sender<Envelope>,
}

impl LocalBus {
    /// Create a new LocalBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new LocalBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of live listeners across all endpoints.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTransport for LocalBus {
    fn send(&self, envelope: Envelope) {
        if self.sender.send(envelope).is_err() {
            log::debug!("No listeners on session bus, message dropped");
        }
    }

    fn listen(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }
}

/// One participant's handle on the bus.
#[derive(Clone)]
pub struct BusEndpoint {
    id: EndpointId,
    transport: Arc<dyn SessionTransport>,
}

impl BusEndpoint {
    /// Join the bus under a fresh endpoint identity.
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            id: EndpointId::new(),
            transport,
        }
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    /// Publish a message to every other endpoint. Fire-and-forget.
    pub fn publish(&self, message: &SessionMessage) {
        let frame = match Frame::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Failed to encode {} message: {}", message.tag(), e);
                return;
            }
        };

        self.transport.send(Envelope {
            origin: self.id.clone(),
            frame,
        });
    }

    /// Register a handler for every message other endpoints publish from now on.
    ///
    /// The handler runs on a spawned task, one message at a time, in the order
    /// the transport delivers them. A handler that panics loses that message
    /// only; later messages are still delivered. Must be called inside a
    /// tokio runtime.
    pub fn subscribe<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(Inbound) + Send + 'static,
    {
        let mut receiver = self.transport.listen();
        let own_id = self.id.clone();
        let active = Arc::new(AtomicBool::new(true));
        let task_active = Arc::clone(&active);

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if envelope.origin == own_id {
                            continue;
                        }
                        if !task_active.load(Ordering::SeqCst) {
                            break;
                        }
                        let inbound = envelope.frame.decode();
                        if panic::catch_unwind(AssertUnwindSafe(|| handler(inbound))).is_err() {
                            log::error!(
                                "Session bus handler on {} panicked, message dropped",
                                own_id
                            );
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!(
                            "Session bus subscriber on {} lagged, {} messages lost",
                            own_id,
                            missed
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            active,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Disposer for a bus subscription. Unsubscribes on drop.
pub struct Subscription {
    active: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Stop delivery. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ============================================================================
// TESTS
// ============================================================================
