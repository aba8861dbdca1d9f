//! Launcher coordinator.
//!
//! Runs in exactly one process per session. On activation it:
//!
//! 1. Claims the launcher lock, or stops with [`Activation::AlreadyRunning`].
//! 2. Registers a termination hook that clears the lock and ends the session.
//! 3. Folds `WindowReady`/`WindowHeartbeat`/`WindowClosed` from the bus into a
//!    [`LivenessRegistry`], pushing `SessionInfo` to windows that (re)appear.
//! 4. Runs a watchdog that evicts windows not heard from within the liveness
//!    threshold.
//! 5. Polls the identity provider and rebroadcasts a changed credential.
//!
//! Windows are opened through a [`WindowSpawner`], only for roles with no live
//! registry entry.
//!
//! # Per-role state
//!
//! ```text
//!  UNKNOWN ──ready/heartbeat──▶ ALIVE ──closed/evicted──▶ DEAD
//!                                 ▲                         │
//!                                 └──────ready/heartbeat────┘
//! ```
//!
//! UNKNOWN and DEAD are both "no registry entry".

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::bus::{BusEndpoint, Subscription};
use crate::clock::Clock;
use crate::config::{ConfigError, CoordinatorConfig};
use crate::context::SessionContext;
use crate::identity::{CredentialSnapshot, IdentityError, IdentityProvider};
use crate::lock::{LockError, LockStore};
use crate::logging::{log_line, open_log_file, AuditKind, LogHandle};
use crate::protocol::{session_closed, Inbound, Role, SessionMessage};
use crate::registry::{LivenessRegistry, Observation, RegistryEntry};
use crate::schedule::spawn_every;
use crate::spawner::{WindowSpawner, WindowTarget};
use crate::termination::{HookId, TerminationHooks};

/// Audit log file name (without extension) inside `logDir`.
const SESSION_LOG_ID: &str = "session";

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid coordinator configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Launcher lock unavailable: {0}")]
    Lock(#[from] LockError),

    #[error("Identity provider failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Authentication required")]
    Unauthenticated,
}

/// Outcome of [`activate`].
pub enum Activation {
    /// This process is now the launcher.
    Active(CoordinatorHandle),
    /// Another launcher holds the lock; nothing was started.
    AlreadyRunning,
}

impl Activation {
    pub fn is_active(&self) -> bool {
        matches!(self, Activation::Active(_))
    }

    pub fn into_handle(self) -> Option<CoordinatorHandle> {
        match self {
            Activation::Active(handle) => Some(handle),
            Activation::AlreadyRunning => None,
        }
    }
}

/// Activate the launcher coordinator for this session.
///
/// Must be called inside a tokio runtime. If the lock is already held this
/// returns `AlreadyRunning` without touching the bus, starting timers or
/// opening windows. If the identity provider fails or reports nobody signed
/// in, the lock is released again before the error is returned.
pub fn activate(
    ctx: &SessionContext,
    config: CoordinatorConfig,
    identity: Arc<dyn IdentityProvider>,
    spawner: Arc<dyn WindowSpawner>,
) -> Result<Activation, CoordinatorError> {
    config.validate()?;

    if !ctx.lock_store.try_acquire()? {
        log::warn!("VERA launcher is already running");
        return Ok(Activation::AlreadyRunning);
    }

    let snapshot = match identity.current_user() {
        Ok(Some(user)) => CredentialSnapshot::from(Some(user)),
        Ok(None) => {
            release_lock(ctx.lock_store.as_ref());
            return Err(CoordinatorError::Unauthenticated);
        }
        Err(e) => {
            release_lock(ctx.lock_store.as_ref());
            return Err(e.into());
        }
    };

    let lock = Arc::new(LauncherLock {
        store: Arc::clone(&ctx.lock_store),
        released: AtomicBool::new(false),
    });

    let hook = {
        let lock = Arc::clone(&lock);
        let endpoint = ctx.endpoint.clone();
        ctx.termination.register(move || {
            lock.release();
            endpoint.publish(&session_closed());
            log::info!("Launcher terminating, session closed");
        })
    };

    let shared = Arc::new(Shared {
        endpoint: ctx.endpoint.clone(),
        clock: Arc::clone(&ctx.clock),
        log_file: open_log_file(config.log_dir.as_deref(), SESSION_LOG_ID),
        identity,
        spawner,
        state: Mutex::new(CoordinatorState {
            registry: LivenessRegistry::new(),
            snapshot,
        }),
        evictions: AtomicU64::new(0),
        stopped: AtomicBool::new(false),
        config,
    });

    let subscription = {
        let shared = Arc::clone(&shared);
        ctx.endpoint.subscribe(move |inbound| shared.handle(inbound))
    };

    let watchdog = {
        let shared = Arc::clone(&shared);
        spawn_every(shared.config.watchdog_interval(), move || {
            shared.scan();
        })
    };

    let refresher = {
        let shared = Arc::clone(&shared);
        spawn_every(shared.config.credential_refresh_interval(), move || {
            if let Err(e) = shared.refresh_credential() {
                log::warn!("Credential refresh failed: {}", e);
            }
        })
    };

    log::info!(
        "Launcher coordinator active for roles {:?}",
        shared.config.roles
    );

    let handle = CoordinatorHandle {
        shared,
        lock,
        termination: Arc::clone(&ctx.termination),
        hook: Mutex::new(Some(hook)),
        subscription,
        tasks: Mutex::new(vec![watchdog, refresher]),
        disposed: AtomicBool::new(false),
    };

    if handle.shared.config.open_on_activate {
        handle.open_windows();
    }

    Ok(Activation::Active(handle))
}

fn release_lock(store: &dyn LockStore) {
    if let Err(e) = store.release() {
        log::error!("Failed to release launcher lock: {}", e);
    }
}

/// The lock as claimed by this coordinator; released at most once so a late
/// `dispose` can't clear a lock a newer launcher has since taken.
struct LauncherLock {
    store: Arc<dyn LockStore>,
    released: AtomicBool,
}

impl LauncherLock {
    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            release_lock(self.store.as_ref());
        }
    }
}

struct CoordinatorState {
    registry: LivenessRegistry,
    snapshot: CredentialSnapshot,
}

/// State shared between the handle, the bus handler and the timers.
struct Shared {
    endpoint: BusEndpoint,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    identity: Arc<dyn IdentityProvider>,
    spawner: Arc<dyn WindowSpawner>,
    log_file: LogHandle,
    state: Mutex<CoordinatorState>,
    evictions: AtomicU64,
    stopped: AtomicBool,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn handle(&self, inbound: Inbound) {
        if self.is_stopped() {
            return;
        }

        match inbound {
            Inbound::Message(SessionMessage::WindowReady { role }) => {
                let now = self.clock.now_ms();
                self.observe(role, now);
                log::info!("Window {} is ready", role);
                log_line(&self.log_file, AuditKind::Ready, role.as_str());
                self.push_session_info();
            }
            Inbound::Message(SessionMessage::WindowHeartbeat { role, timestamp }) => {
                let ahead = timestamp.saturating_sub(self.clock.now_ms());
                if ahead > self.config.liveness_threshold_ms as i64 {
                    log::warn!(
                        "Heartbeat from {} is {}ms ahead of the launcher clock",
                        role,
                        ahead
                    );
                }
                if self.observe(role, timestamp) == Observation::New {
                    log::info!("Window {} is alive", role);
                    log_line(&self.log_file, AuditKind::Ready, role.as_str());
                    self.push_session_info();
                } else {
                    log::debug!("Heartbeat from {} at {}", role, timestamp);
                }
            }
            Inbound::Message(SessionMessage::WindowClosed { role }) => {
                self.state.lock().unwrap().registry.remove(role);
                log::info!("Window {} is closed", role);
                log_line(&self.log_file, AuditKind::Closed, role.as_str());
            }
            Inbound::Message(
                message @ (SessionMessage::SessionInfo { .. } | SessionMessage::SessionClosed),
            ) => {
                // Only a launcher sends these; hearing one means a second launcher.
                log::warn!(
                    "Ignoring {} from another participant on the bus",
                    message.tag()
                );
            }
            Inbound::Ignored(reason) => {
                log::warn!("Ignoring bus frame: {}", reason);
            }
        }
    }

    fn observe(&self, role: Role, seen_at: i64) -> Observation {
        self.state.lock().unwrap().registry.observe(role, seen_at)
    }

    fn push_session_info(&self) {
        let message = self.state.lock().unwrap().snapshot.to_message();
        log::debug!("Posting session info to bus");
        self.endpoint.publish(&message);
    }

    fn scan(&self) -> Vec<RegistryEntry> {
        if self.is_stopped() {
            return Vec::new();
        }

        let now = self.clock.now_ms();
        let threshold = self.config.liveness_threshold_ms as i64;
        let evicted = self
            .state
            .lock()
            .unwrap()
            .registry
            .evict_stale(now, threshold);

        for entry in &evicted {
            self.evictions.fetch_add(1, Ordering::SeqCst);
            log::warn!(
                "Window {} considered dead (last seen {}ms ago)",
                entry.role,
                now.saturating_sub(entry.last_seen)
            );
            log_line(
                &self.log_file,
                AuditKind::Evict,
                &format!("{} last seen {}", entry.role, entry.last_seen),
            );
        }
        evicted
    }

    fn update_credential(&self, snapshot: CredentialSnapshot) -> bool {
        if self.is_stopped() {
            return false;
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.snapshot == snapshot {
                return false;
            }
            state.snapshot = snapshot;
        }

        log::info!("Credential changed, rebroadcasting session info");
        log_line(&self.log_file, AuditKind::Session, "credential updated");
        self.push_session_info();
        true
    }

    fn refresh_credential(&self) -> Result<bool, IdentityError> {
        if self.is_stopped() || !self.identity.refresh()? {
            return Ok(false);
        }
        let snapshot = CredentialSnapshot::from(self.identity.current_user()?);
        Ok(self.update_credential(snapshot))
    }

    fn open_windows(&self) -> Vec<Role> {
        if self.is_stopped() {
            return Vec::new();
        }

        let missing: Vec<Role> = {
            let state = self.state.lock().unwrap();
            self.config
                .roles
                .iter()
                .copied()
                .filter(|role| !state.registry.is_alive(*role))
                .collect()
        };

        let mut opened = Vec::new();
        for role in missing {
            let target = WindowTarget::for_role(role);
            match self.spawner.open(role, &target) {
                Ok(()) => {
                    log::info!("Opened {} window at {}", role, target.url);
                    log_line(&self.log_file, AuditKind::Spawn, role.as_str());
                    opened.push(role);
                }
                Err(e) => log::error!("Failed to open {} window: {}", role, e),
            }
        }
        opened
    }
}

/// A running launcher coordinator. Disposes itself on drop.
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
    lock: Arc<LauncherLock>,
    termination: Arc<TerminationHooks>,
    hook: Mutex<Option<HookId>>,
    subscription: Subscription,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl CoordinatorHandle {
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Snapshot of the liveness registry, ordered by role.
    pub fn registry(&self) -> Vec<RegistryEntry> {
        self.shared.state.lock().unwrap().registry.entries()
    }

    pub fn entry(&self, role: Role) -> Option<RegistryEntry> {
        self.shared.state.lock().unwrap().registry.get(role)
    }

    pub fn is_alive(&self, role: Role) -> bool {
        self.shared.state.lock().unwrap().registry.is_alive(role)
    }

    /// Open a window for every configured role that isn't alive.
    ///
    /// Returns the roles actually opened. Roles that are alive are skipped,
    /// so calling this repeatedly never duplicates a window.
    pub fn open_windows(&self) -> Vec<Role> {
        self.shared.open_windows()
    }

    /// Run one watchdog pass now and return the evicted entries.
    pub fn scan(&self) -> Vec<RegistryEntry> {
        self.shared.scan()
    }

    /// Ask the identity provider for a refresh and rebroadcast the credential
    /// if it changed.
    pub fn refresh_credential(&self) -> Result<bool, IdentityError> {
        self.shared.refresh_credential()
    }

    /// Replace the credential snapshot, rebroadcasting it if it changed.
    pub fn update_credential(&self, snapshot: CredentialSnapshot) -> bool {
        self.shared.update_credential(snapshot)
    }

    pub fn credential(&self) -> CredentialSnapshot {
        self.shared.state.lock().unwrap().snapshot.clone()
    }

    /// Number of windows evicted by the watchdog so far.
    pub fn evictions(&self) -> u64 {
        self.shared.evictions.load(Ordering::SeqCst)
    }

    /// Release the lock and stop the watchdog, the credential refresh and
    /// the bus subscription. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.stopped.store(true, Ordering::SeqCst);

        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.subscription.unsubscribe();
        if let Some(hook) = self.hook.lock().unwrap().take() {
            self.termination.remove(hook);
        }
        self.lock.release();

        log::info!("Launcher coordinator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
