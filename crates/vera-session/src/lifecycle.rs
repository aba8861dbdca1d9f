//! Window lifecycle manager.
//!
//! Runs inside every non-launcher window:
//!
//! 1. Publishes `WindowReady` as soon as it starts.
//! 2. Registers a termination hook that publishes `WindowClosed`.
//! 3. Publishes `WindowHeartbeat` every heartbeat interval.
//!
//! It also listens for `SessionInfo`/`SessionClosed` from the launcher and
//! keeps the latest session state in a watch channel for the window's UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::Subscription;
use crate::config::DEFAULT_HEARTBEAT_INTERVAL_MS;
use crate::context::SessionContext;
use crate::protocol::{
    window_closed, window_heartbeat, window_ready, Inbound, Role, SessionMessage,
};
use crate::schedule::spawn_every;
use crate::termination::{HookId, TerminationHooks};

/// Shortest heartbeat period accepted; zero would spin.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// What a window knows about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSession {
    pub user_name: Option<String>,
    pub credential: Option<String>,
    /// The launcher ended the session.
    pub closed: bool,
}

type TaskSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Start the lifecycle for `role` with the default 2s heartbeat.
pub fn start(ctx: &SessionContext, role: Role) -> WindowHandle {
    start_with_heartbeat(ctx, role, Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS))
}

/// Start the lifecycle for `role`, heartbeating every `heartbeat_interval`.
///
/// Must be called inside a tokio runtime.
pub fn start_with_heartbeat(
    ctx: &SessionContext,
    role: Role,
    heartbeat_interval: Duration,
) -> WindowHandle {
    let period = heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);

    // Listen before announcing so the launcher's reply can't be missed.
    let (session_tx, session_rx) = watch::channel(WindowSession::default());
    let subscription = ctx.endpoint.subscribe(move |inbound| match inbound {
        Inbound::Message(SessionMessage::SessionInfo {
            user_name,
            credential,
        }) => {
            session_tx.send_replace(WindowSession {
                user_name,
                credential,
                closed: false,
            });
        }
        Inbound::Message(SessionMessage::SessionClosed) => {
            log::info!("Session closed by launcher ({} window)", role);
            session_tx.send_replace(WindowSession {
                closed: true,
                ..Default::default()
            });
        }
        // Other windows' lifecycle traffic is for the launcher.
        Inbound::Message(
            SessionMessage::WindowReady { .. }
            | SessionMessage::WindowClosed { .. }
            | SessionMessage::WindowHeartbeat { .. },
        ) => {}
        Inbound::Ignored(reason) => {
            log::debug!("{} window ignored bus frame: {}", role, reason);
        }
    });

    ctx.endpoint.publish(&window_ready(role));
    log::info!("{} window ready", role);

    let heartbeat: TaskSlot = Arc::new(Mutex::new(None));

    let hook = {
        let endpoint = ctx.endpoint.clone();
        let heartbeat = Arc::clone(&heartbeat);
        ctx.termination.register(move || {
            if let Some(task) = heartbeat.lock().unwrap().take() {
                task.abort();
            }
            endpoint.publish(&window_closed(role));
            log::info!("{} window closed", role);
        })
    };

    let task = {
        let endpoint = ctx.endpoint.clone();
        let clock = Arc::clone(&ctx.clock);
        spawn_every(period, move || {
            let now = clock.now_ms();
            log::debug!("{} window heartbeat at {}", role, now);
            endpoint.publish(&window_heartbeat(role, now));
        })
    };
    *heartbeat.lock().unwrap() = Some(task);

    WindowHandle {
        role,
        session: session_rx,
        subscription,
        heartbeat,
        hook: Mutex::new(Some(hook)),
        termination: Arc::clone(&ctx.termination),
        disposed: AtomicBool::new(false),
    }
}

/// A running window lifecycle. Disposes itself on drop.
pub struct WindowHandle {
    role: Role,
    session: watch::Receiver<WindowSession>,
    subscription: Subscription,
    heartbeat: TaskSlot,
    hook: Mutex<Option<HookId>>,
    termination: Arc<TerminationHooks>,
    disposed: AtomicBool,
}

impl WindowHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Watch the session state pushed by the launcher.
    pub fn session(&self) -> watch::Receiver<WindowSession> {
        self.session.clone()
    }

    pub fn current_session(&self) -> WindowSession {
        self.session.borrow().clone()
    }

    /// Whether heartbeats are still being sent.
    pub fn is_heartbeating(&self) -> bool {
        self.heartbeat.lock().unwrap().is_some()
    }

    /// Stop heartbeats, drop the termination hook and stop listening.
    ///
    /// Does not publish `WindowClosed`; that only happens on termination.
    /// Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.heartbeat.lock().unwrap().take() {
            task.abort();
        }
        if let Some(hook) = self.hook.lock().unwrap().take() {
            self.termination.remove(hook);
        }
        self.subscription.unsubscribe();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for WindowHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
