//! Windows hosted inside the launcher process.
//!
//! Each opened window is a lifecycle running on its own sibling context of
//! the launcher's, so it has its own bus endpoint and termination hooks just
//! like a separate window would.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use vera_session::lifecycle::{self, WindowHandle, WindowSession};
use vera_session::spawner::SpawnError;
use vera_session::{Role, SessionContext, WindowSpawner, WindowTarget};

struct HostedWindow {
    ctx: SessionContext,
    target: WindowTarget,
    handle: WindowHandle,
}

pub struct InProcessWindows {
    session: SessionContext,
    heartbeat_interval: Duration,
    windows: Mutex<BTreeMap<Role, HostedWindow>>,
}

impl InProcessWindows {
    /// Host windows in the session `launcher` belongs to.
    pub fn new(launcher: &SessionContext, heartbeat_interval: Duration) -> Self {
        Self {
            session: launcher.clone(),
            heartbeat_interval,
            windows: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        self.windows.lock().unwrap().keys().copied().collect()
    }

    pub fn session_of(&self, role: Role) -> Option<WindowSession> {
        self.windows
            .lock()
            .unwrap()
            .get(&role)
            .map(|window| window.handle.current_session())
    }

    /// Close every window the way a terminating window does: each one
    /// announces `WindowClosed` before going away.
    pub fn close_all(&self) -> usize {
        let windows = std::mem::take(&mut *self.windows.lock().unwrap());
        let count = windows.len();
        for (role, window) in windows {
            window.ctx.termination.fire();
            log::info!("Closed {} window ({})", role, window.target.name);
        }
        count
    }
}

impl WindowSpawner for InProcessWindows {
    fn open(&self, role: Role, target: &WindowTarget) -> Result<(), SpawnError> {
        if role == Role::Launcher {
            return Err(SpawnError::NotSpawnable(role));
        }

        let ctx = self.session.sibling();
        let handle = lifecycle::start_with_heartbeat(&ctx, role, self.heartbeat_interval);

        // Reopening a target replaces whatever was left of the old window.
        let replaced = self.windows.lock().unwrap().insert(
            role,
            HostedWindow {
                ctx,
                target: target.clone(),
                handle,
            },
        );
        if replaced.is_some() {
            log::debug!("Replaced stale {} window", role);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vera_session::{LocalBus, SessionMessage, SessionTransport};

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn launcher() -> (Arc<LocalBus>, SessionContext) {
        let bus = Arc::new(LocalBus::new());
        let ctx = SessionContext::builder().transport(bus.clone()).build();
        (bus, ctx)
    }

    #[tokio::test(start_paused = true)]
    async fn open_starts_a_lifecycle() {
        let (_bus, ctx) = launcher();
        let windows = InProcessWindows::new(&ctx, Duration::from_millis(2000));

        windows
            .open(Role::Primary, &WindowTarget::for_role(Role::Primary))
            .unwrap();

        assert_eq!(windows.roles(), vec![Role::Primary]);
        assert_eq!(
            windows.session_of(Role::Primary),
            Some(WindowSession::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn launcher_role_is_not_spawnable() {
        let (_bus, ctx) = launcher();
        let windows = InProcessWindows::new(&ctx, Duration::from_millis(2000));

        let err = windows
            .open(Role::Launcher, &WindowTarget::for_role(Role::Launcher))
            .unwrap_err();
        assert!(matches!(err, SpawnError::NotSpawnable(Role::Launcher)));
        assert!(windows.roles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_replaces_the_window() {
        let (bus, ctx) = launcher();
        let windows = InProcessWindows::new(&ctx, Duration::from_millis(2000));
        let target = WindowTarget::for_role(Role::Secondary);

        windows.open(Role::Secondary, &target).unwrap();
        settle().await;
        let listeners = bus.listener_count();
        windows.open(Role::Secondary, &target).unwrap();
        settle().await;

        assert_eq!(windows.roles(), vec![Role::Secondary]);
        assert_eq!(bus.listener_count(), listeners);
    }

    #[tokio::test(start_paused = true)]
    async fn close_all_announces_each_window() {
        let (bus, ctx) = launcher();
        let windows = InProcessWindows::new(&ctx, Duration::from_millis(2000));
        windows
            .open(Role::Primary, &WindowTarget::for_role(Role::Primary))
            .unwrap();
        windows
            .open(Role::Secondary, &WindowTarget::for_role(Role::Secondary))
            .unwrap();

        let mut rx = bus.listen();
        assert_eq!(windows.close_all(), 2);
        settle().await;

        let mut closed = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let vera_session::protocol::Inbound::Message(SessionMessage::WindowClosed {
                role,
            }) = envelope.frame.decode()
            {
                closed.push(role);
            }
        }
        assert_eq!(closed, vec![Role::Primary, Role::Secondary]);
        assert!(windows.roles().is_empty());
    }
}
