//! Shared helpers for the crate's async tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::bus::{BusEndpoint, Subscription};
use crate::clock::ManualClock;
use crate::protocol::{Inbound, Role, SessionMessage};
use crate::spawner::{SpawnError, WindowSpawner, WindowTarget};

/// Let every task woken so far run to its next suspension point.
///
/// Only yields, so it never moves a paused clock forward.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Subscribe on `endpoint` and forward everything into a channel.
pub(crate) fn collect(endpoint: &BusEndpoint) -> (Subscription, UnboundedReceiver<Inbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = endpoint.subscribe(move |inbound| {
        let _ = tx.send(inbound);
    });
    (sub, rx)
}

/// Wait (up to a second) for the next decoded message.
pub(crate) async fn next_message(rx: &mut UnboundedReceiver<Inbound>) -> SessionMessage {
    match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(Inbound::Message(message))) => message,
        other => panic!("Expected a session message, got {:?}", other),
    }
}

/// Everything already delivered, decoded messages only.
pub(crate) fn drain_messages(rx: &mut UnboundedReceiver<Inbound>) -> Vec<SessionMessage> {
    let mut messages = Vec::new();
    while let Ok(inbound) = rx.try_recv() {
        if let Inbound::Message(message) = inbound {
            messages.push(message);
        }
    }
    messages
}

/// Move both the manual clock and tokio's paused clock forward, then let
/// woken tasks run.
pub(crate) async fn advance(clock: &ManualClock, ms: u64) {
    clock.advance(ms as i64);
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

/// [`advance`] in `step`-sized increments so every timer deadline on the way
/// is hit individually.
pub(crate) async fn advance_in_steps(clock: &ManualClock, total: u64, step: u64) {
    let mut elapsed = 0;
    while elapsed < total {
        let ms = step.min(total - elapsed);
        advance(clock, ms).await;
        elapsed += ms;
    }
}

/// Spawner that records what it was asked to open.
#[derive(Default)]
pub(crate) struct RecordingSpawner {
    opened: Mutex<Vec<(Role, WindowTarget)>>,
    fail: AtomicBool,
}

impl RecordingSpawner {
    pub(crate) fn roles(&self) -> Vec<Role> {
        self.opened.lock().unwrap().iter().map(|(role, _)| *role).collect()
    }

    pub(crate) fn targets(&self) -> Vec<WindowTarget> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }

    pub(crate) fn fail_opens(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl WindowSpawner for RecordingSpawner {
    fn open(&self, role: Role, target: &WindowTarget) -> Result<(), SpawnError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpawnError::OpenFailed {
                target: target.name.clone(),
                reason: "popup blocked".into(),
            });
        }
        self.opened.lock().unwrap().push((role, target.clone()));
        Ok(())
    }
}
