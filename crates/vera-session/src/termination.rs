//! Process termination hooks.
//!
//! Stands in for the "about to exit" signal of a window or launcher process.
//! Hooks run synchronously, in registration order, exactly once, when the
//! owner calls [`TerminationHooks::fire`] (the launcher binary does so on
//! Ctrl-C).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Handle for removing a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct TerminationHooks {
    next_id: AtomicU64,
    hooks: Mutex<Vec<(HookId, Hook)>>,
    fired: AtomicBool,
}

impl TerminationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, hook: F) -> HookId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.hooks.lock().unwrap().push((id, Box::new(hook)));
        id
    }

    /// Remove a hook. Returns false if it was already removed or has run.
    pub fn remove(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock().unwrap();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    /// Run every registered hook and return how many ran.
    pub fn fire(&self) -> usize {
        self.fired.store(true, Ordering::SeqCst);
        // Take the hooks out first so a hook may call `remove` without deadlocking.
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap());
        let count = hooks.len();
        for (_, hook) in hooks {
            hook();
        }
        count
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
