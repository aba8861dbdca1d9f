//! Opening windows for roles.

use thiserror::Error;

use crate::protocol::Role;

/// Named destination a window is opened at. Opening the same target twice
/// should reuse the existing window where the platform allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTarget {
    pub name: String,
    pub url: String,
}

impl WindowTarget {
    pub fn for_role(role: Role) -> Self {
        Self {
            name: format!("vera-{role}-window"),
            url: format!("/{role}.html"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Role {0} is not opened as a window")]
    NotSpawnable(Role),

    #[error("Failed to open window {target}: {reason}")]
    OpenFailed { target: String, reason: String },
}

pub trait WindowSpawner: Send + Sync {
    fn open(&self, role: Role, target: &WindowTarget) -> Result<(), SpawnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_for_primary() {
        let target = WindowTarget::for_role(Role::Primary);
        assert_eq!(target.name, "vera-primary-window");
        assert_eq!(target.url, "/primary.html");
    }

    #[test]
    fn targets_are_distinct_per_role() {
        let primary = WindowTarget::for_role(Role::Primary);
        let secondary = WindowTarget::for_role(Role::Secondary);
        assert_ne!(primary, secondary);
        assert_eq!(secondary.name, "vera-secondary-window");
    }

    #[test]
    fn error_display() {
        let err = SpawnError::OpenFailed {
            target: "vera-primary-window".into(),
            reason: "popup blocked".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open window vera-primary-window: popup blocked"
        );
        assert!(SpawnError::NotSpawnable(Role::Launcher)
            .to_string()
            .contains("launcher"));
    }
}
