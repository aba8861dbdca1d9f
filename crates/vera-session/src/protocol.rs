//! Session protocol - the closed set of messages exchanged over the bus.
//!
//! Windows and the launcher only ever talk in terms of [`SessionMessage`].
//! Messages travel inside a versioned [`Frame`]; decoding a frame is total:
//! anything outside the known vocabulary becomes [`Inbound::Ignored`] instead
//! of an error, so one bad frame never stalls a shared dispatch loop.
//!
//! # Wire shape
//!
//! ```text
//! {"v":1,"payload":{"type":"WINDOW_READY","window":"primary"}}
//! {"v":1,"payload":{"type":"WINDOW_CLOSED","window":"primary"}}
//! {"v":1,"payload":{"type":"WINDOW_HEARTBEAT","window":"primary","ts":1999}}
//! {"v":1,"payload":{"type":"SESSION_INFO","userFullName":"Jane","token":"abc"}}
//! {"v":1,"payload":{"type":"SESSION_CLOSED"}}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version stamped on every frame this crate publishes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Every tag in the closed message set.
pub const KNOWN_TAGS: [&str; 5] = [
    "WINDOW_READY",
    "WINDOW_CLOSED",
    "WINDOW_HEARTBEAT",
    "SESSION_INFO",
    "SESSION_CLOSED",
];

// ============================================================================
// Role
// ============================================================================

/// The functional identity of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Launcher,
    Primary,
    Secondary,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Launcher, Role::Primary, Role::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Launcher => "launcher",
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown window role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A message on the session bus.
///
/// Build values through the constructor functions in this module
/// ([`window_ready`], [`window_heartbeat`], ...) rather than by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMessage {
    /// A window finished starting and is ready for session info.
    WindowReady {
        #[serde(rename = "window")]
        role: Role,
    },

    /// A window is terminating.
    WindowClosed {
        #[serde(rename = "window")]
        role: Role,
    },

    /// Periodic liveness signal. `timestamp` is epoch milliseconds on the
    /// sender's clock.
    WindowHeartbeat {
        #[serde(rename = "window")]
        role: Role,
        #[serde(rename = "ts")]
        timestamp: i64,
    },

    /// Current signed-in user and credential, pushed by the launcher.
    SessionInfo {
        #[serde(
            rename = "userFullName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        user_name: Option<String>,
        #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
    },

    /// The launcher is shutting the whole session down.
    SessionClosed,
}

impl SessionMessage {
    /// Wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            SessionMessage::WindowReady { .. } => "WINDOW_READY",
            SessionMessage::WindowClosed { .. } => "WINDOW_CLOSED",
            SessionMessage::WindowHeartbeat { .. } => "WINDOW_HEARTBEAT",
            SessionMessage::SessionInfo { .. } => "SESSION_INFO",
            SessionMessage::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// The window role a message is about, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            SessionMessage::WindowReady { role }
            | SessionMessage::WindowClosed { role }
            | SessionMessage::WindowHeartbeat { role, .. } => Some(*role),
            SessionMessage::SessionInfo { .. } | SessionMessage::SessionClosed => None,
        }
    }
}

pub fn window_ready(role: Role) -> SessionMessage {
    SessionMessage::WindowReady { role }
}

pub fn window_closed(role: Role) -> SessionMessage {
    SessionMessage::WindowClosed { role }
}

pub fn window_heartbeat(role: Role, timestamp: i64) -> SessionMessage {
    SessionMessage::WindowHeartbeat { role, timestamp }
}

pub fn session_info(user_name: Option<String>, credential: Option<String>) -> SessionMessage {
    SessionMessage::SessionInfo {
        user_name,
        credential,
    }
}

pub fn session_closed() -> SessionMessage {
    SessionMessage::SessionClosed
}

// ============================================================================
// Frames
// ============================================================================

/// Versioned envelope carrying one encoded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "v")]
    pub version: u32,
    pub payload: serde_json::Value,
}

/// Why a received frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredFrame {
    /// The payload carried a tag outside the closed set.
    UnknownTag(String),
    /// The payload had a known tag (or none) but the wrong shape.
    Malformed(String),
    /// The frame was stamped with a protocol version we don't speak.
    UnsupportedVersion(u32),
}

impl fmt::Display for IgnoredFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoredFrame::UnknownTag(tag) => write!(f, "unknown message tag {tag}"),
            IgnoredFrame::Malformed(reason) => write!(f, "malformed message: {reason}"),
            IgnoredFrame::UnsupportedVersion(v) => write!(f, "unsupported protocol version {v}"),
        }
    }
}

/// Result of decoding a frame. Never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(SessionMessage),
    Ignored(IgnoredFrame),
}

impl Frame {
    /// Encode a message at the current protocol version.
    pub fn encode(message: &SessionMessage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            version: PROTOCOL_VERSION,
            payload: serde_json::to_value(message)?,
        })
    }

    /// Decode the payload, sorting anything unrecognised into [`Inbound::Ignored`].
    pub fn decode(&self) -> Inbound {
        if self.version != PROTOCOL_VERSION {
            return Inbound::Ignored(IgnoredFrame::UnsupportedVersion(self.version));
        }

        match SessionMessage::deserialize(&self.payload) {
            Ok(SessionMessage::WindowHeartbeat { timestamp, .. }) if timestamp < 0 => {
                Inbound::Ignored(IgnoredFrame::Malformed(format!(
                    "negative heartbeat timestamp {timestamp}"
                )))
            }
            Ok(message) => Inbound::Message(message),
            Err(err) => match self.payload.get("type").and_then(|t| t.as_str()) {
                Some(tag) if !KNOWN_TAGS.contains(&tag) => {
                    Inbound::Ignored(IgnoredFrame::UnknownTag(tag.to_string()))
                }
                _ => Inbound::Ignored(IgnoredFrame::Malformed(err.to_string())),
            },
        }
    }
}
