use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally unique session identifier.
pub type SessionId = Uuid;

/// The two sandbox flavors exposed to clients (§1, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    CodeInterpreter,
    AgentRuntime,
}

impl SessionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeInterpreter => "code_interpreter",
            Self::AgentRuntime => "agent_runtime",
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_interpreter" => Ok(Self::CodeInterpreter),
            "agent_runtime" => Ok(Self::AgentRuntime),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// Session lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Running,
    Failed,
    Deleted,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown session state: {other}")),
        }
    }
}

/// The central `Session` entity (§3). Carried across the control-plane's
/// HTTP API, its Postgres store, and the SDK's view of session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    pub namespace: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// RSA public key (PEM) bound to this session, or `None` before bootstrap
    /// has completed.
    pub session_public_key: Option<String>,
    /// Daemon/agent endpoint once known (pod IP:port for Code Interpreter,
    /// `status.agentEndpoint` for Agent Runtime).
    pub endpoint: Option<String>,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn session_kind_round_trips() {
        for kind in [SessionKind::CodeInterpreter, SessionKind::AgentRuntime] {
            let s = kind.as_str();
            assert_eq!(SessionKind::from_str(s).unwrap(), kind);
        }
    }

    #[test]
    fn session_state_round_trips() {
        for state in [
            SessionState::Pending,
            SessionState::Running,
            SessionState::Failed,
            SessionState::Deleted,
        ] {
            let s = state.as_str();
            assert_eq!(SessionState::from_str(s).unwrap(), state);
        }
    }

    #[test]
    fn unknown_kind_errors() {
        assert!(SessionKind::from_str("bogus").is_err());
    }
}
