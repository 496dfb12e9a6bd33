//! Shared domain types for AgentCube, used by the control-plane, the daemon,
//! the router, and the SDK alike so none of them need each other's full
//! dependency stack just to talk about a session.

pub mod error;
pub mod resource;
pub mod session;
pub mod workspace_metadata;

pub use error::ErrorCategory;
pub use resource::{SandboxKind, SandboxResource};
pub use session::{Session, SessionId, SessionKind, SessionState};
pub use workspace_metadata::{BuildMode, ImageInfo, Language, WorkspaceMetadata};
