use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionManager;

/// Shared state threaded through every route handler (teacher's
/// `AppState` pattern).
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub config: Arc<Config>,
}
