use crate::frameworks::config::ServerSettings;
use crate::use_cases::sessions::SessionRegistry;
use engine::WorldHandle;
use std::sync::Arc;

pub struct AppState {
    // Live sessions keyed by token.
    pub sessions: Arc<SessionRegistry>,
    // The authoritative world plus the action pipeline feeding it.
    pub handle: WorldHandle,
    // Process-wide knobs fixed at startup.
    pub settings: ServerSettings,
}
