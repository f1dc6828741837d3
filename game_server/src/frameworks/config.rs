use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

/// Per-session outbound queue; a client this far behind gets disconnected.
pub const SESSION_SEND_BUFFER: usize = 64;

pub fn http_port() -> u16 {
    env::var("ARENA_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8888)
}

/// Knobs for one server process. Tests shrink the timeouts and round rules;
/// production runs the defaults.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Shared password required on connect; empty means open server.
    pub password: String,
    /// Hard cap on concurrent sessions.
    pub max_clients: usize,
    /// Sessions quiet for longer than this get disconnected.
    pub idle_timeout: Duration,
    /// How often the idle supervisor scans sessions.
    pub idle_check_interval: Duration,
    /// Score that ends a round.
    pub round_over_score: u32,
    /// Pause between rounds.
    pub round_wait: Duration,
    /// Bot players fielded at startup.
    pub bots: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            password: String::new(),
            max_clients: 8,
            idle_timeout: Duration::from_secs(15 * 60),
            idle_check_interval: Duration::from_secs(60),
            round_over_score: engine::world::ROUND_OVER_SCORE,
            round_wait: engine::world::NEW_ROUND_WAIT,
            bots: 0,
        }
    }
}
