// Client-side adapter: connects, mirrors the authoritative world into a
// local replica, predicts own moves optimistically and reconciles the
// server's echo. Rendering is a caller concern; this crate only exposes the
// replica and a handle to submit intents.

pub mod net;
pub mod replica;

pub use net::{ClientError, GameClient, StreamDriver};
