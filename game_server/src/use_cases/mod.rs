pub mod bots;
pub mod broadcast;
pub mod sessions;
