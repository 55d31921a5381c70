pub mod args;
pub mod bf2cc;
pub mod chat;
pub mod commands;
pub mod game;
pub mod log_hub;
pub mod monitor;
pub mod players;
pub mod rcon;
pub mod response;
pub mod settings;
pub mod store;

pub use log_hub::LogHub;
pub use monitor::Monitor;
pub use rcon::{Rcon, RconError, SessionPhase};
