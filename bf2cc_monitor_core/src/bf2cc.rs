//! Command lines understood by BF2CC based servers.

/// Dumps requested on every poll, in the order they are enqueued.
pub const POLL_COMMANDS: [&str; 3] = [SERVER_INFO, PLAYER_LIST, CHAT_BUFFER];

pub const SERVER_INFO: &str = "bf2cc si";
pub const PLAYER_LIST: &str = "bf2cc pl";
pub const CHAT_BUFFER: &str = "bf2cc clientchatbuffer";

#[must_use]
pub fn set_admin_name(name: &str) -> String {
    format!("bf2cc setadminname {name}")
}

#[must_use]
pub fn monitor_mode(enabled: bool) -> String {
    format!("bf2cc monitor {}", u8::from(enabled))
}

/// Chat message visible to every player.
#[must_use]
pub fn broadcast(text: &str) -> String {
    format!("bf2cc sendserverchat {text}")
}

/// Chat message visible only to the player in the given slot.
#[must_use]
pub fn whisper(pid: usize, text: &str) -> String {
    format!("exec game.sayToPlayerWithId {pid} \"{}\"", text.replace('"', "'"))
}

#[must_use]
pub fn set_vip(nucleus: &str, vip: bool) -> String {
    format!("bf2cc setvipstatus {nucleus} {}", u8::from(vip))
}

#[must_use]
pub fn kick(pid: usize) -> String {
    format!("kick {pid}")
}

#[must_use]
pub fn ban(pid: usize) -> String {
    format!("ban {pid}")
}
