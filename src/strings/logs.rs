pub fn config_loaded(prefix: &str, handlers: usize) -> String {
    format!("Configuration loaded (prefix `{prefix}`), {handlers} handlers registered")
}

pub const LISTENING: &str = "Listening for events...";
pub const SOURCE_CLOSED: &str = "Event source closed, draining in-flight work";

pub fn drained(flushed: usize) -> String {
    format!("Shutdown complete, flushed {flushed} open group(s)")
}

pub const NO_LOG_CHAT: &str = "log_chat_id is not configured, report dropped";
