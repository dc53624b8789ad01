//! # Messages
//!
//! Contains constant strings and format functions for user-facing messages.
//! Includes access denials, rate-limit notices and log-chat reports.

use std::time::Duration;

pub const ADMIN_ONLY: &str = "🚫 **Only admins can use this command.**";
pub const OWNER_ONLY: &str = "🚫 **Only the owner can use this command.**";

pub fn rate_limited(remaining: Duration) -> String {
    format!(
        "⏳ **Slow down!** Please wait `{:.1}` seconds.",
        remaining.as_secs_f64()
    )
}

pub const PONG_PENDING: &str = "🏓 Pong!";

pub fn pong(latency: Duration) -> String {
    format!("🏓 **Pong!** `{} ms`", latency.as_millis())
}

pub fn album_caption(sender: Option<i64>, chat_id: i64, count: usize, text: Option<&str>) -> String {
    let sender = sender.map_or_else(|| "unknown".to_string(), |id| id.to_string());
    let mut caption = format!(
        "ℹ️ **Media saved** ({count})\n\n👤 **From:** `{sender}`\n📍 **Chat:** `{chat_id}`"
    );
    if let Some(text) = text.filter(|text| !text.is_empty()) {
        caption.push_str(&format!("\n📝 **Text:** {text}"));
    }
    caption
}

pub fn deleted_header(chat_id: i64, count: usize) -> String {
    format!("🗑 **{count} message(s) deleted** in `{chat_id}`")
}

pub fn deleted_entry(message_id: i64, sender: Option<i64>, text: &str) -> String {
    let sender = sender.map_or_else(String::new, |id| format!(" from `{id}`"));
    format!("• `{message_id}`{sender}: {text}")
}
