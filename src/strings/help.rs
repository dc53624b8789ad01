//! # Help Text
//!
//! Renders the command listing produced by the registry for the `.help` command.

use std::collections::BTreeMap;

use crate::application::registry::CommandInfo;

pub const NO_DESCRIPTION: &str = "No description provided.";
pub const HEADER: &str = "**🤖 Herald Help**";

pub fn unknown_command(name: &str) -> String {
    format!("❓ Unknown command `{name}`.")
}

/// Lists every command-style entry, grouped by category.
pub fn render_index(prefix: &str, commands: &[CommandInfo]) -> String {
    let mut categories: BTreeMap<&str, Vec<&CommandInfo>> = BTreeMap::new();
    for info in commands.iter().filter(|info| !info.commands.is_empty()) {
        categories.entry(info.category.as_str()).or_default().push(info);
    }

    let mut text = format!("{HEADER}\nUse: {prefix}command _args_\n");
    for (category, mut entries) in categories {
        entries.sort_by(|a, b| a.commands[0].cmp(&b.commands[0]));
        text.push_str(&format!("\n**📂 {}**\n", capitalize(category)));
        for info in entries {
            text.push_str(&format!("* {}: {}\n", info.commands[0], info.description));
        }
    }
    text
}

pub fn render_command(prefix: &str, info: &CommandInfo) -> String {
    let names: Vec<String> = info
        .commands
        .iter()
        .map(|name| format!("{prefix}{name}"))
        .collect();
    let mut text = format!(
        "**ℹ️ Command:** `{}`\n\n**Description:** {}\n**Usage:** `{}`\n**Category:** {}",
        names.join(" | "),
        info.description,
        info.usage,
        info.category
    );
    if info.owner_only {
        text.push_str("\n_Owner only_");
    } else if info.admin_only {
        text.push_str("\n_Admins only_");
    }
    text
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
