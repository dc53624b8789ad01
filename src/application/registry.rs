//! # Handler Registry
//!
//! Stores compiled matchers with their callbacks in registration order.
//! Populated once at startup and read-only afterwards, so matching takes no locks.

use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::application::handler::{Callback, RateLimit};
use crate::application::pattern::{self, CommandSpec, CompiledMatcher, MatchCaptures};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::event::Event;

/// Identity of a registration, e.g. `user/ping:ping`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegistrationId(String);

impl RegistrationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct HandlerEntry {
    pub id: RegistrationId,
    pub matcher: CompiledMatcher,
    pub callback: Callback,
    pub rate_limit: Option<RateLimit>,
}

impl HandlerEntry {
    /// Scope used in rate-limit cache keys.
    pub fn rate_scope(&self) -> &str {
        self.rate_limit
            .as_ref()
            .and_then(|limit| limit.scope.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// Stable shape of the help/introspection surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub id: String,
    pub commands: Vec<String>,
    pub category: String,
    pub description: String,
    pub usage: String,
    pub admin_only: bool,
    pub owner_only: bool,
}

/// Flushes state a handler buffers on its own; yields the number of flushed groups.
pub type DrainHook = Arc<dyn Fn() -> BoxFuture<'static, usize> + Send + Sync>;

pub struct HandlerRegistry {
    prefix: String,
    entries: Vec<HandlerEntry>,
    /// Literal command name -> owning registration
    commands: HashMap<String, RegistrationId>,
    drains: Vec<DrainHook>,
}

impl HandlerRegistry {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            entries: Vec::new(),
            commands: HashMap::new(),
            drains: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(
        &mut self,
        id: &str,
        spec: CommandSpec,
        callback: Callback,
    ) -> CoreResult<RegistrationId> {
        self.register_with(id, spec, callback, None)
    }

    /// Compiles `spec` and appends the entry. Literal command names must be
    /// unique (case-insensitively); patterns and filters are never checked.
    pub fn register_with(
        &mut self,
        id: &str,
        spec: CommandSpec,
        callback: Callback,
        rate_limit: Option<RateLimit>,
    ) -> CoreResult<RegistrationId> {
        if self.entries.iter().any(|entry| entry.id.as_str() == id) {
            return Err(CoreError::InvalidSpecification(format!(
                "registration id `{id}` is already in use"
            )));
        }

        let matcher = pattern::compile(&spec, &self.prefix)?;

        for name in &matcher.meta.commands {
            if let Some(existing) = self.commands.get(name) {
                return Err(CoreError::DuplicateCommand {
                    name: name.clone(),
                    existing: existing.to_string(),
                });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for name in &matcher.meta.commands {
            if !seen.insert(name) {
                return Err(CoreError::DuplicateCommand {
                    name: name.clone(),
                    existing: id.to_string(),
                });
            }
        }

        let id = RegistrationId(id.to_string());
        for name in &matcher.meta.commands {
            self.commands.insert(name.clone(), id.clone());
        }
        tracing::debug!(
            handler = %id,
            commands = ?matcher.meta.commands,
            pattern = ?matcher.regex_str(),
            "Registered handler"
        );
        self.entries.push(HandlerEntry {
            id: id.clone(),
            matcher,
            callback,
            rate_limit,
        });
        Ok(id)
    }

    /// Runs `hook` when the dispatcher drains at end of stream.
    pub fn on_drain<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = usize> + Send + 'static,
    {
        self.drains
            .push(Arc::new(move || -> BoxFuture<'static, usize> { Box::pin(hook()) }));
    }

    pub fn drain_hooks(&self) -> &[DrainHook] {
        &self.drains
    }

    /// Every entry whose matcher accepts `event`, in registration order.
    pub fn match_event(&self, event: &Event) -> Vec<(&HandlerEntry, MatchCaptures)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.matcher.matches(event).map(|caps| (entry, caps)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&HandlerEntry> {
        self.entries.iter().find(|entry| entry.id.as_str() == id)
    }

    /// Looks up the owner of a literal command name.
    pub fn find_command(&self, name: &str) -> Option<&HandlerEntry> {
        let name = name.trim();
        let name = name.strip_prefix(self.prefix.as_str()).unwrap_or(name);
        self.commands
            .get(&name.to_lowercase())
            .and_then(|id| self.get(id.as_str()))
    }

    pub fn describe(&self) -> Vec<CommandInfo> {
        self.entries
            .iter()
            .map(|entry| CommandInfo {
                id: entry.id.to_string(),
                commands: entry.matcher.meta.commands.clone(),
                category: entry.matcher.meta.category.clone(),
                description: entry.matcher.meta.description.clone(),
                usage: entry.matcher.meta.usage.clone(),
                admin_only: entry.matcher.meta.admin_only,
                owner_only: entry.matcher.meta.owner_only,
            })
            .collect()
    }
}
