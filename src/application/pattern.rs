//! # Pattern Compiler
//!
//! Turns a declarative [`CommandSpec`] into a single [`CompiledMatcher`].
//! Command names are synthesised into one prefix-anchored, case-insensitive regex;
//! free-form patterns get an implicit start anchor; raw filters bypass regex synthesis.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::event::{Event, EventKind};

pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

const PATTERN_USAGE: &str = "regex/event based";

/// Which side of the conversation an event must come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the agent's own account
    Outgoing,
    Incoming,
    Any,
}

impl Direction {
    fn accepts(self, event: &Event) -> bool {
        match self {
            Direction::Outgoing => event.outgoing,
            Direction::Incoming => !event.outgoing,
            Direction::Any => true,
        }
    }
}

/// Declarative description of a handler's trigger and metadata.
/// Immutable once handed to the registry.
#[derive(Clone, Default)]
pub struct CommandSpec {
    commands: Vec<String>,
    pattern: Option<String>,
    compiled: Option<Regex>,
    filter: Option<EventPredicate>,
    description: Option<String>,
    category: Option<String>,
    usage: Option<String>,
    direction: Option<Direction>,
    kinds: Option<Vec<EventKind>>,
    chats: Vec<i64>,
    admin_only: bool,
    owner_only: bool,
    exclusive: Option<bool>,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("commands", &self.commands)
            .field("pattern", &self.pattern)
            .field("compiled", &self.compiled.as_ref().map(Regex::as_str))
            .field("filter", &self.filter.is_some())
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl CommandSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command-style spec matching `<prefix><name>` for any of `names`.
    pub fn command<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().commands(names)
    }

    /// Free-form regex, implicitly anchored at the start of the text.
    pub fn regex(pattern: &str) -> Self {
        Self::new().pattern(pattern)
    }

    /// Raw filter escape hatch: the predicate alone decides, no regex is synthesised.
    pub fn listen<F>(kinds: &[EventKind], predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self::new().filter(predicate).kinds(kinds)
    }

    pub fn commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Pre-compiled matcher, used as-is.
    pub fn compiled(mut self, regex: Regex) -> Self {
        self.compiled = Some(regex);
        self
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = Some(usage.to_string());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn kinds(mut self, kinds: &[EventKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn chats(mut self, chats: &[i64]) -> Self {
        self.chats = chats.to_vec();
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    /// Overrides whether the handler competes for first-match dispatch.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = Some(exclusive);
        self
    }
}

/// Introspection metadata carried by a compiled matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherMeta {
    /// Normalised (lower-cased, prefix-stripped) command names
    pub commands: Vec<String>,
    pub description: String,
    pub category: String,
    pub usage: String,
    /// Source of the regex, if any
    pub pattern: Option<String>,
    pub admin_only: bool,
    pub owner_only: bool,
}

#[derive(Clone)]
enum Matcher {
    Regex(Regex),
    Filter(EventPredicate),
}

/// Text captured by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCaptures {
    /// Trailing argument text (command remainder, first capture group, or full text for filters)
    pub args: String,
    /// All capture groups of the regex, group 0 included
    pub groups: Vec<Option<String>>,
}

/// A single matching function plus metadata.
#[derive(Clone)]
pub struct CompiledMatcher {
    matcher: Matcher,
    direction: Direction,
    kinds: Vec<EventKind>,
    chats: Vec<i64>,
    exclusive: bool,
    pub meta: MatcherMeta,
}

impl fmt::Debug for CompiledMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledMatcher")
            .field("direction", &self.direction)
            .field("kinds", &self.kinds)
            .field("exclusive", &self.exclusive)
            .field("meta", &self.meta)
            .finish()
    }
}

impl CompiledMatcher {
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The regex source, `None` for raw filters.
    pub fn regex_str(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Regex(regex) => Some(regex.as_str()),
            Matcher::Filter(_) => None,
        }
    }

    pub fn matches(&self, event: &Event) -> Option<MatchCaptures> {
        if !self.kinds.contains(&event.kind) || !self.direction.accepts(event) {
            return None;
        }
        if !self.chats.is_empty() && !self.chats.contains(&event.chat_id) {
            return None;
        }

        match &self.matcher {
            Matcher::Filter(predicate) => predicate(event).then(|| MatchCaptures {
                args: event.text.clone(),
                groups: Vec::new(),
            }),
            Matcher::Regex(regex) => {
                let caps = regex.captures(&event.text)?;
                let groups: Vec<Option<String>> = caps
                    .iter()
                    .map(|m| m.map(|m| m.as_str().to_string()))
                    .collect();
                let args = caps
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Some(MatchCaptures { args, groups })
            }
        }
    }
}

/// Builds the command regex: prefix, one of the names, then end-of-input or a
/// single whitespace separator, with the remainder captured as group 1.
pub fn command_regex_source(prefix: &str, names: &[String]) -> String {
    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"(?is)^{}(?:{})(?:\s|$)(.*)", regex::escape(prefix), alternation)
}

/// Prepends `^` unless the pattern is already start-anchored.
pub fn anchor_pattern(pattern: &str) -> String {
    if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        format!("^{pattern}")
    }
}

fn build_regex(source: &str) -> CoreResult<Regex> {
    Regex::new(source).map_err(|e| CoreError::InvalidSpecification(format!("{source}: {e}")))
}

fn normalize_command(prefix: &str, name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    let stripped = if prefix.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(prefix).unwrap_or(trimmed)
    };
    if stripped.is_empty() {
        return Err(CoreError::InvalidSpecification(format!(
            "empty command name `{name}`"
        )));
    }
    Ok(stripped.to_lowercase())
}

/// Compiles `spec` against the trigger `prefix`. Pure and deterministic.
pub fn compile(spec: &CommandSpec, prefix: &str) -> CoreResult<CompiledMatcher> {
    let description = spec
        .description
        .clone()
        .unwrap_or_else(|| crate::strings::help::NO_DESCRIPTION.to_string());
    let category = spec
        .category
        .as_deref()
        .unwrap_or("other")
        .to_lowercase();

    if let Some(filter) = &spec.filter {
        return Ok(CompiledMatcher {
            matcher: Matcher::Filter(filter.clone()),
            direction: spec.direction.unwrap_or(Direction::Any),
            kinds: spec.kinds.clone().unwrap_or_else(|| vec![EventKind::NewMessage]),
            chats: spec.chats.clone(),
            exclusive: spec.exclusive.unwrap_or(false),
            meta: MatcherMeta {
                commands: Vec::new(),
                description,
                category,
                usage: spec.usage.clone().unwrap_or_else(|| PATTERN_USAGE.to_string()),
                pattern: None,
                admin_only: spec.admin_only,
                owner_only: spec.owner_only,
            },
        });
    }

    let supplied = [
        !spec.commands.is_empty(),
        spec.pattern.is_some(),
        spec.compiled.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();
    if supplied != 1 {
        return Err(CoreError::InvalidSpecification(format!(
            "exactly one of command names, pattern or filter is required, got {supplied}"
        )));
    }

    let (regex, commands) = match (&spec.pattern, &spec.compiled) {
        _ if !spec.commands.is_empty() => {
            let names = spec
                .commands
                .iter()
                .map(|name| normalize_command(prefix, name))
                .collect::<CoreResult<Vec<_>>>()?;
            (build_regex(&command_regex_source(prefix, &names))?, names)
        }
        (Some(pattern), _) => (build_regex(&anchor_pattern(pattern))?, Vec::new()),
        (None, Some(compiled)) => (compiled.clone(), Vec::new()),
        (None, None) => {
            return Err(CoreError::InvalidSpecification(
                "no trigger supplied".to_string(),
            ));
        }
    };
    let command_style = !commands.is_empty();

    let usage = spec.usage.clone().unwrap_or_else(|| match commands.first() {
        Some(first) => format!(
            "{prefix}{}",
            first.split_whitespace().next().unwrap_or(first)
        ),
        None => PATTERN_USAGE.to_string(),
    });

    Ok(CompiledMatcher {
        meta: MatcherMeta {
            commands,
            description,
            category,
            usage,
            pattern: Some(regex.as_str().to_string()),
            admin_only: spec.admin_only,
            owner_only: spec.owner_only,
        },
        matcher: Matcher::Regex(regex),
        direction: spec.direction.unwrap_or(Direction::Outgoing),
        kinds: spec.kinds.clone().unwrap_or_else(|| vec![EventKind::NewMessage]),
        chats: spec.chats.clone(),
        exclusive: spec.exclusive.unwrap_or(command_style),
    })
}
