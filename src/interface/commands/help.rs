//! # Help Command
//!
//! `.help` lists every command by category; `.help <name>` shows one command.

use anyhow::Result;
use std::sync::{Arc, OnceLock};

use crate::application::handler::{Callback, HandlerContext, handler};
use crate::application::pattern::CommandSpec;
use crate::application::registry::{CommandInfo, HandlerRegistry, RegistrationId};
use crate::domain::error::CoreResult;
use crate::strings::help;

/// Snapshot of the registry's `describe()` output, published once
/// registration is complete.
#[derive(Clone, Default)]
pub struct Catalog(Arc<OnceLock<Vec<CommandInfo>>>);

impl Catalog {
    pub fn publish(&self, registry: &HandlerRegistry) {
        if self.0.set(registry.describe()).is_err() {
            tracing::warn!("Help catalog was already published");
        }
    }

    pub fn entries(&self) -> &[CommandInfo] {
        self.0.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, name: &str) -> Option<&CommandInfo> {
        self.entries()
            .iter()
            .find(|info| info.commands.iter().any(|command| command == name))
    }
}

pub fn register(registry: &mut HandlerRegistry, catalog: Catalog) -> CoreResult<RegistrationId> {
    let usage = format!("{}help [command]", registry.prefix());
    registry.register(
        "user/help:help",
        CommandSpec::command(["help"])
            .category("user")
            .description("Shows the command list, or details for one command.")
            .usage(&usage),
        Callback::Single(handler(move |ctx| {
            let catalog = catalog.clone();
            async move { handle_help(&ctx, &catalog).await }
        })),
    )
}

pub async fn handle_help(ctx: &HandlerContext, catalog: &Catalog) -> Result<()> {
    let prefix = ctx.config().prefix.as_str();
    let query = ctx.args().split_whitespace().next().unwrap_or("");

    let text = if query.is_empty() {
        help::render_index(prefix, catalog.entries())
    } else {
        let name = query.strip_prefix(prefix).unwrap_or(query).to_lowercase();
        match catalog.find(&name) {
            Some(info) => help::render_command(prefix, info),
            None => help::unknown_command(query),
        }
    };
    ctx.edit(&text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatcher;
    use crate::application::testing;
    use crate::domain::event::Event;

    async fn setup() -> (Dispatcher, Arc<testing::RecordingSink>) {
        let mut registry = HandlerRegistry::new(".");
        let catalog = Catalog::default();
        register(&mut registry, catalog.clone()).unwrap();
        crate::interface::commands::ping::register(&mut registry).unwrap();
        catalog.publish(&registry);

        let (services, sink) = testing::services();
        (Dispatcher::new(Arc::new(registry), services), sink)
    }

    #[tokio::test]
    async fn test_help_index_groups_by_category() {
        let (dispatcher, sink) = setup().await;
        dispatcher.dispatch(Event::message(1, 1, 1, ".help").outgoing()).await;

        let texts = sink.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("**📂 Tools**\n* ping:"));
        assert!(texts[0].contains("**📂 User**\n* help:"));
    }

    #[tokio::test]
    async fn test_help_for_one_command() {
        let (dispatcher, sink) = setup().await;
        dispatcher.dispatch(Event::message(1, 1, 1, ".help .P").outgoing()).await;
        dispatcher.dispatch(Event::message(1, 2, 1, ".help nope").outgoing()).await;

        let texts = sink.texts();
        assert!(texts[0].contains("`.ping | .p`"));
        assert_eq!(texts[1], help::unknown_command("nope"));
    }
}
