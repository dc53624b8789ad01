//! `.ping` / `.p`: edits the command into a pong with the round-trip time.

use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

use crate::application::handler::{Callback, HandlerContext, RateLimit, handler};
use crate::application::pattern::CommandSpec;
use crate::application::registry::{HandlerRegistry, RegistrationId};
use crate::domain::error::CoreResult;
use crate::strings::messages;

pub const WINDOW: Duration = Duration::from_secs(5);

pub fn register(registry: &mut HandlerRegistry) -> CoreResult<RegistrationId> {
    registry.register_with(
        "user/ping:ping",
        CommandSpec::command(["ping", "p"])
            .category("tools")
            .description("Checks the response latency."),
        Callback::Single(handler(handle_ping)),
        Some(RateLimit::per(WINDOW)),
    )
}

pub async fn handle_ping(ctx: HandlerContext) -> Result<()> {
    let started = Instant::now();
    ctx.edit(messages::PONG_PENDING).await?;
    ctx.edit(&messages::pong(started.elapsed())).await
}
