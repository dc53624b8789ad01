//! # Access Control
//!
//! Enforces the `admin_only` / `owner_only` registration flags. A denied sender
//! sees a short notice in place of the triggering message, which is then deleted.

use std::time::Duration;

use crate::application::handler::HandlerContext;
use crate::application::pattern::MatcherMeta;
use crate::domain::config::AppConfig;
use crate::strings::messages;

/// How long the denial notice stays before the message is deleted.
pub const DENIAL_NOTICE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied(&'static str),
}

/// Events without a sender are denied for restricted handlers.
pub fn check(meta: &MatcherMeta, sender_id: Option<i64>, config: &AppConfig) -> Access {
    if meta.owner_only && !sender_id.is_some_and(|id| config.is_owner(id)) {
        return Access::Denied(messages::OWNER_ONLY);
    }
    if meta.admin_only && !sender_id.is_some_and(|id| config.is_admin(id)) {
        return Access::Denied(messages::ADMIN_ONLY);
    }
    Access::Granted
}

pub async fn deny(ctx: &HandlerContext, notice: &str) {
    tracing::warn!(
        sender = ?ctx.event.sender_id,
        chat = ctx.event.chat_id,
        "Unauthorized use of a restricted command"
    );
    if let Err(e) = ctx.edit(notice).await {
        tracing::debug!("Could not show denial notice: {e:#}");
    }
    tokio::time::sleep(DENIAL_NOTICE).await;
    if let Err(e) = ctx
        .sink()
        .delete_message(ctx.event.chat_id, ctx.event.message_id)
        .await
    {
        tracing::debug!("Could not delete denied message: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{self, Action};
    use crate::domain::event::Event;

    fn meta(admin_only: bool, owner_only: bool) -> MatcherMeta {
        MatcherMeta {
            commands: vec!["x".to_string()],
            description: String::new(),
            category: "other".to_string(),
            usage: ".x".to_string(),
            pattern: None,
            admin_only,
            owner_only,
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            owner_id: Some(1),
            admin_ids: vec![2],
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_check_flags() {
        let config = config();
        assert_eq!(check(&meta(false, false), None, &config), Access::Granted);

        let admin = meta(true, false);
        assert_eq!(check(&admin, Some(1), &config), Access::Granted);
        assert_eq!(check(&admin, Some(2), &config), Access::Granted);
        assert_eq!(check(&admin, Some(3), &config), Access::Denied(messages::ADMIN_ONLY));
        assert_eq!(check(&admin, None, &config), Access::Denied(messages::ADMIN_ONLY));

        let owner = meta(false, true);
        assert_eq!(check(&owner, Some(1), &config), Access::Granted);
        assert_eq!(check(&owner, Some(2), &config), Access::Denied(messages::OWNER_ONLY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_edits_then_deletes() {
        let (services, sink) = testing::services();
        let ctx = testing::context(&services, Event::message(5, 50, 3, ".x"), "");

        deny(&ctx, messages::ADMIN_ONLY).await;

        assert_eq!(
            sink.actions(),
            vec![
                Action::Edit {
                    chat: 5,
                    message: 50,
                    text: messages::ADMIN_ONLY.to_string()
                },
                Action::Delete {
                    chat: 5,
                    message: 50
                },
            ]
        );
    }
}
