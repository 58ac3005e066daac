use std::sync::Arc;

use {
    chatmux_channels::{Principal, gating},
    tracing::info,
};

use crate::middleware::{Middleware, middleware_fn};

/// Allowlist middleware: messages from anyone not matching `allow` get an
/// "Access denied" reply and never reach the handler.
pub fn new_auth(allow: Vec<Principal>) -> Middleware {
    let allow: Arc<[Principal]> = allow.into();
    middleware_fn(move |message, next| {
        let allow = Arc::clone(&allow);
        async move {
            if gating::is_allowed(&message.inbound, &allow) {
                return next(message).await;
            }
            let who = message
                .from()
                .username
                .clone()
                .unwrap_or_else(|| message.from().id.to_string());
            info!(
                conversation_id = %message.conversation_id(),
                user = %who,
                "access denied"
            );
            message.reply(format!("Access denied for user {who}")).await?;
            Ok(())
        }
    })
}
