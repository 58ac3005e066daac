use {chatmux_common::types::ConversationId, serde::Serialize};

/// Why an update never reached a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
    /// The update carried no message body.
    NoMessage,
    /// Nothing matched and there is no default (or file) handler.
    NoHandler,
    /// The mux failed, e.g. session storage was unreachable.
    ResolveFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed,
    HandlerError(String),
    HandlerPanicked(String),
    Dropped(DropReason),
}

/// What happened to one update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub update_id: i64,
    pub conversation_id: Option<ConversationId>,
    /// Route of the handler that ran.
    pub handler: Option<String>,
    pub replies_forwarded: usize,
    pub send_failures: usize,
    pub outcome: DispatchOutcome,
}

impl DispatchReport {
    pub(crate) fn dropped(
        update_id: i64,
        conversation_id: Option<ConversationId>,
        reason: DropReason,
    ) -> Self {
        Self {
            update_id,
            conversation_id,
            handler: None,
            replies_forwarded: 0,
            send_failures: 0,
            outcome: DispatchOutcome::Dropped(reason),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == DispatchOutcome::Completed
    }
}
