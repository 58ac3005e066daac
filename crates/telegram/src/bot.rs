use std::time::Duration;

use {
    chatmux_common::types::Update,
    teloxide::{
        ApiError, Bot, RequestError,
        payloads::GetUpdatesSetters,
        requests::{Request, Requester},
        types::AllowedUpdate,
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{Result, config::TelegramConfig, inbound, outbound::TelegramOutbound};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A bot whose credentials have been checked and whose webhook is cleared.
pub struct TelegramBot {
    bot: Bot,
    username: Option<String>,
    poll_timeout_secs: u32,
}

impl TelegramBot {
    /// Build the client, verify the token with `getMe` and delete any
    /// webhook so long polling works.
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        // The client timeout must outlive the long poll or idle polls abort.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.request_timeout())
            .build()?;
        let bot = Bot::with_client(config.token(), client);

        let me = bot.get_me().await?;
        let username = me.username.clone();

        bot.delete_webhook().send().await?;

        info!(username = ?username, "telegram bot connected (webhook cleared)");

        Ok(Self {
            bot,
            username,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// The bot's `@username`, used to trim `/command@username`.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn outbound(&self) -> TelegramOutbound {
        TelegramOutbound::new(self.bot.clone())
    }

    /// Spawn the polling loop. Converted updates are pushed into `tx`; the
    /// loop ends when the token is cancelled, `tx` is closed, or another
    /// process starts polling with the same token.
    pub fn start_polling(&self, tx: mpsc::Sender<Update>) -> CancellationToken {
        let cancel = CancellationToken::new();
        tokio::spawn(poll_updates(
            self.bot.clone(),
            self.poll_timeout_secs,
            tx,
            cancel.clone(),
        ));
        cancel
    }
}

async fn poll_updates(
    bot: Bot,
    poll_timeout_secs: u32,
    tx: mpsc::Sender<Update>,
    cancel: CancellationToken,
) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    let id = i64::from(update.id.0);

                    let message = match inbound::from_update_kind(&bot, update.kind).await {
                        Ok(message) => message,
                        Err(e) => {
                            error!(update_id = id, error = %e, "failed to convert telegram update");
                            None
                        },
                    };

                    if tx.send(Update { id, message }).await.is_err() {
                        info!("update channel closed, stopping telegram polling");
                        return;
                    }
                }
            },
            Err(e) => {
                if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                    warn!("telegram polling stopped: another instance is already running with this token");
                    cancel.cancel();
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}
