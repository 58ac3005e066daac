use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    chatmux_channels::{
        ChannelOutbound, FileSource, InlineAction, InlineButton, KeyboardButton, Reply,
        ReplyKind, ReplyOptions,
    },
    chatmux_common::types::ConversationId,
    teloxide::{
        Bot, RequestError,
        payloads::{SendMessageSetters, SendPhotoSetters},
        requests::Requester,
        types::{
            self, ButtonRequest, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup,
            InputFile, KeyboardMarkup, LinkPreviewOptions, ParseMode,
        },
    },
    tracing::{debug, warn},
};

use crate::{Error, Result};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends [`Reply`] values through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn deliver(&self, reply: &Reply) -> Result<()> {
        let chat_id = ChatId(reply.chat_id.0);
        let bot = &self.bot;

        match &reply.kind {
            ReplyKind::Text { text, options } => {
                let options = *options;
                self.with_retry(chat_id, "send message", || {
                    let req = with_text_options(bot.send_message(chat_id, text), options);
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Sticker { file } => {
                let input = input_file(file)?;
                self.with_retry(chat_id, "send sticker", || {
                    let req = bot.send_sticker(chat_id, input.clone());
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Photo { file, caption } => {
                let input = input_file(file)?;
                self.with_retry(chat_id, "send photo", || {
                    let mut req = bot.send_photo(chat_id, input.clone());
                    if let Some(caption) = caption {
                        req = req.caption(caption);
                    }
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Audio { file } => {
                let input = input_file(file)?;
                self.with_retry(chat_id, "send audio", || {
                    let req = bot.send_audio(chat_id, input.clone());
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Document { file } => {
                let input = input_file(file)?;
                self.with_retry(chat_id, "send document", || {
                    let req = bot.send_document(chat_id, input.clone());
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Keyboard {
                text,
                rows,
                one_time,
            } => {
                let markup = reply_keyboard(rows, *one_time);
                self.with_retry(chat_id, "send keyboard", || {
                    let req = bot.send_message(chat_id, text).reply_markup(markup.clone());
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::InlineKeyboard { text, rows } => {
                let markup = inline_keyboard(rows)?;
                self.with_retry(chat_id, "send inline keyboard", || {
                    let req = bot.send_message(chat_id, text).reply_markup(markup.clone());
                    async move { req.await }
                })
                .await?;
            },
            ReplyKind::Location {
                latitude,
                longitude,
            } => {
                let (latitude, longitude) = (*latitude, *longitude);
                self.with_retry(chat_id, "send location", || {
                    let req = bot.send_location(chat_id, latitude, longitude);
                    async move { req.await }
                })
                .await?;
            },
        }
        Ok(())
    }

    /// Run `request`, sleeping and retrying while Telegram answers with
    /// `RetryAfter`.
    async fn with_retry<T, F, Fut>(
        &self,
        chat_id: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = chat_id.0,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
        debug!(
            chat_id = reply.chat_id.0,
            kind = reply.kind_name(),
            "sending telegram reply"
        );
        self.deliver(reply).await?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: ConversationId) -> anyhow::Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id.0), ChatAction::Typing)
            .await?;
        Ok(())
    }
}

fn with_text_options<R: SendMessageSetters>(mut req: R, options: ReplyOptions) -> R {
    if options.markdown {
        req = req.parse_mode(ParseMode::MarkdownV2);
    }
    if options.disable_preview {
        req = req.link_preview_options(LinkPreviewOptions {
            is_disabled: true,
            url: None,
            prefer_small_media: false,
            prefer_large_media: false,
            show_above_text: false,
        });
    }
    req
}

fn input_file(file: &FileSource) -> Result<InputFile> {
    Ok(match file {
        FileSource::Path(path) => InputFile::file(path.clone()),
        FileSource::Url(url) => InputFile::url(parse_url(url)?),
        FileSource::FileId(id) => InputFile::file_id(id.clone()),
    })
}

fn parse_url(url: &str) -> Result<reqwest::Url> {
    url.parse()
        .map_err(|e| Error::external(format!("invalid url {url:?}"), e))
}

fn reply_keyboard(rows: &[Vec<KeyboardButton>], one_time: bool) -> KeyboardMarkup {
    let keyboard = rows.iter().map(|row| {
        row.iter()
            .map(|button| match button {
                KeyboardButton::Text(text) => types::KeyboardButton::new(text.clone()),
                KeyboardButton::RequestContact(text) => {
                    types::KeyboardButton::new(text.clone()).request(ButtonRequest::Contact)
                },
                KeyboardButton::RequestLocation(text) => {
                    types::KeyboardButton::new(text.clone()).request(ButtonRequest::Location)
                },
            })
            .collect::<Vec<_>>()
    });

    let markup = KeyboardMarkup::new(keyboard).resize_keyboard();
    if one_time {
        markup.one_time_keyboard()
    } else {
        markup
    }
}

fn inline_keyboard(rows: &[Vec<InlineButton>]) -> Result<InlineKeyboardMarkup> {
    let rows = rows
        .iter()
        .map(|row| row.iter().map(inline_button).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<_>>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

fn inline_button(button: &InlineButton) -> Result<InlineKeyboardButton> {
    Ok(match &button.action {
        InlineAction::Callback(data) => InlineKeyboardButton::callback(&button.text, data),
        InlineAction::Url(url) => InlineKeyboardButton::url(&button.text, parse_url(url)?),
    })
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chatmux_channels::{buttons, inline_buttons},
        teloxide::types::InlineKeyboardButtonKind,
    };

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(std::io::Error::other("boom"));
        assert_eq!(retry_after_duration(&err), None);
    }

    #[test]
    fn reply_keyboard_keeps_rows_and_requests() {
        let mut rows = buttons([vec!["Pets", "Say"], vec!["Back"]]);
        rows.push(vec![
            KeyboardButton::RequestContact("Share phone".into()),
            KeyboardButton::RequestLocation("Share location".into()),
        ]);

        let markup = reply_keyboard(&rows, true);
        assert!(markup.one_time_keyboard);
        assert!(markup.resize_keyboard);
        assert_eq!(markup.keyboard.len(), 3);
        assert_eq!(markup.keyboard[0][1].text, "Say");
        assert!(markup.keyboard[0][0].request.is_none());
        assert!(matches!(
            markup.keyboard[2][0].request,
            Some(ButtonRequest::Contact)
        ));
        assert!(matches!(
            markup.keyboard[2][1].request,
            Some(ButtonRequest::Location)
        ));

        assert!(!reply_keyboard(&rows, false).one_time_keyboard);
    }

    #[test]
    fn inline_keyboard_maps_actions() {
        let mut rows = inline_buttons([vec![("Cat", "/cat"), ("Dog", "/dog")]]);
        rows.push(vec![InlineButton::url("Docs", "https://core.telegram.org/bots")]);

        let markup = inline_keyboard(&rows).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert!(matches!(
            &markup.inline_keyboard[0][1].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "/dog"
        ));
        assert!(matches!(
            &markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::Url(url) if url.as_str() == "https://core.telegram.org/bots"
        ));
    }

    #[test]
    fn bad_button_url_is_rejected() {
        let rows = vec![vec![InlineButton::url("Broken", "not a url")]];
        let err = inline_keyboard(&rows).unwrap_err();
        assert!(err.to_string().contains("invalid url"));
    }

    #[test]
    fn file_sources_convert() {
        assert!(input_file(&FileSource::Url("https://example.com/cat.png".into())).is_ok());
        assert!(input_file(&FileSource::FileId("CAACAgIAAxkBAAE".into())).is_ok());
        assert!(input_file(&FileSource::Path("cat.png".into())).is_ok());
        assert!(input_file(&FileSource::Url("::".into())).is_err());
    }
}
