//! The demo bot: a small pet menu that exercises navigation, captured
//! variables, both keyboard kinds, shared contacts and locations, and
//! document uploads.

use {
    chatmux_channels::{KeyboardButton, ReplyOptions, buttons, inline_buttons},
    chatmux_common::types::PayloadKind,
    chatmux_dispatch::{Result, Server},
    chatmux_routing::{ROUTE_BACK, ROUTE_ROOT, handler_fn},
    tracing::info,
};

/// Uploaded documents are saved here, relative to the working directory.
const DOWNLOAD_DIR: &str = "downloads";

pub fn register(server: &mut Server) -> Result<()> {
    server.handle_func(
        "/",
        handler_fn(|message| async move {
            message
                .reply_keyboard("Main menu", main_keyboard(), false)
                .await?;
            Ok(())
        }),
        Some("main menu"),
    )?;

    server.handle_func(
        "/pets",
        handler_fn(|message| async move {
            let rows = buttons([vec!["Cat", "Dog"], vec!["Back", "Home"]]);
            message.reply_keyboard("Pick a pet", rows, false).await?;
            Ok(())
        }),
        Some("browse pets"),
    )?;

    server.handle_func(
        "/pets/cat",
        handler_fn(|message| async move {
            let rows = inline_buttons([vec![("Adopt", "/adopt"), ("Back", ROUTE_BACK)]]);
            message
                .reply_inline_keyboard("Meow. Take this cat home?", rows)
                .await?;
            Ok(())
        }),
        Some("meet the cat"),
    )?;

    server.handle(
        "/pets/cat/adopt",
        "Congratulations, the cat is yours.",
        Some("adopt the cat"),
    )?;

    server.handle_func(
        "/pets/dog",
        handler_fn(|message| async move {
            let options = ReplyOptions {
                disable_preview: true,
                markdown: true,
            };
            message
                .reply_with(
                    "*Woof* [Read about dogs](https://en.wikipedia.org/wiki/Dog)",
                    options,
                )
                .await?;
            Ok(())
        }),
        Some("meet the dog"),
    )?;

    server.handle_func(
        "/say {text}",
        handler_fn(|message| async move {
            let text = message.var("text").unwrap_or_default().to_string();
            message.reply(text).await?;
            Ok(())
        }),
        Some("repeat after me"),
    )?;

    server.handle_default(
        handler_fn(|message| async move {
            match message.kind() {
                PayloadKind::Location => {
                    if let Some(location) = message.inbound.location {
                        message
                            .reply(format!(
                                "You are at {:.4}, {:.4}",
                                location.latitude, location.longitude
                            ))
                            .await?;
                        message
                            .reply_location(location.latitude, location.longitude)
                            .await?;
                    }
                },
                PayloadKind::Contact => {
                    let name = message
                        .inbound
                        .contact
                        .as_ref()
                        .map(|c| c.first_name.clone())
                        .unwrap_or_default();
                    message.reply(format!("Thanks, {name}")).await?;
                },
                _ => {
                    message
                        .reply(format!("Sorry, I don't understand \"{}\"", message.text()))
                        .await?;
                },
            }
            Ok(())
        }),
        Some("anything else"),
    );

    server.handle_file(
        handler_fn(|message| async move {
            let path = message.download(DOWNLOAD_DIR).await?;
            info!(path = %path.display(), "document saved");
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            message.reply(format!("Saved {name}")).await?;
            Ok(())
        }),
        Some("save uploaded documents"),
    );

    server.set_alias(ROUTE_ROOT, &["Home", "/start"]);
    server.set_alias(ROUTE_BACK, &["Back"]);
    server.set_alias("/pets", &["Pets"]);
    server.set_alias("/cat", &["Cat"]);
    server.set_alias("/dog", &["Dog"]);
    server.set_alias("/say", &["Say"]);

    Ok(())
}

fn main_keyboard() -> Vec<Vec<KeyboardButton>> {
    let mut rows = buttons([vec!["Pets", "Say hello"]]);
    rows.push(vec![
        KeyboardButton::RequestContact("Share contact".into()),
        KeyboardButton::RequestLocation("Share location".into()),
    ]);
    rows
}
