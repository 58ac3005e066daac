use std::sync::{Arc, OnceLock};

use chatmux_routing::{HandlerFn, RouteInfo, handler_fn};

/// Path the help handler is registered under.
pub const HELP_ROUTE: &str = "/help";

/// One line per route: the path, then its description if it has one.
pub fn format_help(routes: &[RouteInfo]) -> String {
    routes
        .iter()
        .map(|route| match &route.description {
            Some(description) => format!("{} - {description}", route.path),
            None => route.path.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Handler replying with the route listing.
///
/// The listing is filled in once registration is finished, so routes added
/// after the help handler itself still show up.
pub fn help_handler(routes: Arc<OnceLock<String>>) -> HandlerFn {
    handler_fn(move |message| {
        let routes = Arc::clone(&routes);
        async move {
            let text = routes.get().map(String::as_str).unwrap_or_default();
            if text.is_empty() {
                message.reply("No commands registered.").await?;
            } else {
                message.reply(text).await?;
            }
            Ok(())
        }
    })
}
