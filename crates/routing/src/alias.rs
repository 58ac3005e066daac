use std::{borrow::Cow, collections::HashMap};

/// Alternative spellings for routes, e.g. a keyboard label standing in for a
/// command.
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    routes: HashMap<String, String>,
}

impl Aliases {
    pub fn insert(&mut self, route: &str, aliases: &[&str]) {
        for alias in aliases {
            self.routes.insert(alias.trim().to_string(), route.to_string());
        }
    }

    /// Rewrite `input` if it starts with an alias.
    ///
    /// The whole (trimmed) input is tried first so multi-word labels work;
    /// otherwise only the first token is replaced and the remainder kept.
    pub fn resolve<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if let Some(route) = self.routes.get(input.trim()) {
            return Cow::Owned(route.clone());
        }
        let Some((first, rest)) = input.split_once(char::is_whitespace) else {
            return Cow::Borrowed(input);
        };
        match self.routes.get(first) {
            Some(route) => Cow::Owned(format!("{route} {rest}")),
            None => Cow::Borrowed(input),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
