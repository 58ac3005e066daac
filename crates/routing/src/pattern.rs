//! Route patterns with `{name}` placeholders.
//!
//! `"/say {text}"` compiles to `^/say (.*)$` with the variable list
//! `["text"]`. Literal text is matched verbatim, so regex metacharacters in
//! a route need no escaping.

use {chatmux_channels::Vars, regex::Regex};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    /// Compile `pattern` once; matching never recompiles.
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut expr = String::from("(?s)^");
        let mut names = Vec::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            let name = rest[open + 1..close].trim();
            if name.is_empty() {
                return Err(Error::invalid_pattern(pattern, "empty placeholder"));
            }
            if name.contains('{') {
                return Err(Error::invalid_pattern(pattern, "nested placeholder"));
            }
            if names.iter().any(|existing| existing == name) {
                return Err(Error::invalid_pattern(
                    pattern,
                    format!("placeholder '{name}' appears twice"),
                ));
            }
            expr.push_str(&regex::escape(&rest[..open]));
            expr.push_str("(.*)");
            names.push(name.to_string());
            rest = &rest[close + 1..];
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| Error::invalid_pattern(pattern, e))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names, left to right.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Match the whole of `input`, returning the captured variables.
    pub fn captures(&self, input: &str) -> Option<Vars> {
        let caps = self.regex.captures(input)?;
        Some(
            self.names
                .iter()
                .zip(caps.iter().skip(1))
                .map(|(name, value)| (name.as_str(), value.map_or("", |m| m.as_str())))
                .collect(),
        )
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("/start", "/start", Some(vec![]))]
    #[case("/start", "/start now", None)]
    #[case("/say {text}", "/say hello world", Some(vec!["hello world"]))]
    #[case("/say {text}", "/say", None)]
    #[case("/say {text}", "/say ", Some(vec![""]))]
    #[case("/add {a} {b}", "/add 1 2", Some(vec!["1", "2"]))]
    #[case("{cmd}", "anything", Some(vec!["anything"]))]
    #[case("/price $.{n}", "/price $.99", Some(vec!["99"]))]
    #[case("/price $.{n}", "/price $x99", None)]
    fn match_cases(#[case] pattern: &str, #[case] input: &str, #[case] expected: Option<Vec<&str>>) {
        let compiled = Pattern::compile(pattern).unwrap();
        let vars = compiled.captures(input);
        assert_eq!(vars.as_ref().map(Vars::values), expected);
    }

    #[test]
    fn captures_follow_placeholder_order() {
        let pattern = Pattern::compile("/move {from} to {to}").unwrap();
        assert_eq!(pattern.names(), ["from", "to"]);

        let vars = pattern.captures("/move kitchen to garden").unwrap();
        let pairs: Vec<_> = vars.iter().collect();
        assert_eq!(pairs, [("from", "kitchen"), ("to", "garden")]);
    }

    #[test]
    fn multiline_input_is_captured() {
        let pattern = Pattern::compile("/note {body}").unwrap();
        let vars = pattern.captures("/note line one\nline two").unwrap();
        assert_eq!(vars.get("body"), Some("line one\nline two"));
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let pattern = Pattern::compile("/set {x").unwrap();
        assert!(pattern.names().is_empty());
        assert!(pattern.is_match("/set {x"));
    }

    #[rstest]
    #[case("/say {}")]
    #[case("/say { }")]
    #[case("/x {a} {a}")]
    fn invalid_patterns(#[case] pattern: &str) {
        let err = Pattern::compile(pattern).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
