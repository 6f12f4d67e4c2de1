//! Recovering log levels from colored step output.

use regex::Regex;
use std::sync::LazyLock;

use crate::level::Level;

/// Leading escape, escape-free text, reset, trailing whitespace.
static COLORED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\A(\x1b\[[^m]*m)([^\x1b]*)\x1b\[0m(\s*)\z").ok());

/// Classify a colored message.
///
/// A message maps to a level only if it starts with that level's color, the
/// only other escape sequence in it is the reset, and nothing but whitespace
/// follows the reset. The escapes are stripped in that case. Anything else is
/// [`Level::Normal`] and returned unchanged.
#[must_use]
pub fn convert_colored_string(message: &str) -> (Level, String) {
    COLORED
        .as_ref()
        .and_then(|regex| regex.captures(message))
        .and_then(|caps| {
            let color = caps.get(1)?.as_str();
            let level = Level::COLORED
                .into_iter()
                .find(|level| level.color() == Some(color))?;
            let text = caps.get(2)?.as_str();
            let trailing = caps.get(3)?.as_str();
            Some((level, format!("{text}{trailing}")))
        })
        .unwrap_or_else(|| (Level::Normal, message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(message: &str, level: Level, expected: &str) {
        let (got_level, got) = convert_colored_string(message);
        assert_eq!(got_level, level, "level of {message:?}");
        assert_eq!(got, expected, "text of {message:?}");
    }

    #[test]
    fn test_plain_message() {
        check(
            "This is a normal message without a color literal\n",
            Level::Normal,
            "This is a normal message without a color literal\n",
        );
    }

    #[test]
    fn test_level_colors() {
        check("\u{1b}[31;1mThis is an error\u{1b}[0m", Level::Error, "This is an error");
        check("\u{1b}[33;1mThis is a warning\u{1b}[0m", Level::Warn, "This is a warning");
        check("\u{1b}[34;1mThis is an Info\u{1b}[0m", Level::Info, "This is an Info");
        check(
            "\u{1b}[32;1mThis is a done message\u{1b}[0m",
            Level::Done,
            "This is a done message",
        );
        check(
            "\u{1b}[35;1mThis is a debug message\u{1b}[0m",
            Level::Debug,
            "This is a debug message",
        );
    }

    #[test]
    fn test_trailing_whitespace_kept() {
        check("\u{1b}[31;1mLast error\u{1b}[0m   \n", Level::Error, "Last error   \n");
    }

    #[test]
    fn test_leading_whitespace_is_normal() {
        let message = "  \u{1b}[31;1mLast error\u{1b}[0m   \n";
        check(message, Level::Normal, message);
    }

    #[test]
    fn test_missing_reset_is_normal() {
        let message = "\u{1b}[31;1mAnother error\n";
        check(message, Level::Normal, message);
    }

    #[test]
    fn test_embedded_colors_are_normal() {
        let message =
            "\u{1b}[34;1mThis is \u{1b}[33;1mmulti color \u{1b}[31;1mInfo message\u{1b}[0m";
        check(message, Level::Normal, message);
    }

    #[test]
    fn test_unknown_color_is_normal() {
        let message = "\u{1b}[1mbold\u{1b}[0m";
        check(message, Level::Normal, message);
    }

    #[test]
    fn test_text_after_reset_is_normal() {
        let message = "\u{1b}[32;1mok\u{1b}[0m and more";
        check(message, Level::Normal, message);
    }
}
