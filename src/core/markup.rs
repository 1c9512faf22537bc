//! Inline color markup
//!
//! Messages may carry tags like `<red>failed</red>` or `<bold><u>hot</u></bold>`.
//! With color enabled the tags become ANSI escapes; with color disabled the
//! tags are stripped and their content kept verbatim. Stray `<` / `>` and
//! unknown tags are emitted literally, and tags left open at end-of-string
//! are closed there.

/// How markup tags are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkupMode {
    /// Replace tags with ANSI escape sequences.
    Colorize,
    /// Remove tags, keep their textual content.
    Strip,
}

/// Convert a tag name to its ANSI escape sequence.
fn tag_to_ansi(tag: &str) -> Option<&'static str> {
    match tag.to_ascii_lowercase().as_str() {
        "black" => Some("\x1b[30m"),
        "red" => Some("\x1b[31m"),
        "green" => Some("\x1b[32m"),
        "yellow" => Some("\x1b[33m"),
        "blue" => Some("\x1b[34m"),
        "magenta" => Some("\x1b[35m"),
        "cyan" => Some("\x1b[36m"),
        "white" => Some("\x1b[37m"),

        "bright_black" => Some("\x1b[90m"),
        "bright_red" => Some("\x1b[91m"),
        "bright_green" => Some("\x1b[92m"),
        "bright_yellow" => Some("\x1b[93m"),
        "bright_blue" => Some("\x1b[94m"),
        "bright_magenta" => Some("\x1b[95m"),
        "bright_cyan" => Some("\x1b[96m"),
        "bright_white" => Some("\x1b[97m"),

        "bold" | "b" => Some("\x1b[1m"),
        "dim" => Some("\x1b[2m"),
        "italic" | "i" => Some("\x1b[3m"),
        "underline" | "u" => Some("\x1b[4m"),
        "strike" | "s" => Some("\x1b[9m"),

        _ => None,
    }
}

/// Resolve markup in `text` according to `mode`.
pub fn render_markup(text: &str, mode: MarkupMode) -> String {
    if !text.contains('<') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    // Stack of active ANSI codes; closing a tag restores the enclosing run.
    let mut style_stack: Vec<&'static str> = Vec::new();

    while let Some(c) = chars.next() {
        if c != '<' {
            result.push(c);
            continue;
        }

        let is_closing = chars.peek() == Some(&'/');
        if is_closing {
            chars.next();
        }

        let mut tag = String::new();
        let mut found_close = false;
        while let Some(&ch) = chars.peek() {
            if ch == '>' {
                chars.next();
                found_close = true;
                break;
            }
            if ch == '<' {
                break;
            }
            tag.push(chars.next().unwrap());
        }

        if !found_close {
            // Dangling bracket; emit everything consumed so far literally.
            result.push('<');
            if is_closing {
                result.push('/');
            }
            result.push_str(&tag);
            continue;
        }

        if is_closing {
            if tag_to_ansi(&tag).is_some() && !style_stack.is_empty() {
                style_stack.pop();
                if mode == MarkupMode::Colorize {
                    result.push_str("\x1b[0m");
                    for s in &style_stack {
                        result.push_str(s);
                    }
                }
            } else {
                result.push_str("</");
                result.push_str(&tag);
                result.push('>');
            }
        } else if let Some(ansi) = tag_to_ansi(&tag) {
            style_stack.push(ansi);
            if mode == MarkupMode::Colorize {
                result.push_str(ansi);
            }
        } else {
            result.push('<');
            result.push_str(&tag);
            result.push('>');
        }
    }

    if !style_stack.is_empty() && mode == MarkupMode::Colorize {
        result.push_str("\x1b[0m");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_colorize() {
        let result = render_markup("<red>error</red>", MarkupMode::Colorize);
        assert_eq!(result, "\x1b[31merror\x1b[0m");
    }

    #[test]
    fn test_basic_strip() {
        let result = render_markup("<red>error</red>", MarkupMode::Strip);
        assert_eq!(result, "error");
    }

    #[test]
    fn test_nested_restores_enclosing_style() {
        let result = render_markup("<bold>a<green>b</green>c</bold>", MarkupMode::Colorize);
        assert_eq!(result, "\x1b[1ma\x1b[32mb\x1b[0m\x1b[1mc\x1b[0m");
    }

    #[test]
    fn test_nested_strip() {
        let result = render_markup("<bold><green>success</green></bold>", MarkupMode::Strip);
        assert_eq!(result, "success");
    }

    #[test]
    fn test_unknown_tag_is_literal() {
        for mode in [MarkupMode::Colorize, MarkupMode::Strip] {
            assert_eq!(
                render_markup("<invalid>text</invalid>", mode),
                "<invalid>text</invalid>"
            );
        }
    }

    #[test]
    fn test_stray_brackets() {
        assert_eq!(render_markup("a < b > c", MarkupMode::Strip), "a < b > c");
        assert_eq!(render_markup("tail<", MarkupMode::Strip), "tail<");
        assert_eq!(
            render_markup("x<red", MarkupMode::Colorize),
            "x<red"
        );
    }

    #[test]
    fn test_unclosed_tag_closes_at_end() {
        let result = render_markup("<red>open", MarkupMode::Colorize);
        assert_eq!(result, "\x1b[31mopen\x1b[0m");
        assert_eq!(render_markup("<red>open", MarkupMode::Strip), "open");
    }

    #[test]
    fn test_close_without_open_is_literal() {
        assert_eq!(render_markup("</red>", MarkupMode::Strip), "</red>");
    }

    #[test]
    fn test_short_aliases() {
        assert_eq!(
            render_markup("<b>x</b>", MarkupMode::Colorize),
            "\x1b[1mx\x1b[0m"
        );
        assert_eq!(
            render_markup("<u>x</u>", MarkupMode::Colorize),
            "\x1b[4mx\x1b[0m"
        );
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = render_markup("<red>a</red> <x> b", MarkupMode::Strip);
        let twice = render_markup(&once, MarkupMode::Strip);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_tags_fast_path() {
        assert_eq!(render_markup("plain text", MarkupMode::Colorize), "plain text");
    }
}
