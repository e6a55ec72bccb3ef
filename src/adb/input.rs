//! Shell quoting for text sent through `adb shell`.

/// Quote a value for use inside single quotes on the device shell.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Escape one chunk of text as the argument of `input text`.
///
/// `input text` reads `%s` as a space, so spaces are written that way. The
/// result is single-quoted: newlines, tabs and every other shell
/// metacharacter reach `input` literally.
pub fn escape_input_text(text: &str) -> String {
    single_quote(&text.replace(' ', "%s"))
}

/// Arguments for the `input text` calls that type `text` exactly.
///
/// A literal `%s` cannot be typed in one call, so the text is split between
/// the `%` and the `s`. Empty text yields no calls.
pub fn input_text_args(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices("%s") {
        chunks.push(&text[start..=index]);
        start = index + 1;
    }
    chunks.push(&text[start..]);

    chunks
        .into_iter()
        .filter(|chunk| !chunk.is_empty())
        .map(escape_input_text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_input_text(r#"say "hi""#), r#"'say%s"hi"'"#);
        assert_eq!(escape_input_text("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_shell_metacharacters_stay_quoted() {
        assert_eq!(escape_input_text("$HOME`x`"), "'$HOME`x`'");
        assert_eq!(escape_input_text("a;b&c|d"), "'a;b&c|d'");
    }

    #[test]
    fn test_control_characters_cannot_end_the_command() {
        for text in ["Night\nreboot", "Night\rreboot", "Night\treboot"] {
            let escaped = escape_input_text(text);
            assert!(escaped.starts_with('\'') && escaped.ends_with('\''));
            // the only quotes are the enclosing pair
            assert_eq!(escaped.matches('\'').count(), 2);
        }
    }

    #[test]
    fn test_quote_cannot_break_out() {
        let escaped = escape_input_text("x'; reboot; echo '");
        assert_eq!(escaped, r"'x'\'';%sreboot;%secho%s'\'''");
    }

    #[test]
    fn test_literal_percent_s_is_split() {
        assert_eq!(input_text_args("50%sale"), vec!["'50%'", "'sale'"]);
        assert_eq!(input_text_args("%s%s"), vec!["'%'", "'s%'", "'s'"]);
        assert_eq!(input_text_args("100% sure"), vec!["'100%%ssure'"]);
    }

    #[test]
    fn test_plain_and_empty_text() {
        assert_eq!(input_text_args("Alarm0730"), vec!["'Alarm0730'"]);
        assert!(input_text_args("").is_empty());
    }

    #[test]
    fn test_single_quote() {
        assert_eq!(single_quote("WiFi Toggle"), "'WiFi Toggle'");
        assert_eq!(single_quote("Bob's task"), r"'Bob'\''s task'");
    }
}
