//! Caption to title normalization
//!
//! Captions scraped from a feed usually carry an author prefix, decorative quotes,
//! emoji and a tail of mention handles. [`normalize`] reduces them to a display title.

use regex::Regex;
use std::sync::LazyLock;

/// Titles at least this many characters long are capped at a sentence boundary
pub const TITLE_CAP_THRESHOLD: usize = 140;

/// Earliest character offset at which a capping sentence boundary is accepted
pub const TITLE_BOUNDARY_OFFSET: usize = 70;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

const DECORATIVE_QUOTES: [char; 3] = ['\u{201C}', '\u{201D}', '"'];

static EMOJI_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[\p{Extended_Pictographic}",
        r"\x{1F3FB}-\x{1F3FF}",
        r"\x{1F1E6}-\x{1F1FF}",
        r"\x{FE0E}\x{FE0F}\x{200D}\x{20E3}",
        r"\x{E0020}-\x{E007F}]+",
    ))
    .expect("Valid regex")
});

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("Valid regex"));

/// Normalizer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop everything up to and including the first colon (caption-style input)
    pub strip_prefix: bool,
    /// Cap long titles at a sentence boundary
    pub cap_length: bool,
}

impl NormalizeOptions {
    /// Settings for feed captions that embed an author handle before a colon
    pub fn caption() -> Self {
        Self {
            strip_prefix: true,
            cap_length: true,
        }
    }

    /// Settings for text that is already a bare title
    pub fn title() -> Self {
        Self {
            strip_prefix: false,
            cap_length: true,
        }
    }
}

/// Normalize raw caption text into a display title
pub fn normalize(raw: &str, options: NormalizeOptions) -> String {
    let text = if options.strip_prefix {
        strip_author_prefix(raw)
    } else {
        raw
    };

    let text: String = text
        .chars()
        .filter(|c| !DECORATIVE_QUOTES.contains(c))
        .collect();
    let text = EMOJI_RUN.replace_all(&text, " ");
    let text = text.replace(['\r', '\n'], " ");
    let text = SPACE_RUN.replace_all(&text, " ");
    let mut text = text.trim().to_string();

    // A finished sentence keeps its trailing handles
    if !ends_with_terminator(&text) {
        text = strip_trailing_handles(text);
    }

    if options.cap_length {
        text = cap_at_sentence(&text);
    }

    text.trim().to_string()
}

fn strip_author_prefix(raw: &str) -> &str {
    match raw.split_once(':') {
        Some((_, rest)) => rest.trim_start(),
        None => raw,
    }
}

fn ends_with_terminator(text: &str) -> bool {
    text.chars()
        .last()
        .is_some_and(|c| SENTENCE_TERMINATORS.contains(&c))
}

/// Strip trailing `@handle` words and a dangling colon until neither remains
fn strip_trailing_handles(mut text: String) -> String {
    loop {
        let before = text.len();

        loop {
            let (cut, last_word) = match text.rfind(' ') {
                Some(i) => (i, &text[i + 1..]),
                None => (0, text.as_str()),
            };
            if !last_word.contains('@') {
                break;
            }
            text.truncate(cut);
        }

        text = text.trim().to_string();
        if text.ends_with(':') {
            text.pop();
            text = text.trim().to_string();
        }

        if text.len() == before {
            return text;
        }
    }
}

/// Truncate long text just past the first sentence terminator at or beyond
/// [`TITLE_BOUNDARY_OFFSET`]. Text without such a terminator is left uncapped.
fn cap_at_sentence(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < TITLE_CAP_THRESHOLD {
        return text.to_string();
    }

    match chars
        .iter()
        .skip(TITLE_BOUNDARY_OFFSET)
        .position(|c| SENTENCE_TERMINATORS.contains(c))
    {
        Some(pos) => {
            let end = (TITLE_BOUNDARY_OFFSET + pos + 2).min(chars.len());
            chars[..end].iter().collect()
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> NormalizeOptions {
        NormalizeOptions::default()
    }

    #[test]
    fn test_caption_example() {
        let raw = "alice: \"Great day!! \u{1F60A}\u{1F60A}   @bob @carol\"";
        assert_eq!(normalize(raw, NormalizeOptions::caption()), "Great day!!");
    }

    #[test]
    fn test_prefix_only_stripped_in_caption_mode() {
        let raw = "Note: bring snacks";
        assert_eq!(
            normalize(raw, NormalizeOptions::caption()),
            "bring snacks"
        );
        assert_eq!(normalize(raw, NormalizeOptions::title()), "Note: bring snacks");
    }

    #[test]
    fn test_prefix_without_colon_is_untouched() {
        assert_eq!(
            normalize("no colon here", NormalizeOptions::caption()),
            "no colon here"
        );
    }

    #[test]
    fn test_curly_quotes_removed() {
        assert_eq!(
            normalize("\u{201C}quoted words\u{201D}", plain()),
            "quoted words"
        );
    }

    #[test]
    fn test_emoji_run_becomes_single_space() {
        assert_eq!(
            normalize("sun\u{2600}\u{FE0F}\u{1F31E}shine", plain()),
            "sun shine"
        );
        assert_eq!(
            normalize("thumbs \u{1F44D}\u{1F3FD} up", plain()),
            "thumbs up"
        );
    }

    #[test]
    fn test_newlines_and_spaces_collapse() {
        assert_eq!(
            normalize("  line one\nline two\r\n\nline   three  ", plain()),
            "line one line two line three"
        );
    }

    #[test]
    fn test_terminated_sentence_keeps_mentions() {
        assert_eq!(
            normalize("thanks @bob and @carol!", plain()),
            "thanks @bob and @carol!"
        );
    }

    #[test]
    fn test_trailing_mentions_and_colon_removed() {
        assert_eq!(normalize("shot by: @photog @studio", plain()), "shot by");
        assert_eq!(normalize("hello @a: @b", plain()), "hello");
    }

    #[test]
    fn test_only_mentions_yields_empty() {
        assert_eq!(normalize("@one @two", plain()), "");
        assert_eq!(normalize("@solo", plain()), "");
        assert_eq!(normalize("", plain()), "");
    }

    #[test]
    fn test_mentions_inside_text_survive() {
        assert_eq!(
            normalize("dinner with @bob tonight", plain()),
            "dinner with @bob tonight"
        );
    }

    #[test]
    fn test_length_cap_at_sentence_boundary() {
        let raw = format!("{}. {}", "a".repeat(85), "b".repeat(73));
        assert_eq!(raw.chars().count(), 160);

        let capped = normalize(&raw, NormalizeOptions::title());
        assert_eq!(capped, format!("{}.", "a".repeat(85)));
    }

    #[test]
    fn test_length_cap_ignores_early_terminators() {
        let raw = format!("{}. {}! {}", "a".repeat(20), "b".repeat(80), "c".repeat(50));
        let capped = normalize(&raw, NormalizeOptions::title());
        assert_eq!(capped, format!("{}. {}!", "a".repeat(20), "b".repeat(80)));
    }

    #[test]
    fn test_length_cap_without_boundary_leaves_text() {
        let raw = "x".repeat(150);
        assert_eq!(normalize(&raw, NormalizeOptions::title()), raw);
    }

    #[test]
    fn test_short_text_not_capped() {
        let raw = format!("{}. {}", "a".repeat(80), "b".repeat(40));
        assert_eq!(normalize(&raw, NormalizeOptions::title()), raw);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "Great day!! \u{1F60A}   @bob @carol",
            "hello @a: @b",
            "\u{201C}quoted\u{201D}\n\nnext line @x",
            "plain sentence.",
            "ends with colon:",
        ];
        let long = format!("{}. {}", "a".repeat(85), "b".repeat(73));

        for input in inputs.iter().copied().chain([long.as_str()]) {
            for options in [plain(), NormalizeOptions::title()] {
                let once = normalize(input, options);
                assert_eq!(normalize(&once, options), once, "input: {input:?}");
            }
        }
    }
}
