// Profanity heuristic and redaction.
//
// One token list backs both the "does this message need a notice" check and
// the masking applied to the notice preview, so anything the heuristic
// catches is always masked.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Fixed token set. Deliberately short; the provider's blocklist is the
/// primary filter and this only covers for it when it misfires.
pub const PROFANE_TOKENS: &[&str] = &[
    "fuck",
    "fucking",
    "fucker",
    "motherfucker",
    "shit",
    "shitty",
    "bullshit",
    "bitch",
    "asshole",
    "bastard",
    "cunt",
    "dick",
];

static PROFANITY: Lazy<Regex> = Lazy::new(|| {
    let alternation = PROFANE_TOKENS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("profanity pattern is valid")
});

/// Whole-word, case-insensitive match against [`PROFANE_TOKENS`].
pub fn contains_profanity(text: &str) -> bool {
    PROFANITY.is_match(text)
}

/// Mask every profane token as its first character followed by `***`.
///
/// The output contains no profane token, so redacting twice changes nothing.
pub fn redact(text: &str) -> String {
    PROFANITY
        .replace_all(text, |caps: &Captures| {
            let first = caps[0].chars().next().unwrap_or('*');
            format!("{first}***")
        })
        .into_owned()
}
