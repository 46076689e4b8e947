use std::collections::HashSet;

use crate::config::AlignmentConfig;

/// Bumped whenever [`TextNormalizer::normalize`] changes behaviour. Matches
/// computed under one version are never reused under another.
pub const NORMALIZATION_VERSION: u32 = 1;

/// Characters that separate tokens in addition to whitespace.
const TOKEN_SEPARATORS: &[char] = &['-', '\u{2010}', '\u{2013}', '\u{2014}', '/'];

/// Canonical token form shared by transcript words and quotes.
///
/// Lowercases, splits on whitespace and dashes, keeps only alphanumeric
/// characters, and drops configured filler words. Display text is never
/// touched; this is for comparison only.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    fillers: HashSet<String>,
}

impl TextNormalizer {
    pub fn new<I, S>(fillers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fillers = fillers
            .into_iter()
            .flat_map(|f| canonical_tokens(f.as_ref()).collect::<Vec<_>>())
            .collect();
        Self { fillers }
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self::new(&config.filler_words)
    }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        canonical_tokens(text)
            .filter(|token| !self.fillers.contains(token))
            .collect()
    }

    pub fn is_filler(&self, token: &str) -> bool {
        self.fillers.contains(token)
    }
}

fn canonical_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .map(|piece| {
            piece
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::from_config(&AlignmentConfig::default())
    }

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            normalizer().normalize("Hello, World! It's fine."),
            ["hello", "world", "its", "fine"]
        );
    }

    #[test]
    fn collapses_whitespace_and_rewraps() {
        assert_eq!(
            normalizer().normalize("  the\n quick \t brown  "),
            ["the", "quick", "brown"]
        );
    }

    #[test]
    fn splits_on_dashes() {
        assert_eq!(
            normalizer().normalize("well-known \u{2014} state/local"),
            ["well", "known", "state", "local"]
        );
    }

    #[test]
    fn drops_fillers_case_insensitively() {
        assert_eq!(
            normalizer().normalize("So, UM, we uh went"),
            ["so", "we", "went"]
        );
        assert!(normalizer().is_filler("um"));
        assert!(!normalizer().is_filler("went"));
    }

    #[test]
    fn punctuation_only_text_yields_nothing() {
        assert!(normalizer().normalize("... -- !?").is_empty());
        assert!(normalizer().normalize("").is_empty());
    }

    #[test]
    fn keeps_digits_and_non_ascii_letters() {
        assert_eq!(
            normalizer().normalize("Café 3.5 MILLION"),
            ["café", "35", "million"]
        );
    }

    #[test]
    fn custom_fillers_are_normalized_too() {
        let normalizer = TextNormalizer::new(["Like,", "You-Know"]);
        assert_eq!(normalizer.normalize("like you know it"), ["it"]);
    }
}
