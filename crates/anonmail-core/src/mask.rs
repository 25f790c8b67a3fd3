//! Literal, case-insensitive masking of tokens.

use crate::error::Result;
use crate::tokens::TokenSet;
use regex::{Captures, Regex, RegexBuilder};

/// Character written over masked word characters unless configured otherwise.
pub const DEFAULT_MASK_CHAR: char = 'x';

/// Letters, digits and underscore.
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replaces every word character of `text` with `mask`.
///
/// Punctuation and whitespace are kept, so `jane.doe` becomes `xxxx.xxx`.
#[must_use]
pub fn mask_word_chars(text: &str, mask: char) -> String {
    text.chars()
        .map(|c| if is_word_char(c) { mask } else { c })
        .collect()
}

/// Rewritten text and how many substitutions produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Masked {
    /// The rewritten text.
    pub text: String,
    /// Number of matches replaced.
    pub count: usize,
}

impl Masked {
    /// Text that needed no change.
    #[must_use]
    pub const fn unchanged(text: String) -> Self {
        Self { text, count: 0 }
    }
}

/// Matchers for one token set.
#[derive(Debug, Clone)]
pub struct Masker {
    mask: char,
    matchers: Vec<Regex>,
}

impl Masker {
    /// Compiles one literal matcher per token, longest token first.
    ///
    /// # Errors
    ///
    /// Returns an error if a matcher exceeds the regex size limits.
    pub fn new(tokens: &TokenSet, mask: char) -> Result<Self> {
        let matchers = tokens
            .iter()
            .map(|token| {
                RegexBuilder::new(&regex::escape(token))
                    .case_insensitive(true)
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { mask, matchers })
    }

    /// The mask character.
    #[must_use]
    pub const fn mask_char(&self) -> char {
        self.mask
    }

    /// Number of tokens this masker looks for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns `true` if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Masks every occurrence of every token.
    ///
    /// Already masked text has no token left in it, so masking twice gives
    /// the same result as masking once.
    #[must_use]
    pub fn mask(&self, text: &str) -> Masked {
        let mut text = text.to_string();
        let mut count = 0;

        for matcher in &self.matchers {
            let mut matches = 0;
            let replaced = matcher.replace_all(&text, |caps: &Captures<'_>| {
                matches += 1;
                mask_word_chars(&caps[0], self.mask)
            });
            if matches > 0 {
                text = replaced.into_owned();
                count += matches;
            }
        }

        Masked { text, count }
    }

    /// Masks every word character, independent of the tokens.
    #[must_use]
    pub fn mask_all(&self, text: &str) -> String {
        mask_word_chars(text, self.mask)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn masker(tokens: &[&str]) -> Masker {
        Masker::new(&TokenSet::from_tokens(tokens), DEFAULT_MASK_CHAR).unwrap()
    }

    #[test]
    fn test_mask_word_chars() {
        assert_eq!(mask_word_chars("jane.doe@corp.tld", 'x'), "xxxx.xxx@xxxx.xxx");
        assert_eq!(mask_word_chars("Jürgen_2 !", '*'), "******** !");
    }

    #[test]
    fn test_mask_is_case_insensitive() {
        let masked = masker(&["jane"]).mask("Jane, JANE and jane");
        assert_eq!(masked.text, "xxxx, xxxx and xxxx");
        assert_eq!(masked.count, 3);
    }

    #[test]
    fn test_tokens_are_literal() {
        let masked = masker(&["a.c"]).mask("abc a.c");
        assert_eq!(masked.text, "abc x.x");
        assert_eq!(masked.count, 1);
    }

    #[test]
    fn test_longest_token_first() {
        let masked = masker(&["anne", "anne-marie"]).mask("anne-marie.doe@x");
        assert_eq!(masked.text, "xxxx-xxxxx.doe@x");
        assert_eq!(masked.count, 1);
    }

    #[test]
    fn test_no_tokens_no_change() {
        let masker = masker(&[]);
        assert!(masker.is_empty());
        assert_eq!(masker.mask("Hello"), Masked::unchanged("Hello".to_string()));
    }

    #[test]
    fn test_mask_all() {
        assert_eq!(masker(&[]).mask_all("id=42&x"), "xx=xx&x");
    }

    proptest! {
        #[test]
        fn prop_masking_is_idempotent(text in "\\PC{0,200}", token in "[a-wyzA-WYZ]{3,8}") {
            let masker = masker(&[token.as_str()]);
            let once = masker.mask(&text).text;
            let twice = masker.mask(&once);
            prop_assert_eq!(&twice.text, &once);
            prop_assert_eq!(twice.count, 0);
        }

        #[test]
        fn prop_masking_preserves_char_count(text in "\\PC{0,200}", token in "[a-z.]{3,8}") {
            let masked = masker(&[token.as_str()]).mask(&text);
            prop_assert_eq!(masked.text.chars().count(), text.chars().count());
        }
    }
}
