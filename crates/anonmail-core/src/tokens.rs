//! Token derivation from recipient identifiers.
//!
//! A recipient field such as `"Jane Doe" <jane.doe@corp.tld>, ops@corp.tld`
//! yields the tokens `jane.doe@corp.tld`, `ops@corp.tld`, `corp.tld`,
//! `jane`, `doe` and `ops`. Every token is lower-cased and masked wherever it
//! appears in the message.

use std::collections::BTreeSet;

/// Characters separating addresses and words inside a recipient field.
const FIELD_SEPARATORS: [char; 3] = [' ', ',', ';'];

/// Characters separating name fragments inside a local part.
const LOCAL_PART_SEPARATORS: [char; 3] = ['.', '-', '_'];

/// A local part is split at most this many times.
const MAX_LOCAL_PART_SPLITS: usize = 4;

/// Fragments shorter than this are not tokens.
const MIN_TOKEN_LEN: usize = 3;

/// Strips angle brackets, quotes and whitespace around a fragment.
#[must_use]
pub fn clean_token(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '<' | '>' | '"' | ' ' | '\t' | '\r' | '\n'))
}

fn is_long_enough(fragment: &str) -> bool {
    fragment.chars().count() >= MIN_TOKEN_LEN
}

/// Splits one recipient field into the tokens it contributes.
///
/// Never fails: malformed addresses contribute whatever fragments they have.
#[must_use]
pub fn tokenize_field(field: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();

    for fragment in field.split(FIELD_SEPARATORS).map(clean_token) {
        if fragment.is_empty() {
            continue;
        }
        let fragment = fragment.to_lowercase();

        let Some((local, domain)) = fragment.rsplit_once('@') else {
            if is_long_enough(&fragment) {
                tokens.insert(fragment);
            }
            continue;
        };

        tokens.extend(
            local
                .splitn(MAX_LOCAL_PART_SPLITS + 1, LOCAL_PART_SEPARATORS)
                .filter(|part| is_long_enough(part))
                .map(str::to_string),
        );
        if !domain.is_empty() {
            tokens.insert(domain.to_string());
        }
        if !local.is_empty() && !domain.is_empty() {
            tokens.insert(fragment.clone());
        }
    }

    tokens
}

/// The tokens of one message, longest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: Vec<String>,
}

impl TokenSet {
    /// Derives the token set of a list of recipient fields.
    pub fn from_recipients<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = recipients
            .into_iter()
            .flat_map(|field| tokenize_field(field.as_ref()))
            .collect();
        Self::from_unique(unique)
    }

    /// Builds a token set from already derived tokens.
    ///
    /// Tokens are lower-cased; empty ones are ignored.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self::from_unique(unique)
    }

    fn from_unique(unique: BTreeSet<String>) -> Self {
        let mut tokens: Vec<String> = unique.into_iter().collect();
        // Longer tokens first so a token never shadows one containing it.
        tokens.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        Self { tokens }
    }

    /// Returns `true` if there is nothing to mask.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Checks membership of an already lower-cased token.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Iterates tokens in masking order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}
