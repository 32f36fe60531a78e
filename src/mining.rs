//! Email address mining from OCR text.

use regex::Regex;
use std::sync::LazyLock;

/// Extracts candidate email addresses from raw text.
///
/// Mining never fails: text without addresses yields an empty list.
pub trait AddressMiner: Send + Sync {
    fn find_addresses(&self, text: &str) -> Vec<String>;
}

/// Practical address pattern: dot-atom local part, dotted hostname, alphabetic TLD.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}",
    )
    .unwrap()
});

/// Regex-based [`AddressMiner`].
///
/// Matches are returned exactly as they appear in the text, in order of
/// appearance, duplicates included.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexAddressMiner;

impl RegexAddressMiner {
    pub fn new() -> Self {
        Self
    }
}

impl AddressMiner for RegexAddressMiner {
    fn find_addresses(&self, text: &str) -> Vec<String> {
        EMAIL_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
