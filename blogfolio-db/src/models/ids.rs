//! Public identifiers and search terms
//!
//! Both are validated at construction so the query layer only ever binds
//! well-formed values.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum length for public identifiers
const MAX_PUBLIC_ID_LEN: usize = 64;

/// Maximum length for free-text search terms
const MAX_SEARCH_TERM_LEN: usize = 256;

/// Public ids use the URL-safe alphabet the ids are generated from.
static PUBLIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid public id regex"));

/// Stable public identifier of a post, comment or user.
///
/// Distinct from the internal sequential key, which never leaves the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicId(String);

impl PublicId {
    /// Create a public id.
    ///
    /// # Example
    /// ```
    /// use blogfolio_db::models::PublicId;
    ///
    /// assert!(PublicId::new("V1StGXR").is_ok());
    /// assert!(PublicId::new("").is_err());
    /// assert!(PublicId::new("has space").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::EmptyId);
        }

        if s.len() > MAX_PUBLIC_ID_LEN {
            return Err(ValidationError::IdTooLong {
                max: MAX_PUBLIC_ID_LEN,
            });
        }

        if !PUBLIC_ID_RE.is_match(s) {
            return Err(ValidationError::IdCharset { id: s.to_owned() });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for PublicId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PublicId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PublicId> for String {
    fn from(id: PublicId) -> Self {
        id.0
    }
}

/// Normalized free-text search term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// Create a search term. Surrounding whitespace is trimmed and inner runs
    /// of whitespace collapse to a single space.
    ///
    /// # Example
    /// ```
    /// use blogfolio_db::models::SearchTerm;
    ///
    /// let term = SearchTerm::new("  rust   async ").unwrap();
    /// assert_eq!(term.as_str(), "rust async");
    /// assert!(SearchTerm::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.is_empty() {
            return Err(ValidationError::BlankSearchTerm);
        }

        if normalized.chars().count() > MAX_SEARCH_TERM_LEN {
            return Err(ValidationError::SearchTermTooLong {
                max: MAX_SEARCH_TERM_LEN,
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix full-text query (`word:* & word:*`) built from the alphanumeric
    /// words of the term. `None` when the term has no such words, in which case
    /// only the trigram signal applies.
    pub fn prefix_tsquery(&self) -> Option<String> {
        let words: Vec<String> = self
            .0
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| format!("{}:*", w.to_lowercase()))
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" & "))
        }
    }

    /// Substring `ILIKE` pattern with `%`, `_` and `\` escaped.
    pub fn contains_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 2);
        pattern.push('%');
        for c in self.0.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }
}

impl AsRef<str> for SearchTerm {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
