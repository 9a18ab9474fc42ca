//! Rejections for scalar request inputs

use thiserror::Error;

/// A request value that can never name a valid id, term, direction or field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("id cannot be empty")]
    EmptyId,

    #[error("id is longer than {max} characters")]
    IdTooLong { max: usize },

    /// Public ids are nanoid-style; anything else is refused before SQL
    #[error("id '{id}' may only contain letters, digits, '-' or '_'")]
    IdCharset { id: String },

    #[error("search term is blank")]
    BlankSearchTerm,

    #[error("search term is longer than {max} characters")]
    SearchTermTooLong { max: usize },

    #[error("unknown sort direction '{0}' (expected asc or desc)")]
    UnknownDirection(String),

    #[error("unknown user field '{0}'")]
    UnknownUserField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        assert_eq!(
            ValidationError::IdCharset { id: "a b".into() }.to_string(),
            "id 'a b' may only contain letters, digits, '-' or '_'"
        );
        assert_eq!(
            ValidationError::UnknownDirection("sideways".into()).to_string(),
            "unknown sort direction 'sideways' (expected asc or desc)"
        );
        assert_eq!(
            ValidationError::SearchTermTooLong { max: 256 }.to_string(),
            "search term is longer than 256 characters"
        );
    }
}
