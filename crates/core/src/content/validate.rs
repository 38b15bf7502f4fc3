use thiserror::Error;

const MAX_CONTENT_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIdError {
    #[error("content id is required")]
    Empty,
    #[error("content id exceeds {} characters", MAX_CONTENT_ID_LEN)]
    TooLong,
}

/// Trim a content id and check it is usable as a lookup key.
pub fn validate_content_id(id: &str) -> Result<&str, ContentIdError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ContentIdError::Empty);
    }
    if id.chars().count() > MAX_CONTENT_ID_LEN {
        return Err(ContentIdError::TooLong);
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_and_oversized_ids() {
        assert_eq!(validate_content_id(""), Err(ContentIdError::Empty));
        assert_eq!(validate_content_id(" \t"), Err(ContentIdError::Empty));
        assert_eq!(
            validate_content_id(&"x".repeat(MAX_CONTENT_ID_LEN + 1)),
            Err(ContentIdError::TooLong)
        );
        assert_eq!(validate_content_id(" abc "), Ok("abc"));
    }
}
