use crate::error::ContentError;

/// Reject blank required text fields.
pub(crate) fn require_text(
    value: &str,
    location: impl Into<String>,
    field: &'static str,
) -> Result<(), ContentError> {
    if value.trim().is_empty() {
        return Err(ContentError::EmptyField {
            location: location.into(),
            field,
        });
    }
    Ok(())
}

/// Joins a parent location with a child segment: `unit 2` + `lesson 1`.
pub(crate) fn child_location(parent: &str, child: impl std::fmt::Display) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}, {child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected_with_location() {
        let err = require_text("  ", "unit 1", "title").unwrap_err();
        assert_eq!(err.to_string(), "unit 1: title cannot be empty");
        assert!(require_text("Intro", "unit 1", "title").is_ok());
    }

    #[test]
    fn locations_nest() {
        assert_eq!(child_location("", "unit 2"), "unit 2");
        assert_eq!(child_location("unit 2", "lesson 1"), "unit 2, lesson 1");
    }
}
