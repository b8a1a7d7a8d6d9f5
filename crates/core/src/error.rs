use thiserror::Error;

use crate::model::{CardNumber, LessonNumber, QuestionError, UnitNumber};

/// A generated payload violates a model invariant.
///
/// Always rejects the whole payload; nothing is partially adopted. `location`
/// is a human-readable path such as `unit 2, lesson 1, knowledge check`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("payload could not be parsed: {message}")]
    Unparseable { message: String },

    #[error("{location}: {field} cannot be empty")]
    EmptyField {
        location: String,
        field: &'static str,
    },

    #[error("{location}: {source}")]
    Question {
        location: String,
        #[source]
        source: QuestionError,
    },

    #[error("{location}: a test needs at least one question")]
    EmptyTest { location: String },

    #[error("{location}: lesson_number must be at least 1")]
    InvalidLessonNumber { location: String },

    #[error("{location}: duplicate lesson_number {number}")]
    DuplicateLessonNumber {
        location: String,
        number: LessonNumber,
    },

    #[error("{location}: unit_number must be at least 1")]
    InvalidUnitNumber { location: String },

    #[error("{location}: duplicate unit_number {number}")]
    DuplicateUnitNumber { location: String, number: UnitNumber },

    #[error("{location}: resource url {url:?} is not an absolute http(s) url")]
    InvalidResourceUrl { location: String, url: String },

    #[error("{location}: {field} must be between 0 and 100, got {value}")]
    InvalidScore {
        location: String,
        field: &'static str,
        value: u8,
    },

    #[error("duplicate card_number {number}")]
    DuplicateCardNumber { number: CardNumber },

    #[error("card {number} is listed in both {first} and {second}")]
    CardInMultipleBuckets {
        number: CardNumber,
        first: &'static str,
        second: &'static str,
    },

    #[error("{bucket} lists card {number}, which is not in the set")]
    UnknownBucketCard {
        bucket: &'static str,
        number: CardNumber,
    },

    #[error("learn question references card {number}, which is not in the set")]
    UnknownCard { number: CardNumber },

    #[error("card {number} appears more than once in one learn session")]
    DuplicateSessionCard { number: CardNumber },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_errors_carry_their_location() {
        let err = ContentError::Question {
            location: "unit 2, lesson 1, knowledge check".into(),
            source: QuestionError::EmptyQuestion,
        };
        assert_eq!(
            err.to_string(),
            "unit 2, lesson 1, knowledge check: question text cannot be empty"
        );
    }

    #[test]
    fn bucket_conflict_names_both_buckets() {
        let err = ContentError::CardInMultipleBuckets {
            number: CardNumber::new(4),
            first: "still_learning",
            second: "mastered",
        };
        assert_eq!(
            err.to_string(),
            "card 4 is listed in both still_learning and mastered"
        );
    }
}
