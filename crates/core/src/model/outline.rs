use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::model::ids::{UnitNumber, UserId};
use crate::model::text::{child_location, require_text};
use crate::model::wire::null_as_default;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonOutline {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub learning_objectives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutline {
    pub unit_number: UnitNumber,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lesson_outline: Vec<LessonOutline>,
}

/// A draft course structure. Lesson bodies are generated later from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Syllabus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub estimated_duration_hours_per_week: u32,
    #[serde(default)]
    pub estimated_number_of_weeks: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub depth: String,
    pub units: Vec<UnitOutline>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: u32,
}

impl Syllabus {
    /// # Errors
    ///
    /// Returns `ContentError` for blank titles or bad unit numbers.
    pub fn validate(&self) -> Result<(), ContentError> {
        require_text(&self.title, "syllabus", "title")?;
        let mut seen = HashSet::with_capacity(self.units.len());
        for unit in &self.units {
            let location = format!("unit {}", unit.unit_number);
            if unit.unit_number.value() == 0 {
                return Err(ContentError::InvalidUnitNumber { location });
            }
            if !seen.insert(unit.unit_number) {
                return Err(ContentError::DuplicateUnitNumber {
                    location: "syllabus".to_string(),
                    number: unit.unit_number,
                });
            }
            require_text(&unit.title, &location, "title")?;
            for (index, lesson) in unit.lesson_outline.iter().enumerate() {
                require_text(
                    &lesson.title,
                    child_location(&location, format_args!("lesson outline {}", index + 1)),
                    "title",
                )?;
            }
        }
        Ok(())
    }

    /// Total number of lessons the outline will expand into.
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.units.iter().map(|unit| unit.lesson_outline.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syllabus() -> Syllabus {
        serde_json::from_value(serde_json::json!({
            "title": "Intro to Rust",
            "description": "From zero",
            "estimated_duration_hours_per_week": 4,
            "estimated_number_of_weeks": 6,
            "level": "beginner",
            "depth": "overview",
            "units": [
                {"unit_number": 1, "title": "Basics", "description": "", "lesson_outline": [
                    {"title": "Hello", "summary": "", "learning_objectives": []},
                    {"title": "Types", "summary": "", "learning_objectives": ["Name scalar types"]}
                ]},
                {"unit_number": 2, "title": "Ownership", "description": "", "lesson_outline": [
                    {"title": "Moves", "summary": "", "learning_objectives": []}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn defaults_apply_to_draft_and_completed() {
        let s = syllabus();
        assert!(!s.is_draft);
        assert_eq!(s.completed, 0);
        assert_eq!(s.lesson_count(), 3);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn duplicate_unit_numbers_are_rejected() {
        let mut s = syllabus();
        s.units[1].unit_number = UnitNumber::new(1);
        assert_eq!(s.validate().unwrap_err().to_string(), "syllabus: duplicate unit_number 1");
    }

    #[test]
    fn blank_lesson_titles_are_located() {
        let mut s = syllabus();
        s.units[0].lesson_outline[1].title = String::new();
        assert_eq!(
            s.validate().unwrap_err().to_string(),
            "unit 1, lesson outline 2: title cannot be empty"
        );
    }
}
