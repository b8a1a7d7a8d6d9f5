use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ContentError;
use crate::model::ids::LessonNumber;
use crate::model::question::Question;
use crate::model::text::{child_location, require_text};
use crate::model::wire::{null_as_default, string_or_number};

//
// ─── RESOURCE ──────────────────────────────────────────────────────────────────
//

/// A further-reading link attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(alias = "text")]
    pub title: String,
    pub url: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

impl Resource {
    fn validate(&self, location: &str) -> Result<(), ContentError> {
        require_text(&self.title, location, "title")?;
        let is_web_url = Url::parse(&self.url)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        if !is_web_url {
            return Err(ContentError::InvalidResourceUrl {
                location: location.to_string(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LessonStatus {
    #[serde(rename = "not started", alias = "not_started")]
    NotStarted,
    #[serde(rename = "in progress", alias = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// One lesson of a unit or quick learn.
///
/// `status` is absent until the learner first interacts with the lesson and is
/// only changed through the progress operations on the owning container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: LessonNumber,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub learning_objectives: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub examples: String,
    pub knowledge_check: Question,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_resources: Vec<Resource>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub duration_in_min: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<LessonStatus>,
}

impl Lesson {
    #[must_use]
    pub fn new(lesson_number: LessonNumber, title: impl Into<String>, knowledge_check: Question) -> Self {
        Self {
            lesson_number,
            title: title.into(),
            summary: String::new(),
            learning_objectives: Vec::new(),
            content: String::new(),
            examples: String::new(),
            knowledge_check,
            additional_resources: Vec::new(),
            duration_in_min: String::new(),
            status: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<LessonStatus> {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == Some(LessonStatus::Completed)
    }

    /// Marks the lesson in progress unless it is already complete.
    pub(crate) fn open(&mut self) {
        if !self.is_complete() {
            self.status = Some(LessonStatus::InProgress);
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = Some(LessonStatus::Completed);
    }

    fn validate(&self, location: &str) -> Result<(), ContentError> {
        require_text(&self.title, location, "title")?;
        self.knowledge_check
            .validate()
            .map_err(|source| ContentError::Question {
                location: child_location(location, "knowledge check"),
                source,
            })?;
        for (index, resource) in self.additional_resources.iter().enumerate() {
            resource.validate(&child_location(location, format_args!("resource {}", index + 1)))?;
        }
        Ok(())
    }
}

/// Validates every lesson and the 1-based, pairwise-distinct `lesson_number` rule.
pub(crate) fn validate_lessons(lessons: &[Lesson], location: &str) -> Result<(), ContentError> {
    let mut seen = HashSet::with_capacity(lessons.len());
    for lesson in lessons {
        let lesson_location = child_location(location, format_args!("lesson {}", lesson.lesson_number));
        if lesson.lesson_number.value() == 0 {
            return Err(ContentError::InvalidLessonNumber {
                location: lesson_location,
            });
        }
        if !seen.insert(lesson.lesson_number) {
            return Err(ContentError::DuplicateLessonNumber {
                location: location.to_string(),
                number: lesson.lesson_number,
            });
        }
        lesson.validate(&lesson_location)?;
    }
    Ok(())
}
