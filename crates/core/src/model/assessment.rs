use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::model::question::{MatchPolicy, Question, Response, ShapeMismatch, Verdict};
use crate::model::text::{child_location, require_text};
use crate::model::wire::null_as_default;

//
// ─── TEST ──────────────────────────────────────────────────────────────────────
//

/// An ordered list of questions with a title and instructions.
///
/// Used as a unit test, a final exam, or a quick-learn assessment. The question
/// count is the scoring denominator before pending answers are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub title: String,
    #[serde(default, alias = "description", deserialize_with = "null_as_default")]
    pub instructions: String,
    pub questions: Vec<Question>,
}

impl Test {
    /// Check that the test has a title and at least one valid question.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` naming the offending question by position.
    pub fn validate(&self, location: &str) -> Result<(), ContentError> {
        require_text(&self.title, location, "title")?;
        if self.questions.is_empty() {
            return Err(ContentError::EmptyTest {
                location: location.to_string(),
            });
        }
        for (index, question) in self.questions.iter().enumerate() {
            question.validate().map_err(|source| ContentError::Question {
                location: child_location(location, format_args!("question {}", index + 1)),
                source,
            })?;
        }
        Ok(())
    }

    /// Score a submission against this test.
    ///
    /// Unanswered questions count as incorrect. A submitted short answer with
    /// no external verdict is pending and left out of the denominator. An
    /// external verdict replaces the computed one for its question.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if any submitted answer has the wrong shape;
    /// nothing is scored in that case.
    pub fn score(&self, submission: &Submission, policy: MatchPolicy) -> Result<Score, ShapeMismatch> {
        let mut per_question = Vec::with_capacity(self.questions.len());

        for (index, question) in self.questions.iter().enumerate() {
            let submitted = submission.answer(index).cloned();
            let graded = match &submitted {
                Some(response) => Some(question.grade_with(response, policy)?.verdict),
                None => None,
            };
            let verdict = match submission.external_verdict(index) {
                Some(correct) => Verdict::from_correct(correct),
                None => graded.unwrap_or(Verdict::Incorrect),
            };
            per_question.push(QuestionResult {
                verdict,
                submitted,
                canonical_answer: question.canonical_answer(),
            });
        }

        Ok(Score::from_results(per_question))
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// Answers parallel to a test's questions, plus externally supplied verdicts.
///
/// A missing or short answer list counts as unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub answers: Vec<Option<Response>>,
    #[serde(default)]
    pub external_verdicts: BTreeMap<usize, bool>,
}

impl Submission {
    #[must_use]
    pub fn new(answers: Vec<Option<Response>>) -> Self {
        Self {
            answers,
            external_verdicts: BTreeMap::new(),
        }
    }

    /// Attach an external grader's verdict for the question at `index`.
    #[must_use]
    pub fn with_verdict(mut self, index: usize, correct: bool) -> Self {
        self.external_verdicts.insert(index, correct);
        self
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&Response> {
        self.answers.get(index).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn external_verdict(&self, index: usize) -> Option<bool> {
        self.external_verdicts.get(&index).copied()
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub verdict: Verdict,
    pub submitted: Option<Response>,
    pub canonical_answer: String,
}

/// Outcome of scoring a submission.
///
/// `total_count` excludes pending answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct_count: u32,
    pub total_count: u32,
    pub pending_count: u32,
    pub per_question: Vec<QuestionResult>,
}

impl Score {
    fn from_results(per_question: Vec<QuestionResult>) -> Self {
        let mut correct_count = 0;
        let mut pending_count = 0;
        for result in &per_question {
            match result.verdict {
                Verdict::Correct => correct_count += 1,
                Verdict::PendingReview => pending_count += 1,
                Verdict::Incorrect => {}
            }
        }
        let scored = u32::try_from(per_question.len()).unwrap_or(u32::MAX);
        Self {
            correct_count,
            total_count: scored.saturating_sub(pending_count),
            pending_count,
            per_question,
        }
    }

    /// `correct_count / total_count`, or `None` when nothing was scorable.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        (self.total_count > 0).then(|| f64::from(self.correct_count) / f64::from(self.total_count))
    }

    /// Whole-number percentage rounded half up; 0 when nothing was scorable.
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent_if_scored().unwrap_or(0)
    }

    #[must_use]
    pub fn percent_if_scored(&self) -> Option<u8> {
        if self.total_count == 0 {
            return None;
        }
        let total = u64::from(self.total_count);
        let rounded = (u64::from(self.correct_count) * 100 + total / 2) / total;
        Some(u8::try_from(rounded.min(100)).unwrap_or(100))
    }

    #[must_use]
    pub fn is_fully_graded(&self) -> bool {
        self.pending_count == 0
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
