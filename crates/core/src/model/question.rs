use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A question violates its variant's invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("answer cannot be empty")]
    EmptyAnswer,

    #[error("multiple choice questions need at least one answer choice")]
    NoChoices,

    #[error("answer choices cannot be empty")]
    EmptyChoice,

    #[error("duplicate answer choice {0:?}")]
    DuplicateChoice(String),

    #[error("answer {answer:?} is not one of the answer choices")]
    AnswerNotInChoices { answer: String },

    #[error("true/false answer choices must be exactly [true, false]")]
    InvalidTrueFalseChoices,

    #[error("{kind} question is malformed: {reason}")]
    ShapeConflict {
        kind: QuestionKind,
        reason: &'static str,
    },
}

/// A candidate answer's shape does not fit the question variant.
///
/// This is a caller bug, not a learner mistake.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind} question expects a {expected} answer, got a {found} answer")]
pub struct ShapeMismatch {
    pub kind: QuestionKind,
    pub expected: ResponseKind,
    pub found: ResponseKind,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Discriminant of a [`Question`], serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueOrFalse,
    FillInTheBlank,
    ShortAnswer,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueOrFalse => "true_or_false",
            QuestionKind::FillInTheBlank => "fill_in_the_blank",
            QuestionKind::ShortAnswer => "short_answer",
        }
    }

    /// The candidate answer shape this kind accepts.
    #[must_use]
    pub fn response_kind(self) -> ResponseKind {
        match self {
            QuestionKind::TrueOrFalse => ResponseKind::Boolean,
            QuestionKind::MultipleChoice
            | QuestionKind::FillInTheBlank
            | QuestionKind::ShortAnswer => ResponseKind::Text,
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gradable question.
///
/// Deserialization checks shape only (which variant, which field types).
/// Content invariants such as "answer is one of the choices" are checked by
/// [`Question::validate`], which ingestion always runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub enum Question {
    MultipleChoice {
        question: String,
        answer_choices: Vec<String>,
        answer: String,
    },
    TrueOrFalse {
        question: String,
        answer: bool,
    },
    FillInTheBlank {
        question: String,
        answer_choices: Vec<String>,
        answer: String,
    },
    ShortAnswer {
        question: String,
        answer: String,
    },
}

impl Question {
    /// Build a validated multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the question is blank, has no choices, or the
    /// answer is not one of the choices.
    pub fn multiple_choice(
        question: impl Into<String>,
        answer_choices: Vec<String>,
        answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let q = Self::MultipleChoice {
            question: question.into(),
            answer_choices,
            answer: answer.into(),
        };
        q.validate()?;
        Ok(q)
    }

    /// Build a validated true/false question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyQuestion` if the question is blank.
    pub fn true_or_false(question: impl Into<String>, answer: bool) -> Result<Self, QuestionError> {
        let q = Self::TrueOrFalse {
            question: question.into(),
            answer,
        };
        q.validate()?;
        Ok(q)
    }

    /// Build a validated fill-in-the-blank question. Empty `answer_choices`
    /// means free-text matching.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the answer is blank or not among non-empty choices.
    pub fn fill_in_the_blank(
        question: impl Into<String>,
        answer_choices: Vec<String>,
        answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let q = Self::FillInTheBlank {
            question: question.into(),
            answer_choices,
            answer: answer.into(),
        };
        q.validate()?;
        Ok(q)
    }

    /// Build a validated short-answer question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the question or model answer is blank.
    pub fn short_answer(
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let q = Self::ShortAnswer {
            question: question.into(),
            answer: answer.into(),
        };
        q.validate()?;
        Ok(q)
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            Question::TrueOrFalse { .. } => QuestionKind::TrueOrFalse,
            Question::FillInTheBlank { .. } => QuestionKind::FillInTheBlank,
            Question::ShortAnswer { .. } => QuestionKind::ShortAnswer,
        }
    }

    /// The question text shown to the learner.
    #[must_use]
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { question, .. }
            | Question::TrueOrFalse { question, .. }
            | Question::FillInTheBlank { question, .. }
            | Question::ShortAnswer { question, .. } => question,
        }
    }

    /// Enumerated text choices, if the variant has any.
    #[must_use]
    pub fn answer_choices(&self) -> Option<&[String]> {
        match self {
            Question::MultipleChoice { answer_choices, .. }
            | Question::FillInTheBlank { answer_choices, .. } => Some(answer_choices),
            Question::TrueOrFalse { .. } | Question::ShortAnswer { .. } => None,
        }
    }

    /// The answer as it should be displayed after grading.
    #[must_use]
    pub fn canonical_answer(&self) -> String {
        match self {
            Question::MultipleChoice { answer, .. }
            | Question::FillInTheBlank { answer, .. }
            | Question::ShortAnswer { answer, .. } => answer.clone(),
            Question::TrueOrFalse { answer, .. } => display_bool(*answer).to_string(),
        }
    }

    /// Check the variant's invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt().trim().is_empty() {
            return Err(QuestionError::EmptyQuestion);
        }

        match self {
            Question::MultipleChoice {
                answer_choices,
                answer,
                ..
            } => {
                if answer_choices.is_empty() {
                    return Err(QuestionError::NoChoices);
                }
                check_choices(answer_choices)?;
                if !answer_choices.contains(answer) {
                    return Err(QuestionError::AnswerNotInChoices {
                        answer: answer.clone(),
                    });
                }
            }
            Question::FillInTheBlank {
                answer_choices,
                answer,
                ..
            } => {
                if answer.trim().is_empty() {
                    return Err(QuestionError::EmptyAnswer);
                }
                check_choices(answer_choices)?;
                if !answer_choices.is_empty() && !answer_choices.contains(answer) {
                    return Err(QuestionError::AnswerNotInChoices {
                        answer: answer.clone(),
                    });
                }
            }
            Question::ShortAnswer { answer, .. } => {
                if answer.trim().is_empty() {
                    return Err(QuestionError::EmptyAnswer);
                }
            }
            Question::TrueOrFalse { .. } => {}
        }

        Ok(())
    }

    /// Grade a candidate answer with strict, case-sensitive matching.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the response shape does not fit the variant.
    pub fn grade(&self, response: &Response) -> Result<Grade, ShapeMismatch> {
        self.grade_with(response, MatchPolicy::default())
    }

    /// Grade a candidate answer using the given text matching policy.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the response shape does not fit the variant.
    pub fn grade_with(&self, response: &Response, policy: MatchPolicy) -> Result<Grade, ShapeMismatch> {
        let verdict = match (self, response) {
            (
                Question::MultipleChoice { answer, .. } | Question::FillInTheBlank { answer, .. },
                Response::Text(candidate),
            ) => Verdict::from_correct(policy.matches(candidate, answer)),
            (Question::TrueOrFalse { answer, .. }, Response::Boolean(candidate)) => {
                Verdict::from_correct(candidate == answer)
            }
            (Question::ShortAnswer { .. }, Response::Text(_)) => Verdict::PendingReview,
            (question, response) => {
                let kind = question.kind();
                return Err(ShapeMismatch {
                    kind,
                    expected: kind.response_kind(),
                    found: response.kind(),
                });
            }
        };

        Ok(Grade {
            verdict,
            canonical_answer: self.canonical_answer(),
        })
    }
}

fn check_choices(choices: &[String]) -> Result<(), QuestionError> {
    let mut seen = HashSet::with_capacity(choices.len());
    for choice in choices {
        if choice.trim().is_empty() {
            return Err(QuestionError::EmptyChoice);
        }
        if !seen.insert(choice.as_str()) {
            return Err(QuestionError::DuplicateChoice(choice.clone()));
        }
    }
    Ok(())
}

fn display_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

//
// ─── RESPONSES & VERDICTS ──────────────────────────────────────────────────────
//

/// Shape of a candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Text,
    Boolean,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Text => f.write_str("text"),
            ResponseKind::Boolean => f.write_str("boolean"),
        }
    }
}

/// A learner's candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Boolean(bool),
    Text(String),
}

impl Response {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Boolean(_) => ResponseKind::Boolean,
            Response::Text(_) => ResponseKind::Text,
        }
    }
}

/// Correctness verdict for one answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Submitted, but only an external grader can decide (short answers).
    PendingReview,
}

impl Verdict {
    #[must_use]
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Verdict::Correct)
    }

    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Verdict::PendingReview)
    }
}

/// Result of grading one answer: the verdict plus the answer to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub verdict: Verdict,
    pub canonical_answer: String,
}

/// How text answers are compared against the canonical answer.
///
/// Strict (case-sensitive, untrimmed) by default. Relaxing it is a
/// presentation choice made through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    case_sensitive: bool,
    trim_whitespace: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl MatchPolicy {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            case_sensitive: true,
            trim_whitespace: false,
        }
    }

    #[must_use]
    pub fn new(case_sensitive: bool, trim_whitespace: bool) -> Self {
        Self {
            case_sensitive,
            trim_whitespace,
        }
    }

    #[must_use]
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    #[must_use]
    pub fn trim_whitespace(&self) -> bool {
        self.trim_whitespace
    }

    #[must_use]
    pub fn matches(&self, candidate: &str, expected: &str) -> bool {
        let (candidate, expected) = if self.trim_whitespace {
            (candidate.trim(), expected.trim())
        } else {
            (candidate, expected)
        };
        if self.case_sensitive {
            candidate == expected
        } else {
            candidate.to_lowercase() == expected.to_lowercase()
        }
    }
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// Persisted/generated shape. `type` is optional on input; when absent the
/// variant is inferred from the fields present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<QuestionKind>,
    question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer_choices: Option<Vec<WireValue>>,
    answer: WireValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Flag(bool),
    Text(String),
}

impl QuestionRecord {
    fn inferred_kind(&self) -> QuestionKind {
        match (&self.answer, &self.answer_choices) {
            (WireValue::Flag(_), _) => QuestionKind::TrueOrFalse,
            (WireValue::Text(_), None) => QuestionKind::ShortAnswer,
            (WireValue::Text(_), Some(choices)) if choices.is_empty() => {
                QuestionKind::FillInTheBlank
            }
            (WireValue::Text(_), Some(_)) => QuestionKind::MultipleChoice,
        }
    }
}

fn text_choices(
    kind: QuestionKind,
    choices: Option<Vec<WireValue>>,
) -> Result<Vec<String>, QuestionError> {
    choices
        .unwrap_or_default()
        .into_iter()
        .map(|choice| match choice {
            WireValue::Text(text) => Ok(text),
            WireValue::Flag(_) => Err(QuestionError::ShapeConflict {
                kind,
                reason: "answer choices must be strings",
            }),
        })
        .collect()
}

fn text_answer(kind: QuestionKind, answer: WireValue) -> Result<String, QuestionError> {
    match answer {
        WireValue::Text(text) => Ok(text),
        WireValue::Flag(_) => Err(QuestionError::ShapeConflict {
            kind,
            reason: "answer must be a string",
        }),
    }
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.unwrap_or_else(|| record.inferred_kind());
        let question = record.question;

        match kind {
            QuestionKind::TrueOrFalse => {
                let WireValue::Flag(answer) = record.answer else {
                    return Err(QuestionError::ShapeConflict {
                        kind,
                        reason: "answer must be a boolean",
                    });
                };
                if let Some(choices) = record.answer_choices {
                    let is_boolean_pair = choices.len() == 2
                        && choices.contains(&WireValue::Flag(true))
                        && choices.contains(&WireValue::Flag(false));
                    if !is_boolean_pair {
                        return Err(QuestionError::InvalidTrueFalseChoices);
                    }
                }
                Ok(Question::TrueOrFalse { question, answer })
            }
            QuestionKind::MultipleChoice => Ok(Question::MultipleChoice {
                question,
                answer_choices: text_choices(kind, record.answer_choices)?,
                answer: text_answer(kind, record.answer)?,
            }),
            QuestionKind::FillInTheBlank => Ok(Question::FillInTheBlank {
                question,
                answer_choices: text_choices(kind, record.answer_choices)?,
                answer: text_answer(kind, record.answer)?,
            }),
            QuestionKind::ShortAnswer => {
                if record.answer_choices.is_some_and(|c| !c.is_empty()) {
                    return Err(QuestionError::ShapeConflict {
                        kind,
                        reason: "short answer questions have no answer choices",
                    });
                }
                Ok(Question::ShortAnswer {
                    question,
                    answer: text_answer(kind, record.answer)?,
                })
            }
        }
    }
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let kind = Some(question.kind());
        match question {
            Question::MultipleChoice {
                question,
                answer_choices,
                answer,
            }
            | Question::FillInTheBlank {
                question,
                answer_choices,
                answer,
            } => Self {
                kind,
                question,
                answer_choices: Some(answer_choices.into_iter().map(WireValue::Text).collect()),
                answer: WireValue::Text(answer),
            },
            Question::TrueOrFalse { question, answer } => Self {
                kind,
                question,
                answer_choices: Some(vec![WireValue::Flag(true), WireValue::Flag(false)]),
                answer: WireValue::Flag(answer),
            },
            Question::ShortAnswer { question, answer } => Self {
                kind,
                question,
                answer_choices: None,
                answer: WireValue::Text(answer),
            },
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
