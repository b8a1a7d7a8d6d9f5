use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ContentError;
use crate::mastery::{LearnOutcome, Recall, SessionKind};
use crate::model::flashcard::{Flashcard, FlashcardSet};
use crate::model::ids::CardNumber;
use crate::model::question::{
    Grade, MatchPolicy, Question, QuestionError, Response, ShapeMismatch, Verdict,
};
use crate::model::text::child_location;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnError {
    #[error("question {index} is out of range for a session of {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("question {0} was already answered")]
    AlreadyAnswered(usize),

    #[error("question {0} has not been answered")]
    NotAnswered(usize),

    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A question generated from one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardQuestion {
    pub card_number: CardNumber,
    #[serde(flatten)]
    pub question: Question,
}

impl CardQuestion {
    /// Typed recall: the learner writes the back for the shown front.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the card text is blank.
    pub fn typed_recall(card: &Flashcard) -> Result<Self, QuestionError> {
        Ok(Self {
            card_number: card.card_number(),
            question: Question::fill_in_the_blank(card.front(), Vec::new(), card.back())?,
        })
    }

    /// Pick the card's back out of `choices`, which must contain it.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the back is missing from `choices` or a
    /// choice repeats.
    pub fn multiple_choice(card: &Flashcard, choices: Vec<String>) -> Result<Self, QuestionError> {
        Ok(Self {
            card_number: card.card_number(),
            question: Question::multiple_choice(card.front(), choices, card.back())?,
        })
    }

    /// Does `shown_back` belong to this card's front?
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the card text is blank.
    pub fn true_or_false(card: &Flashcard, shown_back: &str) -> Result<Self, QuestionError> {
        Ok(Self {
            card_number: card.card_number(),
            question: Question::true_or_false(
                format!("{}: {}", card.front(), shown_back),
                shown_back == card.back(),
            )?,
        })
    }
}

/// The questions of one recall-check session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardLearn {
    pub questions: Vec<CardQuestion>,
}

impl FlashcardLearn {
    /// Every question must name a card of `set`, at most once.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` for unknown or repeated cards and invalid questions.
    pub fn validate_against(&self, set: &FlashcardSet) -> Result<(), ContentError> {
        let mut seen = HashSet::with_capacity(self.questions.len());
        for (index, item) in self.questions.iter().enumerate() {
            if set.card(item.card_number).is_none() {
                return Err(ContentError::UnknownCard {
                    number: item.card_number,
                });
            }
            if !seen.insert(item.card_number) {
                return Err(ContentError::DuplicateSessionCard {
                    number: item.card_number,
                });
            }
            item.question.validate().map_err(|source| ContentError::Question {
                location: child_location("learn session", format_args!("question {}", index + 1)),
                source,
            })?;
        }
        Ok(())
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum AnswerState {
    Unanswered,
    Skipped,
    Graded { verdict: Verdict },
}

/// Counts of a session in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionProgress {
    pub answered: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub correct: usize,
}

/// An in-memory learn or test session over a validated quiz.
///
/// Nothing here is persisted; [`LearnSession::finish`] produces the outcome
/// that is applied to the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnSession {
    kind: SessionKind,
    quiz: FlashcardLearn,
    answers: Vec<AnswerState>,
}

impl LearnSession {
    /// # Errors
    ///
    /// Returns `ContentError` if the quiz does not fit the set.
    pub fn new(kind: SessionKind, set: &FlashcardSet, quiz: FlashcardLearn) -> Result<Self, ContentError> {
        quiz.validate_against(set)?;
        let answers = vec![AnswerState::Unanswered; quiz.questions.len()];
        Ok(Self { kind, quiz, answers })
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[CardQuestion] {
        &self.quiz.questions
    }

    /// # Errors
    ///
    /// Returns `LearnError` for a bad index, a repeat answer, or a
    /// mis-shaped response.
    pub fn answer(&mut self, index: usize, response: &Response, policy: MatchPolicy) -> Result<Grade, LearnError> {
        self.unanswered(index)?;
        let grade = self.quiz.questions[index].question.grade_with(response, policy)?;
        self.answers[index] = AnswerState::Graded {
            verdict: grade.verdict,
        };
        Ok(grade)
    }

    /// # Errors
    ///
    /// Returns `LearnError` for a bad index or an already answered question.
    pub fn skip(&mut self, index: usize) -> Result<(), LearnError> {
        self.unanswered(index)?;
        self.answers[index] = AnswerState::Skipped;
        Ok(())
    }

    /// Replace a graded verdict, e.g. "mark as correct" or an external
    /// grade for a short answer.
    ///
    /// # Errors
    ///
    /// Returns `LearnError::NotAnswered` unless the question was graded.
    pub fn override_verdict(&mut self, index: usize, correct: bool) -> Result<(), LearnError> {
        let len = self.answers.len();
        match self.answers.get_mut(index) {
            None => Err(LearnError::OutOfRange { index, len }),
            Some(AnswerState::Graded { verdict }) => {
                *verdict = Verdict::from_correct(correct);
                Ok(())
            }
            Some(_) => Err(LearnError::NotAnswered(index)),
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let mut progress = SessionProgress::default();
        for state in &self.answers {
            match state {
                AnswerState::Unanswered => progress.remaining += 1,
                AnswerState::Skipped => progress.skipped += 1,
                AnswerState::Graded { verdict } => {
                    progress.answered += 1;
                    if verdict.is_correct() {
                        progress.correct += 1;
                    }
                }
            }
        }
        progress
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.progress().remaining == 0
    }

    /// Collapse the session into an outcome.
    ///
    /// Unanswered questions and unresolved pending reviews count as skipped.
    #[must_use]
    pub fn finish(self) -> LearnOutcome {
        let mut outcome = LearnOutcome::new(self.kind);
        for (item, state) in self.quiz.questions.iter().zip(self.answers) {
            match state {
                AnswerState::Graded {
                    verdict: Verdict::Correct,
                } => outcome.record(item.card_number, Recall::Correct),
                AnswerState::Graded {
                    verdict: Verdict::Incorrect,
                } => outcome.record(item.card_number, Recall::Incorrect),
                AnswerState::Graded {
                    verdict: Verdict::PendingReview,
                }
                | AnswerState::Skipped
                | AnswerState::Unanswered => outcome.skip(item.card_number),
            }
        }
        outcome
    }

    fn unanswered(&self, index: usize) -> Result<(), LearnError> {
        match self.answers.get(index) {
            None => Err(LearnError::OutOfRange {
                index,
                len: self.answers.len(),
            }),
            Some(AnswerState::Unanswered) => Ok(()),
            Some(_) => Err(LearnError::AlreadyAnswered(index)),
        }
    }
}
