use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::mastery::MasteryState;
use crate::model::course::check_score;
use crate::model::ids::{CardNumber, ContentId, UserId};
use crate::model::text::{child_location, require_text};
use crate::model::wire::{null_as_default, unknown_as_none};

//
// ─── FLASHCARD ─────────────────────────────────────────────────────────────────
//

/// A front/back card. Immutable once created; `card_number` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    card_number: CardNumber,
    front: String,
    back: String,
}

impl Flashcard {
    /// # Errors
    ///
    /// Returns `ContentError::EmptyField` if either side is blank.
    pub fn new(card_number: CardNumber, front: impl Into<String>, back: impl Into<String>) -> Result<Self, ContentError> {
        let card = Self {
            card_number,
            front: front.into(),
            back: back.into(),
        };
        card.validate()?;
        Ok(card)
    }

    #[must_use]
    pub fn card_number(&self) -> CardNumber {
        self.card_number
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    fn validate(&self) -> Result<(), ContentError> {
        let location = format!("card {}", self.card_number);
        require_text(&self.front, &location, "front")?;
        require_text(&self.back, &location, "back")
    }
}

/// Where a flashcard set was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Course,
    QuickLearn,
    Unit,
    Lesson,
}

/// Number of cards per mastery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryCounts {
    pub unclassified: u32,
    pub still_learning: u32,
    pub still_studying: u32,
    pub mastered: u32,
}

impl MasteryCounts {
    #[must_use]
    pub fn total_classified(&self) -> u32 {
        self.still_learning + self.still_studying + self.mastered
    }
}

//
// ─── SET ───────────────────────────────────────────────────────────────────────
//

/// A flashcard set with one authoritative mastery state per card.
///
/// The `still_learning`, `still_studying` and `mastered` lists of the wire
/// format are derived from that state, so a card cannot sit in two buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlashcardSetRecord", into = "FlashcardSetRecord")]
pub struct FlashcardSet {
    pub user_id: Option<UserId>,
    pub title: String,
    pub topic: String,
    pub description: String,
    pub difficulty: String,
    pub source_id: Option<ContentId>,
    pub source_type: Option<SourceType>,
    pub created_at: Option<String>,
    pub last_accessed: Option<String>,
    flashcards: Vec<Flashcard>,
    learns_completed: u32,
    best_test_score: Option<u8>,
    // Classified cards only; absent means unclassified.
    states: BTreeMap<CardNumber, MasteryState>,
}

impl FlashcardSet {
    /// # Errors
    ///
    /// Returns `ContentError` for blank fields or duplicate card numbers.
    pub fn new(title: impl Into<String>, topic: impl Into<String>, flashcards: Vec<Flashcard>) -> Result<Self, ContentError> {
        let set = Self {
            user_id: None,
            title: title.into(),
            topic: topic.into(),
            description: String::new(),
            difficulty: String::new(),
            source_id: None,
            source_type: None,
            created_at: None,
            last_accessed: None,
            flashcards,
            learns_completed: 0,
            best_test_score: None,
            states: BTreeMap::new(),
        };
        set.validate()?;
        Ok(set)
    }

    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), ContentError> {
        require_text(&self.title, "flashcard set", "title")?;
        let mut seen = HashSet::with_capacity(self.flashcards.len());
        for card in &self.flashcards {
            if !seen.insert(card.card_number) {
                return Err(ContentError::DuplicateCardNumber {
                    number: card.card_number,
                });
            }
            card.validate().map_err(|err| match err {
                ContentError::EmptyField { location, field } => ContentError::EmptyField {
                    location: child_location("flashcard set", location),
                    field,
                },
                other => other,
            })?;
        }
        for (number, state) in &self.states {
            if !seen.contains(number) {
                return Err(ContentError::UnknownBucketCard {
                    bucket: state.bucket().unwrap_or("unclassified"),
                    number: *number,
                });
            }
        }
        check_score("flashcard set", "best_test_score", self.best_test_score)
    }

    #[must_use]
    pub fn flashcards(&self) -> &[Flashcard] {
        &self.flashcards
    }

    #[must_use]
    pub fn card(&self, number: CardNumber) -> Option<&Flashcard> {
        self.flashcards.iter().find(|card| card.card_number == number)
    }

    /// `None` if the card is not in this set.
    #[must_use]
    pub fn state_of(&self, number: CardNumber) -> Option<MasteryState> {
        self.card(number)
            .map(|_| self.states.get(&number).copied().unwrap_or_default())
    }

    #[must_use]
    pub fn learns_completed(&self) -> u32 {
        self.learns_completed
    }

    #[must_use]
    pub fn best_test_score(&self) -> Option<u8> {
        self.best_test_score
    }

    #[must_use]
    pub fn unclassified(&self) -> Vec<&Flashcard> {
        self.in_state(MasteryState::Unclassified)
    }

    #[must_use]
    pub fn still_learning(&self) -> Vec<&Flashcard> {
        self.in_state(MasteryState::StillLearning)
    }

    #[must_use]
    pub fn still_studying(&self) -> Vec<&Flashcard> {
        self.in_state(MasteryState::StillStudying)
    }

    #[must_use]
    pub fn mastered(&self) -> Vec<&Flashcard> {
        self.in_state(MasteryState::Mastered)
    }

    #[must_use]
    pub fn mastery_counts(&self) -> MasteryCounts {
        let mut counts = MasteryCounts::default();
        for card in &self.flashcards {
            let slot = match self.states.get(&card.card_number).copied().unwrap_or_default() {
                MasteryState::Unclassified => &mut counts.unclassified,
                MasteryState::StillLearning => &mut counts.still_learning,
                MasteryState::StillStudying => &mut counts.still_studying,
                MasteryState::Mastered => &mut counts.mastered,
            };
            *slot += 1;
        }
        counts
    }

    /// Drops the weak link to the generating course or quick learn.
    pub fn detach_source(&mut self) {
        self.source_id = None;
        self.source_type = None;
    }

    pub(crate) fn set_state(&mut self, number: CardNumber, state: MasteryState) {
        if state == MasteryState::Unclassified {
            self.states.remove(&number);
        } else {
            self.states.insert(number, state);
        }
    }

    pub(crate) fn count_learn(&mut self) {
        self.learns_completed = self.learns_completed.saturating_add(1);
    }

    pub(crate) fn record_test_score(&mut self, percent: u8) {
        self.best_test_score = Some(self.best_test_score.map_or(percent, |best| best.max(percent)));
    }

    fn in_state(&self, state: MasteryState) -> Vec<&Flashcard> {
        self.flashcards
            .iter()
            .filter(|card| self.states.get(&card.card_number).copied().unwrap_or_default() == state)
            .collect()
    }
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// Stored and generated layout of a [`FlashcardSet`], buckets included.
///
/// Converting into a set with `FlashcardSet::try_from` reports bucket
/// conflicts as typed `ContentError`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardSetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    topic: String,
    flashcards: Vec<Flashcard>,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    difficulty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    learns_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best_test_score: Option<u8>,
    #[serde(default, deserialize_with = "null_as_default")]
    still_learning: Vec<Flashcard>,
    #[serde(default, deserialize_with = "null_as_default")]
    still_studying: Vec<Flashcard>,
    #[serde(default, deserialize_with = "null_as_default")]
    mastered: Vec<Flashcard>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "unknown_as_none")]
    source_id: Option<ContentId>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "unknown_as_none")]
    source_type: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_accessed: Option<String>,
}

impl TryFrom<FlashcardSetRecord> for FlashcardSet {
    type Error = ContentError;

    fn try_from(record: FlashcardSetRecord) -> Result<Self, Self::Error> {
        let known: HashSet<CardNumber> = record.flashcards.iter().map(Flashcard::card_number).collect();
        let mut states: BTreeMap<CardNumber, MasteryState> = BTreeMap::new();

        let buckets = [
            (MasteryState::StillLearning, &record.still_learning),
            (MasteryState::StillStudying, &record.still_studying),
            (MasteryState::Mastered, &record.mastered),
        ];
        for (state, cards) in buckets {
            let bucket = state.bucket().unwrap_or("unclassified");
            for card in cards {
                let number = card.card_number;
                if !known.contains(&number) {
                    return Err(ContentError::UnknownBucketCard { bucket, number });
                }
                if let Some(previous) = states.insert(number, state) {
                    return Err(ContentError::CardInMultipleBuckets {
                        number,
                        first: previous.bucket().unwrap_or("unclassified"),
                        second: bucket,
                    });
                }
            }
        }

        Ok(Self {
            user_id: record.user_id,
            title: record.title,
            topic: record.topic,
            description: record.description,
            difficulty: record.difficulty,
            source_id: record.source_id,
            source_type: record.source_type,
            created_at: record.created_at,
            last_accessed: record.last_accessed,
            flashcards: record.flashcards,
            learns_completed: record.learns_completed,
            best_test_score: record.best_test_score,
            states,
        })
    }
}

impl From<FlashcardSet> for FlashcardSetRecord {
    fn from(set: FlashcardSet) -> Self {
        let bucket = |state: MasteryState| -> Vec<Flashcard> {
            set.in_state(state).into_iter().cloned().collect()
        };
        let still_learning = bucket(MasteryState::StillLearning);
        let still_studying = bucket(MasteryState::StillStudying);
        let mastered = bucket(MasteryState::Mastered);

        Self {
            user_id: set.user_id,
            title: set.title,
            topic: set.topic,
            flashcards: set.flashcards,
            description: set.description,
            difficulty: set.difficulty,
            learns_completed: set.learns_completed,
            best_test_score: set.best_test_score,
            still_learning,
            still_studying,
            mastered,
            source_id: set.source_id,
            source_type: set.source_type,
            created_at: set.created_at,
            last_accessed: set.last_accessed,
        }
    }
}
