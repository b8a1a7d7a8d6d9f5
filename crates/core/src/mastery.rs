use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CardNumber, FlashcardSet};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("session outcome references card {0}, which is not in the set")]
    UnknownCard(CardNumber),
}

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// Per-card mastery classification.
///
/// A card leaves `Unclassified` on its first graded answer and never returns.
///
/// # Examples
///
/// ```
/// # use luminous_core::mastery::{MasteryState, Recall};
/// let state = MasteryState::Unclassified
///     .after(Recall::Correct)
///     .after(Recall::Correct);
/// assert_eq!(state, MasteryState::Mastered);
/// assert_eq!(state.after(Recall::Incorrect), MasteryState::StillLearning);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryState {
    #[default]
    Unclassified,
    StillLearning,
    StillStudying,
    Mastered,
}

impl MasteryState {
    /// Next state after one graded answer.
    #[must_use]
    pub fn after(self, recall: Recall) -> Self {
        match (self, recall) {
            (_, Recall::Incorrect) => MasteryState::StillLearning,
            (MasteryState::Unclassified | MasteryState::StillLearning, Recall::Correct) => {
                MasteryState::StillStudying
            }
            (MasteryState::StillStudying | MasteryState::Mastered, Recall::Correct) => {
                MasteryState::Mastered
            }
        }
    }

    /// Bucket field name, or `None` for unclassified cards.
    #[must_use]
    pub fn bucket(self) -> Option<&'static str> {
        match self {
            MasteryState::Unclassified => None,
            MasteryState::StillLearning => Some("still_learning"),
            MasteryState::StillStudying => Some("still_studying"),
            MasteryState::Mastered => Some("mastered"),
        }
    }
}

/// Result of one graded recall check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recall {
    Correct,
    Incorrect,
}

impl Recall {
    #[must_use]
    pub fn from_correct(correct: bool) -> Self {
        if correct { Recall::Correct } else { Recall::Incorrect }
    }
}

/// What a finished session is applied as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Reclassifies cards and counts toward `learns_completed`.
    #[default]
    Learn,
    /// Only scores; feeds `best_test_score`.
    Test,
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Graded results of one session, keyed by card.
///
/// Skipped cards stay in the denominator of a test score but are never
/// reclassified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnOutcome {
    kind: SessionKind,
    recalls: BTreeMap<CardNumber, Recall>,
    skipped: BTreeSet<CardNumber>,
}

impl LearnOutcome {
    #[must_use]
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            recalls: BTreeMap::new(),
            skipped: BTreeSet::new(),
        }
    }

    pub fn record(&mut self, card: CardNumber, recall: Recall) {
        self.skipped.remove(&card);
        self.recalls.insert(card, recall);
    }

    pub fn skip(&mut self, card: CardNumber) {
        self.recalls.remove(&card);
        self.skipped.insert(card);
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn recall_of(&self, card: CardNumber) -> Option<Recall> {
        self.recalls.get(&card).copied()
    }

    pub fn recalls(&self) -> impl Iterator<Item = (CardNumber, Recall)> + '_ {
        self.recalls.iter().map(|(card, recall)| (*card, *recall))
    }

    #[must_use]
    pub fn skipped(&self) -> &BTreeSet<CardNumber> {
        &self.skipped
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        let count = self.recalls.values().filter(|r| **r == Recall::Correct).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Questions asked, skipped ones included.
    #[must_use]
    pub fn question_count(&self) -> u32 {
        u32::try_from(self.recalls.len() + self.skipped.len()).unwrap_or(u32::MAX)
    }

    /// Session score rounded half up, `None` for an empty session.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        let total = u64::from(self.question_count());
        if total == 0 {
            return None;
        }
        let rounded = (u64::from(self.correct_count()) * 100 + total / 2) / total;
        Some(u8::try_from(rounded.min(100)).unwrap_or(100))
    }

    fn cards(&self) -> impl Iterator<Item = CardNumber> + '_ {
        self.recalls.keys().chain(self.skipped.iter()).copied()
    }
}

//
// ─── APPLYING OUTCOMES ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub card_number: CardNumber,
    pub from: MasteryState,
    pub to: MasteryState,
}

/// What changed when an outcome was applied to a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasteryUpdate {
    pub kind: SessionKind,
    pub transitions: Vec<Transition>,
    pub learns_completed: u32,
    pub session_percent: Option<u8>,
    pub best_test_score: Option<u8>,
}

impl FlashcardSet {
    /// Apply a finished session to this set.
    ///
    /// Learn sessions reclassify every graded card and count one completed
    /// learn. Test sessions only raise `best_test_score`.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError::UnknownCard` if the outcome names a card outside
    /// the set; the set is unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// # use luminous_core::mastery::{LearnOutcome, MasteryState, Recall, SessionKind};
    /// # use luminous_core::model::{CardNumber, Flashcard, FlashcardSet};
    /// let card = Flashcard::new(CardNumber::new(1), "borrow", "a reference")?;
    /// let mut set = FlashcardSet::new("Rust", "ownership", vec![card])?;
    ///
    /// let mut outcome = LearnOutcome::new(SessionKind::Learn);
    /// outcome.record(CardNumber::new(1), Recall::Correct);
    /// set.apply_outcome(&outcome)?;
    ///
    /// assert_eq!(set.state_of(CardNumber::new(1)), Some(MasteryState::StillStudying));
    /// assert_eq!(set.learns_completed(), 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn apply_outcome(&mut self, outcome: &LearnOutcome) -> Result<MasteryUpdate, MasteryError> {
        if let Some(unknown) = outcome.cards().find(|card| self.card(*card).is_none()) {
            return Err(MasteryError::UnknownCard(unknown));
        }

        let session_percent = outcome.percent();
        let mut transitions = Vec::new();

        match outcome.kind() {
            SessionKind::Learn => {
                for (card_number, recall) in outcome.recalls() {
                    let from = self.state_of(card_number).unwrap_or_default();
                    let to = from.after(recall);
                    self.set_state(card_number, to);
                    transitions.push(Transition {
                        card_number,
                        from,
                        to,
                    });
                }
                self.count_learn();
            }
            SessionKind::Test => {
                if let Some(percent) = session_percent {
                    self.record_test_score(percent);
                }
            }
        }

        Ok(MasteryUpdate {
            kind: outcome.kind(),
            transitions,
            learns_completed: self.learns_completed(),
            session_percent,
            best_test_score: self.best_test_score(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Flashcard;

    fn set(cards: u32) -> FlashcardSet {
        let flashcards = (1..=cards)
            .map(|n| Flashcard::new(CardNumber::new(n), format!("front {n}"), format!("back {n}")).unwrap())
            .collect();
        FlashcardSet::new("Set", "topic", flashcards).unwrap()
    }

    fn learn(recalls: &[(u32, Recall)]) -> LearnOutcome {
        let mut outcome = LearnOutcome::new(SessionKind::Learn);
        for (card, recall) in recalls {
            outcome.record(CardNumber::new(*card), *recall);
        }
        outcome
    }

    const C1: CardNumber = CardNumber::new(1);

    #[test]
    fn transition_table() {
        use MasteryState::*;
        assert_eq!(Unclassified.after(Recall::Incorrect), StillLearning);
        assert_eq!(Unclassified.after(Recall::Correct), StillStudying);
        assert_eq!(StillLearning.after(Recall::Correct), StillStudying);
        assert_eq!(StillStudying.after(Recall::Correct), Mastered);
        assert_eq!(Mastered.after(Recall::Correct), Mastered);
        for state in [StillLearning, StillStudying, Mastered] {
            assert_eq!(state.after(Recall::Incorrect), StillLearning);
        }
    }

    #[test]
    fn unclassified_correct_twice_is_mastered() {
        let mut s = set(1);
        s.apply_outcome(&learn(&[(1, Recall::Correct)])).unwrap();
        assert_eq!(s.state_of(C1), Some(MasteryState::StillStudying));
        s.apply_outcome(&learn(&[(1, Recall::Correct)])).unwrap();
        assert_eq!(s.state_of(C1), Some(MasteryState::Mastered));
        assert_eq!(s.learns_completed(), 2);
    }

    #[test]
    fn mastered_card_missed_once_goes_back_to_still_learning() {
        let mut s = set(1);
        for _ in 0..2 {
            s.apply_outcome(&learn(&[(1, Recall::Correct)])).unwrap();
        }
        let update = s.apply_outcome(&learn(&[(1, Recall::Incorrect)])).unwrap();
        assert_eq!(
            update.transitions,
            vec![Transition {
                card_number: C1,
                from: MasteryState::Mastered,
                to: MasteryState::StillLearning
            }]
        );
        assert_eq!(s.still_learning().len(), 1);
        assert!(s.mastered().is_empty());
    }

    #[test]
    fn mastered_stays_single_on_repeat_success() {
        let mut s = set(2);
        for _ in 0..4 {
            s.apply_outcome(&learn(&[(1, Recall::Correct)])).unwrap();
        }
        assert_eq!(s.mastered().len(), 1);
        assert_eq!(s.mastery_counts().total_classified(), 1);
    }

    #[test]
    fn skipped_cards_keep_their_state() {
        let mut s = set(2);
        let mut outcome = learn(&[(1, Recall::Incorrect)]);
        outcome.skip(CardNumber::new(2));
        let update = s.apply_outcome(&outcome).unwrap();
        assert_eq!(update.transitions.len(), 1);
        assert_eq!(s.state_of(CardNumber::new(2)), Some(MasteryState::Unclassified));
    }

    #[test]
    fn unknown_card_fails_without_changes() {
        let mut s = set(1);
        let before = s.clone();
        let err = s
            .apply_outcome(&learn(&[(1, Recall::Correct), (9, Recall::Correct)]))
            .unwrap_err();
        assert_eq!(err, MasteryError::UnknownCard(CardNumber::new(9)));
        assert_eq!(s, before);
    }

    #[test]
    fn test_sessions_only_move_best_score() {
        let mut s = set(2);
        let mut outcome = LearnOutcome::new(SessionKind::Test);
        outcome.record(C1, Recall::Correct);
        outcome.skip(CardNumber::new(2));
        let update = s.apply_outcome(&outcome).unwrap();
        assert_eq!(update.session_percent, Some(50));
        assert_eq!(s.best_test_score(), Some(50));
        assert_eq!(s.learns_completed(), 0);
        assert_eq!(s.state_of(C1), Some(MasteryState::Unclassified));

        let mut worse = LearnOutcome::new(SessionKind::Test);
        worse.record(C1, Recall::Incorrect);
        s.apply_outcome(&worse).unwrap();
        assert_eq!(s.best_test_score(), Some(50));
    }

    #[test]
    fn rerecording_a_card_replaces_its_skip() {
        let mut outcome = LearnOutcome::new(SessionKind::Learn);
        outcome.skip(C1);
        outcome.record(C1, Recall::Correct);
        assert!(outcome.skipped().is_empty());
        assert_eq!(outcome.question_count(), 1);
        assert_eq!(outcome.percent(), Some(100));
    }
}
