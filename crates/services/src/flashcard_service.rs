use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};

use luminous_core::mastery::{MasteryState, MasteryUpdate, SessionKind};
use luminous_core::model::{
    CardQuestion, ContentId, Course, Flashcard, FlashcardLearn, FlashcardSet, Grade,
    LearnSession, MatchPolicy, QuestionError, QuickLearn, Response, SourceType, UserId,
};
use storage::repository::{ContentRepository, Storage, StorageError};

use crate::Clock;
use crate::content_service::refresh_logged;
use crate::error::FlashcardServiceError;

/// Wrong choices offered next to the right one in a multiple-choice card.
const MAX_DISTRACTORS: usize = 3;

/// Runs learn and test sessions over stored flashcard sets.
#[derive(Clone)]
pub struct FlashcardService {
    clock: Clock,
    policy: MatchPolicy,
    session_size: usize,
    sets: Arc<dyn ContentRepository<FlashcardSet>>,
    courses: Arc<dyn ContentRepository<Course>>,
    quick_learns: Arc<dyn ContentRepository<QuickLearn>>,
    rng: Arc<Mutex<StdRng>>,
}

impl FlashcardService {
    #[must_use]
    pub fn new(clock: Clock, policy: MatchPolicy, session_size: usize, storage: &Storage) -> Self {
        Self {
            clock,
            policy,
            session_size: session_size.max(1),
            sets: Arc::clone(&storage.flashcard_sets),
            courses: Arc::clone(&storage.courses),
            quick_learns: Arc::clone(&storage.quick_learns),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Use a seeded generator so quizzes are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    #[must_use]
    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Load a set, record the access, and resolve its source link.
    ///
    /// A `source_id` that no longer resolves is logged and dropped from the
    /// returned set; the stored document keeps it.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Storage` if the set is missing or
    /// repository access fails.
    pub async fn load_set(
        &self,
        owner: &UserId,
        id: ContentId,
    ) -> Result<FlashcardSet, FlashcardServiceError> {
        let mut set = self.sets.get(owner, id).await?;
        refresh_logged(&mut set);
        set.last_accessed = Some(self.clock.timestamp());
        self.sets.upsert(owner, id, &set).await?;

        if let Some(source_id) = set.source_id {
            if !self.source_exists(owner, source_id, set.source_type).await? {
                tracing::warn!(
                    %id,
                    %source_id,
                    source_type = ?set.source_type,
                    "flashcard set source does not resolve; dropping link"
                );
                set.detach_source();
            }
        }
        Ok(set)
    }

    /// Build a quiz for `set`.
    ///
    /// Learn sessions favour cards still being learned, then unclassified
    /// ones, and leave mastered cards for last.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Empty` for a set without cards.
    pub fn build_quiz(
        &self,
        set: &FlashcardSet,
        kind: SessionKind,
    ) -> Result<FlashcardLearn, FlashcardServiceError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        build_quiz(&mut *rng, set, kind, self.session_size)
    }

    /// Load a set and start a session over a fresh quiz.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError` if the set cannot be loaded or has no cards.
    pub async fn start_session(
        &self,
        owner: &UserId,
        id: ContentId,
        kind: SessionKind,
    ) -> Result<(FlashcardSet, LearnSession), FlashcardServiceError> {
        let set = self.load_set(owner, id).await?;
        let quiz = self.build_quiz(&set, kind)?;
        let session = LearnSession::new(kind, &set, quiz)?;
        tracing::debug!(%id, ?kind, questions = session.questions().len(), "flashcard session started");
        Ok((set, session))
    }

    /// Grade one answer with the configured match policy.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Learn` for bad indexes, repeated
    /// answers, and mis-shaped responses.
    pub fn answer(
        &self,
        session: &mut LearnSession,
        index: usize,
        response: &Response,
    ) -> Result<Grade, FlashcardServiceError> {
        Ok(session.answer(index, response, self.policy)?)
    }

    /// Apply a finished session to the set and persist it.
    ///
    /// `set` is replaced only after the write succeeds.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Mastery` if the session names a card
    /// outside the set.
    /// Returns `FlashcardServiceError::Storage` if persistence fails.
    pub async fn finish_session(
        &self,
        owner: &UserId,
        id: ContentId,
        set: &mut FlashcardSet,
        session: LearnSession,
    ) -> Result<MasteryUpdate, FlashcardServiceError> {
        let outcome = session.finish();
        let mut next = set.clone();
        let update = next.apply_outcome(&outcome)?;
        next.last_accessed = Some(self.clock.timestamp());

        self.sets.upsert(owner, id, &next).await.map_err(|err| {
            tracing::error!(%id, error = %err, "flashcard session not saved; outcome discarded");
            err
        })?;

        for transition in &update.transitions {
            tracing::debug!(
                card = %transition.card_number,
                from = ?transition.from,
                to = ?transition.to,
                "card reclassified"
            );
        }
        tracing::info!(
            %id,
            kind = ?update.kind,
            percent = ?update.session_percent,
            learns_completed = update.learns_completed,
            "flashcard session applied"
        );
        *set = next;
        Ok(update)
    }

    async fn source_exists(
        &self,
        owner: &UserId,
        source_id: ContentId,
        source_type: Option<SourceType>,
    ) -> Result<bool, StorageError> {
        match source_type {
            Some(SourceType::QuickLearn) => found(self.quick_learns.get(owner, source_id).await),
            Some(SourceType::Course | SourceType::Unit | SourceType::Lesson) => {
                found(self.courses.get(owner, source_id).await)
            }
            None => {
                if found(self.courses.get(owner, source_id).await)? {
                    return Ok(true);
                }
                found(self.quick_learns.get(owner, source_id).await)
            }
        }
    }
}

fn found<T>(result: Result<T, StorageError>) -> Result<bool, StorageError> {
    match result {
        Ok(_) => Ok(true),
        Err(StorageError::NotFound) => Ok(false),
        Err(err) => Err(err),
    }
}

fn study_priority(state: MasteryState) -> u8 {
    match state {
        MasteryState::StillLearning => 0,
        MasteryState::Unclassified => 1,
        MasteryState::StillStudying => 2,
        MasteryState::Mastered => 3,
    }
}

fn build_quiz<R: Rng + ?Sized>(
    rng: &mut R,
    set: &FlashcardSet,
    kind: SessionKind,
    size: usize,
) -> Result<FlashcardLearn, FlashcardServiceError> {
    let mut cards: Vec<&Flashcard> = set.flashcards().iter().collect();
    if cards.is_empty() {
        return Err(FlashcardServiceError::Empty);
    }

    cards.shuffle(rng);
    if kind == SessionKind::Learn {
        // Stable sort keeps the shuffle inside each priority group.
        cards.sort_by_key(|card| study_priority(set.state_of(card.card_number()).unwrap_or_default()));
    }
    cards.truncate(size);

    let questions = cards
        .into_iter()
        .map(|card| card_question(rng, set, card))
        .collect::<Result<Vec<_>, QuestionError>>()?;
    Ok(FlashcardLearn { questions })
}

fn card_question<R: Rng + ?Sized>(
    rng: &mut R,
    set: &FlashcardSet,
    card: &Flashcard,
) -> Result<CardQuestion, QuestionError> {
    let mut distractors: Vec<&str> = set
        .flashcards()
        .iter()
        .map(Flashcard::back)
        .filter(|back| *back != card.back())
        .collect();
    distractors.sort_unstable();
    distractors.dedup();

    if distractors.is_empty() {
        return CardQuestion::typed_recall(card);
    }

    match rng.random_range(0..3) {
        0 => {
            distractors.shuffle(rng);
            let mut choices: Vec<String> = distractors
                .into_iter()
                .take(MAX_DISTRACTORS)
                .map(str::to_owned)
                .collect();
            choices.push(card.back().to_owned());
            choices.shuffle(rng);
            CardQuestion::multiple_choice(card, choices)
        }
        1 => {
            let shown = if rng.random_bool(0.5) {
                card.back()
            } else {
                distractors.choose(rng).copied().unwrap_or(card.back())
            };
            CardQuestion::true_or_false(card, shown)
        }
        _ => CardQuestion::typed_recall(card),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use luminous_core::mastery::{LearnOutcome, Recall};
    use luminous_core::model::{CardNumber, QuestionKind};
    use luminous_core::time::fixed_clock;

    fn owner() -> UserId {
        UserId::new("learner-1").unwrap()
    }

    fn set(cards: u32) -> FlashcardSet {
        let cards = (1..=cards)
            .map(|n| Flashcard::new(CardNumber::new(n), format!("term {n}"), format!("meaning {n}")).unwrap())
            .collect();
        FlashcardSet::new("Vocabulary", "rust", cards).unwrap()
    }

    fn service(storage: &Storage, size: usize) -> FlashcardService {
        FlashcardService::new(fixed_clock(), MatchPolicy::default(), size, storage).with_seed(7)
    }

    #[test]
    fn quiz_respects_session_size_without_repeating_cards() {
        let storage = Storage::in_memory();
        let quiz = service(&storage, 4).build_quiz(&set(9), SessionKind::Test).unwrap();
        assert_eq!(quiz.questions.len(), 4);

        let distinct: HashSet<_> = quiz.questions.iter().map(|q| q.card_number).collect();
        assert_eq!(distinct.len(), 4);
        quiz.validate_against(&set(9)).unwrap();
    }

    #[test]
    fn learn_quiz_puts_struggling_cards_first() {
        let mut set = set(5);
        let mut outcome = LearnOutcome::new(SessionKind::Learn);
        outcome.record(CardNumber::new(4), Recall::Incorrect);
        outcome.record(CardNumber::new(1), Recall::Correct);
        set.apply_outcome(&outcome).unwrap();

        let storage = Storage::in_memory();
        let quiz = service(&storage, 2).build_quiz(&set, SessionKind::Learn).unwrap();
        assert_eq!(quiz.questions[0].card_number, CardNumber::new(4));
        assert_ne!(quiz.questions[1].card_number, CardNumber::new(1));
    }

    #[test]
    fn single_card_sets_use_typed_recall() {
        let storage = Storage::in_memory();
        let quiz = service(&storage, 10).build_quiz(&set(1), SessionKind::Learn).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].question.kind(), QuestionKind::FillInTheBlank);
    }

    #[test]
    fn empty_sets_cannot_be_quizzed() {
        let storage = Storage::in_memory();
        let empty = FlashcardSet::new("Empty", "rust", Vec::new()).unwrap();
        let err = service(&storage, 10).build_quiz(&empty, SessionKind::Learn).unwrap_err();
        assert!(matches!(err, FlashcardServiceError::Empty));
    }

    #[tokio::test]
    async fn unresolved_source_is_detached_on_load() {
        let storage = Storage::in_memory();
        let id = ContentId::generate();
        let mut linked = set(2);
        linked.source_id = Some(ContentId::generate());
        linked.source_type = Some(SourceType::Course);
        storage.flashcard_sets.upsert(&owner(), id, &linked).await.unwrap();

        let loaded = service(&storage, 10).load_set(&owner(), id).await.unwrap();
        assert_eq!(loaded.source_id, None);
        assert_eq!(loaded.source_type, None);

        let stored = storage.flashcard_sets.get(&owner(), id).await.unwrap();
        assert_eq!(stored.source_id, linked.source_id);
    }
}
