mod assessment;
mod course;
mod flashcard;
mod ids;
mod learn;
mod lesson;
mod outline;
mod progress;
mod question;
mod quick_learn;
mod text;
mod wire;

pub use ids::{CardNumber, ContentId, LessonNumber, ParseIdError, UnitNumber, UserId};

pub use assessment::{QuestionResult, Score, Submission, Test};
pub use course::{Course, Unit};
pub use flashcard::{Flashcard, FlashcardSet, FlashcardSetRecord, MasteryCounts, SourceType};
pub use learn::{CardQuestion, FlashcardLearn, LearnError, LearnSession, SessionProgress};
pub use lesson::{Lesson, LessonStatus, Resource};
pub use outline::{LessonOutline, Syllabus, UnitOutline};
pub use progress::{ProgressError, StaleAggregate};
pub use question::{
    Grade, MatchPolicy, Question, QuestionError, QuestionKind, Response, ResponseKind,
    ShapeMismatch, Verdict,
};
pub use quick_learn::QuickLearn;
