//! A live quiz session
//!
//! One host advances the session while many participants submit answers, all
//! against the same [`Session`]. Every operation takes the session's lock for
//! its whole read-modify-write, so a submission racing an advance either lands
//! on the question it was meant for or is rejected as stale.

use std::sync::{Mutex, MutexGuard, PoisonError};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    participant::{self, DisplayMetadata, ParticipantId, ParticipantRegistry},
    question::{self, QuestionQueue, QuestionSource},
    score::QuestionStats,
    session_id::SessionId,
    shuffle::RandomSource,
    state::{SessionState, StateKind},
};

/// Per-session play options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct Options {
    /// Play the questions in a random order fixed at creation
    #[garde(skip)]
    pub shuffle_questions: bool,
    /// Shuffle each question's answers when it becomes active
    #[garde(skip)]
    pub shuffle_answers: bool,
}

/// Outcome of an accepted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Whether the chosen answer was the correct one
    pub correct: bool,
}

/// Errors returned by session operations
///
/// None of these leave a session half-updated: the state either moved on or
/// is exactly what it was before the call.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The next question could not be played
    #[error("malformed question: {0}")]
    MalformedQuestion(#[from] question::Error),
    /// The participant was not admitted to the session
    #[error("participant {0} is not part of this session")]
    UnknownParticipant(ParticipantId),
    /// The answer targets a question that is not active
    #[error("answer is for question {got} but question {expected} is active")]
    QuestionIndexMismatch {
        /// Ordinal of the active question
        expected: usize,
        /// Ordinal the answer was submitted for
        got: usize,
    },
    /// The participant already answered the active question
    ///
    /// Carries the outcome of the first answer, which stands.
    #[error("question already answered")]
    DuplicateAnswer(AnswerResult),
    /// The operation is not available in the current phase
    #[error("operation not available while {0}")]
    InvalidOperation(StateKind),
    /// The chosen position does not name one of the answers
    #[error("answer {position} is outside of {count} choices")]
    AnswerOutOfRange {
        /// The submitted position
        position: usize,
        /// Number of answers shown
        count: usize,
    },
    /// No session exists under the handle
    #[error("session {0} does not exist")]
    UnknownSession(SessionId),
    /// Every session handle is taken
    #[error("maximum number of sessions reached")]
    TooManySessions,
    /// The roster could not be built
    #[error(transparent)]
    Registry(#[from] participant::Error),
    /// The options failed validation
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// A row of the final score table as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRow {
    /// The participant this row belongs to
    pub participant: ParticipantId,
    /// Their display name, empty if they were not on the roster
    pub display_name: String,
    /// Number of correct answers
    pub score: usize,
}

/// What clients may see of a session
///
/// The position of the correct answer is never part of a view.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionStateView {
    /// Waiting for the host to show the first question
    Starting {
        /// Number of admitted participants
        participant_count: usize,
    },
    /// A question is active
    Running {
        /// 0-based index of the active question
        ordinal: usize,
        /// The question text
        body: String,
        /// Media embedded in the question
        embed: Option<Uuid>,
        /// Answers in presentation order
        answers: Vec<String>,
        /// Participants who answered the active question
        answered_count: usize,
        /// Number of admitted participants
        participant_count: usize,
        /// Questions left after this one, when known
        remaining: Option<usize>,
    },
    /// The session is over
    Finishing {
        /// Score table, best first
        scores: Vec<ScoreRow>,
        /// Number of questions that were shown
        questions_played: usize,
        /// Per question, how many got it right
        stats: Vec<QuestionStats>,
    },
}

impl SessionStateView {
    /// Converts the view to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }

    /// The phase this view was taken in
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Starting { .. } => StateKind::Starting,
            Self::Running { .. } => StateKind::Running,
            Self::Finishing { .. } => StateKind::Finishing,
        }
    }
}

/// Everything guarded by the session lock
struct Inner {
    state: SessionState,
    questions: Box<dyn QuestionSource + Send>,
    rng: Box<dyn RandomSource + Send>,
}

/// A quiz being played synchronously by a fixed set of participants
pub struct Session {
    options: Options,
    registry: ParticipantRegistry,
    participant_ids: Vec<ParticipantId>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("participants", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session in the `Starting` state
    ///
    /// With `options.shuffle_questions` the source is drained and its
    /// questions permuted once, here; later advances follow that order.
    pub fn new<Q, R>(
        mut questions: Q,
        options: Options,
        registry: ParticipantRegistry,
        mut rng: R,
    ) -> Self
    where
        Q: QuestionSource + Send + 'static,
        R: RandomSource + Send + 'static,
    {
        let questions: Box<dyn QuestionSource + Send> = if options.shuffle_questions {
            Box::new(QuestionQueue::drain(&mut questions).shuffled(&mut rng))
        } else {
            Box::new(questions)
        };

        debug!(
            participants = registry.len(),
            shuffle_questions = options.shuffle_questions,
            shuffle_answers = options.shuffle_answers,
            "session created"
        );

        Self {
            options,
            participant_ids: registry.ids(),
            registry,
            inner: Mutex::new(Inner {
                state: SessionState::Starting,
                questions,
                rng: Box::new(rng),
            }),
        }
    }

    /// Creates a session drawing from an entropy-seeded generator
    pub fn create<Q>(questions: Q, options: Options, registry: ParticipantRegistry) -> Self
    where
        Q: QuestionSource + Send + 'static,
    {
        Self::new(questions, options, registry, fastrand::Rng::new())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // the state is only ever replaced whole, so a poisoned lock still guards a consistent value
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to the next question, or finishes when there is none
    ///
    /// Once finished, further calls return the final view without touching
    /// the question source.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedQuestion` if the pulled question cannot be
    /// played. That question is skipped and the state stays as it was.
    pub fn advance(&self) -> Result<SessionStateView, Error> {
        let mut inner = self.lock();
        let Inner {
            state,
            questions,
            rng,
        } = &mut *inner;

        if !state.is_finished() {
            let question = questions.next_question();
            let next = state
                .next(
                    question.as_ref(),
                    self.options.shuffle_answers,
                    &self.participant_ids,
                    rng.as_mut(),
                )
                .inspect_err(|e| warn!(error = %e, "question skipped"))?;
            *state = next;

            match state {
                SessionState::Running(running) => {
                    info!(ordinal = running.ordinal, "question started");
                }
                SessionState::Finishing(finishing) => {
                    info!(
                        questions_played = finishing.questions_played,
                        "session finished"
                    );
                }
                SessionState::Starting => {}
            }
        }

        Ok(self.view(&inner))
    }

    /// Finishes the session now, scoring whatever has been answered so far
    ///
    /// Safe to call in any state; already finished sessions are returned as is.
    pub fn end_early(&self) -> SessionStateView {
        let mut inner = self.lock();
        if !inner.state.is_finished() {
            let next = inner.state.finish(&self.participant_ids);
            inner.state = next;
            info!("session ended early");
        }
        self.view(&inner)
    }

    /// Records a participant's answer to the active question
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// * `Error::UnknownParticipant` - `participant` was not admitted
    /// * `Error::InvalidOperation` - no question is active
    /// * `Error::QuestionIndexMismatch` - `ordinal` is not the active question
    /// * `Error::DuplicateAnswer` - already answered; carries the first outcome
    /// * `Error::AnswerOutOfRange` - `position` does not name an answer
    pub fn submit_answer(
        &self,
        participant: ParticipantId,
        position: usize,
        ordinal: usize,
    ) -> Result<AnswerResult, Error> {
        if !self.registry.contains(participant) {
            warn!(%participant, "answer from unknown participant");
            return Err(Error::UnknownParticipant(participant));
        }

        let mut inner = self.lock();
        let running = match &inner.state {
            SessionState::Running(running) => running,
            other => return Err(Error::InvalidOperation(other.kind())),
        };

        if ordinal != running.ordinal {
            debug!(%participant, expected = running.ordinal, got = ordinal, "stale answer");
            return Err(Error::QuestionIndexMismatch {
                expected: running.ordinal,
                got: ordinal,
            });
        }

        if let Some(correct) = running.answered(participant) {
            return Err(Error::DuplicateAnswer(AnswerResult { correct }));
        }

        if position >= running.answers.len() {
            return Err(Error::AnswerOutOfRange {
                position,
                count: running.answers.len(),
            });
        }

        let correct = running.is_correct(position);
        let next = running.with_answer(participant, position);
        inner.state = SessionState::Running(next);
        debug!(%participant, ordinal, correct, "answer recorded");

        Ok(AnswerResult { correct })
    }

    /// Returns the current view without changing anything
    pub fn current_view(&self) -> SessionStateView {
        self.view(&self.lock())
    }

    /// The current phase
    pub fn kind(&self) -> StateKind {
        self.lock().state.kind()
    }

    /// A copy of the full current state, including the correct position
    ///
    /// For hosts and tests; never send this to participants.
    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Display metadata of an admitted participant
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownParticipant` if `participant` was not admitted.
    pub fn participant(&self, participant: ParticipantId) -> Result<DisplayMetadata, Error> {
        self.registry
            .get(participant)
            .cloned()
            .ok_or(Error::UnknownParticipant(participant))
    }

    /// The session roster
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// The options the session was created with
    pub fn options(&self) -> Options {
        self.options
    }

    fn view(&self, inner: &Inner) -> SessionStateView {
        match &inner.state {
            SessionState::Starting => SessionStateView::Starting {
                participant_count: self.registry.len(),
            },
            SessionState::Running(running) => SessionStateView::Running {
                ordinal: running.ordinal,
                body: running.body.clone(),
                embed: running.embed,
                answers: running.answers.clone(),
                answered_count: running.answered_count(),
                participant_count: self.registry.len(),
                remaining: inner.questions.remaining(),
            },
            SessionState::Finishing(finishing) => SessionStateView::Finishing {
                scores: finishing
                    .scores
                    .iter()
                    .map(|entry| ScoreRow {
                        participant: entry.participant,
                        display_name: self
                            .registry
                            .get(entry.participant)
                            .map(|m| m.display_name.clone())
                            .unwrap_or_default(),
                        score: entry.score,
                    })
                    .collect(),
                questions_played: finishing.questions_played,
                stats: finishing.stats.clone(),
            },
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{question::Question, shuffle::tests::Scripted};

    fn id(n: i32) -> ParticipantId {
        ParticipantId::new(n)
    }

    fn registry(ids: &[i32]) -> ParticipantRegistry {
        ParticipantRegistry::new(
            ids.iter()
                .map(|n| (id(*n), DisplayMetadata::named(format!("Player {n}")))),
        )
        .unwrap()
    }

    fn queue(questions: Vec<Question>) -> QuestionQueue {
        QuestionQueue::new(questions)
    }

    fn question(index: u32, correct: u8) -> Question {
        Question::new(
            index,
            format!("Question {index}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
    }

    fn session(questions: Vec<Question>, options: Options) -> Session {
        Session::new(queue(questions), options, registry(&[1, 2]), Scripted::new(&[]))
    }

    #[test]
    fn test_new_session_is_starting() {
        let session = session(vec![question(0, 1)], Options::default());
        assert_eq!(
            session.current_view(),
            SessionStateView::Starting {
                participant_count: 2
            }
        );
        assert_eq!(session.kind(), StateKind::Starting);
    }

    #[test]
    fn test_advance_hides_correct_position() {
        let session = session(vec![question(0, 3)], Options::default());
        let view = session.advance().unwrap();

        match &view {
            SessionStateView::Running {
                ordinal,
                answers,
                answered_count,
                remaining,
                ..
            } => {
                assert_eq!(*ordinal, 0);
                assert_eq!(answers, &vec!["a", "b", "c", "d"]);
                assert_eq!(*answered_count, 0);
                assert_eq!(*remaining, Some(0));
            }
            other => panic!("expected Running, got {other:?}"),
        }

        let message = view.to_message();
        assert!(message.contains("Running"));
        assert!(!message.contains("correct"));
    }

    #[test]
    fn test_submit_answer_outcomes() {
        let session = session(vec![question(0, 2)], Options::default());
        session.advance().unwrap();

        assert_eq!(
            session.submit_answer(id(1), 1, 0),
            Ok(AnswerResult { correct: true })
        );
        assert_eq!(
            session.submit_answer(id(2), 0, 0),
            Ok(AnswerResult { correct: false })
        );
    }

    #[test]
    fn test_submit_answer_rejections() {
        let session = session(vec![question(0, 1), question(1, 1)], Options::default());

        assert_eq!(
            session.submit_answer(id(1), 0, 0),
            Err(Error::InvalidOperation(StateKind::Starting))
        );
        assert_eq!(
            session.submit_answer(id(9), 0, 0),
            Err(Error::UnknownParticipant(id(9)))
        );

        session.advance().unwrap();
        assert_eq!(
            session.submit_answer(id(1), 4, 0),
            Err(Error::AnswerOutOfRange {
                position: 4,
                count: 4
            })
        );
        assert_eq!(
            session.submit_answer(id(1), 0, 1),
            Err(Error::QuestionIndexMismatch {
                expected: 0,
                got: 1
            })
        );

        session.end_early();
        assert_eq!(
            session.submit_answer(id(1), 0, 0),
            Err(Error::InvalidOperation(StateKind::Finishing))
        );
    }

    #[test]
    fn test_duplicate_answer_keeps_first() {
        let session = session(vec![question(0, 1)], Options::default());
        session.advance().unwrap();

        assert_eq!(
            session.submit_answer(id(1), 0, 0),
            Ok(AnswerResult { correct: true })
        );
        assert_eq!(
            session.submit_answer(id(1), 2, 0),
            Err(Error::DuplicateAnswer(AnswerResult { correct: true }))
        );

        match session.snapshot() {
            SessionState::Running(running) => assert_eq!(running.histories[&id(1)], vec![true]),
            other => panic!("expected Running, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_question_is_skipped() {
        let broken = Question::new(1, "broken", vec!["only".into()], 1);
        let session = session(vec![question(0, 1), broken, question(2, 1)], Options::default());

        session.advance().unwrap();
        assert_eq!(
            session.advance(),
            Err(Error::MalformedQuestion(question::Error::TooFewAnswers(1)))
        );
        match session.current_view() {
            SessionStateView::Running { ordinal, .. } => assert_eq!(ordinal, 0),
            other => panic!("expected Running, got {other:?}"),
        }

        match session.advance().unwrap() {
            SessionStateView::Running { ordinal, body, .. } => {
                assert_eq!(ordinal, 1);
                assert_eq!(body, "Question 2");
            }
            other => panic!("expected Running, got {other:?}"),
        }
    }

    #[test]
    fn test_end_early_scores_so_far() {
        let session = session(vec![question(0, 1), question(1, 1)], Options::default());
        session.advance().unwrap();
        session.submit_answer(id(2), 0, 0).unwrap();

        let view = session.end_early();
        match &view {
            SessionStateView::Finishing {
                scores,
                questions_played,
                ..
            } => {
                assert_eq!(*questions_played, 1);
                assert_eq!(scores[0].participant, id(2));
                assert_eq!(scores[0].score, 1);
                assert_eq!(scores[0].display_name, "Player 2");
                assert_eq!(scores[1].score, 0);
            }
            other => panic!("expected Finishing, got {other:?}"),
        }

        assert_eq!(session.end_early(), view);
        assert_eq!(session.advance().unwrap(), view);
    }

    #[test]
    fn test_shuffle_questions_fixed_at_creation() {
        let questions = (0..6).map(|i| question(i, 1)).collect::<Vec<_>>();
        let session = Session::new(
            queue(questions),
            Options {
                shuffle_questions: true,
                shuffle_answers: false,
            },
            registry(&[1]),
            fastrand::Rng::with_seed(11),
        );

        let mut bodies = Vec::new();
        while let SessionStateView::Running { body, .. } = session.advance().unwrap() {
            bodies.push(body);
        }
        bodies.sort();
        assert_eq!(
            bodies,
            (0..6).map(|i| format!("Question {i}")).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_shuffle_answers_per_question() {
        let session = Session::new(
            queue(vec![question(0, 1)]),
            Options {
                shuffle_questions: false,
                shuffle_answers: true,
            },
            registry(&[1]),
            Scripted::new(&[0, 2, 0]),
        );

        match session.advance().unwrap() {
            SessionStateView::Running { answers, .. } => {
                assert_eq!(answers, vec!["b", "d", "c", "a"]);
            }
            other => panic!("expected Running, got {other:?}"),
        }
        assert_eq!(
            session.submit_answer(id(1), 3, 0),
            Ok(AnswerResult { correct: true })
        );
    }

    #[test]
    fn test_duplicate_answer_wins_over_bad_position() {
        let session = session(vec![question(0, 1)], Options::default());
        session.advance().unwrap();

        assert_eq!(
            session.submit_answer(id(1), 0, 0),
            Ok(AnswerResult { correct: true })
        );
        assert_eq!(
            session.submit_answer(id(1), 7, 0),
            Err(Error::DuplicateAnswer(AnswerResult { correct: true }))
        );
    }

    #[test]
    fn test_long_question_text_is_played() {
        let long = Question::new(
            0,
            "x".repeat(1001),
            vec!["a".repeat(201), "b".into()],
            1,
        );
        let session = session(vec![long], Options::default());

        match session.advance().unwrap() {
            SessionStateView::Running { ordinal, body, .. } => {
                assert_eq!(ordinal, 0);
                assert_eq!(body.len(), 1001);
            }
            other => panic!("expected Running, got {other:?}"),
        }
        assert_eq!(
            session.submit_answer(id(1), 0, 0),
            Ok(AnswerResult { correct: true })
        );
    }

    #[test]
    fn test_question_count_does_not_depend_on_shuffling() {
        for shuffle_questions in [false, true] {
            let session = Session::new(
                queue((0..150).map(|i| question(i, 1)).collect()),
                Options {
                    shuffle_questions,
                    shuffle_answers: false,
                },
                registry(&[1]),
                fastrand::Rng::with_seed(5),
            );

            let mut played = 0;
            while session.advance().unwrap().kind() == StateKind::Running {
                played += 1;
            }
            assert_eq!(played, 150);
            match session.current_view() {
                SessionStateView::Finishing {
                    questions_played, ..
                } => assert_eq!(questions_played, 150),
                other => panic!("expected Finishing, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_two_answer_question_shuffled() {
        let two = Question::new(0, "Yes or no?", vec!["yes".into(), "no".into()], 1);
        let session = Session::new(
            queue(vec![two]),
            Options {
                shuffle_questions: false,
                shuffle_answers: true,
            },
            registry(&[1, 2]),
            Scripted::new(&[0]),
        );

        match session.advance().unwrap() {
            SessionStateView::Running { answers, .. } => {
                assert_eq!(answers, vec!["no", "yes"]);
            }
            other => panic!("expected Running, got {other:?}"),
        }
        assert_eq!(
            session.submit_answer(id(1), 1, 0),
            Ok(AnswerResult { correct: true })
        );
        assert_eq!(
            session.submit_answer(id(2), 0, 0),
            Ok(AnswerResult { correct: false })
        );
    }

    #[test]
    fn test_end_early_before_first_question() {
        let session = session(vec![question(0, 1), question(1, 1)], Options::default());

        match session.end_early() {
            SessionStateView::Finishing {
                scores,
                questions_played,
                stats,
            } => {
                assert_eq!(questions_played, 0);
                assert!(stats.is_empty());
                assert_eq!(
                    scores
                        .iter()
                        .map(|row| (row.participant, row.score))
                        .collect::<Vec<_>>(),
                    vec![(id(1), 0), (id(2), 0)]
                );
            }
            other => panic!("expected Finishing, got {other:?}"),
        }
        assert_eq!(session.kind(), StateKind::Finishing);
    }

    #[test]
    fn test_participant_lookup() {
        let session = session(vec![], Options::default());
        assert_eq!(session.participant(id(1)).unwrap().display_name, "Player 1");
        assert_eq!(
            session.participant(id(3)),
            Err(Error::UnknownParticipant(id(3)))
        );
    }

    #[test]
    fn test_options_deserialize() {
        let options: Options =
            serde_json::from_str(r#"{"shuffle_questions":true,"shuffle_answers":false}"#).unwrap();
        assert!(options.shuffle_questions);
        assert!(!options.shuffle_answers);
        assert!(options.validate().is_ok());
    }
}
