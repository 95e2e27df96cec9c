//! Session state and the transition function that advances it
//!
//! A session is always in exactly one [`SessionState`]. Advancing never
//! edits a state in place: [`SessionState::next`] builds the successor and
//! the owning session swaps it in, so a failed transition leaves the old
//! state untouched.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    participant::ParticipantId,
    question::{self, Question},
    score::{self, QuestionStats, ScoreEntry},
    shuffle::{self, RandomSource},
};

/// The phase of a session without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum StateKind {
    /// Created, no question shown yet
    Starting,
    /// A question is active
    Running,
    /// Scores are final
    Finishing,
}

/// The current phase of a session and the data belonging to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Initial state
    Starting,
    /// A question is being played
    Running(Running),
    /// The session is over; terminal
    Finishing(Finishing),
}

/// Data of the question currently being played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Running {
    /// 0-based index of the active question within the session
    pub ordinal: usize,
    /// Text of the active question
    pub body: String,
    /// Media embedded in the active question
    pub embed: Option<Uuid>,
    /// Answers in presentation order
    pub answers: Vec<String>,
    /// Index into `answers` of the correct answer
    pub correct_position: usize,
    /// Per participant, whether each question so far was answered correctly
    ///
    /// A history has `ordinal` entries until its owner answers the active
    /// question, and `ordinal + 1` afterwards.
    pub histories: BTreeMap<ParticipantId, Vec<bool>>,
}

/// Final results of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finishing {
    /// Score table, best first
    pub scores: Vec<ScoreEntry>,
    /// Participants present when the session finished, ascending
    pub roster: Vec<ParticipantId>,
    /// Number of questions that were shown
    pub questions_played: usize,
    /// Per question, how many got it right
    pub stats: Vec<QuestionStats>,
}

impl SessionState {
    /// Returns the phase without its data
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Starting => StateKind::Starting,
            Self::Running(_) => StateKind::Running,
            Self::Finishing(_) => StateKind::Finishing,
        }
    }

    /// Whether the session has reached its terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finishing(_))
    }

    /// Computes the state that follows this one
    ///
    /// | current   | question | next                                  |
    /// |-----------|----------|---------------------------------------|
    /// | Starting  | some     | Running, ordinal 0, empty histories   |
    /// | Starting  | none     | Finishing, everybody at 0             |
    /// | Running   | some     | Running, ordinal + 1, padded history  |
    /// | Running   | none     | Finishing, scores from histories      |
    /// | Finishing | any      | the same Finishing                    |
    ///
    /// `participants` seeds the histories when leaving `Starting`; afterwards
    /// the roster is the set of history owners.
    ///
    /// # Errors
    ///
    /// Returns a `question::Error` when `question` cannot be played. Nothing
    /// is consumed from `self` in that case.
    pub fn next<R: RandomSource + ?Sized>(
        &self,
        question: Option<&Question>,
        shuffle_answers: bool,
        participants: &[ParticipantId],
        rng: &mut R,
    ) -> Result<SessionState, question::Error> {
        Ok(match (self, question) {
            (Self::Finishing(finishing), _) => Self::Finishing(finishing.clone()),
            (Self::Starting, Some(question)) => Self::Running(Running::first(
                question,
                shuffle_answers,
                participants,
                rng,
            )?),
            (Self::Running(running), Some(question)) => {
                Self::Running(running.advance(question, shuffle_answers, rng)?)
            }
            (_, None) => self.finish(participants),
        })
    }

    /// Computes the terminal state reached from this one
    ///
    /// Same as [`SessionState::next`] without a question, which cannot fail.
    pub fn finish(&self, participants: &[ParticipantId]) -> SessionState {
        Self::Finishing(match self {
            Self::Starting => Finishing::empty(participants),
            Self::Running(running) => Finishing::from_running(running),
            Self::Finishing(finishing) => finishing.clone(),
        })
    }
}

impl Running {
    fn first<R: RandomSource + ?Sized>(
        question: &Question,
        shuffle_answers: bool,
        participants: &[ParticipantId],
        rng: &mut R,
    ) -> Result<Self, question::Error> {
        Self::build(
            0,
            question,
            shuffle_answers,
            participants.iter().map(|id| (*id, Vec::new())).collect(),
            rng,
        )
    }

    fn advance<R: RandomSource + ?Sized>(
        &self,
        question: &Question,
        shuffle_answers: bool,
        rng: &mut R,
    ) -> Result<Self, question::Error> {
        let ordinal = self.ordinal + 1;

        let histories = self
            .histories
            .iter()
            .map(|(id, history)| {
                let mut history = history.clone();
                if history.len() < ordinal {
                    history.resize(ordinal, false);
                }
                (*id, history)
            })
            .collect();

        Self::build(ordinal, question, shuffle_answers, histories, rng)
    }

    fn build<R: RandomSource + ?Sized>(
        ordinal: usize,
        question: &Question,
        shuffle_answers: bool,
        histories: BTreeMap<ParticipantId, Vec<bool>>,
        rng: &mut R,
    ) -> Result<Self, question::Error> {
        let shuffled =
            shuffle::shuffle_answers(&question.answers, question.correct, shuffle_answers, rng)?;

        Ok(Self {
            ordinal,
            body: question.body.clone(),
            embed: question.embed,
            answers: shuffled.answers,
            correct_position: shuffled.correct_position,
            histories,
        })
    }

    /// The recorded outcome of `participant` for the active question, if any
    pub fn answered(&self, participant: ParticipantId) -> Option<bool> {
        self.histories
            .get(&participant)
            .and_then(|history| history.get(self.ordinal).copied())
    }

    /// Number of participants who answered the active question
    pub fn answered_count(&self) -> usize {
        self.histories
            .values()
            .filter(|history| history.len() > self.ordinal)
            .count()
    }

    /// Whether choosing `position` answers the active question correctly
    pub fn is_correct(&self, position: usize) -> bool {
        position == self.correct_position
    }

    /// This question with `participant`'s slot filled by choosing `position`
    ///
    /// A slot that is already filled keeps its first outcome.
    #[must_use]
    pub fn with_answer(&self, participant: ParticipantId, position: usize) -> Self {
        let mut next = self.clone();
        let history = next.histories.entry(participant).or_default();
        if history.len() <= self.ordinal {
            history.resize(self.ordinal, false);
            history.push(self.is_correct(position));
        }
        next
    }
}

impl Finishing {
    fn empty(participants: &[ParticipantId]) -> Self {
        let roster = participants.iter().copied().sorted().dedup().collect_vec();
        Self {
            scores: score::aggregate(&BTreeMap::new(), &roster),
            roster,
            questions_played: 0,
            stats: Vec::new(),
        }
    }

    fn from_running(running: &Running) -> Self {
        let questions_played = running.ordinal + 1;
        let roster = running.histories.keys().copied().collect_vec();
        Self {
            scores: score::aggregate(&running.histories, &roster),
            roster,
            questions_played,
            stats: score::question_stats(&running.histories, questions_played),
        }
    }

    /// The score of `participant`, if they were on the roster
    pub fn score_of(&self, participant: ParticipantId) -> Option<usize> {
        self.scores
            .iter()
            .find(|entry| entry.participant == participant)
            .map(|entry| entry.score)
    }
}
