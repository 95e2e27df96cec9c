//! Questions as they are fed into a live session
//!
//! Questions are read-only inputs owned by the persistence layer. This module
//! defines their shape, the checks that make a question playable, and the
//! [`QuestionSource`] seam through which a session pulls them one at a time.

use std::collections::VecDeque;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    constants,
    shuffle::{self, RandomSource},
};

/// Reasons a question cannot be played
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fewer answer texts than a question needs
    #[error("question has {0} answers, at least 2 are required")]
    TooFewAnswers(usize),
    /// More answer texts than a question may carry
    #[error("question has {0} answers, at most 4 are allowed")]
    TooManyAnswers(usize),
    /// The correct ordinal does not point into the answer list
    #[error("correct answer {correct} is outside of [1, {count}]")]
    CorrectOutOfRange {
        /// The 1-based ordinal that was supplied
        correct: u8,
        /// Number of answers available
        count: usize,
    },
    /// A text field failed validation
    #[error("question failed validation: {0}")]
    Invalid(String),
}

/// A single multiple-choice question
///
/// `correct` is a 1-based ordinal into the unshuffled `answers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// Position of the question within its quiz
    #[garde(skip)]
    pub index: u32,
    /// The question text
    #[garde(length(max = constants::question::MAX_BODY_LENGTH))]
    pub body: String,
    /// Answer texts in authored order
    #[garde(inner(length(max = constants::question::MAX_ANSWER_LENGTH)))]
    pub answers: Vec<String>,
    /// 1-based ordinal of the correct answer
    #[garde(skip)]
    pub correct: u8,
    /// Reference to embedded media, if any
    #[garde(skip)]
    pub embed: Option<Uuid>,
}

impl Question {
    /// Creates a question from its parts without checking it
    pub fn new(index: u32, body: impl Into<String>, answers: Vec<String>, correct: u8) -> Self {
        Self {
            index,
            body: body.into(),
            answers,
            correct,
            embed: None,
        }
    }

    /// Builds a question from the stored row shape: two mandatory answers
    /// followed by two optional ones
    pub fn from_columns(
        index: u32,
        body: impl Into<String>,
        answer1: impl Into<String>,
        answer2: impl Into<String>,
        answer3: Option<String>,
        answer4: Option<String>,
        correct: u8,
        embed: Option<Uuid>,
    ) -> Self {
        let answers = [Some(answer1.into()), Some(answer2.into()), answer3, answer4]
            .into_iter()
            .flatten()
            .collect();

        Self {
            index,
            body: body.into(),
            answers,
            correct,
            embed,
        }
    }

    /// Attaches an embedded media reference
    #[must_use]
    pub fn with_embed(mut self, embed: Uuid) -> Self {
        self.embed = Some(embed);
        self
    }

    /// Checks that the question can be played
    ///
    /// Only the answer list and the correct ordinal matter here; text length
    /// never keeps a question from being played.
    ///
    /// # Errors
    ///
    /// * `Error::TooFewAnswers` / `Error::TooManyAnswers` - answer count outside `[2, 4]`
    /// * `Error::CorrectOutOfRange` - `correct` outside `[1, answers.len()]`
    pub fn check(&self) -> Result<(), Error> {
        check_answers(&self.answers, self.correct)
    }

    /// Checks body and answer texts against the authoring limits
    ///
    /// Meant for whoever stores questions; sessions play over-long texts as is.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` with the validation report.
    pub fn validate_text(&self) -> Result<(), Error> {
        self.validate().map_err(|report| Error::Invalid(report.to_string()))
    }
}

/// Checks answer count and correct ordinal
///
/// # Errors
///
/// Returns the first violated constraint.
pub fn check_answers(answers: &[String], correct: u8) -> Result<(), Error> {
    let count = answers.len();
    if count < constants::question::MIN_ANSWER_COUNT {
        return Err(Error::TooFewAnswers(count));
    }
    if count > constants::question::MAX_ANSWER_COUNT {
        return Err(Error::TooManyAnswers(count));
    }
    if correct == 0 || usize::from(correct) > count {
        return Err(Error::CorrectOutOfRange { correct, count });
    }
    Ok(())
}

/// Supplies the questions of a session in play order
///
/// Sources are finite; once `next_question` returns `None` the session
/// finishes on its next advance.
pub trait QuestionSource {
    /// Yields the next question, or `None` when exhausted
    fn next_question(&mut self) -> Option<Question>;

    /// Number of questions left, when the source knows it
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// In-memory question source, preloaded at session creation
#[derive(Debug, Clone, Default)]
pub struct QuestionQueue {
    questions: VecDeque<Question>,
}

impl QuestionQueue {
    /// Creates a queue that yields `questions` in order
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: questions.into(),
        }
    }

    /// Drains another source into a queue
    pub fn drain<S: QuestionSource + ?Sized>(source: &mut S) -> Self {
        std::iter::from_fn(|| source.next_question()).collect()
    }

    /// Reorders the remaining questions with a single random permutation
    #[must_use]
    pub fn shuffled<R: RandomSource + ?Sized>(self, rng: &mut R) -> Self {
        let mut slots: Vec<Option<Question>> = self.questions.into_iter().map(Some).collect();
        let questions = shuffle::permutation(slots.len(), rng)
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        Self { questions }
    }

    /// Number of questions not yet played
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether every question has been played
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl FromIterator<Question> for QuestionQueue {
    fn from_iter<I: IntoIterator<Item = Question>>(iter: I) -> Self {
        Self {
            questions: iter.into_iter().collect(),
        }
    }
}

impl QuestionSource for QuestionQueue {
    fn next_question(&mut self) -> Option<Question> {
        self.questions.pop_front()
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.questions.len())
    }
}
