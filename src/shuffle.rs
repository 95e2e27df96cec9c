//! Answer shuffling
//!
//! Each question's answers are presented in a per-question random order. The
//! shuffle permutes an index array rather than the texts so the position of
//! the correct answer can be tracked through the permutation.

use serde::Serialize;

use crate::question;

/// A source of uniform random draws
///
/// Sessions never reach for a global generator; the source is handed in so
/// tests can script every draw and sessions don't share generator state.
pub trait RandomSource {
    /// Returns a uniformly distributed value in `0..bound`
    ///
    /// `bound` is at least 1.
    fn below(&mut self, bound: usize) -> usize;
}

impl RandomSource for fastrand::Rng {
    fn below(&mut self, bound: usize) -> usize {
        if bound <= 1 { 0 } else { self.usize(..bound) }
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn below(&mut self, bound: usize) -> usize {
        (**self).below(bound)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn below(&mut self, bound: usize) -> usize {
        (**self).below(bound)
    }
}

/// Answers in presentation order together with where the correct one landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShuffledAnswers {
    /// Answer texts in the order shown to participants
    pub answers: Vec<String>,
    /// Index into `answers` of the correct answer
    pub correct_position: usize,
}

/// Produces a uniformly random permutation of `0..len` (Fisher–Yates)
///
/// Draws exactly `len - 1` values for `len > 0`, so a seeded source yields a
/// reproducible permutation.
pub fn permutation<R: RandomSource + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices = (0..len).collect::<Vec<_>>();
    for i in (1..len).rev() {
        let j = rng.below(i + 1);
        indices.swap(i, j);
    }
    indices
}

/// Shuffles a question's answers, keeping track of the correct one
///
/// When `enabled` is false the authored order is kept and no draws are made.
///
/// # Errors
///
/// Returns a `question::Error` if there are not 2 to 4 answers or `correct`
/// is outside `[1, answers.len()]`.
pub fn shuffle_answers<R: RandomSource + ?Sized>(
    answers: &[String],
    correct: u8,
    enabled: bool,
    rng: &mut R,
) -> Result<ShuffledAnswers, question::Error> {
    question::check_answers(answers, correct)?;

    let correct_index = usize::from(correct) - 1;

    let indices = if enabled {
        permutation(answers.len(), rng)
    } else {
        (0..answers.len()).collect()
    };

    let correct_position = indices
        .iter()
        .position(|&i| i == correct_index)
        .unwrap_or(correct_index);

    Ok(ShuffledAnswers {
        answers: indices.iter().map(|&i| answers[i].clone()).collect(),
        correct_position,
    })
}
