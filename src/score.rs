//! Final scoring
//!
//! When a session finishes, the per-participant answer histories are folded
//! into a score table. Scores are counts of correct answers; the table is
//! ordered by score descending, then by participant ID ascending, so the
//! same histories always produce the same table.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

/// One row of the final score table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// The participant this row belongs to
    pub participant: ParticipantId,
    /// Number of questions answered correctly
    pub score: usize,
}

/// How the roster did on a single question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStats {
    /// Participants who answered correctly
    pub correct: usize,
    /// Participants who answered incorrectly or not at all
    pub incorrect: usize,
}

/// Computes the ordered score table
///
/// Every roster member gets a row, scoring 0 without history. Participants
/// that have a history but are missing from the roster still get a row.
pub fn aggregate(
    histories: &BTreeMap<ParticipantId, Vec<bool>>,
    roster: &[ParticipantId],
) -> Vec<ScoreEntry> {
    roster
        .iter()
        .chain(histories.keys())
        .unique()
        .map(|&participant| ScoreEntry {
            participant,
            score: histories
                .get(&participant)
                .map_or(0, |history| history.iter().filter(|correct| **correct).count()),
        })
        .sorted_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.participant.cmp(&b.participant))
        })
        .collect_vec()
}

/// Computes per-question statistics over `questions_played` ordinals
///
/// A missing history slot counts as incorrect.
pub fn question_stats(
    histories: &BTreeMap<ParticipantId, Vec<bool>>,
    questions_played: usize,
) -> Vec<QuestionStats> {
    (0..questions_played)
        .map(|ordinal| {
            let correct = histories
                .values()
                .filter(|history| history.get(ordinal).copied().unwrap_or(false))
                .count();
            QuestionStats {
                correct,
                incorrect: histories.len() - correct,
            }
        })
        .collect_vec()
}
