//! # Qwiz Live
//!
//! The engine behind live classroom quizzes: a group of participants plays a
//! quiz synchronously while a host moves from question to question. This
//! crate tracks which question is active, shuffles each question's answers
//! without losing track of the correct one, records every participant's
//! result per question and computes the final score table.
//!
//! Transport, persistence and authentication live elsewhere and are reached
//! through [`question::QuestionSource`] and
//! [`participant::ParticipantDirectory`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;

pub mod participant;
pub mod question;
pub mod score;
pub mod session;
pub mod session_id;
pub mod sessions;
pub mod shuffle;
pub mod state;

pub use participant::{DisplayMetadata, GuestNames, ParticipantId, ParticipantRegistry};
pub use question::{Question, QuestionQueue, QuestionSource};
pub use session::{AnswerResult, Error, Options, Session, SessionStateView};
pub use session_id::SessionId;
pub use sessions::Sessions;
pub use shuffle::RandomSource;
pub use state::{SessionState, StateKind};
