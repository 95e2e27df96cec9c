//! Configuration constants for live quiz sessions
//!
//! This module contains the limits enforced on questions, participants and
//! sessions so that every component checks against the same boundaries.

/// Question shape limits
pub mod question {
    /// Minimum number of answer texts a playable question carries
    pub const MIN_ANSWER_COUNT: usize = 2;
    /// Maximum number of answer texts a playable question carries
    pub const MAX_ANSWER_COUNT: usize = 4;
    /// Maximum length of a question body in characters
    pub const MAX_BODY_LENGTH: usize = 1000;
    /// Maximum length of a single answer text in characters
    pub const MAX_ANSWER_LENGTH: usize = 200;
}

/// Participant limits
pub mod participant {
    /// Maximum length of a display name
    pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;
    /// Maximum length of an avatar reference
    pub const MAX_AVATAR_LENGTH: usize = 512;
    /// How many generated names are tried before a guest falls back to "Guest {id}"
    pub const GUEST_NAME_ATTEMPTS: usize = 16;
}

/// Session limits
pub mod session {
    /// Maximum number of participants admitted to a single session
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
}
