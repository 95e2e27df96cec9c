//! Store of running sessions, addressed by handle
//!
//! This is the surface a transport layer talks to: it creates sessions,
//! forwards host and participant operations to them by [`SessionId`], and
//! drops them when they are no longer needed.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use garde::Validate;
use tracing::{info, info_span};

use crate::{
    participant::{GuestNames, ParticipantDirectory, ParticipantId, ParticipantRegistry},
    question::QuestionSource,
    session::{AnswerResult, Error, Options, Session, SessionStateView},
    session_id::SessionId,
    shuffle::RandomSource,
};

/// All live sessions of a process
pub struct Sessions {
    mapping: RwLock<HashMap<SessionId, Arc<Session>>>,
    handles: Mutex<Box<dyn RandomSource + Send>>,
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

impl Sessions {
    /// Creates an empty store drawing handles from an entropy-seeded generator
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Creates an empty store drawing handles from `rng`
    pub fn with_rng<R: RandomSource + Send + 'static>(rng: R) -> Self {
        Self {
            mapping: RwLock::default(),
            handles: Mutex::new(Box::new(rng)),
        }
    }

    /// Creates a session and returns its handle
    ///
    /// The roster is resolved through `directory`; participants without a
    /// display name get one in `guests`.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidOptions` - `options` fail validation
    /// * `Error::Registry` - the roster cannot be built
    /// * `Error::TooManySessions` - every handle is in use
    pub fn create<Q, D>(
        &self,
        questions: Q,
        options: Options,
        participants: &[ParticipantId],
        directory: &D,
        guests: GuestNames,
    ) -> Result<SessionId, Error>
    where
        Q: QuestionSource + Send + 'static,
        D: ParticipantDirectory + ?Sized,
    {
        options
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;
        guests
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;

        let registry = ParticipantRegistry::resolve(participants, directory, guests)?;
        let session = Session::create(questions, options, registry);

        self.insert(session)
    }

    /// Stores an already built session under a fresh handle
    ///
    /// # Errors
    ///
    /// Returns `Error::TooManySessions` if every handle is in use.
    pub fn insert(&self, session: Session) -> Result<SessionId, Error> {
        let mut mapping = self.mapping.write().unwrap_or_else(PoisonError::into_inner);

        if mapping.len() >= SessionId::CAPACITY {
            return Err(Error::TooManySessions);
        }

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        let session = Arc::new(session);
        loop {
            let id = SessionId::random(&mut **handles);
            if let Entry::Vacant(v) = mapping.entry(id) {
                v.insert(session);
                info!(session = %id, "session stored");
                return Ok(id);
            }
        }
    }

    /// Looks up a session
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` if no session has this handle.
    pub fn get(&self, id: SessionId) -> Result<Arc<Session>, Error> {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownSession(id))
    }

    /// Advances the session to its next question
    ///
    /// # Errors
    ///
    /// `Error::UnknownSession`, or any error of [`Session::advance`].
    pub fn advance(&self, id: SessionId) -> Result<SessionStateView, Error> {
        let session = self.get(id)?;
        let _span = info_span!("session", %id).entered();
        session.advance()
    }

    /// Submits a participant's answer
    ///
    /// # Errors
    ///
    /// `Error::UnknownSession`, or any error of [`Session::submit_answer`].
    pub fn submit_answer(
        &self,
        id: SessionId,
        participant: ParticipantId,
        position: usize,
        ordinal: usize,
    ) -> Result<AnswerResult, Error> {
        let session = self.get(id)?;
        let _span = info_span!("session", %id).entered();
        session.submit_answer(participant, position, ordinal)
    }

    /// Ends the session now
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` if no session has this handle.
    pub fn end_early(&self, id: SessionId) -> Result<SessionStateView, Error> {
        let session = self.get(id)?;
        let _span = info_span!("session", %id).entered();
        Ok(session.end_early())
    }

    /// Peeks at the session without changing it
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` if no session has this handle.
    pub fn current_view(&self, id: SessionId) -> Result<SessionStateView, Error> {
        Ok(self.get(id)?.current_view())
    }

    /// Drops a session from the store
    ///
    /// Callers still holding the `Arc` keep a working session.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` if no session has this handle.
    pub fn remove(&self, id: SessionId) -> Result<Arc<Session>, Error> {
        let removed = self
            .mapping
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(Error::UnknownSession(id))?;
        info!(session = %id, "session removed");
        Ok(removed)
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.mapping.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no session is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{collections::HashMap, str::FromStr};

    use super::*;
    use crate::{
        participant::DisplayMetadata,
        question::{Question, QuestionQueue},
        shuffle::tests::Scripted,
        state::StateKind,
    };

    fn id(n: i32) -> ParticipantId {
        ParticipantId::new(n)
    }

    fn directory() -> HashMap<ParticipantId, DisplayMetadata> {
        [
            (id(1), DisplayMetadata::named("Ada")),
            (id(2), DisplayMetadata::named("Bea")),
        ]
        .into_iter()
        .collect()
    }

    fn questions() -> QuestionQueue {
        QuestionQueue::new(vec![Question::new(
            0,
            "2 + 2?",
            vec!["4".into(), "5".into()],
            1,
        )])
    }

    #[test]
    fn test_create_and_play() {
        let sessions = Sessions::new();
        let handle = sessions
            .create(
                questions(),
                Options::default(),
                &[id(1), id(2)],
                &directory(),
                GuestNames::default(),
            )
            .unwrap();

        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions.current_view(handle).unwrap().kind(),
            StateKind::Starting
        );

        assert_eq!(sessions.advance(handle).unwrap().kind(), StateKind::Running);
        assert_eq!(
            sessions.submit_answer(handle, id(1), 0, 0),
            Ok(AnswerResult { correct: true })
        );
        assert_eq!(sessions.advance(handle).unwrap().kind(), StateKind::Finishing);
    }

    #[test]
    fn test_handles_come_from_the_store_rng() {
        let sessions = Sessions::with_rng(Scripted::new(&[0, 0, 1]));
        let session = || {
            Session::new(
                questions(),
                Options::default(),
                ParticipantRegistry::default(),
                Scripted::new(&[]),
            )
        };

        let first = sessions.insert(session()).unwrap();
        let second = sessions.insert(session()).unwrap();

        assert_eq!(first.to_string(), "10000");
        assert_eq!(second.to_string(), "10001");
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_create_with_unknown_participant() {
        let sessions = Sessions::new();
        let result = sessions.create(
            questions(),
            Options::default(),
            &[id(1), id(3)],
            &directory(),
            GuestNames::default(),
        );
        assert_eq!(
            result,
            Err(Error::Registry(crate::participant::Error::Unknown(id(3))))
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_create_with_invalid_guests() {
        let sessions = Sessions::new();
        let result = sessions.create(
            questions(),
            Options::default(),
            &[id(1)],
            &directory(),
            GuestNames::Animal { words: 7 },
        );
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn test_unknown_handle() {
        let sessions = Sessions::new();
        let missing = SessionId::from_str("12345").unwrap();

        assert_eq!(sessions.advance(missing), Err(Error::UnknownSession(missing)));
        assert_eq!(
            sessions.submit_answer(missing, id(1), 0, 0),
            Err(Error::UnknownSession(missing))
        );
        assert_eq!(sessions.end_early(missing), Err(Error::UnknownSession(missing)));
        assert_eq!(
            sessions.current_view(missing),
            Err(Error::UnknownSession(missing))
        );
        assert!(sessions.remove(missing).is_err());
    }

    #[test]
    fn test_remove_keeps_outstanding_handles_working() {
        let sessions = Sessions::new();
        let handle = sessions
            .create(
                questions(),
                Options::default(),
                &[id(1)],
                &directory(),
                GuestNames::default(),
            )
            .unwrap();

        let session = sessions.remove(handle).unwrap();
        assert!(sessions.is_empty());
        assert_eq!(sessions.get(handle).unwrap_err(), Error::UnknownSession(handle));
        assert_eq!(session.end_early().kind(), StateKind::Finishing);
    }
}
