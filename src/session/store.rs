use super::{Session, SessionKey, SlotName, SlotValue};
use crate::errors::SessionError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory map from session key to session record.
///
/// Cloning the store shares the underlying map. Every operation takes the lock
/// for the duration of one synchronous call only; callers must not hold a
/// session across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionKey, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionKey, Session>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::LockPoisoned)
    }

    /// Create the session if it does not exist yet. Existing sessions are left untouched.
    pub fn create(&self, key: &SessionKey) -> Result<(), SessionError> {
        let mut sessions = self.lock()?;
        sessions
            .entry(key.clone())
            .or_insert_with(|| Session::new(key.clone()));
        Ok(())
    }

    pub fn get(&self, key: &SessionKey, slot: SlotName) -> Result<SlotValue, SessionError> {
        let sessions = self.lock()?;
        sessions
            .get(key)
            .map(|session| session.get(slot))
            .ok_or_else(|| SessionError::UnknownSession(key.clone()))
    }

    pub fn set(
        &self,
        key: &SessionKey,
        slot: SlotName,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.update(key, |session| session.set(slot, value))
    }

    /// Run `f` against the session record under the store lock.
    pub fn update<R>(
        &self,
        key: &SessionKey,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::UnknownSession(key.clone()))?;
        Ok(f(session))
    }

    /// Clone of the current session record.
    pub fn snapshot(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let sessions = self.lock()?;
        sessions
            .get(key)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(key.clone()))
    }

    pub fn remove(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.lock()?.remove(key))
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock().map(|s| s.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
