//! In-process session store

use super::traits::{SessionError, SessionStore};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Sessions held in memory; lost on restart
#[derive(Default)]
pub struct InMemorySessions {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Number of live sessions
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |map| map.len())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, session: Session) -> Result<(), SessionError> {
        self.lock()?.insert(user_id.to_string(), session);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), SessionError> {
        self.lock()?.remove(user_id);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&Session>,
        next: Option<Session>,
    ) -> Result<bool, SessionError> {
        let mut map = self.lock()?;
        if map.get(user_id) != expected {
            return Ok(false);
        }
        match next {
            Some(session) => map.insert(user_id.to_string(), session),
            None => map.remove(user_id),
        };
        Ok(true)
    }
}
