//! Backend sessions that completed login, in connection order.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::BackendSession;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<Vec<Arc<BackendSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<BackendSession>) {
        let mut sessions = self.sessions.write();
        if !sessions.iter().any(|s| Arc::ptr_eq(s, &session)) {
            sessions.push(session);
        }
    }

    pub fn deregister(&self, session: &BackendSession) -> bool {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|s| !std::ptr::eq(Arc::as_ptr(s), session));
        sessions.len() != before
    }

    /// Copy of the current list; callers never hold the lock.
    pub fn snapshot(&self) -> Vec<Arc<BackendSession>> {
        self.sessions.read().clone()
    }

    pub fn find(&self, account: &str) -> Option<Arc<BackendSession>> {
        self.sessions
            .read()
            .iter()
            .find(|s| s.account().eq_ignore_ascii_case(account))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
