//! A pool of reusable sessions.

use std::{
    ops::Deref,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::transport::TransportError;

/// A function creating a new session.
pub type SessionFactory<S> = Box<dyn Fn() -> Result<S, TransportError> + Send + Sync>;

/// A thread-safe pool of sessions.
///
/// [`acquire`](SessionPool::acquire) never waits: it takes an idle session or creates a new one.
/// The number of sessions therefore grows to the peak number of concurrent users.
/// A session is only ever used by one thread at a time.
pub struct SessionPool<S> {
    factory: SessionFactory<S>,
    idle: Mutex<Vec<S>>,
    created: AtomicUsize,
}

impl<S> std::fmt::Debug for SessionPool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("created", &self.created())
            .field("idle", &self.idle())
            .finish_non_exhaustive()
    }
}

impl<S> SessionPool<S> {
    /// Create a new, empty session pool with a session `factory`.
    pub fn new(factory: impl Fn() -> Result<S, TransportError> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            idle: Mutex::default(),
            created: AtomicUsize::new(0),
        }
    }

    /// Take an idle session from the pool, or create a new one.
    ///
    /// The session is returned to the pool when the guard is dropped.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if a new session cannot be created.
    pub fn acquire(&self) -> Result<PooledSession<'_, S>, TransportError> {
        // The lock is released before a session is created
        let idle = self.idle.lock().pop();
        let session = match idle {
            Some(session) => session,
            None => {
                let session = (self.factory)()?;
                let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!("created session {created}");
                session
            }
        };
        Ok(PooledSession {
            pool: self,
            session: Some(session),
        })
    }

    /// Return a session to the pool.
    pub fn release(&self, session: S) {
        self.idle.lock().push(session);
    }

    /// Returns the number of sessions created by the factory.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns the number of idle sessions.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A session acquired from a [`SessionPool`], released on drop.
#[derive(Debug)]
pub struct PooledSession<'a, S> {
    pool: &'a SessionPool<S>,
    session: Option<S>,
}

impl<S> Deref for PooledSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
            .as_ref()
            .expect("the session is only taken on drop")
    }
}

impl<S> Drop for PooledSession<'_, S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}
