//! Fixed-size pool of sessions
//!
//! The pool is built once at startup. Every session is created up front with
//! its own identity and handed out exactly once, to the worker that owns it
//! for the rest of the run.

use crate::identity::IdentityRotation;
use crate::{Session, SessionError};
use async_trait::async_trait;
use harvester_domain::SessionIdentity;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while building or using the pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// Requested pool size was zero
    #[error("Session pool size must be at least 1")]
    Empty,

    /// Identity rotation has no user agents or no locales
    #[error("Identity rotation needs at least one user agent and one locale")]
    NoIdentities,

    /// Factory failed to create a session
    #[error("Failed to create session {index}: {source}")]
    Create {
        /// Pool slot
        index: usize,
        /// Underlying session error
        source: SessionError,
    },

    /// Index outside the pool
    #[error("Session index {index} out of range (pool size {size})")]
    OutOfRange {
        /// Requested slot
        index: usize,
        /// Pool size
        size: usize,
    },

    /// Session was already handed out
    #[error("Session {0} is already acquired")]
    AcquiredTwice(usize),
}

/// Creates sessions for the pool
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Session type produced
    type Session: Session;

    /// Create the session for slot `index` bound to `identity`
    async fn create(&self, index: usize, identity: SessionIdentity) -> Result<Self::Session, SessionError>;
}

/// N sessions, each acquirable once
pub struct SessionPool<S> {
    slots: Vec<Option<S>>,
}

impl<S: Session> SessionPool<S> {
    /// Create `size` sessions through `factory`
    ///
    /// Session `i` receives `rotation.identity(i)`.
    pub async fn open<F>(factory: &F, size: usize, rotation: &IdentityRotation) -> Result<Self, PoolError>
    where
        F: SessionFactory<Session = S>,
    {
        if size == 0 {
            return Err(PoolError::Empty);
        }

        let mut slots = Vec::with_capacity(size);
        for index in 0..size {
            let identity = rotation.identity(index).ok_or(PoolError::NoIdentities)?;
            debug!("Creating session {} as {}", index, identity.user_agent);
            let session = factory
                .create(index, identity)
                .await
                .map_err(|source| PoolError::Create { index, source })?;
            slots.push(Some(session));
        }

        info!("Session pool ready with {} sessions", size);
        Ok(Self { slots })
    }

    /// Number of sessions in the pool
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Sessions not yet acquired
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Take exclusive ownership of session `index`
    pub fn acquire(&mut self, index: usize) -> Result<S, PoolError> {
        let size = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(PoolError::OutOfRange { index, size })?;
        slot.take().ok_or(PoolError::AcquiredTwice(index))
    }

    /// Take every session still in the pool, with its index
    pub fn acquire_all(&mut self) -> Vec<(usize, S)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|session| (index, session)))
            .collect()
    }
}
