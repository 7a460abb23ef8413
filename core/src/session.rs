//! Session token state and the authenticated signal.
//!
//! # Design
//! The current token lives in a `tokio::sync::watch` channel so reads are a
//! cheap borrow. Each write also publishes the new authenticated value on a
//! `broadcast` channel; subscribers receive every value in order, including a
//! set followed by a clear that both land before they are polled. Reads and
//! writes never hold a guard across an `.await`; concurrent writers resolve
//! last-writer-wins.

use tokio::sync::{broadcast, watch};

use crate::types::Token;

/// Pending authenticated values a slow watcher may fall behind by.
const SIGNAL_CAPACITY: usize = 64;

/// Holds at most one live `Token` for a client.
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<Option<Token>>,
    signal: broadcast::Sender<bool>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        let (signal, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx, signal }
    }

    /// Snapshot of the current token.
    pub fn token(&self) -> Option<Token> {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Store `token`, replacing any token already held.
    pub fn set(&self, token: Token) {
        self.tx.send_replace(Some(token));
        self.publish(true);
    }

    /// Drop the held token. Returns whether one was held.
    pub fn clear(&self) -> bool {
        let held = self.tx.send_replace(None).is_some();
        self.publish(false);
        held
    }

    pub fn subscribe(&self) -> AuthWatcher {
        AuthWatcher {
            current: self.tx.subscribe(),
            changes: self.signal.subscribe(),
        }
    }

    fn publish(&self, authenticated: bool) {
        // No subscribers is not an error.
        let _ = self.signal.send(authenticated);
    }
}

/// Observer for the "is authenticated" signal of a `Session`.
#[derive(Debug)]
pub struct AuthWatcher {
    current: watch::Receiver<Option<Token>>,
    changes: broadcast::Receiver<bool>,
}

impl AuthWatcher {
    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Wait for the next token write and return the authenticated value it set.
    ///
    /// Every write is delivered once, in order. Returns `None` once the owning
    /// session has been dropped and all pending values were consumed.
    pub async fn changed(&mut self) -> Option<bool> {
        loop {
            match self.changes.recv().await {
                Ok(authenticated) => return Some(authenticated),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth watcher fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
