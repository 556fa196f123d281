//! Single-writer nonce allocation for the signing account.
//!
//! The guard returned by [`NonceAllocator::lock`] must be held from choosing a
//! nonce until the node has answered the submission, so two mints can never
//! sign with the same nonce.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct NonceAllocator {
    next: Mutex<Option<u64>>,
}

pub struct NonceGuard<'a> {
    next: MutexGuard<'a, Option<u64>>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> NonceGuard<'_> {
        NonceGuard {
            next: self.next.lock().await,
        }
    }
}

impl NonceGuard<'_> {
    /// Picks the nonce for the next transaction given the node's pending count.
    /// The local counter wins when the node has not yet seen our last broadcast.
    pub fn reserve(&self, pending: u64) -> u64 {
        match *self.next {
            Some(local) => local.max(pending),
            None => pending,
        }
    }

    /// The node accepted a transaction with `nonce`.
    pub fn confirm(&mut self, nonce: u64) {
        *self.next = Some(nonce + 1);
    }

    /// Forget the local counter; the next reservation follows the node.
    pub fn reset(&mut self) {
        *self.next = None;
    }

    pub fn local(&self) -> Option<u64> {
        *self.next
    }
}
