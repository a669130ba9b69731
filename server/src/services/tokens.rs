//! Token registry — uid/token bindings with rotation.
//!
//! DESIGN
//! ======
//! Two mirrored maps keep both lookup directions O(1). The invariant is one
//! active token per uid: issuing for a uid deletes the prior binding, so a
//! rotated-out token stops resolving immediately. Tokens are v4 UUIDs; the
//! canonical 8-4-4-4-12 hyphenated string is the external representation,
//! and the 16 raw bytes carried in paint packets convert via
//! [`Uuid::from_bytes`].

use std::collections::HashMap;

use uuid::Uuid;

#[derive(Default)]
pub struct TokenRegistry {
    by_token: HashMap<Uuid, u32>,
    by_uid: HashMap<u32, Uuid>,
}

impl TokenRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `uid`, revoking any existing binding.
    pub fn issue(&mut self, uid: u32) -> Uuid {
        let token = Uuid::new_v4();
        if let Some(old) = self.by_uid.insert(uid, token) {
            self.by_token.remove(&old);
        }
        self.by_token.insert(token, uid);
        token
    }

    /// Resolve a token to its uid.
    #[must_use]
    pub fn lookup(&self, token: &Uuid) -> Option<u32> {
        self.by_token.get(token).copied()
    }

    /// Drop the binding for `uid`, if any.
    pub fn revoke_by_uid(&mut self, uid: u32) {
        if let Some(token) = self.by_uid.remove(&uid) {
            self.by_token.remove(&token);
        }
    }

    /// Replace the registry contents with stored bindings. Rows arrive in
    /// storage order; the last row per uid wins, which collapses any
    /// duplicates left behind by older deployments.
    pub fn load_all<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = (Uuid, u32)>,
    {
        self.by_token.clear();
        self.by_uid.clear();
        for (token, uid) in rows {
            if let Some(old) = self.by_uid.insert(uid, token) {
                self.by_token.remove(&old);
            }
            self.by_token.insert(token, uid);
        }
        self.by_token.len()
    }

    /// Number of active bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tests;
