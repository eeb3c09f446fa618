//! Storage abstraction for authenticators and per-identifier attempt state.
//!
//! Each identifier owns one record holding its authenticators (one per type),
//! its ordered password history (most recent last), its failed-attempt counter
//! and timestamps, and an optional lockout instant. The in-memory backend keys
//! a `DashMap` by identifier, so every compound operation on one identifier
//! runs under that identifier's entry lock and is totally ordered.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::authenticator::{Authenticator, AuthenticatorType};
use crate::errors::StorageError;

type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage contract consumed by the authenticator manager.
///
/// `update_authenticator` takes a closure so implementations can hold per-key
/// exclusivity for the whole read-modify-write.
pub trait AuthenticationStorage: Send + Sync {
    /// Store an authenticator, replacing any previous one of the same type.
    fn store_authenticator(&self, authenticator: Authenticator) -> StorageResult<()>;

    /// Retrieve one authenticator by identifier and type.
    fn authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<Option<Authenticator>>;

    /// Retrieve all authenticators for an identifier.
    fn authenticators(&self, identifier: &str) -> StorageResult<Vec<Authenticator>>;

    /// Mutate an authenticator in place under per-key exclusivity.
    /// Returns `false` when no such authenticator exists.
    fn update_authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
        mutate: &mut dyn FnMut(&mut Authenticator),
    ) -> StorageResult<bool>;

    /// Delete one authenticator.
    fn delete_authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<()>;

    /// Whether an authenticator exists for the identifier and type.
    fn authenticator_exists(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<bool>;

    /// Append a hash to the identifier's password history.
    fn push_password_history(&self, identifier: &str, password_hash: &str) -> StorageResult<()>;

    /// The identifier's password history, oldest first.
    fn password_history(&self, identifier: &str) -> StorageResult<Vec<String>>;

    /// Trim the history to its `keep` most recent entries.
    fn trim_password_history(&self, identifier: &str, keep: usize) -> StorageResult<()>;

    /// Record a failed attempt at `at`; returns the new attempt count.
    fn record_failed_attempt(&self, identifier: &str, at: DateTime<Utc>) -> StorageResult<u32>;

    /// Failed-attempt timestamps at or after `window_start`.
    fn failed_attempts_in_window(
        &self,
        identifier: &str,
        window_start: DateTime<Utc>,
    ) -> StorageResult<Vec<DateTime<Utc>>>;

    /// Clear the failed-attempt counter and timestamps.
    fn reset_failed_attempts(&self, identifier: &str) -> StorageResult<()>;

    /// Set or clear the lockout instant.
    fn set_locked_until(
        &self,
        identifier: &str,
        until: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// The lockout instant, if one is set.
    fn locked_until(&self, identifier: &str) -> StorageResult<Option<DateTime<Utc>>>;

    /// Remove all state for an identifier.
    fn clear_identifier(&self, identifier: &str) -> StorageResult<()>;
}

/// Per-identifier state, matching the persisted layout.
#[derive(Debug, Clone, Default)]
struct IdentityRecord {
    authenticators: HashMap<AuthenticatorType, Authenticator>,
    password_history: Vec<String>,
    failed_attempts: u32,
    attempt_timestamps: Vec<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
}

/// In-memory storage backend on a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryAuthenticationStorage {
    records: DashMap<String, IdentityRecord>,
}

impl MemoryAuthenticationStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored authenticators across all identifiers.
    pub fn total_authenticator_count(&self) -> usize {
        self.records
            .iter()
            .map(|entry| entry.value().authenticators.len())
            .sum()
    }
}

impl AuthenticationStorage for MemoryAuthenticationStorage {
    fn store_authenticator(&self, authenticator: Authenticator) -> StorageResult<()> {
        let mut record = self
            .records
            .entry(authenticator.identifier.clone())
            .or_default();
        record
            .authenticators
            .insert(authenticator.kind(), authenticator);
        Ok(())
    }

    fn authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<Option<Authenticator>> {
        Ok(self
            .records
            .get(identifier)
            .and_then(|record| record.authenticators.get(&kind).cloned()))
    }

    fn authenticators(&self, identifier: &str) -> StorageResult<Vec<Authenticator>> {
        Ok(self
            .records
            .get(identifier)
            .map(|record| record.authenticators.values().cloned().collect())
            .unwrap_or_default())
    }

    fn update_authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
        mutate: &mut dyn FnMut(&mut Authenticator),
    ) -> StorageResult<bool> {
        match self.records.get_mut(identifier) {
            Some(mut record) => match record.authenticators.get_mut(&kind) {
                Some(authenticator) => {
                    mutate(authenticator);
                    Ok(true)
                }
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    fn delete_authenticator(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<()> {
        if let Some(mut record) = self.records.get_mut(identifier) {
            record.authenticators.remove(&kind);
        }
        Ok(())
    }

    fn authenticator_exists(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> StorageResult<bool> {
        Ok(self
            .records
            .get(identifier)
            .map(|record| record.authenticators.contains_key(&kind))
            .unwrap_or(false))
    }

    fn push_password_history(&self, identifier: &str, password_hash: &str) -> StorageResult<()> {
        self.records
            .entry(identifier.to_string())
            .or_default()
            .password_history
            .push(password_hash.to_string());
        Ok(())
    }

    fn password_history(&self, identifier: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .records
            .get(identifier)
            .map(|record| record.password_history.clone())
            .unwrap_or_default())
    }

    fn trim_password_history(&self, identifier: &str, keep: usize) -> StorageResult<()> {
        if let Some(mut record) = self.records.get_mut(identifier) {
            let len = record.password_history.len();
            if len > keep {
                record.password_history.drain(..len - keep);
            }
        }
        Ok(())
    }

    fn record_failed_attempt(&self, identifier: &str, at: DateTime<Utc>) -> StorageResult<u32> {
        let mut record = self.records.entry(identifier.to_string()).or_default();
        record.failed_attempts += 1;
        record.attempt_timestamps.push(at);
        Ok(record.failed_attempts)
    }

    fn failed_attempts_in_window(
        &self,
        identifier: &str,
        window_start: DateTime<Utc>,
    ) -> StorageResult<Vec<DateTime<Utc>>> {
        Ok(self
            .records
            .get(identifier)
            .map(|record| {
                record
                    .attempt_timestamps
                    .iter()
                    .copied()
                    .filter(|ts| *ts >= window_start)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn reset_failed_attempts(&self, identifier: &str) -> StorageResult<()> {
        if let Some(mut record) = self.records.get_mut(identifier) {
            record.failed_attempts = 0;
            record.attempt_timestamps.clear();
        }
        Ok(())
    }

    fn set_locked_until(
        &self,
        identifier: &str,
        until: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.records
            .entry(identifier.to_string())
            .or_default()
            .locked_until = until;
        Ok(())
    }

    fn locked_until(&self, identifier: &str) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(self
            .records
            .get(identifier)
            .and_then(|record| record.locked_until))
    }

    fn clear_identifier(&self, identifier: &str) -> StorageResult<()> {
        self.records.remove(identifier);
        Ok(())
    }
}
