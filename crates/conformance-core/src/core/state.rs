// crates/conformance-core/src/core/state.rs
// ============================================================================
// Module: Instance State Bag
// Description: Typed key/value state threaded between sequences in one run.
// Purpose: Hold credentials, identifiers, and endpoints produced by checks.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! The instance state bag maps [`StateKey`]s to typed [`StateValue`]s. Steps
//! never mutate the bag directly: they read a snapshot and stage
//! [`StateUpdates`], which the run coordinator merges under a lock.
//!
//! Once a key is defined its [`StateValueKind`] is fixed for the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::StateKey;

// ============================================================================
// SECTION: Values
// ============================================================================

/// Scalar or list value stored in the instance state bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Boolean flag (e.g. `confidential_client`).
    Bool(bool),
    /// Signed integer value.
    Integer(i64),
    /// Free-form text (e.g. `client_id`, endpoint URLs).
    Text(String),
    /// Ordered list of strings (e.g. `redirect_uris`).
    List(Vec<String>),
}

impl StateValue {
    /// Returns the type tag of this value.
    #[must_use]
    pub const fn kind(&self) -> StateValueKind {
        match self {
            Self::Bool(_) => StateValueKind::Bool,
            Self::Integer(_) => StateValueKind::Integer,
            Self::Text(_) => StateValueKind::Text,
            Self::List(_) => StateValueKind::List,
        }
    }

    /// Returns the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<String>> for StateValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Type tag of a [`StateValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValueKind {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Integer,
    /// Text.
    Text,
    /// List of strings.
    List,
}

impl StateValueKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Text => "text",
            Self::List => "list",
        }
    }
}

impl fmt::Display for StateValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Instance state errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// An update tried to change the type of an existing key.
    #[error("state key {key} is {existing} and cannot be overwritten with {attempted}")]
    TypeChanged {
        /// Key being updated.
        key: StateKey,
        /// Kind fixed by the first definition.
        existing: StateValueKind,
        /// Kind of the rejected update.
        attempted: StateValueKind,
    },
    /// A step produced a key outside its sequence's declared `defines` set.
    #[error("state key {0} is not declared in the sequence defines set")]
    UndeclaredDefine(StateKey),
    /// The shared state lock was poisoned by a panicking writer.
    #[error("instance state lock poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Instance State
// ============================================================================

/// Instance state bag for one conformance run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceState {
    /// Values keyed by state key in deterministic order.
    values: BTreeMap<StateKey, StateValue>,
}

impl InstanceState {
    /// Creates an empty state bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &StateKey) -> Option<&StateValue> {
        self.values.get(key)
    }

    /// Returns true when `key` is defined.
    #[must_use]
    pub fn contains(&self, key: &StateKey) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the set of defined keys.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<StateKey> {
        self.values.keys().cloned().collect()
    }

    /// Returns the number of defined keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no keys are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Seeds or overwrites a single key, enforcing type stability.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TypeChanged`] when `key` already holds a value
    /// of a different kind.
    pub fn insert(
        &mut self,
        key: impl Into<StateKey>,
        value: impl Into<StateValue>,
    ) -> Result<(), StateError> {
        let key = key.into();
        let value = value.into();
        check_kind(&self.values, &key, &value)?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Merges a batch of updates atomically.
    ///
    /// Either every update is applied or none is.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TypeChanged`] when any update would change the
    /// type of an existing key.
    pub fn merge(&mut self, updates: &StateUpdates) -> Result<(), StateError> {
        for (key, value) in &updates.values {
            check_kind(&self.values, key, value)?;
        }
        for (key, value) in &updates.values {
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Returns a copy restricted to the given keys.
    #[must_use]
    pub fn project(&self, keys: &BTreeSet<StateKey>) -> BTreeMap<StateKey, StateValue> {
        self.values
            .iter()
            .filter(|(key, _)| keys.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(StateKey, StateValue)> for InstanceState {
    fn from_iter<I: IntoIterator<Item = (StateKey, StateValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Ensures an update keeps the kind of an existing key.
fn check_kind(
    values: &BTreeMap<StateKey, StateValue>,
    key: &StateKey,
    value: &StateValue,
) -> Result<(), StateError> {
    if let Some(existing) = values.get(key)
        && existing.kind() != value.kind()
    {
        return Err(StateError::TypeChanged {
            key: key.clone(),
            existing: existing.kind(),
            attempted: value.kind(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Staged Updates
// ============================================================================

/// Key/value updates staged by one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdates {
    /// Staged values keyed by state key.
    values: BTreeMap<StateKey, StateValue>,
}

impl StateUpdates {
    /// Creates an empty update batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a value, replacing an earlier staged value for the same key.
    pub fn set(&mut self, key: impl Into<StateKey>, value: impl Into<StateValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the staged keys.
    pub fn keys(&self) -> impl Iterator<Item = &StateKey> {
        self.values.keys()
    }

    /// Returns the staged value for `key`.
    #[must_use]
    pub fn get(&self, key: &StateKey) -> Option<&StateValue> {
        self.values.get(key)
    }

    /// Returns true when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ensures every staged key belongs to `declared`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UndeclaredDefine`] for the first key outside the
    /// declared set.
    pub fn ensure_declared(&self, declared: &BTreeSet<StateKey>) -> Result<(), StateError> {
        match self.values.keys().find(|key| !declared.contains(*key)) {
            Some(key) => Err(StateError::UndeclaredDefine(key.clone())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Instance state shared across concurrently running sequences.
///
/// # Invariants
/// - Cloning shares the same underlying bag.
/// - The lock is held only for snapshot and merge, never across step bodies.
#[derive(Debug, Clone, Default)]
pub struct SharedInstanceState {
    /// State bag protected by a mutex.
    inner: Arc<Mutex<InstanceState>>,
}

impl SharedInstanceState {
    /// Wraps an initial state bag.
    #[must_use]
    pub fn new(initial: InstanceState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Returns a point-in-time copy of the bag.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Poisoned`] when the lock is poisoned.
    pub fn snapshot(&self) -> Result<InstanceState, StateError> {
        let guard = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        Ok(guard.clone())
    }

    /// Merges updates under the lock.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the lock is poisoned or a type would change.
    pub fn merge(&self, updates: &StateUpdates) -> Result<(), StateError> {
        let mut guard = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        guard.merge(updates)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
