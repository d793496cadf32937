//! Form controls as seen by the synchronizer.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tokio::sync::{broadcast, watch};

use crate::error::SyncError;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The leading "nothing chosen" entry; its value is always empty.
    pub fn sentinel(label: impl Into<String>) -> Self {
        Self::new(String::new(), label)
    }

    pub fn is_sentinel(&self) -> bool {
        self.value.is_empty()
    }
}

/// A user-driven value change on a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChange {
    pub control_id: String,
    pub value: String,
}

/// The page (or any host) holding the two select controls.
pub trait FormSurface: Send + Sync + 'static {
    fn has_control(&self, id: &str) -> bool;

    /// Current value of a control, `None` when the control does not exist.
    fn value(&self, id: &str) -> Option<String>;

    /// Replaces every option of a control in one step.
    fn replace_options(&self, id: &str, options: Vec<SelectOption>) -> Result<(), SyncError>;

    fn subscribe_changes(&self) -> broadcast::Receiver<ControlChange>;

    /// Revision counter bumped whenever controls are added or removed.
    /// Surfaces without structural notifications return `None` and are only
    /// re-checked on the retry interval.
    fn watch_structure(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

#[derive(Debug, Clone, Default)]
struct SelectState {
    value: String,
    options: Vec<SelectOption>,
}

/// Headless form used by the probe CLI and tests.
pub struct InMemoryForm {
    controls: Mutex<HashMap<String, SelectState>>,
    structure: watch::Sender<u64>,
    changes: broadcast::Sender<ControlChange>,
}

impl Default for InMemoryForm {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryForm {
    pub fn new() -> Self {
        let (structure, _) = watch::channel(0);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            controls: Mutex::new(HashMap::new()),
            structure,
            changes,
        }
    }

    fn controls(&self) -> std::sync::MutexGuard<'_, HashMap<String, SelectState>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) a select control.
    pub fn insert_select(
        &self,
        id: impl Into<String>,
        options: Vec<SelectOption>,
        value: impl Into<String>,
    ) {
        self.controls().insert(
            id.into(),
            SelectState {
                value: value.into(),
                options,
            },
        );
        self.structure.send_modify(|revision| *revision += 1);
    }

    pub fn remove_control(&self, id: &str) -> bool {
        let removed = self.controls().remove(id).is_some();
        if removed {
            self.structure.send_modify(|revision| *revision += 1);
        }
        removed
    }

    /// Sets a control's value as a user would and fires a change event.
    pub fn select(&self, id: &str, value: impl Into<String>) -> Result<(), SyncError> {
        let value = value.into();
        {
            let mut controls = self.controls();
            let state = controls
                .get_mut(id)
                .ok_or_else(|| SyncError::ControlMissing(id.to_string()))?;
            state.value = value.clone();
        }
        let _ = self.changes.send(ControlChange {
            control_id: id.to_string(),
            value,
        });
        Ok(())
    }

    pub fn options(&self, id: &str) -> Option<Vec<SelectOption>> {
        self.controls().get(id).map(|state| state.options.clone())
    }
}

impl FormSurface for InMemoryForm {
    fn has_control(&self, id: &str) -> bool {
        self.controls().contains_key(id)
    }

    fn value(&self, id: &str) -> Option<String> {
        self.controls().get(id).map(|state| state.value.clone())
    }

    fn replace_options(&self, id: &str, options: Vec<SelectOption>) -> Result<(), SyncError> {
        let mut controls = self.controls();
        let state = controls
            .get_mut(id)
            .ok_or_else(|| SyncError::ControlMissing(id.to_string()))?;
        if !options.iter().any(|option| option.value == state.value) {
            state.value.clear();
        }
        state.options = options;
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ControlChange> {
        self.changes.subscribe()
    }

    fn watch_structure(&self) -> Option<watch::Receiver<u64>> {
        Some(self.structure.subscribe())
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
