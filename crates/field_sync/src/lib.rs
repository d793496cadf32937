//! Keeps a dependent "subcategory" select in step with its "category" select.
//!
//! A [`Synchronizer`] waits for both controls to appear on a [`FormSurface`],
//! then refills the subcategory options from a [`SubcategorySource`] every
//! time the category changes. Only the most recent request is ever rendered.

pub mod config;
pub mod error;
pub mod form;
pub mod source;
mod synchronizer;

pub use config::{load_settings, FailurePolicy, SyncSettings};
pub use error::{FetchError, SyncError};
pub use form::{ControlChange, FormSurface, InMemoryForm, SelectOption};
pub use source::{HttpSubcategorySource, SubcategorySource};
pub use synchronizer::{Binding, SyncEvent, SyncOutcome, Synchronizer};
