use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures::StreamExt;
use shared::protocol::SubcategoryRecord;
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use crate::{
    config::{FailurePolicy, SyncSettings},
    error::{FetchError, SyncError},
    form::{ControlChange, FormSurface, SelectOption},
    source::{HttpSubcategorySource, SubcategorySource},
};

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Diagnostics published for every synchronization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Bound {
        initial_category: Option<String>,
    },
    Cleared {
        seq: u64,
    },
    Applied {
        category: String,
        seq: u64,
        options: usize,
    },
    FetchFailed {
        category: String,
        seq: u64,
        reason: String,
    },
    StaleDiscarded {
        category: String,
        seq: u64,
    },
    Detached,
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Empty category; only the sentinel is left.
    Cleared,
    /// Fetched options were rendered after the sentinel.
    Applied { options: usize },
    Failed(FetchError),
    /// The category was deselected, or a newer request for it was issued.
    Stale,
    /// The subcategory control vanished before anything could be rendered.
    ControlUnavailable(SyncError),
}

#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    form: Arc<dyn FormSurface>,
    source: Arc<dyn SubcategorySource>,
    settings: SyncSettings,
    // Held across the "is this still current?" check and the write.
    requests: Mutex<RequestLedger>,
    events: broadcast::Sender<SyncEvent>,
}

#[derive(Debug, Default)]
struct RequestLedger {
    last_seq: u64,
    /// Newest request issued for each category value.
    latest_by_category: HashMap<String, u64>,
    /// Requests numbered at or below this were cancelled by a detach.
    invalidated_through: u64,
}

impl RequestLedger {
    fn issue(&mut self, category: &str) -> u64 {
        self.last_seq += 1;
        self.latest_by_category
            .insert(category.to_string(), self.last_seq);
        self.last_seq
    }
}

impl Synchronizer {
    pub fn new(
        form: Arc<dyn FormSurface>,
        source: Arc<dyn SubcategorySource>,
        settings: SyncSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                form,
                source,
                settings,
                requests: Mutex::new(RequestLedger::default()),
                events,
            }),
        }
    }

    pub fn over_http(form: Arc<dyn FormSurface>, settings: SyncSettings) -> Result<Self, FetchError> {
        let source = HttpSubcategorySource::from_settings(&settings)?;
        Ok(Self::new(form, Arc::new(source), settings))
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: SyncEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Resolves once both controls exist on the form. Fails with
    /// [`SyncError::BindTimeout`] only when a bind timeout is configured.
    pub async fn wait_ready(&self) -> Result<(), SyncError> {
        let started = Instant::now();
        let settings = &self.inner.settings;
        match settings.bind_timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll_ready())
                .await
                .map_err(|_| {
                    warn!(
                        category_control = %settings.category_control,
                        subcategory_control = %settings.subcategory_control,
                        ?limit,
                        "form controls never appeared"
                    );
                    SyncError::BindTimeout {
                        category_control: settings.category_control.clone(),
                        subcategory_control: settings.subcategory_control.clone(),
                        waited: started.elapsed(),
                    }
                }),
            None => {
                self.poll_ready().await;
                Ok(())
            }
        }
    }

    async fn poll_ready(&self) {
        let form = &self.inner.form;
        let settings = &self.inner.settings;
        let mut structure = form.watch_structure();
        let mut checks: u64 = 0;

        loop {
            checks += 1;
            let category_found = form.has_control(&settings.category_control);
            let subcategory_found = form.has_control(&settings.subcategory_control);
            if category_found && subcategory_found {
                debug!(checks, "form controls located");
                return;
            }
            debug!(
                category_found,
                subcategory_found, checks, "form controls not present yet, waiting"
            );

            let retry = tokio::time::sleep(settings.bind_retry_interval);
            let mut notifications_closed = false;
            if let Some(rx) = structure.as_mut() {
                tokio::select! {
                    changed = rx.changed() => {
                        notifications_closed = changed.is_err();
                    }
                    _ = retry => {}
                }
            } else {
                retry.await;
            }
            if notifications_closed {
                structure = None;
            }
        }
    }

    /// Waits for the controls, attaches the category change listener and
    /// kicks off an initial load when a category is already selected.
    pub async fn bind(&self) -> Result<Binding, SyncError> {
        self.wait_ready().await?;

        let settings = &self.inner.settings;
        let changes = self.inner.form.subscribe_changes();
        let initial_category = self
            .inner
            .form
            .value(&settings.category_control)
            .filter(|value| !value.is_empty());

        info!(
            category_control = %settings.category_control,
            subcategory_control = %settings.subcategory_control,
            initial_category = ?initial_category,
            "dependent field bound"
        );
        self.publish(SyncEvent::Bound {
            initial_category: initial_category.clone(),
        });
        if let Some(category) = initial_category {
            self.spawn_synchronize(category);
        }

        let attached = Arc::new(AtomicBool::new(true));
        let listener = tokio::spawn(self.clone().listen(changes, attached.clone()));
        Ok(Binding {
            synchronizer: self.clone(),
            attached,
            listener: Some(listener),
        })
    }

    async fn listen(self, changes: broadcast::Receiver<ControlChange>, attached: Arc<AtomicBool>) {
        let control = self.inner.settings.category_control.clone();
        let mut changes = BroadcastStream::new(changes);

        while let Some(change) = changes.next().await {
            if !attached.load(Ordering::SeqCst) {
                break;
            }
            match change {
                Ok(change) if change.control_id == control => {
                    debug!(category = %change.value, "category changed");
                    self.spawn_synchronize(change.value);
                }
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "category change events lagged; resynchronizing");
                    let current = self.inner.form.value(&control).unwrap_or_default();
                    self.spawn_synchronize(current);
                }
            }
        }
        debug!("category change listener stopped");
    }

    // The request is numbered before the task exists, so numbering follows
    // the order of the change events, not the order tasks get polled in.
    fn spawn_synchronize(&self, category: String) {
        let seq = self.requests().issue(&category);
        let synchronizer = self.clone();
        tokio::spawn(async move {
            synchronizer.synchronize_tagged(seq, &category).await;
        });
    }

    /// Brings the subcategory options in line with `category`.
    ///
    /// An empty category resets to the sentinel without a request. Otherwise
    /// the listing is fetched and rendered if, once it arrives, the category
    /// control still holds `category` and no newer request for that same
    /// value was issued meanwhile.
    pub async fn synchronize(&self, category: &str) -> SyncOutcome {
        let seq = self.requests().issue(category);
        self.synchronize_tagged(seq, category).await
    }

    async fn synchronize_tagged(&self, seq: u64, category: &str) -> SyncOutcome {
        if category.is_empty() {
            let _requests = self.requests();
            if let Err(error) = self.render(self.sentinel_only()) {
                return self.control_unavailable(error);
            }
            debug!(seq, "subcategories cleared");
            self.publish(SyncEvent::Cleared { seq });
            return SyncOutcome::Cleared;
        }

        debug!(category, seq, "loading subcategories");
        let result = self.inner.source.list_subcategories(category).await;

        let requests = self.requests();
        if !self.is_current(&requests, seq, category) {
            debug!(category, seq, "discarding stale subcategory response");
            self.publish(SyncEvent::StaleDiscarded {
                category: category.to_string(),
                seq,
            });
            return SyncOutcome::Stale;
        }

        match result {
            Ok(records) => {
                let count = records.len();
                if let Err(error) = self.render(self.with_sentinel(records)) {
                    return self.control_unavailable(error);
                }
                info!(category, seq, count, "subcategories applied");
                self.publish(SyncEvent::Applied {
                    category: category.to_string(),
                    seq,
                    options: count,
                });
                SyncOutcome::Applied { options: count }
            }
            Err(error) => {
                warn!(
                    category,
                    seq,
                    %error,
                    policy = ?self.inner.settings.failure_policy,
                    "failed to load subcategories"
                );
                if self.inner.settings.failure_policy == FailurePolicy::ResetToSentinel {
                    if let Err(render_error) = self.render(self.sentinel_only()) {
                        warn!(%render_error, "could not reset subcategories after failure");
                    }
                }
                self.publish(SyncEvent::FetchFailed {
                    category: category.to_string(),
                    seq,
                    reason: error.to_string(),
                });
                SyncOutcome::Failed(error)
            }
        }
    }

    fn requests(&self) -> MutexGuard<'_, RequestLedger> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, requests: &RequestLedger, seq: u64, category: &str) -> bool {
        if seq <= requests.invalidated_through
            || requests.latest_by_category.get(category) != Some(&seq)
        {
            return false;
        }
        match self.inner.form.value(&self.inner.settings.category_control) {
            Some(current) => current == category,
            // Without a category control only the newest request overall counts.
            None => seq == requests.last_seq,
        }
    }

    fn render(&self, options: Vec<SelectOption>) -> Result<(), SyncError> {
        self.inner
            .form
            .replace_options(&self.inner.settings.subcategory_control, options)
    }

    fn control_unavailable(&self, error: SyncError) -> SyncOutcome {
        warn!(%error, "subcategory control unavailable");
        SyncOutcome::ControlUnavailable(error)
    }

    fn sentinel_only(&self) -> Vec<SelectOption> {
        vec![SelectOption::sentinel(&self.inner.settings.sentinel_label)]
    }

    fn with_sentinel(&self, records: Vec<SubcategoryRecord>) -> Vec<SelectOption> {
        let mut options = Vec::with_capacity(records.len() + 1);
        options.push(SelectOption::sentinel(&self.inner.settings.sentinel_label));
        options.extend(
            records
                .into_iter()
                .map(|record| SelectOption::new(record.id.to_string(), record.name)),
        );
        options
    }

    // Any response still in flight becomes stale.
    fn invalidate_pending(&self) {
        let mut requests = self.requests();
        requests.invalidated_through = requests.last_seq;
    }
}

/// A live category listener. Dropping it detaches as well.
pub struct Binding {
    synchronizer: Synchronizer,
    attached: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Binding {
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        self.attached.store(false, Ordering::SeqCst);
        listener.abort();
        self.synchronizer.invalidate_pending();
        info!(
            category_control = %self.synchronizer.inner.settings.category_control,
            "dependent field detached"
        );
        self.synchronizer.publish(SyncEvent::Detached);
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "tests/synchronizer_tests.rs"]
mod tests;
