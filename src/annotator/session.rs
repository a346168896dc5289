use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep, sleep};

use super::{PriceAnnotator, ScanReport};
use crate::config::Config;
use crate::dom::{Document, MutationRecord, SharedDocument};
use crate::models::{CachedRate, currency_code};
use crate::rates::RateCache;
use crate::storage::StoredState;

/// Coalesces bursts of triggers into one firing after a quiet period.
/// Holds at most one pending timer.
pub struct Debouncer {
    delay: Duration,
    timer: Option<Pin<Box<Sleep>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, timer: None }
    }

    /// Starts the timer, or pushes an already pending one back to a full
    /// `delay` from now.
    pub fn trigger(&mut self) {
        let deadline = Instant::now() + self.delay;
        match self.timer.as_mut() {
            Some(timer) => timer.as_mut().reset(deadline),
            None => self.timer = Some(Box::pin(sleep(self.delay))),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Resolves when the pending timer fires; never resolves while idle.
    /// Dropping this future leaves the timer pending.
    pub async fn elapsed(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.timer = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// The life of one page: initial scan, then rescans driven by insertions
/// of price containers.
pub struct PageSession {
    doc: SharedDocument,
    cache: Arc<RateCache>,
    annotator: PriceAnnotator,
    default_currency: String,
    debouncer: Debouncer,
    scans: Arc<AtomicU64>,
}

impl PageSession {
    pub fn new(
        doc: SharedDocument,
        cache: Arc<RateCache>,
        annotator: PriceAnnotator,
        default_currency: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            doc,
            cache,
            annotator,
            default_currency: default_currency.into(),
            debouncer: Debouncer::new(debounce),
            scans: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(doc: SharedDocument, cache: Arc<RateCache>, config: &Config) -> Self {
        Self::new(
            doc,
            cache,
            PriceAnnotator::from_config(config),
            &config.default_currency,
            config.debounce,
        )
    }

    /// Number of completed scans, readable while [`run`](Self::run) owns the
    /// session.
    pub fn scan_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.scans)
    }

    /// Loads the persisted rate and preference, scans the whole page once
    /// and starts observing it. Observation starts under the same lock as the
    /// scan so no insertion falls between the two.
    pub async fn initialize(&self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let pref = self.cache.load_persisted(&self.default_currency).await;
        let rate = self.cache.resolve(&pref.selected_currency).await;

        let mut doc = self.doc.lock().await;
        let report = self.scan(&mut doc, &rate, &pref.selected_currency);
        tracing::info!(
            "Initial scan with {}: {} prices annotated",
            rate.display(),
            report.annotated
        );
        doc.observe()
    }

    /// Re-reads the selected currency, resolves the rate and scans.
    pub async fn rescan(&self) -> ScanReport {
        let selected = self.selected_currency().await;
        let rate = self.cache.resolve(&selected).await;

        let mut doc = self.doc.lock().await;
        let report = self.scan(&mut doc, &rate, &selected);
        metrics::counter!("page_rescans_total").increment(1);
        tracing::info!("Rescan: {} new prices annotated", report.annotated);
        report
    }

    fn scan(&self, doc: &mut Document, rate: &CachedRate, currency: &str) -> ScanReport {
        let report = self.annotator.scan_and_annotate(doc, rate, currency);
        self.scans.fetch_add(1, Ordering::SeqCst);
        report
    }

    async fn selected_currency(&self) -> String {
        let stored = match StoredState::load(self.cache.store().as_ref()).await {
            Ok(state) => state.selected_currency,
            Err(e) => {
                tracing::warn!("Failed to read selected currency: {e}");
                None
            }
        };
        stored
            .as_deref()
            .and_then(currency_code)
            .unwrap_or_else(|| self.default_currency.clone())
    }

    /// An insertion qualifies when an added element is, or contains, a
    /// price container.
    async fn qualifies(&self, record: &MutationRecord) -> bool {
        let doc = self.doc.lock().await;
        let class = self.annotator.container_class();
        record.added.iter().any(|&node| doc.contains_class(node, class))
    }

    /// Watches the mutation feed until it closes, running one debounced
    /// rescan per burst of qualifying insertions.
    pub async fn run(mut self, mut mutations: mpsc::UnboundedReceiver<MutationRecord>) {
        loop {
            tokio::select! {
                record = mutations.recv() => {
                    let Some(record) = record else {
                        break;
                    };
                    if self.qualifies(&record).await {
                        tracing::debug!("Price container inserted under {:?}", record.target);
                        self.debouncer.trigger();
                    }
                }
                _ = self.debouncer.elapsed(), if self.debouncer.is_pending() => {
                    self.rescan().await;
                }
            }
        }

        tracing::debug!("Mutation feed closed; page session ends");
    }
}
