//! Progress reporting for a load
//!
//! The pipeline never logs directly; it reports to a [`MigrationObserver`].
//! [`TracingObserver`] is what the binary uses, [`RecordingObserver`] lets
//! tests assert on what was reported.

use crate::error::IngestError;
use crate::normalize::ParseWarning;
use crate::pipeline::PrepareStats;
use crate::upsert::{BatchOutcome, UpsertSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// When a destination document count was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPhase {
    BeforeLoad,
    AfterLoad,
}

impl fmt::Display for CountPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountPhase::BeforeLoad => write!(f, "before load"),
            CountPhase::AfterLoad => write!(f, "after load"),
        }
    }
}

/// Receives load events. Every method defaults to doing nothing.
pub trait MigrationObserver: Send + Sync {
    fn on_source_loaded(&self, _stats: &PrepareStats) {}

    fn on_parse_warning(&self, _warning: &ParseWarning) {}

    /// No records to write; the run still succeeds
    fn on_empty_input(&self) {}

    fn on_indexes_ready(&self, _count: usize) {}

    fn on_document_count(&self, _phase: CountPhase, _count: u64) {}

    fn on_upsert_started(&self, _records: usize, _batches: usize) {}

    fn on_batch_applied(&self, _outcome: &BatchOutcome) {}

    fn on_upsert_finished(&self, _summary: &UpsertSummary) {}

    /// The upsert stopped early; `applied` covers the batches that were written
    fn on_upsert_aborted(&self, _applied: &UpsertSummary, _error: &IngestError) {}
}

/// Observer that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {}

/// Observer emitting `tracing` events, with an optional progress bar
#[derive(Default)]
pub struct TracingObserver {
    show_progress: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a progress bar over batches (hidden when stderr is not a terminal)
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn batch_progress_bar(batches: usize) -> ProgressBar {
    let pb = ProgressBar::new(batches as u64);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} batches ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("Upserting admissions");
    pb
}

impl MigrationObserver for TracingObserver {
    fn on_source_loaded(&self, stats: &PrepareStats) {
        info!(
            rows = stats.rows_read,
            duplicate_rows = stats.duplicate_rows,
            distinct_identities = stats.distinct_identities,
            parse_warnings = stats.parse_warnings,
            "Source loaded"
        );
    }

    fn on_parse_warning(&self, warning: &ParseWarning) {
        warn!(
            line = warning.line,
            column = warning.field.column(),
            "{}",
            warning
        );
    }

    fn on_empty_input(&self) {
        warn!("No records to migrate");
    }

    fn on_indexes_ready(&self, count: usize) {
        info!(indexes = count, "Indexes ensured");
    }

    fn on_document_count(&self, phase: CountPhase, count: u64) {
        info!(documents = count, "Document count {}", phase);
    }

    fn on_upsert_started(&self, records: usize, batches: usize) {
        info!(records, batches, "Starting upsert");
        if self.show_progress {
            *self.progress() = Some(batch_progress_bar(batches));
        }
    }

    fn on_batch_applied(&self, outcome: &BatchOutcome) {
        let progress = self.progress();
        let message = format!(
            "Batch {}: upserted={} matched={} modified={}",
            outcome.number, outcome.upserted, outcome.matched, outcome.modified
        );
        match progress.as_ref() {
            Some(pb) => {
                pb.inc(1);
                pb.suspend(|| info!(conflicts = outcome.conflicts, "{}", message));
            },
            None => info!(conflicts = outcome.conflicts, "{}", message),
        }
    }

    fn on_upsert_finished(&self, summary: &UpsertSummary) {
        if let Some(pb) = self.progress().take() {
            pb.finish_with_message("Upsert complete");
        }
        info!(
            batches = summary.batches,
            upserted = summary.upserted,
            matched = summary.matched,
            modified = summary.modified,
            conflicts = summary.conflicts,
            "Upsert finished"
        );
    }

    fn on_upsert_aborted(&self, applied: &UpsertSummary, error: &IngestError) {
        if let Some(pb) = self.progress().take() {
            pb.abandon_with_message("Upsert aborted");
        }
        warn!(
            batches = applied.batches,
            upserted = applied.upserted,
            matched = applied.matched,
            "Upsert aborted: {}",
            error
        );
    }
}

/// One event captured by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    SourceLoaded(PrepareStats),
    ParseWarning(ParseWarning),
    EmptyInput,
    IndexesReady(usize),
    DocumentCount(CountPhase, u64),
    UpsertStarted { records: usize, batches: usize },
    BatchApplied(BatchOutcome),
    UpsertFinished(UpsertSummary),
    UpsertAborted { applied: UpsertSummary, error: String },
}

/// Observer that keeps every event in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn batches(&self) -> Vec<BatchOutcome> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::BatchApplied(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<ParseWarning> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::ParseWarning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }

    pub fn saw_empty_input(&self) -> bool {
        self.events().contains(&ObservedEvent::EmptyInput)
    }
}

impl MigrationObserver for RecordingObserver {
    fn on_source_loaded(&self, stats: &PrepareStats) {
        self.push(ObservedEvent::SourceLoaded(stats.clone()));
    }

    fn on_parse_warning(&self, warning: &ParseWarning) {
        self.push(ObservedEvent::ParseWarning(warning.clone()));
    }

    fn on_empty_input(&self) {
        self.push(ObservedEvent::EmptyInput);
    }

    fn on_indexes_ready(&self, count: usize) {
        self.push(ObservedEvent::IndexesReady(count));
    }

    fn on_document_count(&self, phase: CountPhase, count: u64) {
        self.push(ObservedEvent::DocumentCount(phase, count));
    }

    fn on_upsert_started(&self, records: usize, batches: usize) {
        self.push(ObservedEvent::UpsertStarted { records, batches });
    }

    fn on_batch_applied(&self, outcome: &BatchOutcome) {
        self.push(ObservedEvent::BatchApplied(outcome.clone()));
    }

    fn on_upsert_finished(&self, summary: &UpsertSummary) {
        self.push(ObservedEvent::UpsertFinished(summary.clone()));
    }

    fn on_upsert_aborted(&self, applied: &UpsertSummary, error: &IngestError) {
        self.push(ObservedEvent::UpsertAborted {
            applied: applied.clone(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_indexes_ready(6);
        observer.on_document_count(CountPhase::BeforeLoad, 0);
        observer.on_empty_input();

        assert_eq!(
            observer.events(),
            vec![
                ObservedEvent::IndexesReady(6),
                ObservedEvent::DocumentCount(CountPhase::BeforeLoad, 0),
                ObservedEvent::EmptyInput,
            ]
        );
        assert!(observer.saw_empty_input());
    }

    #[test]
    fn test_recording_observer_filters_warnings() {
        let observer = RecordingObserver::new();
        let warning = ParseWarning {
            line: 3,
            field: Field::Age,
            raw: "abc".to_string(),
        };
        observer.on_parse_warning(&warning);
        observer.on_indexes_ready(6);

        assert_eq!(observer.warnings(), vec![warning]);
        assert!(observer.batches().is_empty());
    }

    #[test]
    fn test_tracing_observer_without_progress() {
        let observer = TracingObserver::new();
        observer.on_upsert_started(10, 2);
        assert!(observer.progress().is_none());

        observer.on_batch_applied(&BatchOutcome {
            number: 1,
            size: 5,
            upserted: 5,
            ..BatchOutcome::default()
        });
        observer.on_upsert_finished(&UpsertSummary::default());
    }

    #[test]
    fn test_tracing_observer_progress_bar_lifecycle() {
        let observer = TracingObserver::new().with_progress(true);
        observer.on_upsert_started(10, 2);
        assert_eq!(observer.progress().as_ref().unwrap().length(), Some(2));

        observer.on_upsert_finished(&UpsertSummary::default());
        assert!(observer.progress().is_none());
    }

    #[test]
    fn test_tracing_observer_clears_progress_bar_on_abort() {
        let observer = TracingObserver::new().with_progress(true);
        observer.on_upsert_started(10, 3);
        assert!(observer.progress().is_some());

        let err = IngestError::Cancelled {
            completed: 1,
            total: 3,
        };
        observer.on_upsert_aborted(&UpsertSummary::default(), &err);
        assert!(observer.progress().is_none());
    }

    #[test]
    fn test_count_phase_display() {
        assert_eq!(CountPhase::BeforeLoad.to_string(), "before load");
        assert_eq!(CountPhase::AfterLoad.to_string(), "after load");
    }
}
