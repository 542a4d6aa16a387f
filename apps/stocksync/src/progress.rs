//! Progress bar for interactive runs.

use std::fmt::Display;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use stocksync_core::RunId;
use stocksync_engine::{
    ChunkFailure, ChunkReport, ReconciliationOutcome, RunPhase, RunReport, SyncObserver,
    TracingObserver,
};

const TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Observer drawing a progress bar over classified records.
///
/// Every event is also forwarded to [`TracingObserver`], so the log file
/// gets the same lines as a run without a bar.
pub struct ProgressObserver {
    bar: ProgressBar,
    log: TracingObserver,
}

impl ProgressObserver {
    /// Create a visible bar labelled with the synchronised entity.
    pub fn new(entity: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style());
        bar.set_message(format!("Syncing {entity}"));
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            log: TracingObserver,
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(TEMPLATE)
        .map(|style| style.progress_chars("█▓▒░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl SyncObserver for ProgressObserver {
    fn on_phase(&self, run_id: &RunId, phase: RunPhase) {
        if phase == RunPhase::Failed {
            self.bar.abandon();
        }
        self.log.on_phase(run_id, phase);
    }

    fn on_fetched(&self, run_id: &RunId, records: usize) {
        self.bar.set_length(records as u64);
        self.bar.enable_steady_tick(Duration::from_millis(100));
        self.log.on_fetched(run_id, records);
    }

    fn on_partitioned(&self, run_id: &RunId, chunks: usize, records: usize) {
        self.log.on_partitioned(run_id, chunks, records);
    }

    fn on_record(&self, chunk: usize, key: &dyn Display, outcome: ReconciliationOutcome) {
        self.bar.inc(1);
        self.log.on_record(chunk, key, outcome);
    }

    fn on_chunk_completed(&self, report: &ChunkReport) {
        self.log.on_chunk_completed(report);
    }

    fn on_chunk_failed(&self, failure: &ChunkFailure) {
        self.log.on_chunk_failed(failure);
    }

    fn on_run_finished(&self, report: &RunReport) {
        self.bar.finish_and_clear();
        self.log.on_run_finished(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        assert!(ProgressStyle::default_bar().template(TEMPLATE).is_ok());
    }

    #[test]
    fn test_bar_tracks_classified_records() {
        let observer = ProgressObserver::with_bar(ProgressBar::hidden());
        let run_id = RunId::new();

        observer.on_fetched(&run_id, 3);
        observer.on_record(0, &"1@2", ReconciliationOutcome::Inserted);
        observer.on_record(1, &"2@2", ReconciliationOutcome::Unchanged);

        assert_eq!(observer.bar.length(), Some(3));
        assert_eq!(observer.bar.position(), 2);
    }

    #[test]
    fn test_failed_run_abandons_bar() {
        let observer = ProgressObserver::with_bar(ProgressBar::hidden());
        observer.on_phase(&RunId::new(), RunPhase::Failed);
        assert!(observer.bar.is_finished());
    }
}
