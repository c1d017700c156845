//! Live terminal UI: a log pane, an overall bar and one spinner per transfer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use exporter_core::report::{LogRing, Reporter, human_readable_speed};
use exporter_core::RunSummary;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const SPINNER_TICK: Duration = Duration::from_millis(100);

/// [`Reporter`] drawing to stderr with indicatif.
pub(crate) struct TerminalReporter {
    multi: MultiProgress,
    log_pane: ProgressBar,
    overall: ProgressBar,
    transfers: Mutex<HashMap<String, ProgressBar>>,
    ring: Mutex<LogRing>,
}

impl TerminalReporter {
    pub(crate) fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let log_pane = multi.add(ProgressBar::new_spinner());
        log_pane.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::with_template(
                "Processing files {bar:40.cyan/blue} {pos}/{len} ({percent}%) {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        Self {
            multi,
            log_pane,
            overall,
            transfers: Mutex::new(HashMap::new()),
            ring: Mutex::new(LogRing::default()),
        }
    }

    fn transfers(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.transfers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ring(&self) -> MutexGuard<'_, LogRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reporter for TerminalReporter {
    fn on_batch_start(&self, total: usize) {
        self.overall.set_length(total as u64);
        self.overall.set_position(0);
    }

    fn on_file_start(&self, name: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Downloading {name}"));
        bar.enable_steady_tick(SPINNER_TICK);
        if let Some(previous) = self.transfers().insert(name.to_string(), bar) {
            previous.finish_and_clear();
            self.multi.remove(&previous);
        }
    }

    fn on_file_progress(&self, name: &str, bytes_per_sec: f64) {
        if let Some(bar) = self.transfers().get(name) {
            bar.set_message(format!(
                "Downloading {name} @ {}",
                human_readable_speed(bytes_per_sec)
            ));
        }
    }

    fn on_file_finish(&self, name: &str) {
        if let Some(bar) = self.transfers().remove(name) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn on_entry_complete(&self) {
        self.overall.inc(1);
    }

    fn on_log_line(&self, text: &str) {
        let rendered = {
            let mut ring = self.ring();
            ring.push_timestamped(text);
            ring.render()
        };
        self.log_pane.set_message(rendered);
    }

    fn on_batch_end(&self, _summary: &RunSummary) {
        for (_, bar) in self.transfers().drain() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.overall.finish();
        self.log_pane.finish();
    }
}
