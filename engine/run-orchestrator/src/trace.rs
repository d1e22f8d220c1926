//! Trace recorder: accumulates everything a run touched, in order, and
//! freezes it at finalization.

use crate::types::RunTrace;
use pricing_engines::PricedLine;
use reference_data::{ResolvedContext, TraceNote};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct TraceRecorder {
    datasets: Vec<ResolvedContext>,
    notes: Vec<TraceNote>,
    formulas: Vec<String>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dataset(&mut self, context: &ResolvedContext) {
        self.datasets.push(context.clone());
    }

    pub fn note(&mut self, note: TraceNote) {
        self.notes.push(note);
    }

    pub fn notes(&mut self, notes: impl IntoIterator<Item = TraceNote>) {
        self.notes.extend(notes);
    }

    /// Record each line's applied formula verbatim.
    pub fn record_lines(&mut self, lines: &[PricedLine]) {
        for line in lines {
            self.formulas.push(format!("{}: {}", line.code, line.formula));
        }
    }

    pub fn finalize(self, toggles: BTreeMap<String, bool>) -> RunTrace {
        RunTrace {
            datasets: self.datasets,
            notes: self.notes,
            formulas: self.formulas,
            toggles,
        }
    }
}
