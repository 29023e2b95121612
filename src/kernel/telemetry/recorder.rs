use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(256),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.buffer)
    }

    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_bounded() {
        let mut recorder = TelemetryRecorder::new();
        for gap in 0..(MAX_EVENTS as i64 + 5) {
            recorder.record(TelemetryEvent::DebounceAbsorbed { gap_ms: gap });
        }
        assert_eq!(recorder.events().count(), MAX_EVENTS);
        assert_eq!(recorder.events().next(), Some(&TelemetryEvent::DebounceAbsorbed { gap_ms: 5 }));
    }
}
