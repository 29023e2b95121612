use std::collections::VecDeque;

use super::event::TelemetryEvent;
use crate::kernel::event::TransitionKind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub transition_stats: TransitionStats,
    pub debounce_stats: DebounceStats,
    pub dropped_emissions: u64,
    pub kit_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionStats {
    pub inits: u64,
    pub backgrounds: u64,
    pub total_background_ms: i64,
    pub avg_background_ms: f64,
    pub max_interruptions: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebounceStats {
    pub absorbed: u64,
    pub avg_absorbed_gap_ms: f64,
    pub max_absorbed_gap_ms: i64,
    pub immediate: u64,
    pub rejected_checks: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    let mut resumed_cycles = 0u64;
    let mut total_gap_ms = 0i64;

    for event in events {
        match event {
            TelemetryEvent::Transition { kind, background_ms, interruptions, .. } => {
                match kind {
                    TransitionKind::Init => {
                        snap.transition_stats.inits += 1;
                        // Cold start carries zero background time.
                        if *background_ms > 0 {
                            snap.transition_stats.total_background_ms += background_ms;
                            resumed_cycles += 1;
                        }
                    }
                    TransitionKind::Background => snap.transition_stats.backgrounds += 1,
                }
                snap.transition_stats.max_interruptions =
                    snap.transition_stats.max_interruptions.max(*interruptions);
            }
            TelemetryEvent::DebounceAbsorbed { gap_ms } => {
                snap.debounce_stats.absorbed += 1;
                total_gap_ms += gap_ms;
                snap.debounce_stats.max_absorbed_gap_ms = snap.debounce_stats.max_absorbed_gap_ms.max(*gap_ms);
            }
            TelemetryEvent::ImmediateBackground { .. } => snap.debounce_stats.immediate += 1,
            TelemetryEvent::CheckRejected { .. } => snap.debounce_stats.rejected_checks += 1,
            TelemetryEvent::EmissionDropped { .. } => snap.dropped_emissions += 1,
            TelemetryEvent::KitFailed { .. } => snap.kit_failures += 1,
        }
    }

    if resumed_cycles > 0 {
        snap.transition_stats.avg_background_ms =
            snap.transition_stats.total_background_ms as f64 / resumed_cycles as f64;
    }

    if snap.debounce_stats.absorbed > 0 {
        snap.debounce_stats.avg_absorbed_gap_ms = total_gap_ms as f64 / snap.debounce_stats.absorbed as f64;
    }

    snap
}
