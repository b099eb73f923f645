//! Phase aggregation
//!
//! Folds PHASE_START / PHASE_END events into [`Phase`] records. Each phase
//! name moves through `not started → open → closed`; an open phase becomes
//! abandoned when the same name starts again or the events run out.
//!
//! All state lives in the aggregator for the duration of one pass: an arena of
//! phases in first-start order, plus an index of which arena slot is open (and
//! which is the latest) for each name.

use crate::types::{EventKind, LogEvent, Phase, PhaseName, PhaseStatus};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Single-pass phase state machine.
#[derive(Debug, Default)]
pub struct PhaseAggregator {
    phases: Vec<Phase>,
    open: HashMap<PhaseName, usize>,
    latest: HashMap<PhaseName, usize>,
}

/// Duration in seconds when both ends are known and in order.
fn duration_between(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<i64> {
    match (start, end) {
        (Some(start), Some(end)) if end >= start => Some((end - start).num_seconds()),
        _ => None,
    }
}

impl PhaseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a complete event sequence.
    pub fn aggregate(events: &[LogEvent]) -> Vec<Phase> {
        let mut aggregator = Self::new();
        for event in events {
            aggregator.observe(event);
        }
        aggregator.finish()
    }

    /// Feed one event. Events other than phase boundaries are ignored.
    pub fn observe(&mut self, event: &LogEvent) {
        let Some(name) = event.phase_name else {
            return;
        };
        match event.kind {
            EventKind::PhaseStart => self.start(name, event),
            EventKind::PhaseEnd => self.end(name, event),
            _ => {}
        }
    }

    fn start(&mut self, name: PhaseName, event: &LogEvent) {
        if let Some(index) = self.open.remove(&name) {
            tracing::info!(
                phase = %name,
                start_line = ?self.phases[index].start_line,
                restart_line = event.source_line,
                "Phase restarted before it ended; marking abandoned"
            );
        }

        // Every phase is abandoned until its end is seen.
        self.phases.push(Phase {
            name,
            status: PhaseStatus::Abandoned,
            start: event.timestamp,
            end: None,
            duration_secs: None,
            start_line: Some(event.source_line),
            end_line: None,
        });
        let index = self.phases.len() - 1;
        self.open.insert(name, index);
        self.latest.insert(name, index);
    }

    fn end(&mut self, name: PhaseName, event: &LogEvent) {
        if let Some(index) = self.open.remove(&name) {
            let phase = &mut self.phases[index];
            phase.status = PhaseStatus::Closed;
            phase.end = event.timestamp;
            phase.end_line = Some(event.source_line);
            phase.duration_secs = duration_between(phase.start, phase.end);
            return;
        }

        match self.latest.get(&name).copied() {
            // A second END for a closed phase moves its end forward.
            Some(index) => {
                let phase = &mut self.phases[index];
                phase.end = event.timestamp.or(phase.end);
                phase.end_line = Some(event.source_line);
                phase.duration_secs = duration_between(phase.start, phase.end);
            }
            None => {
                tracing::debug!(
                    phase = %name,
                    line = event.source_line,
                    "Phase ended without a start"
                );
                self.phases.push(Phase {
                    name,
                    status: PhaseStatus::Closed,
                    start: None,
                    end: event.timestamp,
                    duration_secs: None,
                    start_line: None,
                    end_line: Some(event.source_line),
                });
                self.latest.insert(name, self.phases.len() - 1);
            }
        }
    }

    /// Finish the pass. Phases still open are reported as abandoned.
    pub fn finish(self) -> Vec<Phase> {
        let mut still_open: Vec<_> = self.open.into_iter().collect();
        still_open.sort_by_key(|(_, index)| *index);
        for (name, index) in still_open {
            tracing::info!(
                phase = %name,
                start_line = ?self.phases[index].start_line,
                "Phase never ended; marking abandoned"
            );
        }
        self.phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> Option<NaiveDateTime> {
        NaiveDate::default().and_hms_opt(h, m, s)
    }

    fn start(name: PhaseName, line: u64, ts: Option<NaiveDateTime>) -> LogEvent {
        LogEvent::new(EventKind::PhaseStart, line, ts, "start").with_phase(name)
    }

    fn end(name: PhaseName, line: u64, ts: Option<NaiveDateTime>) -> LogEvent {
        LogEvent::new(EventKind::PhaseEnd, line, ts, "end").with_phase(name)
    }

    #[test]
    fn test_basic_two_phases() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Conversion, 1, at(10, 0, 0)),
            LogEvent::new(EventKind::ImageCount, 2, None, "120 images found")
                .with_phase(PhaseName::Conversion)
                .with_count(120),
            end(PhaseName::Conversion, 3, at(10, 5, 0)),
            start(PhaseName::Registration, 4, at(10, 5, 0)),
            end(PhaseName::Registration, 6, at(10, 12, 30)),
        ]);

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].name, PhaseName::Conversion);
        assert!(phases[0].is_closed());
        assert_eq!(phases[0].duration_secs, Some(300));
        assert_eq!(phases[1].name, PhaseName::Registration);
        assert_eq!(phases[1].duration_secs, Some(450));
        assert_eq!(phases[1].start_line, Some(4));
        assert_eq!(phases[1].end_line, Some(6));
    }

    #[test]
    fn test_truncated_phase_is_abandoned() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Conversion, 1, at(10, 0, 0)),
            end(PhaseName::Conversion, 3, at(10, 5, 0)),
            start(PhaseName::Registration, 4, at(10, 5, 0)),
        ]);

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].status, PhaseStatus::Closed);
        assert_eq!(phases[1].status, PhaseStatus::Abandoned);
        assert_eq!(phases[1].end, None);
        assert_eq!(phases[1].duration_secs, None);
    }

    #[test]
    fn test_restart_abandons_previous_instance() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Stacking, 1, at(1, 0, 0)),
            start(PhaseName::Stacking, 5, at(2, 0, 0)),
            end(PhaseName::Stacking, 9, at(2, 30, 0)),
        ]);

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].status, PhaseStatus::Abandoned);
        assert_eq!(phases[0].end, None);
        assert_eq!(phases[1].status, PhaseStatus::Closed);
        assert_eq!(phases[1].duration_secs, Some(1800));
    }

    #[test]
    fn test_missing_timestamps_give_unknown_duration() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Conversion, 1, None),
            end(PhaseName::Conversion, 2, at(10, 0, 0)),
        ]);
        assert!(phases[0].is_closed());
        assert_eq!(phases[0].duration_secs, None);
    }

    #[test]
    fn test_backwards_end_gives_unknown_duration() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Conversion, 1, at(10, 0, 0)),
            end(PhaseName::Conversion, 2, at(9, 0, 0)),
        ]);
        assert!(phases[0].is_closed());
        assert_eq!(phases[0].duration_secs, None);
    }

    #[test]
    fn test_end_without_start() {
        let phases = PhaseAggregator::aggregate(&[end(PhaseName::PlateSolving, 7, at(3, 0, 0))]);
        assert_eq!(phases.len(), 1);
        assert!(phases[0].is_closed());
        assert_eq!(phases[0].start, None);
        assert_eq!(phases[0].start_line, None);
        assert_eq!(phases[0].duration_secs, None);
    }

    #[test]
    fn test_second_end_extends_closed_phase() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Registration, 1, at(10, 0, 0)),
            end(PhaseName::Registration, 2, at(10, 1, 0)),
            end(PhaseName::Registration, 3, at(10, 2, 0)),
        ]);
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].end_line, Some(3));
        assert_eq!(phases[0].duration_secs, Some(120));
    }

    #[test]
    fn test_no_two_open_instances_of_a_name() {
        let events = [
            start(PhaseName::Stacking, 1, at(1, 0, 0)),
            start(PhaseName::Stacking, 2, at(1, 1, 0)),
            start(PhaseName::Stacking, 3, at(1, 2, 0)),
        ];
        let phases = PhaseAggregator::aggregate(&events);
        assert_eq!(phases.len(), 3);
        assert!(phases.iter().all(|p| p.status == PhaseStatus::Abandoned));
        assert!(phases.iter().all(|p| p.end.is_none()));
    }

    #[test]
    fn test_phases_keep_first_start_order() {
        let phases = PhaseAggregator::aggregate(&[
            start(PhaseName::Stacking, 1, at(1, 0, 0)),
            start(PhaseName::Conversion, 2, at(1, 1, 0)),
            end(PhaseName::Conversion, 3, at(1, 2, 0)),
            end(PhaseName::Stacking, 4, at(1, 3, 0)),
        ]);
        let names: Vec<_> = phases.iter().map(|p| p.name).collect();
        assert_eq!(names, vec![PhaseName::Stacking, PhaseName::Conversion]);
    }

    #[test]
    fn test_empty_input() {
        assert!(PhaseAggregator::aggregate(&[]).is_empty());
    }
}
