//! Event extractor
//!
//! Turns [`LogLine`]s into [`LogEvent`]s in one lazy pass. The registry says
//! what a line contains; the extractor adds the little context a single line
//! cannot carry:
//!
//! - **Count attachment**: a count without a stage belongs to the most
//!   recently opened phase that is still open, or to [`PhaseName::Unscoped`]
//! - **Implicit phases**: [`Marker::PhaseActivity`] opens a phase on first
//!   sight. Opening any other phase closes it, stamped with its last activity
//!   (including counts and measurements attributed to it). At end of input
//!   it is closed the same way
//! - **Error subsystems**: taken from the rule, else guessed from keywords in
//!   the message, else from the phase the error happened in
//!
//! Explicitly started phases that never end are left open; the
//! [`PhaseAggregator`](crate::analysis::PhaseAggregator) reports them as abandoned.

use crate::ingest::rules::{Marker, RuleRegistry};
use crate::types::{EventKind, LogEvent, LogLine, PhaseName};
use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Message keywords that identify the failing subsystem, checked in order.
const SUBSYSTEM_KEYWORDS: &[(&str, &str)] = &[
    ("plate solv", "plate solve"),
    ("platesolv", "plate solve"),
    ("did not solve", "plate solve"),
    ("astrometr", "plate solve"),
    ("regist", "registration"),
    ("stack", "stacking"),
    ("convert", "conversion"),
    ("conversion", "conversion"),
    ("background", "background extraction"),
    ("subsky", "background extraction"),
    ("calibrat", "calibration"),
    ("memory", "memory"),
    ("disk", "disk"),
    ("space left", "disk"),
];

/// Guess the subsystem an error message refers to.
pub fn classify_subsystem(message: &str) -> Option<&'static str> {
    let message = message.to_ascii_lowercase();
    SUBSYSTEM_KEYWORDS
        .iter()
        .find(|(keyword, _)| message.contains(keyword))
        .map(|(_, subsystem)| *subsystem)
}

/// Subsystem name used for errors raised inside a phase.
fn subsystem_for_phase(phase: PhaseName) -> Option<&'static str> {
    match phase {
        PhaseName::Conversion => Some("conversion"),
        PhaseName::Calibration => Some("calibration"),
        PhaseName::PlateSolving => Some("plate solve"),
        PhaseName::BackgroundExtraction => Some("background extraction"),
        PhaseName::Registration => Some("registration"),
        PhaseName::Stacking => Some("stacking"),
        PhaseName::Unscoped | PhaseName::Unknown => None,
    }
}

/// Extracts events from lines using a rule registry.
pub struct EventExtractor<'r> {
    registry: &'r RuleRegistry,
}

impl<'r> EventExtractor<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self { registry }
    }

    /// Lazily extract events from `lines`.
    pub fn extract<I>(&self, lines: I) -> Events<'r, I::IntoIter>
    where
        I: IntoIterator<Item = LogLine>,
    {
        Events {
            lines: lines.into_iter(),
            registry: self.registry,
            open: Vec::new(),
            pending: VecDeque::new(),
            last_line: 0,
            emitted: 0,
            finished: false,
        }
    }
}

#[derive(Debug)]
struct OpenPhase {
    name: PhaseName,
    implicit: bool,
    last_activity: Option<NaiveDateTime>,
}

/// Iterator over extracted events. See [`EventExtractor::extract`].
pub struct Events<'r, I> {
    lines: I,
    registry: &'r RuleRegistry,
    /// Open phases, most recently opened last
    open: Vec<OpenPhase>,
    pending: VecDeque<LogEvent>,
    last_line: u64,
    emitted: usize,
    finished: bool,
}

impl<'r, I> Events<'r, I> {
    fn current_phase(&self) -> Option<PhaseName> {
        self.open.last().map(|p| p.name)
    }

    fn position(&self, name: PhaseName) -> Option<usize> {
        self.open.iter().position(|p| p.name == name)
    }

    /// Close every open implicit phase other than `keep`.
    fn close_implicit(&mut self, keep: Option<PhaseName>, source_line: u64) {
        let mut index = 0;
        while index < self.open.len() {
            let phase = &self.open[index];
            if phase.implicit && Some(phase.name) != keep {
                let phase = self.open.remove(index);
                self.pending.push_back(
                    LogEvent::new(
                        EventKind::PhaseEnd,
                        source_line,
                        phase.last_activity,
                        format!("{} ended (last activity)", phase.name.display_name()),
                    )
                    .with_phase(phase.name),
                );
            } else {
                index += 1;
            }
        }
    }

    fn process(&mut self, line: &LogLine) {
        let markers = self.registry.apply(line);
        if markers.is_empty() {
            return;
        }

        let line_no = line.line_number;
        let ts = line.timestamp;
        let message = line.body().trim().to_string();

        // One error event per line; prefer a rule that named the subsystem.
        let rule_subsystem = markers.iter().find_map(|m| match m {
            Marker::Error {
                subsystem: Some(s),
            } => Some(s.clone()),
            _ => None,
        });
        let mut error_emitted = false;
        let mut warning_emitted = false;
        let mut attached: Option<PhaseName> = None;

        for marker in markers {
            match marker {
                Marker::PhaseStart(name) => {
                    self.close_implicit(Some(name), line_no);
                    match self.position(name) {
                        Some(i) if self.open[i].implicit => {
                            self.open[i].implicit = false;
                            self.open[i].last_activity = ts.or(self.open[i].last_activity);
                            continue;
                        }
                        Some(i) => {
                            self.open.remove(i);
                        }
                        None => {}
                    }
                    self.open.push(OpenPhase {
                        name,
                        implicit: false,
                        last_activity: ts,
                    });
                    self.pending.push_back(
                        LogEvent::new(EventKind::PhaseStart, line_no, ts, message.clone())
                            .with_phase(name),
                    );
                }
                Marker::PhaseEnd(name) => {
                    if let Some(i) = self.position(name) {
                        self.open.remove(i);
                    }
                    self.pending.push_back(
                        LogEvent::new(EventKind::PhaseEnd, line_no, ts, message.clone())
                            .with_phase(name),
                    );
                }
                Marker::PhaseActivity(name) => {
                    if let Some(i) = self.position(name) {
                        self.open[i].last_activity = ts.or(self.open[i].last_activity);
                        continue;
                    }
                    self.close_implicit(Some(name), line_no);
                    self.open.push(OpenPhase {
                        name,
                        implicit: true,
                        last_activity: ts,
                    });
                    self.pending.push_back(
                        LogEvent::new(EventKind::PhaseStart, line_no, ts, message.clone())
                            .with_phase(name),
                    );
                }
                Marker::ImageCount { count, stage } => {
                    let phase = stage
                        .or_else(|| self.current_phase())
                        .unwrap_or(PhaseName::Unscoped);
                    attached = Some(phase);
                    self.pending.push_back(
                        LogEvent::new(EventKind::ImageCount, line_no, ts, message.clone())
                            .with_phase(phase)
                            .with_count(count),
                    );
                }
                Marker::Error { .. } => {
                    if error_emitted {
                        continue;
                    }
                    error_emitted = true;

                    let phase = self.current_phase();
                    attached = phase.or(attached);
                    let subsystem = rule_subsystem
                        .clone()
                        .or_else(|| classify_subsystem(&message).map(str::to_string))
                        .or_else(|| phase.and_then(subsystem_for_phase).map(str::to_string));

                    let mut event = LogEvent::new(EventKind::Error, line_no, ts, message.clone());
                    event.phase_name = phase;
                    event.subsystem = subsystem;
                    self.pending.push_back(event);
                }
                Marker::Warning => {
                    if warning_emitted {
                        continue;
                    }
                    warning_emitted = true;

                    let mut event =
                        LogEvent::new(EventKind::Warning, line_no, ts, message.clone());
                    event.phase_name = self.current_phase();
                    attached = event.phase_name.or(attached);
                    self.pending.push_back(event);
                }
                Marker::Measure(measurement) => {
                    let mut event = LogEvent::new(EventKind::Info, line_no, ts, message.clone())
                        .with_measurement(measurement);
                    event.phase_name = self.current_phase();
                    attached = event.phase_name.or(attached);
                    self.pending.push_back(event);
                }
            }
        }

        // Output attributed to an implicit phase counts as activity.
        if let (Some(ts), Some(open)) = (ts, self.open.last_mut()) {
            if open.implicit && attached == Some(open.name) {
                open.last_activity = Some(ts);
            }
        }
    }
}

impl<'r, I> Iterator for Events<'r, I>
where
    I: Iterator<Item = LogLine>,
{
    type Item = LogEvent;

    fn next(&mut self) -> Option<LogEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.emitted += 1;
                return Some(event);
            }
            if self.finished {
                return None;
            }

            match self.lines.next() {
                Some(line) => {
                    self.last_line = line.line_number;
                    self.process(&line);
                }
                None => {
                    self.close_implicit(None, self.last_line);
                    self.finished = true;

                    let still_open: Vec<&str> = self.open.iter().map(|p| p.name.as_str()).collect();
                    tracing::debug!(
                        lines = self.last_line,
                        events = self.emitted + self.pending.len(),
                        open_phases = ?still_open,
                        "Extraction complete"
                    );
                }
            }
        }
    }
}
