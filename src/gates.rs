//! Time gate definitions: the start and duration of every gate

use std::path::Path;

use units::{s, s_, Time};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeGate {
    pub start: Time,
    pub duration: Time,
}

/// Gates in gate order. Gate numbers are 1-based in files and 0-based here.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGateDefinitions {
    gates: Vec<TimeGate>,
}

#[derive(thiserror::Error, Debug)]
pub enum GateDefinitionError {
    #[error("could not read gate definitions: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected `gate_number duration`, found `{text}`")]
    Parse { line: usize, text: String },
    #[error("line {line}: expected gate number {expected}, found {found}")]
    GateNumber { line: usize, expected: usize, found: usize },
    #[error("gate {gate} has negative duration {duration} s")]
    NegativeDuration { gate: usize, duration: f32 },
    #[error("no gates defined")]
    Empty,
}

impl TimeGateDefinitions {

    pub fn new(gates: Vec<TimeGate>) -> Result<Self, GateDefinitionError> {
        if gates.is_empty() { return Err(GateDefinitionError::Empty) }
        for (gate, g) in gates.iter().enumerate() {
            let duration = s_(g.duration);
            if duration < 0.0 || duration.is_nan() {
                return Err(GateDefinitionError::NegativeDuration { gate, duration });
            }
        }
        Ok(Self { gates })
    }

    /// Consecutive gates starting at t = 0
    pub fn from_durations(durations: impl IntoIterator<Item = Time>) -> Result<Self, GateDefinitionError> {
        let mut start = s(0.0);
        let gates = durations.into_iter()
            .map(|duration| {
                let gate = TimeGate { start, duration };
                start += duration;
                gate
            })
            .collect();
        Self::new(gates)
    }

    pub fn num_gates(&self) -> usize { self.gates.len() }

    pub fn gate(&self, i: usize) -> TimeGate { self.gates[i] }

    pub fn start   (&self, i: usize) -> Time { self.gates[i].start    }
    pub fn duration(&self, i: usize) -> Time { self.gates[i].duration }

    /// Relative weight of gate `i` when gates are combined: its duration in
    /// seconds
    pub fn weight(&self, i: usize) -> f32 { s_(self.gates[i].duration) }

    pub fn iter(&self) -> impl Iterator<Item = &TimeGate> { self.gates.iter() }

    pub fn read_gdef_file(path: &Path) -> Result<Self, GateDefinitionError> {
        Self::parse_gdef(&std::fs::read_to_string(path)?)
    }

    /// Parse lines of `gate_number duration_seconds`. Everything after `#` is
    /// a comment; gate numbers must be 1, 2, 3 ... in order.
    pub fn parse_gdef(text: &str) -> Result<Self, GateDefinitionError> {
        let mut durations = vec![];
        for (n, raw_line) in text.lines().enumerate() {
            let line = n + 1;
            let content = raw_line.split('#').next().unwrap_or("").trim();
            if content.is_empty() { continue }
            let parse_error = || GateDefinitionError::Parse { line, text: raw_line.to_string() };
            let fields = content.split_whitespace().collect::<Vec<_>>();
            let [number, duration] = fields[..] else { return Err(parse_error()) };
            let found: usize = number.parse().map_err(|_| parse_error())?;
            let duration: f32 = duration.parse().map_err(|_| parse_error())?;
            let expected = durations.len() + 1;
            if found != expected {
                return Err(GateDefinitionError::GateNumber { line, expected, found });
            }
            durations.push(s(duration));
        }
        Self::from_durations(durations)
    }
}
