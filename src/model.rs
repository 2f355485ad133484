//! Data model
//!
//! Value types exchanged with a [`SeriesStore`](crate::store::SeriesStore).

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, TsmError};
use crate::stats;

// =============================================================================
// Series Metadata
// =============================================================================

/// Unit of a sampling grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grid {
    Minute,
    Hour,
    Day,
}

impl Grid {
    /// Length of one grid unit
    pub fn duration(self) -> Duration {
        match self {
            Grid::Minute => Duration::minutes(1),
            Grid::Hour => Duration::hours(1),
            Grid::Day => Duration::days(1),
        }
    }
}

/// Sampling frequency: `steps` grid units in the named time zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freq {
    pub steps: u32,
    pub grid: Grid,
    /// IANA time zone name, e.g. "UTC" or "Europe/Berlin"
    pub tz: String,
}

impl Freq {
    pub fn new(steps: u32, grid: Grid) -> Self {
        Self {
            steps,
            grid,
            tz: "UTC".to_string(),
        }
    }

    pub fn with_tz(mut self, tz: impl Into<String>) -> Self {
        self.tz = tz.into();
        self
    }

    /// Distance between two consecutive samples
    ///
    /// `None` when `steps` grid units do not fit in a `Duration`.
    pub fn step(&self) -> Option<Duration> {
        let steps = i32::try_from(self.steps).ok()?;
        self.grid.duration().checked_mul(steps)
    }
}

impl Default for Freq {
    fn default() -> Self {
        Self::new(1, Grid::Hour)
    }
}

/// Static description of a series
///
/// Carried alongside a series for higher-level consumers. The store
/// neither persists nor enforces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub id: String,
    pub domain: String,
    pub desc: String,
    pub freq: Freq,
    pub periodic: bool,
}

impl Attribute {
    pub fn new(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            desc: String::new(),
            freq: Freq::default(),
            periodic: false,
        }
    }
}

// =============================================================================
// Samples
// =============================================================================

/// Parallel sequences of timestamps and values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    pub times: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl Data {
    pub fn new(times: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        Self { times, values }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: DateTime<Utc>, value: f64) {
        self.times.push(time);
        self.values.push(value);
    }

    /// Number of samples (length of `times`)
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate over (timestamp, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Earliest and latest timestamp, regardless of order
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = *self.times.first()?;
        Some(self.times.iter().fold((first, first), |(lo, hi), &t| {
            (lo.min(t), hi.max(t))
        }))
    }

    /// Check that this batch can be written
    ///
    /// Requires equal lengths, at least one sample and finite values.
    pub fn validate(&self) -> Result<()> {
        if self.times.len() != self.values.len() {
            return Err(TsmError::InvalidArgument(format!(
                "times/values length mismatch: {} times, {} values",
                self.times.len(),
                self.values.len()
            )));
        }
        if self.times.is_empty() {
            return Err(TsmError::InvalidArgument(
                "cannot write an empty batch".to_string(),
            ));
        }
        if let Some((i, v)) = self.values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(TsmError::InvalidArgument(format!(
                "non-finite value {} at position {}",
                v, i
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Description
// =============================================================================

/// Summary of a stored series over its full extent
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

impl Description {
    /// Describe a full series scan in ascending key order
    pub fn from_data(data: &Data) -> Result<Self> {
        let (first, last) = match (data.times.first(), data.times.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(TsmError::InvalidArgument(
                    "cannot describe an empty series".to_string(),
                ))
            }
        };
        let summary = stats::summarize(&data.values)?;

        Ok(Self {
            first,
            last,
            count: summary.count,
            min: summary.min,
            max: summary.max,
            mean: summary.mean,
            std: summary.std,
            median: summary.median,
        })
    }
}
