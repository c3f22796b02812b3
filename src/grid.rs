use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("step must be at least one millisecond")]
    NonPositiveStep,
    #[error("step {0:?} is not a whole number of milliseconds")]
    UnalignedStep(Duration),
    #[error("end is before start")]
    EndBeforeStart,
    #[error("{points} points per series exceeds the limit of {max}")]
    TooManyPoints { points: u64, max: usize },
}

/// The timestamps `start, start + step, ..., <= end` a range frame is aligned
/// to, in unix milliseconds.
///
/// The grid is never materialized unless asked for: lookups are plain
/// arithmetic on `start` and `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    start: i64,
    step: i64,
    len: usize,
}

impl TimeGrid {
    pub fn new(start: i64, end: i64, step: i64) -> Result<Self, GridError> {
        if step <= 0 {
            return Err(GridError::NonPositiveStep);
        }
        if end < start {
            return Err(GridError::EndBeforeStart);
        }
        // The last point is the last multiple of step that does not pass end.
        let points = (end as i128 - start as i128) / step as i128 + 1;
        let len = usize::try_from(points).map_err(|_| GridError::TooManyPoints {
            points: u64::try_from(points).unwrap_or(u64::MAX),
            max: usize::MAX,
        })?;
        Ok(Self { start, step, len })
    }

    pub fn from_range(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Self, GridError> {
        if step < Duration::from_millis(1) {
            return Err(GridError::NonPositiveStep);
        }
        if step.subsec_nanos() % 1_000_000 != 0 {
            return Err(GridError::UnalignedStep(step));
        }
        // Any step that does not fit collapses the grid to its start anyway.
        let step_ms = i64::try_from(step.as_millis()).unwrap_or(i64::MAX);
        Self::new(start.timestamp_millis(), end.timestamp_millis(), step_ms)
    }

    /// Rejects grids with more than `max` points.
    pub fn limit(self, max: usize) -> Result<Self, GridError> {
        if self.len > max {
            return Err(GridError::TooManyPoints {
                points: self.len as u64,
                max,
            });
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    // A valid grid always holds at least its start.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// The last point of the grid, which may fall short of the requested end.
    pub fn end(&self) -> i64 {
        self.start + (self.len as i64 - 1) * self.step
    }

    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len).map(move |i| self.start + i as i64 * self.step)
    }

    /// Position of `timestamp` on the grid. Timestamps between grid points or
    /// outside of it have no position.
    pub fn position(&self, timestamp: i64) -> Option<usize> {
        let offset = timestamp as i128 - self.start as i128;
        if offset < 0 || offset % self.step as i128 != 0 {
            return None;
        }
        let index = usize::try_from(offset / self.step as i128).ok()?;
        (index < self.len).then_some(index)
    }
}
