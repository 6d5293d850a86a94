use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// With a zero gap an empty range never overlaps anything, itself included.
pub fn overlaps(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
    min_gap_minutes: u32,
) -> bool {
    if min_gap_minutes == 0 && (end1 <= start1 || end2 <= start2) {
        return false;
    }
    let gap = Duration::minutes(i64::from(min_gap_minutes));
    start1 < end2 + gap && start2 < end1 + gap
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps_with(&self, other: &Interval, min_gap_minutes: u32) -> bool {
        overlaps(self.start, self.end, other.start, other.end, min_gap_minutes)
    }

    pub fn duration_minutes(&self) -> Option<i64> {
        let minutes = (self.end - self.start).num_minutes();
        (minutes > 0).then_some(minutes)
    }

    pub fn clip(&self, window: &Interval) -> Option<Interval> {
        if self.end <= window.start || self.start >= window.end {
            return None;
        }
        let clipped = Interval {
            start: self.start.max(window.start),
            end: self.end.min(window.end),
        };
        (!clipped.is_empty()).then_some(clipped)
    }
}

pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|interval| !interval.is_empty());
    intervals.sort_unstable_by(|left, right| left.start.cmp(&right.start));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

pub fn free_slots(window: Interval, busy: &[Interval]) -> Vec<Interval> {
    if window.is_empty() {
        return Vec::new();
    }

    let busy = merge_intervals(
        busy.iter()
            .filter_map(|interval| interval.clip(&window))
            .collect(),
    );
    let mut slots = Vec::new();
    let mut cursor = window.start;
    for interval in &busy {
        if interval.start > cursor {
            slots.push(Interval::new(cursor, interval.start));
        }
        if interval.end > cursor {
            cursor = interval.end;
        }
    }
    if cursor < window.end {
        slots.push(Interval::new(cursor, window.end));
    }
    slots
}
