//! crates/emr_core/src/schedule.rs
//!
//! The schedule window evaluator.
//!
//! A stored appointment or prescription is only the anchor of a possibly
//! recurring series. This module expands each series lazily and intersects it
//! with a `[start, end]` window, so a weekly appointment whose first
//! occurrence lies in the past still shows up when a later repeat is due.

use std::iter::FusedIterator;

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use uuid::Uuid;

use crate::domain::{Appointment, Prescription};

/// The portal dashboard looks one week ahead.
pub const DASHBOARD_HORIZON_DAYS: u32 = 7;
/// Full appointment and prescription lists look three months ahead.
pub const LIST_HORIZON_DAYS: u32 = 90;
/// Upper bound for caller-chosen horizons.
pub const MAX_HORIZON_DAYS: u32 = 366;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("window end {end} is before its start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("a horizon of {0} days is out of range (maximum {max})", max = MAX_HORIZON_DAYS)]
    HorizonOutOfRange(u32),
    #[error("record {record_id} ends at {end}, before its first occurrence at {anchor}")]
    EndBeforeAnchor {
        record_id: Uuid,
        anchor: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

//=========================================================================================
// Recurrence
//=========================================================================================

/// The spacing between consecutive occurrences of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

enum Period {
    Days(i64),
    Months(u32),
}

impl Recurrence {
    fn period(self) -> Period {
        match self {
            Self::Daily => Period::Days(1),
            Self::Weekly => Period::Days(7),
            Self::Monthly => Period::Months(1),
            Self::Quarterly => Period::Months(3),
        }
    }

    /// The `n`th occurrence after `anchor` (the anchor itself is `n = 0`).
    ///
    /// Calendar steps are always taken from the anchor, so a series anchored on
    /// the 31st lands on the 31st again whenever the month has one.
    pub fn nth(self, anchor: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        match self.period() {
            Period::Days(days) => anchor.checked_add_signed(Duration::days(days * i64::from(n))),
            Period::Months(months) => n
                .checked_mul(months)
                .and_then(|total| anchor.checked_add_months(Months::new(total))),
        }
    }

    /// An index whose occurrence is never after `start`, used to jump over the
    /// part of a series that precedes a window.
    fn skip_index(self, anchor: DateTime<Utc>, start: DateTime<Utc>) -> u32 {
        if start <= anchor {
            return 0;
        }
        match self.period() {
            Period::Days(days) => {
                let elapsed = (start - anchor).num_milliseconds();
                u32::try_from(elapsed / (days * MILLIS_PER_DAY)).unwrap_or(u32::MAX)
            }
            Period::Months(months) => {
                // Any occurrence in a calendar month before `start`'s month is before `start`.
                let month_gap = (start.year() - anchor.year()) * 12 + start.month() as i32
                    - anchor.month() as i32;
                u32::try_from(month_gap - 1).unwrap_or(0) / months
            }
        }
    }
}

//=========================================================================================
// Occurrence Sequences
//=========================================================================================

/// Anything stored as the anchor of a (possibly) recurring series.
pub trait Scheduled {
    fn record_id(&self) -> Uuid;
    fn anchor(&self) -> DateTime<Utc>;
    fn recurrence(&self) -> Option<Recurrence>;

    fn recurrence_end(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn occurrences(&self) -> Occurrences {
        Occurrences::new(self.anchor(), self.recurrence(), self.recurrence_end())
    }
}

impl Scheduled for Appointment {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn anchor(&self) -> DateTime<Utc> {
        self.date_time
    }

    fn recurrence(&self) -> Option<Recurrence> {
        self.repeat_schedule.map(|s| s.recurrence())
    }

    fn recurrence_end(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }
}

impl Scheduled for Prescription {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn anchor(&self) -> DateTime<Utc> {
        self.refill_date
    }

    fn recurrence(&self) -> Option<Recurrence> {
        Some(self.refill_schedule.recurrence())
    }
}

/// The lazy, ascending sequence of occurrence dates of one series.
///
/// Without a recurrence the sequence is just the anchor. With a recurrence and
/// no end date it is unbounded; callers bound it with `take_while`.
#[derive(Debug, Clone)]
pub struct Occurrences {
    anchor: DateTime<Utc>,
    recurrence: Option<Recurrence>,
    until: Option<DateTime<Utc>>,
    next: Option<u32>,
}

impl Occurrences {
    pub fn new(
        anchor: DateTime<Utc>,
        recurrence: Option<Recurrence>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            anchor,
            recurrence,
            // An end date means nothing for a one-off.
            until: recurrence.and(until),
            next: Some(0),
        }
    }

    /// Jumps close to `start` without walking the series from the anchor.
    /// A few occurrences before `start` may still be yielded.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        if let (Some(recurrence), Some(0)) = (self.recurrence, self.next) {
            self.next = Some(recurrence.skip_index(self.anchor, start));
        }
        self
    }
}

impl Iterator for Occurrences {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let Some(recurrence) = self.recurrence else {
            self.next = None;
            return Some(self.anchor);
        };
        match recurrence.nth(self.anchor, index) {
            Some(at) if self.until.map_or(true, |end| at <= end) => {
                self.next = index.checked_add(1);
                Some(at)
            }
            _ => {
                self.next = None;
                None
            }
        }
    }
}

impl FusedIterator for Occurrences {}

//=========================================================================================
// Windows
//=========================================================================================

/// A closed `[start, end]` interval of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ScheduleError> {
        if end < start {
            return Err(ScheduleError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[now, now + horizon_days]`.
    pub fn upcoming(now: DateTime<Utc>, horizon_days: u32) -> Result<Self, ScheduleError> {
        if horizon_days > MAX_HORIZON_DAYS {
            return Err(ScheduleError::HorizonOutOfRange(horizon_days));
        }
        let end = now
            .checked_add_signed(Duration::days(i64::from(horizon_days)))
            .ok_or(ScheduleError::HorizonOutOfRange(horizon_days))?;
        Self::new(now, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// One concrete date of a series, borrowed alongside the record it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occurrence<'a, T> {
    pub record: &'a T,
    pub at: DateTime<Utc>,
}

fn check_record<T: Scheduled>(record: &T) -> Result<(), ScheduleError> {
    if record.recurrence().is_none() {
        return Ok(());
    }
    match record.recurrence_end() {
        Some(end) if end < record.anchor() => Err(ScheduleError::EndBeforeAnchor {
            record_id: record.record_id(),
            anchor: record.anchor(),
            end,
        }),
        _ => Ok(()),
    }
}

/// Every occurrence of every record that falls inside `window`, ordered by
/// date and then by record id.
///
/// All records are checked before any expansion; one bad record fails the
/// whole evaluation.
pub fn occurrences_in_window<'a, T: Scheduled>(
    records: &'a [T],
    window: &Window,
) -> Result<Vec<Occurrence<'a, T>>, ScheduleError> {
    records.iter().try_for_each(check_record)?;

    let window = *window;
    let mut found: Vec<Occurrence<'a, T>> = records
        .iter()
        .flat_map(|record| {
            record
                .occurrences()
                .starting_at(window.start)
                .take_while(move |at| *at <= window.end)
                .filter(move |at| *at >= window.start)
                .map(move |at| Occurrence { record, at })
        })
        .collect();

    found.sort_by(|a, b| {
        a.at.cmp(&b.at)
            .then_with(|| a.record.record_id().cmp(&b.record.record_id()))
    });
    Ok(found)
}

/// Whole days from `now` until `at`, rounded up. Negative for the past.
pub fn days_until(now: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let millis = (at - now).num_milliseconds();
    millis.div_euclid(MILLIS_PER_DAY) + i64::from(millis.rem_euclid(MILLIS_PER_DAY) != 0)
}
