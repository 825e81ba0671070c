//! Mapping of calendar dates to teaching weeks.
//!
//! A semester starts with an orientation week (week 0) and then runs
//! `week_count` teaching weeks. A one-week mid-semester break sits after
//! `break_after_week`; no teaching week is assigned to it.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};

use crate::config::CalendarConfig;
use crate::error::{Error, Result};

fn week() -> TimeDelta {
    TimeDelta::days(7)
}

/// Precomputed date to week-number lookup for one semester.
#[derive(Debug, Clone)]
pub struct SemesterCalendar {
    week0_start: NaiveDate,
    week0_end: NaiveDate,
    week_count: u8,
    break_after_week: u8,
    days: BTreeMap<NaiveDate, u8>,
}

impl SemesterCalendar {
    /// Builds the calendar for the given semester boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the boundaries are inconsistent.
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        config.validate()?;
        let (week0_start, week0_end) = config.orientation_week()?;

        let mut days = BTreeMap::new();
        let mut current = week0_start + week();
        for number in 1..=config.week_count {
            for day in current.iter_days().take(7) {
                days.insert(day, number);
            }
            current += week();
            if number == config.break_after_week {
                current += week();
            }
        }

        Ok(Self {
            week0_start,
            week0_end,
            week_count: config.week_count,
            break_after_week: config.break_after_week,
            days,
        })
    }

    /// Returns the teaching week containing `date`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WeekOutOfRange`] for dates before week 1, after the
    /// final week, or inside the mid-semester break.
    pub fn week_for(&self, date: NaiveDate) -> Result<u8> {
        self.days
            .get(&date)
            .copied()
            .ok_or_else(|| Error::WeekOutOfRange {
                date,
                first: self.first_day(),
                last: self.last_day(),
            })
    }

    /// First day of week 1.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        self.days
            .keys()
            .next()
            .copied()
            .unwrap_or(self.week0_start + week())
    }

    /// Last day of the final teaching week.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.days
            .keys()
            .next_back()
            .copied()
            .unwrap_or(self.week0_start + week())
    }

    /// Number of teaching weeks.
    #[must_use]
    pub const fn week_count(&self) -> u8 {
        self.week_count
    }

    /// The week after which the mid-semester break falls (0 when there is none).
    #[must_use]
    pub const fn break_after_week(&self) -> u8 {
        self.break_after_week
    }

    /// Inclusive first and last dates of teaching week `week`.
    ///
    /// The window is offset from the orientation week's boundaries, shifted
    /// past the mid-semester break for weeks after it.
    #[must_use]
    pub fn week_window(&self, week: u8) -> (NaiveDate, NaiveDate) {
        let mut offset = i64::from(week);
        if self.break_after_week > 0 && week > self.break_after_week {
            offset += 1;
        }
        let shift = TimeDelta::days(7 * offset);
        (self.week0_start + shift, self.week0_end + shift)
    }

    /// The week a "from now on" selection should start at.
    ///
    /// Before the term this is week 1, after it the final week, and during
    /// the break the first week after the break.
    #[must_use]
    pub fn current_week(&self, today: NaiveDate) -> u8 {
        if let Ok(week) = self.week_for(today) {
            week
        } else if today < self.first_day() {
            1
        } else if today > self.last_day() {
            self.week_count
        } else {
            self.break_after_week + 1
        }
    }
}
