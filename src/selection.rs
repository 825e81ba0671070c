//! Parsing of week ranges and cutoff dates into sets of acceptable dates.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

use crate::calendar::SemesterCalendar;
use crate::config::SelectionConfig;
use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%d/%m/%Y";

/// A parsed date-range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// Individual teaching weeks (`1,3,4` or `5`), sorted and deduplicated.
    Weeks(Vec<u8>),
    /// An inclusive span of teaching weeks (`2-7`).
    WeekSpan {
        /// First week of the span.
        first: u8,
        /// Last week of the span.
        last: u8,
    },
    /// Every date from a cutoff up to today (`01/08/2017`).
    Since(NaiveDate),
}

impl RangeSpec {
    /// Parses a user-supplied range expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RangeParse`] for empty or unrecognised input.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let fail = |reason: &str| Error::RangeParse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(fail("no range given"));
        }

        if trimmed.contains('/') {
            return NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(Self::Since)
                .map_err(|e| fail(&format!("expected a dd/mm/yyyy date ({e})")));
        }

        if trimmed.contains(',') || trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let mut weeks = trimmed
                .split(',')
                .map(|token| parse_week(token).ok_or_else(|| fail("expected week numbers like 1,3,4")))
                .collect::<Result<Vec<_>>>()?;
            weeks.sort_unstable();
            weeks.dedup();
            return Ok(Self::Weeks(weeks));
        }

        if let Some((first, last)) = trimmed.split_once('-') {
            let (Some(first), Some(last)) = (parse_week(first), parse_week(last)) else {
                return Err(fail("expected a week span like 1-5"));
            };
            return Ok(Self::WeekSpan { first, last });
        }

        Err(fail("expected weeks (1,3,4), a span (1-5) or a date (dd/mm/yyyy)"))
    }

    /// Picks the configured range, honouring `update_lower_week`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RangeParse`] if the configured range is invalid.
    pub fn from_config(
        config: &SelectionConfig,
        calendar: &SemesterCalendar,
        today: NaiveDate,
    ) -> Result<Self> {
        if config.update_lower_week {
            return Ok(Self::WeekSpan {
                first: calendar.current_week(today),
                last: calendar.week_count(),
            });
        }
        Self::parse(&config.date_range)
    }

    /// Expands the expression into concrete dates. `today` is always included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RangeParse`] if a week lies outside the semester or a
    /// span is reversed.
    pub fn resolve(&self, calendar: &SemesterCalendar, today: NaiveDate) -> Result<DateSelection> {
        let check = |week: u8| {
            if (1..=calendar.week_count()).contains(&week) {
                Ok(week)
            } else {
                Err(Error::RangeParse {
                    input: self.to_string(),
                    reason: format!("week {week} is not between 1 and {}", calendar.week_count()),
                })
            }
        };

        let mut dates = BTreeSet::new();
        match self {
            Self::Weeks(weeks) => {
                for &week in weeks {
                    let (start, end) = calendar.week_window(check(week)?);
                    dates.extend(days_between(start, end));
                }
            }
            Self::WeekSpan { first, last } => {
                if first > last {
                    return Err(Error::RangeParse {
                        input: self.to_string(),
                        reason: "span ends before it starts".to_string(),
                    });
                }
                let (start, _) = calendar.week_window(check(*first)?);
                let (_, end) = calendar.week_window(check(*last)?);
                dates.extend(days_between(start, end));
            }
            Self::Since(start) => dates.extend(days_between(*start, today)),
        }

        Ok(DateSelection::new(dates, today))
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weeks(weeks) => {
                let list: Vec<String> = weeks.iter().map(ToString::to_string).collect();
                write!(f, "{}", list.join(","))
            }
            Self::WeekSpan { first, last } => write!(f, "{first}-{last}"),
            Self::Since(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

fn parse_week(token: &str) -> Option<u8> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// A non-empty set of dates whose recordings should be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSelection {
    dates: BTreeSet<NaiveDate>,
    today: NaiveDate,
}

impl DateSelection {
    /// Builds a selection from explicit dates; `today` is always added.
    #[must_use]
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Self {
        let mut dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        dates.insert(today);
        Self { dates, today }
    }

    /// Whether recordings captured on `date` are wanted.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// The earliest selected date.
    #[must_use]
    pub fn earliest(&self) -> NaiveDate {
        self.dates.first().copied().unwrap_or(self.today)
    }

    /// The latest selected date.
    #[must_use]
    pub fn latest(&self) -> NaiveDate {
        self.dates.last().copied().unwrap_or(self.today)
    }

    /// Number of selected dates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no date is selected. Never true, since today is always in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Iterates the selected dates in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}
