use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of one trackable behaviour, e.g. `run`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityKey(String);

impl ActivityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Inclusive calendar range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// First to last day of the given month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_start = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Self::new(start, next_start.pred_opt()?)
    }

    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::month(date.year(), date.month())
    }

    /// Parses `YYYY-MM`.
    pub fn parse_month(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        Self::month(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn previous_month(&self) -> Option<Self> {
        Self::containing(self.start.pred_opt()?)
    }

    pub fn next_month(&self) -> Option<Self> {
        Self::containing(self.end.succ_opt()?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|day| *day <= self.end)
    }

    /// `Jan 2024`
    pub fn label(&self) -> String {
        self.start.format("%b %Y").to_string()
    }

    /// `2024-01`
    pub fn month_param(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }
}

/// Active activity keys for one date.
///
/// On the wire this is the flat record `{"date": "2024-01-01", "run": 1, "read": 1}`.
/// Keys carrying `0` are read as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireDay", from = "WireDay")]
pub struct DayActivities {
    pub date: NaiveDate,
    pub active: BTreeSet<ActivityKey>,
}

impl DayActivities {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            active: BTreeSet::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireDay {
    date: NaiveDate,
    #[serde(flatten)]
    values: BTreeMap<String, u8>,
}

impl From<DayActivities> for WireDay {
    fn from(day: DayActivities) -> Self {
        Self {
            date: day.date,
            values: day.active.into_iter().map(|key| (key.0, 1)).collect(),
        }
    }
}

impl From<WireDay> for DayActivities {
    fn from(wire: WireDay) -> Self {
        Self {
            date: wire.date,
            active: wire
                .values
                .into_iter()
                .filter(|(_, value)| *value == 1)
                .map(|(key, _)| ActivityKey(key))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub date: NaiveDate,
    pub activity: ActivityKey,
}

/// Sets the active option of one category on one date; `None` clears it.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectRequest {
    pub date: NaiveDate,
    pub category: String,
    pub activity: Option<ActivityKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickForm {
    pub date: NaiveDate,
    pub category: usize,
    pub month: Option<String>,
}
