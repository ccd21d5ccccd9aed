//! Client-side view of activity presence for the displayed date range.
//!
//! The view is shared copy-on-write, so a snapshot is a reference-count bump
//! and the first optimistic edit after a snapshot pays for the clone.

use crate::config::Vocabulary;
use crate::models::{ActivityKey, DateRange, DayActivities};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

static NO_DATES: BTreeSet<NaiveDate> = BTreeSet::new();

/// Active keys per date. Dates with nothing active are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityCollection {
    days: BTreeMap<NaiveDate, BTreeSet<ActivityKey>>,
}

impl ActivityCollection {
    pub fn from_days(days: impl IntoIterator<Item = DayActivities>) -> Self {
        let mut collection = Self::default();
        for day in days {
            if !day.active.is_empty() {
                collection.days.entry(day.date).or_default().extend(day.active);
            }
        }
        collection
    }

    pub fn is_active(&self, date: NaiveDate, key: &ActivityKey) -> bool {
        self.days.get(&date).is_some_and(|keys| keys.contains(key))
    }

    pub fn active_on(&self, date: NaiveDate) -> impl Iterator<Item = &ActivityKey> {
        self.days.get(&date).into_iter().flatten()
    }

    pub fn to_days(&self) -> Vec<DayActivities> {
        self.days
            .iter()
            .map(|(date, keys)| DayActivities {
                date: *date,
                active: keys.clone(),
            })
            .collect()
    }

    /// Per-key view with an entry for every vocabulary key.
    pub fn keyed(&self, vocabulary: &Vocabulary) -> KeyedView {
        let mut by_key: BTreeMap<ActivityKey, BTreeSet<NaiveDate>> = vocabulary
            .iter()
            .map(|key| (key.clone(), BTreeSet::new()))
            .collect();

        for (date, keys) in &self.days {
            for key in keys {
                if let Some(dates) = by_key.get_mut(key) {
                    dates.insert(*date);
                }
            }
        }

        KeyedView(by_key)
    }

    fn toggle(&mut self, date: NaiveDate, key: &ActivityKey) -> bool {
        let keys = self.days.entry(date).or_default();
        let was_active = !keys.insert(key.clone());
        if was_active {
            keys.remove(key);
            if keys.is_empty() {
                self.days.remove(&date);
            }
        }
        was_active
    }
}

/// Activity key -> dates on which it is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedView(BTreeMap<ActivityKey, BTreeSet<NaiveDate>>);

impl KeyedView {
    pub fn dates(&self, key: &ActivityKey) -> &BTreeSet<NaiveDate> {
        self.0.get(key).unwrap_or(&NO_DATES)
    }

    pub fn is_active(&self, key: &ActivityKey, date: NaiveDate) -> bool {
        self.dates(key).contains(&date)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ActivityKey> {
        self.0.keys()
    }
}

/// Immutable copy of the cache taken before an optimistic edit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    range: DateRange,
    version: u64,
    view: Arc<ActivityCollection>,
}

impl Snapshot {
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn view(&self) -> &ActivityCollection {
        &self.view
    }
}

/// Issued when a fetch starts; the result is only applied if the cache has
/// not moved on in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    range: DateRange,
    version: u64,
}

impl FetchTicket {
    pub fn range(&self) -> DateRange {
        self.range
    }
}

#[derive(Debug)]
pub struct ActivityCache {
    vocabulary: Vocabulary,
    range: DateRange,
    view: Arc<ActivityCollection>,
    version: u64,
    stale: bool,
}

impl ActivityCache {
    /// Empty, stale cache for `range`.
    pub fn new(vocabulary: Vocabulary, range: DateRange) -> Self {
        Self {
            vocabulary,
            range,
            view: Arc::default(),
            version: 0,
            stale: true,
        }
    }

    /// Cache seeded with data fetched ahead of time, e.g. at page render.
    pub fn with_initial(vocabulary: Vocabulary, range: DateRange, days: Vec<DayActivities>) -> Self {
        Self {
            vocabulary,
            range,
            view: Arc::new(ActivityCollection::from_days(days)),
            version: 0,
            stale: false,
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn view(&self) -> &ActivityCollection {
        &self.view
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn is_active(&self, date: NaiveDate, key: &ActivityKey) -> bool {
        self.view.is_active(date, key)
    }

    /// First of `options` active on `date`.
    pub fn active_option<'o>(&self, date: NaiveDate, options: &'o [ActivityKey]) -> Option<&'o ActivityKey> {
        options.iter().find(|key| self.view.is_active(date, key))
    }

    pub fn keyed_view(&self) -> KeyedView {
        self.view.keyed(&self.vocabulary)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            range: self.range,
            version: self.version,
            view: Arc::clone(&self.view),
        }
    }

    /// Flips presence of `(date, key)` in place and returns the prior presence.
    pub fn apply_toggle(&mut self, date: NaiveDate, key: &ActivityKey) -> bool {
        let was_active = Arc::make_mut(&mut self.view).toggle(date, key);
        self.version += 1;
        was_active
    }

    pub fn replace(&mut self, view: ActivityCollection) {
        self.view = Arc::new(view);
        self.version += 1;
        self.stale = false;
    }

    /// Rolls back to `snapshot`. Snapshots of a range that is no longer shown
    /// are ignored and `false` is returned.
    pub fn restore(&mut self, snapshot: &Snapshot) -> bool {
        if snapshot.range != self.range {
            debug!(range = ?snapshot.range, "ignoring snapshot of abandoned range");
            return false;
        }
        self.view = Arc::clone(&snapshot.view);
        self.version += 1;
        true
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Switches to another range, abandoning the current view and any
    /// fetches or snapshots taken for it.
    pub fn set_range(&mut self, range: DateRange) {
        if range == self.range {
            return;
        }
        self.range = range;
        self.view = Arc::default();
        self.version += 1;
        self.stale = true;
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket {
            range: self.range,
            version: self.version,
        }
    }

    /// Applies a fetch result unless the range changed or an edit landed
    /// after the ticket was issued.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, days: Vec<DayActivities>) -> bool {
        if ticket != self.begin_fetch() {
            debug!(
                ticket_version = ticket.version,
                version = self.version,
                "discarding outdated fetch result"
            );
            return false;
        }
        self.replace(ActivityCollection::from_days(days));
        true
    }
}
