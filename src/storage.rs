use crate::config::Category;
use crate::errors::AppError;
use crate::models::{ActivityKey, DateRange, DayActivities};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::fs;
use tracing::error;

/// One stored presence row. Only `value == 1` rows exist; absence is the false state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub date: NaiveDate,
    pub activity_key: ActivityKey,
    pub value: u8,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredData {
    activities: Vec<ActivityRow>,
}

/// Authoritative `(date, activity key) -> presence` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTable {
    rows: BTreeSet<(NaiveDate, ActivityKey)>,
}

impl ActivityTable {
    pub fn from_rows(rows: impl IntoIterator<Item = ActivityRow>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .filter(|row| row.value == 1)
                .map(|row| (row.date, row.activity_key))
                .collect(),
        }
    }

    pub fn rows(&self) -> Vec<ActivityRow> {
        self.rows
            .iter()
            .map(|(date, key)| ActivityRow {
                date: *date,
                activity_key: key.clone(),
                value: 1,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_present(&self, date: NaiveDate, key: &ActivityKey) -> bool {
        self.rows.contains(&(date, key.clone()))
    }

    /// Deletes the row if present, inserts it otherwise. Returns the new presence.
    pub fn toggle(&mut self, date: NaiveDate, key: &ActivityKey) -> bool {
        let row = (date, key.clone());
        if self.rows.remove(&row) {
            false
        } else {
            self.rows.insert(row);
            true
        }
    }

    /// Rows inside `range`, grouped per date. Dates without rows are omitted.
    pub fn activities_in(&self, range: DateRange) -> Vec<DayActivities> {
        let lower = (range.start(), ActivityKey::new(String::new()));
        let mut grouped: BTreeMap<NaiveDate, DayActivities> = BTreeMap::new();

        for (date, key) in self
            .rows
            .range(lower..)
            .take_while(|(date, _)| *date <= range.end())
        {
            grouped
                .entry(*date)
                .or_insert_with(|| DayActivities::new(*date))
                .active
                .insert(key.clone());
        }

        grouped.into_values().collect()
    }

    /// First option of `category` present on `date`.
    pub fn active_option<'c>(
        &self,
        date: NaiveDate,
        category: &'c Category,
    ) -> Option<&'c ActivityKey> {
        category
            .options
            .iter()
            .map(|option| &option.key)
            .find(|key| self.is_present(date, key))
    }

    /// Clears every option of `category` on `date`, then activates `option`.
    /// Returns the options that were present before, for [`restore_options`](Self::restore_options).
    pub fn select(
        &mut self,
        date: NaiveDate,
        category: &Category,
        option: Option<&ActivityKey>,
    ) -> Vec<ActivityKey> {
        let prior = self.clear_options(date, category);
        if let Some(key) = option {
            self.rows.insert((date, key.clone()));
        }
        prior
    }

    /// Puts back exactly `prior` as the options of `category` on `date`.
    pub fn restore_options(&mut self, date: NaiveDate, category: &Category, prior: &[ActivityKey]) {
        self.clear_options(date, category);
        for key in prior {
            self.rows.insert((date, key.clone()));
        }
    }

    fn clear_options(&mut self, date: NaiveDate, category: &Category) -> Vec<ActivityKey> {
        category
            .options
            .iter()
            .filter(|option| self.rows.remove(&(date, option.key.clone())))
            .map(|option| option.key.clone())
            .collect()
    }
}

pub async fn load_data(path: &Path) -> ActivityTable {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<StoredData>(&bytes) {
            Ok(data) => ActivityTable::from_rows(data.activities),
            Err(err) => {
                error!("failed to parse data file: {err}");
                ActivityTable::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => ActivityTable::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            ActivityTable::default()
        }
    }
}

pub async fn persist_data(path: &Path, table: &ActivityTable) -> Result<(), AppError> {
    let data = StoredData {
        activities: table.rows(),
    };
    let payload = serde_json::to_vec_pretty(&data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
