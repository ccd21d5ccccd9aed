use crate::config::CalendarConfig;
use crate::errors::AppError;
use crate::models::{ActivityKey, DateRange, DayActivities, ToggleResponse};
use crate::storage::{persist_data, ActivityTable};
use chrono::NaiveDate;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

/// Backend state: the activity table plus the configuration that validates writes.
///
/// `data_path == None` keeps the table in memory only.
#[derive(Clone)]
pub struct AppState {
    pub data_path: Option<PathBuf>,
    pub config: Arc<CalendarConfig>,
    pub data: Arc<Mutex<ActivityTable>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, config: CalendarConfig, data: ActivityTable) -> Self {
        Self {
            data_path: Some(data_path),
            config: Arc::new(config),
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn in_memory(config: CalendarConfig) -> Self {
        Self {
            data_path: None,
            config: Arc::new(config),
            data: Arc::new(Mutex::new(ActivityTable::default())),
        }
    }

    pub async fn get_activities(&self, range: DateRange) -> Vec<DayActivities> {
        self.data.lock().await.activities_in(range)
    }

    pub async fn toggle_activity(
        &self,
        date: NaiveDate,
        key: &ActivityKey,
    ) -> Result<ToggleResponse, AppError> {
        if !self.config.vocabulary().contains(key) {
            return Err(AppError::bad_request(format!("Invalid activity: {key}")));
        }

        let mut data = self.data.lock().await;
        let present = data.toggle(date, key);
        if let Err(err) = self.persist(&data).await {
            data.toggle(date, key);
            return Err(err);
        }

        debug!(%date, activity = %key, present, "toggled activity");
        Ok(ToggleResponse { success: true })
    }

    /// Makes `option` the only active option of `category` on `date`.
    pub async fn select_option(
        &self,
        date: NaiveDate,
        category: &str,
        option: Option<&ActivityKey>,
    ) -> Result<ToggleResponse, AppError> {
        let Some(category) = self.config.category_by_title(category) else {
            return Err(AppError::bad_request(format!("Unknown category: {category}")));
        };
        if let Some(key) = option {
            if !category.contains(key) {
                return Err(AppError::bad_request(format!(
                    "Invalid activity for {}: {key}",
                    category.title
                )));
            }
        }

        let mut data = self.data.lock().await;
        let prior = data.select(date, category, option);
        if let Err(err) = self.persist(&data).await {
            data.restore_options(date, category, &prior);
            return Err(err);
        }

        debug!(%date, category = %category.title, ?option, "selected option");
        Ok(ToggleResponse { success: true })
    }

    async fn persist(&self, data: &ActivityTable) -> Result<(), AppError> {
        match &self.data_path {
            Some(path) => persist_data(path, data).await,
            None => Ok(()),
        }
    }
}
