//! Remote operations the client side consumes, independent of transport.

use crate::errors::ApiError;
use crate::models::{ActivityKey, DateRange, DayActivities, SelectRequest, ToggleRequest, ToggleResponse};
use crate::state::AppState;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[async_trait]
pub trait ActivityApi: Send + Sync {
    /// Presence records with `start <= date <= end`, grouped per date.
    async fn get_activities(&self, range: DateRange) -> Result<Vec<DayActivities>, ApiError>;

    /// Flips presence of exactly one `(date, key)` pair.
    async fn toggle_activity(
        &self,
        date: NaiveDate,
        key: &ActivityKey,
    ) -> Result<ToggleResponse, ApiError>;

    /// Sets the single active option of `category` on `date` in one step.
    async fn select_option(
        &self,
        date: NaiveDate,
        category: &str,
        option: Option<&ActivityKey>,
    ) -> Result<ToggleResponse, ApiError>;
}

/// Talks to the HTTP routes served by this crate's binary.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl ActivityApi for HttpApi {
    async fn get_activities(&self, range: DateRange) -> Result<Vec<DayActivities>, ApiError> {
        let response = self
            .client
            .get(self.url("/api/activities"))
            .query(&[
                ("start_date", range.start().to_string()),
                ("end_date", range.end().to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    async fn toggle_activity(
        &self,
        date: NaiveDate,
        key: &ActivityKey,
    ) -> Result<ToggleResponse, ApiError> {
        let request = ToggleRequest {
            date,
            activity: key.clone(),
        };
        let response = self
            .client
            .post(self.url("/api/activities/toggle"))
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    async fn select_option(
        &self,
        date: NaiveDate,
        category: &str,
        option: Option<&ActivityKey>,
    ) -> Result<ToggleResponse, ApiError> {
        let request = SelectRequest {
            date,
            category: category.to_string(),
            activity: option.cloned(),
        };
        let response = self
            .client
            .post(self.url("/api/activities/select"))
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }
}

/// Calls the backend state directly, without a transport.
#[derive(Clone)]
pub struct LocalApi {
    state: AppState,
}

impl LocalApi {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

#[async_trait]
impl ActivityApi for LocalApi {
    async fn get_activities(&self, range: DateRange) -> Result<Vec<DayActivities>, ApiError> {
        Ok(self.state.get_activities(range).await)
    }

    async fn toggle_activity(
        &self,
        date: NaiveDate,
        key: &ActivityKey,
    ) -> Result<ToggleResponse, ApiError> {
        Ok(self.state.toggle_activity(date, key).await?)
    }

    async fn select_option(
        &self,
        date: NaiveDate,
        category: &str,
        option: Option<&ActivityKey>,
    ) -> Result<ToggleResponse, ApiError> {
        Ok(self.state.select_option(date, category, option).await?)
    }
}
