//! Turns calendar clicks into remote activity updates with optimistic edits.
//!
//! Every remote call follows the same lifecycle: snapshot and edit the cache
//! under one lock acquisition, issue the call, roll back and notify on
//! failure, then refetch the displayed range whatever the outcome.

use crate::cache::{ActivityCache, Snapshot};
use crate::config::{CalendarConfig, Category};
use crate::cycle::{plan_click, ClickPlan};
use crate::errors::ApiError;
use crate::models::{ActivityKey, DateRange, ToggleResponse};
use crate::notify::{Notice, Notifier};
use crate::remote::ActivityApi;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(50);

const FAILURE_MESSAGE: &str = "Failed to update activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One toggle per changed key. The second toggle of a click waits for the
    /// first to settle and for `step_delay` to pass since it was dispatched.
    Sequenced { step_delay: Duration },
    /// A single `select_option` call per click.
    Atomic,
}

impl Default for DispatchMode {
    fn default() -> Self {
        Self::Sequenced {
            step_delay: DEFAULT_STEP_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Applied,
    RolledBack,
    Ignored,
}

pub struct ToggleCoordinator<A> {
    api: Arc<A>,
    cache: Arc<Mutex<ActivityCache>>,
    config: Arc<CalendarConfig>,
    notifier: Arc<dyn Notifier>,
    mode: DispatchMode,
}

impl<A> Clone for ToggleCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
            notifier: Arc::clone(&self.notifier),
            mode: self.mode,
        }
    }
}

impl<A: ActivityApi + 'static> ToggleCoordinator<A> {
    pub fn new(
        api: Arc<A>,
        config: Arc<CalendarConfig>,
        cache: ActivityCache,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(cache)),
            config,
            notifier,
            mode: DispatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Shared handle for the view layer.
    pub fn cache(&self) -> Arc<Mutex<ActivityCache>> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Advances `category` on `date` one step from `current`.
    pub async fn click(
        &self,
        category: &Category,
        date: NaiveDate,
        current: Option<&ActivityKey>,
    ) -> ClickOutcome {
        let options = category.keys();
        let Some(plan) = plan_click(&options, current) else {
            warn!(category = %category.title, "click on category without options");
            return ClickOutcome::Ignored;
        };
        debug!(category = %category.title, %date, ?plan, "click");

        match self.mode {
            DispatchMode::Sequenced { step_delay } => {
                self.dispatch_sequenced(date, &plan, step_delay).await
            }
            DispatchMode::Atomic => self.dispatch_atomic(category, date, &plan).await,
        }
    }

    /// Like [`click`](Self::click), reading the current option from the cache.
    pub async fn click_category(&self, index: usize, date: NaiveDate) -> ClickOutcome {
        let Some(category) = self.config.category(index) else {
            warn!(index, "click on unknown category");
            return ClickOutcome::Ignored;
        };
        let options = category.keys();
        let current = self.cache.lock().await.active_option(date, &options).cloned();
        self.click(category, date, current.as_ref()).await
    }

    /// Runs [`click_category`](Self::click_category) in the background.
    pub fn spawn_click(&self, index: usize, date: NaiveDate) -> JoinHandle<ClickOutcome> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.click_category(index, date).await })
    }

    /// Refetches the displayed range. Returns whether the result was applied;
    /// it is dropped if the cache was edited or moved while fetching.
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        let ticket = {
            let mut cache = self.cache.lock().await;
            cache.invalidate();
            cache.begin_fetch()
        };
        let days = self.api.get_activities(ticket.range()).await?;
        Ok(self.cache.lock().await.complete_fetch(ticket, days))
    }

    /// Switches the displayed range and loads it.
    pub async fn navigate(&self, range: DateRange) -> Result<bool, ApiError> {
        self.cache.lock().await.set_range(range);
        self.refresh().await
    }

    async fn dispatch_sequenced(
        &self,
        date: NaiveDate,
        plan: &ClickPlan,
        step_delay: Duration,
    ) -> ClickOutcome {
        let dispatched = Instant::now();
        let mut toggles = plan.toggles();

        let Some(first) = toggles.next() else {
            return ClickOutcome::Ignored;
        };
        if self.toggle(date, first).await.is_err() {
            return ClickOutcome::RolledBack;
        }

        if let Some(second) = toggles.next() {
            sleep_until(dispatched + step_delay).await;
            if self.toggle(date, second).await.is_err() {
                return ClickOutcome::RolledBack;
            }
        }

        ClickOutcome::Applied
    }

    async fn dispatch_atomic(&self, category: &Category, date: NaiveDate, plan: &ClickPlan) -> ClickOutcome {
        let target = plan.target();
        let snapshot = {
            let mut cache = self.cache.lock().await;
            let snapshot = cache.snapshot();
            for option in &category.options {
                let wanted = target == Some(&option.key);
                if cache.is_active(date, &option.key) != wanted {
                    cache.apply_toggle(date, &option.key);
                }
            }
            snapshot
        };

        let result = self.api.select_option(date, &category.title, target).await;
        match self.settle(snapshot, result).await {
            Ok(()) => ClickOutcome::Applied,
            Err(_) => ClickOutcome::RolledBack,
        }
    }

    async fn toggle(&self, date: NaiveDate, key: &ActivityKey) -> Result<(), ApiError> {
        let snapshot = {
            let mut cache = self.cache.lock().await;
            let snapshot = cache.snapshot();
            let was_active = cache.apply_toggle(date, key);
            debug!(%date, activity = %key, was_active, "optimistic toggle");
            snapshot
        };

        let result = self.api.toggle_activity(date, key).await;
        self.settle(snapshot, result).await
    }

    async fn settle(
        &self,
        snapshot: Snapshot,
        result: Result<ToggleResponse, ApiError>,
    ) -> Result<(), ApiError> {
        let result = result.and_then(|response| {
            if response.success {
                Ok(())
            } else {
                Err(ApiError::Backend("update reported failure".into()))
            }
        });

        if let Err(err) = &result {
            warn!(error = %err, "activity update failed, rolling back");
            self.cache.lock().await.restore(&snapshot);
            self.notifier.notify(Notice {
                message: FAILURE_MESSAGE.to_string(),
                detail: err.to_string(),
            });
        }

        if let Err(err) = self.refresh().await {
            warn!(error = %err, "failed to refetch activities");
        }

        result
    }
}
