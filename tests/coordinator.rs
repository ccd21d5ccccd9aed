use async_trait::async_trait;
use chrono::NaiveDate;
use habit_calendar::coordinator::DEFAULT_STEP_DELAY;
use habit_calendar::models::ToggleResponse;
use habit_calendar::notify::{ChannelNotifier, Notice};
use habit_calendar::{
    ActivityApi, ActivityCache, ActivityKey, ApiError, AppState, CalendarConfig, Category,
    ClickOutcome, DateRange, DayActivities, DispatchMode, LocalApi, ToggleCoordinator,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedReceiver, Semaphore};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Toggle(ActivityKey),
    Select(Option<ActivityKey>),
}

/// In-process backend that records every write, can fail chosen keys and can
/// hold writes until the test releases them.
struct RecordingApi {
    inner: LocalApi,
    calls: Mutex<Vec<(Call, Instant)>>,
    failing: Mutex<Vec<ActivityKey>>,
    gate: Semaphore,
}

impl RecordingApi {
    fn new(state: AppState) -> Self {
        Self::with_permits(state, Semaphore::MAX_PERMITS)
    }

    fn gated(state: AppState) -> Self {
        Self::with_permits(state, 0)
    }

    fn with_permits(state: AppState, permits: usize) -> Self {
        Self {
            inner: LocalApi::new(state),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            gate: Semaphore::new(permits),
        }
    }

    fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().push(key.into());
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(call, _)| call.clone()).collect()
    }

    fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }

    async fn enter(&self, call: Call, key: Option<&ActivityKey>) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push((call, Instant::now()));
        self.gate.acquire().await.expect("gate closed").forget();
        let fail = key.is_some_and(|key| self.failing.lock().unwrap().contains(key));
        if fail {
            return Err(ApiError::Backend("store unavailable".into()));
        }
        Ok(())
    }

    async fn active(&self, date: NaiveDate) -> Vec<ActivityKey> {
        let range = DateRange::new(date, date).unwrap();
        self.inner
            .state()
            .get_activities(range)
            .await
            .into_iter()
            .flat_map(|day| day.active)
            .collect()
    }
}

#[async_trait]
impl ActivityApi for RecordingApi {
    async fn get_activities(&self, range: DateRange) -> Result<Vec<DayActivities>, ApiError> {
        self.inner.get_activities(range).await
    }

    async fn toggle_activity(
        &self,
        date: NaiveDate,
        key: &ActivityKey,
    ) -> Result<ToggleResponse, ApiError> {
        self.enter(Call::Toggle(key.clone()), Some(key)).await?;
        self.inner.toggle_activity(date, key).await
    }

    async fn select_option(
        &self,
        date: NaiveDate,
        category: &str,
        option: Option<&ActivityKey>,
    ) -> Result<ToggleResponse, ApiError> {
        self.enter(Call::Select(option.cloned()), option).await?;
        self.inner.select_option(date, category, option).await
    }
}

fn date(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

fn january() -> DateRange {
    DateRange::month(2024, 1).unwrap()
}

async fn seeded_state(rows: &[(&str, &str)]) -> AppState {
    let state = AppState::in_memory(CalendarConfig::default());
    for (day, key) in rows {
        state.toggle_activity(date(day), &(*key).into()).await.unwrap();
    }
    state
}

async fn coordinator_for(
    api: RecordingApi,
) -> (
    ToggleCoordinator<RecordingApi>,
    Arc<RecordingApi>,
    UnboundedReceiver<Notice>,
) {
    let api = Arc::new(api);
    let config = Arc::new(CalendarConfig::default());
    let days = api.get_activities(january()).await.unwrap();
    let cache = ActivityCache::with_initial(config.vocabulary().clone(), january(), days);
    let (notifier, notices) = ChannelNotifier::new();
    let coordinator = ToggleCoordinator::new(Arc::clone(&api), config, cache, Arc::new(notifier));
    (coordinator, api, notices)
}

async fn wait_for_calls(api: &RecordingApi, count: usize) {
    for _ in 0..1000 {
        if api.calls().len() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {count} calls, saw {:?}", api.calls());
}

async fn cached_option(coordinator: &ToggleCoordinator<RecordingApi>, day: NaiveDate) -> Option<ActivityKey> {
    let options = coordinator.config().categories()[0].keys();
    coordinator
        .cache()
        .lock()
        .await
        .active_option(day, &options)
        .cloned()
}

#[tokio::test(start_paused = true)]
async fn clicks_cycle_through_options_and_back_to_none() {
    let (coordinator, api, _notices) = coordinator_for(RecordingApi::new(seeded_state(&[]).await)).await;
    let day = date("2024-01-10");

    let expected = [Some("run"), Some("gym"), Some("yoga"), None, Some("run")];
    for step in expected {
        assert_eq!(coordinator.click_category(0, day).await, ClickOutcome::Applied);
        let expected_key = step.map(ActivityKey::from);
        assert_eq!(cached_option(&coordinator, day).await, expected_key);
        assert_eq!(api.active(day).await, expected_key.into_iter().collect::<Vec<_>>());
    }

    assert_eq!(
        api.calls(),
        vec![
            Call::Toggle("run".into()),
            Call::Toggle("run".into()),
            Call::Toggle("gym".into()),
            Call::Toggle("gym".into()),
            Call::Toggle("yoga".into()),
            Call::Toggle("yoga".into()),
            Call::Toggle("run".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn second_toggle_is_not_issued_before_step_delay() {
    let state = seeded_state(&[("2024-01-10", "run")]).await;
    let (coordinator, api, _notices) = coordinator_for(RecordingApi::gated(state)).await;

    let handle = coordinator.spawn_click(0, date("2024-01-10"));
    wait_for_calls(&api, 1).await;
    assert_eq!(api.calls(), vec![Call::Toggle("run".into())]);
    assert_eq!(cached_option(&coordinator, date("2024-01-10")).await, None);

    api.release();
    tokio::time::advance(Duration::from_millis(40)).await;
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(api.calls().len(), 1);

    tokio::time::advance(Duration::from_millis(10)).await;
    wait_for_calls(&api, 2).await;
    api.release();
    assert_eq!(handle.await.unwrap(), ClickOutcome::Applied);

    let calls = api.timed_calls();
    assert_eq!(calls[1].0, Call::Toggle("gym".into()));
    assert!(calls[1].1 - calls[0].1 >= DEFAULT_STEP_DELAY);
    assert_eq!(api.active(date("2024-01-10")).await, vec![ActivityKey::from("gym")]);
}

#[tokio::test(start_paused = true)]
async fn optimistic_edit_is_visible_before_settlement() {
    let (coordinator, api, _notices) = coordinator_for(RecordingApi::gated(seeded_state(&[]).await)).await;
    let day = date("2024-01-03");

    let handle = coordinator.spawn_click(0, day);
    wait_for_calls(&api, 1).await;
    assert_eq!(cached_option(&coordinator, day).await, Some("run".into()));
    assert!(api.active(day).await.is_empty());

    api.release();
    assert_eq!(handle.await.unwrap(), ClickOutcome::Applied);
    assert_eq!(api.active(day).await, vec![ActivityKey::from("run")]);
}

#[tokio::test(start_paused = true)]
async fn failed_toggle_rolls_back_and_notifies() {
    let api = RecordingApi::gated(seeded_state(&[("2024-01-02", "read")]).await);
    api.fail_on("run");
    let (coordinator, api, mut notices) = coordinator_for(api).await;
    let day = date("2024-01-05");
    let elsewhere = date("2024-01-20");

    let handle = coordinator.spawn_click(0, day);
    wait_for_calls(&api, 1).await;
    assert_eq!(cached_option(&coordinator, day).await, Some("run".into()));

    // Written behind the cache's back while the click is in flight.
    api.inner
        .state()
        .toggle_activity(elsewhere, &"read".into())
        .await
        .unwrap();

    api.release();
    assert_eq!(handle.await.unwrap(), ClickOutcome::RolledBack);

    {
        let cache = coordinator.cache();
        let cache = cache.lock().await;
        assert!(!cache.is_stale());
        assert!(!cache.is_active(day, &"run".into()));
        assert!(cache.is_active(date("2024-01-02"), &"read".into()));
        assert!(cache.is_active(elsewhere, &"read".into()));
    }
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.message, "Failed to update activity");
    assert!(notice.detail.contains("store unavailable"));
    assert!(api.active(day).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_deactivation_skips_activation() {
    let api = RecordingApi::new(seeded_state(&[("2024-01-07", "run")]).await);
    api.fail_on("run");
    let (coordinator, api, mut notices) = coordinator_for(api).await;
    let day = date("2024-01-07");

    assert_eq!(coordinator.click_category(0, day).await, ClickOutcome::RolledBack);
    assert_eq!(api.calls(), vec![Call::Toggle("run".into())]);
    assert_eq!(cached_option(&coordinator, day).await, Some("run".into()));
    assert_eq!(api.active(day).await, vec![ActivityKey::from("run")]);
    assert!(notices.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn unknown_activity_is_rejected_and_rolled_back() {
    let api = Arc::new(RecordingApi::new(seeded_state(&[]).await));
    let swimming = Category {
        title: "Swimming".into(),
        options: vec![habit_calendar::config::ActivityOption {
            key: "swim".into(),
            label: "Swim".into(),
        }],
    };
    let config = Arc::new(CalendarConfig::default());
    let cache = ActivityCache::new(config.vocabulary().clone(), january());
    let (notifier, mut notices) = ChannelNotifier::new();
    let coordinator = ToggleCoordinator::new(Arc::clone(&api), config, cache, Arc::new(notifier));
    let day = date("2024-01-09");

    let outcome = coordinator.click(&swimming, day, None).await;
    assert_eq!(outcome, ClickOutcome::RolledBack);
    assert!(!coordinator.cache().lock().await.is_active(day, &"swim".into()));
    let notice = notices.try_recv().unwrap();
    assert!(notice.detail.contains("Invalid activity: swim"));
}

#[tokio::test(start_paused = true)]
async fn atomic_mode_issues_one_select_per_click() {
    let state = seeded_state(&[("2024-01-12", "gym")]).await;
    let (coordinator, api, _notices) = coordinator_for(RecordingApi::new(state)).await;
    let coordinator = coordinator.with_mode(DispatchMode::Atomic);
    let day = date("2024-01-12");

    assert_eq!(coordinator.click_category(0, day).await, ClickOutcome::Applied);
    assert_eq!(coordinator.click_category(0, day).await, ClickOutcome::Applied);

    assert_eq!(
        api.calls(),
        vec![Call::Select(Some("yoga".into())), Call::Select(None)]
    );
    assert!(api.active(day).await.is_empty());
    assert_eq!(cached_option(&coordinator, day).await, None);
}

#[tokio::test(start_paused = true)]
async fn atomic_failure_restores_previous_option() {
    let api = RecordingApi::new(seeded_state(&[("2024-01-12", "run")]).await);
    api.fail_on("gym");
    let (coordinator, api, mut notices) = coordinator_for(api).await;
    let coordinator = coordinator.with_mode(DispatchMode::Atomic);
    let day = date("2024-01-12");

    assert_eq!(coordinator.click_category(0, day).await, ClickOutcome::RolledBack);
    assert_eq!(cached_option(&coordinator, day).await, Some("run".into()));
    assert_eq!(api.active(day).await, vec![ActivityKey::from("run")]);
    assert!(notices.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn at_most_one_option_active_per_category() {
    let (coordinator, api, _notices) = coordinator_for(RecordingApi::new(seeded_state(&[]).await)).await;
    let config = CalendarConfig::default();
    let days = [date("2024-01-01"), date("2024-01-02"), date("2024-01-31")];

    for step in 0..24usize {
        let index = step % config.categories().len();
        let day = days[(step * 7) % days.len()];
        coordinator.click_category(index, day).await;

        for day in days {
            let active = api.active(day).await;
            for category in config.categories() {
                let count = active.iter().filter(|key| category.contains(key)).count();
                assert!(count <= 1, "{} has {count} active options on {day}", category.title);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn navigate_loads_the_new_month() {
    let state = seeded_state(&[("2024-02-14", "read"), ("2024-01-14", "run")]).await;
    let (coordinator, _api, _notices) = coordinator_for(RecordingApi::new(state)).await;
    let february = DateRange::month(2024, 2).unwrap();

    assert!(coordinator.navigate(february).await.unwrap());

    let cache = coordinator.cache();
    let cache = cache.lock().await;
    assert_eq!(cache.range(), february);
    assert!(!cache.is_stale());
    assert!(cache.keyed_view().is_active(&"read".into(), date("2024-02-14")));
    assert!(cache.keyed_view().dates(&"run".into()).is_empty());
}
