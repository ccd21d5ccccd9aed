use crate::cache::ActivityCollection;
use crate::config::CalendarConfig;
use crate::cycle::next_state;
use crate::errors::AppError;
use crate::models::{
    ClickForm, DateRange, DayActivities, PageQuery, RangeQuery, SelectRequest, ToggleRequest,
    ToggleResponse,
};
use crate::state::AppState;
use crate::ui::render_index;
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{Local, NaiveDate};

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let today = today();
    let range = match query.month.as_deref() {
        Some(month) => DateRange::parse_month(month)
            .ok_or_else(|| AppError::bad_request("month must be YYYY-MM"))?,
        None => month_of(today)?,
    };

    let days = state.get_activities(range).await;
    let keyed = ActivityCollection::from_days(days).keyed(state.config.vocabulary());
    Ok(Html(render_index(&state.config, range, &keyed, today)))
}

/// Form fallback for the page: advances the clicked category one step.
pub async fn click(
    State(state): State<AppState>,
    Form(form): Form<ClickForm>,
) -> Result<Redirect, AppError> {
    let category = state
        .config
        .category(form.category)
        .ok_or_else(|| AppError::bad_request("unknown category"))?;

    let current = state
        .data
        .lock()
        .await
        .active_option(form.date, category)
        .cloned();
    let next = next_state(&category.keys(), current.as_ref());
    state
        .select_option(form.date, &category.title, next.as_ref())
        .await?;

    let range = match form.month.as_deref().and_then(DateRange::parse_month) {
        Some(range) => range,
        None => month_of(form.date)?,
    };
    Ok(Redirect::to(&format!("/?month={}", range.month_param())))
}

pub async fn get_config(State(state): State<AppState>) -> Json<CalendarConfig> {
    Json(state.config.as_ref().clone())
}

pub async fn get_activities(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<DayActivities>>, AppError> {
    let range = DateRange::new(query.start_date, query.end_date)
        .ok_or_else(|| AppError::bad_request("start_date must not be after end_date"))?;
    Ok(Json(state.get_activities(range).await))
}

pub async fn toggle_activity(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let response = state.toggle_activity(payload.date, &payload.activity).await?;
    Ok(Json(response))
}

pub async fn select_option(
    State(state): State<AppState>,
    Json(payload): Json<SelectRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let response = state
        .select_option(payload.date, &payload.category, payload.activity.as_ref())
        .await?;
    Ok(Json(response))
}

fn month_of(date: NaiveDate) -> Result<DateRange, AppError> {
    DateRange::containing(date).ok_or_else(|| AppError::bad_request("date out of range"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
