pub mod app;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod cycle;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod remote;
pub mod state;
pub mod storage;
pub mod ui;

pub use app::router;
pub use cache::{ActivityCache, ActivityCollection, KeyedView, Snapshot};
pub use config::{load_calendar_config, CalendarConfig, Category, Settings};
pub use coordinator::{ClickOutcome, DispatchMode, ToggleCoordinator};
pub use errors::{ApiError, AppError, ConfigError};
pub use models::{ActivityKey, DateRange, DayActivities};
pub use remote::{ActivityApi, HttpApi, LocalApi};
pub use state::AppState;
pub use storage::load_data;
