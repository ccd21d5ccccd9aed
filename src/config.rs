//! Calendar categories, the activity vocabulary derived from them, and
//! process settings read from the environment.

use crate::errors::ConfigError;
use crate::models::ActivityKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::info;

/// Field name of the date in the flat wire record; cannot double as a key.
const RESERVED_KEY: &str = "date";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityOption {
    pub key: ActivityKey,
    pub label: String,
}

/// A group of mutually exclusive options shown as one calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    pub options: Vec<ActivityOption>,
}

impl Category {
    pub fn keys(&self) -> Vec<ActivityKey> {
        self.options.iter().map(|option| option.key.clone()).collect()
    }

    pub fn contains(&self, key: &ActivityKey) -> bool {
        self.options.iter().any(|option| &option.key == key)
    }

    pub fn label_of(&self, key: &ActivityKey) -> Option<&str> {
        self.options
            .iter()
            .find(|option| &option.key == key)
            .map(|option| option.label.as_str())
    }
}

/// Every option key across all categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary(BTreeSet<ActivityKey>);

impl Vocabulary {
    pub fn contains(&self, key: &ActivityKey) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ActivityKey> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = ActivityKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarConfig {
    categories: Vec<Category>,
    #[serde(skip)]
    vocabulary: Vocabulary,
}

#[derive(Deserialize)]
struct ConfigFile {
    categories: Vec<Category>,
}

impl CalendarConfig {
    pub fn new(categories: Vec<Category>) -> Result<Self, ConfigError> {
        if categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".into()));
        }

        let mut titles = BTreeSet::new();
        let mut keys = BTreeSet::new();
        for category in &categories {
            if !titles.insert(category.title.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category title '{}'",
                    category.title
                )));
            }
            if category.options.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has no options",
                    category.title
                )));
            }
            for option in &category.options {
                if option.key.as_str().trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category '{}' has an empty option key",
                        category.title
                    )));
                }
                if option.key.as_str() == RESERVED_KEY {
                    return Err(ConfigError::Invalid(format!(
                        "activity key '{RESERVED_KEY}' is reserved for the record date"
                    )));
                }
                if !keys.insert(option.key.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "activity key '{}' is used more than once",
                        option.key
                    )));
                }
            }
        }

        Ok(Self {
            categories,
            vocabulary: Vocabulary(keys),
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_slice(bytes)?;
        Self::new(file.categories)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, index: usize) -> Option<&Category> {
        self.categories.get(index)
    }

    pub fn category_by_title(&self, title: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.title == title)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let category = |title: &str, options: &[(&str, &str)]| Category {
            title: title.to_string(),
            options: options
                .iter()
                .map(|(key, label)| ActivityOption {
                    key: ActivityKey::from(*key),
                    label: label.to_string(),
                })
                .collect(),
        };

        let categories = vec![
            category("Exercise", &[("run", "Run"), ("gym", "Gym"), ("yoga", "Yoga")]),
            category("Reading", &[("read", "Book"), ("audiobook", "Audiobook")]),
            category("Sleep", &[("sleep_early", "Early"), ("sleep_late", "Late")]),
        ];

        let vocabulary = categories
            .iter()
            .flat_map(|category| category.keys())
            .collect();
        Self {
            categories,
            vocabulary,
        }
    }
}

/// Loads the category file if one is configured, otherwise the built-in set.
pub async fn load_calendar_config(path: Option<&Path>) -> Result<CalendarConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(CalendarConfig::default());
    };

    let bytes = fs::read(path).await?;
    let config = CalendarConfig::from_json(&bytes)?;
    info!(
        "loaded {} categories from {}",
        config.categories().len(),
        path.display()
    );
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub data_path: PathBuf,
    pub calendars_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        Self {
            port,
            data_path: resolve_data_path(),
            calendars_path: env::var("APP_CALENDARS_PATH").ok().map(PathBuf::from),
        }
    }
}

pub fn resolve_data_path() -> PathBuf {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from("data/activities.json")
}
