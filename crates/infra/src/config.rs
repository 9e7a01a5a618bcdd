//! Mapper configuration.

use tracing::warn;

/// Runtime knobs shared by repositories, the unit of work and the bundled
/// in-memory data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Name for logging.
    pub name: String,
    /// Whether `refresh` runs the PreLoad -> hydrate -> PostLoad cycle.
    pub refresh_fires_load_events: bool,
    /// Largest `limit` the in-memory data source accepts.
    pub max_page_size: Option<usize>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            name: "objmap".to_string(),
            refresh_fires_load_events: true,
            max_page_size: None,
        }
    }
}

impl MapperConfig {
    pub const ENV_NAME: &'static str = "OBJMAP_NAME";
    pub const ENV_REFRESH_LOAD_EVENTS: &'static str = "OBJMAP_REFRESH_LOAD_EVENTS";
    pub const ENV_MAX_PAGE_SIZE: &'static str = "OBJMAP_MAX_PAGE_SIZE";

    /// Defaults overridden by `OBJMAP_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup(Self::ENV_NAME).filter(|n| !n.trim().is_empty()) {
            config.name = name;
        }

        if let Some(raw) = lookup(Self::ENV_REFRESH_LOAD_EVENTS) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.refresh_fires_load_events = true,
                "0" | "false" | "no" | "off" => config.refresh_fires_load_events = false,
                other => warn!(
                    key = Self::ENV_REFRESH_LOAD_EVENTS,
                    value = other,
                    "ignoring unrecognised boolean"
                ),
            }
        }

        if let Some(raw) = lookup(Self::ENV_MAX_PAGE_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => warn!(
                    key = Self::ENV_MAX_PAGE_SIZE,
                    value = %raw,
                    "ignoring invalid page size"
                ),
                Ok(n) => config.max_page_size = Some(n),
            }
        }

        config
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_refresh_load_events(mut self, enabled: bool) -> Self {
        self.refresh_fires_load_events = enabled;
        self
    }

    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = Some(max);
        self
    }
}
