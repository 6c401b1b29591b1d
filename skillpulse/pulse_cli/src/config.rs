use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared_logging::LogLevel;
use skillpulse_catalog::{LatencyProfile, LearnerProfile};

/// Settings read from `skillpulse.toml`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub planner: PlannerSettings,
    pub telemetry: TelemetrySettings,
    pub catalog: CatalogSettings,
    pub profile: ProfileSettings,
    pub min_level: LogLevel,
}

impl AppConfig {
    /// Loads the file at `path`; a missing file yields defaults. Relative
    /// paths inside resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let document: ConfigDocument = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        } else {
            ConfigDocument::default()
        };
        let min_level = document
            .telemetry
            .min_level
            .parse::<LogLevel>()
            .context("telemetry.min_level")?;
        let resolve = |candidate: PathBuf| {
            if candidate.is_absolute() {
                candidate
            } else {
                source_dir.join(candidate)
            }
        };
        let mut planner = document.planner;
        planner.storage_dir = resolve(planner.storage_dir);
        let mut telemetry = document.telemetry;
        telemetry.log_path = telemetry.log_path.map(resolve);
        telemetry.event_log = telemetry.event_log.map(resolve);
        Ok(Self {
            planner,
            telemetry,
            catalog: document.catalog,
            profile: document.profile,
            min_level,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    planner: PlannerSettings,
    #[serde(default)]
    telemetry: TelemetrySettings,
    #[serde(default)]
    catalog: CatalogSettings,
    #[serde(default)]
    profile: ProfileSettings,
}

/// `[planner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSettings {
    /// Directory holding one JSON file per planned date.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
        }
    }
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// JSON-lines log file; no logging when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines event file; events stay in memory when unset.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// Lowest level written to the log.
    #[serde(default = "default_min_level")]
    pub min_level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_path: None,
            event_log: None,
            min_level: default_min_level(),
        }
    }
}

/// `[catalog]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    /// Skip the simulated service delays.
    #[serde(default)]
    pub instant: bool,
    /// Multiplier on the default delays.
    #[serde(default = "default_latency_scale")]
    pub latency_scale: f64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            instant: false,
            latency_scale: default_latency_scale(),
        }
    }
}

impl CatalogSettings {
    pub fn latency(&self) -> LatencyProfile {
        if self.instant {
            LatencyProfile::instant()
        } else {
            LatencyProfile::scaled(self.latency_scale)
        }
    }
}

/// `[profile]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub name: String,
    pub user_type: String,
    pub preferred_duration: String,
    pub goals: Vec<String>,
    pub join_date: Option<chrono::DateTime<chrono::Utc>>,
    pub streak: u32,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        let profile = LearnerProfile::default();
        Self {
            name: profile.name,
            user_type: profile.user_type,
            preferred_duration: profile.preferred_duration,
            goals: profile.goals,
            join_date: profile.join_date,
            streak: profile.streak,
        }
    }
}

impl From<ProfileSettings> for LearnerProfile {
    fn from(settings: ProfileSettings) -> Self {
        Self {
            name: settings.name,
            user_type: settings.user_type,
            preferred_duration: settings.preferred_duration,
            goals: settings.goals,
            join_date: settings.join_date,
            streak: settings.streak,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".skillpulse/days")
}

fn default_min_level() -> String {
    "info".into()
}

const fn default_latency_scale() -> f64 {
    1.0
}
