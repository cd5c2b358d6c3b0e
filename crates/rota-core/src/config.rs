use crate::error::{Result, RotaError};
use crate::paths;
use crate::types::{ParticipantId, RoleId};
use chrono::{DateTime, Datelike, Duration, TimeZone};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Every key a rotation file must carry. Checked before typed decoding so the
/// error can name all of them at once.
pub const REQUIRED_KEYS: [&str; 6] = [
    "role_id",
    "roster",
    "index",
    "schedule_day",
    "schedule_hour",
    "schedule_minute",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Weekly trigger time. `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "schedule_day")]
    pub day_of_week: u8,
    #[serde(rename = "schedule_hour")]
    pub hour: u8,
    #[serde(rename = "schedule_minute")]
    pub minute: u8,
}

impl Schedule {
    pub fn new(day_of_week: u8, hour: u8, minute: u8) -> Result<Self> {
        let schedule = Self {
            day_of_week,
            hour,
            minute,
        };
        schedule.check().map_err(RotaError::InvariantViolation)?;
        Ok(schedule)
    }

    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            day_of_week: rng.gen_range(0..7),
            hour: rng.gen_range(0..24),
            minute: rng.gen_range(0..60),
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.day_of_week > 6 {
            return Err(format!(
                "schedule day {} is outside 0..=6",
                self.day_of_week
            ));
        }
        if self.hour > 23 {
            return Err(format!("schedule hour {} is outside 0..=23", self.hour));
        }
        if self.minute > 59 {
            return Err(format!("schedule minute {} is outside 0..=59", self.minute));
        }
        Ok(())
    }

    /// Overlay the given fields; `None` leaves a field unchanged.
    pub fn merge(&self, day_of_week: Option<u8>, hour: Option<u8>, minute: Option<u8>) -> Result<Self> {
        Self::new(
            day_of_week.unwrap_or(self.day_of_week),
            hour.unwrap_or(self.hour),
            minute.unwrap_or(self.minute),
        )
    }

    /// First instant strictly after `now` that matches this schedule, at second 0.
    ///
    /// Local times skipped by a DST transition are passed over; an ambiguous
    /// local time resolves to its earlier instant.
    pub fn next_fire_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();
        // Two weeks covers a matching day whose slot falls into a DST gap.
        for offset in 0..=14 {
            let date = today + Duration::days(offset);
            if date.weekday().num_days_from_sunday() != u32::from(self.day_of_week) {
                continue;
            }
            let Some(naive) = date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            else {
                continue;
            };
            if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                if candidate > *now {
                    return Some(candidate);
                }
            }
        }
        None
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES
            .get(usize::from(self.day_of_week))
            .copied()
            .unwrap_or("?")
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:{:02}", self.day_name(), self.hour, self.minute)
    }
}

// ---------------------------------------------------------------------------
// RotationConfig
// ---------------------------------------------------------------------------

/// Durable rotation state. Field order here is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    pub role_id: RoleId,
    pub roster: Vec<ParticipantId>,
    pub index: usize,
    #[serde(flatten)]
    pub schedule: Schedule,
}

impl RotationConfig {
    /// A fresh config: random schedule, empty roster.
    pub fn new(role_id: RoleId) -> Self {
        Self {
            role_id,
            roster: Vec::new(),
            index: 0,
            schedule: Schedule::random(),
        }
    }

    /// Shape checks that typed decoding cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.role_id.as_str().trim().is_empty() {
            return Err(RotaError::MalformedConfig("role_id is empty".to_string()));
        }
        self.schedule.check().map_err(RotaError::MalformedConfig)?;
        let mut seen = HashSet::new();
        for id in &self.roster {
            if id.as_str().trim().is_empty() {
                return Err(RotaError::MalformedConfig(
                    "roster contains an empty id".to_string(),
                ));
            }
            if !seen.insert(id) {
                return Err(RotaError::MalformedConfig(format!(
                    "duplicate roster entry '{id}'"
                )));
            }
        }
        Ok(())
    }

    pub fn position_of(&self, id: &ParticipantId) -> Option<usize> {
        self.roster.iter().position(|p| p == id)
    }

    pub fn on_duty(&self) -> Option<&ParticipantId> {
        self.roster.get(self.index)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse and validate a rotation file body. Missing keys are reported
    /// together; unknown keys are ignored.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(data)
            .map_err(|e| RotaError::MalformedConfig(e.to_string()))?;
        let Some(map) = value.as_mapping() else {
            return Err(RotaError::MalformedConfig(
                "expected a mapping at the top level".to_string(),
            ));
        };
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !map.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RotaError::MissingKeys(missing));
        }
        let config: RotationConfig = serde_yaml::from_value(value)
            .map_err(|e| RotaError::MalformedConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// File-backed persistence for a single [`RotationConfig`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional location under a project root.
    pub fn at_root(root: &Path) -> Self {
        Self::new(paths::rotation_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<RotationConfig> {
        let data = crate::io::read_if_exists(&self.path)?
            .ok_or_else(|| RotaError::ConfigNotFound(self.path.clone()))?;
        RotationConfig::from_yaml(&data)
    }

    pub fn save(&self, config: &RotationConfig) -> Result<()> {
        let data = config.to_yaml()?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }

    /// Write a default config. Returns `false` without touching the file when
    /// one already exists and `force` is not set.
    pub fn init_default(&self, role_id: Option<RoleId>, force: bool) -> Result<bool> {
        if !force && self.exists() {
            return Ok(false);
        }
        let config = RotationConfig::new(role_id.unwrap_or_else(RoleId::unset));
        self.save(&config)?;
        Ok(true)
    }

    /// Rewrite only the stored index, bypassing any in-memory engine.
    pub fn write_index(&self, index: usize) -> Result<RotationConfig> {
        let mut config = self.load()?;
        config.index = index;
        self.save(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
