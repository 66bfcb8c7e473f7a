use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::*;
use crate::schedule::{OperatingWindow, ScheduleError, SlotGrid};

pub const ENV_DAY_START: &str = "SLOTBOOK_DAY_START";
pub const ENV_DAY_END: &str = "SLOTBOOK_DAY_END";
pub const ENV_SLOT_MINUTES: &str = "SLOTBOOK_SLOT_MINUTES";
pub const ENV_UTC_OFFSET_MINUTES: &str = "SLOTBOOK_UTC_OFFSET_MINUTES";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("malformed {name}: {value:?}")]
    Malformed { name: &'static str, value: String },
    #[error("malformed settings payload: {0}")]
    Payload(String),
}

/// Per-facility slot configuration, as served by the settings service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitySettings {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: i64,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl FacilitySettings {
    pub fn window(&self) -> OperatingWindow {
        OperatingWindow::new(self.day_start, self.day_end, self.slot_minutes * MINUTE_MS)
    }

    /// Facility-local offset; out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn from_json(payload: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(payload).map_err(|e| SettingsError::Payload(e.to_string()))
    }

    /// Read settings from the environment. Any missing variable leaves the
    /// settings pending; there is no default window.
    pub fn from_env() -> Result<SettingsState, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SettingsState, SettingsError> {
        let (Some(start), Some(end), Some(minutes)) = (
            lookup(ENV_DAY_START),
            lookup(ENV_DAY_END),
            lookup(ENV_SLOT_MINUTES),
        ) else {
            return Ok(SettingsState::Pending);
        };
        let offset = lookup(ENV_UTC_OFFSET_MINUTES);

        Ok(SettingsState::Ready(Self {
            day_start: parse_time(ENV_DAY_START, &start)?,
            day_end: parse_time(ENV_DAY_END, &end)?,
            slot_minutes: parse_num(ENV_SLOT_MINUTES, &minutes)?,
            utc_offset_minutes: match offset {
                Some(raw) => parse_num(ENV_UTC_OFFSET_MINUTES, &raw)?,
                None => 0,
            },
        }))
    }
}

/// `HH:MM`; `24:00` reads as the midnight that closes the day.
fn parse_time(name: &'static str, raw: &str) -> Result<NaiveTime, SettingsError> {
    if raw.trim() == "24:00" {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| SettingsError::Malformed {
        name,
        value: raw.to_string(),
    })
}

fn parse_num<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::Malformed {
        name,
        value: raw.to_string(),
    })
}

/// Whether the facility's slot settings have arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SettingsState {
    #[default]
    Pending,
    Ready(FacilitySettings),
}

impl SettingsState {
    pub fn ready(&self) -> Option<&FacilitySettings> {
        match self {
            SettingsState::Ready(s) => Some(s),
            SettingsState::Pending => None,
        }
    }

    /// Slot grid for `date`; never guesses a window while pending.
    pub fn grid(&self, date: NaiveDate) -> Result<SlotGrid, ScheduleError> {
        let settings = self.ready().ok_or(ScheduleError::SettingsPending)?;
        SlotGrid::generate(date, &settings.window(), &settings.offset())
    }
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn fetch(&self) -> Result<SettingsState, GatewayError>;
}

/// Fixed settings, e.g. loaded once from the environment.
pub struct StaticSettings(pub SettingsState);

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn fetch(&self) -> Result<SettingsState, GatewayError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_complete() {
        let state = FacilitySettings::from_lookup(lookup(&[
            (ENV_DAY_START, "08:00"),
            (ENV_DAY_END, "17:00"),
            (ENV_SLOT_MINUTES, "30"),
            (ENV_UTC_OFFSET_MINUTES, "-300"),
        ]))
        .unwrap();
        let s = state.ready().unwrap();
        assert_eq!(s.window().slot_ms, 30 * MINUTE_MS);
        assert_eq!(s.offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn env_missing_is_pending() {
        let state =
            FacilitySettings::from_lookup(lookup(&[(ENV_DAY_START, "08:00"), (ENV_SLOT_MINUTES, "30")]))
                .unwrap();
        assert_eq!(state, SettingsState::Pending);
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(state.grid(date), Err(ScheduleError::SettingsPending));
    }

    #[test]
    fn env_day_closing_at_midnight() {
        let state = FacilitySettings::from_lookup(lookup(&[
            (ENV_DAY_START, "18:00"),
            (ENV_DAY_END, "24:00"),
            (ENV_SLOT_MINUTES, "60"),
        ]))
        .unwrap();
        let grid = state
            .grid(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
            .unwrap();
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn env_malformed_is_error() {
        let err = FacilitySettings::from_lookup(lookup(&[
            (ENV_DAY_START, "8am"),
            (ENV_DAY_END, "17:00"),
            (ENV_SLOT_MINUTES, "30"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { name: ENV_DAY_START, .. }));
    }

    #[test]
    fn json_payload() {
        let s = FacilitySettings::from_json(
            r#"{"day_start":"08:00:00","day_end":"17:00:00","slot_minutes":30}"#,
        )
        .unwrap();
        assert_eq!(s.utc_offset_minutes, 0);
        let grid = SettingsState::Ready(s)
            .grid(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
            .unwrap();
        assert_eq!(grid.len(), 18);
        assert!(FacilitySettings::from_json("{}").is_err());
    }

    #[tokio::test]
    async fn static_provider() {
        let provider = StaticSettings(SettingsState::Pending);
        assert_eq!(provider.fetch().await, Ok(SettingsState::Pending));
    }
}
