use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("availability config could not be parsed: {0}")]
    Parse(String),
    #[error("availability config is invalid: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotLocale {
    #[default]
    Es,
    En,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakTime {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl BreakTime {
    /// Inclusive start, exclusive end.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Working-hours configuration attached to a scheduling screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityConfig {
    /// Weekdays, 0 = Sunday .. 6 = Saturday.
    pub days_available: Vec<u8>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub interval_minutes: u32,
    #[serde(default)]
    pub break_times: Vec<BreakTime>,
    #[serde(default = "default_days_to_show")]
    pub days_to_show: u32,
    #[serde(default)]
    pub max_slots: Option<usize>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub locale: SlotLocale,
}

fn default_days_to_show() -> u32 {
    7
}

impl AvailabilityConfig {
    pub fn from_value(value: &Value) -> Result<Self, AvailabilityError> {
        let config = serde_json::from_value::<Self>(value.clone())
            .map_err(|error| AvailabilityError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.interval_minutes == 0 {
            return Err(AvailabilityError::Invalid(
                "intervalMinutes must be greater than zero".to_string(),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(AvailabilityError::Invalid(
                "startTime must be earlier than endTime".to_string(),
            ));
        }
        if let Some(day) = self.days_available.iter().find(|day| **day > 6) {
            return Err(AvailabilityError::Invalid(format!(
                "daysAvailable entry `{day}` is outside 0..=6"
            )));
        }
        if let Some(slot) = self.break_times.iter().find(|slot| slot.start >= slot.end) {
            return Err(AvailabilityError::Invalid(format!(
                "break {} - {} must start before it ends",
                slot.start.format("%H:%M"),
                slot.end.format("%H:%M")
            )));
        }
        if self.utc_offset().is_none() {
            return Err(AvailabilityError::Invalid(
                "utcOffsetMinutes must be within +/- 24 hours".to_string(),
            ));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt)
    }

    pub fn is_on_break(&self, time: NaiveTime) -> bool {
        self.break_times.iter().any(|slot| slot.contains(time))
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| D::Error::custom(format!("`{raw}` is not a HH:MM time")))
    }
}
