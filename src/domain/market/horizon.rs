use crate::domain::errors::HorizonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Coarse horizon presets offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizonPreset {
    OneDay,
    OneWeek,
    OneMonth,
}

impl HorizonPreset {
    /// Trading periods covered by the preset
    pub fn periods(&self) -> usize {
        match self {
            HorizonPreset::OneDay => 1,
            HorizonPreset::OneWeek => 5,
            HorizonPreset::OneMonth => 21,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HorizonPreset::OneDay => "1 Day",
            HorizonPreset::OneWeek => "1 Week",
            HorizonPreset::OneMonth => "1 Month",
        }
    }
}

impl FromStr for HorizonPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1 day" | "1d" | "day" | "daily" => Ok(HorizonPreset::OneDay),
            "1 week" | "1w" | "week" | "weekly" => Ok(HorizonPreset::OneWeek),
            "1 month" | "1m" | "month" | "monthly" => Ok(HorizonPreset::OneMonth),
            _ => anyhow::bail!(
                "Invalid horizon: {}. Must be '1 Day', '1 Week' or '1 Month'",
                s
            ),
        }
    }
}

/// Number of future periods a forecast targets. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize")]
pub struct Horizon(usize);

impl Horizon {
    pub fn new(periods: usize) -> Result<Self, HorizonError> {
        if periods == 0 {
            return Err(HorizonError::Zero);
        }
        Ok(Self(periods))
    }

    pub fn periods(&self) -> usize {
        self.0
    }

    /// Parse a preset label or a bare period count, falling back to one week.
    pub fn parse_or_default(s: &str) -> Self {
        match s.parse::<Horizon>() {
            Ok(h) => h,
            Err(e) => {
                warn!("{}; using {}", e, HorizonPreset::OneWeek.label());
                HorizonPreset::OneWeek.into()
            }
        }
    }
}

impl Default for Horizon {
    fn default() -> Self {
        HorizonPreset::OneWeek.into()
    }
}

impl From<HorizonPreset> for Horizon {
    fn from(preset: HorizonPreset) -> Self {
        Self(preset.periods())
    }
}

impl TryFrom<usize> for Horizon {
    type Error = HorizonError;

    fn try_from(periods: usize) -> Result<Self, Self::Error> {
        Horizon::new(periods)
    }
}

impl FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(periods) = s.trim().parse::<usize>() {
            return Ok(Horizon::new(periods)?);
        }
        Ok(s.parse::<HorizonPreset>()?.into())
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => write!(f, "1 period"),
            n => write!(f, "{} periods", n),
        }
    }
}
