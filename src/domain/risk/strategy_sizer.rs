use crate::domain::forecast::signal::TradeSignal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// User risk tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    /// Fraction of full size allocated under dynamic sizing
    pub fn size_factor(&self) -> Decimal {
        match self {
            RiskTolerance::Low => dec!(0.2),
            RiskTolerance::Medium => dec!(0.5),
            RiskTolerance::High => dec!(1.0),
        }
    }
}

impl FromStr for RiskTolerance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskTolerance::Low),
            "medium" => Ok(RiskTolerance::Medium),
            "high" => Ok(RiskTolerance::High),
            _ => anyhow::bail!("Invalid risk tolerance: {}. Must be 'Low', 'Medium' or 'High'", s),
        }
    }
}

/// How often the position is revisited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TradeFrequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl fmt::Display for TradeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeFrequency::Daily => write!(f, "Daily"),
            TradeFrequency::Weekly => write!(f, "Weekly"),
            TradeFrequency::Monthly => write!(f, "Monthly"),
        }
    }
}

impl FromStr for TradeFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(TradeFrequency::Daily),
            "weekly" => Ok(TradeFrequency::Weekly),
            "monthly" => Ok(TradeFrequency::Monthly),
            _ => anyhow::bail!("Invalid frequency: {}. Must be 'Daily', 'Weekly' or 'Monthly'", s),
        }
    }
}

/// Fixed allocates full size; Dynamic scales by risk tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizingMode {
    #[default]
    Fixed,
    Dynamic,
}

impl FromStr for SizingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(SizingMode::Fixed),
            "dynamic" => Ok(SizingMode::Dynamic),
            _ => anyhow::bail!("Invalid sizing mode: {}. Must be 'Fixed' or 'Dynamic'", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategySettings {
    pub risk_tolerance: RiskTolerance,
    pub frequency: TradeFrequency,
    pub sizing_mode: SizingMode,
}

impl StrategySettings {
    /// Build settings from free-form user strings; unknown values use the defaults
    pub fn from_labels(risk: &str, frequency: &str, sizing: &str) -> Self {
        Self {
            risk_tolerance: parse_or_default(risk),
            frequency: parse_or_default(frequency),
            sizing_mode: parse_or_default(sizing),
        }
    }
}

fn parse_or_default<T>(value: &str) -> T
where
    T: FromStr<Err = anyhow::Error> + Default + fmt::Debug,
{
    value.parse::<T>().unwrap_or_else(|e| {
        let fallback = T::default();
        warn!("{}; falling back to {:?}", e, fallback);
        fallback
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRecommendation {
    pub action: TradeSignal,
    /// Percent of allocatable capital, 0-100
    pub position_size_pct: Decimal,
    pub rebalance_frequency: TradeFrequency,
}

/// Turns an ensemble signal plus user settings into a sized recommendation
pub struct StrategySizer;

impl StrategySizer {
    pub fn apply(signal: TradeSignal, settings: &StrategySettings) -> StrategyRecommendation {
        let position_size_pct = match settings.sizing_mode {
            SizingMode::Dynamic => (settings.risk_tolerance.size_factor() * dec!(100)).round_dp(2),
            SizingMode::Fixed => dec!(100),
        };

        StrategyRecommendation {
            action: signal,
            position_size_pct,
            rebalance_frequency: settings.frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_sizing_scales_with_risk() {
        let cases = [
            (RiskTolerance::Low, dec!(20)),
            (RiskTolerance::Medium, dec!(50)),
            (RiskTolerance::High, dec!(100)),
        ];
        for (risk_tolerance, expected) in cases {
            let settings = StrategySettings {
                risk_tolerance,
                frequency: TradeFrequency::Daily,
                sizing_mode: SizingMode::Dynamic,
            };
            let rec = StrategySizer::apply(TradeSignal::Buy, &settings);
            assert_eq!(rec.position_size_pct, expected);
            assert_eq!(rec.rebalance_frequency, TradeFrequency::Daily);
            assert_eq!(rec.action, TradeSignal::Buy);
        }
    }

    #[test]
    fn test_fixed_sizing_is_full_size() {
        let settings = StrategySettings {
            risk_tolerance: RiskTolerance::Low,
            frequency: TradeFrequency::Monthly,
            sizing_mode: SizingMode::Fixed,
        };
        let rec = StrategySizer::apply(TradeSignal::Sell, &settings);
        assert_eq!(rec.position_size_pct, dec!(100));
        assert_eq!(rec.rebalance_frequency, TradeFrequency::Monthly);
    }

    #[test]
    fn test_unknown_labels_fall_back_to_defaults() {
        let settings = StrategySettings::from_labels("Reckless", "Hourly", "Martingale");
        assert_eq!(settings, StrategySettings::default());
        assert_eq!(settings.risk_tolerance, RiskTolerance::Medium);
        assert_eq!(settings.frequency, TradeFrequency::Weekly);
        assert_eq!(settings.sizing_mode, SizingMode::Fixed);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let settings = StrategySettings::from_labels("high", "DAILY", "dynamic");
        assert_eq!(settings.risk_tolerance, RiskTolerance::High);
        assert_eq!(settings.frequency, TradeFrequency::Daily);
        assert_eq!(settings.sizing_mode, SizingMode::Dynamic);
    }
}
