use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charger {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub address: String,
    pub pincode: String,
    pub price_per_hour: i64,
    pub charger_type: ChargerType,
    pub power_output: f64,
    /// Daily booking window, hour-aligned `HH:MM` strings.
    pub available_start: String,
    pub available_end: String,
    pub photo_url: Option<String>,
    pub status: ChargerStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChargerStatus {
    Active,
    Paused,
}

impl ChargerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargerStatus::Active => "active",
            ChargerStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ChargerStatus::Active),
            "paused" => Some(ChargerStatus::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChargerType {
    Type2,
    Ccs,
    Chademo,
    #[serde(rename = "gbct")]
    Gbt,
    Wall,
}

impl ChargerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargerType::Type2 => "type2",
            ChargerType::Ccs => "ccs",
            ChargerType::Chademo => "chademo",
            ChargerType::Gbt => "gbct",
            ChargerType::Wall => "wall",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "type2" => Some(ChargerType::Type2),
            "ccs" => Some(ChargerType::Ccs),
            "chademo" => Some(ChargerType::Chademo),
            "gbct" => Some(ChargerType::Gbt),
            "wall" => Some(ChargerType::Wall),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charger_type_roundtrip() {
        for s in ["type2", "ccs", "chademo", "gbct", "wall"] {
            assert_eq!(ChargerType::parse(s).unwrap().as_str(), s);
        }
        assert!(ChargerType::parse("tesla").is_none());
    }

    #[test]
    fn test_status_parse_is_strict() {
        assert_eq!(ChargerStatus::parse("active"), Some(ChargerStatus::Active));
        assert_eq!(ChargerStatus::parse("paused"), Some(ChargerStatus::Paused));
        assert_eq!(ChargerStatus::parse("removed"), None);
    }
}
