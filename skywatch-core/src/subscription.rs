//! Alert subscriptions registered with the backend.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighTemperature,
    LowTemperature,
    PoorAirQuality,
    ExtremeWeather,
    HighWind,
    HeavyRain,
    UvWarning,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighTemperature => "high-temperature",
            AlertType::LowTemperature => "low-temperature",
            AlertType::PoorAirQuality => "poor-air-quality",
            AlertType::ExtremeWeather => "extreme-weather",
            AlertType::HighWind => "high-wind",
            AlertType::HeavyRain => "heavy-rain",
            AlertType::UvWarning => "uv-warning",
        }
    }

    pub const fn all() -> &'static [AlertType] {
        &[
            AlertType::HighTemperature,
            AlertType::LowTemperature,
            AlertType::PoorAirQuality,
            AlertType::ExtremeWeather,
            AlertType::HighWind,
            AlertType::HeavyRain,
            AlertType::UvWarning,
        ]
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AlertType {
    type Error = ApiError;

    fn try_from(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        AlertType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown alert type '{value}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionLocation {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Limits that trigger an alert; unset fields never trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    #[serde(rename = "maxAQI")]
    pub max_aqi: Option<i32>,
    pub max_wind_speed: Option<f64>,
    pub max_precipitation: Option<f64>,
    #[serde(rename = "maxUVIndex")]
    pub max_uv_index: Option<i32>,
}

/// Body of a create or update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub user_id: String,
    pub email: String,
    pub location: SubscriptionLocation,
    pub alert_types: BTreeSet<AlertType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<AlertThresholds>,
    pub active: bool,
}

impl SubscriptionRequest {
    /// Reject requests the backend would refuse, before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("User ID is required".into()));
        }
        if !is_plausible_email(&self.email) {
            return Err(ApiError::InvalidRequest(format!("Invalid email format: '{}'", self.email)));
        }
        if self.location.city.trim().is_empty() {
            return Err(ApiError::InvalidRequest("City is required".into()));
        }
        if self.alert_types.is_empty() {
            return Err(ApiError::InvalidRequest("At least one alert type is required".into()));
        }
        if let Some(t) = &self.thresholds {
            if let (Some(min), Some(max)) = (t.min_temperature, t.max_temperature) {
                if min > max {
                    return Err(ApiError::InvalidRequest(format!(
                        "minTemperature ({min}) is above maxTemperature ({max})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A subscription as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,
    pub email: String,
    pub location: Option<SubscriptionLocation>,
    #[serde(default)]
    pub alert_types: BTreeSet<AlertType>,
    pub thresholds: Option<AlertThresholds>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_passes() {
        assert!(fixtures::request().validate().is_ok());
    }

    #[test]
    fn blank_user_is_rejected() {
        let mut req = fixtures::request();
        req.user_id = "  ".into();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("User ID is required"));
    }

    #[test]
    fn bad_email_is_rejected() {
        for email in ["", "no-at-sign", "@example.com", "user@", "a@b@c", "a b@c.d"] {
            let mut req = fixtures::request();
            req.email = email.into();
            assert!(req.validate().is_err(), "{email:?} should be rejected");
        }
    }

    #[test]
    fn empty_alert_types_are_rejected() {
        let mut req = fixtures::request();
        req.alert_types.clear();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("At least one alert type"));
    }

    #[test]
    fn inverted_temperature_thresholds_are_rejected() {
        let mut req = fixtures::request();
        req.thresholds = Some(AlertThresholds {
            min_temperature: Some(30.0),
            max_temperature: Some(10.0),
            ..Default::default()
        });
        assert!(req.validate().is_err());
    }

    #[test]
    fn request_serializes_backend_field_names() {
        let json = serde_json::to_value(fixtures::request()).unwrap();

        assert_eq!(json["userId"], "user123");
        assert_eq!(json["location"]["country"], "GB");
        assert!(json["location"].get("latitude").is_none());
        assert_eq!(json["thresholds"]["maxAQI"], 100);
        assert_eq!(json["alertTypes"], serde_json::json!(["POOR_AIR_QUALITY", "HIGH_WIND"]));
    }

    #[test]
    fn alert_type_parses_cli_and_wire_spellings() {
        assert_eq!(AlertType::try_from("high-wind").unwrap(), AlertType::HighWind);
        assert_eq!(AlertType::try_from("UV_WARNING").unwrap(), AlertType::UvWarning);
        assert!(AlertType::try_from("tornado").is_err());
    }
}
