use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions for a location. Also used for the readings of a
/// weather history, which carry the same fields minus the icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub temperature: f64,
    pub temperature_unit: String,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: i32,
    pub condition: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    /// Meters; `None` when the upstream source omits it.
    pub visibility: Option<f64>,
    pub cloudiness: i32,
    pub timestamp: DateTime<Utc>,
}

/// EPA air-quality categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    pub const fn all() -> &'static [AqiLevel] {
        &[
            AqiLevel::Good,
            AqiLevel::Moderate,
            AqiLevel::UnhealthySensitive,
            AqiLevel::Unhealthy,
            AqiLevel::VeryUnhealthy,
            AqiLevel::Hazardous,
        ]
    }

    /// Inclusive AQI band of this level.
    pub const fn range(&self) -> (i32, i32) {
        match self {
            AqiLevel::Good => (0, 50),
            AqiLevel::Moderate => (51, 100),
            AqiLevel::UnhealthySensitive => (101, 150),
            AqiLevel::Unhealthy => (151, 200),
            AqiLevel::VeryUnhealthy => (201, 300),
            AqiLevel::Hazardous => (301, 500),
        }
    }

    /// Categorize a raw AQI score. Scores outside every band count as hazardous.
    pub fn from_aqi(aqi: i32) -> Self {
        Self::all()
            .iter()
            .copied()
            .find(|level| {
                let (min, max) = level.range();
                (min..=max).contains(&aqi)
            })
            .unwrap_or(AqiLevel::Hazardous)
    }

    pub fn description(&self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiLevel::Unhealthy => "Unhealthy",
            AqiLevel::VeryUnhealthy => "Very Unhealthy",
            AqiLevel::Hazardous => "Hazardous",
        }
    }

    pub fn requires_alert(&self) -> bool {
        matches!(self, AqiLevel::Unhealthy | AqiLevel::VeryUnhealthy | AqiLevel::Hazardous)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQuality {
    pub aqi: i32,
    pub level: AqiLevel,
    pub level_description: String,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub co: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AirQuality {
    /// Labelled pollutant concentrations in display order.
    pub fn pollutants(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("PM2.5", self.pm25),
            ("PM10", self.pm10),
            ("CO", self.co),
            ("NO₂", self.no2),
            ("SO₂", self.so2),
            ("O₃", self.o3),
        ]
    }
}

/// Informational only; never consulted for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub data_source: String,
    pub from_cache: bool,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResponse {
    pub location: Location,
    pub weather: CurrentWeather,
    pub air_quality: AirQuality,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherCondition {
    pub condition: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precipitation {
    /// Percent, 0-100.
    pub probability: Option<f64>,
    /// Millimeters.
    pub amount: Option<f64>,
    pub likely_to_rain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wind {
    pub speed: Option<f64>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sun {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// One day of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub id: Option<i64>,
    pub location: Option<Location>,
    pub date: NaiveDate,
    pub temperature: TemperatureRange,
    pub weather_condition: WeatherCondition,
    pub precipitation: Precipitation,
    pub wind: Wind,
    pub sun: Option<Sun>,
    pub humidity: Option<i32>,
    pub cloudiness: Option<i32>,
    pub uv_index: Option<i32>,
    pub data_source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLocation {
    pub city: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherHistory {
    pub location: HistoryLocation,
    pub period: Period,
    pub count: usize,
    pub readings: Vec<CurrentWeather>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AqiHistory {
    pub location: HistoryLocation,
    pub period: Period,
    pub count: usize,
    pub readings: Vec<AirQuality>,
}
