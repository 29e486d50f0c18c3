//! Plain-text rendering of dashboard data. Every function is a pure
//! function of its arguments.

use std::fmt::Write;

use crate::{
    dashboard::DashboardView,
    model::{AirQuality, AqiHistory, CurrentWeather, ForecastDay, Location, WeatherHistory},
    subscription::Subscription,
};

pub const ERROR_BANNER: &str = "⚠️  Error loading weather data. Please try again.";
pub const LOADING_TEXT: &str = "Loading weather data...";

const NOT_AVAILABLE: &str = "N/A";
const AQI_SCALE_MAX: f64 = 500.0;
const BAR_CELLS: usize = 40;

/// Nearest integer, halves rounding up; never renders `-0`.
pub fn format_temperature(celsius: f64) -> String {
    let mut rounded = celsius.round();
    // `round` takes negative halves away from zero.
    if celsius - rounded == 0.5 {
        rounded += 1.0;
    }
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.0}°C")
}

/// One decimal place, or `N/A` when the source has no reading.
pub fn format_pollutant(value: Option<f64>) -> String {
    match value {
        Some(v) => one_decimal(v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Meters to kilometers at one decimal place.
pub fn format_visibility(meters: Option<f64>) -> String {
    match meters {
        Some(m) => format!("{} km", one_decimal(m / 1000.0)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// One decimal place with exact ties rounded away from zero.
///
/// `{:.1}` already rounds the exact binary value correctly except on a
/// tie, where it picks the even digit.
fn one_decimal(value: f64) -> String {
    // A tie means 20 * value is an odd integer. `* 4.0` is exact, and the
    // fused remainder tells whether `* 5.0` was too.
    let quarter = value * 4.0;
    let twentieths = quarter * 5.0;
    let exact = quarter.mul_add(5.0, -twentieths) == 0.0;

    if exact && twentieths.is_finite() && twentieths.fract() == 0.0 && twentieths % 2.0 != 0.0 {
        let tenths = (twentieths.abs() + 1.0) / 2.0;
        format!("{:.1}", (tenths / 10.0).copysign(value))
    } else {
        format!("{value:.1}")
    }
}

/// Share of the 0-500 AQI scale, in percent, clamped to 0..=100.
pub fn aqi_bar_width(aqi: i32) -> f64 {
    (f64::from(aqi) / AQI_SCALE_MAX * 100.0).clamp(0.0, 100.0)
}

pub fn aqi_bar(aqi: i32) -> String {
    let filled = (aqi_bar_width(aqi) / 100.0 * BAR_CELLS as f64).round() as usize;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

pub fn render_weather_card(weather: &CurrentWeather, location: &Location) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}, {}", location.city, location.country);
    let _ = writeln!(out, "{}", weather.timestamp.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}  {}", format_temperature(weather.temperature), weather.description);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Humidity     {}%", weather.humidity);
    let _ = writeln!(out, "  Wind Speed   {} m/s", weather.wind_speed);
    let _ = writeln!(out, "  Pressure     {} hPa", weather.pressure);
    let _ = writeln!(out, "  Visibility   {}", format_visibility(weather.visibility));
    let _ = writeln!(out, "  Cloudiness   {}%", weather.cloudiness);
    out
}

pub fn render_air_quality_card(air: &AirQuality) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Air Quality");
    let _ = writeln!(out);
    let _ = writeln!(out, "  {} AQI  ({})", air.aqi, air.level_description);
    let _ = writeln!(out, "  {} {:.0}%", aqi_bar(air.aqi), aqi_bar_width(air.aqi));
    let _ = writeln!(out, "   0    Good    Moderate    Unhealthy    500");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Pollutant Levels (μg/m³)");
    for (label, value) in air.pollutants() {
        let _ = writeln!(out, "    {label:<6} {}", format_pollutant(value));
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  Last updated: {}", air.timestamp.format("%Y-%m-%d %H:%M UTC"));
    out
}

pub fn render_view(view: &DashboardView) -> String {
    match view {
        DashboardView::Loading => format!("{LOADING_TEXT}\n"),
        DashboardView::Error => format!("{ERROR_BANNER}\n"),
        DashboardView::Ready { data, refreshing } => {
            let mut out = String::new();
            if *refreshing {
                let _ = writeln!(out, "(updating...)");
            }
            out.push_str(&render_weather_card(&data.weather, &data.location));
            out.push('\n');
            out.push_str(&render_air_quality_card(&data.air_quality));
            out
        }
    }
}

pub fn render_forecast(days: &[ForecastDay]) -> String {
    if days.is_empty() {
        return "No forecast data.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>7} {:>7} {:>6}  {}", "Date", "Min", "Max", "Rain", "Conditions");
    for day in days {
        let temp = |t: Option<f64>| t.map(format_temperature).unwrap_or_else(|| NOT_AVAILABLE.into());
        let rain = day
            .precipitation
            .probability
            .map(|p| format!("{p:.0}%"))
            .unwrap_or_else(|| NOT_AVAILABLE.into());
        let _ = writeln!(
            out,
            "{:<12} {:>7} {:>7} {:>6}  {}",
            day.date.to_string(),
            temp(day.temperature.min),
            temp(day.temperature.max),
            rain,
            day.weather_condition.description.as_deref().unwrap_or(NOT_AVAILABLE),
        );
    }
    out
}

pub fn render_weather_history(history: &WeatherHistory) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} readings for {} ({} .. {})",
        history.count,
        history.location.city,
        history.period.from.format("%Y-%m-%d"),
        history.period.to.format("%Y-%m-%d"),
    );
    for r in &history.readings {
        let _ = writeln!(
            out,
            "  {}  {:>6}  {:>5}%  {}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            format_temperature(r.temperature),
            r.humidity,
            r.description,
        );
    }
    out
}

pub fn render_aqi_history(history: &AqiHistory) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} AQI readings for {} ({} .. {})",
        history.count,
        history.location.city,
        history.period.from.format("%Y-%m-%d"),
        history.period.to.format("%Y-%m-%d"),
    );
    for r in &history.readings {
        let _ = writeln!(
            out,
            "  {}  {:>4}  {:<32} PM2.5 {}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.aqi,
            r.level_description,
            format_pollutant(r.pm25),
        );
    }
    out
}

pub fn render_subscription(sub: &Subscription) -> String {
    let city = sub.location.as_ref().map(|l| l.city.as_str()).unwrap_or(NOT_AVAILABLE);
    let alerts: Vec<&str> = sub.alert_types.iter().map(|a| a.as_str()).collect();
    format!(
        "#{} {} <{}> {} [{}]{}",
        sub.id,
        sub.user_id,
        sub.email,
        city,
        alerts.join(", "),
        if sub.active { "" } else { " (inactive)" },
    )
}
