//! Typed request builders, one per backend resource.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Debug;

use crate::{
    client::ApiClient,
    error::{ApiError, Result},
    model::{AqiHistory, ForecastDay, WeatherHistory, WeatherResponse},
    subscription::{Subscription, SubscriptionRequest},
};

pub const DEFAULT_FORECAST_DAYS: u8 = 7;
pub const MAX_FORECAST_DAYS: u8 = 7;

/// Query string under construction. Optional parameters that are absent or
/// empty are left out entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, value: impl ToString) -> Self {
        self.pairs.push((name, value.to_string()));
        self
    }

    pub fn optional(mut self, name: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.pairs.push((name, v.to_string()));
        }
        self
    }

    pub fn as_slice(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// Anything that can produce current weather for a city.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current_weather(&self, city: &str, country: Option<&str>) -> Result<WeatherResponse>;
}

#[async_trait]
impl WeatherSource for ApiClient {
    async fn current_weather(&self, city: &str, country: Option<&str>) -> Result<WeatherResponse> {
        self.get_weather(city, country).await
    }
}

impl ApiClient {
    /// `GET /weather`: current conditions and air quality.
    pub async fn get_weather(&self, city: &str, country: Option<&str>) -> Result<WeatherResponse> {
        let params = QueryParams::new().required("city", city).optional("country", country);
        self.get("/weather", params.as_slice()).await
    }

    /// `GET /forecast`: one entry per day, `days` within 1..=7.
    pub async fn get_forecast(
        &self,
        city: &str,
        days: Option<u8>,
        country: Option<&str>,
    ) -> Result<Vec<ForecastDay>> {
        let days = days.unwrap_or(DEFAULT_FORECAST_DAYS);
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(ApiError::InvalidRequest(format!(
                "Forecast days must be between 1 and {MAX_FORECAST_DAYS}, got {days}"
            )));
        }

        let params = QueryParams::new()
            .required("city", city)
            .required("days", days)
            .optional("country", country);
        self.get("/forecast", params.as_slice()).await
    }

    /// `GET /history`: weather readings between two instants.
    pub async fn get_history(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        country: Option<&str>,
    ) -> Result<WeatherHistory> {
        let params = history_params(city, from, to, country)?;
        self.get("/history", params.as_slice()).await
    }

    /// `GET /history/aqi`: air-quality readings between two instants.
    pub async fn get_aqi_history(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        country: Option<&str>,
    ) -> Result<AqiHistory> {
        let params = history_params(city, from, to, country)?;
        self.get("/history/aqi", params.as_slice()).await
    }

    pub async fn create_subscription(&self, request: &SubscriptionRequest) -> Result<Subscription> {
        request.validate()?;
        tracing::info!(user_id = %request.user_id, city = %request.location.city, "Creating subscription");
        self.post("/subscriptions", request).await
    }

    pub async fn get_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let params = QueryParams::new().required("userId", user_id);
        self.get("/subscriptions", params.as_slice()).await
    }

    pub async fn get_subscription(&self, id: i64) -> Result<Subscription> {
        self.get(&format!("/subscriptions/{id}"), &[]).await
    }

    pub async fn update_subscription(
        &self,
        id: i64,
        request: &SubscriptionRequest,
    ) -> Result<Subscription> {
        request.validate()?;
        self.put(&format!("/subscriptions/{id}"), request).await
    }

    pub async fn delete_subscription(&self, id: i64) -> Result<()> {
        tracing::info!(id, "Deleting subscription");
        self.delete(&format!("/subscriptions/{id}")).await
    }
}

fn history_params(
    city: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    country: Option<&str>,
) -> Result<QueryParams> {
    if from > to {
        return Err(ApiError::InvalidRequest(format!(
            "History range starts after it ends ({} > {})",
            iso_instant(from),
            iso_instant(to)
        )));
    }

    Ok(QueryParams::new()
        .required("city", city)
        .required("from", iso_instant(from))
        .required("to", iso_instant(to))
        .optional("country", country))
}

/// `2026-01-31T23:59:59Z`, the instant format the backend parses.
pub fn iso_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::harness;
    use crate::model::fixtures;
    use crate::subscription::fixtures as subscription_fixtures;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn optional_params_are_dropped_when_absent_or_empty() {
        let params = QueryParams::new()
            .required("city", "London")
            .optional("country", None)
            .optional("region", Some("  "));

        assert_eq!(params.as_slice(), &[("city", "London".to_string())]);
    }

    #[test]
    fn iso_instant_uses_zulu_seconds() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(iso_instant(at), "2026-01-31T23:59:59Z");
    }

    #[tokio::test]
    async fn get_weather_sends_city_only_when_country_absent() {
        let mut h = harness(None).await;
        let mock = h
            .server
            .mock("GET", "/api/v1/weather")
            .match_query(Matcher::Exact("city=London".into()))
            .with_status(200)
            .with_body(fixtures::weather_json("London").to_string())
            .create_async()
            .await;

        let resp = h.client.get_weather("London", None).await.unwrap();

        assert_eq!(resp.location.city, "London");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_weather_sends_country_when_given() {
        let mut h = harness(None).await;
        let mock = h
            .server
            .mock("GET", "/api/v1/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("city".into(), "New York".into()),
                Matcher::UrlEncoded("country".into(), "US".into()),
            ]))
            .with_status(200)
            .with_body(fixtures::weather_json("New York").to_string())
            .create_async()
            .await;

        let resp = h.client.current_weather("New York", Some("US")).await.unwrap();

        assert_eq!(resp.location.city, "New York");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_forecast_defaults_to_seven_days() {
        let mut h = harness(None).await;
        let mock = h
            .server
            .mock("GET", "/api/v1/forecast")
            .match_query(Matcher::Exact("city=Paris&days=7".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let days = h.client.get_forecast("Paris", None, None).await.unwrap();

        assert!(days.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_forecast_rejects_out_of_range_days_without_calling() {
        let mut h = harness(None).await;
        let mock = h.server.mock("GET", "/api/v1/forecast").match_query(Matcher::Any).expect(0).create_async().await;

        for days in [0, 8] {
            let err = h.client.get_forecast("Paris", Some(days), None).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest(_)));
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_history_sends_iso_range() {
        let mut h = harness(None).await;
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        let body = json!({
            "location": { "city": "London", "country": "GB" },
            "period": { "from": "2026-01-01T00:00:00Z", "to": "2026-01-31T23:59:59Z" },
            "count": 0,
            "readings": []
        });
        let mock = h
            .server
            .mock("GET", "/api/v1/history")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("city".into(), "London".into()),
                Matcher::UrlEncoded("from".into(), "2026-01-01T00:00:00Z".into()),
                Matcher::UrlEncoded("to".into(), "2026-01-31T23:59:59Z".into()),
                Matcher::UrlEncoded("country".into(), "GB".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let history = h.client.get_history("London", from, to, Some("GB")).await.unwrap();

        assert_eq!(history.count, 0);
        assert_eq!(history.period.to, to);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_history_rejects_inverted_range() {
        let h = harness(None).await;
        let from = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let err = h.client.get_aqi_history("London", from, to, None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn subscription_lifecycle_hits_expected_endpoints() {
        let mut h = harness(Some("tok")).await;
        let created = json!({
            "id": 4,
            "userId": "user123",
            "email": "user@example.com",
            "location": { "city": "London", "country": "GB" },
            "alertTypes": ["POOR_AIR_QUALITY", "HIGH_WIND"],
            "thresholds": { "maxAQI": 100 },
            "active": true,
            "createdAt": "2026-10-17T09:00:00Z",
            "lastNotifiedAt": null
        });

        let create = h
            .server
            .mock("POST", "/api/v1/subscriptions")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({ "userId": "user123", "active": true })))
            .with_status(201)
            .with_body(created.to_string())
            .create_async()
            .await;
        let list = h
            .server
            .mock("GET", "/api/v1/subscriptions")
            .match_query(Matcher::Exact("userId=user123".into()))
            .with_status(200)
            .with_body(json!([created]).to_string())
            .create_async()
            .await;
        let delete = h.server.mock("DELETE", "/api/v1/subscriptions/4").with_status(204).create_async().await;

        let sub = h.client.create_subscription(&subscription_fixtures::request()).await.unwrap();
        assert_eq!(sub.id, 4);
        assert_eq!(sub.thresholds.and_then(|t| t.max_aqi), Some(100));

        let subs = h.client.get_subscriptions("user123").await.unwrap();
        assert_eq!(subs.len(), 1);

        h.client.delete_subscription(4).await.unwrap();

        create.assert_async().await;
        list.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_subscription_is_not_sent() {
        let mut h = harness(None).await;
        let mock = h.server.mock("POST", "/api/v1/subscriptions").expect(0).create_async().await;

        let mut req = subscription_fixtures::request();
        req.alert_types.clear();

        let err = h.client.create_subscription(&req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        mock.assert_async().await;
    }
}
