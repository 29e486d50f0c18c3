//! Search box and committed city driving the weather query.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    api::WeatherSource,
    model::WeatherResponse,
    query::{QueryCache, QueryKey, QueryState, QueryStatus},
};

/// What the dashboard shows; exactly one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Loading,
    /// Generic failure; the error kind is deliberately not shown.
    Error,
    Ready {
        data: Arc<WeatherResponse>,
        /// `data` belongs to an earlier or stale query while a fetch runs.
        refreshing: bool,
    },
}

#[derive(Debug)]
pub struct Dashboard {
    source: Arc<dyn WeatherSource>,
    cache: QueryCache<WeatherResponse>,
    search_input: String,
    committed_city: String,
    active: watch::Receiver<QueryState<WeatherResponse>>,
    previous: Option<Arc<WeatherResponse>>,
}

impl Dashboard {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        cache: QueryCache<WeatherResponse>,
        default_city: &str,
    ) -> Self {
        let active = cache.subscribe(&QueryKey::weather(default_city, None));
        Self {
            source,
            cache,
            search_input: default_city.to_string(),
            committed_city: default_city.to_string(),
            active,
            previous: None,
        }
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn set_search_input(&mut self, text: impl Into<String>) {
        self.search_input = text.into();
    }

    pub fn committed_city(&self) -> &str {
        &self.committed_city
    }

    pub fn active_key(&self) -> QueryKey {
        QueryKey::weather(&self.committed_city, None)
    }

    /// Commit the trimmed search text as the active city and start loading it.
    ///
    /// Blank input is ignored and returns `false`.
    pub fn submit(&mut self) -> bool {
        let city = self.search_input.trim();
        if city.is_empty() {
            return false;
        }

        if let Some(data) = self.active.borrow().data.clone() {
            self.previous = Some(data);
        }

        self.committed_city = city.to_string();
        let key = self.active_key();
        tracing::info!(%key, "Committed new city");

        self.active = self.cache.subscribe(&key);
        self.load();
        true
    }

    /// Fetch the committed city unless the cache already holds fresh data.
    pub fn load(&self) {
        let source = Arc::clone(&self.source);
        let city = self.committed_city.clone();
        self.cache.prefetch(self.active_key(), move || async move {
            source.current_weather(&city, None).await
        });
    }

    /// Drop the cached entry for the committed city and fetch it again.
    pub fn refresh(&self) {
        self.cache.invalidate(&self.active_key());
        self.load();
    }

    /// Derive the view from the committed key's state.
    ///
    /// Until the new key has data, the last displayed data stays on screen.
    pub fn view(&mut self) -> DashboardView {
        let state = self.active.borrow_and_update().clone();

        if let Some(data) = &state.data {
            self.previous = Some(Arc::clone(data));
        }

        match (state.status, state.data) {
            (QueryStatus::Error, _) => DashboardView::Error,
            (QueryStatus::Success, Some(data)) => {
                DashboardView::Ready { data, refreshing: state.is_fetching }
            }
            _ => match &self.previous {
                Some(prev) => DashboardView::Ready { data: Arc::clone(prev), refreshing: true },
                None => DashboardView::Loading,
            },
        }
    }

    /// Wait for the committed key's next transition. `false` once the cache
    /// entry is gone (e.g. after logout cleared the cache).
    pub async fn changed(&mut self) -> bool {
        self.active.changed().await.is_ok()
    }

    /// Wait until the committed key is no longer loading, then return the view.
    pub async fn settled(&mut self) -> DashboardView {
        if self.active.borrow().status == QueryStatus::Idle {
            self.load();
        }

        loop {
            let busy = {
                let state = self.active.borrow();
                state.is_fetching || state.status == QueryStatus::Loading
            };
            if !busy || !self.changed().await {
                return self.view();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ApiError, Result},
        model::fixtures,
    };
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[derive(Debug, Default)]
    struct FakeSource {
        delays: HashMap<String, Duration>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn delayed(mut self, city: &str, ms: u64) -> Self {
            self.delays.insert(city.to_string(), Duration::from_millis(ms));
            self
        }

        fn failing(mut self, city: &str) -> Self {
            self.failing.push(city.to_string());
            self
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn current_weather(&self, city: &str, _country: Option<&str>) -> Result<WeatherResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.get(city).copied().unwrap_or(Duration::from_millis(20));
            tokio::time::sleep(delay).await;

            if self.failing.iter().any(|c| c == city) {
                return Err(ApiError::Client { status: 404, message: "City not found".into() });
            }
            Ok(fixtures::weather(city))
        }
    }

    fn dashboard(source: FakeSource) -> (Dashboard, Arc<FakeSource>) {
        let source = Arc::new(source);
        let cache = QueryCache::new(Duration::from_secs(300));
        (Dashboard::new(source.clone(), cache, "London"), source)
    }

    fn city_of(view: &DashboardView) -> Option<&str> {
        match view {
            DashboardView::Ready { data, .. } => Some(data.location.city.as_str()),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_on_default_city() {
        let (mut dash, _) = dashboard(FakeSource::default());

        assert_eq!(dash.committed_city(), "London");
        assert_eq!(dash.search_input(), "London");

        dash.load();
        assert_eq!(dash.view(), DashboardView::Loading);

        let view = dash.settled().await;
        assert_eq!(city_of(&view), Some("London"));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_commits_trimmed_input() {
        let (mut dash, _) = dashboard(FakeSource::default());

        dash.set_search_input("   Tokyo  ");
        assert!(dash.submit());

        assert_eq!(dash.committed_city(), "Tokyo");
        assert_eq!(dash.active_key(), QueryKey::weather("Tokyo", None));
        assert_eq!(city_of(&dash.settled().await), Some("Tokyo"));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submission_is_ignored() {
        let (mut dash, source) = dashboard(FakeSource::default());

        for input in ["", "   ", "\t\n"] {
            dash.set_search_input(input);
            assert!(!dash.submit());
            assert_eq!(dash.committed_city(), "London");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_data_stays_visible_while_next_city_loads() {
        let (mut dash, _) = dashboard(FakeSource::default().delayed("Paris", 500));
        dash.load();
        dash.settled().await;

        dash.set_search_input("Paris");
        dash.submit();

        let during = dash.view();
        assert_eq!(city_of(&during), Some("London"));
        assert!(matches!(during, DashboardView::Ready { refreshing: true, .. }));

        let after = dash.settled().await;
        assert_eq!(city_of(&after), Some("Paris"));
        assert!(matches!(after, DashboardView::Ready { refreshing: false, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_superseded_city_never_reaches_view() {
        let source = FakeSource::default().delayed("Paris", 500).delayed("Rome", 10);
        let (mut dash, _) = dashboard(source);

        dash.set_search_input("Paris");
        dash.submit();
        dash.set_search_input("Rome");
        dash.submit();

        assert_eq!(city_of(&dash.settled().await), Some("Rome"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(city_of(&dash.view()), Some("Rome"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_show_the_error_state() {
        let (mut dash, _) = dashboard(FakeSource::default().failing("Atlantis"));
        dash.load();
        dash.settled().await;

        dash.set_search_input("Atlantis");
        dash.submit();

        assert_eq!(dash.settled().await, DashboardView::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_cached_city_skips_the_network() {
        let (mut dash, source) = dashboard(FakeSource::default());
        dash.load();
        dash.settled().await;

        dash.set_search_input("Paris");
        dash.submit();
        dash.settled().await;

        dash.set_search_input("London");
        dash.submit();
        let view = dash.view();

        assert_eq!(city_of(&view), Some("London"));
        assert!(matches!(view, DashboardView::Ready { refreshing: false, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_refetches_committed_city() {
        let (mut dash, source) = dashboard(FakeSource::default());
        dash.load();
        dash.settled().await;

        dash.refresh();
        assert!(matches!(dash.view(), DashboardView::Ready { refreshing: true, .. }));
        dash.settled().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
