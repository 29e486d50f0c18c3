//! Core library for the `skywatch` weather & air-quality dashboard.
//!
//! This crate defines:
//! - Configuration and the persisted bearer token
//! - The backend API client and one typed fetch function per resource
//! - A query cache that deduplicates and caches fetches per key
//! - The dashboard view-state controller and its text rendering
//!
//! It is used by `skywatch-cli`, but can also be reused by other front ends.

pub mod api;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod query;
pub mod render;
pub mod subscription;
pub mod token;

pub use api::{QueryParams, WeatherSource};
pub use client::ApiClient;
pub use config::Config;
pub use dashboard::{Dashboard, DashboardView};
pub use error::{ApiError, Result};
pub use model::{AirQuality, AqiLevel, CurrentWeather, Location, Metadata, WeatherResponse};
pub use query::{QueryCache, QueryKey, QueryState, QueryStatus};
pub use subscription::{AlertType, Subscription, SubscriptionRequest};
pub use token::{FileTokenStore, MemoryTokenStore, Navigator, TokenStore};
