use std::{collections::BTreeSet, sync::Arc};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use skywatch_core::{
    AlertType, ApiClient, Config, FileTokenStore, Navigator, QueryCache, QueryKey,
    SubscriptionRequest, TokenStore, WeatherResponse,
    dashboard::DashboardView,
    render,
    subscription::{AlertThresholds, SubscriptionLocation},
    token::LOGIN_PATH,
};

use crate::interactive;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Weather & air-quality dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the backend URL, default city and cache window.
    Configure,

    /// Store the bearer token sent with every request.
    Login {
        /// Token value; prompted for when absent.
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the stored token.
    Logout,

    /// Show current weather and air quality once.
    Show {
        /// City name; defaults to the configured city.
        city: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },

    /// Interactive dashboard: search cities until you quit.
    Dashboard,

    /// Daily forecast for a city.
    Forecast {
        city: String,

        /// Number of days (1-7).
        #[arg(long, default_value_t = 7)]
        days: u8,

        #[arg(long)]
        country: Option<String>,
    },

    /// Past readings for a city.
    History {
        city: String,

        /// Start, as `YYYY-MM-DD` or an RFC 3339 instant.
        #[arg(long)]
        from: String,

        /// End, as `YYYY-MM-DD` or an RFC 3339 instant.
        #[arg(long)]
        to: String,

        #[arg(long)]
        country: Option<String>,

        /// Air-quality readings instead of weather readings.
        #[arg(long)]
        aqi: bool,
    },

    /// Manage alert subscriptions.
    #[command(subcommand)]
    Subscriptions(SubscriptionCommand),
}

#[derive(Debug, Subcommand)]
pub enum SubscriptionCommand {
    /// List a user's subscriptions.
    List {
        #[arg(long)]
        user: String,
    },

    /// Show one subscription.
    Get { id: i64 },

    /// Register a new subscription.
    Create(CreateSubscription),

    /// Delete a subscription.
    Delete { id: i64 },
}

#[derive(Debug, Args)]
pub struct CreateSubscription {
    #[arg(long)]
    user: String,

    #[arg(long)]
    email: String,

    #[arg(long)]
    city: String,

    #[arg(long)]
    country: Option<String>,

    /// Alert type, repeatable: high-temperature, low-temperature,
    /// poor-air-quality, extreme-weather, high-wind, heavy-rain, uv-warning.
    #[arg(long = "alert", required = true)]
    alerts: Vec<String>,

    #[arg(long)]
    max_temp: Option<f64>,

    #[arg(long)]
    min_temp: Option<f64>,

    #[arg(long)]
    max_aqi: Option<i32>,

    #[arg(long)]
    max_wind: Option<f64>,

    #[arg(long)]
    max_precipitation: Option<f64>,

    #[arg(long)]
    max_uv: Option<i32>,

    /// Register the subscription disabled.
    #[arg(long)]
    inactive: bool,
}

impl CreateSubscription {
    fn into_request(self) -> anyhow::Result<SubscriptionRequest> {
        let alert_types = self
            .alerts
            .iter()
            .map(|a| AlertType::try_from(a.as_str()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let thresholds = AlertThresholds {
            max_temperature: self.max_temp,
            min_temperature: self.min_temp,
            max_aqi: self.max_aqi,
            max_wind_speed: self.max_wind,
            max_precipitation: self.max_precipitation,
            max_uv_index: self.max_uv,
        };

        Ok(SubscriptionRequest {
            user_id: self.user,
            email: self.email,
            location: SubscriptionLocation {
                city: self.city,
                country: self.country,
                latitude: None,
                longitude: None,
            },
            alert_types,
            thresholds: (thresholds != AlertThresholds::default()).then_some(thresholds),
            active: !self.inactive,
        })
    }
}

/// Tells the user to sign in again after the backend rejects the token.
#[derive(Debug)]
pub struct LoginHint;

impl Navigator for LoginHint {
    fn navigate(&self, path: &str) {
        if path == LOGIN_PATH {
            eprintln!("Your session has expired. Run `skywatch login` to sign in again.");
        }
    }
}

/// Everything a command needs, created once at startup.
pub struct App {
    pub config: Config,
    pub tokens: Arc<FileTokenStore>,
    pub client: ApiClient,
    pub cache: QueryCache<WeatherResponse>,
}

impl App {
    pub fn init() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let tokens = Arc::new(FileTokenStore::open_default()?);
        let client = ApiClient::from_config(&config, tokens.clone(), Arc::new(LoginHint))
            .context("Failed to build HTTP client")?;
        let cache = QueryCache::new(config.cache_ttl());

        tracing::debug!(api_url = client.base_url(), "Client ready");

        Ok(Self { config, tokens, client, cache })
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => {
                let config = Config::load()?;
                let updated = interactive::configure(config)?;
                updated.save()?;
                println!("Configuration saved to {}", Config::config_file_path()?.display());
            }
            Command::Login { token } => {
                let tokens = FileTokenStore::open_default()?;
                let token = match token {
                    Some(t) => t,
                    None => interactive::prompt_token()?,
                };
                if token.trim().is_empty() {
                    return Err(anyhow!("Token must not be empty"));
                }
                tokens.set(&token)?;
                println!("Token stored.");
            }
            Command::Logout => {
                FileTokenStore::open_default()?.clear()?;
                println!("Logged out.");
            }
            Command::Show { city, country } => {
                let app = App::init()?;
                let city = city.unwrap_or_else(|| app.config.default_city().to_string());
                show(&app, &city, country.as_deref()).await?;
            }
            Command::Dashboard => {
                let app = App::init()?;
                interactive::dashboard(app).await?;
            }
            Command::Forecast { city, days, country } => {
                let app = App::init()?;
                let forecast = app.client.get_forecast(&city, Some(days), country.as_deref()).await?;
                print!("{}", render::render_forecast(&forecast));
            }
            Command::History { city, from, to, country, aqi } => {
                let app = App::init()?;
                let from = parse_instant(&from)?;
                let to = parse_instant(&to)?;
                if aqi {
                    let history =
                        app.client.get_aqi_history(&city, from, to, country.as_deref()).await?;
                    print!("{}", render::render_aqi_history(&history));
                } else {
                    let history =
                        app.client.get_history(&city, from, to, country.as_deref()).await?;
                    print!("{}", render::render_weather_history(&history));
                }
            }
            Command::Subscriptions(cmd) => {
                let app = App::init()?;
                subscriptions(&app, cmd).await?;
            }
        }

        Ok(())
    }
}

async fn show(app: &App, city: &str, country: Option<&str>) -> anyhow::Result<()> {
    let key = QueryKey::weather(city, country);
    let client = app.client.clone();
    let (city, country) = (city.to_string(), country.map(str::to_string));

    let result = app
        .cache
        .fetch(key, move || async move { client.get_weather(&city, country.as_deref()).await })
        .await;

    match result {
        Ok(data) => {
            print!("{}", render::render_view(&DashboardView::Ready { data, refreshing: false }));
            Ok(())
        }
        Err(err) => {
            print!("{}", render::render_view(&DashboardView::Error));
            Err(err.into())
        }
    }
}

async fn subscriptions(app: &App, cmd: SubscriptionCommand) -> anyhow::Result<()> {
    match cmd {
        SubscriptionCommand::List { user } => {
            let subs = app.client.get_subscriptions(&user).await?;
            if subs.is_empty() {
                println!("No subscriptions for {user}.");
            }
            for sub in &subs {
                println!("{}", render::render_subscription(sub));
            }
        }
        SubscriptionCommand::Get { id } => {
            let sub = app.client.get_subscription(id).await?;
            println!("{}", render::render_subscription(&sub));
        }
        SubscriptionCommand::Create(args) => {
            let request = args.into_request()?;
            let sub = app.client.create_subscription(&request).await?;
            println!("Created {}", render::render_subscription(&sub));
        }
        SubscriptionCommand::Delete { id } => {
            app.client.delete_subscription(id).await?;
            println!("Deleted subscription #{id}.");
        }
    }
    Ok(())
}

/// Accept `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 instant.
pub fn parse_instant(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| {
        format!("Invalid date '{value}'. Use YYYY-MM-DD or an RFC 3339 instant.")
    })?;
    date.and_hms_opt(0, 0, 0)
        .map(|ndt| ndt.and_utc())
        .ok_or_else(|| anyhow!("Invalid date '{value}'"))
}
