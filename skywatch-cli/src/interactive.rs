//! Prompt-driven commands.

use std::sync::Arc;

use inquire::{CustomType, InquireError, Password, Text};
use skywatch_core::{
    Config, Dashboard, DashboardView, TokenStore, WeatherSource,
    config::{DEFAULT_API_URL, DEFAULT_CACHE_TTL_SECS},
    render,
};

use crate::cli::App;

const QUIT: &str = ":q";
const REFRESH: &str = ":r";
const LOGOUT: &str = ":logout";

/// Ask for each configurable value, offering the current one as default.
pub fn configure(mut config: Config) -> anyhow::Result<Config> {
    let api_url = Text::new("Backend API URL:")
        .with_default(config.api_url.as_deref().unwrap_or(DEFAULT_API_URL))
        .prompt()?;
    config.api_url = Some(api_url.trim().trim_end_matches('/').to_string());

    let city = Text::new("Default city:").with_default(config.default_city()).prompt()?;
    config.default_city = Some(city.trim().to_string()).filter(|c| !c.is_empty());

    let ttl = CustomType::<u64>::new("Cache freshness (seconds):")
        .with_default(config.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
        .with_error_message("Please enter a whole number of seconds")
        .prompt()?;
    config.cache_ttl_secs = Some(ttl);

    Ok(config)
}

pub fn prompt_token() -> anyhow::Result<String> {
    Ok(Password::new("API token:").without_confirmation().prompt()?)
}

/// Search loop: each submitted city becomes the active query.
pub async fn dashboard(app: App) -> anyhow::Result<()> {
    let source: Arc<dyn WeatherSource> = Arc::new(app.client.clone());
    let mut dash = Dashboard::new(source, app.cache.clone(), app.config.default_city());

    dash.load();
    print_view(&dash.view());
    print_view(&dash.settled().await);

    loop {
        let input = match Text::new("City:")
            .with_placeholder("e.g. London, Tokyo, New York")
            .with_help_message(":r refresh, :logout sign out, :q quit")
            .prompt()
        {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        match input.trim() {
            QUIT => break,
            REFRESH => dash.refresh(),
            LOGOUT => {
                app.tokens.clear()?;
                app.cache.clear();
                println!("Logged out. Run `skywatch login` to sign in again.");
                break;
            }
            _ => {
                dash.set_search_input(input);
                if !dash.submit() {
                    continue;
                }
            }
        }

        let pending = dash.view();
        let settled_already = matches!(pending, DashboardView::Ready { refreshing: false, .. });
        if !settled_already && pending != DashboardView::Error {
            print_view(&pending);
        }
        print_view(&dash.settled().await);
    }

    Ok(())
}

fn print_view(view: &DashboardView) {
    println!();
    print!("{}", render::render_view(view));
}
