use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password};
use ipweather_core::{Config, Dashboard, FallbackPolicy, LocationResolver, ServiceId};
use tracing::{debug, info};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "ipweather", version, about = "Current weather for wherever you are")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key for a service.
    Configure {
        /// Service short name: "apiip", "ipinfo" or "weatherapi".
        service: String,
    },

    /// Resolve your location and show its current weather.
    Show {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Report a failed location lookup instead of using the default location.
        #[arg(long)]
        strict: bool,

        /// Hide the current time.
        #[arg(long)]
        no_time: bool,
    },

    /// Resolve and print your location only.
    Locate {
        /// Report a failed location lookup instead of using the default location.
        #[arg(long)]
        strict: bool,
    },

    /// Print the path of the configuration file.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { service } => configure(&service),
            Command::Show { json, strict, no_time } => show(json, strict, no_time).await,
            Command::Locate { strict } => locate(strict).await,
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
                Ok(())
            }
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load()?.with_env_overrides()?;
    debug!(locator = ?config.locator, "configuration loaded");
    Ok(config)
}

fn dashboard(config: &Config, strict: bool) -> anyhow::Result<Dashboard> {
    let dashboard = Dashboard::from_config(config)?;
    Ok(if strict { dashboard.with_policy(FallbackPolicy::Fail) } else { dashboard })
}

async fn show(json: bool, strict: bool, no_time: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let offset = config.display.utc_offset()?;
    let dashboard = dashboard(&config, strict)?;

    let report = dashboard.run(Utc::now().with_timezone(&offset)).await;

    if json {
        let text = serde_json::to_string_pretty(&report.to_json())
            .context("Failed to serialize report")?;
        println!("{text}");
    } else {
        print!("{}", report.render_text(config.display.show_time && !no_time));
    }

    Ok(())
}

async fn locate(strict: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let resolver = LocationResolver::from_config(&config)?;
    let resolver = if strict { resolver.with_policy(FallbackPolicy::Fail) } else { resolver };

    match resolver.resolve().await {
        Ok(coordinates) => {
            println!("{} ({}, {})", coordinates.city, coordinates.latitude, coordinates.longitude);
        }
        Err(err) => {
            info!(error = %err, "location unavailable");
            println!("Error: {}", ipweather_core::dashboard::LOCATION_UNAVAILABLE);
        }
    }

    Ok(())
}

fn configure(service: &str) -> anyhow::Result<()> {
    let id = ServiceId::try_from(service)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key for '{id}' must not be empty");
    }

    config.upsert_provider_api_key(id, api_key);

    if id.is_locator() && config.locator.as_deref() != Some(id.as_str()) {
        let switch = Confirm::new(&format!("Use {id} as the active geolocation provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if switch {
            config.set_locator(id);
        }
    }

    let path = config.save()?;
    println!("Saved {id} credentials to {}", path.display());

    if !config.is_provider_configured(ServiceId::WeatherApi) {
        println!("Next: run `ipweather configure weatherapi` to add a weather key.");
    } else if config.locator.is_none() {
        println!("Next: run `ipweather configure apiip` (or ipinfo) to add a geolocation key.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_show_flags() {
        let cli = Cli::try_parse_from(["ipweather", "show", "--json", "--strict"]).unwrap();

        match cli.command {
            Command::Show { json, strict, no_time } => {
                assert!(json);
                assert!(strict);
                assert!(!no_time);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_configure_service() {
        let cli = Cli::try_parse_from(["ipweather", "configure", "weatherapi"]).unwrap();
        assert!(matches!(cli.command, Command::Configure { service } if service == "weatherapi"));
    }

    #[test]
    fn config_path_subcommand_is_kebab_case() {
        let cli = Cli::try_parse_from(["ipweather", "config-path"]).unwrap();
        assert!(matches!(cli.command, Command::ConfigPath));
    }
}
