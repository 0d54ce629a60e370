use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cityweather_core::{
    CityQueryController, Config, Phase, ProviderConfig, ProviderId, Settled, ViewModel, WeatherProvider,
    provider::{self, backend, open_meteo},
};
use inquire::{Confirm, Text};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Current weather for any city")]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by the lookup commands.
#[derive(Debug, clap::Args)]
pub struct LookupArgs {
    /// Provider to use instead of the configured default: "backend" or "open-meteo".
    #[arg(long)]
    provider: Option<String>,

    /// Lookup timeout in seconds, overriding the config file.
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the view-model as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure where a provider lives.
    Configure {
        /// Provider short name, e.g. "backend" or "open-meteo".
        provider: String,
    },

    /// Show current weather for a city.
    Show {
        /// City name.
        city: String,

        #[command(flatten)]
        lookup: LookupArgs,
    },

    /// Read city names from stdin, one per line; a blank line clears.
    Interactive {
        #[command(flatten)]
        lookup: LookupArgs,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { city, lookup } => show(city, &lookup).await,
            Command::Interactive { lookup } => interactive(&lookup).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;
    let existing = config.provider_config(id).cloned();

    let settings = match id {
        ProviderId::Backend => {
            let current = existing
                .map(|cfg| cfg.base_url)
                .unwrap_or_else(|| backend::DEFAULT_BASE_URL.to_string());
            ProviderConfig { base_url: prompt_url("Backend base URL:", &current)?, geocoding_url: None }
        }
        ProviderId::OpenMeteo => {
            let (forecast, geocoding) = match existing {
                Some(cfg) => {
                    let geocoding = cfg.geocoding_url.unwrap_or_else(|| cfg.base_url.clone());
                    (cfg.base_url, geocoding)
                }
                None => (
                    open_meteo::FORECAST_BASE_URL.to_string(),
                    open_meteo::GEOCODING_BASE_URL.to_string(),
                ),
            };
            ProviderConfig {
                base_url: prompt_url("Open-Meteo forecast URL:", &forecast)?,
                geocoding_url: Some(prompt_url("Open-Meteo geocoding URL:", &geocoding)?),
            }
        }
    };
    config.upsert_provider(id, settings);

    if config.default_provider_id().ok() != Some(id) {
        let make_default = Confirm::new(&format!("Use {id} by default?"))
            .with_default(true)
            .prompt()
            .context("Configuration cancelled")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    // Fail now rather than on the next lookup.
    provider::provider_from_config(id, &config)?;

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn prompt_url(message: &str, default: &str) -> anyhow::Result<String> {
    let answer = Text::new(message)
        .with_default(default)
        .prompt()
        .context("Configuration cancelled")?;
    Ok(answer.trim().to_string())
}

fn controller_for(args: &LookupArgs) -> anyhow::Result<CityQueryController> {
    let mut config = Config::load()?;
    if let Some(secs) = args.timeout {
        config.timeout_secs = Some(secs);
    }

    let id = match args.provider.as_deref() {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };
    let provider: Arc<dyn WeatherProvider> = provider::provider_from_config(id, &config)?;
    tracing::debug!(provider = %id, timeout = ?config.lookup_timeout(), "controller ready");

    Ok(CityQueryController::new(provider).with_timeout(config.lookup_timeout()))
}

fn print_view(vm: &ViewModel, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", render::render_json(vm)?);
    } else {
        let text = render::render_text(vm);
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}

async fn show(city: String, args: &LookupArgs) -> anyhow::Result<()> {
    let mut controller = controller_for(args)?;

    controller.set_city_name(city);
    if controller.submit().is_none() {
        anyhow::bail!("City name must not be empty");
    }

    let vm = controller.settle_all().await;
    finish_show(&vm, args.json)
}

/// Prints the settled view of a one-shot lookup. A failed lookup exits
/// non-zero in both output modes; `--json` still prints the error view first.
fn finish_show(vm: &ViewModel, json: bool) -> anyhow::Result<()> {
    if json || vm.phase != Phase::Error {
        print_view(vm, json)?;
    }
    if vm.phase == Phase::Error {
        anyhow::bail!(vm.error_message.clone().unwrap_or_default());
    }
    Ok(())
}

async fn interactive(args: &LookupArgs) -> anyhow::Result<()> {
    let mut controller = controller_for(args)?;

    if !args.json {
        eprintln!("Enter a city name (blank line clears, Ctrl-D quits).");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    drive_lines(&mut controller, stdin, |vm| print_view(vm, args.json)).await
}

/// Feeds each input line to the controller as the new city name and submits
/// it, emitting a view after every edit and every applied completion. Lines
/// are passed through as typed; an empty line clears.
async fn drive_lines<R>(
    controller: &mut CityQueryController,
    reader: R,
    mut emit: impl FnMut(&ViewModel) -> anyhow::Result<()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                controller.set_city_name(line);
                controller.submit();
                emit(&controller.view_model())?;
            }
            Some(settled) = controller.next_settled() => {
                if let Settled::Applied(_) = settled {
                    emit(&controller.view_model())?;
                }
            }
        }
    }

    // Lookups are bounded by the controller timeout, so this always ends.
    if controller.pending().is_some() {
        let vm = controller.settle_all().await;
        emit(&vm)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use cityweather_core::{CityInfo, CurrentWeather, LookupError, WeatherReport};

    use super::*;

    /// Answers every city immediately, except "Slowtown" and "Oslo" which
    /// take a while.
    #[derive(Debug)]
    struct DelayedProvider;

    #[async_trait]
    impl WeatherProvider for DelayedProvider {
        async fn lookup(&self, city: &str) -> Result<WeatherReport, LookupError> {
            if matches!(city, "Slowtown" | "Oslo") {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            Ok(report(city))
        }
    }

    fn report(city: &str) -> WeatherReport {
        WeatherReport {
            weather: CurrentWeather {
                temperature_c: 12.0,
                wind_speed_kmh: 5.0,
                weather_code: 2,
                observed_at: "2024-05-01T14:00".to_string(),
            },
            city: CityInfo {
                name: city.to_string(),
                admin_region: String::new(),
                country: "Nowhere".to_string(),
                population: 1_000,
                elevation_m: 10.0,
                latitude: 1.0,
                longitude: 2.0,
            },
        }
    }

    async fn run_lines(input: &'static [u8]) -> Vec<ViewModel> {
        let mut controller = CityQueryController::new(Arc::new(DelayedProvider));
        let mut views = Vec::new();
        drive_lines(&mut controller, input, |vm| {
            views.push(vm.clone());
            Ok(())
        })
        .await
        .unwrap();
        views
    }

    fn error_vm() -> ViewModel {
        ViewModel {
            phase: Phase::Error,
            city_name: "Atlantis".to_string(),
            error_message: Some("City not found".to_string()),
            weather: None,
            city_info: None,
            category: None,
        }
    }

    #[test]
    fn failed_show_is_an_error_in_json_mode_too() {
        let err = finish_show(&error_vm(), true).unwrap_err();
        assert_eq!(err.to_string(), "City not found");

        let err = finish_show(&error_vm(), false).unwrap_err();
        assert_eq!(err.to_string(), "City not found");
    }

    #[test]
    fn successful_show_is_ok() {
        let mut vm = error_vm();
        vm.phase = Phase::Idle;
        vm.error_message = None;
        assert!(finish_show(&vm, true).is_ok());
        assert!(finish_show(&vm, false).is_ok());
    }

    #[tokio::test]
    async fn later_line_supersedes_slow_lookup() {
        let views = run_lines(b"Slowtown\nParis\n").await;

        assert_eq!(views[0].phase, Phase::Loading);
        assert_eq!(views[0].city_name, "Slowtown");

        let last = views.last().unwrap();
        assert_eq!(last.phase, Phase::Success);
        assert_eq!(last.city_info.as_ref().map(|c| c.name.as_str()), Some("Paris"));

        assert!(
            views
                .iter()
                .filter_map(|vm| vm.city_info.as_ref())
                .all(|c| c.name != "Slowtown"),
            "superseded lookup leaked into the output: {views:?}"
        );
    }

    #[tokio::test]
    async fn blank_line_clears_and_abandons_lookup() {
        let views = run_lines(b"Oslo\n\n").await;

        let phases: Vec<_> = views.iter().map(|vm| vm.phase).collect();
        assert_eq!(phases, vec![Phase::Loading, Phase::Idle]);
        assert_eq!(views[1].city_name, "");
    }

    #[tokio::test]
    async fn lines_are_passed_through_untrimmed() {
        let views = run_lines(b"  Paris \n").await;

        assert_eq!(views[0].city_name, "  Paris ");
        let last = views.last().unwrap();
        assert_eq!(last.phase, Phase::Success);
        assert_eq!(last.city_info.as_ref().map(|c| c.name.as_str()), Some("  Paris "));
    }
}
