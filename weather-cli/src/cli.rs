use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use std::path::{Path, PathBuf};
use tracing::info;
use weather_core::{
    Config, HttpWeatherSource, MemoryStore, PgStore, Pipeline, RunReport, WeatherStore,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-etl", version, about = "Load current weather into PostgreSQL")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one extract, transform, load pass.
    Run(RunArgs),

    /// Interactively write the config file.
    Configure,

    /// Print where the config file is read from.
    ConfigPath,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Weather API base URL, e.g. "http://localhost:5000".
    #[arg(long)]
    pub base_url: Option<String>,

    /// Fetch only this city; repeat for several. Skips the locations endpoint.
    #[arg(long = "city", value_name = "NAME")]
    pub cities: Vec<String>,

    /// Load into memory instead of the database.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Run(RunArgs::default())) {
            Command::Run(args) => run_etl(&path, args).await,
            Command::Configure => configure(&path),
            Command::ConfigPath => {
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}

async fn run_etl(path: &Path, args: RunArgs) -> Result<()> {
    let mut cfg = Config::load_from(path)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
    if let Some(url) = args.base_url {
        cfg.api.base_url = url;
    }
    cfg.validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    let source =
        HttpWeatherSource::from_config(&cfg.api).context("Failed to set up weather API client")?;
    let cities = if args.cities.is_empty() {
        cfg.api.cities.clone()
    } else {
        args.cities
    };

    let mut memory;
    let mut postgres;
    let store: &mut dyn WeatherStore = if args.dry_run {
        info!("Dry run: records are kept in memory only");
        memory = MemoryStore::new();
        &mut memory
    } else {
        postgres = PgStore::connect(&cfg.database)
            .await
            .context("Cannot load without a database")?;
        &mut postgres
    };

    let report = Pipeline::new(&source, store)
        .with_rules(cfg.validation.clone())
        .with_cities(cities)
        .run()
        .await
        .context("Load stage failed")?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Cities requested: {} ({:?})",
        report.cities.len(),
        report.city_source
    );
    println!("Records extracted: {}", report.extracted);
    for failure in &report.failures {
        println!("  skipped {}: {}", failure.city, failure.error);
    }
    match &report.rejected {
        Some(err) => println!(
            "Records dropped: {} (batch rejected: {err})",
            report.transform.dropped()
        ),
        None => println!(
            "Records dropped: {} (incomplete {}, out of range {}, bad timestamp {})",
            report.transform.dropped(),
            report.transform.dropped_incomplete,
            report.transform.dropped_out_of_range,
            report.transform.dropped_bad_timestamp,
        ),
    }
    println!(
        "Loaded: {} new cities, {} weather records",
        report.load.cities_inserted, report.load.records_inserted
    );
}

fn configure(path: &Path) -> Result<()> {
    let mut cfg = Config::load_from(path)?;

    cfg.api.base_url = Text::new("Weather API base URL:")
        .with_default(&cfg.api.base_url)
        .prompt()?;
    cfg.database.host = Text::new("Database host:")
        .with_default(&cfg.database.host)
        .prompt()?;
    cfg.database.port = CustomType::<u16>::new("Database port:")
        .with_default(cfg.database.port)
        .with_error_message("Please enter a valid port number")
        .prompt()?;
    cfg.database.database = Text::new("Database name:")
        .with_default(&cfg.database.database)
        .prompt()?;
    cfg.database.user = Text::new("Database user:")
        .with_default(&cfg.database.user)
        .prompt()?;

    let password = Password::new("Database password (leave empty to keep current):")
        .without_confirmation()
        .prompt()?;
    if !password.is_empty() {
        cfg.database.password = password;
    }

    cfg.validate()?;
    cfg.save_to(path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}
