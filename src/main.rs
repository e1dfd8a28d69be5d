use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use aqi_insight::{
    AqiCategory, ArtifactCache, Dashboard, FeatureVector, Pollutant, SystemClock,
    config::AppConfig, preprocess, train_from_path,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "aqi-insight")]
#[command(about = "Air-quality data cleaning, AQI model training and dashboard views")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill gaps per city and write the cleaned dataset
    Preprocess {
        /// Raw dataset (defaults to paths.raw_data)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Cleaned dataset to write (defaults to paths.cleaned_data)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Train the AQI model on the cleaned dataset
    Train {
        /// Cleaned dataset (defaults to paths.cleaned_data)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Model artifact to write (defaults to paths.model)
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Predict AQI from pollutant concentrations
    Predict {
        #[command(flatten)]
        readings: Readings,
        /// Model artifact (defaults to paths.model)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Print the prediction as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cities in the cleaned dataset
    Cities,
    /// Show a city's AQI history and statistics
    History {
        #[arg(long)]
        city: String,
        /// First day, YYYY-MM-DD (defaults to the city's first record)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (defaults to the city's last record)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Pollutant to summarise alongside AQI
        #[arg(long, default_value = "PM2.5")]
        pollutant: Pollutant,
        /// Print the history as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the category and health advice for an AQI value
    Advise {
        #[arg(long, value_parser = non_negative)]
        aqi: f64,
    },
}

/// Concentrations in µg/m³ (CO in mg/m³).
#[derive(Args, Debug)]
struct Readings {
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    pm25: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    pm10: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    no: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    no2: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    nox: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    nh3: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    co: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    so2: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    o3: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    benzene: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    toluene: f64,
    #[arg(long, default_value_t = 0.0, value_parser = non_negative)]
    xylene: f64,
}

impl From<&Readings> for FeatureVector {
    fn from(r: &Readings) -> Self {
        Self {
            pm25: r.pm25,
            pm10: r.pm10,
            no: r.no,
            no2: r.no2,
            nox: r.nox,
            nh3: r.nh3,
            co: r.co,
            so2: r.so2,
            o3: r.o3,
            benzene: r.benzene,
            toluene: r.toluene,
            xylene: r.xylene,
        }
    }
}

fn non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("`{s}` must be zero or greater"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("aqi_insight=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Preprocess { input, output } => {
            let input = input.unwrap_or(config.paths.raw_data);
            let output = output.unwrap_or(config.paths.cleaned_data);
            let summary = preprocess::run_preprocess(&input, &output)
                .with_context(|| format!("Failed to preprocess {}", input.display()))?;

            println!(
                "Preprocessing complete: {} of {} rows kept across {} cities ({} without AQI, {} incomplete, {} malformed values)",
                summary.output_rows,
                summary.input_rows,
                summary.cities,
                summary.dropped_missing_target,
                summary.dropped_incomplete,
                summary.malformed_values
            );
            println!("Cleaned data saved to {}", output.display());
        }
        Command::Train { input, model } => {
            let input = input.unwrap_or(config.paths.cleaned_data);
            let model = model.unwrap_or(config.paths.model);
            let persisted = train_from_path(&input, &model, &config.training, &SystemClock)
                .with_context(|| format!("Failed to train on {}", input.display()))?;

            match persisted.model.test_rmse {
                Some(rmse) => println!("Root Mean Squared Error on the test set: {rmse:.2}"),
                None => println!("Trained without a holdout set"),
            }
            println!("Model saved to {}", model.display());
        }
        Command::Predict {
            readings,
            model,
            json,
        } => {
            let model_path = model.unwrap_or(config.paths.model);
            let cache = ArtifactCache::new(config.paths.cleaned_data, model_path);
            let mut dashboard = Dashboard::new(
                cache,
                config.dashboard.model_max_age_hours,
                Arc::new(SystemClock),
            );

            let prediction = dashboard
                .predict(&FeatureVector::from(&readings))
                .context("Prediction failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else {
                println!("Predicted AQI: {}", prediction.aqi);
                println!("Category: {}", prediction.category);
                println!("{}", prediction.category.advice());
            }
        }
        Command::Cities => {
            let mut dashboard = Dashboard::from_config(&config);
            for city in dashboard.cities().context("Failed to list cities")? {
                println!("{city}");
            }
        }
        Command::History {
            city,
            from,
            to,
            pollutant,
            json,
        } => {
            let mut dashboard = Dashboard::from_config(&config);
            let history = dashboard
                .history(&city, from, to, pollutant)
                .with_context(|| format!("Failed to load history for {city}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(());
            }

            println!(
                "{} from {} to {} ({} records)",
                history.city,
                history.range.start,
                history.range.end,
                history.records.len()
            );
            println!("{:<12} {:>8} {:>10}  Bucket", "Date", "AQI", pollutant.column());
            for obs in &history.records {
                println!(
                    "{:<12} {:>8.1} {:>10.2}  {}",
                    obs.date.to_string(),
                    obs.aqi,
                    obs.pollutant(pollutant),
                    obs.aqi_bucket
                );
            }

            if let Some(stats) = &history.aqi {
                println!(
                    "AQI: mean {:.1}, median {:.1}, std {:.1}, min {:.1}, max {:.1}",
                    stats.mean, stats.median, stats.std_dev, stats.min, stats.max
                );
            }
            if let Some(stats) = &history.pollutant_stats {
                println!(
                    "{} ({}): mean {:.2}, min {:.2}, max {:.2}",
                    pollutant,
                    pollutant.unit(),
                    stats.mean,
                    stats.min,
                    stats.max
                );
            }
            for (category, count) in &history.buckets {
                println!("{category}: {count} days");
            }
        }
        Command::Advise { aqi } => {
            let category = AqiCategory::from_aqi(aqi);
            println!("{category} ({})", category.color());
            println!("{}", category.advice());
        }
    }

    Ok(())
}
