#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the house-number locator.
//!
//! Loads map features from a `GeoJSON` file, selects candidate streets by
//! name and/or area, and prints the located buildings as JSON.

mod selection;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use house_locator::{HouseDetector, HouseLocatorConfig, load_config};
use house_locator_models::{FeatureId, LonLat};
use house_locator_spatial::FeatureIndex;
use serde::Serialize;

use crate::selection::{StreetFilter, parse_lon_lat};

#[derive(Parser)]
#[command(name = "house_locator", about = "Locate buildings by house number")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the buildings carrying a house number
    Locate {
        /// `GeoJSON` `FeatureCollection` with streets and buildings
        #[arg(long)]
        features: PathBuf,
        /// House number to look for (e.g. "12", "12a", "12-14")
        #[arg(long)]
        number: String,
        /// Only consider streets with this name
        #[arg(long)]
        street: Option<String>,
        /// Only consider streets near this point, given as "lon,lat"
        #[arg(long, value_parser = parse_lon_lat)]
        near: Option<LonLat>,
        /// Search radius around `--near`, in metres
        #[arg(long, default_value = "500")]
        radius: f64,
        /// TOML file overriding the detector settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Read "12-34" as the single American number 1234
        #[arg(long)]
        american: bool,
    },
    /// Show how street fragments are merged
    Streets {
        /// `GeoJSON` `FeatureCollection` with streets
        #[arg(long)]
        features: PathBuf,
        /// Only show streets with this name
        #[arg(long)]
        street: Option<String>,
        /// TOML file overriding the detector settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// A merged street as printed by `streets`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreetSummary<'a> {
    name: &'a str,
    fragments: &'a [FeatureId],
    approx_length_m: f64,
}

fn read_config(path: Option<&Path>) -> Result<HouseLocatorConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => load_config(path)?,
        None => HouseLocatorConfig::default(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Locate {
            features,
            number,
            street,
            near,
            radius,
            config,
            american,
        } => {
            let mut config = read_config(config.as_deref())?;
            config.american_numbers |= american;

            let index = FeatureIndex::load(&features)?;
            let filter = StreetFilter {
                name: street,
                near: near.map(|center| (center, radius)),
            };
            let ids = filter.select(&index);
            log::info!("Searching {number:?} along {} street fragments", ids.len());

            let mut detector = HouseDetector::new(config);
            let results = detector.locate(&ids, &number, &index)?;
            log::info!("Found {} candidate buildings", results.len());

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Streets {
            features,
            street,
            config,
        } => {
            let config = read_config(config.as_deref())?;
            let index = FeatureIndex::load(&features)?;
            let filter = StreetFilter {
                name: street,
                near: None,
            };
            let ids = filter.select(&index);

            let mut detector = HouseDetector::new(config);
            detector.load_streets(&ids, &index)?;
            let count = detector.merge_streets();
            log::info!("Merged {} fragments into {count} streets", ids.len());

            let summaries: Vec<StreetSummary<'_>> = detector
                .merged_streets()
                .iter()
                .map(|s| StreetSummary {
                    name: s.name(),
                    fragments: s.fragments(),
                    approx_length_m: s.approx_length_m(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}
