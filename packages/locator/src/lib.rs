#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! House-number detection along streets.
//!
//! Given the street fragments a search matched by name and a house number
//! query, the [`HouseDetector`] joins the fragments into continuous
//! streets, projects nearby buildings onto them, and scores the
//! buildings whose numbers fit the query. Map features come from any
//! [`FeatureSource`]; results are [`MatchResult`]s ordered best first.
//!
//! The engine is single-threaded and synchronous. Everything it derives
//! is cached on the detector and reused by later queries over the same
//! streets.

pub mod accumulator;
pub mod chain;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod merge;
pub mod number;
pub mod projection;
pub mod source;
pub mod street;
pub mod street_name;

pub use config::{load_config, parse_config};
pub use detector::HouseDetector;
pub use house_locator_models::{
    FeatureId, HouseLocatorConfig, LineFeature, LonLat, MatchResult, MatchSlot, PointFeature,
};
pub use number::{NumberRules, ParsedNumber};
pub use source::{FeatureSource, FeatureSourceError};

/// Errors surfaced by the house locator.
#[derive(Debug, thiserror::Error)]
pub enum HouseLocatorError {
    /// The feature source failed.
    #[error("Feature source error: {0}")]
    Source(#[from] FeatureSourceError),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document is malformed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}
