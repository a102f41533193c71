//! Agency API adapters.
//!
//! Each supported location gets one [`TransitApi`] implementation that knows
//! how to talk to its upstream (authentication, endpoints, payload quirks)
//! and normalizes everything into the shared prediction and incident types.

pub mod dmv;
pub mod sf;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::db::models::{LocationSlug, StaticData};
use crate::db::Database;
use crate::error::TransitError;

pub const DMV_BASE_URL: &str = "https://api.wmata.com";
pub const SF_BASE_URL: &str = "http://api.511.org";

/// A stop selected for a prediction query, with the agency that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionInput {
    pub stop_id: String,
    pub agency_id: String,
}

/// A single upcoming arrival at a stop.
///
/// Field names mirror the WMATA real-time payload; the SF adapter fills the
/// same shape from SIRI stop monitoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Prediction {
    /// Minutes until arrival, or a non-numeric marker ("ARR", "BRD", "--").
    pub min: String,
    /// Rider-facing name of the stop the prediction is for.
    pub location_name: String,
    /// Short code of the terminal station the vehicle is headed to.
    pub destination: String,
    /// Full name of the terminal station.
    #[serde(default)]
    pub destination_name: String,
    /// Line or route designator (e.g. "RD", "YELLOW").
    pub line: String,
}

/// A service disruption published by an agency.
#[derive(Debug, Clone)]
pub struct Incident {
    pub description: String,
    pub date_updated: DateTime<Utc>,
    /// Line/route designators the incident applies to.
    pub affected: Vec<String>,
    pub incident_type: String,
}

/// Background/foreground hex colors for rendering a line designator.
pub type LineColor = (&'static str, &'static str);

/// Everything the CLI needs from an agency, behind one seam so commands are
/// written once and work for every location.
#[async_trait]
pub trait TransitApi: Send + Sync {
    /// Downloads and parses the agency's static data (agencies and stops).
    async fn fetch_static_data(&self) -> Result<StaticData>;

    /// Fetches arrival predictions for the given stops.
    async fn fetch_predictions(&self, inputs: &[PredictionInput]) -> Result<Vec<Prediction>>;

    /// Fetches current service incidents.
    async fn fetch_incidents(&self) -> Result<Vec<Incident>>;

    /// Resolves a rider-typed station query into prediction inputs, applying
    /// agency-specific stop-id conventions.
    async fn prediction_input(&self, db: &Database, query: &str) -> Result<Vec<PredictionInput>>;

    /// Colors for a line designator, defaulting to black text on a white
    /// badge for designators the agency does not recognize.
    fn line_color(&self, line: &str) -> LineColor;

    /// Whether a prediction describes a non-revenue ("ghost") vehicle that
    /// should be hidden from riders.
    fn is_ghost_train(&self, prediction: &Prediction) -> bool;
}

/// Builds the adapter for a location from its config section.
pub fn client_for(location: LocationSlug, config: &Config) -> Result<Box<dyn TransitApi>> {
    match location {
        LocationSlug::Dmv => {
            let key = require_api_key(&config.dmv.api_key, "dmv.api_key")?;
            Ok(Box::new(dmv::DmvApi::new(
                key,
                DMV_BASE_URL,
                config.core.max_station_matches,
            )?))
        }
        LocationSlug::Sf => {
            let key = require_api_key(&config.sf.api_key, "sf.api_key")?;
            Ok(Box::new(sf::SfApi::new(
                key,
                SF_BASE_URL,
                config.core.max_station_matches,
            )))
        }
    }
}

fn require_api_key<'a>(key: &'a str, config_key: &str) -> Result<&'a str> {
    if key.is_empty() {
        return Err(TransitError::Config(format!(
            "no api key found in config at '{config_key}'"
        ))
        .into());
    }
    Ok(key)
}
