//! WMATA adapter for the DMV location (DC, Maryland, Virginia).
//!
//! WMATA authenticates with an `api_key` HTTP header. Static data comes from
//! the rail GTFS archive; real-time data from the StationPrediction and
//! Incidents JSON endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use std::fs;
use tracing::debug;

use crate::api::{Incident, LineColor, Prediction, PredictionInput, TransitApi};
use crate::db::models::{LocationSlug, StaticData, StopType};
use crate::db::Database;
use crate::error::TransitError;
use crate::feed::gtfs;
use crate::fetch::auth::ApiKey;
use crate::fetch::{fetch_bytes, BasicClient};
use crate::resolve::resolve_stops;

/// WMATA's GTFS feed has no agency_id column, so rail stops are pinned to
/// this designator.
const RAIL_AGENCY_ID: &str = "MET";

/// WMATA timestamps carry no offset; they are taken as UTC.
const DATETIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct DmvApi {
    client: ApiKey<BasicClient>,
    base_url: String,
    max_matches: usize,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(rename = "Trains", default)]
    trains: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct IncidentResponse {
    #[serde(rename = "Incidents", default)]
    incidents: Vec<RawIncident>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawIncident {
    description: String,
    date_updated: String,
    #[serde(default)]
    lines_affected: String,
    incident_type: String,
}

impl DmvApi {
    pub fn new(api_key: &str, base_url: &str, max_matches: usize) -> Result<Self> {
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| TransitError::Config("dmv api key contains invalid characters".into()))?;

        Ok(Self {
            client: ApiKey::new(BasicClient::new(), HeaderName::from_static("api_key"), key),
            base_url: base_url.to_string(),
            max_matches,
        })
    }
}

#[async_trait]
impl TransitApi for DmvApi {
    async fn fetch_static_data(&self) -> Result<StaticData> {
        let url = format!("{}/gtfs/rail-gtfs-static.zip", self.base_url);
        debug!(%url, "downloading static rail archive");
        let bytes = fetch_bytes(&self.client, &url)
            .await
            .context("failed to download static rail archive")?;

        let scratch =
            std::env::temp_dir().join(format!("transit-gtfs-{}", Utc::now().timestamp_millis()));
        fs::create_dir_all(&scratch)
            .with_context(|| format!("failed to create scratch directory {scratch:?}"))?;

        let result = gtfs::unzip_feed(&bytes, &scratch).and_then(|_| {
            gtfs::parse_feed_dir(&scratch, LocationSlug::Dmv, StopType::Train, RAIL_AGENCY_ID)
        });

        // Best effort; a leftover scratch directory is harmless.
        let _ = fs::remove_dir_all(&scratch);

        result
    }

    async fn fetch_predictions(&self, inputs: &[PredictionInput]) -> Result<Vec<Prediction>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        // The endpoint takes every station code in one comma-joined path
        // segment, so a multi-station query is still a single request.
        let codes: Vec<&str> = inputs.iter().map(|i| i.stop_id.as_str()).collect();
        let url = format!(
            "{}/StationPrediction.svc/json/GetPrediction/{}",
            self.base_url,
            codes.join(",")
        );

        let body = fetch_bytes(&self.client, &url)
            .await
            .context("failed to fetch rail predictions")?;
        parse_predictions(&body)
    }

    async fn fetch_incidents(&self) -> Result<Vec<Incident>> {
        let url = format!("{}/Incidents.svc/json/Incidents", self.base_url);
        let body = fetch_bytes(&self.client, &url)
            .await
            .context("failed to fetch rail incidents")?;
        parse_incidents(&body)
    }

    async fn prediction_input(&self, db: &Database, query: &str) -> Result<Vec<PredictionInput>> {
        let stops = resolve_stops(db, LocationSlug::Dmv, query, self.max_matches).await?;

        let mut inputs = Vec::new();
        for stop in &stops {
            for code in split_platform_codes(&stop.stop_id) {
                inputs.push(PredictionInput {
                    stop_id: code,
                    agency_id: stop.agency_id.clone(),
                });
            }
        }

        Ok(inputs)
    }

    fn line_color(&self, line: &str) -> LineColor {
        match line {
            "RD" => ("#BF0D3E", "#FFFFFF"),
            "OR" => ("#ED8B00", "#000000"),
            "YL" => ("#FFD100", "#000000"),
            "GR" => ("#00B140", "#FFFFFF"),
            "BL" => ("#009CDE", "#FFFFFF"),
            "SV" => ("#919D9D", "#000000"),
            _ => ("#FFFFFF", "#000000"),
        }
    }

    /// Non-revenue trains report a sentinel in the line field ("--" or "No")
    /// or "No Passenger" as their destination. The minutes field is not a
    /// signal: revenue trains legitimately report "--" minutes.
    fn is_ghost_train(&self, prediction: &Prediction) -> bool {
        prediction.line == "--"
            || prediction.line == "No"
            || prediction.destination_name == "No Passenger"
    }
}

fn parse_predictions(body: &[u8]) -> Result<Vec<Prediction>> {
    let response: PredictionResponse =
        serde_json::from_slice(body).context("failed to decode rail predictions")?;
    Ok(response.trains)
}

fn parse_incidents(body: &[u8]) -> Result<Vec<Incident>> {
    let response: IncidentResponse =
        serde_json::from_slice(body).context("failed to decode rail incidents")?;

    response
        .incidents
        .into_iter()
        .map(|raw| {
            let date_updated = parse_datetime(&raw.date_updated)
                .with_context(|| format!("bad incident timestamp '{}'", raw.date_updated))?;

            Ok(Incident {
                description: raw.description,
                date_updated,
                affected: parse_lines_affected(&raw.lines_affected),
                incident_type: raw.incident_type,
            })
        })
        .collect()
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    Ok(NaiveDateTime::parse_from_str(raw, DATETIME_LAYOUT)?.and_utc())
}

/// `LinesAffected` is a semicolon-joined, space-padded list with trailing
/// separators (e.g. `"RD; GR;"`).
fn parse_lines_affected(raw: &str) -> Vec<String> {
    raw.replace(' ', "")
        .split(';')
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Station stop_ids in the rail feed are prefixed (e.g. `STN_A01` or
/// `STN_A01_C01` for transfer stations); the prediction endpoint only accepts
/// the bare platform codes.
fn split_platform_codes(stop_id: &str) -> Vec<String> {
    let codes: Vec<String> = stop_id
        .split('_')
        .skip(1)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect();

    if codes.is_empty() {
        return vec![stop_id.to_string()];
    }
    codes
}
