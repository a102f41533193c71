//! 511.org adapter for the San Francisco Bay Area, currently scoped to BART.
//!
//! 511 authenticates with an `api_key` URL query parameter. Static data comes
//! from the SIRI stop-places endpoint; real-time data from SIRI stop
//! monitoring, one request per stop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::api::{Incident, LineColor, Prediction, PredictionInput, TransitApi};
use crate::db::models::{Agency, LocationSlug, StaticData};
use crate::db::Database;
use crate::feed::siri;
use crate::fetch::auth::UrlParam;
use crate::fetch::{fetch_bytes, BasicClient};
use crate::resolve::resolve_stops;

/// 511's operator designator for BART.
const BART_OPERATOR_ID: &str = "BA";

/// Line designators are padded to this width so colored output lines up.
const LINE_WIDTH: usize = 6;

pub struct SfApi {
    client: UrlParam<BasicClient>,
    base_url: String,
    max_matches: usize,
}

#[derive(Debug, Deserialize)]
struct MonitoringEnvelope {
    #[serde(rename = "ServiceDelivery")]
    service_delivery: MonitoringDelivery,
}

#[derive(Debug, Deserialize)]
struct MonitoringDelivery {
    #[serde(rename = "StopMonitoringDelivery")]
    stop_monitoring_delivery: StopMonitoringDelivery,
}

#[derive(Debug, Deserialize)]
struct StopMonitoringDelivery {
    #[serde(rename = "MonitoredStopVisit", default)]
    visits: Vec<MonitoredStopVisit>,
}

#[derive(Debug, Deserialize)]
struct MonitoredStopVisit {
    #[serde(rename = "MonitoredVehicleJourney")]
    journey: MonitoredVehicleJourney,
}

#[derive(Debug, Deserialize)]
struct MonitoredVehicleJourney {
    #[serde(rename = "LineRef", default)]
    line_ref: String,
    #[serde(rename = "DestinationRef", default)]
    destination_ref: String,
    #[serde(rename = "DestinationName", default)]
    destination_name: String,
    #[serde(rename = "MonitoredCall", default)]
    monitored_call: MonitoredCall,
}

#[derive(Debug, Default, Deserialize)]
struct MonitoredCall {
    #[serde(rename = "StopPointName", default)]
    stop_point_name: String,
    #[serde(rename = "ExpectedArrivalTime", default)]
    expected_arrival_time: String,
    #[serde(rename = "AimedArrivalTime", default)]
    aimed_arrival_time: String,
}

impl SfApi {
    pub fn new(api_key: &str, base_url: &str, max_matches: usize) -> Self {
        Self {
            client: UrlParam::new(
                BasicClient::new(),
                "api_key".to_string(),
                api_key.to_string(),
            ),
            base_url: base_url.to_string(),
            max_matches,
        }
    }
}

#[async_trait]
impl TransitApi for SfApi {
    async fn fetch_static_data(&self) -> Result<StaticData> {
        let url = format!(
            "{}/transit/stopplaces?operator_id={}&format=json",
            self.base_url, BART_OPERATOR_ID
        );
        debug!(%url, "downloading stop places");
        let body = fetch_bytes(&self.client, &url)
            .await
            .context("failed to download stop places")?;

        let stops = siri::parse_stop_places(&body, LocationSlug::Sf, BART_OPERATOR_ID)?;

        // The stop-places payload carries no agency record, so the operator
        // the stops were requested for is synthesized alongside them.
        let agencies = vec![Agency {
            agency_id: BART_OPERATOR_ID.to_string(),
            name: "Bay Area Rapid Transit".to_string(),
            location: LocationSlug::Sf,
            timezone: "America/Los_Angeles".to_string(),
            language: "en".to_string(),
        }];

        Ok(StaticData { agencies, stops })
    }

    async fn fetch_predictions(&self, inputs: &[PredictionInput]) -> Result<Vec<Prediction>> {
        let now = Utc::now();

        // Stop monitoring takes one stop per request, so multi-station
        // queries fan out sequentially.
        let mut predictions = Vec::new();
        for input in inputs {
            let url = format!(
                "{}/transit/StopMonitoring?agency={}&stopcode={}&format=json",
                self.base_url, input.agency_id, input.stop_id
            );

            let body = fetch_bytes(&self.client, &url)
                .await
                .with_context(|| format!("failed to fetch predictions for stop '{}'", input.stop_id))?;
            predictions.extend(
                parse_stop_monitoring(&body, now)
                    .with_context(|| format!("bad predictions for stop '{}'", input.stop_id))?,
            );
        }

        Ok(predictions)
    }

    async fn fetch_incidents(&self) -> Result<Vec<Incident>> {
        // 511 publishes service alerts only as GTFS-rt protobuf, which this
        // adapter does not consume yet.
        debug!("incident reporting is not available for sf");
        Ok(Vec::new())
    }

    async fn prediction_input(&self, db: &Database, query: &str) -> Result<Vec<PredictionInput>> {
        let stops = resolve_stops(db, LocationSlug::Sf, query, self.max_matches).await?;

        Ok(stops
            .into_iter()
            .map(|stop| PredictionInput {
                stop_id: stop.stop_id,
                agency_id: stop.agency_id,
            })
            .collect())
    }

    fn line_color(&self, line: &str) -> LineColor {
        match line.trim() {
            "YELLOW" => ("#FFE600", "#000000"),
            "ORANGE" => ("#FAA61A", "#000000"),
            "RED" => ("#ED1D24", "#000000"),
            "GREEN" => ("#50B848", "#FFFFFF"),
            "BLUE" => ("#009AD9", "#FFFFFF"),
            "GREY" => ("#9D9FA2", "#000000"),
            _ => ("#FFFFFF", "#000000"),
        }
    }

    /// Non-revenue trains report "--" as their line (trimmed, since
    /// [`format_line`] pads designators) or "NO PASSENGERS" as their
    /// destination. "--" in the minutes field alone does not mark a ghost.
    fn is_ghost_train(&self, prediction: &Prediction) -> bool {
        prediction.line.trim() == "--" || prediction.destination_name == "NO PASSENGERS"
    }
}

/// Decodes a SIRI stop-monitoring response into predictions, with arrival
/// times converted to minutes-from-`now`.
fn parse_stop_monitoring(body: &[u8], now: DateTime<Utc>) -> Result<Vec<Prediction>> {
    let envelope: MonitoringEnvelope = serde_json::from_slice(siri::strip_bom(body))
        .context("failed to decode stop monitoring response")?;

    let visits = envelope
        .service_delivery
        .stop_monitoring_delivery
        .visits;

    Ok(visits
        .into_iter()
        .map(|visit| {
            let journey = visit.journey;
            let call = journey.monitored_call;

            Prediction {
                min: minutes_until(&call.expected_arrival_time, &call.aimed_arrival_time, now),
                location_name: call.stop_point_name,
                destination: journey.destination_ref,
                destination_name: journey.destination_name,
                line: format_line(&journey.line_ref),
            }
        })
        .collect())
}

/// Minutes until the expected arrival (aimed as a fallback), floored at zero.
/// Missing or unparseable times come back as the "--" marker.
fn minutes_until(expected: &str, aimed: &str, now: DateTime<Utc>) -> String {
    let raw = if expected.is_empty() { aimed } else { expected };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(arrival) => {
            let minutes = (arrival.with_timezone(&Utc) - now).num_minutes().max(0);
            minutes.to_string()
        }
        Err(_) => "--".to_string(),
    }
}

/// Line refs carry a direction suffix (`YELLOW-N`); the bare designator is
/// left-padded to a fixed width so stacked rows align.
fn format_line(line_ref: &str) -> String {
    let bare = line_ref.split('-').next().unwrap_or(line_ref);
    format!("{bare:<LINE_WIDTH$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring_body(expected: &str) -> String {
        format!(
            r#"{{
                "ServiceDelivery": {{
                    "StopMonitoringDelivery": {{
                        "MonitoredStopVisit": [
                            {{
                                "MonitoredVehicleJourney": {{
                                    "LineRef": "YELLOW-N",
                                    "DestinationRef": "ANTC",
                                    "DestinationName": "Antioch",
                                    "MonitoredCall": {{
                                        "StopPointName": "Embarcadero",
                                        "ExpectedArrivalTime": "{expected}",
                                        "AimedArrivalTime": "2025-03-14T20:40:00Z"
                                    }}
                                }}
                            }}
                        ]
                    }}
                }}
            }}"#
        )
    }

    #[test]
    fn test_parse_stop_monitoring() {
        let now = DateTime::parse_from_rfc3339("2025-03-14T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let body = monitoring_body("2025-03-14T20:37:30Z");

        let predictions = parse_stop_monitoring(body.as_bytes(), now).unwrap();
        assert_eq!(predictions.len(), 1);

        let p = &predictions[0];
        assert_eq!(p.min, "7");
        assert_eq!(p.location_name, "Embarcadero");
        assert_eq!(p.destination, "ANTC");
        assert_eq!(p.destination_name, "Antioch");
        assert_eq!(p.line, "YELLOW");
    }

    #[test]
    fn test_parse_stop_monitoring_with_bom() {
        let now = Utc::now();
        let mut body = b"\xef\xbb\xbf".to_vec();
        body.extend_from_slice(monitoring_body("2025-03-14T20:37:30Z").as_bytes());

        assert_eq!(parse_stop_monitoring(&body, now).unwrap().len(), 1);
    }

    #[test]
    fn test_minutes_until_falls_back_to_aimed() {
        let now = DateTime::parse_from_rfc3339("2025-03-14T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(minutes_until("", "2025-03-14T20:35:00Z", now), "5");
        assert_eq!(
            minutes_until("2025-03-14T20:32:00Z", "2025-03-14T20:35:00Z", now),
            "2"
        );
    }

    #[test]
    fn test_minutes_until_floors_at_zero() {
        let now = DateTime::parse_from_rfc3339("2025-03-14T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(minutes_until("2025-03-14T20:29:00Z", "", now), "0");
    }

    #[test]
    fn test_minutes_until_missing_time() {
        assert_eq!(minutes_until("", "", Utc::now()), "--");
        assert_eq!(minutes_until("garbage", "", Utc::now()), "--");
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line("YELLOW-N"), "YELLOW");
        assert_eq!(format_line("RED-S"), "RED   ");
        assert_eq!(format_line("BLUE"), "BLUE  ");
    }

    #[test]
    fn test_line_color_trims_padding() {
        let api = SfApi::new("k", "http://example.invalid", 5);
        assert_eq!(api.line_color("RED   "), ("#ED1D24", "#000000"));
        assert_eq!(api.line_color("YELLOW"), ("#FFE600", "#000000"));
        assert_eq!(api.line_color("CABLE "), ("#FFFFFF", "#000000"));
    }

    #[test]
    fn test_ghost_train_detection() {
        let api = SfApi::new("k", "http://example.invalid", 5);

        let real = Prediction {
            min: "4".to_string(),
            location_name: "Embarcadero".to_string(),
            destination: "ANTC".to_string(),
            destination_name: "Antioch".to_string(),
            line: "YELLOW".to_string(),
        };
        assert!(!api.is_ghost_train(&real));

        // The line sentinel is padded like every other designator.
        let ghost_line = Prediction {
            line: "--    ".to_string(),
            ..real.clone()
        };
        assert!(api.is_ghost_train(&ghost_line));
        let ghost_line_bare = Prediction {
            line: "--".to_string(),
            ..real.clone()
        };
        assert!(api.is_ghost_train(&ghost_line_bare));

        let no_passengers = Prediction {
            destination_name: "NO PASSENGERS".to_string(),
            ..real.clone()
        };
        assert!(api.is_ghost_train(&no_passengers));

        // A missing arrival time renders as "--" minutes on a real train.
        let unknown_minutes = Prediction {
            min: "--".to_string(),
            ..real
        };
        assert!(!api.is_ghost_train(&unknown_minutes));
    }
}
