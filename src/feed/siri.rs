//! SIRI `stopPlaces` decoding for the 511.org static-data endpoint.
//!
//! The payload is the NeTEx-flavored SIRI envelope: a deeply nested wrapper
//! around a flat list of stop places. Only the fields the cache needs are
//! modeled; everything else is ignored by serde.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::db::models::{LocationSlug, Stop, StopType};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Siri")]
    siri: Siri,
}

#[derive(Debug, Deserialize)]
struct Siri {
    #[serde(rename = "ServiceDelivery")]
    service_delivery: ServiceDelivery,
}

#[derive(Debug, Deserialize)]
struct ServiceDelivery {
    #[serde(rename = "DataObjectDelivery")]
    data_object_delivery: DataObjectDelivery,
}

#[derive(Debug, Deserialize)]
struct DataObjectDelivery {
    #[serde(rename = "dataObjects")]
    data_objects: DataObjects,
}

#[derive(Debug, Deserialize)]
struct DataObjects {
    #[serde(rename = "SiteFrame")]
    site_frame: SiteFrame,
}

#[derive(Debug, Deserialize)]
struct SiteFrame {
    #[serde(rename = "stopPlaces")]
    stop_places: StopPlaces,
}

#[derive(Debug, Deserialize)]
struct StopPlaces {
    #[serde(rename = "StopPlace", default)]
    stop_place: Vec<StopPlace>,
}

#[derive(Debug, Deserialize)]
struct StopPlace {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Centroid", default)]
    centroid: Centroid,
    #[serde(rename = "TransportMode", default)]
    transport_mode: String,
}

#[derive(Debug, Default, Deserialize)]
struct Centroid {
    #[serde(rename = "Location", default)]
    location: Coordinates,
}

#[derive(Debug, Default, Deserialize)]
struct Coordinates {
    #[serde(rename = "Latitude", default)]
    latitude: String,
    #[serde(rename = "Longitude", default)]
    longitude: String,
}

/// 511 serves its JSON with a UTF-8 byte-order mark, which serde_json
/// rejects.
pub(crate) fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(b"\xef\xbb\xbf").unwrap_or(body)
}

fn stop_type_for_mode(mode: &str) -> Option<StopType> {
    match mode {
        "bus" => Some(StopType::Bus),
        "rail" | "metro" => Some(StopType::Train),
        _ => None,
    }
}

/// Decodes a SIRI stop-places response into stops for the given location.
/// Entries with an unrecognized transport mode are skipped.
pub fn parse_stop_places(
    body: &[u8],
    location: LocationSlug,
    agency_id: &str,
) -> Result<Vec<Stop>> {
    let envelope: Envelope =
        serde_json::from_slice(strip_bom(body)).context("failed to decode stop places response")?;

    let places = envelope
        .siri
        .service_delivery
        .data_object_delivery
        .data_objects
        .site_frame
        .stop_places
        .stop_place;

    let mut stops = Vec::with_capacity(places.len());
    for place in places {
        let Some(stop_type) = stop_type_for_mode(&place.transport_mode) else {
            debug!(
                id = %place.id,
                mode = %place.transport_mode,
                "skipping stop place with unrecognized transport mode"
            );
            continue;
        };

        stops.push(Stop::from_feed(
            place.id,
            place.name,
            location,
            agency_id.to_string(),
            place.centroid.location.latitude,
            place.centroid.location.longitude,
            stop_type,
            String::new(),
        ));
    }

    Ok(stops)
}
