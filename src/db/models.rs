//! Entity types backing the local SQLite cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransitError;

/// The unique identifier for a supported location.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LocationSlug {
    /// District of Columbia, Maryland and Virginia (WMATA).
    Dmv,
    /// San Francisco Bay Area (511).
    Sf,
}

impl fmt::Display for LocationSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSlug::Dmv => write!(f, "dmv"),
            LocationSlug::Sf => write!(f, "sf"),
        }
    }
}

impl FromStr for LocationSlug {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dmv" => Ok(LocationSlug::Dmv),
            "sf" => Ok(LocationSlug::Sf),
            "" => Err(TransitError::Config(
                "no location set; run `transit config set core.location <slug>`".into(),
            )),
            other => Err(TransitError::Config(format!("invalid location '{other}'"))),
        }
    }
}

/// Differentiates stop kinds in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum StopType {
    Train,
    Bus,
}

impl fmt::Display for StopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopType::Train => write!(f, "train"),
            StopType::Bus => write!(f, "bus"),
        }
    }
}

/// A record of a database migration that was executed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Migration {
    pub id: i64,
    pub name: String,
    pub migrated_at: String,
}

/// A geographical region in which one or more transit agencies operate.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub slug: LocationSlug,
    /// Rider-facing name.
    pub name: String,
    /// Whether the API behind it supports GTFS data.
    pub supports_gtfs: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A public entity administrating and managing transit services.
#[derive(Debug, Clone)]
pub struct Agency {
    /// Identifies a transit brand, often synonymous with the agency itself.
    pub agency_id: String,
    pub name: String,
    pub location: LocationSlug,
    /// IANA timezone the agency operates in.
    pub timezone: String,
    /// Primary language tag used by the agency.
    pub language: String,
}

/// A place where vehicles pick up or drop off riders.
///
/// Latitude/longitude stay strings end to end: some feeds emit empty or
/// non-numeric placeholders and the values are only ever displayed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Stop {
    pub id: i64,
    /// The official ID of this stop, scoped to its agency.
    pub stop_id: String,
    /// The official rider-facing name for the stop.
    pub name: String,
    pub location: LocationSlug,
    pub agency_id: String,
    pub latitude: String,
    pub longitude: String,
    pub stop_type: StopType,
    /// A stop_id when this stop is embedded inside another; empty for
    /// top-level stops.
    pub parent_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Stop {
    /// A stop parsed from a feed, before it has been persisted.
    pub fn from_feed(
        stop_id: String,
        name: String,
        location: LocationSlug,
        agency_id: String,
        latitude: String,
        longitude: String,
        stop_type: StopType,
        parent_id: String,
    ) -> Self {
        Self {
            id: 0,
            stop_id,
            name,
            location,
            agency_id,
            latitude,
            longitude,
            stop_type,
            parent_id,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// All static data fetched from an agency, ready for bulk insert.
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    pub agencies: Vec<Agency>,
    pub stops: Vec<Stop>,
}
