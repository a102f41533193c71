//! SQL statements for the local cache, kept in one place so the repository
//! and migration code stay free of inline SQL.

/*
    MIGRATIONS TABLE
*/

pub const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    name TEXT NOT NULL,
    migrated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

pub const COUNT_MIGRATIONS: &str = "SELECT COUNT(*) FROM migrations";

pub const SELECT_MIGRATIONS: &str =
    "SELECT rowid AS id, name, DATETIME(migrated_at, 'localtime') AS migrated_at FROM migrations";

pub const INSERT_MIGRATION: &str = "INSERT INTO migrations (name) VALUES (?)";

/*
    LOCATIONS TABLE
*/

// An index is created for `slug` by the UNIQUE constraint.
pub const CREATE_LOCATIONS_TABLE: &str = "CREATE TABLE locations (
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    supports_gtfs BOOLEAN NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

pub const SELECT_LOCATION: &str = "SELECT rowid AS id, slug, name, supports_gtfs, \
    created_at, updated_at FROM locations WHERE slug = ?";

pub const SELECT_ALL_LOCATIONS: &str = "SELECT rowid AS id, slug, name, supports_gtfs, \
    created_at, updated_at FROM locations";

pub const INSERT_DMV_LOCATION: &str = "INSERT INTO locations (slug, name, supports_gtfs) \
    VALUES ('dmv', 'District Of Columbia, Maryland and Virginia (US)', 1)";

pub const INSERT_SF_LOCATION: &str = "INSERT INTO locations (slug, name, supports_gtfs) \
    VALUES ('sf', 'San Francisco Bay Area (US)', 1)";

/*
    AGENCIES TABLE
*/

pub const CREATE_AGENCIES_TABLE: &str = "CREATE TABLE agencies (
    agency_id TEXT NOT NULL,
    name TEXT NOT NULL,
    location REFERENCES locations(slug),
    timezone TEXT NOT NULL,
    language TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

// Prevents duplicate agency rows when initialization is re-run.
pub const CREATE_AGENCY_LOCATION_INDEX: &str =
    "CREATE UNIQUE INDEX agency_location_index ON agencies(agency_id, location)";

pub const INSERT_AGENCY: &str = "INSERT INTO agencies \
    (agency_id, name, location, timezone, language) VALUES (?, ?, ?, ?, ?)";

/*
    STOPS TABLE
*/

pub const CREATE_STOPS_TABLE: &str = "CREATE TABLE stops (
    stop_id TEXT NOT NULL,
    name TEXT NOT NULL,
    location REFERENCES locations(slug),
    agency_id REFERENCES agencies(agency_id),
    latitude TEXT,
    longitude TEXT,
    type TEXT NOT NULL,
    parent_id TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

pub const CREATE_STOP_LOCATION_INDEX: &str =
    "CREATE INDEX stop_location_index ON stops(location)";

pub const COUNT_STOPS_BY_LOCATION: &str = "SELECT COUNT(*) FROM stops WHERE location = ?";

pub const SELECT_STOPS_BY_LOCATION: &str = "SELECT rowid AS id, stop_id, name, location, \
    agency_id, latitude, longitude, type AS stop_type, parent_id, created_at, updated_at \
    FROM stops WHERE location = ?";

pub const SELECT_PARENT_STOPS_BY_LOCATION: &str = "SELECT rowid AS id, stop_id, name, location, \
    agency_id, latitude, longitude, type AS stop_type, parent_id, created_at, updated_at \
    FROM stops WHERE location = ? AND parent_id = ''";

pub const INSERT_STOP: &str = "INSERT INTO stops \
    (stop_id, name, location, agency_id, latitude, longitude, type, parent_id) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
