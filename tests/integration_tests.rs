//! End-to-end tests exercising the full path from a feed archive through the
//! parser into the database and back out through the resolver.

use std::io::{Cursor, Write};

use transit::db::models::{LocationSlug, StopType};
use transit::db::Database;
use transit::feed::gtfs;
use transit::resolve;
use zip::write::SimpleFileOptions;

const AGENCY_CSV: &str = "\
agency_id,agency_name,agency_url,agency_timezone,agency_lang
MET,WMATA,https://wmata.com,America/New_York,en
";

// Nine stops: three stations with blank parent_station, six platforms
// nested under them. parent_station is deliberately the last column so
// blank values exercise trailing-field handling.
const STOPS_CSV: &str = "\
stop_id,stop_name,stop_lat,stop_lon,parent_station
STN_A01,Metro Center,38.8983,-77.0281,
PF_A01_C,Metro Center Platform C,38.8983,-77.0281,STN_A01
PF_A01_D,Metro Center Platform D,38.8983,-77.0281,STN_A01
STN_B02,Gallery Place,38.8997,-77.0219,
PF_B02_C,Gallery Place Platform C,38.8997,-77.0219,STN_B02
PF_B02_D,Gallery Place Platform D,38.8997,-77.0219,STN_B02
STN_C05,Foggy Bottom,38.9007,-77.0506,
PF_C05_1,Foggy Bottom Platform 1,38.9007,-77.0506,STN_C05
PF_C05_2,Foggy Bottom Platform 2,38.9007,-77.0506,STN_C05
";

fn feed_archive() -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("agency.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(AGENCY_CSV.as_bytes()).unwrap();
        writer
            .start_file("stops.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(STOPS_CSV.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

async fn fresh_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::connect(&dir.path().join("transit.db")).await.unwrap();
    db.sync_migrations().await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn test_archive_to_database_round_trip() {
    let scratch = tempfile::tempdir().unwrap();
    gtfs::unzip_feed(&feed_archive(), scratch.path()).unwrap();

    let data =
        gtfs::parse_feed_dir(scratch.path(), LocationSlug::Dmv, StopType::Train, "MET").unwrap();

    assert_eq!(data.agencies.len(), 1);
    assert_eq!(data.agencies[0].agency_id, "MET");
    assert_eq!(data.agencies[0].timezone, "America/New_York");
    assert_eq!(data.stops.len(), 9);

    let (_dir, db) = fresh_db().await;
    db.insert_agencies(&data.agencies).await.unwrap();
    db.insert_stops(&data.stops).await.unwrap();

    // Everything survives the round trip unchanged.
    let all = db
        .get_stops_by_location(LocationSlug::Dmv, false)
        .await
        .unwrap();
    assert_eq!(all.len(), 9);

    let metro_center = all.iter().find(|s| s.stop_id == "STN_A01").unwrap();
    assert_eq!(metro_center.name, "Metro Center");
    assert_eq!(metro_center.latitude, "38.8983");
    assert_eq!(metro_center.longitude, "-77.0281");
    assert_eq!(metro_center.parent_id, "");
    assert_eq!(metro_center.agency_id, "MET");
    assert_eq!(metro_center.stop_type, StopType::Train);

    let platform = all.iter().find(|s| s.stop_id == "PF_C05_2").unwrap();
    assert_eq!(platform.parent_id, "STN_C05");

    // Only the three stations are top-level.
    let parents = db
        .get_stops_by_location(LocationSlug::Dmv, true)
        .await
        .unwrap();
    let names: Vec<&str> = parents.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Metro Center", "Gallery Place", "Foggy Bottom"]);

    // Nothing bled into the other location.
    assert_eq!(
        db.count_stops_by_location(LocationSlug::Sf).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_resolver_finds_cached_stations() {
    let scratch = tempfile::tempdir().unwrap();
    gtfs::unzip_feed(&feed_archive(), scratch.path()).unwrap();
    let data =
        gtfs::parse_feed_dir(scratch.path(), LocationSlug::Dmv, StopType::Train, "MET").unwrap();

    let (_dir, db) = fresh_db().await;
    db.insert_stops(&data.stops).await.unwrap();

    let matches = resolve::resolve_stops(&db, LocationSlug::Dmv, "foggy", 5)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].stop_id, "STN_C05");

    // Gibberish resolves to nothing rather than an error.
    let matches = resolve::resolve_stops(&db, LocationSlug::Dmv, "xyzzy", 5)
        .await
        .unwrap();
    assert!(matches.is_empty());

    // "o" hits both Metro Center and Foggy Bottom; with a cap of one the
    // over-broad query is skipped entirely.
    let matches = resolve::resolve_stops(&db, LocationSlug::Dmv, "o", 1)
        .await
        .unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_zip_slip_archive_is_rejected() {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("../outside.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"escaped").unwrap();
        writer.finish().unwrap();
    }

    let scratch = tempfile::tempdir().unwrap();
    assert!(gtfs::unzip_feed(&cursor.into_inner(), scratch.path()).is_err());
    assert!(!scratch.path().parent().unwrap().join("outside.txt").exists());
}

#[tokio::test]
async fn test_migrations_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transit.db");

    {
        let db = Database::connect(&path).await.unwrap();
        db.sync_migrations().await.unwrap();
    }

    // A later invocation sees the same schema and syncs cleanly.
    let db = Database::connect(&path).await.unwrap();
    db.sync_migrations().await.unwrap();
    assert!(db
        .get_location(LocationSlug::Dmv)
        .await
        .unwrap()
        .is_some());
}
