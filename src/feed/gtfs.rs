//! Static GTFS feed handling: unzipping the archive and parsing the
//! `agency.txt` / `stops.txt` files it contains.
//!
//! The GTFS Schedule reference lives at <https://gtfs.org/schedule/reference/>.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::db::models::{Agency, LocationSlug, StaticData, Stop, StopType};

/// Unzips a GTFS static archive into `dest`, which must already exist.
///
/// Any entry whose resolved path would land outside `dest` (a "zip slip"
/// archive) is rejected before anything is written.
pub fn unzip_feed(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("failed to open feed archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("failed to read archive entry")?;

        let Some(relative) = entry.enclosed_name() else {
            bail!("invalid file path in archive: {}", entry.name());
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create subdirectory {target:?}"))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }

        let mut out = fs::File::create(&target)
            .with_context(|| format!("failed to create file {target:?}"))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to write file {target:?}"))?;
    }

    Ok(())
}

/// Parses an unzipped GTFS static directory into the common entity model.
pub fn parse_feed_dir(
    dir: &Path,
    location: LocationSlug,
    stop_type: StopType,
    agency_id: &str,
) -> Result<StaticData> {
    let agencies =
        parse_agencies(&dir.join("agency.txt"), location).context("failed to parse agency.txt")?;
    let stops = parse_stops(&dir.join("stops.txt"), location, stop_type, agency_id)
        .context("failed to parse stops.txt")?;

    Ok(StaticData { agencies, stops })
}

/// Column-name to index map built from the header row. GTFS files vary in
/// which optional columns they carry, so all lookups go through this.
fn header_index(headers: &csv::StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect()
}

/// Reads a field by column name, falling back to an empty string when the
/// column is absent from this feed.
fn field<'a>(record: &'a csv::StringRecord, index: &HashMap<String, usize>, name: &str) -> &'a str {
    index
        .get(name)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
}

fn parse_agencies(path: &Path, location: LocationSlug) -> Result<Vec<Agency>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {path:?}"))?;

    let headers = reader.headers().context("missing header row")?.clone();
    let index = header_index(&headers);
    if !index.contains_key("agency_name") {
        bail!("agency.txt is missing the agency_name column");
    }

    let mut agencies = Vec::new();
    for result in reader.records() {
        let record = result.context("malformed agency record")?;

        agencies.push(Agency {
            agency_id: field(&record, &index, "agency_id").to_string(),
            name: field(&record, &index, "agency_name").to_string(),
            location,
            timezone: field(&record, &index, "agency_timezone").to_string(),
            language: field(&record, &index, "agency_lang").to_string(),
        });
    }

    Ok(agencies)
}

fn parse_stops(
    path: &Path,
    location: LocationSlug,
    stop_type: StopType,
    agency_id: &str,
) -> Result<Vec<Stop>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {path:?}"))?;

    let headers = reader.headers().context("missing header row")?.clone();
    let index = header_index(&headers);
    for required in ["stop_id", "stop_name"] {
        if !index.contains_key(required) {
            bail!("stops.txt is missing the {required} column");
        }
    }

    let mut stops = Vec::with_capacity(64);
    for result in reader.records() {
        let record = result.context("malformed stop record")?;

        stops.push(Stop::from_feed(
            field(&record, &index, "stop_id").to_string(),
            field(&record, &index, "stop_name").to_string(),
            location,
            agency_id.to_string(),
            field(&record, &index, "stop_lat").to_string(),
            field(&record, &index, "stop_lon").to_string(),
            stop_type,
            field(&record, &index, "parent_station").to_string(),
        ));
    }

    Ok(stops)
}
