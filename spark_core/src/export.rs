//! CSV export of the activity history.

use crate::{ActivityEvent, Result};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    id: String,
    category: &'a str,
    intensity: &'a str,
    points: u32,
    timestamp: String,
}

impl<'a> From<&'a ActivityEvent> for CsvRow<'a> {
    fn from(event: &'a ActivityEvent) -> Self {
        CsvRow {
            id: event.id.to_string(),
            category: event.category.as_str(),
            intensity: event.intensity.as_str(),
            points: event.points,
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

/// Write activities to a CSV file, oldest first
///
/// The file is replaced if it exists. Returns the number of rows written.
pub fn export_activities(activities: &[ActivityEvent], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut sorted: Vec<&ActivityEvent> = activities.iter().collect();
    sorted.sort_by_key(|a| a.timestamp);

    let file = File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for event in &sorted {
        writer.serialize(CsvRow::from(*event))?;
    }

    // Headers only go out with the first row
    if sorted.is_empty() {
        writer.write_record(["id", "category", "intensity", "points", "timestamp"])?;
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    tracing::info!("Exported {} activities to {:?}", sorted.len(), csv_path);
    Ok(sorted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Intensity};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("sparks.csv");
        let t0 = Utc.with_ymd_and_hms(2025, 10, 9, 8, 0, 0).unwrap();

        let later = ActivityEvent::new(Category::Energy, Intensity::Medium, t0 + Duration::hours(2));
        let earlier = ActivityEvent::new(Category::Idea, Intensity::Low, t0);

        let count = export_activities(&[later.clone(), earlier.clone()], &path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "id,category,intensity,points,timestamp");
        assert!(lines[1].starts_with(&earlier.id.to_string()));
        assert!(lines[1].contains(",idea,low,8,"));
        assert!(lines[2].contains(",energy,medium,22,"));
    }

    #[test]
    fn test_export_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        assert_eq!(export_activities(&[], &path).unwrap(), 0);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "id,category,intensity,points,timestamp");
    }

    #[test]
    fn test_export_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparks.csv");
        std::fs::write(&path, "stale\n").unwrap();

        let event = ActivityEvent::new(Category::Challenge, Intensity::Extreme, Utc::now());
        export_activities(&[event], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
        assert_eq!(contents.lines().count(), 2);
    }
}
