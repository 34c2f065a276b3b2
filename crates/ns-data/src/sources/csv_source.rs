use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use ns_core::{FieldValue, RawResult};

use crate::DataError;

const ID_COLUMN: &str = "id";
const DATASET_COLUMN: &str = "dataset";

/// Load a place table from a CSV file.
///
/// The file needs a header row with `id` and `dataset` columns; every other
/// column becomes a field. Empty cells are missing values and numeric cells
/// are read as numbers.
pub async fn load_places(path: impl Into<PathBuf>) -> Result<Vec<RawResult>, DataError> {
    let path = path.into();
    let places = tokio::task::spawn_blocking({
        let path = path.clone();
        move || {
            let file = File::open(&path)?;
            read_places(BufReader::new(file))
        }
    })
    .await??;

    tracing::info!("Loaded {} places from {}", places.len(), self::display(&path));
    Ok(places)
}

/// Read a place table from any CSV reader
pub fn read_places<R: Read>(reader: R) -> Result<Vec<RawResult>, DataError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    };
    let id_idx = column(ID_COLUMN)?;
    let dataset_idx = column(DATASET_COLUMN)?;

    let mut places = Vec::new();
    let mut seen = HashSet::new();

    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let row = idx + 2;

        let id = record.get(id_idx).unwrap_or_default();
        if id.is_empty() {
            return Err(DataError::InvalidRow {
                row,
                message: "empty id".to_string(),
            });
        }
        if !seen.insert(id.to_string()) {
            tracing::warn!("Skipping duplicate place id {} on row {}", id, row);
            continue;
        }

        let mut place = RawResult::new(id, record.get(dataset_idx).unwrap_or_default());
        for (col, name) in headers.iter().enumerate() {
            if col == id_idx || col == dataset_idx {
                continue;
            }
            let value = record.get(col).map(FieldValue::parse).unwrap_or(FieldValue::Missing);
            place.fields.insert(name.to_string(), value);
        }
        places.push(place);
    }

    Ok(places)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
id,dataset,label,type,lat,long
1,A,Tuomiokirkko,church,60.45,22.27
2,A,Näsijärvi,lake,61.55,23.75
3,B,Vanha kirkko,church,,
";

    #[test]
    fn test_read_places() {
        let places = read_places(SAMPLE.as_bytes()).unwrap();
        assert_eq!(places.len(), 3);

        let first = &places[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.dataset, "A");
        assert_eq!(first.field("label"), &FieldValue::Text("Tuomiokirkko".into()));
        assert_eq!(first.coordinates("lat", "long"), Some((60.45, 22.27)));

        assert!(places[2].field("lat").is_missing());
        assert_eq!(places[2].coordinates("lat", "long"), None);
    }

    #[test]
    fn test_missing_id_column_is_rejected() {
        let result = read_places("dataset,label\nA,x\n".as_bytes());
        assert!(matches!(result, Err(DataError::MissingColumn(ref c)) if c == "id"));
    }

    #[test]
    fn test_duplicate_ids_are_skipped() {
        let places = read_places("id,dataset\n1,A\n1,B\n2,B\n".as_bytes()).unwrap();
        let ids: Vec<_> = places.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_load_places_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let places = load_places(file.path()).await.unwrap();
        assert_eq!(places.len(), 3);
    }

    #[tokio::test]
    async fn test_load_places_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_places(dir.path().join("nope.csv")).await;
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
