//! Chunked catalog reader.
//!
//! Streams the collection CSV export and yields validated catalog records a
//! chunk at a time, so the whole file is never held in memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{DeserializeRecordsIntoIter, ErrorKind, ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};

use artlens_types::CatalogRecord;

use crate::error::CatalogError;

pub const OBJECT_ID_COLUMN: &str = "Object ID";
pub const CLASSIFICATION_COLUMN: &str = "Classification";

/// One raw CSV row. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Object ID", default)]
    object_id: Option<String>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Artist Display Name", default)]
    artist: Option<String>,
    #[serde(rename = "Object Date", default)]
    date: Option<String>,
    #[serde(rename = "Classification", default)]
    classification: Option<String>,
    #[serde(rename = "Link Resource", default)]
    link: Option<String>,
}

impl CatalogRow {
    fn into_record(self) -> Result<CatalogRecord, String> {
        let raw_id = self.object_id.unwrap_or_default();
        let object_id = raw_id
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid object id {raw_id:?}"))?;

        Ok(CatalogRecord::new(object_id)
            .with_title(self.title.unwrap_or_default())
            .with_artist(self.artist.unwrap_or_default())
            .with_date(self.date.unwrap_or_default())
            .with_source_url(self.link.unwrap_or_default()))
    }
}

/// Counters for rows seen by a reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Rows accepted and returned
    pub accepted: usize,
    /// Rows rejected as malformed
    pub invalid: usize,
    /// Rows excluded by the classification filter
    pub filtered: usize,
}

/// Streaming reader over a catalog CSV.
pub struct CatalogReader<R: Read = File> {
    rows: DeserializeRecordsIntoIter<R, CatalogRow>,
    classification: Option<String>,
    stats: ReaderStats,
    exhausted: bool,
}

impl CatalogReader<File> {
    /// Open a catalog file.
    ///
    /// With `classification` set, only rows whose classification contains
    /// that text are returned.
    pub fn open(
        path: impl AsRef<Path>,
        classification: Option<String>,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        info!(path = ?path, filter = ?classification, "Opening catalog");
        let file = File::open(path)?;
        Self::from_reader(file, classification)
    }
}

impl<R: Read> CatalogReader<R> {
    /// Build a reader over any CSV source.
    pub fn from_reader(source: R, classification: Option<String>) -> Result<Self, CatalogError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);

        let headers = reader.headers()?;
        if !headers.iter().any(|h| h == OBJECT_ID_COLUMN) {
            return Err(CatalogError::MissingColumn(OBJECT_ID_COLUMN.to_string()));
        }

        Ok(Self {
            rows: reader.into_deserialize(),
            classification: classification.filter(|c| !c.is_empty()),
            stats: ReaderStats::default(),
            exhausted: false,
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read up to `max` accepted records.
    ///
    /// Returns an empty vector once the catalog is exhausted. Malformed rows
    /// are logged and skipped; I/O failures abort with an error.
    pub fn next_chunk(&mut self, max: usize) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut chunk = Vec::with_capacity(max.min(4096));

        while chunk.len() < max && !self.exhausted {
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(e)) => {
                    if matches!(e.kind(), ErrorKind::Io(_)) {
                        return Err(e.into());
                    }
                    warn!(error = %e, "Skipping malformed catalog row");
                    self.stats.invalid += 1;
                    continue;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            };

            if let Some(wanted) = &self.classification {
                let matches = row
                    .classification
                    .as_deref()
                    .is_some_and(|c| c.contains(wanted.as_str()));
                if !matches {
                    self.stats.filtered += 1;
                    continue;
                }
            }

            match row.into_record() {
                Ok(record) => {
                    self.stats.accepted += 1;
                    chunk.push(record);
                }
                Err(reason) => {
                    warn!(reason = %reason, "Skipping catalog row");
                    self.stats.invalid += 1;
                }
            }
        }

        debug!(count = chunk.len(), "Read catalog chunk");
        Ok(chunk)
    }
}

/// Copy the rows whose classification contains `category` into a new CSV.
///
/// All columns are kept. Returns the number of rows written.
pub fn filter_catalog(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    category: &str,
) -> Result<usize, CatalogError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(input.as_ref())?;

    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| h == CLASSIFICATION_COLUMN)
        .ok_or_else(|| CatalogError::MissingColumn(CLASSIFICATION_COLUMN.to_string()))?;

    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(output.as_ref())?;
    writer.write_record(&headers)?;

    let mut written = 0;
    for record in reader.records() {
        let record = record?;
        if record.get(column).is_some_and(|c| c.contains(category)) {
            writer.write_record(&record)?;
            written += 1;
        }
    }
    writer.flush()?;

    info!(
        input = ?input.as_ref(),
        output = ?output.as_ref(),
        category,
        rows = written,
        "Filtered catalog"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str =
        "Object Number,Object ID,Title,Artist Display Name,Object Date,Classification,Link Resource";

    fn catalog(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }

    #[test]
    fn test_reads_records_with_defaults() {
        let text = catalog(&[
            "1975.1.1,436535,Wheat Field with Cypresses,Vincent van Gogh,1889,Paintings,http://met/436535",
            "1975.1.2,10,,,,Paintings,",
        ]);
        let mut reader = CatalogReader::from_reader(text.as_bytes(), None).unwrap();

        let chunk = reader.next_chunk(10).unwrap();
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk[0].object_id, 436535);
        assert_eq!(chunk[0].title, "Wheat Field with Cypresses");
        assert_eq!(chunk[0].artist, "Vincent van Gogh");
        assert_eq!(chunk[0].source_url, "http://met/436535");
        assert_eq!(chunk[1].object_id, 10);
        assert_eq!(chunk[1].title, "");
        assert_eq!(chunk[1].source_url, "");

        assert!(reader.next_chunk(10).unwrap().is_empty());
    }

    #[test]
    fn test_chunking() {
        let rows: Vec<String> = (1..=5)
            .map(|i| format!("x,{i},T{i},A,D,Paintings,u"))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let text = catalog(&refs);
        let mut reader = CatalogReader::from_reader(text.as_bytes(), None).unwrap();

        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let chunk = reader.next_chunk(2).unwrap();
            (!chunk.is_empty()).then_some(chunk.len())
        })
        .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(reader.stats().accepted, 5);
    }

    #[test]
    fn test_invalid_object_id_is_skipped() {
        let text = catalog(&[
            "a,not-a-number,T,A,D,Paintings,u",
            "b,,T,A,D,Paintings,u",
            "c,3,T,A,D,Paintings,u",
        ]);
        let mut reader = CatalogReader::from_reader(text.as_bytes(), None).unwrap();

        let chunk = reader.next_chunk(10).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk[0].object_id, 3);
        assert_eq!(reader.stats().invalid, 2);
    }

    #[test]
    fn test_classification_filter() {
        let text = catalog(&[
            "a,1,T,A,D,Paintings,u",
            "b,2,T,A,D,Prints,u",
            "c,3,T,A,D,Paintings|Drawings,u",
            "d,4,T,A,D,,u",
        ]);
        let mut reader =
            CatalogReader::from_reader(text.as_bytes(), Some("Paintings".to_string())).unwrap();

        let ids: Vec<u64> = reader
            .next_chunk(10)
            .unwrap()
            .iter()
            .map(|r| r.object_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(reader.stats().filtered, 2);
    }

    #[test]
    fn test_empty_filter_disables_filtering() {
        let text = catalog(&["a,1,T,A,D,Prints,u"]);
        let mut reader = CatalogReader::from_reader(text.as_bytes(), Some(String::new())).unwrap();
        assert_eq!(reader.next_chunk(10).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_object_id_column() {
        let text = "Title,Classification\nA,Paintings\n";
        let result = CatalogReader::from_reader(text.as_bytes(), None);
        assert!(matches!(result, Err(CatalogError::MissingColumn(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = CatalogReader::open(temp.path().join("absent.csv"), None);
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }

    #[test]
    fn test_filter_catalog_keeps_all_columns() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("objects.csv");
        let output = temp.path().join("paintings.csv");
        std::fs::write(
            &input,
            catalog(&[
                "a,1,T1,A,D,Paintings,u1",
                "b,2,T2,A,D,Sculpture,u2",
                "c,3,T3,A,D,Paintings,u3",
            ]),
        )
        .unwrap();

        let written = filter_catalog(&input, &output, "Paintings").unwrap();
        assert_eq!(written, 2);

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "a,1,T1,A,D,Paintings,u1");
        assert_eq!(lines[2], "c,3,T3,A,D,Paintings,u3");
        assert_eq!(lines.len(), 3);

        let mut reader = CatalogReader::open(&output, None).unwrap();
        assert_eq!(reader.next_chunk(10).unwrap().len(), 2);
    }
}
