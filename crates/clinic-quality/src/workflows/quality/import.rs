use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

use super::domain::Observation;

#[derive(Debug)]
pub enum MetricHistoryImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidDate { row: usize, value: String },
    InvalidValue { row: usize, value: String },
}

impl std::fmt::Display for MetricHistoryImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricHistoryImportError::Io(err) => write!(f, "failed to read metric history: {}", err),
            MetricHistoryImportError::Csv(err) => write!(f, "invalid metric history CSV: {}", err),
            MetricHistoryImportError::InvalidDate { row, value } => {
                write!(f, "row {}: '{}' is not a YYYY-MM-DD date", row, value)
            }
            MetricHistoryImportError::InvalidValue { row, value } => {
                write!(f, "row {}: '{}' is not a finite number", row, value)
            }
        }
    }
}

impl std::error::Error for MetricHistoryImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricHistoryImportError::Io(err) => Some(err),
            MetricHistoryImportError::Csv(err) => Some(err),
            MetricHistoryImportError::InvalidDate { .. }
            | MetricHistoryImportError::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for MetricHistoryImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for MetricHistoryImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads `date,value` exports into observations for the trend analyzer.
pub struct MetricHistoryImporter;

impl MetricHistoryImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>, MetricHistoryImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Rows with an empty date and value are skipped; rows are returned in file order.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Observation>, MetricHistoryImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut observations = Vec::new();

        for (index, record) in csv_reader.deserialize::<HistoryRow>().enumerate() {
            let row = record?;
            // header is row 1
            let row_number = index + 2;

            let (date, value) = match (row.date, row.value) {
                (None, None) => continue,
                (date, value) => (date.unwrap_or_default(), value.unwrap_or_default()),
            };

            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
                MetricHistoryImportError::InvalidDate {
                    row: row_number,
                    value: date.clone(),
                }
            })?;
            let value = value
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| MetricHistoryImportError::InvalidValue {
                    row: row_number,
                    value: value.clone(),
                })?;

            observations.push(Observation::new(date, value));
        }

        Ok(observations)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    value: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_rows_and_skips_blank_lines() {
        let csv = "date,value\n2024-01-31,71.5\n,\n2024-02-29, 74 \n";
        let observations =
            MetricHistoryImporter::from_reader(Cursor::new(csv)).expect("history parses");

        assert_eq!(observations.len(), 2);
        assert_eq!(
            observations[1].date,
            NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date")
        );
        assert_eq!(observations[1].value, 74.0);
    }

    #[test]
    fn reports_row_number_for_bad_dates() {
        let csv = "date,value\n2024-01-31,71.5\n01/02/2024,70\n";
        match MetricHistoryImporter::from_reader(Cursor::new(csv)) {
            Err(MetricHistoryImportError::InvalidDate { row, value }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "01/02/2024");
            }
            other => panic!("expected invalid date, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_values() {
        let csv = "date,value\n2024-01-31,n/a\n";
        assert!(matches!(
            MetricHistoryImporter::from_reader(Cursor::new(csv)),
            Err(MetricHistoryImportError::InvalidValue { row: 2, .. })
        ));
    }
}
