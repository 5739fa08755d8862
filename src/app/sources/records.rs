use crate::domain::model::SubmissionRecord;
use crate::utils::error::{CertError, Result};
use crate::utils::validation::validate_file_extensions;
use serde::Deserialize;
use std::path::Path;

/// Separator between workshop names in the CSV `workshops` column.
pub const WORKSHOP_SEPARATOR: char = ';';

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    first_name: String,
    #[serde(default)]
    track: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    track_label: Option<String>,
    #[serde(default)]
    workshops: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    file_name: String,
}

impl From<CsvRow> for SubmissionRecord {
    fn from(row: CsvRow) -> Self {
        let blank_to_none = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        SubmissionRecord {
            name: row.name,
            first_name: row.first_name,
            track: row.track,
            level: row.level,
            track_label: blank_to_none(row.track_label),
            workshops: row
                .workshops
                .map(|list| {
                    list.split(WORKSHOP_SEPARATOR)
                        .map(str::trim)
                        .filter(|w| !w.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            comment: blank_to_none(row.comment),
            file_name: row.file_name,
        }
    }
}

/// Loads a batch of submissions from a `.json` array or a `.csv` file.
pub async fn load_records(path: impl AsRef<Path>) -> Result<Vec<SubmissionRecord>> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    validate_file_extensions("records", std::slice::from_ref(&shown), &["json", "csv"])?;

    let content = tokio::fs::read(path).await?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        parse_csv(&content)?
    } else {
        parse_json(&content)?
    };

    tracing::info!("📥 Loaded {} records from {}", records.len(), shown);
    Ok(records)
}

pub fn parse_json(content: &[u8]) -> Result<Vec<SubmissionRecord>> {
    Ok(serde_json::from_slice(content)?)
}

pub fn parse_csv(content: &[u8]) -> Result<Vec<SubmissionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content);

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let record: SubmissionRecord = row?.into();
        if record.file_name.trim().is_empty() {
            return Err(CertError::ValidationError {
                message: format!("row {} has an empty file_name", index + 1),
            });
        }
        records.push(record);
    }
    Ok(records)
}
