// src/services/loader.rs
use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CellValue, RawRecord};
use crate::BoxError;

pub const DEFAULT_SHEET: &str = "Sheet1";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {source_name} dataset at {}: {source}", .path.display())]
    Unreadable {
        source_name: String,
        path: PathBuf,
        source: BoxError,
    },
    #[error("sheet '{sheet}' not found in {source_name} dataset at {}", .path.display())]
    SheetNotFound {
        source_name: String,
        path: PathBuf,
        sheet: String,
    },
    #[error("datasets did not finish loading within {after:?}")]
    Timeout { after: Duration },
    #[error("loader task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// What to do when a workbook lacks the requested sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSourcePolicy {
    /// Log and continue with no rows.
    #[default]
    Skip,
    Fail,
}

impl FromStr for MissingSourcePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MissingSourcePolicy::Skip),
            "fail" => Ok(MissingSourcePolicy::Fail),
            other => Err(format!("expected 'skip' or 'fail', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceFormat {
    Workbook { sheet: String },
    Delimited { delimiter: u8 },
}

impl SourceFormat {
    /// Workbook extensions select a sheet, everything else is read as
    /// comma-delimited text.
    pub fn infer(path: &Path, sheet: Option<&str>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                SourceFormat::Workbook {
                    sheet: sheet.unwrap_or(DEFAULT_SHEET).to_string(),
                }
            }
            Some("tsv") => SourceFormat::Delimited { delimiter: b'\t' },
            _ => SourceFormat::Delimited { delimiter: b',' },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    /// Used in log lines and errors only.
    pub name: String,
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, sheet: Option<&str>) -> Self {
        let path = path.into();
        let format = SourceFormat::infer(&path, sheet);
        SourceSpec {
            name: name.into(),
            path,
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSources {
    pub cash_flows: SourceSpec,
    pub growth_rates: SourceSpec,
    pub market_values: SourceSpec,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedDatasets {
    pub cash_flows: Vec<RawRecord>,
    pub growth_rates: Vec<RawRecord>,
    pub market_values: Vec<RawRecord>,
}

fn unreadable(spec: &SourceSpec, err: impl Into<BoxError>) -> LoadError {
    LoadError::Unreadable {
        source_name: spec.name.clone(),
        path: spec.path.clone(),
        source: err.into(),
    }
}

fn missing_sheet(
    spec: &SourceSpec,
    sheet: &str,
    policy: MissingSourcePolicy,
) -> Result<Vec<RawRecord>, LoadError> {
    match policy {
        MissingSourcePolicy::Skip => {
            warn!(
                "Sheet {} not found in file {}, continuing with no {} rows",
                sheet,
                spec.path.display(),
                spec.name
            );
            Ok(Vec::new())
        }
        MissingSourcePolicy::Fail => Err(LoadError::SheetNotFound {
            source_name: spec.name.clone(),
            path: spec.path.clone(),
            sheet: sheet.to_string(),
        }),
    }
}

fn header_name(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::String(s) => Some(CellValue::Text(s.clone())),
        other => Some(CellValue::Text(other.to_string())),
    }
}

/// First row is the header. Empty cells are left out of the record and
/// rows with no values at all are dropped. When two columns share a header
/// name the leftmost one is kept; later duplicates are not renamed.
pub fn records_from_range(range: &Range<Data>) -> Vec<RawRecord> {
    let mut rows = range.rows();
    let headers: Vec<Option<String>> = match rows.next() {
        Some(row) => row.iter().map(header_name).collect(),
        None => return Vec::new(),
    };

    rows.filter_map(|row| {
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row) {
            if let (Some(header), Some(value)) = (header, cell_value(cell)) {
                record.entry(header.clone()).or_insert(value);
            }
        }
        if record.is_empty() {
            None
        } else {
            Some(record)
        }
    })
    .collect()
}

fn read_workbook(
    spec: &SourceSpec,
    sheet: &str,
    policy: MissingSourcePolicy,
) -> Result<Vec<RawRecord>, LoadError> {
    let mut workbook = open_workbook_auto(&spec.path).map_err(|e| unreadable(spec, e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    debug!("Workbook {} loaded: {:?}", spec.path.display(), sheet_names);

    if !sheet_names.iter().any(|n| n == sheet) {
        return missing_sheet(spec, sheet, policy);
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| unreadable(spec, e.to_string()))?;
    Ok(records_from_range(&range))
}

fn read_delimited(spec: &SourceSpec, delimiter: u8) -> Result<Vec<RawRecord>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(&spec.path)
        .map_err(|e| unreadable(spec, e))?;

    let headers = rdr.headers().map_err(|e| unreadable(spec, e))?.clone();

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result.map_err(|e| unreadable(spec, e))?;
        let mut record = RawRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            record
                .entry(header.to_string())
                .or_insert_with(|| CellValue::Text(value.to_string()));
        }
        records.push(record);
    }
    Ok(records)
}

/// Reads one dataset synchronously.
pub fn load_source(
    spec: &SourceSpec,
    policy: MissingSourcePolicy,
) -> Result<Vec<RawRecord>, LoadError> {
    info!("Reading {} dataset from: {}", spec.name, spec.path.display());
    let records = match &spec.format {
        SourceFormat::Workbook { sheet } => read_workbook(spec, sheet, policy)?,
        SourceFormat::Delimited { delimiter } => read_delimited(spec, *delimiter)?,
    };
    info!("Loaded {} {} records", records.len(), spec.name);
    debug!("{} records: {:?}", spec.name, records);
    Ok(records)
}

async fn spawn_load(
    spec: SourceSpec,
    policy: MissingSourcePolicy,
) -> Result<Vec<RawRecord>, LoadError> {
    tokio::task::spawn_blocking(move || load_source(&spec, policy)).await?
}

/// Reads all three datasets in parallel and returns only once every one of
/// them is complete. The first failure aborts the load.
pub async fn load_all(
    sources: &DatasetSources,
    policy: MissingSourcePolicy,
    timeout: Option<Duration>,
) -> Result<LoadedDatasets, LoadError> {
    let load = async {
        let (cash_flows, growth_rates, market_values) = tokio::try_join!(
            spawn_load(sources.cash_flows.clone(), policy),
            spawn_load(sources.growth_rates.clone(), policy),
            spawn_load(sources.market_values.clone(), policy),
        )?;
        Ok::<_, LoadError>(LoadedDatasets {
            cash_flows,
            growth_rates,
            market_values,
        })
    };

    match timeout {
        Some(after) => tokio::time::timeout(after, load)
            .await
            .map_err(|_| LoadError::Timeout { after })?,
        None => load.await,
    }
}
