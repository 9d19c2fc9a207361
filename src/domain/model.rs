use crate::utils::error::{CtdError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metadata sheet held as strings. Absent values are `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
                return Err(CtdError::format(
                    "CSV sheet",
                    line,
                    format!("expected {} fields, found {}", headers.len(), record.len()),
                ));
            }
            let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            // 補齊缺少的欄位
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| CtdError::IoError(e.into_error()))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| CtdError::not_found(format!("column '{}'", name)))
    }

    /// Adds the column if missing and returns its index.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn get(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|idx| self.rows.get(row).and_then(|r| r.get(idx)))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let idx = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = value.into();
        }
    }

    /// Appends a row given as (column, value) pairs; unknown columns are ignored.
    pub fn push_named(&mut self, values: &[(&str, String)]) {
        let mut row = vec![String::new(); self.headers.len()];
        for (column, value) in values {
            if let Some(idx) = self.column_index(column) {
                row[idx] = value.clone();
            }
        }
        self.rows.push(row);
    }

    /// Indices of the rows where every (column, value) pair matches.
    pub fn find_rows(&self, criteria: &[(&str, &str)]) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&i| criteria.iter().all(|(col, val)| self.get(i, col) == *val))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One cast reference taken from a mapping row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRef {
    pub cruise: String,
    pub leg: String,
    pub cast: String,
}

/// Where a platform sat when it was deployed, and the casts to compare against.
#[derive(Debug, Clone)]
pub struct DeploymentMapping {
    pub platform: String,
    pub deployment: String,
    pub lat: f64,
    pub lon: f64,
    pub casts: Vec<CastRef>,
}

/// Samples returned by the remote data API, already converted to UTC.
#[derive(Debug, Clone, Default)]
pub struct SensorSeries {
    pub time: Vec<DateTime<Utc>>,
    pub pressure: Vec<f64>,
    pub temperature: Vec<f64>,
    pub conductivity: Vec<f64>,
    pub salinity: Vec<f64>,
    pub density: Vec<f64>,
    pub chlorophyll: Vec<f64>,
}

impl SensorSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
