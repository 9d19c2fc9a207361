//! Shipboard CTD `.cnv` instrument files.
//!
//! A file is a header block (`*` instrument lines, `#` processing lines) closed by an
//! `*END*` marker, followed by whitespace-delimited data rows. Column definitions come
//! from the `# name <n> = <short>: <description>` header lines, in file order.

use crate::utils::error::{CtdError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;

const END_MARKER: &str = "*END*";
const NAME_PREFIX: &str = "# name ";

#[derive(Debug, Clone, PartialEq)]
pub struct CnvColumn {
    pub name: String,
    pub description: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastAttributes {
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CnvFile {
    pub source: String,
    pub columns: Vec<CnvColumn>,
    pub attributes: CastAttributes,
}

/// Physical quantities compared against platform data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Pressure,
    Temperature,
    Conductivity,
    Salinity,
    Density,
    Fluorescence,
}

impl Quantity {
    pub fn units(&self) -> &'static str {
        match self {
            Quantity::Pressure => "db",
            Quantity::Temperature => "deg C",
            Quantity::Conductivity => "S/m",
            Quantity::Salinity => "PSU",
            Quantity::Density => "kg/m^3",
            // mg/m^3 and ug/L are the same
            Quantity::Fluorescence => "ug/L",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quantity::Pressure => "Pressure",
            Quantity::Temperature => "Temperature",
            Quantity::Conductivity => "Conductivity",
            Quantity::Salinity => "Salinity",
            Quantity::Density => "Density",
            Quantity::Fluorescence => "Fluorometric Chlorophyll-a",
        }
    }

    /// Candidate short names in preference order, with the conversion into `units()`.
    fn candidates(&self) -> &'static [(&'static str, Conversion)] {
        match self {
            Quantity::Pressure => PRESSURE_COLUMNS,
            Quantity::Temperature => TEMPERATURE_COLUMNS,
            Quantity::Conductivity => CONDUCTIVITY_COLUMNS,
            Quantity::Salinity => SALINITY_COLUMNS,
            Quantity::Density => DENSITY_COLUMNS,
            Quantity::Fluorescence => FLUORESCENCE_COLUMNS,
        }
    }
}

const PRESSURE_COLUMNS: &[(&str, Conversion)] = &[
    ("prDM", Conversion::Identity),
    ("prdM", Conversion::Identity),
    ("prSM", Conversion::Identity),
    ("prM", Conversion::Identity),
    ("PRES", Conversion::Identity),
];

const TEMPERATURE_COLUMNS: &[(&str, Conversion)] = &[
    ("t090C", Conversion::Identity),
    ("t068C", Conversion::Identity),
    ("tv290C", Conversion::Identity),
    ("t190C", Conversion::Identity),
    ("TEMP", Conversion::Identity),
];

const CONDUCTIVITY_COLUMNS: &[(&str, Conversion)] = &[
    ("c0S/m", Conversion::Identity),
    ("CNDC", Conversion::Identity),
    ("c1S/m", Conversion::Identity),
    ("c0mS/cm", Conversion::Scale(0.1)),
    ("c1mS/cm", Conversion::Scale(0.1)),
];

const SALINITY_COLUMNS: &[(&str, Conversion)] = &[
    ("sal00", Conversion::Identity),
    ("sal11", Conversion::Identity),
    ("PSAL", Conversion::Identity),
];

// sigma-theta is density minus 1000 kg/m^3
const DENSITY_COLUMNS: &[(&str, Conversion)] = &[
    ("density00", Conversion::Identity),
    ("density11", Conversion::Identity),
    ("density", Conversion::Identity),
    ("sigma", Conversion::Offset(1000.0)),
    ("sigma-t00", Conversion::Offset(1000.0)),
];

const FLUORESCENCE_COLUMNS: &[(&str, Conversion)] = &[
    ("flECO-AFL", Conversion::Identity),
    ("flC", Conversion::Identity),
    ("flS", Conversion::Identity),
    ("wetStar", Conversion::Identity),
];

#[derive(Debug, Clone, Copy)]
enum Conversion {
    Identity,
    Scale(f64),
    Offset(f64),
}

impl Conversion {
    fn apply(&self, v: f64) -> f64 {
        match self {
            Conversion::Identity => v,
            Conversion::Scale(s) => v * s,
            Conversion::Offset(o) => v + o,
        }
    }
}

impl CnvFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::decode(&path.to_string_lossy(), &data)
    }

    /// Decodes raw file bytes; invalid UTF-8 becomes U+FFFD.
    pub fn decode(source: &str, data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);
        let lines: Vec<&str> = text.lines().collect();

        let mut header = Vec::new();
        let mut attributes = CastAttributes::default();
        let mut start_time = None;
        let mut fallback_lat = None;
        let mut fallback_lon = None;
        let mut data_start = None;

        for (idx, raw) in lines.iter().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.contains(NAME_PREFIX) {
                header.push(parse_name_line(source, idx + 1, line)?);
            } else if let Some(value) = header_value(line, "* NMEA UTC (Time)") {
                attributes.timestamp = parse_header_time(value);
            } else if let Some(value) = header_value(line, "# start_time") {
                start_time = parse_header_time(value);
            } else if let Some(value) = header_value(line, "* NMEA Latitude") {
                attributes.latitude = parse_coordinate(value);
            } else if let Some(value) = header_value(line, "* NMEA Longitude") {
                attributes.longitude = parse_coordinate(value);
            } else if let Some(value) = line.strip_prefix("** Latitude:") {
                fallback_lat = parse_coordinate(value);
            } else if let Some(value) = line.strip_prefix("** Longitude:") {
                fallback_lon = parse_coordinate(value);
            }

            if line.contains(END_MARKER) {
                data_start = Some(idx + 1);
                break;
            }
        }

        attributes.timestamp = attributes.timestamp.or(start_time);
        attributes.latitude = attributes.latitude.or(fallback_lat);
        attributes.longitude = attributes.longitude.or(fallback_lon);

        let data_start = data_start
            .ok_or_else(|| CtdError::format(source, lines.len(), "missing *END* marker"))?;
        if header.is_empty() {
            return Err(CtdError::format(source, data_start, "no '# name' column definitions"));
        }

        let mut columns: Vec<CnvColumn> = header
            .into_iter()
            .map(|(name, description)| CnvColumn {
                name,
                description,
                values: Vec::new(),
            })
            .collect();

        for (offset, raw) in lines[data_start..].iter().enumerate() {
            let line_no = data_start + offset + 1;
            let fields: Vec<&str> = raw.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != columns.len() {
                return Err(CtdError::format(
                    source,
                    line_no,
                    format!("expected {} fields, found {}", columns.len(), fields.len()),
                ));
            }
            for (column, field) in columns.iter_mut().zip(fields) {
                let value = field.parse::<f64>().map_err(|_| {
                    CtdError::format(source, line_no, format!("'{}' is not a number", field))
                })?;
                column.values.push(value);
            }
        }

        Ok(Self {
            source: source.to_string(),
            columns,
            attributes,
        })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&CnvColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Values of a quantity converted to its canonical units, if any known column carries it.
    pub fn quantity(&self, quantity: Quantity) -> Option<Vec<f64>> {
        quantity.candidates().iter().find_map(|(name, conversion)| {
            self.column(name)
                .map(|c| c.values.iter().map(|v| conversion.apply(*v)).collect())
        })
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        self.attributes
            .timestamp
            .ok_or_else(|| CtdError::format(&self.source, 0, "no cast time in header"))
    }

    pub fn position(&self) -> Result<(f64, f64)> {
        match (self.attributes.latitude, self.attributes.longitude) {
            (Some(lat), Some(lon)) => Ok((lat, lon)),
            _ => Err(CtdError::format(&self.source, 0, "no cast latitude/longitude in header")),
        }
    }

    /// Two header rows (short names, descriptions) followed by the data.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        writer.write_record(self.columns.iter().map(|c| c.description.as_str()))?;
        for row in 0..self.row_count() {
            writer.write_record(self.columns.iter().map(|c| format_value(c.values[row])))?;
        }
        writer
            .into_inner()
            .map_err(|e| CtdError::IoError(e.into_error()))
    }

    /// Reads back a CSV produced by [`CnvFile::to_csv_bytes`]. Header attributes are not kept.
    pub fn from_converted_csv(source: &str, data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(data);
        let mut records = reader.records();

        let names = records
            .next()
            .ok_or_else(|| CtdError::format(source, 1, "missing column name row"))??;
        let descriptions = records
            .next()
            .ok_or_else(|| CtdError::format(source, 2, "missing description row"))??;

        let mut columns: Vec<CnvColumn> = names
            .iter()
            .zip(descriptions.iter())
            .map(|(name, description)| CnvColumn {
                name: name.to_string(),
                description: description.to_string(),
                values: Vec::new(),
            })
            .collect();

        for (offset, record) in records.enumerate() {
            let record = record?;
            let line_no = offset + 3;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                let value = field.trim().parse::<f64>().map_err(|_| {
                    CtdError::format(source, line_no, format!("'{}' is not a number", field))
                })?;
                column.values.push(value);
            }
        }

        Ok(Self {
            source: source.to_string(),
            columns,
            attributes: CastAttributes::default(),
        })
    }
}

/// Splits a `# name` line into (short name, description).
fn parse_name_line(source: &str, line_no: usize, line: &str) -> Result<(String, String)> {
    let definition = line
        .split_once('=')
        .map(|(_, rest)| rest)
        .ok_or_else(|| CtdError::format(source, line_no, "column definition without '='"))?;
    let (name, description) = definition
        .split_once(':')
        .ok_or_else(|| CtdError::format(source, line_no, "column definition without ':'"))?;

    let name = normalize_column_name(name.trim());
    Ok((name, description.trim().to_string()))
}

/// `sigma-θ00` / `sigma-θ11` lose their theta when the file is not valid UTF-8.
pub fn normalize_column_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("sigma-") {
        let mut chars = rest.chars();
        if let Some(first) = chars.next() {
            let suffix = chars.as_str();
            if !first.is_ascii() && (suffix == "00" || suffix == "11") {
                return "sigma".to_string();
            }
        }
    }
    name.to_string()
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    rest.trim_start().strip_prefix('=')
}

/// `Apr 24 2015 21:31:35 [Instrument's time stamp, header]` -> UTC.
fn parse_header_time(value: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = value.split_whitespace().take(4).collect();
    if tokens.len() < 4 {
        return None;
    }
    NaiveDateTime::parse_from_str(&tokens.join(" "), "%b %d %Y %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Accepts `39 56.32 N`, `39 56 19.2 N`, `39.9387 N` and `-70.88`.
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    let mut sign = 1.0;
    if let Some(last) = tokens.last() {
        match last.to_ascii_uppercase().as_str() {
            "S" | "W" => {
                sign = -1.0;
                tokens.pop();
            }
            "N" | "E" => {
                tokens.pop();
            }
            _ => {}
        }
    }

    let numbers: Vec<f64> = tokens
        .iter()
        .map(|t| t.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    let (degrees, minutes, seconds) = match numbers.as_slice() {
        [d] => (*d, 0.0, 0.0),
        [d, m] => (*d, *m, 0.0),
        [d, m, s] => (*d, *m, *s),
        _ => return None,
    };
    if degrees < 0.0 {
        sign = -sign;
    }
    Some(sign * (degrees.abs() + minutes / 60.0 + seconds / 3600.0))
}

/// Shortest round-trip text; exponent form for very small or large magnitudes.
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();
    if value != 0.0 && value.is_finite() && !(1e-4..1e15).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}
