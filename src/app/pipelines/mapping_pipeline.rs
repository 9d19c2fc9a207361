use crate::adapters::http::fetch_location;
use crate::core::{ConfigProvider, Pipeline, Storage, Table};
use crate::domain::sheets::{
    AM_DATE, ARRAY, CUID, DEPLOYMENT, DEPLOYMENT_NUMBER, LAT, LON, PLATFORM, UPDATE_NOTES,
};
use crate::utils::error::{CtdError, Result};
use chrono::Utc;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const NEW_ENTRY_NOTE: &str = "New entry. Need to manually check cruise CTD info";
const UPDATE_NOTE: &str = "Manually check cruise CTD info. Updated";

/// One deployment (`D…`) or recovery (`R…`) event read from an asset management sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentEvent {
    pub platform: String,
    pub deployment: String,
    pub deployment_number: u32,
    pub lat: String,
    pub lon: String,
    pub cuid: String,
    pub am_date: String,
}

impl DeploymentEvent {
    fn field(&self, column: &str) -> &str {
        match column {
            CUID => &self.cuid,
            AM_DATE => &self.am_date,
            LAT => &self.lat,
            LON => &self.lon,
            _ => "",
        }
    }
}

pub struct MappingSources {
    pub mapping: Table,
    pub events: BTreeMap<(String, String), DeploymentEvent>,
}

pub struct MergedMapping {
    pub table: Table,
    pub added: usize,
    pub updated: usize,
}

/// Array name from the first two letters of the platform code.
pub fn array_for(platform: &str) -> Option<&'static str> {
    match platform.get(..2)? {
        "GA" => Some("Global_Argentine_basin"),
        "GI" => Some("Global_Irminger"),
        "GP" => Some("Global_Papa"),
        "GS" => Some("Global_Southern_Ocean"),
        "CP" => Some("Coastal_Pioneer"),
        "CE" => Some("Coastal_Endurance"),
        _ => None,
    }
}

/// Distinct values in order of first appearance.
fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Deployment sheets are `CP*.csv` / `G*.csv` files anywhere below the directory.
pub fn deployment_sheets(root: &Path) -> Result<Vec<PathBuf>> {
    let mut sheets = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if (name.starts_with("CP") || name.starts_with('G')) && name.ends_with(".csv") {
            sheets.push(entry.path().to_path_buf());
        }
    }
    Ok(sheets)
}

/// The deployment and recovery events described by one asset management sheet.
pub fn sheet_events(file_name: &str, sheet: &Table) -> Result<Vec<DeploymentEvent>> {
    let platform = file_name.split('_').next().unwrap_or(file_name).to_string();
    let rows = 0..sheet.len();

    let numbers = unique(rows.clone().map(|r| sheet.get(r, DEPLOYMENT_NUMBER)));
    let starts = unique(rows.clone().map(|r| sheet.get(r, "startDateTime")));
    let stops = unique(rows.clone().map(|r| sheet.get(r, "stopDateTime")));
    if starts.len() != numbers.len() || stops.len() != numbers.len() {
        return Err(CtdError::ValidationError {
            message: format!(
                "The number of unique entries in one or more asset management fields doesn't match. \
                 Check {}: deploymentNumber, startDateTime, stopDateTime",
                file_name
            ),
        });
    }

    let mut events = Vec::with_capacity(numbers.len() * 2);
    for (i, number) in numbers.iter().enumerate() {
        let deployment_number = number
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0)
            .map(|n| n as u32)
            .ok_or_else(|| CtdError::ValidationError {
                message: format!("{}: '{}' is not a deployment number", file_name, number),
            })?;

        // 排除註解掉的列
        let active: Vec<usize> = rows
            .clone()
            .filter(|&r| {
                sheet.get(r, DEPLOYMENT_NUMBER) == *number
                    && !sheet.get(r, "CUID_Deploy").starts_with('#')
            })
            .collect();
        let joined = |column: &str| unique(active.iter().map(|&r| sheet.get(r, column))).join(", ");

        let lat = joined(LAT);
        let lon = joined(LON);
        events.push(DeploymentEvent {
            platform: platform.clone(),
            deployment: format!("D{:05}", deployment_number),
            deployment_number,
            lat: lat.clone(),
            lon: lon.clone(),
            cuid: joined("CUID_Deploy"),
            am_date: starts[i].to_string(),
        });
        events.push(DeploymentEvent {
            platform: platform.clone(),
            deployment: format!("R{:05}", deployment_number),
            deployment_number,
            lat,
            lon,
            cuid: joined("CUID_Recover"),
            am_date: stops[i].to_string(),
        });
    }

    Ok(events)
}

/// Adds missing events to the mapping sheet and refreshes the changed fields of existing rows.
/// Returns (added, updated) row counts.
pub fn merge_events<'a>(
    table: &mut Table,
    events: impl IntoIterator<Item = &'a DeploymentEvent>,
) -> (usize, usize) {
    table.ensure_column(UPDATE_NOTES);
    for row in 0..table.len() {
        table.set(row, UPDATE_NOTES, "");
    }
    for column in [ARRAY, PLATFORM, DEPLOYMENT_NUMBER, DEPLOYMENT, LAT, LON, CUID, AM_DATE] {
        table.ensure_column(column);
    }

    let mut added = 0;
    let mut updated = 0;
    for event in events {
        let matches = table.find_rows(&[
            (PLATFORM, event.platform.as_str()),
            (DEPLOYMENT, event.deployment.as_str()),
        ]);

        if matches.is_empty() {
            tracing::info!("➕ Adding {} {}", event.platform, event.deployment);
            let array = array_for(&event.platform).unwrap_or_else(|| {
                tracing::warn!("⚠️ No array known for platform {}", event.platform);
                ""
            });
            table.push_named(&[
                (ARRAY, array.to_string()),
                (PLATFORM, event.platform.clone()),
                (DEPLOYMENT_NUMBER, event.deployment_number.to_string()),
                (DEPLOYMENT, event.deployment.clone()),
                (LAT, event.lat.clone()),
                (LON, event.lon.clone()),
                (CUID, event.cuid.clone()),
                (AM_DATE, event.am_date.clone()),
                (UPDATE_NOTES, NEW_ENTRY_NOTE.to_string()),
            ]);
            added += 1;
            continue;
        }

        let mut changed = false;
        for column in [CUID, AM_DATE, LAT, LON] {
            let value = event.field(column);
            if table.get(matches[0], column) == value {
                continue;
            }
            for &row in &matches {
                table.set(row, column, value);
                let notes = table.get(row, UPDATE_NOTES);
                let notes = if notes.is_empty() {
                    format!("{} {}", UPDATE_NOTE, column)
                } else {
                    format!("{}, {}", notes, column)
                };
                table.set(row, UPDATE_NOTES, notes);
            }
            changed = true;
        }
        if changed {
            updated += 1;
        }
    }

    (added, updated)
}

/// Sorts by platform, numeric deployment number, then deployment code.
pub fn sort_mapping(table: &mut Table) {
    let platform = table.column_index(PLATFORM);
    let number = table.column_index(DEPLOYMENT_NUMBER);
    let deployment = table.column_index(DEPLOYMENT);
    let cell = |row: &Vec<String>, idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
    };
    let numeric = |row: &Vec<String>| -> f64 {
        cell(row, number).trim().parse::<f64>().unwrap_or(f64::INFINITY)
    };

    table.rows.sort_by(|a, b| {
        cell(a, platform)
            .cmp(&cell(b, platform))
            .then_with(|| numeric(a).total_cmp(&numeric(b)))
            .then_with(|| cell(a, deployment).cmp(&cell(b, deployment)))
    });
}

pub struct MappingPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
    deployment_dir: PathBuf,
    run_stamp: String,
}

impl<S: Storage, C: ConfigProvider> MappingPipeline<S, C> {
    pub fn new(storage: S, config: C, deployment_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            deployment_dir: deployment_dir.into(),
            run_stamp: Utc::now().format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    pub fn with_run_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.run_stamp = stamp.into();
        self
    }

    pub fn output_name(&self) -> String {
        format!("platform_CTDcast_mapping_{}.csv", self.run_stamp)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for MappingPipeline<S, C> {
    type Extracted = MappingSources;
    type Transformed = MergedMapping;

    async fn extract(&self) -> Result<MappingSources> {
        let mut events = BTreeMap::new();
        for path in deployment_sheets(&self.deployment_dir)? {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            tracing::debug!("Reading deployment sheet {}", file_name);
            let sheet = Table::from_csv_bytes(&tokio::fs::read(&path).await?)?;
            for event in sheet_events(&file_name, &sheet)? {
                events.insert((event.platform.clone(), event.deployment.clone()), event);
            }
        }
        tracing::info!("📋 {} deployment events found", events.len());

        let location = self.config.mapping_table();
        tracing::info!("📥 Reading mapping sheet {}", location);
        let mapping = Table::from_csv_bytes(&fetch_location(&self.client, location).await?)?;

        Ok(MappingSources { mapping, events })
    }

    async fn transform(&self, data: MappingSources) -> Result<MergedMapping> {
        let MappingSources { mut mapping, events } = data;
        let (added, updated) = merge_events(&mut mapping, events.values());
        sort_mapping(&mut mapping);
        Ok(MergedMapping {
            table: mapping,
            added,
            updated,
        })
    }

    async fn load(&self, result: MergedMapping) -> Result<String> {
        let name = self.output_name();
        self.storage
            .write_file(&name, &result.table.to_csv_bytes()?)
            .await?;
        Ok(format!(
            "{} rows added, {} rows updated, saved {}/{}",
            result.added,
            result.updated,
            self.config.output_path(),
            name
        ))
    }
}
