use crate::adapters::http::fetch_location;
use crate::core::cnv::{CastAttributes, CnvFile};
use crate::core::{ConfigProvider, Pipeline, Storage, Table};
use crate::domain::sheets::{self, CTD_DATE, CTD_LAT, CTD_LON, UPDATE_NOTES};
use crate::utils::error::Result;
use chrono::Utc;
use reqwest::Client;

pub const CAST_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The cast sheet plus the header attributes read for each row that needed them.
pub struct CastSheet {
    pub table: Table,
    pub parsed: Vec<(usize, std::result::Result<CastAttributes, String>)>,
}

pub struct UpdatedSheet {
    pub table: Table,
    pub updated_rows: usize,
    pub failed_rows: usize,
}

/// Fills the empty `CTD_Date`, `CTD_lat`, `CTD_lon` cells of the cast sheet
/// from the headers of the instrument files.
pub struct CastSheetPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
    run_stamp: String,
}

impl<S: Storage, C: ConfigProvider> CastSheetPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            run_stamp: Utc::now().format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    pub fn with_run_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.run_stamp = stamp.into();
        self
    }

    pub fn output_name(&self) -> String {
        format!("cruise_CTDs_{}.csv", self.run_stamp)
    }
}

fn missing_fields(table: &Table, row: usize) -> Vec<&'static str> {
    [CTD_DATE, CTD_LAT, CTD_LON]
        .into_iter()
        .filter(|col| table.get(row, col).trim().is_empty())
        .collect()
}

/// Writes the parsed values into the empty cells only; returns the columns that changed.
pub fn fill_missing(table: &mut Table, row: usize, attributes: &CastAttributes) -> Vec<&'static str> {
    let mut changed = Vec::new();
    for column in missing_fields(table, row) {
        let value = match column {
            CTD_DATE => attributes
                .timestamp
                .map(|t| t.format(CAST_DATE_FORMAT).to_string()),
            CTD_LAT => attributes.latitude.map(|v| v.to_string()),
            _ => attributes.longitude.map(|v| v.to_string()),
        };
        if let Some(value) = value {
            table.set(row, column, value);
            changed.push(column);
        }
    }
    changed
}

/// Merges the parsed attributes into the sheet. `update_notes` only describes this run.
pub fn apply_updates(data: CastSheet) -> UpdatedSheet {
    let CastSheet { mut table, parsed } = data;
    table.ensure_column(UPDATE_NOTES);
    for row in 0..table.len() {
        table.set(row, UPDATE_NOTES, "");
    }

    let mut updated_rows = 0;
    let mut failed_rows = 0;
    for (row, result) in parsed {
        match result {
            Ok(attributes) => {
                let changed = fill_missing(&mut table, row, &attributes);
                if !changed.is_empty() {
                    table.set(row, UPDATE_NOTES, format!("Updated {}", changed.join(", ")));
                    updated_rows += 1;
                }
            }
            Err(message) => {
                table.set(row, UPDATE_NOTES, format!("Parse failed: {}", message));
                failed_rows += 1;
            }
        }
    }

    UpdatedSheet {
        table,
        updated_rows,
        failed_rows,
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CastSheetPipeline<S, C> {
    type Extracted = CastSheet;
    type Transformed = UpdatedSheet;

    async fn extract(&self) -> Result<CastSheet> {
        let location = self.config.cast_table();
        tracing::info!("📥 Reading cast sheet {}", location);
        let data = fetch_location(&self.client, location).await?;
        let table = Table::from_csv_bytes(&data)?;

        let mut parsed = Vec::new();
        for row in 0..table.len() {
            let Some(path) = sheets::cnv_path(&table, row) else {
                continue;
            };
            if missing_fields(&table, row).is_empty() {
                continue;
            }

            tracing::debug!("Reading header of {}", path);
            let result = match fetch_location(&self.client, &path).await {
                Ok(bytes) => CnvFile::decode(&path, &bytes).map(|cnv| cnv.attributes),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::warn!("⚠️ Could not parse {}: {}", path, e);
            }
            parsed.push((row, result.map_err(|e| e.to_string())));
        }

        tracing::info!("{} of {} casts need updating", parsed.len(), table.len());
        Ok(CastSheet { table, parsed })
    }

    async fn transform(&self, data: CastSheet) -> Result<UpdatedSheet> {
        Ok(apply_updates(data))
    }

    async fn load(&self, result: UpdatedSheet) -> Result<String> {
        let name = self.output_name();
        let data = result.table.to_csv_bytes()?;
        self.storage.write_file(&name, &data).await?;

        Ok(format!(
            "{} casts updated, {} could not be parsed, saved {}/{}",
            result.updated_rows,
            result.failed_rows,
            self.config.output_path(),
            name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sheet() -> Table {
        Table::from_csv_bytes(
            b"CUID,CTDcast,CTD_Date,CTD_lat,CTD_lon\nAT-26-30,7,2015-04-24T10:00:00,,-42.0\n",
        )
        .unwrap()
    }

    #[test]
    fn test_fill_missing_keeps_populated_cells() {
        let mut table = sheet();
        let attributes = CastAttributes {
            timestamp: Some(Utc.with_ymd_and_hms(2015, 4, 25, 1, 2, 3).unwrap()),
            latitude: Some(-42.9),
            longitude: Some(-42.5),
        };

        let changed = fill_missing(&mut table, 0, &attributes);
        assert_eq!(changed, vec![CTD_LAT]);
        assert_eq!(table.get(0, CTD_DATE), "2015-04-24T10:00:00");
        assert_eq!(table.get(0, CTD_LAT), "-42.9");
        assert_eq!(table.get(0, CTD_LON), "-42.0");
    }

    #[test]
    fn test_fill_missing_without_attributes() {
        let mut table = sheet();
        let changed = fill_missing(&mut table, 0, &CastAttributes::default());
        assert!(changed.is_empty());
        assert_eq!(table.get(0, CTD_LAT), "");
    }

    #[test]
    fn test_date_format() {
        let mut table =
            Table::from_csv_bytes(b"CTDcast,CTD_Date,CTD_lat,CTD_lon\n1,,1,2\n").unwrap();
        let attributes = CastAttributes {
            timestamp: Some(Utc.with_ymd_and_hms(2019, 11, 2, 23, 5, 9).unwrap()),
            ..Default::default()
        };
        fill_missing(&mut table, 0, &attributes);
        assert_eq!(table.get(0, CTD_DATE), "2019-11-02T23:05:09");
    }

    #[test]
    fn test_previous_notes_are_cleared() {
        let table = Table::from_csv_bytes(
            b"CTDcast,CTD_Date,CTD_lat,CTD_lon,update_notes\n\
              5,2017-06-03T10:11:12,40.1,-70.7,Updated CTD_Date\n\
              6,,40.2,-70.8,Parse failed: old\n",
        )
        .unwrap();
        let attributes = CastAttributes {
            timestamp: Some(Utc.with_ymd_and_hms(2017, 6, 4, 8, 0, 0).unwrap()),
            ..Default::default()
        };

        let updated = apply_updates(CastSheet {
            table,
            parsed: vec![(1, Ok(attributes))],
        });
        assert_eq!(updated.updated_rows, 1);
        assert_eq!(updated.table.headers.len(), 5);
        assert_eq!(updated.table.get(0, UPDATE_NOTES), "");
        assert_eq!(updated.table.get(0, CTD_DATE), "2017-06-03T10:11:12");
        assert_eq!(updated.table.get(1, UPDATE_NOTES), "Updated CTD_Date");
    }
}
