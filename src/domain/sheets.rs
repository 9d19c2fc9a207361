//! Column names of the cruise data sheets and the lookups shared by the tools.

use crate::domain::model::{CastRef, Table};
use crate::utils::error::{CtdError, Result};

pub const PLATFORM: &str = "platform";
pub const DEPLOYMENT: &str = "Deployment";
pub const DEPLOYMENT_NUMBER: &str = "deploymentNumber";
pub const ARRAY: &str = "Array";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const CUID: &str = "CUID";
pub const AM_DATE: &str = "AM_Date";
pub const CRUISE_NAME: &str = "CTD_CruiseName";
pub const CRUISE_LEG: &str = "CTD_CruiseLeg";
pub const CAST: &str = "CTDcast";
pub const FILEPATH_PRIMARY: &str = "filepath_primary";
pub const RAWDATA_FILEPATH: &str = "CTD_rawdata_filepath";
pub const CTD_DATE: &str = "CTD_Date";
pub const CTD_LAT: &str = "CTD_lat";
pub const CTD_LON: &str = "CTD_lon";
pub const UPDATE_NOTES: &str = "update_notes";

/// Full path of a row's raw instrument file when it is a `.cnv` file.
pub fn cnv_path(table: &Table, row: usize) -> Option<String> {
    let raw = table.get(row, RAWDATA_FILEPATH);
    if raw.ends_with(".cnv") {
        Some(format!("{}{}", table.get(row, FILEPATH_PRIMARY), raw))
    } else {
        None
    }
}

/// Every `.cnv` file listed in a cast sheet, in sheet order.
pub fn cnv_paths(table: &Table) -> Vec<String> {
    (0..table.len()).filter_map(|row| cnv_path(table, row)).collect()
}

/// The cast sheet row for one cast reference.
pub fn find_cast_row(table: &Table, cast: &CastRef) -> Result<usize> {
    table
        .find_rows(&[
            (CRUISE_NAME, cast.cruise.as_str()),
            (CRUISE_LEG, cast.leg.as_str()),
            (CAST, cast.cast.as_str()),
        ])
        .into_iter()
        .next()
        .ok_or_else(|| {
            CtdError::not_found(format!(
                "cast sheet row for cruise '{}' leg '{}' cast '{}'",
                cast.cruise, cast.leg, cast.cast
            ))
        })
}

pub fn parse_coordinate_field(table: &Table, row: usize, column: &str) -> Result<f64> {
    let value = table.get(row, column);
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| CtdError::InvalidConfigValueError {
            field: column.to_string(),
            value: value.to_string(),
            reason: "not a decimal coordinate".to_string(),
        })
}
