pub mod cast_list;
pub mod cnv;
pub mod etl;
pub mod geodesy;
pub mod plot;

pub use crate::domain::model::{CastRef, DeploymentMapping, SensorSeries, Table};
pub use crate::domain::ports::{Chooser, ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
