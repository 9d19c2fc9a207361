//! Platform profiler / fluorometer data against the shipboard CTD casts mapped to a deployment.

use crate::adapters::http::fetch_location;
use crate::adapters::m2m::{
    parse_samples, request_window, DataResponse, InstrumentKind, M2mClient, Refdes,
};
use crate::adapters::prompt::StdinChooser;
use crate::core::cast_list::align_casts;
use crate::core::cnv::{CnvFile, Quantity};
use crate::core::geodesy::{geodesic_km, round_to};
use crate::core::plot::{render_svg, ProfilePanel, ProfilePlot};
use crate::core::{CastRef, Chooser, ConfigProvider, DeploymentMapping, Pipeline, SensorSeries, Storage, Table};
use crate::domain::sheets::{self, CAST, CRUISE_LEG, CRUISE_NAME, CUID, DEPLOYMENT, PLATFORM};
use crate::utils::error::{CtdError, Result};
use reqwest::Client;

const PLOT_SIZE: (u32, u32) = (900, 700);
const CAST_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const SUMMARY_COLUMNS: [&str; 16] = [
    "refdes",
    "method",
    "stream",
    "deployment",
    "platform_lat_lon",
    "cruise",
    "CUID",
    "cruiseleg",
    "cast",
    "cruiseCTDcast_date",
    "cruiseCTDcast_lat_lon",
    "cruiseCTDcast_platform_loc_diff_km",
    "cruiseCTDcast_filename",
    "param_notes",
    "uframe_data_date",
    "uframe_message",
];

/// One shipboard cast with the platform data requested for its day.
pub struct CastObservation {
    pub cast: CastRef,
    pub cuid: String,
    pub filename: String,
    pub profile: CnvFile,
    pub response: DataResponse,
}

pub struct ComparisonInput {
    pub mapping: DeploymentMapping,
    pub method: String,
    pub stream: String,
    pub observations: Vec<CastObservation>,
}

pub struct ComparisonOutput {
    /// (file name, SVG document)
    pub plots: Vec<(String, String)>,
    pub summary: Table,
}

/// The mapping row of a platform deployment with its cast list lined up.
pub fn deployment_mapping(table: &Table, platform: &str, deployment: &str) -> Result<DeploymentMapping> {
    let row = table
        .find_rows(&[(PLATFORM, platform), (DEPLOYMENT, deployment)])
        .into_iter()
        .next()
        .ok_or_else(|| CtdError::not_found(format!("mapping row for {} {}", platform, deployment)))?;

    if table.get(row, CAST).trim().is_empty() {
        return Err(CtdError::NoCastIdentified {
            platform: platform.to_string(),
            deployment: deployment.to_string(),
        });
    }

    Ok(DeploymentMapping {
        platform: platform.to_string(),
        deployment: deployment.to_string(),
        lat: sheets::parse_coordinate_field(table, row, sheets::LAT)?,
        lon: sheets::parse_coordinate_field(table, row, sheets::LON)?,
        casts: align_casts(
            table.get(row, CRUISE_NAME),
            table.get(row, CRUISE_LEG),
            table.get(row, CAST),
        )?,
    })
}

/// `Cruise <CUID> [Leg <leg> ]Cast <n>: <date> (distance <d> km)`
pub fn cast_title(cuid: &str, cast: &CastRef, date: &str, distance_km: f64) -> String {
    let leg = if cast.leg.is_empty() {
        String::new()
    } else {
        format!("Leg {} ", cast.leg)
    };
    format!(
        "Cruise {} {}Cast {}: {} (distance {} km)",
        cuid, leg, cast.cast, date, distance_km
    )
}

/// A preset value must be one of the listed options; without one the chooser decides.
fn pick(preset: Option<&str>, what: &str, options: &[String], chooser: &dyn Chooser) -> Result<String> {
    match preset {
        Some(value) if options.iter().any(|o| o == value) => Ok(value.to_string()),
        Some(value) => Err(CtdError::InvalidConfigValueError {
            field: what.to_string(),
            value: value.to_string(),
            reason: format!("Available: {}", options.join(", ")),
        }),
        None => chooser.choose(what, options),
    }
}

fn lat_lon(lat: f64, lon: f64) -> String {
    format!("[{}, {}]", lat, lon)
}

pub struct ComparisonPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
    refdes: Refdes,
    deployment: String,
    method: Option<String>,
    stream: Option<String>,
    chooser: Box<dyn Chooser>,
}

impl<S: Storage, C: ConfigProvider> ComparisonPipeline<S, C> {
    pub fn new(storage: S, config: C, refdes: Refdes, deployment: impl Into<String>) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            refdes,
            deployment: deployment.into(),
            method: None,
            stream: None,
            chooser: Box::new(StdinChooser),
        }
    }

    pub fn with_method(mut self, method: Option<String>) -> Self {
        self.method = method;
        self
    }

    pub fn with_stream(mut self, stream: Option<String>) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_chooser(mut self, chooser: Box<dyn Chooser>) -> Self {
        self.chooser = chooser;
        self
    }

    pub fn summary_name(&self) -> String {
        format!("{}_cruise_CTD_summary.csv", self.refdes)
    }

    fn m2m(&self) -> M2mClient {
        let (username, token) = self.config.api_credentials();
        M2mClient::new(self.client.clone(), self.config.api_base_url(), username, token)
            .with_timeout(self.config.request_timeout())
    }

    async fn select_source(&self, m2m: &M2mClient) -> Result<(String, String)> {
        let methods = m2m.delivery_methods(&self.refdes).await?;
        tracing::info!("Delivery methods listed for {}: {}", self.refdes, methods.join(", "));
        let method = pick(self.method.as_deref(), "delivery method", &methods, self.chooser.as_ref())?;

        let streams = m2m.streams(&self.refdes, &method).await?;
        tracing::info!("Streams listed for {}-{}: {}", self.refdes, method, streams.join(", "));
        let stream = pick(self.stream.as_deref(), "stream", &streams, self.chooser.as_ref())?;

        Ok((method, stream))
    }

    fn plot_name(&self, method: &str, cast: &CastRef, suffix: &str) -> String {
        format!(
            "{}.svg",
            [
                self.refdes.to_string().as_str(),
                self.deployment.as_str(),
                method,
                cast.cruise.as_str(),
                cast.leg.as_str(),
                cast.cast.as_str(),
                suffix,
            ]
            .join("_")
        )
    }

    /// Plots for one cast; which ones depends on the instrument class.
    fn cast_plots(
        &self,
        method: &str,
        observation: &CastObservation,
        title_lines: Vec<String>,
        cast_values: &dyn Fn(Quantity) -> Vec<f64>,
        series: &SensorSeries,
    ) -> Result<Vec<(String, String)>> {
        let pressure = cast_values(Quantity::Pressure);
        let panel = |quantity: Quantity, platform: &[f64]| {
            ProfilePanel::new(
                quantity.label(),
                quantity.units(),
                &cast_values(quantity),
                &pressure,
                platform,
                &series.pressure,
            )
        };
        let plot = |panels: Vec<ProfilePanel>| ProfilePlot {
            title_lines: title_lines.clone(),
            pressure_units: Quantity::Pressure.units().to_string(),
            cast_label: "Cruise CTD".to_string(),
            platform_label: "Profiler".to_string(),
            panels,
        };

        let plots = match InstrumentKind::from_refdes(&self.refdes) {
            Some(InstrumentKind::Ctd) => vec![
                (
                    "cond_temp",
                    plot(vec![
                        panel(Quantity::Conductivity, &series.conductivity),
                        panel(Quantity::Temperature, &series.temperature),
                    ]),
                ),
                (
                    "sal_den",
                    plot(vec![
                        panel(Quantity::Salinity, &series.salinity),
                        panel(Quantity::Density, &series.density),
                    ]),
                ),
            ],
            Some(InstrumentKind::Fluorometer) => {
                vec![("chla", plot(vec![panel(Quantity::Fluorescence, &series.chlorophyll)]))]
            }
            None => Vec::new(),
        };

        let mut rendered = Vec::with_capacity(plots.len());
        for (suffix, plot) in plots {
            tracing::info!("📈 Plotting {} for cast {}", suffix, observation.cast.cast);
            rendered.push((
                self.plot_name(method, &observation.cast, suffix),
                render_svg(&plot, PLOT_SIZE)?,
            ));
        }
        Ok(rendered)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ComparisonPipeline<S, C> {
    type Extracted = ComparisonInput;
    type Transformed = ComparisonOutput;

    async fn extract(&self) -> Result<ComparisonInput> {
        tracing::info!("📥 Reading mapping sheet {}", self.config.mapping_table());
        let mapping_table =
            Table::from_csv_bytes(&fetch_location(&self.client, self.config.mapping_table()).await?)?;
        let mapping = deployment_mapping(&mapping_table, self.refdes.platform(), &self.deployment)?;
        tracing::info!("{} CTD casts mapped to {} {}", mapping.casts.len(), mapping.platform, mapping.deployment);

        tracing::info!("📥 Reading cast sheet {}", self.config.cast_table());
        let cast_table =
            Table::from_csv_bytes(&fetch_location(&self.client, self.config.cast_table()).await?)?;

        let m2m = self.m2m();
        let (method, stream) = self.select_source(&m2m).await?;
        let data_url = m2m.data_url(&self.refdes, &method, &stream);

        let mut observations = Vec::with_capacity(mapping.casts.len());
        for cast in &mapping.casts {
            let row = sheets::find_cast_row(&cast_table, cast)?;
            let filename = format!(
                "{}{}",
                cast_table.get(row, sheets::FILEPATH_PRIMARY),
                cast_table.get(row, sheets::RAWDATA_FILEPATH)
            );
            tracing::info!("CTD filename: {}", filename);

            let profile = CnvFile::decode(&filename, &fetch_location(&self.client, &filename).await?)?;
            let day = profile.timestamp()?;

            tracing::info!("Requesting platform data for {}", day.format("%Y-%m-%d"));
            let response = m2m
                .fetch_day(&data_url, day, self.config.request_limit())
                .await?;

            observations.push(CastObservation {
                cast: cast.clone(),
                cuid: cast_table.get(row, CUID).to_string(),
                filename,
                profile,
                response,
            });
        }

        Ok(ComparisonInput {
            mapping,
            method,
            stream,
            observations,
        })
    }

    async fn transform(&self, data: ComparisonInput) -> Result<ComparisonOutput> {
        let ComparisonInput {
            mapping,
            method,
            stream,
            observations,
        } = data;
        let kind = InstrumentKind::from_refdes(&self.refdes);
        let refdes = self.refdes.to_string();

        let mut summary = Table::new(SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect());
        let mut plots = Vec::new();

        for observation in &observations {
            let profile = &observation.profile;
            let (cast_lat, cast_lon) = profile.position()?;
            let distance = round_to(geodesic_km((mapping.lat, mapping.lon), (cast_lat, cast_lon)), 4);
            tracing::info!("The CTD cast was done {} km from the platform location", distance);

            let date = profile.timestamp()?;
            let (begin, _) = request_window(date);
            let title = cast_title(
                &observation.cuid,
                &observation.cast,
                &date.format(CAST_DATE_FORMAT).to_string(),
                distance,
            );

            let needed: &[Quantity] = match kind {
                Some(InstrumentKind::Fluorometer) => &[Quantity::Pressure, Quantity::Fluorescence],
                _ => &[
                    Quantity::Pressure,
                    Quantity::Temperature,
                    Quantity::Conductivity,
                    Quantity::Salinity,
                    Quantity::Density,
                ],
            };
            let param_notes: Vec<String> = needed
                .iter()
                .filter(|q| profile.quantity(**q).is_none())
                .map(|q| format!("No {} variable found in the cruise CTD file", q.label().to_lowercase()))
                .collect();
            for note in &param_notes {
                tracing::warn!("⚠️ {}", note);
            }

            let uframe_message = match &observation.response {
                DataResponse::Samples(samples) => {
                    if let Some(kind) = kind {
                        let series = parse_samples(kind, samples);
                        let title_lines = vec![
                            format!("{} vs. Shipboard CTD", refdes),
                            title.clone(),
                            format!("uFrame Profiler data: {}", &begin[..10]),
                        ];
                        let cast_values =
                            |q: Quantity| profile.quantity(q).unwrap_or_default();
                        plots.extend(self.cast_plots(&method, observation, title_lines, &cast_values, &series)?);
                    } else {
                        tracing::warn!("⚠️ No plots defined for instrument {}", self.refdes.instrument);
                    }
                    "Data request successful".to_string()
                }
                DataResponse::Rejected { message, .. } => message.clone(),
            };

            summary.push_named(&[
                ("refdes", refdes.clone()),
                ("method", method.clone()),
                ("stream", stream.clone()),
                ("deployment", self.deployment.clone()),
                ("platform_lat_lon", lat_lon(mapping.lat, mapping.lon)),
                ("cruise", observation.cast.cruise.clone()),
                ("CUID", observation.cuid.clone()),
                ("cruiseleg", observation.cast.leg.clone()),
                ("cast", observation.cast.cast.clone()),
                ("cruiseCTDcast_date", date.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                ("cruiseCTDcast_lat_lon", lat_lon(cast_lat, cast_lon)),
                ("cruiseCTDcast_platform_loc_diff_km", distance.to_string()),
                ("cruiseCTDcast_filename", observation.filename.clone()),
                ("param_notes", param_notes.join("; ")),
                ("uframe_data_date", begin),
                ("uframe_message", uframe_message),
            ]);
        }

        Ok(ComparisonOutput { plots, summary })
    }

    async fn load(&self, result: ComparisonOutput) -> Result<String> {
        for (name, svg) in &result.plots {
            self.storage.write_file(name, svg.as_bytes()).await?;
        }

        let summary_name = self.summary_name();
        self.storage
            .write_file(&summary_name, &result.summary.to_csv_bytes()?)
            .await?;

        Ok(format!(
            "{} casts compared, {} plots and {} saved in {}",
            result.summary.len(),
            result.plots.len(),
            summary_name,
            self.config.output_path()
        ))
    }
}
