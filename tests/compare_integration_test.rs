use cruise_ctd::adapters::m2m::Refdes;
use cruise_ctd::adapters::prompt::ScriptedChooser;
use cruise_ctd::core::Table;
use cruise_ctd::utils::error::ErrorSeverity;
use cruise_ctd::{ComparisonPipeline, CtdError, EtlEngine, LocalStorage, ToolConfig};
use httpmock::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const REFDES: &str = "CP02PMUO-WFP01-03-CTDPFK000";
const INSTRUMENT_PATH: &str = "/sensor/inv/CP02PMUO/WFP01/03-CTDPFK000";
const STREAM: &str = "ctdpf_ckl_wfp_instrument_recovered";
// user:tok
const BASIC_AUTH: &str = "Basic dXNlcjp0b2s=";

const CAST_FILE: &str = "\
* Sea-Bird SBE 9 Data File:
* NMEA Latitude = 39 56.57 N
* NMEA Longitude = 070 46.73 W
* NMEA UTC (Time) = Jun 03 2017 10:11:12
# name 0 = prDM: Pressure, Digiquartz [db]
# name 1 = t090C: Temperature [ITS-90, deg C]
# name 2 = c0S/m: Conductivity [S/m]
# name 3 = sal00: Salinity, Practical [PSU]
# name 4 = sigma-\u{e9}00: Density [sigma-theta, kg/m^3]
*END*
      1.000    15.2310   4.250010  33.1020  24.1000
     10.000    14.9000   4.210000  33.2000  24.3000
     50.000    11.0000   3.800000  34.1000  26.0000
";

struct Fixture {
    temp_dir: TempDir,
    server: MockServer,
    config: ToolConfig,
}

fn fixture(mapping: &str) -> Fixture {
    instrument_fixture(mapping, INSTRUMENT_PATH, STREAM, CAST_FILE)
}

fn instrument_fixture(
    mapping: &str,
    instrument_path: &str,
    stream: &str,
    cast_file: &str,
) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_string_lossy().to_string();
    std::fs::write(temp_dir.path().join("ar08005.cnv"), cast_file).unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cruise_data/platform_CTDcast_mapping.csv");
        then.status(200).body(mapping);
    });
    server.mock(|when, then| {
        when.method(GET).path("/cruise_data/cruise_CTDs.csv");
        then.status(200).body(format!(
            "CUID,CTD_CruiseName,CTD_CruiseLeg,CTDcast,filepath_primary,CTD_rawdata_filepath,CTD_Date,CTD_lat,CTD_lon\n\
             AR-08,AR-08,,5,{root}/,ar08005.cnv,2017-06-03T10:11:12,39.9428,-70.7788\n"
        ));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(instrument_path)
            .header("authorization", BASIC_AUTH);
        then.status(200)
            .json_body(serde_json::json!(["recovered_wfp", "bad_recovered_wfp", "telemetered"]));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("{}/recovered_wfp", instrument_path));
        then.status(200).json_body(serde_json::json!([stream]));
    });

    let mut config = ToolConfig::default();
    config.output.path = temp_dir.path().join("out").to_string_lossy().to_string();
    config.api.base_url = server.url("/sensor/inv");
    config.api.username = "user".to_string();
    config.api.token = "tok".to_string();
    config.sources.mapping_table = server.url("/cruise_data/platform_CTDcast_mapping.csv");
    config.sources.cast_table = server.url("/cruise_data/cruise_CTDs.csv");

    Fixture {
        temp_dir,
        server,
        config,
    }
}

const FLOR_REFDES: &str = "CP02PMUO-WFP01-01-FLORDL000";
const FLOR_PATH: &str = "/sensor/inv/CP02PMUO/WFP01/01-FLORDL000";
const FLOR_STREAM: &str = "flord_l_wfp_instrument_recovered";

const FLOR_CAST_FILE: &str = "\
* NMEA Latitude = 39 56.57 N
* NMEA Longitude = 070 46.73 W
* NMEA UTC (Time) = Jun 03 2017 10:11:12
# name 0 = prDM: Pressure, Digiquartz [db]
# name 1 = flECO-AFL: Fluorescence, WET Labs ECO-AFL/FL [mg/m^3]
*END*
      1.000     0.8120
     10.000     1.2050
     50.000     0.3100
";

const MAPPING: &str = "\
Array,platform,deploymentNumber,Deployment,CTD_CruiseName,CTD_CruiseLeg,CTDcast,lat,lon,CUID,AM_Date
Coastal_Pioneer,CP02PMUO,9,D00009,AR-08,,5,39.9428,-70.7788,AR-08,2017-06-03T13:00:00
Coastal_Pioneer,CP02PMUO,9,R00009,,,,39.9428,-70.7788,AR-24,2017-10-28T12:00:00
";

fn pipeline(fx: &Fixture, deployment: &str) -> ComparisonPipeline<LocalStorage, ToolConfig> {
    instrument_pipeline(fx, REFDES, STREAM, deployment)
}

fn instrument_pipeline(
    fx: &Fixture,
    refdes: &str,
    stream: &str,
    deployment: &str,
) -> ComparisonPipeline<LocalStorage, ToolConfig> {
    let storage = LocalStorage::new(fx.config.output.path.clone());
    ComparisonPipeline::new(
        storage,
        fx.config.clone(),
        Refdes::parse(refdes).unwrap(),
        deployment,
    )
    .with_method(Some("recovered_wfp".to_string()))
    .with_chooser(Box::new(ScriptedChooser::new(vec![stream.to_string()])))
}

#[tokio::test]
async fn test_compare_ctd_writes_plots_and_summary() -> anyhow::Result<()> {
    let fx = fixture(MAPPING);
    // 2017-06-03T00:00:00Z in NTP seconds
    let day_start = 3_705_436_800.0;
    let data_mock = fx.server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/recovered_wfp/{}", INSTRUMENT_PATH, STREAM))
            .query_param("beginDT", "2017-06-03T00:00:00.000Z")
            .query_param("endDT", "2017-06-04T00:00:00.000Z")
            .query_param("limit", "10000");
        then.status(200).json_body(serde_json::json!([
            {
                "time": day_start + 3600.0,
                "ctdpf_ckl_seawater_pressure": 30.5,
                "ctdpf_ckl_seawater_temperature": 13.1,
                "ctdpf_ckl_seawater_conductivity": 4.0,
                "practical_salinity": 33.6,
                "density": 1025.1
            },
            {
                "time": day_start + 3660.0,
                "ctdpf_ckl_seawater_pressure": 45.0,
                "ctdpf_ckl_seawater_temperature": 11.9,
                "ctdpf_ckl_seawater_conductivity": 3.85,
                "practical_salinity": 34.0,
                "density": 1025.9
            }
        ]));
    });

    let output = EtlEngine::named(pipeline(&fx, "D00009"), "compare").run().await?;
    data_mock.assert();
    assert!(output.starts_with("1 casts compared, 2 plots"));

    let out = Path::new(&fx.config.output.path);
    let prefix = format!("{}_D00009_recovered_wfp_AR-08__5", REFDES);
    let cond_temp = std::fs::read_to_string(out.join(format!("{}_cond_temp.svg", prefix)))?;
    assert!(cond_temp.contains("<svg"));
    assert!(out.join(format!("{}_sal_den.svg", prefix)).exists());

    let summary = Table::from_csv_bytes(&std::fs::read(
        out.join(format!("{}_cruise_CTD_summary.csv", REFDES)),
    )?)?;
    assert_eq!(summary.len(), 1);
    assert_eq!(summary.headers.len(), 16);
    assert_eq!(summary.get(0, "method"), "recovered_wfp");
    assert_eq!(summary.get(0, "stream"), STREAM);
    assert_eq!(summary.get(0, "cruiseleg"), "");
    assert_eq!(summary.get(0, "cruiseCTDcast_date"), "2017-06-03T10:11:12Z");
    assert_eq!(summary.get(0, "uframe_data_date"), "2017-06-03T00:00:00.000Z");
    assert_eq!(summary.get(0, "uframe_message"), "Data request successful");
    assert_eq!(summary.get(0, "param_notes"), "");
    let distance: f64 = summary.get(0, "cruiseCTDcast_platform_loc_diff_km").parse()?;
    assert!(distance < 0.1);
    assert!(summary
        .get(0, "cruiseCTDcast_filename")
        .ends_with("ar08005.cnv"));

    drop(fx.temp_dir);
    Ok(())
}

#[tokio::test]
async fn test_compare_records_rejected_request() -> anyhow::Result<()> {
    let fx = fixture(MAPPING);
    fx.server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/recovered_wfp/{}", INSTRUMENT_PATH, STREAM));
        then.status(404)
            .json_body(serde_json::json!({"message": "No data found for the requested time range"}));
    });

    let output = EtlEngine::new(pipeline(&fx, "D00009")).run().await?;
    assert!(output.starts_with("1 casts compared, 0 plots"));

    let out = Path::new(&fx.config.output.path);
    let summary = Table::from_csv_bytes(&std::fs::read(
        out.join(format!("{}_cruise_CTD_summary.csv", REFDES)),
    )?)?;
    assert_eq!(
        summary.get(0, "uframe_message"),
        "No data found for the requested time range"
    );
    Ok(())
}

#[tokio::test]
async fn test_compare_without_cast_is_low_severity() {
    let fx = fixture(MAPPING);
    let err = EtlEngine::new(pipeline(&fx, "R00009")).run().await.unwrap_err();
    assert!(matches!(err, CtdError::NoCastIdentified { .. }));
    assert_eq!(err.severity(), ErrorSeverity::Low);
    assert!(!Path::new(&fx.config.output.path).exists());
}

#[tokio::test]
async fn test_compare_rejects_unknown_method() {
    let fx = fixture(MAPPING);
    let pipeline = pipeline(&fx, "D00009").with_method(Some("bad_recovered_wfp".to_string()));
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();
    assert!(matches!(err, CtdError::InvalidConfigValueError { .. }));
}

#[tokio::test]
async fn test_compare_fluorometer_writes_chla_plot() -> anyhow::Result<()> {
    let fx = instrument_fixture(MAPPING, FLOR_PATH, FLOR_STREAM, FLOR_CAST_FILE);
    let day_start = 3_705_436_800.0;
    let data_mock = fx.server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/recovered_wfp/{}", FLOR_PATH, FLOR_STREAM))
            .query_param("beginDT", "2017-06-03T00:00:00.000Z");
        then.status(200).json_body(serde_json::json!([
            {
                "time": day_start + 7200.0,
                "int_ctd_pressure": 12.0,
                "fluorometric_chlorophyll_a": 1.1
            },
            {
                "time": day_start + 7260.0,
                "int_ctd_pressure": 40.0,
                "fluorometric_chlorophyll_a": 0.4
            }
        ]));
    });

    let pipeline = instrument_pipeline(&fx, FLOR_REFDES, FLOR_STREAM, "D00009");
    let output = EtlEngine::named(pipeline, "compare").run().await?;
    data_mock.assert();
    assert!(output.starts_with("1 casts compared, 1 plots"));

    let out = Path::new(&fx.config.output.path);
    let prefix = format!("{}_D00009_recovered_wfp_AR-08__5", FLOR_REFDES);
    let chla = std::fs::read_to_string(out.join(format!("{}_chla.svg", prefix)))?;
    assert!(chla.contains("Fluorometric Chlorophyll-a (ug/L)"));
    assert!(!out.join(format!("{}_cond_temp.svg", prefix)).exists());

    let summary = Table::from_csv_bytes(&std::fs::read(
        out.join(format!("{}_cruise_CTD_summary.csv", FLOR_REFDES)),
    )?)?;
    assert_eq!(summary.get(0, "refdes"), FLOR_REFDES);
    assert_eq!(summary.get(0, "stream"), FLOR_STREAM);
    assert_eq!(summary.get(0, "param_notes"), "");
    assert_eq!(summary.get(0, "uframe_message"), "Data request successful");
    Ok(())
}
