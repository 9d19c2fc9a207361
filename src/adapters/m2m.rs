//! Machine-to-machine sensor inventory API: delivery methods, streams and data requests.

use crate::domain::model::SensorSeries;
use crate::utils::error::{CtdError, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: f64 = 2_208_988_800.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refdes {
    pub site: String,
    pub node: String,
    pub port: String,
    pub instrument: String,
}

impl Refdes {
    pub fn parse(refdes: &str) -> Result<Self> {
        let parts: Vec<&str> = refdes.splitn(4, '-').collect();
        match parts.as_slice() {
            [site, node, port, instrument] if !instrument.is_empty() => Ok(Self {
                site: site.to_string(),
                node: node.to_string(),
                port: port.to_string(),
                instrument: instrument.to_string(),
            }),
            _ => Err(CtdError::InvalidConfigValueError {
                field: "refdes".to_string(),
                value: refdes.to_string(),
                reason: "Expected SITE-NODE-PORT-INSTRUMENT".to_string(),
            }),
        }
    }

    /// Platform code used in the mapping sheet.
    pub fn platform(&self) -> &str {
        &self.site
    }

    fn inventory_path(&self) -> String {
        format!("{}/{}/{}-{}", self.site, self.node, self.port, self.instrument)
    }
}

impl fmt::Display for Refdes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.site, self.node, self.port, self.instrument)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Ctd,
    Fluorometer,
}

impl InstrumentKind {
    pub fn from_refdes(refdes: &Refdes) -> Option<Self> {
        if refdes.instrument.contains("CTD") {
            Some(InstrumentKind::Ctd)
        } else if refdes.instrument.contains("FLOR") {
            Some(InstrumentKind::Fluorometer)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum DataResponse {
    Samples(Vec<Value>),
    Rejected { status: u16, message: String },
}

pub struct M2mClient {
    client: Client,
    base_url: String,
    username: String,
    token: String,
    timeout: Option<Duration>,
}

impl M2mClient {
    pub fn new(client: Client, base_url: &str, username: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            token: token.to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.token));
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    pub fn instrument_url(&self, refdes: &Refdes) -> String {
        format!("{}/{}", self.base_url, refdes.inventory_path())
    }

    pub fn method_url(&self, refdes: &Refdes, method: &str) -> String {
        format!("{}/{}", self.instrument_url(refdes), method)
    }

    pub fn data_url(&self, refdes: &Refdes, method: &str, stream: &str) -> String {
        format!("{}/{}", self.method_url(refdes, method), stream)
    }

    async fn list(&self, url: &str) -> Result<Vec<String>> {
        tracing::debug!("Listing {}", url);
        let response = self.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response_message(response.text().await.unwrap_or_default(), status);
            return Err(CtdError::RemoteError {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Vec<String>>().await?)
    }

    /// Delivery methods for the instrument; `bad` methods are hidden.
    pub async fn delivery_methods(&self, refdes: &Refdes) -> Result<Vec<String>> {
        let methods = self.list(&self.instrument_url(refdes)).await?;
        Ok(methods.into_iter().filter(|m| !m.contains("bad")).collect())
    }

    pub async fn streams(&self, refdes: &Refdes, method: &str) -> Result<Vec<String>> {
        self.list(&self.method_url(refdes, method)).await
    }

    /// One UTC day of samples starting at midnight of `day`.
    pub async fn fetch_day(
        &self,
        url: &str,
        day: DateTime<Utc>,
        limit: usize,
    ) -> Result<DataResponse> {
        let (begin, end) = request_window(day);
        tracing::debug!("Requesting {} from {} to {}", url, begin, end);

        let response = self
            .get(url)
            .query(&[
                ("beginDT", begin.as_str()),
                ("endDT", end.as_str()),
                ("limit", limit.to_string().as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response_message(response.text().await.unwrap_or_default(), status);
            tracing::warn!("Data request rejected ({}): {}", status, message);
            return Ok(DataResponse::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match response.json::<Value>().await? {
            Value::Array(samples) => Ok(DataResponse::Samples(samples)),
            other => Ok(DataResponse::Rejected {
                status: status.as_u16(),
                message: response_message(other.to_string(), status),
            }),
        }
    }
}

/// `beginDT`/`endDT` covering the UTC day of `day`.
pub fn request_window(day: DateTime<Utc>) -> (String, String) {
    let next = day + chrono::Duration::days(1);
    (
        day.format("%Y-%m-%dT00:00:00.000Z").to_string(),
        next.format("%Y-%m-%dT00:00:00.000Z").to_string(),
    )
}

/// The API reports failures as `{"message": ...}`.
fn response_message(body: String, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

pub fn ntp_seconds_to_datetime(ntp_seconds: f64) -> Option<DateTime<Utc>> {
    let unix = (ntp_seconds - NTP_UNIX_OFFSET).floor();
    DateTime::from_timestamp(unix as i64, 0)
}

fn number(sample: &Value, key: &str) -> f64 {
    sample.get(key).and_then(Value::as_f64).unwrap_or(f64::NAN)
}

/// Converts the returned JSON samples into a series; samples without a time are skipped.
pub fn parse_samples(kind: InstrumentKind, samples: &[Value]) -> SensorSeries {
    let mut series = SensorSeries::default();
    for sample in samples {
        let Some(time) = sample
            .get("time")
            .and_then(Value::as_f64)
            .and_then(ntp_seconds_to_datetime)
        else {
            tracing::debug!("Skipping sample without time");
            continue;
        };
        series.time.push(time);
        match kind {
            InstrumentKind::Ctd => {
                series.pressure.push(number(sample, "ctdpf_ckl_seawater_pressure"));
                series
                    .temperature
                    .push(number(sample, "ctdpf_ckl_seawater_temperature"));
                series
                    .conductivity
                    .push(number(sample, "ctdpf_ckl_seawater_conductivity"));
                series.salinity.push(number(sample, "practical_salinity"));
                series.density.push(number(sample, "density"));
            }
            InstrumentKind::Fluorometer => {
                series.pressure.push(number(sample, "int_ctd_pressure"));
                series
                    .chlorophyll
                    .push(number(sample, "fluorometric_chlorophyll_a"));
            }
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    #[test]
    fn test_refdes_parse() {
        let refdes = Refdes::parse("CP02PMUO-WFP01-03-CTDPFK000").unwrap();
        assert_eq!(refdes.platform(), "CP02PMUO");
        assert_eq!(refdes.inventory_path(), "CP02PMUO/WFP01/03-CTDPFK000");
        assert_eq!(refdes.to_string(), "CP02PMUO-WFP01-03-CTDPFK000");
        assert_eq!(InstrumentKind::from_refdes(&refdes), Some(InstrumentKind::Ctd));
        assert!(Refdes::parse("CP02PMUO-WFP01").is_err());
    }

    #[test]
    fn test_ntp_conversion() {
        let dt = ntp_seconds_to_datetime(3_638_822_400.75).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2015, 4, 24, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_request_window() {
        let day = Utc.with_ymd_and_hms(2015, 4, 24, 21, 31, 35).unwrap();
        let (begin, end) = request_window(day);
        assert_eq!(begin, "2015-04-24T00:00:00.000Z");
        assert_eq!(end, "2015-04-25T00:00:00.000Z");
    }

    #[test]
    fn test_parse_flor_samples() {
        let samples = vec![
            serde_json::json!({"time": 3_638_822_400.0, "int_ctd_pressure": 10.5, "fluorometric_chlorophyll_a": 1.2}),
            serde_json::json!({"int_ctd_pressure": 11.0}),
        ];
        let series = parse_samples(InstrumentKind::Fluorometer, &samples);
        assert_eq!(series.len(), 1);
        assert_eq!(series.pressure, vec![10.5]);
        assert_eq!(series.chlorophyll, vec![1.2]);
        assert!(series.temperature.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_methods_hide_bad() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/CP02PMUO/WFP01/03-CTDPFK000")
                .header_exists("Authorization");
            then.status(200).json_body(serde_json::json!([
                "recovered_wfp",
                "telemetered",
                "bad_recovered_wfp"
            ]));
        });

        let client = M2mClient::new(Client::new(), &server.base_url(), "user", "token");
        let refdes = Refdes::parse("CP02PMUO-WFP01-03-CTDPFK000").unwrap();
        let methods = client.delivery_methods(&refdes).await.unwrap();

        mock.assert();
        assert_eq!(methods, vec!["recovered_wfp", "telemetered"]);
    }

    #[tokio::test]
    async fn test_rejected_data_request_keeps_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/CP02PMUO/WFP01/03-CTDPFK000/recovered_wfp/ctdpf_ckl_wfp_instrument_recovered");
            then.status(404)
                .json_body(serde_json::json!({"message": "No data found in the requested time range"}));
        });

        let client = M2mClient::new(Client::new(), &server.base_url(), "user", "token");
        let refdes = Refdes::parse("CP02PMUO-WFP01-03-CTDPFK000").unwrap();
        let url = client.data_url(&refdes, "recovered_wfp", "ctdpf_ckl_wfp_instrument_recovered");
        let day = Utc.with_ymd_and_hms(2015, 4, 24, 21, 31, 35).unwrap();

        match client.fetch_day(&url, day, 10000).await.unwrap() {
            DataResponse::Rejected { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No data found in the requested time range");
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
