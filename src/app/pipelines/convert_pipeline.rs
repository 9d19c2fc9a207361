use crate::adapters::http::fetch_location;
use crate::core::cnv::CnvFile;
use crate::core::{ConfigProvider, Pipeline, Storage, Table};
use crate::domain::sheets;
use crate::utils::error::{CtdError, Result};
use reqwest::Client;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub struct ParsedCasts {
    pub files: Vec<CnvFile>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ConvertedFile {
    /// Path relative to the output directory
    pub path: String,
    pub data: Vec<u8>,
}

pub struct ConvertedBatch {
    pub files: Vec<ConvertedFile>,
    pub failed: Vec<(String, String)>,
}

pub struct ConvertPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
    input: String,
    archive: Option<String>,
}

impl<S: Storage, C: ConfigProvider> ConvertPipeline<S, C> {
    pub fn new(storage: S, config: C, input: impl Into<String>) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            input: input.into(),
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: Option<String>) -> Self {
        self.archive = archive;
        self
    }

    /// 列出要轉換的 .cnv 檔案
    async fn file_list(&self) -> Result<Vec<String>> {
        if self.input.ends_with(".csv") {
            let data = fetch_location(&self.client, &self.input).await?;
            let table = Table::from_csv_bytes(&data)?;
            Ok(sheets::cnv_paths(&table))
        } else if self.input.ends_with(".cnv") {
            Ok(vec![self.input.clone()])
        } else {
            Err(CtdError::InvalidConfigValueError {
                field: "input".to_string(),
                value: self.input.clone(),
                reason: "Expected a .cnv file or a .csv list of cast files".to_string(),
            })
        }
    }
}

/// Output location for a source file: its parent directories minus the first
/// `strip` components of the `/`-split path, then `<stem>.csv`.
pub fn output_path_for(source: &str, strip: usize) -> String {
    let parts: Vec<&str> = source.split('/').collect();
    let file_name = parts.last().copied().unwrap_or(source);
    let stem = file_name.split('.').next().unwrap_or(file_name);

    let parents = &parts[..parts.len().saturating_sub(1)];
    let mut segments: Vec<&str> = parents
        .iter()
        .skip(strip)
        .copied()
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        .collect();

    let csv_name = format!("{}.csv", stem);
    segments.push(&csv_name);
    segments.join("/")
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ConvertPipeline<S, C> {
    type Extracted = ParsedCasts;
    type Transformed = ConvertedBatch;

    async fn extract(&self) -> Result<ParsedCasts> {
        let list = self.file_list().await?;
        tracing::info!("📋 {} cast files to convert", list.len());

        let mut files = Vec::new();
        let mut failed = Vec::new();
        for (i, path) in list.iter().enumerate() {
            tracing::info!("Converting {} of {} files: {}", i + 1, list.len(), path);
            let parsed = match fetch_location(&self.client, path).await {
                Ok(data) => CnvFile::decode(path, &data),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(cnv) => files.push(cnv),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {}: {}", path, e);
                    failed.push((path.clone(), e.to_string()));
                }
            }
        }

        Ok(ParsedCasts { files, failed })
    }

    async fn transform(&self, data: ParsedCasts) -> Result<ConvertedBatch> {
        if data.files.is_empty() && !data.failed.is_empty() {
            return Err(CtdError::ValidationError {
                message: format!("none of the {} cast files could be read", data.failed.len()),
            });
        }

        let strip = self.config.strip_components();
        let mut files = Vec::with_capacity(data.files.len());
        for cnv in &data.files {
            files.push(ConvertedFile {
                path: output_path_for(&cnv.source, strip),
                data: cnv.to_csv_bytes()?,
            });
        }

        Ok(ConvertedBatch {
            files,
            failed: data.failed,
        })
    }

    async fn load(&self, result: ConvertedBatch) -> Result<String> {
        for file in &result.files {
            self.storage.write_file(&file.path, &file.data).await?;
        }

        if let Some(archive) = &self.archive {
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for file in &result.files {
                    zip.start_file::<_, ()>(file.path.as_str(), FileOptions::default())?;
                    zip.write_all(&file.data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };
            tracing::debug!("Writing archive {} ({} bytes)", archive, zip_data.len());
            self.storage.write_file(archive, &zip_data).await?;
        }

        if !result.failed.is_empty() {
            tracing::warn!("⚠️ {} files could not be converted", result.failed.len());
        }

        Ok(format!(
            "{} files converted into {} ({} failed)",
            result.files.len(),
            self.config.output_path(),
            result.failed.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolConfig;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files
                .get(path)
                .cloned()
                .ok_or_else(|| CtdError::not_found(path.to_string()))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    const CAST: &str = "\
* NMEA Latitude = 39 56.32 N
* NMEA Longitude = 070 53.12 W
# name 0 = prDM: Pressure, Digiquartz [db]
# name 1 = t090C: Temperature [ITS-90, deg C]
*END*
   1.000  12.3456
   2.000  12.3400
";

    #[test]
    fn test_output_path_mirrors_directories() {
        let source = "/Volumes/webdav/OOI/Global Argentine Basin Array/Cruise Data/at26-30/ctd/process/at2630007.cnv";
        assert_eq!(
            output_path_for(source, 4),
            "Global Argentine Basin Array/Cruise Data/at26-30/ctd/process/at2630007.csv"
        );
        assert_eq!(output_path_for("cast.v2.cnv", 4), "cast.csv");
        assert_eq!(output_path_for("/data/../x/cast.cnv", 0), "data/x/cast.csv");
    }

    #[tokio::test]
    async fn test_convert_single_file_with_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("at2630007.cnv");
        std::fs::write(&path, CAST).unwrap();

        let storage = MockStorage::new();
        let mut config = ToolConfig::default();
        config.convert.strip_components = usize::MAX;
        let pipeline = ConvertPipeline::new(storage.clone(), config, path.to_string_lossy())
            .with_archive(Some("casts.zip".to_string()));

        let parsed = pipeline.extract().await.unwrap();
        assert_eq!(parsed.files.len(), 1);
        let batch = pipeline.transform(parsed).await.unwrap();
        assert_eq!(batch.files[0].path, "at2630007.csv");
        pipeline.load(batch).await.unwrap();

        let csv = storage.get_file("at2630007.csv").await.unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert!(text.starts_with("prDM,t090C\n"));
        assert!(text.contains("\"Pressure, Digiquartz [db]\""));
        assert!(text.contains("2,12.34\n"));

        let zip_data = storage.get_file("casts.zip").await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_input_rejected() {
        let pipeline = ConvertPipeline::new(MockStorage::new(), ToolConfig::default(), "cast.hex");
        assert!(matches!(
            pipeline.extract().await,
            Err(CtdError::InvalidConfigValueError { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_files_failing_is_an_error() {
        let storage = MockStorage::new();
        let pipeline = ConvertPipeline::new(storage, ToolConfig::default(), "/nonexistent/cast.cnv");
        let parsed = pipeline.extract().await.unwrap();
        assert_eq!(parsed.failed.len(), 1);
        assert!(pipeline.transform(parsed).await.is_err());
    }
}
