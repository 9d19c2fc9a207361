use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn mapping_table(&self) -> &str;
    fn cast_table(&self) -> &str;
    fn api_base_url(&self) -> &str;
    fn api_credentials(&self) -> (&str, &str);
    fn request_limit(&self) -> usize;
    fn request_timeout(&self) -> Option<std::time::Duration>;
    fn strip_components(&self) -> usize;
}

/// Picks one entry out of a list offered by the remote API.
pub trait Chooser: Send + Sync {
    fn choose(&self, what: &str, options: &[String]) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}
