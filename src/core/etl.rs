use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    name: String,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::named(pipeline, "pipeline")
    }

    pub fn named(pipeline: P, name: impl Into<String>) -> Self {
        Self {
            pipeline,
            name: name.into(),
        }
    }

    /// Runs extract, transform and load once and returns what `load` reports as written.
    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting {}", self.name);

        tracing::info!("📥 Extracting...");
        let extracted = self.pipeline.extract().await?;

        tracing::info!("🔧 Transforming...");
        let transformed = self.pipeline.transform(extracted).await?;

        tracing::info!("💾 Loading...");
        let output = self.pipeline.load(transformed).await?;

        tracing::info!(
            "✅ {} finished in {:.1?}; output: {}",
            self.name,
            started.elapsed(),
            output
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::CtdError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Recording {
        steps: Arc<Mutex<Vec<&'static str>>>,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for Recording {
        type Extracted = Vec<u32>;
        type Transformed = u32;

        async fn extract(&self) -> Result<Vec<u32>> {
            self.steps.lock().unwrap().push("extract");
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<u32>) -> Result<u32> {
            self.steps.lock().unwrap().push("transform");
            if self.fail_transform {
                return Err(CtdError::ValidationError {
                    message: "bad rows".to_string(),
                });
            }
            Ok(data.iter().sum())
        }

        async fn load(&self, result: u32) -> Result<String> {
            self.steps.lock().unwrap().push("load");
            Ok(format!("sum={}", result))
        }
    }

    #[tokio::test]
    async fn test_runs_phases_in_order() {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let engine = EtlEngine::new(Recording {
            steps: Arc::clone(&steps),
            fail_transform: false,
        });
        let output = engine.run().await.unwrap();
        assert_eq!(output, "sum=6");
        assert_eq!(
            *steps.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let engine = EtlEngine::named(
            Recording {
                steps: Arc::clone(&steps),
                fail_transform: true,
            },
            "failing",
        );
        assert!(engine.run().await.is_err());
        assert_eq!(
            *steps.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
