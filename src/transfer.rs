use anyhow::{bail, Context};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::generator::ArtifactReference;

/// Retrieves the raw bytes behind an [`ArtifactReference`].
#[async_trait]
pub trait ArtifactTransfer {
    async fn fetch(&self, reference: &ArtifactReference) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
impl<T> ArtifactTransfer for Arc<T>
where
    T: ArtifactTransfer + Send + Sync + ?Sized,
{
    async fn fetch(&self, reference: &ArtifactReference) -> anyhow::Result<Vec<u8>> {
        (**self).fetch(reference).await
    }
}

pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactTransfer for HttpTransfer {
    async fn fetch(&self, reference: &ArtifactReference) -> anyhow::Result<Vec<u8>> {
        let start_time = std::time::Instant::now();
        let response = self
            .client
            .get(&reference.url)
            .send()
            .await
            .context("failed to download image")?;

        if !response.status().is_success() {
            bail!("failed to download image: HTTP {}", response.status());
        }

        let data: Vec<u8> = response
            .bytes()
            .await
            .context("failed to read image body")?
            .to_vec();
        log::trace!(
            "download took {}ms, {} bytes",
            start_time.elapsed().as_millis(),
            data.len()
        );
        Ok(data)
    }
}
