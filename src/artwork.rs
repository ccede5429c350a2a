use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;

/// Downloads and decodes album art.
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage>;
}

pub struct ArtworkFetcher {
    client: Client,
}

impl ArtworkFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtworkSource for ArtworkFetcher {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::from_response("Artwork", resp).await);
        }
        let bytes = resp.bytes().await?;
        let img = image::load_from_memory(&bytes)?;
        Ok(img)
    }
}
