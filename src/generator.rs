use anyhow::{anyhow, bail, Context};
use async_openai::{
    config::OpenAIConfig,
    types::{
        CreateImageRequestArgs, Image, ImageModel, ImageQuality, ImageSize, ImageStyle,
        ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_MODEL: &str = "dall-e-3";
const USER: &str = "image-batch";

/// A short-lived pointer to a generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub url: String,
    /// The prompt as rewritten by the service, when it reports one.
    pub revised_prompt: Option<String>,
}

/// Something that turns a text prompt into exactly one image.
#[async_trait]
pub trait ImageGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<ArtifactReference>;
}

#[async_trait]
impl<G> ImageGenerator for Arc<G>
where
    G: ImageGenerator + Send + Sync + ?Sized,
{
    async fn generate(&self, prompt: &str) -> anyhow::Result<ArtifactReference> {
        (**self).generate(prompt).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Size {
    #[value(name = "256x256")]
    S256,
    #[value(name = "512x512")]
    S512,
    #[value(name = "1024x1024")]
    Square,
    #[value(name = "1792x1024")]
    Landscape,
    #[value(name = "1024x1792")]
    Portrait,
}

impl From<Size> for ImageSize {
    fn from(size: Size) -> Self {
        match size {
            Size::S256 => ImageSize::S256x256,
            Size::S512 => ImageSize::S512x512,
            Size::Square => ImageSize::S1024x1024,
            Size::Landscape => ImageSize::S1792x1024,
            Size::Portrait => ImageSize::S1024x1792,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Quality {
    Standard,
    Hd,
}

impl From<Quality> for ImageQuality {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Standard => ImageQuality::Standard,
            Quality::Hd => ImageQuality::HD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Style {
    Vivid,
    Natural,
}

impl From<Style> for ImageStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Vivid => ImageStyle::Vivid,
            Style::Natural => ImageStyle::Natural,
        }
    }
}

/// Options applied to every generation call in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub model: String,
    pub size: Size,
    pub quality: Quality,
    pub style: Option<Style>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            size: Size::Square,
            quality: Quality::Standard,
            style: None,
        }
    }
}

fn image_model(name: &str) -> ImageModel {
    match name {
        "dall-e-2" => ImageModel::DallE2,
        "dall-e-3" => ImageModel::DallE3,
        other => ImageModel::Other(other.to_string()),
    }
}

/// Generates images through the OpenAI images endpoint.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    options: GenerationOptions,
}

impl OpenAiGenerator {
    pub fn new(client: Client<OpenAIConfig>, options: GenerationOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<ArtifactReference> {
        let mut args = CreateImageRequestArgs::default();
        args.prompt(prompt)
            .model(image_model(&self.options.model))
            .n(1)
            .response_format(ResponseFormat::Url)
            .size(ImageSize::from(self.options.size))
            .quality(ImageQuality::from(self.options.quality))
            .user(USER);
        if let Some(style) = self.options.style {
            args.style(ImageStyle::from(style));
        }
        let request = args.build()?;

        let start_time = std::time::Instant::now();
        let response = self
            .client
            .images()
            .create(request)
            .await
            .context("image generation request failed")?;
        log::trace!(
            "images.create took {}ms, {} images returned",
            start_time.elapsed().as_millis(),
            response.data.len()
        );

        if response.data.len() != 1 {
            bail!("expected 1 image, service returned {}", response.data.len());
        }
        match response.data[0].as_ref() {
            Image::Url {
                url,
                revised_prompt,
            } => Ok(ArtifactReference {
                url: url.clone(),
                revised_prompt: revised_prompt.clone(),
            }),
            Image::B64Json { .. } => Err(anyhow!(
                "service returned inline image data instead of a URL"
            )),
        }
    }
}
