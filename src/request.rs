use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path};

const WEBSITE_PROMPTS: &str = include_str!("../prompts/website.json");

/// One image to produce: the prompt sent to the generation service and the
/// filename the result is saved under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
    #[serde(rename = "filename")]
    identifier: String,
    prompt: String,
}

impl GenerationRequest {
    pub fn new(identifier: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            prompt: prompt.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Checks that an identifier names a single file directly inside the output
/// directory.
pub fn validate_identifier(identifier: &str) -> anyhow::Result<()> {
    if identifier.trim().is_empty() {
        bail!("identifier is empty");
    }
    if identifier.contains('\0') {
        bail!("identifier {:?} contains a NUL byte", identifier);
    }
    if identifier.chars().any(std::path::is_separator) {
        bail!("identifier {:?} contains a path separator", identifier);
    }
    let mut components = Path::new(identifier).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("identifier {:?} is not a plain filename", identifier),
    }
}

/// The batch of website images this tool was written for.
pub fn website_requests() -> anyhow::Result<Vec<GenerationRequest>> {
    parse_manifest(WEBSITE_PROMPTS).context("built-in prompt list is invalid")
}

/// Reads a JSON array of `{"filename": ..., "prompt": ...}` objects.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<GenerationRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse_manifest(&text).with_context(|| format!("invalid manifest {}", path.display()))
}

pub fn parse_manifest(text: &str) -> anyhow::Result<Vec<GenerationRequest>> {
    let requests: Vec<GenerationRequest> = serde_json::from_str(text)?;

    let mut seen = HashSet::new();
    for request in &requests {
        if !seen.insert(request.identifier.as_str()) {
            bail!("duplicate filename {:?}", request.identifier);
        }
    }

    Ok(requests)
}

/// Keeps only the requests named in `identifiers`, preserving input order.
pub fn select(
    requests: Vec<GenerationRequest>,
    identifiers: &[String],
) -> anyhow::Result<Vec<GenerationRequest>> {
    if identifiers.is_empty() {
        return Ok(requests);
    }

    for identifier in identifiers {
        if !requests.iter().any(|r| &r.identifier == identifier) {
            bail!("no request with filename {:?}", identifier);
        }
    }

    Ok(requests
        .into_iter()
        .filter(|r| identifiers.contains(&r.identifier))
        .collect())
}
