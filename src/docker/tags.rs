use crate::config::ResolvedConfig;
use crate::{CliError, Result};

pub const LATEST_TAG: &str = "latest";

/// Tag images are built and deployed under.
///
/// A tag prefix wins over the environment; with neither the bare tag is used.
pub fn prefixed_tag(config: &ResolvedConfig) -> Result<String> {
    let tag = config.tag.as_deref().ok_or(CliError::MissingTag)?;

    if let Some(prefix) = config.tag_prefix.as_deref() {
        return Ok(format!("{}{}", prefix, tag));
    }

    if let Some(environment) = config.environment.as_deref() {
        return Ok(format!("{}-{}", environment, tag));
    }

    Ok(tag.to_string())
}

/// Every tag a push publishes: the prefixed tag first, then `latest` and the
/// environment name unless additional tags are skipped
pub fn push_tags(config: &ResolvedConfig, skip_additional: bool) -> Result<Vec<String>> {
    let mut tags = vec![prefixed_tag(config)?];

    if !skip_additional {
        let mut extras = vec![LATEST_TAG.to_string()];
        extras.extend(config.environment.clone());

        for extra in extras {
            if !tags.contains(&extra) {
                tags.push(extra);
            }
        }
    }

    Ok(tags)
}

/// Split an image reference into repository and tag.
///
/// The tag separator is the last `:` not followed by a `/`, so registry
/// ports (`host:5000/app`) are not mistaken for tags.
pub fn split_image(image: &str) -> (&str, Option<&str>) {
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], Some(&image[idx + 1..])),
        _ => (image, None),
    }
}

pub fn retag_image(image: &str, new_tag: &str) -> String {
    let (repository, _) = split_image(image);
    format!("{}:{}", repository, new_tag)
}
