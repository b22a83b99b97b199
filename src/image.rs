use crate::error::{CheckError, Result, TagRejection};
use std::fmt;

pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
const DEFAULT_NAMESPACE: &str = "library";
const LATEST_TAG: &str = "latest";

/// A container image reference split into the parts the registry API needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// The reference exactly as the container runtime reported it.
    pub raw_name: String,
    pub registry: String,
    pub namespace: String,
    pub name: String,
    /// Empty when the reference carries no tag.
    pub tag: String,
}

impl ImageReference {
    /// Parses `[registry/][namespace/]name[:tag]`.
    ///
    /// A three segment reference is only accepted when its first segment looks
    /// like a host (contains a dot); otherwise it would be ambiguous with a
    /// nested namespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        let (name, tag) = split_name_and_tag(segments[segments.len() - 1])?;

        let (registry, namespace) = match segments.len() {
            1 => (DEFAULT_REGISTRY, DEFAULT_NAMESPACE),
            2 => (DEFAULT_REGISTRY, segments[0]),
            3 => {
                let registry = segments[0];
                if !registry.contains('.') {
                    return Err(CheckError::InvalidReference(format!(
                        "{} is invalid registry",
                        registry
                    )));
                }
                (registry, segments[1])
            }
            _ => {
                return Err(CheckError::InvalidReference(format!(
                    "{} has too many path segments",
                    raw
                )))
            }
        };

        Ok(Self {
            raw_name: raw.to_string(),
            registry: registry.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// `namespace/name`, as used in registry API paths.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_name)
    }
}

fn split_name_and_tag(name_tag: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = name_tag.split(':').collect();
    match parts.as_slice() {
        [name] => Ok((*name, "")),
        [name, tag] => Ok((*name, *tag)),
        _ => Err(CheckError::InvalidReference(format!(
            "{} is invalid image name format",
            name_tag
        ))),
    }
}

/// Rejects tags that cannot be compared against a registry's tag list.
pub fn validate_tag(tag: &str) -> Result<()> {
    match tag {
        "" => Err(CheckError::InvalidTag(TagRejection::Missing)),
        LATEST_TAG => Err(CheckError::InvalidTag(TagRejection::Latest)),
        _ => Ok(()),
    }
}
