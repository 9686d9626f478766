//! Canonical resource identities derived from document URIs.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{VisualizeError, VisualizeResult};

/// Canonical key for one external document.
///
/// Every URI spelling of the same local file (`file://` URL, plain absolute
/// path, redundant `.`/`..` segments, percent-encoding) resolves to an equal
/// identity. Non-file schemes such as `untitled:` keep their scheme as part of
/// the key so they can never collide with a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    /// Resolve the identity of the document at `uri`.
    pub fn resolve(uri: &str) -> VisualizeResult<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(resolution_error(uri, "empty URI"));
        }

        match Url::parse(trimmed) {
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(url) if url.scheme().len() > 1 => Self::from_url(uri, &url),
            _ => Self::from_path(uri, Path::new(trimmed)),
        }
    }

    fn from_url(uri: &str, url: &Url) -> VisualizeResult<Self> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| resolution_error(uri, "file URL does not name a local path"))?;
            return Ok(Self(normalize(&path)));
        }

        let path = url.path();
        if path.is_empty() {
            return Err(resolution_error(uri, "URI has no path"));
        }
        let path = if path.starts_with('/') {
            normalize(Path::new(path))
        } else {
            path.to_string()
        };
        Ok(Self(format!("{}:{path}", url.scheme())))
    }

    fn from_path(uri: &str, path: &Path) -> VisualizeResult<Self> {
        if !path.has_root() {
            return Err(resolution_error(uri, "path is not absolute"));
        }
        Ok(Self(normalize(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexically normalize a path: drop `.`, fold `..`, collapse separators.
/// `..` never climbs above the root.
fn normalize(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}

fn resolution_error(uri: &str, reason: &str) -> VisualizeError {
    VisualizeError::IdentityResolution {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(uri: &str) -> ResourceIdentity {
        ResourceIdentity::resolve(uri).unwrap()
    }

    #[test]
    fn test_same_file_spellings_are_equal() {
        let base = id("/a/b.json");
        assert_eq!(id("file:///a/b.json"), base);
        assert_eq!(id("/a/./b.json"), base);
        assert_eq!(id("/a/x/../b.json"), base);
        assert_eq!(id("/a//b.json"), base);
        assert_eq!(id("  /a/b.json  "), base);
        assert_eq!(id("file:///a/b%2Ejson"), base);
        assert_eq!(base.as_str(), "/a/b.json");
    }

    #[test]
    fn test_different_files_differ() {
        assert_ne!(id("/a/b.json"), id("/a/c.json"));
        assert_ne!(id("/a/b.json"), id("/a/B.json"));
    }

    #[test]
    fn test_parent_dir_stops_at_root() {
        assert_eq!(id("/../../a.json"), id("/a.json"));
    }

    #[test]
    fn test_untitled_scheme_kept_separate() {
        let untitled = id("untitled:Untitled-1");
        assert_eq!(untitled.as_str(), "untitled:Untitled-1");
        assert_ne!(untitled, id("/Untitled-1"));
    }

    #[test]
    fn test_rejects_empty_and_relative() {
        assert!(matches!(
            ResourceIdentity::resolve(""),
            Err(VisualizeError::IdentityResolution { .. })
        ));
        assert!(matches!(
            ResourceIdentity::resolve("   "),
            Err(VisualizeError::IdentityResolution { .. })
        ));
        assert!(matches!(
            ResourceIdentity::resolve("relative/state.json"),
            Err(VisualizeError::IdentityResolution { .. })
        ));
    }

    #[test]
    fn test_remote_file_url_rejected() {
        let result = ResourceIdentity::resolve("file://remote-host/share/b.json");
        assert!(result.is_err());
    }
}
