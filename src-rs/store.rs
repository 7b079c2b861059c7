//! Record store access: `<base>/<id>.json` on disk or over HTTP.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use thiserror::Error;
use url::Url;

use crate::record::DetectionRecord;

/// Identifier shown when the location does not name one.
pub const DEFAULT_RECORD_ID: &str = "2017877547";

const MAX_ASSET_BYTES: u64 = 64 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("record '{id}' not found")]
    NotFound { id: String },
    #[error("record id '{id}' is not a valid key")]
    InvalidId { id: String },
    #[error("failed to fetch record '{id}'")]
    Transport {
        id: String,
        #[source]
        source: BoxError,
    },
    #[error("record '{id}' is not valid JSON")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported record store base '{0}'")]
    InvalidBase(String),
}

/// Resolves identifiers to detection records.
pub trait RecordStore: Send + Sync {
    fn resolve(&self, id: &str) -> Result<DetectionRecord, ResolveError>;

    /// Raw bytes of an asset referenced by a record, such as its `image_url`.
    /// Relative references resolve against the store base.
    fn fetch_asset(&self, href: &str) -> Result<Vec<u8>>;

    fn describe(&self) -> String;
}

/// Pick a backend from the shape of `base`: `http(s)://` URLs go over the network,
/// anything else is a directory.
pub fn open_store(base: &str) -> Result<Arc<dyn RecordStore>, ResolveError> {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidBase(base.to_string()));
    }
    if let Ok(url) = Url::parse(trimmed) {
        match url.scheme() {
            "http" | "https" => return Ok(Arc::new(HttpStore::new(url))),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ResolveError::InvalidBase(base.to_string()))?;
                return Ok(Arc::new(DirStore::new(path)));
            }
            // Single-letter schemes are Windows drive prefixes.
            scheme if scheme.len() > 1 => {
                return Err(ResolveError::InvalidBase(base.to_string()))
            }
            _ => {}
        }
    }
    Ok(Arc::new(DirStore::new(PathBuf::from(trimmed))))
}

fn check_id(id: &str) -> Result<(), ResolveError> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ResolveError::InvalidId { id: id.to_string() })
    }
}

fn decode(id: &str, raw: &str) -> Result<DetectionRecord, ResolveError> {
    DetectionRecord::from_json(raw).map_err(|source| ResolveError::Malformed {
        id: id.to_string(),
        source,
    })
}

/// Records stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RecordStore for DirStore {
    fn resolve(&self, id: &str) -> Result<DetectionRecord, ResolveError> {
        check_id(id)?;
        let path = self.root.join(format!("{id}.json"));
        log::debug!("reading record {}", path.display());
        let raw = fs::read_to_string(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ResolveError::NotFound { id: id.to_string() }
            } else {
                ResolveError::Transport {
                    id: id.to_string(),
                    source: Box::new(err),
                }
            }
        })?;
        decode(id, &raw)
    }

    fn fetch_asset(&self, href: &str) -> Result<Vec<u8>> {
        if is_remote(href) {
            return fetch_url_bytes(href);
        }
        let relative = href.trim_start_matches("./");
        let path = if Path::new(relative).is_absolute() {
            PathBuf::from(relative)
        } else {
            self.root.join(relative)
        };
        fs::read(&path).with_context(|| format!("failed to read asset: {}", path.display()))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Records served as `<base>/<id>.json`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base: Url,
}

impl HttpStore {
    pub fn new(mut base: Url) -> Self {
        // Url::join drops the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base }
    }
}

impl RecordStore for HttpStore {
    fn resolve(&self, id: &str) -> Result<DetectionRecord, ResolveError> {
        check_id(id)?;
        let url = self
            .base
            .join(&format!("{id}.json"))
            .map_err(|err| ResolveError::Transport {
                id: id.to_string(),
                source: Box::new(err),
            })?;
        log::debug!("fetching record {url}");
        let response = match ureq::get(url.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => {
                return Err(ResolveError::NotFound { id: id.to_string() })
            }
            Err(err) => {
                return Err(ResolveError::Transport {
                    id: id.to_string(),
                    source: err.to_string().into(),
                })
            }
        };
        let raw = response
            .into_string()
            .map_err(|err| ResolveError::Transport {
                id: id.to_string(),
                source: Box::new(err),
            })?;
        decode(id, &raw)
    }

    fn fetch_asset(&self, href: &str) -> Result<Vec<u8>> {
        let url = self
            .base
            .join(href)
            .with_context(|| format!("invalid asset reference: {href}"))?;
        fetch_url_bytes(url.as_str())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

fn fetch_url_bytes(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to fetch {url}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_ASSET_BYTES + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read body of {url}"))?;
    if bytes.len() as u64 > MAX_ASSET_BYTES {
        bail!("asset exceeds {MAX_ASSET_BYTES} bytes: {url}");
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dir_store_resolves_and_reports_misses() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("42.json"),
            r#"{"image_url": "img/42.jpg", "width": 4, "height": 3}"#,
        )
        .unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = DirStore::new(dir.path());

        assert_eq!(store.resolve("42").unwrap().image_url, "img/42.jpg");
        assert!(matches!(
            store.resolve("43"),
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            store.resolve("bad"),
            Err(ResolveError::Malformed { .. })
        ));
    }

    #[test]
    fn ids_cannot_escape_the_store() {
        let store = DirStore::new("/tmp");
        for id in ["", "..", "../etc/passwd", "a/b", "a b"] {
            assert!(matches!(
                store.resolve(id),
                Err(ResolveError::InvalidId { .. })
            ));
        }
    }

    #[test]
    fn dir_store_reads_relative_assets() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("img")).unwrap();
        fs::write(dir.path().join("img").join("a.jpg"), b"abc").unwrap();
        let store = DirStore::new(dir.path());
        assert_eq!(store.fetch_asset("./img/a.jpg").unwrap(), b"abc");
        assert!(store.fetch_asset("img/missing.jpg").is_err());
    }

    #[test]
    fn open_store_picks_backend_from_base() {
        assert!(open_store("https://example.org/json")
            .unwrap()
            .describe()
            .ends_with("/json/"));
        assert_eq!(open_store("./json").unwrap().describe(), "./json");
        assert!(matches!(
            open_store("ftp://example.org/json"),
            Err(ResolveError::InvalidBase(_))
        ));
        assert!(open_store("  ").is_err());
    }
}
