//! Settings-template filtering.
//!
//! Templates carry `@name@` placeholders. Filtering substitutes every
//! placeholder from a property map and writes the result with an explicit
//! encoding. An unbound placeholder is a broken fixture and fails the
//! scenario setup.

use crate::error::{HarnessError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_.\-]+)@").expect("placeholder regex"));

/// Text encodings supported for templates and generated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl TextEncoding {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Decode bytes. UTF-8 decoding is lossy; Latin-1 maps bytes 1:1.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
                .collect(),
        }
    }

    /// Encode text.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` for characters outside the encoding's repertoire.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Latin1 => 0xFF,
            Self::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|b| u32::from(*b) <= limit)
                    .ok_or_else(|| HarnessError::Encoding {
                        encoding: self.name().to_string(),
                        character: c,
                    })
            })
            .collect()
    }
}

impl FromStr for TextEncoding {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            other => Err(HarnessError::Config(format!("unsupported encoding: {other}"))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named values substituted into templates. Keys are unique; later inserts
/// replace earlier ones.
pub type FilterProperties = BTreeMap<String, String>;

/// Render `path` as a `file://` URL.
#[must_use]
pub fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}

/// Default properties derived from the workspace and local cache.
#[must_use]
pub fn default_properties(basedir: &Path, local_repo: &Path) -> FilterProperties {
    let mut props = FilterProperties::new();
    props.insert("basedir".to_string(), basedir.display().to_string());
    props.insert("baseurl".to_string(), file_url(basedir));
    props.insert("localrepo".to_string(), local_repo.display().to_string());
    props.insert("localrepourl".to_string(), file_url(local_repo));
    props
}

/// Substitute placeholders in `text`.
///
/// # Errors
///
/// Returns `TemplateResolution` naming the first unbound placeholder.
pub fn resolve(text: &str, props: &FilterProperties, template: &Path) -> Result<String> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|name| !props.contains_key(name))
    {
        return Err(HarnessError::TemplateResolution {
            template: template.to_path_buf(),
            placeholder: missing,
        });
    }

    Ok(PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| props[&caps[1]].clone())
        .into_owned())
}

/// Resolve a template file and write the materialized file.
#[derive(Debug, Clone)]
pub struct TemplateFilter {
    root: PathBuf,
}

impl TemplateFilter {
    /// Relative paths resolve against `root` (the workspace).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Filter `source` into `target`, returning the written path.
    ///
    /// # Errors
    ///
    /// Fails on unreadable templates, unbound placeholders, unencodable
    /// characters, and write errors.
    pub fn filter_file(
        &self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        encoding: TextEncoding,
        props: &FilterProperties,
    ) -> Result<PathBuf> {
        let source = self.resolve_path(source.as_ref());
        let target = self.resolve_path(target.as_ref());

        let bytes = fs::read(&source).map_err(|err| {
            HarnessError::with_context(format!("reading template {}", source.display()), err)
        })?;
        let text = encoding.decode(&bytes);
        let resolved = resolve(&text, props, &source)?;
        let encoded = encoding.encode(&resolved)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, encoded)?;
        debug!(
            template = %source.display(),
            target = %target.display(),
            encoding = %encoding,
            "Filtered template"
        );
        Ok(target)
    }
}
