use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::WriteError;

pub const DEFAULT_OUT_DIR: &str = "output";
const UNNAMED: &str = "unnamed";

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Lowercase, collapse whitespace runs to `_`, drop anything outside `[a-z0-9_]`.
pub fn sanitize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        }
    }
    if out.is_empty() {
        UNNAMED.to_string()
    } else {
        out
    }
}

/// Remove markdown image syntax: ![alt](url) and [![alt](url)](link)
pub fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}

/// JSON sidecar written next to the markdown when `--json` is given.
#[derive(Debug, Serialize)]
pub struct PageRecord<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub status_code: Option<u16>,
    pub attempts: u8,
    pub enhanced: bool,
    pub scraped_at: DateTime<Utc>,
    pub markdown: &'a str,
}

pub struct OutputWriter {
    dir: PathBuf,
    json: bool,
    strip_images: bool,
    written: RefCell<HashSet<PathBuf>>,
    overwritten: Cell<usize>,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            json: false,
            strip_images: false,
            written: RefCell::default(),
            overwritten: Cell::new(0),
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_strip_images(mut self, strip: bool) -> Self {
        self.strip_images = strip;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files this writer replaced after writing them earlier in the same run.
    pub fn overwritten(&self) -> usize {
        self.overwritten.get()
    }

    /// Write `{sanitized}.md` (and `{sanitized}.json` when enabled).
    /// Returns the markdown path.
    pub fn write(&self, record: &PageRecord<'_>) -> Result<PathBuf, WriteError> {
        if !self.dir.is_dir() {
            std::fs::create_dir_all(&self.dir).map_err(|source| WriteError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;
        }

        let stem = sanitize(record.name);
        let stripped;
        let markdown = if self.strip_images {
            stripped = strip_images(record.markdown);
            stripped.as_str()
        } else {
            record.markdown
        };

        let md_path = self.dir.join(format!("{}.md", stem));
        if !self.written.borrow_mut().insert(md_path.clone()) {
            warn!(
                "{:?} maps to {} which was already written in this run, overwriting",
                record.name,
                md_path.display()
            );
            self.overwritten.set(self.overwritten.get() + 1);
        }
        std::fs::write(&md_path, markdown).map_err(|source| WriteError::Write {
            path: md_path.clone(),
            source,
        })?;

        if self.json {
            let json_path = self.dir.join(format!("{}.json", stem));
            let record = PageRecord { markdown, ..*record };
            let body = serde_json::to_string_pretty(&record).map_err(|source| WriteError::Encode {
                path: json_path.clone(),
                source,
            })?;
            std::fs::write(&json_path, body).map_err(|source| WriteError::Write {
                path: json_path,
                source,
            })?;
        }

        Ok(md_path)
    }
}
