use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::MalformedLineError;

/// One `Name,URL` pair from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct LoadedInput {
    pub entries: Vec<UrlEntry>,
    pub malformed: Vec<MalformedLineError>,
}

/// Read the input file. Malformed lines are skipped and reported, never fatal.
pub fn load_entries(path: &Path) -> Result<LoadedInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let loaded = parse_entries(&text);
    for bad in &loaded.malformed {
        warn!("Skipping malformed input {}", bad);
    }
    Ok(loaded)
}

pub fn parse_entries(text: &str) -> LoadedInput {
    let mut loaded = LoadedInput::default();

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(entry) => loaded.entries.push(entry),
            None => loaded.malformed.push(MalformedLineError {
                line: idx + 1,
                raw: raw.to_string(),
            }),
        }
    }

    loaded
}

fn parse_line(line: &str) -> Option<UrlEntry> {
    let (name, url) = line.split_once(',')?;
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() || url.is_empty() {
        return None;
    }
    Some(UrlEntry {
        name: name.to_string(),
        url: url.to_string(),
    })
}
