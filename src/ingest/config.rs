// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::{Source, SourceId};

pub const ENV_SOURCES_PATH: &str = "SOURCES_CONFIG_PATH";
const ENV_CREDENTIAL_PREFIX: &str = "env:";

/// Load source definitions from an explicit path. Supports TOML or JSON.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Load sources using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<Source>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let raw = match hint_ext {
        "toml" => parse_toml(s)?,
        "json" => parse_json(s)?,
        // Unknown extension: sniff the content.
        _ if s.trim_start().starts_with('[') && !s.contains("[[sources]]") => parse_json(s)?,
        _ => parse_toml(s)?,
    };
    clean_sources(raw)
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<Source>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    Ok(serde_json::from_str(s)?)
}

fn clean_sources(items: Vec<Source>) -> Result<Vec<Source>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut src in items {
        if !seen.insert(src.id) {
            bail!("duplicate source id {}", src.id);
        }
        src.platform = src.platform.trim().to_ascii_lowercase();
        if src.platform.is_empty() {
            bail!("source {} has no platform", src.id);
        }
        src.name = src.name.trim().to_string();
        src.access_token = src
            .access_token
            .take()
            .and_then(|raw| resolve_credential(src.id, &raw));
        out.push(src);
    }
    out.sort_by_key(|s| s.id);
    Ok(out)
}

/// `env:NAME` reads the variable; an unset one leaves the credential absent
/// so the adapter fails fast with a clear error.
fn resolve_credential(source_id: SourceId, raw: &str) -> Option<String> {
    let raw = raw.trim();
    let Some(var) = raw.strip_prefix(ENV_CREDENTIAL_PREFIX) else {
        return Some(raw.to_string()).filter(|s| !s.is_empty());
    };
    match std::env::var(var.trim()) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            tracing::warn!(source_id, var = var.trim(), "credential env var not set");
            None
        }
    }
}
