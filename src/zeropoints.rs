//! Cross-run zero-point aggregation.
//!
//! Works from the product naming convention alone: no run catalog is read,
//! so runs reduced by other tools aggregate the same way.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ZEROPOINT_FILE_PATTERN: &str = r"^(?P<run>.+)_(?P<group>std\d{2})_zp\.json$";

/// One detector segment's zero-point solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroPointRecord {
    pub group: String,
    pub segment: u32,
    pub zeropoint: f64,
    pub zeropoint_err: Option<f64>,
    pub extinction: Option<f64>,
    pub airmass: Option<f64>,
    pub n_stars: Option<u32>,
    pub filter: Option<String>,
}

/// Row shape written by the zero-point recipe; other columns are ignored.
#[derive(Debug, Deserialize)]
struct ZeroPointRow {
    segment: u32,
    zeropoint: f64,
    #[serde(default)]
    zeropoint_err: Option<f64>,
    #[serde(default)]
    extinction: Option<f64>,
    #[serde(default)]
    airmass: Option<f64>,
    #[serde(default)]
    n_stars: Option<u32>,
    #[serde(default)]
    filter: Option<String>,
}

pub type ZeroPointSummary = BTreeMap<String, Vec<ZeroPointRecord>>;

/// Scan `{work_root}/*/products/` and collect every run's zero points,
/// keeping only rows for `band` when one is given.
pub fn aggregate(work_root: &Path, band: Option<&str>) -> Result<ZeroPointSummary> {
    let pattern = Regex::new(ZEROPOINT_FILE_PATTERN).context("compile zero-point file pattern")?;
    let entries = fs::read_dir(work_root)
        .with_context(|| format!("read work root {}", work_root.display()))?;

    let mut summary = ZeroPointSummary::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", work_root.display()))?;
        let run_dir = entry.path();
        let products = run_dir.join("products");
        if !products.is_dir() {
            continue;
        }
        let Some(run) = run_dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let mut records = Vec::new();
        for (group, path) in zeropoint_files(&products, run, &pattern)? {
            records.extend(read_records(&path, &group, band)?);
        }
        if records.is_empty() {
            tracing::debug!(run, "no zero-point records");
            continue;
        }
        records.sort_by(|a, b| a.group.cmp(&b.group).then(a.segment.cmp(&b.segment)));
        summary.insert(run.to_string(), records);
    }
    tracing::info!(runs = summary.len(), band, "aggregated zero points");
    Ok(summary)
}

fn zeropoint_files(products: &Path, run: &str, pattern: &Regex) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(products).with_context(|| format!("read {}", products.display()))? {
        let path = entry
            .with_context(|| format!("read entry in {}", products.display()))?
            .path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(caps) = pattern.captures(name) else {
            continue;
        };
        if &caps["run"] != run {
            tracing::debug!(file = name, run, "zero-point file belongs to another run");
            continue;
        }
        files.push((caps["group"].to_string(), path));
    }
    files.sort();
    Ok(files)
}

fn read_records(path: &Path, group: &str, band: Option<&str>) -> Result<Vec<ZeroPointRecord>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let rows: Vec<ZeroPointRow> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse zero-point table {}", path.display()))?;
    Ok(rows
        .into_iter()
        .filter(|row| band.is_none() || row.filter.as_deref() == band)
        .map(|row| ZeroPointRecord {
            group: group.to_string(),
            segment: row.segment,
            zeropoint: row.zeropoint,
            zeropoint_err: row.zeropoint_err,
            extinction: row.extinction,
            airmass: row.airmass,
            n_stars: row.n_stars,
            filter: row.filter,
        })
        .collect())
}

/// Render the summary as sorted-key pretty JSON with a trailing newline.
pub fn render_summary(summary: &ZeroPointSummary) -> Result<String> {
    let mut text = serde_json::to_string_pretty(summary).context("serialize zero points")?;
    text.push('\n');
    Ok(text)
}

pub fn write_summary(summary: &ZeroPointSummary, out: &Path) -> Result<()> {
    if out.is_dir() {
        return Err(anyhow!("output {} is a directory", out.display()));
    }
    let text = render_summary(summary)?;
    crate::store::write_atomic(out, text.as_bytes())
        .with_context(|| format!("write {}", out.display()))
}
