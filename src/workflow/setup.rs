//! Setup: resolve the manifest and stage every input into a fresh run tree.
//!
//! All validation happens before the first directory is created, so a bad
//! manifest path or missing root leaves the work root untouched.
use super::context::{validate_run_name, WorkflowContext};
use crate::catalog::CalibrationCatalog;
use crate::cli::{GlobalArgs, SetupArgs};
use crate::config::{PipelineConfig, SetupRoots};
use crate::manifest::{
    load_manifest, resolve_category, resolve_distortion_map, resolve_standard_associations, Axis,
    Category, DistortionSource, Manifest,
};
use crate::paths::RunPaths;
use crate::staging::Stager;
use crate::store::{Namespace, StateStore};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One resolved artifact set and where it is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StageItem {
    tag: String,
    files: Vec<PathBuf>,
    dest_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct SetupReport {
    pub(crate) paths: RunPaths,
    pub(crate) catalog: CalibrationCatalog,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn run_setup(global: &GlobalArgs, args: &SetupArgs) -> Result<()> {
    let mut ctx = WorkflowContext::load(global)?;
    if let Some(dir) = &args.raw_dir {
        ctx.config.raw_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.calib_dir {
        ctx.config.calib_dir = Some(dir.clone());
    }
    ctx.config.work_root = Some(ctx.work_root.clone());
    let report = setup_run(&ctx.config, &args.manifest, args.run.as_deref())?;

    println!(
        "run {} staged at {}",
        report.paths.run_name(),
        report.paths.root().display()
    );
    for tag in report.catalog.tags() {
        let count = report.catalog.get(tag).map_or(0, <[PathBuf]>::len);
        println!("  {tag:<16} {count}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

/// Stage a manifest into `{work_root}/{run}` and persist its calibration
/// catalog. Re-running with the same inputs yields the same catalog.
pub(crate) fn setup_run(
    config: &PipelineConfig,
    manifest_path: &Path,
    run: Option<&str>,
) -> Result<SetupReport> {
    validate_manifest_path(manifest_path)?;
    let roots = config.setup_roots()?;
    let manifest = load_manifest(manifest_path)?;
    let run_name = run_name(run, &manifest, manifest_path)?;
    validate_run_name(&run_name)?;
    let paths = RunPaths::new(&roots.work_root, &run_name);

    let mut warnings = Vec::new();
    let items = stage_items(&manifest, &roots, &paths, &mut warnings)?;

    for dir in paths.layout_dirs() {
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let stager = Stager::new(&run_name, config.stage_mode, config.restage);
    let mut catalog = CalibrationCatalog::new();
    for item in &items {
        stager.stage(&item.files, &item.dest_dir, &item.tag, &mut catalog)?;
    }

    StateStore::new(paths.clone())
        .save(Namespace::Calibration, &catalog)
        .context("save calibration catalog")?;
    tracing::info!(run = %run_name, tags = catalog.tags().count(), "setup complete");
    Ok(SetupReport {
        paths,
        catalog,
        warnings,
    })
}

fn validate_manifest_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(anyhow!(
            "manifest path {} must be absolute",
            path.display()
        ));
    }
    if !path.is_file() {
        return Err(anyhow!("manifest {} does not exist", path.display()));
    }
    Ok(())
}

fn run_name(explicit: Option<&str>, manifest: &Manifest, path: &Path) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| manifest.name.clone())
        .or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .ok_or_else(|| anyhow!("cannot derive a run name; pass --run"))
}

/// Resolve every artifact set the DAG can consume, in staging order.
fn stage_items(
    manifest: &Manifest,
    roots: &SetupRoots,
    paths: &RunPaths,
    warnings: &mut Vec<String>,
) -> Result<Vec<StageItem>> {
    let raw = |names: Vec<String>| -> Vec<PathBuf> {
        names.iter().map(|name| roots.raw_dir.join(name)).collect()
    };
    let item = |tag: &str, files: Vec<PathBuf>, dest_dir: PathBuf| StageItem {
        tag: tag.to_string(),
        files,
        dest_dir,
    };

    let science = resolve_category(manifest, &[]);
    if science.is_empty() {
        return Err(anyhow!("manifest has no science frames (root main_files is empty)"));
    }
    let flat_darks = resolve_category(manifest, &[Category::Flat, Category::Dark]);
    let mut darks = resolve_category(manifest, &[Category::Dark]);
    if darks.is_empty() && !flat_darks.is_empty() {
        let message = "no DARK association for science frames; using the flat darks".to_string();
        tracing::warn!("{message}");
        warnings.push(message);
        darks = flat_darks.clone();
    }

    let mut items = vec![
        item("jit", raw(science), paths.jitter_dir()),
        item(
            "jit_flt",
            raw(resolve_category(manifest, &[Category::Flat])),
            paths.flat_dir(),
        ),
        item("jit_flt_drk", raw(flat_darks), paths.dark_dir()),
        item("jit_drk", raw(darks), paths.dark_dir()),
        item(
            "off",
            raw(resolve_category(manifest, &[Category::Offset])),
            paths.science_offset_dir(),
        ),
    ];

    for group in resolve_standard_associations(manifest) {
        let tag = group.tag();
        if group.main_files.is_empty() {
            let message = format!("standard group {tag} has no frames; not staging it");
            tracing::warn!("{message}");
            warnings.push(message);
            continue;
        }
        if group.catalogs.is_empty() {
            let message =
                format!("standard group {tag} has no STDSTARS_CATS; zeropoint_{tag} will be skipped");
            tracing::warn!("{message}");
            warnings.push(message);
        }
        items.push(item(&tag, raw(group.main_files), paths.zeropoint_dir()));
        items.push(item(&format!("{tag}_flt"), raw(group.flats), paths.flat_dir()));
        items.push(item(
            &format!("{tag}_flt_drk"),
            raw(group.flat_darks),
            paths.dark_dir(),
        ));
        items.push(item(&format!("{tag}_drk"), raw(group.darks), paths.dark_dir()));
        items.push(item(
            &format!("{tag}_cat"),
            raw(group.catalogs),
            paths.zeropoint_dir(),
        ));
    }

    for axis in [Axis::X, Axis::Y] {
        let map = resolve_distortion_map(manifest, axis, &roots.calib_dir);
        warnings.extend(map.warnings.iter().cloned());
        let file = match map.source {
            DistortionSource::Default => map.file,
            DistortionSource::Preferred | DistortionSource::Legacy => roots.raw_dir.join(map.file),
        };
        items.push(item(
            &format!("dst_{}", map.axis.suffix()),
            vec![file],
            paths.reference_dir(),
        ));
    }

    let missing: Vec<String> = items
        .iter()
        .flat_map(|item| item.files.iter())
        .filter(|file| !file.is_file())
        .map(|file| file.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(
            "{} manifest input(s) missing: {}",
            missing.len(),
            missing.join(", ")
        ));
    }
    Ok(items)
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod tests;
