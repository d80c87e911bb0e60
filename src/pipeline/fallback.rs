//! Master-artifact fallback for per-type calibration products.
use crate::paths::{RunPaths, IMAGE_EXT, MASTER_TAG};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCalibration {
    pub path: PathBuf,
    pub from_master: bool,
}

/// Pick `{run}_{tag}_{artifact}.fits` when it exists on disk, else the
/// master `{run}_jit_{artifact}.fits`; `None` when neither exists.
pub fn resolve_calibration(paths: &RunPaths, tag: &str, artifact: &str) -> Option<ResolvedCalibration> {
    let own = paths.product_path(tag, artifact, IMAGE_EXT);
    if own.is_file() {
        return Some(ResolvedCalibration {
            path: own,
            from_master: false,
        });
    }
    if tag == MASTER_TAG {
        return None;
    }
    let master = paths.master_path(artifact);
    if master.is_file() {
        tracing::warn!(
            tag,
            artifact,
            missing = %own.display(),
            "per-type calibration absent; using master"
        );
        return Some(ResolvedCalibration {
            path: master,
            from_master: true,
        });
    }
    None
}
