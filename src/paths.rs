//! Typed paths into a run working tree.
//!
//! Centralizing path construction keeps staging, sequencing, and the external
//! zero-point scan agreeing on one layout.
use crate::staging::artifact_file_names;
use std::path::{Path, PathBuf};

/// Extension used for staged frames and image products.
pub const IMAGE_EXT: &str = "fits";
/// Extension used for tabular products.
pub const TABLE_EXT: &str = "json";
/// Tag whose calibration products act as the master fallback.
pub const MASTER_TAG: &str = "jit";

/// Convenience wrapper for locating a run's directories and files.
#[derive(Debug, Clone)]
pub struct RunPaths {
    run_name: String,
    root: PathBuf,
}

impl RunPaths {
    /// Create a path helper for `run_name` under `work_root`.
    pub fn new(work_root: &Path, run_name: &str) -> Self {
        Self {
            run_name: run_name.to_string(),
            root: work_root.join(run_name),
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Return the run root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `dark/` directory path.
    pub fn dark_dir(&self) -> PathBuf {
        self.root.join("dark")
    }

    /// Return the `flat/` directory path.
    pub fn flat_dir(&self) -> PathBuf {
        self.root.join("flat")
    }

    /// Return the `jitter/` directory path.
    pub fn jitter_dir(&self) -> PathBuf {
        self.root.join("jitter")
    }

    /// Return the `zeropoint/` directory path.
    pub fn zeropoint_dir(&self) -> PathBuf {
        self.root.join("zeropoint")
    }

    /// Return the `reference/` directory path.
    pub fn reference_dir(&self) -> PathBuf {
        self.root.join("reference")
    }

    /// Return the `sci_off/` directory path.
    pub fn science_offset_dir(&self) -> PathBuf {
        self.root.join("sci_off")
    }

    /// Return the `products/` directory path.
    pub fn products_dir(&self) -> PathBuf {
        self.root.join("products")
    }

    /// All directories created at setup.
    pub fn layout_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.dark_dir(),
            self.flat_dir(),
            self.jitter_dir(),
            self.zeropoint_dir(),
            self.reference_dir(),
            self.science_offset_dir(),
            self.products_dir(),
        ]
    }

    /// Return the persisted calibration catalog path.
    pub fn caldata_path(&self) -> PathBuf {
        self.root.join(format!("{}_caldata.json", self.run_name))
    }

    /// Return the persisted step-output catalog path.
    pub fn stepdata_path(&self) -> PathBuf {
        self.root.join(format!("{}_stepdata.json", self.run_name))
    }

    /// Return the product stem `{run}_{tag}_{artifact}`.
    pub fn product_stem(&self, tag: &str, artifact: &str) -> String {
        format!("{}_{tag}_{artifact}", self.run_name)
    }

    /// Return the single product file `{run}_{tag}_{artifact}.{ext}`.
    pub fn product_path(&self, tag: &str, artifact: &str, ext: &str) -> PathBuf {
        self.products_dir()
            .join(format!("{}.{ext}", self.product_stem(tag, artifact)))
    }

    /// Return `count` product files named like staged frames.
    pub fn product_paths(&self, tag: &str, artifact: &str, ext: &str, count: usize) -> Vec<PathBuf> {
        let products = self.products_dir();
        artifact_file_names(&self.product_stem(tag, artifact), ext, count)
            .into_iter()
            .map(|name| products.join(name))
            .collect()
    }

    /// Return the calibration product for the master tag.
    pub fn master_path(&self, artifact: &str) -> PathBuf {
        self.product_path(MASTER_TAG, artifact, IMAGE_EXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_names_follow_run_tag_artifact() {
        let paths = RunPaths::new(Path::new("/work"), "ob1");
        assert_eq!(
            paths.product_path("std00", "flt", IMAGE_EXT),
            PathBuf::from("/work/ob1/products/ob1_std00_flt.fits")
        );
        assert_eq!(
            paths.master_path("bpm"),
            PathBuf::from("/work/ob1/products/ob1_jit_bpm.fits")
        );
        assert_eq!(
            paths.product_paths("jit", "cal", IMAGE_EXT, 2),
            vec![
                PathBuf::from("/work/ob1/products/ob1_jit_cal_00.fits"),
                PathBuf::from("/work/ob1/products/ob1_jit_cal_01.fits"),
            ]
        );
        assert_eq!(
            paths.stepdata_path(),
            PathBuf::from("/work/ob1/ob1_stepdata.json")
        );
    }
}
