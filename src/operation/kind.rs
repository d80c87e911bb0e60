use serde::{Deserialize, Serialize};
use std::fmt;

/// How many files an output role produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    /// One file per frame of the kind's primary input role.
    PerFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Image,
    Table,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Image => crate::paths::IMAGE_EXT,
            ArtifactFormat::Table => crate::paths::TABLE_EXT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub role: &'static str,
    pub cardinality: Cardinality,
    pub format: ArtifactFormat,
}

const fn one(role: &'static str, format: ArtifactFormat) -> OutputSpec {
    OutputSpec {
        role,
        cardinality: Cardinality::One,
        format,
    }
}

const fn per_frame(role: &'static str) -> OutputSpec {
    OutputSpec {
        role,
        cardinality: Cardinality::PerFrame,
        format: ArtifactFormat::Image,
    }
}

/// The fixed catalog of processing operations the pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DarkCalibration,
    FlatCalibration,
    ZeroPointCalibration,
    BasicCalibration,
    BackgroundSubtraction,
    Combine,
    ObjectDetection,
    DistortionCorrection,
    OffsetRefinement,
    PhotometricCalibration,
    Stitch,
}

impl OperationKind {
    #[cfg(test)]
    pub const ALL: [OperationKind; 11] = [
        OperationKind::DarkCalibration,
        OperationKind::FlatCalibration,
        OperationKind::ZeroPointCalibration,
        OperationKind::BasicCalibration,
        OperationKind::BackgroundSubtraction,
        OperationKind::Combine,
        OperationKind::ObjectDetection,
        OperationKind::DistortionCorrection,
        OperationKind::OffsetRefinement,
        OperationKind::PhotometricCalibration,
        OperationKind::Stitch,
    ];

    /// Input roles that must carry at least one file. The first one is the
    /// primary role that per-frame outputs are counted against.
    pub fn input_roles(self) -> &'static [&'static str] {
        match self {
            OperationKind::DarkCalibration | OperationKind::FlatCalibration => &["raw"],
            OperationKind::ZeroPointCalibration => &["raw", "std_catalog"],
            OperationKind::BasicCalibration => &["raw"],
            OperationKind::BackgroundSubtraction | OperationKind::Combine => &["frames"],
            OperationKind::ObjectDetection => &["image"],
            OperationKind::DistortionCorrection => &["frames", "objects"],
            OperationKind::OffsetRefinement => &["frames"],
            OperationKind::PhotometricCalibration | OperationKind::Stitch => &["image"],
        }
    }

    /// Input roles the operation accepts but does not require.
    pub fn optional_input_roles(self) -> &'static [&'static str] {
        match self {
            OperationKind::BackgroundSubtraction => &["object_mask", "sky"],
            OperationKind::Combine => &["offsets"],
            OperationKind::PhotometricCalibration => &["zeropoint"],
            _ => &[],
        }
    }

    /// Calibration roles that must each resolve to a file.
    pub fn calibration_roles(self) -> &'static [&'static str] {
        match self {
            OperationKind::FlatCalibration => &["dark"],
            OperationKind::ZeroPointCalibration | OperationKind::BasicCalibration => {
                &["dark", "flat", "bpm"]
            }
            OperationKind::DistortionCorrection => &["distortion_x", "distortion_y"],
            _ => &[],
        }
    }

    pub fn outputs(self) -> &'static [OutputSpec] {
        use ArtifactFormat::{Image, Table};
        const DARK: [OutputSpec; 1] = [one("dark", Image)];
        const FLAT: [OutputSpec; 2] = [one("flat", Image), one("bpm", Image)];
        const ZEROPOINT: [OutputSpec; 1] = [one("zeropoint", Table)];
        const CALIBRATED: [OutputSpec; 1] = [per_frame("frames")];
        const COMBINED: [OutputSpec; 1] = [one("combined", Image)];
        const DETECTION: [OutputSpec; 2] = [one("mask", Image), one("objects", Table)];
        const OFFSETS: [OutputSpec; 1] = [one("offsets", Table)];
        const PHOTOMETRY: [OutputSpec; 2] = [one("image", Image), one("photometry", Table)];
        const MOSAIC: [OutputSpec; 1] = [one("mosaic", Image)];
        match self {
            OperationKind::DarkCalibration => &DARK,
            OperationKind::FlatCalibration => &FLAT,
            OperationKind::ZeroPointCalibration => &ZEROPOINT,
            OperationKind::BasicCalibration
            | OperationKind::BackgroundSubtraction
            | OperationKind::DistortionCorrection => &CALIBRATED,
            OperationKind::Combine => &COMBINED,
            OperationKind::ObjectDetection => &DETECTION,
            OperationKind::OffsetRefinement => &OFFSETS,
            OperationKind::PhotometricCalibration => &PHOTOMETRY,
            OperationKind::Stitch => &MOSAIC,
        }
    }

    pub fn output(self, role: &str) -> Option<OutputSpec> {
        self.outputs().iter().copied().find(|spec| spec.role == role)
    }

    /// Recipe name used when the configuration does not override it.
    pub fn default_recipe(self) -> &'static str {
        match self {
            OperationKind::DarkCalibration => "cal_dark",
            OperationKind::FlatCalibration => "cal_flat",
            OperationKind::ZeroPointCalibration => "cal_zpoint",
            OperationKind::BasicCalibration => "basic_calib",
            OperationKind::BackgroundSubtraction => "bkg_subtract",
            OperationKind::Combine => "combine",
            OperationKind::ObjectDetection => "obj_detect",
            OperationKind::DistortionCorrection => "distortion_correct",
            OperationKind::OffsetRefinement => "offset_refine",
            OperationKind::PhotometricCalibration => "phot_calib",
            OperationKind::Stitch => "stitch",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::DarkCalibration => "dark_calibration",
            OperationKind::FlatCalibration => "flat_calibration",
            OperationKind::ZeroPointCalibration => "zero_point_calibration",
            OperationKind::BasicCalibration => "basic_calibration",
            OperationKind::BackgroundSubtraction => "background_subtraction",
            OperationKind::Combine => "combine",
            OperationKind::ObjectDetection => "object_detection",
            OperationKind::DistortionCorrection => "distortion_correction",
            OperationKind::OffsetRefinement => "offset_refinement",
            OperationKind::PhotometricCalibration => "photometric_calibration",
            OperationKind::Stitch => "stitch",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
