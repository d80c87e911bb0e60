//! The fixed reduction DAG as an ordered list of step descriptors.
//!
//! Execution, resumability checks, and dry-run planning all read this list;
//! nothing else encodes step order.
use crate::catalog::{CalibrationCatalog, StepOutputCatalog};
use crate::operation::OperationKind;
use std::fmt;

/// A key in one of the two run catalogs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKey {
    Calibration(String),
    Step(String),
}

impl ArtifactKey {
    pub fn calibration(tag: impl Into<String>) -> Self {
        ArtifactKey::Calibration(tag.into())
    }

    pub fn step(key: impl Into<String>) -> Self {
        ArtifactKey::Step(key.into())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKey::Calibration(tag) => write!(f, "cal:{tag}"),
            ArtifactKey::Step(key) => write!(f, "step:{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub role: &'static str,
    pub key: ArtifactKey,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationSource {
    /// The step tag's own `{run}_{tag}_{artifact}.fits`, or the master's.
    Product { artifact: &'static str },
    /// A staged calibration catalog entry.
    Catalog(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationBinding {
    pub role: &'static str,
    pub source: CalibrationSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    pub role: &'static str,
    /// Step-output catalog key.
    pub key: String,
    /// Artifact suffix in the product file name.
    pub artifact: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    CalibrationPresent(String),
}

impl Condition {
    pub fn holds(&self, catalog: &CalibrationCatalog) -> bool {
        match self {
            Condition::Always => true,
            Condition::CalibrationPresent(tag) => catalog.contains(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub name: String,
    pub kind: OperationKind,
    /// Observation-type tag used to name products and pick calibrations.
    pub tag: String,
    pub inputs: Vec<InputBinding>,
    pub calibrations: Vec<CalibrationBinding>,
    pub outputs: Vec<OutputBinding>,
    pub condition: Condition,
}

impl StepDescriptor {
    fn new(name: impl Into<String>, kind: OperationKind, tag: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: tag.to_string(),
            inputs: Vec::new(),
            calibrations: Vec::new(),
            outputs: Vec::new(),
            condition: Condition::Always,
        }
    }

    fn input(mut self, role: &'static str, key: ArtifactKey) -> Self {
        self.inputs.push(InputBinding {
            role,
            key,
            optional: false,
        });
        self
    }

    fn optional(mut self, role: &'static str, key: ArtifactKey) -> Self {
        self.inputs.push(InputBinding {
            role,
            key,
            optional: true,
        });
        self
    }

    fn product(mut self, role: &'static str, artifact: &'static str) -> Self {
        self.calibrations.push(CalibrationBinding {
            role,
            source: CalibrationSource::Product { artifact },
        });
        self
    }

    fn catalog(mut self, role: &'static str, tag: &str) -> Self {
        self.calibrations.push(CalibrationBinding {
            role,
            source: CalibrationSource::Catalog(tag.to_string()),
        });
        self
    }

    fn output(mut self, role: &'static str, key: impl Into<String>, artifact: &'static str) -> Self {
        self.outputs.push(OutputBinding {
            role,
            key: key.into(),
            artifact,
        });
        self
    }

    fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Keys that must exist before the step may run.
    pub fn required_keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.inputs
            .iter()
            .filter(|binding| !binding.optional)
            .map(|binding| &binding.key)
    }

    /// Step-output keys whose presence marks the step done.
    pub fn output_keys(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|binding| binding.key.as_str())
    }

    pub fn is_enabled(&self, calibration: &CalibrationCatalog) -> bool {
        self.condition.holds(calibration)
    }

    /// True when every declared output key is already recorded.
    pub fn is_done(&self, steps: &StepOutputCatalog) -> bool {
        self.output_keys().all(|key| steps.contains(key))
    }
}

/// Standard-star group tags present in the catalog, in index order.
pub fn std_tags(catalog: &CalibrationCatalog) -> Vec<String> {
    catalog
        .tags()
        .filter(|tag| is_std_tag(tag))
        .map(str::to_string)
        .collect()
}

fn is_std_tag(tag: &str) -> bool {
    tag.strip_prefix("std")
        .is_some_and(|index| index.len() == 2 && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Build the run's step list from its calibration catalog.
pub fn build_pipeline(catalog: &CalibrationCatalog) -> Vec<StepDescriptor> {
    use OperationKind::*;
    let cal = |tag: &str| ArtifactKey::calibration(tag);
    let step = |key: &str| ArtifactKey::step(key);
    let std_tags = std_tags(catalog);

    let mut steps = vec![
        StepDescriptor::new("dark_jit", DarkCalibration, "jit")
            .input("raw", cal("jit_drk"))
            .output("dark", "jit_mdark", "drk"),
        StepDescriptor::new("flat_dark_jit", DarkCalibration, "jit")
            .input("raw", cal("jit_flt_drk"))
            .output("dark", "jit_flat_mdark", "flt_drk"),
        StepDescriptor::new("flat_jit", FlatCalibration, "jit")
            .input("raw", cal("jit_flt"))
            .product("dark", "flt_drk")
            .output("flat", "jit_mflat", "flt")
            .output("bpm", "jit_bpm", "bpm"),
    ];

    for tag in &std_tags {
        steps.push(
            StepDescriptor::new(format!("dark_{tag}"), DarkCalibration, tag)
                .input("raw", cal(&format!("{tag}_drk")))
                .output("dark", format!("{tag}_mdark"), "drk")
                .when(Condition::CalibrationPresent(format!("{tag}_drk"))),
        );
        steps.push(
            StepDescriptor::new(format!("flat_dark_{tag}"), DarkCalibration, tag)
                .input("raw", cal(&format!("{tag}_flt_drk")))
                .output("dark", format!("{tag}_flat_mdark"), "flt_drk")
                .when(Condition::CalibrationPresent(format!("{tag}_flt_drk"))),
        );
        steps.push(
            StepDescriptor::new(format!("flat_{tag}"), FlatCalibration, tag)
                .input("raw", cal(&format!("{tag}_flt")))
                .product("dark", "flt_drk")
                .output("flat", format!("{tag}_mflat"), "flt")
                .output("bpm", format!("{tag}_bpm"), "bpm")
                .when(Condition::CalibrationPresent(format!("{tag}_flt"))),
        );
    }
    for tag in &std_tags {
        steps.push(
            StepDescriptor::new(format!("zeropoint_{tag}"), ZeroPointCalibration, tag)
                .input("raw", cal(tag))
                .input("std_catalog", cal(&format!("{tag}_cat")))
                .product("dark", "drk")
                .product("flat", "flt")
                .product("bpm", "bpm")
                .output("zeropoint", format!("{tag}_zp"), "zp")
                .when(Condition::CalibrationPresent(format!("{tag}_cat"))),
        );
    }

    steps.extend([
        StepDescriptor::new("basic_jit", BasicCalibration, "jit")
            .input("raw", cal("jit"))
            .product("dark", "drk")
            .product("flat", "flt")
            .product("bpm", "bpm")
            .output("frames", "jit_cal", "cal"),
        StepDescriptor::new("background1_jit", BackgroundSubtraction, "jit")
            .input("frames", step("jit_cal"))
            .optional("sky", cal("off"))
            .output("frames", "jit_bkg1", "bkg1"),
        StepDescriptor::new("combine1_jit", Combine, "jit")
            .input("frames", step("jit_bkg1"))
            .output("combined", "jit_comb1", "comb1"),
        StepDescriptor::new("detect1_jit", ObjectDetection, "jit")
            .input("image", step("jit_comb1"))
            .output("mask", "jit_objmask", "objmask1")
            .output("objects", "jit_objcat1", "objcat1"),
        StepDescriptor::new("background2_jit", BackgroundSubtraction, "jit")
            .input("frames", step("jit_cal"))
            .input("object_mask", step("jit_objmask"))
            .optional("sky", cal("off"))
            .output("frames", "jit_bkg2", "bkg2"),
        StepDescriptor::new("combine_jit", Combine, "jit")
            .input("frames", step("jit_bkg2"))
            .output("combined", "jit_comb", "comb"),
        StepDescriptor::new("detect_jit", ObjectDetection, "jit")
            .input("image", step("jit_comb"))
            .output("mask", "jit_combmask", "objmask")
            .output("objects", "jit_objcat", "objcat"),
        StepDescriptor::new("distortion_jit", DistortionCorrection, "jit")
            .input("frames", step("jit_bkg2"))
            .input("objects", step("jit_objcat"))
            .catalog("distortion_x", "dst_x")
            .catalog("distortion_y", "dst_y")
            .output("frames", "jit_dst", "dst"),
        StepDescriptor::new("offsets_jit", OffsetRefinement, "jit")
            .input("frames", step("jit_dst"))
            .output("offsets", "jit_offsets", "offsets"),
        StepDescriptor::new("final_combine_jit", Combine, "jit")
            .input("frames", step("jit_dst"))
            .input("offsets", step("jit_offsets"))
            .output("combined", "jit_final", "final"),
    ]);

    let mut photometry = StepDescriptor::new("photometry_jit", PhotometricCalibration, "jit")
        .input("image", step("jit_final"));
    for tag in &std_tags {
        photometry = photometry.optional("zeropoint", step(&format!("{tag}_zp")));
    }
    steps.push(
        photometry
            .output("image", "jit_phot", "phot")
            .output("photometry", "jit_photcat", "photcat"),
    );
    steps.push(
        StepDescriptor::new("stitch_jit", Stitch, "jit")
            .input("image", step("jit_phot"))
            .output("mosaic", "jit_mosaic", "mosaic"),
    );
    steps
}
