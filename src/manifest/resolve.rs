//! Association queries over the manifest tree.
//!
//! Every query returns file names in manifest document order; downstream
//! operations map that order onto physical jitter and offset positions.
use super::{Association, Category, Manifest};
use std::path::{Path, PathBuf};

/// Collect the main files reached by walking `path` from the manifest root.
///
/// An empty path yields the root main files. No match is an empty list, not
/// an error.
pub fn resolve_category(manifest: &Manifest, path: &[Category]) -> Vec<String> {
    resolve_from(&manifest.main_files, &manifest.associations, path)
}

fn resolve_from(main_files: &[String], children: &[Association], path: &[Category]) -> Vec<String> {
    let Some((first, rest)) = path.split_first() else {
        return main_files.to_vec();
    };
    let mut files = Vec::new();
    for child in children.iter().filter(|child| &child.category == first) {
        collect(child, rest, &mut files);
    }
    files
}

fn collect(node: &Association, rest: &[Category], out: &mut Vec<String>) {
    match rest.split_first() {
        None => out.extend(node.main_files.iter().cloned()),
        Some((next, tail)) => {
            for child in node.associations.iter().filter(|child| &child.category == next) {
                collect(child, tail, out);
            }
        }
    }
}

/// A complete standard-star association and the calibration files beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdGroup {
    /// Position among the complete groups, in document order.
    pub index: usize,
    pub main_files: Vec<String>,
    pub flats: Vec<String>,
    pub flat_darks: Vec<String>,
    pub darks: Vec<String>,
    pub catalogs: Vec<String>,
}

impl StdGroup {
    /// Observation-type tag used for catalog keys and staged names.
    pub fn tag(&self) -> String {
        format!("std{:02}", self.index)
    }
}

/// Return one group per top-level STD association marked complete.
pub fn resolve_standard_associations(manifest: &Manifest) -> Vec<StdGroup> {
    let mut groups = Vec::new();
    for (position, node) in manifest
        .associations
        .iter()
        .filter(|node| node.category == Category::Std)
        .enumerate()
    {
        if !node.complete {
            tracing::debug!(position, "skipping incomplete STD association");
            continue;
        }
        let sub = |path: &[Category]| resolve_from(&node.main_files, &node.associations, path);
        groups.push(StdGroup {
            index: groups.len(),
            main_files: node.main_files.clone(),
            flats: sub(&[Category::Flat]),
            flat_darks: sub(&[Category::Flat, Category::Dark]),
            darks: sub(&[Category::Dark]),
            catalogs: sub(&[Category::StdStarsCats]),
        });
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn preferred(self) -> Category {
        match self {
            Axis::X => Category::RefDistortionX,
            Axis::Y => Category::RefDistortionY,
        }
    }

    fn legacy(self) -> Category {
        match self {
            Axis::X => Category::DistortionX,
            Axis::Y => Category::DistortionY,
        }
    }

    /// Lowercase axis suffix used in tags and default file names.
    pub fn suffix(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Which fallback tier produced a distortion map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionSource {
    Preferred,
    Legacy,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistortionMap {
    pub axis: Axis,
    /// Manifest file name for the manifest tiers, absolute path for the default.
    pub file: PathBuf,
    pub source: DistortionSource,
    /// One entry per missed tier, in the order the tiers were tried.
    pub warnings: Vec<String>,
}

/// Resolve the distortion map for one axis with the three-tier fallback.
pub fn resolve_distortion_map(manifest: &Manifest, axis: Axis, calib_dir: &Path) -> DistortionMap {
    let mut warnings = Vec::new();
    let tiers = [
        (axis.preferred(), DistortionSource::Preferred),
        (axis.legacy(), DistortionSource::Legacy),
    ];
    for (category, source) in tiers {
        if let Some(file) = resolve_category(manifest, &[category.clone()]).into_iter().next() {
            return DistortionMap {
                axis,
                file: PathBuf::from(file),
                source,
                warnings,
            };
        }
        let message = format!("no {category} association in manifest");
        tracing::warn!(axis = axis.suffix(), "{message}");
        warnings.push(message);
    }
    let file = calib_dir.join(format!("distortion_{}.fits", axis.suffix()));
    tracing::info!(path = %file.display(), "using default distortion map");
    DistortionMap {
        axis,
        file,
        source: DistortionSource::Default,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(category: &str, files: &[&str], children: Vec<Association>) -> Association {
        Association {
            category: Category::from(category.to_string()),
            complete: true,
            main_files: files.iter().map(|f| f.to_string()).collect(),
            associations: children,
        }
    }

    fn manifest(associations: Vec<Association>) -> Manifest {
        Manifest {
            name: None,
            main_files: vec!["sci_b.fits".into(), "sci_a.fits".into()],
            associations,
        }
    }

    #[test]
    fn root_path_keeps_document_order() {
        let m = manifest(Vec::new());
        assert_eq!(resolve_category(&m, &[]), vec!["sci_b.fits", "sci_a.fits"]);
    }

    #[test]
    fn nested_path_walks_every_matching_branch() {
        let m = manifest(vec![
            assoc("FLAT", &["f2.fits", "f1.fits"], vec![assoc("DARK", &["fd1.fits"], vec![])]),
            assoc("DARK", &["d1.fits"], vec![]),
            assoc("FLAT", &["f3.fits"], vec![assoc("DARK", &["fd2.fits"], vec![])]),
        ]);
        assert_eq!(
            resolve_category(&m, &[Category::Flat]),
            vec!["f2.fits", "f1.fits", "f3.fits"]
        );
        assert_eq!(
            resolve_category(&m, &[Category::Flat, Category::Dark]),
            vec!["fd1.fits", "fd2.fits"]
        );
        assert_eq!(resolve_category(&m, &[Category::Dark]), vec!["d1.fits"]);
    }

    #[test]
    fn missing_category_is_empty() {
        let m = manifest(vec![assoc("FLAT", &["f.fits"], vec![])]);
        assert!(resolve_category(&m, &[Category::Offset]).is_empty());
        assert!(resolve_category(&m, &[Category::Flat, Category::Dark]).is_empty());
    }

    #[test]
    fn incomplete_std_groups_are_skipped() {
        let mut incomplete = assoc("STD", &["s1.fits"], vec![]);
        incomplete.complete = false;
        let m = manifest(vec![
            assoc(
                "STD",
                &["s0.fits"],
                vec![
                    assoc("FLAT", &["sf.fits"], vec![assoc("DARK", &["sfd.fits"], vec![])]),
                    assoc("STDSTARS_CATS", &["cat.fits"], vec![]),
                ],
            ),
            incomplete,
            assoc("STD", &["s2.fits"], vec![assoc("DARK", &["sd.fits"], vec![])]),
        ]);

        let groups = resolve_standard_associations(&m);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].tag(), "std00");
        assert_eq!(groups[0].flats, vec!["sf.fits"]);
        assert_eq!(groups[0].flat_darks, vec!["sfd.fits"]);
        assert_eq!(groups[0].catalogs, vec!["cat.fits"]);
        assert_eq!(groups[1].tag(), "std01");
        assert_eq!(groups[1].main_files, vec!["s2.fits"]);
        assert_eq!(groups[1].darks, vec!["sd.fits"]);
        assert!(groups[1].flats.is_empty());
    }

    #[test]
    fn distortion_prefers_reference_category() {
        let m = manifest(vec![
            assoc("DISTORTION_X", &["legacy_x.fits"], vec![]),
            assoc("REF_DISTORTION_X", &["ref_x.fits"], vec![]),
        ]);
        let map = resolve_distortion_map(&m, Axis::X, Path::new("/calib"));
        assert_eq!(map.file, PathBuf::from("ref_x.fits"));
        assert_eq!(map.source, DistortionSource::Preferred);
        assert!(map.warnings.is_empty());
    }

    #[test]
    fn distortion_falls_back_to_legacy_with_one_warning() {
        let m = manifest(vec![assoc("DISTORTION_Y", &["legacy_y.fits"], vec![])]);
        let map = resolve_distortion_map(&m, Axis::Y, Path::new("/calib"));
        assert_eq!(map.file, PathBuf::from("legacy_y.fits"));
        assert_eq!(map.source, DistortionSource::Legacy);
        assert_eq!(map.warnings.len(), 1);
    }

    #[test]
    fn distortion_defaults_to_calibration_dir_with_two_warnings() {
        let m = manifest(Vec::new());
        let map = resolve_distortion_map(&m, Axis::X, Path::new("/calib"));
        assert_eq!(map.file, PathBuf::from("/calib/distortion_x.fits"));
        assert_eq!(map.source, DistortionSource::Default);
        assert_eq!(map.warnings.len(), 2);
        assert!(map.warnings[0].contains("REF_DISTORTION_X"));
        assert!(map.warnings[1].contains("DISTORTION_X"));
    }

    #[test]
    fn unknown_categories_parse_but_never_match() {
        let json = r#"{
            "main_files": ["a.fits"],
            "associations": [
                {"category": "ACQUISITION", "main_files": ["acq.fits"]},
                {"category": "STD", "complete": false, "main_files": ["s.fits"]}
            ]
        }"#;
        let m: Manifest = serde_json::from_str(json).expect("parse manifest");
        assert_eq!(
            m.associations[0].category,
            Category::Other("ACQUISITION".into())
        );
        assert!(m.associations[0].complete);
        assert!(resolve_standard_associations(&m).is_empty());
    }
}
