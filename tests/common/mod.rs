//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const RUN: &str = "ob1";

const MANIFEST: &str = r#"{
  "name": "ob1",
  "main_files": ["sci_1.fits", "sci_2.fits", "sci_3.fits"],
  "associations": [
    { "category": "FLAT", "main_files": ["flat_1.fits", "flat_2.fits"],
      "associations": [ { "category": "DARK", "main_files": ["fdark_1.fits", "fdark_2.fits"] } ] },
    { "category": "DARK", "main_files": ["dark_1.fits"] },
    { "category": "OFFSET", "main_files": ["sky_1.fits"] },
    { "category": "STD", "main_files": ["std_1.fits"],
      "associations": [
        { "category": "FLAT", "main_files": ["sflat_1.fits"],
          "associations": [ { "category": "DARK", "main_files": ["sfdark_1.fits"] } ] },
        { "category": "STDSTARS_CATS", "main_files": ["stdcat_1.fits"] }
      ] },
    { "category": "REF_DISTORTION_X", "main_files": ["ref_dx.fits"] }
  ]
}"#;

const RAW_FILES: &[&str] = &[
    "sci_1.fits",
    "sci_2.fits",
    "sci_3.fits",
    "flat_1.fits",
    "flat_2.fits",
    "fdark_1.fits",
    "fdark_2.fits",
    "dark_1.fits",
    "sky_1.fits",
    "std_1.fits",
    "sflat_1.fits",
    "sfdark_1.fits",
    "stdcat_1.fits",
    "ref_dx.fits",
];

/// Fake recipe: creates every declared output, writes a zero-point table for
/// the zero-point recipe, and fails on demand.
const RECIPE_SCRIPT: &str = r#"#!/bin/sh
recipe="$1"
out="$3"
echo "$recipe" >> "$OBPIPE_TEST_CALLS"
if [ "$recipe" = "$OBPIPE_TEST_FAIL" ]; then
  echo "simulated failure in $recipe" >&2
  exit 2
fi
while read -r path role; do
  case "$recipe" in
    cal_zpoint) printf '[{"segment": 1, "zeropoint": 24.1, "filter": "Ks"}, {"segment": 2, "zeropoint": 23.2, "filter": "J"}]\n' > "$path" ;;
    *) printf '%s %s\n' "$recipe" "$role" > "$path" ;;
  esac
done < "$out"
"#;

/// A raw-data directory, reference calibrations, a manifest, and a work root
/// in one temp dir.
pub struct Workspace {
    pub temp: TempDir,
    pub manifest: PathBuf,
    recipe: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let raw = temp.path().join("raw");
        let calib = temp.path().join("calib");
        fs::create_dir_all(&raw).expect("create raw dir");
        fs::create_dir_all(&calib).expect("create calib dir");
        for name in RAW_FILES {
            fs::write(raw.join(name), name).expect("write raw frame");
        }
        fs::write(calib.join("distortion_y.fits"), "default y").expect("write default map");

        let manifest = temp.path().join("ob1.json");
        fs::write(&manifest, MANIFEST).expect("write manifest");

        let recipe = temp.path().join("recipe.sh");
        fs::write(&recipe, RECIPE_SCRIPT).expect("write recipe script");
        let mut perms = fs::metadata(&recipe).expect("recipe metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&recipe, perms).expect("chmod recipe");

        Self {
            temp,
            manifest,
            recipe,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn work_root(&self) -> PathBuf {
        self.root().join("runs")
    }

    pub fn run_root(&self) -> PathBuf {
        self.work_root().join(RUN)
    }

    pub fn calls_log(&self) -> PathBuf {
        self.root().join("calls.log")
    }

    /// Recipe names invoked so far, in order.
    pub fn recipe_calls(&self) -> Vec<String> {
        fs::read_to_string(self.calls_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_calls(&self) {
        let _ = fs::remove_file(self.calls_log());
    }

    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_obpipe"));
        cmd.args(args)
            .env("OBPIPE_RAW_DIR", self.root().join("raw"))
            .env("OBPIPE_CALIB_DIR", self.root().join("calib"))
            .env("OBPIPE_WORK_ROOT", self.work_root())
            .env("OBPIPE_RECIPE_COMMAND", self.recipe.display().to_string())
            .env("OBPIPE_TEST_CALLS", self.calls_log())
            .env("OBPIPE_TEST_FAIL", "")
            .env_remove("OBPIPE_LOG");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("spawn obpipe")
    }

    /// Run and require success, returning stdout.
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "obpipe {args:?} failed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    pub fn setup(&self) -> String {
        let manifest = self.manifest.display().to_string();
        self.run_ok(&["setup", "--manifest", &manifest])
    }

    pub fn read_json(&self, path: &Path) -> Value {
        let text = fs::read_to_string(path)
            .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
        serde_json::from_str(&text).unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
    }

    pub fn caldata(&self) -> Value {
        self.read_json(&self.run_root().join(format!("{RUN}_caldata.json")))
    }

    pub fn stepdata(&self) -> Value {
        self.read_json(&self.run_root().join(format!("{RUN}_stepdata.json")))
    }
}
