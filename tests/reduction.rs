#![cfg(unix)]

mod common;

use common::{Workspace, RUN};
use serde_json::Value;
use std::fs;

#[test]
fn setup_stages_full_calibration_catalog() {
    let ws = Workspace::new();
    let stdout = ws.setup();
    assert!(stdout.contains("run ob1 staged"), "{stdout}");

    let caldata = ws.caldata();
    for tag in [
        "jit",
        "jit_flt",
        "jit_flt_drk",
        "jit_drk",
        "off",
        "std00",
        "std00_flt",
        "std00_flt_drk",
        "std00_cat",
        "dst_x",
        "dst_y",
    ] {
        assert!(caldata.get(tag).is_some(), "missing {tag}: {caldata}");
    }
    assert_eq!(caldata["jit"].as_array().map(Vec::len), Some(3));
    let dst_y = caldata["dst_y"][0].as_str().expect("dst_y path");
    assert!(dst_y.ends_with("reference/ob1_dst_y.fits"), "{dst_y}");
}

#[test]
fn setup_is_idempotent() {
    let ws = Workspace::new();
    ws.setup();
    let first = fs::read(ws.run_root().join(format!("{RUN}_caldata.json"))).expect("caldata");
    ws.setup();
    let second = fs::read(ws.run_root().join(format!("{RUN}_caldata.json"))).expect("caldata");
    assert_eq!(first, second);
}

#[test]
fn relative_manifest_is_rejected_without_side_effects() {
    let ws = Workspace::new();
    let output = ws.run(&["setup", "--manifest", "ob1.json"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absolute"), "{stderr}");
    assert!(!ws.work_root().exists());
}

#[test]
fn reduce_runs_the_whole_dag() {
    let ws = Workspace::new();
    ws.setup();
    let stdout = ws.run_ok(&["reduce", "--run", RUN]);
    assert!(stdout.contains("0 already done"), "{stdout}");

    let stepdata = ws.stepdata();
    for key in ["jit_mdark", "jit_mflat", "jit_bpm", "std00_zp", "jit_cal", "jit_mosaic"] {
        assert!(stepdata.get(key).is_some(), "missing {key}: {stepdata}");
    }
    assert_eq!(stepdata["jit_cal"].as_array().map(Vec::len), Some(3));

    let products = ws.run_root().join("products");
    assert!(products.join("ob1_jit_mosaic.fits").is_file());
    let sof = fs::read_to_string(products.join("background1_jit.sof")).expect("sof");
    assert_eq!(sof.lines().filter(|l| l.ends_with(" FRAMES")).count(), 3);
    assert_eq!(sof.lines().filter(|l| l.ends_with(" SKY")).count(), 1);

    let calls = ws.recipe_calls();
    assert_eq!(calls.first().map(String::as_str), Some("cal_dark"));
    assert_eq!(calls.last().map(String::as_str), Some("stitch"));
    assert_eq!(calls.iter().filter(|c| *c == "cal_flat").count(), 2, "{calls:?}");
}

#[test]
fn failed_step_resumes_where_it_stopped() {
    let ws = Workspace::new();
    ws.setup();
    let output = ws
        .command(&["reduce", "--run", RUN])
        .env("OBPIPE_TEST_FAIL", "combine")
        .output()
        .expect("spawn obpipe");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("combine1_jit"), "{stderr}");
    assert!(stderr.contains("simulated failure"), "{stderr}");
    assert!(ws.stepdata().get("jit_bkg1").is_some());
    assert!(ws.stepdata().get("jit_comb1").is_none());

    ws.clear_calls();
    ws.run_ok(&["reduce", "--run", RUN]);
    let calls = ws.recipe_calls();
    assert_eq!(calls.first().map(String::as_str), Some("combine"));
    assert!(!calls.contains(&"cal_dark".to_string()), "{calls:?}");
    assert!(!calls.contains(&"basic_calib".to_string()), "{calls:?}");
}

#[test]
fn plan_reports_each_step_without_running_recipes() {
    let ws = Workspace::new();
    ws.setup();
    let stdout = ws.run_ok(&["plan", "--run", RUN, "--json"]);
    let plan: Value = serde_json::from_str(&stdout).expect("plan json");
    let steps = plan.as_array().expect("plan array");
    let status = |name: &str| {
        steps
            .iter()
            .find(|entry| entry["step"] == name)
            .map(|entry| entry["status"].as_str().unwrap_or_default().to_string())
            .unwrap_or_else(|| panic!("no {name} in plan"))
    };
    assert_eq!(status("dark_jit"), "ready");
    assert_eq!(status("flat_jit"), "waiting");
    assert_eq!(status("flat_std00"), "waiting");
    assert_eq!(status("dark_std00"), "skipped");
    assert_eq!(status("stitch_jit"), "waiting");
    assert!(ws.recipe_calls().is_empty());

    ws.run_ok(&["step", "--run", RUN, "dark_jit"]);
    let text = ws.run_ok(&["plan", "--run", RUN]);
    let line = text
        .lines()
        .find(|line| line.starts_with("dark_jit "))
        .expect("dark_jit line");
    assert!(line.ends_with("done"), "{line}");
}

#[test]
fn step_refuses_blocked_steps() {
    let ws = Workspace::new();
    ws.setup();
    let output = ws.run(&["step", "--run", RUN, "combine_jit"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("blocked"), "{stderr}");
    assert!(stderr.contains("step:jit_bkg2"), "{stderr}");
    assert!(ws.recipe_calls().is_empty());
}

#[test]
fn zeropoints_aggregate_reduced_runs() {
    let ws = Workspace::new();
    ws.setup();
    ws.run_ok(&["reduce", "--run", RUN]);

    let stdout = ws.run_ok(&["zeropoints", "--filter", "Ks"]);
    let summary: Value = serde_json::from_str(&stdout).expect("summary json");
    let records = summary[RUN].as_array().expect("run records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["group"], "std00");
    assert_eq!(records[0]["segment"], 1);

    let out = ws.root().join("zp.json");
    let out_arg = out.display().to_string();
    ws.run_ok(&["zeropoints", "--out", &out_arg]);
    let all = ws.read_json(&out);
    assert_eq!(all[RUN].as_array().map(Vec::len), Some(2));
}
