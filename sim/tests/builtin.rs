// Built-in models driven end to end, with real VCD output.

use anyhow::Result;
use tbdrive::{
    driver::{Policy, TimeAdvance},
    models::{run_builtin, RunOptions},
    TraceConfig, Variant,
};

fn args(list: &[&str]) -> Vec<String> {
    std::iter::once("tbdrive")
        .chain(list.iter().copied())
        .map(String::from)
        .collect()
}

#[test]
fn counter_sim_finishes_at_limit() -> Result<()> {
    let options = RunOptions {
        policy: Variant::Sim.policy(),
        ..Default::default()
    };
    let summary = run_builtin("counter", &options, &args(&["+limit=4"]))?;
    assert!(summary.finished);
    assert_eq!(summary.iterations, 7);
    Ok(())
}

#[test]
fn counter_reset_variant_with_condition_and_trace() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("counter.vcd");
    let options = RunOptions {
        policy: Variant::Reset.policy(),
        condition: Some("count < 3".into()),
        trace: Some(TraceConfig {
            path: path.clone(),
            depth: 0,
        }),
    };
    let summary = run_builtin("counter", &options, &args(&[]))?;

    // reset clears the count at time 3..6, after that three rising edges
    // happen at times 7, 9 and 11
    assert_eq!(summary.final_time, 12);
    assert_eq!(summary.dumps, summary.iterations);
    assert!(summary.marker_emitted);
    assert!(!summary.finished);

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains(" rst $end"));
    assert!(!text.contains("$scope module edge $end"));
    assert!(text.lines().any(|l| l == "#11"));
    assert!(!text.lines().any(|l| l == "#12"));
    Ok(())
}

#[test]
fn inverter_runs_once() -> Result<()> {
    let options = RunOptions {
        policy: Variant::Func.policy(),
        ..Default::default()
    };
    let summary = run_builtin("inverter", &options, &args(&["+a=1"]))?;
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.toggles, 0);
    Ok(())
}

#[test]
fn inverter_has_no_clock_to_toggle() {
    let options = RunOptions {
        policy: Variant::Sim.policy(),
        ..Default::default()
    };
    let err = run_builtin("inverter", &options, &args(&[])).unwrap_err();
    assert!(format!("{err:#}").contains("no clock port"));
}

#[test]
fn unknown_model_and_bad_condition() {
    let options = RunOptions {
        policy: Policy {
            advance: TimeAdvance::Trailing,
            ..Variant::Trace.policy()
        },
        condition: Some("nonexistent == 1".into()),
        trace: None,
    };
    assert!(run_builtin("counter", &options, &args(&[])).is_err());
    assert!(run_builtin("alu", &options, &args(&[])).is_err());
}
