//! Hardware models that ship with the crate, so drivers can be exercised
//! without an external simulation runtime.
mod counter;
mod inverter;

pub use counter::{Counter, DEFAULT_LIMIT};
pub use inverter::Inverter;

use anyhow::{Context as _, Result};

use crate::{
    driver::{self, Policy, RunSummary, Testbench, TraceConfig},
    framework::{Context, HardwareModel, Port},
    predicate,
};

/// Get all built-in model names
pub fn model_names() -> Vec<&'static str> {
    vec!["counter", "inverter"]
}

/// How to drive a built-in model.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub policy: Policy,
    /// Loop condition in the [`predicate`] language.
    pub condition: Option<String>,
    pub trace: Option<TraceConfig>,
}

fn drive<M>(
    options: &RunOptions,
    clock: Option<Port<M>>,
    reset: Option<Port<M>>,
    args: &[String],
) -> Result<RunSummary>
where
    M: HardwareModel<Context = Context> + 'static,
{
    let mut tb = Testbench::<M>::new(options.policy);
    if let Some(clock) = clock {
        tb = tb.clock(clock);
    }
    if let Some(reset) = reset {
        tb = tb.reset(reset);
    }
    if let Some(src) = &options.condition {
        tb = tb.run_while(predicate::compile::<M>(src)?);
    }
    if let Some(trace) = &options.trace {
        tb = tb.trace(trace.clone());
    }
    driver::run(&tb, args)
}

/// Drive the built-in model called `name`.
pub fn run_builtin(name: &str, options: &RunOptions, args: &[String]) -> Result<RunSummary> {
    let summary = match name {
        "counter" => drive::<Counter>(options, Some(|m| &mut m.clk), Some(|m| &mut m.rst), args),
        "inverter" => drive::<Inverter>(options, None, None, args),
        _ => anyhow::bail!(
            "unknown model `{name}`, expected one of: {}",
            model_names().join(", ")
        ),
    };
    summary.with_context(|| format!("model `{name}`"))
}
