//! The driving loop.
//!
//! Every driver has the same shape: build a context and a model, optionally
//! attach a trace, then loop `reset -> marker -> toggle -> eval -> dump ->
//! advance` while the termination condition holds, and finally tear down the
//! sink, the model and the context in that order. A [`Policy`] picks which of
//! those steps are active.
mod policy;

pub use policy::{ClockPolicy, Policy, ResetPolicy, TerminationKind, TimeAdvance, Variant};

use std::{io::Write, ops::Range, path::PathBuf};

use anyhow::{bail, Context as _, Result};

use crate::{
    framework::{HardwareModel, Port, SimContext},
    trace::{TraceSink, VcdTrace, DEFAULT_DEPTH},
};

/// Times at which reset is asserted by [`ResetPolicy::Pulse`].
pub const RESET_WINDOW: Range<u64> = 3..6;

/// First time after the warm-up window.
pub const WARMUP_END: u64 = 6;

/// Line printed once when time reaches [`WARMUP_END`].
pub const WARMUP_MARKER: &str = "=== warm-up done, reset released ===";

/// Loop condition supplied by the caller, evaluated once per iteration.
pub type Condition<M> = Box<dyn Fn(&<M as HardwareModel>::Context, &M) -> bool>;

/// Where and how deep to trace.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TraceConfig {
    pub path: PathBuf,
    pub depth: u32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trace.vcd"),
            depth: DEFAULT_DEPTH,
        }
    }
}

/// Everything that is fixed for one generated driver.
pub struct Testbench<M: HardwareModel> {
    policy: Policy,
    clock: Option<Port<M>>,
    reset: Option<Port<M>>,
    condition: Option<Condition<M>>,
    trace: TraceConfig,
}

impl<M: HardwareModel> Testbench<M> {
    pub fn new(policy: impl Into<Policy>) -> Self {
        Self {
            policy: policy.into(),
            clock: None,
            reset: None,
            condition: None,
            trace: TraceConfig::default(),
        }
    }

    pub fn clock(mut self, port: Port<M>) -> Self {
        self.clock = Some(port);
        self
    }

    pub fn reset(mut self, port: Port<M>) -> Self {
        self.reset = Some(port);
        self
    }

    /// Keep looping while `condition` holds.
    pub fn run_while(mut self, condition: impl Fn(&M::Context, &M) -> bool + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Turn tracing on.
    pub fn trace(mut self, config: TraceConfig) -> Self {
        self.policy.tracing = true;
        self.trace = config;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn trace_config(&self) -> &TraceConfig {
        &self.trace
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if self.policy.clock.toggles() && self.clock.is_none() {
            bail!("the policy toggles the clock but no clock port was given");
        }
        if self.policy.reset == ResetPolicy::Pulse && self.reset.is_none() {
            bail!("the policy pulses reset but no reset port was given");
        }
        if self.policy.termination.needs_condition() && self.condition.is_none() {
            bail!(
                "termination {:?} needs a loop condition",
                self.policy.termination
            );
        }
        Ok(())
    }

    fn condition_holds(&self, context: &M::Context, model: &M) -> bool {
        self.condition.as_ref().is_some_and(|c| c(context, model))
    }

    fn keep_going(&self, context: &M::Context, model: &M) -> bool {
        match self.policy.termination {
            TerminationKind::Once => false,
            TerminationKind::Finish => !context.got_finish(),
            TerminationKind::Until => self.condition_holds(context, model),
            TerminationKind::WarmupOrUntil => {
                context.time() < WARMUP_END || self.condition_holds(context, model)
            }
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunSummary {
    /// Number of `eval` calls.
    pub iterations: u64,
    pub toggles: u64,
    pub final_time: u64,
    pub dumps: u64,
    pub marker_emitted: bool,
    /// Whether the model raised the finish flag.
    pub finished: bool,
}

/// Run `testbench`, tracing to a VCD file and printing diagnostics to stdout.
///
/// `args` are forwarded to the context untouched.
pub fn run<M: HardwareModel>(testbench: &Testbench<M>, args: &[String]) -> Result<RunSummary> {
    let stdout = std::io::stdout();
    run_with(testbench, args, VcdTrace::new, &mut stdout.lock())
}

/// Like [`run`] with an explicit trace sink constructor and diagnostic output.
/// `make_sink` is only called when the policy traces.
pub fn run_with<M, S, W>(
    testbench: &Testbench<M>,
    args: &[String],
    make_sink: impl FnOnce() -> S,
    out: &mut W,
) -> Result<RunSummary>
where
    M: HardwareModel,
    S: TraceSink<M>,
    W: Write,
{
    testbench.validate()?;
    let policy = testbench.policy;
    tracing::info!("driver start: {policy:?}");

    let mut context = M::Context::default();
    context.command_args(args);
    if policy.tracing {
        context.trace_ever_on(true);
    }

    let mut model = M::new(&mut context).context("could not construct the model")?;

    let mut sink = if policy.tracing {
        let config = &testbench.trace;
        let mut sink = make_sink();
        model.trace(&mut sink, config.depth)?;
        sink.open(&config.path)?;
        Some(sink)
    } else {
        None
    };

    if policy.clock == ClockPolicy::ToggleFromLow {
        if let Some(clock) = testbench.clock {
            // inverted once more at the top of the first iteration
            *clock(&mut model) = true;
        }
    }

    let mut summary = RunSummary::default();

    if policy.termination == TerminationKind::Once {
        model.eval(&mut context);
        summary.iterations = 1;
        if let Some(sink) = sink.as_mut() {
            sink.dump(context.time(), &model)?;
        }
    }

    while testbench.keep_going(&context, &model) {
        if policy.advance == TimeAdvance::Leading {
            context.time_inc(1);
        }
        let time = context.time();

        if policy.reset == ResetPolicy::Pulse {
            if let Some(reset) = testbench.reset {
                *reset(&mut model) = RESET_WINDOW.contains(&time);
            }
        }

        if policy.marker && time == WARMUP_END && !summary.marker_emitted {
            writeln!(out, "{WARMUP_MARKER}")?;
            summary.marker_emitted = true;
        }

        if policy.clock.toggles() {
            if let Some(clock) = testbench.clock {
                let level = clock(&mut model);
                *level = !*level;
                summary.toggles += 1;
            }
        }

        model.eval(&mut context);
        summary.iterations += 1;

        if let Some(sink) = sink.as_mut() {
            sink.dump(time, &model)?;
        }

        if policy.advance == TimeAdvance::Trailing {
            context.time_inc(1);
        }
        tracing::trace!("iteration {} done at time {time}", summary.iterations);
    }

    summary.final_time = context.time();
    summary.finished = context.got_finish();

    if let Some(mut sink) = sink {
        sink.close()?;
        summary.dumps = sink.dump_count();
        drop(sink);
    }
    drop(model);
    drop(context);

    tracing::info!("driver done: {summary:?}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Context;
    use crate::models::{Counter, Inverter};
    use crate::trace::MemoryTrace;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_mem<M: HardwareModel>(tb: &Testbench<M>, a: &[&str]) -> Result<(RunSummary, String)> {
        let mut out = Vec::new();
        let summary = run_with(tb, &args(a), MemoryTrace::new, &mut out)?;
        Ok((summary, String::from_utf8(out)?))
    }

    #[test]
    fn func_evaluates_once() -> Result<()> {
        let tb = Testbench::<Inverter>::new(Variant::Func);
        let (summary, out) = run_mem(&tb, &[])?;
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.toggles, 0);
        assert_eq!(summary.final_time, 0);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn sim_runs_until_model_finishes() -> Result<()> {
        let tb = Testbench::<Counter>::new(Variant::Sim).clock(|m| &mut m.clk);
        let (summary, _) = run_mem(&tb, &["+limit=5"])?;
        assert!(summary.finished);
        // power-on level is low: rising edges on odd toggles
        assert_eq!(summary.iterations, 9);
        assert_eq!(summary.toggles, 9);
        assert_eq!(summary.final_time, 0);
        Ok(())
    }

    #[test]
    fn reset_variant_prints_marker_once() -> Result<()> {
        let tb = Testbench::<Counter>::new(Variant::Reset)
            .clock(|m| &mut m.clk)
            .reset(|m| &mut m.rst)
            .run_while(|ctx: &Context, _| ctx.time() < 10);
        let (summary, out) = run_mem(&tb, &[])?;
        assert_eq!(summary.iterations, 10);
        assert_eq!(summary.final_time, 10);
        assert!(summary.marker_emitted);
        assert_eq!(out, format!("{WARMUP_MARKER}\n"));
        Ok(())
    }

    #[test]
    fn traced_run_dumps_every_iteration() -> Result<()> {
        let tb = Testbench::<Counter>::new(Variant::Trace)
            .clock(|m| &mut m.clk)
            .run_while(|_: &Context, m: &Counter| m.count < 3);
        let (summary, _) = run_mem(&tb, &[])?;
        assert_eq!(summary.dumps, summary.iterations);
        // leading advance: the first dump happens at time 1
        assert_eq!(summary.final_time, summary.iterations);
        Ok(())
    }

    #[test]
    fn incomplete_testbench_is_rejected() {
        let no_clock = Testbench::<Counter>::new(Variant::Sim);
        assert!(run_mem(&no_clock, &[]).is_err());

        let no_reset = Testbench::<Counter>::new(Variant::Reset)
            .clock(|m| &mut m.clk)
            .run_while(|_: &Context, _: &Counter| false);
        assert!(run_mem(&no_reset, &[]).is_err());

        let no_condition = Testbench::<Counter>::new(Variant::Trace).clock(|m| &mut m.clk);
        assert!(run_mem(&no_condition, &[]).is_err());
    }

    #[test]
    fn model_construction_failure_is_fatal() {
        let tb = Testbench::<Counter>::new(Variant::Sim).clock(|m| &mut m.clk);
        let err = run_mem(&tb, &["+limit=oops"]).unwrap_err();
        assert!(format!("{err:#}").contains("could not construct the model"));
    }
}
