//! To drive different compiled hardware models with a single loop, the driver
//! only talks to the simulation runtime through the traits in this module.
//!
//! A run owns exactly one [`SimContext`], one [`HardwareModel`] bound to it and
//! at most one [`TraceSink`](crate::trace::TraceSink).
mod context;

pub use context::Context;

use crate::trace::TraceSink;

/// Process-wide discrete time authority of a simulation run.
///
/// Logical time starts at zero and only moves through [`SimContext::time_inc`].
pub trait SimContext: Default {
    /// Forward process level arguments. The context stores them without
    /// interpretation; models may look at them.
    fn command_args(&mut self, args: &[String]);

    /// Current logical time.
    fn time(&self) -> u64;

    /// Advance logical time by `delta` units.
    fn time_inc(&mut self, delta: u64);

    /// Whether the model under simulation asked to stop.
    fn got_finish(&self) -> bool;

    /// Raise the finish flag. Called by models, never by the driver.
    fn finish(&mut self);

    /// Globally allow tracing. Must be switched on before any trace sink is
    /// constructed.
    fn trace_ever_on(&mut self, on: bool);

    fn is_trace_ever_on(&self) -> bool;
}

/// A writable one bit input of a model, such as its clock or reset.
pub type Port<M> = fn(&mut M) -> &mut bool;

/// A compiled circuit instance bound to a context.
pub trait HardwareModel: Sized {
    type Context: SimContext;

    /// Build the model. A failure here is fatal for the run.
    fn new(context: &mut Self::Context) -> anyhow::Result<Self>;

    /// Propagate the current inputs to outputs and internal state. Logical
    /// time is not touched, but the model may raise the finish flag.
    fn eval(&mut self, context: &mut Self::Context);

    /// Signals visible to a trace sink, in the order [`HardwareModel::sample`]
    /// reports their values. The set is fixed per model type.
    fn signals() -> Vec<SignalDecl> {
        Vec::new()
    }

    /// Append the current value of every signal in [`HardwareModel::signals`].
    fn sample(&self, values: &mut Vec<u64>) {
        let _ = values;
    }

    /// Register this model with a trace sink, recording signals at most
    /// `depth` sub-instances below the top.
    fn trace<S: TraceSink<Self>>(&self, sink: &mut S, depth: u32) -> anyhow::Result<()> {
        sink.register(self, depth)
    }
}

/// Declaration of a traceable signal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignalDecl {
    /// Chain of sub-instance names below the top module. Empty for ports and
    /// signals of the top module itself.
    pub scope: Vec<&'static str>,
    pub name: &'static str,
    pub width: u32,
}

impl SignalDecl {
    pub fn top(name: &'static str, width: u32) -> Self {
        Self {
            scope: Vec::new(),
            name,
            width,
        }
    }

    pub fn nested(scope: &[&'static str], name: &'static str, width: u32) -> Self {
        Self {
            scope: scope.to_vec(),
            name,
            width,
        }
    }

    /// Hierarchy level: number of sub-instances between the top module and
    /// this signal.
    pub fn level(&self) -> usize {
        self.scope.len()
    }

    /// Dotted path, e.g. `edge.prev`.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for s in &self.scope {
            path.push_str(s);
            path.push('.');
        }
        path.push_str(self.name);
        path
    }

    /// Mask `value` down to the declared width.
    pub fn mask(&self, value: u64) -> u64 {
        if self.width >= 64 {
            value
        } else {
            value & ((1u64 << self.width) - 1)
        }
    }
}
