//! Simulation drivers for compiled hardware models.
//!
//! A driver constructs a simulation context and a model, then steps the model
//! through discrete time: toggling its clock, pulsing its reset, stopping on a
//! condition and optionally recording a waveform. Which of those happen is
//! picked by a [`Policy`]; [`run`] executes it against any [`HardwareModel`],
//! and [`template::render`] emits the same driver as Verilator C++.
pub mod driver;
pub mod framework;
pub mod models;
pub mod predicate;
pub mod template;
pub mod trace;

pub use driver::{run, run_with, Policy, RunSummary, Testbench, TraceConfig, Variant};
pub use framework::{Context, HardwareModel, SignalDecl, SimContext};
