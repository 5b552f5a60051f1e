//! Waveform sinks.
//!
//! A sink goes through `register -> open -> dump* -> close`. Dumps are keyed by
//! logical time, which must strictly increase, and nothing may be dumped after
//! the sink is closed.
mod memory;
mod waveform;

pub use self::memory::MemoryTrace;
pub use self::waveform::VcdTrace;

use std::path::Path;

use anyhow::{bail, ensure, Result};

use crate::framework::{HardwareModel, SignalDecl};

/// Default number of hierarchy levels recorded below the top module.
pub const DEFAULT_DEPTH: u32 = 99;

pub trait TraceSink<M: HardwareModel> {
    /// Select the signals of `model` at most `depth` levels below the top.
    fn register(&mut self, model: &M, depth: u32) -> Result<()>;

    fn open(&mut self, path: &Path) -> Result<()>;

    /// Record the current value of every registered signal at `time`.
    fn dump(&mut self, time: u64, model: &M) -> Result<()>;

    /// Finish the recording. Allowed exactly once.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn dump_count(&self) -> u64;
}

/// Signals picked for recording and where to find them in a model sample.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    pub decls: Vec<SignalDecl>,
    /// Position of each entry of `decls` in [`HardwareModel::sample`] output.
    pub index: Vec<usize>,
}

impl Selection {
    pub fn new<M: HardwareModel>(depth: u32) -> Self {
        let mut selection = Self::default();
        for (i, decl) in M::signals().into_iter().enumerate() {
            if decl.level() <= depth as usize {
                selection.decls.push(decl);
                selection.index.push(i);
            }
        }
        selection
    }

    /// Pick the selected values out of a full model sample.
    pub fn extract(&self, sample: &[u64], out: &mut Vec<u64>) {
        out.clear();
        out.extend(
            self.index
                .iter()
                .zip(&self.decls)
                .map(|(&i, decl)| decl.mask(sample.get(i).copied().unwrap_or_default())),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Created,
    Open,
    Closed,
}

/// Bookkeeping shared by the sinks: lifecycle phase, last timestamp and the
/// number of dumps so far.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    phase: Phase,
    last_time: Option<u64>,
    dumps: u64,
}

impl Lifecycle {
    /// Fails unless the sink is still waiting to be opened.
    pub(crate) fn check_open(&self) -> Result<()> {
        match self.phase {
            Phase::Created => Ok(()),
            Phase::Open => bail!("trace is already open"),
            Phase::Closed => bail!("trace cannot be reopened after close"),
        }
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.check_open()?;
        self.phase = Phase::Open;
        Ok(())
    }

    pub(crate) fn dump(&mut self, time: u64) -> Result<()> {
        match self.phase {
            Phase::Created => bail!("dump at time {time} before the trace was opened"),
            Phase::Closed => bail!("dump at time {time} after the trace was closed"),
            Phase::Open => {}
        }
        if let Some(last) = self.last_time {
            ensure!(
                time > last,
                "trace timestamps must strictly increase: {time} after {last}"
            );
        }
        self.last_time = Some(time);
        self.dumps += 1;
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        match self.phase {
            Phase::Open => {
                self.phase = Phase::Closed;
                Ok(())
            }
            Phase::Created => bail!("closing a trace that was never opened"),
            Phase::Closed => bail!("trace closed twice"),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub(crate) fn dumps(&self) -> u64 {
        self.dumps
    }
}
