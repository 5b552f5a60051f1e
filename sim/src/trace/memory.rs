use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};

use super::{Lifecycle, Selection, TraceSink};
use crate::framework::{HardwareModel, SignalDecl};

/// Trace sink keeping every dump in memory.
#[derive(Debug, Default)]
pub struct MemoryTrace {
    selection: Selection,
    destination: Option<PathBuf>,
    samples: Vec<(u64, Vec<u64>)>,
    scratch: Vec<u64>,
    lifecycle: Lifecycle,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decls(&self) -> &[SignalDecl] {
        &self.selection.decls
    }

    /// Destination passed to `open`. Nothing is written there.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// `(time, values)` per dump, values ordered like [`MemoryTrace::decls`].
    pub fn samples(&self) -> &[(u64, Vec<u64>)] {
        &self.samples
    }

    pub fn times(&self) -> Vec<u64> {
        self.samples.iter().map(|(t, _)| *t).collect()
    }

    /// Waveform of one signal, addressed by dotted path.
    pub fn waveform(&self, path: &str) -> Option<Vec<(u64, u64)>> {
        let pos = self.selection.decls.iter().position(|d| d.path() == path)?;
        Some(self.samples.iter().map(|(t, v)| (*t, v[pos])).collect())
    }
}

impl<M: HardwareModel> TraceSink<M> for MemoryTrace {
    fn register(&mut self, _model: &M, depth: u32) -> Result<()> {
        ensure!(
            !self.lifecycle.is_open(),
            "signals must be registered before the trace is opened"
        );
        self.selection = Selection::new::<M>(depth);
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        self.lifecycle.open()?;
        self.destination = Some(path.to_path_buf());
        Ok(())
    }

    fn dump(&mut self, time: u64, model: &M) -> Result<()> {
        self.lifecycle.dump(time)?;
        self.scratch.clear();
        model.sample(&mut self.scratch);
        let mut values = Vec::with_capacity(self.selection.decls.len());
        self.selection.extract(&self.scratch, &mut values);
        self.samples.push((time, values));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.close()
    }

    fn is_open(&self) -> bool {
        self.lifecycle.is_open()
    }

    fn dump_count(&self) -> u64 {
        self.lifecycle.dumps()
    }
}
