use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{ensure, Context, Result};
use vcd::{IdCode, TimescaleUnit, Value};

use super::{Lifecycle, Selection, TraceSink};
use crate::framework::{HardwareModel, SignalDecl};

/// Name of the outermost VCD scope, wrapping the top module's signals.
pub const TOP_SCOPE: &str = "TOP";

/// Value change dump writer.
///
/// The first dump records every registered signal, later dumps only the
/// signals whose value changed.
pub struct VcdTrace {
    selection: Selection,
    registered: bool,
    timescale: (u32, TimescaleUnit),
    writer: Option<vcd::Writer<BufWriter<File>>>,
    ids: Vec<IdCode>,
    last: Vec<Option<u64>>,
    sample: Vec<u64>,
    values: Vec<u64>,
    lifecycle: Lifecycle,
}

impl Default for VcdTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl VcdTrace {
    pub fn new() -> Self {
        Self {
            selection: Selection::default(),
            registered: false,
            timescale: (1, TimescaleUnit::PS),
            writer: None,
            ids: Vec::new(),
            last: Vec::new(),
            sample: Vec::new(),
            values: Vec::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    /// One unit of logical time in the dump, `1 ps` unless overridden.
    pub fn with_timescale(mut self, ratio: u32, unit: TimescaleUnit) -> Self {
        self.timescale = (ratio, unit);
        self
    }

    /// Signals that end up in the file.
    pub fn decls(&self) -> &[SignalDecl] {
        &self.selection.decls
    }
}

fn bit(value: u64, index: u32) -> Value {
    if index < 64 && (value >> index) & 1 == 1 {
        Value::V1
    } else {
        Value::V0
    }
}

/// Write the `$scope`/`$var` section. Signals sharing a scope path are grouped
/// under nested `$scope module` entries below [`TOP_SCOPE`].
fn write_header(
    writer: &mut vcd::Writer<BufWriter<File>>,
    decls: &[SignalDecl],
    timescale: (u32, TimescaleUnit),
) -> std::io::Result<Vec<IdCode>> {
    writer.timescale(timescale.0, timescale.1)?;
    writer.add_module(TOP_SCOPE)?;

    let mut order: Vec<usize> = (0..decls.len()).collect();
    order.sort_by(|&a, &b| decls[a].scope.cmp(&decls[b].scope));

    let mut ids = vec![None; decls.len()];
    let mut scopes: Vec<&str> = Vec::new();
    for i in order {
        let scope = &decls[i].scope;
        let common = scopes
            .iter()
            .zip(scope)
            .take_while(|(a, b)| a == b)
            .count();
        while scopes.len() > common {
            writer.upscope()?;
            scopes.pop();
        }
        for name in &scope[common..] {
            writer.add_module(name)?;
            scopes.push(*name);
        }
        ids[i] = Some(writer.add_wire(decls[i].width, decls[i].name)?);
    }
    for _ in 0..=scopes.len() {
        writer.upscope()?;
    }
    writer.enddefinitions()?;

    // every slot was filled by the loop above
    Ok(ids.into_iter().flatten().collect())
}

impl<M: HardwareModel> TraceSink<M> for VcdTrace {
    fn register(&mut self, _model: &M, depth: u32) -> Result<()> {
        ensure!(
            !self.lifecycle.is_open(),
            "signals must be registered before the trace is opened"
        );
        self.selection = Selection::new::<M>(depth);
        self.last = vec![None; self.selection.decls.len()];
        self.registered = true;
        tracing::debug!(
            "registered {} signal(s) at depth {depth}",
            self.selection.decls.len()
        );
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        ensure!(self.registered, "no model registered with the trace");
        self.lifecycle.check_open()?;
        let file = File::create(path)
            .with_context(|| format!("could not open trace file `{}`", path.display()))?;
        self.lifecycle.open()?;

        let mut writer = vcd::Writer::new(BufWriter::new(file));
        self.ids = write_header(&mut writer, &self.selection.decls, self.timescale)
            .with_context(|| format!("could not write header of `{}`", path.display()))?;
        self.writer = Some(writer);
        tracing::debug!("trace opened at `{}`", path.display());
        Ok(())
    }

    fn dump(&mut self, time: u64, model: &M) -> Result<()> {
        self.lifecycle.dump(time)?;
        let writer = self.writer.as_mut().context("trace writer is gone")?;

        self.sample.clear();
        model.sample(&mut self.sample);
        self.selection.extract(&self.sample, &mut self.values);

        writer.timestamp(time)?;
        for (i, &value) in self.values.iter().enumerate() {
            if self.last[i] == Some(value) {
                continue;
            }
            self.last[i] = Some(value);
            let width = self.selection.decls[i].width;
            if width == 1 {
                writer.change_scalar(self.ids[i], bit(value, 0))?;
            } else {
                writer.change_vector(self.ids[i], (0..width).rev().map(|b| bit(value, b)))?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.lifecycle.close()?;
        // dropping the writer flushes the buffered file
        drop(self.writer.take());
        tracing::debug!("trace closed after {} dump(s)", self.lifecycle.dumps());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lifecycle.is_open()
    }

    fn dump_count(&self) -> u64 {
        self.lifecycle.dumps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Context;
    use crate::models::Counter;

    fn counter() -> (Context, Counter) {
        let mut ctx = Context::default();
        let model = Counter::new(&mut ctx).unwrap();
        (ctx, model)
    }

    #[test]
    fn writes_header_and_changes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("counter.vcd");
        let (mut ctx, mut model) = counter();

        let mut trace = VcdTrace::new();
        model.trace(&mut trace, 99)?;
        TraceSink::<Counter>::open(&mut trace, &path)?;
        for t in 0..4 {
            model.clk = !model.clk;
            model.eval(&mut ctx);
            trace.dump(t, &model)?;
        }
        TraceSink::<Counter>::close(&mut trace)?;
        assert_eq!(TraceSink::<Counter>::dump_count(&trace), 4);

        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains("$scope module TOP $end"));
        assert!(text.contains("$scope module edge $end"));
        assert!(text.contains("$var wire 8 "));
        assert!(text.contains(" count $end"));
        assert!(text.contains("$enddefinitions $end"));
        for t in ["#0", "#1", "#2", "#3"] {
            assert!(text.lines().any(|l| l == t), "missing timestamp {t}");
        }
        // two rising edges: count is 1 at time 0 and 2 at time 2
        assert!(text.contains("b00000001 "));
        assert!(text.contains("b00000010 "));
        Ok(())
    }

    #[test]
    fn depth_zero_keeps_only_top_signals() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shallow.vcd");
        let (_ctx, model) = counter();

        let mut trace = VcdTrace::new();
        model.trace(&mut trace, 0)?;
        assert!(trace.decls().iter().all(|d| d.level() == 0));
        TraceSink::<Counter>::open(&mut trace, &path)?;
        TraceSink::<Counter>::close(&mut trace)?;

        let text = std::fs::read_to_string(&path)?;
        assert!(!text.contains("$scope module edge $end"));
        Ok(())
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let (_ctx, model) = counter();
        let mut trace = VcdTrace::new();
        model.trace(&mut trace, 1).unwrap();
        let r = TraceSink::<Counter>::open(&mut trace, Path::new("/nonexistent/dir/x.vcd"));
        assert!(r.is_err());
        assert!(!TraceSink::<Counter>::is_open(&trace));
    }

    #[test]
    fn no_dump_after_close() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_ctx, model) = counter();
        let mut trace = VcdTrace::new();
        model.trace(&mut trace, 1)?;
        TraceSink::<Counter>::open(&mut trace, &dir.path().join("x.vcd"))?;
        trace.dump(0, &model)?;
        TraceSink::<Counter>::close(&mut trace)?;
        assert!(trace.dump(1, &model).is_err());
        Ok(())
    }

    #[test]
    fn reopen_keeps_finished_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("done.vcd");
        let (_ctx, model) = counter();
        let mut trace = VcdTrace::new();
        model.trace(&mut trace, 1)?;
        TraceSink::<Counter>::open(&mut trace, &path)?;
        trace.dump(0, &model)?;
        TraceSink::<Counter>::close(&mut trace)?;
        let before = std::fs::read_to_string(&path)?;
        assert!(before.contains("#0"));

        let err = TraceSink::<Counter>::open(&mut trace, &path).unwrap_err();
        assert!(format!("{err}").contains("reopened"));
        assert_eq!(std::fs::read_to_string(&path)?, before);
        Ok(())
    }
}
