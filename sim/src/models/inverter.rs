use anyhow::{bail, Result};

use crate::framework::{Context, HardwareModel, SignalDecl};

/// Purely combinational `y = !a`. The input level comes from `+a=0|1`.
#[derive(Debug, Default)]
pub struct Inverter {
    pub a: bool,
    pub y: bool,
}

impl HardwareModel for Inverter {
    type Context = Context;

    fn new(context: &mut Context) -> Result<Self> {
        let a = match context.plusarg("a") {
            None | Some("0") => false,
            Some("1") | Some("") => true,
            Some(v) => bail!("invalid +a value `{v}`, expected 0 or 1"),
        };
        Ok(Self { a, y: false })
    }

    fn eval(&mut self, _context: &mut Context) {
        self.y = !self.a;
    }

    fn signals() -> Vec<SignalDecl> {
        vec![SignalDecl::top("a", 1), SignalDecl::top("y", 1)]
    }

    fn sample(&self, values: &mut Vec<u64>) {
        values.extend([self.a as u64, self.y as u64]);
    }
}
