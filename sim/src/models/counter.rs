use anyhow::{ensure, Context as _, Result};

use crate::framework::{Context, HardwareModel, SignalDecl, SimContext};

/// Count value at which the counter raises the finish flag, unless
/// overridden by `+limit=N`.
pub const DEFAULT_LIMIT: u8 = 16;

/// Previous clock level, kept in a child instance called `edge`.
#[derive(Debug, Default)]
struct EdgeDetect {
    prev: bool,
}

/// 8-bit up counter with an active-high reset.
///
/// `count` increments on each rising edge of `clk` while `rst` is low and is
/// held at zero while `rst` is high. Once `count` reaches the limit the model
/// asserts `done` and finishes the simulation.
#[derive(Debug)]
pub struct Counter {
    pub clk: bool,
    pub rst: bool,
    pub count: u8,
    pub done: bool,
    limit: u8,
    edge: EdgeDetect,
}

impl Counter {
    pub fn limit(&self) -> u8 {
        self.limit
    }
}

impl HardwareModel for Counter {
    type Context = Context;

    fn new(context: &mut Context) -> Result<Self> {
        let limit = match context.plusarg("limit") {
            Some(v) => v
                .parse::<u8>()
                .with_context(|| format!("invalid +limit value `{v}`"))?,
            None => DEFAULT_LIMIT,
        };
        ensure!(limit > 0, "+limit must be at least 1");
        Ok(Self {
            clk: false,
            rst: false,
            count: 0,
            done: false,
            limit,
            edge: EdgeDetect::default(),
        })
    }

    fn eval(&mut self, context: &mut Context) {
        let rising = self.clk && !self.edge.prev;
        self.edge.prev = self.clk;
        if self.rst {
            self.count = 0;
        } else if rising {
            self.count = self.count.wrapping_add(1);
        }
        self.done = self.count >= self.limit;
        if self.done {
            context.finish();
        }
    }

    fn signals() -> Vec<SignalDecl> {
        vec![
            SignalDecl::top("clk", 1),
            SignalDecl::top("rst", 1),
            SignalDecl::top("count", 8),
            SignalDecl::top("done", 1),
            SignalDecl::nested(&["edge"], "prev", 1),
        ]
    }

    fn sample(&self, values: &mut Vec<u64>) {
        values.extend([
            self.clk as u64,
            self.rst as u64,
            self.count as u64,
            self.done as u64,
            self.edge.prev as u64,
        ]);
    }
}
