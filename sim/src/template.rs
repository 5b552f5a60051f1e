//! Generator for standalone Verilator C++ drivers.
//!
//! [`render`] emits a `main` for any [`Policy`]. Hand-written templates can be
//! filled with [`substitute`], which replaces the placeholders `$MODULE`,
//! `$CLOCK`, `$RESET`, `$STOP`, `$DEPTH` and `$TRACE`.
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use regex::Regex;

use crate::driver::{
    ClockPolicy, Policy, ResetPolicy, TerminationKind, TimeAdvance, RESET_WINDOW, WARMUP_END,
    WARMUP_MARKER,
};
use crate::trace::DEFAULT_DEPTH;

/// Values for the template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// Verilated top module; the generated code includes `V<module>.h`.
    pub module: String,
    pub clock: Option<String>,
    pub reset: Option<String>,
    /// Loop condition as a C++ expression.
    pub stop: Option<String>,
    pub depth: u32,
    pub trace: String,
}

impl Params {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            clock: None,
            reset: None,
            stop: None,
            depth: DEFAULT_DEPTH,
            trace: "trace.vcd".to_string(),
        }
    }

    fn get(&self, placeholder: &str) -> Result<String> {
        let missing = |what: &str| format!("template uses `${placeholder}` but no {what} was given");
        Ok(match placeholder {
            "MODULE" => self.module.clone(),
            "CLOCK" => self.clock.clone().with_context(|| missing("clock signal"))?,
            "RESET" => self.reset.clone().with_context(|| missing("reset signal"))?,
            "STOP" => self.stop.clone().with_context(|| missing("stop condition"))?,
            "DEPTH" => self.depth.to_string(),
            "TRACE" => cpp_string_body(&self.trace),
            _ => bail!("unknown placeholder `${placeholder}`"),
        })
    }
}

/// `$TRACE` always sits inside a C++ string literal.
fn cpp_string_body(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace every `$NAME` placeholder in `template`.
pub fn substitute(template: &str, params: &Params) -> Result<String> {
    let re = Regex::new(r"\$([A-Z][A-Z0-9_]*)")?;
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        out.push_str(&params.get(&caps[1])?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Read a template file.
pub fn load_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("could not read file `{}`", path.display()))
}

fn loop_condition(termination: TerminationKind) -> Option<String> {
    match termination {
        TerminationKind::Once => None,
        TerminationKind::Finish => Some("!context->gotFinish()".to_string()),
        TerminationKind::Until => Some("$STOP".to_string()),
        TerminationKind::WarmupOrUntil => {
            Some(format!("context->time() < {WARMUP_END} || ($STOP)"))
        }
    }
}

/// Skeleton of the driver for `policy`, still containing placeholders.
pub fn skeleton(policy: &Policy) -> Result<String> {
    policy.validate()?;
    let mut s = String::new();

    writeln!(s, "#include \"V$MODULE.h\"")?;
    writeln!(s, "#include \"verilated.h\"")?;
    if policy.tracing {
        writeln!(s, "#include \"verilated_vcd_c.h\"")?;
    }
    if policy.marker {
        writeln!(s, "#include <iostream>")?;
    }
    writeln!(s)?;
    writeln!(s, "int main(int argc, char **argv, char **env) {{")?;
    writeln!(s, "  VerilatedContext *context = new VerilatedContext;")?;
    writeln!(s, "  context->commandArgs(argc, argv);")?;
    if policy.tracing {
        writeln!(s, "  context->traceEverOn(true);")?;
    }
    writeln!(s)?;
    writeln!(s, "  V$MODULE *top = new V$MODULE {{ context }};")?;
    writeln!(s)?;

    if policy.tracing {
        writeln!(s, "  VerilatedVcdC *trace = new VerilatedVcdC;")?;
        writeln!(s, "  top->trace(trace, $DEPTH);")?;
        writeln!(s, "  trace->open(\"$TRACE\");")?;
        writeln!(s)?;
    }

    if policy.clock == ClockPolicy::ToggleFromLow {
        writeln!(s, "  top->$CLOCK = 1;")?;
        writeln!(s)?;
    }

    match loop_condition(policy.termination) {
        None => {
            writeln!(s, "  top->eval();")?;
            if policy.tracing {
                writeln!(s, "  trace->dump(context->time());")?;
            }
        }
        Some(cond) => {
            writeln!(s, "  while ({cond}) {{")?;
            if policy.advance == TimeAdvance::Leading {
                writeln!(s, "    context->timeInc(1);")?;
            }
            if policy.reset == ResetPolicy::Pulse {
                writeln!(
                    s,
                    "    top->$RESET = context->time() >= {} && context->time() < {};",
                    RESET_WINDOW.start, RESET_WINDOW.end
                )?;
            }
            if policy.marker {
                writeln!(s, "    if (context->time() == {WARMUP_END}) {{")?;
                writeln!(s, "      std::cout << \"{WARMUP_MARKER}\" << std::endl;")?;
                writeln!(s, "    }}")?;
            }
            if policy.clock.toggles() {
                writeln!(s, "    top->$CLOCK = !top->$CLOCK;")?;
            }
            writeln!(s, "    top->eval();")?;
            if policy.tracing {
                writeln!(s, "    trace->dump(context->time());")?;
            }
            if policy.advance == TimeAdvance::Trailing {
                writeln!(s, "    context->timeInc(1);")?;
            }
            writeln!(s, "  }}")?;
        }
    }
    writeln!(s)?;

    if policy.tracing {
        writeln!(s, "  trace->close();")?;
        writeln!(s)?;
        writeln!(s, "  delete trace;")?;
    }
    writeln!(s, "  delete top;")?;
    writeln!(s, "  delete context;")?;
    writeln!(s)?;
    writeln!(s, "  return 0;")?;
    writeln!(s, "}}")?;
    Ok(s)
}

/// Generate the complete C++ driver for `policy`.
pub fn render(policy: &Policy, params: &Params) -> Result<String> {
    ensure!(!params.module.is_empty(), "module name must not be empty");
    if policy.clock.toggles() {
        ensure!(params.clock.is_some(), "the policy toggles a clock, give its name");
    }
    if policy.reset == ResetPolicy::Pulse {
        ensure!(params.reset.is_some(), "the policy pulses reset, give its name");
    }
    if policy.termination.needs_condition() {
        ensure!(params.stop.is_some(), "the policy needs a stop condition");
    }
    substitute(&skeleton(policy)?, params)
}
