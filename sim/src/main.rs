use std::path::PathBuf;

use anyhow::{Context, Result};
use binutils::{clap, verbose};
use clap::{Parser, Subcommand, ValueEnum};
use tbdrive::{
    driver::{ClockPolicy, ResetPolicy, TerminationKind, TimeAdvance},
    models::{self, RunOptions},
    predicate::Expr,
    template::{self, Params},
    trace::DEFAULT_DEPTH,
    Policy, RunSummary, TraceConfig, Variant,
};

/// Simulation drivers for compiled hardware models
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = binutils::get_styles(),
    arg_required_else_help = true,
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Write logs as JSON lines to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    verbose: verbose::Verbosity,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive one of the built-in models
    Run {
        /// Model to drive
        #[arg(short, long, default_value = "counter")]
        model: String,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Loop condition, e.g. `count < 10 && !finish`
        #[arg(long)]
        stop: Option<String>,

        /// Record a VCD waveform to this path
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Hierarchy levels below the top module to record
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: u32,

        /// Arguments forwarded to the simulation context, e.g. `+limit=20`
        #[arg(last = true)]
        runtime_args: Vec<String>,
    },
    /// Generate a Verilator C++ driver
    Render {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Verilated top module name
        #[arg(long)]
        module: String,

        /// Clock input of the top module
        #[arg(long)]
        clock: Option<String>,

        /// Reset input of the top module
        #[arg(long)]
        reset: Option<String>,

        /// Loop condition in the condition language
        #[arg(long, conflicts_with = "raw_stop")]
        stop: Option<String>,

        /// Loop condition as a raw C++ expression
        #[arg(long)]
        raw_stop: Option<String>,

        /// Waveform destination of the generated driver
        #[arg(long)]
        trace: Option<String>,

        /// Hierarchy levels below the top module to record
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: u32,

        /// Fill this template file instead of generating the driver
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output filename (default is stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct PolicyArgs {
    /// Driver shape to start from
    #[arg(long, value_enum, default_value_t = VariantArg::Sim)]
    variant: VariantArg,

    /// Override clock handling
    #[arg(long, value_enum)]
    clock_policy: Option<ClockArg>,

    /// Override reset sequencing
    #[arg(long, value_enum)]
    reset_policy: Option<ResetArg>,

    /// Override the termination condition
    #[arg(long, value_enum)]
    termination: Option<TerminationArg>,

    /// Override time advancement
    #[arg(long, value_enum)]
    advance: Option<AdvanceArg>,

    /// Print a marker line when the warm-up window ends
    #[arg(long)]
    marker: Option<bool>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum VariantArg {
    Func,
    Sim,
    Trace,
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ClockArg {
    Hold,
    Toggle,
    ToggleFromLow,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ResetArg {
    None,
    Pulse,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum TerminationArg {
    Once,
    Finish,
    Until,
    WarmupOrUntil,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AdvanceArg {
    None,
    Trailing,
    Leading,
}

impl PolicyArgs {
    fn policy(&self, tracing: bool) -> Policy {
        let variant = match self.variant {
            VariantArg::Func => Variant::Func,
            VariantArg::Sim => Variant::Sim,
            VariantArg::Trace => Variant::Trace,
            VariantArg::Reset => Variant::Reset,
        };
        let mut policy = variant.policy();
        if let Some(clock) = self.clock_policy {
            policy.clock = match clock {
                ClockArg::Hold => ClockPolicy::Hold,
                ClockArg::Toggle => ClockPolicy::Toggle,
                ClockArg::ToggleFromLow => ClockPolicy::ToggleFromLow,
            };
        }
        if let Some(reset) = self.reset_policy {
            policy.reset = match reset {
                ResetArg::None => ResetPolicy::None,
                ResetArg::Pulse => ResetPolicy::Pulse,
            };
        }
        if let Some(termination) = self.termination {
            policy.termination = match termination {
                TerminationArg::Once => TerminationKind::Once,
                TerminationArg::Finish => TerminationKind::Finish,
                TerminationArg::Until => TerminationKind::Until,
                TerminationArg::WarmupOrUntil => TerminationKind::WarmupOrUntil,
            };
        }
        if let Some(advance) = self.advance {
            policy.advance = match advance {
                AdvanceArg::None => TimeAdvance::None,
                AdvanceArg::Trailing => TimeAdvance::Trailing,
                AdvanceArg::Leading => TimeAdvance::Leading,
            };
        }
        if let Some(marker) = self.marker {
            policy.marker = marker;
        }
        policy.tracing |= tracing;
        policy
    }
}

fn print_summary(summary: &RunSummary) {
    use ansi_term::Colour::{Green, Yellow};

    let status = if summary.finished {
        Green.bold().paint("finished")
    } else {
        Yellow.bold().paint("stopped")
    };
    eprintln!(
        "{status} after {} iteration(s) at time {}: {} clock toggle(s), {} trace dump(s)",
        summary.iterations, summary.final_time, summary.toggles, summary.dumps
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = binutils::verbose_level_to_trace(args.verbose.log_level());
    match &args.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("could not create log file `{}`", path.display()))?;
            binutils::logging_setup(log_level, Some(file));
        }
        None => binutils::logging_setup(log_level, None::<std::fs::File>),
    }

    match args.command {
        Command::Run {
            model,
            policy,
            stop,
            trace,
            depth,
            runtime_args,
        } => {
            let policy = policy.policy(trace.is_some());
            let trace = policy.tracing.then(|| TraceConfig {
                path: trace.unwrap_or_else(|| TraceConfig::default().path),
                depth,
            });
            let options = RunOptions {
                policy,
                condition: stop,
                trace,
            };

            let mut forwarded = vec![String::from("tbdrive")];
            forwarded.extend(runtime_args);
            let summary = models::run_builtin(&model, &options, &forwarded)?;
            print_summary(&summary);
        }
        Command::Render {
            policy,
            module,
            clock,
            reset,
            stop,
            raw_stop,
            trace,
            depth,
            template: template_file,
            output,
        } => {
            let policy = policy.policy(trace.is_some());
            let stop = match (stop, raw_stop) {
                (Some(expr), _) => Some(Expr::parse(&expr)?.to_cpp()?),
                (None, raw) => raw,
            };
            let mut params = Params {
                clock,
                reset,
                stop,
                depth,
                ..Params::new(module)
            };
            if let Some(trace) = trace {
                params.trace = trace;
            }

            let cpp = match &template_file {
                Some(path) => template::substitute(&template::load_template(path)?, &params)?,
                None => template::render(&policy, &params)?,
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, cpp)
                        .with_context(|| format!("could not write file `{}`", path.display()))?;
                    println!("writing to file `{}`", path.display());
                }
                None => print!("{cpp}"),
            }
        }
    }
    Ok(())
}
