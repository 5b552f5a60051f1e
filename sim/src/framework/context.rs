use super::SimContext;

/// The simulation context shipped with this crate.
#[derive(Debug, Default)]
pub struct Context {
    time: u64,
    finished: bool,
    trace_ever_on: bool,
    args: Vec<String>,
}

impl Context {
    /// Arguments forwarded by [`SimContext::command_args`].
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Look up a `+name=value` plus-argument. A bare `+name` yields an empty
    /// string. The last occurrence wins.
    pub fn plusarg(&self, name: &str) -> Option<&str> {
        self.args.iter().rev().find_map(|arg| {
            let rest = arg.strip_prefix('+')?.strip_prefix(name)?;
            if rest.is_empty() {
                Some(rest)
            } else {
                rest.strip_prefix('=')
            }
        })
    }
}

impl SimContext for Context {
    fn command_args(&mut self, args: &[String]) {
        self.args = args.to_vec();
    }

    fn time(&self) -> u64 {
        self.time
    }

    fn time_inc(&mut self, delta: u64) {
        self.time += delta;
    }

    fn got_finish(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) {
        if !self.finished {
            tracing::debug!("finish requested at time {}", self.time);
        }
        self.finished = true;
    }

    fn trace_ever_on(&mut self, on: bool) {
        self.trace_ever_on = on;
    }

    fn is_trace_ever_on(&self) -> bool {
        self.trace_ever_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(args: &[&str]) -> Context {
        let mut ctx = Context::default();
        ctx.command_args(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        ctx
    }

    #[test]
    fn time_only_moves_explicitly() {
        let mut ctx = Context::default();
        assert_eq!(ctx.time(), 0);
        ctx.finish();
        ctx.trace_ever_on(true);
        assert_eq!(ctx.time(), 0);
        ctx.time_inc(1);
        ctx.time_inc(2);
        assert_eq!(ctx.time(), 3);
    }

    #[test]
    fn plusargs() {
        let ctx = context_with(&["sim", "+limit=12", "+verbose", "+limit=7", "-x"]);
        assert_eq!(ctx.plusarg("limit"), Some("7"));
        assert_eq!(ctx.plusarg("verbose"), Some(""));
        assert_eq!(ctx.plusarg("verb"), None);
        assert_eq!(ctx.plusarg("x"), None);
        assert_eq!(ctx.args().len(), 5);
    }
}
