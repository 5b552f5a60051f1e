//! Loop conditions written as text, e.g. on the command line.
//!
//! ```text
//! time < 100 && !finish
//! count != 0x2a || (done == 0 && edge.prev)
//! ```
//!
//! Identifiers are `time` (logical time), `finish` (the context's finish flag)
//! or the dotted path of any traceable model signal. Every value is an
//! unsigned integer and a non-zero result counts as true.
use anyhow::{bail, Context, Result};
use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use crate::framework::{HardwareModel, SimContext};

#[derive(Parser)]
#[grammar = "src/predicate.pest"]
struct ConditionParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn from_symbol(s: &str) -> Result<Self> {
        Ok(match s {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => bail!("unknown comparison `{s}`"),
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn apply(self, lhs: u64, rhs: u64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Parsed, not yet bound to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Lit(u64),
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

fn next<'i>(it: &mut pest::iterators::Pairs<'i, Rule>) -> Result<Pair<'i, Rule>> {
    it.next().context("malformed condition")
}

fn build(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expr | Rule::conj => {
            let is_or = pair.as_rule() == Rule::expr;
            let mut it = pair.into_inner();
            let mut acc = build(next(&mut it)?)?;
            for rhs in it {
                let rhs = Box::new(build(rhs)?);
                acc = if is_or {
                    Expr::Or(Box::new(acc), rhs)
                } else {
                    Expr::And(Box::new(acc), rhs)
                };
            }
            Ok(acc)
        }
        Rule::cmp => {
            let mut it = pair.into_inner();
            let lhs = build(next(&mut it)?)?;
            match it.next() {
                Some(op) => {
                    let op = CmpOp::from_symbol(op.as_str())?;
                    let rhs = build(next(&mut it)?)?;
                    Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
                }
                None => Ok(lhs),
            }
        }
        Rule::unary => {
            let mut nots = 0;
            let mut operand = None;
            for p in pair.into_inner() {
                if p.as_rule() == Rule::not_op {
                    nots += 1;
                } else {
                    operand = Some(build(p)?);
                }
            }
            let mut e = operand.context("malformed condition")?;
            for _ in 0..nots {
                e = Expr::Not(Box::new(e));
            }
            Ok(e)
        }
        Rule::hex => {
            let s = pair.as_str();
            u64::from_str_radix(&s[2..], 16)
                .map(Expr::Lit)
                .with_context(|| format!("literal `{s}` does not fit in 64 bits"))
        }
        Rule::dec => {
            let s = pair.as_str();
            s.parse()
                .map(Expr::Lit)
                .with_context(|| format!("literal `{s}` does not fit in 64 bits"))
        }
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        r => bail!("unexpected {r:?} in condition"),
    }
}

impl Expr {
    pub fn parse(src: &str) -> Result<Self> {
        let main = ConditionParser::parse(Rule::main, src)
            .with_context(|| format!("could not parse condition `{src}`"))?
            .next()
            .context("empty condition")?;
        let expr = main
            .into_inner()
            .find(|p| p.as_rule() == Rule::expr)
            .context("empty condition")?;
        build(expr)
    }

    /// Resolve identifiers against the signals of `M`.
    pub fn bind<M: HardwareModel>(&self) -> Result<Condition> {
        let signals = M::signals();
        fn go(e: &Expr, signals: &[crate::framework::SignalDecl]) -> Result<Node> {
            Ok(match e {
                Expr::Lit(v) => Node::Lit(*v),
                Expr::Ident(name) if name == "time" => Node::Time,
                Expr::Ident(name) if name == "finish" => Node::Finish,
                Expr::Ident(name) => {
                    let index = signals
                        .iter()
                        .position(|d| d.path() == *name)
                        .with_context(|| format!("unknown signal `{name}`"))?;
                    Node::Signal {
                        index,
                        mask: signals[index].mask(u64::MAX),
                    }
                }
                Expr::Not(e) => Node::Not(Box::new(go(e, signals)?)),
                Expr::And(a, b) => Node::And(Box::new(go(a, signals)?), Box::new(go(b, signals)?)),
                Expr::Or(a, b) => Node::Or(Box::new(go(a, signals)?), Box::new(go(b, signals)?)),
                Expr::Cmp(op, a, b) => {
                    Node::Cmp(*op, Box::new(go(a, signals)?), Box::new(go(b, signals)?))
                }
            })
        }
        Ok(Condition {
            root: go(self, &signals)?,
        })
    }

    /// Render as a C++ expression against a `VerilatedContext *context` and a
    /// model pointer `top`. Only top-level ports are reachable that way.
    pub fn to_cpp(&self) -> Result<String> {
        Ok(match self {
            Expr::Lit(v) => v.to_string(),
            Expr::Ident(name) if name == "time" => "context->time()".to_string(),
            Expr::Ident(name) if name == "finish" => "context->gotFinish()".to_string(),
            Expr::Ident(name) if name.contains('.') => {
                bail!("`{name}` is not a top-level port and cannot be used in a generated driver")
            }
            Expr::Ident(name) => format!("top->{name}"),
            Expr::Not(e) => format!("!({})", e.to_cpp()?),
            Expr::And(a, b) => format!("({} && {})", a.to_cpp()?, b.to_cpp()?),
            Expr::Or(a, b) => format!("({} || {})", a.to_cpp()?, b.to_cpp()?),
            Expr::Cmp(op, a, b) => format!("({} {} {})", a.to_cpp()?, op.symbol(), b.to_cpp()?),
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    Lit(u64),
    Time,
    Finish,
    Signal { index: usize, mask: u64 },
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Cmp(CmpOp, Box<Node>, Box<Node>),
}

impl Node {
    fn eval<C: SimContext>(&self, context: &C, sample: &[u64]) -> u64 {
        match self {
            Node::Lit(v) => *v,
            Node::Time => context.time(),
            Node::Finish => context.got_finish() as u64,
            Node::Signal { index, mask } => sample.get(*index).copied().unwrap_or_default() & mask,
            Node::Not(e) => (e.eval(context, sample) == 0) as u64,
            Node::And(a, b) => (a.eval(context, sample) != 0 && b.eval(context, sample) != 0) as u64,
            Node::Or(a, b) => (a.eval(context, sample) != 0 || b.eval(context, sample) != 0) as u64,
            Node::Cmp(op, a, b) => op.apply(a.eval(context, sample), b.eval(context, sample)) as u64,
        }
    }
}

/// A condition bound to one model type.
#[derive(Debug, Clone)]
pub struct Condition {
    root: Node,
}

impl Condition {
    /// Evaluate against a context and a full [`HardwareModel::sample`].
    pub fn eval<C: SimContext>(&self, context: &C, sample: &[u64]) -> u64 {
        self.root.eval(context, sample)
    }

    pub fn holds<C: SimContext>(&self, context: &C, sample: &[u64]) -> bool {
        self.eval(context, sample) != 0
    }
}

/// Parse and bind `src` into a loop condition for a [`Testbench`](crate::driver::Testbench).
pub fn compile<M: HardwareModel + 'static>(src: &str) -> Result<crate::driver::Condition<M>> {
    let condition = Expr::parse(src)?.bind::<M>()?;
    tracing::debug!("loop condition `{src}` compiled");
    Ok(Box::new(move |context: &M::Context, model: &M| {
        let mut sample = Vec::new();
        model.sample(&mut sample);
        condition.holds(context, &sample)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Context;
    use crate::models::Counter;

    fn ident(s: &str) -> Box<Expr> {
        Box::new(Expr::Ident(s.to_string()))
    }

    #[test]
    fn precedence() -> Result<()> {
        let e = Expr::parse("a || b && !c")?;
        assert_eq!(
            e,
            Expr::Or(
                ident("a"),
                Box::new(Expr::And(ident("b"), Box::new(Expr::Not(ident("c")))))
            )
        );

        let e = Expr::parse("(a || b) && time >= 0x10")?;
        assert_eq!(
            e,
            Expr::And(
                Box::new(Expr::Or(ident("a"), ident("b"))),
                Box::new(Expr::Cmp(CmpOp::Ge, ident("time"), Box::new(Expr::Lit(16))))
            )
        );
        assert_eq!(Expr::parse("!!x")?, Expr::Not(Box::new(Expr::Not(ident("x")))));
        Ok(())
    }

    #[test]
    fn syntax_errors() {
        for src in ["", "a &&", "a < < b", "(a", "12abc", "0x", "99999999999999999999"] {
            assert!(Expr::parse(src).is_err(), "`{src}` should not parse");
        }
    }

    #[test]
    fn binds_counter_signals() -> Result<()> {
        let mut ctx = Context::default();
        let mut model = Counter::new(&mut ctx)?;
        let cond = Expr::parse("count < 2 && !finish && edge.prev == 0")?.bind::<Counter>()?;

        let mut sample = Vec::new();
        model.sample(&mut sample);
        assert!(cond.holds(&ctx, &sample));

        model.clk = true;
        model.eval(&mut ctx);
        sample.clear();
        model.sample(&mut sample);
        // edge.prev is now high
        assert!(!cond.holds(&ctx, &sample));

        assert!(Expr::parse("bogus > 1")?.bind::<Counter>().is_err());
        Ok(())
    }

    #[test]
    fn compiled_condition_reads_time() -> Result<()> {
        let mut ctx = Context::default();
        let model = Counter::new(&mut ctx)?;
        let cond = compile::<Counter>("time < 3")?;
        assert!(cond(&ctx, &model));
        ctx.time_inc(3);
        assert!(!cond(&ctx, &model));
        Ok(())
    }

    #[test]
    fn renders_cpp() -> Result<()> {
        assert_eq!(
            Expr::parse("time < 100 && !done")?.to_cpp()?,
            "((context->time() < 100) && !(top->done))"
        );
        assert_eq!(Expr::parse("finish")?.to_cpp()?, "context->gotFinish()");
        assert!(Expr::parse("edge.prev")?.to_cpp().is_err());
        Ok(())
    }
}
