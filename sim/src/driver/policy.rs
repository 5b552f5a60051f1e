//! The six axes a driver is parameterized over, and the preset combinations.

use anyhow::{bail, Result};

/// Reset sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResetPolicy {
    #[default]
    None,
    /// Assert reset while `3 <= time < 6`, deassert otherwise.
    Pulse,
}

/// Clock toggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ClockPolicy {
    /// Never touch the clock.
    Hold,
    /// Invert the clock every iteration, starting from the model's power-on
    /// level.
    #[default]
    Toggle,
    /// Like [`ClockPolicy::Toggle`], but the clock is preset high before the
    /// loop so the first evaluated level is low.
    ToggleFromLow,
}

impl ClockPolicy {
    pub fn toggles(self) -> bool {
        self != ClockPolicy::Hold
    }
}

/// What keeps the loop going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TerminationKind {
    /// No loop: evaluate once.
    Once,
    /// Until the model raises the finish flag. A model that never does keeps
    /// the driver running forever.
    #[default]
    Finish,
    /// While the caller's condition holds.
    Until,
    /// While inside the warm-up window or while the caller's condition holds.
    WarmupOrUntil,
}

impl TerminationKind {
    pub fn needs_condition(self) -> bool {
        matches!(self, TerminationKind::Until | TerminationKind::WarmupOrUntil)
    }
}

/// Where in the loop body logical time moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TimeAdvance {
    /// Time never moves.
    #[default]
    None,
    /// One unit after eval and dump; reset and marker see the pre-advance time.
    Trailing,
    /// One unit at the top of the body, before anything else.
    Leading,
}

/// One concrete driver shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Policy {
    pub reset: ResetPolicy,
    pub clock: ClockPolicy,
    pub termination: TerminationKind,
    pub advance: TimeAdvance,
    pub tracing: bool,
    /// Print [`WARMUP_MARKER`](super::WARMUP_MARKER) when time reaches the end
    /// of the warm-up window.
    pub marker: bool,
}

impl Policy {
    /// Reject combinations that cannot describe a sensible driver.
    pub fn validate(&self) -> Result<()> {
        if self.termination == TerminationKind::Once {
            if self.clock.toggles() {
                bail!("a run-once driver cannot toggle the clock");
            }
            if self.reset != ResetPolicy::None {
                bail!("a run-once driver cannot sequence reset");
            }
            if self.advance != TimeAdvance::None {
                bail!("a run-once driver cannot advance time");
            }
            if self.marker {
                bail!("a run-once driver never reaches the end of warm-up");
            }
            return Ok(());
        }
        if self.termination == TerminationKind::WarmupOrUntil
            && self.advance != TimeAdvance::Trailing
        {
            bail!("a warm-up driver must advance time after evaluation");
        }
        if self.advance == TimeAdvance::None {
            if self.tracing {
                bail!("tracing a loop requires time advancement");
            }
            if self.reset != ResetPolicy::None || self.marker {
                tracing::warn!("time never advances, reset and marker stay inactive");
            }
        }
        Ok(())
    }
}

/// The driver shapes that are generated most often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Variant {
    /// Construct, evaluate once, tear down.
    Func,
    /// Free-running clock until the model finishes.
    Sim,
    /// Free-running clock, traced, while the caller's condition holds.
    Trace,
    /// Reset pulse inside a warm-up window, then run while the caller's
    /// condition holds.
    Reset,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::Func, Variant::Sim, Variant::Trace, Variant::Reset];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Func => "func",
            Variant::Sim => "sim",
            Variant::Trace => "trace",
            Variant::Reset => "reset",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn policy(self) -> Policy {
        match self {
            Variant::Func => Policy {
                reset: ResetPolicy::None,
                clock: ClockPolicy::Hold,
                termination: TerminationKind::Once,
                advance: TimeAdvance::None,
                tracing: false,
                marker: false,
            },
            Variant::Sim => Policy {
                reset: ResetPolicy::None,
                clock: ClockPolicy::Toggle,
                termination: TerminationKind::Finish,
                advance: TimeAdvance::None,
                tracing: false,
                marker: false,
            },
            Variant::Trace => Policy {
                reset: ResetPolicy::None,
                clock: ClockPolicy::Toggle,
                termination: TerminationKind::Until,
                advance: TimeAdvance::Leading,
                tracing: true,
                marker: false,
            },
            Variant::Reset => Policy {
                reset: ResetPolicy::Pulse,
                clock: ClockPolicy::ToggleFromLow,
                termination: TerminationKind::WarmupOrUntil,
                advance: TimeAdvance::Trailing,
                tracing: false,
                marker: true,
            },
        }
    }
}

impl From<Variant> for Policy {
    fn from(variant: Variant) -> Self {
        variant.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for v in Variant::ALL {
            v.policy().validate().unwrap();
            assert_eq!(Variant::from_name(v.name()), Some(v));
        }
        assert_eq!(Variant::from_name("bogus"), None);
    }

    #[test]
    fn once_excludes_loop_axes() {
        let base = Variant::Func.policy();
        let bad = [
            Policy {
                clock: ClockPolicy::Toggle,
                ..base
            },
            Policy {
                reset: ResetPolicy::Pulse,
                ..base
            },
            Policy {
                advance: TimeAdvance::Trailing,
                ..base
            },
            Policy {
                marker: true,
                ..base
            },
        ];
        for p in bad {
            assert!(p.validate().is_err(), "{p:?}");
        }
        // a single evaluation may still be traced
        Policy {
            tracing: true,
            ..base
        }
        .validate()
        .unwrap();
    }

    #[test]
    fn warmup_and_tracing_need_time() {
        let reset = Variant::Reset.policy();
        for advance in [TimeAdvance::None, TimeAdvance::Leading] {
            assert!(Policy { advance, ..reset }.validate().is_err(), "{advance:?}");
        }

        let sim = Variant::Sim.policy();
        assert!(Policy {
            tracing: true,
            ..sim
        }
        .validate()
        .is_err());
        Policy {
            tracing: true,
            advance: TimeAdvance::Trailing,
            ..sim
        }
        .validate()
        .unwrap();
    }
}
