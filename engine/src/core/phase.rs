//! Frame phases and the tick kinds that group them.
//!
//! A frame is driven by the host as three kinds of ticks. Each kind is split into three
//! sub-phases that always run in the same order:
//!
//! ```text
//! TickKind::Simulation  EarlyUpdate      ─► Update      ─► TardyUpdate
//! TickKind::Fixed       EarlyFixedUpdate ─► FixedUpdate ─► TardyFixedUpdate
//! TickKind::Late        EarlyLateUpdate  ─► LateUpdate  ─► TardyLateUpdate
//! ```
//!
//! The middle phase of each kind is the *primary* phase. Only primary phases own an invoke
//! queue, so cross-thread work always lands on `Update`, `FixedUpdate` or `LateUpdate`.
//!
//! Ordering between kinds is decided by the host (see
//! [`FrameDriver`](crate::core::frame::FrameDriver) for the reference order).

use std::{fmt, str::FromStr};

use crate::core::error::LoopError;

/// The three groups of phases a host drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TickKind {
    /// Once per rendered frame, variable timestep.
    Simulation,
    /// Zero or more times per frame, fixed timestep.
    Fixed,
    /// Once per rendered frame, after the simulation tick.
    Late,
}

impl TickKind {
    /// All tick kinds.
    pub const ALL: [TickKind; 3] = [TickKind::Simulation, TickKind::Fixed, TickKind::Late];

    /// Dense index of the kind, `0..3`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The phases of this kind in execution order.
    #[inline]
    pub const fn phases(self) -> [Phase; 3] {
        [self.early(), self.primary(), self.tardy()]
    }

    /// The first phase of the kind. Advancing it starts a new tick.
    pub const fn early(self) -> Phase {
        match self {
            TickKind::Simulation => Phase::EarlyUpdate,
            TickKind::Fixed => Phase::EarlyFixedUpdate,
            TickKind::Late => Phase::EarlyLateUpdate,
        }
    }

    /// The primary phase of the kind, the one owning the invoke queue.
    pub const fn primary(self) -> Phase {
        match self {
            TickKind::Simulation => Phase::Update,
            TickKind::Fixed => Phase::FixedUpdate,
            TickKind::Late => Phase::LateUpdate,
        }
    }

    /// The last phase of the kind.
    pub const fn tardy(self) -> Phase {
        match self {
            TickKind::Simulation => Phase::TardyUpdate,
            TickKind::Fixed => Phase::TardyFixedUpdate,
            TickKind::Late => Phase::TardyLateUpdate,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            TickKind::Simulation => "simulation",
            TickKind::Fixed => "fixed",
            TickKind::Late => "late",
        }
    }
}

impl fmt::Display for TickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of a phase inside its tick kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Early,
    Primary,
    Tardy,
}

/// One named stage of a tick.
///
/// Phases are declared in frame order so `Ord` matches the order inside a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    EarlyUpdate = 0,
    Update,
    TardyUpdate,
    EarlyFixedUpdate,
    FixedUpdate,
    TardyFixedUpdate,
    EarlyLateUpdate,
    LateUpdate,
    TardyLateUpdate,
}

impl Phase {
    /// Number of phases.
    pub const COUNT: usize = 9;

    /// Every phase, grouped by kind and in execution order inside each kind.
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::EarlyUpdate,
        Phase::Update,
        Phase::TardyUpdate,
        Phase::EarlyFixedUpdate,
        Phase::FixedUpdate,
        Phase::TardyFixedUpdate,
        Phase::EarlyLateUpdate,
        Phase::LateUpdate,
        Phase::TardyLateUpdate,
    ];

    /// Dense index of the phase, `0..Phase::COUNT`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`index`](Self::index).
    #[inline]
    pub const fn from_index(index: usize) -> Option<Phase> {
        if index < Phase::COUNT {
            Some(Phase::ALL[index])
        } else {
            None
        }
    }

    /// The tick kind this phase belongs to.
    pub const fn kind(self) -> TickKind {
        match self {
            Phase::EarlyUpdate | Phase::Update | Phase::TardyUpdate => TickKind::Simulation,
            Phase::EarlyFixedUpdate | Phase::FixedUpdate | Phase::TardyFixedUpdate => {
                TickKind::Fixed
            }
            Phase::EarlyLateUpdate | Phase::LateUpdate | Phase::TardyLateUpdate => TickKind::Late,
        }
    }

    /// Where the phase sits inside its kind.
    pub const fn stage(self) -> Stage {
        match self.index() % 3 {
            0 => Stage::Early,
            1 => Stage::Primary,
            _ => Stage::Tardy,
        }
    }

    /// `true` for `Update`, `FixedUpdate` and `LateUpdate`.
    #[inline]
    pub const fn is_primary(self) -> bool {
        matches!(self.stage(), Stage::Primary)
    }

    /// `true` if advancing this phase starts a new tick of its kind.
    #[inline]
    pub const fn starts_tick(self) -> bool {
        matches!(self.stage(), Stage::Early)
    }

    /// The phase that must have completed right before this one, if any.
    pub const fn predecessor(self) -> Option<Phase> {
        match self.stage() {
            Stage::Early => None,
            Stage::Primary => Some(self.kind().early()),
            Stage::Tardy => Some(self.kind().primary()),
        }
    }

    /// Slot of this phase's invoke queue, `None` for non-primary phases.
    #[inline]
    pub(crate) const fn queue_slot(self) -> Option<usize> {
        if self.is_primary() {
            Some(self.kind().index())
        } else {
            None
        }
    }

    /// The phase name, identical to the variant name.
    pub const fn name(self) -> &'static str {
        match self {
            Phase::EarlyUpdate => "EarlyUpdate",
            Phase::Update => "Update",
            Phase::TardyUpdate => "TardyUpdate",
            Phase::EarlyFixedUpdate => "EarlyFixedUpdate",
            Phase::FixedUpdate => "FixedUpdate",
            Phase::TardyFixedUpdate => "TardyFixedUpdate",
            Phase::EarlyLateUpdate => "EarlyLateUpdate",
            Phase::LateUpdate => "LateUpdate",
            Phase::TardyLateUpdate => "TardyLateUpdate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| LoopError::UnknownPhase(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_list_phases_in_execution_order() {
        assert_eq!(
            TickKind::Fixed.phases(),
            [
                Phase::EarlyFixedUpdate,
                Phase::FixedUpdate,
                Phase::TardyFixedUpdate
            ]
        );
        for kind in TickKind::ALL {
            let [early, primary, tardy] = kind.phases();
            assert!(early < primary && primary < tardy);
            assert!(early.starts_tick());
            assert!(primary.is_primary());
            assert_eq!(tardy.stage(), Stage::Tardy);
            assert!(kind.phases().iter().all(|phase| phase.kind() == kind));
        }
    }

    #[test]
    fn only_primary_phases_have_queue_slots() {
        let slots: Vec<_> = Phase::ALL
            .into_iter()
            .filter_map(|phase| phase.queue_slot().map(|slot| (phase, slot)))
            .collect();

        assert_eq!(
            slots,
            vec![
                (Phase::Update, 0),
                (Phase::FixedUpdate, 1),
                (Phase::LateUpdate, 2)
            ]
        );
    }

    #[test]
    fn predecessor_stays_inside_kind() {
        assert_eq!(Phase::EarlyLateUpdate.predecessor(), None);
        assert_eq!(Phase::LateUpdate.predecessor(), Some(Phase::EarlyLateUpdate));
        assert_eq!(Phase::TardyUpdate.predecessor(), Some(Phase::Update));
    }

    #[test]
    fn parses_phase_names() {
        assert_eq!("TardyFixedUpdate".parse::<Phase>().unwrap(), Phase::TardyFixedUpdate);
        assert_eq!(Phase::LateUpdate.to_string(), "LateUpdate");

        let err = "PostUpdate".parse::<Phase>().unwrap_err();
        assert!(matches!(err, LoopError::UnknownPhase(name) if name == "PostUpdate"));
    }

    #[test]
    fn index_round_trips() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_index(phase.index()), Some(phase));
        }
        assert_eq!(Phase::from_index(Phase::COUNT), None);
    }
}
