//! Closed action enumerations for both learner tiers

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::hash::Hash;

use crate::error::{Result, RlError};
use crate::need::NeedType;

/// Trait for fixed, ordered action enumerations
pub trait DiscreteAction: Copy + Eq + Hash + Debug + fmt::Display + Send + Sync + 'static {
    /// Every action in ordinal order
    fn all() -> &'static [Self];

    /// Position in [`DiscreteAction::all`], also the persisted action id
    fn ordinal(self) -> usize;

    /// Action used when nothing else can be chosen
    fn no_op() -> Self;

    /// Member that means doing nothing, if the enumeration has one
    fn idle() -> Option<Self> {
        None
    }

    /// Action that addresses a need
    fn for_need(need: NeedType) -> Self;

    /// Concrete affordance this action resolves to, `None` for doing nothing
    fn target(self) -> Option<PrimitiveAction>;

    /// Need this action is chosen to address, if it names one
    fn addresses(self) -> Option<NeedType> {
        None
    }

    /// Number of actions in the enumeration
    #[must_use]
    fn count() -> usize {
        Self::all().len()
    }

    /// Look up an action by ordinal
    fn from_ordinal(ordinal: usize) -> Result<Self> {
        Self::all()
            .get(ordinal)
            .copied()
            .ok_or(RlError::InvalidAction {
                ordinal,
                count: Self::count(),
            })
    }
}

/// Concrete actions tied to an interactable affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveAction {
    /// Do nothing until the next decision
    Idle,
    /// Watch television
    UseTelevision,
    /// Use the computer
    UseComputer,
    /// Take a shower
    UseShower,
    /// Eat from the refrigerator
    UseRefrigerator,
    /// Use the toilet
    UseToilet,
    /// Sleep in bed
    UseBed,
    /// Sit on the sofa
    UseSofa,
    /// Make a phone call
    UsePhone,
    /// Wash at the sink
    UseSink,
    /// Read from the bookshelf
    UseBookshelf,
    /// Work out at the gym
    UseGym,
}

impl PrimitiveAction {
    /// All primitive actions in ordinal order
    pub const ALL: [PrimitiveAction; 12] = [
        PrimitiveAction::Idle,
        PrimitiveAction::UseTelevision,
        PrimitiveAction::UseComputer,
        PrimitiveAction::UseShower,
        PrimitiveAction::UseRefrigerator,
        PrimitiveAction::UseToilet,
        PrimitiveAction::UseBed,
        PrimitiveAction::UseSofa,
        PrimitiveAction::UsePhone,
        PrimitiveAction::UseSink,
        PrimitiveAction::UseBookshelf,
        PrimitiveAction::UseGym,
    ];

    /// Display name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveAction::Idle => "Idle",
            PrimitiveAction::UseTelevision => "UseTelevision",
            PrimitiveAction::UseComputer => "UseComputer",
            PrimitiveAction::UseShower => "UseShower",
            PrimitiveAction::UseRefrigerator => "UseRefrigerator",
            PrimitiveAction::UseToilet => "UseToilet",
            PrimitiveAction::UseBed => "UseBed",
            PrimitiveAction::UseSofa => "UseSofa",
            PrimitiveAction::UsePhone => "UsePhone",
            PrimitiveAction::UseSink => "UseSink",
            PrimitiveAction::UseBookshelf => "UseBookshelf",
            PrimitiveAction::UseGym => "UseGym",
        }
    }
}

impl fmt::Display for PrimitiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DiscreteAction for PrimitiveAction {
    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn ordinal(self) -> usize {
        self as usize
    }

    fn no_op() -> Self {
        PrimitiveAction::Idle
    }

    fn idle() -> Option<Self> {
        Some(PrimitiveAction::Idle)
    }

    fn for_need(need: NeedType) -> Self {
        capability_for(need)
    }

    fn target(self) -> Option<PrimitiveAction> {
        match self {
            PrimitiveAction::Idle => None,
            other => Some(other),
        }
    }
}

/// High-level choice of which need to address next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MacroAction {
    /// Address hunger
    SatisfyHunger,
    /// Address bladder
    SatisfyBladder,
    /// Address energy
    SatisfyEnergy,
    /// Address social
    SatisfySocial,
    /// Address hygiene
    SatisfyHygiene,
    /// Address fun
    SatisfyFun,
}

impl MacroAction {
    /// All macro actions in ordinal order
    pub const ALL: [MacroAction; NeedType::COUNT] = [
        MacroAction::SatisfyHunger,
        MacroAction::SatisfyBladder,
        MacroAction::SatisfyEnergy,
        MacroAction::SatisfySocial,
        MacroAction::SatisfyHygiene,
        MacroAction::SatisfyFun,
    ];

    /// Need this macro action pursues
    #[must_use]
    pub fn need(self) -> NeedType {
        match self {
            MacroAction::SatisfyHunger => NeedType::Hunger,
            MacroAction::SatisfyBladder => NeedType::Bladder,
            MacroAction::SatisfyEnergy => NeedType::Energy,
            MacroAction::SatisfySocial => NeedType::Social,
            MacroAction::SatisfyHygiene => NeedType::Hygiene,
            MacroAction::SatisfyFun => NeedType::Fun,
        }
    }
}

impl fmt::Display for MacroAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Satisfy{}", self.need())
    }
}

impl DiscreteAction for MacroAction {
    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn ordinal(self) -> usize {
        self as usize
    }

    // No idle member at this tier; the first action stands in.
    fn no_op() -> Self {
        MacroAction::SatisfyHunger
    }

    fn for_need(need: NeedType) -> Self {
        Self::ALL[need.index()]
    }

    fn target(self) -> Option<PrimitiveAction> {
        Some(capability_for(self.need()))
    }

    fn addresses(self) -> Option<NeedType> {
        Some(self.need())
    }
}

/// Fixed lookup from a need to the affordance that satisfies it
#[must_use]
pub fn capability_for(need: NeedType) -> PrimitiveAction {
    match need {
        NeedType::Hunger => PrimitiveAction::UseRefrigerator,
        NeedType::Bladder => PrimitiveAction::UseToilet,
        NeedType::Energy => PrimitiveAction::UseBed,
        NeedType::Social => PrimitiveAction::UseSofa,
        NeedType::Hygiene => PrimitiveAction::UseShower,
        NeedType::Fun => PrimitiveAction::UseTelevision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_match_positions() {
        for (i, action) in PrimitiveAction::all().iter().enumerate() {
            assert_eq!(action.ordinal(), i);
        }
        for (i, action) in MacroAction::all().iter().enumerate() {
            assert_eq!(action.ordinal(), i);
            assert_eq!(action.need().index(), i);
        }
    }

    #[test]
    fn test_from_ordinal_rejects_out_of_range() {
        assert_eq!(PrimitiveAction::from_ordinal(4).unwrap(), PrimitiveAction::UseRefrigerator);
        assert!(matches!(
            MacroAction::from_ordinal(6),
            Err(RlError::InvalidAction { ordinal: 6, count: 6 })
        ));
    }

    #[test]
    fn test_macro_targets_follow_capability_map() {
        assert_eq!(
            MacroAction::SatisfyBladder.target(),
            Some(PrimitiveAction::UseToilet)
        );
        assert_eq!(MacroAction::for_need(NeedType::Fun), MacroAction::SatisfyFun);
        assert_eq!(PrimitiveAction::for_need(NeedType::Energy), PrimitiveAction::UseBed);
        assert_eq!(PrimitiveAction::Idle.target(), None);
    }

    #[test]
    fn test_only_primitives_have_idle() {
        assert_eq!(PrimitiveAction::idle(), Some(PrimitiveAction::Idle));
        assert_eq!(MacroAction::idle(), None);
        assert_eq!(MacroAction::no_op(), MacroAction::SatisfyHunger);
    }
}
