//! The phase ladder: the total order every declaration climbs.

use std::fmt;

/// A resolution phase.
///
/// All declaration kinds share this single ladder even when a phase has
/// nothing to do for a kind (a type alias has no body, but its marker still
/// passes [`Phase::Body`]). A declaration's marker only ever moves up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Phase {
    /// Straight from the parser; every lazy part is a placeholder.
    Raw = 0,
    /// File import directives are bound to their targets.
    Imports = 1,
    /// Class supertypes and type-alias expansions are known.
    Supertypes = 2,
    /// Explicitly written parameter, return and variable types are resolved.
    Signatures = 3,
    /// Bodies, initializers, implicit types and control-flow graphs are resolved.
    Body = 4,
}

impl Phase {
    /// Every phase in ladder order.
    pub const ALL: [Phase; 5] = [
        Phase::Raw,
        Phase::Imports,
        Phase::Supertypes,
        Phase::Signatures,
        Phase::Body,
    ];

    /// The first phase.
    pub const FIRST: Phase = Phase::Raw;

    /// The terminal phase of the ladder.
    pub const LAST: Phase = Phase::Body;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The phase at `index`, or `None` past the end of the ladder.
    pub fn from_index(index: usize) -> Option<Phase> {
        Self::ALL.get(index).copied()
    }

    /// The phase at `index`.
    ///
    /// # Panics
    /// Panics when `index` is outside the ladder; asking for a phase that does
    /// not exist is an internal error, not a recoverable condition.
    pub fn at(index: usize) -> Phase {
        match Self::from_index(index) {
            Some(phase) => phase,
            None => panic!(
                "phase index {index} is outside the ladder (0..{})",
                Self::ALL.len()
            ),
        }
    }

    /// The phase after this one, or `None` for the terminal phase.
    pub fn next(self) -> Option<Phase> {
        Self::from_index(self.index() + 1)
    }

    /// The phase before this one, or `None` for [`Phase::Raw`].
    pub fn previous(self) -> Option<Phase> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Phases strictly after `self` up to and including `target`.
    pub fn steps_to(self, target: Phase) -> impl Iterator<Item = Phase> {
        Self::ALL
            .into_iter()
            .filter(move |&phase| phase > self && phase <= target)
    }

    pub(crate) fn from_raw(raw: u8) -> Phase {
        Self::at(raw as usize)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Raw => "RAW",
            Phase::Imports => "IMPORTS",
            Phase::Supertypes => "SUPERTYPES",
            Phase::Signatures => "SIGNATURES",
            Phase::Body => "BODY",
        };
        f.write_str(name)
    }
}
