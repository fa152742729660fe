//! Directed element relationships and stem/branch pair interactions.

use serde::Serialize;

use crate::calendar::{Branch, Element, Stem};

/// How a target element bears on a reference element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Target feeds the reference (印).
    Generated,
    /// Reference feeds the target and is drained (食伤).
    Drained,
    /// Reference subdues the target (财).
    Controls,
    /// Target subdues the reference (官杀).
    Controlled,
    /// Same element (比劫).
    Same,
}

impl Relation {
    pub fn score(self) -> f64 {
        match self {
            Relation::Generated => 12.0,
            Relation::Drained => -3.0,
            Relation::Controls => 8.0,
            Relation::Controlled => -10.0,
            Relation::Same => 6.0,
        }
    }
}

/// Classify `target` relative to `reference`.
///
/// The checks run in a fixed order; with five elements exactly one holds
/// for any pair.
pub fn relation(reference: Element, target: Element) -> Relation {
    if target.generates() == reference {
        Relation::Generated
    } else if reference.generates() == target {
        Relation::Drained
    } else if reference.overcomes() == target {
        Relation::Controls
    } else if target.overcomes() == reference {
        Relation::Controlled
    } else {
        Relation::Same
    }
}

pub fn relation_score(reference: Element, target: Element) -> f64 {
    relation(reference, target).score()
}

/// Stem five-combinations (天干五合): 甲己, 乙庚, 丙辛, 丁壬, 戊癸.
pub fn stems_combine(a: Stem, b: Stem) -> bool {
    matches!(a.value() + b.value(), 5 | 7 | 9 | 11 | 13)
}

/// Same-polarity stems whose elements overcome each other in either direction.
pub fn stems_clash(a: Stem, b: Stem) -> bool {
    if a.is_yang() != b.is_yang() {
        return false;
    }
    let (ea, eb) = (a.element(), b.element());
    ea.overcomes() == eb || eb.overcomes() == ea
}

/// Six-union partner (六合) of each branch, indexed by branch value.
const UNION_PARTNER: [u8; 12] = [1, 0, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2];

pub fn branches_unite(a: Branch, b: Branch) -> bool {
    UNION_PARTNER[a.value() as usize] == b.value()
}

/// Six-clash (六冲): branches directly opposite on the twelve-cycle.
pub fn branches_clash(a: Branch, b: Branch) -> bool {
    (a.value() as i32 - b.value() as i32).abs() == 6
}
