//! Elemental power distribution of a natal chart.

use serde::Serialize;

use crate::calendar::Element;
use crate::chart::FourPillars;

/// Per-slot weights, `(stem, branch)` for year, month, day, hour.
/// Month and day carry the most weight.
pub const SLOT_WEIGHTS: [(f64, f64); 4] = [(10.0, 8.0), (12.0, 10.0), (15.0, 8.0), (10.0, 8.0)];

pub const STRONG_RATIO: f64 = 0.4;
pub const WEAK_RATIO: f64 = 0.25;

pub const BASE_STRONG: f64 = 55.0;
pub const BASE_NEUTRAL: f64 = 50.0;
pub const BASE_WEAK: f64 = 45.0;

const THIN_SHARE: f64 = 0.15;
const DOMINANT_SHARE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Balanced,
    Weak,
}

impl Strength {
    pub fn base_score(self) -> f64 {
        match self {
            Strength::Strong => BASE_STRONG,
            Strength::Balanced => BASE_NEUTRAL,
            Strength::Weak => BASE_WEAK,
        }
    }
}

/// Accumulated weight per element. Built once per chart, read-only after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementalPower {
    weights: [f64; 5],
}

impl ElementalPower {
    pub fn from_chart(chart: &FourPillars) -> Self {
        let mut weights = [0.0; 5];
        let slots = [chart.year, chart.month, chart.day, chart.hour];
        for (pillar, (stem_w, branch_w)) in slots.iter().zip(SLOT_WEIGHTS) {
            weights[pillar.stem.element().index()] += stem_w;
            weights[pillar.branch.element().index()] += branch_w;
        }
        Self { weights }
    }

    pub fn of(&self, element: Element) -> f64 {
        self.weights[element.index()]
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn share(&self, element: Element) -> f64 {
        self.of(element) / self.total()
    }

    /// (2 x day element + element feeding it) / total.
    pub fn self_support_ratio(&self, day: Element) -> f64 {
        (self.of(day) * 2.0 + self.of(day.generated_by())) / self.total()
    }

    pub fn strength(&self, day: Element) -> Strength {
        let ratio = self.self_support_ratio(day);
        if ratio > STRONG_RATIO {
            Strength::Strong
        } else if ratio < WEAK_RATIO {
            Strength::Weak
        } else {
            Strength::Balanced
        }
    }

    pub fn base_score(&self, day: Element) -> f64 {
        self.strength(day).base_score()
    }

    /// Reinforcing a thin element is favourable, over-feeding a dominant one is not.
    pub fn balance_adjustment(&self, incoming: Element) -> f64 {
        let share = self.share(incoming);
        if share < THIN_SHARE {
            8.0
        } else if share > DOMINANT_SHARE {
            -5.0
        } else {
            0.0
        }
    }
}
