//! Natal chart and decade-cycle (DaYun) types.
//!
//! Calendar conversion lives outside this crate: a chart arrives as four
//! already-resolved pillars, and the decade cycle as a pillar lookup plus
//! the year it begins.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::calendar::{Element, Pillar, Stem};
use crate::logging::log_decades;
use crate::shensha::{evaluate_pillar, MarkerSet};

/// Upper bound on decade steps.
pub const MAX_DECADES: usize = 12;

pub const LABEL_YEAR: &str = "年柱";
pub const LABEL_MONTH: &str = "月柱";
pub const LABEL_DAY: &str = "日柱";
pub const LABEL_HOUR: &str = "时柱";
pub const LABEL_DECADE: &str = "大运";
pub const LABEL_ANNUAL: &str = "流年";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// 1 is male, 0 is female.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Sex::Female),
            1 => Ok(Sex::Male),
            other => bail!("sex code must be 0 (female) or 1 (male), got {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourPillars {
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Pillar,
}

impl FourPillars {
    pub fn day_stem(&self) -> Stem {
        self.day.stem
    }

    /// Element of the day stem (日主).
    pub fn day_master(&self) -> Element {
        self.day.stem.element()
    }

    pub fn labelled(&self) -> [(&'static str, Pillar); 4] {
        [
            (LABEL_YEAR, self.year),
            (LABEL_MONTH, self.month),
            (LABEL_DAY, self.day),
            (LABEL_HOUR, self.hour),
        ]
    }
}

/// Source of decade pillars.
pub trait DecadeCycle {
    /// Pillar of decade `index` (0-based).
    fn pillar_at(&self, index: usize) -> Pillar;

    /// Calendar year in which the first decade begins.
    fn onset_year(&self) -> i32;
}

/// Years from birth until the first decade, never negative.
pub fn onset_age(onset_year: i32, birth_year: i32) -> u32 {
    (onset_year as i64 - birth_year as i64).clamp(0, u32::MAX as i64) as u32
}

/// `birth_year + age`, saturating at the i32 bounds.
pub fn year_at_age(birth_year: i32, age: u32) -> i32 {
    (birth_year as i64 + age as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Concrete decade cycle: an explicit pillar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecadeSequence {
    pillars: Vec<Pillar>,
    onset_year: i32,
}

impl DecadeSequence {
    /// Accepts 1..=12 pillars. Lookups past the end return the last pillar.
    pub fn new(pillars: Vec<Pillar>, onset_year: i32) -> Result<Self> {
        if pillars.is_empty() {
            bail!("decade cycle needs at least one pillar");
        }
        if pillars.len() > MAX_DECADES {
            bail!("decade cycle has {} pillars, at most {} allowed", pillars.len(), MAX_DECADES);
        }
        Ok(Self { pillars, onset_year })
    }

    /// Derive the twelve decades by stepping the month pillar through the
    /// sixty-cycle, forward for a yang-year male or yin-year female and
    /// backward otherwise.
    pub fn from_month_pillar(month: Pillar, year_stem: Stem, sex: Sex, onset_year: i32) -> Self {
        let forward = runs_forward(year_stem, sex);
        let advance = if forward { Pillar::next } else { Pillar::prev };
        let pillars = std::iter::successors(Some(advance(month)), |p| Some(advance(*p)))
            .take(MAX_DECADES)
            .collect();
        log_decades(&month.to_string(), forward, MAX_DECADES);
        Self { pillars, onset_year }
    }

    pub fn pillars(&self) -> &[Pillar] {
        &self.pillars
    }

    pub fn len(&self) -> usize {
        self.pillars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }
}

impl DecadeCycle for DecadeSequence {
    fn pillar_at(&self, index: usize) -> Pillar {
        self.pillars[index.min(self.pillars.len() - 1)]
    }

    fn onset_year(&self) -> i32 {
        self.onset_year
    }
}

pub fn runs_forward(year_stem: Stem, sex: Sex) -> bool {
    matches!((year_stem.is_yang(), sex), (true, Sex::Male) | (false, Sex::Female))
}

// =============================================================================
// Chart report
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PillarMarkers {
    pub label: &'static str,
    pub pillar: Pillar,
    pub element: Element,
    pub markers: MarkerSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecadeEntry {
    pub index: usize,
    pub start_age: u32,
    pub start_year: i32,
    pub pillar: Pillar,
    pub markers: MarkerSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub day_master: Element,
    pub onset_age: u32,
    pub pillars: Vec<PillarMarkers>,
    pub decades: Vec<DecadeEntry>,
}

/// Markers of the four natal pillars, each against the day pillar.
pub fn natal_markers(chart: &FourPillars) -> Vec<PillarMarkers> {
    chart
        .labelled()
        .into_iter()
        .map(|(label, pillar)| PillarMarkers {
            label,
            pillar,
            element: pillar.stem.element(),
            markers: evaluate_pillar(chart.day, pillar, label),
        })
        .collect()
}

pub fn chart_report<C: DecadeCycle>(chart: &FourPillars, cycle: &C, birth_year: i32, decade_count: usize) -> ChartReport {
    let onset = onset_age(cycle.onset_year(), birth_year);
    let decades = (0..decade_count.min(MAX_DECADES))
        .map(|index| {
            let pillar = cycle.pillar_at(index);
            let start_age = onset.saturating_add(10 * index as u32);
            DecadeEntry {
                index,
                start_age,
                start_year: year_at_age(birth_year, start_age),
                pillar,
                markers: evaluate_pillar(chart.day, pillar, LABEL_DECADE),
            }
        })
        .collect();
    ChartReport {
        day_master: chart.day_master(),
        onset_age: onset,
        pillars: natal_markers(chart),
        decades,
    }
}
