//! ShenSha marker classifier.
//!
//! Each marker is a fixed lookup keyed on the reference (day) stem or
//! branch and tested against a target pillar. Every rule is evaluated on
//! every call; a pillar can carry several markers at once.
//!
//! Marker metadata (display name, weight, polarity) lives in one table,
//! [`MARKERS`], and every aggregate on [`MarkerSet`] is derived from it.

use std::fmt;

use serde::Serialize;

use crate::calendar::{Branch, Pillar, Stem, Trine};
use crate::logging::log_markers;

// =============================================================================
// Marker catalogue
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Nobleman,
    VirtueHeaven,
    VirtueMoon,
    LiteraryStar,
    SalaryStar,
    BladeYang,
    GeneralStar,
    Canopy,
    PeachBlossom,
    LoneStar,
    WidowStar,
    RobberyEvil,
    DeathSpirit,
    HeavenNet,
    TravelingHorse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Auspicious,
    Inauspicious,
    Mixed,
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerSpec {
    pub marker: Marker,
    pub name: &'static str,
    /// Contribution to the marker-weighted score.
    pub weight: f64,
    /// Class used by the has-any queries.
    pub polarity: Polarity,
    /// Class used by the weighted counts. Never `Mixed`: the three mixed
    /// markers are tallied on one side or the other.
    pub tally: Polarity,
}

const fn spec(marker: Marker, name: &'static str, weight: f64, polarity: Polarity, tally: Polarity) -> MarkerSpec {
    MarkerSpec { marker, name, weight, polarity, tally }
}

use Polarity::{Auspicious as A, Inauspicious as I, Mixed as M};

/// Table order is evaluation order, which is also display order.
pub static MARKERS: [MarkerSpec; 15] = [
    spec(Marker::Nobleman, "天乙贵人", 12.0, A, A),
    spec(Marker::VirtueHeaven, "天德贵人", 10.0, A, A),
    spec(Marker::VirtueMoon, "月德贵人", 9.0, A, A),
    spec(Marker::LiteraryStar, "文昌贵人", 8.0, A, A),
    spec(Marker::SalaryStar, "禄神", 8.0, A, A),
    spec(Marker::BladeYang, "羊刃", -8.0, I, I),
    spec(Marker::GeneralStar, "将星", 6.0, A, A),
    spec(Marker::Canopy, "华盖", 4.0, M, A),
    spec(Marker::PeachBlossom, "桃花", 3.0, M, I),
    spec(Marker::LoneStar, "孤辰", -6.0, I, I),
    spec(Marker::WidowStar, "寡宿", -6.0, I, I),
    spec(Marker::RobberyEvil, "劫煞", -7.0, I, I),
    spec(Marker::DeathSpirit, "亡神", -7.0, I, I),
    spec(Marker::HeavenNet, "天罗地网", -9.0, I, I),
    spec(Marker::TravelingHorse, "驿马", 5.0, M, A),
];

/// Bonus when both noble virtues land on the same pillar.
const DOUBLE_NOBLE_BONUS: f64 = 5.0;
const MARKER_SCORE_MIN: f64 = -20.0;
const MARKER_SCORE_MAX: f64 = 30.0;

impl Marker {
    pub fn spec(self) -> &'static MarkerSpec {
        // MARKERS is declared in variant order.
        &MARKERS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn weight(self) -> f64 {
        self.spec().weight
    }

    pub fn polarity(self) -> Polarity {
        self.spec().polarity
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Rule tables
// =============================================================================

// Stem-keyed: indexed by reference stem value, yields target branch values.
const NOBLEMAN: [[u8; 2]; 10] = [
    [1, 7],  // 甲: 丑未
    [0, 8],  // 乙: 子申
    [11, 9], // 丙: 亥酉
    [11, 9], // 丁
    [1, 7],  // 戊
    [0, 8],  // 己
    [1, 7],  // 庚
    [6, 2],  // 辛: 午寅
    [3, 5],  // 壬: 卯巳
    [3, 5],  // 癸
];
const LITERARY: [u8; 10] = [5, 6, 8, 9, 8, 9, 11, 0, 2, 3];
const SALARY: [u8; 10] = [2, 3, 5, 6, 5, 6, 8, 9, 11, 0];
const BLADE: [u8; 10] = [3, 2, 6, 5, 6, 5, 9, 8, 0, 11];

// Branch-keyed: indexed by reference branch value, yields a target stem value.
const VIRTUE_HEAVEN: [u8; 12] = [0, 4, 3, 8, 9, 8, 2, 1, 0, 5, 8, 6];

// Trine-keyed rows, ordered [water, metal, fire, wood].
const VIRTUE_MOON: [u8; 4] = [8, 6, 2, 0];
const GENERAL: [u8; 4] = [0, 9, 6, 3];
const CANOPY: [u8; 4] = [4, 1, 10, 7];
const PEACH: [u8; 4] = [9, 6, 3, 0];
const ROBBERY: [u8; 4] = [5, 8, 11, 2];
const DEATH: [u8; 4] = [11, 2, 5, 8];
const HORSE: [u8; 4] = [2, 11, 8, 5];

// Seasonal groups 亥子丑, 寅卯辰, 巳午未, 申酉戌 -> (lone, widow) target branches.
const LONE_WIDOW: [(u8, u8); 4] = [(2, 10), (5, 1), (8, 4), (11, 7)];

const NET_BRANCHES: [u8; 2] = [4, 10];

fn trine_slot(t: Trine) -> usize {
    match t {
        Trine::Water => 0,
        Trine::Metal => 1,
        Trine::Fire => 2,
        Trine::Wood => 3,
    }
}

fn season_slot(b: Branch) -> usize {
    ((b.value() as usize + 1) % 12) / 3
}

fn trine_hit(row: &[u8; 4], reference: Branch, target: Branch) -> bool {
    row[trine_slot(reference.trine())] == target.value()
}

// =============================================================================
// Individual rules
// =============================================================================

pub fn is_nobleman(day_stem: Stem, target: Branch) -> bool {
    NOBLEMAN[day_stem.value() as usize].contains(&target.value())
}

pub fn is_virtue_heaven(reference: Branch, target: Stem) -> bool {
    VIRTUE_HEAVEN[reference.value() as usize] == target.value()
}

pub fn is_virtue_moon(reference: Branch, target: Stem) -> bool {
    VIRTUE_MOON[trine_slot(reference.trine())] == target.value()
}

pub fn is_literary_star(day_stem: Stem, target: Branch) -> bool {
    LITERARY[day_stem.value() as usize] == target.value()
}

pub fn is_salary_star(day_stem: Stem, target: Branch) -> bool {
    SALARY[day_stem.value() as usize] == target.value()
}

pub fn is_blade_yang(day_stem: Stem, target: Branch) -> bool {
    BLADE[day_stem.value() as usize] == target.value()
}

pub fn is_general_star(reference: Branch, target: Branch) -> bool {
    trine_hit(&GENERAL, reference, target)
}

pub fn is_canopy(reference: Branch, target: Branch) -> bool {
    trine_hit(&CANOPY, reference, target)
}

pub fn is_peach_blossom(reference: Branch, target: Branch) -> bool {
    trine_hit(&PEACH, reference, target)
}

/// Returns `(lone_star, widow_star)`.
pub fn lone_widow(reference: Branch, target: Branch) -> (bool, bool) {
    let (lone, widow) = LONE_WIDOW[season_slot(reference)];
    (lone == target.value(), widow == target.value())
}

pub fn is_robbery_evil(reference: Branch, target: Branch) -> bool {
    trine_hit(&ROBBERY, reference, target)
}

pub fn is_death_spirit(reference: Branch, target: Branch) -> bool {
    trine_hit(&DEATH, reference, target)
}

/// 辰 is the heaven net, 戌 the earth snare; no reference needed.
pub fn is_heaven_net(target: Branch) -> bool {
    NET_BRANCHES.contains(&target.value())
}

pub fn is_traveling_horse(reference: Branch, target: Branch) -> bool {
    trine_hit(&HORSE, reference, target)
}

// =============================================================================
// Classifier
// =============================================================================

/// Evaluate every marker rule for `target_stem`/`target_branch` against the
/// day stem and branch. `label` names the pillar kind for logging only.
pub fn evaluate_markers(
    day_stem: Stem,
    day_branch: Branch,
    target_stem: Stem,
    target_branch: Branch,
    label: &str,
) -> MarkerSet {
    let mut set = MarkerSet::new();
    let checks = [
        (Marker::Nobleman, is_nobleman(day_stem, target_branch)),
        (Marker::VirtueHeaven, is_virtue_heaven(day_branch, target_stem)),
        (Marker::VirtueMoon, is_virtue_moon(day_branch, target_stem)),
        (Marker::LiteraryStar, is_literary_star(day_stem, target_branch)),
        (Marker::SalaryStar, is_salary_star(day_stem, target_branch)),
        (Marker::BladeYang, is_blade_yang(day_stem, target_branch)),
        (Marker::GeneralStar, is_general_star(day_branch, target_branch)),
        (Marker::Canopy, is_canopy(day_branch, target_branch)),
        (Marker::PeachBlossom, is_peach_blossom(day_branch, target_branch)),
    ];
    for (marker, hit) in checks {
        if hit {
            set.insert(marker);
        }
    }

    let (lone, widow) = lone_widow(day_branch, target_branch);
    if lone {
        set.insert(Marker::LoneStar);
    }
    if widow {
        set.insert(Marker::WidowStar);
    }

    let tail = [
        (Marker::RobberyEvil, is_robbery_evil(day_branch, target_branch)),
        (Marker::DeathSpirit, is_death_spirit(day_branch, target_branch)),
        (Marker::HeavenNet, is_heaven_net(target_branch)),
        (Marker::TravelingHorse, is_traveling_horse(day_branch, target_branch)),
    ];
    for (marker, hit) in tail {
        if hit {
            set.insert(marker);
        }
    }

    log_markers(label, &Pillar::new(target_stem, target_branch).to_string(), &set.names());
    set
}

/// Convenience wrapper taking pillars.
pub fn evaluate_pillar(day: Pillar, target: Pillar, label: &str) -> MarkerSet {
    evaluate_markers(day.stem, day.branch, target.stem, target.branch, label)
}

// =============================================================================
// MarkerSet
// =============================================================================

/// Insertion-ordered set of markers without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "MarkerSummary")]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self { markers: Vec::new() }
    }

    /// Returns false if the marker was already present.
    pub fn insert(&mut self, marker: Marker) -> bool {
        if self.markers.contains(&marker) {
            return false;
        }
        self.markers.push(marker);
        true
    }

    pub fn extend(&mut self, other: &MarkerSet) {
        for m in other.iter() {
            self.insert(m);
        }
    }

    pub fn contains(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    pub fn iter(&self) -> impl Iterator<Item = Marker> + '_ {
        self.markers.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.markers.iter().map(|m| m.name()).collect()
    }

    pub fn count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn has_auspicious(&self) -> bool {
        self.iter().any(|m| m.polarity() == Polarity::Auspicious)
    }

    pub fn has_inauspicious(&self) -> bool {
        self.iter().any(|m| m.polarity() == Polarity::Inauspicious)
    }

    pub fn auspicious_count(&self) -> usize {
        self.iter().filter(|m| m.spec().tally == Polarity::Auspicious).count()
    }

    pub fn inauspicious_count(&self) -> usize {
        self.iter().filter(|m| m.spec().tally == Polarity::Inauspicious).count()
    }

    /// Marker-weighted score in `[-20, 30]`.
    pub fn score(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut score: f64 = self.iter().map(|m| m.weight()).sum();
        if self.contains(Marker::Nobleman) && self.contains(Marker::VirtueHeaven) {
            score += DOUBLE_NOBLE_BONUS;
        }
        let good = self.auspicious_count();
        let bad = self.inauspicious_count();
        if good > bad && good >= 2 {
            score += (good - bad) as f64 * 2.0;
        }
        score.clamp(MARKER_SCORE_MIN, MARKER_SCORE_MAX)
    }
}

impl fmt::Display for MarkerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(" "))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerSummary {
    pub names: Vec<&'static str>,
    pub markers: Vec<Marker>,
    pub count: usize,
    pub has_auspicious: bool,
    pub has_inauspicious: bool,
    pub auspicious_count: usize,
    pub inauspicious_count: usize,
    pub score: f64,
}

impl From<MarkerSet> for MarkerSummary {
    fn from(set: MarkerSet) -> Self {
        Self {
            names: set.names(),
            count: set.count(),
            has_auspicious: set.has_auspicious(),
            has_inauspicious: set.has_inauspicious(),
            auspicious_count: set.auspicious_count(),
            inauspicious_count: set.inauspicious_count(),
            score: set.score(),
            markers: set.markers,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
