//! Hundred-year fortune projection.
//!
//! Each year combines three layers against the day master: the active
//! decade pillar (DaYun), the calendar year pillar (LiuNian), and the
//! chart's elemental balance. The composite score is then turned into an
//! open/high/low/close candle that carries the previous year's close
//! forward.
//!
//! Every additive term is its own function so it can be checked in
//! isolation; [`ScoreBreakdown`] records them for logging.

use serde::{Deserialize, Serialize};

use crate::calendar::{year_pillar, Branch, Element, Pillar, Stem};
use crate::chart::{onset_age, year_at_age, DecadeCycle, FourPillars, LABEL_ANNUAL, LABEL_DECADE, MAX_DECADES};
use crate::export::series_digest;
use crate::logging::{log_audit, log_projection_done, log_projection_start, log_year_breakdown, ProfileScope};
use crate::power::ElementalPower;
use crate::relations::{branches_clash, branches_unite, relation_score, stems_clash, stems_combine};
use crate::shensha::{evaluate_pillar, MarkerSet};

pub const HORIZON_YEARS: usize = 100;
pub const LAST_DECADE_INDEX: usize = MAX_DECADES - 1;

pub const SCORE_MIN: f64 = 15.0;
pub const SCORE_MAX: f64 = 95.0;

/// Half-width of the intra-year band before relationship widening.
const BAND: f64 = 8.0;
const BAND_RELATION_FACTOR: f64 = 0.3;
/// Dampening applied to the close when the next year opens a new decade.
const HANDOVER_FACTOR: f64 = 0.9;
const CARRY_WEIGHT: f64 = 0.3;
const SCORE_WEIGHT: f64 = 0.7;

// =============================================================================
// Decade selection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DecadePhase {
    /// Before onset; the month pillar stands in for the decade.
    PreOnset,
    /// `progress` is the year within the decade, 0..=9 (or beyond for the capped last decade).
    Active { index: usize, progress: u32 },
}

impl DecadePhase {
    pub fn at(age: u32, onset_age: u32) -> Self {
        if age < onset_age {
            return DecadePhase::PreOnset;
        }
        let since = age - onset_age;
        DecadePhase::Active {
            index: ((since / 10) as usize).min(LAST_DECADE_INDEX),
            progress: since % 10,
        }
    }

    pub fn index(self) -> Option<usize> {
        match self {
            DecadePhase::PreOnset => None,
            DecadePhase::Active { index, .. } => Some(index),
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, DecadePhase::Active { .. })
    }
}

/// Decade index for an age, `None` before onset, capped at the twelfth decade.
pub fn decade_index(age: u32, onset_age: u32) -> Option<usize> {
    DecadePhase::at(age, onset_age).index()
}

// =============================================================================
// Score terms
// =============================================================================

pub fn decade_stem_term(day: Element, decade_stem: Stem, active: bool) -> f64 {
    let weight = if active { 0.25 } else { 0.12 };
    relation_score(day, decade_stem.element()) * weight
}

pub fn decade_branch_term(day: Element, decade_branch: Branch, active: bool) -> f64 {
    let weight = if active { 0.20 } else { 0.10 };
    relation_score(day, decade_branch.element()) * weight
}

pub fn year_stem_term(day: Element, year_stem: Stem) -> f64 {
    relation_score(day, year_stem.element()) * 0.15
}

pub fn year_branch_term(day: Element, year_branch: Branch) -> f64 {
    relation_score(day, year_branch.element()) * 0.10
}

/// Decade stem against year stem.
pub fn stem_interaction(decade: Stem, year: Stem) -> f64 {
    let mut score = 0.0;
    if stems_combine(decade, year) {
        score += 7.0;
    }
    if stems_clash(decade, year) {
        score -= 7.0;
    }
    score
}

/// Decade branch against year branch.
pub fn branch_interaction(decade: Branch, year: Branch) -> f64 {
    let mut score = 0.0;
    if branches_unite(decade, year) {
        score += 5.0;
    }
    if branches_clash(decade, year) {
        score -= 9.0;
    }
    score
}

/// Year branch against the day branch.
pub fn day_branch_interaction(year: Branch, day: Branch) -> f64 {
    let mut score = 0.0;
    if branches_clash(year, day) {
        score -= 6.0;
    }
    if branches_unite(year, day) {
        score += 4.0;
    }
    score
}

pub fn decade_marker_term(markers: &MarkerSet) -> f64 {
    markers.score() * 0.6
}

pub fn year_marker_term(markers: &MarkerSet) -> f64 {
    markers.score() * 0.8
}

pub fn balance_term(power: &ElementalPower, year_stem: Stem) -> f64 {
    power.balance_adjustment(year_stem.element()) * 0.3
}

/// The first half of a decade is ruled by its stem, the second by its branch.
pub fn decade_progress_term(phase: DecadePhase) -> f64 {
    match phase {
        DecadePhase::Active { progress, .. } if progress < 5 => 1.5,
        DecadePhase::Active { .. } => 0.8,
        DecadePhase::PreOnset => 0.0,
    }
}

/// Life-stage baseline, 0..=10.
pub fn age_band(age: u32) -> f64 {
    match age {
        0..=9 => 5.0,
        10..=19 => 3.0,
        20..=29 => 8.0,
        30..=39 => 10.0,
        40..=49 => 6.0,
        50..=59 => 4.0,
        60..=69 => 2.0,
        _ => 0.0,
    }
}

pub fn age_band_term(age: u32) -> f64 {
    age_band(age) * 0.3
}

/// Penalty for the first year of every decade after the first.
pub fn transition_term(phase: DecadePhase) -> f64 {
    match phase {
        DecadePhase::Active { index, progress: 0 } if index > 0 => -4.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub decade_stem: f64,
    pub decade_branch: f64,
    pub year_stem: f64,
    pub year_branch: f64,
    pub stem_interaction: f64,
    pub branch_interaction: f64,
    pub day_branch_interaction: f64,
    pub decade_markers: f64,
    pub year_markers: f64,
    pub balance: f64,
    pub decade_progress: f64,
    pub age_band: f64,
    pub transition: f64,
}

impl ScoreBreakdown {
    /// Sum of all terms before clamping.
    pub fn raw(&self) -> f64 {
        self.base
            + self.decade_stem
            + self.decade_branch
            + self.year_stem
            + self.year_branch
            + self.stem_interaction
            + self.branch_interaction
            + self.day_branch_interaction
            + self.decade_markers
            + self.year_markers
            + self.balance
            + self.decade_progress
            + self.age_band
            + self.transition
    }

    pub fn composite(&self) -> f64 {
        self.raw().clamp(SCORE_MIN, SCORE_MAX)
    }
}

// =============================================================================
// Candles
// =============================================================================

/// Distance of the intra-year high and low from the composite score.
/// A favourable year-stem relation lifts the high; an unfavourable one
/// replaces the default low with a proportional dip.
pub fn band_offsets(relation: f64) -> (f64, f64) {
    let high = if relation > 0.0 { BAND + relation * BAND_RELATION_FACTOR } else { BAND };
    let low = if relation < 0.0 { relation * BAND_RELATION_FACTOR } else { -BAND };
    (high, low)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Build one year's candle. Values are clamped to `[0, 100]` and the
/// high/low are widened to contain open and close.
pub fn build_candle(prev_close: f64, composite: f64, next_base: f64, relation: f64) -> Candle {
    let (high_off, low_off) = band_offsets(relation);
    let open = (prev_close * CARRY_WEIGHT + composite * SCORE_WEIGHT).clamp(0.0, 100.0);
    let close = (composite * SCORE_WEIGHT + next_base * CARRY_WEIGHT).clamp(0.0, 100.0);
    let mut high = (composite + high_off).clamp(0.0, 100.0);
    let mut low = (composite + low_off).clamp(0.0, 100.0);

    high = high.max(open).max(close);
    low = low.min(open).min(close);
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }
    Candle { open, high, low, close }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FortunePoint {
    pub year: i32,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub score: f64,
}

impl FortunePoint {
    fn from_candle(year: i32, candle: Candle, score: f64) -> Self {
        Self {
            year,
            open: round2(candle.open),
            close: round2(candle.close),
            high: round2(candle.high),
            low: round2(candle.low),
            score: round2(score.clamp(0.0, 100.0)),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Everything a single year needs to be scored.
#[derive(Debug, Clone)]
pub struct YearContext {
    pub age: u32,
    pub year: i32,
    pub phase: DecadePhase,
    pub decade_pillar: Pillar,
    pub year_pillar: Pillar,
    pub decade_markers: MarkerSet,
    pub year_markers: MarkerSet,
}

#[derive(Debug, Clone)]
pub struct YearOutcome {
    pub point: FortunePoint,
    pub breakdown: ScoreBreakdown,
    /// Unrounded close carried into the next year.
    pub close: f64,
}

/// Chart-derived inputs fixed for the whole projection.
pub struct FortuneEngine<'a, C: DecadeCycle> {
    chart: &'a FourPillars,
    cycle: &'a C,
    birth_year: i32,
    power: ElementalPower,
    base_score: f64,
    onset_age: u32,
}

impl<'a, C: DecadeCycle> FortuneEngine<'a, C> {
    pub fn new(chart: &'a FourPillars, cycle: &'a C, birth_year: i32) -> Self {
        let power = ElementalPower::from_chart(chart);
        let base_score = power.base_score(chart.day_master());
        Self {
            chart,
            cycle,
            birth_year,
            power,
            base_score,
            onset_age: onset_age(cycle.onset_year(), birth_year),
        }
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn onset_age(&self) -> u32 {
        self.onset_age
    }

    pub fn power(&self) -> &ElementalPower {
        &self.power
    }

    pub fn year_context(&self, age: u32) -> YearContext {
        let phase = DecadePhase::at(age, self.onset_age);
        let decade_pillar = match phase {
            DecadePhase::PreOnset => self.chart.month,
            DecadePhase::Active { index, .. } => self.cycle.pillar_at(index),
        };
        let year = year_at_age(self.birth_year, age);
        let annual = year_pillar(year);
        YearContext {
            age,
            year,
            phase,
            decade_pillar,
            year_pillar: annual,
            decade_markers: evaluate_pillar(self.chart.day, decade_pillar, LABEL_DECADE),
            year_markers: evaluate_pillar(self.chart.day, annual, LABEL_ANNUAL),
        }
    }

    pub fn score(&self, ctx: &YearContext) -> ScoreBreakdown {
        let day = self.chart.day_master();
        let active = ctx.phase.is_active();
        let decade = ctx.decade_pillar;
        let annual = ctx.year_pillar;
        ScoreBreakdown {
            base: self.base_score,
            decade_stem: decade_stem_term(day, decade.stem, active),
            decade_branch: decade_branch_term(day, decade.branch, active),
            year_stem: year_stem_term(day, annual.stem),
            year_branch: year_branch_term(day, annual.branch),
            stem_interaction: stem_interaction(decade.stem, annual.stem),
            branch_interaction: branch_interaction(decade.branch, annual.branch),
            day_branch_interaction: day_branch_interaction(annual.branch, self.chart.day.branch),
            decade_markers: decade_marker_term(&ctx.decade_markers),
            year_markers: year_marker_term(&ctx.year_markers),
            balance: balance_term(&self.power, annual.stem),
            decade_progress: decade_progress_term(ctx.phase),
            age_band: age_band_term(ctx.age),
            transition: transition_term(ctx.phase),
        }
    }

    /// Score one year and build its candle. `is_last` suppresses the
    /// look-ahead to the following decade.
    pub fn project_year(&self, age: u32, prev_close: f64, is_last: bool) -> YearOutcome {
        let ctx = self.year_context(age);
        let breakdown = self.score(&ctx);
        let composite = breakdown.composite();

        let mut next_base = composite;
        if !is_last && ctx.phase.is_active() {
            let next = DecadePhase::at(age + 1, self.onset_age);
            if next.index() != ctx.phase.index() {
                next_base = composite * HANDOVER_FACTOR;
            }
        }

        let relation = relation_score(self.chart.day_master(), ctx.year_pillar.stem.element());
        let candle = build_candle(prev_close, composite, next_base, relation);
        log_year_breakdown(ctx.year, &ctx.decade_pillar.to_string(), &ctx.year_pillar.to_string(), &breakdown, composite);

        YearOutcome {
            point: FortunePoint::from_candle(ctx.year, candle, composite),
            breakdown,
            close: candle.close,
        }
    }

    pub fn project(&self, horizon: usize) -> Vec<FortunePoint> {
        let _scope = ProfileScope::new("fortune", "project");
        log_projection_start(self.birth_year, &self.chart.day.to_string(), self.base_score, self.onset_age, horizon);

        let mut points = Vec::with_capacity(horizon);
        let mut prev_close = self.base_score;
        for age in 0..horizon {
            let outcome = self.project_year(age as u32, prev_close, age + 1 == horizon);
            prev_close = outcome.close;
            points.push(outcome.point);
        }

        if let Some(summary) = summarize(&points) {
            log_projection_done(&summary);
        }
        log_audit("fortune_series", &series_digest(&points));
        points
    }
}

/// Hundred-year series starting at the birth year.
pub fn project_fortune<C: DecadeCycle>(chart: &FourPillars, cycle: &C, birth_year: i32) -> Vec<FortunePoint> {
    FortuneEngine::new(chart, cycle, birth_year).project(HORIZON_YEARS)
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FortuneSummary {
    pub first_year: i32,
    pub last_year: i32,
    pub peak_year: i32,
    pub peak_score: f64,
    pub trough_year: i32,
    pub trough_score: f64,
    pub mean_score: f64,
    /// Years closing above their open.
    pub rising_years: usize,
}

/// Earliest year wins ties for peak and trough.
pub fn summarize(points: &[FortunePoint]) -> Option<FortuneSummary> {
    let first = points.first()?;
    let last = points.last()?;
    let mut peak = first;
    let mut trough = first;
    for p in points {
        if p.score > peak.score {
            peak = p;
        }
        if p.score < trough.score {
            trough = p;
        }
    }
    let mean = points.iter().map(|p| p.score).sum::<f64>() / points.len() as f64;
    Some(FortuneSummary {
        first_year: first.year,
        last_year: last.year,
        peak_year: peak.year,
        peak_score: peak.score,
        trough_year: trough.year,
        trough_score: trough.score,
        mean_score: round2(mean),
        rising_years: points.iter().filter(|p| p.close > p.open).count(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{DecadeSequence, Sex};

    fn p(s: &str) -> Pillar {
        s.parse().unwrap()
    }

    fn sample_chart() -> FourPillars {
        FourPillars {
            year: p("庚午"),
            month: p("辛巳"),
            day: p("甲子"),
            hour: p("丙寅"),
        }
    }

    fn sample_cycle(onset_year: i32) -> DecadeSequence {
        let chart = sample_chart();
        DecadeSequence::from_month_pillar(chart.month, chart.year.stem, Sex::Male, onset_year)
    }

    #[test]
    fn test_decade_index_selection() {
        assert_eq!(decade_index(5, 6), None);
        for age in 6..=15 {
            assert_eq!(decade_index(age, 6), Some(0));
        }
        for age in 16..=25 {
            assert_eq!(decade_index(age, 6), Some(1));
        }
        assert_eq!(decade_index(126, 6), Some(11));
        assert_eq!(decade_index(400, 6), Some(11));
    }

    #[test]
    fn test_phase_progress() {
        assert_eq!(DecadePhase::at(13, 8), DecadePhase::Active { index: 0, progress: 5 });
        assert_eq!(DecadePhase::at(18, 8), DecadePhase::Active { index: 1, progress: 0 });
        assert_eq!(DecadePhase::at(7, 8), DecadePhase::PreOnset);
    }

    #[test]
    fn test_age_band_steps() {
        assert_eq!(age_band(0), 5.0);
        assert_eq!(age_band(19), 3.0);
        assert_eq!(age_band(25), 8.0);
        assert_eq!(age_band(39), 10.0);
        assert_eq!(age_band(45), 6.0);
        assert_eq!(age_band(55), 4.0);
        assert_eq!(age_band(69), 2.0);
        assert_eq!(age_band(70), 0.0);
        assert!((age_band_term(35) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_progress_and_transition_terms() {
        let pre = DecadePhase::PreOnset;
        let first_year = DecadePhase::Active { index: 0, progress: 0 };
        let handover = DecadePhase::Active { index: 3, progress: 0 };
        let late = DecadePhase::Active { index: 3, progress: 7 };
        assert_eq!(decade_progress_term(pre), 0.0);
        assert_eq!(decade_progress_term(first_year), 1.5);
        assert_eq!(decade_progress_term(late), 0.8);
        assert_eq!(transition_term(first_year), 0.0);
        assert_eq!(transition_term(handover), -4.0);
        assert_eq!(transition_term(late), 0.0);
        assert_eq!(transition_term(pre), 0.0);
    }

    #[test]
    fn test_relationship_terms_use_weights() {
        let day = Element::Wood;
        // 壬 water feeds wood: 12
        let ren: Stem = "壬".parse().unwrap();
        assert!((decade_stem_term(day, ren, true) - 3.0).abs() < 1e-12);
        assert!((decade_stem_term(day, ren, false) - 1.44).abs() < 1e-12);
        assert!((year_stem_term(day, ren) - 1.8).abs() < 1e-12);
        // 申 metal subdues wood: -10
        let shen: Branch = "申".parse().unwrap();
        assert!((decade_branch_term(day, shen, true) + 2.0).abs() < 1e-12);
        assert!((decade_branch_term(day, shen, false) + 1.0).abs() < 1e-12);
        assert!((year_branch_term(day, shen) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pair_interactions() {
        let s = |g: &str| g.parse::<Stem>().unwrap();
        let b = |g: &str| g.parse::<Branch>().unwrap();
        assert_eq!(stem_interaction(s("甲"), s("己")), 7.0);
        assert_eq!(stem_interaction(s("甲"), s("戊")), -7.0);
        assert_eq!(stem_interaction(s("甲"), s("乙")), 0.0);
        assert_eq!(branch_interaction(b("子"), b("丑")), 5.0);
        assert_eq!(branch_interaction(b("子"), b("午")), -9.0);
        assert_eq!(day_branch_interaction(b("午"), b("子")), -6.0);
        assert_eq!(day_branch_interaction(b("丑"), b("子")), 4.0);
    }

    #[test]
    fn test_balance_term_for_thin_element() {
        // Day 甲, chart without earth: a 戊 year reinforces a thin element
        let power = ElementalPower::from_chart(&sample_chart());
        let wu: Stem = "戊".parse().unwrap();
        assert!((balance_term(&power, wu) - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_band_offsets() {
        let close = |(h, l): (f64, f64), (eh, el): (f64, f64)| (h - eh).abs() < 1e-9 && (l - el).abs() < 1e-9;
        assert!(close(band_offsets(12.0), (11.6, -8.0)));
        assert!(close(band_offsets(6.0), (9.8, -8.0)));
        assert!(close(band_offsets(-10.0), (8.0, -3.0)));
        assert!(close(band_offsets(-3.0), (8.0, -0.9)));
        assert_eq!(band_offsets(0.0), (8.0, -8.0));
    }

    #[test]
    fn test_candle_is_ordered_and_bounded() {
        for &(prev, composite, next, rel) in &[
            (50.0, 60.0, 60.0, 12.0),
            (95.0, 95.0, 85.5, 12.0),
            (15.0, 15.0, 15.0, -10.0),
            (90.0, 20.0, 18.0, -3.0),
            (10.0, 80.0, 80.0, 8.0),
        ] {
            let c = build_candle(prev, composite, next, rel);
            for v in [c.open, c.high, c.low, c.close] {
                assert!((0.0..=100.0).contains(&v));
            }
            assert!(c.low <= c.open && c.open <= c.high);
            assert!(c.low <= c.close && c.close <= c.high);
        }
    }

    #[test]
    fn test_candle_carries_previous_close() {
        let a = build_candle(40.0, 60.0, 60.0, 6.0);
        let b = build_candle(70.0, 60.0, 60.0, 6.0);
        assert!((a.open - 54.0).abs() < 1e-9);
        assert!((b.open - 63.0).abs() < 1e-9);
        assert_eq!(a.close, b.close);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_000_1), 1.24);
        assert_eq!(round2(-0.004), -0.0);
    }

    #[test]
    fn test_pre_onset_year_uses_month_pillar() {
        let chart = sample_chart();
        let cycle = sample_cycle(2020);
        let engine = FortuneEngine::new(&chart, &cycle, 1990);
        assert_eq!(engine.onset_age(), 30);
        let ctx = engine.year_context(25);
        assert_eq!(ctx.phase, DecadePhase::PreOnset);
        assert_eq!(ctx.decade_pillar, chart.month);
        assert_eq!(ctx.year, 2015);
        assert_eq!(ctx.year_pillar.to_string(), "乙未");
    }

    #[test]
    fn test_breakdown_sums_to_composite() {
        let chart = sample_chart();
        let cycle = sample_cycle(1998);
        let engine = FortuneEngine::new(&chart, &cycle, 1990);
        assert_eq!(engine.base_score(), 55.0);
        for age in [0, 8, 18, 44, 99] {
            let ctx = engine.year_context(age);
            let b = engine.score(&ctx);
            assert_eq!(b.base, 55.0);
            assert_eq!(b.composite(), b.raw().clamp(SCORE_MIN, SCORE_MAX));
            assert!((SCORE_MIN..=SCORE_MAX).contains(&b.composite()));
        }
    }

    #[test]
    fn test_series_shape() {
        let chart = sample_chart();
        let cycle = sample_cycle(1998);
        let points = FortuneEngine::new(&chart, &cycle, 1990).project(HORIZON_YEARS);
        assert_eq!(points.len(), 100);
        assert_eq!(points[0].year, 1990);
        assert_eq!(points[99].year, 2089);
        for pt in &points {
            assert!(pt.low <= pt.open && pt.open <= pt.high, "{:?}", pt);
            assert!(pt.low <= pt.close && pt.close <= pt.high, "{:?}", pt);
            assert!(pt.high <= 100.0 && pt.low >= 0.0);
            assert!((SCORE_MIN..=SCORE_MAX).contains(&pt.score));
        }
    }

    #[test]
    fn test_projection_is_deterministic() {
        let chart = sample_chart();
        let cycle = sample_cycle(1998);
        let a = project_fortune(&chart, &cycle, 1990);
        let b = project_fortune(&chart, &cycle, 1990);
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary() {
        let pts = vec![
            FortunePoint { year: 2000, open: 50.0, close: 55.0, high: 60.0, low: 45.0, score: 52.0 },
            FortunePoint { year: 2001, open: 55.0, close: 50.0, high: 62.0, low: 48.0, score: 70.0 },
            FortunePoint { year: 2002, open: 50.0, close: 52.0, high: 58.0, low: 40.0, score: 40.0 },
        ];
        let s = summarize(&pts).unwrap();
        assert_eq!(s.peak_year, 2001);
        assert_eq!(s.trough_year, 2002);
        assert_eq!(s.rising_years, 2);
        assert_eq!(s.mean_score, 54.0);
        assert!(summarize(&[]).is_none());
    }
}
