//! End-to-end properties of the hundred-year projection.

use std::fs;

use bazi_fortune::calendar::Pillar;
use bazi_fortune::chart::{DecadeSequence, FourPillars, Sex};
use bazi_fortune::export::{verify_manifest, write_series, SeriesManifest};
use bazi_fortune::fortune::{
    decade_index, project_fortune, summarize, DecadePhase, FortuneEngine, FortunePoint, HORIZON_YEARS,
};
use tempfile::TempDir;

fn p(s: &str) -> Pillar {
    s.parse().unwrap()
}

fn charts() -> Vec<(FourPillars, i32, i32)> {
    vec![
        (
            FourPillars { year: p("庚午"), month: p("辛巳"), day: p("甲子"), hour: p("丙寅") },
            1990,
            1998,
        ),
        (
            FourPillars { year: p("甲子"), month: p("丙寅"), day: p("戊辰"), hour: p("癸亥") },
            1984,
            1986,
        ),
        (
            FourPillars { year: p("庚午"), month: p("丙午"), day: p("壬午"), hour: p("丙午") },
            1990,
            1985,
        ),
    ]
}

fn cycle_for(chart: &FourPillars, onset_year: i32, sex: Sex) -> DecadeSequence {
    DecadeSequence::from_month_pillar(chart.month, chart.year.stem, sex, onset_year)
}

#[test]
fn series_has_one_point_per_year() {
    for (chart, birth, onset) in charts() {
        let points = project_fortune(&chart, &cycle_for(&chart, onset, Sex::Female), birth);
        assert_eq!(points.len(), HORIZON_YEARS);
        for (i, pt) in points.iter().enumerate() {
            assert_eq!(pt.year, birth + i as i32);
        }
    }
}

#[test]
fn candles_are_ordered_and_bounded() {
    for (chart, birth, onset) in charts() {
        for sex in [Sex::Male, Sex::Female] {
            for pt in project_fortune(&chart, &cycle_for(&chart, onset, sex), birth) {
                assert!(0.0 <= pt.low && pt.low <= pt.open && pt.open <= 100.0, "{:?}", pt);
                assert!(pt.low <= pt.close && pt.close <= 100.0, "{:?}", pt);
                assert!(pt.low <= pt.high && pt.high <= 100.0, "{:?}", pt);
                assert!(pt.open <= pt.high && pt.close <= pt.high, "{:?}", pt);
                assert!((15.0..=95.0).contains(&pt.score), "{:?}", pt);
            }
        }
    }
}

#[test]
fn values_have_two_decimals() {
    let (chart, birth, onset) = charts().remove(0);
    for pt in project_fortune(&chart, &cycle_for(&chart, onset, Sex::Male), birth) {
        for v in [pt.open, pt.close, pt.high, pt.low, pt.score] {
            assert!(((v * 100.0).round() - v * 100.0).abs() < 1e-6, "{}", v);
        }
    }
}

#[test]
fn open_blends_previous_close() {
    for (chart, birth, onset) in charts() {
        let cycle = cycle_for(&chart, onset, Sex::Male);
        let engine = FortuneEngine::new(&chart, &cycle, birth);
        let points = engine.project(HORIZON_YEARS);

        let first = &points[0];
        let expected = 0.3 * engine.base_score() + 0.7 * first.score;
        assert!((first.open - expected).abs() < 0.011, "{:?}", first);

        for pair in points.windows(2) {
            let expected = 0.3 * pair[0].close + 0.7 * pair[1].score;
            assert!((pair[1].open - expected).abs() < 0.011, "{:?} -> {:?}", pair[0], pair[1]);
        }
    }
}

#[test]
fn previous_close_changes_next_open() {
    let (chart, birth, onset) = charts().remove(0);
    let cycle = cycle_for(&chart, onset, Sex::Male);
    let engine = FortuneEngine::new(&chart, &cycle, birth);
    let a = engine.project_year(1, 40.0, false);
    let b = engine.project_year(1, 60.0, false);
    assert_ne!(a.point.open, b.point.open);
    assert_eq!(a.point.score, b.point.score);
    assert_eq!(a.point.close, b.point.close);
}

#[test]
fn close_dips_only_before_a_new_decade() {
    let (chart, birth, onset) = charts().remove(0);
    let cycle = cycle_for(&chart, onset, Sex::Male);
    let engine = FortuneEngine::new(&chart, &cycle, birth);
    let onset_age = engine.onset_age();
    let points = engine.project(HORIZON_YEARS);

    for (age, pt) in points.iter().enumerate() {
        let age = age as u32;
        let here = DecadePhase::at(age, onset_age);
        let handover = here.is_active()
            && (age as usize) + 1 < HORIZON_YEARS
            && decade_index(age + 1, onset_age) != here.index();
        if handover {
            let expected = 0.97 * pt.score;
            assert!((pt.close - expected).abs() < 0.011, "age {} {:?}", age, pt);
        } else {
            assert!((pt.close - pt.score).abs() < 0.011, "age {} {:?}", age, pt);
        }
    }
}

#[test]
fn onset_before_birth_starts_in_first_decade() {
    let (chart, birth, onset) = charts().remove(2);
    assert!(onset < birth);
    let cycle = cycle_for(&chart, onset, Sex::Female);
    let engine = FortuneEngine::new(&chart, &cycle, birth);
    assert_eq!(engine.onset_age(), 0);
    let ctx = engine.year_context(0);
    assert_eq!(ctx.phase, DecadePhase::Active { index: 0, progress: 0 });
    assert_eq!(ctx.decade_pillar, cycle.pillars()[0]);
}

#[test]
fn explicit_short_cycle_reuses_last_pillar() {
    let (chart, birth, onset) = charts().remove(0);
    let cycle = DecadeSequence::new(vec![p("壬午"), p("癸未")], onset).unwrap();
    let engine = FortuneEngine::new(&chart, &cycle, birth);
    let late = engine.year_context(60);
    assert_eq!(late.decade_pillar, p("癸未"));
    assert_eq!(project_fortune(&chart, &cycle, birth).len(), HORIZON_YEARS);
}

#[test]
fn summary_matches_series() {
    let (chart, birth, onset) = charts().remove(1);
    let points = project_fortune(&chart, &cycle_for(&chart, onset, Sex::Male), birth);
    let s = summarize(&points).unwrap();
    let max = points.iter().map(|p| p.score).fold(f64::MIN, f64::max);
    let min = points.iter().map(|p| p.score).fold(f64::MAX, f64::min);
    assert_eq!(s.peak_score, max);
    assert_eq!(s.trough_score, min);
    assert_eq!(s.first_year, birth);
    assert_eq!(s.last_year, birth + 99);
    assert!(s.mean_score >= min && s.mean_score <= max);
}

#[test]
fn export_writes_series_and_manifest() {
    let dir = TempDir::new().unwrap();
    let (chart, birth, onset) = charts().remove(0);
    let points = project_fortune(&chart, &cycle_for(&chart, onset, Sex::Male), birth);

    let manifest = write_series(dir.path(), birth, &points).unwrap();
    assert_eq!(manifest.points, 100);
    assert_eq!(manifest.first_year, 1990);
    assert_eq!(manifest.last_year, 2089);
    assert!(verify_manifest(&manifest).unwrap());

    let back: Vec<FortunePoint> = serde_json::from_str(&fs::read_to_string(&manifest.path).unwrap()).unwrap();
    assert_eq!(back.len(), 100);
    assert_eq!(back[0].year, 1990);

    let mpath = dir.path().join("fortune_1990.manifest.json");
    let stored: SeriesManifest = serde_json::from_str(&fs::read_to_string(mpath).unwrap()).unwrap();
    assert_eq!(stored, manifest);

    fs::write(&manifest.path, "[]").unwrap();
    assert!(!verify_manifest(&manifest).unwrap());
}

fn assert_point(pt: &FortunePoint, expected: (i32, f64, f64, f64, f64, f64)) {
    let (year, open, close, high, low, score) = expected;
    assert_eq!(pt.year, year);
    for (got, want, field) in [
        (pt.open, open, "open"),
        (pt.close, close, "close"),
        (pt.high, high, "high"),
        (pt.low, low, "low"),
        (pt.score, score, "score"),
    ] {
        assert!((got - want).abs() < 1e-6, "{} {}: got {}, want {}", year, field, got, want);
    }
}

#[test]
fn known_series_values() {
    let (chart, birth, onset) = charts().remove(0);
    let points = project_fortune(&chart, &cycle_for(&chart, onset, Sex::Male), birth);

    let expected = [
        // pre-onset, month pillar stands in
        (0, (1990, 54.86, 54.8, 62.8, 51.8, 54.8)),
        (1, (1991, 61.59, 64.5, 72.5, 61.5, 64.5)),
        (2, (1992, 69.05, 71.0, 82.6, 63.0, 71.0)),
        // last year of the first decade closes at 0.97 of its score
        (17, (2007, 58.91, 63.2, 73.15, 58.91, 65.15)),
        // first year of the second decade
        (18, (2008, 76.22, 81.8, 92.2, 73.8, 81.8)),
        (97, (2087, 66.14, 73.09, 83.35, 66.14, 75.35)),
        (99, (2089, 49.28, 46.4, 56.8, 38.4, 46.4)),
    ];
    for (i, want) in expected {
        assert_point(&points[i], want);
    }
}

#[test]
fn known_values_with_short_explicit_cycle() {
    let (chart, birth, onset) = charts().remove(0);
    let cycle = DecadeSequence::new(vec![p("壬午"), p("癸未")], onset).unwrap();
    let points = project_fortune(&chart, &cycle, birth);

    // decade index 3 and 5 both fall back to 癸未
    assert_point(&points[38], (2028, 74.8, 76.9, 87.3, 68.9, 76.9));
    assert_point(&points[60], (2050, 66.25, 66.1, 74.1, 63.1, 66.1));
    assert_point(&points[61], (2051, 74.29, 77.8, 85.8, 74.29, 77.8));
}

#[test]
fn extreme_onset_years_do_not_overflow() {
    let (chart, birth, _) = charts().remove(0);
    for onset in [i32::MIN, i32::MAX] {
        let cycle = cycle_for(&chart, onset, Sex::Male);
        let engine = FortuneEngine::new(&chart, &cycle, birth);
        let points = engine.project(HORIZON_YEARS);
        assert_eq!(points.len(), HORIZON_YEARS);
        let first = DecadePhase::at(0, engine.onset_age());
        if onset == i32::MIN {
            assert_eq!(first, DecadePhase::Active { index: 0, progress: 0 });
        } else {
            assert_eq!(first, DecadePhase::PreOnset);
            assert!(points.iter().all(|pt| (15.0..=95.0).contains(&pt.score)));
        }
    }
}
