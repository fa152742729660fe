//! Chart requests: JSON schema, validation and resolution into a chart
//! plus decade cycle.
//!
//! Calendar conversion is not done here. A request carries the birth
//! moment for reference together with the four pillars and the decade
//! onset year already resolved by a calendar service.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::calendar::Pillar;
use crate::chart::{DecadeSequence, FourPillars, Sex};
use crate::config::Config;
use crate::logging::log_input_rejected;

/// Latest accepted decade onset, in years after birth.
pub const MAX_ONSET_AGE: i64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
    /// 1 male, 0 female.
    pub sex: i32,
    pub pillars: FourPillars,
    /// Calendar year the first decade begins.
    pub onset_year: i32,
    /// Explicit decade pillars. Derived from the month pillar when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decades: Option<Vec<Pillar>>,
}

/// A validated request ready for projection.
#[derive(Debug, Clone)]
pub struct ResolvedChart {
    pub birth_year: i32,
    pub sex: Sex,
    pub chart: FourPillars,
    pub cycle: DecadeSequence,
}

impl ChartRequest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid chart request")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn validate(&self, cfg: &Config) -> Result<()> {
        let checked = self.check(cfg);
        if let Err(err) = &checked {
            log_input_rejected("chart_request", &err.to_string());
        }
        checked
    }

    fn check(&self, cfg: &Config) -> Result<()> {
        if !cfg.year_in_range(self.year) {
            bail!("year must be between {} and {}, got {}", cfg.min_year, cfg.max_year, self.year);
        }
        if !(1..=12).contains(&self.month) {
            bail!("month must be between 1 and 12, got {}", self.month);
        }
        if !(1..=31).contains(&self.day) {
            bail!("day must be between 1 and 31, got {}", self.day);
        }
        let latest_onset = self.year as i64 + MAX_ONSET_AGE;
        if !(self.year as i64..=latest_onset).contains(&(self.onset_year as i64)) {
            bail!(
                "onset_year must be between {} and {}, got {}",
                self.year,
                latest_onset,
                self.onset_year
            );
        }
        Sex::from_code(self.sex)?;
        Ok(())
    }

    pub fn resolve(&self, cfg: &Config) -> Result<ResolvedChart> {
        self.validate(cfg)?;
        let sex = Sex::from_code(self.sex)?;
        let cycle = match &self.decades {
            Some(pillars) => DecadeSequence::new(pillars.clone(), self.onset_year)?,
            None => DecadeSequence::from_month_pillar(
                self.pillars.month,
                self.pillars.year.stem,
                sex,
                self.onset_year,
            ),
        };
        Ok(ResolvedChart {
            birth_year: self.year,
            sex,
            chart: self.pillars,
            cycle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::DecadeCycle;

    const SAMPLE: &str = r#"{
        "year": 1990, "month": 5, "day": 15, "hour": 8, "sex": 1,
        "pillars": {"year": "庚午", "month": "辛巳", "day": "甲子", "hour": "丙寅"},
        "onset_year": 1998
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let req = ChartRequest::from_json(SAMPLE).unwrap();
        assert_eq!(req.minute, 0);
        assert_eq!(req.pillars.day.to_string(), "甲子");
        assert!(req.decades.is_none());
    }

    #[test]
    fn test_resolve_derives_decades() {
        let req = ChartRequest::from_json(SAMPLE).unwrap();
        let resolved = req.resolve(&Config::default()).unwrap();
        assert_eq!(resolved.sex, Sex::Male);
        assert_eq!(resolved.cycle.len(), 12);
        assert_eq!(resolved.cycle.pillar_at(0).to_string(), "壬午");
        assert_eq!(resolved.cycle.onset_year(), 1998);
    }

    #[test]
    fn test_explicit_decades_are_kept() {
        let mut req = ChartRequest::from_json(SAMPLE).unwrap();
        req.decades = Some(vec!["甲子".parse().unwrap(), "乙丑".parse().unwrap()]);
        let resolved = req.resolve(&Config::default()).unwrap();
        assert_eq!(resolved.cycle.len(), 2);
        assert_eq!(resolved.cycle.pillar_at(9).to_string(), "乙丑");
    }

    #[test]
    fn test_validation_messages() {
        let cfg = Config::default();
        let base = ChartRequest::from_json(SAMPLE).unwrap();

        let mut req = base.clone();
        req.year = 1850;
        let err = req.validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("year must be between 1900 and 2100"), "{}", err);

        let mut req = base.clone();
        req.month = 13;
        assert!(req.validate(&cfg).is_err());

        let mut req = base.clone();
        req.day = 0;
        assert!(req.validate(&cfg).is_err());

        let mut req = base;
        req.sex = 3;
        assert!(req.resolve(&cfg).is_err());
    }

    #[test]
    fn test_onset_year_window() {
        let cfg = Config::default();
        let base = ChartRequest::from_json(SAMPLE).unwrap();

        for (onset, ok) in [
            (1990, true),
            (2110, true),
            (1989, false),
            (2111, false),
            (i32::MIN, false),
            (i32::MAX, false),
        ] {
            let mut req = base.clone();
            req.onset_year = onset;
            let res = req.resolve(&cfg);
            assert_eq!(res.is_ok(), ok, "onset {}", onset);
            if let Err(err) = res {
                assert!(err.to_string().contains("onset_year"), "{}", err);
            }
        }
    }

    #[test]
    fn test_bad_pillar_rejected() {
        let text = SAMPLE.replace("甲子", "甲丑");
        assert!(ChartRequest::from_json(&text).is_err());
    }
}
