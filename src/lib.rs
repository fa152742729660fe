//! Four Pillars (BaZi) marker classification and hundred-year fortune
//! projection.

pub mod calendar;
pub mod chart;
pub mod config;
pub mod export;
pub mod fortune;
pub mod input;
pub mod logging;
pub mod power;
pub mod relations;
pub mod shensha;

pub use calendar::{Branch, Element, Pillar, Stem};
pub use chart::{DecadeCycle, DecadeSequence, FourPillars, Sex};
pub use fortune::{project_fortune, FortunePoint, FortuneSummary};
pub use shensha::{evaluate_markers, Marker, MarkerSet};
