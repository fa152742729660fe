//! Calendrical value model: heavenly stems, earthly branches, the five
//! elements they map to, and stem/branch pillars.
//!
//! All values are small copyable integers. Construction from raw indices
//! wraps with Euclidean remainder so arithmetic on years and cycle offsets
//! never leaves the domain.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

pub const STEM_GLYPHS: [char; 10] = ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];
pub const BRANCH_GLYPHS: [char; 12] = [
    '子', '丑', '寅', '卯', '辰', '巳', '午', '未', '申', '酉', '戌', '亥',
];

/// Element of each branch, indexed by branch value.
const BRANCH_ELEMENTS: [Element; 12] = [
    Element::Water, // 子
    Element::Earth, // 丑
    Element::Wood,  // 寅
    Element::Wood,  // 卯
    Element::Earth, // 辰
    Element::Fire,  // 巳
    Element::Fire,  // 午
    Element::Earth, // 未
    Element::Metal, // 申
    Element::Metal, // 酉
    Element::Earth, // 戌
    Element::Water, // 亥
];

/// Year whose pillar anchors the LiuNian arithmetic (庚子).
pub const ANCHOR_YEAR: i32 = 1900;

// =============================================================================
// Elements (WuXing)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Wood = 0,
    Fire = 1,
    Earth = 2,
    Metal = 3,
    Water = 4,
}

impl Element {
    pub const ALL: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_index(i: usize) -> Self {
        Self::ALL[i % 5]
    }

    /// The element this one feeds in the generating cycle.
    pub fn generates(self) -> Element {
        Self::from_index(self.index() + 1)
    }

    /// The element that feeds this one.
    pub fn generated_by(self) -> Element {
        Self::from_index(self.index() + 4)
    }

    /// The element this one subdues in the overcoming cycle.
    pub fn overcomes(self) -> Element {
        Self::from_index(self.index() + 2)
    }

    pub fn overcome_by(self) -> Element {
        Self::from_index(self.index() + 3)
    }

    pub fn glyph(self) -> char {
        match self {
            Element::Wood => '木',
            Element::Fire => '火',
            Element::Earth => '土',
            Element::Metal => '金',
            Element::Water => '水',
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

// =============================================================================
// Stems
// =============================================================================

/// Heavenly stem, value in `0..10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stem(u8);

impl Stem {
    pub const COUNT: u8 = 10;

    pub fn new(value: u8) -> Option<Self> {
        (value < Self::COUNT).then_some(Self(value))
    }

    /// Wraps any integer into the stem domain.
    pub fn wrapping(value: i64) -> Self {
        Self(value.rem_euclid(Self::COUNT as i64) as u8)
    }

    pub fn all() -> impl Iterator<Item = Stem> {
        (0..Self::COUNT).map(Stem)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Stems pair up consecutively: 甲乙 wood, 丙丁 fire, and so on.
    pub fn element(self) -> Element {
        Element::from_index((self.0 / 2) as usize)
    }

    pub fn is_yang(self) -> bool {
        self.0 % 2 == 0
    }

    pub fn glyph(self) -> char {
        STEM_GLYPHS[self.0 as usize]
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        STEM_GLYPHS.iter().position(|g| *g == c).map(|i| Self(i as u8))
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

impl FromStr for Stem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_glyph(c).ok_or_else(|| anyhow!("unknown stem glyph {:?}", s)),
            _ => Err(anyhow!("expected a single stem glyph, got {:?}", s)),
        }
    }
}

impl TryFrom<String> for Stem {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Stem> for String {
    fn from(s: Stem) -> String {
        s.to_string()
    }
}

// =============================================================================
// Branches
// =============================================================================

/// Three-branch harmony groups (三合局), named for the element they form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trine {
    /// 申子辰
    Water,
    /// 巳酉丑
    Metal,
    /// 寅午戌
    Fire,
    /// 亥卯未
    Wood,
}

impl Trine {
    pub fn members(self) -> [Branch; 3] {
        let raw = match self {
            Trine::Water => [8, 0, 4],
            Trine::Metal => [5, 9, 1],
            Trine::Fire => [2, 6, 10],
            Trine::Wood => [11, 3, 7],
        };
        raw.map(Branch)
    }
}

/// Earthly branch, value in `0..12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Branch(u8);

impl Branch {
    pub const COUNT: u8 = 12;

    pub fn new(value: u8) -> Option<Self> {
        (value < Self::COUNT).then_some(Self(value))
    }

    pub fn wrapping(value: i64) -> Self {
        Self(value.rem_euclid(Self::COUNT as i64) as u8)
    }

    pub fn all() -> impl Iterator<Item = Branch> {
        (0..Self::COUNT).map(Branch)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn element(self) -> Element {
        BRANCH_ELEMENTS[self.0 as usize]
    }

    pub fn is_yang(self) -> bool {
        self.0 % 2 == 0
    }

    /// Trine members are spaced four apart, so the group is `value % 4`.
    pub fn trine(self) -> Trine {
        match self.0 % 4 {
            0 => Trine::Water,
            1 => Trine::Metal,
            2 => Trine::Fire,
            _ => Trine::Wood,
        }
    }

    pub fn glyph(self) -> char {
        BRANCH_GLYPHS[self.0 as usize]
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        BRANCH_GLYPHS.iter().position(|g| *g == c).map(|i| Self(i as u8))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

impl FromStr for Branch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_glyph(c).ok_or_else(|| anyhow!("unknown branch glyph {:?}", s)),
            _ => Err(anyhow!("expected a single branch glyph, got {:?}", s)),
        }
    }
}

impl TryFrom<String> for Branch {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Branch> for String {
    fn from(b: Branch) -> String {
        b.to_string()
    }
}

// =============================================================================
// Pillars
// =============================================================================

/// One stem/branch pair: a natal position or one step of the decade cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pillar {
    pub stem: Stem,
    pub branch: Branch,
}

impl Pillar {
    pub fn new(stem: Stem, branch: Branch) -> Self {
        Self { stem, branch }
    }

    /// Next pillar in the sixty-step cycle.
    pub fn next(self) -> Self {
        self.step(1)
    }

    pub fn prev(self) -> Self {
        self.step(-1)
    }

    pub fn step(self, offset: i64) -> Self {
        Self {
            stem: Stem::wrapping(self.stem.value() as i64 + offset),
            branch: Branch::wrapping(self.branch.value() as i64 + offset),
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem, self.branch)
    }
}

impl FromStr for Pillar {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() != 2 {
            bail!("expected a two-glyph pillar such as 甲子, got {:?}", s);
        }
        let stem = Stem::from_glyph(chars[0])
            .ok_or_else(|| anyhow!("unknown stem glyph {:?} in pillar {:?}", chars[0], s))?;
        let branch = Branch::from_glyph(chars[1])
            .ok_or_else(|| anyhow!("unknown branch glyph {:?} in pillar {:?}", chars[1], s))?;
        if stem.is_yang() != branch.is_yang() {
            bail!("pillar {:?} mixes a yang and a yin glyph and is not in the sixty-cycle", s);
        }
        Ok(Self { stem, branch })
    }
}

impl TryFrom<String> for Pillar {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Pillar> for String {
    fn from(p: Pillar) -> String {
        p.to_string()
    }
}

// =============================================================================
// LiuNian (year pillar) arithmetic
// =============================================================================

/// Stem of a calendar year; 1900 is 庚.
pub fn year_stem(year: i32) -> Stem {
    Stem::wrapping(year as i64 - ANCHOR_YEAR as i64 + 6)
}

/// Branch of a calendar year; 1900 is 子.
pub fn year_branch(year: i32) -> Branch {
    Branch::wrapping(year as i64 - ANCHOR_YEAR as i64)
}

pub fn year_pillar(year: i32) -> Pillar {
    Pillar::new(year_stem(year), year_branch(year))
}

// =============================================================================
// Tests
// =============================================================================
