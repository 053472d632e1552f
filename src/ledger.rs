//! Resource, scoreboard and CO2 bookkeeping.
//!
//! Every mutation of the three ledgers goes through [`Ledger::apply`] or
//! [`Ledger::close_year`], which own the clamping rules.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const CO2_MIN_PPM: f64 = 350.0;
pub const CO2_MAX_PPM: f64 = 580.0;
pub const INITIAL_CO2_PPM: f64 = 420.0;
pub const NEUTRAL_SCORE: f64 = 60.0;

const BLEND_COMPUTED: f64 = 0.65;
const BLEND_PREVIOUS: f64 = 0.35;

/// Clamp to the `[0, 100]` index range. NaN collapses to the floor.
pub fn clamp_index(value: f64) -> f64 {
    clamp_between(value, 0.0, 100.0)
}

pub fn clamp_co2(value: f64) -> f64 {
    clamp_between(value, CO2_MIN_PPM, CO2_MAX_PPM)
}

pub(crate) fn clamp_between(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Forest,
    Water,
    Energy,
    AirQuality,
    Economy,
    Happiness,
    Wildlife,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Forest,
        ResourceKind::Water,
        ResourceKind::Energy,
        ResourceKind::AirQuality,
        ResourceKind::Economy,
        ResourceKind::Happiness,
        ResourceKind::Wildlife,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Forest => "Forest",
            ResourceKind::Water => "Water",
            ResourceKind::Energy => "Energy",
            ResourceKind::AirQuality => "Air",
            ResourceKind::Economy => "Economy",
            ResourceKind::Happiness => "Happiness",
            ResourceKind::Wildlife => "Wildlife",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreKind {
    Sustainability,
    Happiness,
    Resilience,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 3] = [
        ScoreKind::Sustainability,
        ScoreKind::Happiness,
        ScoreKind::Resilience,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScoreKind::Sustainability => "Sustain",
            ScoreKind::Happiness => "Happiness",
            ScoreKind::Resilience => "Resilience",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    pub forest: f64,
    pub water: f64,
    pub energy: f64,
    pub air_quality: f64,
    pub economy: f64,
    pub happiness: f64,
    pub wildlife: f64,
}

impl ResourceState {
    /// Template every region starts from before its own overrides.
    pub fn baseline() -> Self {
        Self {
            forest: 68.0,
            water: 72.0,
            energy: 58.0,
            air_quality: 64.0,
            economy: 60.0,
            happiness: 66.0,
            wildlife: 62.0,
        }
    }

    pub fn uniform(value: f64) -> Self {
        let value = clamp_index(value);
        Self {
            forest: value,
            water: value,
            energy: value,
            air_quality: value,
            economy: value,
            happiness: value,
            wildlife: value,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Forest => self.forest,
            ResourceKind::Water => self.water,
            ResourceKind::Energy => self.energy,
            ResourceKind::AirQuality => self.air_quality,
            ResourceKind::Economy => self.economy,
            ResourceKind::Happiness => self.happiness,
            ResourceKind::Wildlife => self.wildlife,
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Forest => &mut self.forest,
            ResourceKind::Water => &mut self.water,
            ResourceKind::Energy => &mut self.energy,
            ResourceKind::AirQuality => &mut self.air_quality,
            ResourceKind::Economy => &mut self.economy,
            ResourceKind::Happiness => &mut self.happiness,
            ResourceKind::Wildlife => &mut self.wildlife,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, value: f64) {
        *self.slot(kind) = clamp_index(value);
    }

    pub fn apply(&mut self, delta: &ResourceDelta) {
        for kind in ResourceKind::ALL {
            let change = delta.get(kind);
            if change != 0.0 && !change.is_nan() {
                let slot = self.slot(kind);
                *slot = clamp_index(*slot + change);
            }
        }
    }

    pub fn clamped(mut self) -> Self {
        for kind in ResourceKind::ALL {
            let slot = self.slot(kind);
            *slot = clamp_index(*slot);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardState {
    pub sustainability: f64,
    pub happiness: f64,
    pub resilience: f64,
}

impl ScoreboardState {
    pub fn neutral() -> Self {
        Self::uniform(NEUTRAL_SCORE)
    }

    pub fn uniform(value: f64) -> Self {
        let value = clamp_index(value);
        Self {
            sustainability: value,
            happiness: value,
            resilience: value,
        }
    }

    pub fn get(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Sustainability => self.sustainability,
            ScoreKind::Happiness => self.happiness,
            ScoreKind::Resilience => self.resilience,
        }
    }

    fn slot(&mut self, kind: ScoreKind) -> &mut f64 {
        match kind {
            ScoreKind::Sustainability => &mut self.sustainability,
            ScoreKind::Happiness => &mut self.happiness,
            ScoreKind::Resilience => &mut self.resilience,
        }
    }

    pub fn apply(&mut self, delta: &ScoreboardDelta) {
        for kind in ScoreKind::ALL {
            let change = delta.get(kind);
            if change != 0.0 && !change.is_nan() {
                let slot = self.slot(kind);
                *slot = clamp_index(*slot + change);
            }
        }
    }

    pub fn lowest(&self) -> f64 {
        self.sustainability.min(self.happiness).min(self.resilience)
    }

    /// Re-derive the indices from `resources`, smoothed against `self`.
    pub fn blended(&self, resources: &ResourceState) -> Self {
        let raw = raw_scores(resources);
        let blend = |computed: f64, previous: f64| {
            clamp_index(computed * BLEND_COMPUTED + previous * BLEND_PREVIOUS)
        };
        Self {
            sustainability: blend(raw.sustainability, self.sustainability),
            happiness: blend(raw.happiness, self.happiness),
            resilience: blend(raw.resilience, self.resilience),
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            sustainability: clamp_index(self.sustainability),
            happiness: clamp_index(self.happiness),
            resilience: clamp_index(self.resilience),
        }
    }
}

/// Unsmoothed indices implied by a resource vector.
pub fn raw_scores(resources: &ResourceState) -> ScoreboardState {
    let r = resources;
    ScoreboardState {
        sustainability: r.forest * 0.22
            + r.water * 0.2
            + r.air_quality * 0.2
            + r.wildlife * 0.18
            + r.energy * 0.1
            + r.economy * 0.1,
        happiness: r.happiness * 0.4
            + r.economy * 0.25
            + r.air_quality * 0.15
            + r.water * 0.1
            + r.forest * 0.1,
        resilience: r.energy * 0.28
            + r.water * 0.18
            + r.forest * 0.16
            + r.economy * 0.18
            + r.wildlife * 0.1
            + r.air_quality * 0.1,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceDelta {
    pub forest: f64,
    pub water: f64,
    pub energy: f64,
    pub air_quality: f64,
    pub economy: f64,
    pub happiness: f64,
    pub wildlife: f64,
}

impl ResourceDelta {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Forest => self.forest,
            ResourceKind::Water => self.water,
            ResourceKind::Energy => self.energy,
            ResourceKind::AirQuality => self.air_quality,
            ResourceKind::Economy => self.economy,
            ResourceKind::Happiness => self.happiness,
            ResourceKind::Wildlife => self.wildlife,
        }
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|kind| self.get(*kind) == 0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreboardDelta {
    pub sustainability: f64,
    pub happiness: f64,
    pub resilience: f64,
}

impl ScoreboardDelta {
    pub fn get(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Sustainability => self.sustainability,
            ScoreKind::Happiness => self.happiness,
            ScoreKind::Resilience => self.resilience,
        }
    }

    pub fn is_empty(&self) -> bool {
        ScoreKind::ALL.iter().all(|kind| self.get(*kind) == 0.0)
    }
}

/// A bundle of changes applied in one step. All three parts are always
/// present; an unused part is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Effect {
    pub resources: ResourceDelta,
    pub scoreboard: ScoreboardDelta,
    pub co2: f64,
}

impl Effect {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.scoreboard.is_empty() && self.co2 == 0.0
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for kind in ResourceKind::ALL {
            let value = self.resources.get(kind);
            if value != 0.0 {
                parts.push(format!("{} {}", kind.label(), signed(value)));
            }
        }
        for kind in ScoreKind::ALL {
            let value = self.scoreboard.get(kind);
            if value != 0.0 {
                parts.push(format!("{} {}", kind.label(), signed(value)));
            }
        }
        if self.co2 != 0.0 {
            parts.push(format!("CO₂ {} ppm", signed(self.co2)));
        }
        if parts.is_empty() {
            f.write_str("No significant change.")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

fn signed(value: f64) -> String {
    let rounded = value.round();
    if value > 0.0 {
        format!("+{rounded}")
    } else {
        format!("{rounded}")
    }
}

/// The three numeric ledgers of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub resources: ResourceState,
    pub scoreboard: ScoreboardState,
    #[serde(rename = "co2ppm")]
    pub co2_ppm: f64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            resources: ResourceState::baseline(),
            scoreboard: ScoreboardState::neutral(),
            co2_ppm: INITIAL_CO2_PPM,
        }
    }
}

impl Ledger {
    /// Opening ledger for a campaign: the scoreboard is blended from the
    /// starting resources against the neutral board.
    pub fn opening(resources: ResourceState) -> Self {
        let resources = resources.clamped();
        Self {
            resources,
            scoreboard: ScoreboardState::neutral().blended(&resources),
            co2_ppm: INITIAL_CO2_PPM,
        }
    }

    pub fn apply(&mut self, effect: &Effect) {
        self.resources.apply(&effect.resources);
        self.scoreboard.apply(&effect.scoreboard);
        self.scoreboard = self.scoreboard.blended(&self.resources);
        if effect.co2 != 0.0 && !effect.co2.is_nan() {
            self.co2_ppm = clamp_co2(self.co2_ppm + effect.co2);
        }
    }

    /// Year-end recomputation: re-blend the scoreboard and drift CO2 by the
    /// mode trend plus resource deficit terms.
    pub fn close_year(&mut self, co2_trend: f64) {
        let r = self.resources;
        self.scoreboard = self.scoreboard.blended(&r);
        self.co2_ppm = clamp_co2(
            self.co2_ppm
                + co2_trend
                + (100.0 - r.air_quality) * 0.04
                + (100.0 - r.forest) * 0.035
                - r.energy * 0.02
                - r.wildlife * 0.01,
        );
    }

    pub fn clamped(self) -> Self {
        Self {
            resources: self.resources.clamped(),
            scoreboard: self.scoreboard.clamped(),
            co2_ppm: clamp_co2(self.co2_ppm),
        }
    }
}
