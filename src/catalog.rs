//! Static content tables consumed by the engine.
//!
//! The built-in tables ship as YAML compiled into the crate; an alternate
//! table set can be loaded from disk with [`CatalogLoader`]. Lookups by id
//! never fail: an unknown id resolves to the first entry of its table.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ledger::{Effect, ResourceKind, ResourceState, ScoreKind, ScoreboardState},
    selection::WeatherKind,
    tiles::{ActionKind, Tile, TileKind},
};

pub const BUILTIN_CONTENT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/content/ecosphere.yaml"
));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse content tables: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("content table '{0}' must not be empty")]
    EmptyTable(&'static str),

    #[error("region '{region}' patches tile index {index} but only {tiles} baseline tiles exist")]
    PatchOutOfRange {
        region: String,
        index: usize,
        tiles: usize,
    },

    #[error("disaster '{0}' must offer at least one choice")]
    NoChoices(String),

    #[error("mission template '{0}' needs a target of at least 1")]
    ZeroTarget(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeModifiers {
    pub resource_bias: f64,
    pub disaster_intensity: f64,
    pub co2_trend: f64,
    #[serde(default)]
    pub morale_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    pub modifiers: ModeModifiers,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePatch {
    pub index: usize,
    #[serde(default, rename = "type")]
    pub kind: Option<TileKind>,
    #[serde(default)]
    pub health: Option<f64>,
    #[serde(default)]
    pub pollution: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub biodiversity: Option<f64>,
}

impl TilePatch {
    fn apply(&self, tile: &mut Tile) {
        if let Some(kind) = self.kind {
            tile.kind = kind;
        }
        if let Some(health) = self.health {
            tile.health = health;
        }
        if let Some(pollution) = self.pollution {
            tile.pollution = pollution;
        }
        if let Some(energy) = self.energy {
            tile.energy = energy;
        }
        if let Some(biodiversity) = self.biodiversity {
            tile.biodiversity = biodiversity;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub biome: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
    #[serde(default)]
    pub starting_resources: BTreeMap<ResourceKind, f64>,
    #[serde(default)]
    pub climate_bias: BTreeMap<WeatherKind, f64>,
    #[serde(default)]
    pub tile_patches: Vec<TilePatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonKind {
    Spring,
    Summer,
    Autumn,
    Winter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: SeasonKind,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub length_days: u32,
    #[serde(default)]
    pub weather_boost: BTreeMap<WeatherKind, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherCondition {
    pub id: WeatherKind,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub base_weight: f64,
    pub summary: String,
    #[serde(default)]
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: ActionKind,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub narrative: String,
    #[serde(default)]
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionTemplate {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub action: ActionKind,
    pub target: u32,
    pub reward: f64,
}

/// A numeric reading of the disaster context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    Forest,
    Water,
    Energy,
    AirQuality,
    Economy,
    Happiness,
    Wildlife,
    SustainabilityScore,
    HappinessScore,
    ResilienceScore,
    Co2,
    Year,
}

impl Signal {
    pub fn read(self, context: &DisasterContext<'_>) -> f64 {
        let resource = |kind| context.resources.get(kind);
        let score = |kind| context.scoreboard.get(kind);
        match self {
            Signal::Forest => resource(ResourceKind::Forest),
            Signal::Water => resource(ResourceKind::Water),
            Signal::Energy => resource(ResourceKind::Energy),
            Signal::AirQuality => resource(ResourceKind::AirQuality),
            Signal::Economy => resource(ResourceKind::Economy),
            Signal::Happiness => resource(ResourceKind::Happiness),
            Signal::Wildlife => resource(ResourceKind::Wildlife),
            Signal::SustainabilityScore => score(ScoreKind::Sustainability),
            Signal::HappinessScore => score(ScoreKind::Happiness),
            Signal::ResilienceScore => score(ScoreKind::Resilience),
            Signal::Co2 => context.co2_ppm,
            Signal::Year => f64::from(context.year),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "if", rename_all = "camelCase")]
pub enum Condition {
    RegionIs { region: String },
    ModeIs { mode: String },
    Above { signal: Signal, value: f64 },
    Below { signal: Signal, value: f64 },
}

impl Condition {
    pub fn holds(&self, context: &DisasterContext<'_>) -> bool {
        match self {
            Condition::RegionIs { region } => context.region_id == region,
            Condition::ModeIs { mode } => context.mode_id == mode,
            Condition::Above { signal, value } => signal.read(context) > *value,
            Condition::Below { signal, value } => signal.read(context) < *value,
        }
    }
}

/// `factor * (signal - offset)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTerm {
    pub signal: Signal,
    #[serde(default)]
    pub offset: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightBonus {
    pub when: Condition,
    pub add: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dormancy {
    pub when: Vec<Condition>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerWeight {
    pub base: f64,
    #[serde(default)]
    pub terms: Vec<WeightTerm>,
    #[serde(default)]
    pub bonuses: Vec<WeightBonus>,
    #[serde(default)]
    pub floor: Option<f64>,
    #[serde(default)]
    pub dormant: Option<Dormancy>,
}

impl TriggerWeight {
    pub fn constant(weight: f64) -> Self {
        Self {
            base: weight,
            terms: Vec::new(),
            bonuses: Vec::new(),
            floor: None,
            dormant: None,
        }
    }

    pub fn evaluate(&self, context: &DisasterContext<'_>) -> f64 {
        if let Some(dormant) = &self.dormant {
            if dormant.when.iter().all(|condition| condition.holds(context)) {
                return dormant.weight;
            }
        }
        let mut weight = self.base;
        for term in &self.terms {
            weight += term.factor * (term.signal.read(context) - term.offset);
        }
        for bonus in &self.bonuses {
            if bonus.when.holds(context) {
                weight += bonus.add;
            }
        }
        match self.floor {
            Some(floor) => weight.max(floor),
            None => weight,
        }
    }
}

/// What a disaster's trigger weight may look at.
#[derive(Debug, Clone, Copy)]
pub struct DisasterContext<'a> {
    pub resources: &'a ResourceState,
    pub scoreboard: &'a ScoreboardState,
    pub co2_ppm: f64,
    pub mode_id: &'a str,
    pub region_id: &'a str,
    pub year: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterChoice {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub trigger: TriggerWeight,
    pub choices: Vec<DisasterChoice>,
}

impl DisasterDefinition {
    pub fn choice(&self, id: &str) -> Option<&DisasterChoice> {
        self.choices.iter().find(|choice| choice.id == id)
    }
}

/// Weight of the "no disaster" outcome:
/// `max(floor, base - intensity_factor * intensity + resilience / resilience_divisor)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalmWeight {
    pub base: f64,
    pub intensity_factor: f64,
    pub resilience_divisor: f64,
    pub floor: f64,
}

impl Default for CalmWeight {
    fn default() -> Self {
        Self {
            base: 12.0,
            intensity_factor: 4.0,
            resilience_divisor: 12.0,
            floor: 2.0,
        }
    }
}

impl CalmWeight {
    pub fn weight(&self, intensity: f64, resilience: f64) -> f64 {
        let bonus = if self.resilience_divisor > 0.0 {
            resilience / self.resilience_divisor
        } else {
            0.0
        };
        (self.base - self.intensity_factor * intensity + bonus).max(self.floor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub modes: Vec<GameMode>,
    pub regions: Vec<Region>,
    pub seasons: Vec<Season>,
    pub weather: Vec<WeatherCondition>,
    pub actions: Vec<ActionDefinition>,
    pub adaptations: Vec<AdaptationOption>,
    pub missions: Vec<MissionTemplate>,
    pub baseline_tiles: Vec<Tile>,
    pub disasters: Vec<DisasterDefinition>,
    #[serde(default)]
    pub calm: CalmWeight,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_CONTENT)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let tables = [
            ("modes", self.modes.is_empty()),
            ("regions", self.regions.is_empty()),
            ("seasons", self.seasons.is_empty()),
            ("weather", self.weather.is_empty()),
            ("actions", self.actions.is_empty()),
            ("adaptations", self.adaptations.is_empty()),
            ("missions", self.missions.is_empty()),
            ("baselineTiles", self.baseline_tiles.is_empty()),
            ("disasters", self.disasters.is_empty()),
        ];
        if let Some((name, _)) = tables.iter().find(|(_, empty)| *empty) {
            return Err(CatalogError::EmptyTable(*name));
        }

        for region in &self.regions {
            for patch in &region.tile_patches {
                if patch.index >= self.baseline_tiles.len() {
                    return Err(CatalogError::PatchOutOfRange {
                        region: region.id.clone(),
                        index: patch.index,
                        tiles: self.baseline_tiles.len(),
                    });
                }
            }
        }

        for disaster in &self.disasters {
            if disaster.choices.is_empty() {
                return Err(CatalogError::NoChoices(disaster.id.clone()));
            }
        }

        for template in &self.missions {
            if template.target == 0 {
                return Err(CatalogError::ZeroTarget(template.id.clone()));
            }
        }
        Ok(())
    }

    pub fn mode(&self, id: Option<&str>) -> &GameMode {
        id.and_then(|id| self.modes.iter().find(|mode| mode.id == id))
            .unwrap_or(&self.modes[0])
    }

    pub fn region(&self, id: Option<&str>) -> &Region {
        id.and_then(|id| self.regions.iter().find(|region| region.id == id))
            .unwrap_or(&self.regions[0])
    }

    pub fn has_mode(&self, id: &str) -> bool {
        self.modes.iter().any(|mode| mode.id == id)
    }

    pub fn has_region(&self, id: &str) -> bool {
        self.regions.iter().any(|region| region.id == id)
    }

    /// Season at a cyclic index; out-of-range indices wrap.
    pub fn season(&self, index: usize) -> &Season {
        &self.seasons[index % self.seasons.len()]
    }

    pub fn weather(&self, kind: WeatherKind) -> &WeatherCondition {
        self.weather
            .iter()
            .find(|condition| condition.id == kind)
            .unwrap_or(&self.weather[0])
    }

    /// Action definition, or `None` when the content omits that action.
    pub fn action(&self, kind: ActionKind) -> Option<&ActionDefinition> {
        self.actions.iter().find(|action| action.id == kind)
    }

    pub fn adaptation(&self, id: &str) -> Option<&AdaptationOption> {
        self.adaptations.iter().find(|option| option.id == id)
    }

    pub fn disaster(&self, id: &str) -> Option<&DisasterDefinition> {
        self.disasters.iter().find(|disaster| disaster.id == id)
    }

    /// Deck entry for a pending disaster. An id the deck no longer carries
    /// (stored before a content change) resolves to the first entry.
    pub fn disaster_or_first(&self, id: &str) -> &DisasterDefinition {
        self.disaster(id).unwrap_or(&self.disasters[0])
    }

    /// The baseline map with the region's patches laid over it.
    pub fn tiles_for_region(&self, region: &Region) -> Vec<Tile> {
        let mut tiles = self.baseline_tiles.clone();
        for patch in &region.tile_patches {
            if let Some(tile) = tiles.get_mut(patch.index) {
                patch.apply(tile);
            }
        }
        tiles
    }

    /// Baseline resources overridden by the region, then shifted by the
    /// mode's resource bias.
    pub fn starting_resources(&self, mode: &GameMode, region: &Region) -> ResourceState {
        let mut resources = ResourceState::baseline();
        for (kind, value) in &region.starting_resources {
            resources.set(*kind, *value);
        }
        let bias = mode.modifiers.resource_bias;
        for kind in ResourceKind::ALL {
            resources.set(kind, resources.get(kind) + bias);
        }
        resources
    }
}

pub struct CatalogLoader {
    base_dir: PathBuf,
}

impl CatalogLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Catalog> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content file {}", path.display()))?;
        let catalog = Catalog::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().expect("built-in content parses")
    }

    fn context<'a>(
        resources: &'a ResourceState,
        scoreboard: &'a ScoreboardState,
        region_id: &'a str,
        co2_ppm: f64,
        year: u32,
    ) -> DisasterContext<'a> {
        DisasterContext {
            resources,
            scoreboard,
            co2_ppm,
            mode_id: "campaign",
            region_id,
            year,
        }
    }

    #[test]
    fn builtin_tables_are_complete() {
        let catalog = catalog();
        assert_eq!(catalog.modes.len(), 3);
        assert_eq!(catalog.regions.len(), 4);
        assert_eq!(catalog.seasons.len(), 4);
        assert_eq!(catalog.weather.len(), 7);
        assert_eq!(catalog.actions.len(), 4);
        assert_eq!(catalog.adaptations.len(), 3);
        assert_eq!(catalog.missions.len(), 4);
        assert_eq!(catalog.baseline_tiles.len(), 18);
        assert_eq!(catalog.disasters.len(), 10);
        for kind in ActionKind::ALL {
            assert!(catalog.action(kind).is_some(), "{kind:?} missing");
        }
    }

    #[test]
    fn unknown_ids_fall_back_to_first_entry() {
        let catalog = catalog();
        assert_eq!(catalog.mode(Some("tournament")).id, "campaign");
        assert_eq!(catalog.mode(None).id, "campaign");
        assert_eq!(catalog.region(Some("moon")).id, "coastal");
        assert_eq!(catalog.region(Some("arctic")).id, "arctic");
    }

    #[test]
    fn region_patches_reshape_the_baseline() {
        let catalog = catalog();
        let coastal = catalog.tiles_for_region(catalog.region(Some("coastal")));
        assert_eq!(coastal.len(), 18);
        assert_eq!(coastal[2].kind, TileKind::Wetland);
        assert_eq!(coastal[2].pollution, 42.0);
        assert_eq!(coastal[2].health, 40.0);
        assert_eq!(coastal[9].kind, TileKind::Water);
        assert_eq!(coastal[13].health, 78.0);
        assert_eq!(coastal[13].kind, TileKind::Polluted);
        assert_eq!(catalog.baseline_tiles[2].kind, TileKind::Polluted);
    }

    #[test]
    fn starting_resources_combine_region_and_mode_bias() {
        let catalog = catalog();
        let survival = catalog.mode(Some("survival"));
        let desert = catalog.region(Some("desert"));
        let resources = catalog.starting_resources(survival, desert);
        assert_eq!(resources.water, 40.0);
        assert_eq!(resources.energy, 58.0);
        assert_eq!(resources.forest, 60.0);
        assert_eq!(resources.air_quality, 46.0);
    }

    #[test]
    fn flood_weight_follows_region_and_co2() {
        let catalog = catalog();
        let flood = catalog.disaster("flood").unwrap();
        let resources = ResourceState::uniform(55.0);
        let scoreboard = ScoreboardState::neutral();
        let inland = flood
            .trigger
            .evaluate(&context(&resources, &scoreboard, "desert", 420.0, 2080));
        assert!((inland - (4.0 + 45.0 * 0.02)).abs() < 1e-9);
        let coastal_hot = flood
            .trigger
            .evaluate(&context(&resources, &scoreboard, "coastal", 460.0, 2080));
        assert!((coastal_hot - (inland + 7.0)).abs() < 1e-9);
    }

    #[test]
    fn climate_summit_sleeps_until_thresholds_pass() {
        let catalog = catalog();
        let summit = catalog.disaster("climate-shift").unwrap();
        let resources = ResourceState::baseline();
        let scoreboard = ScoreboardState::neutral();
        let early = summit
            .trigger
            .evaluate(&context(&resources, &scoreboard, "coastal", 420.0, 2079));
        assert_eq!(early, 0.5);
        let later = summit
            .trigger
            .evaluate(&context(&resources, &scoreboard, "coastal", 420.0, 2090));
        assert!((later - (4.0 - 0.4 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn retired_disaster_ids_fall_back_to_first_entry() {
        let catalog = catalog();
        assert_eq!(catalog.disaster_or_first("wildfire").id, "wildfire");
        assert!(catalog.disaster("retired-event").is_none());
        assert_eq!(catalog.disaster_or_first("retired-event").id, "flood");
    }

    #[test]
    fn empty_tables_are_rejected() {
        let mut broken = catalog();
        broken.missions.clear();
        assert!(matches!(
            broken.validate(),
            Err(CatalogError::EmptyTable("missions"))
        ));
    }

    #[test]
    fn loader_reads_content_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("content.yaml"), BUILTIN_CONTENT).unwrap();
        let loaded = CatalogLoader::new(dir.path()).load("content.yaml").unwrap();
        assert_eq!(loaded, catalog());
        assert!(CatalogLoader::new(dir.path()).load("missing.yaml").is_err());
    }
}
