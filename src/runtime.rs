//! Campaign state: the snapshot every transition consumes and produces, the
//! capped event log, year-end evaluation and the display read model.

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, DisasterChoice, SeasonKind, WeatherCondition},
    ledger::{Ledger, ResourceState, ScoreboardState},
    mission::Mission,
    selection::WeatherKind,
    tiles::{ActionKind, Tile},
};

pub const PLAN_ACTIONS_PER_YEAR: u32 = 3;
pub const INITIAL_YEAR: u32 = 2080;
pub const TARGET_YEAR: u32 = 2100;
pub const LOG_CAP: usize = 24;
pub const SEASONS_PER_YEAR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Setup,
    Active,
    Victory,
    Collapse,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Victory | Status::Collapse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plan,
    Weather,
    Disaster,
    Adapt,
    Evaluate,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Plan,
        Phase::Weather,
        Phase::Disaster,
        Phase::Adapt,
        Phase::Evaluate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Weather => "weather",
            Phase::Disaster => "disaster",
            Phase::Adapt => "adapt",
            Phase::Evaluate => "evaluate",
        }
    }
}

/// Where a log entry was written; the opening entry predates the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPhase {
    Setup,
    Plan,
    Weather,
    Disaster,
    Adapt,
    Evaluate,
}

impl From<Phase> for LogPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Plan => LogPhase::Plan,
            Phase::Weather => LogPhase::Weather,
            Phase::Disaster => LogPhase::Disaster,
            Phase::Adapt => LogPhase::Adapt,
            Phase::Evaluate => LogPhase::Evaluate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub year: u32,
    pub phase: LogPhase,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterState {
    pub id: String,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl DisasterState {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resolved: false,
            choice_id: None,
            summary: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Stable,
    Warning,
    Critical,
}

impl Outcome {
    pub fn classify(scoreboard: &ScoreboardState, co2_ppm: f64) -> Self {
        let lowest = scoreboard.lowest();
        if lowest < 40.0 || co2_ppm >= 500.0 {
            Outcome::Critical
        } else if lowest < 60.0 || co2_ppm >= 470.0 {
            Outcome::Warning
        } else {
            Outcome::Stable
        }
    }

    pub fn narrative(self, scoreboard: &ScoreboardState, co2_ppm: f64) -> String {
        let sus = scoreboard.sustainability.round();
        let hap = scoreboard.happiness.round();
        let res = scoreboard.resilience.round();
        let co2 = co2_ppm.round();
        match self {
            Outcome::Stable => format!(
                "Systems hold steady. Sustainability {sus} and resilience {res} remain robust while CO₂ drifts at {co2} ppm."
            ),
            Outcome::Warning => format!(
                "Warning lights flash. Focus on reinforcing weak indices (sus {sus}, hap {hap}, res {res}) and draw CO₂ down from {co2} ppm."
            ),
            Outcome::Critical => format!(
                "Critical thresholds breached. Immediate intervention required: indices hover at sustainability {sus}, happiness {hap}, resilience {res} with CO₂ {co2} ppm."
            ),
        }
    }
}

/// Terminal status reached at year end, if any. Collapse wins over victory.
pub fn terminal_status(year: u32, scoreboard: &ScoreboardState, co2_ppm: f64) -> Option<Status> {
    if scoreboard.lowest() <= 20.0 || co2_ppm >= 520.0 {
        return Some(Status::Collapse);
    }
    if year >= TARGET_YEAR
        && scoreboard.sustainability >= 55.0
        && scoreboard.happiness >= 50.0
        && scoreboard.resilience >= 50.0
        && co2_ppm <= 460.0
    {
        return Some(Status::Victory);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub outcome: Outcome,
    pub narrative: String,
    pub resource_snapshot: ResourceState,
    pub scoreboard_snapshot: ScoreboardState,
}

impl EvaluationSummary {
    pub fn assess(resources: &ResourceState, scoreboard: &ScoreboardState, co2_ppm: f64) -> Self {
        let outcome = Outcome::classify(scoreboard, co2_ppm);
        Self {
            outcome,
            narrative: outcome.narrative(scoreboard, co2_ppm),
            resource_snapshot: *resources,
            scoreboard_snapshot: *scoreboard,
        }
    }
}

/// The whole campaign. Transitions never mutate a snapshot they were handed;
/// they return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub status: Status,
    #[serde(default)]
    pub mode_id: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub year: u32,
    pub phase: Phase,
    pub season_index: usize,
    pub plan_actions_remaining: u32,
    pub tiles: Vec<Tile>,
    #[serde(default = "default_action")]
    pub selected_action: ActionKind,
    #[serde(flatten)]
    pub ledger: Ledger,
    #[serde(default)]
    pub mission: Option<Mission>,
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub current_weather: Option<WeatherKind>,
    #[serde(default)]
    pub current_disaster: Option<DisasterState>,
    #[serde(default)]
    pub adaptation_taken: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationSummary>,
    #[serde(default)]
    pub log_seq: u64,
}

impl RuntimeSnapshot {
    /// Pre-campaign state: baseline map and ledger, nothing selected.
    pub fn fresh(catalog: &Catalog) -> Self {
        Self {
            status: Status::Setup,
            mode_id: None,
            region_id: None,
            year: INITIAL_YEAR,
            phase: Phase::Plan,
            season_index: 0,
            plan_actions_remaining: PLAN_ACTIONS_PER_YEAR,
            tiles: catalog.baseline_tiles.clone(),
            selected_action: ActionKind::Plant,
            ledger: Ledger::default(),
            mission: None,
            log: Vec::new(),
            current_weather: None,
            current_disaster: None,
            adaptation_taken: false,
            evaluation: None,
            log_seq: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn in_phase(&self, phase: Phase) -> bool {
        self.is_active() && self.phase == phase
    }

    pub fn years_remaining(&self) -> u32 {
        TARGET_YEAR.saturating_sub(self.year)
    }

    pub fn can_take_action(&self) -> bool {
        self.in_phase(Phase::Plan) && self.plan_actions_remaining > 0
    }

    /// Appends to the log, dropping the oldest entries past [`LOG_CAP`].
    pub fn push_log(
        &mut self,
        phase: impl Into<LogPhase>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.log_seq += 1;
        self.log.push(LogEntry {
            id: format!("log-{}-{}", self.year, self.log_seq),
            year: self.year,
            phase: phase.into(),
            title: title.into(),
            description: description.into(),
        });
        truncate_log(&mut self.log);
    }

    /// Pulls every bounded field back into range. Applied to anything read
    /// from storage.
    pub fn sanitized(mut self) -> Self {
        self.season_index = self.season_index.min(SEASONS_PER_YEAR - 1);
        self.plan_actions_remaining = self.plan_actions_remaining.min(PLAN_ACTIONS_PER_YEAR);
        self.ledger = self.ledger.clamped();
        truncate_log(&mut self.log);
        self
    }
}

fn default_action() -> ActionKind {
    ActionKind::Plant
}

fn truncate_log(log: &mut Vec<LogEntry>) {
    if log.len() > LOG_CAP {
        let excess = log.len() - LOG_CAP;
        log.drain(..excess);
    }
}

/// Display-facing view of a disaster with its catalog text and choices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterView {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub resolved: bool,
    pub choice_id: Option<String>,
    pub summary: Option<String>,
    pub choices: Vec<DisasterChoice>,
}

/// Read model handed to displays. Scores are rounded and tiles clamped here
/// only; the snapshot keeps the raw values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationView {
    pub status: Status,
    pub mode_id: Option<String>,
    pub mode_name: Option<String>,
    pub region_id: Option<String>,
    pub region_name: Option<String>,
    pub year: u32,
    pub target_year: u32,
    pub years_remaining: u32,
    pub phase: Phase,
    pub season: SeasonKind,
    pub season_label: String,
    pub plan_actions_remaining: u32,
    pub can_take_action: bool,
    pub selected_action: ActionKind,
    pub co2_ppm: f64,
    pub resources: ResourceState,
    pub scoreboard: ScoreboardState,
    pub tiles: Vec<Tile>,
    pub mission: Option<Mission>,
    pub log: Vec<LogEntry>,
    pub weather: Option<WeatherCondition>,
    pub disaster: Option<DisasterView>,
    pub adaptation_taken: bool,
    pub evaluation: Option<EvaluationSummary>,
}

impl SimulationView {
    pub fn build(snapshot: &RuntimeSnapshot, catalog: &Catalog) -> Self {
        let season = catalog.season(snapshot.season_index);
        let scoreboard = snapshot.ledger.scoreboard.clamped();
        let selected = snapshot.status != Status::Setup;
        let mode = snapshot
            .mode_id
            .as_deref()
            .filter(|id| catalog.has_mode(id))
            .map(|id| catalog.mode(Some(id)));
        let region = snapshot
            .region_id
            .as_deref()
            .filter(|id| catalog.has_region(id))
            .map(|id| catalog.region(Some(id)));
        let disaster = snapshot.current_disaster.as_ref().map(|state| {
            let definition = catalog.disaster_or_first(&state.id);
            DisasterView {
                id: definition.id.clone(),
                name: definition.name.clone(),
                icon: definition.icon.clone(),
                description: definition.description.clone(),
                resolved: state.resolved,
                choice_id: state.choice_id.clone(),
                summary: state.summary.clone(),
                choices: definition.choices.clone(),
            }
        });

        Self {
            status: snapshot.status,
            mode_id: snapshot.mode_id.clone(),
            mode_name: mode.filter(|_| selected).map(|mode| mode.name.clone()),
            region_id: snapshot.region_id.clone(),
            region_name: region.filter(|_| selected).map(|region| region.name.clone()),
            year: snapshot.year,
            target_year: TARGET_YEAR,
            years_remaining: snapshot.years_remaining(),
            phase: snapshot.phase,
            season: season.id,
            season_label: season.label.clone(),
            plan_actions_remaining: snapshot.plan_actions_remaining,
            can_take_action: snapshot.can_take_action(),
            selected_action: snapshot.selected_action,
            co2_ppm: snapshot.ledger.co2_ppm.round(),
            resources: snapshot.ledger.resources.clamped(),
            scoreboard: ScoreboardState {
                sustainability: scoreboard.sustainability.round(),
                happiness: scoreboard.happiness.round(),
                resilience: scoreboard.resilience.round(),
            },
            tiles: snapshot.tiles.iter().map(Tile::display).collect(),
            mission: snapshot.mission.clone(),
            log: snapshot.log.clone(),
            weather: snapshot
                .current_weather
                .map(|kind| catalog.weather(kind).clone()),
            disaster,
            adaptation_taken: snapshot.adaptation_taken,
            evaluation: snapshot.evaluation.clone(),
        }
    }
}
