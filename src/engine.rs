//! Phase state machine.
//!
//! Every transition reads a snapshot and, when its preconditions hold,
//! returns a new one. Illegal requests leave the input untouched; an action
//! against an unsuitable tile is the one rejection that leaves a log entry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    catalog::{Catalog, DisasterContext},
    ledger::Ledger,
    mission::Mission,
    rng::{DrawSource, RngManager, DISASTER_STREAM, MISSION_STREAM, WEATHER_STREAM},
    runtime::{
        terminal_status, DisasterState, EvaluationSummary, LogPhase, Phase, RuntimeSnapshot,
        SimulationView, Status, INITIAL_YEAR, PLAN_ACTIONS_PER_YEAR, SEASONS_PER_YEAR,
        TARGET_YEAR,
    },
    selection::{select_disaster, select_weather, DisasterDraw},
    tiles::ActionKind,
};

/// Inbound player requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SelectMode { mode_id: String },
    SelectRegion { region_id: String },
    StartCampaign,
    SelectAction { action: ActionKind },
    InteractTile { tile_id: String },
    AdvancePhase,
    ResolveDisaster { choice_id: String },
    ChooseAdaptation { option_id: String },
    BeginNextYear,
    Restart,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SelectMode { .. } => "select_mode",
            Command::SelectRegion { .. } => "select_region",
            Command::StartCampaign => "start_campaign",
            Command::SelectAction { .. } => "select_action",
            Command::InteractTile { .. } => "interact_tile",
            Command::AdvancePhase => "advance_phase",
            Command::ResolveDisaster { .. } => "resolve_disaster",
            Command::ChooseAdaptation { .. } => "choose_adaptation",
            Command::BeginNextYear => "begin_next_year",
            Command::Restart => "restart",
        }
    }
}

/// Result of applying a command. When `changed` is false `snapshot` equals
/// the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub snapshot: RuntimeSnapshot,
    pub changed: bool,
}

const CALM_SEASON_TITLE: &str = "Calm Season";
const CALM_SEASON_TEXT: &str = "Preparedness pays off: no major disaster strikes this year.";
const REJECTED_TITLE: &str = "Action Unavailable";
const REJECTED_TEXT: &str = "That tile cannot support the chosen action right now.";
const PLANNING_TEXT: &str = "Set priorities for the coming year to keep Earth in balance.";

pub struct Engine<D = RngManager> {
    catalog: Arc<Catalog>,
    draws: D,
}

impl Engine<RngManager> {
    pub fn seeded(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self::new(catalog, RngManager::new(seed))
    }
}

impl<D: DrawSource> Engine<D> {
    pub fn new(catalog: Arc<Catalog>, draws: D) -> Self {
        Self { catalog, draws }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn draws_mut(&mut self) -> &mut D {
        &mut self.draws
    }

    pub fn fresh(&self) -> RuntimeSnapshot {
        RuntimeSnapshot::fresh(&self.catalog)
    }

    pub fn view(&self, snapshot: &RuntimeSnapshot) -> SimulationView {
        SimulationView::build(snapshot, &self.catalog)
    }

    pub fn apply(&mut self, snapshot: &RuntimeSnapshot, command: &Command) -> Transition {
        let next = match command {
            Command::SelectMode { mode_id } => self.select_mode(snapshot, mode_id),
            Command::SelectRegion { region_id } => self.select_region(snapshot, region_id),
            Command::StartCampaign => self.start_campaign(snapshot),
            Command::SelectAction { action } => self.select_action(snapshot, *action),
            Command::InteractTile { tile_id } => self.interact_tile(snapshot, tile_id),
            Command::AdvancePhase => self.advance_phase(snapshot),
            Command::ResolveDisaster { choice_id } => self.resolve_disaster(snapshot, choice_id),
            Command::ChooseAdaptation { option_id } => {
                self.choose_adaptation(snapshot, option_id)
            }
            Command::BeginNextYear => self.begin_next_year(snapshot),
            Command::Restart => self.restart(snapshot),
        };
        match next {
            Some(snapshot) => Transition {
                snapshot,
                changed: true,
            },
            None => {
                debug!(command = command.name(), "command ignored");
                Transition {
                    snapshot: snapshot.clone(),
                    changed: false,
                }
            }
        }
    }

    pub fn select_mode(&self, snapshot: &RuntimeSnapshot, mode_id: &str) -> Option<RuntimeSnapshot> {
        if snapshot.status != Status::Setup
            || !self.catalog.has_mode(mode_id)
            || snapshot.mode_id.as_deref() == Some(mode_id)
        {
            return None;
        }
        let mut next = snapshot.clone();
        next.mode_id = Some(mode_id.to_string());
        Some(next)
    }

    pub fn select_region(
        &self,
        snapshot: &RuntimeSnapshot,
        region_id: &str,
    ) -> Option<RuntimeSnapshot> {
        if snapshot.status != Status::Setup
            || !self.catalog.has_region(region_id)
            || snapshot.region_id.as_deref() == Some(region_id)
        {
            return None;
        }
        let mut next = snapshot.clone();
        next.region_id = Some(region_id.to_string());
        Some(next)
    }

    pub fn start_campaign(&mut self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        if snapshot.status != Status::Setup {
            return None;
        }
        let (Some(mode_id), Some(region_id)) = (&snapshot.mode_id, &snapshot.region_id) else {
            return None;
        };
        let mission_draw = self.draws.draw(MISSION_STREAM);
        let catalog = &self.catalog;
        let mode = catalog.mode(Some(mode_id.as_str()));
        let region = catalog.region(Some(region_id.as_str()));
        let resources = catalog.starting_resources(mode, region);

        let mut next = RuntimeSnapshot {
            status: Status::Active,
            year: INITIAL_YEAR,
            phase: Phase::Plan,
            season_index: 0,
            plan_actions_remaining: PLAN_ACTIONS_PER_YEAR,
            tiles: catalog.tiles_for_region(region),
            selected_action: ActionKind::Plant,
            ledger: Ledger::opening(resources),
            mission: Mission::generate(&catalog.missions, mission_draw, snapshot.log_seq + 1),
            log: Vec::new(),
            current_weather: None,
            current_disaster: None,
            adaptation_taken: false,
            evaluation: None,
            ..snapshot.clone()
        };
        next.push_log(
            LogPhase::Setup,
            "Campaign Initiated",
            format!(
                "{} mode from {}: {}. Sustain all indices through {}.",
                mode.name, region.name, region.biome, TARGET_YEAR
            ),
        );
        info!(mode = %mode.id, region = %region.id, "campaign started");
        Some(next)
    }

    pub fn select_action(
        &self,
        snapshot: &RuntimeSnapshot,
        action: ActionKind,
    ) -> Option<RuntimeSnapshot> {
        if !snapshot.in_phase(Phase::Plan) || snapshot.selected_action == action {
            return None;
        }
        let mut next = snapshot.clone();
        next.selected_action = action;
        Some(next)
    }

    pub fn interact_tile(
        &self,
        snapshot: &RuntimeSnapshot,
        tile_id: &str,
    ) -> Option<RuntimeSnapshot> {
        if !snapshot.can_take_action() {
            return None;
        }
        let index = snapshot.tiles.iter().position(|tile| tile.id == tile_id)?;
        let action = snapshot.selected_action;
        let mut next = snapshot.clone();

        let Some(tile) = snapshot.tiles[index].transformed(action) else {
            debug!(tile = tile_id, action = action.as_str(), "action rejected");
            next.push_log(Phase::Plan, REJECTED_TITLE, REJECTED_TEXT);
            return Some(next);
        };
        next.tiles[index] = tile;
        next.plan_actions_remaining = next.plan_actions_remaining.saturating_sub(1);

        let definition = self.catalog.action(action);
        if let Some(definition) = definition {
            next.ledger.apply(&definition.effect);
        }

        let update = next.mission.as_ref().and_then(|mission| mission.record(action));
        if let Some(update) = update {
            if let Some(reward) = &update.reward {
                next.ledger.apply(reward);
                info!(mission = %update.mission.id, "mission complete");
            }
            next.push_log(Phase::Plan, update.title(), update.summary.clone());
            next.mission = Some(update.mission);
        }

        next.push_log(
            Phase::Plan,
            format!("{} action executed", capitalize(action.as_str())),
            definition
                .map(|definition| definition.narrative.clone())
                .unwrap_or_default(),
        );
        debug!(
            tile = tile_id,
            action = action.as_str(),
            remaining = next.plan_actions_remaining,
            "action executed"
        );
        Some(next)
    }

    /// Moves to the next phase of the year. From `evaluate` this starts the
    /// next year (or restarts a finished campaign).
    pub fn advance_phase(&mut self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        if snapshot.phase == Phase::Evaluate {
            return self.begin_next_year(snapshot);
        }
        if !snapshot.is_active() {
            return None;
        }
        match snapshot.phase {
            Phase::Plan => Some(self.enter_weather(snapshot)),
            Phase::Weather => Some(self.enter_disaster(snapshot)),
            Phase::Disaster => self.enter_adapt(snapshot),
            Phase::Adapt => self.enter_evaluate(snapshot),
            Phase::Evaluate => None,
        }
    }

    fn enter_weather(&mut self, snapshot: &RuntimeSnapshot) -> RuntimeSnapshot {
        let draw = self.draws.draw(WEATHER_STREAM);
        let catalog = &self.catalog;
        let mut next = snapshot.clone();
        next.phase = Phase::Weather;
        next.season_index = (snapshot.season_index + 1) % SEASONS_PER_YEAR;

        let region = snapshot
            .region_id
            .as_deref()
            .filter(|id| catalog.has_region(id))
            .map(|id| catalog.region(Some(id)));
        let season = catalog.season(next.season_index);
        let kind = select_weather(catalog, season, region, &next.ledger, draw);
        let condition = catalog.weather(kind);

        next.current_weather = Some(kind);
        next.ledger.apply(&condition.effect);
        next.push_log(
            Phase::Weather,
            format!("{} {} conditions", condition.icon, condition.label),
            condition.summary.clone(),
        );
        info!(
            year = next.year,
            season = season.label.as_str(),
            weather = condition.label.as_str(),
            "weather drawn"
        );
        next
    }

    fn enter_disaster(&mut self, snapshot: &RuntimeSnapshot) -> RuntimeSnapshot {
        let draw = self.draws.draw(DISASTER_STREAM);
        let catalog = &self.catalog;
        let mut next = snapshot.clone();
        next.phase = Phase::Disaster;
        next.season_index = 2;

        let mode = catalog.mode(snapshot.mode_id.as_deref());
        let region = catalog.region(snapshot.region_id.as_deref());
        let context = DisasterContext {
            resources: &snapshot.ledger.resources,
            scoreboard: &snapshot.ledger.scoreboard,
            co2_ppm: snapshot.ledger.co2_ppm,
            mode_id: &mode.id,
            region_id: &region.id,
            year: snapshot.year,
        };
        match select_disaster(catalog, &context, mode.modifiers.disaster_intensity, draw) {
            DisasterDraw::Calm => {
                next.current_disaster = None;
                next.push_log(Phase::Disaster, CALM_SEASON_TITLE, CALM_SEASON_TEXT);
                info!(year = next.year, "calm season");
            }
            DisasterDraw::Strike(disaster) => {
                next.current_disaster = Some(DisasterState::pending(disaster.id.clone()));
                next.push_log(
                    Phase::Disaster,
                    format!("{} {}", disaster.icon, disaster.name),
                    disaster.description.clone(),
                );
                info!(year = next.year, disaster = %disaster.id, "disaster strikes");
            }
        }
        next
    }

    pub fn resolve_disaster(
        &self,
        snapshot: &RuntimeSnapshot,
        choice_id: &str,
    ) -> Option<RuntimeSnapshot> {
        if !snapshot.in_phase(Phase::Disaster) {
            return None;
        }
        let state = snapshot.current_disaster.as_ref().filter(|state| !state.resolved)?;
        let disaster = self.catalog.disaster_or_first(&state.id);
        let choice = disaster.choice(choice_id)?;

        let mut next = snapshot.clone();
        next.ledger.apply(&choice.effect);
        let summary = choice.effect.to_string();
        next.current_disaster = Some(DisasterState {
            id: disaster.id.clone(),
            resolved: true,
            choice_id: Some(choice.id.clone()),
            summary: Some(summary.clone()),
        });
        next.push_log(Phase::Disaster, format!("{} enacted", choice.label), summary);
        info!(disaster = %disaster.id, choice = %choice.id, "disaster resolved");
        Some(next)
    }

    fn enter_adapt(&self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        if snapshot
            .current_disaster
            .as_ref()
            .is_some_and(|state| !state.resolved)
        {
            return None;
        }
        let mut next = snapshot.clone();
        next.phase = Phase::Adapt;
        next.season_index = 3;
        next.adaptation_taken = false;
        Some(next)
    }

    pub fn choose_adaptation(
        &self,
        snapshot: &RuntimeSnapshot,
        option_id: &str,
    ) -> Option<RuntimeSnapshot> {
        if !snapshot.in_phase(Phase::Adapt) || snapshot.adaptation_taken {
            return None;
        }
        let option = self.catalog.adaptation(option_id)?;
        let mut next = snapshot.clone();
        next.ledger.apply(&option.effect);
        next.adaptation_taken = true;
        next.push_log(
            Phase::Adapt,
            format!("{} enacted", option.label),
            option.effect.to_string(),
        );
        info!(adaptation = %option.id, "adaptation chosen");
        Some(next)
    }

    fn enter_evaluate(&self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        if !snapshot.adaptation_taken {
            return None;
        }
        let mode = self.catalog.mode(snapshot.mode_id.as_deref());
        let mut next = snapshot.clone();
        next.ledger.close_year(mode.modifiers.co2_trend);

        let ledger = next.ledger;
        let evaluation =
            EvaluationSummary::assess(&ledger.resources, &ledger.scoreboard, ledger.co2_ppm);
        if let Some(status) = terminal_status(next.year, &ledger.scoreboard, ledger.co2_ppm) {
            next.status = status;
        }
        next.phase = Phase::Evaluate;
        next.season_index = 3;
        next.push_log(
            Phase::Evaluate,
            format!("Year {} assessment", next.year),
            evaluation.narrative.clone(),
        );
        info!(
            year = next.year,
            outcome = ?evaluation.outcome,
            status = ?next.status,
            co2 = ledger.co2_ppm,
            "year evaluated"
        );
        next.evaluation = Some(evaluation);
        Some(next)
    }

    pub fn begin_next_year(&mut self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        if snapshot.phase != Phase::Evaluate {
            return None;
        }
        if !snapshot.is_active() {
            info!(status = ?snapshot.status, "campaign over, returning to setup");
            return Some(self.fresh());
        }

        let mut next = snapshot.clone();
        next.year += 1;
        next.phase = Phase::Plan;
        next.season_index = 0;
        next.plan_actions_remaining = PLAN_ACTIONS_PER_YEAR;
        next.selected_action = ActionKind::Plant;
        next.current_weather = None;
        next.current_disaster = None;
        next.adaptation_taken = false;
        next.evaluation = None;
        if snapshot.mission.as_ref().is_some_and(|mission| mission.completed) {
            let draw = self.draws.draw(MISSION_STREAM);
            // log_seq only grows within a campaign; restart resets it.
            next.mission = Mission::generate(&self.catalog.missions, draw, next.log_seq + 1);
        }
        next.push_log(
            Phase::Plan,
            format!("Planning for {}", next.year),
            PLANNING_TEXT,
        );
        debug!(year = next.year, "year started");
        Some(next)
    }

    pub fn restart(&self, snapshot: &RuntimeSnapshot) -> Option<RuntimeSnapshot> {
        let fresh = self.fresh();
        if *snapshot == fresh {
            return None;
        }
        info!("campaign restarted");
        Some(fresh)
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{ResourceState, ScoreboardState},
        rng::ScriptedDraws,
        runtime::Outcome,
        selection::WeatherKind,
    };

    fn engine(draws: impl IntoIterator<Item = f64>) -> Engine<ScriptedDraws> {
        Engine::new(
            Arc::new(Catalog::builtin().unwrap()),
            ScriptedDraws::new(draws),
        )
    }

    fn started(engine: &mut Engine<ScriptedDraws>, mode: &str, region: &str) -> RuntimeSnapshot {
        let mut snapshot = engine.fresh();
        for command in [
            Command::SelectMode {
                mode_id: mode.into(),
            },
            Command::SelectRegion {
                region_id: region.into(),
            },
            Command::StartCampaign,
        ] {
            let transition = engine.apply(&snapshot, &command);
            assert!(transition.changed, "{} did not apply", command.name());
            snapshot = transition.snapshot;
        }
        snapshot
    }

    #[test]
    fn commands_use_tagged_json() {
        let command: Command =
            serde_json::from_str(r#"{"type":"select_mode","mode_id":"survival"}"#).unwrap();
        assert_eq!(
            command,
            Command::SelectMode {
                mode_id: "survival".into()
            }
        );
        let command: Command =
            serde_json::from_str(r#"{"type":"select_action","action":"solar"}"#).unwrap();
        assert_eq!(
            command,
            Command::SelectAction {
                action: ActionKind::Solar
            }
        );
        let text = serde_json::to_string(&Command::AdvancePhase).unwrap();
        assert_eq!(text, r#"{"type":"advance_phase"}"#);
    }

    #[test]
    fn start_requires_both_selections() {
        let mut engine = engine([]);
        let fresh = engine.fresh();
        assert!(!engine.apply(&fresh, &Command::StartCampaign).changed);
        let with_mode = engine
            .apply(
                &fresh,
                &Command::SelectMode {
                    mode_id: "campaign".into(),
                },
            )
            .snapshot;
        let transition = engine.apply(&with_mode, &Command::StartCampaign);
        assert!(!transition.changed);
        assert_eq!(transition.snapshot, with_mode);
    }

    #[test]
    fn unknown_selections_are_ignored() {
        let mut engine = engine([]);
        let fresh = engine.fresh();
        let transition = engine.apply(
            &fresh,
            &Command::SelectRegion {
                region_id: "atlantis".into(),
            },
        );
        assert!(!transition.changed);
    }

    #[test]
    fn starting_builds_the_opening_state() {
        let mut engine = engine([0.6]);
        let snapshot = started(&mut engine, "campaign", "coastal");
        assert_eq!(snapshot.status, Status::Active);
        assert_eq!(snapshot.phase, Phase::Plan);
        assert_eq!(snapshot.year, INITIAL_YEAR);
        assert_eq!(snapshot.plan_actions_remaining, 3);
        assert_eq!(snapshot.ledger.co2_ppm, 420.0);
        assert_eq!(snapshot.tiles[2].kind, crate::tiles::TileKind::Wetland);
        assert_eq!(snapshot.ledger.resources.water, 84.0);
        let mission = snapshot.mission.as_ref().unwrap();
        assert_eq!(mission.action, ActionKind::Solar);
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(snapshot.log[0].title, "Campaign Initiated");
        assert_eq!(snapshot.log[0].phase, LogPhase::Setup);
        assert_eq!(
            snapshot.log[0].description,
            "Campaign mode from Coastal Delta: Estuary. Sustain all indices through 2100."
        );
    }

    #[test]
    fn selections_lock_once_started() {
        let mut engine = engine([0.0]);
        let snapshot = started(&mut engine, "campaign", "coastal");
        let transition = engine.apply(
            &snapshot,
            &Command::SelectMode {
                mode_id: "survival".into(),
            },
        );
        assert!(!transition.changed);
        assert!(!engine.apply(&snapshot, &Command::StartCampaign).changed);
    }

    #[test]
    fn planting_on_urban_tile_spends_an_action() {
        let mut engine = engine([0.0]);
        let snapshot = started(&mut engine, "campaign", "coastal");
        let before = snapshot.ledger;
        let next = engine
            .apply(
                &snapshot,
                &Command::InteractTile {
                    tile_id: "tile-2".into(),
                },
            )
            .snapshot;
        assert_eq!(next.tiles[1].kind, crate::tiles::TileKind::Forest);
        assert_eq!(next.tiles[1].health, 76.0);
        assert_eq!(next.tiles[1].pollution, 36.0);
        assert_eq!(next.plan_actions_remaining, 2);
        assert_eq!(next.ledger.co2_ppm, before.co2_ppm - 4.0);
        let titles: Vec<_> = next.log.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Campaign Initiated", "Mission Progress", "Plant action executed"]
        );
        assert_eq!(next.mission.as_ref().unwrap().progress, 1);
        assert_eq!(snapshot.plan_actions_remaining, 3);
    }

    #[test]
    fn rejected_action_logs_but_keeps_budget() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.selected_action = ActionKind::Clean;
        snapshot.tiles[0].pollution = 15.0;
        let transition = engine.apply(
            &snapshot,
            &Command::InteractTile {
                tile_id: "tile-1".into(),
            },
        );
        assert!(transition.changed);
        let next = transition.snapshot;
        assert_eq!(next.plan_actions_remaining, 3);
        assert_eq!(next.tiles, snapshot.tiles);
        assert_eq!(next.ledger, snapshot.ledger);
        assert_eq!(next.log.last().unwrap().title, "Action Unavailable");
    }

    #[test]
    fn budget_exhaustion_blocks_actions() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.plan_actions_remaining = 0;
        let transition = engine.apply(
            &snapshot,
            &Command::InteractTile {
                tile_id: "tile-2".into(),
            },
        );
        assert!(!transition.changed);
    }

    #[test]
    fn year_cycle_walks_every_phase() {
        // mission, weather, disaster
        let mut engine = engine([0.0, 0.0, 0.0]);
        let snapshot = started(&mut engine, "campaign", "coastal");

        let weather = engine.apply(&snapshot, &Command::AdvancePhase).snapshot;
        assert_eq!(weather.phase, Phase::Weather);
        assert_eq!(weather.season_index, 1);
        assert_eq!(weather.current_weather, Some(WeatherKind::Sunny));
        let sunny = engine.catalog().weather(WeatherKind::Sunny);
        assert_eq!(
            weather.log.last().unwrap().title,
            format!("{} Sunny conditions", sunny.icon)
        );

        let disaster = engine.apply(&weather, &Command::AdvancePhase).snapshot;
        assert_eq!(disaster.phase, Phase::Disaster);
        assert_eq!(disaster.season_index, 2);
        assert!(disaster.current_disaster.is_none());
        assert_eq!(disaster.log.last().unwrap().title, "Calm Season");

        let adapt = engine.apply(&disaster, &Command::AdvancePhase).snapshot;
        assert_eq!(adapt.phase, Phase::Adapt);
        assert_eq!(adapt.season_index, 3);

        let stuck = engine.apply(&adapt, &Command::AdvancePhase);
        assert!(!stuck.changed);

        let adapted = engine
            .apply(
                &adapt,
                &Command::ChooseAdaptation {
                    option_id: "innovation".into(),
                },
            )
            .snapshot;
        assert!(adapted.adaptation_taken);
        assert_eq!(adapted.log.last().unwrap().title, "Green Innovation Labs enacted");
        let again = engine.apply(
            &adapted,
            &Command::ChooseAdaptation {
                option_id: "community".into(),
            },
        );
        assert!(!again.changed);

        let evaluated = engine.apply(&adapted, &Command::AdvancePhase).snapshot;
        assert_eq!(evaluated.phase, Phase::Evaluate);
        assert_eq!(evaluated.status, Status::Active);
        assert!(evaluated.evaluation.is_some());
        assert_eq!(evaluated.log.last().unwrap().title, "Year 2080 assessment");

        let next_year = engine.apply(&evaluated, &Command::AdvancePhase).snapshot;
        assert_eq!(next_year.year, 2081);
        assert_eq!(next_year.phase, Phase::Plan);
        assert_eq!(next_year.season_index, 0);
        assert_eq!(next_year.plan_actions_remaining, 3);
        assert!(next_year.evaluation.is_none());
        assert!(next_year.current_weather.is_none());
        assert_eq!(next_year.mission, evaluated.mission);
        assert_eq!(next_year.log.last().unwrap().title, "Planning for 2081");
    }

    #[test]
    fn unresolved_disaster_blocks_adaptation() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.phase = Phase::Disaster;
        snapshot.current_disaster = Some(DisasterState::pending("flood"));

        let blocked = engine.apply(&snapshot, &Command::AdvancePhase);
        assert!(!blocked.changed);
        assert_eq!(blocked.snapshot, snapshot);

        let bogus = engine.apply(
            &snapshot,
            &Command::ResolveDisaster {
                choice_id: "pray".into(),
            },
        );
        assert!(!bogus.changed);

        let resolved = engine
            .apply(
                &snapshot,
                &Command::ResolveDisaster {
                    choice_id: "levees".into(),
                },
            )
            .snapshot;
        let state = resolved.current_disaster.as_ref().unwrap();
        assert!(state.resolved);
        assert_eq!(state.choice_id.as_deref(), Some("levees"));
        assert_eq!(resolved.log.last().unwrap().title, "Build Levees enacted");
        assert!(!engine
            .apply(
                &resolved,
                &Command::ResolveDisaster {
                    choice_id: "evacuate".into()
                }
            )
            .changed);

        let adapt = engine.apply(&resolved, &Command::AdvancePhase).snapshot;
        assert_eq!(adapt.phase, Phase::Adapt);
    }

    #[test]
    fn retired_disaster_resolves_against_first_deck_entry() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.phase = Phase::Disaster;
        snapshot.current_disaster = Some(DisasterState::pending("retired-event"));

        let view = engine.view(&snapshot);
        let shown = view.disaster.as_ref().unwrap();
        assert_eq!(shown.id, "flood");
        assert!(!shown.resolved);
        assert!(shown.choices.iter().any(|choice| choice.id == "levees"));

        let resolved = engine.apply(
            &snapshot,
            &Command::ResolveDisaster {
                choice_id: "levees".into(),
            },
        );
        assert!(resolved.changed);
        let state = resolved.snapshot.current_disaster.as_ref().unwrap();
        assert!(state.resolved);
        assert_eq!(state.id, "flood");

        let adapt = engine.apply(&resolved.snapshot, &Command::AdvancePhase);
        assert!(adapt.changed);
        assert_eq!(adapt.snapshot.phase, Phase::Adapt);
    }

    #[test]
    fn mission_reward_is_paid_exactly_once() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        let template = engine
            .catalog()
            .missions
            .iter()
            .find(|template| template.action == ActionKind::Solar)
            .unwrap()
            .clone();
        let mut mission = Mission::from_template(&template, 9);
        mission.progress = 1;
        snapshot.mission = Some(mission.clone());
        let solar = engine.catalog().action(ActionKind::Solar).unwrap().effect;

        let planted = engine
            .apply(
                &snapshot,
                &Command::InteractTile {
                    tile_id: "tile-2".into(),
                },
            )
            .snapshot;
        let note = &planted.log[planted.log.len() - 2];
        assert_eq!(note.title, "Mission Progress");
        assert_eq!(
            note.description,
            format!("Mission goal unchanged: {} (1/2).", mission.description)
        );
        assert_eq!(planted.mission.as_ref(), Some(&mission));

        let armed = engine
            .apply(
                &planted,
                &Command::SelectAction {
                    action: ActionKind::Solar,
                },
            )
            .snapshot;
        let completed = engine
            .apply(
                &armed,
                &Command::InteractTile {
                    tile_id: "tile-6".into(),
                },
            )
            .snapshot;
        let mut expected = armed.ledger;
        expected.apply(&solar);
        expected.apply(&mission.reward_effect());
        assert_eq!(completed.ledger, expected);
        let done = completed.mission.as_ref().unwrap();
        assert!(done.completed);
        assert_eq!(done.progress, 2);

        let again = engine
            .apply(
                &completed,
                &Command::InteractTile {
                    tile_id: "tile-16".into(),
                },
            )
            .snapshot;
        let mut expected = completed.ledger;
        expected.apply(&solar);
        assert_eq!(again.ledger, expected);
        assert_eq!(again.mission, completed.mission);
        assert_eq!(again.log.last().unwrap().title, "Solar action executed");
        let payouts = again
            .log
            .iter()
            .filter(|entry| entry.title == "Mission Complete")
            .count();
        assert_eq!(payouts, 1);
    }

    #[test]
    fn last_disaster_draw_strikes() {
        let mut engine = engine([0.0, 0.999]);
        let mut snapshot = started(&mut engine, "survival", "coastal");
        snapshot.phase = Phase::Weather;
        let next = engine.apply(&snapshot, &Command::AdvancePhase).snapshot;
        let state = next.current_disaster.as_ref().unwrap();
        assert_eq!(state.id, "climate-shift");
        assert!(!state.resolved);
        let summit = engine.catalog().disaster("climate-shift").unwrap();
        assert_eq!(
            next.log.last().unwrap().title,
            format!("{} Global Climate Summit", summit.icon)
        );
    }

    #[test]
    fn collapse_overrides_everything() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.phase = Phase::Adapt;
        snapshot.adaptation_taken = true;
        snapshot.ledger.resources = ResourceState::uniform(10.0);
        snapshot.ledger.scoreboard = ScoreboardState::uniform(15.0);
        snapshot.ledger.co2_ppm = 400.0;
        let next = engine.apply(&snapshot, &Command::AdvancePhase).snapshot;
        assert_eq!(next.status, Status::Collapse);
        assert_eq!(next.evaluation.as_ref().unwrap().outcome, Outcome::Critical);

        let frozen = engine.apply(
            &next,
            &Command::InteractTile {
                tile_id: "tile-2".into(),
            },
        );
        assert!(!frozen.changed);
        let reset = engine.apply(&next, &Command::BeginNextYear).snapshot;
        assert_eq!(reset, engine.fresh());
    }

    #[test]
    fn victory_at_target_year() {
        let mut engine = engine([0.0]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        snapshot.year = TARGET_YEAR;
        snapshot.phase = Phase::Adapt;
        snapshot.adaptation_taken = true;
        snapshot.ledger.resources = ResourceState::uniform(60.0);
        snapshot.ledger.scoreboard = ScoreboardState {
            sustainability: 60.0,
            happiness: 55.0,
            resilience: 52.0,
        };
        snapshot.ledger.co2_ppm = 455.0;
        let next = engine.apply(&snapshot, &Command::AdvancePhase).snapshot;
        assert_eq!(next.status, Status::Victory);
        assert!((next.ledger.co2_ppm - 457.8).abs() < 1e-9);
        assert!((next.ledger.scoreboard.happiness - 58.25).abs() < 1e-9);
    }

    #[test]
    fn completed_mission_is_replaced_next_year() {
        let mut engine = engine([0.0, 0.3]);
        let mut snapshot = started(&mut engine, "campaign", "coastal");
        let mut mission = snapshot.mission.clone().unwrap();
        mission.completed = true;
        mission.progress = mission.target;
        snapshot.mission = Some(mission.clone());
        snapshot.phase = Phase::Evaluate;
        let next = engine.apply(&snapshot, &Command::BeginNextYear).snapshot;
        let fresh = next.mission.unwrap();
        assert_ne!(fresh.id, mission.id);
        assert_eq!(fresh.action, ActionKind::Clean);
        assert_eq!(fresh.progress, 0);
    }

    #[test]
    fn restart_returns_to_setup() {
        let mut engine = engine([0.0]);
        let snapshot = started(&mut engine, "multiplayer", "arctic");
        let reset = engine.apply(&snapshot, &Command::Restart);
        assert!(reset.changed);
        assert_eq!(reset.snapshot.status, Status::Setup);
        assert!(!engine.apply(&reset.snapshot, &Command::Restart).changed);
    }

    #[test]
    fn mission_ids_are_scoped_to_one_campaign() {
        let mut engine = engine([0.0, 0.0, 0.0]);
        let first = started(&mut engine, "campaign", "coastal");
        let mut evaluated = first.clone();
        let mut done = evaluated.mission.clone().unwrap();
        done.completed = true;
        evaluated.mission = Some(done);
        evaluated.phase = Phase::Evaluate;
        let next_year = engine.apply(&evaluated, &Command::BeginNextYear).snapshot;
        assert_ne!(
            next_year.mission.as_ref().unwrap().id,
            first.mission.as_ref().unwrap().id
        );

        let reset = engine.apply(&first, &Command::Restart).snapshot;
        assert_eq!(reset.log_seq, 0);
        let again = started(&mut engine, "campaign", "coastal");
        assert_eq!(again.mission, first.mission);
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("wetland"), "Wetland");
        assert_eq!(capitalize(""), "");
    }
}
