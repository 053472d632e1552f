//! Single-writer ownership of a running campaign.
//!
//! [`Campaign`] holds the only live snapshot. Every command goes through
//! [`Campaign::apply`], which swaps in the new snapshot and persists it.
//! [`Autopilot`] is a greedy player used by the headless runner.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    engine::{Command, Engine},
    ledger::{Effect, Ledger},
    persistence::{PersistError, SaveSlot, SnapshotStore},
    rng::DrawSource,
    runtime::{EvaluationSummary, Phase, RuntimeSnapshot, SimulationView, Status},
    tiles::ActionKind,
};

pub struct Campaign<D, S> {
    engine: Engine<D>,
    slot: SaveSlot<S>,
    snapshot: RuntimeSnapshot,
    dirty: bool,
}

impl<D: DrawSource, S: SnapshotStore> Campaign<D, S> {
    /// Resumes whatever the slot holds, or starts from setup.
    pub fn open(engine: Engine<D>, slot: SaveSlot<S>) -> Self {
        let snapshot = slot.load_or_fresh(engine.catalog());
        Self {
            engine,
            slot,
            snapshot,
            dirty: false,
        }
    }

    pub fn snapshot(&self) -> &RuntimeSnapshot {
        &self.snapshot
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    pub fn view(&self) -> SimulationView {
        self.engine.view(&self.snapshot)
    }

    pub fn slot(&self) -> &SaveSlot<S> {
        &self.slot
    }

    /// True when the last save failed and a flush is outstanding.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Applies `command`, persisting the result when anything changed.
    /// A failed save is logged and retried by the next save or flush.
    pub fn apply(&mut self, command: &Command) -> bool {
        let transition = self.engine.apply(&self.snapshot, command);
        if !transition.changed {
            return false;
        }
        self.snapshot = transition.snapshot;
        if let Err(err) = self.slot.save(&self.snapshot) {
            warn!(error = %err, command = command.name(), "campaign save failed");
            self.dirty = true;
        } else {
            self.dirty = false;
        }
        true
    }

    /// Best-effort save of the current snapshot.
    pub fn flush(&mut self) -> Result<(), PersistError> {
        self.slot.save(&self.snapshot)?;
        self.dirty = false;
        debug!(year = self.snapshot.year, "campaign flushed");
        Ok(())
    }

    pub fn onboarding_seen(&self) -> bool {
        self.slot.onboarding_seen()
    }

    pub fn mark_onboarding_seen(&mut self) -> Result<(), PersistError> {
        self.slot.mark_onboarding_seen()
    }
}

/// One evaluated year of an autoplayed campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearReport {
    pub year: u32,
    pub status: Status,
    pub co2_ppm: f64,
    pub evaluation: EvaluationSummary,
}

/// Greedy policy: always picks the option whose effect leaves the best
/// projected scoreboard.
#[derive(Debug, Clone)]
pub struct Autopilot {
    pub mode_id: String,
    pub region_id: String,
}

const MISSION_BONUS: f64 = 4.0;
const STEP_LIMIT_PER_YEAR: usize = 64;

fn merit(ledger: &Ledger, effect: &Effect) -> f64 {
    let mut projected = *ledger;
    projected.apply(effect);
    let scores = projected.scoreboard;
    scores.sustainability + scores.happiness + scores.resilience - 0.5 * projected.co2_ppm
}

impl Autopilot {
    pub fn new(mode_id: impl Into<String>, region_id: impl Into<String>) -> Self {
        Self {
            mode_id: mode_id.into(),
            region_id: region_id.into(),
        }
    }

    pub fn next_command(&self, snapshot: &RuntimeSnapshot, catalog: &Catalog) -> Command {
        if snapshot.status == Status::Setup {
            return self.setup_command(snapshot);
        }
        match snapshot.phase {
            Phase::Plan => self.plan_command(snapshot, catalog),
            Phase::Disaster => {
                let pending = snapshot
                    .current_disaster
                    .as_ref()
                    .filter(|state| !state.resolved)
                    .map(|state| catalog.disaster_or_first(&state.id));
                match pending.and_then(|disaster| {
                    disaster.choices.iter().max_by(|a, b| {
                        merit(&snapshot.ledger, &a.effect)
                            .total_cmp(&merit(&snapshot.ledger, &b.effect))
                    })
                }) {
                    Some(choice) => Command::ResolveDisaster {
                        choice_id: choice.id.clone(),
                    },
                    None => Command::AdvancePhase,
                }
            }
            Phase::Adapt if !snapshot.adaptation_taken => {
                let best = catalog.adaptations.iter().max_by(|a, b| {
                    merit(&snapshot.ledger, &a.effect).total_cmp(&merit(&snapshot.ledger, &b.effect))
                });
                match best {
                    Some(option) => Command::ChooseAdaptation {
                        option_id: option.id.clone(),
                    },
                    None => Command::AdvancePhase,
                }
            }
            Phase::Evaluate => Command::BeginNextYear,
            _ => Command::AdvancePhase,
        }
    }

    fn setup_command(&self, snapshot: &RuntimeSnapshot) -> Command {
        if snapshot.mode_id.as_deref() != Some(self.mode_id.as_str()) {
            Command::SelectMode {
                mode_id: self.mode_id.clone(),
            }
        } else if snapshot.region_id.as_deref() != Some(self.region_id.as_str()) {
            Command::SelectRegion {
                region_id: self.region_id.clone(),
            }
        } else {
            Command::StartCampaign
        }
    }

    fn plan_command(&self, snapshot: &RuntimeSnapshot, catalog: &Catalog) -> Command {
        if !snapshot.can_take_action() {
            return Command::AdvancePhase;
        }
        let mission_action = snapshot
            .mission
            .as_ref()
            .filter(|mission| !mission.completed)
            .map(|mission| mission.action);

        let best = ActionKind::ALL
            .iter()
            .filter_map(|&action| {
                let tile = snapshot.tiles.iter().find(|tile| tile.supports(action))?;
                let mut score = catalog
                    .action(action)
                    .map(|definition| merit(&snapshot.ledger, &definition.effect))
                    .unwrap_or(f64::MIN);
                if mission_action == Some(action) {
                    score += MISSION_BONUS;
                }
                Some((action, tile.id.clone(), score))
            })
            .max_by(|a, b| a.2.total_cmp(&b.2));

        match best {
            Some((action, _, _)) if action != snapshot.selected_action => {
                Command::SelectAction { action }
            }
            Some((_, tile_id, _)) => Command::InteractTile { tile_id },
            None => Command::AdvancePhase,
        }
    }

    /// Plays up to `years` evaluated years, or until the campaign ends.
    /// Stops early if a command is refused, since the policy would only
    /// repeat it.
    pub fn play<D: DrawSource, S: SnapshotStore>(
        &self,
        campaign: &mut Campaign<D, S>,
        years: u32,
    ) -> Vec<YearReport> {
        let mut reports = Vec::new();
        let step_limit = STEP_LIMIT_PER_YEAR * (years as usize + 1);
        for _ in 0..step_limit {
            let snapshot = campaign.snapshot();
            if snapshot.phase == Phase::Evaluate
                && (reports.len() >= years as usize || snapshot.status.is_terminal())
            {
                break;
            }
            let command = self.next_command(snapshot, campaign.catalog());
            let before = snapshot.phase;
            if !campaign.apply(&command) {
                warn!(command = command.name(), "autopilot stalled");
                break;
            }
            let after = campaign.snapshot();
            if before == Phase::Adapt && after.phase == Phase::Evaluate {
                if let Some(evaluation) = &after.evaluation {
                    info!(
                        year = after.year,
                        outcome = ?evaluation.outcome,
                        status = ?after.status,
                        "autopilot year complete"
                    );
                    reports.push(YearReport {
                        year: after.year,
                        status: after.status,
                        co2_ppm: after.ledger.co2_ppm,
                        evaluation: evaluation.clone(),
                    });
                }
            }
        }
        reports
    }
}
