use serde::{Deserialize, Serialize};

use crate::{
    catalog::MissionTemplate,
    ledger::Effect,
    tiles::ActionKind,
};

/// The single active objective of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub action: ActionKind,
    pub target: u32,
    pub progress: u32,
    pub reward: f64,
    pub completed: bool,
}

impl Mission {
    /// A fresh mission from `template`; `serial` keeps ids unique within a
    /// campaign. Serials start over with each new campaign, so ids can repeat
    /// across restarts.
    pub fn from_template(template: &MissionTemplate, serial: u64) -> Self {
        Self {
            id: format!("{}-{:x}", template.id, serial),
            description: template.description.clone(),
            action: template.action,
            target: template.target,
            progress: 0,
            reward: template.reward,
            completed: false,
        }
    }

    /// Picks a template uniformly with `draw` in `[0, 1)`.
    pub fn generate(templates: &[MissionTemplate], draw: f64, serial: u64) -> Option<Self> {
        if templates.is_empty() {
            return None;
        }
        let draw = if draw.is_nan() { 0.0 } else { draw.clamp(0.0, 1.0) };
        let index = ((draw * templates.len() as f64) as usize).min(templates.len() - 1);
        Some(Self::from_template(&templates[index], serial))
    }

    pub fn status_line(&self) -> String {
        format!("{} ({}/{})", self.description, self.progress, self.target)
    }

    /// One-time payout granted when the mission completes.
    pub fn reward_effect(&self) -> Effect {
        let reward = self.reward;
        let mut effect = Effect::default();
        effect.resources.economy = reward / 60.0;
        effect.resources.happiness = reward / 80.0;
        match self.action {
            ActionKind::Plant => effect.resources.forest = 4.0,
            ActionKind::Wetland => effect.resources.water = 4.0,
            _ => {}
        }
        effect.scoreboard.sustainability = reward / 90.0;
        effect.scoreboard.happiness = reward / 100.0;
        effect.scoreboard.resilience = reward / 110.0;
        effect.co2 = match self.action {
            ActionKind::Plant => -reward / 120.0,
            _ => -reward / 200.0,
        };
        effect
    }

    /// Records one successful `action`. Returns `None` when there is nothing
    /// to track (the mission is already complete).
    pub fn record(&self, action: ActionKind) -> Option<MissionUpdate> {
        if self.completed {
            return None;
        }
        if self.action != action {
            return Some(MissionUpdate {
                mission: self.clone(),
                completed: false,
                reward: None,
                summary: format!("Mission goal unchanged: {}.", self.status_line()),
            });
        }

        let progress = (self.progress + 1).min(self.target);
        let completed = progress >= self.target;
        let mission = Mission {
            progress,
            completed,
            ..self.clone()
        };
        let (reward, summary) = if completed {
            (
                Some(self.reward_effect()),
                format!(
                    "Mission complete! Earned sustainability boost and {} community momentum.",
                    self.reward
                ),
            )
        } else {
            (
                None,
                format!("Mission progress advanced to {}/{}.", progress, self.target),
            )
        };
        Some(MissionUpdate {
            mission,
            completed,
            reward,
            summary,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionUpdate {
    pub mission: Mission,
    pub completed: bool,
    pub reward: Option<Effect>,
    pub summary: String,
}

impl MissionUpdate {
    pub fn title(&self) -> &'static str {
        if self.completed {
            "Mission Complete"
        } else {
            "Mission Progress"
        }
    }
}
