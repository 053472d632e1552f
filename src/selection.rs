//! Weighted draws for weather and disasters.
//!
//! Every function here is pure: it sees the campaign state, the content
//! tables and a single draw in `[0, 1)`, so a fixed draw gives a fixed pick.

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, DisasterContext, DisasterDefinition, Region, Season},
    ledger::Ledger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherKind {
    Sunny,
    Rainy,
    Storm,
    Drought,
    Breezy,
    Heatwave,
    Blizzard,
}

impl WeatherKind {
    pub const ALL: [WeatherKind; 7] = [
        WeatherKind::Sunny,
        WeatherKind::Rainy,
        WeatherKind::Storm,
        WeatherKind::Drought,
        WeatherKind::Breezy,
        WeatherKind::Heatwave,
        WeatherKind::Blizzard,
    ];
}

/// Smallest weight any weather variant can carry.
pub const WEATHER_WEIGHT_FLOOR: f64 = 0.05;

/// Cumulative-weight roulette over `options`.
///
/// Options with a non-positive weight never win. Returns `None` only when no
/// option carries positive weight; callers substitute their own default.
pub fn weighted_choice<T: Copy>(options: &[(T, f64)], draw: f64) -> Option<T> {
    let eligible = || {
        options
            .iter()
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
    };
    let total: f64 = eligible().map(|(_, weight)| weight).sum();
    if total <= 0.0 {
        return None;
    }
    let draw = if draw.is_nan() { 0.0 } else { draw.clamp(0.0, 1.0) };
    let mut roll = draw * total;
    let mut last = None;
    for (option, weight) in eligible() {
        roll -= weight;
        if roll <= 0.0 {
            return Some(*option);
        }
        last = Some(*option);
    }
    last
}

/// Weather weights in catalog order, after season, region and state
/// adjustments and the positive floor.
pub fn weather_weights(
    catalog: &Catalog,
    season: &Season,
    region: Option<&Region>,
    ledger: &Ledger,
) -> Vec<(WeatherKind, f64)> {
    let resources = &ledger.resources;
    let co2_excess = ledger.co2_ppm - 450.0;
    catalog
        .weather
        .iter()
        .map(|condition| {
            let kind = condition.id;
            let mut weight = condition.base_weight;
            weight += season.weather_boost.get(&kind).copied().unwrap_or(0.0);
            if let Some(region) = region {
                weight += region.climate_bias.get(&kind).copied().unwrap_or(0.0);
            }

            use WeatherKind::*;
            if resources.water < 45.0 {
                if kind == Drought {
                    weight += 1.4;
                }
            } else if resources.water > 75.0 && kind == Rainy {
                weight += 0.9;
            }
            if resources.air_quality < 50.0 {
                match kind {
                    Storm => weight += 0.4,
                    Heatwave => weight += 0.3,
                    _ => {}
                }
            }
            if co2_excess > 0.0 {
                match kind {
                    Storm => weight += co2_excess / 25.0,
                    Heatwave => weight += co2_excess / 30.0,
                    Drought => weight += co2_excess / 28.0,
                    _ => {}
                }
            }
            if resources.energy > 70.0 {
                match kind {
                    Sunny => weight += 0.4,
                    Breezy => weight += 0.3,
                    _ => {}
                }
            }
            (kind, weight.max(WEATHER_WEIGHT_FLOOR))
        })
        .collect()
}

pub fn select_weather(
    catalog: &Catalog,
    season: &Season,
    region: Option<&Region>,
    ledger: &Ledger,
    draw: f64,
) -> WeatherKind {
    let weights = weather_weights(catalog, season, region, ledger);
    weighted_choice(&weights, draw).unwrap_or(catalog.weather[0].id)
}

/// Outcome of the disaster draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisasterDraw<'a> {
    Calm,
    Strike(&'a DisasterDefinition),
}

/// Draw weights: `None` is the calm slot and always comes first, `Some(i)`
/// indexes the disaster deck. Deck entries with non-positive weight are left
/// out.
pub fn disaster_weights(
    catalog: &Catalog,
    context: &DisasterContext<'_>,
    intensity: f64,
) -> Vec<(Option<usize>, f64)> {
    let calm = catalog
        .calm
        .weight(intensity, context.scoreboard.resilience);
    let mut weights = Vec::with_capacity(catalog.disasters.len() + 1);
    weights.push((None, calm));
    for (index, disaster) in catalog.disasters.iter().enumerate() {
        let weight = disaster.trigger.evaluate(context).max(0.0) * intensity;
        if weight > 0.0 {
            weights.push((Some(index), weight));
        }
    }
    weights
}

pub fn select_disaster<'a>(
    catalog: &'a Catalog,
    context: &DisasterContext<'_>,
    intensity: f64,
    draw: f64,
) -> DisasterDraw<'a> {
    let weights = disaster_weights(catalog, context, intensity);
    match weighted_choice(&weights, draw) {
        Some(None) => DisasterDraw::Calm,
        Some(Some(index)) => DisasterDraw::Strike(&catalog.disasters[index]),
        None => DisasterDraw::Strike(&catalog.disasters[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CalmWeight,
        ledger::{ResourceState, ScoreboardState},
    };

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    #[test]
    fn sole_weighted_option_always_wins() {
        let options = [("a", 0.0), ("b", 5.0), ("c", 0.0)];
        for step in 0..100 {
            let draw = step as f64 / 100.0;
            assert_eq!(weighted_choice(&options, draw), Some("b"));
        }
        assert_eq!(weighted_choice(&options, 0.999_999), Some("b"));
    }

    #[test]
    fn first_covering_option_wins_ties() {
        let options = [(1, 1.0), (2, 1.0)];
        assert_eq!(weighted_choice(&options, 0.0), Some(1));
        assert_eq!(weighted_choice(&options, 0.5), Some(1));
        assert_eq!(weighted_choice(&options, 0.5001), Some(2));
    }

    #[test]
    fn degenerate_tables_yield_nothing() {
        let options = [(1, 0.0), (2, -3.0), (3, f64::NAN)];
        assert_eq!(weighted_choice(&options, 0.3), None);
        assert_eq!(weighted_choice::<u8>(&[], 0.3), None);
    }

    #[test]
    fn summer_boosts_heat_and_drought() {
        let catalog = catalog();
        let ledger = Ledger::default();
        let spring = weather_weights(&catalog, catalog.season(0), None, &ledger);
        let summer = weather_weights(&catalog, catalog.season(1), None, &ledger);
        let weight = |table: &[(WeatherKind, f64)], kind| {
            table.iter().find(|(k, _)| *k == kind).map(|(_, w)| *w).unwrap()
        };
        assert!((weight(&spring, WeatherKind::Rainy) - 1.8).abs() < 1e-9);
        assert!((weight(&summer, WeatherKind::Drought) - 1.8).abs() < 1e-9);
        assert!((weight(&summer, WeatherKind::Heatwave) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn weather_weights_respect_the_floor() {
        let catalog = catalog();
        let desert = catalog.region(Some("desert"));
        let mut ledger = Ledger::default();
        ledger.resources.water = 60.0;
        let weights = weather_weights(&catalog, catalog.season(1), Some(desert), &ledger);
        assert!(weights.iter().all(|(_, w)| *w >= WEATHER_WEIGHT_FLOOR));
        let arctic = catalog.region(Some("arctic"));
        let winter = weather_weights(&catalog, catalog.season(0), Some(arctic), &ledger);
        let heat = winter
            .iter()
            .find(|(k, _)| *k == WeatherKind::Heatwave)
            .unwrap()
            .1;
        assert!((heat - 0.2).abs() < 1e-9);
    }

    #[test]
    fn high_co2_shifts_weather_toward_storms() {
        let catalog = catalog();
        let calm = Ledger::default();
        let mut hot = Ledger::default();
        hot.co2_ppm = 500.0;
        let storm = |ledger: &Ledger| {
            weather_weights(&catalog, catalog.season(0), None, ledger)
                .into_iter()
                .find(|(k, _)| *k == WeatherKind::Storm)
                .unwrap()
                .1
        };
        assert!((storm(&hot) - storm(&calm) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn first_draw_lands_on_first_weather() {
        let catalog = catalog();
        let kind = select_weather(&catalog, catalog.season(0), None, &Ledger::default(), 0.0);
        assert_eq!(kind, WeatherKind::Sunny);
    }

    fn context<'a>(
        resources: &'a ResourceState,
        scoreboard: &'a ScoreboardState,
    ) -> DisasterContext<'a> {
        DisasterContext {
            resources,
            scoreboard,
            co2_ppm: 420.0,
            mode_id: "campaign",
            region_id: "coastal",
            year: 2080,
        }
    }

    #[test]
    fn calm_slot_comes_first_and_scales_with_resilience() {
        let catalog = catalog();
        let resources = ResourceState::baseline();
        let scoreboard = ScoreboardState::uniform(60.0);
        let weights = disaster_weights(&catalog, &context(&resources, &scoreboard), 1.0);
        assert_eq!(weights[0], (None, 13.0));
        assert!(matches!(
            select_disaster(&catalog, &context(&resources, &scoreboard), 1.0, 0.0),
            DisasterDraw::Calm
        ));
        assert_eq!(CalmWeight::default().weight(3.0, 0.0), 2.0);
    }

    #[test]
    fn last_draw_strikes_with_a_deck_entry() {
        let catalog = catalog();
        let resources = ResourceState::baseline();
        let scoreboard = ScoreboardState::uniform(60.0);
        match select_disaster(&catalog, &context(&resources, &scoreboard), 1.4, 0.999) {
            DisasterDraw::Strike(disaster) => assert_eq!(disaster.id, "climate-shift"),
            DisasterDraw::Calm => panic!("expected a disaster"),
        }
    }

    #[test]
    fn non_positive_deck_weights_are_excluded() {
        let catalog = catalog();
        let resources = ResourceState::baseline();
        let scoreboard = ScoreboardState::uniform(60.0);
        let weights = disaster_weights(&catalog, &context(&resources, &scoreboard), 0.0);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].0, None);
    }
}
