//! Per-player views derived from the merged game state.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use yrwatch_proto::ra2yr::House;

use super::state::GameStateModel;

/// Houses that are not players.
const NON_PLAYER_HOUSES: [&str; 2] = ["Neutral", "Special"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerUnits {
    pub player: String,
    pub money: i32,
    pub power: i32,
    pub drain: i32,
    pub units: Vec<UnitCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedItem {
    pub name: String,
    pub progress: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildQueue {
    pub player: String,
    pub items: Vec<QueuedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub players: Vec<PlayerUnits>,
    pub build_queues: Vec<BuildQueue>,
}

impl GameSummary {
    pub fn from_model(model: &GameStateModel) -> Self {
        Self {
            players: unit_counts(model),
            build_queues: build_queues(model),
        }
    }
}

/// Catalog lookup from type address to type name.
struct TypeNames<'a>(HashMap<u64, &'a str>);

impl<'a> TypeNames<'a> {
    fn new(model: &'a GameStateModel) -> Self {
        Self(
            model
                .object_types
                .iter()
                .map(|t| (t.pointer_self, t.name.as_str()))
                .collect(),
        )
    }

    /// Types missing from the catalog are shown by address.
    fn name(&self, pointer: u64) -> String {
        match self.0.get(&pointer) {
            Some(name) => (*name).to_string(),
            None => format!("{:#x}", pointer),
        }
    }
}

fn is_player(house: &House) -> bool {
    !NON_PLAYER_HOUSES.contains(&house.name.as_str())
}

/// Unit counts for every player house, by type name.
///
/// Objects still being produced by a factory are not counted.
pub fn unit_counts(model: &GameStateModel) -> Vec<PlayerUnits> {
    let names = TypeNames::new(model);
    let in_production: Vec<u64> = model.factories.iter().map(|f| f.object).collect();

    model
        .houses
        .iter()
        .filter(|h| is_player(h))
        .map(|house| {
            let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
            let owned = model.objects.iter().filter(|o| {
                o.pointer_house == house.self_
                    && o.pointer_technotypeclass != 0
                    && !in_production.contains(&o.pointer_self)
            });
            for object in owned {
                *by_name
                    .entry(names.name(object.pointer_technotypeclass))
                    .or_default() += 1;
            }

            PlayerUnits {
                player: house.name.clone(),
                money: house.money,
                power: house.power_output,
                drain: house.power_drain,
                units: by_name
                    .into_iter()
                    .map(|(name, count)| UnitCount { name, count })
                    .collect(),
            }
        })
        .collect()
}

/// What each house is producing. Houses with nothing queued are left out.
pub fn build_queues(model: &GameStateModel) -> Vec<BuildQueue> {
    let names = TypeNames::new(model);
    let object_types: HashMap<u64, u64> = model
        .objects
        .iter()
        .map(|o| (o.pointer_self, o.pointer_technotypeclass))
        .collect();

    model
        .houses
        .iter()
        .filter_map(|house| {
            let items: Vec<QueuedItem> = model
                .factories
                .iter()
                .filter(|f| f.owner == house.self_)
                .map(|f| QueuedItem {
                    name: names.name(object_types.get(&f.object).copied().unwrap_or_default()),
                    progress: f.progress_timer,
                })
                .collect();
            (!items.is_empty()).then(|| BuildQueue {
                player: house.name.clone(),
                items,
            })
        })
        .collect()
}
