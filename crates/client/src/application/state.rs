//! Merged local view of the server's game state.
//!
//! The server reports state in pieces: full snapshots from `GetGameState` and
//! type catalogs from `ReadValue`. [`GameStateModel::merge`] folds each piece
//! in with a field-specific rule and reports every field it replaced.

use serde::Serialize;
use yrwatch_proto::commands::{GetGameState, ReadValue};
use yrwatch_proto::ra2yr::{Factory, GameState, House, Object, ObjectTypeClass};
use yrwatch_proto::{unpack, CommandResult};

use crate::error::ClientError;

/// Independently updatable fields of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    ObjectTypes,
    Houses,
    Objects,
    Factories,
}

impl StateField {
    pub fn as_str(self) -> &'static str {
        match self {
            StateField::ObjectTypes => "object_types",
            StateField::Houses => "houses",
            StateField::Objects => "objects",
            StateField::Factories => "factories",
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replaced field together with its new value.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    ObjectTypes(Vec<ObjectTypeClass>),
    Houses(Vec<House>),
    Objects(Vec<Object>),
    Factories(Vec<Factory>),
}

impl StateUpdate {
    pub fn field(&self) -> StateField {
        match self {
            StateUpdate::ObjectTypes(_) => StateField::ObjectTypes,
            StateUpdate::Houses(_) => StateField::Houses,
            StateUpdate::Objects(_) => StateField::Objects,
            StateUpdate::Factories(_) => StateField::Factories,
        }
    }

    /// Number of elements in the new value.
    pub fn len(&self) -> usize {
        match self {
            StateUpdate::ObjectTypes(v) => v.len(),
            StateUpdate::Houses(v) => v.len(),
            StateUpdate::Objects(v) => v.len(),
            StateUpdate::Factories(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Incoming state where every field may be absent.
///
/// Absent (`None`) and present-but-empty (`Some(vec![])`) are different: only
/// present fields take part in a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialGameState {
    pub object_types: Option<Vec<ObjectTypeClass>>,
    pub houses: Option<Vec<House>>,
    pub objects: Option<Vec<Object>>,
    pub factories: Option<Vec<Factory>>,
}

impl From<GameState> for PartialGameState {
    /// A full snapshot carries every field.
    fn from(state: GameState) -> Self {
        Self {
            object_types: Some(state.object_types),
            houses: Some(state.houses),
            objects: Some(state.objects),
            factories: Some(state.factories),
        }
    }
}

impl PartialGameState {
    /// Keep only the type catalog of `state`.
    pub fn object_types_only(state: GameState) -> Self {
        Self {
            object_types: Some(state.object_types),
            ..Self::default()
        }
    }
}

/// Consolidated local model, updated field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStateModel {
    pub object_types: Vec<ObjectTypeClass>,
    pub houses: Vec<House>,
    pub objects: Vec<Object>,
    pub factories: Vec<Factory>,
}

impl GameStateModel {
    /// Merge `partial` into the model and return the replaced fields, at most
    /// one update per field, in the order they were applied.
    ///
    /// - `object_types` is replaced only by a strictly longer catalog, so it
    ///   never shrinks.
    /// - `factories`, `houses` and `objects` are replaced wholesale whenever
    ///   present.
    pub fn merge(&mut self, partial: PartialGameState) -> Vec<StateUpdate> {
        let mut updates = Vec::new();

        if let Some(object_types) = partial.object_types {
            if object_types.len() > self.object_types.len() {
                self.object_types = object_types;
                updates.push(StateUpdate::ObjectTypes(self.object_types.clone()));
            }
        }
        if let Some(factories) = partial.factories {
            self.factories = factories;
            updates.push(StateUpdate::Factories(self.factories.clone()));
        }
        if let Some(houses) = partial.houses {
            self.houses = houses;
            updates.push(StateUpdate::Houses(self.houses.clone()));
        }
        if let Some(objects) = partial.objects {
            self.objects = objects;
            updates.push(StateUpdate::Objects(self.objects.clone()));
        }

        updates
    }

    /// Replay an update produced by another model's [`merge`](Self::merge).
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::ObjectTypes(v) => self.object_types = v,
            StateUpdate::Houses(v) => self.houses = v,
            StateUpdate::Objects(v) => self.objects = v,
            StateUpdate::Factories(v) => self.factories = v,
        }
    }
}

/// State carried by a command result, if it is one of the two kinds that feed
/// the model.
///
/// - `GetGameState` with a state: the full snapshot.
/// - `ReadValue` whose data holds an initial game state: its catalog only.
pub fn extract_state(result: &CommandResult) -> Result<Option<PartialGameState>, ClientError> {
    let Some(any) = result.result.as_ref().filter(|any| !any.value.is_empty()) else {
        return Ok(None);
    };

    if let Some(decoded) = unpack::<GetGameState>(any) {
        let state = decoded?.result.and_then(|r| r.state);
        return Ok(state.map(PartialGameState::from));
    }

    if let Some(decoded) = unpack::<ReadValue>(any) {
        let initial = decoded?
            .result
            .and_then(|r| r.data)
            .and_then(|data| data.initial_game_state);
        return Ok(initial.map(PartialGameState::object_types_only));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yrwatch_proto::commands::{get_game_state, read_value};
    use yrwatch_proto::pack;
    use yrwatch_proto::ra2yr::StorageValue;

    fn types(names: &[&str]) -> Vec<ObjectTypeClass> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ObjectTypeClass {
                name: name.to_string(),
                pointer_self: 100 + i as u64,
            })
            .collect()
    }

    fn house(name: &str) -> House {
        House {
            self_: 1,
            name: name.to_string(),
            ..House::default()
        }
    }

    #[test]
    fn catalog_never_shrinks() {
        let mut model = GameStateModel::default();
        model.merge(PartialGameState {
            object_types: Some(types(&["E1", "E2", "HTNK"])),
            ..Default::default()
        });

        let shorter = model.merge(PartialGameState {
            object_types: Some(types(&["E1"])),
            ..Default::default()
        });
        let same_length = model.merge(PartialGameState {
            object_types: Some(types(&["X", "Y", "Z"])),
            ..Default::default()
        });

        assert!(shorter.is_empty());
        assert!(same_length.is_empty());
        assert_eq!(model.object_types, types(&["E1", "E2", "HTNK"]));
    }

    #[test]
    fn longer_catalog_replaces_wholesale() {
        let mut model = GameStateModel::default();
        model.merge(PartialGameState {
            object_types: Some(types(&["E1", "E2"])),
            ..Default::default()
        });

        let updates = model.merge(PartialGameState {
            object_types: Some(types(&["A", "B", "C"])),
            ..Default::default()
        });

        assert_eq!(updates, vec![StateUpdate::ObjectTypes(types(&["A", "B", "C"]))]);
        assert_eq!(model.object_types, types(&["A", "B", "C"]));
    }

    #[test]
    fn present_empty_houses_replace_stored_houses() {
        let mut model = GameStateModel {
            houses: vec![house("Americans")],
            ..Default::default()
        };

        let updates = model.merge(PartialGameState {
            houses: Some(Vec::new()),
            ..Default::default()
        });

        assert!(model.houses.is_empty());
        assert_eq!(updates, vec![StateUpdate::Houses(Vec::new())]);
    }

    #[test]
    fn absent_houses_leave_stored_houses_untouched() {
        let mut model = GameStateModel {
            houses: vec![house("Americans")],
            ..Default::default()
        };

        let updates = model.merge(PartialGameState {
            objects: Some(Vec::new()),
            ..Default::default()
        });

        assert_eq!(model.houses, vec![house("Americans")]);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].field(), StateField::Objects);
    }

    #[test]
    fn full_snapshot_notifies_each_field_once() {
        let mut model = GameStateModel::default();
        let state = GameState {
            object_types: types(&["E1"]),
            houses: vec![house("Soviets")],
            ..GameState::default()
        };

        let updates = model.merge(state.into());
        let fields: Vec<StateField> = updates.iter().map(StateUpdate::field).collect();
        assert_eq!(
            fields,
            vec![
                StateField::ObjectTypes,
                StateField::Factories,
                StateField::Houses,
                StateField::Objects,
            ]
        );
    }

    #[test]
    fn apply_replays_updates_into_a_mirror() {
        let mut model = GameStateModel::default();
        let mut mirror = GameStateModel::default();
        let state = GameState {
            object_types: types(&["E1", "E2"]),
            houses: vec![house("Soviets")],
            ..GameState::default()
        };

        for update in model.merge(state.into()) {
            mirror.apply(update);
        }
        assert_eq!(mirror, model);
    }

    #[test]
    fn extract_state_reads_the_two_state_carrying_results() {
        let snapshot = GameState {
            object_types: types(&["E1"]),
            houses: vec![house("Soviets")],
            ..GameState::default()
        };
        let get = CommandResult {
            command_id: 1,
            result: Some(pack(&GetGameState {
                result: Some(get_game_state::Output {
                    state: Some(snapshot.clone()),
                }),
            })),
        };
        assert_eq!(
            extract_state(&get).unwrap(),
            Some(PartialGameState::from(snapshot.clone()))
        );

        let read = CommandResult {
            command_id: 2,
            result: Some(pack(&ReadValue {
                args: None,
                result: Some(read_value::Output {
                    data: Some(StorageValue {
                        initial_game_state: Some(snapshot),
                    }),
                }),
            })),
        };
        let partial = extract_state(&read).unwrap().unwrap();
        assert_eq!(partial.object_types, Some(types(&["E1"])));
        assert_eq!(partial.houses, None);
    }

    #[test]
    fn extract_state_ignores_other_results() {
        let no_payload = CommandResult {
            command_id: 1,
            result: None,
        };
        assert_eq!(extract_state(&no_payload).unwrap(), None);

        let unrelated = CommandResult {
            command_id: 2,
            result: Some(pack(&house("Soviets"))),
        };
        assert_eq!(extract_state(&unrelated).unwrap(), None);

        let without_state = CommandResult {
            command_id: 3,
            result: Some(pack(&GetGameState { result: None })),
        };
        assert_eq!(extract_state(&without_state).unwrap(), None);
    }
}
