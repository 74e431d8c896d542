//! Game state snapshot messages (`ra2yrproto.ra2yr` package).

/// One simulation snapshot. Every field is a full replacement of the
/// corresponding collection.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GameState {
    #[prost(uint32, tag = "1")]
    pub current_frame: u32,
    #[prost(message, repeated, tag = "2")]
    pub houses: Vec<House>,
    #[prost(message, repeated, tag = "3")]
    pub objects: Vec<Object>,
    #[prost(message, repeated, tag = "4")]
    pub factories: Vec<Factory>,
    #[prost(message, repeated, tag = "5")]
    pub object_types: Vec<ObjectTypeClass>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct House {
    /// Address of the house in the game process; other messages refer to it.
    #[prost(uint64, tag = "1")]
    pub self_: u64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int32, tag = "3")]
    pub money: i32,
    #[prost(int32, tag = "4")]
    pub power_output: i32,
    #[prost(int32, tag = "5")]
    pub power_drain: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Object {
    #[prost(uint64, tag = "1")]
    pub pointer_self: u64,
    #[prost(uint64, tag = "2")]
    pub pointer_house: u64,
    #[prost(uint64, tag = "3")]
    pub pointer_technotypeclass: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Factory {
    /// `pointer_self` of the object being produced.
    #[prost(uint64, tag = "1")]
    pub object: u64,
    /// `self_` of the owning house.
    #[prost(uint64, tag = "2")]
    pub owner: u64,
    #[prost(int32, tag = "3")]
    pub progress_timer: i32,
}

/// Type descriptor; objects point at it through `pointer_technotypeclass`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectTypeClass {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint64, tag = "2")]
    pub pointer_self: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StorageValue {
    /// Snapshot taken when the game started; carries the type catalog.
    #[prost(message, optional, tag = "1")]
    pub initial_game_state: Option<GameState>,
}

crate::impl_name!(
    "ra2yrproto.ra2yr",
    GameState,
    House,
    Object,
    Factory,
    ObjectTypeClass,
    StorageValue,
);
