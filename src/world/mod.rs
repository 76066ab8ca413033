pub mod snapshot;
pub mod spatial;

pub use snapshot::{
    EnemySighting, EntityStatus, OwnedEntity, Resources, WorldSnapshot,
};
pub use spatial::{Owner, Region, SpatialEntry, SpatialIndex};
