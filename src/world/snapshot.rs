use super::spatial::{Owner, SpatialEntry, SpatialIndex};
use crate::types::{BuildingKind, Cost, EntityId, EntityKind, Position, UnitKind, UpgradeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub minerals: i32,
    pub gas: i32,
    pub supply_used: i32,
    pub supply_cap: i32,
}

impl Resources {
    pub fn new(minerals: i32, gas: i32, supply_used: i32, supply_cap: i32) -> Self {
        Self {
            minerals,
            gas,
            supply_used,
            supply_cap,
        }
    }

    /// Spendable amounts, supply expressed as free headroom
    pub fn available(&self) -> Cost {
        Cost::new(self.gas, self.minerals, self.headroom())
    }

    pub fn headroom(&self) -> i32 {
        self.supply_cap - self.supply_used
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStatus {
    Idle,
    /// Training, researching, or (for workers) constructing
    Busy,
    UnderConstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Position,
    pub health: i32,
    pub status: EntityStatus,
}

impl OwnedEntity {
    pub fn is_complete(&self) -> bool {
        self.status != EntityStatus::UnderConstruction
    }

    pub fn is_idle(&self) -> bool {
        self.status == EntityStatus::Idle
    }

    pub fn unit_kind(&self) -> Option<UnitKind> {
        match self.kind {
            EntityKind::Unit(kind) => Some(kind),
            EntityKind::Building(_) => None,
        }
    }

    pub fn building_kind(&self) -> Option<BuildingKind> {
        match self.kind {
            EntityKind::Building(kind) => Some(kind),
            EntityKind::Unit(_) => None,
        }
    }
}

/// Enemy information is partial: only what was seen, and when.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemySighting {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Position,
    pub last_seen_frame: u32,
}

/// Immutable view of the game at one frame.
///
/// Superseded every frame; the spatial index is built together with the
/// snapshot and never updated afterwards.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    frame: u32,
    resources: Resources,
    own: Vec<OwnedEntity>,
    enemies: Vec<EnemySighting>,
    researched: BTreeSet<UpgradeKind>,
    enemy_base: Option<Position>,
    spatial: SpatialIndex,
}

impl WorldSnapshot {
    pub fn builder(frame: u32, resources: Resources) -> SnapshotBuilder {
        SnapshotBuilder {
            frame,
            resources,
            own: Vec::new(),
            enemies: Vec::new(),
            researched: BTreeSet::new(),
            enemy_base: None,
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn own(&self) -> &[OwnedEntity] {
        &self.own
    }

    pub fn enemies(&self) -> &[EnemySighting] {
        &self.enemies
    }

    pub fn researched(&self) -> &BTreeSet<UpgradeKind> {
        &self.researched
    }

    pub fn has_upgrade(&self, upgrade: UpgradeKind) -> bool {
        self.researched.contains(&upgrade)
    }

    /// Scouted or assumed enemy main base
    pub fn enemy_base(&self) -> Option<Position> {
        self.enemy_base
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn entity(&self, id: EntityId) -> Option<&OwnedEntity> {
        // own is sorted by id at build time
        self.own
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|index| &self.own[index])
    }

    /// True if a building of this kind exists, finished or not
    pub fn has_building(&self, kind: BuildingKind) -> bool {
        self.own.iter().any(|e| e.building_kind() == Some(kind))
    }

    pub fn completed_buildings(&self, kind: BuildingKind) -> usize {
        self.own
            .iter()
            .filter(|e| e.building_kind() == Some(kind) && e.is_complete())
            .count()
    }

    pub fn unit_count(&self, kind: UnitKind) -> usize {
        self.own
            .iter()
            .filter(|e| e.unit_kind() == Some(kind))
            .count()
    }

    /// Non-worker units
    pub fn army_size(&self) -> usize {
        self.own
            .iter()
            .filter(|e| matches!(e.unit_kind(), Some(kind) if !kind.is_worker()))
            .count()
    }

    /// Main base: the oldest command center, else the first owned entity
    pub fn base_position(&self) -> Position {
        self.own
            .iter()
            .filter(|e| e.building_kind() == Some(BuildingKind::CommandCenter))
            .min_by_key(|e| e.id)
            .or_else(|| self.own.iter().min_by_key(|e| e.id))
            .map(|e| e.position)
            .unwrap_or_default()
    }
}

pub struct SnapshotBuilder {
    frame: u32,
    resources: Resources,
    own: Vec<OwnedEntity>,
    enemies: Vec<EnemySighting>,
    researched: BTreeSet<UpgradeKind>,
    enemy_base: Option<Position>,
}

impl SnapshotBuilder {
    pub fn entity(mut self, entity: OwnedEntity) -> Self {
        self.own.push(entity);
        self
    }

    pub fn entities<I: IntoIterator<Item = OwnedEntity>>(mut self, entities: I) -> Self {
        self.own.extend(entities);
        self
    }

    pub fn enemy(mut self, sighting: EnemySighting) -> Self {
        self.enemies.push(sighting);
        self
    }

    pub fn researched(mut self, upgrade: UpgradeKind) -> Self {
        self.researched.insert(upgrade);
        self
    }

    pub fn enemy_base(mut self, position: Position) -> Self {
        self.enemy_base = Some(position);
        self
    }

    pub fn build(mut self) -> WorldSnapshot {
        self.own.sort_by_key(|e| e.id);
        self.enemies.sort_by_key(|e| e.id);

        let entries = self
            .own
            .iter()
            .map(|e| SpatialEntry {
                id: e.id,
                kind: e.kind,
                position: e.position,
                owner: Owner::Own,
            })
            .chain(self.enemies.iter().map(|e| SpatialEntry {
                id: e.id,
                kind: e.kind,
                position: e.position,
                owner: Owner::Enemy,
            }))
            .collect();

        WorldSnapshot {
            frame: self.frame,
            resources: self.resources,
            own: self.own,
            enemies: self.enemies,
            researched: self.researched,
            enemy_base: self.enemy_base,
            spatial: SpatialIndex::build(entries),
        }
    }
}
