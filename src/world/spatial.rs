use crate::types::{EntityId, EntityKind, Position};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

const NEAREST_START_RADIUS: i64 = 64;
const NEAREST_MAX_RADIUS: i64 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Own,
    Enemy,
}

/// One indexed entity. Positions are frozen for the lifetime of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Position,
    pub owner: Owner,
}

impl SpatialEntry {
    fn point(&self) -> [i64; 2] {
        [self.position.x as i64, self.position.y as i64]
    }
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point())
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[i64; 2]) -> i64 {
        let [x, y] = self.point();
        let dx = x - point[0];
        let dy = y - point[1];
        dx * dx + dy * dy
    }
}

/// Query area, boundaries included
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Rect { min: Position, max: Position },
    Circle { center: Position, radius: i32 },
}

/// Read-only R-tree over one snapshot's entities.
///
/// Built once per snapshot; the next frame gets a fresh index so queries
/// never see partially applied updates.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest entry matching `predicate`. Equidistant matches resolve to the lowest id.
    ///
    /// Searches growing circles, so entries farther than `NEAREST_MAX_RADIUS` are not found.
    pub fn nearest<P>(&self, point: Position, predicate: P) -> Option<&SpatialEntry>
    where
        P: Fn(&SpatialEntry) -> bool,
    {
        let query = [point.x as i64, point.y as i64];
        let mut radius = NEAREST_START_RADIUS;
        loop {
            let best = self
                .tree
                .locate_within_distance(query, radius * radius)
                .filter(|entry| predicate(*entry))
                .min_by_key(|entry| (entry.distance_2(&query), entry.id));
            if best.is_some() || radius >= NEAREST_MAX_RADIUS {
                return best;
            }
            radius *= 4;
        }
    }

    /// All entries inside `region`, ordered by id
    pub fn within(&self, region: Region) -> Vec<&SpatialEntry> {
        let mut found: Vec<&SpatialEntry> = match region {
            Region::Rect { min, max } => {
                // circumscribed circle, then clip to the rectangle
                let center = [
                    (min.x as i64 + max.x as i64) / 2,
                    (min.y as i64 + max.y as i64) / 2,
                ];
                let dx = (max.x as i64 - min.x as i64).abs() / 2 + 1;
                let dy = (max.y as i64 - min.y as i64).abs() / 2 + 1;
                self.tree
                    .locate_within_distance(center, dx * dx + dy * dy)
                    .filter(|entry| {
                        let p = entry.position;
                        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
                    })
                    .collect()
            }
            Region::Circle { center, radius } => {
                let radius = radius.max(0) as i64;
                self.tree
                    .locate_within_distance([center.x as i64, center.y as i64], radius * radius)
                    .collect()
            }
        };
        found.sort_by_key(|entry| entry.id);
        found
    }

    /// First free spot scanning square rings outward from `center`.
    ///
    /// A spot is free when no entity and no `reserved` site lies within
    /// `clearance`. Cost is bounded by `max_rings`.
    pub fn free_spot_near(
        &self,
        center: Position,
        clearance: i32,
        ring_step: i32,
        max_rings: i32,
        reserved: &[Position],
    ) -> Option<Position> {
        let clearance_2 = (clearance as i64) * (clearance as i64);
        for ring in 1..=max_rings {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let candidate =
                        Position::new(center.x + dx * ring_step, center.y + dy * ring_step);
                    if candidate.x < 0 || candidate.y < 0 {
                        continue;
                    }
                    let blocked = self
                        .tree
                        .locate_within_distance(
                            [candidate.x as i64, candidate.y as i64],
                            clearance_2,
                        )
                        .next()
                        .is_some()
                        || reserved
                            .iter()
                            .any(|site| site.distance_squared(&candidate) < clearance_2);
                    if !blocked {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildingKind, UnitKind};

    fn entry(id: u32, x: i32, y: i32, owner: Owner) -> SpatialEntry {
        SpatialEntry {
            id: EntityId(id),
            kind: EntityKind::Unit(UnitKind::Worker),
            position: Position::new(x, y),
            owner,
        }
    }

    #[test]
    fn test_nearest_respects_predicate() {
        let index = SpatialIndex::build(vec![
            entry(1, 10, 10, Owner::Own),
            entry(2, 12, 12, Owner::Enemy),
            entry(3, 100, 100, Owner::Enemy),
        ]);

        let nearest = index.nearest(Position::new(0, 0), |_| true).unwrap();
        assert_eq!(nearest.id, EntityId(1));

        let enemy = index
            .nearest(Position::new(0, 0), |e| e.owner == Owner::Enemy)
            .unwrap();
        assert_eq!(enemy.id, EntityId(2));

        assert!(index
            .nearest(Position::new(0, 0), |e| e.kind
                == EntityKind::Building(BuildingKind::Barracks))
            .is_none());
    }

    #[test]
    fn test_nearest_tie_breaks_on_id() {
        let index = SpatialIndex::build(vec![
            entry(7, 10, 0, Owner::Own),
            entry(3, -10, 0, Owner::Own),
        ]);
        let nearest = index.nearest(Position::new(0, 0), |_| true).unwrap();
        assert_eq!(nearest.id, EntityId(3));
    }

    #[test]
    fn test_within_rect_and_circle() {
        let index = SpatialIndex::build(vec![
            entry(1, 0, 0, Owner::Own),
            entry(2, 5, 5, Owner::Own),
            entry(3, 10, 10, Owner::Own),
            entry(4, 50, 50, Owner::Own),
        ]);

        let rect = index.within(Region::Rect {
            min: Position::new(0, 0),
            max: Position::new(10, 10),
        });
        let ids: Vec<u32> = rect.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let circle = index.within(Region::Circle {
            center: Position::new(0, 0),
            radius: 8,
        });
        let ids: Vec<u32> = circle.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_free_spot_avoids_occupied_cells() {
        let index = SpatialIndex::build(vec![entry(1, 100, 100, Owner::Own)]);
        let spot = index
            .free_spot_near(Position::new(100, 100), 40, 64, 4, &[])
            .unwrap();
        assert!(spot.distance_squared(&Position::new(100, 100)) >= 40 * 40);

        let next = index
            .free_spot_near(Position::new(100, 100), 40, 64, 4, &[spot])
            .unwrap();
        assert_ne!(next, spot);

        let empty = SpatialIndex::build(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(
            empty.free_spot_near(Position::new(0, 0), 10, 32, 2, &[]),
            Some(Position::new(32, 0))
        );
    }
}
