//! Army strength estimate: each unit counts its combat value scaled by
//! remaining health and researched bonuses.

use crate::types::{UnitKind, UpgradeKind};
use std::collections::BTreeSet;

const EPS: f64 = 1e-3;

pub fn unit_strength(unit: UnitKind, health: i32, researched: &BTreeSet<UpgradeKind>) -> f64 {
    let health_share = (health.max(0) as f64 / unit.max_health() as f64).min(1.0);
    let bonus: f64 = researched.iter().map(|u| u.combat_bonus(unit)).product();
    unit.combat_value() * health_share * bonus
}

pub fn army_strength<I>(units: I, researched: &BTreeSet<UpgradeKind>) -> f64
where
    I: IntoIterator<Item = (UnitKind, i32)>,
{
    units
        .into_iter()
        .map(|(unit, health)| unit_strength(unit, health, researched))
        .sum()
}

/// Chance-like score in (0, 1) that side A beats side B; above 0.5 favors A.
/// Two empty sides come out even.
pub fn win_ratio(a: f64, b: f64) -> f64 {
    let a = a.max(0.0);
    let b = b.max(0.0);
    (a + EPS) / (a + b + 2.0 * EPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_is_symmetric() {
        assert!((win_ratio(0.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((win_ratio(3.0, 7.0) + win_ratio(7.0, 3.0) - 1.0).abs() < 1e-12);
        assert!(win_ratio(8.0, 6.0) > 0.5);
    }

    #[test]
    fn test_upgrades_and_damage_scale_strength() {
        let none = BTreeSet::new();
        let stim: BTreeSet<UpgradeKind> = [UpgradeKind::StimPacks].into_iter().collect();

        let full = unit_strength(UnitKind::Marine, 40, &none);
        assert!((full - 4.0).abs() < 1e-12);
        assert!((unit_strength(UnitKind::Marine, 20, &none) - 2.0).abs() < 1e-12);
        assert!(unit_strength(UnitKind::Marine, 40, &stim) > full);
        assert!((unit_strength(UnitKind::Worker, 60, &stim) - 1.0).abs() < 1e-12);
    }
}
