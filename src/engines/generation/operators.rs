use crate::engines::generation::genome::{Directive, DirectiveKind, Genome, TechState, Trigger};
use crate::types::{BuildingKind, GenomeId, UnitKind, UpgradeKind};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

const MAX_TRIGGER_FRAME: u32 = 20_000;
const MAX_SUPPLY_MARGIN: u32 = 16;
const MAX_WAVE_SIZE: u32 = 60;

/// Tournament selection: pick best of K random candidates
pub fn tournament_selection<R: Rng>(
    population: &[(Arc<Genome>, f64)],
    tournament_size: usize,
    rng: &mut R,
) -> Arc<Genome> {
    let mut best_idx = rng.gen_range(0..population.len());
    let mut best_fitness = population[best_idx].1;

    for _ in 1..tournament_size {
        let idx = rng.gen_range(0..population.len());
        if population[idx].1 > best_fitness {
            best_idx = idx;
            best_fitness = population[idx].1;
        }
    }

    Arc::clone(&population[best_idx].0)
}

/// Roulette wheel selection: probability proportional to fitness
pub fn roulette_selection<R: Rng>(population: &[(Arc<Genome>, f64)], rng: &mut R) -> Arc<Genome> {
    let total_fitness: f64 = population.iter().map(|(_, f)| f.max(0.0)).sum();

    if total_fitness <= 0.0 {
        // Nothing scored above zero, pick uniformly
        return Arc::clone(&population[rng.gen_range(0..population.len())].0);
    }

    let mut spin = rng.gen::<f64>() * total_fitness;

    for (genome, fitness) in population {
        spin -= fitness.max(0.0);
        if spin <= 0.0 {
            return Arc::clone(genome);
        }
    }

    Arc::clone(&population[population.len() - 1].0)
}

/// N-point crossover over directive sequences.
///
/// Cut points fall on directive boundaries only. Parents may differ in
/// length, so each cut is placed at the same relative position in both.
pub fn crossover<R: Rng>(
    parent1: &[Directive],
    parent2: &[Directive],
    points: usize,
    rng: &mut R,
) -> (Vec<Directive>, Vec<Directive>) {
    if parent1.is_empty() || parent2.is_empty() || points == 0 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let mut fractions: Vec<f64> = (0..points).map(|_| rng.gen::<f64>()).collect();
    fractions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let cuts = |len: usize| -> Vec<usize> {
        let mut cuts: Vec<usize> = fractions
            .iter()
            .map(|f| ((f * len as f64).round() as usize).min(len))
            .collect();
        cuts.push(len);
        cuts
    };
    let cuts1 = cuts(parent1.len());
    let cuts2 = cuts(parent2.len());

    let mut child1 = Vec::with_capacity(parent1.len());
    let mut child2 = Vec::with_capacity(parent2.len());
    let (mut start1, mut start2) = (0, 0);

    for (segment, (&end1, &end2)) in cuts1.iter().zip(&cuts2).enumerate() {
        let from1 = &parent1[start1..end1];
        let from2 = &parent2[start2..end2];
        if segment % 2 == 0 {
            child1.extend_from_slice(from1);
            child2.extend_from_slice(from2);
        } else {
            child1.extend_from_slice(from2);
            child2.extend_from_slice(from1);
        }
        start1 = end1;
        start2 = end2;
    }

    (child1, child2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Jitter,
    Insert,
    Delete,
    Substitute,
}

/// Mutation: each directive is hit with probability `mutation_rate`.
///
/// Inserted and substituted directives are drawn against the tech reachable
/// at their position; deletions can still break later directives, so the
/// caller re-validates the result.
pub fn mutate<R: Rng>(
    directives: &mut Vec<Directive>,
    mutation_rate: f64,
    start: &TechState,
    max_len: usize,
    rng: &mut R,
) {
    let original = std::mem::take(directives);
    let mut state = start.clone();

    if original.is_empty() && rng.gen::<f64>() < mutation_rate {
        directives.push(random_directive(&state, rng));
        return;
    }

    for directive in original {
        if rng.gen::<f64>() >= mutation_rate {
            state.apply(&directive);
            directives.push(directive);
            continue;
        }

        let op = *[
            Mutation::Jitter,
            Mutation::Insert,
            Mutation::Delete,
            Mutation::Substitute,
        ]
        .choose(rng)
        .unwrap_or(&Mutation::Jitter);

        match op {
            Mutation::Jitter => {
                let jittered = jitter(&directive, &state, rng);
                state.apply(&jittered);
                directives.push(jittered);
            }
            Mutation::Insert => {
                state.apply(&directive);
                directives.push(directive);
                if directives.len() < max_len {
                    let inserted = random_directive(&state, rng);
                    state.apply(&inserted);
                    directives.push(inserted);
                }
            }
            Mutation::Delete => {}
            Mutation::Substitute => {
                let replacement = random_directive_except(&state, directive.kind(), rng)
                    .unwrap_or_else(|| jitter(&directive, &state, rng));
                state.apply(&replacement);
                directives.push(replacement);
            }
        }
    }

    directives.truncate(max_len);
}

/// Perturb numeric parameters, keeping the directive kind
pub fn jitter<R: Rng>(directive: &Directive, state: &TechState, rng: &mut R) -> Directive {
    let mut mutated = directive.clone();
    match &mut mutated {
        Directive::SetSupplyThreshold { margin } => {
            *margin = nudge(*margin, 2, 0, MAX_SUPPLY_MARGIN, rng);
        }
        Directive::IssueAttackWave { min_army, trigger } => {
            *min_army = nudge(*min_army, 3, 0, MAX_WAVE_SIZE, rng);
            *trigger = jitter_trigger(trigger, state, rng);
        }
        Directive::ProduceUnit { trigger, .. }
        | Directive::ConstructBuilding { trigger, .. }
        | Directive::ResearchUpgrade { trigger, .. }
        | Directive::WaitUntil { condition: trigger } => {
            *trigger = jitter_trigger(trigger, state, rng);
        }
    }
    mutated
}

fn jitter_trigger<R: Rng>(trigger: &Trigger, state: &TechState, rng: &mut R) -> Trigger {
    match *trigger {
        Trigger::Always | Trigger::HasBuilding(_) => random_trigger(state, rng),
        Trigger::AtFrame(frame) => Trigger::AtFrame(scale(frame, 0, MAX_TRIGGER_FRAME, rng)),
        Trigger::MineralsAtLeast(amount) => Trigger::MineralsAtLeast(scale(amount, 0, 2000, rng)),
        Trigger::GasAtLeast(amount) => Trigger::GasAtLeast(scale(amount, 1, 1000, rng)),
        Trigger::SupplyHeadroomAtMost(margin) => {
            Trigger::SupplyHeadroomAtMost(nudge(margin, 2, 0, MAX_SUPPLY_MARGIN, rng))
        }
        Trigger::ArmyAtLeast(count) => Trigger::ArmyAtLeast(nudge(count, 3, 1, MAX_WAVE_SIZE, rng)),
    }
}

/// Multiply by a factor in [0.8, 1.2], with a floor step so small values still move
fn scale<R: Rng>(value: u32, min: u32, max: u32, rng: &mut R) -> u32 {
    let factor = rng.gen_range(0.8..=1.2);
    let scaled = (value as f64 * factor).round() as i64 + rng.gen_range(-10..=10);
    scaled.clamp(min as i64, max as i64) as u32
}

fn nudge<R: Rng>(value: u32, step: i64, min: u32, max: u32, rng: &mut R) -> u32 {
    let delta = rng.gen_range(-step..=step);
    (value as i64 + delta).clamp(min as i64, max as i64) as u32
}

pub fn random_trigger<R: Rng>(state: &TechState, rng: &mut R) -> Trigger {
    let mut options = vec![0, 0, 1, 2, 4, 5];
    if state.gas_available() {
        options.push(3);
    }
    if BuildingKind::ALL.iter().any(|b| state.has(*b)) {
        options.push(6);
    }

    match options.choose(rng).copied().unwrap_or(0) {
        1 => Trigger::AtFrame(rng.gen_range(0..=MAX_TRIGGER_FRAME / 24) * 24),
        2 => Trigger::MineralsAtLeast(rng.gen_range(1..=16) * 50),
        3 => Trigger::GasAtLeast(rng.gen_range(1..=16) * 25),
        4 => Trigger::SupplyHeadroomAtMost(rng.gen_range(0..=8)),
        5 => Trigger::ArmyAtLeast(rng.gen_range(1..=30)),
        6 => {
            let owned: Vec<BuildingKind> = BuildingKind::ALL
                .iter()
                .copied()
                .filter(|b| state.has(*b))
                .collect();
            owned
                .choose(rng)
                .map(|b| Trigger::HasBuilding(*b))
                .unwrap_or(Trigger::Always)
        }
        _ => Trigger::Always,
    }
}

/// Random directive of the given kind that is legal after `state`, if any
pub fn random_directive_of<R: Rng>(
    kind: DirectiveKind,
    state: &TechState,
    rng: &mut R,
) -> Option<Directive> {
    let trigger = random_trigger(state, rng);
    let candidate = match kind {
        DirectiveKind::ProduceUnit => {
            let units: Vec<UnitKind> = UnitKind::ALL
                .iter()
                .copied()
                .filter(|u| {
                    state
                        .check(&Directive::ProduceUnit {
                            unit: *u,
                            trigger: Trigger::Always,
                        })
                        .is_ok()
                })
                .collect();
            Directive::ProduceUnit {
                unit: *units.choose(rng)?,
                trigger,
            }
        }
        DirectiveKind::ConstructBuilding => {
            let buildings: Vec<BuildingKind> = BuildingKind::ALL
                .iter()
                .copied()
                .filter(|b| {
                    state
                        .check(&Directive::ConstructBuilding {
                            building: *b,
                            trigger: Trigger::Always,
                        })
                        .is_ok()
                })
                .collect();
            Directive::ConstructBuilding {
                building: *buildings.choose(rng)?,
                trigger,
            }
        }
        DirectiveKind::ResearchUpgrade => {
            let upgrades: Vec<UpgradeKind> = UpgradeKind::ALL
                .iter()
                .copied()
                .filter(|u| {
                    state
                        .check(&Directive::ResearchUpgrade {
                            upgrade: *u,
                            trigger: Trigger::Always,
                        })
                        .is_ok()
                })
                .collect();
            Directive::ResearchUpgrade {
                upgrade: *upgrades.choose(rng)?,
                trigger,
            }
        }
        DirectiveKind::SetSupplyThreshold => Directive::SetSupplyThreshold {
            margin: rng.gen_range(0..=8),
        },
        DirectiveKind::IssueAttackWave => Directive::IssueAttackWave {
            min_army: rng.gen_range(1..=30),
            trigger,
        },
        DirectiveKind::WaitUntil => Directive::WaitUntil { condition: trigger },
    };

    state.check(&candidate).ok().map(|_| candidate)
}

fn random_directive_except<R: Rng>(
    state: &TechState,
    excluded: DirectiveKind,
    rng: &mut R,
) -> Option<Directive> {
    let mut kinds: Vec<DirectiveKind> = DirectiveKind::ALL
        .iter()
        .copied()
        .filter(|k| *k != excluded)
        .collect();
    kinds.shuffle(rng);
    kinds
        .into_iter()
        .find_map(|kind| random_directive_of(kind, state, rng))
}

/// Random directive legal after `state`. Build orders lean on production
/// and construction, so those kinds are drawn more often.
pub fn random_directive<R: Rng>(state: &TechState, rng: &mut R) -> Directive {
    const WEIGHTED: [DirectiveKind; 10] = [
        DirectiveKind::ProduceUnit,
        DirectiveKind::ProduceUnit,
        DirectiveKind::ProduceUnit,
        DirectiveKind::ConstructBuilding,
        DirectiveKind::ConstructBuilding,
        DirectiveKind::ConstructBuilding,
        DirectiveKind::ResearchUpgrade,
        DirectiveKind::SetSupplyThreshold,
        DirectiveKind::IssueAttackWave,
        DirectiveKind::WaitUntil,
    ];

    for _ in 0..16 {
        let kind = WEIGHTED[rng.gen_range(0..WEIGHTED.len())];
        if let Some(directive) = random_directive_of(kind, state, rng) {
            return directive;
        }
    }

    Directive::WaitUntil {
        condition: Trigger::AtFrame(rng.gen_range(0..=MAX_TRIGGER_FRAME)),
    }
}

/// Generate a random genome that satisfies the no-forward-reference invariant
pub fn random_genome<R: Rng>(
    id: GenomeId,
    length: usize,
    start: &TechState,
    rng: &mut R,
) -> Genome {
    let mut state = start.clone();
    let directives = (0..length)
        .map(|_| {
            let directive = random_directive(&state, rng);
            state.apply(&directive);
            directive
        })
        .collect();
    Genome::new(id, directives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn start() -> TechState {
        TechState::new([BuildingKind::CommandCenter])
    }

    fn wait(frame: u32) -> Directive {
        Directive::WaitUntil {
            condition: Trigger::AtFrame(frame),
        }
    }

    #[test]
    fn test_random_genomes_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..200 {
            let genome = random_genome(GenomeId(i), 20, &start(), &mut rng);
            assert_eq!(genome.len(), 20);
            assert!(genome.validate(&start()).is_ok(), "{:?}", genome);
        }
    }

    #[test]
    fn test_crossover_splices_whole_directives() {
        let mut rng = StdRng::seed_from_u64(3);
        let a: Vec<Directive> = (0..6).map(|i| wait(i)).collect();
        let b: Vec<Directive> = (100..104).map(|i| wait(i)).collect();

        for points in 1..=3 {
            let (c1, c2) = crossover(&a, &b, points, &mut rng);
            assert_eq!(c1.len() + c2.len(), a.len() + b.len());
            for directive in c1.iter().chain(&c2) {
                assert!(a.contains(directive) || b.contains(directive));
            }
        }
    }

    #[test]
    fn test_single_point_crossover_keeps_prefix() {
        let mut rng = StdRng::seed_from_u64(11);
        let a: Vec<Directive> = (0..10).map(|i| wait(i)).collect();
        let b: Vec<Directive> = (100..110).map(|i| wait(i)).collect();
        let (c1, _) = crossover(&a, &b, 1, &mut rng);

        let prefix = c1.iter().take_while(|d| a.contains(d)).count();
        assert!(c1[prefix..].iter().all(|d| b.contains(d)));
    }

    #[test]
    fn test_mutation_respects_max_length() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut directives: Vec<Directive> = (0..8).map(|i| wait(i)).collect();
        for _ in 0..50 {
            mutate(&mut directives, 1.0, &start(), 10, &mut rng);
            assert!(directives.len() <= 10);
        }
    }

    #[test]
    fn test_selection_prefers_fitter_genomes() {
        let mut rng = StdRng::seed_from_u64(1);
        let weak = Arc::new(Genome::new(GenomeId(1), vec![wait(1)]));
        let strong = Arc::new(Genome::new(GenomeId(2), vec![wait(2)]));
        let population = vec![(Arc::clone(&weak), 1.0), (Arc::clone(&strong), 100.0)];

        let strong_wins = (0..200)
            .filter(|_| tournament_selection(&population, 2, &mut rng).id == GenomeId(2))
            .count();
        assert!(strong_wins > 120);

        let roulette_wins = (0..200)
            .filter(|_| roulette_selection(&population, &mut rng).id == GenomeId(2))
            .count();
        assert!(roulette_wins > 150);
    }
}
