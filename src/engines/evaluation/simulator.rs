use super::combat::{army_strength, unit_strength, win_ratio};
use super::scenario::{MatchLimits, MatchOutcome, Scenario, ScenarioRunner};
use crate::catalog::{FRAMES_PER_MINUTE, MAX_SUPPLY};
use crate::config::ExecutionConfig;
use crate::engines::execution::{BotRuntime, GameEngine, PlanExecutor};
use crate::engines::generation::genome::Genome;
use crate::error::Result;
use crate::types::{
    BuildingKind, Command, CommandAck, Cost, EntityId, EntityKind, Position, RejectReason, UnitKind,
    UpgradeKind,
};
use crate::world::{EntityStatus, OwnedEntity, Resources, WorldSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Income in thousandths of a unit per frame
const MINERALS_PER_WORKER_MILLI: i64 = 45;
const GAS_PER_WORKER_MILLI: i64 = 35;
const WORKERS_PER_REFINERY: usize = 3;
const UNIT_SPEED: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Task {
    None,
    Training(UnitKind),
    Constructing,
    Researching(UpgradeKind),
    /// Building going up
    Rising,
    AttackingUntil(u32),
}

#[derive(Debug, Clone)]
struct SimEntity {
    id: EntityId,
    kind: EntityKind,
    position: Position,
    health: i32,
    status: EntityStatus,
    busy_until: u32,
    task: Task,
}

impl SimEntity {
    fn unit_kind(&self) -> Option<UnitKind> {
        match self.kind {
            EntityKind::Unit(kind) => Some(kind),
            EntityKind::Building(_) => None,
        }
    }
}

/// Deterministic frame-stepped match against a scripted opponent.
///
/// Acts as the game engine for [`BotRuntime`], so a genome is judged by the
/// same executor that would play it live.
pub struct MatchSimulator {
    frame: u32,
    minerals_milli: i64,
    gas_milli: i64,
    gathered_milli: i64,
    spent: u64,
    entities: Vec<SimEntity>,
    next_id: u32,
    researched: BTreeSet<UpgradeKind>,
    enemy_base: Position,
    enemy_army: f64,
    enemy_growth_per_frame: f64,
    growth_factor: f64,
    base_defense: f64,
    noise: f64,
    next_enemy_attack: Option<u32>,
    attack_interval: u32,
    rng: StdRng,
    result: Option<bool>,
    first_attack_frame: Option<u32>,
    peak_army: f64,
    resource_curve: Vec<u64>,
}

impl MatchSimulator {
    pub fn new(scenario: &Scenario, seed: u64) -> Self {
        let start = &scenario.start;
        let opponent = &scenario.opponent;
        let mut simulator = Self {
            frame: 0,
            minerals_milli: start.resources.minerals.max(0) as i64 * 1000,
            gas_milli: start.resources.gas.max(0) as i64 * 1000,
            gathered_milli: (start.resources.minerals.max(0) + start.resources.gas.max(0)) as i64
                * 1000,
            spent: 0,
            entities: Vec::new(),
            next_id: 1,
            researched: BTreeSet::new(),
            enemy_base: opponent.base,
            enemy_army: 0.0,
            enemy_growth_per_frame: opponent.army_growth_per_minute / FRAMES_PER_MINUTE as f64,
            growth_factor: 1.0,
            base_defense: opponent.base_defense,
            noise: opponent.noise.max(0.0),
            next_enemy_attack: opponent.first_attack_frame,
            attack_interval: opponent.attack_interval,
            rng: StdRng::seed_from_u64(seed),
            result: None,
            first_attack_frame: None,
            peak_army: 0.0,
            resource_curve: Vec::new(),
        };

        for (i, building) in start.buildings.iter().enumerate() {
            let position = Position::new(start.base.x + 96 * i as i32, start.base.y);
            simulator.spawn(EntityKind::Building(*building), position);
        }
        for i in 0..start.workers as i32 {
            let position = Position::new(start.base.x - 48 + 24 * (i % 5), start.base.y - 64);
            simulator.spawn(EntityKind::Unit(UnitKind::Worker), position);
        }
        if let Some(first) = simulator.next_enemy_attack {
            simulator.next_enemy_attack = Some(simulator.jitter_frame(first));
        }
        simulator
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// `Some(true)` once the enemy base falls, `Some(false)` once ours does
    pub fn result(&self) -> Option<bool> {
        self.result
    }

    fn spawn(&mut self, kind: EntityKind, position: Position) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let health = match kind {
            EntityKind::Unit(unit) => unit.max_health(),
            EntityKind::Building(building) => building.max_health(),
        };
        self.entities.push(SimEntity {
            id,
            kind,
            position,
            health,
            status: EntityStatus::Idle,
            busy_until: 0,
            task: Task::None,
        });
        id
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut SimEntity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    fn completed(&self, kind: BuildingKind) -> bool {
        self.entities.iter().any(|e| {
            e.kind == EntityKind::Building(kind) && e.status != EntityStatus::UnderConstruction
        })
    }

    fn supply_used(&self) -> i32 {
        self.entities
            .iter()
            .map(|e| match (e.kind, e.task) {
                (EntityKind::Unit(unit), _) => unit.cost().supply,
                (EntityKind::Building(_), Task::Training(unit)) => unit.cost().supply,
                _ => 0,
            })
            .sum()
    }

    fn supply_cap(&self) -> i32 {
        self.entities
            .iter()
            .filter(|e| e.status != EntityStatus::UnderConstruction)
            .filter_map(|e| match e.kind {
                EntityKind::Building(building) => Some(building.supply_provided()),
                EntityKind::Unit(_) => None,
            })
            .sum::<i32>()
            .min(MAX_SUPPLY)
    }

    fn army_strength_where<F>(&self, filter: F) -> f64
    where
        F: Fn(&SimEntity) -> bool,
    {
        army_strength(
            self.entities
                .iter()
                .filter(|e| filter(*e))
                .filter_map(|e| e.unit_kind().map(|unit| (unit, e.health))),
            &self.researched,
        )
    }

    /// Take the price, or say which part of it is missing
    fn charge(&mut self, price: Cost) -> std::result::Result<(), RejectReason> {
        if self.minerals_milli < price.minerals as i64 * 1000 {
            return Err(RejectReason::InsufficientMinerals);
        }
        if self.gas_milli < price.gas as i64 * 1000 {
            return Err(RejectReason::InsufficientGas);
        }
        if price.supply > 0 && self.supply_cap() - self.supply_used() < price.supply {
            return Err(RejectReason::SupplyBlocked);
        }
        self.minerals_milli -= price.minerals as i64 * 1000;
        self.gas_milli -= price.gas as i64 * 1000;
        self.spent += (price.minerals + price.gas) as u64;
        Ok(())
    }

    fn idle_building(&self, id: EntityId, kind: BuildingKind) -> std::result::Result<(), RejectReason> {
        let entity = self
            .entities
            .iter()
            .find(|e| e.id == id)
            .ok_or(RejectReason::InvalidTarget)?;
        if entity.kind != EntityKind::Building(kind) {
            return Err(RejectReason::InvalidTarget);
        }
        if entity.status != EntityStatus::Idle {
            return Err(RejectReason::ProducerBusy);
        }
        Ok(())
    }

    fn train(&mut self, producer: EntityId, unit: UnitKind) -> std::result::Result<(), RejectReason> {
        self.idle_building(producer, unit.producer())?;
        if let Some(required) = unit.requires() {
            if !self.completed(required) {
                return Err(RejectReason::InvalidTarget);
            }
        }
        self.charge(unit.cost())?;
        let until = self.frame + unit.build_frames();
        if let Some(entity) = self.entity_mut(producer) {
            entity.status = EntityStatus::Busy;
            entity.task = Task::Training(unit);
            entity.busy_until = until;
        }
        Ok(())
    }

    fn build(
        &mut self,
        worker: EntityId,
        building: BuildingKind,
        at: Position,
    ) -> std::result::Result<(), RejectReason> {
        let builder = self
            .entities
            .iter()
            .find(|e| e.id == worker)
            .ok_or(RejectReason::InvalidTarget)?;
        if builder.kind != EntityKind::Unit(UnitKind::Worker) || at.x < 0 || at.y < 0 {
            return Err(RejectReason::InvalidTarget);
        }
        if builder.status != EntityStatus::Idle {
            return Err(RejectReason::ProducerBusy);
        }
        if let Some(required) = building.requires() {
            if !self.completed(required) {
                return Err(RejectReason::InvalidTarget);
            }
        }
        self.charge(building.cost())?;

        let until = self.frame + building.build_frames();
        let site = self.spawn(EntityKind::Building(building), at);
        if let Some(entity) = self.entity_mut(site) {
            entity.status = EntityStatus::UnderConstruction;
            entity.task = Task::Rising;
            entity.busy_until = until;
            entity.health = building.max_health() / 10;
        }
        if let Some(entity) = self.entity_mut(worker) {
            entity.status = EntityStatus::Busy;
            entity.task = Task::Constructing;
            entity.busy_until = until;
        }
        Ok(())
    }

    fn research(
        &mut self,
        facility: EntityId,
        upgrade: UpgradeKind,
    ) -> std::result::Result<(), RejectReason> {
        let in_progress = self
            .entities
            .iter()
            .any(|e| e.task == Task::Researching(upgrade));
        if self.researched.contains(&upgrade) || in_progress {
            return Err(RejectReason::AlreadyResearched);
        }
        self.idle_building(facility, upgrade.researched_at())?;
        self.charge(upgrade.cost())?;
        let until = self.frame + upgrade.research_frames();
        if let Some(entity) = self.entity_mut(facility) {
            entity.status = EntityStatus::Busy;
            entity.task = Task::Researching(upgrade);
            entity.busy_until = until;
        }
        Ok(())
    }

    /// The wave moves as one and arrives when its slowest member would
    fn attack(&mut self, units: &[EntityId], target: Position) -> std::result::Result<(), RejectReason> {
        let wave: Vec<usize> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.unit_kind().is_some() && e.status == EntityStatus::Idle && units.contains(&e.id)
            })
            .map(|(index, _)| index)
            .collect();
        if wave.is_empty() {
            return Err(RejectReason::InvalidTarget);
        }

        let travel = wave
            .iter()
            .map(|&index| {
                let distance =
                    (self.entities[index].position.distance_squared(&target) as f64).sqrt() as i64;
                (distance / UNIT_SPEED).max(1) as u32
            })
            .max()
            .unwrap_or(1);
        let arrival = self.frame + travel;
        for index in wave {
            let entity = &mut self.entities[index];
            entity.status = EntityStatus::Busy;
            entity.task = Task::AttackingUntil(arrival);
        }

        if self.first_attack_frame.is_none() {
            self.first_attack_frame = Some(self.frame);
        }
        Ok(())
    }

    /// Run up to `frames` frames; stops early once the match is decided or
    /// `max_frame` is reached.
    pub fn step(&mut self, frames: u32, max_frame: u32) {
        for _ in 0..frames {
            if self.result.is_some() || self.frame >= max_frame {
                return;
            }
            self.tick();
        }
    }

    fn tick(&mut self) {
        self.frame += 1;
        let frame = self.frame;

        if frame % FRAMES_PER_MINUTE == 0 && self.noise > 0.0 {
            self.growth_factor = 1.0 + self.noise * self.rng.gen_range(-1.0..=1.0);
        }

        self.gather();
        self.finish_tasks();
        self.resolve_arrivals();
        if self.result.is_some() {
            return;
        }

        self.enemy_army += self.enemy_growth_per_frame * self.growth_factor;
        if self.next_enemy_attack.map(|at| frame >= at).unwrap_or(false) {
            self.enemy_attacks();
            let next = frame + self.attack_interval.max(1);
            self.next_enemy_attack = Some(self.jitter_frame(next));
        }

        let army = self.army_strength_where(|e| matches!(e.unit_kind(), Some(u) if !u.is_worker()));
        self.peak_army = self.peak_army.max(army);
    }

    fn gather(&mut self) {
        let mining = self
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Unit(UnitKind::Worker) && e.status == EntityStatus::Idle)
            .count();
        let refineries = self
            .entities
            .iter()
            .filter(|e| {
                e.kind == EntityKind::Building(BuildingKind::Refinery)
                    && e.status != EntityStatus::UnderConstruction
            })
            .count();
        let on_gas = mining.min(refineries * WORKERS_PER_REFINERY);
        let on_minerals = mining - on_gas;

        let minerals = on_minerals as i64 * MINERALS_PER_WORKER_MILLI;
        let gas = on_gas as i64 * GAS_PER_WORKER_MILLI;
        self.minerals_milli += minerals;
        self.gas_milli += gas;
        self.gathered_milli += minerals + gas;
    }

    fn finish_tasks(&mut self) {
        let frame = self.frame;
        let mut spawns = Vec::new();
        for entity in self.entities.iter_mut() {
            if entity.busy_until > frame {
                continue;
            }
            match entity.task {
                Task::Training(unit) => {
                    let offset = if unit.is_worker() { -64 } else { 64 };
                    spawns.push((
                        unit,
                        Position::new(entity.position.x - 32, entity.position.y + offset),
                    ));
                }
                Task::Researching(upgrade) => {
                    self.researched.insert(upgrade);
                }
                Task::Rising => {
                    if let EntityKind::Building(building) = entity.kind {
                        entity.health = building.max_health();
                    }
                }
                Task::Constructing => {}
                Task::None | Task::AttackingUntil(_) => continue,
            }
            entity.task = Task::None;
            entity.status = EntityStatus::Idle;
        }
        for (unit, position) in spawns {
            self.spawn(EntityKind::Unit(unit), position);
        }
    }

    /// Attack waves reaching the enemy base fight its whole army
    fn resolve_arrivals(&mut self) {
        let frame = self.frame;
        let arrived = |e: &SimEntity| matches!(e.task, Task::AttackingUntil(at) if at <= frame);
        if !self.entities.iter().any(|e| arrived(e)) {
            return;
        }

        let ours = self.army_strength_where(|e| arrived(e));
        let theirs = self.base_defense + self.enemy_army;
        let ratio = win_ratio(ours, theirs);
        log::debug!(
            "Frame {}: wave of strength {:.1} meets {:.1} (ratio {:.2})",
            frame,
            ours,
            theirs,
            ratio
        );

        if ratio > 0.5 {
            self.result = Some(true);
            return;
        }
        self.entities.retain(|e| !arrived(e));
        let mut remaining = ours;
        let absorbed = self.enemy_army.min(remaining);
        self.enemy_army -= absorbed;
        remaining -= absorbed;
        self.base_defense = (self.base_defense - remaining).max(0.0);
    }

    /// Enemy army (minus base defense) hits our base
    fn enemy_attacks(&mut self) {
        let force = self.enemy_army;
        if force <= 0.0 {
            return;
        }
        let defenders = self.army_strength_where(|e| {
            e.unit_kind().is_some() && !matches!(e.task, Task::AttackingUntil(_))
        });
        let ratio = win_ratio(defenders, force);
        log::debug!(
            "Frame {}: enemy attack of strength {:.1} against {:.1} (ratio {:.2})",
            self.frame,
            force,
            defenders,
            ratio
        );

        if ratio <= 0.5 {
            self.result = Some(false);
            return;
        }
        self.enemy_army = 0.0;
        self.take_losses(force * (1.0 - ratio));
    }

    /// Remove home units worth at least `value`, army before workers
    fn take_losses(&mut self, value: f64) {
        let mut candidates: Vec<(bool, EntityId, f64)> = self
            .entities
            .iter()
            .filter(|e| !matches!(e.task, Task::AttackingUntil(_)))
            .filter_map(|e| {
                e.unit_kind().map(|unit| {
                    let strength = unit_strength(unit, e.health, &self.researched);
                    (unit.is_worker(), e.id, strength)
                })
            })
            .collect();
        candidates.sort_by_key(|(is_worker, id, _)| (*is_worker, *id));

        let mut lost = BTreeSet::new();
        let mut removed = 0.0;
        for (_, id, strength) in candidates {
            if removed >= value {
                break;
            }
            removed += strength;
            lost.insert(id);
        }
        self.entities.retain(|e| !lost.contains(&e.id));
    }

    fn jitter_frame(&mut self, frame: u32) -> u32 {
        if self.noise <= 0.0 || self.attack_interval == 0 {
            return frame;
        }
        let spread = (self.attack_interval as f64 * self.noise * 0.5) as i64;
        if spread == 0 {
            return frame;
        }
        (frame as i64 + self.rng.gen_range(-spread..=spread)).max(1) as u32
    }

    /// Sample cumulative spending for the resource curve
    pub fn record_sample(&mut self) {
        self.resource_curve.push(self.spent);
    }

    pub fn outcome(&self) -> MatchOutcome {
        MatchOutcome {
            won: self.result == Some(true),
            end_frame: self.frame,
            gathered: (self.gathered_milli / 1000).max(0) as u64,
            spent: self.spent,
            resource_curve: self.resource_curve.clone(),
            first_attack_frame: self.first_attack_frame,
            peak_army: self.peak_army,
            timed_out: self.result.is_none(),
        }
    }
}

impl GameEngine for MatchSimulator {
    fn current_snapshot(&mut self) -> WorldSnapshot {
        let resources = Resources::new(
            (self.minerals_milli / 1000) as i32,
            (self.gas_milli / 1000) as i32,
            self.supply_used(),
            self.supply_cap(),
        );
        let mut builder = WorldSnapshot::builder(self.frame, resources)
            .entities(self.entities.iter().map(|e| OwnedEntity {
                id: e.id,
                kind: e.kind,
                position: e.position,
                health: e.health,
                status: e.status,
            }))
            .enemy_base(self.enemy_base);
        for upgrade in &self.researched {
            builder = builder.researched(*upgrade);
        }
        builder.build()
    }

    fn submit(&mut self, command: &Command) -> CommandAck {
        let result = match command {
            Command::Train { producer, unit } => self.train(*producer, *unit),
            Command::Build {
                worker,
                building,
                at,
            } => self.build(*worker, *building, *at),
            Command::Research { facility, upgrade } => self.research(*facility, *upgrade),
            Command::Attack { units, target } => self.attack(units, *target),
        };
        match result {
            Ok(()) => CommandAck::Accepted,
            Err(reason) => CommandAck::Rejected(reason),
        }
    }
}

/// Default [`ScenarioRunner`]: the built-in match simulator
#[derive(Debug, Clone, Default)]
pub struct SimulationRunner {
    execution: ExecutionConfig,
}

impl SimulationRunner {
    pub fn new(execution: ExecutionConfig) -> Self {
        Self { execution }
    }
}

impl ScenarioRunner for SimulationRunner {
    fn run(
        &self,
        genome: Arc<Genome>,
        scenario: &Scenario,
        seed: u64,
        limits: &MatchLimits,
    ) -> Result<MatchOutcome> {
        let simulator = MatchSimulator::new(scenario, seed);
        let executor = PlanExecutor::without_time_budget(self.execution.clone());
        let mut runtime = BotRuntime::new(simulator, executor);
        runtime.activate(genome);

        let step = limits.frames_per_decision.max(1);
        loop {
            runtime.on_frame();
            let engine = runtime.engine_mut();
            engine.record_sample();
            if engine.frame() >= limits.max_match_frames {
                break;
            }
            engine.step(step, limits.max_match_frames);
            if engine.result().is_some() {
                break;
            }
        }

        Ok(runtime.into_engine().outcome())
    }
}
