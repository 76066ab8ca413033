use super::budget::FrameBudget;
use super::cursor::{building_count, ExecutionCursor, InFlight};
use super::events::{CommandOrigin, ExecutionEvent, Unsatisfiable};
use super::reservation::ResourceReservation;
use crate::catalog::MAX_SUPPLY;
use crate::config::ExecutionConfig;
use crate::engines::generation::genome::{Directive, Genome, Trigger};
use crate::types::{BuildingKind, Command, CommandAck, EntityId, EntityKind, Position, UnitKind};
use crate::world::{EntityStatus, Owner, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const SITE_CLEARANCE: i32 = 48;
const SITE_RING_STEP: i32 = 64;
const SITE_MAX_RINGS: i32 = 6;

/// A command together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCommand {
    pub origin: CommandOrigin,
    pub command: Command,
    pub frame: u32,
}

/// Result of one `advance` call
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub frame: u32,
    /// In genome order, supply automation last
    pub commands: Vec<IssuedCommand>,
    pub events: Vec<ExecutionEvent>,
    /// Evaluation stopped early (budget or command cap); the rest waits for the next frame
    pub deferred: bool,
}

enum Resolution {
    Issue(Command),
    Done,
    Pending,
    Unsatisfiable(Unsatisfiable),
}

struct ActivePlan {
    genome: Arc<Genome>,
    cursor: ExecutionCursor,
}

/// Units and sites already spoken for in the current frame
#[derive(Default)]
struct FrameClaims {
    units: BTreeSet<EntityId>,
    sites: Vec<Position>,
}

/// Turns the active genome into engine commands, one frame at a time.
///
/// Single-threaded. `advance` owns the snapshot for the duration of the call
/// and never blocks; once the wall-clock budget is spent the remaining
/// directives wait for the next frame.
pub struct PlanExecutor {
    config: ExecutionConfig,
    time_budget: Option<Duration>,
    active: Option<ActivePlan>,
    staged: Option<Arc<Genome>>,
    last_frame: Option<u32>,
}

impl PlanExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        let budget = Duration::from_millis(config.frame_budget_ms);
        Self::with_time_budget(config, Some(budget))
    }

    /// `None` disables the wall-clock limit, so offline runs give the same
    /// result regardless of machine load.
    pub fn with_time_budget(config: ExecutionConfig, time_budget: Option<Duration>) -> Self {
        Self {
            config,
            time_budget,
            active: None,
            staged: None,
            last_frame: None,
        }
    }

    pub fn without_time_budget(config: ExecutionConfig) -> Self {
        Self::with_time_budget(config, None)
    }

    /// Stage `genome`; it replaces the active plan at the start of the next `advance`.
    pub fn activate(&mut self, genome: Arc<Genome>) {
        log::debug!("Staged genome {} for activation", genome.id);
        self.staged = Some(genome);
    }

    pub fn active_genome(&self) -> Option<&Arc<Genome>> {
        self.active.as_ref().map(|plan| &plan.genome)
    }

    pub fn cursor(&self) -> Option<&ExecutionCursor> {
        self.active.as_ref().map(|plan| &plan.cursor)
    }

    pub fn advance(&mut self, snapshot: &WorldSnapshot) -> FrameOutput {
        let frame = snapshot.frame();
        let mut output = FrameOutput {
            frame,
            ..FrameOutput::default()
        };

        if let Some(last) = self.last_frame {
            if frame <= last {
                log::warn!(
                    "Ignoring snapshot for frame {}: frame {} was already processed",
                    frame,
                    last
                );
                return output;
            }
        }
        self.last_frame = Some(frame);

        if let Some(genome) = self.staged.take() {
            log::info!("Activated genome {} at frame {}", genome.id, frame);
            output.events.push(ExecutionEvent::GenomeActivated {
                genome_id: genome.id,
                frame,
            });
            self.active = Some(ActivePlan {
                genome,
                cursor: ExecutionCursor::new(),
            });
        }

        let max_commands = self.config.max_commands_per_frame;
        let grace = self.config.construction_grace_frames;
        let plan = match self.active.as_mut() {
            Some(plan) => plan,
            None => return output,
        };
        let genome = Arc::clone(&plan.genome);
        let cursor = &mut plan.cursor;
        cursor.prune_structures(snapshot, grace);

        let budget = FrameBudget::start(self.time_budget);
        let mut reservation = ResourceReservation::new(snapshot.resources().available());
        let mut claims = FrameClaims::default();
        let mut evaluated = 0usize;
        let mut stopped = false;

        for index in cursor.retries() {
            if should_stop(&budget, evaluated, output.commands.len(), max_commands) {
                stopped = true;
                break;
            }
            evaluated += 1;
            let directive = &genome.directives()[index];
            match resolve(directive, &genome, cursor, snapshot, &mut reservation, &mut claims) {
                Resolution::Issue(command) => {
                    cursor.clear_retry(index);
                    issue(cursor, &mut output, CommandOrigin::Directive(index), command, snapshot);
                }
                Resolution::Done => cursor.clear_retry(index),
                Resolution::Pending => {}
                Resolution::Unsatisfiable(reason) => {
                    cursor.clear_retry(index);
                    unsatisfiable(&genome, index, frame, reason, &mut output);
                }
            }
        }

        while !stopped && cursor.position() < genome.len() {
            if should_stop(&budget, evaluated, output.commands.len(), max_commands) {
                stopped = true;
                break;
            }
            evaluated += 1;
            let index = cursor.position();
            let directive = &genome.directives()[index];

            if let Directive::SetSupplyThreshold { margin } = directive {
                log::debug!("Supply automation armed with margin {}", margin);
                cursor.set_supply_margin(*margin);
                cursor.step();
                continue;
            }

            match resolve(directive, &genome, cursor, snapshot, &mut reservation, &mut claims) {
                Resolution::Issue(command) => {
                    cursor.step();
                    issue(cursor, &mut output, CommandOrigin::Directive(index), command, snapshot);
                }
                Resolution::Done => cursor.step(),
                Resolution::Pending => break,
                Resolution::Unsatisfiable(reason) => {
                    cursor.step();
                    unsatisfiable(&genome, index, frame, reason, &mut output);
                }
            }
        }

        if stopped {
            output.deferred = true;
            if budget.exhausted() {
                let elapsed_us = budget.elapsed().as_micros() as u64;
                log::debug!(
                    "Frame {} budget spent after {} directives ({} us)",
                    frame,
                    evaluated,
                    elapsed_us
                );
                output.events.push(ExecutionEvent::BudgetExhausted {
                    frame,
                    evaluated,
                    elapsed_us,
                });
            }
        }

        if output.commands.len() < max_commands && !budget.exhausted() {
            if let Some(command) = supply_automation(cursor, snapshot, &mut reservation, &mut claims) {
                issue(cursor, &mut output, CommandOrigin::SupplyAutomation, command, snapshot);
            }
        }

        if cursor.take_completion(&genome) {
            log::info!("Genome {} completed its plan at frame {}", genome.id, frame);
            output.events.push(ExecutionEvent::PlanCompleted {
                genome_id: genome.id,
                frame,
            });
        }

        output
    }

    /// Feed back the engine's answer to a command from the latest `advance`.
    ///
    /// A rejected directive is queued for another attempt on a later frame.
    pub fn report(&mut self, issued: &IssuedCommand, ack: CommandAck) -> Option<ExecutionEvent> {
        let plan = self.active.as_mut()?;
        let entry = match plan.cursor.take_in_flight(issued.origin) {
            Some(entry) => entry,
            None => {
                log::debug!("No in-flight command for {}, ignoring ack", issued.origin);
                return None;
            }
        };

        match ack {
            CommandAck::Accepted => {
                if let Command::Build { building, .. } = entry.command {
                    plan.cursor
                        .record_structure(building, entry.frame, entry.baseline);
                }
                None
            }
            CommandAck::Rejected(reason) => {
                if let CommandOrigin::Directive(index) = issued.origin {
                    plan.cursor.schedule_retry(index);
                }
                log::warn!(
                    "Genome {}: {} rejected at frame {} ({}), will retry",
                    plan.genome.id,
                    issued.origin,
                    issued.frame,
                    reason
                );
                Some(ExecutionEvent::CommandRejected {
                    genome_id: plan.genome.id,
                    origin: issued.origin,
                    frame: issued.frame,
                    reason,
                })
            }
        }
    }
}

fn should_stop(budget: &FrameBudget, evaluated: usize, issued: usize, max_commands: usize) -> bool {
    issued >= max_commands || (evaluated > 0 && budget.exhausted())
}

fn issue(
    cursor: &mut ExecutionCursor,
    output: &mut FrameOutput,
    origin: CommandOrigin,
    command: Command,
    snapshot: &WorldSnapshot,
) {
    let frame = snapshot.frame();
    let baseline = match command {
        Command::Build { building, .. } => building_count(snapshot, building),
        _ => 0,
    };
    cursor.mark_in_flight(
        origin,
        InFlight {
            command: command.clone(),
            frame,
            baseline,
        },
    );
    if let CommandOrigin::Directive(index) = origin {
        output
            .events
            .push(ExecutionEvent::DirectiveIssued { index, frame });
    }
    log::debug!("Frame {}: {} issued {:?}", frame, origin, command);
    output.commands.push(IssuedCommand {
        origin,
        command,
        frame,
    });
}

fn unsatisfiable(
    genome: &Genome,
    index: usize,
    frame: u32,
    reason: Unsatisfiable,
    output: &mut FrameOutput,
) {
    log::warn!(
        "Genome {}: skipping directive {} at frame {}: {}",
        genome.id,
        index,
        frame,
        reason
    );
    output.events.push(ExecutionEvent::DirectiveUnsatisfiable {
        genome_id: genome.id,
        index,
        frame,
        reason,
    });
}

fn resolve(
    directive: &Directive,
    genome: &Genome,
    cursor: &ExecutionCursor,
    snapshot: &WorldSnapshot,
    reservation: &mut ResourceReservation,
    claims: &mut FrameClaims,
) -> Resolution {
    if let Some(reason) = never_satisfiable(directive, genome, cursor, snapshot) {
        return Resolution::Unsatisfiable(reason);
    }
    if let Some(trigger) = directive.trigger() {
        if !trigger.is_met(snapshot) {
            return Resolution::Pending;
        }
    }

    match *directive {
        Directive::ProduceUnit { unit, .. } => {
            if !tech_ready(unit.requires(), snapshot) {
                return Resolution::Pending;
            }
            let producer = match idle_facility(unit.producer(), snapshot, claims) {
                Some(id) => id,
                None => return Resolution::Pending,
            };
            if !reservation.reserve(unit.cost()) {
                return Resolution::Pending;
            }
            claims.units.insert(producer);
            Resolution::Issue(Command::Train { producer, unit })
        }
        Directive::ConstructBuilding { building, .. } => {
            if !tech_ready(building.requires(), snapshot) {
                return Resolution::Pending;
            }
            match place_building(building, snapshot, reservation, claims) {
                Some(command) => Resolution::Issue(command),
                None => Resolution::Pending,
            }
        }
        Directive::ResearchUpgrade { upgrade, .. } => {
            let facility = match idle_facility(upgrade.researched_at(), snapshot, claims) {
                Some(id) => id,
                None => return Resolution::Pending,
            };
            if !reservation.reserve(upgrade.cost()) {
                return Resolution::Pending;
            }
            claims.units.insert(facility);
            Resolution::Issue(Command::Research { facility, upgrade })
        }
        Directive::IssueAttackWave { min_army, .. } => {
            if snapshot.army_size() < min_army as usize {
                return Resolution::Pending;
            }
            let base = snapshot.base_position();
            let target = match snapshot
                .spatial()
                .nearest(base, |e| e.owner == Owner::Enemy)
                .map(|e| e.position)
                .or_else(|| snapshot.enemy_base())
            {
                Some(target) => target,
                None => return Resolution::Pending,
            };
            let units: Vec<EntityId> = snapshot
                .own()
                .iter()
                .filter(|e| {
                    e.unit_kind().is_some()
                        && e.status == EntityStatus::Idle
                        && !claims.units.contains(&e.id)
                })
                .map(|e| e.id)
                .collect();
            if units.is_empty() {
                return Resolution::Pending;
            }
            claims.units.extend(units.iter().copied());
            Resolution::Issue(Command::Attack { units, target })
        }
        Directive::WaitUntil { .. } | Directive::SetSupplyThreshold { .. } => Resolution::Done,
    }
}

/// Reasons this directive cannot be resolved on this or any later frame
fn never_satisfiable(
    directive: &Directive,
    genome: &Genome,
    cursor: &ExecutionCursor,
    snapshot: &WorldSnapshot,
) -> Option<Unsatisfiable> {
    let obtainable =
        |kind: BuildingKind| snapshot.has_building(kind) || cursor.expects_building(genome, kind);

    for kind in directive.required_buildings() {
        if !obtainable(kind) {
            return Some(Unsatisfiable::MissingBuilding(kind));
        }
    }

    let gas_needed = gas_needed(directive);
    if gas_needed > 0
        && snapshot.resources().gas < gas_needed
        && !obtainable(BuildingKind::Refinery)
    {
        return Some(Unsatisfiable::NoGasSource);
    }

    match *directive {
        Directive::ConstructBuilding { .. }
            if snapshot.unit_count(UnitKind::Worker) == 0
                && !obtainable(BuildingKind::CommandCenter) =>
        {
            Some(Unsatisfiable::NoWorkers)
        }
        Directive::ResearchUpgrade { upgrade, .. } if snapshot.has_upgrade(upgrade) => {
            Some(Unsatisfiable::AlreadyResearched(upgrade))
        }
        Directive::IssueAttackWave { min_army, .. }
            if snapshot.army_size() < min_army as usize
                && !obtainable(BuildingKind::Barracks)
                && !obtainable(BuildingKind::Factory) =>
        {
            Some(Unsatisfiable::NoArmySource)
        }
        _ => None,
    }
}

fn gas_needed(directive: &Directive) -> i32 {
    let price = match directive {
        Directive::ProduceUnit { unit, .. } => unit.cost().gas,
        Directive::ConstructBuilding { building, .. } => building.cost().gas,
        Directive::ResearchUpgrade { upgrade, .. } => upgrade.cost().gas,
        _ => 0,
    };
    let threshold = match directive.trigger() {
        Some(Trigger::GasAtLeast(amount)) => i32::try_from(*amount).unwrap_or(i32::MAX),
        _ => 0,
    };
    price.max(threshold)
}

fn tech_ready(requirement: Option<BuildingKind>, snapshot: &WorldSnapshot) -> bool {
    requirement
        .map(|kind| snapshot.completed_buildings(kind) > 0)
        .unwrap_or(true)
}

/// Lowest-id finished, idle building of `kind` not claimed this frame
fn idle_facility(kind: BuildingKind, snapshot: &WorldSnapshot, claims: &FrameClaims) -> Option<EntityId> {
    snapshot
        .own()
        .iter()
        .find(|e| {
            e.building_kind() == Some(kind) && e.is_idle() && !claims.units.contains(&e.id)
        })
        .map(|e| e.id)
}

/// Nearest idle worker to the main base plus a free site around it
fn place_building(
    building: BuildingKind,
    snapshot: &WorldSnapshot,
    reservation: &mut ResourceReservation,
    claims: &mut FrameClaims,
) -> Option<Command> {
    let base = snapshot.base_position();
    let worker = snapshot
        .spatial()
        .nearest(base, |e| {
            e.owner == Owner::Own
                && e.kind == EntityKind::Unit(UnitKind::Worker)
                && !claims.units.contains(&e.id)
                && snapshot.entity(e.id).map(|o| o.is_idle()).unwrap_or(false)
        })?
        .id;
    let at = snapshot.spatial().free_spot_near(
        base,
        SITE_CLEARANCE,
        SITE_RING_STEP,
        SITE_MAX_RINGS,
        &claims.sites,
    )?;
    if !reservation.reserve(building.cost()) {
        return None;
    }
    claims.units.insert(worker);
    claims.sites.push(at);
    Some(Command::Build {
        worker,
        building,
        at,
    })
}

fn supply_automation(
    cursor: &ExecutionCursor,
    snapshot: &WorldSnapshot,
    reservation: &mut ResourceReservation,
    claims: &mut FrameClaims,
) -> Option<Command> {
    let margin = i32::try_from(cursor.supply_margin()?).unwrap_or(i32::MAX);
    let resources = snapshot.resources();
    if resources.headroom() > margin
        || resources.supply_cap >= MAX_SUPPLY
        || cursor.depot_pending(snapshot)
    {
        return None;
    }
    place_building(BuildingKind::SupplyDepot, snapshot, reservation, claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenomeId;
    use crate::world::{OwnedEntity, Resources};

    fn worker(id: u32, x: i32) -> OwnedEntity {
        OwnedEntity {
            id: EntityId(id),
            kind: EntityKind::Unit(UnitKind::Worker),
            position: Position::new(x, 0),
            health: 60,
            status: EntityStatus::Idle,
        }
    }

    fn command_center(id: u32) -> OwnedEntity {
        OwnedEntity {
            id: EntityId(id),
            kind: EntityKind::Building(BuildingKind::CommandCenter),
            position: Position::new(0, 0),
            health: 1500,
            status: EntityStatus::Idle,
        }
    }

    fn snapshot(frame: u32, minerals: i32) -> WorldSnapshot {
        WorldSnapshot::builder(frame, Resources::new(minerals, 0, 4, 10))
            .entity(command_center(1))
            .entities((2..6).map(|id| worker(id, id as i32 * 8)))
            .build()
    }

    fn executor(directives: Vec<Directive>) -> PlanExecutor {
        let mut executor = PlanExecutor::without_time_budget(ExecutionConfig::default());
        executor.activate(Arc::new(Genome::new(GenomeId(9), directives)));
        executor
    }

    #[test]
    fn test_unmet_trigger_holds_cursor() {
        let mut executor = executor(vec![
            Directive::WaitUntil {
                condition: Trigger::AtFrame(100),
            },
            Directive::ProduceUnit {
                unit: UnitKind::Worker,
                trigger: Trigger::Always,
            },
        ]);

        let output = executor.advance(&snapshot(10, 500));
        assert!(output.commands.is_empty());
        assert_eq!(executor.cursor().unwrap().position(), 0);

        let output = executor.advance(&snapshot(100, 500));
        assert_eq!(output.commands.len(), 1);
        assert_eq!(executor.cursor().unwrap().position(), 2);
    }

    #[test]
    fn test_one_producer_trains_one_unit_per_frame() {
        let produce = Directive::ProduceUnit {
            unit: UnitKind::Worker,
            trigger: Trigger::Always,
        };
        let mut executor = executor(vec![produce.clone(), produce]);

        let output = executor.advance(&snapshot(1, 500));
        assert_eq!(output.commands.len(), 1);
        assert_eq!(
            output.commands[0].command,
            Command::Train {
                producer: EntityId(1),
                unit: UnitKind::Worker
            }
        );
        assert_eq!(executor.cursor().unwrap().position(), 1);
    }

    #[test]
    fn test_same_frame_directives_share_resources() {
        let depot = Directive::ConstructBuilding {
            building: BuildingKind::SupplyDepot,
            trigger: Trigger::Always,
        };
        let mut executor = executor(vec![depot.clone(), depot]);

        let output = executor.advance(&snapshot(1, 150));
        assert_eq!(output.commands.len(), 1);

        let sites: Vec<Position> = output
            .commands
            .iter()
            .filter_map(|c| match c.command {
                Command::Build { at, .. } => Some(at),
                _ => None,
            })
            .collect();
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn test_stale_frame_is_ignored() {
        let mut executor = executor(vec![Directive::ProduceUnit {
            unit: UnitKind::Worker,
            trigger: Trigger::Always,
        }]);
        executor.advance(&snapshot(5, 0));

        let output = executor.advance(&snapshot(5, 500));
        assert!(output.commands.is_empty());
        assert!(output.events.is_empty());
    }

    #[test]
    fn test_supply_automation_orders_one_depot() {
        let mut executor = executor(vec![Directive::SetSupplyThreshold { margin: 6 }]);

        let output = executor.advance(&snapshot(1, 300));
        let depots = output
            .commands
            .iter()
            .filter(|c| c.origin == CommandOrigin::SupplyAutomation)
            .count();
        assert_eq!(depots, 1);

        executor.report(&output.commands[0], CommandAck::Accepted);
        let output = executor.advance(&snapshot(2, 300));
        assert!(output
            .commands
            .iter()
            .all(|c| c.origin != CommandOrigin::SupplyAutomation));
    }

    #[test]
    fn test_build_waits_while_first_worker_trains() {
        let training = OwnedEntity {
            status: EntityStatus::Busy,
            ..command_center(1)
        };
        let no_workers = WorldSnapshot::builder(1, Resources::new(500, 0, 0, 10))
            .entity(training)
            .build();
        let mut executor = executor(vec![Directive::ConstructBuilding {
            building: BuildingKind::SupplyDepot,
            trigger: Trigger::Always,
        }]);

        let output = executor.advance(&no_workers);
        assert!(output.commands.is_empty());
        assert!(!output
            .events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::DirectiveUnsatisfiable { .. })));
        assert_eq!(executor.cursor().unwrap().position(), 0);

        let output = executor.advance(&snapshot(2, 500));
        assert_eq!(output.commands.len(), 1);
        assert_eq!(executor.cursor().unwrap().position(), 1);
    }

    #[test]
    fn test_build_without_any_worker_source_is_skipped() {
        let empty = WorldSnapshot::builder(1, Resources::new(500, 0, 0, 10)).build();
        let mut executor = executor(vec![Directive::ConstructBuilding {
            building: BuildingKind::SupplyDepot,
            trigger: Trigger::Always,
        }]);

        let output = executor.advance(&empty);
        assert!(output.events.iter().any(|e| matches!(
            e,
            ExecutionEvent::DirectiveUnsatisfiable {
                reason: Unsatisfiable::NoWorkers,
                ..
            }
        )));
    }

    #[test]
    fn test_spent_budget_defers_supply_automation() {
        let mut executor = PlanExecutor::with_time_budget(ExecutionConfig::default(), Some(Duration::ZERO));
        executor.activate(Arc::new(Genome::new(
            GenomeId(9),
            vec![
                Directive::SetSupplyThreshold { margin: 6 },
                Directive::WaitUntil {
                    condition: Trigger::AtFrame(100),
                },
            ],
        )));

        let output = executor.advance(&snapshot(1, 300));
        assert!(output.deferred);
        assert!(output.commands.is_empty());
        assert_eq!(executor.cursor().unwrap().supply_margin(), Some(6));
    }

    #[test]
    fn test_huge_supply_margin_orders_depot() {
        let mut executor = executor(vec![Directive::SetSupplyThreshold { margin: u32::MAX }]);

        let output = executor.advance(&snapshot(1, 300));
        assert!(output
            .commands
            .iter()
            .any(|c| c.origin == CommandOrigin::SupplyAutomation));
    }

    #[test]
    fn test_hot_swap_resets_cursor_between_frames() {
        let mut executor = executor(vec![Directive::WaitUntil {
            condition: Trigger::Always,
        }]);
        executor.advance(&snapshot(1, 0));
        assert_eq!(executor.cursor().unwrap().position(), 1);

        let next = Arc::new(Genome::new(
            GenomeId(10),
            vec![Directive::WaitUntil {
                condition: Trigger::AtFrame(50),
            }],
        ));
        executor.activate(Arc::clone(&next));
        assert_eq!(executor.active_genome().unwrap().id, GenomeId(9));

        let output = executor.advance(&snapshot(2, 0));
        assert_eq!(executor.active_genome().unwrap().id, GenomeId(10));
        assert_eq!(executor.cursor().unwrap().position(), 0);
        assert!(matches!(
            output.events[0],
            ExecutionEvent::GenomeActivated {
                genome_id: GenomeId(10),
                frame: 2
            }
        ));
    }
}
