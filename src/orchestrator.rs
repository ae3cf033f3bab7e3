//! Per-boss attack state machine.
//!
//! The orchestrator is plain data driven by `tick`. It never touches the ECS
//! world: every side effect is queued as a [`CombatCommand`] that the boss
//! systems drain and apply, and notifications go out synchronously to the
//! registered listeners.

use bevy::prelude::*;
use rand::Rng;
use serde::Serialize;

use crate::config::BossConfig;
use crate::dispatch::Listeners;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AttackKind {
    Melee,
    Ranged,
    SpawnAdds,
}

impl AttackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttackKind::Melee => "melee",
            AttackKind::Ranged => "ranged",
            AttackKind::SpawnAdds => "spawn_adds",
        }
    }
}

/// Closing in on the target before striking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pursuit {
    /// Attack range was just changed; perception catches up before polling.
    Engaging { until: f32 },
    Pursuing { since: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RangedPhase {
    Approach(Pursuit),
    Dashing { until: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BossState {
    Inactive,
    Idle,
    SelectingAttack,
    ExecutingMelee(Pursuit),
    ExecutingRanged(RangedPhase),
    ExecutingSpawn { until: f32 },
    /// Settle wait after an attack; the attack is still in progress.
    Recovering { kind: AttackKind, until: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    TargetLost,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BossNotification {
    Activated,
    AttackStarted(AttackKind),
    AttackAborted {
        kind: AttackKind,
        reason: AbortReason,
    },
    AttackFinished(AttackKind),
}

/// Side effects requested by the orchestrator, applied by the boss systems.
#[derive(Clone, Debug, PartialEq)]
pub enum CombatCommand {
    EnableNavigation,
    SetDestination(Vec3),
    Halt,
    SetAttackRange(f32),
    Face(Vec3),
    Cue(String),
    ActivationEffects,
    SpawnEffects,
    MeleeSweep {
        target_position: Vec3,
    },
    Fire {
        target: Entity,
        target_position: Vec3,
    },
    Dash {
        direction: Vec3,
        distance: f32,
        duration: f32,
    },
    SpawnAdds {
        count: usize,
    },
    Notify(BossNotification),
}

/// What perception currently reports about the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetView {
    pub entity: Entity,
    pub position: Vec3,
    pub in_attack_range: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInput {
    pub position: Vec3,
    pub forward: Vec3,
    pub target: Option<TargetView>,
    pub spawned: usize,
    pub spawn_capacity: usize,
}

impl TickInput {
    fn registry_full(&self) -> bool {
        self.spawned >= self.spawn_capacity
    }
}

/// Uniform over all three kinds, or over Melee/Ranged when no more adds fit.
pub fn select_attack_kind(rng: &mut impl Rng, registry_full: bool) -> AttackKind {
    if registry_full {
        return if rng.gen_bool(0.5) {
            AttackKind::Melee
        } else {
            AttackKind::Ranged
        };
    }
    match rng.gen_range(0..3) {
        0 => AttackKind::Melee,
        1 => AttackKind::Ranged,
        _ => AttackKind::SpawnAdds,
    }
}

/// Adds to request for one wave, never more than the registry has room for.
pub fn wave_size(rng: &mut impl Rng, min: usize, max: usize, remaining: usize) -> usize {
    let low = min.max(1);
    let high = max.max(low);
    rng.gen_range(low..=high).min(remaining)
}

/// Horizontal direction away from the target; falls back to the agent's
/// backward axis when the two overlap.
pub fn dash_away_direction(position: Vec3, target: Vec3, forward: Vec3) -> Vec3 {
    let away = Vec3::new(position.x - target.x, 0.0, position.z - target.z);
    if let Some(dir) = away.try_normalize() {
        return dir;
    }
    Vec3::new(-forward.x, 0.0, -forward.z)
        .try_normalize()
        .unwrap_or(Vec3::Z)
}

#[derive(Component)]
pub struct AttackOrchestrator {
    pub config: BossConfig,
    pub listeners: Listeners<BossNotification>,
    state: BossState,
    activated: bool,
    last_attack_time: Option<f32>,
    current_attack: Option<AttackKind>,
    /// Idle follow has a destination set that still needs clearing.
    following: bool,
    commands: Vec<CombatCommand>,
}

impl AttackOrchestrator {
    pub fn new(config: BossConfig) -> Self {
        Self {
            config,
            listeners: Listeners::default(),
            state: BossState::Inactive,
            activated: false,
            last_attack_time: None,
            current_attack: None,
            following: false,
            commands: Vec::new(),
        }
    }

    pub fn state(&self) -> BossState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.activated
    }

    pub fn last_attack_time(&self) -> Option<f32> {
        self.last_attack_time
    }

    pub fn current_attack(&self) -> Option<AttackKind> {
        self.current_attack
    }

    pub fn is_attack_in_progress(&self) -> bool {
        matches!(
            self.state,
            BossState::ExecutingMelee(_)
                | BossState::ExecutingRanged(_)
                | BossState::ExecutingSpawn { .. }
                | BossState::Recovering { .. }
        )
    }

    pub fn cooldown_elapsed(&self, now: f32) -> bool {
        self.last_attack_time
            .map_or(true, |last| now - last >= self.config.attack_cooldown)
    }

    pub fn drain_commands(&mut self) -> Vec<CombatCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Arms the boss. Only the first call has any effect.
    pub fn activate(&mut self) -> bool {
        if self.activated {
            return false;
        }
        self.activated = true;
        self.state = BossState::Idle;
        self.push(CombatCommand::EnableNavigation);
        self.push(CombatCommand::Cue(self.config.cues.activate.clone()));
        self.push(CombatCommand::ActivationEffects);
        self.notify(BossNotification::Activated);
        true
    }

    pub fn tick(&mut self, now: f32, input: &TickInput, rng: &mut impl Rng) {
        match self.state {
            BossState::Inactive => {}
            BossState::Idle => self.tick_idle(now, input),
            BossState::SelectingAttack => self.tick_selecting(now, input, rng),
            BossState::ExecutingMelee(pursuit) => {
                let timeout = self.config.melee_pursuit_timeout;
                match self.advance_pursuit(now, pursuit, timeout, AttackKind::Melee, input) {
                    PursuitOutcome::Waiting(next) => {
                        self.state = BossState::ExecutingMelee(next);
                    }
                    PursuitOutcome::Reached(target) => self.strike_melee(now, target),
                    PursuitOutcome::Aborted => {}
                }
            }
            BossState::ExecutingRanged(RangedPhase::Approach(pursuit)) => {
                let timeout = self.config.ranged_pursuit_timeout;
                match self.advance_pursuit(now, pursuit, timeout, AttackKind::Ranged, input) {
                    PursuitOutcome::Waiting(next) => {
                        self.state = BossState::ExecutingRanged(RangedPhase::Approach(next));
                    }
                    PursuitOutcome::Reached(target) => self.engage_ranged(now, input, target),
                    PursuitOutcome::Aborted => {}
                }
            }
            BossState::ExecutingRanged(RangedPhase::Dashing { until }) => {
                if now < until {
                    return;
                }
                match input.target {
                    Some(target) => self.fire_ranged(now, target),
                    None => self.abort(now, AttackKind::Ranged, AbortReason::TargetLost),
                }
            }
            BossState::ExecutingSpawn { until } => {
                if now < until {
                    return;
                }
                let remaining = input.spawn_capacity.saturating_sub(input.spawned);
                let count = wave_size(
                    rng,
                    self.config.spawn.min_per_wave,
                    self.config.spawn.max_per_wave,
                    remaining,
                );
                if count > 0 {
                    self.push(CombatCommand::SpawnAdds { count });
                }
                self.recover(now, AttackKind::SpawnAdds);
            }
            BossState::Recovering { kind, until } => {
                if now < until {
                    return;
                }
                self.last_attack_time = Some(now);
                self.current_attack = None;
                self.state = BossState::Idle;
                self.notify(BossNotification::AttackFinished(kind));
            }
        }
    }

    fn tick_idle(&mut self, now: f32, input: &TickInput) {
        let Some(target) = input.target else {
            return;
        };
        if self.cooldown_elapsed(now) {
            self.following = false;
            self.state = BossState::SelectingAttack;
        } else if !target.in_attack_range {
            self.following = true;
            self.push(CombatCommand::SetDestination(target.position));
        } else if self.following {
            self.following = false;
            self.push(CombatCommand::Halt);
        }
    }

    fn tick_selecting(&mut self, now: f32, input: &TickInput, rng: &mut impl Rng) {
        if input.target.is_none() {
            self.state = BossState::Idle;
            return;
        }
        let kind = select_attack_kind(rng, input.registry_full());
        debug!("[Nemesis boss] Selected {} attack", kind.as_str());
        self.current_attack = Some(kind);
        self.notify(BossNotification::AttackStarted(kind));
        let engage = Pursuit::Engaging {
            until: now + self.config.engage_delay,
        };
        match kind {
            AttackKind::Melee => {
                self.push(CombatCommand::SetAttackRange(self.config.melee_range));
                self.state = BossState::ExecutingMelee(engage);
            }
            AttackKind::Ranged => {
                self.push(CombatCommand::SetAttackRange(self.config.ranged_range));
                self.state = BossState::ExecutingRanged(RangedPhase::Approach(engage));
            }
            AttackKind::SpawnAdds => {
                self.push(CombatCommand::Halt);
                self.push(CombatCommand::Cue(self.config.cues.spawn.clone()));
                self.push(CombatCommand::SpawnEffects);
                self.state = BossState::ExecutingSpawn {
                    until: now + self.config.spawn.animation_duration,
                };
            }
        }
    }

    fn advance_pursuit(
        &mut self,
        now: f32,
        pursuit: Pursuit,
        timeout: f32,
        kind: AttackKind,
        input: &TickInput,
    ) -> PursuitOutcome {
        let since = match pursuit {
            Pursuit::Engaging { until } if now < until => {
                return PursuitOutcome::Waiting(pursuit);
            }
            Pursuit::Engaging { .. } => now,
            Pursuit::Pursuing { since } => since,
        };
        let Some(target) = input.target else {
            self.abort(now, kind, AbortReason::TargetLost);
            return PursuitOutcome::Aborted;
        };
        if target.in_attack_range {
            return PursuitOutcome::Reached(target);
        }
        if now - since >= timeout {
            info!(
                "[Nemesis boss] {} pursuit timed out after {:.1}s",
                kind.as_str(),
                now - since
            );
            self.abort(now, kind, AbortReason::Timeout);
            return PursuitOutcome::Aborted;
        }
        self.push(CombatCommand::SetDestination(target.position));
        PursuitOutcome::Waiting(Pursuit::Pursuing { since })
    }

    fn strike_melee(&mut self, now: f32, target: TargetView) {
        self.push(CombatCommand::Halt);
        self.push(CombatCommand::Face(target.position));
        self.push(CombatCommand::Cue(self.config.cues.melee.clone()));
        self.push(CombatCommand::MeleeSweep {
            target_position: target.position,
        });
        self.recover(now, AttackKind::Melee);
    }

    fn engage_ranged(&mut self, now: f32, input: &TickInput, target: TargetView) {
        if input.position.distance(target.position) >= self.config.min_ranged_distance {
            self.fire_ranged(now, target);
            return;
        }
        let direction = dash_away_direction(input.position, target.position, input.forward);
        self.push(CombatCommand::Cue(self.config.cues.dash.clone()));
        self.push(CombatCommand::Dash {
            direction,
            distance: self.config.dash.distance,
            duration: self.config.dash.duration,
        });
        self.state = BossState::ExecutingRanged(RangedPhase::Dashing {
            until: now + self.config.dash.duration,
        });
    }

    fn fire_ranged(&mut self, now: f32, target: TargetView) {
        self.push(CombatCommand::Halt);
        self.push(CombatCommand::Face(target.position));
        self.push(CombatCommand::Cue(self.config.cues.ranged.clone()));
        self.push(CombatCommand::Fire {
            target: target.entity,
            target_position: target.position,
        });
        self.recover(now, AttackKind::Ranged);
    }

    fn abort(&mut self, now: f32, kind: AttackKind, reason: AbortReason) {
        self.push(CombatCommand::Halt);
        self.notify(BossNotification::AttackAborted { kind, reason });
        self.recover(now, kind);
    }

    fn recover(&mut self, now: f32, kind: AttackKind) {
        self.state = BossState::Recovering {
            kind,
            until: now + self.config.settle_duration,
        };
    }

    fn push(&mut self, command: CombatCommand) {
        self.commands.push(command);
    }

    fn notify(&mut self, notification: BossNotification) {
        self.listeners.dispatch(&notification);
        self.commands.push(CombatCommand::Notify(notification));
    }
}

enum PursuitOutcome {
    Waiting(Pursuit),
    Reached(TargetView),
    Aborted,
}
