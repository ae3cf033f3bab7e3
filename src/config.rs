use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_hittable_layers() -> u32 {
    u32::MAX
}

/// Tuning for a single boss: timing, ranges, dash, spawn wave and presentation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    pub attack_cooldown: f32,
    /// Wait after any attack before the cooldown clock restarts.
    pub settle_duration: f32,
    /// Wait between setting the engagement range and polling it.
    pub engage_delay: f32,
    pub melee_range: f32,
    pub ranged_range: f32,
    pub melee_pursuit_timeout: f32,
    pub ranged_pursuit_timeout: f32,
    /// Stand-off distance kept during ranged engagement.
    pub min_ranged_distance: f32,
    pub move_speed: f32,
    pub detection_range: f32,
    pub require_line_of_sight: bool,
    pub dash: DashConfig,
    pub spawn: SpawnConfig,
    pub cues: CueNames,
    pub effects: BossEffects,
    pub melee_weapon: Option<WeaponConfig>,
    pub ranged_weapons: Vec<WeaponConfig>,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            attack_cooldown: 3.0,
            settle_duration: 1.0,
            engage_delay: 0.1,
            melee_range: 3.0,
            ranged_range: 15.0,
            melee_pursuit_timeout: 15.0,
            ranged_pursuit_timeout: 5.0,
            min_ranged_distance: 10.0,
            move_speed: 3.5,
            detection_range: 40.0,
            require_line_of_sight: false,
            dash: DashConfig::default(),
            spawn: SpawnConfig::default(),
            cues: CueNames::default(),
            effects: BossEffects::default(),
            melee_weapon: Some(WeaponConfig::melee()),
            ranged_weapons: vec![WeaponConfig::default()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub distance: f32,
    pub duration: f32,
    /// Gap left in front of an obstacle that cuts the dash short.
    pub clearance: f32,
    /// Navigable-surface search radius for the final landing spot.
    pub snap_radius: f32,
    /// Search radius used while the dash is in flight.
    pub step_snap_radius: f32,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            distance: 10.0,
            duration: 0.5,
            clearance: 1.0,
            snap_radius: 2.0,
            step_snap_radius: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub max_spawned: usize,
    pub animation_duration: f32,
    pub min_per_wave: usize,
    pub max_per_wave: usize,
    pub points: Vec<[f32; 3]>,
    pub templates: Vec<AddTemplate>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_spawned: 5,
            animation_duration: 2.0,
            min_per_wave: 1,
            max_per_wave: 3,
            points: Vec::new(),
            templates: vec![AddTemplate::default()],
        }
    }
}

/// Blueprint for an entity the boss (or an add spawner) can instantiate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AddTemplate {
    pub name: String,
    pub health: f32,
    pub radius: f32,
    pub move_speed: f32,
}

impl Default for AddTemplate {
    fn default() -> Self {
        Self {
            name: "minion".to_string(),
            health: 50.0,
            radius: 0.5,
            move_speed: 3.5,
        }
    }
}

/// Animation trigger names sent to the animation director.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CueNames {
    pub activate: String,
    pub melee: String,
    pub ranged: String,
    pub spawn: String,
    pub dash: String,
    pub weapon_fire: String,
    pub weapon_melee: String,
}

impl Default for CueNames {
    fn default() -> Self {
        Self {
            activate: "Activate".to_string(),
            melee: "MeleeAttack".to_string(),
            ranged: "RangedAttack".to_string(),
            spawn: "SpawnEnemies".to_string(),
            dash: "Dash".to_string(),
            weapon_fire: "Fire".to_string(),
            weapon_melee: "Melee".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BossEffects {
    pub activation_vfx: Option<String>,
    pub activation_sfx: Option<String>,
    pub spawn_vfx: Option<String>,
    pub melee_vfx: Option<String>,
    pub ranged_vfx: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub is_melee: bool,
    /// Muzzle position relative to the owner; `None` means the mount has no muzzle.
    pub muzzle_offset: Option<[f32; 3]>,
    pub projectile: ProjectileConfig,
    pub spread_angle: f32,
    pub projectiles_per_shot: u32,
    #[serde(default = "default_true")]
    pub aim_at_target: bool,
    pub melee_damage: f32,
    pub melee_range: f32,
    pub melee_angle: f32,
    pub muzzle_flash: Option<String>,
    pub fire_sfx: Option<String>,
    pub melee_sfx: Option<String>,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            is_melee: false,
            muzzle_offset: Some([0.0, 1.5, 1.0]),
            projectile: ProjectileConfig::default(),
            spread_angle: 0.0,
            projectiles_per_shot: 1,
            aim_at_target: true,
            melee_damage: 40.0,
            melee_range: 3.0,
            melee_angle: 90.0,
            muzzle_flash: None,
            fire_sfx: None,
            melee_sfx: None,
        }
    }
}

impl WeaponConfig {
    pub fn melee() -> Self {
        Self {
            is_melee: true,
            muzzle_offset: Some([0.0, 1.0, 0.0]),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub radius: f32,
    pub max_lifetime: f32,
    pub speed: f32,
    pub damage: f32,
    pub homing: HomingConfig,
    #[serde(default = "default_hittable_layers")]
    pub hittable_layers: u32,
    pub impact_vfx: Option<String>,
    pub impact_sfx: Option<String>,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            radius: 0.5,
            max_lifetime: 5.0,
            speed: 15.0,
            damage: 25.0,
            homing: HomingConfig::default(),
            hittable_layers: default_hittable_layers(),
            impact_vfx: None,
            impact_sfx: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    pub enabled: bool,
    pub strength: f32,
    /// Seconds after launch before the projectile starts steering.
    pub delay: f32,
    /// Degrees per second.
    pub max_turn_angle: f32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 5.0,
            delay: 0.5,
            max_turn_angle: 45.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub center: [f32; 3],
    pub radius: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0, 0.0],
            radius: 6.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoxDef {
    pub center: [f32; 3],
    pub half_extents: [f32; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RectDef {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub position: [f32; 3],
    pub trigger_radius: f32,
    pub spawn_delay: f32,
    /// Indices into the arena's spawner list triggered after this one.
    pub linked: Vec<usize>,
    pub linked_delay: f32,
    pub template: Option<AddTemplate>,
    pub spawn_vfx: Option<String>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            trigger_radius: 5.0,
            spawn_delay: 1.5,
            linked: Vec::new(),
            linked_delay: 0.5,
            template: Some(AddTemplate::default()),
            spawn_vfx: None,
        }
    }
}

/// Scene description for the headless demo binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub seed: u64,
    pub frames: u32,
    pub boss_position: [f32; 3],
    pub boss_health: f32,
    pub boss: BossConfig,
    pub player_position: [f32; 3],
    pub player_health: f32,
    pub gate: GateConfig,
    pub obstacles: Vec<BoxDef>,
    pub nav_area: Vec<RectDef>,
    pub ground_height: f32,
    pub spawners: Vec<SpawnerConfig>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let mut boss = BossConfig::default();
        boss.spawn.points = vec![[-8.0, 0.0, 20.0], [8.0, 0.0, 20.0], [0.0, 0.0, 28.0]];
        Self {
            seed: 7,
            frames: 1800,
            boss_position: [0.0, 0.0, 24.0],
            boss_health: 1000.0,
            boss,
            player_position: [0.0, 1.0, 10.0],
            player_health: 500.0,
            gate: GateConfig {
                center: [0.0, 0.0, 12.0],
                radius: 6.0,
            },
            obstacles: vec![BoxDef {
                center: [0.0, 1.0, 34.0],
                half_extents: [12.0, 1.0, 1.0],
            }],
            nav_area: vec![RectDef {
                min: [-20.0, 0.0],
                max: [20.0, 36.0],
            }],
            ground_height: 0.0,
            spawners: Vec::new(),
        }
    }
}

impl ArenaConfig {
    pub fn from_json_str(path: &str, contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(path, &contents)
    }
}

pub fn vec3(v: [f32; 3]) -> Vec3 {
    Vec3::from_array(v)
}
