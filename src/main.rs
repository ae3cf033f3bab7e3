use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use nemesis::arena::{spawn_arena, ArenaHandles};
use nemesis::config::ArenaConfig;
use nemesis::damage::BossObjective;
use nemesis::events::GameEventBus;
use nemesis::NemesisPlugin;

const EMBEDDED_ARENA: &str =
    include_str!(concat!(env!("OUT_DIR"), "/nemesis_embedded_arena.json"));

/// Fixed step used by the demo, 60 Hz.
const STEP: Duration = Duration::from_micros(15_625);

fn load_arena_config() -> ArenaConfig {
    let path = std::env::var("NEMESIS_ARENA_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "arena.json".to_string());
    match ArenaConfig::load(&path) {
        Ok(cfg) => {
            println!("[Nemesis] Loaded arena config from {}", path);
            cfg
        }
        Err(e) => {
            if std::path::Path::new(&path).exists() {
                eprintln!("[Nemesis] {e}");
            }
            match ArenaConfig::from_json_str("<embedded>", EMBEDDED_ARENA) {
                Ok(cfg) => {
                    println!("[Nemesis] Using embedded arena config");
                    cfg
                }
                Err(e) => {
                    eprintln!("[Nemesis] {e}; using defaults");
                    ArenaConfig::default()
                }
            }
        }
    }
}

fn parse_frames(args: &[String]) -> Option<u32> {
    let index = args.iter().position(|a| a == "--frames")?;
    args.get(index + 1)?.parse().ok()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = load_arena_config();
    let frames = parse_frames(&args).unwrap_or(config.frames);

    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default()))
        .insert_resource(Time::<Fixed>::from_duration(STEP))
        .insert_resource(TimeUpdateStrategy::ManualDuration(STEP))
        .add_plugins(NemesisPlugin { seed: config.seed });

    let scene = config.clone();
    let handles = match app
        .world_mut()
        .run_system_once(move |mut commands: Commands| spawn_arena(&mut commands, &scene))
    {
        Ok(handles) => handles,
        Err(e) => {
            eprintln!("[Nemesis] Failed to build arena: {e}");
            return;
        }
    };
    app.insert_resource(handles.clone());
    println!(
        "[Nemesis] Running {} frames (boss {:?}, player {:?})",
        frames, handles.boss, handles.player
    );

    for _ in 0..frames {
        app.update();
        if app.world().resource::<BossObjective>().completed {
            break;
        }
    }

    print_summary(app.world(), &handles);
}

fn print_summary(world: &World, handles: &ArenaHandles) {
    let bus = world.resource::<GameEventBus>();
    println!("[Nemesis] Simulated {} fixed ticks", bus.frame);
    for name in [
        "gate_triggered",
        "boss_activated",
        "boss_attack",
        "attack_aborted",
        "boss_dash",
        "boss_fire",
        "projectile_hit",
        "projectile_expired",
        "melee_hit",
        "adds_spawned",
        "entity_died",
        "objective_completed",
    ] {
        println!("  {:<20} {}", name, bus.count(name));
    }
    if bus.dropped_events > 0 {
        println!("  (dropped {} older events)", bus.dropped_events);
    }
    let player_alive = world.get_entity(handles.player).is_ok();
    let boss_alive = world.get_entity(handles.boss).is_ok();
    println!("[Nemesis] player alive: {player_alive}, boss alive: {boss_alive}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_flag_is_parsed() {
        let args: Vec<String> = ["nemesis", "--frames", "120"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(parse_frames(&args), Some(120));
        assert_eq!(parse_frames(&args[..1]), None);
    }
}
