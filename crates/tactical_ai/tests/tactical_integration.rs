//! Tactical AI integration test
//!
//! Headless App, FixedUpdate шагается вручную (advance_fixed_tick).
//!
//! Проверяем:
//! - события (звук, урон) доходят до мозгов
//! - мёртвые мозги освобождаются
//! - инварианты истории переходов
//! - детерминизм (3 прогона с одним seed)

use bevy::prelude::*;
use tactical_ai::ai::HISTORY_LIMIT;
use tactical_ai::*;

/// Helper: App с tactical AI и ареной из одной стены
fn create_tactical_app(seed: u64) -> App {
    let mut app = create_headless_app(seed);
    app.add_plugins(TacticalSimulationPlugin);

    let mut field = ObstacleField::new();
    field.add_block(Vec3::new(0.0, 0.0, 0.0), 3.0, 0.5, 2.0);
    app.insert_resource(field);
    app
}

fn spawn_actor(app: &mut App, position: Vec3, faction_id: u64, archetype: Archetype, start: StateId) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            Actor { faction_id },
            TacticalBrain::new(ActorProfile::for_archetype(archetype)).with_start_state(start),
        ))
        .id()
}

fn run_ticks(app: &mut App, ticks: u32) {
    for _ in 0..ticks {
        advance_fixed_tick(app);
    }
}

fn brain_state(app: &App, entity: Entity) -> StateId {
    app.world()
        .get::<TacticalBrain>(entity)
        .map(|brain| brain.state())
        .expect("brain exists")
}

#[test]
fn test_sound_reaches_only_brains_in_hearing_range() {
    let mut app = create_tactical_app(42);
    let near = spawn_actor(&mut app, Vec3::new(-10.0, 0.0, -10.0), 1, Archetype::Grunt, StateId::Patrol);
    let far = spawn_actor(&mut app, Vec3::new(-10.0, 0.0, 60.0), 1, Archetype::Grunt, StateId::Patrol);
    run_ticks(&mut app, 5);
    assert_eq!(brain_state(&app, near), StateId::Patrol);

    let noise = Vec3::new(-5.0, 0.0, -12.0);
    app.world_mut().send_event(SoundEmitted {
        position: noise,
        importance: 1.0,
        source: None,
    });
    run_ticks(&mut app, 1);

    assert_eq!(brain_state(&app, near), StateId::Alert);
    assert_eq!(brain_state(&app, far), StateId::Patrol);
    let stimulus = app
        .world()
        .get::<TacticalBrain>(near)
        .and_then(|brain| brain.controller())
        .and_then(|controller| controller.blackboard().stimulus_position);
    assert_eq!(stimulus, Some(noise));
}

#[test]
fn test_damage_event_adopts_hostile_attacker() {
    let mut app = create_tactical_app(7);
    let victim = spawn_actor(&mut app, Vec3::new(0.0, 0.0, -8.0), 1, Archetype::Grunt, StateId::Patrol);
    let shooter = spawn_actor(&mut app, Vec3::new(0.0, 0.0, 8.0), 2, Archetype::Grunt, StateId::Idle);
    run_ticks(&mut app, 2);

    app.world_mut().send_event(DamageTaken {
        victim,
        attacker: Some(shooter),
        from: Vec3::new(0.0, 0.0, 8.0),
    });
    run_ticks(&mut app, 1);

    let controller_target = app
        .world()
        .get::<TacticalBrain>(victim)
        .and_then(|brain| brain.controller())
        .and_then(|controller| controller.target());
    assert_eq!(controller_target, Some(ActorId::from(shooter)));
}

#[test]
fn test_dead_brain_is_disposed() {
    let mut app = create_tactical_app(3);
    app.insert_resource(CrowdNavigation(Box::new(SimpleCrowd::new(3))));
    let doomed = spawn_actor(&mut app, Vec3::new(5.0, 0.0, 5.0), 1, Archetype::Grunt, StateId::Patrol);
    run_ticks(&mut app, 90);

    if let Some(mut health) = app.world_mut().get_mut::<Health>(doomed) {
        health.take_damage(1000);
    }
    run_ticks(&mut app, 1);

    let disposed = app
        .world()
        .get::<TacticalBrain>(doomed)
        .and_then(|brain| brain.controller())
        .is_some_and(|controller| controller.is_disposed());
    assert!(disposed);

    // Мёртвый не двигается по своей воле: история заморожена
    let frozen = |app: &App| {
        app.world()
            .get::<TacticalBrain>(doomed)
            .and_then(|brain| brain.controller())
            .map(|controller| controller.transition_history().len())
    };
    let before = frozen(&app);
    run_ticks(&mut app, 120);
    assert_eq!(frozen(&app), before);
}

#[test]
fn test_two_squads_1000_ticks() {
    let mut app = create_tactical_app(42);
    let mut actors = Vec::new();
    for i in 0..3 {
        let x = i as f32 * 3.0 - 3.0;
        actors.push(spawn_actor(&mut app, Vec3::new(x, 0.0, -12.0), 1, Archetype::Grunt, StateId::Patrol));
        actors.push(spawn_actor(&mut app, Vec3::new(x, 0.0, 12.0), 2, Archetype::Assault, StateId::Patrol));
    }

    for tick in 0..1000 {
        advance_fixed_tick(&mut app);
        if tick % 100 == 0 {
            check_invariants(&mut app, &actors, tick);
        }
    }
}

fn check_invariants(app: &mut App, actors: &[Entity], tick: u32) {
    for &entity in actors {
        let Some(brain) = app.world().get::<TacticalBrain>(entity) else {
            panic!("brain of {:?} vanished at tick {}", entity, tick);
        };
        let Some(controller) = brain.controller() else {
            continue;
        };
        assert!(controller.transition_history().len() <= HISTORY_LIMIT);
        for record in controller.transition_history() {
            assert_ne!(record.from, record.to, "self transition at tick {}", tick);
        }

        let transform = app.world().get::<Transform>(entity).copied().unwrap_or_default();
        assert!(transform.translation.is_finite(), "non-finite position at tick {}", tick);
        assert!(transform.translation.y >= 0.0);
    }
}

/// Test: детерминизм — 3 прогона с одним seed дают идентичные snapshot'ы
#[test]
fn test_tactical_determinism_three_runs() {
    const SEED: u64 = 42;

    let run = || {
        let mut app = create_tactical_app(SEED);
        spawn_actor(&mut app, Vec3::new(-4.0, 0.0, -10.0), 1, Archetype::Grunt, StateId::Patrol);
        spawn_actor(&mut app, Vec3::new(4.0, 0.0, -10.0), 1, Archetype::Sniper, StateId::Patrol);
        spawn_actor(&mut app, Vec3::new(0.0, 0.0, 10.0), 2, Archetype::Assault, StateId::Patrol);
        run_ticks(&mut app, 300);
        tactical_snapshot(app.world_mut())
    };

    let first = run();
    assert_eq!(first, run());
    assert_eq!(first, run());
}
