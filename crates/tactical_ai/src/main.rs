//! Headless tactical AI demo
//!
//! Два отряда на поле с укрытиями, 1000 fixed тиков. Хост-часть (попадания,
//! урон, звук выстрела) — примитивная, только чтобы замкнуть цикл событий.

use bevy::prelude::*;
use rand::Rng;

use tactical_ai::physics::integrate_bodies;
use tactical_ai::world::{CoverSpot, PatrolPoint};
use tactical_ai::*;

/// Радиус попадания вокруг глаз цели (метры)
const HIT_RADIUS: f32 = 0.8;
const HIT_CHANCE: f64 = 0.35;
const DAMAGE: u32 = 8;

fn build_arena(app: &mut App) {
    let mut field = ObstacleField::new();
    // Центральная стена + разбросанные ящики
    field.add_block(Vec3::new(0.0, 0.0, 0.0), 4.0, 0.5, 2.0);
    field.add_block(Vec3::new(-9.0, 0.0, 6.0), 1.0, 1.0, 1.4);
    field.add_block(Vec3::new(9.0, 0.0, -6.0), 1.0, 1.0, 1.4);
    field.add_block(Vec3::new(-6.0, 0.0, -10.0), 2.0, 0.5, 1.8);
    field.add_block(Vec3::new(6.0, 0.0, 10.0), 2.0, 0.5, 1.8);

    let blocked: Vec<_> = field.static_bounds().copied().collect();
    let crowd = SimpleCrowd::new(7).with_warmup(1.0).with_blocked(blocked.iter());

    let strategic = StrategicPoints {
        patrol_points: vec![
            PatrolPoint { position: Vec3::new(-12.0, 0.0, -12.0), score: 1.0 },
            PatrolPoint { position: Vec3::new(12.0, 0.0, -12.0), score: 0.5 },
            PatrolPoint { position: Vec3::new(-12.0, 0.0, 12.0), score: 0.5 },
            PatrolPoint { position: Vec3::new(12.0, 0.0, 12.0), score: 1.0 },
        ],
        cover_spots: vec![
            CoverSpot { position: Vec3::new(0.0, 0.0, -1.4), facing: Vec3::NEG_Z, quality: 0.9 },
            CoverSpot { position: Vec3::new(0.0, 0.0, 1.4), facing: Vec3::Z, quality: 0.9 },
            CoverSpot { position: Vec3::new(-6.0, 0.0, -11.4), facing: Vec3::NEG_Z, quality: 0.7 },
            CoverSpot { position: Vec3::new(6.0, 0.0, 11.4), facing: Vec3::Z, quality: 0.7 },
        ],
    };

    app.insert_resource(field)
        .insert_resource(strategic)
        .insert_resource(CrowdNavigation(Box::new(crowd)));
}

fn spawn_squad(world: &mut World, faction_id: u64, origin: Vec3, archetypes: &[Archetype]) -> Vec<Entity> {
    archetypes
        .iter()
        .enumerate()
        .map(|(i, archetype)| {
            let offset = Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.0);
            world
                .spawn((
                    Transform::from_translation(origin + offset),
                    Actor { faction_id },
                    TacticalBrain::new(ActorProfile::for_archetype(*archetype)).with_start_state(StateId::Patrol),
                ))
                .id()
        })
        .collect()
}

/// Хост: WeaponFireIntent → попадание/промах, урон, звук выстрела
fn resolve_fire_intents(
    mut intents: EventReader<WeaponFireIntent>,
    mut targets: Query<(Entity, &Transform, &mut Health)>,
    mut rng: ResMut<DeterministicRng>,
    mut damage: EventWriter<DamageTaken>,
    mut sounds: EventWriter<SoundEmitted>,
) {
    for intent in intents.read() {
        let Ok((_, shooter_transform, _)) = targets.get(intent.shooter) else {
            continue;
        };
        let from = shooter_transform.translation;
        sounds.write(SoundEmitted {
            position: from,
            importance: 1.0,
            source: Some(intent.shooter),
        });

        if !rng.rng.gen_bool(HIT_CHANCE) {
            continue;
        }
        let victim = targets.iter_mut().find(|(entity, transform, health)| {
            *entity != intent.shooter
                && health.is_alive()
                && (transform.translation + Vec3::Y * 1.6).distance(intent.target_point) < HIT_RADIUS
        });
        if let Some((victim, _, mut health)) = victim {
            health.take_damage(DAMAGE);
            damage.write(DamageTaken {
                victim,
                attacker: Some(intent.shooter),
                from,
            });
        }
    }
}

fn print_summary(app: &mut App, tick: u32) {
    let snapshot = tactical_snapshot(app.world_mut());
    let line: Vec<String> = snapshot
        .iter()
        .map(|(entity, state, position)| format!("{}:{}@({:.0},{:.0})", entity.index(), state, position.x, position.z))
        .collect();
    println!("Tick {}: {}", tick, line.join(" "));
}

fn main() {
    let seed = 42;
    println!("Starting tactical AI headless demo (seed: {})", seed);

    let mut app = create_headless_app(seed);
    logger::set_log_level(logger::LogLevel::Info);
    app.add_plugins(TacticalSimulationPlugin)
        .add_systems(FixedUpdate, resolve_fire_intents.after(integrate_bodies));
    build_arena(&mut app);

    let world = app.world_mut();
    let alpha = spawn_squad(world, 1, Vec3::new(0.0, 0.0, -16.0), &[Archetype::Grunt, Archetype::Assault, Archetype::Grunt]);
    spawn_squad(world, 2, Vec3::new(0.0, 0.0, 16.0), &[Archetype::Sniper, Archetype::Grunt, Archetype::Grunt]);
    if let Some(&leader) = alpha.first() {
        world.spawn((
            Transform::from_translation(Vec3::new(-4.0, 0.0, -18.0)),
            Actor { faction_id: 1 },
            TacticalBrain::new(ActorProfile::for_archetype(Archetype::Companion)).following(leader),
        ));
    }

    for tick in 0..1000 {
        advance_fixed_tick(&mut app);
        if tick % 100 == 0 {
            print_summary(&mut app, tick);
        }
    }

    let alive = app
        .world_mut()
        .query::<&Health>()
        .iter(app.world())
        .filter(|health| health.is_alive())
        .count();
    println!("Simulation complete! {} actors alive", alive);
}
