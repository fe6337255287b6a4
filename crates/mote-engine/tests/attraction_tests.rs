//! Headless particle-attraction simulation.
//!
//! A field of bouncing particles plus one "player" that locks onto the first
//! particle in range and is pulled towards it. Exercises default components,
//! generator fields, filtered queries from inside systems, globals written by
//! hooks, and determinism under a seed.

use mote_engine::prelude::*;
use serde_json::{json, Value};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 600.0;

fn num(instance: &ComponentInstance, field: &str) -> f64 {
    instance.get_f64(field).unwrap_or_default()
}

fn offset(a: &ComponentInstance, b: &ComponentInstance) -> (f64, f64, f64) {
    let dx = num(a, "x") - num(b, "x");
    let dy = num(a, "y") - num(b, "y");
    (dx, dy, (dx * dx + dy * dy).sqrt())
}

fn delta_time(world: &World) -> f64 {
    world
        .get_global("deltaTime")
        .and_then(Value::as_f64)
        .unwrap_or_default()
}

fn attractiveness(world: &mut World, _entity: &Entity, components: &Components) {
    let (Some(attraction), Some(position), Some(velocity)) = (
        components.get("Attraction"),
        components.get("Position"),
        components.get("Velocity"),
    ) else {
        return;
    };
    let range = num(attraction, "range");

    let Some(other_alias) = attraction.get_str("other") else {
        let normal = QueryFilter::any().field("Attributes", "type", "normal");
        let nearest = world
            .get_entities_with_components(&["Attributes", "Position"], &normal)
            .into_iter()
            .find(|e| {
                e.component("Position").is_some_and(|p| {
                    let (_, _, distance) = offset(position, p);
                    distance > 0.0 && distance < range
                })
            });
        if let Some(other) = nearest {
            attraction.set("other", other.alias.as_str());
            if let Some(attributes) = other.component("Attributes") {
                attributes.set("color", "lime");
                attributes.set("size", 4);
            }
        }
        return;
    };

    let Some(other) = world.get_entity(&other_alias) else {
        attraction.set("other", Value::Null);
        return;
    };
    let Some(other_position) = other.component("Position") else {
        return;
    };

    let (dx, dy, distance) = offset(position, other_position);
    if distance > 0.0 && distance < range {
        let force = num(attraction, "force") / distance;
        let dt = delta_time(world);
        velocity.set("x", num(velocity, "x") + force * dx * dt);
        velocity.set("y", num(velocity, "y") + force * dy * dt);
    } else {
        attraction.set("other", Value::Null);
        if let Some(attributes) = other.component("Attributes") {
            attributes.set("color", "yellow");
            attributes.set("size", 2);
        }
    }
}

fn movement(world: &mut World, _entity: &Entity, components: &Components) {
    let (Some(position), Some(velocity)) = (components.get("Position"), components.get("Velocity"))
    else {
        return;
    };
    let step = num(velocity, "speed") * delta_time(world);
    let (x, y) = (num(position, "x"), num(position, "y"));
    let (mut vx, mut vy) = (num(velocity, "x"), num(velocity, "y"));

    if components.contains("Boundary") {
        if x + vx * step <= 0.0 || x + vx * step >= WIDTH {
            vx = -vx;
        }
        if y + vy * step <= 0.0 || y + vy * step >= HEIGHT {
            vy = -vy;
        }
        velocity.set("x", vx);
        velocity.set("y", vy);
    }

    position.set("x", x + vx * step);
    position.set("y", y + vy * step);
}

fn attraction_engine(config: EngineConfig, particles: usize) -> Engine {
    let mut engine = Engine::new(config).unwrap();
    engine.before_tick(|world, clock| {
        world.set_global("deltaTime", clock.delta_time());
    });
    engine.on_before_run(|world| {
        world
            .create_tag("Boundary")
            .create_component(
                "Position",
                ComponentTemplate::new()
                    .with_generator("x", |rng| rng.random_range_to(WIDTH as i64).into())
                    .with_generator("y", |rng| rng.random_range_to(HEIGHT as i64).into()),
            )
            .create_component(
                "Velocity",
                ComponentTemplate::new()
                    .with_generator("x", |rng| (rng.random_float() * 4.0 - 2.0).into())
                    .with_generator("y", |rng| (rng.random_float() * 4.0 - 2.0).into())
                    .with("speed", 32),
            )
            .create_component(
                "Attributes",
                ComponentTemplate::from_json(json!({"type": "normal", "color": "yellow", "size": 2}))
                    .unwrap(),
            )
            .include_as_default_components(["Boundary", "Position", "Velocity", "Attributes"])
            .create_component(
                "Attraction",
                ComponentTemplate::from_json(
                    json!({"type": "normal", "range": 100, "force": -2, "other": null}),
                )
                .unwrap(),
            )
            .create_system(
                "Attractiveness",
                &["Attraction", "Position", "Velocity", "Attributes"],
                attractiveness,
            )
            .create_system("Movement", &["Position", "Velocity"], movement)
            .create_entities(particles, &[])
            .create_entity_with_alias("player", &["Attraction"]);
    });
    engine
}

fn seeded(seed: u64) -> EngineConfig {
    EngineConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

fn place(world: &mut World, alias: &str, x: f64, y: f64) {
    world.set_component(alias, "Position", ComponentInstance::from_value(json!({"x": x, "y": y})));
    world.set_component(
        alias,
        "Velocity",
        ComponentInstance::from_value(json!({"x": 0.0, "y": 0.0, "speed": 32})),
    );
}

fn field(world: &World, alias: &str, component: &str, name: &str) -> Option<Value> {
    world.get_entity(alias)?.component(component)?.get(name)
}

#[test]
fn setup_applies_default_components() {
    let engine = attraction_engine(seeded(1), 200);
    let world = engine.world();
    assert_eq!(world.entity_count(), 201);

    for entity in world.entities() {
        let names: Vec<_> = entity.components.names().collect();
        assert_eq!(&names[..4], ["Boundary", "Position", "Velocity", "Attributes"]);
        let position = entity.component("Position").unwrap();
        assert!((0.0..WIDTH).contains(&num(position, "x")));
        assert!((0.0..HEIGHT).contains(&num(position, "y")));
    }

    let attracted = world.entities_with_components(&["Attraction"]);
    assert_eq!(attracted.len(), 1);
    assert_eq!(attracted[0].alias, "player");
}

#[test]
fn particles_stay_inside_the_boundary() {
    let config = EngineConfig {
        max_frames: Some(600),
        ..seeded(5)
    };
    let mut engine = attraction_engine(config, 100);
    engine.run();
    engine.pump(&mut SyntheticFrames::at_fps(60.0));
    assert_eq!(engine.frame_count(), 600);

    for entity in engine.world().entities() {
        let position = entity.component("Position").unwrap();
        let (x, y) = (num(position, "x"), num(position, "y"));
        assert!((0.0..=WIDTH).contains(&x), "{} escaped: x = {x}", entity.alias);
        assert!((0.0..=HEIGHT).contains(&y), "{} escaped: y = {y}", entity.alias);
    }
}

#[test]
fn player_locks_on_and_is_pulled_towards_particle() {
    let mut engine = attraction_engine(seeded(2), 0);
    engine.world_mut().create_entity_with_alias("buddy", &[]);
    place(engine.world_mut(), "player", 400.0, 300.0);
    place(engine.world_mut(), "buddy", 420.0, 300.0);

    let mut frames = SyntheticFrames::at_fps(60.0);
    engine.run_once().pump(&mut frames);

    let world = engine.world();
    assert_eq!(field(world, "player", "Attraction", "other"), Some(json!("buddy")));
    assert_eq!(field(world, "buddy", "Attributes", "color"), Some(json!("lime")));
    assert_eq!(field(world, "buddy", "Attributes", "size"), Some(json!(4)));

    engine.run_once().pump(&mut frames);
    let world = engine.world();
    let vx = field(world, "player", "Velocity", "x").and_then(|v| v.as_f64()).unwrap();
    let x = field(world, "player", "Position", "x").and_then(|v| v.as_f64()).unwrap();
    assert!(vx > 0.0, "player should accelerate towards buddy, vx = {vx}");
    assert!(x > 400.0);
}

#[test]
fn lock_is_released_when_out_of_range() {
    let mut engine = attraction_engine(seeded(3), 0);
    engine.world_mut().create_entity_with_alias("buddy", &[]);
    place(engine.world_mut(), "player", 400.0, 300.0);
    place(engine.world_mut(), "buddy", 420.0, 300.0);

    let mut frames = SyntheticFrames::at_fps(60.0);
    engine.run_once().pump(&mut frames);
    assert_eq!(
        field(engine.world(), "player", "Attraction", "other"),
        Some(json!("buddy"))
    );

    place(engine.world_mut(), "buddy", 790.0, 300.0);
    engine.run_once().pump(&mut frames);

    let world = engine.world();
    assert_eq!(field(world, "player", "Attraction", "other"), Some(Value::Null));
    assert_eq!(field(world, "buddy", "Attributes", "color"), Some(json!("yellow")));
    assert_eq!(field(world, "buddy", "Attributes", "size"), Some(json!(2)));
}

#[test]
fn same_seed_same_simulation() {
    let simulate = || {
        let config = EngineConfig {
            max_frames: Some(120),
            ..seeded(11)
        };
        let mut engine = attraction_engine(config, 50);
        engine.run();
        engine.pump(&mut SyntheticFrames::at_fps(60.0));
        engine.world().state_hash()
    };
    assert_eq!(simulate(), simulate());
}
