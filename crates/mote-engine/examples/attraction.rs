//! Headless attraction demo.
//!
//! Two hundred particles drift and bounce inside an 800x600 box while a
//! "player" particle locks onto the first neighbour in range and is pulled
//! towards it. There is no renderer; an after-tick hook reports the frame
//! rate and the current lock once per second.
//!
//! Run with `cargo run -p mote-engine --example attraction [config.json]`.
//! Set `RUST_LOG=info` to see the reports, or `RUST_LOG=mote_ecs=trace` for
//! every registry operation.

use mote_engine::logging::{init_tracing, DEFAULT_FILTER};
use mote_engine::prelude::*;
use serde_json::{json, Value};
use tracing::info;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 600.0;
const PARTICLES: usize = 200;

fn num(instance: &ComponentInstance, field: &str) -> f64 {
    instance.get_f64(field).unwrap_or_default()
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
    let distance_to = |other: &ComponentInstance| {
        let dx = num(position, "x") - num(other, "x");
        let dy = num(position, "y") - num(other, "y");
        (dx, dy, (dx * dx + dy * dy).sqrt())
    };

    match attraction.get_str("other") {
        None => {
            let normal = QueryFilter::any().field("Attributes", "type", "normal");
            let candidates = world.get_entities_with_components(&["Attributes", "Position"], &normal);
            let nearest = candidates.iter().find(|e| {
                e.component("Position").is_some_and(|p| {
                    let (_, _, d) = distance_to(p);
                    d > 0.0 && d < range
                })
            });
            if let Some(other) = nearest {
                attraction.set("other", other.alias.as_str());
                if let Some(attributes) = other.component("Attributes") {
                    attributes.set("color", "lime");
                    attributes.set("size", 4);
                }
            }
        }
        Some(alias) => {
            let Some(other) = world.get_entity(&alias) else {
                attraction.set("other", Value::Null);
                return;
            };
            let Some((dx, dy, d)) = other.component("Position").map(distance_to) else {
                return;
            };
            if d > 0.0 && d < range {
                let force = num(attraction, "force") / d;
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

fn load_config() -> Result<EngineConfig, anyhow::Error> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if config.max_frames.is_none() {
        config.max_frames = Some(600);
    }
    Ok(config)
}

fn main() -> Result<(), anyhow::Error> {
    init_tracing(DEFAULT_FILTER)?;

    let config = load_config()?;
    let mut frames = WallClockFrames::from_config(&config);
    let mut engine = Engine::new(config)?;

    engine
        .before_tick(|world, clock| {
            world.set_global("deltaTime", clock.delta_time());
        })
        .after_tick(|world, clock| {
            let second = (clock.time() / 1000.0) as i64;
            if world.get_global("reported").and_then(Value::as_i64) == Some(second) {
                return;
            }
            world.set_global("reported", second);
            let lock = world
                .get_entity("player")
                .and_then(|player| player.component("Attraction")?.get("other"))
                .unwrap_or(Value::Null);
            info!(fps = clock.fps(), entities = world.entity_count(), %lock, "frame report");
        })
        .on_before_run(|world| {
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
                    ComponentTemplate::new()
                        .with("type", "normal")
                        .with("color", "yellow")
                        .with("size", 2),
                )
                .include_as_default_components(["Boundary", "Position", "Velocity", "Attributes"])
                .create_component(
                    "Attraction",
                    ComponentTemplate::from_json(
                        json!({"type": "normal", "range": 100, "force": -2, "other": null}),
                    )
                    .unwrap_or_default(),
                )
                .create_system(
                    "Attractiveness",
                    &["Attraction", "Position", "Velocity", "Attributes"],
                    attractiveness,
                )
                .create_system("Movement", &["Position", "Velocity"], movement)
                .create_entities(PARTICLES, &[])
                .create_entity_with_alias("player", &["Attraction"]);
        })
        .run();

    let ticked = engine.pump(&mut frames);
    info!(
        frames = ticked,
        state = %engine.world().state_hash(),
        "simulation finished"
    );
    Ok(())
}
