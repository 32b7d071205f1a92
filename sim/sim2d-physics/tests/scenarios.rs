//! End-to-end scenarios through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use sim2d_physics::prelude::*;

const DT: f64 = 1.0 / 60.0;

fn ground() -> Body {
    Body::new_static().with_shape(Shape::plane())
}

fn circle_at(x: f64, y: f64, radius: f64) -> Body {
    Body::new(1.0)
        .with_position(Vec2::new(x, y))
        .with_shape(Shape::circle(radius))
}

fn near_circle(n: usize) -> Shape {
    let vertices = (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            Vec2::new(a.cos(), a.sin())
        })
        .collect();
    Shape::convex(vertices).unwrap()
}

#[test]
fn circle_resting_on_plane_has_one_contact() {
    let mut world = World::new(WorldConfig::zero_gravity()).unwrap();
    world.add_body(ground());
    world.add_body(circle_at(0.0, 1.0, 1.0));

    let report = world.step(DT).unwrap();
    assert_eq!(report.contacts, 1);

    let contact = world
        .equations()
        .iter()
        .find(|eq| eq.is_contact())
        .unwrap();
    assert_eq!(contact.body_a, 0);
    assert_relative_eq!(contact.contact_normal().unwrap(), Vec2::y(), epsilon = 1e-12);
    assert_relative_eq!(contact.penetration().unwrap(), 0.0, epsilon = 1e-12);
}

#[test]
fn separated_circles_have_no_contacts() {
    let mut world = World::new(WorldConfig::zero_gravity()).unwrap();
    world.add_body(circle_at(0.0, 0.0, 1.0));
    world.add_body(circle_at(3.0, 0.0, 1.0));

    let report = world.step(DT).unwrap();
    assert_eq!(report.pairs, 0);
    assert_eq!(report.contacts, 0);
}

#[test]
fn polygon_against_capsule_at_coincident_origins() {
    let polygon = Body::new(1.0).with_shape(near_circle(50));
    let capsule = Body::new(1.0).with_shape(Shape::capsule(1.0, 1.0));

    let mut narrowphase = Narrowphase::default();
    let count = narrowphase
        .test_shape_pair(
            &ShapeRef::new(0, &polygon, &polygon.shapes()[0]),
            &ShapeRef::new(1, &capsule, &capsule.shapes()[0]),
            &ContactMaterial::default(),
            false,
        )
        .unwrap();
    assert_eq!(count, 4);
    assert_eq!(narrowphase.contact_equations().len(), 4);
}

#[test]
fn disjoint_masks_never_produce_equations() {
    let mut world = World::new(WorldConfig::zero_gravity()).unwrap();
    world.add_body(
        Body::new(1.0).with_shape(Shape::circle(1.0).with_collision_group(1).with_collision_mask(1)),
    );
    world.add_body(
        Body::new(1.0)
            .with_position(Vec2::new(0.5, 0.0))
            .with_shape(Shape::circle(1.0).with_collision_group(2).with_collision_mask(2)),
    );

    for _ in 0..10 {
        let report = world.step(DT).unwrap();
        assert_eq!(report.contacts, 0);
        assert!(world.equations().is_empty());
    }
    assert_eq!(world.bodies()[1].position, Vec2::new(0.5, 0.0));
}

#[test]
fn sleeping_island_does_no_solver_work() {
    let config = WorldConfig::default().with_sleep_mode(SleepMode::IslandSleeping);
    let mut world = World::new(config).unwrap();
    world.add_body(ground());
    let ball = world.add_body(circle_at(0.0, 0.5, 0.5));

    for _ in 0..240 {
        world.step(DT).unwrap();
    }
    let body = world.body(ball).unwrap();
    assert!(body.is_sleeping());
    let (position, velocity) = (body.position, body.velocity);

    let report = world.step(DT).unwrap();
    assert_eq!(report.solved_islands, 0);
    assert_eq!(report.solver_iterations, 0);
    let body = world.body(ball).unwrap();
    assert_eq!(body.position, position);
    assert_eq!(body.velocity, velocity);
}

#[test]
fn fast_body_wakes_sleeping_body() {
    let config = WorldConfig::zero_gravity().with_sleep_mode(SleepMode::BodySleeping);
    let mut world = World::new(config).unwrap();
    let sleeper = world.add_body(circle_at(0.0, 0.0, 0.5));
    world.body_mut(sleeper).unwrap().sleep();
    world.add_body(circle_at(-0.9, 0.0, 0.5).with_velocity(Vec2::new(5.0, 0.0)));

    world.step(DT).unwrap();
    assert!(!world.body(sleeper).unwrap().is_sleeping());
    assert!(world.body(sleeper).unwrap().velocity.x > 0.0);
}

#[test]
fn restitution_bounces() {
    let mut config = WorldConfig::default();
    config.default_contact_material = ContactMaterial::default()
        .with_restitution(0.9)
        .with_friction(0.0);
    let mut world = World::new(config).unwrap();
    world.add_body(ground());
    let ball = world.add_body(circle_at(0.0, 2.0, 0.5));

    let mut bounced = false;
    for _ in 0..60 {
        world.step(DT).unwrap();
        if world.body(ball).unwrap().velocity.y > 2.0 {
            bounced = true;
            break;
        }
    }
    assert!(bounced);
}

#[test]
fn box_slides_to_rest_with_friction() {
    let mut world = World::default();
    world.add_body(ground());
    let block = world.add_body(
        Body::new(1.0)
            .with_position(Vec2::new(0.0, 0.5))
            .with_velocity(Vec2::new(2.0, 0.0))
            .with_shape(Shape::rectangle(1.0, 1.0)),
    );

    for _ in 0..180 {
        world.step(DT).unwrap();
    }
    let body = world.body(block).unwrap();
    assert!(body.velocity.x.abs() < 0.05);
    assert!(body.position.x > 0.1);
}

#[test]
fn pendulum_keeps_its_length() {
    let mut world = World::default();
    world.add_body(Body::new_static());
    let bob = world.add_body(circle_at(1.0, 0.0, 0.1));
    world.add_constraint(Constraint::revolute(0, 1, Vec2::zeros(), Vec2::new(-1.0, 0.0)));

    let mut lowest = 0.0f64;
    for _ in 0..120 {
        world.step(DT).unwrap();
        let position = world.body(bob).unwrap().position;
        assert!((position.norm() - 1.0).abs() < 0.05);
        lowest = lowest.min(position.y);
    }
    assert!(lowest < -0.9);
}

#[test]
fn motor_spins_wheel() {
    let mut world = World::new(WorldConfig::zero_gravity()).unwrap();
    world.add_body(Body::new_static());
    let wheel = world.add_body(circle_at(0.0, 0.0, 0.5));
    world.add_constraint(Constraint::motor(0, 1, 2.0));

    for _ in 0..60 {
        world.step(DT).unwrap();
    }
    let omega = world.body(wheel).unwrap().angular_velocity;
    assert!(omega.abs() > 1.0 && omega.abs() < 2.5);
}

#[test]
fn contact_events_on_landing() {
    let mut world = World::default();
    let floor = world.add_body(ground());
    let ball = world.add_body(circle_at(0.0, 0.6, 0.5));

    let mut begins = Vec::new();
    for _ in 0..120 {
        world.step(DT).unwrap();
        begins.extend(world.drain_events().filter(ContactEvent::is_begin));
    }
    assert_eq!(begins.len(), 1);
    let (a, b) = begins[0].bodies();
    assert!((a, b) == (floor, ball) || (a, b) == (ball, floor));
}

#[test]
fn pair_filter_cannot_mutate_shapes() {
    let mut world = World::new(WorldConfig::zero_gravity()).unwrap();
    world.add_body(circle_at(0.0, 0.0, 1.0));
    world.add_body(circle_at(1.0, 0.0, 1.0));
    world.set_pair_filter(|a, _| {
        assert!(matches!(
            a.remove_shape(0),
            Err(SimError::ShapesLocked { .. })
        ));
        true
    });

    let report = world.step(DT).unwrap();
    assert_eq!(report.pairs, 1);
    assert_eq!(world.bodies()[0].shapes().len(), 1);

    // Unlocked again after the step.
    world.clear_pair_filter();
    let id = world.bodies()[0].id();
    assert!(world.body_mut(id).unwrap().add_shape(Shape::particle(), Vec2::zeros(), 0.0).is_ok());
}

#[test]
fn every_broadphase_gives_the_same_trajectory() {
    let configs = [
        BroadphaseConfig::naive(),
        BroadphaseConfig::default(),
        BroadphaseConfig::grid(GridConfig::new(-10.0, 10.0, -10.0, 10.0, 8, 8)),
    ];
    let finals: Vec<Vec<Vec2>> = configs
        .into_iter()
        .map(|broadphase| {
            let mut world = World::new(WorldConfig::default().with_broadphase(broadphase)).unwrap();
            world.add_body(ground());
            for k in 0..5 {
                world.add_body(circle_at(k as f64 * 1.5, 1.0 + k as f64 * 0.5, 0.5));
            }
            for _ in 0..90 {
                world.step(DT).unwrap();
            }
            world.bodies().iter().map(|b| b.position).collect()
        })
        .collect();

    // Each ball is its own island, so pair order cannot change the result.
    for other in &finals[1..] {
        for (p, q) in finals[0].iter().zip(other) {
            assert_relative_eq!(*p, *q, epsilon = 1e-12);
        }
    }
}
