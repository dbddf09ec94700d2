//! Vehicle motion validation
//!
//! Stop-line braking, turning, car-following and speed integration.

use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use traffic_signal_sim::simulation::{
    approach_speed, choose_exit, find_approach, follow_target, permitted_exits, stop_line_target,
    Axis, ControlCommand, Direction, IntersectionId, MotionContext, MovementState, Position,
    RoadNames, SignalState, SimConfig, SimId, SimIntersection, SimVehicle, SimWorld, VehicleId,
    VehicleType,
};

fn node(id: usize, x: f32, y: f32, blocked: Option<Direction>) -> SimIntersection {
    SimIntersection::new(
        IntersectionId(SimId(id)),
        format!("NODE_{}", id),
        Position::new(x, y),
        blocked,
        RoadNames {
            horizontal: "GST Road".to_string(),
            vertical: "OMR".to_string(),
        },
    )
}

fn vehicle(id: usize, position: Position, direction: Direction, base_speed: f32) -> SimVehicle {
    SimVehicle::new(
        VehicleId(SimId(id)),
        VehicleType::Car,
        "TN-22K-4821".to_string(),
        position,
        direction,
        base_speed,
        32.0,
    )
}

/// A single cross junction at the centre of the plane and no random spawns
fn quiet_world(seed: u64) -> (SimWorld, IntersectionId) {
    let config = SimConfig {
        grid_size: 1,
        t_junction_probability: 0.0,
        spawn_probability: 0.0,
        ..SimConfig::default()
    };
    let world = SimWorld::with_config(config, Some(seed)).expect("valid config");
    let id = *world.intersections.keys().next().expect("one intersection");
    (world, id)
}

#[test]
fn test_smooth_brake_band_scales_with_gap() {
    let config = SimConfig::default();
    let distance = config.stop_line_distance + 30.0;

    let (target, state) = stop_line_target(SignalState::Red, distance, 4.0, &config);
    assert_approx_eq!(target, 2.0, 1e-5);
    assert_eq!(state, MovementState::Waiting);
}

#[test]
fn test_hard_stop_at_line() {
    let config = SimConfig::default();
    let (target, state) =
        stop_line_target(SignalState::Yellow, config.stop_line_distance + 2.5, 4.0, &config);
    assert_eq!(target, 0.0);
    assert_eq!(state, MovementState::Waiting);
}

#[test]
fn test_committed_past_stop_line() {
    let config = SimConfig::default();
    let (target, state) =
        stop_line_target(SignalState::Red, config.stop_line_distance - 10.0, 4.0, &config);
    assert_eq!(target, 4.0);
    assert_eq!(state, MovementState::Moving);
}

#[test]
fn test_cautious_approach_far_from_red() {
    let config = SimConfig::default();
    let (target, state) =
        stop_line_target(SignalState::Red, config.stop_line_distance + 100.0, 4.0, &config);
    assert_approx_eq!(target, 2.8, 1e-5);
    assert_eq!(state, MovementState::Moving);
}

#[test]
fn test_green_means_full_speed() {
    let config = SimConfig::default();
    for distance in [10.0, 116.0, 140.0, 400.0] {
        let (target, state) = stop_line_target(SignalState::Green, distance, 3.5, &config);
        assert_eq!(target, 3.5);
        assert_eq!(state, MovementState::Moving);
    }
}

#[test]
fn test_speed_integration_bounds() {
    assert_approx_eq!(approach_speed(1.0, 4.0, 0.2, 0.5), 1.2, 1e-6);
    assert_eq!(approach_speed(3.9, 4.0, 0.2, 0.5), 4.0);
    assert_approx_eq!(approach_speed(4.0, 0.0, 0.2, 0.5), 3.5, 1e-6);
    assert_eq!(approach_speed(0.3, 0.0, 0.2, 0.5), 0.0);
    assert_eq!(approach_speed(2.0, 2.0, 0.2, 0.5), 2.0);
}

#[test]
fn test_follow_target_caps_at_leader_fraction() {
    let config = SimConfig::default();
    assert_approx_eq!(follow_target(4.0, 2.0, &config), 1.8, 1e-6);
    assert_eq!(follow_target(1.0, 3.0, &config), 1.0);
    // Crawling behind a stopped leader becomes a full stop
    assert_eq!(follow_target(4.0, 0.1, &config), 0.0);
}

#[test]
fn test_find_approach_picks_closest_ahead() {
    let nodes = vec![
        node(0, 200.0, 150.0, None),
        node(1, 400.0, 150.0, None),
        node(2, 600.0, 150.0, None),
    ];

    let east = find_approach(&Position::new(250.0, 118.0), Direction::East, &nodes, 65.0)
        .expect("intersection ahead");
    assert_eq!(east.intersection.id, IntersectionId(SimId(1)));
    assert_approx_eq!(east.distance, 150.0, 1e-4);

    let west = find_approach(&Position::new(650.0, 182.0), Direction::West, &nodes, 65.0)
        .expect("intersection ahead");
    assert_eq!(west.intersection.id, IntersectionId(SimId(2)));

    // Parallel road, out of the lateral band
    assert!(find_approach(&Position::new(250.0, 300.0), Direction::East, &nodes, 65.0).is_none());
    // Nothing left ahead
    assert!(find_approach(&Position::new(650.0, 118.0), Direction::East, &nodes, 65.0).is_none());
}

#[test]
fn test_blocked_junction_is_transparent() {
    let nodes = vec![
        node(0, 400.0, 150.0, Some(Direction::East)),
        node(1, 600.0, 150.0, None),
    ];
    let approach = find_approach(&Position::new(250.0, 118.0), Direction::East, &nodes, 65.0)
        .expect("next junction is found");
    assert_eq!(approach.intersection.id, IntersectionId(SimId(1)));
}

#[test]
fn test_exits_exclude_u_turn_and_blocked() {
    assert_eq!(
        permitted_exits(Direction::East, None),
        vec![Direction::North, Direction::South, Direction::East]
    );
    assert_eq!(
        permitted_exits(Direction::North, Some(Direction::East)),
        vec![Direction::North, Direction::West]
    );

    let mut rng = StdRng::seed_from_u64(5);
    let blocked_options = [
        None,
        Some(Direction::North),
        Some(Direction::South),
        Some(Direction::East),
        Some(Direction::West),
    ];
    for heading in Direction::ALL {
        for blocked in blocked_options {
            for _ in 0..100 {
                let exit = choose_exit(heading, blocked, 0.7, &mut rng);
                assert_ne!(exit, heading.opposite());
                assert_ne!(Some(exit), blocked);
            }
        }
    }
}

#[test]
fn test_straight_is_preferred() {
    let mut rng = StdRng::seed_from_u64(21);
    let samples = 4000;
    let straight = (0..samples)
        .filter(|_| choose_exit(Direction::East, None, 0.7, &mut rng) == Direction::East)
        .count();
    // 0.7 + 0.3 / 3
    let share = straight as f64 / samples as f64;
    assert!(share > 0.75 && share < 0.85, "straight share {}", share);
}

#[test]
fn test_turn_decision_taken_once_per_intersection() {
    let config = SimConfig::default();
    let mut nodes = BTreeMap::new();
    let mut junction = node(0, 400.0, 300.0, None);
    junction.set_manual(Axis::Horizontal);
    nodes.insert(junction.id, junction);

    for seed in 0..40 {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = vehicle(1, Position::new(390.0, 268.0), Direction::East, 4.0);
        let mut vehicles = BTreeMap::new();
        vehicles.insert(start.id, start);

        let ctx = MotionContext {
            config: &config,
            intersections: &nodes,
            vehicles: &vehicles,
        };
        let first = vehicles[&VehicleId(SimId(1))].plan_step(&ctx, &mut rng).vehicle;
        assert_eq!(first.last_intersection_id, Some(IntersectionId(SimId(0))));

        if first.direction == Direction::East {
            let mut after = BTreeMap::new();
            after.insert(first.id, first.clone());
            let ctx = MotionContext {
                config: &config,
                intersections: &nodes,
                vehicles: &after,
            };
            for _ in 0..10 {
                let again = first.plan_step(&ctx, &mut rng).vehicle;
                assert_eq!(again.direction, Direction::East);
            }
        } else {
            assert_ne!(first.direction, Direction::West);
            let lane = Position::new(400.0, 300.0).lane_centre(first.direction, 32.0);
            let moved = first.speed;
            assert_approx_eq!(
                first.position.distance(&lane.advanced(first.direction, moved)),
                0.0,
                1e-4
            );
        }
    }
}

#[test]
fn test_free_flow_converges_to_base_speed() {
    let (mut world, _) = quiet_world(1);
    // Well clear of the only junction's roads
    let id = world.add_vehicle(
        VehicleType::Car,
        Position::new(0.0, 100.0),
        Direction::East,
        4.0,
    );

    for _ in 0..25 {
        world.tick();
    }
    assert_eq!(world.vehicles[&id].speed, 4.0);

    for _ in 0..20 {
        world.tick();
        assert_eq!(world.vehicles[&id].speed, 4.0);
        assert_eq!(world.vehicles[&id].movement_state, MovementState::Moving);
    }
}

#[test]
fn test_vehicle_stops_at_red_and_holds() {
    let (mut world, junction) = quiet_world(2);
    world
        .apply_command(ControlCommand::SetManualSignal {
            intersection: junction,
            axis: Axis::Horizontal,
        })
        .unwrap();

    let centre = world.intersections[&junction].position;
    let stop_line = world.config().stop_line_distance;
    let id = world.add_vehicle(
        VehicleType::Car,
        Position::new(centre.x + 32.0, 0.0),
        Direction::South,
        4.0,
    );

    let mut stopped_since = None;
    for tick in 0..400 {
        world.tick();
        let v = &world.vehicles[&id];
        let distance = v.position.forward_distance_to(&centre, Direction::South);
        assert!(distance >= stop_line, "crossed the stop line at tick {}", tick);

        if let Some(since) = stopped_since {
            // Once inside the hard-stop gap the vehicle is stationary from the next tick on
            if tick > since {
                assert_eq!(v.speed, 0.0);
            }
        } else if distance - stop_line < world.config().hard_stop_gap {
            stopped_since = Some(tick);
        }
    }

    let v = &world.vehicles[&id];
    assert!(stopped_since.is_some(), "vehicle never reached the stop line");
    assert_eq!(v.speed, 0.0);
    assert_eq!(v.movement_state, MovementState::Waiting);
    assert!(v.waiting_ticks > 0);
}

#[test]
fn test_vehicle_clears_green_junction() {
    let (mut world, junction) = quiet_world(3);
    world
        .apply_command(ControlCommand::SetManualSignal {
            intersection: junction,
            axis: Axis::Vertical,
        })
        .unwrap();

    let centre = world.intersections[&junction].position;
    let id = world.add_vehicle(
        VehicleType::Bike,
        Position::new(centre.x + 32.0, 0.0),
        Direction::South,
        4.0,
    );

    for _ in 0..150 {
        world.tick();
    }

    assert_eq!(world.intersections[&junction].throughput, 1);
    assert_eq!(world.stats.total_throughput, 1);
    let v = &world.vehicles[&id];
    assert_eq!(v.last_intersection_id, Some(junction));
    assert_ne!(v.direction, Direction::North);
}

#[test]
fn test_follower_yields_to_leader_in_same_lane() {
    let config = SimConfig::default();
    let nodes = BTreeMap::new();

    let mut follower = vehicle(1, Position::new(100.0, 118.0), Direction::East, 4.0);
    follower.speed = 4.0;
    let mut leader = vehicle(2, Position::new(140.0, 118.0), Direction::East, 4.0);
    leader.speed = 2.0;
    // Same heading and lane offset, parallel road
    let mut neighbour = vehicle(3, Position::new(100.0, 268.0), Direction::East, 4.0);
    neighbour.speed = 4.0;

    let vehicles: BTreeMap<VehicleId, SimVehicle> = [follower, leader, neighbour]
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    let ctx = MotionContext {
        config: &config,
        intersections: &nodes,
        vehicles: &vehicles,
    };
    let mut rng = StdRng::seed_from_u64(0);

    let found = vehicles[&VehicleId(SimId(1))]
        .find_leader(vehicles.values(), &config)
        .expect("leader in range");
    assert_eq!(found.id, VehicleId(SimId(2)));

    // Target is 0.9 * 2.0; braking is capped at 0.5 per tick
    let step = vehicles[&VehicleId(SimId(1))].plan_step(&ctx, &mut rng);
    assert_approx_eq!(step.vehicle.speed, 3.5, 1e-6);

    // The slow vehicle on the other road does not count
    assert!(vehicles[&VehicleId(SimId(3))]
        .find_leader(vehicles.values(), &config)
        .is_none());
    let step = vehicles[&VehicleId(SimId(3))].plan_step(&ctx, &mut rng);
    assert_eq!(step.vehicle.speed, 4.0);
}

#[test]
fn test_tick_reads_pre_tick_snapshot() {
    let (mut world, _) = quiet_world(4);
    let follower = world.add_vehicle(
        VehicleType::Car,
        Position::new(0.0, 100.0),
        Direction::East,
        4.0,
    );
    let leader = world.add_vehicle(
        VehicleType::Car,
        Position::new(50.0, 100.0),
        Direction::East,
        4.0,
    );
    world.vehicles.get_mut(&follower).unwrap().speed = 3.0;
    world.vehicles.get_mut(&leader).unwrap().speed = 3.0;

    // Plan both against the same untouched state
    let config = world.config().clone();
    let snapshot = world.vehicles.clone();
    let nodes = world.intersections.clone();
    let ctx = MotionContext {
        config: &config,
        intersections: &nodes,
        vehicles: &snapshot,
    };
    let mut rng = StdRng::seed_from_u64(0);
    let expected_follower = snapshot[&follower].plan_step(&ctx, &mut rng).vehicle;
    let expected_leader = snapshot[&leader].plan_step(&ctx, &mut rng).vehicle;

    world.tick();

    // Follower targets 0.9 * 3.0, not 0.9 * the leader's new 3.2
    assert_approx_eq!(expected_follower.speed, 2.7, 1e-6);
    assert_approx_eq!(world.vehicles[&follower].speed, expected_follower.speed, 1e-6);
    assert_approx_eq!(world.vehicles[&leader].speed, expected_leader.speed, 1e-6);
    assert_approx_eq!(world.vehicles[&follower].position.x, expected_follower.position.x, 1e-4);
}

#[test]
fn test_crashed_vehicle_is_inert() {
    let (mut world, _) = quiet_world(5);
    let id = world.add_vehicle(
        VehicleType::Bus,
        Position::new(100.0, 100.0),
        Direction::East,
        2.0,
    );
    world.vehicles.get_mut(&id).unwrap().movement_state = MovementState::Crashed;

    for _ in 0..20 {
        world.tick();
    }
    let v = &world.vehicles[&id];
    assert_eq!(v.position, Position::new(100.0, 100.0));
    assert_eq!(v.speed, 0.0);
    assert_eq!(v.movement_state, MovementState::Crashed);
}

#[test]
fn test_speed_stays_within_bounds_over_long_run() {
    let mut world = SimWorld::new_with_seed(99);
    for _ in 0..1500 {
        world.tick();
        for v in world.vehicles.values() {
            assert!(v.speed >= 0.0, "negative speed {}", v.speed);
            assert!(
                v.speed <= v.base_speed,
                "speed {} above base {}",
                v.speed,
                v.base_speed
            );
        }
    }
    assert!(world.stats.vehicles_spawned > 0);
}
