use moshpit_core::{
    BoundaryPolicy, MosherKind, MoshpitConfig, Simulation, Tuning, Vec2, Viewport,
};

fn quiet_config() -> MoshpitConfig {
    MoshpitConfig {
        population: 1,
        arena_width: 10.0,
        arena_height: 10.0,
        noise_strength: 0.0,
        flock_strength: 0.0,
        damping: 0.0,
        sub_steps: 1,
        rng_seed: Some(42),
        ..MoshpitConfig::default()
    }
}

#[test]
fn seeded_runs_are_bit_identical() {
    let config = MoshpitConfig {
        population: 150,
        rng_seed: Some(0xDEADBEEF),
        ..MoshpitConfig::default()
    };
    let viewport = Viewport::new(200.0, 200.0);

    let mut sim_a = Simulation::new(config.clone()).expect("sim_a");
    let mut sim_b = Simulation::new(config).expect("sim_b");

    for _ in 0..40 {
        let events_a = sim_a.advance();
        let events_b = sim_b.advance();
        assert_eq!(events_a, events_b);
        assert_eq!(
            sim_a.snapshot(viewport),
            sim_b.snapshot(viewport),
            "identical seeds must produce identical snapshots"
        );
    }
}

#[test]
fn different_seeds_diverge() {
    let base = MoshpitConfig {
        population: 150,
        rng_seed: Some(1),
        ..MoshpitConfig::default()
    };
    let mut other = base.clone();
    other.rng_seed = Some(2);
    let viewport = Viewport::new(200.0, 200.0);

    let mut sim_a = Simulation::new(base).expect("sim_a");
    let mut sim_b = Simulation::new(other).expect("sim_b");
    for _ in 0..10 {
        sim_a.advance();
        sim_b.advance();
    }
    assert_ne!(sim_a.snapshot(viewport), sim_b.snapshot(viewport));
}

#[test]
fn periodic_boundary_wraps_constant_velocity() {
    let mut sim = Simulation::new(quiet_config()).expect("simulation");
    {
        let columns = sim.moshers_mut();
        columns.positions_mut()[0] = Vec2::new(9.95, 5.0);
        columns.velocities_mut()[0] = Vec2::new(2.0, 0.0);
    }
    sim.advance();
    let position = sim.moshers().positions()[0];
    assert!((position.x - 0.15).abs() < 1e-12, "raw 10.15 wraps to 0.15");
    assert_eq!(position.y, 5.0);
    assert_eq!(sim.moshers().velocities()[0], Vec2::new(2.0, 0.0));

    // The same velocity short of the edge must not wrap.
    {
        let columns = sim.moshers_mut();
        columns.positions_mut()[0] = Vec2::new(9.5, 5.0);
    }
    sim.advance();
    assert!((sim.moshers().positions()[0].x - 9.7).abs() < 1e-12);
}

#[test]
fn reflective_boundary_mirrors_and_flips() {
    let mut config = quiet_config();
    config.boundary_x = BoundaryPolicy::Reflective;
    let mut sim = Simulation::new(config).expect("simulation");
    {
        let columns = sim.moshers_mut();
        columns.positions_mut()[0] = Vec2::new(9.9, 5.0);
        columns.velocities_mut()[0] = Vec2::new(5.0, 0.0);
    }
    sim.advance();
    let position = sim.moshers().positions()[0];
    let velocity = sim.moshers().velocities()[0];
    assert!((position.x - 9.6).abs() < 1e-12, "raw 10.4 reflects to 9.6");
    assert_eq!(velocity.x, -5.0, "velocity component flips on reflection");
    assert_eq!(velocity.y, 0.0);
}

#[test]
fn positions_stay_in_arena_under_both_policies() {
    for boundary in [BoundaryPolicy::Periodic, BoundaryPolicy::Reflective] {
        let config = MoshpitConfig {
            population: 120,
            arena_width: 20.0,
            arena_height: 20.0,
            boundary_x: boundary,
            boundary_y: boundary,
            rng_seed: Some(77),
            ..MoshpitConfig::default()
        };
        let mut sim = Simulation::new(config.clone()).expect("simulation");
        for _ in 0..60 {
            sim.advance();
            for position in &sim.moshers().positions()[..sim.population()] {
                assert!(
                    (0.0..config.arena_width).contains(&position.x),
                    "x={} escaped under {boundary:?}",
                    position.x
                );
                assert!(
                    (0.0..config.arena_height).contains(&position.y),
                    "y={} escaped under {boundary:?}",
                    position.y
                );
            }
        }
    }
}

#[test]
fn isolated_passive_mosher_decays_to_rest() {
    let mut config = quiet_config();
    config.damping = 1.0;
    let mut sim = Simulation::new(config).expect("simulation");
    {
        let columns = sim.moshers_mut();
        columns.kinds_mut()[0] = MosherKind::Passive;
        columns.positions_mut()[0] = Vec2::new(5.0, 5.0);
        columns.velocities_mut()[0] = Vec2::new(0.3, 0.4);
    }

    let floor = 1e-3;
    let mut speed = sim.moshers().velocities()[0].length();
    for _ in 0..120 {
        sim.advance();
        let next = sim.moshers().velocities()[0].length();
        if speed * speed > 1e-6 {
            assert!(next < speed, "speed must strictly decrease above the floor");
        } else {
            assert_eq!(next, speed, "below the floor damping goes inert");
        }
        speed = next;
    }
    assert!(speed < floor);
    // With no neighbors and a dead-still mosher, the accumulated force of
    // the final tick is exactly zero.
    assert_eq!(sim.moshers().forces()[0], Vec2::ZERO);
    assert_eq!(sim.moshers().collision_energy()[0], 0.0);
}

#[test]
fn population_shrink_preserves_dormant_state() {
    let mut sim = Simulation::new(MoshpitConfig {
        population: 8,
        arena_width: 40.0,
        arena_height: 40.0,
        rng_seed: Some(9),
        ..MoshpitConfig::default()
    })
    .expect("simulation");
    sim.advance();

    let stored: Vec<(Vec2, Vec2, MosherKind)> = (4..8)
        .map(|i| {
            (
                sim.moshers().positions()[i],
                sim.moshers().velocities()[i],
                sim.moshers().kinds()[i],
            )
        })
        .collect();

    sim.reconfigure(Tuning {
        population: Some(4),
        ..Tuning::default()
    })
    .expect("shrink");
    for _ in 0..20 {
        sim.advance();
    }

    let snapshot = sim.snapshot(Viewport::new(200.0, 200.0));
    assert_eq!(snapshot.moshers.len(), 4);
    for (offset, &(position, velocity, kind)) in stored.iter().enumerate() {
        let i = 4 + offset;
        assert_eq!(sim.moshers().positions()[i], position, "dormant position");
        assert_eq!(sim.moshers().velocities()[i], velocity, "dormant velocity");
        assert_eq!(sim.moshers().kinds()[i], kind, "dormant kind");
    }

    sim.reconfigure(Tuning {
        population: Some(8),
        ..Tuning::default()
    })
    .expect("regrow");
    assert_eq!(sim.population(), 8);
    assert_eq!(sim.snapshot(Viewport::new(200.0, 200.0)).moshers.len(), 8);
}

#[test]
fn grid_overflow_degrades_without_fault() {
    let config = MoshpitConfig {
        population: 200,
        arena_width: 3.0,
        arena_height: 3.0,
        rng_seed: Some(5),
        ..MoshpitConfig::default()
    };
    let mut sim = Simulation::new(config.clone()).expect("simulation");
    let mut saw_drop = false;
    for _ in 0..10 {
        let events = sim.advance();
        saw_drop |= events.grid_dropped > 0;
        for position in &sim.moshers().positions()[..sim.population()] {
            assert!((0.0..config.arena_width).contains(&position.x));
            assert!((0.0..config.arena_height).contains(&position.y));
        }
    }
    assert!(saw_drop, "a packed single-cell arena must report drops");
    assert_eq!(sim.snapshot(Viewport::new(200.0, 200.0)).moshers.len(), 200);
}

#[test]
fn leader_record_tracks_leader_mosher() {
    let mut sim = Simulation::new(MoshpitConfig {
        population: 150,
        rng_seed: Some(31),
        ..MoshpitConfig::default()
    })
    .expect("simulation");
    for _ in 0..5 {
        sim.advance();
    }
    let snapshot = sim.snapshot(Viewport::new(400.0, 300.0));
    let leader = &snapshot.moshers[sim.leader_index()];
    assert_eq!(leader.kind, MosherKind::Leader);
    assert_eq!(snapshot.leader.x, leader.x);
    assert_eq!(snapshot.leader.y, leader.y);
    assert_eq!(snapshot.leader.collision_pct, leader.collision_pct);
}
