//! Physics integration for submarines and torpedoes.
//!
//! Each entity is stepped independently. If an update leaves non-finite
//! state behind, the entity is rolled back to its pre-update values for
//! this tick and the fault is reported; other entities are unaffected.

use hecs::World;
use tracing::error;

use subbrawl_core::components::{Battery, Motion, Submarine, Torpedo};
use subbrawl_core::config::{GameConfig, SubConfig, TorpedoConfig};
use subbrawl_core::errors::CommandError;
use subbrawl_core::types::{step_angle_toward, step_toward, wrap_bearing, EntityId, Position};

/// Highest speed the drive can sustain at the current charge.
///
/// Falls off with the square root of charge below the propulsion knee and
/// is zero on a flat battery. An emergency blow ignores the battery.
pub fn propulsion_ceiling(battery: f64, snorkeling: bool, blowing: bool, cfg: &SubConfig) -> f64 {
    let max_speed = if snorkeling {
        cfg.max_speed * cfg.snorkel_speed_factor
    } else {
        cfg.max_speed
    };
    if blowing {
        return max_speed;
    }
    let fraction = (battery / cfg.battery.propulsion_knee).clamp(0.0, 1.0);
    max_speed * fraction.sqrt()
}

/// Advance one submarine by `dt` seconds.
///
/// A hull refueling alongside a fueler holds station: no propulsion, no
/// drain, snorkel up, and it climbs to snorkel depth and stays there.
pub fn step_submarine(
    pos: &mut Position,
    motion: &mut Motion,
    battery: &mut Battery,
    sub: &mut Submarine,
    cfg: &SubConfig,
    dt: f64,
) {
    let blowing = sub.blow_remaining_secs > 0.0;
    let powered = battery.0 > 0.0;
    let moored = sub.refuel.is_some();
    if moored {
        sub.throttle = 0.0;
        sub.snorkeling = true;
    }

    // Heading: autopilot takes the short way at no more than the yaw rate.
    let yaw_step = cfg.yaw_rate_deg_s.to_radians() * dt;
    if let Some(target) = motion.target_heading {
        motion.heading = step_angle_toward(motion.heading, target, yaw_step);
    } else if powered {
        motion.heading = wrap_bearing(motion.heading + yaw_step * sub.rudder);
    }

    // Propulsion
    let max_speed = if sub.snorkeling {
        cfg.max_speed * cfg.snorkel_speed_factor
    } else {
        cfg.max_speed
    };
    motion.target_speed = if powered || blowing {
        sub.throttle * max_speed
    } else {
        0.0
    };
    let ceiling = propulsion_ceiling(battery.0, sub.snorkeling, blowing, cfg);
    motion.speed = step_toward(
        motion.speed,
        motion.target_speed.min(ceiling),
        cfg.acceleration * dt,
    )
    .clamp(0.0, ceiling);

    // Depth
    let depth_step = cfg.depth_rate_m_s * dt;
    if blowing {
        let blow = &cfg.emergency_blow;
        pos.depth -= blow.upward_mps * dt;
        sub.blow_remaining_secs = (sub.blow_remaining_secs - dt).max(0.0);
        sub.blow_charge = (sub.blow_charge - dt / blow.duration_s).max(0.0);
    } else if moored {
        pos.depth = step_toward(pos.depth, cfg.snorkel_depth, depth_step);
    } else if !powered {
        motion.target_depth = None;
        sub.planes = 0.0;
        pos.depth += cfg.powerless_sink_rate * dt;
    } else if let Some(target) = motion.target_depth {
        pos.depth = step_toward(pos.depth, target, depth_step);
    } else {
        pos.depth += sub.planes * depth_step;
    }
    pos.depth = pos.depth.clamp(0.0, cfg.max_depth);

    *pos = pos.offset(motion.heading, motion.speed * dt);

    if !moored && sub.snorkeling && pos.depth > cfg.snorkel_depth + cfg.snorkel_off_hysteresis {
        sub.snorkeling = false;
    }

    // Battery: the diesel carries the load while snorkeling.
    let bat = &cfg.battery;
    let charging = sub.snorkeling && pos.depth <= cfg.snorkel_depth && sub.fuel > 0.0;
    if charging {
        let gain = (bat.recharge_per_s_snorkel * dt)
            .min(sub.fuel)
            .min(100.0 - battery.0)
            .max(0.0);
        battery.0 += gain;
        sub.fuel -= gain;
        if !blowing {
            sub.blow_charge =
                (sub.blow_charge + cfg.emergency_blow.recharge_per_s_at_snorkel * dt).min(1.0);
        }
    } else if !moored {
        let drain =
            (bat.drain_per_speed_sq * motion.speed * motion.speed + bat.hotel_drain_per_s) * dt;
        battery.0 -= drain;
    }
    battery.0 = battery.0.clamp(0.0, 100.0);

    if !moored && pos.depth > cfg.crush_depth {
        let excess = pos.depth - cfg.crush_depth;
        sub.health -= excess / 100.0 * cfg.crush_dps_per_100m * dt;
    }
    sub.health = sub.health.clamp(0.0, 100.0);

    sub.ping_cooldown_secs = (sub.ping_cooldown_secs - dt).max(0.0);
    sub.scanner_noise_secs = (sub.scanner_noise_secs - dt).max(0.0);
    sub.score += cfg.survival_score_per_s * (1.0 + 0.5 * sub.kills as f64) * dt;
}

/// Advance one live torpedo by `dt` seconds.
pub fn step_torpedo(
    pos: &mut Position,
    motion: &mut Motion,
    battery: &mut Battery,
    torp: &mut Torpedo,
    cfg: &TorpedoConfig,
    max_depth: f64,
    dt: f64,
) {
    if torp.guidance.is_terminal() {
        return;
    }

    motion.target_speed = motion.target_speed.clamp(cfg.min_speed, cfg.max_speed);
    motion.speed = if battery.0 > 0.0 {
        step_toward(motion.speed, motion.target_speed, cfg.acceleration * dt)
    } else {
        0.0
    };

    if let Some(target) = motion.target_heading {
        motion.heading =
            step_angle_toward(motion.heading, target, cfg.turn_rate_deg_s.to_radians() * dt);
    }
    if let Some(target) = motion.target_depth {
        pos.depth = step_toward(
            pos.depth,
            target.clamp(0.0, max_depth),
            cfg.depth_rate_m_s * dt,
        );
    }
    pos.depth = pos.depth.clamp(0.0, max_depth);

    *pos = pos.offset(motion.heading, motion.speed * dt);

    let drain = cfg.battery.drain_per_speed_sq * motion.speed * motion.speed * dt;
    battery.0 = (battery.0 - drain).clamp(0.0, cfg.battery.capacity);
    torp.age_secs += dt;
}

fn motion_is_finite(pos: &Position, motion: &Motion, battery: &Battery) -> bool {
    pos.is_finite()
        && motion.heading.is_finite()
        && motion.speed.is_finite()
        && motion.target_speed.is_finite()
        && motion.target_heading.is_none_or(f64::is_finite)
        && motion.target_depth.is_none_or(f64::is_finite)
        && battery.0.is_finite()
}

fn fault(id: EntityId, what: &str) -> CommandError {
    error!(entity = id.0, what, "non-finite state after physics step; rolled back");
    CommandError::InternalTickFault {
        id,
        reason: format!("non-finite {what} state after physics step"),
    }
}

/// Integrate every live entity. Returns the faults isolated this tick.
pub fn run(world: &mut World, config: &GameConfig, dt: f64) -> Vec<CommandError> {
    let mut faults = Vec::new();

    for (_entity, (id, pos, motion, battery, sub)) in world.query_mut::<(
        &EntityId,
        &mut Position,
        &mut Motion,
        &mut Battery,
        &mut Submarine,
    )>() {
        if sub.destroyed {
            continue;
        }
        let before = (*pos, *motion, *battery, *sub);
        step_submarine(pos, motion, battery, sub, &config.sub, dt);
        if !(motion_is_finite(pos, motion, battery)
            && sub.health.is_finite()
            && sub.fuel.is_finite()
            && sub.score.is_finite())
        {
            (*pos, *motion, *battery, *sub) = before;
            faults.push(fault(*id, "submarine"));
        }
    }

    for (_entity, (id, pos, motion, battery, torp)) in world.query_mut::<(
        &EntityId,
        &mut Position,
        &mut Motion,
        &mut Battery,
        &mut Torpedo,
    )>() {
        let before = (*pos, *motion, *battery, *torp);
        step_torpedo(
            pos,
            motion,
            battery,
            torp,
            &config.torpedo,
            config.sub.max_depth,
            dt,
        );
        if !(motion_is_finite(pos, motion, battery) && torp.age_secs.is_finite()) {
            (*pos, *motion, *battery, *torp) = before;
            faults.push(fault(*id, "torpedo"));
        }
    }

    faults
}

#[cfg(test)]
mod tests {
    use super::*;
    use subbrawl_core::components::Refuel;
    use subbrawl_core::enums::GuidanceState;
    use subbrawl_core::types::angle_diff;

    const DT: f64 = 0.1;

    fn sub_state(battery: f64) -> (Position, Motion, Battery, Submarine) {
        (
            Position::new(0.0, 0.0, 100.0),
            Motion {
                heading: 0.0,
                target_heading: Some(0.0),
                speed: 0.0,
                target_speed: 0.0,
                target_depth: Some(100.0),
            },
            Battery(battery),
            Submarine {
                throttle: 0.0,
                rudder: 0.0,
                planes: 0.0,
                health: 100.0,
                fuel: 1000.0,
                snorkeling: false,
                blow_remaining_secs: 0.0,
                blow_charge: 1.0,
                passive_array_bearing: 0.0,
                tubes_loaded: 4,
                ping_cooldown_secs: 0.0,
                kills: 0,
                score: 0.0,
                refuel: None,
                scanner_noise_secs: 0.0,
                destroyed: false,
            },
        )
    }

    #[test]
    fn test_heading_converges_monotonically_short_way() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(80.0);
        motion.heading = 350f64.to_radians();
        motion.target_heading = Some(20f64.to_radians());
        let max_step = cfg.yaw_rate_deg_s.to_radians() * DT;

        let mut last_err = angle_diff(motion.heading, 20f64.to_radians()).abs();
        for _ in 0..200 {
            let before = motion.heading;
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
            let turned = angle_diff(before, motion.heading);
            assert!(turned >= -1e-12, "must turn clockwise through north");
            assert!(turned <= max_step + 1e-12, "yaw rate exceeded");
            let err = angle_diff(motion.heading, 20f64.to_radians()).abs();
            assert!(err <= last_err + 1e-12);
            last_err = err;
        }
        assert!(last_err < 1e-9);
    }

    #[test]
    fn test_heading_converges_within_rate_bound() {
        let cfg = GameConfig::default().sub;
        let yaw_step = cfg.yaw_rate_deg_s.to_radians() * DT;
        let cases: [(f64, f64); 10] = [
            (0.0, 90.0),
            (90.0, 0.0),
            (350.0, 20.0),
            (20.0, 350.0),
            (0.0, 180.0),
            (180.0, 359.0),
            (270.0, 90.5),
            (45.0, 45.0),
            (10.0, 10.05),
            (300.0, 120.0),
        ];

        for (start, target) in cases {
            let (mut pos, mut motion, mut battery, mut sub) = sub_state(80.0);
            let target = target.to_radians();
            motion.heading = start.to_radians();
            motion.target_heading = Some(target);
            let bound = (angle_diff(motion.heading, target).abs() / yaw_step).ceil() as usize;

            let mut steps = 0;
            while angle_diff(motion.heading, target).abs() > 1e-9 {
                assert!(
                    steps < bound,
                    "{start} -> {}: still {:.4} rad off after {steps} steps, bound {bound}",
                    target.to_degrees(),
                    angle_diff(motion.heading, target)
                );
                step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
                steps += 1;
            }
            assert!(steps <= bound);

            // Settled: further steps hold the heading.
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
            assert!(angle_diff(motion.heading, target).abs() <= 1e-9);
        }
    }

    #[test]
    fn test_moored_hull_holds_station_at_snorkel_depth() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(50.0);
        pos.depth = 40.0;
        motion.speed = 5.0;
        sub.throttle = 1.0;
        sub.refuel = Some(Refuel {
            fueler: EntityId(9),
            warmup_secs: 0.0,
        });

        for _ in 0..200 {
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
            assert!(sub.snorkeling, "snorkel stays up while moored");
        }
        assert_eq!(sub.throttle, 0.0);
        assert_eq!(motion.speed, 0.0);
        assert_eq!(pos.depth, cfg.snorkel_depth);
        assert!(battery.0 > 50.0, "diesel still charges while moored");
    }

    #[test]
    fn test_scanner_noise_decays() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(50.0);
        sub.scanner_noise_secs = 0.25;
        for _ in 0..3 {
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
        }
        assert_eq!(sub.scanner_noise_secs, 0.0);
    }

    #[test]
    fn test_speed_respects_acceleration() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(90.0);
        sub.throttle = 1.0;
        step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
        assert!((motion.speed - cfg.acceleration * DT).abs() < 1e-9);
        assert_eq!(motion.target_speed, cfg.max_speed);
    }

    #[test]
    fn test_propulsion_ceiling_falls_with_charge() {
        let cfg = GameConfig::default().sub;
        let full = propulsion_ceiling(100.0, false, false, &cfg);
        let low = propulsion_ceiling(10.0, false, false, &cfg);
        let flat = propulsion_ceiling(0.0, false, false, &cfg);
        assert_eq!(full, cfg.max_speed);
        assert!(low < full && low > 0.0);
        assert_eq!(flat, 0.0);
        assert_eq!(propulsion_ceiling(0.0, false, true, &cfg), cfg.max_speed);
        assert!(propulsion_ceiling(100.0, true, false, &cfg) < cfg.max_speed);
    }

    #[test]
    fn test_depth_clamped_to_bounds() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(90.0);
        motion.target_depth = None;
        sub.planes = -1.0;
        for _ in 0..2000 {
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
            assert!(pos.depth >= 0.0);
        }
        assert_eq!(pos.depth, 0.0);

        sub.planes = 1.0;
        battery.0 = 90.0;
        for _ in 0..5000 {
            battery.0 = 90.0;
            step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
            assert!(pos.depth <= cfg.max_depth);
        }
        assert_eq!(pos.depth, cfg.max_depth);
        assert!(sub.health < 100.0, "below crush depth the hull takes damage");
    }

    #[test]
    fn test_emergency_blow_overrides_planes() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(50.0);
        motion.target_depth = None;
        sub.planes = 1.0;
        sub.blow_remaining_secs = cfg.emergency_blow.duration_s;
        let start = pos.depth;
        step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
        assert!(pos.depth < start);
        assert!(sub.blow_charge < 1.0);
    }

    #[test]
    fn test_snorkel_recharges_from_fuel() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(50.0);
        pos.depth = 10.0;
        motion.target_depth = Some(10.0);
        sub.snorkeling = true;
        sub.throttle = 0.5;
        step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
        assert!(battery.0 > 50.0);
        assert!(sub.fuel < 1000.0);
    }

    #[test]
    fn test_snorkel_retracts_when_too_deep() {
        let cfg = GameConfig::default().sub;
        let (mut pos, mut motion, mut battery, mut sub) = sub_state(50.0);
        pos.depth = 40.0;
        sub.snorkeling = true;
        step_submarine(&mut pos, &mut motion, &mut battery, &mut sub, &cfg, DT);
        assert!(!sub.snorkeling);
        assert!(battery.0 < 50.0);
    }

    #[test]
    fn test_torpedo_speed_clamped_and_drains() {
        let config = GameConfig::default();
        let (mut pos, _, _, _) = sub_state(0.0);
        let mut motion = Motion {
            heading: 0.0,
            target_heading: Some(0.0),
            speed: 14.0,
            target_speed: 99.0,
            target_depth: Some(100.0),
        };
        let mut battery = Battery(100.0);
        let mut torp = Torpedo {
            parent: EntityId(1),
            launch_point: pos,
            wire_range: 1000.0,
            guidance: GuidanceState::WireGuided,
            wire_connected: true,
            active_sonar: false,
            passive_sonar: true,
            lifetime_secs: 240.0,
            age_secs: 0.0,
            armed: false,
            next_ping_secs: 0.0,
            passive_bearing: None,
        };
        for _ in 0..100 {
            step_torpedo(
                &mut pos,
                &mut motion,
                &mut battery,
                &mut torp,
                &config.torpedo,
                config.sub.max_depth,
                DT,
            );
            assert!(motion.speed <= config.torpedo.max_speed + 1e-9);
        }
        assert_eq!(motion.target_speed, config.torpedo.max_speed);
        assert!(battery.0 < 100.0);
        assert!(pos.y > 0.0, "heading north moves +y");
        assert!((torp.age_secs - 10.0).abs() < 1e-6);
    }
}
