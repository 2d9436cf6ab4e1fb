//! Passive sonar.
//!
//! Every tick, each live submarine listens for every other submarine and
//! for torpedoes of other accounts. The array hears all around but gains
//! toward its steered bearing. Torpedo seekers listen only inside a
//! forward arc; the baffle astern is deaf.
//!
//! A contact is reported iff the source is within its class detection
//! range and the computed SNR is strictly above the class threshold.

use hecs::World;
use rand_chacha::ChaCha8Rng;

use subbrawl_core::components::{Battery, Motion, Owner, Submarine, Torpedo};
use subbrawl_core::config::{GameConfig, PassiveSonarConfig};
use subbrawl_core::enums::{ContactKind, RangeClass};
use subbrawl_core::events::{EventEnvelope, PassiveContact, SimEvent};
use subbrawl_core::types::{angle_diff, wrap_bearing, AccountId, EntityId, Position};

use super::{in_arc, jitter};
use crate::systems::weather::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterKind {
    Submarine,
    Torpedo,
}

/// How a sound source presents to a listener.
#[derive(Debug, Clone, Copy)]
pub struct Emitter {
    pub kind: EmitterKind,
    /// Speed over the class's top speed, `[0, 1]`.
    pub speed_fraction: f64,
    pub depth: f64,
    pub snorkeling: bool,
    pub blowing: bool,
    /// Transient extra source level, e.g. a hull that just ran its scanner.
    pub extra_db: f64,
}

/// The listening side.
#[derive(Debug, Clone, Copy)]
pub struct Listener {
    pub speed_fraction: f64,
    /// Angle between the steered array and the source. `None` for
    /// seekers without a steerable array.
    pub array_offset: Option<f64>,
}

/// Signal-to-noise of `emitter` as heard by `listener` at `range`.
pub fn passive_snr(
    cfg: &PassiveSonarConfig,
    emitter: &Emitter,
    listener: &Listener,
    range: f64,
    attenuation: f64,
) -> f64 {
    let (source, range_loss_per_km) = match emitter.kind {
        EmitterKind::Submarine => {
            let mut level = cfg.base_snr + cfg.speed_noise_gain * emitter.speed_fraction;
            if emitter.snorkeling {
                level += cfg.snorkel_bonus;
            }
            if emitter.blowing {
                level += cfg.blow_bonus;
            }
            (level + emitter.extra_db, cfg.range_loss_per_km)
        }
        EmitterKind::Torpedo => (
            cfg.base_snr * cfg.torpedo_base_factor
                + cfg.speed_noise_gain * emitter.speed_fraction * cfg.torpedo_noise_factor,
            cfg.torpedo_range_loss_per_km,
        ),
    };
    let array_gain = listener
        .array_offset
        .map_or(0.0, |offset| cfg.array_gain_db * offset.cos());

    source + array_gain
        - range_loss_per_km * range / 1000.0
        - cfg.depth_loss_per_200m * emitter.depth / 200.0
        - cfg.self_noise_gain * listener.speed_fraction
        - attenuation
}

/// Farthest range a source of this kind can be heard at all.
pub fn detection_range(cfg: &PassiveSonarConfig, emitter: &Emitter) -> f64 {
    match emitter.kind {
        EmitterKind::Submarine if emitter.blowing => cfg.blow_max_range,
        EmitterKind::Submarine => cfg.max_range,
        EmitterKind::Torpedo => cfg.torpedo_max_range,
    }
}

/// SNR of a detectable source, `None` when it stays below the threshold.
pub fn detect(
    cfg: &PassiveSonarConfig,
    emitter: &Emitter,
    listener: &Listener,
    range: f64,
    attenuation: f64,
    threshold: f64,
) -> Option<f64> {
    if range > detection_range(cfg, emitter) {
        return None;
    }
    let snr = passive_snr(cfg, emitter, listener, range, attenuation);
    (snr > threshold).then_some(snr)
}

/// Per-tick copy of a submarine's acoustic state.
#[derive(Debug, Clone, Copy)]
struct SubSample {
    id: EntityId,
    owner: AccountId,
    pos: Position,
    heading: f64,
    speed: f64,
    snorkeling: bool,
    blowing: bool,
    scanning: bool,
    array_bearing: f64,
}

#[derive(Debug, Clone, Copy)]
struct TorpedoSample {
    id: EntityId,
    owner: AccountId,
    pos: Position,
    heading: f64,
    speed: f64,
    listening: bool,
}

fn sample_submarines(world: &World) -> Vec<SubSample> {
    let mut subs: Vec<SubSample> = world
        .query::<(&EntityId, &Owner, &Position, &Motion, &Submarine)>()
        .iter()
        .filter(|(_, (_, _, _, _, sub))| !sub.destroyed)
        .map(|(_, (id, owner, pos, motion, sub))| SubSample {
            id: *id,
            owner: owner.0,
            pos: *pos,
            heading: motion.heading,
            speed: motion.speed,
            snorkeling: sub.snorkeling,
            blowing: sub.blow_remaining_secs > 0.0,
            scanning: sub.scanner_noise_secs > 0.0,
            array_bearing: sub.passive_array_bearing,
        })
        .collect();
    subs.sort_by_key(|s| s.id);
    subs
}

fn sample_torpedoes(world: &World) -> Vec<TorpedoSample> {
    let mut torps: Vec<TorpedoSample> = world
        .query::<(&EntityId, &Owner, &Position, &Motion, &Battery, &Torpedo)>()
        .iter()
        .filter(|(_, (_, _, _, _, _, torp))| !torp.guidance.is_terminal())
        .map(|(_, (id, owner, pos, motion, battery, torp))| TorpedoSample {
            id: *id,
            owner: owner.0,
            pos: *pos,
            heading: motion.heading,
            speed: motion.speed,
            listening: torp.passive_sonar && battery.0 > 0.0,
        })
        .collect();
    torps.sort_by_key(|t| t.id);
    torps
}

fn sub_emitter(s: &SubSample, config: &GameConfig) -> Emitter {
    Emitter {
        kind: EmitterKind::Submarine,
        speed_fraction: (s.speed / config.sub.max_speed).clamp(0.0, 1.0),
        depth: s.pos.depth,
        snorkeling: s.snorkeling,
        blowing: s.blowing,
        extra_db: if s.scanning {
            config.world.weather.scanner.noise_db
        } else {
            0.0
        },
    }
}

/// Run passive detection for all listeners.
///
/// Must be called AFTER physics (positions are this tick's) and BEFORE
/// guidance (torpedo seekers' bearings feed the FSM's tick). A seeker that
/// is not listening loses its bearing.
pub fn run(
    world: &mut World,
    config: &GameConfig,
    medium: &Medium,
    rng: &mut ChaCha8Rng,
    tick: u64,
    events: &mut Vec<EventEnvelope>,
) {
    let cfg = &config.sonar.passive;
    let subs = sample_submarines(world);
    let torps = sample_torpedoes(world);
    let attenuation = |a: &Position, b: &Position| medium.loss(a, b);

    // Pass 1: submarine arrays
    for obs in &subs {
        let listener_speed = (obs.speed / config.sub.max_speed).clamp(0.0, 1.0);

        for tgt in subs.iter().filter(|t| t.id != obs.id) {
            let range = obs.pos.range_to(&tgt.pos);
            let bearing = obs.pos.bearing_to(&tgt.pos);
            let listener = Listener {
                speed_fraction: listener_speed,
                array_offset: Some(angle_diff(obs.array_bearing, bearing)),
            };
            let emitter = sub_emitter(tgt, config);
            let Some(snr) = detect(
                cfg,
                &emitter,
                &listener,
                range,
                attenuation(&obs.pos, &tgt.pos),
                cfg.sub_threshold,
            ) else {
                continue;
            };

            let (kind, spread) = if tgt.blowing {
                (ContactKind::EmergencyBlow, cfg.deep_bearing_jitter_deg)
            } else {
                (ContactKind::Submarine, cfg.bearing_jitter_deg)
            };
            let heard = wrap_bearing(bearing + jitter(rng, spread).to_radians());
            events.push(EventEnvelope::to(
                tick,
                obs.owner,
                SimEvent::PassiveContact(PassiveContact {
                    observer_id: obs.id,
                    bearing: heard,
                    bearing_relative: angle_diff(obs.heading, heard),
                    range_class: RangeClass::classify(range, cfg.sub_range_bands),
                    snr,
                    kind,
                }),
            ));
        }

        for tgt in torps.iter().filter(|t| t.owner != obs.owner) {
            let range = obs.pos.range_to(&tgt.pos);
            let bearing = obs.pos.bearing_to(&tgt.pos);
            let listener = Listener {
                speed_fraction: listener_speed,
                array_offset: Some(angle_diff(obs.array_bearing, bearing)),
            };
            let emitter = Emitter {
                kind: EmitterKind::Torpedo,
                speed_fraction: (tgt.speed / config.torpedo.max_speed).clamp(0.0, 1.0),
                depth: tgt.pos.depth,
                snorkeling: false,
                blowing: false,
                extra_db: 0.0,
            };
            let Some(snr) = detect(
                cfg,
                &emitter,
                &listener,
                range,
                attenuation(&obs.pos, &tgt.pos),
                cfg.torpedo_threshold,
            ) else {
                continue;
            };

            let heard = wrap_bearing(bearing + jitter(rng, cfg.bearing_jitter_deg).to_radians());
            events.push(EventEnvelope::to(
                tick,
                obs.owner,
                SimEvent::PassiveContact(PassiveContact {
                    observer_id: obs.id,
                    bearing: heard,
                    bearing_relative: angle_diff(obs.heading, heard),
                    range_class: RangeClass::classify(range, cfg.torpedo_range_bands),
                    snr,
                    kind: ContactKind::Torpedo,
                }),
            ));
        }
    }

    // Pass 2: torpedo seekers, forward arc only
    let seeker = &config.torpedo.sonar.passive;
    let half_arc = (seeker.arc_deg / 2.0).to_radians();
    let mut bearings: Vec<(EntityId, Option<f64>)> = Vec::new();

    for torp in &torps {
        if !torp.listening {
            bearings.push((torp.id, None));
            continue;
        }
        let mut strongest: Option<(f64, f64)> = None;

        for tgt in subs.iter().filter(|s| s.owner != torp.owner) {
            let range = torp.pos.range_to(&tgt.pos);
            if range > seeker.max_range {
                continue;
            }
            let bearing = torp.pos.bearing_to(&tgt.pos);
            if !in_arc(bearing, torp.heading, half_arc) {
                continue;
            }
            let listener = Listener {
                speed_fraction: 0.0,
                array_offset: None,
            };
            let snr = passive_snr(
                cfg,
                &sub_emitter(tgt, config),
                &listener,
                range,
                attenuation(&torp.pos, &tgt.pos),
            );
            if snr <= seeker.threshold {
                continue;
            }

            let heard = wrap_bearing(bearing + jitter(rng, seeker.bearing_jitter_deg).to_radians());
            if strongest.is_none_or(|(best, _)| snr > best) {
                strongest = Some((snr, heard));
            }
            events.push(EventEnvelope::to(
                tick,
                torp.owner,
                SimEvent::TorpedoContact {
                    torpedo_id: torp.id,
                    bearing: heard,
                    bearing_relative: angle_diff(torp.heading, heard),
                    range_class: RangeClass::classify(range, seeker.range_bands),
                    snr,
                },
            ));
        }
        bearings.push((torp.id, strongest.map(|(_, b)| b)));
    }

    // Write back seeker bearings
    for (_entity, (id, torp)) in world.query_mut::<(&EntityId, &mut Torpedo)>() {
        if let Some((_, bearing)) = bearings.iter().find(|(tid, _)| tid == id) {
            torp.passive_bearing = *bearing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sub() -> Emitter {
        Emitter {
            kind: EmitterKind::Submarine,
            speed_fraction: 0.2,
            depth: 100.0,
            snorkeling: false,
            blowing: false,
            extra_db: 0.0,
        }
    }

    fn still_listener() -> Listener {
        Listener {
            speed_fraction: 0.0,
            array_offset: None,
        }
    }

    #[test]
    fn test_snr_falls_with_range() {
        let cfg = PassiveSonarConfig::default();
        let near = passive_snr(&cfg, &quiet_sub(), &still_listener(), 500.0, 0.0);
        let far = passive_snr(&cfg, &quiet_sub(), &still_listener(), 3000.0, 0.0);
        assert!(near > far);
    }

    #[test]
    fn test_snorkeling_and_blowing_are_louder() {
        let cfg = PassiveSonarConfig::default();
        let base = passive_snr(&cfg, &quiet_sub(), &still_listener(), 2000.0, 0.0);
        let snorkel = Emitter {
            snorkeling: true,
            ..quiet_sub()
        };
        let blow = Emitter {
            blowing: true,
            ..quiet_sub()
        };
        let snorkel_snr = passive_snr(&cfg, &snorkel, &still_listener(), 2000.0, 0.0);
        let blow_snr = passive_snr(&cfg, &blow, &still_listener(), 2000.0, 0.0);
        assert!(snorkel_snr > base);
        assert!(blow_snr > snorkel_snr);
        assert!(detection_range(&cfg, &blow) > detection_range(&cfg, &quiet_sub()));

        let scanning = Emitter {
            extra_db: 6.0,
            ..quiet_sub()
        };
        let scan_snr = passive_snr(&cfg, &scanning, &still_listener(), 2000.0, 0.0);
        assert!((scan_snr - base - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_array_gain_favors_steered_bearing() {
        let cfg = PassiveSonarConfig::default();
        let on_axis = Listener {
            speed_fraction: 0.0,
            array_offset: Some(0.0),
        };
        let abeam = Listener {
            speed_fraction: 0.0,
            array_offset: Some(std::f64::consts::PI),
        };
        let a = passive_snr(&cfg, &quiet_sub(), &on_axis, 1500.0, 0.0);
        let b = passive_snr(&cfg, &quiet_sub(), &abeam, 1500.0, 0.0);
        assert!((a - b - 2.0 * cfg.array_gain_db).abs() < 1e-9);
    }

    #[test]
    fn test_own_speed_masks_contacts() {
        let cfg = PassiveSonarConfig::default();
        let fast = Listener {
            speed_fraction: 1.0,
            array_offset: None,
        };
        let quiet = passive_snr(&cfg, &quiet_sub(), &still_listener(), 1000.0, 0.0);
        let noisy = passive_snr(&cfg, &quiet_sub(), &fast, 1000.0, 0.0);
        assert!(noisy < quiet);
    }

    #[test]
    fn test_detect_iff_above_threshold() {
        let cfg = PassiveSonarConfig::default();
        for range in [100.0, 800.0, 1500.0, 2500.0, 4000.0, 5900.0, 7000.0] {
            let snr = passive_snr(&cfg, &quiet_sub(), &still_listener(), range, 0.0);
            let detected = detect(
                &cfg,
                &quiet_sub(),
                &still_listener(),
                range,
                0.0,
                cfg.sub_threshold,
            );
            let expect = range <= cfg.max_range && snr > cfg.sub_threshold;
            assert_eq!(detected.is_some(), expect, "range {range}");
            if let Some(reported) = detected {
                assert_eq!(reported, snr);
            }
        }
    }

    #[test]
    fn test_attenuation_outside_ring() {
        let cfg = PassiveSonarConfig::default();
        let clear = passive_snr(&cfg, &quiet_sub(), &still_listener(), 1000.0, 0.0);
        let muffled = passive_snr(&cfg, &quiet_sub(), &still_listener(), 1000.0, 3.0);
        assert!((clear - muffled - 3.0).abs() < 1e-9);
    }
}
