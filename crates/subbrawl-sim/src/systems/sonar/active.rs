//! Active sonar: ping cost, echo generation and ping interception.
//!
//! Echo quality is a logistic function of an echo level that falls with
//! range and toward the beam edge. Low-quality echoes carry wider bearing,
//! range and depth errors.

use hecs::World;
use rand_chacha::ChaCha8Rng;

use subbrawl_core::commands::PingCost;
use subbrawl_core::components::{Owner, Submarine, Torpedo};
use subbrawl_core::config::{ActivePowerConfig, ActiveSonarConfig};
use subbrawl_core::enums::{ContactKind, RangeClass};
use subbrawl_core::events::{Echo, PassiveContact};
use subbrawl_core::types::{angle_diff, wrap_bearing, AccountId, EntityId, Position};

use super::{in_arc, jitter};
use crate::systems::weather::Medium;

/// Battery cost of one ping.
pub fn ping_cost(power: &ActivePowerConfig, beam_deg: f64, max_range: f64) -> PingCost {
    let base = power.base_cost;
    let angle = power.cost_per_degree * beam_deg;
    let range = power.cost_per_100m_range * max_range / 100.0;
    PingCost {
        base,
        angle,
        range,
        total: base + angle + range,
    }
}

/// Echo quality in `(0, 1)`.
///
/// `edge_fraction` is the target's angular offset from the beam center
/// over the beam half-width: 0 on axis, 1 at the edge. `loss` is the
/// propagation loss of the medium in dB.
pub fn echo_quality(
    cfg: &ActiveSonarConfig,
    range: f64,
    beam_deg: f64,
    edge_fraction: f64,
    snorkeling: bool,
    loss: f64,
) -> f64 {
    let mut level = cfg.echo_base_level - cfg.echo_range_loss_per_m * range - loss;
    if snorkeling {
        level += cfg.snorkel_echo_bonus;
    }
    level += cfg.focus_bonus_max * ((90.0 - beam_deg) / 90.0).max(0.0);
    level -= cfg.edge_penalty_db * edge_fraction * edge_fraction;
    1.0 / (1.0 + (-(level - cfg.quality_midpoint) / cfg.quality_spread).exp())
}

/// Geometry of one ping.
#[derive(Debug, Clone, Copy)]
pub struct Beam {
    pub origin: Position,
    /// Pinger's heading, for relative bearings.
    pub heading: f64,
    /// Absolute bearing of the beam center.
    pub center: f64,
    pub beam_deg: f64,
    pub max_range: f64,
}

/// Something that can return an echo.
#[derive(Debug, Clone, Copy)]
pub struct Reflector {
    pub id: EntityId,
    pub owner: AccountId,
    pub pos: Position,
    pub snorkeling: bool,
}

/// Live submarines, plus live torpedoes when `with_torpedoes`, sorted by id.
pub fn reflectors(world: &World, with_torpedoes: bool) -> Vec<Reflector> {
    let mut out: Vec<Reflector> = world
        .query::<(&EntityId, &Owner, &Position, &Submarine)>()
        .iter()
        .filter(|(_, (_, _, _, sub))| !sub.destroyed)
        .map(|(_, (id, owner, pos, sub))| Reflector {
            id: *id,
            owner: owner.0,
            pos: *pos,
            snorkeling: sub.snorkeling,
        })
        .collect();
    if with_torpedoes {
        out.extend(
            world
                .query::<(&EntityId, &Owner, &Position, &Torpedo)>()
                .iter()
                .filter(|(_, (_, _, _, torp))| !torp.guidance.is_terminal())
                .map(|(_, (id, owner, pos, _))| Reflector {
                    id: *id,
                    owner: owner.0,
                    pos: *pos,
                    snorkeling: false,
                }),
        );
    }
    out.sort_by_key(|r| r.id);
    out
}

/// Echoes from every reflector inside the beam and range.
pub fn echoes<'a>(
    cfg: &ActiveSonarConfig,
    beam: &Beam,
    reflectors: impl IntoIterator<Item = &'a Reflector>,
    medium: &Medium,
    rng: &mut ChaCha8Rng,
) -> Vec<Echo> {
    let half_beam = (beam.beam_deg / 2.0).to_radians();
    let mut out = Vec::new();

    for r in reflectors {
        let range = beam.origin.range_to(&r.pos);
        if range > beam.max_range {
            continue;
        }
        let bearing = beam.origin.bearing_to(&r.pos);
        if !in_arc(bearing, beam.center, half_beam) {
            continue;
        }

        let edge_fraction = if half_beam > 0.0 {
            (angle_diff(beam.center, bearing).abs() / half_beam).min(1.0)
        } else {
            0.0
        };
        let loss = medium.loss(&beam.origin, &r.pos);
        let quality = echo_quality(cfg, range, beam.beam_deg, edge_fraction, r.snorkeling, loss);
        let blur = 1.0 - quality;

        let bearing_noise = jitter(rng, cfg.brg_sigma_deg * blur).to_radians();
        let range_noise = jitter(rng, (cfg.rng_sigma_m * blur).max(5.0));
        let depth_noise = jitter(rng, (range / 50.0 * blur * 25.0).max(15.0));

        let reported = wrap_bearing(bearing + bearing_noise);
        out.push(Echo {
            bearing: reported,
            bearing_relative: angle_diff(beam.heading, reported),
            range: (range + range_noise).max(0.0),
            estimated_depth: (r.pos.depth + depth_noise).max(0.0),
            quality,
        });
    }
    out
}

/// Interception SNR of a ping heard `distance` away.
pub fn intercept_snr(cfg: &ActiveSonarConfig, beam_deg: f64, max_range: f64, distance: f64) -> f64 {
    cfg.intercept_base * (beam_deg / 90.0) + cfg.intercept_range_gain * (max_range / 1000.0)
        - distance * cfg.intercept_distance_loss_per_m
}

/// Submarines that hear a ping from `pinger` at `origin`, with the contact
/// each one receives.
pub fn intercepts(
    cfg: &ActiveSonarConfig,
    range_bands: [f64; 2],
    pinger: EntityId,
    origin: &Position,
    beam_deg: f64,
    max_range: f64,
    world: &World,
) -> Vec<(AccountId, PassiveContact)> {
    let mut heard: Vec<(AccountId, PassiveContact)> = world
        .query::<(&EntityId, &Owner, &Position, &subbrawl_core::components::Motion, &Submarine)>()
        .iter()
        .filter(|(_, (id, _, _, _, sub))| **id != pinger && !sub.destroyed)
        .filter_map(|(_, (id, owner, pos, motion, _))| {
            let distance = pos.range_to(origin);
            let snr = intercept_snr(cfg, beam_deg, max_range, distance);
            if snr <= cfg.intercept_threshold {
                return None;
            }
            let bearing = pos.bearing_to(origin);
            Some((
                owner.0,
                PassiveContact {
                    observer_id: *id,
                    bearing,
                    bearing_relative: angle_diff(motion.heading, bearing),
                    range_class: RangeClass::classify(distance, range_bands),
                    snr,
                    kind: ContactKind::ActivePing,
                },
            ))
        })
        .collect();
    heard.sort_by_key(|(_, c)| c.observer_id);
    heard
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use subbrawl_core::config::WorldConfig;

    use super::*;
    use crate::systems::weather::Weather;

    fn reflector(id: u64, x: f64, y: f64) -> Reflector {
        Reflector {
            id: EntityId(id),
            owner: AccountId(id),
            pos: Position::new(x, y, 100.0),
            snorkeling: false,
        }
    }

    fn north_beam(beam_deg: f64, max_range: f64) -> Beam {
        Beam {
            origin: Position::new(0.0, 0.0, 100.0),
            heading: 0.0,
            center: 0.0,
            beam_deg,
            max_range,
        }
    }

    #[test]
    fn test_ping_cost_grows_with_beam_and_range() {
        let power = ActivePowerConfig::default();
        let narrow = ping_cost(&power, 20.0, 2000.0);
        let wide = ping_cost(&power, 120.0, 2000.0);
        let long = ping_cost(&power, 20.0, 6000.0);
        assert!(wide.total > narrow.total);
        assert!(long.total > narrow.total);
        assert!((narrow.total - (narrow.base + narrow.angle + narrow.range)).abs() < 1e-12);
    }

    #[test]
    fn test_quality_decays_with_range_and_edge() {
        let cfg = ActiveSonarConfig::default();
        let near = echo_quality(&cfg, 500.0, 20.0, 0.0, false, 0.0);
        let far = echo_quality(&cfg, 5000.0, 20.0, 0.0, false, 0.0);
        let edge = echo_quality(&cfg, 500.0, 20.0, 1.0, false, 0.0);
        let muffled = echo_quality(&cfg, 500.0, 20.0, 0.0, false, 8.0);
        assert!(near > far);
        assert!(near > edge);
        assert!(near > muffled);
        assert!(near > 0.0 && near < 1.0);
    }

    #[test]
    fn test_echoes_only_inside_beam_and_range() {
        let cfg = ActiveSonarConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let targets = [
            reflector(1, 0.0, 1000.0),   // dead ahead
            reflector(2, 1000.0, 0.0),   // abeam, outside beam
            reflector(3, 0.0, 5000.0),   // ahead but beyond range
            reflector(4, -50.0, 1500.0), // just inside a 20 degree beam
        ];
        let world = WorldConfig::default();
        let weather = Weather::default();
        let medium = Medium {
            weather: &weather,
            world: &world,
        };
        let got = echoes(&cfg, &north_beam(20.0, 3000.0), &targets, &medium, &mut rng);
        assert_eq!(got.len(), 2);
        for echo in &got {
            assert!(echo.quality > 0.0 && echo.quality < 1.0);
            assert!(echo.estimated_depth >= 0.0);
            assert!(echo.bearing_relative.abs() < 15f64.to_radians());
        }
    }

    #[test]
    fn test_ping_interception_fades_with_distance() {
        let cfg = ActiveSonarConfig::default();
        let close = intercept_snr(&cfg, 60.0, 3000.0, 500.0);
        let far = intercept_snr(&cfg, 60.0, 3000.0, 9000.0);
        assert!(close > cfg.intercept_threshold);
        assert!(far < close);
    }
}
