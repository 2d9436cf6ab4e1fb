//! Weather: hazard clouds in the open ocean beyond the ring.
//!
//! Clouds are vertical discs with a depth band. They muffle sonar for
//! anything inside them or behind them, and they damage hulls that sit in
//! them outside the ring. The field grows outward as hulls push into the
//! open ocean, trimming its innermost clouds once it hits the cap.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use hecs::World;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use subbrawl_core::components::Submarine;
use subbrawl_core::config::{CloudConfig, Ring, ScannerConfig, WorldConfig};
use subbrawl_core::events::CloudContact;
use subbrawl_core::types::{wrap_bearing, Position};

use super::sonar::jitter;
use crate::world_setup::uniform;

/// Minimum vertical extent of a cloud, so a zero thickness still blocks.
const MIN_THICKNESS: f64 = 5.0;

/// The frontier only grows once the target reach beats the current one by this much.
const FRONTIER_STEP: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cloud {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub min_depth: f64,
    pub max_depth: f64,
    pub attenuation_db: f64,
    pub damage_dps: f64,
}

impl Cloud {
    fn spans(&self, depth: f64) -> bool {
        depth >= self.min_depth && depth <= self.max_depth
    }

    fn horizontal_distance(&self, x: f64, y: f64) -> f64 {
        ((x - self.x).powi(2) + (y - self.y).powi(2)).sqrt()
    }

    pub fn contains(&self, pos: &Position) -> bool {
        self.spans(pos.depth) && self.horizontal_distance(pos.x, pos.y) <= self.radius
    }

    /// Distance of the cloud center from the ring center.
    fn reach(&self, ring: &Ring) -> f64 {
        self.horizontal_distance(ring.x, ring.y)
    }

    /// Closest horizontal approach of the segment `a`-`b` to the center.
    fn segment_distance(&self, a: &Position, b: &Position) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.horizontal_distance(a.x, a.y);
        }
        let t = (((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
        self.horizontal_distance(a.x + t * dx, a.y + t * dy)
    }
}

/// Draw one cloud between `inner` and `outer` from the ring center,
/// skewed toward the outer edge.
fn spawn_cloud(rng: &mut ChaCha8Rng, cfg: &CloudConfig, ring: &Ring, inner: f64, outer: f64) -> Cloud {
    let bearing = rng.gen_range(0.0..TAU);
    let u: f64 = rng.gen();
    let reach = inner + (outer - inner) * (1.0 - u * u);
    let center = Position::new(ring.x, ring.y, 0.0).offset(bearing, reach);

    let radius = uniform(rng, cfg.radius);
    let center_depth = uniform(rng, cfg.center_depth);
    let half = uniform(rng, cfg.thickness) / 2.0;
    let min_depth = (center_depth - half).max(0.0);
    Cloud {
        x: center.x,
        y: center.y,
        radius,
        min_depth,
        max_depth: (center_depth + half).max(min_depth + MIN_THICKNESS),
        attenuation_db: cfg.attenuation_db,
        damage_dps: cfg.damage_dps,
    }
}

/// The cloud field. Empty when weather is disabled.
#[derive(Debug, Clone, Default)]
pub struct Weather {
    clouds: Vec<Cloud>,
}

impl Weather {
    /// Seed `cfg.count` clouds over the configured band.
    pub fn generate(cfg: &CloudConfig, ring: &Ring, rng: &mut ChaCha8Rng) -> Self {
        let clouds: Vec<Cloud> = (0..cfg.count)
            .map(|_| spawn_cloud(rng, cfg, ring, cfg.min_r, cfg.max_r))
            .collect();
        if !clouds.is_empty() {
            info!(clouds = clouds.len(), "hazard clouds generated");
        }
        Self { clouds }
    }

    pub fn clouds(&self) -> &[Cloud] {
        &self.clouds
    }

    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }

    /// Keep the field `frontier_margin_m` beyond the farthest hull outside
    /// the ring, at the seeded density, then trim to the cap.
    pub fn extend_frontier(
        &mut self,
        hulls: &[Position],
        cfg: &CloudConfig,
        ring: &Ring,
        rng: &mut ChaCha8Rng,
    ) {
        if cfg.count == 0 || hulls.is_empty() {
            return;
        }

        let farthest = hulls
            .iter()
            .map(|p| ((p.x - ring.x).powi(2) + (p.y - ring.y).powi(2)).sqrt())
            .fold(0.0, f64::max);
        if farthest > ring.radius {
            let current = self
                .clouds
                .iter()
                .map(|c| c.reach(ring))
                .reduce(f64::max)
                .unwrap_or(cfg.min_r);
            let target = current.max(farthest + cfg.frontier_margin_m);
            if target > current + FRONTIER_STEP {
                let density = cfg.count as f64 / (cfg.max_r - cfg.min_r).max(1.0);
                let added = ((density * (target - current)) as usize).max(1);
                for _ in 0..added {
                    let cloud = spawn_cloud(rng, cfg, ring, current, target);
                    self.clouds.push(cloud);
                }
                info!(reach = target, added, total = self.clouds.len(), "hazard field extended");
            }
        }

        let cap = (cfg.count as f64 * cfg.max_count_factor) as usize;
        if self.clouds.len() > cap {
            self.clouds.sort_by(|a, b| a.reach(ring).total_cmp(&b.reach(ring)));
            let trim = self.clouds.len() - cap;
            self.clouds.drain(..trim);
            debug!(trim, total = self.clouds.len(), "inner hazard clouds trimmed");
        }
    }

    /// Strongest attenuation of any cloud enclosing `pos`.
    pub fn attenuation_at(&self, pos: &Position) -> f64 {
        self.clouds
            .iter()
            .filter(|c| c.contains(pos))
            .map(|c| c.attenuation_db)
            .fold(0.0, f64::max)
    }

    /// Strongest attenuation of any cloud the path `a`-`b` passes through.
    pub fn occlusion(&self, a: &Position, b: &Position) -> f64 {
        let shallow = a.depth.min(b.depth);
        let deep = a.depth.max(b.depth);
        self.clouds
            .iter()
            .filter(|c| deep >= c.min_depth && shallow <= c.max_depth)
            .filter(|c| c.segment_distance(a, b) <= c.radius)
            .map(|c| c.attenuation_db)
            .fold(0.0, f64::max)
    }

    /// Damage per second at `pos`. Clouds inside the ring are harmless.
    pub fn damage_at(&self, pos: &Position, ring: &Ring) -> f64 {
        if ring.contains(pos.x, pos.y) {
            return 0.0;
        }
        self.clouds
            .iter()
            .filter(|c| c.contains(pos))
            .map(|c| c.damage_dps)
            .fold(0.0, f64::max)
    }

    /// True when no cloud touches the surface at `(x, y)`.
    pub fn surface_clear(&self, x: f64, y: f64) -> bool {
        let surface = Position::new(x, y, 0.0);
        !self.clouds.iter().any(|c| c.contains(&surface))
    }

    /// Noisy fixes on the nearest cloud edge in each bearing sector around
    /// `pos`. Clouds behind a nearer one in the same sector stay hidden.
    pub fn scan(&self, pos: &Position, cfg: &ScannerConfig, rng: &mut ChaCha8Rng) -> Vec<CloudContact> {
        let sector = cfg.sector_deg.to_radians();
        let mut nearest: BTreeMap<i64, (f64, f64, &Cloud)> = BTreeMap::new();

        for cloud in &self.clouds {
            if pos.depth < cloud.min_depth - cfg.depth_margin_m
                || pos.depth > cloud.max_depth + cfg.depth_margin_m
            {
                continue;
            }
            let edge = (cloud.horizontal_distance(pos.x, pos.y) - cloud.radius).max(0.0);
            if edge > cfg.max_range_m {
                continue;
            }
            let bearing = pos.bearing_to(&Position::new(cloud.x, cloud.y, pos.depth));
            let key = (bearing / sector).floor() as i64;
            if nearest.get(&key).is_none_or(|(best, _, _)| edge < *best) {
                nearest.insert(key, (edge, bearing, cloud));
            }
        }

        nearest
            .into_values()
            .map(|(edge, bearing, cloud)| CloudContact {
                bearing: wrap_bearing(bearing + jitter(rng, cfg.brg_sigma_deg).to_radians()),
                range: (edge + jitter(rng, cfg.rng_sigma_m)).max(0.0),
                approx_radius: cloud.radius,
                depth_band: [cloud.min_depth, cloud.max_depth],
            })
            .collect()
    }

    #[cfg(test)]
    pub fn push(&mut self, cloud: Cloud) {
        self.clouds.push(cloud);
    }
}

/// Sound propagation losses between two points: the open-ocean penalty
/// outside the ring plus whatever clouds sit at or between the ends.
#[derive(Debug, Clone, Copy)]
pub struct Medium<'a> {
    pub weather: &'a Weather,
    pub world: &'a WorldConfig,
}

impl Medium<'_> {
    pub fn loss(&self, a: &Position, b: &Position) -> f64 {
        if a.range_to(b) < self.world.weather.close_hear_range_m {
            return 0.0;
        }
        let ring = &self.world.ring;
        let open_ocean = if ring.contains(a.x, a.y) && ring.contains(b.x, b.y) {
            0.0
        } else {
            self.world.outside_ring_attenuation_db
        };
        open_ocean
            + self.weather.attenuation_at(a).max(self.weather.attenuation_at(b))
            + self.weather.occlusion(a, b)
    }
}

/// Horizontal positions of every live hull, for growing the frontier.
pub fn hull_positions(world: &World) -> Vec<Position> {
    world
        .query::<(&Position, &Submarine)>()
        .iter()
        .filter(|(_, (_, sub))| !sub.destroyed)
        .map(|(_, (pos, _))| *pos)
        .collect()
}

/// Apply cloud damage to every hull caught in one outside the ring.
pub fn hazards(world: &mut World, weather: &Weather, ring: &Ring, dt: f64) {
    if weather.is_empty() {
        return;
    }
    for (_entity, (pos, sub)) in world.query_mut::<(&Position, &mut Submarine)>() {
        if sub.destroyed {
            continue;
        }
        let dps = weather.damage_at(pos, ring);
        if dps > 0.0 {
            sub.health = (sub.health - dps * dt).max(0.0);
        }
    }
}
