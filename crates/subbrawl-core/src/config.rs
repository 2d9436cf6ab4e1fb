//! Game tuning configuration.
//!
//! Every struct carries `#[serde(default)]`, so a partial JSON document
//! merges over the built-in defaults field by field. The config is loaded
//! once at startup and treated as immutable afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Root of the tuning document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Simulation tick rate (Hz).
    pub tick_hz: f64,
    /// Upper bound on commands applied per tick; the rest wait for the next one.
    pub max_commands_per_tick: usize,
    pub world: WorldConfig,
    pub sub: SubConfig,
    pub torpedo: TorpedoConfig,
    pub sonar: SonarConfig,
    pub fueler: FuelerConfig,
    pub stream: StreamConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_hz: 10.0,
            max_commands_per_tick: 512,
            world: WorldConfig::default(),
            sub: SubConfig::default(),
            torpedo: TorpedoConfig::default(),
            sonar: SonarConfig::default(),
            fueler: FuelerConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

// --- World ---

/// Circular play area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Ring {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.x;
        let dy = y - self.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Named map objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub ring: Ring,
    /// Spawn annulus inner radius, measured from the ring center.
    pub spawn_min_r: f64,
    pub spawn_max_r: f64,
    /// Preferred minimum distance between a new spawn and any existing submarine.
    pub safe_spawn_separation: f64,
    /// Sonar penalty when either party is outside the ring.
    pub outside_ring_attenuation_db: f64,
    pub objectives: Vec<Objective>,
    pub weather: WeatherConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ring: Ring {
                x: 0.0,
                y: 0.0,
                radius: 6000.0,
            },
            spawn_min_r: 500.0,
            spawn_max_r: 4500.0,
            safe_spawn_separation: 800.0,
            outside_ring_attenuation_db: 3.0,
            objectives: vec![
                Objective {
                    id: "A".into(),
                    x: 1500.0,
                    y: -800.0,
                    radius: 250.0,
                },
                Objective {
                    id: "B".into(),
                    x: -1200.0,
                    y: 1300.0,
                    radius: 250.0,
                },
            ],
            weather: WeatherConfig::default(),
        }
    }
}

/// Hazard clouds in the open ocean beyond the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Below this range weather never muffles a contact.
    pub close_hear_range_m: f64,
    pub clouds: CloudConfig,
    pub scanner: ScannerConfig,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            close_hear_range_m: 400.0,
            clouds: CloudConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Clouds seeded at startup; zero disables weather.
    pub count: usize,
    /// Band the initial clouds are scattered over, from the ring center.
    pub min_r: f64,
    pub max_r: f64,
    pub radius: [f64; 2],
    pub center_depth: [f64; 2],
    pub thickness: [f64; 2],
    pub attenuation_db: f64,
    /// Hull damage per second inside a cloud outside the ring.
    pub damage_dps: f64,
    /// The field is grown to stay this far beyond the outermost hull.
    pub frontier_margin_m: f64,
    /// Cap on the total as a multiple of `count`; inner clouds go first.
    pub max_count_factor: f64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            count: 24,
            min_r: 6500.0,
            max_r: 9500.0,
            radius: [400.0, 1200.0],
            center_depth: [0.0, 350.0],
            thickness: [60.0, 200.0],
            attenuation_db: 8.0,
            damage_dps: 2.0,
            frontier_margin_m: 1500.0,
            max_count_factor: 4.0,
        }
    }
}

/// Short-range cloud scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub max_range_m: f64,
    pub battery_cost: f64,
    pub rng_sigma_m: f64,
    pub brg_sigma_deg: f64,
    /// Only the nearest cloud edge per sector is reported.
    pub sector_deg: f64,
    /// Clouds this far outside the hull's depth still show up.
    pub depth_margin_m: f64,
    /// The scanning hull is louder for this long.
    pub noise_duration_s: f64,
    pub noise_db: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_range_m: 500.0,
            battery_cost: 1.0,
            rng_sigma_m: 40.0,
            brg_sigma_deg: 5.0,
            sector_deg: 10.0,
            depth_margin_m: 50.0,
            noise_duration_s: 8.0,
            noise_db: 6.0,
        }
    }
}

// --- Submarine ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubConfig {
    pub max_speed: f64,
    /// m/s²
    pub acceleration: f64,
    pub yaw_rate_deg_s: f64,
    pub max_rudder_deg: f64,
    pub depth_rate_m_s: f64,
    /// Hard floor; depth is clamped to `[0, max_depth]`.
    pub max_depth: f64,
    /// Hull takes damage below this depth.
    pub crush_depth: f64,
    /// Health lost per second per 100 m below crush depth.
    pub crush_dps_per_100m: f64,
    pub snorkel_depth: f64,
    /// Extra depth tolerated before the snorkel auto-retracts.
    pub snorkel_off_hysteresis: f64,
    /// Speed cap multiplier while snorkeling.
    pub snorkel_speed_factor: f64,
    pub max_per_user: usize,
    pub spawn_depth: [f64; 2],
    /// Descent rate of a hull with a flat battery (m/s).
    pub powerless_sink_rate: f64,
    pub survival_score_per_s: f64,
    pub kill_score: f64,
    pub battery: SubBatteryConfig,
    pub emergency_blow: EmergencyBlowConfig,
}

impl Default for SubConfig {
    fn default() -> Self {
        Self {
            max_speed: 12.0,
            acceleration: 2.0,
            yaw_rate_deg_s: 3.0,
            max_rudder_deg: 30.0,
            depth_rate_m_s: 2.0,
            max_depth: 600.0,
            crush_depth: 500.0,
            crush_dps_per_100m: 30.0,
            snorkel_depth: 15.0,
            snorkel_off_hysteresis: 2.0,
            snorkel_speed_factor: 0.75,
            max_per_user: 2,
            spawn_depth: [80.0, 180.0],
            powerless_sink_rate: 0.3,
            survival_score_per_s: 1.0,
            kill_score: 100.0,
            battery: SubBatteryConfig::default(),
            emergency_blow: EmergencyBlowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubBatteryConfig {
    /// Range the starting charge is drawn from.
    pub initial: [f64; 2],
    /// Percent per second per (m/s)² of speed.
    pub drain_per_speed_sq: f64,
    /// Constant draw for onboard systems (percent per second).
    pub hotel_drain_per_s: f64,
    /// Charge below which the propulsion ceiling starts to fall.
    pub propulsion_knee: f64,
    pub recharge_per_s_snorkel: f64,
    pub max_fuel: f64,
    pub initial_fuel: f64,
    /// Fuel taken on per second from a fueler once warmed up.
    pub refuel_rate_per_s: f64,
}

impl Default for SubBatteryConfig {
    fn default() -> Self {
        Self {
            initial: [40.0, 80.0],
            drain_per_speed_sq: 0.011,
            hotel_drain_per_s: 0.02,
            propulsion_knee: 20.0,
            recharge_per_s_snorkel: 0.25,
            max_fuel: 1000.0,
            initial_fuel: 1000.0,
            refuel_rate_per_s: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyBlowConfig {
    pub duration_s: f64,
    pub upward_mps: f64,
    /// Blow charge regained per second while snorkeling with fuel.
    pub recharge_per_s_at_snorkel: f64,
}

impl Default for EmergencyBlowConfig {
    fn default() -> Self {
        Self {
            duration_s: 10.0,
            upward_mps: 5.0,
            recharge_per_s_at_snorkel: 0.06,
        }
    }
}

// --- Torpedo ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorpedoConfig {
    pub initial_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub turn_rate_deg_s: f64,
    pub depth_rate_m_s: f64,
    pub lifetime_s: f64,
    /// Distance from the launch point beyond which the torpedo expires.
    pub max_range: f64,
    /// Wire range used when the launch order does not give one.
    pub default_wire_range: f64,
    /// Spawn distance ahead of the launching hull.
    pub nose_offset: f64,
    pub arming_delay_s: f64,
    /// Fuze stays safe while the parent is closer than this.
    pub min_safe_distance: f64,
    pub fuze_radius: f64,
    pub blast_radius: f64,
    /// Full damage inside this radius.
    pub lethal_radius: f64,
    pub max_damage: f64,
    pub magazine_size: u32,
    pub launch_base_cost: f64,
    pub launch_cost_per_100m: f64,
    pub reload_cost_per_torp: f64,
    pub battery: TorpedoBatteryConfig,
    pub sonar: TorpedoSonarConfig,
}

impl Default for TorpedoConfig {
    fn default() -> Self {
        Self {
            initial_speed: 14.0,
            min_speed: 8.0,
            max_speed: 18.0,
            acceleration: 5.0,
            turn_rate_deg_s: 5.0,
            depth_rate_m_s: 6.0,
            lifetime_s: 240.0,
            max_range: 6000.0,
            default_wire_range: 1000.0,
            nose_offset: 12.0,
            arming_delay_s: 1.0,
            min_safe_distance: 150.0,
            fuze_radius: 30.0,
            blast_radius: 100.0,
            lethal_radius: 40.0,
            max_damage: 100.0,
            magazine_size: 4,
            launch_base_cost: 2.0,
            launch_cost_per_100m: 0.1,
            reload_cost_per_torp: 10.0,
            battery: TorpedoBatteryConfig::default(),
            sonar: TorpedoSonarConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorpedoBatteryConfig {
    pub capacity: f64,
    pub drain_per_speed_sq: f64,
    pub active_ping_cost: f64,
    pub min_for_ping: f64,
}

impl Default for TorpedoBatteryConfig {
    fn default() -> Self {
        Self {
            capacity: 100.0,
            drain_per_speed_sq: 0.0015,
            active_ping_cost: 2.0,
            min_for_ping: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TorpedoSonarConfig {
    pub passive: TorpedoPassiveConfig,
    pub active: TorpedoActiveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorpedoPassiveConfig {
    pub max_range: f64,
    /// Forward listening arc; everything outside it is the baffle.
    pub arc_deg: f64,
    pub bearing_jitter_deg: f64,
    pub threshold: f64,
    pub range_bands: [f64; 2],
}

impl Default for TorpedoPassiveConfig {
    fn default() -> Self {
        Self {
            max_range: 2000.0,
            arc_deg: 210.0,
            bearing_jitter_deg: 8.0,
            threshold: 3.0,
            range_bands: [800.0, 1500.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorpedoActiveConfig {
    pub max_range: f64,
    pub beam_deg: f64,
    pub ping_interval_s: f64,
    /// Echoes below this quality are ignored for homing.
    pub homing_min_quality: f64,
}

impl Default for TorpedoActiveConfig {
    fn default() -> Self {
        Self {
            max_range: 1500.0,
            beam_deg: 30.0,
            ping_interval_s: 3.0,
            homing_min_quality: 0.2,
        }
    }
}

// --- Sonar ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SonarConfig {
    pub passive: PassiveSonarConfig,
    pub active: ActiveSonarConfig,
    pub active_power: ActivePowerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveSonarConfig {
    pub base_snr: f64,
    pub speed_noise_gain: f64,
    pub snorkel_bonus: f64,
    pub blow_bonus: f64,
    pub range_loss_per_km: f64,
    pub torpedo_range_loss_per_km: f64,
    pub depth_loss_per_200m: f64,
    /// Flow noise of the listener's own hull at full speed.
    pub self_noise_gain: f64,
    /// Gain toward the steered bearing, loss away from it.
    pub array_gain_db: f64,
    pub bearing_jitter_deg: f64,
    /// Jitter used for very loud sources (blowing hulls).
    pub deep_bearing_jitter_deg: f64,
    pub sub_threshold: f64,
    pub torpedo_threshold: f64,
    pub torpedo_base_factor: f64,
    pub torpedo_noise_factor: f64,
    pub max_range: f64,
    pub blow_max_range: f64,
    pub torpedo_max_range: f64,
    pub sub_range_bands: [f64; 2],
    pub torpedo_range_bands: [f64; 2],
}

impl Default for PassiveSonarConfig {
    fn default() -> Self {
        Self {
            base_snr: 8.0,
            speed_noise_gain: 0.6,
            snorkel_bonus: 15.0,
            blow_bonus: 25.0,
            range_loss_per_km: 2.0,
            torpedo_range_loss_per_km: 2.5,
            depth_loss_per_200m: 1.0,
            self_noise_gain: 2.0,
            array_gain_db: 3.0,
            bearing_jitter_deg: 3.0,
            deep_bearing_jitter_deg: 1.0,
            sub_threshold: 5.0,
            torpedo_threshold: 4.0,
            torpedo_base_factor: 1.2,
            torpedo_noise_factor: 2.0,
            max_range: 6000.0,
            blow_max_range: 8000.0,
            torpedo_max_range: 4800.0,
            sub_range_bands: [1200.0, 3000.0],
            torpedo_range_bands: [1000.0, 2500.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveSonarConfig {
    pub max_range: f64,
    /// Widest beam a submarine may ping with.
    pub max_angle: f64,
    pub default_beam_deg: f64,
    pub rng_sigma_m: f64,
    pub brg_sigma_deg: f64,
    pub echo_base_level: f64,
    pub echo_range_loss_per_m: f64,
    pub snorkel_echo_bonus: f64,
    /// Bonus for a narrow beam, scaled down to zero at 90 degrees.
    pub focus_bonus_max: f64,
    /// Loss at the very edge of the beam.
    pub edge_penalty_db: f64,
    pub quality_midpoint: f64,
    pub quality_spread: f64,
    pub ping_cooldown_s: f64,
    pub intercept_base: f64,
    pub intercept_range_gain: f64,
    pub intercept_distance_loss_per_m: f64,
    pub intercept_threshold: f64,
}

impl Default for ActiveSonarConfig {
    fn default() -> Self {
        Self {
            max_range: 6000.0,
            max_angle: 210.0,
            default_beam_deg: 20.0,
            rng_sigma_m: 40.0,
            brg_sigma_deg: 1.5,
            echo_base_level: 18.0,
            echo_range_loss_per_m: 0.0025,
            snorkel_echo_bonus: 8.0,
            focus_bonus_max: 6.0,
            edge_penalty_db: 6.0,
            quality_midpoint: 10.0,
            quality_spread: 6.0,
            ping_cooldown_s: 5.0,
            intercept_base: 15.0,
            intercept_range_gain: 3.0,
            intercept_distance_loss_per_m: 1.0 / 600.0,
            intercept_threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivePowerConfig {
    pub base_cost: f64,
    pub cost_per_degree: f64,
    pub cost_per_100m_range: f64,
    /// Pings are refused below this charge.
    pub min_battery: f64,
}

impl Default for ActivePowerConfig {
    fn default() -> Self {
        Self {
            base_cost: 0.5,
            cost_per_degree: 0.04,
            cost_per_100m_range: 0.2683,
            min_battery: 5.0,
        }
    }
}

// --- Fuelers ---

/// Surface tankers called in to top up diesel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelerConfig {
    /// Distance from the calling hull a fueler appears at.
    pub spawn_range: [f64; 2],
    pub spawn_attempts: usize,
    /// Load as a fraction of `sub.battery.max_fuel`.
    pub capacity_fraction: f64,
    /// A hull must stay within this 3D distance to refuel.
    pub rendezvous_radius: f64,
    /// Continuous time alongside before fuel starts to flow.
    pub warmup_s: f64,
    pub lifetime_s: f64,
    /// Time a fueler lingers after its first transfer.
    pub used_linger_s: f64,
}

impl Default for FuelerConfig {
    fn default() -> Self {
        Self {
            spawn_range: [1000.0, 3000.0],
            spawn_attempts: 20,
            capacity_fraction: 0.5,
            rendezvous_radius: 50.0,
            warmup_s: 120.0,
            lifetime_s: 1200.0,
            used_linger_s: 300.0,
        }
    }
}

// --- Streaming ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Records buffered per subscriber before the oldest are dropped.
    pub subscriber_queue_capacity: usize,
    pub snapshot_interval_ticks: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: 256,
            snapshot_interval_ticks: 1,
        }
    }
}

impl GameConfig {
    /// Seconds per tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_hz
    }

    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }
        fn ordered(name: &str, pair: [f64; 2]) -> Result<(), ConfigError> {
            if pair[0] <= pair[1] {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be ordered low to high, got {pair:?}"
                )))
            }
        }

        positive("tick_hz", self.tick_hz)?;
        if self.max_commands_per_tick == 0 {
            return Err(ConfigError::Invalid("max_commands_per_tick must be at least 1".into()));
        }
        positive("world.ring.radius", self.world.ring.radius)?;
        ordered("world.spawn radii", [self.world.spawn_min_r, self.world.spawn_max_r])?;
        positive("sub.max_speed", self.sub.max_speed)?;
        positive("sub.max_depth", self.sub.max_depth)?;
        positive("sub.battery.propulsion_knee", self.sub.battery.propulsion_knee)?;
        ordered("sub.spawn_depth", self.sub.spawn_depth)?;
        ordered("sub.battery.initial", self.sub.battery.initial)?;
        if self.sub.spawn_depth[1] > self.sub.max_depth {
            return Err(ConfigError::Invalid("sub.spawn_depth exceeds sub.max_depth".into()));
        }
        ordered("torpedo speeds", [self.torpedo.min_speed, self.torpedo.max_speed])?;
        positive("torpedo.max_speed", self.torpedo.max_speed)?;
        positive("torpedo.blast_radius", self.torpedo.blast_radius)?;
        if self.torpedo.lethal_radius >= self.torpedo.blast_radius {
            return Err(ConfigError::Invalid(
                "torpedo.lethal_radius must be inside torpedo.blast_radius".into(),
            ));
        }
        positive("torpedo.battery.capacity", self.torpedo.battery.capacity)?;
        positive("torpedo.sonar.active.ping_interval_s", self.torpedo.sonar.active.ping_interval_s)?;
        positive("torpedo.sonar.active.beam_deg", self.torpedo.sonar.active.beam_deg)?;
        positive("sonar.active.max_angle", self.sonar.active.max_angle)?;
        positive("sonar.active.quality_spread", self.sonar.active.quality_spread)?;
        ordered("sonar.passive.sub_range_bands", self.sonar.passive.sub_range_bands)?;
        ordered("sonar.passive.torpedo_range_bands", self.sonar.passive.torpedo_range_bands)?;

        let clouds = &self.world.weather.clouds;
        if clouds.count > 0 {
            ordered("world.weather.clouds band", [clouds.min_r, clouds.max_r])?;
            ordered("world.weather.clouds.radius", clouds.radius)?;
            ordered("world.weather.clouds.center_depth", clouds.center_depth)?;
            ordered("world.weather.clouds.thickness", clouds.thickness)?;
            positive("world.weather.clouds.radius", clouds.radius[0])?;
            if clouds.max_count_factor < 1.0 {
                return Err(ConfigError::Invalid(
                    "world.weather.clouds.max_count_factor must be at least 1".into(),
                ));
            }
        }
        positive("world.weather.scanner.sector_deg", self.world.weather.scanner.sector_deg)?;

        ordered("fueler.spawn_range", self.fueler.spawn_range)?;
        positive("fueler.rendezvous_radius", self.fueler.rendezvous_radius)?;
        positive("fueler.capacity_fraction", self.fueler.capacity_fraction)?;
        if self.stream.subscriber_queue_capacity == 0 || self.stream.snapshot_interval_ticks == 0 {
            return Err(ConfigError::Invalid("stream sizes must be at least 1".into()));
        }
        Ok(())
    }
}
