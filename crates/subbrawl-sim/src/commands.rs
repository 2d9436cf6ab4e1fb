//! Command application.
//!
//! Each command is applied in full or not at all: every check runs before
//! the first component is written. Rejections never touch the world.

use hecs::QueryOneError;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use subbrawl_core::commands::{Command, CommandOutcome, PingReport, ScanReport};
use subbrawl_core::components::{Battery, Fueler, Motion, Refuel, Submarine, Torpedo};
use subbrawl_core::config::GameConfig;
use subbrawl_core::enums::{EntityKind, GuidanceState, RefuelEnd};
use subbrawl_core::errors::CommandError;
use subbrawl_core::events::{EventEnvelope, SimEvent};
use subbrawl_core::types::{wrap_bearing, AccountId, EntityId, Position};

use subbrawl_guidance::fsm::state_for_sonar;

use crate::store::EntityStore;
use crate::systems::damage::Detonation;
use crate::systems::guidance::torpedo_ping;
use crate::systems::sonar::active::{self, Beam};
use crate::systems::weather::{Medium, Weather};

/// Mutable engine state a command may touch.
pub struct CommandContext<'a> {
    pub store: &'a mut EntityStore,
    pub config: &'a GameConfig,
    pub weather: &'a Weather,
    pub rng: &'a mut ChaCha8Rng,
    /// Tick the command's effects and events belong to.
    pub tick: u64,
    pub events: &'a mut Vec<EventEnvelope>,
    pub detonations: &'a mut Vec<Detonation>,
}

/// Apply one validated command on behalf of `issuer`.
pub fn apply(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    command: Command,
) -> Result<CommandOutcome, CommandError> {
    match command {
        Command::RegisterSubmarine => {
            let (sub_id, spawn) = ctx.store.create_submarine(issuer, ctx.config, ctx.rng)?;
            Ok(CommandOutcome::Registered { sub_id, spawn })
        }
        Command::Control {
            sub_id,
            throttle,
            planes,
            rudder_deg,
            rudder_nudge_deg,
            target_depth,
        } => {
            let helm = Helm {
                throttle,
                planes,
                rudder_deg,
                rudder_nudge_deg,
                target_depth,
            };
            control(ctx, issuer, sub_id, helm)
        }
        Command::SetHeading {
            sub_id,
            heading_deg,
        } => set_heading(ctx, issuer, sub_id, |_| heading_deg.to_radians()),
        Command::TurnSubmarine { sub_id, turn_deg } => {
            set_heading(ctx, issuer, sub_id, |current| current + turn_deg.to_radians())
        }
        Command::Snorkel { sub_id, on } => snorkel(ctx, issuer, sub_id, on),
        Command::EmergencyBlow { sub_id } => emergency_blow(ctx, issuer, sub_id),
        Command::SteerPassiveArray {
            sub_id,
            bearing_deg,
        } => {
            let entity = ctx.store.submarine_for(sub_id, issuer)?;
            let sub = ctx
                .store
                .world_mut()
                .query_one_mut::<&mut Submarine>(entity)
                .map_err(missing(EntityKind::Submarine, sub_id))?;
            sub.passive_array_bearing = wrap_bearing(bearing_deg.to_radians());
            Ok(CommandOutcome::Ack)
        }
        Command::Ping {
            sub_id,
            beam_deg,
            max_range,
            bearing_offset_deg,
        } => ping(ctx, issuer, sub_id, beam_deg, max_range, bearing_offset_deg),
        Command::LaunchTorpedo { sub_id, range } => {
            let launch = ctx.store.create_torpedo(issuer, sub_id, range, ctx.config)?;
            Ok(CommandOutcome::Launched {
                torpedo_id: launch.torpedo_id,
                range: launch.range,
                battery_cost: launch.battery_cost,
                spawn: launch.spawn,
                tubes_loaded: launch.tubes_loaded,
            })
        }
        Command::ReloadTubes { sub_id, count } => reload(ctx, issuer, sub_id, count),
        Command::SetTorpedoSpeed { torpedo_id, speed } => {
            let cfg = &ctx.config.torpedo;
            torpedo_order(ctx.store, issuer, torpedo_id, false, |motion| {
                motion.target_speed = speed.clamp(cfg.min_speed, cfg.max_speed);
            })
        }
        Command::SetTorpedoDepth { torpedo_id, depth } => {
            let max_depth = ctx.config.sub.max_depth;
            torpedo_order(ctx.store, issuer, torpedo_id, false, |motion| {
                motion.target_depth = Some(depth.clamp(0.0, max_depth));
            })
        }
        Command::SetTorpedoHeading {
            torpedo_id,
            heading_deg,
        } => torpedo_order(ctx.store, issuer, torpedo_id, true, |motion| {
            motion.target_heading = Some(wrap_bearing(heading_deg.to_radians()));
        }),
        Command::SetTorpedoSonar {
            torpedo_id,
            active,
            passive,
        } => torpedo_sonar(ctx, issuer, torpedo_id, active, passive),
        Command::TorpedoPing {
            torpedo_id,
            max_range,
        } => manual_torpedo_ping(ctx, issuer, torpedo_id, max_range),
        Command::Detonate { torpedo_id } => detonate(ctx, issuer, torpedo_id),
        Command::WeatherScan { sub_id } => weather_scan(ctx, issuer, sub_id),
        Command::CallFueler { sub_id } => {
            let (fueler_id, position, fuel) =
                ctx.store.create_fueler(issuer, sub_id, ctx.config, ctx.weather, ctx.rng)?;
            Ok(CommandOutcome::FuelerCalled {
                fueler_id,
                position,
                fuel,
            })
        }
        Command::StartRefuel { sub_id } => start_refuel(ctx, issuer, sub_id),
    }
}

impl<'a> CommandContext<'a> {
    fn medium(&self) -> Medium<'a> {
        Medium {
            weather: self.weather,
            world: &self.config.world,
        }
    }
}

// --- Lookup helpers ---

fn missing(kind: EntityKind, id: EntityId) -> impl FnOnce(QueryOneError) -> CommandError {
    move |_| CommandError::NotFound { kind, id }
}

fn ensure_live(torp: &Torpedo, id: EntityId) -> Result<(), CommandError> {
    if torp.guidance.is_terminal() {
        return Err(CommandError::conflict(format!(
            "torpedo {id} is {:?}",
            torp.guidance
        )));
    }
    Ok(())
}

fn ensure_wired(torp: &Torpedo, id: EntityId) -> Result<(), CommandError> {
    ensure_live(torp, id)?;
    if !torp.wire_connected {
        return Err(CommandError::conflict(format!("torpedo {id} has lost its wire")));
    }
    Ok(())
}

// --- Helm ---

struct Helm {
    throttle: Option<f64>,
    planes: Option<f64>,
    rudder_deg: Option<f64>,
    rudder_nudge_deg: Option<f64>,
    target_depth: Option<f64>,
}

fn control(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
    helm: Helm,
) -> Result<CommandOutcome, CommandError> {
    let cfg = &ctx.config.sub;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (motion, sub) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&mut Motion, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;
    let blowing = sub.blow_remaining_secs > 0.0;

    if let Some(throttle) = helm.throttle {
        sub.throttle = throttle.clamp(0.0, 1.0);
    }
    if let Some(deg) = helm.rudder_deg {
        sub.rudder = deg.clamp(-cfg.max_rudder_deg, cfg.max_rudder_deg) / cfg.max_rudder_deg;
        motion.target_heading = None;
    }
    if let Some(nudge) = helm.rudder_nudge_deg {
        sub.rudder = (sub.rudder + nudge / cfg.max_rudder_deg).clamp(-1.0, 1.0);
        motion.target_heading = None;
    }
    // Planes and depth orders are ignored while blowing.
    if !blowing {
        if let Some(planes) = helm.planes {
            sub.planes = planes.clamp(-1.0, 1.0);
            motion.target_depth = None;
        }
        if let Some(depth) = helm.target_depth {
            motion.target_depth = Some(depth.clamp(0.0, cfg.max_depth));
            sub.planes = 0.0;
        }
    }
    Ok(CommandOutcome::Ack)
}

fn set_heading(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
    target: impl FnOnce(f64) -> f64,
) -> Result<CommandOutcome, CommandError> {
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (motion, sub) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&mut Motion, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;
    let target_heading = wrap_bearing(target(motion.heading));
    motion.target_heading = Some(target_heading);
    sub.rudder = 0.0;
    Ok(CommandOutcome::Heading {
        heading: motion.heading,
        target_heading,
    })
}

fn snorkel(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
    on: Option<bool>,
) -> Result<CommandOutcome, CommandError> {
    let limit = ctx.config.sub.snorkel_depth;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (pos, sub) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&Position, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;
    let want = on.unwrap_or(!sub.snorkeling);
    if want && pos.depth > limit {
        return Err(CommandError::conflict(format!(
            "too deep to snorkel: {:.1} m, limit {limit:.1} m",
            pos.depth
        )));
    }
    sub.snorkeling = want;
    // Lowering the mast casts off from the fueler.
    if !want {
        if let Some(refuel) = sub.refuel.take() {
            info!(sub_id = sub_id.0, fueler_id = refuel.fueler.0, "refuel cancelled");
            ctx.events.push(EventEnvelope::to(
                ctx.tick,
                issuer,
                SimEvent::RefuelEnded {
                    sub_id,
                    fueler_id: refuel.fueler,
                    fuel: sub.fuel,
                    reason: RefuelEnd::Interrupted,
                },
            ));
        }
    }
    Ok(CommandOutcome::Snorkel {
        snorkeling: want,
        depth: pos.depth,
        limit,
    })
}

fn emergency_blow(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
) -> Result<CommandOutcome, CommandError> {
    let duration = ctx.config.sub.emergency_blow.duration_s;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (motion, sub) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&mut Motion, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;
    if sub.blow_remaining_secs > 0.0 {
        return Err(CommandError::conflict("emergency blow already in progress"));
    }
    if sub.blow_charge <= 0.0 {
        return Err(CommandError::conflict("no air left for an emergency blow"));
    }
    sub.blow_remaining_secs = duration;
    sub.planes = 0.0;
    motion.target_depth = None;
    info!(sub_id = sub_id.0, "emergency blow");
    Ok(CommandOutcome::Ack)
}

// --- Sensors ---

fn ping(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
    beam_deg: Option<f64>,
    max_range: Option<f64>,
    bearing_offset_deg: Option<f64>,
) -> Result<CommandOutcome, CommandError> {
    let sonar = &ctx.config.sonar;
    let beam_deg = beam_deg
        .unwrap_or(sonar.active.default_beam_deg)
        .min(sonar.active.max_angle);
    let max_range = max_range
        .unwrap_or(sonar.active.max_range)
        .min(sonar.active.max_range);
    let cost = active::ping_cost(&sonar.active_power, beam_deg, max_range);

    let (beam, battery_remaining) = {
        let entity = ctx.store.submarine_for(sub_id, issuer)?;
        let (pos, motion, battery, sub) = ctx
            .store
            .world_mut()
            .query_one_mut::<(&Position, &Motion, &mut Battery, &mut Submarine)>(entity)
            .map_err(missing(EntityKind::Submarine, sub_id))?;

        if sub.ping_cooldown_secs > 0.0 {
            return Err(CommandError::conflict(format!(
                "active sonar recharging for {:.1} s",
                sub.ping_cooldown_secs
            )));
        }
        if battery.0 < sonar.active_power.min_battery {
            return Err(CommandError::conflict(format!(
                "battery {:.1}% below the ping minimum",
                battery.0
            )));
        }
        if battery.0 < cost.total {
            return Err(CommandError::conflict(format!(
                "battery {:.1}% below ping cost {:.1}%",
                battery.0, cost.total
            )));
        }
        battery.0 -= cost.total;
        sub.ping_cooldown_secs = sonar.active.ping_cooldown_s;

        let offset = bearing_offset_deg.unwrap_or(0.0).to_radians();
        (
            Beam {
                origin: *pos,
                heading: motion.heading,
                center: wrap_bearing(motion.heading + offset),
                beam_deg,
                max_range,
            },
            battery.0,
        )
    };

    let medium = ctx.medium();
    let world = ctx.store.world();
    let reflectors = active::reflectors(world, true);
    let echoes = active::echoes(
        &sonar.active,
        &beam,
        reflectors.iter().filter(|r| r.id != sub_id),
        &medium,
        ctx.rng,
    );
    let heard = active::intercepts(
        &sonar.active,
        sonar.passive.sub_range_bands,
        sub_id,
        &beam.origin,
        beam_deg,
        max_range,
        world,
    );

    for echo in &echoes {
        ctx.events.push(EventEnvelope::to(
            ctx.tick,
            issuer,
            SimEvent::ActiveEcho {
                observer_id: sub_id,
                echo: *echo,
            },
        ));
    }
    for (owner, contact) in heard {
        ctx.events.push(EventEnvelope::to(
            ctx.tick,
            owner,
            SimEvent::PassiveContact(contact),
        ));
    }

    Ok(CommandOutcome::Ping(PingReport {
        cost,
        battery_remaining,
        beam_deg,
        max_range,
        echoes,
    }))
}

// --- Weapons ---

fn reload(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
    count: Option<u32>,
) -> Result<CommandOutcome, CommandError> {
    let cfg = &ctx.config.torpedo;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (battery, sub) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&mut Battery, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;

    let empty = cfg.magazine_size.saturating_sub(sub.tubes_loaded);
    if empty == 0 {
        return Err(CommandError::conflict("all tubes already loaded"));
    }
    let reloaded = count.unwrap_or(empty).min(empty);
    let battery_cost = cfg.reload_cost_per_torp * reloaded as f64;
    if battery.0 < battery_cost {
        return Err(CommandError::capacity(format!(
            "battery {:.1}% below reload cost {battery_cost:.1}%",
            battery.0
        )));
    }
    battery.0 -= battery_cost;
    sub.tubes_loaded += reloaded;
    Ok(CommandOutcome::Reloaded {
        reloaded,
        battery_cost,
        battery_remaining: battery.0,
        tubes_loaded: sub.tubes_loaded,
    })
}

/// Steering order to a wire-guided torpedo.
fn torpedo_order(
    store: &mut EntityStore,
    issuer: AccountId,
    torpedo_id: EntityId,
    needs_wire_guidance: bool,
    order: impl FnOnce(&mut Motion),
) -> Result<CommandOutcome, CommandError> {
    let entity = store.torpedo_for(torpedo_id, issuer)?;
    let (motion, torp) = store
        .world_mut()
        .query_one_mut::<(&mut Motion, &Torpedo)>(entity)
        .map_err(missing(EntityKind::Torpedo, torpedo_id))?;
    ensure_wired(torp, torpedo_id)?;
    if needs_wire_guidance && torp.guidance != GuidanceState::WireGuided {
        return Err(CommandError::conflict(format!(
            "torpedo {torpedo_id} is steering itself ({:?})",
            torp.guidance
        )));
    }
    order(motion);
    Ok(CommandOutcome::TorpedoOrder {
        target_heading: motion.target_heading,
        target_speed: motion.target_speed,
        target_depth: motion.target_depth,
    })
}

fn torpedo_sonar(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    torpedo_id: EntityId,
    active: Option<bool>,
    passive: Option<bool>,
) -> Result<CommandOutcome, CommandError> {
    let entity = ctx.store.torpedo_for(torpedo_id, issuer)?;
    let torp = ctx
        .store
        .world_mut()
        .query_one_mut::<&mut Torpedo>(entity)
        .map_err(missing(EntityKind::Torpedo, torpedo_id))?;
    ensure_live(torp, torpedo_id)?;

    let (active, passive) = match (active, passive) {
        (None, None) => (!torp.active_sonar, torp.passive_sonar),
        (a, p) => (a.unwrap_or(torp.active_sonar), p.unwrap_or(torp.passive_sonar)),
    };
    if passive != torp.passive_sonar && !torp.wire_connected {
        return Err(CommandError::conflict(format!(
            "torpedo {torpedo_id} needs the wire to switch passive sonar"
        )));
    }

    if active && !torp.active_sonar {
        torp.next_ping_secs = 0.0;
    }
    torp.active_sonar = active;
    torp.passive_sonar = passive;
    if !passive {
        torp.passive_bearing = None;
    }
    torp.guidance = state_for_sonar(torp.guidance, torp.wire_connected, active);

    Ok(CommandOutcome::TorpedoSonar {
        active,
        passive,
        guidance: torp.guidance,
    })
}

fn manual_torpedo_ping(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    torpedo_id: EntityId,
    max_range: Option<f64>,
) -> Result<CommandOutcome, CommandError> {
    let cfg = &ctx.config.torpedo;
    let cost = cfg.battery.active_ping_cost;
    let max_range = max_range
        .unwrap_or(cfg.sonar.active.max_range)
        .min(cfg.sonar.active.max_range);

    let (origin, heading, battery_remaining) = {
        let entity = ctx.store.torpedo_for(torpedo_id, issuer)?;
        let (pos, motion, battery, torp) = ctx
            .store
            .world_mut()
            .query_one_mut::<(&Position, &Motion, &mut Battery, &Torpedo)>(entity)
            .map_err(missing(EntityKind::Torpedo, torpedo_id))?;
        ensure_live(torp, torpedo_id)?;
        if battery.0 < cost.max(cfg.battery.min_for_ping) {
            return Err(CommandError::conflict(format!(
                "torpedo battery {:.1}% too low to ping",
                battery.0
            )));
        }
        battery.0 -= cost;
        (*pos, motion.heading, battery.0)
    };

    let medium = ctx.medium();
    let reflectors = active::reflectors(ctx.store.world(), false);
    let echoes = torpedo_ping(
        ctx.config,
        issuer,
        origin,
        heading,
        max_range,
        &reflectors,
        &medium,
        ctx.rng,
    );
    ctx.events.push(EventEnvelope::to(
        ctx.tick,
        issuer,
        SimEvent::TorpedoPingResult {
            torpedo_id,
            echoes: echoes.clone(),
        },
    ));
    Ok(CommandOutcome::TorpedoPing {
        echoes,
        battery_remaining,
    })
}

fn detonate(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    torpedo_id: EntityId,
) -> Result<CommandOutcome, CommandError> {
    let entity = ctx.store.torpedo_for(torpedo_id, issuer)?;
    let (pos, motion, torp) = ctx
        .store
        .world_mut()
        .query_one_mut::<(&Position, &mut Motion, &mut Torpedo)>(entity)
        .map_err(missing(EntityKind::Torpedo, torpedo_id))?;
    ensure_live(torp, torpedo_id)?;

    torp.guidance = GuidanceState::Detonated;
    torp.wire_connected = false;
    motion.speed = 0.0;
    let at = *pos;
    ctx.detonations.push(Detonation {
        torpedo_id,
        owner: issuer,
        parent: torp.parent,
        at,
    });
    info!(torpedo_id = torpedo_id.0, "torpedo detonated on command");
    Ok(CommandOutcome::Detonating { torpedo_id, at })
}

// --- Logistics ---

fn weather_scan(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
) -> Result<CommandOutcome, CommandError> {
    let cfg = &ctx.config.world.weather.scanner;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let (pos, battery_remaining) = {
        let (pos, battery, sub) = ctx
            .store
            .world_mut()
            .query_one_mut::<(&Position, &mut Battery, &mut Submarine)>(entity)
            .map_err(missing(EntityKind::Submarine, sub_id))?;
        if battery.0 < cfg.battery_cost {
            return Err(CommandError::conflict(format!(
                "battery {:.1}% below scan cost {:.1}%",
                battery.0, cfg.battery_cost
            )));
        }
        battery.0 -= cfg.battery_cost;
        sub.scanner_noise_secs = sub.scanner_noise_secs.max(cfg.noise_duration_s);
        (*pos, battery.0)
    };

    let clouds = ctx.weather.scan(&pos, cfg, ctx.rng);
    Ok(CommandOutcome::WeatherScan(ScanReport {
        battery_cost: cfg.battery_cost,
        battery_remaining,
        max_range: cfg.max_range_m,
        clouds,
    }))
}

fn start_refuel(
    ctx: &mut CommandContext<'_>,
    issuer: AccountId,
    sub_id: EntityId,
) -> Result<CommandOutcome, CommandError> {
    let config = ctx.config;
    let entity = ctx.store.submarine_for(sub_id, issuer)?;
    let world = ctx.store.world_mut();

    let pos = {
        let (pos, sub) = world
            .query_one_mut::<(&Position, &Submarine)>(entity)
            .map_err(missing(EntityKind::Submarine, sub_id))?;
        if sub.refuel.is_some() {
            return Err(CommandError::conflict("already refueling"));
        }
        if sub.fuel >= config.sub.battery.max_fuel {
            return Err(CommandError::conflict("fuel tank already full"));
        }
        *pos
    };

    let nearest = world
        .query::<(&EntityId, &Position, &Fueler)>()
        .iter()
        .filter(|(_, (_, _, fueler))| fueler.fuel > 0.0)
        .map(|(_, (id, fpos, _))| (*id, pos.range_to(fpos)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let (fueler_id, distance) = match nearest {
        Some((id, distance)) if distance <= config.fueler.rendezvous_radius => (id, distance),
        _ => {
            return Err(CommandError::conflict(format!(
                "no fueler with fuel within {:.0} m",
                config.fueler.rendezvous_radius
            )));
        }
    };

    let (motion, sub) = world
        .query_one_mut::<(&mut Motion, &mut Submarine)>(entity)
        .map_err(missing(EntityKind::Submarine, sub_id))?;
    sub.refuel = Some(Refuel {
        fueler: fueler_id,
        warmup_secs: 0.0,
    });
    sub.snorkeling = true;
    sub.throttle = 0.0;
    sub.planes = 0.0;
    motion.target_depth = Some(config.sub.snorkel_depth);

    info!(sub_id = sub_id.0, fueler_id = fueler_id.0, distance, "refuel started");
    Ok(CommandOutcome::RefuelStarted {
        fueler_id,
        distance,
        warmup_secs: config.fueler.warmup_s,
    })
}
