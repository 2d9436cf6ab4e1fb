//! Tests for core types: serde shapes, config merging, geometry helpers.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::commands::{Command, CommandOutcome};
use crate::config::GameConfig;
use crate::enums::*;
use crate::errors::{CommandError, ConfigError};
use crate::events::{EventEnvelope, SimEvent};
use crate::state::{FuelerView, SubmarineView, WorldSnapshot};
use crate::types::*;

// ---- Commands ----

#[test]
fn test_command_tagged_json_with_omitted_options() {
    let cmd: Command = serde_json::from_str(r#"{"type":"Ping","sub_id":7}"#).unwrap();
    assert_eq!(
        cmd,
        Command::Ping {
            sub_id: EntityId(7),
            beam_deg: None,
            max_range: None,
            bearing_offset_deg: None,
        }
    );

    let json = serde_json::to_string(&Command::RegisterSubmarine).unwrap();
    assert_eq!(json, r#"{"type":"RegisterSubmarine"}"#);
}

#[test]
fn test_unknown_command_type_rejected() {
    let result = serde_json::from_str::<Command>(r#"{"type":"SelfDestructEveryone"}"#);
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_non_finite_and_non_positive() {
    let nan_throttle = Command::Control {
        sub_id: EntityId(1),
        throttle: Some(f64::NAN),
        planes: None,
        rudder_deg: None,
        rudder_nudge_deg: None,
        target_depth: None,
    };
    assert!(matches!(
        nan_throttle.validate(),
        Err(CommandError::Validation { field: "throttle", .. })
    ));

    let zero_beam = Command::Ping {
        sub_id: EntityId(1),
        beam_deg: Some(0.0),
        max_range: None,
        bearing_offset_deg: None,
    };
    assert!(zero_beam.validate().is_err());

    let zero_reload = Command::ReloadTubes {
        sub_id: EntityId(1),
        count: Some(0),
    };
    assert!(zero_reload.validate().is_err());

    let fine = Command::SetHeading {
        sub_id: EntityId(1),
        heading_deg: 725.0,
    };
    assert!(fine.validate().is_ok(), "wrapping happens at apply time");
}

#[test]
fn test_outcome_serializes_with_type_tag() {
    let outcome = CommandOutcome::Registered {
        sub_id: EntityId(3),
        spawn: Position::new(1.0, 2.0, 100.0),
    };
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["type"], "Registered");
    assert_eq!(value["sub_id"], 3);
}

// ---- Events ----

#[test]
fn test_event_envelope_addressing() {
    let env = EventEnvelope::to(
        12,
        AccountId(5),
        SimEvent::SubmarineLost {
            sub_id: EntityId(9),
            cause: LossCause::Crush,
        },
    );
    assert!(env.is_for(AccountId(5)));
    assert!(!env.is_for(AccountId(6)));

    let value = serde_json::to_value(&env).unwrap();
    assert_eq!(value["event"]["type"], "SubmarineLost");
    assert_eq!(value["event"]["cause"], "crush");
}

// ---- Config ----

#[test]
fn test_partial_config_merges_over_defaults() {
    let config =
        GameConfig::from_json_str(r#"{"sub":{"max_speed":20.0},"torpedo":{"battery":{"capacity":80}}}"#)
            .unwrap();
    let defaults = GameConfig::default();
    assert_eq!(config.sub.max_speed, 20.0);
    assert_eq!(config.sub.acceleration, defaults.sub.acceleration);
    assert_eq!(config.torpedo.battery.capacity, 80.0);
    assert_eq!(
        config.torpedo.battery.drain_per_speed_sq,
        defaults.torpedo.battery.drain_per_speed_sq
    );
    assert_eq!(config.tick_hz, 10.0);
    assert_eq!(config.world.objectives.len(), 2);
}

#[test]
fn test_empty_config_is_default() {
    let config = GameConfig::from_json_str("{}").unwrap();
    assert_eq!(config, GameConfig::default());
    assert!((config.dt() - 0.1).abs() < 1e-12);
}

#[test]
fn test_invalid_config_rejected() {
    let err = GameConfig::from_json_str(r#"{"tick_hz":0}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = GameConfig::from_json_str(r#"{"torpedo":{"lethal_radius":500}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = GameConfig::from_json_str("{not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_non_positive_sonar_and_battery_limits_rejected() {
    for json in [
        r#"{"torpedo":{"battery":{"capacity":0}}}"#,
        r#"{"torpedo":{"battery":{"capacity":-5}}}"#,
        r#"{"torpedo":{"sonar":{"active":{"beam_deg":0}}}}"#,
        r#"{"sonar":{"active":{"max_angle":0}}}"#,
    ] {
        let err = GameConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{json} should be rejected");
    }
}

#[test]
fn test_weather_and_fueler_sections_merge() {
    let config = GameConfig::from_json_str(
        r#"{"world":{"weather":{"clouds":{"count":3}}},"fueler":{"rendezvous_radius":80}}"#,
    )
    .unwrap();
    let defaults = GameConfig::default();
    assert_eq!(config.world.weather.clouds.count, 3);
    assert_eq!(config.world.weather.clouds.radius, defaults.world.weather.clouds.radius);
    assert_eq!(config.world.weather.scanner, defaults.world.weather.scanner);
    assert_eq!(config.fueler.rendezvous_radius, 80.0);
    assert_eq!(config.fueler.warmup_s, defaults.fueler.warmup_s);

    let err = GameConfig::from_json_str(r#"{"fueler":{"spawn_range":[3000,1000]}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_missing_config_file_is_io_error() {
    let err = GameConfig::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

// ---- Geometry ----

#[test]
fn test_bearing_compass_convention() {
    let origin = Position::new(0.0, 0.0, 50.0);
    let north = Position::new(0.0, 100.0, 50.0);
    let east = Position::new(100.0, 0.0, 50.0);
    assert!(origin.bearing_to(&north).abs() < 1e-9);
    assert!((origin.bearing_to(&east) - FRAC_PI_2).abs() < 1e-9);

    let ahead = origin.offset(FRAC_PI_2, 12.0);
    assert!((ahead.x - 12.0).abs() < 1e-9);
    assert!(ahead.y.abs() < 1e-9);
}

#[test]
fn test_range_includes_depth() {
    let a = Position::new(0.0, 0.0, 0.0);
    let b = Position::new(30.0, 0.0, 40.0);
    assert!((a.range_to(&b) - 50.0).abs() < 1e-9);
    assert!((a.horizontal_range_to(&b) - 30.0).abs() < 1e-9);
}

#[test]
fn test_angle_diff_takes_short_way() {
    let from = 350f64.to_radians();
    let to = 10f64.to_radians();
    assert!((angle_diff(from, to) - 20f64.to_radians()).abs() < 1e-9);
    assert!((angle_diff(to, from) + 20f64.to_radians()).abs() < 1e-9);
    assert!((angle_diff(0.0, PI) - PI).abs() < 1e-9);
}

#[test]
fn test_step_angle_toward_crosses_north() {
    let step = 3f64.to_radians();
    let next = step_angle_toward(355f64.to_radians(), 5f64.to_radians(), step);
    assert!((next - 358f64.to_radians()).abs() < 1e-9);

    let landed = step_angle_toward(next, 5f64.to_radians(), 1.0);
    assert!((landed - 5f64.to_radians()).abs() < 1e-9);
}

#[test]
fn test_step_toward_never_overshoots() {
    assert_eq!(step_toward(10.0, 11.0, 5.0), 11.0);
    assert_eq!(step_toward(10.0, 0.0, 2.5), 7.5);
}

#[test]
fn test_range_class_bands() {
    let bands = [1200.0, 3000.0];
    assert_eq!(RangeClass::classify(100.0, bands), RangeClass::Short);
    assert_eq!(RangeClass::classify(1200.0, bands), RangeClass::Medium);
    assert_eq!(RangeClass::classify(5000.0, bands), RangeClass::Long);
}

#[test]
fn test_guidance_terminal_states() {
    assert!(GuidanceState::Detonated.is_terminal());
    assert!(GuidanceState::Expired.is_terminal());
    assert!(!GuidanceState::Homing.is_terminal());
    assert_eq!(GuidanceState::default(), GuidanceState::WireGuided);
}

// ---- Snapshots ----

fn sub_view(id: u64, owner: u64) -> SubmarineView {
    SubmarineView {
        id: EntityId(id),
        owner: AccountId(owner),
        position: Position::default(),
        heading: 0.0,
        target_heading: None,
        speed: 0.0,
        target_speed: 0.0,
        target_depth: None,
        throttle: 0.0,
        rudder: 0.0,
        planes: 0.0,
        battery: 50.0,
        fuel: 1000.0,
        health: 100.0,
        snorkeling: false,
        blowing: false,
        blow_charge: 1.0,
        passive_array_bearing: 0.0,
        tubes_loaded: 4,
        kills: 0,
        score: 0.0,
        refuel: None,
        destroyed: false,
    }
}

#[test]
fn test_snapshot_scoping_hides_other_accounts() {
    let snapshot = WorldSnapshot {
        time: SimTime::default(),
        submarines: vec![sub_view(1, 10), sub_view(2, 20), sub_view(3, 10)],
        torpedoes: Vec::new(),
        fuelers: vec![FuelerView {
            id: EntityId(9),
            owner: AccountId(20),
            position: Position::default(),
            fuel: 500.0,
            capacity: 500.0,
        }],
    };
    let mine = snapshot.scoped_to(AccountId(10));
    let ids: Vec<_> = mine.submarines.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![EntityId(1), EntityId(3)]);
    assert!(mine.submarine(EntityId(2)).is_none());
    assert!(mine.fueler(EntityId(9)).is_some(), "fuelers are public");
}

#[test]
fn test_error_messages() {
    let err = CommandError::NotFound {
        kind: EntityKind::Torpedo,
        id: EntityId(4),
    };
    assert_eq!(err.to_string(), "torpedo #4 not found");
    assert_eq!(
        CommandError::conflict("battery too low").to_string(),
        "state conflict: battery too low"
    );
}
