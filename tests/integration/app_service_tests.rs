//! AppService integration tests: full control passes against mock hardware.

use hydrobrain::adapters::nvs::NvsAdapter;
use hydrobrain::app::commands::{AppCommand, CommandOutcome};
use hydrobrain::app::events::AppEvent;
use hydrobrain::app::ports::StoragePort;
use hydrobrain::app::service::{AppService, PROFILES_KEY, PROFILES_NAMESPACE};
use hydrobrain::config::SystemConfig;
use hydrobrain::drivers::led_strip::LedMode;
use hydrobrain::error::{Error, ProfileError};
use hydrobrain::profiles::{PlantProfile, ProfileRegistry, Range, MAX_CUSTOM_PROFILES};
use hydrobrain::scheduler::{PumpCommand, PumpMode};
use hydrobrain::sensors::{Metric, ReadingSource};

use crate::mock_hw::{started, ActuatorCall};

const HOUR: u64 = 3_600_000;
const RUN: u64 = 900_000;

fn custom(name: &str) -> PlantProfile {
    PlantProfile {
        name: name.to_owned(),
        tds: Range::new(300.0, 500.0),
        ec: Range::new(600.0, 1000.0),
        ph: Range::new(5.8, 6.8),
        water_temp: Range::new(16.0, 24.0),
        humidity: Range::new(40.0, 70.0),
        air_temp: Range::new(16.0, 26.0),
    }
}

#[test]
fn start_turns_everything_off_and_announces_profile() {
    let (app, hw, sink) = started(SystemConfig::default());
    assert_eq!(hw.calls, vec![ActuatorCall::Pump(false), ActuatorCall::Led(LedMode::Off)]);
    assert_eq!(
        sink.events,
        vec![AppEvent::Started {
            profile: "lettuce".into()
        }]
    );
    let snap = app.snapshot();
    assert_eq!(snap.profile, "lettuce");
    assert!(!snap.pump.running);
    assert_eq!(snap.sensors.tds.source, ReadingSource::Default);
}

#[test]
fn auto_cycle_runs_for_the_configured_duration() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    app.tick(0, &mut hw, &mut sink);
    assert!(!hw.pump_on());

    app.tick(HOUR - 1, &mut hw, &mut sink);
    assert!(!hw.pump_on());

    let report = app.tick(HOUR, &mut hw, &mut sink);
    assert!(report.pump.is_some());
    assert!(hw.pump_on());

    app.tick(HOUR + RUN - 1, &mut hw, &mut sink);
    assert!(hw.pump_on());

    app.tick(HOUR + RUN, &mut hw, &mut sink);
    assert!(!hw.pump_on());

    let changes: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PumpChanged { running, mode } => Some((*running, *mode)),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![(true, PumpMode::Auto), (false, PumpMode::Auto)]);
}

#[test]
fn manual_on_holds_until_auto_is_restored() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let out = app
        .handle_command(AppCommand::SetPump(PumpCommand::On), 0, &mut hw, &mut sink)
        .unwrap();
    let CommandOutcome::Pump(state) = out else {
        panic!("expected pump outcome, got {out:?}");
    };
    assert!(state.running);
    assert_eq!(state.mode(), PumpMode::Manual);
    assert!(!state.auto_enabled);

    for t in 1..=6 {
        app.tick(t * HOUR, &mut hw, &mut sink);
        assert!(hw.pump_on());
    }

    app.handle_command(AppCommand::SetPump(PumpCommand::Auto), 6 * HOUR, &mut hw, &mut sink)
        .unwrap();
    assert!(hw.pump_on());
    app.tick(6 * HOUR + 100, &mut hw, &mut sink);
    assert!(!hw.pump_on());
    assert_eq!(app.pump_state().mode(), PumpMode::Auto);
}

#[test]
fn manual_off_keeps_auto_cycle_from_starting() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    app.handle_command(AppCommand::SetPump(PumpCommand::Off), 0, &mut hw, &mut sink)
        .unwrap();
    app.tick(2 * HOUR, &mut hw, &mut sink);
    assert!(!hw.pump_on());
    assert!(!sink.events.iter().any(|e| matches!(e, AppEvent::PumpChanged { .. })));
}

#[test]
fn healthy_climate_clears_the_fallback() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    app.tick(0, &mut hw, &mut sink);
    assert!(app.sensors().air_temp.is_degraded());

    hw.bus().set_climate(55.0, 21.5);
    app.tick(30_000, &mut hw, &mut sink);
    let air = app.sensors().get(Metric::AirTemp);
    assert_eq!(air.source, ReadingSource::Measured);
    assert!((air.value() - 21.5).abs() < 1e-3);
    assert!((app.snapshot().sensors.humidity.value() - 55.0).abs() < 1e-3);
}

#[test]
fn lost_climate_holds_last_good_then_defaults() {
    let config = SystemConfig {
        sensor_interval_ms: 5_000,
        ..SystemConfig::default()
    };
    let default_air = config.default_air_temp_c;
    let (mut app, mut hw, mut sink) = started(config);
    hw.bus().set_climate(60.0, 24.0);
    app.tick(0, &mut hw, &mut sink);

    hw.bus().fail_climate();
    app.tick(5_000, &mut hw, &mut sink);
    let air = app.sensors().air_temp;
    assert_eq!(air.source, ReadingSource::LastKnownGood);
    assert!((air.value() - 24.0).abs() < 1e-3);

    // Well past the climate timeout.
    app.tick(300_000, &mut hw, &mut sink);
    let air = app.sensors().air_temp;
    assert_eq!(air.source, ReadingSource::Default);
    assert!((air.value() - default_air).abs() < 1e-3);
}

#[test]
fn switching_profile_reevaluates_without_new_readings() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    hw.bus().set_climate(65.0, 23.0);
    app.tick(0, &mut hw, &mut sink);
    let ticks_before = app.tick_count();

    let out = app
        .handle_command(AppCommand::SetActiveProfile("  Basil ".into()), 10, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(out, CommandOutcome::ProfileActivated("basil".into()));
    assert_eq!(app.snapshot().profile, "basil");
    assert_eq!(app.tick_count(), ticks_before);
    // 65 % is above basil's 40-60 % humidity band.
    assert_eq!(app.statuses().humidity.label(), "High");
    assert!(app.profiles_dirty());
    assert!(sink.events.contains(&AppEvent::ProfileChanged {
        from: "lettuce".into(),
        to: "basil".into()
    }));
}

#[test]
fn invalid_profiles_are_rejected() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let mut inverted = custom("upside down");
    inverted.ph = Range::new(7.0, 5.0);
    let err = app
        .handle_command(AppCommand::AddProfile(inverted), 0, &mut hw, &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::Profile(ProfileError::InvertedRange(_))));

    let err = app
        .handle_command(AppCommand::AddProfile(custom("bad/name")), 0, &mut hw, &mut sink)
        .unwrap_err();
    assert_eq!(err, Error::Profile(ProfileError::InvalidName));
    assert!(!app.profiles_dirty());
}

#[test]
fn adding_the_same_name_replaces() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let first = app
        .handle_command(AppCommand::AddProfile(custom("Bok Choy")), 0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        first,
        CommandOutcome::ProfileAdded {
            name: "bok choy".into(),
            replaced: false
        }
    );
    let second = app
        .handle_command(AppCommand::AddProfile(custom("bok choy")), 0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        second,
        CommandOutcome::ProfileAdded {
            name: "bok choy".into(),
            replaced: true
        }
    );
    assert!(app.snapshot().profile_names.iter().any(|n| n == "bok choy"));
}

#[test]
fn full_registry_refuses_new_names_and_still_persists() {
    let mut nvs = NvsAdapter::new().unwrap();
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());

    // Largest possible blob: every catalogue entry edited plus a full set of
    // custom profiles with maximum-length names.
    let catalogue: Vec<String> = app.profiles().names().map(str::to_owned).collect();
    for name in &catalogue {
        app.handle_command(AppCommand::AddProfile(custom(name)), 0, &mut hw, &mut sink)
            .unwrap();
    }
    let names: Vec<String> = (0..MAX_CUSTOM_PROFILES).map(|i| format!("plant{i:0>19}")).collect();
    for name in &names {
        app.handle_command(AppCommand::AddProfile(custom(name)), 0, &mut hw, &mut sink)
            .unwrap();
    }
    let last = names.last().unwrap().clone();
    app.handle_command(AppCommand::SetActiveProfile(last.clone()), 0, &mut hw, &mut sink)
        .unwrap();

    let err = app
        .handle_command(AppCommand::AddProfile(custom("one too many")), 0, &mut hw, &mut sink)
        .unwrap_err();
    assert_eq!(err, Error::Profile(ProfileError::RegistryFull));
    assert!(!app.snapshot().profile_names.iter().any(|n| n == "one too many"));

    assert!(app.save_profiles_if_dirty(&mut nvs));
    assert!(nvs.exists(PROFILES_NAMESPACE, PROFILES_KEY));

    let mut rebooted = AppService::new(SystemConfig::default(), ProfileRegistry::with_catalog("lettuce"), 0);
    rebooted.restore_profiles(&nvs).unwrap();
    assert_eq!(rebooted.profiles().active_name(), last);
    assert_eq!(rebooted.profiles().custom_count(), MAX_CUSTOM_PROFILES);
}

#[test]
fn failed_led_write_keeps_previous_mode() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    hw.fail_led = true;
    let err = app
        .handle_command(AppCommand::CycleLed, 0, &mut hw, &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::Actuator(_)));
    assert_eq!(app.led_mode(), LedMode::Off);
    assert!(!app.snapshot().led_on);
}

#[test]
fn led_cycle_wraps_through_all_modes() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let mut seen = Vec::new();
    for _ in 0..4 {
        match app.handle_command(AppCommand::CycleLed, 0, &mut hw, &mut sink).unwrap() {
            CommandOutcome::Led(m) => seen.push(m),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(seen, vec![LedMode::Growth, LedMode::Relax, LedMode::Sleep, LedMode::Off]);
    assert_eq!(hw.led_mode(), LedMode::Off);
}

#[test]
fn profiles_survive_a_reboot() {
    let mut nvs = NvsAdapter::new().unwrap();
    {
        let (mut app, mut hw, mut sink) = started(SystemConfig::default());
        app.handle_command(AppCommand::AddProfile(custom("microgreens")), 0, &mut hw, &mut sink)
            .unwrap();
        app.handle_command(AppCommand::SetActiveProfile("microgreens".into()), 0, &mut hw, &mut sink)
            .unwrap();
        assert!(app.save_profiles_if_dirty(&mut nvs));
        assert!(!app.save_profiles_if_dirty(&mut nvs));
    }
    assert!(nvs.exists(PROFILES_NAMESPACE, PROFILES_KEY));

    let mut app = AppService::new(SystemConfig::default(), ProfileRegistry::with_catalog("lettuce"), 0);
    app.restore_profiles(&nvs).unwrap();
    assert_eq!(app.profiles().active_name(), "microgreens");
    assert_eq!(app.profiles().active(), &{
        let mut p = custom("microgreens");
        p.name = "microgreens".into();
        p
    });
}

#[test]
fn corrupted_profile_blob_is_reported() {
    let mut nvs = NvsAdapter::new().unwrap();
    nvs.write(PROFILES_NAMESPACE, PROFILES_KEY, &[0xFF; 7]).unwrap();
    let mut app = AppService::new(SystemConfig::default(), ProfileRegistry::with_catalog("lettuce"), 0);
    assert!(app.restore_profiles(&nvs).is_err());
    assert_eq!(app.profiles().active_name(), "lettuce");
}
