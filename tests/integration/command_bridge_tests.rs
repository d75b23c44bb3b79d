//! Cross-thread command bridge: handlers on one thread, control loop on
//! another, exactly as the HTTP server and `main` run on the device.

use std::thread;
use std::time::{Duration, Instant};

use hydrobrain::app::commands::{command_channel, AppCommand, CommandOutcome, COMMAND_QUEUE_DEPTH};
use hydrobrain::config::SystemConfig;
use hydrobrain::drivers::led_strip::LedMode;
use hydrobrain::error::{CommsError, Error};
use hydrobrain::http::routes::{route, ApiRequest, HttpMethod};
use hydrobrain::scheduler::PumpCommand;

use crate::mock_hw::started;

const UNAVAILABLE: Error = Error::Comms(CommsError::ControlLoopUnavailable);

#[test]
fn remote_commands_are_applied_on_the_loop_thread() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let (commander, inbox) = command_channel(COMMAND_QUEUE_DEPTH, Duration::from_secs(5));

    let worker = thread::spawn(move || {
        let led = commander.execute(AppCommand::CycleLed);
        let pump = commander.execute(AppCommand::SetPump(PumpCommand::On));
        (led, pump)
    });

    let mut handled = 0;
    while !worker.is_finished() {
        handled += inbox.drain(|cmd| app.handle_command(cmd, 0, &mut hw, &mut sink));
        thread::sleep(Duration::from_millis(1));
    }
    let (led, pump) = worker.join().unwrap();

    assert_eq!(handled, 2);
    assert_eq!(led.unwrap(), CommandOutcome::Led(LedMode::Growth));
    match pump.unwrap() {
        CommandOutcome::Pump(state) => assert!(state.running),
        other => panic!("unexpected {other:?}"),
    }
    assert!(hw.pump_on());
}

#[test]
fn http_request_sees_the_snapshot_published_by_its_command() {
    let (mut app, mut hw, mut sink) = started(SystemConfig::default());
    let (commander, inbox) = command_channel(COMMAND_QUEUE_DEPTH, Duration::from_secs(5));
    let handle = app.snapshot_handle();

    let worker = thread::spawn(move || {
        let req = ApiRequest {
            method: HttpMethod::Post,
            path: "/api/profile/basil",
            body: &[],
        };
        route(&req, &handle, 0, &mut |cmd| commander.execute(cmd))
    });

    while !worker.is_finished() {
        inbox.drain(|cmd| app.handle_command(cmd, 0, &mut hw, &mut sink));
        thread::sleep(Duration::from_millis(1));
    }
    let resp = worker.join().unwrap();
    assert_eq!(resp.status, 200);
    let v: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(v["profile"], "basil");
}

#[test]
fn silent_loop_times_out_then_queue_fills() {
    let (commander, inbox) = command_channel(1, Duration::from_millis(20));

    let started_at = Instant::now();
    assert_eq!(commander.execute(AppCommand::CycleLed), Err(UNAVAILABLE));
    assert!(started_at.elapsed() >= Duration::from_millis(20));

    // The first envelope is still queued, so this one is refused at once.
    assert_eq!(commander.execute(AppCommand::CycleLed), Err(UNAVAILABLE));

    // Late answers to a requester that gave up are dropped quietly.
    let handled = inbox.drain(|_| Ok(CommandOutcome::Led(LedMode::Growth)));
    assert_eq!(handled, 1);
}

#[test]
fn stopped_loop_is_reported_unavailable() {
    let (commander, inbox) = command_channel(COMMAND_QUEUE_DEPTH, Duration::from_secs(5));
    drop(inbox);
    assert_eq!(
        commander.execute(AppCommand::SetPump(PumpCommand::Off)),
        Err(UNAVAILABLE)
    );
}
