//! HTTP routing against a live AppService, commands applied in-line.

use serde_json::Value;

use hydrobrain::app::commands::AppCommand;
use hydrobrain::app::service::AppService;
use hydrobrain::config::SystemConfig;
use hydrobrain::error::{CommsError, Error};
use hydrobrain::http::routes::{route, ApiRequest, ApiResponse, HttpMethod};

use crate::mock_hw::{started, MockHardware, RecordingSink};

struct Rig {
    app: AppService,
    hw: MockHardware,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let (mut app, mut hw, mut sink) = started(SystemConfig::default());
        app.tick(0, &mut hw, &mut sink);
        Self { app, hw, sink }
    }

    fn call(&mut self, method: HttpMethod, path: &str, body: &[u8], now_ms: u64) -> ApiResponse {
        let handle = self.app.snapshot_handle();
        let req = ApiRequest { method, path, body };
        let Self { app, hw, sink } = self;
        route(&req, &handle, now_ms, &mut |cmd| app.handle_command(cmd, now_ms, &mut *hw, &mut *sink))
    }

    fn get(&mut self, path: &str) -> ApiResponse {
        self.call(HttpMethod::Get, path, &[], 0)
    }

    fn post(&mut self, path: &str, body: &str) -> ApiResponse {
        self.call(HttpMethod::Post, path, body.as_bytes(), 0)
    }
}

fn json(resp: &ApiResponse) -> Value {
    serde_json::from_slice(&resp.body).expect("JSON body")
}

const PROFILE_JSON: &str = r#"{
    "name": "Bok Choy",
    "tds": {"min": 500, "max": 800},
    "ec": {"min": 1000, "max": 1600},
    "ph": {"min": 6.0, "max": 7.0},
    "waterTemp": {"min": 16, "max": 22},
    "humidity": {"min": 50, "max": 70},
    "airTemp": {"min": 15, "max": 24}
}"#;

#[test]
fn status_json_carries_every_field() {
    let mut rig = Rig::new();
    let resp = rig.call(HttpMethod::Get, "/data", &[], 5_000);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "application/json");
    let v = json(&resp);
    for key in [
        "humidity", "airTemp", "waterTemp", "tds", "ec", "ph", "waterLevel", "ledStatus", "ledMode",
        "pumpStatus", "pumpMode", "profile", "status", "lastCheck",
    ] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    for key in ["tds", "ec", "ph", "waterTemp", "humidity", "airTemp"] {
        assert!(v["status"][key].is_string(), "missing status.{key}");
    }
    assert_eq!(v["profile"], "lettuce");
    assert_eq!(v["pumpMode"], "auto");
    assert_eq!(v["ledMode"], 0);
    assert_eq!(v["waterLevel"], 67.0);
    assert_eq!(v["lastCheck"], "5 seconds ago");

    let api = rig.call(HttpMethod::Get, "/api/status?x=1", &[], 125_000);
    assert_eq!(json(&api)["lastCheck"], "2 mins ago");
}

#[test]
fn every_response_has_cors_headers() {
    let mut rig = Rig::new();
    for resp in [rig.get("/data"), rig.get("/nope"), rig.call(HttpMethod::Options, "/data", &[], 0)] {
        let headers = resp.headers();
        assert!(headers.contains(&("Access-Control-Allow-Origin", "*")));
        assert!(headers.contains(&("Access-Control-Allow-Methods", "GET, POST, OPTIONS")));
        assert!(headers.contains(&("Access-Control-Allow-Headers", "*")));
    }
}

#[test]
fn preflight_is_empty_204() {
    let mut rig = Rig::new();
    let resp = rig.call(HttpMethod::Options, "/api/pump/on", &[], 0);
    assert_eq!(resp.status, 204);
    assert!(resp.body.is_empty());
    assert!(!rig.app.pump_state().running);
}

#[test]
fn unknown_routes_are_404() {
    let mut rig = Rig::new();
    assert_eq!(rig.get("/missing").status, 404);
    assert_eq!(rig.get("/api/pump/on").status, 404);
    assert_eq!(rig.post("/api/pump/sideways", "").status, 404);
    assert_eq!(rig.post("/api/led/purple", "").status, 404);
    assert_eq!(rig.call(HttpMethod::Other, "/data", &[], 0).status, 404);
}

#[test]
fn dashboard_is_served_at_root() {
    let mut rig = Rig::new();
    let resp = rig.get("/");
    assert_eq!(resp.status, 200);
    assert!(resp.content_type.starts_with("text/html"));
    assert!(resp.body_str().contains("setInterval(refresh, 30000)"));
}

#[test]
fn toggle_led_cycles_modes() {
    let mut rig = Rig::new();
    let modes: Vec<Value> = (0..5).map(|_| json(&rig.get("/toggle-led"))["mode"].clone()).collect();
    assert_eq!(modes, vec![1, 2, 3, 0, 1]);
    assert_eq!(json(&rig.get("/data"))["ledStatus"], true);
}

#[test]
fn led_mode_endpoints() {
    let mut rig = Rig::new();
    let v = json(&rig.post("/api/led/sleep", ""));
    assert_eq!(v["mode"], 3);
    assert_eq!(v["ledStatus"], true);
    let v = json(&rig.post("/api/led/off", ""));
    assert_eq!(v["mode"], 0);
    assert_eq!(v["ledStatus"], false);
}

#[test]
fn toggle_pump_sets_the_opposite_state() {
    let mut rig = Rig::new();
    let v = json(&rig.get("/toggle-pump"));
    assert_eq!(v["pumpStatus"], true);
    assert_eq!(v["pumpMode"], "manual");
    assert!(rig.hw.pump_on());

    let v = json(&rig.get("/toggle-pump"));
    assert_eq!(v["pumpStatus"], false);
    assert!(!rig.hw.pump_on());

    let v = json(&rig.post("/api/pump/auto", ""));
    assert_eq!(v["pumpMode"], "auto");
    assert_eq!(v["autoEnabled"], true);
}

#[test]
fn selecting_a_profile_returns_fresh_status() {
    let mut rig = Rig::new();
    let resp = rig.post("/api/profile/Tomato", "");
    assert_eq!(resp.status, 200);
    assert_eq!(json(&resp)["profile"], "tomato");

    let resp = rig.post("/api/profile/cactus", "");
    assert_eq!(resp.status, 404);
    assert!(json(&resp)["error"].is_string());
    assert_eq!(rig.app.profiles().active_name(), "tomato");
}

#[test]
fn custom_profiles_can_be_added_and_selected() {
    let mut rig = Rig::new();
    let resp = rig.post("/api/profiles", PROFILE_JSON);
    assert_eq!(resp.status, 200, "{}", resp.body_str());
    let v = json(&resp);
    assert_eq!(v["name"], "bok choy");
    assert_eq!(v["replaced"], false);
    assert_eq!(json(&rig.post("/api/profiles", PROFILE_JSON))["replaced"], true);

    let resp = rig.post("/api/profile/bok%20choy", "");
    assert_eq!(json(&resp)["profile"], "bok choy");

    let list = json(&rig.get("/api/profiles"));
    assert_eq!(list["active"], "bok choy");
    let entries = list["profiles"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["name"] == "bok choy" && e["builtin"] == false));
    assert!(entries.iter().any(|e| e["name"] == "lettuce" && e["builtin"] == true));
}

#[test]
fn bad_profile_bodies_are_400() {
    let mut rig = Rig::new();
    assert_eq!(rig.post("/api/profiles", "not json").status, 400);
    assert_eq!(rig.post("/api/profiles", r#"{"name": "x"}"#).status, 400);

    let inverted = PROFILE_JSON.replace(r#""ph": {"min": 6.0, "max": 7.0}"#, r#""ph": {"min": 7.0, "max": 6.0}"#);
    let resp = rig.post("/api/profiles", &inverted);
    assert_eq!(resp.status, 400);
    assert!(json(&resp)["error"].as_str().unwrap().contains("ph"));

    let oversized = " ".repeat(2048);
    assert_eq!(rig.post("/api/profiles", &oversized).status, 400);
    assert!(rig.sink.events.iter().all(|e| !matches!(
        e,
        hydrobrain::app::events::AppEvent::ProfileAdded { .. }
    )));
}

#[test]
fn unavailable_control_loop_is_503() {
    let rig = Rig::new();
    let handle = rig.app.snapshot_handle();
    let req = ApiRequest {
        method: HttpMethod::Post,
        path: "/api/pump/on",
        body: &[],
    };
    let resp = route(&req, &handle, 0, &mut |_: AppCommand| {
        Err(Error::Comms(CommsError::ControlLoopUnavailable))
    });
    assert_eq!(resp.status, 503);

    // Reads never need the loop.
    let req = ApiRequest {
        method: HttpMethod::Get,
        path: "/data",
        body: &[],
    };
    let resp = route(&req, &handle, 0, &mut |_: AppCommand| {
        Err(Error::Comms(CommsError::ControlLoopUnavailable))
    });
    assert_eq!(resp.status, 200);
}
