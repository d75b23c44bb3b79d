//! Request routing for the HTTP API.
//!
//! [`route`] is a pure function of the request, the published snapshot and
//! a command executor, so every endpoint is testable on the host. The
//! ESP-IDF server in [`super::server`] only moves bytes in and out.
//!
//! Reads go straight to the [`SnapshotHandle`]. Writes are turned into an
//! [`AppCommand`] and handed to `exec`; in firmware that is
//! [`RemoteCommander::execute`](crate::app::commands::RemoteCommander::execute),
//! which blocks until the control loop has applied the command and
//! published a fresh snapshot.

use serde::Serialize;
use serde_json::json;

use crate::app::commands::{AppCommand, CommandOutcome};
use crate::drivers::led_strip::LedMode;
use crate::error::{Error, ProfileError, Result};
use crate::profiles::{is_builtin, PlantProfile, StatusMap};
use crate::scheduler::{PumpCommand, PumpMode, PumpScheduleState};
use crate::state::{SnapshotHandle, SystemStateSnapshot};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Largest request body the server will read.
pub const MAX_BODY_LEN: usize = 1024;

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
];

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Options,
    Other,
}

#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    pub method: HttpMethod,
    /// Request URI; a query string is ignored.
    pub path: &'a str,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json(status: u16, value: &impl Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: JSON,
                body,
            },
            Err(e) => Self::text(500, &format!("serialisation failed: {e}")),
        }
    }

    pub(crate) fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: body.as_bytes().to_vec(),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            content_type: TEXT,
            body: Vec::new(),
        }
    }

    /// Content type followed by the CORS headers every response carries.
    pub fn headers(&self) -> [(&'static str, &'static str); 4] {
        [
            ("Content-Type", self.content_type),
            CORS_HEADERS[0],
            CORS_HEADERS[1],
            CORS_HEADERS[2],
        ]
    }

    pub fn body_str(&self) -> &str {
        core::str::from_utf8(&self.body).unwrap_or("")
    }
}

// ───────────────────────────────────────────────────────────────
// Response bodies
// ───────────────────────────────────────────────────────────────

/// `"N seconds ago"` under a minute, whole minutes after that.
pub fn last_check_text(age_ms: u64) -> String {
    let secs = age_ms / 1_000;
    if secs < 60 {
        format!("{secs} seconds ago")
    } else {
        format!("{} mins ago", secs / 60)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody<'a> {
    pub humidity: f32,
    pub air_temp: f32,
    pub water_temp: f32,
    pub tds: f32,
    pub ec: f32,
    pub ph: f32,
    pub water_level: f32,
    pub led_status: bool,
    pub led_mode: LedMode,
    pub pump_status: bool,
    pub pump_mode: PumpMode,
    pub profile: &'a str,
    pub status: StatusMap,
    pub last_check: String,
}

impl<'a> StatusBody<'a> {
    pub fn from_snapshot(s: &'a SystemStateSnapshot, now_ms: u64) -> Self {
        Self {
            humidity: s.sensors.humidity.value(),
            air_temp: s.sensors.air_temp.value(),
            water_temp: s.sensors.water_temp.value(),
            tds: s.sensors.tds.value(),
            ec: s.sensors.ec.value(),
            ph: s.sensors.ph.value(),
            water_level: s.sensors.water_level.value(),
            led_status: s.led_on,
            led_mode: s.led_mode,
            pump_status: s.pump.running,
            pump_mode: s.pump.mode(),
            profile: &s.profile,
            status: s.statuses,
            last_check: last_check_text(now_ms.saturating_sub(s.sensors.taken_at_ms)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PumpBody {
    pump_status: bool,
    pump_mode: PumpMode,
    auto_enabled: bool,
}

impl From<PumpScheduleState> for PumpBody {
    fn from(p: PumpScheduleState) -> Self {
        Self {
            pump_status: p.running,
            pump_mode: p.mode(),
            auto_enabled: p.auto_enabled,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileEntry<'a> {
    name: &'a str,
    builtin: bool,
}

// ───────────────────────────────────────────────────────────────
// Router
// ───────────────────────────────────────────────────────────────

/// Data endpoints read the snapshot and never fail; a sensor error can
/// only come back from a command and means the reading is unavailable.
fn status_for(err: &Error) -> u16 {
    match err {
        Error::Profile(ProfileError::UnknownProfile) => 404,
        Error::Profile(_) | Error::Config(_) => 400,
        Error::Comms(_) | Error::Sensor(_) => 503,
        Error::Actuator(_) | Error::Init(_) => 500,
    }
}

fn failed(err: &Error) -> ApiResponse {
    ApiResponse::error(status_for(err), &err.to_string())
}

/// Decode `%XX` escapes and `+` in a path segment.
fn percent_decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = segment.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

/// Dispatch one request.
pub fn route(
    req: &ApiRequest<'_>,
    state: &SnapshotHandle,
    now_ms: u64,
    exec: &mut dyn FnMut(AppCommand) -> Result<CommandOutcome>,
) -> ApiResponse {
    let path = req.path.split('?').next().unwrap_or("");

    if req.method == HttpMethod::Options {
        return ApiResponse::no_content();
    }

    match (req.method, path) {
        (HttpMethod::Get, "/") => ApiResponse {
            status: 200,
            content_type: HTML,
            body: DASHBOARD_HTML.as_bytes().to_vec(),
        },
        (HttpMethod::Get, "/data" | "/api/status") => status_response(state, now_ms),
        (HttpMethod::Get, "/toggle-led") => match exec(AppCommand::CycleLed) {
            Ok(CommandOutcome::Led(mode)) => ApiResponse::json(200, &json!({ "mode": mode })),
            Ok(other) => unexpected(&other),
            Err(e) => failed(&e),
        },
        (HttpMethod::Get, "/toggle-pump") => {
            let cmd = if state.load().pump.running {
                PumpCommand::Off
            } else {
                PumpCommand::On
            };
            pump_response(exec(AppCommand::SetPump(cmd)))
        }
        (HttpMethod::Get, "/api/profiles") => {
            let snapshot = state.load();
            let names: Vec<ProfileEntry<'_>> = snapshot
                .profile_names
                .iter()
                .map(|n| ProfileEntry {
                    name: n,
                    builtin: is_builtin(n),
                })
                .collect();
            ApiResponse::json(200, &json!({ "active": snapshot.profile, "profiles": names }))
        }
        (HttpMethod::Post, "/api/profiles") => add_profile(req.body, exec),
        (HttpMethod::Post, p) => {
            if let Some(action) = p.strip_prefix("/api/pump/") {
                let cmd = match action {
                    "on" => PumpCommand::On,
                    "off" => PumpCommand::Off,
                    "auto" => PumpCommand::Auto,
                    _ => return not_found(p),
                };
                pump_response(exec(AppCommand::SetPump(cmd)))
            } else if let Some(mode) = p.strip_prefix("/api/led/") {
                let Some(mode) = LedMode::from_name(mode) else {
                    return not_found(p);
                };
                match exec(AppCommand::SetLedMode(mode)) {
                    Ok(CommandOutcome::Led(mode)) => ApiResponse::json(
                        200,
                        &json!({ "mode": mode, "ledStatus": mode.is_lit() }),
                    ),
                    Ok(other) => unexpected(&other),
                    Err(e) => failed(&e),
                }
            } else if let Some(name) = p.strip_prefix("/api/profile/") {
                let Some(name) = percent_decode(name) else {
                    return ApiResponse::error(400, "malformed profile name");
                };
                match exec(AppCommand::SetActiveProfile(name)) {
                    Ok(_) => status_response(state, now_ms),
                    Err(e) => failed(&e),
                }
            } else {
                not_found(p)
            }
        }
        (_, p) => not_found(p),
    }
}

fn status_response(state: &SnapshotHandle, now_ms: u64) -> ApiResponse {
    let snapshot = state.load();
    ApiResponse::json(200, &StatusBody::from_snapshot(&snapshot, now_ms))
}

fn pump_response(result: Result<CommandOutcome>) -> ApiResponse {
    match result {
        Ok(CommandOutcome::Pump(p)) => ApiResponse::json(200, &PumpBody::from(p)),
        Ok(other) => unexpected(&other),
        Err(e) => failed(&e),
    }
}

fn add_profile(
    body: &[u8],
    exec: &mut dyn FnMut(AppCommand) -> Result<CommandOutcome>,
) -> ApiResponse {
    if body.len() > MAX_BODY_LEN {
        return ApiResponse::error(400, "request body too large");
    }
    let profile: PlantProfile = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return ApiResponse::error(400, &format!("invalid profile: {e}")),
    };
    match exec(AppCommand::AddProfile(profile)) {
        Ok(CommandOutcome::ProfileAdded { name, replaced }) => {
            ApiResponse::json(200, &json!({ "name": name, "replaced": replaced }))
        }
        Ok(other) => unexpected(&other),
        Err(e) => failed(&e),
    }
}

fn unexpected(outcome: &CommandOutcome) -> ApiResponse {
    log::error!("http: unexpected command outcome {:?}", outcome);
    ApiResponse::error(500, "unexpected command outcome")
}

fn not_found(path: &str) -> ApiResponse {
    log::debug!("http: no route for {}", path);
    ApiResponse::text(404, &format!("Not found: {path}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_check_switches_to_minutes_at_sixty_seconds() {
        assert_eq!(last_check_text(0), "0 seconds ago");
        assert_eq!(last_check_text(59_999), "59 seconds ago");
        assert_eq!(last_check_text(60_000), "1 mins ago");
        assert_eq!(last_check_text(185_000), "3 mins ago");
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("bok%20choy").as_deref(), Some("bok choy"));
        assert_eq!(percent_decode("bok+choy").as_deref(), Some("bok choy"));
        assert_eq!(percent_decode("basil").as_deref(), Some("basil"));
        assert_eq!(percent_decode("bad%2"), None);
        assert_eq!(percent_decode("bad%zz"), None);
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(status_for(&Error::Profile(ProfileError::UnknownProfile)), 404);
        assert_eq!(status_for(&Error::Profile(ProfileError::InvalidName)), 400);
        assert_eq!(status_for(&Error::Profile(ProfileError::RegistryFull)), 400);
        assert_eq!(status_for(&Error::Sensor(crate::error::SensorError::ProbeReadFailed)), 503);
        assert_eq!(
            status_for(&Error::Comms(crate::error::CommsError::ControlLoopUnavailable)),
            503
        );
    }
}
