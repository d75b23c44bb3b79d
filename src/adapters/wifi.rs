//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the boundary between the control loop
//! and the network link that carries the HTTP API.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: drives an `EspWifi` handed in from `main.rs`.
//! - **all other targets**: a simulated access point for host-side tests.
//!
//! ## Reconnection policy
//!
//! `poll(now_ms)` looks at the link once every `wifi_check_interval_ms`.
//! Each check that finds the link down issues at most one connect attempt.
//! After `wifi_max_attempts` failed checks the adapter stops trying for
//! `wifi_cooldown_ms`, then starts over with a fresh attempt budget.
//! Nothing here sleeps or waits for association.

use core::fmt;
use log::{info, warn};

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

pub trait ConnectivityPort {
    /// Issue the first connect attempt. Returns once the request is made.
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Called every loop iteration; rate-limits itself.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// Idle: never connected, or disconnected on purpose.
    Disconnected,
    /// `attempt` connect requests issued in the current budget.
    Connecting { attempt: u8 },
    Connected,
    /// Budget exhausted; no attempts until `until_ms`.
    CoolingDown { until_ms: u64 },
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    check_interval_ms: u64,
    max_attempts: u8,
    cooldown_ms: u64,
    last_check_ms: Option<u64>,
    last_rssi: Option<i8>,
    #[cfg(target_os = "espidf")]
    driver: Option<Box<esp_idf_svc::wifi::EspWifi<'static>>>,
    /// Simulation: whether the access point answers.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_associated: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_attempts: u32,
}

impl WifiAdapter {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            check_interval_ms: u64::from(config.wifi_check_interval_ms),
            max_attempts: config.wifi_max_attempts.max(1),
            cooldown_ms: u64::from(config.wifi_cooldown_ms),
            last_check_ms: None,
            last_rssi: None,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_ap_up: true,
            #[cfg(not(target_os = "espidf"))]
            sim_associated: false,
            #[cfg(not(target_os = "espidf"))]
            sim_attempts: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn ssid(&self) -> &str {
        self.ssid.as_str()
    }

    /// Hand over the station driver created from the modem peripheral.
    #[cfg(target_os = "espidf")]
    pub fn attach_driver(&mut self, wifi: esp_idf_svc::wifi::EspWifi<'static>) {
        self.driver = Some(Box::new(wifi));
    }

    /// Simulation: bring the access point up or down. Taking it down
    /// drops any current association.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_ap_up(&mut self, up: bool) {
        self.sim_ap_up = up;
        if !up {
            self.sim_associated = false;
        }
    }

    /// Simulation: number of connect requests issued so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_attempts(&self) -> u32 {
        self.sim_attempts
    }

    /// Issue attempt number `attempt` and record the outcome.
    fn attempt(&mut self, attempt: u8) {
        if let Err(e) = self.platform_connect() {
            warn!("WiFi: attempt {}/{} failed: {}", attempt, self.max_attempts, e);
        }
        if self.platform_is_connected() {
            self.mark_connected();
        } else {
            self.state = WifiState::Connecting { attempt };
        }
    }

    fn mark_connected(&mut self) {
        self.state = WifiState::Connected;
        self.last_rssi = self.platform_rssi();
        info!("WiFi: connected to '{}' (RSSI={:?})", self.ssid, self.last_rssi);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let Some(wifi) = self.driver.as_mut() else {
            return Err(ConnectivityError::ConnectionFailed);
        };
        let client = ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        if !wifi.is_started().unwrap_or(false) {
            wifi.start().map_err(|_| ConnectivityError::ConnectionFailed)?;
        }
        // Returns as soon as the request is queued; association is checked
        // on the next poll.
        wifi.connect().map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_attempts = self.sim_attempts.wrapping_add(1);
        if !self.sim_ap_up {
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_associated = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Some(wifi) = self.driver.as_mut() {
            if let Err(e) = wifi.disconnect() {
                warn!("WiFi: disconnect failed: {:?}", e);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_associated = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.driver
            .as_ref()
            .is_some_and(|wifi| wifi.is_connected().unwrap_or(false))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_associated
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: fills a caller-owned record; only valid while associated.
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (rc == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_associated.then_some(-58)
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        self.last_check_ms = Some(now_ms);
        self.attempt(1);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.last_rssi = None;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn poll(&mut self, now_ms: u64) {
        if self.state == WifiState::Disconnected {
            return;
        }
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < self.check_interval_ms {
                return;
            }
        }
        self.last_check_ms = Some(now_ms);

        match self.state {
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, reconnecting");
                    self.last_rssi = None;
                    self.attempt(1);
                }
            }
            WifiState::Connecting { attempt } => {
                if self.platform_is_connected() {
                    self.mark_connected();
                } else if attempt >= self.max_attempts {
                    warn!(
                        "WiFi: {} attempts failed, pausing for {}s",
                        attempt,
                        self.cooldown_ms / 1_000
                    );
                    self.state = WifiState::CoolingDown {
                        until_ms: now_ms.saturating_add(self.cooldown_ms),
                    };
                } else {
                    self.attempt(attempt + 1);
                }
            }
            WifiState::CoolingDown { until_ms } => {
                if now_ms >= until_ms {
                    info!("WiFi: cooldown over, retrying '{}'", self.ssid);
                    self.attempt(1);
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> WifiAdapter {
        let mut a = WifiAdapter::new(&SystemConfig::default());
        a.set_credentials("greenhouse", "hunter2hunter2").unwrap();
        a
    }

    #[test]
    fn rejects_bad_credentials() {
        let mut a = WifiAdapter::new(&SystemConfig::default());
        assert_eq!(a.set_credentials("", "password123"), Err(ConnectivityError::InvalidSsid));
        assert_eq!(a.set_credentials(&"x".repeat(33), ""), Err(ConnectivityError::InvalidSsid));
        assert_eq!(a.set_credentials("Net\u{7}", ""), Err(ConnectivityError::InvalidSsid));
        assert_eq!(a.set_credentials("MyNet", "short"), Err(ConnectivityError::InvalidPassword));
        assert_eq!(a.set_credentials("MyNet", &"p".repeat(65)), Err(ConnectivityError::InvalidPassword));
    }

    #[test]
    fn accepts_open_and_wpa2() {
        let mut a = WifiAdapter::new(&SystemConfig::default());
        assert!(a.set_credentials("OpenCafe", "").is_ok());
        assert!(a.set_credentials("HomeWiFi", "mysecret").is_ok());
        assert_eq!(a.ssid(), "HomeWiFi");
    }

    #[test]
    fn connect_without_credentials_fails() {
        let mut a = WifiAdapter::new(&SystemConfig::default());
        assert_eq!(a.connect(0), Err(ConnectivityError::NoCredentials));
    }

    #[test]
    fn connect_and_double_connect() {
        let mut a = adapter();
        a.connect(0).unwrap();
        assert!(a.is_connected());
        assert!(a.rssi().is_some());
        assert_eq!(a.connect(1), Err(ConnectivityError::AlreadyConnected));
        a.disconnect();
        assert!(!a.is_connected());
        assert!(a.rssi().is_none());
    }

    #[test]
    fn lost_link_is_noticed_only_at_the_next_check() {
        let mut a = adapter();
        a.connect(0).unwrap();
        a.sim_set_ap_up(false);
        a.poll(5_000);
        assert_eq!(a.state(), WifiState::Connected);
        a.poll(10_000);
        assert_eq!(a.state(), WifiState::Connecting { attempt: 1 });
        a.sim_set_ap_up(true);
        a.poll(15_000);
        assert_eq!(a.sim_attempts(), 2);
        a.poll(20_000);
        assert!(a.is_connected());
    }

    #[test]
    fn exhausted_budget_cools_down_then_starts_over() {
        let mut a = adapter();
        a.sim_set_ap_up(false);
        a.connect(0).unwrap();
        let mut now = 0;
        for _ in 1..10 {
            now += 10_000;
            a.poll(now);
        }
        assert_eq!(a.sim_attempts(), 10);
        assert_eq!(a.state(), WifiState::Connecting { attempt: 10 });

        now += 10_000;
        a.poll(now);
        assert_eq!(a.state(), WifiState::CoolingDown { until_ms: now + 60_000 });

        // No attempts while cooling down.
        for _ in 0..5 {
            now += 10_000;
            a.poll(now);
        }
        assert_eq!(a.sim_attempts(), 10);

        a.sim_set_ap_up(true);
        now += 10_000;
        a.poll(now);
        assert_eq!(a.sim_attempts(), 11);
        assert!(a.is_connected());
    }

    #[test]
    fn disconnected_adapter_stays_idle() {
        let mut a = adapter();
        a.poll(0);
        a.poll(100_000);
        assert_eq!(a.sim_attempts(), 0);
        assert_eq!(a.state(), WifiState::Disconnected);
    }
}
