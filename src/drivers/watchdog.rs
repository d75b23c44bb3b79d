//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the controller if the control loop stalls. The worst-case pass is
//! one sensor refresh (well under a second of ADC bursts plus a DHT frame),
//! so the timeout leaves a wide margin.
//!
//! The control loop calls `feed()` once per pass.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from main() before the control loop.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms timeout)", WATCHDOG_TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }
                Self { subscribed, feeds: 0 }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op");
            Self { feeds: 0 }
        }
    }

    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the TWDT entry of the subscribed task.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
