//! Build-time configuration.
//!
//! Pin numbers and the CN105 line settings are fixed by the wiring; the Wi-Fi
//! credentials are injected through the environment at build time, e.g.
//! `HEATPUMP_WIFI_SSID=home HEATPUMP_WIFI_PASSWORD=secret cargo build ...`.

use crate::model::{FanSpeed, HeatPumpSettings, Mode, Power, Vane, WideVane};

/// GPIO wired to the heat pump TX line
pub const HEATPUMP_SERIAL_RX_PIN: u8 = 4;
/// GPIO wired to the heat pump RX line
pub const HEATPUMP_SERIAL_TX_PIN: u8 = 5;
/// CN105 runs at 2400 baud, 8 data bits, even parity, 1 stop bit
pub const HEATPUMP_SERIAL_BAUD_RATE: u32 = 2400;

/// Period of the main poll loop
pub const LOOP_INTERVAL_MS: u64 = 1_000;
/// How long to wait before retrying the heat pump after a failure
pub const HEATPUMP_RECONNECT_INTERVAL_MS: u64 = 30_000;

pub const WIFI_SSID: Option<&str> = option_env!("HEATPUMP_WIFI_SSID");
pub const WIFI_PASSWORD: Option<&str> = option_env!("HEATPUMP_WIFI_PASSWORD");
pub const WIFI_RETRY_INTERVAL_MS: u64 = 10_000;
/// Upper bound for the first association plus DHCP lease
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 20_000;

pub const BRIDGE_DEVICE_NAME: &str = "Mitsubishi Heat Pump";
pub const BRIDGE_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Serial wiring, kept together so it can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub rx_pin: u8,
    pub tx_pin: u8,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            rx_pin: HEATPUMP_SERIAL_RX_PIN,
            tx_pin: HEATPUMP_SERIAL_TX_PIN,
            baud_rate: HEATPUMP_SERIAL_BAUD_RATE,
        }
    }
}

/// Wi-Fi station credentials; `None` when no SSID was configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl WifiCredentials {
    pub fn from_build_env() -> Option<Self> {
        Self::from_parts(WIFI_SSID, WIFI_PASSWORD)
    }

    pub fn from_parts(ssid: Option<&'static str>, password: Option<&'static str>) -> Option<Self> {
        match ssid {
            Some(ssid) if !ssid.is_empty() => Some(Self {
                ssid,
                password: password.unwrap_or(""),
            }),
            _ => None,
        }
    }
}

/// Settings pushed once after the first successful connect
pub fn initial_settings() -> HeatPumpSettings {
    HeatPumpSettings {
        power: Some(Power::On),
        mode: Some(Mode::Heat),
        temperature: Some(22.0),
        fan: Some(FanSpeed::Auto),
        vane: Some(Vane::Auto),
        wide_vane: Some(WideVane::Center),
        i_see: false,
    }
}
