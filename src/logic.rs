//! Business logic layer (hardware-independent)

use crate::config::{self, SerialConfig};
use crate::error::Error;
use crate::heatpump::{HeatPump, HeatPumpEvent};
use crate::model::HeatPumpSettings;
use crate::report;
use crate::traits::{Clock, Console, SerialPort};

/// Drives one heat pump: connect, push the initial settings once, then poll
/// and print every change.
pub struct Controller<S, C> {
    heat_pump: HeatPump<S, C>,
    serial_config: SerialConfig,
    initial_settings: HeatPumpSettings,
    initial_settings_sent: bool,
    last_connect_attempt_ms: Option<u64>,
    reconnect_interval_ms: u64,
}

impl<S: SerialPort, C: Clock> Controller<S, C> {
    pub fn new(heat_pump: HeatPump<S, C>, serial_config: SerialConfig) -> Self {
        Self {
            heat_pump,
            serial_config,
            initial_settings: config::initial_settings(),
            initial_settings_sent: false,
            last_connect_attempt_ms: None,
            reconnect_interval_ms: config::HEATPUMP_RECONNECT_INTERVAL_MS,
        }
    }

    pub fn with_initial_settings(mut self, settings: HeatPumpSettings) -> Self {
        self.initial_settings = settings;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.heat_pump.is_connected()
    }

    pub fn heat_pump(&self) -> &HeatPump<S, C> {
        &self.heat_pump
    }

    /// Connect to the unit and, on the first success, push the initial
    /// settings.
    pub async fn connect<K: Console>(&mut self, console: &mut K) -> bool {
        self.last_connect_attempt_ms = Some(self.heat_pump.clock().now_ms());
        report::print_fmt(
            console,
            format_args!(
                "Connecting to heat pump (RX pin {}, TX pin {}) ...",
                self.serial_config.rx_pin, self.serial_config.tx_pin
            ),
        );

        if self.heat_pump.connect().await.is_err() {
            console.print_line(
                "Failed to connect to the heat pump interface. Check wiring and serial configuration.",
            );
            return false;
        }

        console.print_line("Successfully connected to the heat pump interface.");
        if !self.initial_settings_sent {
            self.configure_initial_settings(console).await;
        }
        true
    }

    /// Apply the initial settings, enable automatic and external updates and
    /// push them to the unit.
    pub async fn configure_initial_settings<K: Console>(&mut self, console: &mut K) {
        self.heat_pump.set_settings(&self.initial_settings);
        self.heat_pump.enable_auto_update();
        self.heat_pump.enable_external_update();

        match self.heat_pump.update().await {
            Ok(()) => {
                self.initial_settings_sent = true;
                console.print_line("Initial settings sent to the heat pump interface.");
            }
            Err(_) => {
                console.print_line("Failed to send initial settings to the heat pump interface.")
            }
        }
        self.print_events(console);
    }

    /// One loop iteration; call once per `LOOP_INTERVAL_MS`.
    pub async fn tick<K: Console>(&mut self, console: &mut K) {
        if !self.heat_pump.is_connected() {
            let due = match self.last_connect_attempt_ms {
                Some(last) => {
                    self.heat_pump.clock().elapsed_since(last) >= self.reconnect_interval_ms
                }
                None => true,
            };
            if due {
                self.connect(console).await;
            }
            return;
        }

        match self.heat_pump.sync().await {
            Ok(()) => {}
            Err(Error::LinkLost) => {
                self.last_connect_attempt_ms = Some(self.heat_pump.clock().now_ms());
                console.print_line("Lost contact with the heat pump, will reconnect.");
            }
            Err(e) => report::print_fmt(console, format_args!("Heat pump sync failed: {}", e)),
        }
        self.print_events(console);
    }

    fn print_events<K: Console>(&mut self, console: &mut K) {
        while let Some(event) = self.heat_pump.poll_event() {
            match event {
                HeatPumpEvent::SettingsChanged(settings) => {
                    report::print_settings(console, &settings)
                }
                HeatPumpEvent::StatusChanged(status) => report::print_status(console, &status),
                HeatPumpEvent::RoomTemperatureChanged(celsius) => {
                    report::print_room_temperature(console, celsius)
                }
            }
        }
    }
}
