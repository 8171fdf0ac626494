//! Heat pump driver
//!
//! Keeps two copies of the settings: `current`, the last thing the unit
//! reported, and `wanted`, what the controller asked for. `update` pushes the
//! difference; `sync` polls the unit and queues change events. Waiting for a
//! reply sleeps on the clock, so other tasks keep running meanwhile.

use heapless::Deque;

use crate::error::{Error, Result};
use crate::model::{
    normalize_temperature, FanSpeed, HeatPumpSettings, HeatPumpStatus, Mode, Power, Vane,
    WideVane,
};
use crate::protocol::{self, InfoType, Packet, PacketReader};
use crate::traits::{Clock, SerialPort};

const CONNECT_ATTEMPTS: u8 = 2;
const RESPONSE_TIMEOUT_MS: u64 = 2_000;
const RESPONSE_POLL_MS: u32 = 10;
/// Minimum spacing between info requests
const INFO_REQUEST_INTERVAL_MS: u64 = 500;
/// Silence after which the link is considered dead
const LINK_TIMEOUT_MS: u64 = 30_000;
const EVENT_QUEUE_LEN: usize = 8;
const READ_CHUNK: usize = 32;

/// Change notifications, drained with [`HeatPump::poll_event`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeatPumpEvent {
    SettingsChanged(HeatPumpSettings),
    StatusChanged(HeatPumpStatus),
    RoomTemperatureChanged(f32),
}

pub struct HeatPump<S, C> {
    serial: S,
    clock: C,
    reader: PacketReader,
    connected: bool,
    current: HeatPumpSettings,
    wanted: HeatPumpSettings,
    dirty: bool,
    status: HeatPumpStatus,
    auto_update: bool,
    external_update: bool,
    info_index: usize,
    last_send_ms: Option<u64>,
    last_recv_ms: u64,
    events: Deque<HeatPumpEvent, EVENT_QUEUE_LEN>,
}

impl<S: SerialPort, C: Clock> HeatPump<S, C> {
    pub fn new(serial: S, clock: C) -> Self {
        Self {
            serial,
            clock,
            reader: PacketReader::new(),
            connected: false,
            current: HeatPumpSettings::default(),
            wanted: HeatPumpSettings::default(),
            dirty: false,
            status: HeatPumpStatus::default(),
            auto_update: false,
            external_update: false,
            info_index: 0,
            last_send_ms: None,
            last_recv_ms: 0,
            events: Deque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last settings reported by the unit
    pub fn settings(&self) -> &HeatPumpSettings {
        &self.current
    }

    pub fn wanted_settings(&self) -> &HeatPumpSettings {
        &self.wanted
    }

    pub fn status(&self) -> &HeatPumpStatus {
        &self.status
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Handshake with the unit. Any previous link state is discarded.
    pub async fn connect(&mut self) -> Result<()> {
        self.connected = false;
        self.reader.reset();

        for _ in 0..CONNECT_ATTEMPTS {
            self.send(&protocol::connect_request())?;
            if self.wait_for(|p| matches!(p, Packet::ConnectAck)).await? {
                self.connected = true;
                self.last_recv_ms = self.clock.now_ms();
                self.info_index = 0;
                return Ok(());
            }
        }

        Err(Error::Timeout)
    }

    pub fn set_power(&mut self, power: Power) {
        self.wanted.power = Some(power);
        self.dirty = true;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.wanted.mode = Some(mode);
        self.dirty = true;
    }

    /// Set-point in °C; clamped to the supported range, 0.5° steps. NaN is
    /// ignored.
    pub fn set_temperature(&mut self, celsius: f32) {
        if celsius.is_nan() {
            return;
        }
        self.wanted.temperature = Some(normalize_temperature(celsius));
        self.dirty = true;
    }

    pub fn set_fan_speed(&mut self, fan: FanSpeed) {
        self.wanted.fan = Some(fan);
        self.dirty = true;
    }

    pub fn set_vane(&mut self, vane: Vane) {
        self.wanted.vane = Some(vane);
        self.dirty = true;
    }

    pub fn set_wide_vane(&mut self, wide_vane: WideVane) {
        self.wanted.wide_vane = Some(wide_vane);
        self.dirty = true;
    }

    /// Apply every field that is set in `settings`
    pub fn set_settings(&mut self, settings: &HeatPumpSettings) {
        let mut wanted = self.wanted;
        wanted.merge(&HeatPumpSettings {
            temperature: settings
                .temperature
                .filter(|t| !t.is_nan())
                .map(normalize_temperature),
            ..*settings
        });
        self.wanted = wanted;
        self.dirty = true;
    }

    /// Push pending changes from `sync` without an explicit `update`
    pub fn enable_auto_update(&mut self) {
        self.auto_update = true;
    }

    /// Accept changes made at the unit (IR remote) instead of reverting them
    pub fn enable_external_update(&mut self) {
        self.external_update = true;
    }

    /// Send the wanted settings that differ from the current ones and wait
    /// for the unit to acknowledge them.
    pub async fn update(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let changes = self.wanted.changes_from(&self.current);
        if changes.is_empty() {
            self.dirty = false;
            return Ok(());
        }

        self.send(&protocol::set_request(&changes))?;
        if !self.wait_for(|p| matches!(p, Packet::SetAck)).await? {
            return Err(Error::Timeout);
        }

        self.dirty = false;
        let mut applied = self.current;
        applied.merge(&changes);
        self.apply_settings(applied);
        Ok(())
    }

    /// One poll step: read replies, push pending changes, request the next
    /// piece of state.
    pub async fn sync(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.receive()?;

        if self.clock.elapsed_since(self.last_recv_ms) > LINK_TIMEOUT_MS {
            self.connected = false;
            self.reader.reset();
            return Err(Error::LinkLost);
        }

        if self.auto_update && self.dirty {
            return self.update().await;
        }

        let due = match self.last_send_ms {
            Some(sent) => self.clock.elapsed_since(sent) >= INFO_REQUEST_INTERVAL_MS,
            None => true,
        };
        if due {
            let info = InfoType::CYCLE[self.info_index];
            self.info_index = (self.info_index + 1) % InfoType::CYCLE.len();
            self.send(&protocol::info_request(info))?;
        }

        Ok(())
    }

    pub fn poll_event(&mut self) -> Option<HeatPumpEvent> {
        self.events.pop_front()
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.serial.write_all(frame).map_err(Error::Serial)?;
        self.last_send_ms = Some(self.clock.now_ms());
        Ok(())
    }

    /// Feed everything already buffered through the parser
    fn receive(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.serial.read_available(&mut chunk).map_err(Error::Serial)?;
            if n == 0 {
                return Ok(());
            }
            for &byte in &chunk[..n] {
                if let Some(Ok(packet)) = self.reader.push(byte) {
                    self.handle(packet);
                }
            }
        }
    }

    /// Read until a packet matching `want` arrives or the response timeout
    /// expires. Other packets received meanwhile are handled normally.
    async fn wait_for(&mut self, want: fn(&Packet) -> bool) -> Result<bool> {
        let start = self.clock.now_ms();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = self.serial.read_available(&mut chunk).map_err(Error::Serial)?;
            let mut found = false;
            for &byte in &chunk[..n] {
                if let Some(Ok(packet)) = self.reader.push(byte) {
                    found |= want(&packet);
                    self.handle(packet);
                }
            }
            if found {
                return Ok(true);
            }
            if n == 0 {
                if self.clock.elapsed_since(start) >= RESPONSE_TIMEOUT_MS {
                    return Ok(false);
                }
                self.clock.delay_ms(RESPONSE_POLL_MS).await;
            }
        }
    }

    fn handle(&mut self, packet: Packet) {
        self.last_recv_ms = self.clock.now_ms();

        match packet {
            Packet::Settings(received) => self.on_settings(received),
            Packet::RoomTemperature(temperature) => {
                if self.status.room_temperature != Some(temperature) {
                    self.status.room_temperature = Some(temperature);
                    self.push_event(HeatPumpEvent::StatusChanged(self.status));
                    self.push_event(HeatPumpEvent::RoomTemperatureChanged(temperature));
                }
            }
            Packet::Timers(timers) => {
                if self.status.timers != timers {
                    self.status.timers = timers;
                    self.push_event(HeatPumpEvent::StatusChanged(self.status));
                }
            }
            Packet::Status {
                operating,
                compressor_frequency,
            } => {
                if self.status.operating != operating
                    || self.status.compressor_frequency != compressor_frequency
                {
                    self.status.operating = operating;
                    self.status.compressor_frequency = compressor_frequency;
                    self.push_event(HeatPumpEvent::StatusChanged(self.status));
                }
            }
            Packet::ConnectAck | Packet::SetAck | Packet::Other { .. } => {}
        }
    }

    fn on_settings(&mut self, received: HeatPumpSettings) {
        self.apply_settings(received);

        if self.dirty {
            // A local change is still waiting to be pushed
            return;
        }
        if self.external_update {
            self.wanted = received;
        } else if !self.wanted.changes_from(&self.current).is_empty() {
            self.dirty = true;
        }
    }

    fn apply_settings(&mut self, settings: HeatPumpSettings) {
        if settings != self.current {
            self.current = settings;
            self.push_event(HeatPumpEvent::SettingsChanged(settings));
        }
    }

    fn push_event(&mut self, event: HeatPumpEvent) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        let _ = self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, MockSerial};
    use crate::protocol::tests::response;
    use crate::protocol::{info_request, DataType, MAX_DATA_LEN};

    fn connect_ack() -> protocol::FrameBuf {
        response(DataType::ConnectResponse, &[0x00])
    }

    fn set_ack() -> protocol::FrameBuf {
        response(DataType::SetResponse, &[0x00])
    }

    fn settings_response(mode: Mode, half_degrees: u8) -> protocol::FrameBuf {
        let mut data = [0u8; MAX_DATA_LEN];
        data[0] = 0x02;
        data[3] = Power::On.byte();
        data[4] = mode.byte();
        data[6] = FanSpeed::Auto.byte();
        data[7] = Vane::Auto.byte();
        data[10] = WideVane::Center.byte();
        data[11] = half_degrees + 128;
        response(DataType::GetInfoResponse, &data)
    }

    async fn connected() -> (HeatPump<MockSerial, MockClock>, MockSerial, MockClock) {
        let serial = MockSerial::new();
        let clock = MockClock::new();
        let mut hp = HeatPump::new(serial.clone(), clock.clone());
        serial.reply_next(&connect_ack());
        hp.connect().await.unwrap();
        serial.clear_written();
        (hp, serial, clock)
    }

    fn apply_initial(hp: &mut HeatPump<MockSerial, MockClock>) {
        hp.set_power(Power::On);
        hp.set_mode(Mode::Heat);
        hp.set_temperature(22.0);
        hp.set_fan_speed(FanSpeed::Auto);
        hp.set_vane(Vane::Auto);
        hp.set_wide_vane(WideVane::Center);
    }

    fn drain(hp: &mut HeatPump<MockSerial, MockClock>) -> std::vec::Vec<HeatPumpEvent> {
        core::iter::from_fn(|| hp.poll_event()).collect()
    }

    #[tokio::test]
    async fn connect_sends_handshake() {
        let serial = MockSerial::new();
        let mut hp = HeatPump::new(serial.clone(), MockClock::new());
        serial.reply_next(&connect_ack());

        assert_eq!(hp.connect().await, Ok(()));
        assert!(hp.is_connected());
        assert_eq!(serial.written(), std::vec![protocol::connect_request().to_vec()]);
    }

    #[tokio::test]
    async fn reply_wait_lets_other_tasks_run() {
        let clock = MockClock::new();
        let mut hp = HeatPump::new(MockSerial::new(), clock.clone());
        let seen = core::cell::RefCell::new(std::vec::Vec::new());

        let other = async {
            for _ in 0..3 {
                seen.borrow_mut().push(clock.now_ms());
                tokio::task::yield_now().await;
            }
        };
        let (result, ()) = tokio::join!(hp.connect(), other);

        assert_eq!(result, Err(Error::Timeout));
        // Ran while the handshake was still waiting for its ack
        assert!(seen.borrow().iter().any(|&t| t < RESPONSE_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn connect_gives_up_after_retries() {
        let serial = MockSerial::new();
        let clock = MockClock::new();
        let mut hp = HeatPump::new(serial.clone(), clock.clone());

        assert_eq!(hp.connect().await, Err(Error::Timeout));
        assert!(!hp.is_connected());
        assert_eq!(serial.written().len(), CONNECT_ATTEMPTS as usize);
        assert!(clock.now_ms() >= RESPONSE_TIMEOUT_MS * CONNECT_ATTEMPTS as u64);
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let serial = MockSerial::new();
        serial.fail_writes(true);
        let mut hp = HeatPump::new(serial, MockClock::new());

        assert_eq!(hp.connect().await, Err(Error::Serial("mock write failure")));
    }

    #[tokio::test]
    async fn update_requires_connection() {
        let mut hp = HeatPump::new(MockSerial::new(), MockClock::new());
        hp.set_power(Power::On);
        assert_eq!(hp.update().await, Err(Error::NotConnected));
        assert_eq!(hp.sync().await, Err(Error::NotConnected));
    }

    #[tokio::test]
    async fn update_pushes_changes_and_reports_them() {
        let (mut hp, serial, _clock) = connected().await;
        apply_initial(&mut hp);
        serial.reply_next(&set_ack());

        assert_eq!(hp.update().await, Ok(()));

        let written = serial.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0][1], DataType::SetRequest as u8);
        assert_eq!(hp.settings().mode, Some(Mode::Heat));
        assert_eq!(hp.settings().temperature, Some(22.0));
        assert!(matches!(
            drain(&mut hp).as_slice(),
            [HeatPumpEvent::SettingsChanged(s)] if s.wide_vane == Some(WideVane::Center)
        ));

        // Nothing left to send
        serial.clear_written();
        assert_eq!(hp.update().await, Ok(()));
        assert!(serial.written().is_empty());
    }

    #[tokio::test]
    async fn update_without_ack_times_out() {
        let (mut hp, serial, _clock) = connected().await;
        hp.set_mode(Mode::Cool);
        serial.silence_next();

        assert_eq!(hp.update().await, Err(Error::Timeout));
        assert_eq!(hp.settings().mode, None);
    }

    #[tokio::test]
    async fn sync_cycles_through_info_requests() {
        let (mut hp, serial, clock) = connected().await;

        for _ in 0..5 {
            clock.advance(1_000);
            hp.sync().await.unwrap();
        }

        assert_eq!(
            serial.written(),
            std::vec![
                info_request(InfoType::Settings).to_vec(),
                info_request(InfoType::RoomTemperature).to_vec(),
                info_request(InfoType::Timers).to_vec(),
                info_request(InfoType::Status).to_vec(),
                info_request(InfoType::Settings).to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn sync_reports_room_temperature_once() {
        let (mut hp, serial, clock) = connected().await;
        let mut data = [0u8; MAX_DATA_LEN];
        data[0] = 0x03;
        data[6] = 43 + 128;

        serial.feed(&response(DataType::GetInfoResponse, &data));
        clock.advance(1_000);
        hp.sync().await.unwrap();

        let events = drain(&mut hp);
        assert!(matches!(events[0], HeatPumpEvent::StatusChanged(s) if s.room_temperature == Some(21.5)));
        assert_eq!(events[1], HeatPumpEvent::RoomTemperatureChanged(21.5));

        serial.feed(&response(DataType::GetInfoResponse, &data));
        clock.advance(1_000);
        hp.sync().await.unwrap();
        assert!(drain(&mut hp).is_empty());
    }

    #[tokio::test]
    async fn remote_change_is_reverted_without_external_update() {
        let (mut hp, serial, clock) = connected().await;
        hp.enable_auto_update();
        apply_initial(&mut hp);
        serial.reply_next(&set_ack());
        hp.update().await.unwrap();
        drain(&mut hp);
        serial.clear_written();

        // Someone switched the unit to cooling with the remote
        serial.feed(&settings_response(Mode::Cool, 44));
        serial.reply_next(&set_ack());
        clock.advance(1_000);
        hp.sync().await.unwrap();

        let written = serial.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0][1], DataType::SetRequest as u8);
        assert_eq!(written[0][5 + 1], 0x02);
        assert_eq!(written[0][5 + 4], Mode::Heat.byte());
        assert_eq!(hp.settings().mode, Some(Mode::Heat));
    }

    #[tokio::test]
    async fn remote_change_is_adopted_with_external_update() {
        let (mut hp, serial, clock) = connected().await;
        hp.enable_auto_update();
        hp.enable_external_update();
        apply_initial(&mut hp);
        serial.reply_next(&set_ack());
        hp.update().await.unwrap();
        drain(&mut hp);
        serial.clear_written();

        serial.feed(&settings_response(Mode::Cool, 44));
        clock.advance(1_000);
        hp.sync().await.unwrap();

        assert_eq!(hp.settings().mode, Some(Mode::Cool));
        assert_eq!(hp.wanted_settings().mode, Some(Mode::Cool));
        assert!(matches!(
            drain(&mut hp).as_slice(),
            [HeatPumpEvent::SettingsChanged(s)] if s.mode == Some(Mode::Cool)
        ));
        // Only the regular info request went out
        assert_eq!(serial.written(), std::vec![info_request(InfoType::Settings).to_vec()]);
    }

    #[tokio::test]
    async fn full_event_queue_drops_oldest() {
        let (mut hp, serial, clock) = connected().await;
        // Five readings queue ten events
        for half_degrees in 40..45u8 {
            let mut data = [0u8; MAX_DATA_LEN];
            data[0] = 0x03;
            data[6] = half_degrees + 128;
            serial.feed(&response(DataType::GetInfoResponse, &data));
        }
        clock.advance(1_000);
        hp.sync().await.unwrap();

        let events = drain(&mut hp);
        assert_eq!(events.len(), EVENT_QUEUE_LEN);
        assert!(matches!(events[0], HeatPumpEvent::StatusChanged(s) if s.room_temperature == Some(20.5)));
        assert_eq!(events[EVENT_QUEUE_LEN - 1], HeatPumpEvent::RoomTemperatureChanged(22.0));
    }

    #[tokio::test]
    async fn nan_set_point_is_ignored() {
        let (mut hp, serial, _clock) = connected().await;
        hp.set_temperature(f32::NAN);
        assert_eq!(hp.wanted_settings().temperature, None);
        assert_eq!(hp.update().await, Ok(()));
        assert!(serial.written().is_empty());

        hp.set_temperature(21.0);
        hp.set_settings(&HeatPumpSettings {
            temperature: Some(f32::NAN),
            ..Default::default()
        });
        assert_eq!(hp.wanted_settings().temperature, Some(21.0));

        serial.reply_next(&set_ack());
        assert_eq!(hp.update().await, Ok(()));
        assert_eq!(hp.settings().temperature, Some(21.0));
    }

    #[tokio::test]
    async fn silence_drops_the_link() {
        let (mut hp, _serial, clock) = connected().await;
        clock.advance(LINK_TIMEOUT_MS + 1);

        assert_eq!(hp.sync().await, Err(Error::LinkLost));
        assert!(!hp.is_connected());
    }
}
