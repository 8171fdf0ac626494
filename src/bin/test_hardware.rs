#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use mitsu_bridge::{
    bridge::MatterBridge,
    config::{self, SerialConfig},
    hardware::{EmbassyClock, HeatPumpSerial},
    heatpump::{HeatPump, HeatPumpEvent},
    model::{Mode, WideVane},
    protocol::{self, InfoType},
    report,
    traits::{Clock, Console},
    wifi::{WifiAction, WifiSupervisor},
};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

/// Counts lines and remembers the last one
struct LineCounter {
    lines: u32,
    last: heapless::String<96>,
}

impl Console for LineCounter {
    fn print_line(&mut self, line: &str) {
        self.lines += 1;
        self.last.clear();
        let _ = self.last.push_str(line);
    }
}

fn test_protocol(results: &mut TestResults) {
    esp_println::println!("\n[TEST] CN105 framing");

    results.assert_eq(
        &protocol::connect_request()[..],
        &[0xfc, 0x5a, 0x01, 0x30, 0x02, 0xca, 0x01, 0xa8][..],
        "connect request bytes",
    );

    let request = protocol::info_request(InfoType::Settings);
    results.assert_eq(request.len(), protocol::MAX_FRAME_LEN, "info request length");
    results.assert_eq(request[request.len() - 1], 0x7b, "info request checksum");

    let mut reader = protocol::PacketReader::new();
    let mut decoded = None;
    for &byte in &[0x00, 0xfc, 0x7a, 0x01, 0x30, 0x01, 0x00, 0x54] {
        if let Some(result) = reader.push(byte) {
            decoded = Some(result);
        }
    }
    results.assert_eq(
        decoded,
        Some(Ok(protocol::Packet::ConnectAck)),
        "connect ack parsed after junk",
    );
}

fn test_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Logic");

    let mut console = LineCounter {
        lines: 0,
        last: heapless::String::new(),
    };
    report::print_settings(&mut console, &config::initial_settings());
    results.assert_eq(console.lines, 8, "settings block has 8 lines");
    results.assert_eq(
        console.last.as_str(),
        "  iSee sensor detected: no",
        "settings block ends with iSee",
    );

    let initial = config::initial_settings();
    results.assert_eq(initial.mode, Some(Mode::Heat), "initial mode is HEAT");
    results.assert_eq(initial.wide_vane, Some(WideVane::Center), "initial wide vane is |");

    let mut wifi = WifiSupervisor::new(None, config::WIFI_RETRY_INTERVAL_MS);
    results.assert_eq(wifi.poll(0, false), WifiAction::Idle, "Wi-Fi idle without SSID");

    let mut bridge = MatterBridge::new("Test", 1_000);
    bridge.begin(&mut console, 0);
    results.assert(!bridge.poll(&mut console, 500, false), "no early heartbeat");
    results.assert(bridge.poll(&mut console, 1_000, false), "heartbeat after interval");
}

async fn test_heat_pump_link(
    results: &mut TestResults,
    uart1: esp_hal::peripherals::UART1<'static>,
    rx: esp_hal::peripherals::GPIO4<'static>,
    tx: esp_hal::peripherals::GPIO5<'static>,
) {
    esp_println::println!("\n[TEST] Heat pump link (unit must be attached)");

    let serial = match HeatPumpSerial::new(uart1, rx, tx, &SerialConfig::default()) {
        Ok(serial) => serial,
        Err(e) => {
            esp_println::println!("  Failed to open UART: {}", e);
            results.assert(false, "open UART");
            return;
        }
    };
    results.assert(true, "open UART");

    let mut heat_pump = HeatPump::new(serial, EmbassyClock::new());
    match heat_pump.connect().await {
        Ok(()) => results.assert(true, "CN105 handshake"),
        Err(e) => {
            esp_println::println!("    Handshake failed: {}", e);
            results.assert(false, "CN105 handshake");
            return;
        }
    }

    // Poll long enough for one full info request cycle
    let mut clock = EmbassyClock::new();
    let mut settings_seen = false;
    for _ in 0..8 {
        if let Err(e) = heat_pump.sync().await {
            esp_println::println!("    Sync failed: {}", e);
        }
        while let Some(event) = heat_pump.poll_event() {
            if let HeatPumpEvent::SettingsChanged(settings) = event {
                esp_println::println!("    Mode reported: {:?}", settings.mode);
                settings_seen = true;
            }
        }
        clock.delay_ms(config::LOOP_INTERVAL_MS as u32).await;
    }
    results.assert(settings_seen, "settings reported by unit");
    results.assert(clock.now_ms() > 0, "clock advancing");
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_protocol(&mut results);
    test_logic(&mut results);

    // Extract the peripherals we need before initializing RTOS timer
    let uart1 = peripherals.UART1;
    let gpio4 = peripherals.GPIO4;
    let gpio5 = peripherals.GPIO5;

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Run hardware tests
    test_heat_pump_link(&mut results, uart1, gpio4, gpio5).await;

    // Print summary
    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        if results.failed == 0 {
            Timer::after(Duration::from_millis(200)).await;
        } else {
            Timer::after(Duration::from_millis(1000)).await;
        }
    }
}
