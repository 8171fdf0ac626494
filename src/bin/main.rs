#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use mitsu_bridge::{
    config::{self, SerialConfig},
    hardware::{EmbassyClock, HeatPumpSerial, SerialConsole},
    heatpump::HeatPump,
    logic::Controller,
};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!();
    esp_println::println!("ESP32 Mitsubishi Heat Pump controller demo");

    // GPIO4/GPIO5 match config::HEATPUMP_SERIAL_RX_PIN / HEATPUMP_SERIAL_TX_PIN
    let serial_config = SerialConfig::default();
    let serial = match HeatPumpSerial::new(
        peripherals.UART1,
        peripherals.GPIO4,
        peripherals.GPIO5,
        &serial_config,
    ) {
        Ok(serial) => serial,
        Err(e) => {
            esp_println::println!("[ERROR] {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let mut console = SerialConsole;
    let heat_pump = HeatPump::new(serial, EmbassyClock::new());
    let mut controller = Controller::new(heat_pump, serial_config);

    controller.connect(&mut console).await;

    loop {
        Timer::after(Duration::from_millis(config::LOOP_INTERVAL_MS)).await;
        controller.tick(&mut console).await;
    }
}
