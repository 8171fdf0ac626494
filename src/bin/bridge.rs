#![no_std]
#![no_main]

use core::cell::Cell;
use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_net::{Runner, Stack, StackResources};
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use esp_backtrace as _;
use esp_hal::{delay::Delay, peripherals::WIFI, rng::Rng, timer::timg::TimerGroup};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use static_cell::StaticCell;

use mitsu_bridge::{
    bridge::MatterBridge,
    config::{self, SerialConfig, WifiCredentials},
    hardware::{EmbassyClock, HeatPumpSerial, SerialConsole},
    heatpump::HeatPump,
    logic::Controller,
    wifi::{WifiAction, WifiSupervisor},
};

const HEAP_SIZE: usize = 72 * 1024;

static NETWORK_UP: Mutex<CriticalSectionRawMutex, Cell<bool>> = Mutex::new(Cell::new(false));
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

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

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

async fn try_connect(
    controller: &mut WifiController<'static>,
    credentials: &WifiCredentials,
) -> Result<(), &'static str> {
    if !matches!(controller.is_started(), Ok(true)) {
        let client = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(credentials.ssid.into())
                .with_password(credentials.password.into()),
        );
        controller
            .set_config(&client)
            .map_err(|_| "invalid station configuration")?;
        controller
            .start_async()
            .await
            .map_err(|_| "failed to start the radio")?;
    }

    match with_timeout(
        Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS),
        controller.connect_async(),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err("association rejected"),
        Err(_) => Err("association timed out"),
    }
}

#[embassy_executor::task]
async fn wifi_task(
    mut controller: WifiController<'static>,
    stack: Stack<'static>,
    credentials: WifiCredentials,
) {
    let mut supervisor = WifiSupervisor::new(Some(credentials), config::WIFI_RETRY_INTERVAL_MS);

    loop {
        let link_up = matches!(controller.is_connected(), Ok(true));

        match supervisor.poll(Instant::now().as_millis(), link_up) {
            WifiAction::Connect => {
                esp_println::println!(
                    "[WIFI] Connecting to \"{}\" (attempt {}) ...",
                    credentials.ssid,
                    supervisor.attempts()
                );
                if let Err(e) = try_connect(&mut controller, &credentials).await {
                    esp_println::println!(
                        "[WIFI] Connection failed: {}, retrying in {} s",
                        e,
                        config::WIFI_RETRY_INTERVAL_MS / 1_000
                    );
                    supervisor.attempt_failed();
                }
            }
            WifiAction::LinkUp => {
                esp_println::println!("[WIFI] Connected to \"{}\"", credentials.ssid);
                let lease = with_timeout(
                    Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS),
                    stack.wait_config_up(),
                )
                .await;
                match (lease, stack.config_v4()) {
                    (Ok(()), Some(cfg)) => {
                        let address = cfg.address.address();
                        supervisor.set_address(address.octets());
                        esp_println::println!("[WIFI] IP address: {}", address);
                    }
                    _ => esp_println::println!("[WIFI] No DHCP lease yet"),
                }
            }
            WifiAction::Idle if supervisor.is_connected() => {
                // Lease may arrive after the link came up
                if let (None, Some(cfg)) = (supervisor.address(), stack.config_v4()) {
                    let address = cfg.address.address();
                    supervisor.set_address(address.octets());
                    esp_println::println!("[WIFI] IP address: {}", address);
                }
            }
            WifiAction::LinkDown => {
                esp_println::println!(
                    "[WIFI] Connection lost, retrying every {} s",
                    config::WIFI_RETRY_INTERVAL_MS / 1_000
                );
            }
            WifiAction::Idle => {}
        }
        NETWORK_UP.lock(|up| up.set(supervisor.network_up()));

        Timer::after(Duration::from_millis(config::LOOP_INTERVAL_MS)).await;
    }
}

fn start_network(
    spawner: &Spawner,
    wifi: WIFI<'static>,
    credentials: WifiCredentials,
) -> Result<(), &'static str> {
    let radio = RADIO.init(esp_radio::init().map_err(|_| "radio init failed")?);
    let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|_| "Wi-Fi init failed")?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner
        .spawn(net_task(runner))
        .map_err(|_| "failed to spawn net task")?;
    spawner
        .spawn(wifi_task(controller, stack, credentials))
        .map_err(|_| "failed to spawn Wi-Fi task")?;
    Ok(())
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!();
    esp_println::println!("ESP32 Mitsubishi Heat Pump bridge demo");

    match WifiCredentials::from_build_env() {
        Some(credentials) => {
            if let Err(e) = start_network(&spawner, peripherals.WIFI, credentials) {
                esp_println::println!("[ERROR] {}", e);
            }
        }
        None => esp_println::println!("[WIFI] No SSID configured, running without network"),
    }

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
    let mut bridge = MatterBridge::new(
        config::BRIDGE_DEVICE_NAME,
        config::BRIDGE_HEARTBEAT_INTERVAL_MS,
    );

    controller.connect(&mut console).await;
    bridge.begin(&mut console, Instant::now().as_millis());

    loop {
        Timer::after(Duration::from_millis(config::LOOP_INTERVAL_MS)).await;
        controller.tick(&mut console).await;

        let network_up = NETWORK_UP.lock(|up| up.get());
        bridge.poll(&mut console, Instant::now().as_millis(), network_up);
    }
}
