use embassy_time::{Duration, Instant, Timer};
use esp_hal::{
    gpio::AnyPin,
    peripherals::UART1,
    uart::{Config as UartConfig, DataBits, Parity, StopBits, Uart},
};

use crate::config::SerialConfig;
use crate::traits::{Clock, Console, SerialPort};

/// UART wired to the CN105 connector
pub struct HeatPumpSerial<'a> {
    uart: Uart<'a, esp_hal::Blocking>,
}

impl<'a> HeatPumpSerial<'a> {
    pub fn new<RX, TX>(
        uart_periph: UART1<'a>,
        rx: RX,
        tx: TX,
        config: &SerialConfig,
    ) -> Result<Self, &'static str>
    where
        RX: Into<AnyPin<'a>>,
        TX: Into<AnyPin<'a>>,
    {
        let uart_cfg = UartConfig::default()
            .with_baudrate(config.baud_rate)
            .with_data_bits(DataBits::_8)
            .with_parity(Parity::Even)
            .with_stop_bits(StopBits::_1);

        let uart = Uart::new(uart_periph, uart_cfg)
            .map_err(|_| "Failed to configure heat pump UART")?
            .with_rx(rx.into())
            .with_tx(tx.into());

        esp_println::println!(
            "[UART] Heat pump link on RX GPIO{} / TX GPIO{} at {} baud 8E1",
            config.rx_pin,
            config.tx_pin,
            config.baud_rate
        );

        Ok(Self { uart })
    }
}

impl SerialPort for HeatPumpSerial<'_> {
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), &'static str> {
        while !bytes.is_empty() {
            let written = self.uart.write(bytes).map_err(|_| "UART write failed")?;
            bytes = &bytes[written..];
        }
        self.uart.flush().map_err(|_| "UART flush failed")
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        if buf.is_empty() || !self.uart.read_ready() {
            return Ok(0);
        }
        self.uart.read(buf).map_err(|_| "UART read failed")
    }
}

/// embassy-time for timestamps and delays
#[derive(Default)]
pub struct EmbassyClock;

impl EmbassyClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: u32) {
        Timer::after(Duration::from_millis(ms.into())).await;
    }
}

/// Log output over esp-println
pub struct SerialConsole;

impl Console for SerialConsole {
    fn print_line(&mut self, line: &str) {
        esp_println::println!("{}", line);
    }
}
