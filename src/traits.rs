//! Hardware abstraction traits

/// Byte-oriented serial link to the heat pump (CN105, 2400 8E1)
pub trait SerialPort {
    /// Write every byte, blocking until the transmit FIFO accepted them
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), &'static str>;

    /// Read whatever is already buffered without blocking.
    ///
    /// Returns the number of bytes copied into `buf` (possibly zero).
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, &'static str>;
}

/// Monotonic time source
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Sleep for the given number of milliseconds, letting other tasks run
    async fn delay_ms(&mut self, ms: u32);

    fn elapsed_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

/// Line-oriented log output
pub trait Console {
    fn print_line(&mut self, line: &str);
}
