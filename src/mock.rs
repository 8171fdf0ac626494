//! Host-side doubles for the hardware traits.
//!
//! Each mock is a cheap handle over shared state so a test can keep one copy
//! while the code under test owns another.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::traits::{Clock, Console, SerialPort};

#[derive(Default)]
struct SerialState {
    rx: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
}

/// Serial port fed from a byte queue.
///
/// `reply_next` scripts bytes that become readable after the next write,
/// which is how the unit answers a request.
#[derive(Clone, Default)]
pub struct MockSerial {
    state: Rc<RefCell<SerialState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bytes readable immediately
    pub fn feed(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Queue the answer to the next write
    pub fn reply_next(&self, bytes: &[u8]) {
        self.state.borrow_mut().replies.push_back(bytes.to_vec());
    }

    /// Answer the next write with nothing
    pub fn silence_next(&self) {
        self.state.borrow_mut().replies.push_back(Vec::new());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.borrow().written.clone()
    }

    pub fn clear_written(&self) {
        self.state.borrow_mut().written.clear();
    }
}

impl SerialPort for MockSerial {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), &'static str> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err("mock write failure");
        }
        state.written.push(bytes.to_vec());
        if let Some(reply) = state.replies.pop_front() {
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        let mut state = self.state.borrow_mut();
        let mut count = 0;
        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

/// Clock that only moves when told to, or when something sleeps on it.
/// Sleeping also yields to the runtime like a real timer would.
#[derive(Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64);
        tokio::task::yield_now().await;
    }
}

/// Console that keeps every printed line
#[derive(Default)]
pub struct RecordingConsole {
    pub lines: Vec<String>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    pub fn take(&mut self) -> Vec<String> {
        core::mem::take(&mut self.lines)
    }
}

impl Console for RecordingConsole {
    fn print_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
