//! Wi-Fi station bookkeeping.
//!
//! Association itself is done by the radio driver; this only decides when to
//! (re)try and notices link transitions so they can be logged.

use crate::config::WifiCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// No credentials configured
    Disabled,
    Disconnected,
    Connecting,
    Connected,
}

/// What the caller should do after [`WifiSupervisor::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiAction {
    Idle,
    /// Start an association attempt now
    Connect,
    LinkUp,
    LinkDown,
}

pub struct WifiSupervisor {
    credentials: Option<WifiCredentials>,
    state: WifiState,
    retry_interval_ms: u64,
    last_attempt_ms: Option<u64>,
    attempts: u32,
    address: Option<[u8; 4]>,
}

impl WifiSupervisor {
    pub fn new(credentials: Option<WifiCredentials>, retry_interval_ms: u64) -> Self {
        let state = if credentials.is_some() {
            WifiState::Disconnected
        } else {
            WifiState::Disabled
        };
        Self {
            credentials,
            state,
            retry_interval_ms,
            last_attempt_ms: None,
            attempts: 0,
            address: None,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != WifiState::Disabled
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    pub fn credentials(&self) -> Option<&WifiCredentials> {
        self.credentials.as_ref()
    }

    /// Number of association attempts since the link was last up
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn address(&self) -> Option<[u8; 4]> {
        self.address
    }

    /// Record the address obtained over DHCP
    pub fn set_address(&mut self, address: [u8; 4]) {
        self.address = Some(address);
    }

    /// Associated and holding a DHCP address
    pub fn network_up(&self) -> bool {
        self.is_connected() && self.address.is_some()
    }

    /// Feed the current link status, get the next step.
    pub fn poll(&mut self, now_ms: u64, link_up: bool) -> WifiAction {
        match self.state {
            WifiState::Disabled => WifiAction::Idle,
            WifiState::Connected if link_up => WifiAction::Idle,
            WifiState::Connected => {
                self.state = WifiState::Disconnected;
                self.address = None;
                WifiAction::LinkDown
            }
            WifiState::Disconnected | WifiState::Connecting if link_up => {
                self.state = WifiState::Connected;
                self.attempts = 0;
                WifiAction::LinkUp
            }
            WifiState::Disconnected | WifiState::Connecting => {
                let due = match self.last_attempt_ms {
                    Some(last) => now_ms.saturating_sub(last) >= self.retry_interval_ms,
                    None => true,
                };
                if due {
                    self.state = WifiState::Connecting;
                    self.last_attempt_ms = Some(now_ms);
                    self.attempts += 1;
                    WifiAction::Connect
                } else {
                    WifiAction::Idle
                }
            }
        }
    }

    /// The driver reported that an attempt failed
    pub fn attempt_failed(&mut self) {
        if self.state == WifiState::Connecting {
            self.state = WifiState::Disconnected;
        }
    }
}
