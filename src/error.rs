//! Error types shared by the heat pump driver and the controller.

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The serial peripheral reported a failure
    Serial(&'static str),
    /// No matching reply arrived before the deadline
    Timeout,
    /// An operation that needs a connected unit was called while offline
    NotConnected,
    /// Nothing was received from the unit for too long
    LinkLost,
    /// Checksum byte did not match the frame contents
    Checksum,
    /// Header bytes or length were not valid CN105
    Frame,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Serial(msg) => write!(f, "serial error: {}", msg),
            Error::Timeout => f.write_str("timed out waiting for the heat pump"),
            Error::NotConnected => f.write_str("heat pump not connected"),
            Error::LinkLost => f.write_str("heat pump stopped responding"),
            Error::Checksum => f.write_str("bad frame checksum"),
            Error::Frame => f.write_str("malformed frame"),
        }
    }
}
