//! CN105 framing
//!
//! Every frame on the wire looks like
//!
//! ```text
//! 0xfc TYPE 0x01 0x30 LEN DATA[LEN] CHECKSUM
//! ```
//!
//! with `CHECKSUM = 0xfc - SUM(all preceding bytes) & 0xff`. Requests from the
//! controller carry 16 data bytes, except the 2-byte connect request.

use heapless::Vec;
use nom::bytes::complete::take;
use nom::bytes::streaming as wire_bytes;
use nom::combinator::{map, verify};
use nom::number::complete::be_u8;
use nom::number::streaming as wire_number;
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, Result};
use crate::model::{
    normalize_temperature, FanSpeed, HeatPumpSettings, HeatPumpTimers, Mode, Power, TimerMode,
    Vane, WideVane,
};

const FRAME_START: u8 = 0xfc;
const FRAME_B3: u8 = 0x01;
const FRAME_B4: u8 = 0x30;
const HEADER_LEN: usize = 5;

pub const MAX_DATA_LEN: usize = 16;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_LEN + 1;

pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataType {
    SetRequest = 0x41,
    GetInfoRequest = 0x42,
    ConnectRequest = 0x5a,

    SetResponse = 0x61,
    GetInfoResponse = 0x62,
    ConnectResponse = 0x7a,

    Unknown = 0xff,
}

impl From<u8> for DataType {
    fn from(byte: u8) -> Self {
        match byte {
            0x41 => DataType::SetRequest,
            0x42 => DataType::GetInfoRequest,
            0x5a => DataType::ConnectRequest,

            0x61 => DataType::SetResponse,
            0x62 => DataType::GetInfoResponse,
            0x7a => DataType::ConnectResponse,

            _ => DataType::Unknown,
        }
    }
}

/// First data byte of an info request / response
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InfoType {
    Settings = 0x02,
    RoomTemperature = 0x03,
    Timers = 0x05,
    Status = 0x06,
}

impl InfoType {
    /// Order in which `sync` polls the unit
    pub const CYCLE: [InfoType; 4] = [
        InfoType::Settings,
        InfoType::RoomTemperature,
        InfoType::Timers,
        InfoType::Status,
    ];
}

// Set request flag bits, data[1]
const SET_POWER: u8 = 0x01;
const SET_MODE: u8 = 0x02;
const SET_TEMPERATURE: u8 = 0x04;
const SET_FAN: u8 = 0x08;
const SET_VANE: u8 = 0x10;
// data[2]
const SET_WIDE_VANE: u8 = 0x01;

const MODE_I_SEE: u8 = 0x08;
const HALF_DEGREE_OFFSET: u8 = 128;

/// A decoded frame received from the unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    ConnectAck,
    SetAck,
    Settings(HeatPumpSettings),
    RoomTemperature(f32),
    Timers(HeatPumpTimers),
    Status {
        operating: bool,
        compressor_frequency: u8,
    },
    /// Valid frame we have no use for
    Other { data_type: u8, code: u8 },
}

pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    FRAME_START.wrapping_sub(sum)
}

fn encode_frame(data_type: DataType, data: &[u8]) -> FrameBuf {
    let mut frame = FrameBuf::new();
    // Callers never pass more than MAX_DATA_LEN bytes, so the frame always fits
    let _ = frame.extend_from_slice(&[
        FRAME_START,
        data_type as u8,
        FRAME_B3,
        FRAME_B4,
        data.len() as u8,
    ]);
    let _ = frame.extend_from_slice(&data[..data.len().min(MAX_DATA_LEN)]);
    let _ = frame.push(checksum(&frame));
    frame
}

pub fn connect_request() -> FrameBuf {
    encode_frame(DataType::ConnectRequest, &[0xca, 0x01])
}

pub fn info_request(info: InfoType) -> FrameBuf {
    let mut data = [0u8; MAX_DATA_LEN];
    data[0] = info as u8;
    encode_frame(DataType::GetInfoRequest, &data)
}

// 16 bytes:
//
//  0   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15
// ID  F0  F1  PW  MO  TM  FA  VA  xx  xx  xx  xx  xx  WV  T2  xx
//
// TM is the legacy set-point index (31 - °C), T2 is half degrees + 128.
pub fn set_request(changes: &HeatPumpSettings) -> FrameBuf {
    let mut data = [0u8; MAX_DATA_LEN];
    data[0] = 0x01;

    if let Some(power) = changes.power {
        data[1] |= SET_POWER;
        data[3] = power.byte();
    }
    if let Some(mode) = changes.mode {
        data[1] |= SET_MODE;
        data[4] = mode.byte();
    }
    if let Some(temperature) = changes.temperature {
        let temperature = normalize_temperature(temperature);
        let whole = (temperature as u8).clamp(16, 31);
        data[1] |= SET_TEMPERATURE;
        data[5] = 31 - whole;
        data[14] = (temperature * 2.0) as u8 + HALF_DEGREE_OFFSET;
    }
    if let Some(fan) = changes.fan {
        data[1] |= SET_FAN;
        data[6] = fan.byte();
    }
    if let Some(vane) = changes.vane {
        data[1] |= SET_VANE;
        data[7] = vane.byte();
    }
    if let Some(wide_vane) = changes.wide_vane {
        data[2] |= SET_WIDE_VANE;
        data[13] = wide_vane.byte();
    }

    encode_frame(DataType::SetRequest, &data)
}

fn half_degrees(byte: u8) -> f32 {
    (byte as f32 - HALF_DEGREE_OFFSET as f32) / 2.0
}

/// Skip the code byte and the two reserved bytes at the start of an info
/// response body
fn preamble(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take(3usize)(input)
}

//  0   1   2   3   4   5   6   7   8   9  10  11
// 02  xx  xx  PW  MO  TM  FA  VA  xx  xx  WV  T2
fn settings(input: &[u8]) -> IResult<&[u8], HeatPumpSettings> {
    let (input, _) = preamble(input)?;
    let (input, (power, raw_mode, legacy, fan, vane)) =
        tuple((be_u8, be_u8, be_u8, be_u8, be_u8))(input)?;
    let (input, _) = take(2usize)(input)?;
    let (input, (wide_vane, half)) = tuple((be_u8, be_u8))(input)?;

    let i_see = raw_mode > MODE_I_SEE;
    let mode = if i_see { raw_mode - MODE_I_SEE } else { raw_mode };
    let temperature = if half != 0 {
        Some(half_degrees(half))
    } else if legacy <= 0x0f {
        Some(31.0 - legacy as f32)
    } else {
        None
    };

    Ok((
        input,
        HeatPumpSettings {
            power: Power::from_byte(power),
            mode: Mode::from_byte(mode),
            temperature,
            fan: FanSpeed::from_byte(fan),
            vane: Vane::from_byte(vane),
            wide_vane: WideVane::from_byte(wide_vane & 0x0f),
            i_see,
        },
    ))
}

fn room_temperature(input: &[u8]) -> IResult<&[u8], f32> {
    let (input, _) = preamble(input)?;
    let (input, whole) = be_u8(input)?;
    let (input, _) = take(2usize)(input)?;
    let (input, half) = be_u8(input)?;

    let celsius = if half != 0 {
        half_degrees(half)
    } else {
        whole as f32 + 10.0
    };
    Ok((input, celsius))
}

fn timers(input: &[u8]) -> IResult<&[u8], HeatPumpTimers> {
    let (input, _) = preamble(input)?;
    let (input, (mode, on_set, off_set, on_left, off_left)) =
        tuple((be_u8, be_u8, be_u8, be_u8, be_u8))(input)?;

    // Durations are reported in units of ten minutes
    Ok((
        input,
        HeatPumpTimers {
            mode: TimerMode::from_byte(mode),
            on_minutes_set: u16::from(on_set) * 10,
            off_minutes_set: u16::from(off_set) * 10,
            on_minutes_remaining: u16::from(on_left) * 10,
            off_minutes_remaining: u16::from(off_left) * 10,
        },
    ))
}

fn status(input: &[u8]) -> IResult<&[u8], Packet> {
    let (input, _) = preamble(input)?;
    let (input, (compressor_frequency, operating)) =
        tuple((be_u8, map(be_u8, |b: u8| b != 0)))(input)?;
    Ok((
        input,
        Packet::Status {
            operating,
            compressor_frequency,
        },
    ))
}

fn info_response(input: &[u8]) -> IResult<&[u8], Packet> {
    let (rest, body) = take(MAX_DATA_LEN)(input)?;
    let (_, code) = be_u8(body)?;

    let (_, packet) = match code {
        0x02 => map(settings, Packet::Settings)(body)?,
        0x03 => map(room_temperature, Packet::RoomTemperature)(body)?,
        0x05 => map(timers, Packet::Timers)(body)?,
        0x06 => status(body)?,
        code => (
            body,
            Packet::Other {
                data_type: DataType::GetInfoResponse as u8,
                code,
            },
        ),
    };
    Ok((rest, packet))
}

/// Decode the data section of a checksummed frame.
pub fn decode(data_type: DataType, data: &[u8]) -> Result<Packet> {
    match data_type {
        DataType::ConnectResponse => Ok(Packet::ConnectAck),
        DataType::SetResponse => Ok(Packet::SetAck),
        DataType::GetInfoResponse => info_response(data)
            .map(|(_, packet)| packet)
            .map_err(|_| Error::Frame),
        other => Ok(Packet::Other {
            data_type: other as u8,
            code: data.first().copied().unwrap_or(0),
        }),
    }
}

/// A complete frame as it came off the wire, checksum not yet verified
#[derive(Debug)]
struct RawFrame<'a> {
    data_type: u8,
    data: &'a [u8],
    checksum: u8,
}

impl RawFrame<'_> {
    fn expected_checksum(&self) -> u8 {
        let header = [
            FRAME_START,
            self.data_type,
            FRAME_B3,
            FRAME_B4,
            self.data.len() as u8,
        ];
        let sum = header
            .iter()
            .chain(self.data)
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        FRAME_START.wrapping_sub(sum)
    }

    fn into_packet(self) -> Result<Packet> {
        if self.checksum != self.expected_checksum() {
            return Err(Error::Checksum);
        }
        decode(DataType::from(self.data_type), self.data)
    }
}

/// Streaming frame parser. `Incomplete` means the frame is not finished yet.
fn frame(input: &[u8]) -> IResult<&[u8], RawFrame<'_>> {
    let (input, _) = wire_bytes::tag(&[FRAME_START][..])(input)?;
    let (input, data_type) = wire_number::be_u8(input)?;
    let (input, _) = wire_bytes::tag(&[FRAME_B3, FRAME_B4][..])(input)?;
    let (input, data_len) = verify(wire_number::be_u8, |len: &u8| {
        usize::from(*len) <= MAX_DATA_LEN
    })(input)?;
    let (input, data) = wire_bytes::take(data_len)(input)?;
    let (input, checksum) = wire_number::be_u8(input)?;

    Ok((
        input,
        RawFrame {
            data_type,
            data,
            checksum,
        },
    ))
}

/// Streaming frame parser fed one byte at a time from the UART.
///
/// Bytes before a frame start marker are discarded. A malformed frame is
/// reported once and the parser resynchronises on the next marker.
#[derive(Debug, Default)]
pub struct PacketReader {
    buf: FrameBuf,
}

impl PacketReader {
    pub fn new() -> Self {
        Self { buf: FrameBuf::new() }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn push(&mut self, byte: u8) -> Option<Result<Packet>> {
        if self.buf.is_empty() && byte != FRAME_START {
            return None;
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return Some(Err(Error::Frame));
        }

        let parsed = match frame(&self.buf) {
            Err(nom::Err::Incomplete(_)) => return None,
            Ok((_, raw)) => Some(raw.into_packet()),
            Err(_) => None,
        };
        self.buf.clear();

        match parsed {
            Some(result) => Some(result),
            None => {
                // The rejected byte may itself start the next frame
                if byte == FRAME_START {
                    let _ = self.buf.push(byte);
                }
                Some(Err(Error::Frame))
            }
        }
    }
}
