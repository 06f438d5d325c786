//! Typed command API (§4.G, §6): thin formatters/parsers over
//! `PeripheralSession::send_request`. Message struct packing for
//! individual MT commands is explicitly in-scope for this module even
//! though the link layer itself treats payloads as opaque bytes (§1).
//!
//! Byte layouts for `Settings`, `DeviceInfo`, `SyncContainer` and the
//! `Control` request below follow the reference host implementation's
//! `struct.unpack` format strings exactly, including field names, since
//! §6 of the protocol description only states sizes, not field layout.

pub mod codes;
pub mod measurements;

use codes::command;

use crate::error::{Error, Result};
use crate::session::PeripheralSession;
use crate::transport::GattTransport;

pub use measurements::get_measurements;

/// `0x00 PayloadSize` response: the BLE MTU the device negotiated for
/// each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSize {
    pub rx: u16,
    pub tx: u16,
}

impl PayloadSize {
    fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() < 8 {
            return Err(Error::Malformed("PayloadSize response too short"));
        }
        Ok(Self {
            rx: u16::from_le_bytes([b[4], b[5]]),
            tx: u16::from_le_bytes([b[6], b[7]]),
        })
    }
}

pub async fn payload_size<T: GattTransport>(session: &PeripheralSession<T>) -> Result<PayloadSize> {
    let resp = session.send_request(command::PAYLOAD_SIZE, &[]).await?;
    PayloadSize::from_bytes(&resp)
}

/// `0x04 MTProtocolVersion` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub main: u8,
    pub sub: u8,
    pub bug: u8,
    pub proj_main: u8,
    pub proj_sub: u8,
    pub proj_bug: u8,
}

impl ProtocolVersion {
    fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() < 6 {
            return Err(Error::Malformed("MTProtocolVersion response too short"));
        }
        Ok(Self {
            main: b[0],
            sub: b[1],
            bug: b[2],
            proj_main: b[3],
            proj_sub: b[4],
            proj_bug: b[5],
        })
    }
}

pub async fn protocol_version<T: GattTransport>(
    session: &PeripheralSession<T>,
) -> Result<ProtocolVersion> {
    let resp = session
        .send_request(command::MT_PROTOCOL_VERSION, &[])
        .await?;
    ProtocolVersion::from_bytes(&resp)
}

/// `0x06 DeviceInfo` response. Field names and the trailing 12-byte
/// `unknown` block follow the reference decoder's `xxxxihBBBBBB12sx`
/// unpack format verbatim — the trailing block is reserved/unidentified
/// there too, not a device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial_number: i32,
    pub sw_revision: i16,
    pub sw_version_main: u8,
    pub sw_version_sub: u8,
    pub sw_version_bug: u8,
    pub hw_pcb_version: u8,
    pub hw_pcb_variant: u8,
    pub hw_pcb_bug: u8,
    pub unknown: [u8; 12],
}

impl DeviceInfo {
    fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() < 4 + 4 + 2 + 6 + 12 {
            return Err(Error::Malformed("DeviceInfo response too short"));
        }
        let serial_number = i32::from_le_bytes([b[4], b[5], b[6], b[7]]);
        let sw_revision = i16::from_le_bytes([b[8], b[9]]);
        let mut unknown = [0u8; 12];
        unknown.copy_from_slice(&b[16..28]);
        Ok(Self {
            serial_number,
            sw_revision,
            sw_version_main: b[10],
            sw_version_sub: b[11],
            sw_version_bug: b[12],
            hw_pcb_version: b[13],
            hw_pcb_variant: b[14],
            hw_pcb_bug: b[15],
            unknown,
        })
    }
}

pub async fn device_info<T: GattTransport>(session: &PeripheralSession<T>) -> Result<DeviceInfo> {
    let resp = session.send_request(command::DEVICE_INFO, &[]).await?;
    DeviceInfo::from_bytes(&resp)
}

/// `0x0F RealTimeClock` response: device uptime/epoch in seconds.
pub async fn real_time_clock<T: GattTransport>(session: &PeripheralSession<T>) -> Result<u32> {
    let resp = session.send_request(command::REAL_TIME_CLOCK, &[]).await?;
    if resp.len() < 4 {
        return Err(Error::Malformed("RealTimeClock response too short"));
    }
    Ok(u32::from_le_bytes([resp[0], resp[1], resp[2], resp[3]]))
}

/// `0x3A DeviceInfoString` response: raw bytes, no further structure
/// defined by the protocol (§6).
pub async fn device_info_string<T: GattTransport>(
    session: &PeripheralSession<T>,
) -> Result<Vec<u8>> {
    session.send_request(command::DEVICE_INFO_STRING, &[]).await
}

/// `0x3B UploadBlock` response: `errCode = b[0] & 0xF`, `blockNumber =
/// b[0] >> 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadResult {
    pub error_code: u8,
    pub block_number: u8,
}

pub async fn upload_block<T: GattTransport>(
    session: &PeripheralSession<T>,
    block_no: u8,
    block_type: u8,
    data: &[u8],
) -> Result<UploadResult> {
    let mut payload = Vec::with_capacity(2 + data.len());
    payload.push((block_no << 4) | (block_type & 0x0F));
    payload.push(data.len() as u8);
    payload.extend_from_slice(data);
    let resp = session.send_request(command::UPLOAD_BLOCK, &payload).await?;
    let byte = *resp
        .first()
        .ok_or(Error::Malformed("UploadBlock response too short"))?;
    Ok(UploadResult {
        error_code: byte & 0x0F,
        block_number: byte >> 4,
    })
}

/// Distance unit, shared by [`Settings::measurement_unit`] and
/// [`SyncContainer::distance_unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Metric,
    Imperial,
}

impl DistanceUnit {
    fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Metric
        } else {
            Self::Imperial
        }
    }
}

/// Reference point a distance measurement was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistReference {
    Front,
    Center,
    Back,
    Tripod,
}

impl DistReference {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Front,
            1 => Self::Center,
            2 => Self::Back,
            _ => Self::Tripod,
        }
    }
}

/// A 33-byte measurement record, returned by `Control` and
/// `GetMeasurements` (§6, GLOSSARY "Sync container"). Field names and
/// bit/byte offsets follow the reference decoder's
/// `GLMSyncContainer_fromBytes` exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncContainer {
    /// Low 5 bits of byte 0.
    pub measurement_type: u8,
    /// High 3 bits of byte 0.
    pub calc_indicator: u8,
    pub dist_reference: DistReference,
    pub angle_reference: u8,
    pub distance_unit: DistanceUnit,
    pub state_of_charge: u8,
    pub temperature: u8,
    pub distance: [f32; 3],
    pub result: f32,
    pub angle: f32,
    pub timestamp: i32,
    pub laser_on: bool,
    pub usability_errors: u8,
    pub measurement_list_index: u8,
    pub compass_heading: i16,
    pub ndof_sensor_status: u8,
}

impl SyncContainer {
    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() != 33 {
            return Err(Error::Malformed("sync container must be exactly 33 bytes"));
        }
        let distance = [
            f32::from_le_bytes(b[4..8].try_into().unwrap()),
            f32::from_le_bytes(b[8..12].try_into().unwrap()),
            f32::from_le_bytes(b[12..16].try_into().unwrap()),
        ];
        let result = f32::from_le_bytes(b[16..20].try_into().unwrap());
        let angle = f32::from_le_bytes(b[20..24].try_into().unwrap());
        let timestamp = i32::from_le_bytes(b[24..28].try_into().unwrap());
        Ok(Self {
            measurement_type: b[0] & 0x1F,
            calc_indicator: b[0] >> 5,
            dist_reference: DistReference::from_bits(b[1]),
            angle_reference: (b[1] >> 3) & 0x07,
            distance_unit: DistanceUnit::from_bit((b[1] >> 6) & 0x01),
            state_of_charge: b[2],
            temperature: b[3],
            distance,
            result,
            angle,
            timestamp,
            laser_on: b[28] & 1 != 0,
            usability_errors: b[28] >> 1,
            measurement_list_index: b[29],
            compass_heading: i16::from_le_bytes(b[30..32].try_into().unwrap()),
            ndof_sensor_status: b[32],
        })
    }
}

/// `0x50 Control` request payload: 2 bytes of packed bits. Bit positions
/// follow the reference implementation's `control()` call
/// (`switchMode<<7 | syncControl<<6 | signalOperation<<5 |
/// measurementType`, then `angleReference<<3 | distReference`) rather
/// than a position invented for this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRequest {
    pub switch_mode: bool,
    pub sync_control: bool,
    pub signal_operation: bool,
    /// 5-bit measurement type selector.
    pub measurement_type: u8,
    /// 3-bit angle reference selector.
    pub angle_reference: u8,
    pub dist_reference: u8,
}

impl ControlRequest {
    fn to_bytes(self) -> [u8; 2] {
        let byte0 = ((self.switch_mode as u8) << 7)
            | ((self.sync_control as u8) << 6)
            | ((self.signal_operation as u8) << 5)
            | (self.measurement_type & 0x1F);
        let byte1 = ((self.angle_reference & 0x07) << 3) | (self.dist_reference & 0x07);
        [byte0, byte1]
    }
}

pub async fn control<T: GattTransport>(
    session: &PeripheralSession<T>,
    request: ControlRequest,
) -> Result<SyncContainer> {
    let resp = session
        .send_request(command::CONTROL, &request.to_bytes())
        .await?;
    SyncContainer::from_bytes(&resp)
}

/// `0x52 ClearMeasurements`: clear stored records in `[first, last]`.
pub async fn clear_measurements<T: GattTransport>(
    session: &PeripheralSession<T>,
    first: u8,
    last: u8,
) -> Result<()> {
    session
        .send_request(command::CLEAR_MEASUREMENTS, &[first, last])
        .await?;
    Ok(())
}

/// `0x53`/`0x54` device settings. Field names and the 11-byte layout
/// (four bools, three bytes, four bytes reserved) follow the reference
/// decoder's `????BBBxxxx` unpack format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub spirit_level_enabled: bool,
    pub disp_rotation_enabled: bool,
    pub speaker_enabled: bool,
    pub laser_pointer_enabled: bool,
    pub backlight_mode: u8,
    pub angle_unit: u8,
    pub measurement_unit: u8,
}

impl Settings {
    fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() != 11 {
            return Err(Error::Malformed("settings must be exactly 11 bytes"));
        }
        Ok(Self {
            spirit_level_enabled: b[0] != 0,
            disp_rotation_enabled: b[1] != 0,
            speaker_enabled: b[2] != 0,
            laser_pointer_enabled: b[3] != 0,
            backlight_mode: b[4],
            angle_unit: b[5],
            measurement_unit: b[6],
        })
    }

    fn to_bytes(self) -> [u8; 11] {
        [
            self.spirit_level_enabled as u8,
            self.disp_rotation_enabled as u8,
            self.speaker_enabled as u8,
            self.laser_pointer_enabled as u8,
            self.backlight_mode,
            self.angle_unit,
            self.measurement_unit,
            0,
            0,
            0,
            0,
        ]
    }

    /// [`Settings::measurement_unit`] decoded as a [`DistanceUnit`].
    pub fn distance_unit(&self) -> DistanceUnit {
        DistanceUnit::from_bit(self.measurement_unit)
    }
}

/// `0x53 ReadSettings`.
pub async fn read_settings<T: GattTransport>(session: &PeripheralSession<T>) -> Result<Settings> {
    let resp = session.send_request(command::READ_SETTINGS, &[]).await?;
    Settings::from_bytes(&resp)
}

/// `0x54 WriteSettings`: reads the current settings, applies `overlay`
/// to a mutable copy, and writes the result back (§4.G).
pub async fn write_settings<T: GattTransport>(
    session: &PeripheralSession<T>,
    overlay: impl FnOnce(&mut Settings),
) -> Result<()> {
    let mut current = read_settings(session).await?;
    overlay(&mut current);
    session
        .send_request(command::WRITE_SETTINGS, &current.to_bytes())
        .await?;
    Ok(())
}
