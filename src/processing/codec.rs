//! Sentence codec for the transponder's serial protocol
//!
//! The device speaks an NMEA-0183 style protocol: `$` + comma-separated
//! payload + `*` + two-hex-digit XOR checksum + CRLF. Proprietary sentences
//! carry the `PUWV` address prefix followed by a one-character sentence id;
//! standard talker sentences (`RMC`) deliver the surface GNSS position.
//! Unknown manufacturer codes and sentence ids decode to
//! [`Sentence::Unsupported`] so that newer firmware never breaks the
//! session.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Acoustic request/response command codes understood by the transponder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Ping,
    Pong,
    DepthGet,
    TemperatureGet,
    BatteryVoltageGet,
    ErrNotSupported,
    Ack,
    UserCmd(u8),
}

impl RemoteCommand {
    /// Wire code of this command
    pub fn code(&self) -> u8 {
        match self {
            RemoteCommand::Ping => 0,
            RemoteCommand::Pong => 1,
            RemoteCommand::DepthGet => 2,
            RemoteCommand::TemperatureGet => 3,
            RemoteCommand::BatteryVoltageGet => 4,
            RemoteCommand::ErrNotSupported => 5,
            RemoteCommand::Ack => 6,
            RemoteCommand::UserCmd(n) => 7 + n,
        }
    }

    /// Decode a wire code; user commands occupy codes 7..=15
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RemoteCommand::Ping),
            1 => Some(RemoteCommand::Pong),
            2 => Some(RemoteCommand::DepthGet),
            3 => Some(RemoteCommand::TemperatureGet),
            4 => Some(RemoteCommand::BatteryVoltageGet),
            5 => Some(RemoteCommand::ErrNotSupported),
            6 => Some(RemoteCommand::Ack),
            7..=15 => Some(RemoteCommand::UserCmd(code - 7)),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::Ping => write!(f, "PING"),
            RemoteCommand::Pong => write!(f, "PONG"),
            RemoteCommand::DepthGet => write!(f, "DPT_GET"),
            RemoteCommand::TemperatureGet => write!(f, "TMP_GET"),
            RemoteCommand::BatteryVoltageGet => write!(f, "BAT_V_GET"),
            RemoteCommand::ErrNotSupported => write!(f, "ERR_NSUP"),
            RemoteCommand::Ack => write!(f, "ACK"),
            RemoteCommand::UserCmd(n) => write!(f, "USR_CMD_{:03}", n),
        }
    }
}

/// Device-local error codes carried in acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    NoError,
    InvalidSyntax,
    Unsupported,
    TransmitterBusy,
    ArgumentOutOfRange,
    InvalidOperation,
    UnknownFieldId,
    ValueUnavailable,
    ReceiverBusy,
    TxBufferOverrun,
    ChecksumError,
    Unknown,
}

impl DeviceError {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DeviceError::NoError,
            1 => DeviceError::InvalidSyntax,
            2 => DeviceError::Unsupported,
            3 => DeviceError::TransmitterBusy,
            4 => DeviceError::ArgumentOutOfRange,
            5 => DeviceError::InvalidOperation,
            6 => DeviceError::UnknownFieldId,
            7 => DeviceError::ValueUnavailable,
            8 => DeviceError::ReceiverBusy,
            9 => DeviceError::TxBufferOverrun,
            10 => DeviceError::ChecksumError,
            _ => DeviceError::Unknown,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceError::NoError => "NO_ERROR",
            DeviceError::InvalidSyntax => "INVALID_SYNTAX",
            DeviceError::Unsupported => "UNSUPPORTED",
            DeviceError::TransmitterBusy => "TRANSMITTER_BUSY",
            DeviceError::ArgumentOutOfRange => "ARGUMENT_OUT_OF_RANGE",
            DeviceError::InvalidOperation => "INVALID_OPERATION",
            DeviceError::UnknownFieldId => "UNKNOWN_FIELD_ID",
            DeviceError::ValueUnavailable => "VALUE_UNAVAILABLE",
            DeviceError::ReceiverBusy => "RECEIVER_BUSY",
            DeviceError::TxBufferOverrun => "TX_BUFFER_OVERRUN",
            DeviceError::ChecksumError => "CHKSUM_ERROR",
            DeviceError::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Static device description reported during the handshake
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub system_moniker: String,
    pub system_version: u32,
    pub core_moniker: String,
    pub core_version: u32,
    pub acoustic_baudrate: f64,
    pub rx_ch_id: u8,
    pub tx_ch_id: u8,
    pub max_channels: u8,
    pub salinity_psu: f64,
    pub has_pts: bool,
    pub is_command_mode: bool,
}

impl DeviceInfo {
    /// Render a BCD-packed version word as `major.minor`
    pub fn version_to_string(version: u32) -> String {
        format!("{}.{:02X}", version >> 8, version & 0xff)
    }
}

/// A decoded inbound sentence
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    /// Local acknowledgement of the previous command
    Ack { cmd_id: u8, error: DeviceError },
    /// Device description (handshake step 1 response)
    DeviceInfo(DeviceInfo),
    /// Acoustic response from the remote transponder
    RemoteResponse {
        tx_ch_id: u8,
        command: RemoteCommand,
        propagation_time_s: f64,
        snr_db: f64,
        value: Option<f64>,
    },
    /// The device gave up waiting for the acoustic response
    RemoteTimeout { command: RemoteCommand },
    /// Asynchronous ambient telemetry push
    AmbientData {
        pressure_mbar: Option<f64>,
        temperature_c: Option<f64>,
        depth_m: Option<f64>,
        voltage_v: Option<f64>,
    },
    /// Surface GNSS position (standard RMC)
    GnssRmc {
        latitude: f64,
        longitude: f64,
        valid: bool,
    },
    /// Recognized framing, unknown content; ignored by policy
    Unsupported,
}

/// Sentence decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Sentence does not start with `$`
    MissingStart,
    /// No `*hh` checksum trailer
    MissingChecksum,
    /// Checksum trailer does not match the payload
    ChecksumMismatch { expected: u8, actual: u8 },
    /// A field failed to parse
    InvalidField { index: usize, value: String },
    /// Fewer fields than the sentence requires
    Truncated { required: usize, available: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MissingStart => write!(f, "sentence does not start with '$'"),
            CodecError::MissingChecksum => write!(f, "sentence has no checksum trailer"),
            CodecError::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {:02X}, got {:02X}", expected, actual)
            }
            CodecError::InvalidField { index, value } => {
                write!(f, "invalid field {}: '{}'", index, value)
            }
            CodecError::Truncated { required, available } => {
                write!(f, "truncated sentence: need {} fields, got {}", required, available)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

const PROPRIETARY_PREFIX: &str = "PUWV";

/// Parser/builder for the device protocol
pub struct SentenceCodec {
    strict_checksum: bool,
}

impl SentenceCodec {
    pub fn new() -> Self {
        Self { strict_checksum: true }
    }

    /// Disable checksum verification (log replay tolerates edits)
    pub fn set_strict_checksum(&mut self, strict: bool) {
        self.strict_checksum = strict;
    }

    /// Decode one complete sentence
    pub fn parse(&self, raw: &str) -> CodecResult<Sentence> {
        let payload = self.unframe(raw)?;
        let fields: Vec<&str> = payload.split(',').collect();
        let address = fields[0];

        if let Some(id) = address.strip_prefix(PROPRIETARY_PREFIX) {
            return self.parse_proprietary(id, &fields[1..]);
        }
        if address.starts_with('P') {
            // Another manufacturer's proprietary sentence
            return Ok(Sentence::Unsupported);
        }
        if address.len() == 5 && address.ends_with("RMC") {
            return self.parse_rmc(&fields[1..]);
        }
        Ok(Sentence::Unsupported)
    }

    /// Strip framing and verify the checksum, returning the payload between
    /// `$` and `*`
    fn unframe<'a>(&self, raw: &'a str) -> CodecResult<&'a str> {
        let trimmed = raw.trim_end_matches(['\r', '\n']);
        let body = trimmed.strip_prefix('$').ok_or(CodecError::MissingStart)?;
        let star = body.rfind('*').ok_or(CodecError::MissingChecksum)?;
        let (payload, trailer) = body.split_at(star);
        let digits = &trailer[1..];
        if digits.len() != 2 {
            return Err(CodecError::MissingChecksum);
        }
        let expected = u8::from_str_radix(digits, 16).map_err(|_| CodecError::MissingChecksum)?;
        let actual = checksum(payload);
        if self.strict_checksum && expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }
        Ok(payload)
    }

    fn parse_proprietary(&self, id: &str, fields: &[&str]) -> CodecResult<Sentence> {
        match id {
            "0" => {
                require(fields, 2)?;
                Ok(Sentence::Ack {
                    cmd_id: parse_num(fields, 0)?,
                    error: DeviceError::from_code(parse_num(fields, 1)?),
                })
            }
            "!" => {
                require(fields, 11)?;
                Ok(Sentence::DeviceInfo(DeviceInfo {
                    system_moniker: fields[0].to_string(),
                    system_version: parse_num(fields, 1)?,
                    core_moniker: fields[2].to_string(),
                    core_version: parse_num(fields, 3)?,
                    acoustic_baudrate: parse_float(fields, 4)?,
                    rx_ch_id: parse_num(fields, 5)?,
                    tx_ch_id: parse_num(fields, 6)?,
                    max_channels: parse_num(fields, 7)?,
                    salinity_psu: parse_float(fields, 8)?,
                    has_pts: parse_num::<u8>(fields, 9)? != 0,
                    is_command_mode: parse_num::<u8>(fields, 10)? != 0,
                }))
            }
            "3" => {
                require(fields, 4)?;
                let code: u8 = parse_num(fields, 1)?;
                let command = RemoteCommand::from_code(code).ok_or(CodecError::InvalidField {
                    index: 1,
                    value: fields[1].to_string(),
                })?;
                Ok(Sentence::RemoteResponse {
                    tx_ch_id: parse_num(fields, 0)?,
                    command,
                    propagation_time_s: parse_float(fields, 2)?,
                    snr_db: parse_float(fields, 3)?,
                    value: parse_opt_float(fields, 4)?,
                })
            }
            "4" => {
                require(fields, 1)?;
                let code: u8 = parse_num(fields, 0)?;
                let command = RemoteCommand::from_code(code).ok_or(CodecError::InvalidField {
                    index: 0,
                    value: fields[0].to_string(),
                })?;
                Ok(Sentence::RemoteTimeout { command })
            }
            "7" => {
                require(fields, 4)?;
                Ok(Sentence::AmbientData {
                    pressure_mbar: parse_opt_float(fields, 0)?,
                    temperature_c: parse_opt_float(fields, 1)?,
                    depth_m: parse_opt_float(fields, 2)?,
                    voltage_v: parse_opt_float(fields, 3)?,
                })
            }
            _ => Ok(Sentence::Unsupported),
        }
    }

    fn parse_rmc(&self, fields: &[&str]) -> CodecResult<Sentence> {
        // time,status,lat,N/S,lon,E/W,sog,cog,date,mv,mv-dir[,mode]
        require(fields, 6)?;
        let status_valid = fields[1] == "A";
        let latitude = parse_opt_coord(fields, 2)?;
        let longitude = parse_opt_coord(fields, 4)?;
        let (latitude, longitude) = match (latitude, longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Ok(Sentence::GnssRmc {
                    latitude: f64::NAN,
                    longitude: f64::NAN,
                    valid: false,
                })
            }
        };
        let latitude = if fields[3] == "S" { -latitude } else { latitude };
        let longitude = if fields[5] == "W" { -longitude } else { longitude };
        Ok(Sentence::GnssRmc {
            latitude,
            longitude,
            valid: status_valid,
        })
    }

    // ---- outbound ----

    /// `$PUWV?`: ask the device to describe itself
    pub fn build_device_info_query(&self) -> String {
        frame(&format!("{}?,0", PROPRIETARY_PREFIX))
    }

    /// `$PUWV1`: push channel ids and water salinity to the device
    pub fn build_settings_update(&self, tx_ch_id: u8, rx_ch_id: u8, salinity_psu: f64) -> String {
        frame(&format!(
            "{}1,{},{},{:.1},1",
            PROPRIETARY_PREFIX, tx_ch_id, rx_ch_id, salinity_psu
        ))
    }

    /// `$PUWV6`: subscribe to pressure/temperature/depth/voltage pushes
    pub fn build_ambient_config(&self) -> String {
        frame(&format!("{}6,0,1,1,1,1,1", PROPRIETARY_PREFIX))
    }

    /// `$PUWV2`: issue an acoustic request toward `target_addr`
    pub fn build_remote_request(&self, target_addr: u8, command: RemoteCommand) -> String {
        frame(&format!(
            "{}2,{},{}",
            PROPRIETARY_PREFIX,
            target_addr,
            command.code()
        ))
    }

    /// Synthesized `$GNRMC` carrying a target fix
    pub fn build_rmc(&self, latitude: f64, longitude: f64) -> String {
        let (date, time) = utc_date_time();
        frame(&format!(
            "GNRMC,{},A,{},{},{},{},,,{},,,A",
            time,
            format_coord_lat(latitude),
            if latitude >= 0.0 { "N" } else { "S" },
            format_coord_lon(longitude),
            if longitude >= 0.0 { "E" } else { "W" },
            date,
        ))
    }

    /// Synthesized `$GNGGA` carrying a target fix with quality fields
    pub fn build_gga(
        &self,
        latitude: f64,
        longitude: f64,
        radial_error: f64,
        depth: f64,
        station_count: usize,
    ) -> String {
        let (_, time) = utc_date_time();
        frame(&format!(
            "GNGGA,{},{},{},{},{},1,{:02},{:.1},{:.1},M,,M,,",
            time,
            format_coord_lat(latitude),
            if latitude >= 0.0 { "N" } else { "S" },
            format_coord_lon(longitude),
            if longitude >= 0.0 { "E" } else { "W" },
            station_count,
            radial_error,
            -depth,
        ))
    }
}

impl Default for SentenceCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// XOR checksum over the payload between `$` and `*`
fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Wrap a payload in `$...*hh\r\n` framing
fn frame(payload: &str) -> String {
    format!("${}*{:02X}\r\n", payload, checksum(payload))
}

fn require(fields: &[&str], count: usize) -> CodecResult<()> {
    if fields.len() < count {
        return Err(CodecError::Truncated {
            required: count,
            available: fields.len(),
        });
    }
    Ok(())
}

fn parse_num<T: std::str::FromStr>(fields: &[&str], index: usize) -> CodecResult<T> {
    fields[index].parse().map_err(|_| CodecError::InvalidField {
        index,
        value: fields[index].to_string(),
    })
}

fn parse_float(fields: &[&str], index: usize) -> CodecResult<f64> {
    parse_num(fields, index)
}

/// Empty fields decode as `None`; fields beyond the end likewise
fn parse_opt_float(fields: &[&str], index: usize) -> CodecResult<Option<f64>> {
    match fields.get(index) {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(_) => parse_float(fields, index).map(Some),
    }
}

/// `ddmm.mmmm` coordinate field to decimal degrees
fn parse_opt_coord(fields: &[&str], index: usize) -> CodecResult<Option<f64>> {
    let raw = match parse_opt_float(fields, index)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    Ok(Some(degrees + minutes / 60.0))
}

fn format_coord_lat(latitude: f64) -> String {
    let abs = latitude.abs();
    let degrees = abs.trunc();
    let minutes = (abs - degrees) * 60.0;
    format!("{:02}{:07.4}", degrees as u32, minutes)
}

fn format_coord_lon(longitude: f64) -> String {
    let abs = longitude.abs();
    let degrees = abs.trunc();
    let minutes = (abs - degrees) * 60.0;
    format!("{:03}{:07.4}", degrees as u32, minutes)
}

/// UTC `(ddmmyy, hhmmss.ss)` derived from the system clock
fn utc_date_time() -> (String, String) {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let total_secs = since_epoch.as_secs();
    let day_secs = total_secs % 86_400;
    let (hours, minutes, seconds) = (day_secs / 3600, (day_secs / 60) % 60, day_secs % 60);
    let centis = since_epoch.subsec_millis() / 10;

    // Civil-from-days conversion (proleptic Gregorian)
    let days = (total_secs / 86_400) as i64 + 719_468;
    let era = days.div_euclid(146_097);
    let doe = days.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };

    (
        format!("{:02}{:02}{:02}", day, month, year % 100),
        format!("{:02}{:02}{:02}.{:02}", hours, minutes, seconds, centis),
    )
}
