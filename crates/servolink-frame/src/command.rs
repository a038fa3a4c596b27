//! Command and reply id catalogue.
//!
//! Command ids 0x00-0x1F are sent to the controller. Reply ids share the same
//! 5-bit space but mean different things, so they get their own enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Commands understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    SetOrigin = 0x00,
    GoAbsolutePos = 0x01,
    MakeLinearLine = 0x02,
    GoRelativePos = 0x03,
    MakeCircularArc = 0x04,
    AssignDriveId = 0x05,
    ReadDriveId = 0x06,
    SetDriveConfig = 0x07,
    ReadDriveConfig = 0x08,
    ReadDriveStatus = 0x09,
    TurnConstSpeed = 0x0a,
    SquareWave = 0x0b,
    SinWave = 0x0c,
    SsFrequency = 0x0d,
    GeneralRead = 0x0e,
    ForMotorDefine = 0x0f,
    SetMainGain = 0x10,
    SetSpeedGain = 0x11,
    SetIntGain = 0x12,
    SetTrqCons = 0x13,
    SetHighSpeed = 0x14,
    SetHighAccel = 0x15,
    SetPosOnRange = 0x16,
    SetGearNumber = 0x17,
    ReadMainGain = 0x18,
    ReadSpeedGain = 0x19,
    ReadIntGain = 0x1a,
    ReadTrqCons = 0x1b,
    ReadHighSpeed = 0x1c,
    ReadHighAccel = 0x1d,
    ReadPosOnRange = 0x1e,
    ReadGearNumber = 0x1f,
}

impl Command {
    /// Every command, indexed by id.
    pub const ALL: [Command; 32] = [
        Command::SetOrigin,
        Command::GoAbsolutePos,
        Command::MakeLinearLine,
        Command::GoRelativePos,
        Command::MakeCircularArc,
        Command::AssignDriveId,
        Command::ReadDriveId,
        Command::SetDriveConfig,
        Command::ReadDriveConfig,
        Command::ReadDriveStatus,
        Command::TurnConstSpeed,
        Command::SquareWave,
        Command::SinWave,
        Command::SsFrequency,
        Command::GeneralRead,
        Command::ForMotorDefine,
        Command::SetMainGain,
        Command::SetSpeedGain,
        Command::SetIntGain,
        Command::SetTrqCons,
        Command::SetHighSpeed,
        Command::SetHighAccel,
        Command::SetPosOnRange,
        Command::SetGearNumber,
        Command::ReadMainGain,
        Command::ReadSpeedGain,
        Command::ReadIntGain,
        Command::ReadTrqCons,
        Command::ReadHighSpeed,
        Command::ReadHighAccel,
        Command::ReadPosOnRange,
        Command::ReadGearNumber,
    ];

    /// Wire id (0-31).
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a command by wire id. Only the low 5 bits are significant.
    pub fn from_id(id: u8) -> Command {
        Command::ALL[usize::from(id & 0x1f)]
    }

    /// Controller manual name.
    pub fn name(self) -> &'static str {
        match self {
            Command::SetOrigin => "Set_Origin",
            Command::GoAbsolutePos => "Go_Absolute_Pos",
            Command::MakeLinearLine => "Make_LinearLine",
            Command::GoRelativePos => "Go_Relative_Pos",
            Command::MakeCircularArc => "Make_CircularArc",
            Command::AssignDriveId => "Assign_Drive_ID",
            Command::ReadDriveId => "Read_Drive_ID",
            Command::SetDriveConfig => "Set_Drive_Config",
            Command::ReadDriveConfig => "Read_Drive_Config",
            Command::ReadDriveStatus => "Read_Drive_Status",
            Command::TurnConstSpeed => "Turn_ConstSpeed",
            Command::SquareWave => "Square_Wave",
            Command::SinWave => "Sin_Wave",
            Command::SsFrequency => "SS_Frequency",
            Command::GeneralRead => "General_Read",
            Command::ForMotorDefine => "ForMotorDefine",
            Command::SetMainGain => "Set_MainGain",
            Command::SetSpeedGain => "Set_SpeedGain",
            Command::SetIntGain => "Set_IntGain",
            Command::SetTrqCons => "Set_TrqCons",
            Command::SetHighSpeed => "Set_HighSpeed",
            Command::SetHighAccel => "Set_HighAccel",
            Command::SetPosOnRange => "Set_Pos_OnRange",
            Command::SetGearNumber => "Set_GearNumber",
            Command::ReadMainGain => "Read_MainGain",
            Command::ReadSpeedGain => "Read_SpeedGain",
            Command::ReadIntGain => "Read_IntGain",
            Command::ReadTrqCons => "Read_TrqCons",
            Command::ReadHighSpeed => "Read_HighSpeed",
            Command::ReadHighAccel => "Read_HighAccel",
            Command::ReadPosOnRange => "Read_Pos_OnRange",
            Command::ReadGearNumber => "Read_GearNumber",
        }
    }

    /// The reply a parameter-read command is answered with.
    pub fn expected_reply(self) -> Option<Reply> {
        match self {
            Command::ReadDriveId => Some(Reply::DriveId),
            Command::ReadDriveConfig => Some(Reply::Config),
            Command::ReadDriveStatus => Some(Reply::Status),
            Command::ReadMainGain => Some(Reply::MainGain),
            Command::ReadSpeedGain => Some(Reply::SpeedGain),
            Command::ReadIntGain => Some(Reply::IntGain),
            Command::ReadTrqCons => Some(Reply::TrqCons),
            Command::ReadHighSpeed => Some(Reply::HighSpeed),
            Command::ReadHighAccel => Some(Reply::HighAccel),
            Command::ReadPosOnRange => Some(Reply::PosOnRange),
            Command::ReadGearNumber => Some(Reply::GearNumber),
            _ => None,
        }
    }

    /// Commands whose reply can be read back with no argument.
    pub fn parameter_reads() -> impl Iterator<Item = Command> {
        Command::ALL
            .into_iter()
            .filter(|cmd| cmd.expected_reply().is_some())
    }

    /// Motion gain setters, whose values are only meaningful in 1-127.
    pub fn is_gain_setter(self) -> bool {
        (0x10..=0x14).contains(&self.id())
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    /// Strict conversion; ids above 31 are returned as the error.
    fn try_from(id: u8) -> std::result::Result<Self, u8> {
        if id < 32 {
            Ok(Command::from_id(id))
        } else {
            Err(id)
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for Command {
    type Err = String;

    /// Accepts manual names in any case, with or without `_`/`-`, or a
    /// numeric id (`16`, `0x10`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let numeric = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => s.parse::<u8>().ok(),
        };
        if let Some(id) = numeric {
            return if id < 32 {
                Ok(Command::from_id(id))
            } else {
                Err(format!("command id {id} is out of range 0-31"))
            };
        }

        let wanted = normalize(s);
        Command::ALL
            .into_iter()
            .find(|cmd| normalize(cmd.name()) == wanted)
            .ok_or_else(|| format!("unknown command '{s}'"))
    }
}

/// How a reply value is interpreted after chunk reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Sign-extended from the first value chunk.
    Signed,
    /// Single-byte parameter defined in 1-127; masked to 7 unsigned bits.
    Unsigned7,
}

/// Replies sent back by a configured controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reply {
    MainGain = 0x10,
    SpeedGain = 0x11,
    IntGain = 0x12,
    TrqCons = 0x13,
    HighSpeed = 0x14,
    HighAccel = 0x15,
    DriveId = 0x16,
    PosOnRange = 0x17,
    GearNumber = 0x18,
    Status = 0x19,
    Config = 0x1a,
    AbsPos32 = 0x1b,
    Speed = 0x1d,
    TrqCurrent = 0x1e,
}

impl Reply {
    pub const ALL: [Reply; 14] = [
        Reply::MainGain,
        Reply::SpeedGain,
        Reply::IntGain,
        Reply::TrqCons,
        Reply::HighSpeed,
        Reply::HighAccel,
        Reply::DriveId,
        Reply::PosOnRange,
        Reply::GearNumber,
        Reply::Status,
        Reply::Config,
        Reply::AbsPos32,
        Reply::Speed,
        Reply::TrqCurrent,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Reply> {
        Reply::ALL.into_iter().find(|reply| reply.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reply::MainGain => "MainGain",
            Reply::SpeedGain => "SpeedGain",
            Reply::IntGain => "IntGain",
            Reply::TrqCons => "TrqCons",
            Reply::HighSpeed => "HighSpeed",
            Reply::HighAccel => "HighAccel",
            Reply::DriveId => "Drive_ID",
            Reply::PosOnRange => "PosOn_Range",
            Reply::GearNumber => "GearNumber",
            Reply::Status => "Status",
            Reply::Config => "Config",
            Reply::AbsPos32 => "AbsPos32",
            Reply::Speed => "Speed",
            Reply::TrqCurrent => "TrqCurrent",
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            Reply::AbsPos32 | Reply::Speed | Reply::TrqCurrent | Reply::GearNumber => {
                ValueKind::Signed
            }
            _ => ValueKind::Unsigned7,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-requests carried as the value of [`Command::GeneralRead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralRead {
    /// Read absolute position; answered with [`Reply::AbsPos32`].
    Position,
    /// Read motor speed; answered with [`Reply::Speed`].
    Speed,
    /// Read torque current; answered with [`Reply::TrqCurrent`].
    TorqueCurrent,
    /// Reset the drive to clear an overload condition.
    DriveReset,
    /// Re-engage the motor drive.
    DriveEnable,
    /// Disable the drive (freewheel).
    DriveDisable,
}

impl GeneralRead {
    /// Value placed in the General_Read frame.
    pub fn code(self) -> i32 {
        match self {
            GeneralRead::Position => 0x1b,
            GeneralRead::Speed => 0x1d,
            GeneralRead::TorqueCurrent => 0x1e,
            GeneralRead::DriveReset => 0x1c,
            GeneralRead::DriveEnable => 0x20,
            GeneralRead::DriveDisable => 0x21,
        }
    }

    pub fn expected_reply(self) -> Option<Reply> {
        match self {
            GeneralRead::Position => Some(Reply::AbsPos32),
            GeneralRead::Speed => Some(Reply::Speed),
            GeneralRead::TorqueCurrent => Some(Reply::TrqCurrent),
            _ => None,
        }
    }
}

/// Quantity sampled by the telemetry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryChannel {
    #[default]
    Position,
    Speed,
    Torque,
}

impl TelemetryChannel {
    pub fn request(self) -> GeneralRead {
        match self {
            TelemetryChannel::Position => GeneralRead::Position,
            TelemetryChannel::Speed => GeneralRead::Speed,
            TelemetryChannel::Torque => GeneralRead::TorqueCurrent,
        }
    }

    pub fn reply(self) -> Reply {
        match self {
            TelemetryChannel::Position => Reply::AbsPos32,
            TelemetryChannel::Speed => Reply::Speed,
            TelemetryChannel::Torque => Reply::TrqCurrent,
        }
    }
}

impl FromStr for TelemetryChannel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "position" | "pos" => Ok(TelemetryChannel::Position),
            "speed" => Ok(TelemetryChannel::Speed),
            "torque" => Ok(TelemetryChannel::Torque),
            other => Err(format!("unknown telemetry channel '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_table_is_indexed_by_id() {
        for (index, cmd) in Command::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(cmd.id()), index);
            assert_eq!(Command::from_id(cmd.id()), cmd);
        }
    }

    #[test]
    fn try_from_rejects_ids_above_31() {
        assert_eq!(Command::try_from(0x0e), Ok(Command::GeneralRead));
        assert_eq!(Command::try_from(0x20), Err(0x20));
    }

    #[test]
    fn parses_manual_names_loosely() {
        assert_eq!("Set_MainGain".parse::<Command>(), Ok(Command::SetMainGain));
        assert_eq!("set-main-gain".parse::<Command>(), Ok(Command::SetMainGain));
        assert_eq!("READ_DRIVE_ID".parse::<Command>(), Ok(Command::ReadDriveId));
        assert_eq!("0x18".parse::<Command>(), Ok(Command::ReadMainGain));
        assert_eq!("14".parse::<Command>(), Ok(Command::GeneralRead));
        assert!("Jump_Around".parse::<Command>().is_err());
        assert!("40".parse::<Command>().is_err());
    }

    #[test]
    fn read_commands_map_to_replies() {
        assert_eq!(Command::ReadMainGain.expected_reply(), Some(Reply::MainGain));
        assert_eq!(Command::ReadDriveId.expected_reply(), Some(Reply::DriveId));
        assert_eq!(Command::ReadGearNumber.expected_reply(), Some(Reply::GearNumber));
        assert_eq!(Command::SetMainGain.expected_reply(), None);
        assert_eq!(Command::parameter_reads().count(), 11);
    }

    #[test]
    fn single_byte_parameters_are_unsigned() {
        for id in [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x19, 0x1a] {
            let reply = Reply::from_id(id).unwrap();
            assert_eq!(reply.value_kind(), ValueKind::Unsigned7, "{reply}");
        }
        assert_eq!(Reply::AbsPos32.value_kind(), ValueKind::Signed);
        assert_eq!(Reply::GearNumber.value_kind(), ValueKind::Signed);
        assert_eq!(Reply::from_id(0x1c), None);
    }

    #[test]
    fn telemetry_channels_pair_request_and_reply() {
        for channel in [
            TelemetryChannel::Position,
            TelemetryChannel::Speed,
            TelemetryChannel::Torque,
        ] {
            assert_eq!(channel.request().expected_reply(), Some(channel.reply()));
        }
        assert_eq!("torque".parse::<TelemetryChannel>(), Ok(TelemetryChannel::Torque));
    }

    #[test]
    fn gain_setters_cover_main_through_high_speed() {
        assert!(Command::SetMainGain.is_gain_setter());
        assert!(Command::SetHighSpeed.is_gain_setter());
        assert!(!Command::SetHighAccel.is_gain_setter());
    }
}
