use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One GPS reading as it lands in the log. The upstream fix carries more
/// fields (accuracy, speed, bearing); only these two are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub altitude: f64,
    pub longitude: f64,
}

/// Closed set of cellular technologies the recorder understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioType {
    Cdma,
    Gsm,
    Lte,
    Nr,
    Tdscdma,
    Wcdma,
    Unknown,
}

impl RadioType {
    /// Network-type tag as written to the log file.
    pub fn network_type(self) -> &'static str {
        match self {
            RadioType::Cdma => "CDMA",
            RadioType::Gsm => "GSM",
            RadioType::Lte => "LTE",
            RadioType::Nr => "NR",
            RadioType::Tdscdma => "TD-SCDMA",
            RadioType::Wcdma => "WCDMA",
            RadioType::Unknown => "Unknown",
        }
    }

    /// Cellular generation the technology belongs to.
    pub fn generation(self) -> &'static str {
        match self {
            RadioType::Gsm => "2G",
            RadioType::Cdma | RadioType::Tdscdma | RadioType::Wcdma => "3G",
            RadioType::Lte => "4G",
            RadioType::Nr => "5G",
            RadioType::Unknown => "Unknown",
        }
    }
}

/// Identity of one base station. Field meanings follow the Android
/// CellIdentity family: `cid` is the base-station id for CDMA, the cell id
/// for GSM/WCDMA/TD-SCDMA, the 28-bit cell id for LTE and the full NCI for
/// NR. Operator strings are empty when the platform does not report them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellIdentity {
    pub operator_alpha_long: String,
    pub operator_alpha_short: String,
    pub network_type: String,
    pub generation: String,
    pub mcc: String,
    pub mnc: String,
    pub cid: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSignalStrength {
    pub asu_level: i32,
    pub dbm: i32,
    pub level: i32,
}

/// One detected tower at a sampling instant. Identity and signal strength
/// always come from the same underlying platform cell object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellInfo {
    pub connection_status: i32,
    pub cell_identity: CellIdentity,
    pub cell_signal_strength: CellSignalStrength,
}

/// One sample: where we were, every tower we saw, and when. Datetime is
/// local wall-clock time with no offset (ISO-8601 local date-time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLogRow {
    pub location: LocationReading,
    pub cell_info_list: Vec<CellInfo>,
    pub datetime: NaiveDateTime,
}

/// Root of the serialized session document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellLog {
    pub logs: Vec<CellLogRow>,
}
