//! Pure mapping from raw platform cell objects to log records. No state,
//! no side effects; one fixed extraction table per technology.

use thiserror::Error;

use crate::model::{CellIdentity, CellInfo, CellSignalStrength, RadioType};
use crate::sensors::RawCellInfo;

#[derive(Debug, Error)]
pub enum MapError {
    /// The platform reported a technology outside the six known ones, so
    /// no identity can be extracted. Drops the sample, not the session.
    #[error("no cell identity available for radio type {0:?}")]
    NoIdentity(String),
}

/// Android CellInfo connection-status codes: 0 = none, 1 = primary serving.
pub fn connection_status(raw: &RawCellInfo) -> i32 {
    if raw.registered {
        1
    } else {
        0
    }
}

/// Numeric cell identifier; which platform field it comes from is
/// protocol-specific. 0 when the technology is unrecognized or the field
/// is missing.
pub fn cell_id(raw: &RawCellInfo) -> i64 {
    match raw.radio_type() {
        RadioType::Cdma => raw.basestation.unwrap_or(0),
        RadioType::Gsm | RadioType::Wcdma | RadioType::Tdscdma => raw.cid.unwrap_or(0),
        RadioType::Lte => raw.ci.unwrap_or(0),
        RadioType::Nr => raw.nci.unwrap_or(0),
        RadioType::Unknown => 0,
    }
}

/// Mobile country code. CDMA identities carry none; unrecognized types map
/// to the empty string.
pub fn mcc(raw: &RawCellInfo) -> String {
    match raw.radio_type() {
        RadioType::Cdma | RadioType::Unknown => String::new(),
        _ => raw.mcc.clone().unwrap_or_default(),
    }
}

/// Mobile network code, same rules as [`mcc`].
pub fn mnc(raw: &RawCellInfo) -> String {
    match raw.radio_type() {
        RadioType::Cdma | RadioType::Unknown => String::new(),
        _ => raw.mnc.clone().unwrap_or_default(),
    }
}

pub fn cell_identity(raw: &RawCellInfo) -> CellIdentity {
    let radio = raw.radio_type();
    CellIdentity {
        operator_alpha_long: raw.operator_alpha_long.clone().unwrap_or_default(),
        operator_alpha_short: raw.operator_alpha_short.clone().unwrap_or_default(),
        network_type: radio.network_type().to_string(),
        generation: radio.generation().to_string(),
        mcc: mcc(raw),
        mnc: mnc(raw),
        cid: cell_id(raw),
    }
}

pub fn cell_signal_strength(raw: &RawCellInfo) -> CellSignalStrength {
    CellSignalStrength {
        asu_level: raw.asu,
        dbm: raw.dbm,
        level: raw.level,
    }
}

/// Map one raw cell. Identity and signal strength are taken from the same
/// raw object, never mixed across cells.
pub fn map_cell_info(raw: &RawCellInfo) -> Result<CellInfo, MapError> {
    if raw.radio_type() == RadioType::Unknown {
        return Err(MapError::NoIdentity(raw.radio.clone()));
    }
    Ok(CellInfo {
        connection_status: connection_status(raw),
        cell_identity: cell_identity(raw),
        cell_signal_strength: cell_signal_strength(raw),
    })
}

/// Map a whole platform snapshot, preserving the platform-reported order.
/// Any unrecognized variant fails the whole snapshot (one dropped sample).
pub fn map_cell_info_list(raws: &[RawCellInfo]) -> Result<Vec<CellInfo>, MapError> {
    raws.iter().map(map_cell_info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(radio: &str) -> RawCellInfo {
        RawCellInfo {
            radio: radio.to_string(),
            registered: true,
            asu: 20,
            dbm: -90,
            level: 3,
            mcc: Some("440".to_string()),
            mnc: Some("50".to_string()),
            cid: Some(111),
            ci: Some(222),
            nci: Some(333),
            basestation: Some(444),
            ..Default::default()
        }
    }

    #[test]
    fn test_tag_and_id_table_for_all_six_technologies() {
        let cases = [
            ("cdma", "CDMA", "3G", 444),
            ("gsm", "GSM", "2G", 111),
            ("lte", "LTE", "4G", 222),
            ("nr", "NR", "5G", 333),
            ("tdscdma", "TD-SCDMA", "3G", 111),
            ("wcdma", "WCDMA", "3G", 111),
        ];
        for (radio, network_type, generation, cid) in cases {
            let info = map_cell_info(&raw(radio)).unwrap();
            assert_eq!(info.cell_identity.network_type, network_type);
            assert_eq!(info.cell_identity.generation, generation);
            assert_eq!(info.cell_identity.cid, cid);
        }
    }

    #[test]
    fn test_unrecognized_variant_has_no_identity() {
        let err = map_cell_info(&raw("satellite")).unwrap_err();
        assert!(matches!(err, MapError::NoIdentity(ref r) if r == "satellite"));
        // The field tables themselves stay total for the unknown arm.
        let unknown = raw("satellite");
        assert_eq!(cell_id(&unknown), 0);
        assert_eq!(mcc(&unknown), "");
        assert_eq!(mnc(&unknown), "");
        let identity = cell_identity(&unknown);
        assert_eq!(identity.network_type, "Unknown");
        assert_eq!(identity.generation, "Unknown");
        assert_eq!(identity.cid, 0);
    }

    #[test]
    fn test_cdma_carries_no_mcc_mnc() {
        let info = map_cell_info(&raw("cdma")).unwrap();
        assert_eq!(info.cell_identity.mcc, "");
        assert_eq!(info.cell_identity.mnc, "");
    }

    #[test]
    fn test_missing_optional_fields_become_placeholders() {
        let bare = RawCellInfo {
            radio: "lte".to_string(),
            asu: 5,
            dbm: -113,
            level: 1,
            ..Default::default()
        };
        let info = map_cell_info(&bare).unwrap();
        assert_eq!(info.connection_status, 0);
        assert_eq!(info.cell_identity.operator_alpha_long, "");
        assert_eq!(info.cell_identity.operator_alpha_short, "");
        assert_eq!(info.cell_identity.mcc, "");
        assert_eq!(info.cell_identity.cid, 0);
    }

    #[test]
    fn test_signal_and_identity_come_from_same_cell() {
        let mut first = raw("lte");
        first.dbm = -70;
        let mut second = raw("gsm");
        second.dbm = -100;
        let mapped = map_cell_info_list(&[first, second]).unwrap();
        assert_eq!(mapped[0].cell_identity.network_type, "LTE");
        assert_eq!(mapped[0].cell_signal_strength.dbm, -70);
        assert_eq!(mapped[1].cell_identity.network_type, "GSM");
        assert_eq!(mapped[1].cell_signal_strength.dbm, -100);
    }

    #[test]
    fn test_list_fails_on_any_unrecognized_cell() {
        assert!(map_cell_info_list(&[raw("lte"), raw("bogus")]).is_err());
    }

    #[test]
    fn test_connection_status_codes() {
        let mut cell = raw("nr");
        assert_eq!(connection_status(&cell), 1);
        cell.registered = false;
        assert_eq!(connection_status(&cell), 0);
    }
}
