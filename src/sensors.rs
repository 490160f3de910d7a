use serde::Deserialize;
use std::process::Command;
use thiserror::Error;

use crate::model::RadioType;

/// Location permission scopes the host can grant, mirroring the Android
/// trio the Termux:API bridge forwards to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionScope {
    FineLocation,
    CoarseLocation,
    BackgroundLocation,
}

#[derive(Debug, Error)]
pub enum SensorError {
    /// The query is not available on this device (missing Termux:API bridge
    /// or telephony hardware that does not expose cell info).
    #[error("query not supported on this device: {0}")]
    Unsupported(String),
    /// The query ran but produced nothing usable.
    #[error("sensor read failed: {0}")]
    Failed(String),
}

/// One GPS fix as reported by `termux-location`. Only altitude and
/// longitude make it into the log; the rest is kept for status output.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub bearing: f64,
    #[serde(default)]
    pub provider: String,
}

/// One element of the `termux-telephony-cellinfo` list. Which id fields are
/// present depends on the technology; absent fields stay None and the
/// mapper decides what they mean.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawCellInfo {
    #[serde(rename = "type", default)]
    pub radio: String,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub asu: i32,
    #[serde(default)]
    pub dbm: i32,
    #[serde(default)]
    pub level: i32,
    #[serde(default, deserialize_with = "de_code")]
    pub mcc: Option<String>,
    #[serde(default, deserialize_with = "de_code")]
    pub mnc: Option<String>,
    /// GSM / WCDMA / TD-SCDMA cell id.
    #[serde(default)]
    pub cid: Option<i64>,
    /// LTE 28-bit cell id.
    #[serde(default)]
    pub ci: Option<i64>,
    /// NR full cell identity.
    #[serde(default)]
    pub nci: Option<i64>,
    /// CDMA base-station id.
    #[serde(default)]
    pub basestation: Option<i64>,
    #[serde(default)]
    pub operator_alpha_long: Option<String>,
    #[serde(default)]
    pub operator_alpha_short: Option<String>,
}

impl RawCellInfo {
    /// Technology tag, folded to the closed enum. Anything the recorder
    /// does not know collapses to Unknown.
    pub fn radio_type(&self) -> RadioType {
        match self.radio.to_ascii_lowercase().as_str() {
            "cdma" => RadioType::Cdma,
            "gsm" => RadioType::Gsm,
            "lte" => RadioType::Lte,
            "nr" => RadioType::Nr,
            "tdscdma" => RadioType::Tdscdma,
            "wcdma" => RadioType::Wcdma,
            _ => RadioType::Unknown,
        }
    }
}

/// mcc/mnc arrive as numbers from termux but as strings from other
/// frontends; accept both.
fn de_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Num(i64),
        Str(String),
    }
    Ok(Option::<Code>::deserialize(deserializer)?.map(|c| match c {
        Code::Num(n) => n.to_string(),
        Code::Str(s) => s,
    }))
}

/// Seam between the recorder and the host device. The real implementation
/// shells out to the Termux:API tools; tests script it.
pub trait Platform: Send + Sync {
    fn has_permission(&self, scope: PermissionScope) -> bool;
    /// Fresh fix, GPS provider. Used by the recording subscription.
    fn read_location(&self) -> Result<RawLocation, SensorError>;
    /// Cached last known fix. Used by the single-shot snapshot.
    fn last_location(&self) -> Result<RawLocation, SensorError>;
    fn read_cell_info(&self) -> Result<Vec<RawCellInfo>, SensorError>;
    /// Fire-and-forget user-visible notice (toast on device, stderr always).
    fn notify(&self, message: &str);
}

/// Real device bindings via the Termux:API command-line tools.
pub struct TermuxPlatform;

impl TermuxPlatform {
    pub fn new() -> Self {
        TermuxPlatform
    }

    fn location(&self, request: &str) -> Result<RawLocation, SensorError> {
        let output = Command::new("termux-location")
            .args(["-p", "gps", "-r", request])
            .output()
            .map_err(|e| SensorError::Unsupported(format!("termux-location: {e}")))?;
        if !output.status.success() {
            return Err(SensorError::Failed(format!(
                "termux-location exited with {}",
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_location_output(&text)
    }
}

impl Default for TermuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for TermuxPlatform {
    fn has_permission(&self, _scope: PermissionScope) -> bool {
        // Termux has no direct permission query; probe with a cheap cached
        // read and treat a permission error (or a missing bridge) as not
        // granted. All three scopes ride on the same Termux:API grant.
        match Command::new("termux-location")
            .args(["-p", "passive", "-r", "last"])
            .output()
        {
            Ok(output) => !probe_denies_permission(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Err(_) => false,
        }
    }

    fn read_location(&self) -> Result<RawLocation, SensorError> {
        self.location("once")
    }

    fn last_location(&self) -> Result<RawLocation, SensorError> {
        self.location("last")
    }

    fn read_cell_info(&self) -> Result<Vec<RawCellInfo>, SensorError> {
        // A missing tool means the device cannot answer the query at all;
        // anything after a successful spawn is an ordinary read failure.
        let output = Command::new("termux-telephony-cellinfo")
            .output()
            .map_err(|e| SensorError::Unsupported(format!("termux-telephony-cellinfo: {e}")))?;
        cell_info_from_output(output)
    }

    fn notify(&self, message: &str) {
        eprintln!("[notice] {message}");
        // Reap the toast in the background; an unwaited child would sit in
        // the process table as a zombie for the rest of the session.
        if let Ok(mut child) = Command::new("termux-toast").arg(message).spawn() {
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
    }
}

/// Termux:API reports a denied grant as a JSON `error` object on stdout
/// ("Location permission not granted") while the underlying binder call
/// echoes a SecurityException on stderr. Anything else is not a denial,
/// even if the word "permission" happens to appear in a fix payload.
fn probe_denies_permission(stdout: &str, stderr: &str) -> bool {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout.trim()) {
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return error.to_ascii_lowercase().contains("permission");
        }
    }
    stderr.contains("SecurityException") || stderr.contains("permission not granted")
}

fn cell_info_from_output(output: std::process::Output) -> Result<Vec<RawCellInfo>, SensorError> {
    if !output.status.success() {
        return Err(SensorError::Failed(format!(
            "termux-telephony-cellinfo exited with {}",
            output.status
        )));
    }
    parse_cell_info_output(&String::from_utf8_lossy(&output.stdout))
}

pub fn parse_location_output(text: &str) -> Result<RawLocation, SensorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SensorError::Failed("empty location output".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|e| SensorError::Failed(format!("bad location json: {e}")))
}

pub fn parse_cell_info_output(text: &str) -> Result<Vec<RawCellInfo>, SensorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SensorError::Unsupported(
            "no cell info reported".to_string(),
        ));
    }
    serde_json::from_str(trimmed).map_err(|e| SensorError::Failed(format!("bad cell json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_output() {
        let text = r#"{
            "latitude": 43.8041,
            "longitude": 143.8944,
            "altitude": 99.3,
            "accuracy": 12.0,
            "bearing": 0.0,
            "speed": 1.4,
            "provider": "gps"
        }"#;
        let fix = parse_location_output(text).unwrap();
        assert!((fix.longitude - 143.8944).abs() < 1e-9);
        assert!((fix.altitude - 99.3).abs() < 1e-9);
        assert_eq!(fix.provider, "gps");
    }

    #[test]
    fn test_parse_location_empty_is_failure() {
        assert!(matches!(
            parse_location_output("  \n"),
            Err(SensorError::Failed(_))
        ));
    }

    #[test]
    fn test_parse_cell_info_list() {
        let text = r#"[
            {"type": "lte", "registered": true, "asu": 26, "dbm": -88,
             "level": 3, "ci": 123456789, "pci": 234, "tac": 12345,
             "mcc": 440, "mnc": 50},
            {"type": "gsm", "registered": false, "asu": 14, "dbm": -95,
             "level": 2, "cid": 2468, "lac": 1234, "mcc": "440", "mnc": "10"}
        ]"#;
        let cells = parse_cell_info_output(text).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].radio_type(), RadioType::Lte);
        assert_eq!(cells[0].ci, Some(123_456_789));
        assert_eq!(cells[0].mcc.as_deref(), Some("440"));
        assert!(cells[0].registered);
        assert_eq!(cells[1].radio_type(), RadioType::Gsm);
        assert_eq!(cells[1].cid, Some(2468));
        assert_eq!(cells[1].mnc.as_deref(), Some("10"));
        assert!(!cells[1].registered);
    }

    #[test]
    fn test_unrecognized_radio_folds_to_unknown() {
        let text = r#"[{"type": "umts2100", "asu": 1, "dbm": -110, "level": 0}]"#;
        let cells = parse_cell_info_output(text).unwrap();
        assert_eq!(cells[0].radio_type(), RadioType::Unknown);
    }

    #[test]
    fn test_empty_cell_output_is_unsupported() {
        assert!(matches!(
            parse_cell_info_output(""),
            Err(SensorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_probe_detects_permission_denial() {
        assert!(probe_denies_permission(
            r#"{"error": "Location permission not granted"}"#,
            ""
        ));
        assert!(probe_denies_permission(
            "",
            "java.lang.SecurityException: uid 10123 lacks ACCESS_FINE_LOCATION"
        ));
    }

    #[test]
    fn test_probe_ignores_incidental_permission_mentions() {
        // A fix payload is not a denial, whatever its fields contain.
        assert!(!probe_denies_permission(
            r#"{"latitude": 43.8, "longitude": 143.89, "provider": "permission_test_fused"}"#,
            ""
        ));
        assert!(!probe_denies_permission("", "unrelated diagnostic line"));
        assert!(!probe_denies_permission("", ""));
        // An error object about something else is not a denial either.
        assert!(!probe_denies_permission(
            r#"{"error": "Location service disabled"}"#,
            ""
        ));
    }

    #[test]
    fn test_cell_info_nonzero_exit_is_failed_not_unsupported() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::{ExitStatus, Output};

        let ok = Output {
            status: ExitStatus::from_raw(0),
            stdout: br#"[{"type": "lte", "asu": 20, "dbm": -90, "level": 3}]"#.to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(cell_info_from_output(ok).unwrap().len(), 1);

        let crashed = Output {
            // Raw wait status 256 = exit code 1.
            status: ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert!(matches!(
            cell_info_from_output(crashed),
            Err(SensorError::Failed(_))
        ));
    }

    #[test]
    fn test_missing_cell_tool_reads_as_unsupported() {
        // No Termux:API bridge on the test host.
        assert!(matches!(
            TermuxPlatform::new().read_cell_info(),
            Err(SensorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_notify_without_toast_tool_returns_immediately() {
        // The toast is fire-and-forget; a missing tool must not panic or
        // leave anything behind.
        TermuxPlatform::new().notify("hello");
    }
}
