use crate::core::job::{JobSpec, Phase};
use crate::domain::model::{DeviceListResult, TargetDiscoveryResult, TerminalResult};
use crate::domain::ports::Storage;
use crate::utils::error::{DiscoveryError, Result};
use serde::Deserialize;
use serde_json::Value;

pub const RESULT_TYPE: &str = "result";

/// One line written by the JSON callback plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputRecord {
    #[serde(rename = "OVEHOSTED_AC/type")]
    pub kind: String,
    #[serde(rename = "OVEHOSTED_AC/body", default)]
    pub body: Value,
}

pub async fn read_terminal_result<S: Storage>(
    storage: &S,
    output_path: &str,
    spec: &JobSpec,
) -> Result<TerminalResult> {
    let data = storage.read_file(output_path).await.map_err(|e| {
        tracing::error!(
            "Error retrieving output for {} Error: {}",
            spec.phase,
            e
        );
        match e {
            DiscoveryError::IoError(source) => DiscoveryError::OutputReadError {
                phase: spec.phase.to_string(),
                path: output_path.to_string(),
                source,
            },
            other => other,
        }
    })?;

    let text = decode_output(data)?;
    let body = find_result_body(&text)?;
    parse_body(spec.phase, body)
}

fn decode_output(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|e| DiscoveryError::ParseError {
        message: format!("job output is not valid UTF-8: {}", e.utf8_error()),
    })
}

/// Body of the last `result` record in `text`. Every non-blank line must be
/// a well-formed record.
pub fn find_result_body(text: &str) -> Result<Value> {
    let mut result = None;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: OutputRecord =
            serde_json::from_str(line).map_err(|e| DiscoveryError::ParseError {
                message: format!("line {}: {}", idx + 1, e),
            })?;
        if record.kind == RESULT_TYPE {
            result = Some(record.body);
        }
    }

    result.ok_or_else(|| DiscoveryError::ParseError {
        message: "no terminal result record in job output".to_string(),
    })
}

/// Check a result body against the schema of the job that produced it.
pub fn parse_body(phase: Phase, mut body: Value) -> Result<TerminalResult> {
    let key = phase.result_key();
    let inner = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| DiscoveryError::ParseError {
            message: format!("result body has no '{}' entry", key),
        })?;

    let schema_error = |e: serde_json::Error| DiscoveryError::ParseError {
        message: format!("unexpected '{}' shape: {}", key, e),
    };

    match phase {
        Phase::IscsiDiscover => {
            let parsed: TargetDiscoveryResult = serde_json::from_value(inner).map_err(schema_error)?;
            Ok(TerminalResult::Targets(parsed.json))
        }
        Phase::IscsiGetDevices => {
            let parsed: DeviceListResult = serde_json::from_value(inner).map_err(schema_error)?;
            Ok(TerminalResult::Devices(parsed.ansible_facts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_result_wins() {
        let text = concat!(
            r#"{"OVEHOSTED_AC/type": "data", "OVEHOSTED_AC/body": "TASK [Gathering Facts]"}"#,
            "\n",
            r#"{"OVEHOSTED_AC/type": "result", "OVEHOSTED_AC/body": {"n": 1}}"#,
            "\n",
            r#"{"OVEHOSTED_AC/type": "result", "OVEHOSTED_AC/body": {"n": 2}}"#,
            "\n",
        );

        assert_eq!(find_result_body(text).unwrap(), json!({"n": 2}));
    }

    #[test]
    fn test_blank_lines_between_records_are_skipped() {
        let text = concat!(
            r#"{"OVEHOSTED_AC/type": "data", "OVEHOSTED_AC/body": "PLAY"}"#,
            "\n\n   \n",
            r#"{"OVEHOSTED_AC/type": "result", "OVEHOSTED_AC/body": {"n": 1}}"#,
            "\n\n",
        );

        assert_eq!(find_result_body(text).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn test_invalid_utf8_output_is_parse_error() {
        let mut data = br#"{"OVEHOSTED_AC/type": "result", "OVEHOSTED_AC/body": {"n": ""#.to_vec();
        data.push(0xff);
        data.extend_from_slice(br#""}}"#);

        let err = decode_output(data).unwrap_err();
        assert!(matches!(err, DiscoveryError::ParseError { .. }));
        assert_eq!(
            decode_output(b"plain\n".to_vec()).unwrap(),
            "plain\n"
        );
    }

    #[test]
    fn test_missing_result_is_parse_error() {
        let text = r#"{"OVEHOSTED_AC/type": "data", "OVEHOSTED_AC/body": "x"}"#;
        let err = find_result_body(text).unwrap_err();
        assert!(matches!(err, DiscoveryError::ParseError { .. }));
    }

    #[test]
    fn test_malformed_line_aborts_with_line_number() {
        let text = concat!(
            r#"{"OVEHOSTED_AC/type": "result", "OVEHOSTED_AC/body": {}}"#,
            "\n",
            "not json\n",
        );
        match find_result_body(text).unwrap_err() {
            DiscoveryError::ParseError { message } => assert!(message.starts_with("line 2:")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_record_without_type_is_rejected() {
        assert!(find_result_body(r#"{"OVEHOSTED_AC/body": {}}"#).is_err());
    }

    #[test]
    fn test_body_under_wrong_key_is_rejected() {
        let body = json!({"otopi_iscsi_devices": {}});
        let err = parse_body(Phase::IscsiDiscover, body).unwrap_err();
        assert!(err.to_string().contains("otopi_iscsi_targets"));
    }

    #[test]
    fn test_device_body_with_bad_shape_is_rejected() {
        let body = json!({
            "otopi_iscsi_devices": {
                "ansible_facts": {"ovirt_host_storages": [{"logical_units": [{"id": "x"}]}]}
            }
        });
        assert!(matches!(
            parse_body(Phase::IscsiGetDevices, body),
            Err(DiscoveryError::ParseError { .. })
        ));
    }

    #[test]
    fn test_parse_target_body() {
        let body = json!({
            "otopi_iscsi_targets": {
                "json": {
                    "iscsi_targets": {"iscsi_target": ["iqn.a"]},
                    "discovered_targets": {"iscsi_details": [
                        {"target": "iqn.a", "portal": "10.0.0.1:3260,1"}
                    ]}
                }
            }
        });
        match parse_body(Phase::IscsiDiscover, body).unwrap() {
            TerminalResult::Targets(t) => {
                assert_eq!(t.iscsi_targets.iscsi_target, vec!["iqn.a"]);
                assert_eq!(t.discovered_targets.iscsi_details.len(), 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
