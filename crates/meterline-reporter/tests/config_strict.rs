#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use meterline_reporter::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
file:
  directory: "/tmp/m"
  keep_filez: 3 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.report.frequency_secs, 60);
    assert_eq!(cfg.report.initial_delay(), Duration::from_secs(60));
    assert!(cfg.file.enabled);
    assert_eq!(cfg.file.timestamp_format, "%Y%m%d");
    assert!(!cfg.statsd.enabled);
    assert_eq!(cfg.statsd.port, 8125);
    assert!(cfg.json.enabled);
    assert_eq!(cfg.request_timing.threshold_percent, 0.0);
    assert!(!cfg.ops.enabled);
}

#[test]
fn full_config_round_trip() {
    let ok = r#"
version: 1
report:
  frequency_secs: 10
  initial_delay_secs: 2
  include: ["web.*", "*Resource"]
file:
  directory: "/var/lib/app/metrics"
  base_file_name: "app"
  extension: "log"
  keep_files: 3
  timestamp_format: "%Y%m%d%H"
statsd:
  enabled: true
  host: "127.0.0.1"
  port: 9125
  prefix: "svc"
  max_name_bytes: 120
  max_packet_bytes: 1400
  include_tags: false
json:
  history: 5
request_timing:
  threshold_percent: 2.5
  capacity: 50
ops:
  enabled: true
  listen: "127.0.0.1:0"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.report.interval(), Duration::from_secs(10));
    assert_eq!(cfg.report.initial_delay(), Duration::from_secs(2));
    assert_eq!(cfg.report.include, vec!["web.*", "*Resource"]);
    assert_eq!(cfg.file.keep_files, 3);
    assert_eq!(cfg.statsd.prefix.as_deref(), Some("svc"));
    assert!(!cfg.statsd.include_tags);
    assert_eq!(cfg.json.history, 5);
    assert_eq!(cfg.request_timing.capacity, 50);
    assert_eq!(cfg.ops.listen_addr().unwrap().port(), 0);
}

#[test]
fn wrong_version_rejected() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert!(err.to_string().contains("version"), "{err}");
}

#[test]
fn out_of_range_values_rejected() {
    let cases = [
        "version: 1\nreport: { frequency_secs: 0 }\n",
        "version: 1\nfile: { keep_files: 0 }\n",
        "version: 1\nfile: { base_file_name: \"a/b\" }\n",
        "version: 1\nfile: { extension: \".csv\" }\n",
        "version: 1\nstatsd: { enabled: true, port: 0 }\n",
        "version: 1\nstatsd: { enabled: true, max_packet_bytes: 10 }\n",
        "version: 1\nrequest_timing: { threshold_percent: 101 }\n",
        "version: 1\nops: { enabled: true, listen: \"nope\" }\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.kind().as_str(), "CONFIG", "{case}");
    }
}

#[test]
fn disabled_sections_skip_validation() {
    // port 0 is only an error when statsd is on
    let cfg = config::load_from_str("version: 1\nstatsd: { enabled: false, port: 0 }\n");
    assert!(cfg.is_ok());
}

#[test]
fn missing_file_is_config_error() {
    let err = config::load_from_file("/definitely/not/here/meterline.yaml").expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}
