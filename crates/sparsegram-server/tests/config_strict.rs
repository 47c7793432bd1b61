#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sparsegram_core::DecodeLimits;
use sparsegram_server::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "127.0.0.1:9464"
histograms:
  max_name_byte: 64 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "INVALID_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "127.0.0.1:9464");
    assert_eq!(cfg.histograms.limits(), DecodeLimits::default());
}

#[test]
fn limits_flow_into_decode_limits() {
    let cfg = config::load_from_str(
        r#"
version: 1
histograms:
  max_name_bytes: 64
  max_pairs: 1000
"#,
    )
    .unwrap();
    let limits = cfg.histograms.limits();
    assert_eq!(limits.max_name_bytes, 64);
    assert_eq!(limits.max_pairs, 1000);
}

#[test]
fn rejects_bad_values() {
    for bad in [
        "version: 2\n",
        "version: 1\nserver:\n  listen: \"not-an-addr\"\n",
        "version: 1\nhistograms:\n  max_name_bytes: 0\n",
        "version: 1\nhistograms:\n  max_pairs: 0\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.kind().as_str(), "INVALID_CONFIG", "config={bad}");
    }
}

#[test]
fn missing_file_is_internal() {
    let err = config::load_from_file("does/not/exist.yaml").unwrap_err();
    assert_eq!(err.kind().as_str(), "INTERNAL");
}
