// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn base_tokens() -> Vec<String> {
    vec![
        "api.url=https://crs.example".into(),
        "api.mailbox=tenant-1".into(),
        "delayShutdownInternal=2000".into(),
        "inventory.environment.allow=*".into(),
        "inventory.environment.deny=SECRET_*".into(),
        "inventory.system.properties.allow=java.*,os.*".into(),
        "inventory.system.properties.deny=".into(),
    ]
}

#[test]
fn parses_mandatory_options() {
    let opts = Options::parse(base_tokens()).unwrap();
    assert_eq!(opts.api_url, "https://crs.example");
    assert_eq!(opts.mailbox, "tenant-1");
    assert_eq!(opts.delay_shutdown, Duration::from_millis(2000));
    assert!(opts.unknown.is_empty());
}

#[parameterized(
    url = { "api.url" },
    mailbox = { "api.mailbox" },
    shutdown = { "delayShutdownInternal" },
    env_allow = { "inventory.environment.allow" },
    props_deny = { "inventory.system.properties.deny" },
)]
fn missing_mandatory_key_refuses_startup(dropped: &str) {
    let tokens: Vec<String> = base_tokens()
        .into_iter()
        .filter(|t| !t.starts_with(&format!("{dropped}=")))
        .collect();
    let err = Options::parse(tokens).unwrap_err();
    assert!(matches!(err, OptionsError::MissingMandatory(_)), "got {err:?}");
}

#[test]
fn optional_keys_round_trip() {
    let mut tokens = base_tokens();
    tokens.push("accessKey=k-123".into());
    tokens.push("keystore=/etc/crs/trust.pem".into());
    tokens.push("numConcurrentConnections=4".into());
    tokens.push("backupJfrChunks=true".into());
    tokens.push("heapBufferSize=65536".into());

    let opts = Options::parse(tokens).unwrap();
    assert_eq!(opts.access_key.as_deref(), Some("k-123"));
    assert_eq!(opts.keystore, Some(PathBuf::from("/etc/crs/trust.pem")));
    assert_eq!(opts.num_concurrent_connections, Some(4));
    assert!(opts.backup_jfr_chunks);
    assert_eq!(opts.heap_buffer_size, Some(65536));
}

#[test]
fn unknown_keys_are_collected_not_fatal() {
    let mut tokens = base_tokens();
    tokens.push("someFutureOption=1".into());
    let opts = Options::parse(tokens).unwrap();
    assert_eq!(opts.unknown, vec!["someFutureOption".to_string()]);
}

#[test]
fn malformed_token_is_rejected() {
    let mut tokens = base_tokens();
    tokens.push("notAnOption".into());
    assert!(matches!(
        Options::parse(tokens).unwrap_err(),
        OptionsError::Malformed(_)
    ));
}

#[test]
fn later_tokens_win() {
    let mut tokens = base_tokens();
    tokens.push("api.mailbox=tenant-2".into());
    let opts = Options::parse(tokens).unwrap();
    assert_eq!(opts.mailbox, "tenant-2");
}

#[parameterized(
    plain = { "log=info", None, LogLevel::Info, false, false },
    tagged = { "log+jar=debug", Some("jar"), LogLevel::Debug, false, false },
    stack = { "log+net=error+stack", Some("net"), LogLevel::Error, true, false },
    time = { "log=warning+time", None, LogLevel::Warning, false, true },
    both = { "log+io=trace+stack+time", Some("io"), LogLevel::Trace, true, true },
)]
fn log_option_grammar(
    token: &str,
    tag: Option<&str>,
    level: LogLevel,
    stack: bool,
    time: bool,
) {
    let mut tokens = base_tokens();
    tokens.push(token.into());
    let opts = Options::parse(tokens).unwrap();
    let log = &opts.log_options[0];
    assert_eq!(log.tag.as_deref(), tag);
    assert_eq!(log.level, level);
    assert_eq!(log.stack, stack);
    assert_eq!(log.time, time);
}

#[parameterized(
    bad_level = { "log=loud" },
    bad_modifier = { "log=info+color" },
)]
fn bad_log_option_is_rejected(token: &str) {
    let mut tokens = base_tokens();
    tokens.push(token.into());
    assert!(Options::parse(tokens).is_err());
}

#[test]
fn inventory_filter_applies_allow_then_deny() {
    let opts = Options::parse(base_tokens()).unwrap();
    assert!(opts.environment_filter.keeps("PATH"));
    assert!(!opts.environment_filter.keeps("SECRET_TOKEN"));
    assert!(opts.system_properties_filter.keeps("java.version"));
    assert!(!opts.system_properties_filter.keeps("user.name"));
}

#[test]
fn bad_glob_is_rejected() {
    let tokens: Vec<String> = base_tokens()
        .into_iter()
        .map(|t| {
            if t.starts_with("inventory.environment.allow=") {
                "inventory.environment.allow=[".to_string()
            } else {
                t
            }
        })
        .collect();
    assert!(matches!(
        Options::parse(tokens).unwrap_err(),
        OptionsError::InvalidGlob { .. }
    ));
}
