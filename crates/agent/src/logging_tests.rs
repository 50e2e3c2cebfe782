// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crs_core::LogLevel;

fn option(tag: Option<&str>, level: LogLevel, stack: bool) -> LogOption {
    LogOption { tag: tag.map(str::to_string), level, stack, time: false }
}

#[test]
fn default_filter_is_info() {
    assert_eq!(filter_directives(&[]), "info");
}

#[test]
fn untagged_option_sets_the_default_level() {
    let options = [option(None, LogLevel::Debug, false)];
    assert_eq!(filter_directives(&options), "debug");
}

#[test]
fn tagged_options_become_directives() {
    let options = [
        option(None, LogLevel::Warning, false),
        option(Some("crs_analyzer"), LogLevel::Trace, false),
        option(Some("crs_agent::connection"), LogLevel::Debug, false),
    ];
    assert_eq!(
        filter_directives(&options),
        "warn,crs_analyzer=trace,crs_agent::connection=debug"
    );
}

#[test]
fn off_maps_to_off() {
    let options = [option(None, LogLevel::Off, false)];
    assert_eq!(filter_directives(&options), "off");
}

#[test]
fn registry_records_stack_channels_with_level() {
    let dir = tempfile::tempdir().unwrap();
    let options = [
        option(Some("net"), LogLevel::Error, true),
        option(Some("jar"), LogLevel::Info, false),
        option(None, LogLevel::Info, false),
    ];
    write_channel_registry(dir.path(), &options).unwrap();

    let content =
        std::fs::read_to_string(dir.path().join(CHANNEL_REGISTRY_FILE)).unwrap();
    assert!(content.contains("net=net:error"));
    assert!(content.contains("jar=jar\n"));
}

#[test]
fn registry_is_appendable_across_modules() {
    let dir = tempfile::tempdir().unwrap();
    write_channel_registry(dir.path(), &[option(Some("a"), LogLevel::Info, false)]).unwrap();
    write_channel_registry(dir.path(), &[option(Some("b"), LogLevel::Info, false)]).unwrap();

    let content =
        std::fs::read_to_string(dir.path().join(CHANNEL_REGISTRY_FILE)).unwrap();
    assert!(content.contains("a=a"));
    assert!(content.contains("b=b"));
}
