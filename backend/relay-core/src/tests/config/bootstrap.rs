use crate::config::BootstrapSettings;
use crate::config::bootstrap::{
    CONFIG_PATH_VAR, RESTART_COMMAND_VAR, SYNC_MAX_ATTEMPTS_VAR, SYNC_PERIOD_SECS_VAR,
    SYNC_POLL_INTERVAL_MS_VAR, SYNC_URL_VAR,
};
use crate::error::ConfigError;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

/// **VALUE**: Verifies the variable names carry the RELAY_ prefix.
#[test]
fn given_constants_then_names_are_prefixed() {
    assert_eq!(CONFIG_PATH_VAR, "RELAY_CONFIG_PATH");
    assert_eq!(SYNC_URL_VAR, "RELAY_SYNC_URL");
    assert_eq!(RESTART_COMMAND_VAR, "RELAY_RESTART_COMMAND");
}

/// **VALUE**: Verifies defaults when only the config path is set.
///
/// **BUG THIS CATCHES**: Would catch reconciliation running without a configured URL.
#[test]
fn given_only_config_path_when_loaded_then_defaults_apply() {
    let settings =
        BootstrapSettings::from_lookup(lookup(&[(CONFIG_PATH_VAR, "/tmp/relay/config.json")]))
            .expect("settings");

    assert_eq!(settings.config_path, PathBuf::from("/tmp/relay/config.json"));
    assert_eq!(settings.sync_url, None);
    assert!(settings.sync_settings().is_none());
    assert_eq!(settings.sync_poll_interval, Duration::from_millis(5_000));
    assert_eq!(settings.sync_max_attempts, Some(3));
    assert_eq!(settings.sync_timeout, Duration::from_secs(60));
    assert_eq!(settings.sync_period, None);
    assert!(settings.restart_command.is_none());
}

/// **VALUE**: Verifies every sync knob is read and `0` attempts means unbounded.
#[test]
fn given_sync_variables_when_loaded_then_sync_settings_built() {
    let settings = BootstrapSettings::from_lookup(lookup(&[
        (CONFIG_PATH_VAR, "/tmp/relay/config.json"),
        (SYNC_URL_VAR, "https://control.example.com/config?machine="),
        (SYNC_POLL_INTERVAL_MS_VAR, "250"),
        (SYNC_MAX_ATTEMPTS_VAR, "0"),
        (SYNC_PERIOD_SECS_VAR, "600"),
        (RESTART_COMMAND_VAR, "systemctl restart relay"),
    ]))
    .expect("settings");

    let sync = settings.sync_settings().expect("sync configured");
    assert_eq!(sync.endpoint, "https://control.example.com/config?machine=");
    assert_eq!(sync.local_path, PathBuf::from("/tmp/relay/config.json"));
    assert_eq!(sync.poll_interval, Duration::from_millis(250));
    assert_eq!(sync.max_attempts, None);
    assert_eq!(settings.sync_period, Some(Duration::from_secs(600)));

    let restart = settings.restart_command.expect("restart command");
    assert_eq!(restart.program(), "systemctl");
    assert_eq!(restart.args(), ["restart", "relay"]);
}

/// **VALUE**: Verifies unparsable numbers are rejected with the variable name.
///
/// **BUG THIS CATCHES**: Would catch typos silently falling back to defaults.
#[test]
fn given_invalid_number_when_loaded_then_validation_error_names_variable() {
    let result = BootstrapSettings::from_lookup(lookup(&[
        (CONFIG_PATH_VAR, "/tmp/relay/config.json"),
        (SYNC_MAX_ATTEMPTS_VAR, "three"),
    ]));

    match result {
        Err(ConfigError::InvalidSetting { variable, value, .. }) => {
            assert_eq!(variable, SYNC_MAX_ATTEMPTS_VAR);
            assert_eq!(value, "three");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies blank values count as unset.
#[test]
fn given_blank_sync_url_when_loaded_then_sync_disabled() {
    let settings = BootstrapSettings::from_lookup(lookup(&[
        (CONFIG_PATH_VAR, "/tmp/relay/config.json"),
        (SYNC_URL_VAR, "  "),
    ]))
    .expect("settings");

    assert!(settings.sync_settings().is_none());
}

/// **VALUE**: Pins the restart command's plain whitespace splitting.
///
/// **WHY THIS MATTERS**: Operators must know quotes are not interpreted, so a quoted
/// argument with a space arrives as separate literal pieces.
///
/// **BUG THIS CATCHES**: Would catch a change in splitting rules that silently alters
/// which program and arguments the restart hook runs.
#[test]
fn given_quoted_restart_command_when_loaded_then_split_on_whitespace_literally() {
    let settings = BootstrapSettings::from_lookup(lookup(&[
        (CONFIG_PATH_VAR, "/tmp/relay/config.json"),
        (RESTART_COMMAND_VAR, "  systemctl restart 'relay svc'  "),
    ]))
    .expect("settings");

    let restart = settings.restart_command.expect("restart command");
    assert_eq!(restart.program(), "systemctl");
    assert_eq!(restart.args(), ["restart", "'relay", "svc'"]);
}

/// **VALUE**: Verifies a blank restart command means no hook.
#[test]
fn given_blank_restart_command_when_loaded_then_no_hook() {
    let settings = BootstrapSettings::from_lookup(lookup(&[
        (CONFIG_PATH_VAR, "/tmp/relay/config.json"),
        (RESTART_COMMAND_VAR, "   "),
    ]))
    .expect("settings");

    assert!(settings.restart_command.is_none());
}
