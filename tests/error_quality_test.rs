//! Error message quality tests
//!
//! Tests that verify error messages are helpful and distinguishable.

use std::time::Duration;
use zfs_exporter::error::ExporterError;

#[test]
fn test_command_error_names_the_command() {
    // Given: A failed zpool invocation
    let error = ExporterError::command("zpool status -p tank", "exit status: 1: no such pool");

    // When: Converting to string
    let message = format!("{}", error);

    // Then: Both the command and the reason are shown
    assert!(message.contains("zpool status -p tank"));
    assert!(message.contains("no such pool"));
}

#[test]
fn test_timeout_error_includes_duration() {
    // Given: A timed out collection
    let error = ExporterError::timeout("Snapshot collection", Duration::from_secs(30));

    // When: Converting to string
    let message = format!("{}", error);

    // Then: The operation and the limit are shown
    assert!(message.contains("Snapshot collection"));
    assert!(message.contains("timed out"));
    assert!(message.contains("30s"));
}

#[test]
fn test_parse_error_includes_context() {
    // Given: A parse failure in a pool's status
    let error = ExporterError::parse("zpool status for tank", "missing config table");

    // When: Converting to string
    let message = format!("{}", error);

    // Then: Message should say what was being parsed
    assert!(message.contains("Parse error"));
    assert!(message.contains("zpool status for tank"));
    assert!(message.contains("missing config table"));
}

#[test]
fn test_unavailable_error_message_clarity() {
    // Given: A host without the ZFS module loaded
    let error = ExporterError::Unavailable("/dev/zfs and /proc/self/mounts are required".to_string());

    // When: Converting to string
    let message = format!("{}", error);

    // Then: Message should clearly indicate ZFS is not reachable
    assert!(message.contains("ZFS unavailable"));
    assert!(message.contains("/dev/zfs"));
}

#[test]
fn test_config_error_message_clarity() {
    let error = ExporterError::Config("server.addr must not be empty".to_string());
    let message = format!("{}", error);
    assert!(message.contains("Configuration error"));
    assert!(message.contains("server.addr"));
}

#[test]
fn test_io_error_conversion() {
    // Given: An I/O error reading a kstat
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");

    // When: Converting to ExporterError
    let error: ExporterError = io_err.into();

    // Then: The original message is preserved
    let message = format!("{}", error);
    assert!(message.contains("IO error"));
    assert!(message.contains("access denied"));
}

#[test]
fn test_error_variants_are_distinguishable() {
    // Given: One error of each kind
    let errors = [
        ExporterError::command("zfs list", "failed"),
        ExporterError::timeout("zfs list", Duration::from_secs(1)),
        ExporterError::parse("zfs list", "failed"),
        ExporterError::Unavailable("failed".to_string()),
        ExporterError::Config("failed".to_string()),
        ExporterError::Server("failed".to_string()),
        ExporterError::spawn(
            "zfs list",
            std::io::Error::new(std::io::ErrorKind::NotFound, "failed"),
        ),
    ];

    // When: Rendering them
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

    // Then: No two messages are the same
    for (i, a) in messages.iter().enumerate() {
        for b in &messages[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_spawn_error_names_the_command() {
    // Given: A zfs binary that is not installed
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
    let error = ExporterError::spawn("zfs get -H -p", io_err);

    // When: Converting to string
    let message = format!("{}", error);

    // Then: The command and the OS reason are shown
    assert!(message.contains("Failed to run `zfs get -H -p`"));
    assert!(message.contains("No such file or directory"));
}

#[test]
fn test_only_timeouts_and_spawn_failures_are_transient() {
    // Given: Errors from a query that could not run and from one that ran
    let timeout = ExporterError::timeout("zfs get", Duration::from_secs(10));
    let spawn = ExporterError::spawn(
        "zfs get",
        std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    );
    let exit = ExporterError::command("zfs get", "exit status: 1");
    let parse = ExporterError::parse("zfs get", "bad row");

    // Then: Only the former fail a whole collection
    assert!(timeout.is_transient());
    assert!(spawn.is_transient());
    assert!(!exit.is_transient());
    assert!(!parse.is_transient());
}
