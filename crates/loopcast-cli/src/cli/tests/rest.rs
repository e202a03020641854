//! Tests for status, schedule, combine and now.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_status() {
    match parse(&["loopcast", "status"]) {
        CliCommand::Status { show } => assert!(show.is_none()),
        _ => panic!("expected Status"),
    }
    match parse(&["loopcast", "status", "--show", "hl"]) {
        CliCommand::Status { show } => assert_eq!(show.as_deref(), Some("hl")),
        _ => panic!("expected Status with --show"),
    }
}

#[test]
fn cli_parse_schedule() {
    match parse(&["loopcast", "schedule"]) {
        CliCommand::Schedule { dry_run, seed } => {
            assert!(!dry_run);
            assert!(seed.is_none());
        }
        _ => panic!("expected Schedule"),
    }
    match parse(&["loopcast", "schedule", "--dry-run", "--seed", "42"]) {
        CliCommand::Schedule { dry_run, seed } => {
            assert!(dry_run);
            assert_eq!(seed, Some(42));
        }
        _ => panic!("expected Schedule with flags"),
    }
}

#[test]
fn cli_parse_schedule_seed_must_be_number() {
    assert!(Cli::try_parse_from(["loopcast", "schedule", "--seed", "abc"]).is_err());
}

#[test]
fn cli_parse_combine() {
    match parse(&["loopcast", "combine", "--show", "Night Shift"]) {
        CliCommand::Combine { show } => assert_eq!(show.as_deref(), Some("Night Shift")),
        _ => panic!("expected Combine"),
    }
}

#[test]
fn cli_parse_now() {
    assert!(matches!(parse(&["loopcast", "now"]), CliCommand::Now));
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["loopcast"]).is_err());
}
