/// Smoke tests to verify the binary runs without panicking
use std::process::Command;

fn termgrove(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_termgrove"))
        .args(args)
        .env("TERMGROVE_LOG", "off")
        .output()
        .expect("Failed to execute termgrove")
}

#[test]
fn binary_shows_help() {
    let output = termgrove(&["--help"]);

    assert!(
        output.status.success(),
        "Binary failed to run --help: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("termgrove"), "Help output should mention termgrove");
    assert!(stdout.contains("simulate"));
}

#[test]
fn binary_shows_version() {
    let output = termgrove(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn invalid_subcommand_fails_gracefully() {
    let output = termgrove(&["nonexistent-command"]);

    assert!(
        !output.status.success(),
        "Invalid subcommand should return error status"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("panicked at"),
        "Invalid subcommand should not cause panic"
    );
}

#[test]
fn simulate_prints_a_json_report() {
    let output = termgrove(&["simulate", "--ticks", "20", "--seed", "7", "--json"]);
    assert!(
        output.status.success(),
        "simulate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"nodes\""));
    assert!(stdout.contains("\"weather\""));
}

#[test]
fn simulate_is_reproducible_with_a_seed() {
    let run = || termgrove(&["simulate", "--ticks", "15", "--seed", "42", "--json"]).stdout;
    let strip_times = |out: Vec<u8>| {
        String::from_utf8_lossy(&out)
            .lines()
            .filter(|l| !l.contains("\"timestamp\""))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip_times(run()), strip_times(run()));
}

#[test]
fn unknown_theme_is_rejected() {
    let output = termgrove(&["simulate", "--theme", "sepia"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown theme"));
}

#[test]
fn themes_are_listed() {
    let output = termgrove(&["themes"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cherry-blossom"));
}
