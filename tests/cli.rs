use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    Command::cargo_bin("translation-generator").unwrap()
}

#[test]
fn lists_supported_languages() {
    bin()
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supported target languages"))
        .stdout(predicate::str::contains("es"))
        .stdout(predicate::str::contains("日本語"));
}

#[test]
fn help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn generate_requires_a_link() {
    bin()
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<LINK>"));
}
