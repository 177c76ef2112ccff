//! End-to-end tests for the command-line interface.
#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A temp directory holding the sample encounter.
fn sample() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("encounter.json");
    skirmish(&path).arg("init").assert().success();
    (dir, path)
}

fn skirmish(encounter: &Path) -> Command {
    let mut cmd = Command::cargo_bin("skirmish").unwrap();
    cmd.arg("--encounter").arg(encounter).env_remove("RUST_LOG");
    cmd
}

fn atlas(encounter: &Path) -> serde_json::Value {
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(encounter).unwrap()).unwrap();
    json["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "Atlas")
        .unwrap()
        .clone()
}

// ---------------------------------------------------------------------------
// init / show / plugins
// ---------------------------------------------------------------------------

#[test]
fn init_refuses_to_overwrite() {
    let (_dir, path) = sample();
    skirmish(&path)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    skirmish(&path).args(["init", "--force"]).assert().success();
}

#[test]
fn show_lists_combatants() {
    let (_dir, path) = sample();
    skirmish(&path)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Atlas"))
        .stdout(predicate::str::contains("Drone"))
        .stdout(predicate::str::contains("Vega"))
        .stdout(predicate::str::contains("4 combatants"));
}

#[test]
fn plugins_lists_defaults() {
    let (_dir, path) = sample();
    skirmish(&path)
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("point_blank"))
        .stdout(predicate::str::contains("steady_aim"))
        .stdout(predicate::str::contains("knockdown"))
        .stdout(predicate::str::contains("6 plugins"));
}

#[test]
fn missing_encounter_is_an_error() {
    let dir = TempDir::new().unwrap();
    skirmish(&dir.path().join("nope.json"))
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot load encounter"));
}

// ---------------------------------------------------------------------------
// attacks
// ---------------------------------------------------------------------------

#[test]
fn attack_renders_results() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["attack", "Atlas", "Assault Rifle", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assault Rifle"))
        .stdout(predicate::str::contains("Drone"));
}

#[test]
fn attack_with_damage_is_deterministic_per_seed() {
    let (_dir, path) = sample();
    let run = || {
        skirmish(&path)
            .args(["attack", "Atlas", "Assault Rifle", "--damage", "--seed", "3"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn attack_named_target() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["attack", "Atlas", "Knife", "--target", "Brute"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Brute"));
}

#[test]
fn unknown_weapon_fails() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["attack", "Atlas", "Railgun"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Atlas has no weapon named 'Railgun'"));
}

#[test]
fn unknown_actor_fails() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["stat", "Nobody", "hull"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown combatant 'Nobody'"));
}

#[test]
fn loading_weapon_must_reload() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["attack", "Atlas", "Howitzer", "--save"])
        .assert()
        .success();
    assert_eq!(atlas(&path)["heat"]["value"], 2);
    skirmish(&path)
        .args(["attack", "Atlas", "Howitzer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Howitzer is not loaded"));
}

#[test]
fn tech_attack_renders() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["tech", "Atlas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tech Attack"));
}

// ---------------------------------------------------------------------------
// checks and tables
// ---------------------------------------------------------------------------

#[test]
fn stat_check() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["stat", "Atlas", "hull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HULL check"));
}

#[test]
fn unknown_stat_fails() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["stat", "Atlas", "charm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stat 'charm'"));
}

#[test]
fn structure_is_saved() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["structure", "Atlas", "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Structure damage"));
    assert_eq!(atlas(&path)["structure"]["value"], 3);
}

#[test]
fn config_can_disable_structure_automation() {
    let (dir, path) = sample();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{ "structure_automation": false }"#).unwrap();
    skirmish(&path)
        .args(["structure", "Atlas", "--save", "--config"])
        .arg(&config)
        .assert()
        .success();
    assert_eq!(atlas(&path)["structure"]["value"], 4);
}

#[test]
fn pilots_cannot_take_structure() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["structure", "Vega"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Vega has no structure or stress"));
}

#[test]
fn overheat_vents_heat() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["overheat", "Atlas", "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Overheat"));
    let atlas = atlas(&path);
    assert_eq!(atlas["stress"]["value"], 3);
    assert_eq!(atlas["heat"]["value"], 0);
}

#[test]
fn activate_system() {
    let (_dir, path) = sample();
    skirmish(&path)
        .args(["activate", "Atlas", "Shield Projector"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gain 4 overshield"));
}
