use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs::write;
use std::path::{Path, PathBuf};

fn underwriter() -> Command {
    let mut cmd = Command::cargo_bin("underwriter").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn write_business(dir: &Path, name: &str, price: Option<&str>, titles: &[&str]) {
    let categories: Vec<_> = titles
        .iter()
        .map(|title| json!({"alias": title.to_lowercase(), "title": title}))
        .collect();
    write(
        dir.join("business.json"),
        json!({
            "name": name,
            "price": price,
            "categories": categories,
        })
        .to_string(),
    )
    .unwrap();
}

fn classify_json(dir: &Path) -> serde_json::Value {
    let output = underwriter()
        .args(["--case-dir", dir.to_str().unwrap(), "classify", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn classify_sample_case() {
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../cases/sample");
    underwriter()
        .args(["--case-dir", sample.to_str().unwrap(), "classify"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Class code 16910 (Full-service Restaurant) for Sample Restaurant",
        ))
        .stdout(predicate::str::contains(
            "Scores: nightclub 0 • bar 1 • fast food 0 • restaurant 3",
        ));
}

#[test]
fn classify_nightclub_json() {
    let temp = tempfile::tempdir().unwrap();
    write_business(temp.path(), "The Dance Club", Some("$$"), &["Nightlife", "Dance Clubs"]);
    let classification = classify_json(temp.path());
    assert_eq!(classification["class_code"], "16912");
    assert_eq!(classification["business_type"], "nightclub");
    assert_eq!(classification["scores"]["nightclub"], 11);
    assert!(classification["demoted_from"].is_null());
}

#[test]
fn classify_budget_burger_joint_as_fast_food() {
    let temp = tempfile::tempdir().unwrap();
    write_business(temp.path(), "Burger Express", Some("$"), &["Burgers", "Fast Food"]);
    assert_eq!(classify_json(temp.path())["class_code"], "16920");
}

#[test]
fn classify_without_categories_defaults_to_restaurant() {
    let temp = tempfile::tempdir().unwrap();
    write_business(temp.path(), "Nameless", None, &[]);
    underwriter()
        .args(["--case-dir", temp.path().to_str().unwrap(), "classify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Class code 16910"));
}
