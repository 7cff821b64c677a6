//! Integration tests for the tasm CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get a tasm command
fn tasm() -> Command {
    Command::cargo_bin("tasm").unwrap()
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tasm().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

const BOLT_AND_NUT: &str = "ISO-10303-21;
HEADER;
FILE_NAME('pair.stp','',(''),(''),'','','');
ENDSEC;
DATA;
#1=PRODUCT('B1','Bolt M8x20','',(#9));
#2=PRODUCT('N1','Nut M8','',(#9));
#10=CARTESIAN_POINT('',(0.,0.,0.));
#11=DIRECTION('',(0.,0.,1.));
#12=DIRECTION('',(1.,0.,0.));
#13=AXIS2_PLACEMENT_3D('',#10,#11,#12);
#20=CARTESIAN_POINT('',(0.,0.,25.));
#21=AXIS2_PLACEMENT_3D('',#20,#11,#12);
ENDSEC;
END-ISO-10303-21;
";

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    tasm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("solve"))
        .stdout(predicate::str::contains("parts"));
}

#[test]
fn test_outside_project_fails() {
    let tmp = TempDir::new().unwrap();
    tasm()
        .current_dir(tmp.path())
        .args(["parts", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a tasm project"));
}

#[test]
fn test_completions_bash() {
    tasm()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tasm"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project() {
    let tmp = TempDir::new().unwrap();
    tasm()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized tasm project"));

    assert!(tmp.path().join(".tasm/config.yaml").exists());
    assert!(tmp.path().join("catalog/parts").is_dir());
    assert!(tmp.path().join("catalog/rules/R-BOLT-NUT.yaml").exists());
}

#[test]
fn test_init_twice_warns() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[test]
fn test_parts_list_seed_catalog() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["parts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FL-DN50-PN16"))
        .stdout(predicate::str::contains("NUT-M16"))
        .stdout(predicate::str::contains("5 part(s) found"));
}

#[test]
fn test_parts_list_after_init_has_clean_stderr() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .env_remove("RUST_LOG")
        .args(["parts", "list"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_parts_list_family_filter_ids() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["parts", "list", "--family", "bolt", "-f", "id"])
        .assert()
        .success()
        .stdout("M16\n");
}

#[test]
fn test_parts_import_csv() {
    let tmp = setup_test_project();
    let csv = tmp.path().join("parts.csv");
    fs::write(
        &csv,
        "part_id,name,family,dn,pn,end_type,face_type,thread\nFL-DN80-PN16,Weld neck flange DN80,flange,80,16,,RF,\n",
    )
    .unwrap();

    tasm()
        .current_dir(tmp.path())
        .args(["parts", "import", "parts.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 part(s)"));

    tasm()
        .current_dir(tmp.path())
        .args(["parts", "list", "--search", "dn80", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dn\": 80"));
}

#[test]
fn test_rules_list() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["rules", "list", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ID\tPRIORITY"))
        .stdout(predicate::str::contains("R-BOLT-NUT\t10\tbolt_nut_pair\tSCREW"));
}

#[test]
fn test_store_sync_and_info() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["store", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rebuilt"));

    assert!(tmp.path().join(".tasm/catalog.db").exists());

    tasm()
        .current_dir(tmp.path())
        .args(["store", "info", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"parts\": 5"))
        .stdout(predicate::str::contains("\"rules\": 6"));
}

// ============================================================================
// Engine Tests
// ============================================================================

#[test]
fn test_match_product_names() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["match", "Bolt M8x20", "Nut M8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SCREW"));
}

#[test]
fn test_parse_step_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("pair.stp"), BOLT_AND_NUT).unwrap();
    tasm()
        .current_dir(tmp.path())
        .args(["parse", "pair.stp", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bolt M8x20#1"))
        .stdout(predicate::str::contains("Nut M8#1"));
}

#[test]
fn test_solve_catalog_writes_scene() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .args(["solve", "--scene", "scene.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("placement(s) found"));

    let content = fs::read_to_string(tmp.path().join("scene.json")).unwrap();
    let scene: serde_json::Value = serde_json::from_str(&content).unwrap();
    let objects = scene["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 5);
    assert_eq!(scene["metadata"]["object_count"], 5);
    assert_eq!(objects[0]["matrix"].as_array().unwrap().len(), 16);
}

#[test]
fn test_solve_step_file() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join("pair.stp"), BOLT_AND_NUT).unwrap();
    tasm()
        .current_dir(tmp.path())
        .args(["solve", "pair.stp", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"exchange\""))
        .stdout(predicate::str::contains("R-BOLT-NUT"));
}

#[test]
fn test_solve_latin1_step_file() {
    let tmp = setup_test_project();
    let mut bytes = BOLT_AND_NUT
        .replace("'Nut M8'", "'Nut M8 \u{1}'")
        .into_bytes();
    let marker = bytes.iter().position(|&b| b == 0x01).unwrap();
    bytes[marker] = 0xE9;
    fs::write(tmp.path().join("latin1.stp"), bytes).unwrap();

    tasm()
        .current_dir(tmp.path())
        .args(["solve", "latin1.stp", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"exchange\""))
        .stdout(predicate::str::contains("SCREW"));

    tasm()
        .current_dir(tmp.path())
        .args(["parse", "latin1.stp", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bolt M8x20#1"));
}

#[test]
fn test_solve_missing_step_file_falls_back() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .env_remove("RUST_LOG")
        .args(["solve", "missing.stp", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"catalog\""))
        .stderr(predicate::str::contains("missing.stp"));
}

// ============================================================================
// Validate Tests
// ============================================================================

#[test]
fn test_validate_seed_catalog() {
    let tmp = setup_test_project();
    tasm()
        .current_dir(tmp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("All files passed validation"));
}

#[test]
fn test_validate_rejects_bad_family() {
    let tmp = setup_test_project();
    fs::write(
        tmp.path().join("catalog/parts/BAD.yaml"),
        "part_id: BAD\nfamily: spring\n",
    )
    .unwrap();

    tasm()
        .current_dir(tmp.path())
        .args(["validate", "--keep-going"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed: 1 file has errors"));
}
