// Integration tests for the specmerge binary: exit codes, the --json stdout
// contract, and file outputs.
//
// Run with: cargo test -p specmerge-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn specmerge() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_specmerge"));
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

const CLEAN_CONFIG: &str = r#"
name = "Clean"

[[documents]]
id = "qty"
file = "qty.json"
filename = "Overall Qty.pdf"

[[documents]]
id = "casegoods"
file = "casegoods.json"
filename = "Casegoods.pdf"
"#;

/// Every detail record matched, nothing to review.
fn clean_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "recon.toml", CLEAN_CONFIG);
    write(
        dir.path(),
        "qty.json",
        r#"[{"item_no": "DLX-100", "qty": 239}, {"item_no": "DLX-101", "qty": 12}]"#,
    );
    write(
        dir.path(),
        "casegoods.json",
        r#"[
            {"item_no": "DLX-100", "description": "King Bed", "page": 1},
            {"item_no": "DLX-101", "description": "Queen Bed", "page": 3}
        ]"#,
    );
    dir
}

/// Adds an unmatched record and a format warning.
fn review_fixture() -> TempDir {
    let dir = clean_fixture();
    write(
        dir.path(),
        "casegoods.json",
        r#"[
            {"item_no": "dlx 100", "description": "King Bed", "page": 1},
            {"item_no": "TBL-400", "description": "Side Table", "page": 5}
        ]"#,
    );
    dir
}

// ===========================================================================
// specmerge run
// ===========================================================================

#[test]
fn clean_run_exits_zero() {
    let dir = clean_fixture();
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap(), "--json"])
        .output()
        .expect("specmerge run");

    assert!(output.status.success(), "exit: {:?}\nstderr: {}", output.status, stderr(&output));
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["meta"]["config_name"], "Clean");
    assert_eq!(val["report"]["matched_count"], 2);
    assert_eq!(val["records"].as_array().unwrap().len(), 2);
    assert!(stderr(&output).contains("2 matched"));
}

#[test]
fn review_required_exit_code() {
    let dir = review_fixture();
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap(), "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
    // JSON is still produced
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["report"]["unmatched_in_summary_count"], 1);
    assert_eq!(val["report"]["summary_only_count"], 1);
    assert_eq!(val["report"]["identifier_format_warnings"][0]["original"], "dlx 100");
    assert!(stderr(&output).contains("needs review"));
}

#[test]
fn human_mode_keeps_stdout_empty() {
    let dir = clean_fixture();
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn output_and_csv_files_written() {
    let dir = clean_fixture();
    let json_path = dir.path().join("result.json");
    let csv_path = dir.path().join("schedule.csv");
    let output = specmerge()
        .args([
            "run",
            dir.path().join("recon.toml").to_str().unwrap(),
            "--output",
            json_path.to_str().unwrap(),
            "--csv",
            csv_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["report"]["total_records"], 2);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("no,anchor,canonical_key,identifier,quantity"));
    assert!(header.ends_with("unit,description"));
    let first = lines.next().unwrap();
    assert!(first.starts_with("1,,DLX-100,DLX-100,239,matched"));
    assert_eq!(lines.count(), 1);
}

#[test]
fn same_output_and_csv_path_is_usage_error() {
    let dir = clean_fixture();
    let path = dir.path().join("out");
    let output = specmerge()
        .args([
            "run",
            dir.path().join("recon.toml").to_str().unwrap(),
            "--output",
            path.to_str().unwrap(),
            "--csv",
            path.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_extraction_file_is_runtime_error() {
    let dir = clean_fixture();
    std::fs::remove_file(dir.path().join("casegoods.json")).unwrap();
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("casegoods"));
}

#[test]
fn malformed_extraction_is_runtime_error_with_hint() {
    let dir = clean_fixture();
    write(dir.path(), "casegoods.json", "I could not read this document.");
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn two_quantity_documents_fail() {
    let dir = clean_fixture();
    let config = format!(
        "{CLEAN_CONFIG}\n[[documents]]\nid = \"qty2\"\nfile = \"qty.json\"\nfilename = \"Summary.pdf\"\n"
    );
    write(dir.path(), "recon.toml", &config);
    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(output.stdout.is_empty(), "no partial output on fatal errors");
    assert!(stderr(&output).contains("multiple quantity summary sources"));
}

#[test]
fn image_manifest_probes_files() {
    let dir = clean_fixture();

    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(200, 150))
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .unwrap();
    std::fs::create_dir(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images/bed.png"), png.into_inner()).unwrap();
    write(
        dir.path(),
        "images/manifest.json",
        r#"[
            {"document": "casegoods", "page": 2, "file": "bed.png"},
            {"document": "casegoods", "page": 4, "width": 40, "height": 40}
        ]"#,
    );
    let config = format!("{CLEAN_CONFIG}\n[images]\nmanifest = \"images/manifest.json\"\n");
    write(dir.path(), "recon.toml", &config);

    let output = specmerge()
        .args(["run", dir.path().join("recon.toml").to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    let bed = &val["records"][0];
    assert_eq!(bed["canonical_key"], "DLX-100");
    assert_eq!(bed["selected_image"]["width"], 200);
    assert_eq!(bed["selected_image"]["height"], 150);
    assert!(val["records"][1]["selected_image"].is_null());
    assert_eq!(val["report"]["missing_images"][0], "DLX-101");
}

// ===========================================================================
// specmerge validate
// ===========================================================================

#[test]
fn validate_ok() {
    let dir = clean_fixture();
    let output = specmerge()
        .args(["validate", dir.path().join("recon.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stderr(&output).contains("valid: recon 'Clean' with 2 document(s)"));
}

#[test]
fn validate_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "bad.toml",
        "name = \"Bad\"\n[merge.fields.brand]\npolicy = \"override\"\nsource = \"nowhere\"\n[[documents]]\nid = \"a\"\nfile = \"a.json\"\n",
    );
    let output = specmerge()
        .args(["validate", dir.path().join("bad.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("nowhere"));
}

#[test]
fn run_without_documents_is_invalid_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "empty.toml", "name = \"Empty\"\n");
    let output = specmerge()
        .args(["run", dir.path().join("empty.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ===========================================================================
// specmerge classify
// ===========================================================================

#[test]
fn classify_json() {
    let output = specmerge()
        .args(["classify", "Bay Tower - Overall Qty.pdf", "Casegoods & Seatings.pdf", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val[0]["role"], "quantity_summary");
    assert_eq!(val[0]["decided_by"], "filename");
    assert_eq!(val[1]["role"], "detail_specification");
}

#[test]
fn classify_uses_config_overrides() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "recon.toml",
        "name = \"Roles\"\n[roles]\nquantity_keywords = [\"totals\"]\n[[documents]]\nid = \"a\"\nfile = \"a.json\"\nfilename = \"Totals (old).pdf\"\nrole = \"detail_specification\"\n",
    );
    let output = specmerge()
        .args([
            "classify",
            "--config",
            dir.path().join("recon.toml").to_str().unwrap(),
            "Project Totals.pdf",
            "Totals (old).pdf",
            "Overall Qty.pdf",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val[0]["role"], "quantity_summary");
    assert_eq!(val[1]["role"], "detail_specification");
    assert_eq!(val[1]["decided_by"], "manual");
    assert_eq!(val[2]["role"], "detail_specification");
}
