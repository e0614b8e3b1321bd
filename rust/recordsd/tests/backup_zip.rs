#[path = "../src/layout.rs"]
mod layout;
#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn read_json(path: &Path) -> serde_json::Value {
    let bytes = std::fs::read(path).expect("read json file");
    serde_json::from_slice(&bytes).expect("parse json file")
}

fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
    let f = File::create(path).expect("create bundle");
    let mut zip = zip::ZipWriter::new(f);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("start manifest");
    zip.write_all(format!("{{\"format\":\"{}\"}}", backup::BUNDLE_FORMAT_V1).as_bytes())
        .expect("write manifest");
    for (name, bytes) in entries {
        zip.start_file(*name, opts).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish");
}

fn seed_workspace(root: &Path) {
    std::fs::write(
        root.join("students.json"),
        br#"{"version":2,"students":[{"roll_no":"1","name":"Ali","father_name":"F","class":"10A","mobile_no":"1","address":"A"}]}"#,
    )
    .expect("write students");
    std::fs::write(root.join("users.json"), br#"{"t1":"pw"}"#).expect("write users");
    let user_dir = root.join("results").join("t1");
    std::fs::create_dir_all(&user_dir).expect("mkdir results");
    std::fs::write(user_dir.join("10A_midterm.pdf"), b"%PDF midterm").expect("write pdf");
    std::fs::write(user_dir.join("manifest.json"), br#"{"entries":[]}"#).expect("write manifest");
    std::fs::write(user_dir.join(".10A_final.pdf.abc.tmp"), b"partial").expect("write temp");
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("recordsd-backup-src");
    let workspace2 = temp_dir("recordsd-backup-dst");
    let out_dir = temp_dir("recordsd-backup-out");
    seed_workspace(&workspace);

    let bundle_path = out_dir.join("workspace.recordsd.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    // manifest, students, users, pdf, results manifest; the temp file is skipped
    assert_eq!(export.entry_count, 5);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    archive
        .by_name("results/t1/10A_midterm.pdf")
        .expect("result entry in bundle");
    assert!(archive.by_name("results/t1/.10A_final.pdf.abc.tmp").is_err());

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(import.entry_count, 4);

    assert_eq!(import.users_added, 1);

    for rel in ["students.json", "results/t1/10A_midterm.pdf"] {
        let original = std::fs::read(workspace.join(rel)).expect("read original");
        let restored = std::fs::read(workspace2.join(rel)).expect("read restored");
        assert_eq!(restored, original, "{} differs after import", rel);
    }
    assert_eq!(read_json(&workspace2.join("users.json")), serde_json::json!({ "t1": "pw" }));

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn non_zip_input_is_refused() {
    let out_dir = temp_dir("recordsd-backup-notzip");
    let workspace = temp_dir("recordsd-backup-notzip-dst");
    let bogus = out_dir.join("students.pkl");
    std::fs::write(&bogus, b"\x80\x04pickle").expect("write bogus");

    let err = backup::import_workspace_bundle(&bogus, &workspace).expect_err("must fail");
    assert!(err.to_string().contains("not a workspace bundle"));

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn entries_outside_the_workspace_layout_are_refused() {
    let out_dir = temp_dir("recordsd-backup-escape");
    let workspace = temp_dir("recordsd-backup-escape-dst");
    let bundle_path = out_dir.join("evil.zip");

    write_bundle(&bundle_path, &[("results/../../escape.pdf", b"nope".as_slice())]);

    let err = backup::import_workspace_bundle(&bundle_path, &workspace).expect_err("must fail");
    assert!(err.to_string().contains("unexpected bundle entry"));
    assert!(!workspace.join("results").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn import_keeps_existing_passwords_and_adds_new_users() {
    let out_dir = temp_dir("recordsd-backup-users");
    let workspace = temp_dir("recordsd-backup-users-dst");
    std::fs::write(workspace.join("users.json"), br#"{"amir":"pw1","sara":"pw2"}"#)
        .expect("write local users");
    let bundle_path = out_dir.join("users.zip");
    write_bundle(
        &bundle_path,
        &[("data/users.json", br#"{"amir":"attacker","nadia":"pw3","../x":"pw4"}"#.as_slice())],
    );

    let import = backup::import_workspace_bundle(&bundle_path, &workspace).expect("import bundle");
    assert_eq!(import.users_added, 1);
    assert_eq!(
        read_json(&workspace.join("users.json")),
        serde_json::json!({ "amir": "pw1", "sara": "pw2", "nadia": "pw3" })
    );

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn imported_results_manifest_only_names_files_it_ships() {
    let out_dir = temp_dir("recordsd-backup-manifest");
    let workspace = temp_dir("recordsd-backup-manifest-dst");
    let t1_dir = workspace.join("results").join("t1");
    std::fs::create_dir_all(&t1_dir).expect("mkdir");
    std::fs::write(t1_dir.join("9_final.pdf"), b"local").expect("write local pdf");
    std::fs::write(
        t1_dir.join("manifest.json"),
        br#"{"entries":[{"class_name":"9","exam_name":"final","file_name":"9_final.pdf"}]}"#,
    )
    .expect("write local manifest");

    let bundle_path = out_dir.join("manifest.zip");
    let manifest = br#"{"entries":[
        {"class_name":"x","exam_name":"creds","file_name":"../../users.json"},
        {"class_name":"x","exam_name":"steal","file_name":"../t2/10A_mid.pdf"},
        {"class_name":"x","exam_name":"ghost","file_name":"x_ghost.pdf"},
        {"class_name":"10A","exam_name":"mid","file_name":"10A_mid.pdf"}
    ]}"#;
    write_bundle(
        &bundle_path,
        &[
            ("results/t1/manifest.json", manifest.as_slice()),
            ("results/t1/10A_mid.pdf", b"%PDF mid".as_slice()),
        ],
    );

    backup::import_workspace_bundle(&bundle_path, &workspace).expect("import bundle");

    let rebuilt = read_json(&t1_dir.join("manifest.json"));
    let mut names: Vec<&str> = rebuilt["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|e| e["file_name"].as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["10A_mid.pdf", "9_final.pdf"]);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
