//! Integration tests for PDF / DOCX import: extracted text feeds search and
//! `get`, content types come from the extension table, and unreadable
//! documents are still archived with empty text.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn docarc_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("docarc");
    path
}

fn minimal_docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup_env() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config = format!(
        "[db]\npath = \"{}/data/archive.sqlite\"\n",
        root.display()
    );
    let config_path = root.join("config/docarc.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run_docarc(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(docarc_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run docarc");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn import(config_path: &Path, file: &Path) -> String {
    let (stdout, stderr, success) = run_docarc(config_path, &["import", file.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    stdout.split_whitespace().last().unwrap().to_string()
}

#[test]
fn docx_text_is_searchable_with_snippet() {
    let (tmp, config_path) = setup_env();
    let docx = tmp.path().join("files/contract.docx");
    fs::write(
        &docx,
        minimal_docx_with_paragraphs(&["Rental contract", "The office test phrase appears here."]),
    )
    .unwrap();
    import(&config_path, &docx);

    let (stdout, _, success) = run_docarc(&config_path, &["search", "office TEST"]);
    assert!(success);
    assert!(stdout.contains("contract.docx"), "got: {}", stdout);
    assert!(
        stdout.contains("> Rental contract The office test phrase appears here."),
        "snippet should collapse line breaks, got: {}",
        stdout
    );
}

#[test]
fn docx_get_shows_paragraphs_and_content_type() {
    let (tmp, config_path) = setup_env();
    let docx = tmp.path().join("files/memo.docx");
    fs::write(&docx, minimal_docx_with_paragraphs(&["First line", "Second line"])).unwrap();
    let id = import(&config_path, &docx);

    let (stdout, _, success) = run_docarc(&config_path, &["get", &id, "--json"]);
    assert!(success);
    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["title"], "memo");
    assert_eq!(
        doc["content_type"],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(doc["plain_text"], "First line\nSecond line");
    assert_eq!(doc["folder_path"], "Root");
}

#[test]
fn unreadable_pdf_is_archived_with_empty_text() {
    let (tmp, config_path) = setup_env();
    let pdf = tmp.path().join("files/broken.pdf");
    fs::write(&pdf, b"this is not a pdf").unwrap();
    let id = import(&config_path, &pdf);

    let (stdout, _, success) = run_docarc(&config_path, &["get", &id, "--json"]);
    assert!(success);
    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["content_type"], "application/pdf");
    assert_eq!(doc["plain_text"], "");
    assert_eq!(doc["size"], 17);
}

#[test]
fn corrupt_docx_is_archived_with_empty_text() {
    let (tmp, config_path) = setup_env();
    let docx = tmp.path().join("files/corrupt.docx");
    fs::write(&docx, b"PK not really a zip").unwrap();
    let id = import(&config_path, &docx);

    let (stdout, _, success) = run_docarc(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("(no extracted text)"));
}

#[test]
fn empty_file_is_rejected() {
    let (tmp, config_path) = setup_env();
    let pdf = tmp.path().join("files/empty.pdf");
    fs::write(&pdf, b"").unwrap();

    let (_, stderr, success) = run_docarc(&config_path, &["import", pdf.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("is empty"), "stderr: {}", stderr);
}
