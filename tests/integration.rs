use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

fn closed_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("policies")).unwrap();
    fs::write(
        files_dir.join("safety.txt"),
        "The fire exit is on the second floor. Employees must wear helmets at all times.",
    )
    .unwrap();
    fs::write(
        files_dir.join("policies/leave.md"),
        "Annual leave requests must be submitted two weeks in advance.",
    )
    .unwrap();
    fs::write(files_dir.join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

    let config_content = format!(
        r#"[embedding]
provider = "hash"

[storage]
path = "{}/data/docqa.sqlite"

{}
"#,
        root.display().to_string().replace('\\', "/"),
        extra_config
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("DOCQA_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn files_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/docqa.sqlite").exists());

    let (_, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_ingest_directory_and_ask() {
    let (_tmp, config_path) = setup_test_env("");
    let dir = files_dir(&config_path);

    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest", &dir]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("leave.md: 1 units"), "stdout: {}", stdout);
    assert!(stdout.contains("safety.txt: 2 units"), "stdout: {}", stdout);
    assert!(stdout.contains("ingested 2 documents, 3 units"));
    assert!(!stdout.contains("logo.png"));

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "Where is the fire exit?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("Source: safety.txt"), "stdout: {}", stdout);
    assert!(stdout.contains("The fire exit is on the second floor"));
    assert!(stdout.contains("Confidence:"));
}

#[test]
fn test_ask_json_output() {
    let (_tmp, config_path) = setup_test_env("[retrieval]\nexcerpt_chars = 12\n");
    let dir = files_dir(&config_path);
    run_docqa(&config_path, &["ingest", &dir]);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "When are leave requests due?", "--json"],
    );
    assert!(success, "ask --json failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(json["answer"].as_str().unwrap().contains("leave requests"));
    let sources = json["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["source"], "leave.md");
    assert_eq!(sources[0]["content"], "Annual leave...");
    assert!(json["confidence"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_ingest_text_with_id() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &[
            "ingest",
            "--text",
            "The cafeteria opens at eight in the morning.",
            "--id",
            "notice",
        ],
    );
    assert!(success, "ingest --text failed: {}", stderr);
    assert!(stdout.contains("notice: 1 units"));

    let (stdout, _, success) = run_docqa(&config_path, &["ask", "When does the cafeteria open?"]);
    assert!(success);
    assert!(stdout.contains("Source: notice"));
}

#[test]
fn test_ask_empty_knowledge_base() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "Where is the fire exit?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("No relevant content found."));
}

#[test]
fn test_empty_question_is_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_docqa(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("question"), "stderr: {}", stderr);
}

#[test]
fn test_unreachable_composer_falls_back_to_passage() {
    let composer = format!(
        "[composer]\nprovider = \"ollama\"\nmodel = \"llama3\"\nurl = \"http://127.0.0.1:{}\"\nmax_retries = 0\ntimeout_secs = 2\n",
        closed_port()
    );
    let (_tmp, config_path) = setup_test_env(&composer);
    let dir = files_dir(&config_path);
    run_docqa(&config_path, &["ingest", &dir]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "Where is the fire exit?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(
        stdout.contains("Answer: The fire exit is on the second floor"),
        "stdout: {}",
        stdout
    );
    assert!(stdout.contains("Source: safety.txt"));
}

#[test]
fn test_reset_clears_knowledge_base() {
    let (_tmp, config_path) = setup_test_env("");
    let dir = files_dir(&config_path);
    run_docqa(&config_path, &["ingest", &dir]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["reset"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("Knowledge base cleared."));

    let (stdout, _, _) = run_docqa(&config_path, &["ask", "Where is the fire exit?"]);
    assert!(stdout.contains("No relevant content found."));
}

#[test]
fn test_stats_reports_counts() {
    let (_tmp, config_path) = setup_test_env("");
    let dir = files_dir(&config_path);
    run_docqa(&config_path, &["ingest", &dir]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:   2"), "stdout: {}", stdout);
    assert!(stdout.contains("Units:       3"));
    assert!(stdout.contains("Model:       hash"));
    assert!(stdout.contains("Dimensions:  384"));
}

#[test]
fn test_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_docqa(&config_path, &["ingest", "/definitely/not/here"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env("[retrieval]\nk = 0\n");
    let (_, stderr, success) = run_docqa(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.k"));
}
