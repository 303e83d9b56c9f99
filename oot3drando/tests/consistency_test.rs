use std::{path::PathBuf, process::Command};

use anyhow::Result;

fn run_cli(seed: &str, output: &PathBuf) -> Result<bool> {
    let cli_path = env!("CARGO_BIN_EXE_oot3drando-cli");
    let status = Command::new(cli_path)
        .args(["--data", "../data/sample", "--seed", seed])
        .arg("--output-spoiler-log")
        .arg(output)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .status()?;
    Ok(status.success())
}

/// Same settings and seed must produce the same spoiler log, byte for byte.
#[test]
fn consistency_test() -> Result<()> {
    let tmp_dir = std::env::temp_dir();
    let pid = std::process::id();
    let path1 = tmp_dir.join(format!("oot3drando-consistency-{pid}-1.json"));
    let path2 = tmp_dir.join(format!("oot3drando-consistency-{pid}-2.json"));

    assert!(run_cli("12345", &path1)?);
    assert!(run_cli("12345", &path2)?);

    let log1 = std::fs::read_to_string(&path1)?;
    let log2 = std::fs::read_to_string(&path2)?;
    std::fs::remove_file(&path1)?;
    std::fs::remove_file(&path2)?;
    assert_eq!(log1, log2);

    let spoiler: serde_json::Value = serde_json::from_str(&log1)?;
    assert_eq!(spoiler["seed"], 12345);
    Ok(())
}
