// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

fn check_spdx_identifier(file_path: &Path) -> bool {
    let file = fs::File::open(file_path).unwrap();
    let reader = io::BufReader::new(file);
    if let Some(Ok(first_line)) = reader.lines().next() {
        return first_line.starts_with("// SPDX-License-Identifier: Apache-2.0");
    }
    false
}

/// Every Rust source of the crate proper starts with the license line.
#[test]
fn check_crate_rust_files_for_spdx() {
    let project_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut missing_spdx_files = Vec::new();
    let mut dir_worklist: Vec<PathBuf> = ["src", "tests", "benches"]
        .iter()
        .map(|d| project_dir.join(d))
        .filter(|d| d.is_dir())
        .collect();
    let mut checked = 0;

    while let Some(dir) = dir_worklist.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                dir_worklist.push(path);
                continue;
            }
            if path.extension().map_or(false, |e| e == "rs") {
                checked += 1;
                if !check_spdx_identifier(&path) {
                    missing_spdx_files.push(path);
                }
            }
        }
    }

    assert!(checked > 0, "no Rust sources found under {:?}", project_dir);
    assert!(
        missing_spdx_files.is_empty(),
        "The following files are missing SPDX identifiers: {:?}",
        missing_spdx_files
    );
}
