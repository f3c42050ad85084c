//! Exercises `compile_file` against a real file on disk, the way a user
//! invoking the `goxc` binary would, rather than `compile_source` over
//! an in-memory string.

use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn compiles_a_source_file_from_disk() {
    let mut file = NamedTempFile::new().expect("create temp file");
    writeln!(file, "var x int = 10; print x;").unwrap();

    let (program, module) = goxc::compile_file(file.path()).expect("compiles cleanly");
    assert!(!program.statements.is_empty());
    assert!(module.globals.contains_key("x"));
}

#[test]
fn missing_file_reports_an_io_error() {
    let err = goxc::compile_file(std::path::Path::new("/nonexistent/no-such-file.gox"))
        .expect_err("missing file should fail");
    assert!(matches!(err, goxc::GoxError::Io(_)));
}
