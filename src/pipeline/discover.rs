//! Input discovery: turn the input folder into an ordered list of jobs.
//!
//! Only files whose extension is `pdf` (any case) are picked up; everything
//! else is ignored. The `%PDF` magic check happens later, per file, so a
//! mislabelled file fails on its own instead of aborting discovery.

use crate::error::AutoRotateError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One input file and where its corrected copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Check if the path looks like a PDF by extension.
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// List the PDFs under `input_folder`, sorted by path.
///
/// With `recursive`, sub-folders are walked and each job's output keeps the
/// file's path relative to `input_folder`. `output_folder` is skipped if it
/// lives inside the input tree.
pub fn discover_jobs(
    input_folder: &Path,
    output_folder: &Path,
    recursive: bool,
) -> Result<Vec<Job>, AutoRotateError> {
    let skip = output_folder.canonicalize().ok();
    let mut inputs = Vec::new();
    collect(input_folder, recursive, skip.as_deref(), &mut inputs).map_err(|_| {
        AutoRotateError::InputFolderNotFound {
            path: input_folder.to_path_buf(),
        }
    })?;
    inputs.sort();

    let jobs: Vec<Job> = inputs
        .into_iter()
        .map(|input| {
            let relative = input.strip_prefix(input_folder).unwrap_or(&input);
            let output = output_folder.join(relative);
            Job { input, output }
        })
        .collect();

    debug!(
        "Discovered {} PDF(s) in {}",
        jobs.len(),
        input_folder.display()
    );
    Ok(jobs)
}

fn collect(
    dir: &Path,
    recursive: bool,
    skip: Option<&Path>,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if !recursive {
                continue;
            }
            if skip.is_some_and(|s| path.canonicalize().is_ok_and(|p| p == s)) {
                debug!("Skipping output folder {}", path.display());
                continue;
            }
            // Unreadable sub-folders are skipped rather than failing the run.
            if let Err(e) = collect(&path, recursive, skip, out) {
                warn!("Cannot read {}: {}", path.display(), e);
            }
        } else if is_pdf_path(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Verify the `%PDF` magic bytes of a discovered file.
pub fn check_pdf_magic(path: &Path) -> Result<(), AutoRotateError> {
    let mut file = std::fs::File::open(path).map_err(|e| AutoRotateError::OpenFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) => {
                return Err(AutoRotateError::OpenFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    if &magic[..read] != b"%PDF" {
        return Err(AutoRotateError::NotAPdf {
            path: path.to_path_buf(),
            magic: magic[..read].to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_pdf_path() {
        assert!(is_pdf_path(Path::new("a.pdf")));
        assert!(is_pdf_path(Path::new("dir/B.PDF")));
        assert!(!is_pdf_path(Path::new("notes.txt")));
        assert!(!is_pdf_path(Path::new("pdf")));
        assert!(!is_pdf_path(Path::new("archive.pdf.zip")));
    }

    #[test]
    fn flat_discovery_ignores_non_pdfs_and_subfolders() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(input.join("b.pdf"), b"%PDF").unwrap();
        fs::write(input.join("a.PDF"), b"%PDF").unwrap();
        fs::write(input.join("readme.txt"), b"hi").unwrap();
        fs::write(input.join("nested/c.pdf"), b"%PDF").unwrap();

        let out = root.path().join("out");
        let jobs = discover_jobs(&input, &out, false).unwrap();

        let names: Vec<_> = jobs
            .iter()
            .map(|j| j.input.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
        assert_eq!(jobs[1].output, out.join("b.pdf"));
    }

    #[test]
    fn recursive_discovery_mirrors_layout_and_skips_output() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let out = input.join("corrected");
        fs::create_dir_all(input.join("2024/q1")).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(input.join("top.pdf"), b"%PDF").unwrap();
        fs::write(input.join("2024/q1/deep.pdf"), b"%PDF").unwrap();
        fs::write(out.join("stale.pdf"), b"%PDF").unwrap();

        let jobs = discover_jobs(&input, &out, true).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs
            .iter()
            .any(|j| j.output == out.join("2024/q1/deep.pdf")));
        assert!(jobs.iter().any(|j| j.output == out.join("top.pdf")));
        assert!(!jobs.iter().any(|j| j.input.ends_with("stale.pdf")));
    }

    #[test]
    fn missing_folder_is_an_error() {
        let err = discover_jobs(Path::new("/no/such/dir"), Path::new("/tmp/out"), false)
            .unwrap_err();
        assert!(matches!(err, AutoRotateError::InputFolderNotFound { .. }));
    }

    #[test]
    fn magic_check() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        let tiny = dir.path().join("tiny.pdf");
        fs::write(&good, b"%PDF-1.7\n").unwrap();
        fs::write(&bad, b"PK\x03\x04zip").unwrap();
        fs::write(&tiny, b"%P").unwrap();

        check_pdf_magic(&good).unwrap();
        match check_pdf_magic(&bad).unwrap_err() {
            AutoRotateError::NotAPdf { magic, .. } => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other}"),
        }
        assert!(matches!(
            check_pdf_magic(&tiny),
            Err(AutoRotateError::NotAPdf { .. })
        ));
        assert!(matches!(
            check_pdf_magic(&dir.path().join("missing.pdf")),
            Err(AutoRotateError::OpenFailed { .. })
        ));
    }
}
