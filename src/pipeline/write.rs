//! Output: add the detected corrections to each page's `/Rotate` entry.
//!
//! Rotation is applied as page metadata rather than by re-rendering, so text,
//! vector graphics and embedded images survive untouched and the output has
//! exactly the same pages as the input. The effective rotation of a page is
//! its own `/Rotate` or, if absent, the nearest one inherited from the page
//! tree; the new value is always written on the page itself.
//!
//! Writes go to a temporary file in the destination folder which is then
//! renamed over the target, so an interrupted run never leaves a truncated
//! PDF behind.

use crate::error::AutoRotateError;
use crate::oracle::Rotation;
use lopdf::{Document, Object, ObjectId};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Guard against cyclic `/Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// What [`write_corrected`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub pages: usize,
    /// Pages whose `/Rotate` changed.
    pub rotated: usize,
    /// True when no page needed a change and the input was copied as-is.
    pub copied_verbatim: bool,
}

/// Write `input` to `output` with `corrections[i]` added to page `i + 1`.
///
/// `corrections` must have one entry per page. When every entry is
/// [`Rotation::Deg0`] the input bytes are copied unchanged, so running the
/// tool again over its own output is a no-op.
pub fn write_corrected(
    input: &Path,
    output: &Path,
    corrections: &[Rotation],
) -> Result<WriteSummary, AutoRotateError> {
    let mut doc = Document::load(input).map_err(|e| AutoRotateError::CorruptPdf {
        path: input.to_path_buf(),
        detail: e.to_string(),
    })?;

    let pages = doc.get_pages();
    if pages.len() != corrections.len() {
        return Err(AutoRotateError::PageCountMismatch {
            path: input.to_path_buf(),
            expected: corrections.len(),
            actual: pages.len(),
        });
    }

    // A broken input must not leave an empty mirrored folder.
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(output, e))?;
    }

    if corrections.iter().all(|r| r.is_identity()) {
        copy_atomically(input, output)?;
        debug!("{}: no rotation needed, copied", input.display());
        return Ok(WriteSummary {
            pages: pages.len(),
            rotated: 0,
            copied_verbatim: true,
        });
    }

    let mut rotated = 0;
    // get_pages() is keyed by 1-indexed page number, in document order.
    for (&page_id, correction) in pages.values().zip(corrections) {
        if correction.is_identity() {
            continue;
        }
        let existing = effective_rotation(&doc, page_id);
        let new_rotation = existing.then(*correction);
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Rotate", Object::Integer(i64::from(new_rotation.degrees())));
            rotated += 1;
        }
        debug!(
            "page {:?}: /Rotate {} → {}",
            page_id,
            existing.degrees(),
            new_rotation.degrees()
        );
    }

    save_atomically(&mut doc, output)?;
    info!(
        "Wrote {} ({} of {} pages rotated)",
        output.display(),
        rotated,
        pages.len()
    );

    Ok(WriteSummary {
        pages: pages.len(),
        rotated,
        copied_verbatim: false,
    })
}

/// The `/Rotate` in effect for a page, following `/Parent` links.
///
/// Values that are not a multiple of 90 are treated as 0, which is what
/// viewers do.
pub fn effective_rotation(doc: &Document, page_id: ObjectId) -> Rotation {
    let mut current = Some(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(value) = dict.get(b"Rotate") {
            let degrees = match value {
                Object::Integer(n) => Some(*n),
                Object::Real(r) => Some(r.round() as i64),
                _ => None,
            };
            return degrees
                .and_then(Rotation::from_degrees)
                .unwrap_or_default();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Rotation::Deg0
}

fn write_failed(output: &Path, source: std::io::Error) -> AutoRotateError {
    AutoRotateError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    }
}

fn temp_beside(output: &Path) -> Result<NamedTempFile, AutoRotateError> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).map_err(|e| write_failed(output, e))
}

fn save_atomically(doc: &mut Document, output: &Path) -> Result<(), AutoRotateError> {
    let mut tmp = temp_beside(output)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        doc.save_to(&mut writer)
            .map_err(|e| write_failed(output, std::io::Error::other(e.to_string())))?;
        writer.flush().map_err(|e| write_failed(output, e))?;
    }
    tmp.persist(output).map_err(|e| write_failed(output, e.error))?;
    Ok(())
}

fn copy_atomically(input: &Path, output: &Path) -> Result<(), AutoRotateError> {
    let mut tmp = temp_beside(output)?;
    let mut src = std::fs::File::open(input).map_err(|e| AutoRotateError::OpenFailed {
        path: input.to_path_buf(),
        source: e,
    })?;
    std::io::copy(&mut src, tmp.as_file_mut()).map_err(|e| write_failed(output, e))?;
    tmp.persist(output).map_err(|e| write_failed(output, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use std::path::PathBuf;

    /// Build a PDF with one page per entry; `Some(n)` sets the page's own
    /// `/Rotate`. `tree_rotate` goes on the `/Pages` node.
    fn make_pdf(path: &Path, page_rotations: &[Option<i64>], tree_rotate: Option<i64>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for rotate in page_rotations {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
            };
            if let Some(r) = rotate {
                page.set("Rotate", Object::Integer(*r));
            }
            kids.push(doc.add_object(page).into());
        }
        let mut tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_rotations.len() as i64,
        };
        if let Some(r) = tree_rotate {
            tree.set("Rotate", Object::Integer(r));
        }
        doc.objects.insert(pages_id, Object::Dictionary(tree));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn rotations(path: &Path) -> Vec<u16> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| effective_rotation(&doc, id).degrees())
            .collect()
    }

    fn paths(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
        (dir.path().join("in.pdf"), dir.path().join("out/sub/in.pdf"))
    }

    #[test]
    fn adds_corrections_to_existing_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        make_pdf(&input, &[None, Some(90), Some(270)], None);

        let summary = write_corrected(
            &input,
            &output,
            &[Rotation::Deg180, Rotation::Deg0, Rotation::Deg180],
        )
        .unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.rotated, 2);
        assert!(!summary.copied_verbatim);
        assert_eq!(rotations(&output), vec![180, 90, 90]);
    }

    #[test]
    fn inherited_rotation_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        make_pdf(&input, &[None, Some(0)], Some(90));

        assert_eq!(rotations(&input), vec![90, 0]);
        write_corrected(&input, &output, &[Rotation::Deg90, Rotation::Deg90]).unwrap();
        assert_eq!(rotations(&output), vec![180, 90]);
    }

    #[test]
    fn identity_corrections_copy_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        make_pdf(&input, &[Some(90), None], None);

        let summary = write_corrected(&input, &output, &[Rotation::Deg0; 2]).unwrap();
        assert!(summary.copied_verbatim);
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[test]
    fn page_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        make_pdf(&input, &[None, None], None);

        let err = write_corrected(&input, &output, &[Rotation::Deg90]).unwrap_err();
        assert!(matches!(
            err,
            AutoRotateError::PageCountMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(!output.exists());
    }

    #[test]
    fn garbage_input_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        std::fs::write(&input, b"%PDF-1.4\nthis is not a pdf").unwrap();

        let err = write_corrected(&input, &output, &[Rotation::Deg90]).unwrap_err();
        assert!(matches!(err, AutoRotateError::CorruptPdf { .. }));
        assert!(!output.exists());
        assert!(!dir.path().join("out").exists(), "no folder for a broken input");
    }

    #[test]
    fn odd_rotate_values_count_as_upright() {
        let dir = tempfile::tempdir().unwrap();
        let (input, _) = paths(&dir);
        make_pdf(&input, &[Some(45), Some(-90), Some(450)], None);
        assert_eq!(rotations(&input), vec![0, 270, 90]);
    }

    #[test]
    fn overwrites_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = paths(&dir);
        make_pdf(&input, &[None], None);
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        std::fs::write(&output, b"stale").unwrap();

        write_corrected(&input, &output, &[Rotation::Deg270]).unwrap();
        assert_eq!(rotations(&output), vec![270]);
    }
}
