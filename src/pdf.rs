//! Issue-level PDF merging and optional page rasterization.
//!
//! [`merge_pdfs`] concatenates the ordered per-unit capture buffers into one
//! document and verifies that the merged page count equals the sum of the
//! units' assigned page ranges; a mismatch means a corrupted capture or a
//! non-PDF buffer slipped through the adapter and aborts the issue.
//!
//! [`rasterize_pages`] shells out to `pdftoppm` to produce one PNG per
//! physical page. It only runs when images were explicitly requested, and
//! only then is its failure fatal.

use crate::error::ArchiveError;
use crate::models::ContentUnit;
use crate::utils::image_filename;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// A rasterized physical page.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: usize,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Merge the ordered capture buffers into a single issue-level PDF.
///
/// The merged page count must equal the sum of the units' page-range
/// lengths; any disagreement is a fatal
/// [`ArchiveError::MergeInconsistency`].
#[instrument(level = "info", skip_all, fields(units = units.len()))]
pub fn merge_pdfs(units: &[ContentUnit]) -> Result<Vec<u8>, ArchiveError> {
    let expected: usize = units.iter().map(|u| u.page_range.len()).sum();

    let mut max_id = 1u32;
    let mut page_order: Vec<ObjectId> = Vec::new();
    let mut pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for unit in units {
        let mut doc = Document::load_mem(&unit.pdf)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so values come back in page
        // order; remember that order rather than relying on object IDs.
        for object_id in doc.get_pages().into_values() {
            page_order.push(object_id);
            let object = doc
                .get_object(object_id)
                .map_err(|e| ArchiveError::Merge(format!("unreadable page object: {e}")))?
                .to_owned();
            pages.insert(object_id, object);
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    // "Catalog" and "Pages" are mandatory; keep one of each and fold the
    // rest of the objects straight into the merged document.
    for (object_id, object) in objects.iter() {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                catalog_object = Some((
                    if let Some((id, _)) = catalog_object {
                        id
                    } else {
                        *object_id
                    },
                    object.clone(),
                ));
            }
            "Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref object)) = pages_object {
                        if let Ok(old_dictionary) = object.as_dict() {
                            dictionary.extend(old_dictionary);
                        }
                    }
                    pages_object = Some((
                        if let Some((id, _)) = pages_object {
                            id
                        } else {
                            *object_id
                        },
                        Object::Dictionary(dictionary),
                    ));
                }
            }
            "Page" => {}
            "Outlines" => {}
            "Outline" => {}
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let pages_object =
        pages_object.ok_or_else(|| ArchiveError::Merge("no page tree found in inputs".into()))?;
    let catalog_object = catalog_object
        .ok_or_else(|| ArchiveError::Merge("no catalog found in inputs".into()))?;

    for (object_id, object) in pages.iter() {
        if let Ok(dictionary) = object.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_object.0);
            merged
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    {
        let mut dictionary = pages_object
            .1
            .as_dict()
            .map_err(|e| ArchiveError::Merge(format!("page tree is not a dictionary: {e}")))?
            .clone();
        dictionary.set("Count", page_order.len() as u32);
        dictionary.set(
            "Kids",
            page_order
                .iter()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        );
        merged
            .objects
            .insert(pages_object.0, Object::Dictionary(dictionary));
    }

    {
        let mut dictionary = catalog_object
            .1
            .as_dict()
            .map_err(|e| ArchiveError::Merge(format!("catalog is not a dictionary: {e}")))?
            .clone();
        dictionary.set("Pages", pages_object.0);
        dictionary.remove(b"Outlines");
        merged
            .objects
            .insert(catalog_object.0, Object::Dictionary(dictionary));
    }

    merged.trailer.set("Root", catalog_object.0);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    let actual = merged.get_pages().len();
    if actual != expected {
        return Err(ArchiveError::MergeInconsistency { expected, actual });
    }

    let mut buffer = Vec::new();
    merged.save_to(&mut buffer)?;
    info!(pages = actual, bytes = buffer.len(), "Merged issue PDF");
    Ok(buffer)
}

/// Rasterize every page of the merged PDF to a PNG at the given DPI.
///
/// Spawns `pdftoppm`; the scratch directory lives only for the call. The
/// produced files are renumbered into the deterministic `page_%04d.png`
/// naming shared with the METS file group.
#[instrument(level = "info", skip_all, fields(dpi, total_pages))]
pub async fn rasterize_pages(
    pdf: &[u8],
    dpi: u32,
    total_pages: usize,
) -> Result<Vec<PageImage>, ArchiveError> {
    let scratch = tempfile::tempdir()?;
    let pdf_path = scratch.path().join("issue.pdf");
    tokio::fs::write(&pdf_path, pdf).await?;
    let prefix = scratch.path().join("page");

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(&pdf_path)
        .arg(&prefix)
        .output()
        .await
        .map_err(|e| ArchiveError::ImageConversion(format!("failed to spawn pdftoppm: {e}")))?;

    if !output.status.success() {
        return Err(ArchiveError::ImageConversion(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm names outputs page-N.png with N padded to the page-count
    // width; collect them keyed by parsed page number.
    let mut by_page: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(scratch.path()).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(number) = parse_ppm_page_number(&name) else {
            continue;
        };
        by_page.insert(number, tokio::fs::read(entry.path()).await?);
    }

    if by_page.len() != total_pages {
        return Err(ArchiveError::ImageConversion(format!(
            "expected {} page images, pdftoppm produced {}",
            total_pages,
            by_page.len()
        )));
    }

    debug!(images = by_page.len(), "Rasterized issue pages");
    Ok(by_page
        .into_iter()
        .map(|(page_number, bytes)| PageImage {
            page_number,
            filename: image_filename(page_number),
            bytes,
        })
        .collect())
}

/// Parse the page number out of a pdftoppm output name like `page-03.png`.
fn parse_ppm_page_number(filename: &str) -> Option<usize> {
    let stem = filename.strip_suffix(".png")?;
    let digits = stem.rsplit('-').next()?;
    digits.parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ContentKind, PageRange};
    use lopdf::dictionary;
    use lopdf::{Object, Stream};

    /// True when an external command can be spawned.
    fn command_available(command: &str) -> bool {
        std::process::Command::new(command)
            .arg("-v")
            .output()
            .is_ok()
    }

    /// Build a minimal valid PDF with the given number of blank letter-size
    /// pages. Shared by the merge, pipeline, and adapter tests.
    pub(crate) fn blank_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..page_count {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as u32;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub(crate) fn unit(url: &str, pdf: Vec<u8>, range: PageRange) -> ContentUnit {
        ContentUnit {
            source_url: url.to_string(),
            kind: ContentKind::Article,
            title: url.to_string(),
            plain_text: String::new(),
            pdf,
            page_range: range,
        }
    }

    #[test]
    fn test_merge_page_count_is_sum_of_inputs() {
        let units = vec![
            unit("https://p.com/a", blank_pdf(2), PageRange { start: 1, end: 2 }),
            unit("https://p.com/b", blank_pdf(1), PageRange { start: 3, end: 3 }),
        ];
        let merged = merge_pdfs(&units).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_merge_preserves_unit_order() {
        let units = vec![
            unit("https://p.com/a", blank_pdf(1), PageRange { start: 1, end: 1 }),
            unit("https://p.com/b", blank_pdf(2), PageRange { start: 2, end: 3 }),
            unit("https://p.com/c", blank_pdf(1), PageRange { start: 4, end: 4 }),
        ];
        let merged = merge_pdfs(&units).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        // Page numbers must be 1..=4 with no gaps
        let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_merge_detects_page_count_mismatch() {
        // Unit claims 3 pages but the buffer only has 2.
        let units = vec![unit(
            "https://p.com/a",
            blank_pdf(2),
            PageRange { start: 1, end: 3 },
        )];
        let err = merge_pdfs(&units).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::MergeInconsistency {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_merge_rejects_non_pdf_buffer() {
        let units = vec![unit(
            "https://p.com/a",
            b"<html>not a pdf</html>".to_vec(),
            PageRange { start: 1, end: 1 },
        )];
        let err = merge_pdfs(&units).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidPdf(_)));
    }

    #[test]
    fn test_parse_ppm_page_number() {
        assert_eq!(parse_ppm_page_number("page-1.png"), Some(1));
        assert_eq!(parse_ppm_page_number("page-03.png"), Some(3));
        assert_eq!(parse_ppm_page_number("issue.pdf"), None);
        assert_eq!(parse_ppm_page_number("page-x.png"), None);
    }

    #[tokio::test]
    async fn test_rasterize_produces_one_image_per_page() {
        if !command_available("pdftoppm") {
            eprintln!("pdftoppm not installed; skipping rasterization test");
            return;
        }
        let units = vec![unit(
            "https://p.com/a",
            blank_pdf(2),
            PageRange { start: 1, end: 2 },
        )];
        let merged = merge_pdfs(&units).unwrap();
        let images = rasterize_pages(&merged, 72, 2).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].page_number, 1);
        assert_eq!(images[0].filename, "page_0001.png");
        assert_eq!(images[1].filename, "page_0002.png");
        assert!(!images[0].bytes.is_empty());
    }
}
