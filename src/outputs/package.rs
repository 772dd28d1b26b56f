//! Archive bundle assembly.
//!
//! The final stage gathers the merged PDF, the METS manifest, the ALTO set,
//! and any page images into one [`ArchiveBundle`]. Filenames derive from
//! the issue name fixed at run start, so re-running the pipeline against
//! identical captured inputs reproduces the same tree byte for byte (only
//! the METS `CREATEDATE` may differ).
//!
//! Two output modes:
//! - [`ArchiveBundle::to_wire`]: an in-memory bundle with base64-encoded
//!   file bodies, for callers that zip or upload it
//! - [`ArchiveBundle::write_to_dir`]: a disk tree mirroring exactly the
//!   relative paths the METS hrefs reference

use crate::error::ArchiveError;
use crate::outputs::alto::AltoPage;
use crate::pdf::PageImage;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// The complete archival package for one issue.
#[derive(Debug, Clone)]
pub struct ArchiveBundle {
    pub issue_name: String,
    pub pdf: Vec<u8>,
    pub mets: String,
    pub alto: Vec<AltoPage>,
    pub images: Vec<PageImage>,
}

/// Transport form of a bundle: relative path plus base64 body per file.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireBundle {
    pub issue_name: String,
    pub files: Vec<WireFile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireFile {
    pub path: String,
    pub content_base64: String,
}

impl ArchiveBundle {
    pub fn pdf_filename(&self) -> String {
        format!("{}.pdf", self.issue_name)
    }

    /// Encode the bundle for wire transport. File order is fixed: PDF,
    /// METS, ALTO pages, then images.
    pub fn to_wire(&self) -> WireBundle {
        let mut files = vec![
            WireFile {
                path: self.pdf_filename(),
                content_base64: BASE64.encode(&self.pdf),
            },
            WireFile {
                path: "mets.xml".to_string(),
                content_base64: BASE64.encode(self.mets.as_bytes()),
            },
        ];
        files.extend(self.alto.iter().map(|page| WireFile {
            path: format!("alto/{}", page.filename),
            content_base64: BASE64.encode(page.xml.as_bytes()),
        }));
        files.extend(self.images.iter().map(|image| WireFile {
            path: format!("images/{}", image.filename),
            content_base64: BASE64.encode(&image.bytes),
        }));
        WireBundle {
            issue_name: self.issue_name.clone(),
            files,
        }
    }

    /// Write the bundle as a directory tree under `root`, mirroring the
    /// relative paths referenced by the METS hrefs.
    #[instrument(level = "info", skip_all, fields(issue = %self.issue_name, root = %root.display()))]
    pub async fn write_to_dir(&self, root: &Path) -> Result<(), ArchiveError> {
        fs::create_dir_all(root.join("alto")).await?;
        fs::write(root.join(self.pdf_filename()), &self.pdf).await?;
        fs::write(root.join("mets.xml"), &self.mets).await?;
        for page in &self.alto {
            fs::write(root.join("alto").join(&page.filename), &page.xml).await?;
        }
        if !self.images.is_empty() {
            fs::create_dir_all(root.join("images")).await?;
            for image in &self.images {
                fs::write(root.join("images").join(&image.filename), &image.bytes).await?;
            }
        }
        info!(
            alto = self.alto.len(),
            images = self.images.len(),
            "Wrote archive package"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{alto_filename, image_filename};

    fn bundle(with_images: bool) -> ArchiveBundle {
        ArchiveBundle {
            issue_name: "daily_princetonian_2023-03-12_120000".to_string(),
            pdf: vec![0x25, 0x50, 0x44, 0x46],
            mets: "<mets/>".to_string(),
            alto: (1..=2)
                .map(|page_number| AltoPage {
                    page_number,
                    filename: alto_filename(page_number),
                    xml: format!("<alto page=\"{page_number}\"/>"),
                })
                .collect(),
            images: if with_images {
                vec![
                    PageImage {
                        page_number: 1,
                        filename: image_filename(1),
                        bytes: vec![1, 2, 3],
                    },
                    PageImage {
                        page_number: 2,
                        filename: image_filename(2),
                        bytes: vec![4, 5, 6],
                    },
                ]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn test_wire_paths_mirror_mets_hrefs() {
        let wire = bundle(true).to_wire();
        let paths: Vec<&str> = wire.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "daily_princetonian_2023-03-12_120000.pdf",
                "mets.xml",
                "alto/alto_0001.xml",
                "alto/alto_0002.xml",
                "images/page_0001.png",
                "images/page_0002.png",
            ]
        );
    }

    #[test]
    fn test_wire_bodies_round_trip_base64() {
        let wire = bundle(false).to_wire();
        let pdf = BASE64.decode(&wire.files[0].content_base64).unwrap();
        assert_eq!(pdf, vec![0x25, 0x50, 0x44, 0x46]);
        let mets = BASE64.decode(&wire.files[1].content_base64).unwrap();
        assert_eq!(mets, b"<mets/>");
    }

    #[test]
    fn test_wire_bundle_serializes() {
        let json = serde_json::to_string(&bundle(false).to_wire()).unwrap();
        assert!(json.contains("\"issue_name\""));
        assert!(json.contains("\"content_base64\""));
    }

    #[test]
    fn test_wire_is_deterministic() {
        let a = serde_json::to_string(&bundle(true).to_wire()).unwrap();
        let b = serde_json::to_string(&bundle(true).to_wire()).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_write_to_dir_materializes_tree() {
        let dir = tempfile::tempdir().unwrap();
        bundle(true).write_to_dir(dir.path()).await.unwrap();

        assert!(
            dir.path()
                .join("daily_princetonian_2023-03-12_120000.pdf")
                .is_file()
        );
        assert!(dir.path().join("mets.xml").is_file());
        assert!(dir.path().join("alto/alto_0001.xml").is_file());
        assert!(dir.path().join("alto/alto_0002.xml").is_file());
        assert!(dir.path().join("images/page_0002.png").is_file());

        let alto = std::fs::read_to_string(dir.path().join("alto/alto_0001.xml")).unwrap();
        assert_eq!(alto, "<alto page=\"1\"/>");
    }

    #[tokio::test]
    async fn test_write_to_dir_skips_images_dir_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        bundle(false).write_to_dir(dir.path()).await.unwrap();
        assert!(!dir.path().join("images").exists());
    }
}
