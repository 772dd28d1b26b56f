//! Archive output generation: ALTO text layer, METS manifest, and the
//! package bundle.
//!
//! # Submodules
//!
//! - [`alto`]: Resolves per-page text and emits one ALTO XML document per
//!   physical page
//! - [`mets`]: Emits the single METS manifest cross-referencing the PDF,
//!   the ALTO set, and optional page images
//! - [`package`]: Bundles everything into a wire- or disk-ready artifact
//!
//! # Package Structure
//!
//! ```text
//! <issue-name>.pdf
//! mets.xml
//! alto/alto_0001.xml     (one per physical page)
//! images/page_0001.png   (optional, one per physical page)
//! ```
//!
//! All cross-references inside the METS document use relative `file://./`
//! hrefs so the same bundle can land on a filesystem, in an object store,
//! or inside a ZIP without rewriting.

pub mod alto;
pub mod mets;
pub mod package;
