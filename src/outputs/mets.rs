//! METS manifest generation.
//!
//! One METS document ties the whole issue together: a bibliographic MODS
//! block (issue label, volume/issue numbers, one constituent per content
//! unit with its page extent), file groups for the merged PDF, the ALTO
//! set, and optional page images, and a physical structMap with one page
//! `div` per physical page pointing at that page's files.
//!
//! Content-unit-to-page associations live in the constituent extents of the
//! MODS block; the structMap stays purely physical. All hrefs are relative
//! (`file://./...`) so the generator stays ignorant of whether the bundle
//! lands on a filesystem, in an object store, or inside a ZIP.
//!
//! The creation timestamp is injected by the caller; it is the only part of
//! the document that may differ between two runs over identical inputs.

use crate::error::ArchiveError;
use crate::models::{ContentKind, Issue};
use crate::outputs::alto::AltoPage;
use crate::pdf::PageImage;
use crate::utils::{alto_file_id, image_file_id, roman_numeral};
use crate::xml::{Namespace, XmlElement};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

/// METS root namespace bindings, in declaration order.
pub const METS_NAMESPACES: [Namespace; 4] = [
    Namespace {
        prefix: "mets",
        uri: "http://www.loc.gov/METS/",
    },
    Namespace {
        prefix: "xlink",
        uri: "http://www.w3.org/1999/xlink",
    },
    Namespace {
        prefix: "mods",
        uri: "http://www.loc.gov/mods/v3",
    },
    Namespace {
        prefix: "xsi",
        uri: "http://www.w3.org/2001/XMLSchema-instance",
    },
];

const METS_SCHEMA_LOCATION: &str =
    "http://www.loc.gov/METS/ http://www.loc.gov/standards/mets/mets.xsd";

const NEWSPAPER_TITLE: &str = "The Daily Princetonian";

/// Human-readable issue label, e.g. `"Vol. CXLVII, No. 5 (Mar 12, 2023)"`.
pub fn issue_label(issue: &Issue) -> String {
    format!(
        "Vol. {}, No. {} ({})",
        roman_numeral(issue.volume_number),
        issue.issue_number,
        issue.date.format("%b %d, %Y")
    )
}

/// Generate the METS manifest for an assembled issue.
///
/// `alto_pages` must cover every physical page; `images` must be empty or
/// cover every physical page as well.
#[instrument(level = "info", skip_all, fields(issue = %issue.name, pages = issue.total_pages))]
pub fn generate(
    issue: &Issue,
    alto_pages: &[AltoPage],
    images: &[PageImage],
    created: DateTime<Utc>,
) -> Result<String, ArchiveError> {
    if alto_pages.len() != issue.total_pages {
        return Err(ArchiveError::MetsGeneration(format!(
            "expected {} ALTO documents, got {}",
            issue.total_pages,
            alto_pages.len()
        )));
    }
    if !images.is_empty() && images.len() != issue.total_pages {
        return Err(ArchiveError::MetsGeneration(format!(
            "expected {} page images, got {}",
            issue.total_pages,
            images.len()
        )));
    }

    let label = format!("{} {}", NEWSPAPER_TITLE, issue.date.format("%d.%m.%Y"));

    let document = XmlElement::new("mets:mets")
        .namespaces(&METS_NAMESPACES)
        .attr("xsi:schemaLocation", METS_SCHEMA_LOCATION)
        .attr("TYPE", "Newspaper")
        .attr("LABEL", &label)
        .child(header(created))
        .child(bibliographic_section(issue))
        .child(file_section(issue, alto_pages, images))
        .child(structural_map(issue, &label, images))
        .to_document();

    info!(bytes = document.len(), "Generated METS manifest");
    Ok(document)
}

fn header(created: DateTime<Utc>) -> XmlElement {
    XmlElement::new("mets:metsHdr")
        .attr("CREATEDATE", created.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .child(
            XmlElement::new("mets:agent")
                .attr("ROLE", "CREATOR")
                .attr("TYPE", "OTHER")
                .child(
                    XmlElement::new("mets:name")
                        .text(format!("prince-archiver {}", env!("CARGO_PKG_VERSION"))),
                ),
        )
}

fn bibliographic_section(issue: &Issue) -> XmlElement {
    let mut mods = XmlElement::new("mods:mods")
        .child(
            XmlElement::new("mods:titleInfo")
                .child(XmlElement::new("mods:title").text(NEWSPAPER_TITLE)),
        )
        .child(
            XmlElement::new("mods:originInfo").child(
                XmlElement::new("mods:dateIssued").text(issue.date.format("%Y-%m-%d").to_string()),
            ),
        )
        .child(
            XmlElement::new("mods:part")
                .child(
                    XmlElement::new("mods:detail")
                        .attr("type", "volume")
                        .attr("level", "1")
                        .child(XmlElement::new("mods:number").text(issue.volume_number.to_string())),
                )
                .child(
                    XmlElement::new("mods:detail")
                        .attr("type", "number")
                        .attr("level", "2")
                        .child(XmlElement::new("mods:number").text(issue.issue_number.to_string())),
                )
                .child(XmlElement::new("mods:text").text(issue_label(issue))),
        );

    // One constituent per content unit, carrying its page extent.
    for unit in &issue.units {
        mods = mods.child(
            XmlElement::new("mods:relatedItem")
                .attr("type", "constituent")
                .child(
                    XmlElement::new("mods:titleInfo")
                        .child(XmlElement::new("mods:title").text(&unit.title)),
                )
                .child(XmlElement::new("mods:genre").text(match unit.kind {
                    ContentKind::Article => "article",
                    ContentKind::Newsletter => "newsletter",
                }))
                .child(
                    XmlElement::new("mods:part").child(
                        XmlElement::new("mods:extent")
                            .attr("unit", "pages")
                            .child(
                                XmlElement::new("mods:start")
                                    .text(unit.page_range.start.to_string()),
                            )
                            .child(
                                XmlElement::new("mods:end").text(unit.page_range.end.to_string()),
                            )
                            .child(
                                XmlElement::new("mods:list").text(unit.page_range.extent_label()),
                            ),
                    ),
                ),
        );
    }

    XmlElement::new("mets:dmdSec").attr("ID", "DMD_ISSUE").child(
        XmlElement::new("mets:mdWrap")
            .attr("MDTYPE", "MODS")
            .child(XmlElement::new("mets:xmlData").child(mods)),
    )
}

fn file_entry(id: &str, mimetype: &str, href: &str) -> XmlElement {
    XmlElement::new("mets:file")
        .attr("ID", id)
        .attr("MIMETYPE", mimetype)
        .child(
            XmlElement::new("mets:FLocat")
                .attr("LOCTYPE", "URL")
                .attr("xlink:href", href),
        )
}

fn file_section(issue: &Issue, alto_pages: &[AltoPage], images: &[PageImage]) -> XmlElement {
    let mut file_sec = XmlElement::new("mets:fileSec")
        .child(XmlElement::new("mets:fileGrp").attr("USE", "PDF").child(
            file_entry(
                "PDF_1",
                "application/pdf",
                &format!("file://./{}.pdf", issue.name),
            ),
        ))
        .child(
            XmlElement::new("mets:fileGrp")
                .attr("USE", "ALTO")
                .children(alto_pages.iter().map(|page| {
                    file_entry(
                        &alto_file_id(page.page_number),
                        "text/xml",
                        &format!("file://./alto/{}", page.filename),
                    )
                })),
        );

    if !images.is_empty() {
        file_sec = file_sec.child(
            XmlElement::new("mets:fileGrp")
                .attr("USE", "Images")
                .children(images.iter().map(|image| {
                    file_entry(
                        &image_file_id(image.page_number),
                        "image/png",
                        &format!("file://./images/{}", image.filename),
                    )
                })),
        );
    }

    file_sec
}

fn structural_map(issue: &Issue, label: &str, images: &[PageImage]) -> XmlElement {
    let has_images = !images.is_empty();
    XmlElement::new("mets:structMap").attr("TYPE", "PHYSICAL").child(
        XmlElement::new("mets:div")
            .attr("TYPE", "Newspaper")
            .attr("DMDID", "DMD_ISSUE")
            .attr("LABEL", label)
            .children((1..=issue.total_pages).map(|page_number| {
                let mut div = XmlElement::new("mets:div")
                    .attr("TYPE", "Page")
                    .attr("ID", format!("PHYS_{:04}", page_number))
                    .attr("ORDER", page_number.to_string())
                    .child(
                        XmlElement::new("mets:fptr").attr("FILEID", alto_file_id(page_number)),
                    );
                if has_images {
                    div = div.child(
                        XmlElement::new("mets:fptr").attr("FILEID", image_file_id(page_number)),
                    );
                }
                div
            })),
    )
}
