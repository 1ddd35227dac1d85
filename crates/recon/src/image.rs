//! Page-targeted image association.
//!
//! A record found on page N of a document takes its picture from page
//! N + `page_offset` of the same document. Small images (logos, icons,
//! swatches) are filtered by size, and the largest survivor wins.

use std::collections::BTreeMap;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::config::{ExclusionRule, ImageConfig};
use crate::error::ReconError;
use crate::model::RawRecord;

/// An image extracted from a source document page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub source_document_id: String,
    pub source_page: u32,
    /// Extraction order within the document.
    #[serde(default)]
    pub index: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Image {
    pub fn new(source_document_id: impl Into<String>, source_page: u32, width: u32, height: u32) -> Self {
        Self {
            source_document_id: source_document_id.into(),
            source_page,
            index: 0,
            width,
            height,
            bytes: Vec::new(),
        }
    }

    /// Build from encoded content (PNG, JPEG, GIF), reading the dimensions
    /// from the header.
    pub fn from_bytes(
        source_document_id: impl Into<String>,
        source_page: u32,
        index: u32,
        bytes: Vec<u8>,
    ) -> Result<Self, ReconError> {
        let source_document_id = source_document_id.into();
        let (width, height) = probe_dimensions(&bytes).map_err(|message| ReconError::ImageProbe {
            document: source_document_id.clone(),
            page: source_page,
            message,
        })?;
        Ok(Self {
            source_document_id,
            source_page,
            index,
            width,
            height,
            bytes,
        })
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Read width/height without decoding pixel data.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

/// Handle to a selected image. Records carry this, never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub source_document_id: String,
    pub source_page: u32,
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&Image> for ImageRef {
    fn from(img: &Image) -> Self {
        Self {
            source_document_id: img.source_document_id.clone(),
            source_page: img.source_page,
            index: img.index,
            width: img.width,
            height: img.height,
        }
    }
}

/// Images grouped by (document, page).
#[derive(Debug, Default)]
pub struct ImageIndex<'a> {
    by_page: BTreeMap<(&'a str, u32), Vec<&'a Image>>,
}

impl<'a> ImageIndex<'a> {
    pub fn build(images: &'a [Image]) -> Self {
        let mut by_page: BTreeMap<(&'a str, u32), Vec<&'a Image>> = BTreeMap::new();
        for img in images {
            by_page
                .entry((img.source_document_id.as_str(), img.source_page))
                .or_default()
                .push(img);
        }
        for list in by_page.values_mut() {
            list.sort_by_key(|img| img.index);
        }
        Self { by_page }
    }

    pub fn on_page<'b>(&'b self, document: &'b str, page: u32) -> &'b [&'a Image] {
        self.by_page
            .get(&(document, page))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_page.is_empty()
    }
}

/// Why an image is not a product picture, if it isn't one.
pub fn exclusion_reason(img: &Image, config: &ImageConfig) -> Option<String> {
    let area = img.area();
    if area < config.min_area_px {
        return Some(format!("area {area}px² < min {}px²", config.min_area_px));
    }
    config
        .exclusions
        .iter()
        .find(|rule| rule_matches(rule, img))
        .map(|rule| format!("{}: {}x{}", rule.label, img.width, img.height))
}

fn rule_matches(rule: &ExclusionRule, img: &Image) -> bool {
    if let Some(max_area) = rule.max_area_px {
        if img.area() < max_area {
            return true;
        }
    }
    match (rule.max_width_px, rule.max_height_px) {
        (Some(w), Some(h)) => img.width <= w && img.height <= h,
        _ => false,
    }
}

/// Filtered candidates for one record: its own document, target page.
pub fn candidates_for<'a>(
    record: &RawRecord,
    index: &ImageIndex<'a>,
    config: &ImageConfig,
) -> Vec<&'a Image> {
    let Some(page) = record.source_page else {
        return Vec::new();
    };
    let target = i64::from(page) + i64::from(config.page_offset);
    let Ok(target) = u32::try_from(target) else {
        return Vec::new();
    };
    if target == 0 {
        return Vec::new();
    }

    index
        .on_page(&record.source_document_id, target)
        .iter()
        .copied()
        .filter(|img| match exclusion_reason(img, config) {
            Some(reason) => {
                log::debug!(
                    "image {}#{} on page {target} excluded for {}: {reason}",
                    img.source_document_id,
                    img.index,
                    record.identifier
                );
                false
            }
            None => true,
        })
        .collect()
}

/// Largest area wins. On a tie the earlier candidate is kept.
pub fn select_best<'a, I>(candidates: I) -> Option<&'a Image>
where
    I: IntoIterator<Item = &'a Image>,
{
    let mut best: Option<&'a Image> = None;
    for img in candidates {
        if best.map_or(true, |b| img.area() > b.area()) {
            best = Some(img);
        }
    }
    best
}

/// Best image for a single record.
pub fn select_image<'a>(
    record: &RawRecord,
    index: &ImageIndex<'a>,
    config: &ImageConfig,
) -> Option<&'a Image> {
    select_best(candidates_for(record, index, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(doc: &str, page: u32, w: u32, h: u32, index: u32) -> Image {
        Image::new(doc, page, w, h).with_index(index)
    }

    fn record(doc: &str, page: u32) -> RawRecord {
        RawRecord::new("DLX-100", doc).with_page(page)
    }

    #[test]
    fn picks_largest_on_target_page() {
        let images = vec![
            img("doc1", 2, 300, 300, 0),
            img("doc1", 2, 500, 400, 1),
            img("doc1", 1, 900, 900, 2),
        ];
        let index = ImageIndex::build(&images);
        let chosen = select_image(&record("doc1", 1), &index, &ImageConfig::default()).unwrap();
        assert_eq!((chosen.width, chosen.height), (500, 400));
    }

    #[test]
    fn small_images_filtered() {
        let images = vec![img("doc1", 2, 80, 80, 0)];
        let index = ImageIndex::build(&images);
        assert!(select_image(&record("doc1", 1), &index, &ImageConfig::default()).is_none());
    }

    #[test]
    fn swatch_rule_excludes_bounded_box() {
        let config = ImageConfig {
            exclusions: vec![ExclusionRule {
                label: "swatch".into(),
                max_area_px: None,
                max_width_px: Some(200),
                max_height_px: Some(200),
            }],
            ..ImageConfig::default()
        };
        let images = vec![img("doc1", 2, 150, 150, 0), img("doc1", 2, 120, 120, 1)];
        let index = ImageIndex::build(&images);
        assert!(select_image(&record("doc1", 1), &index, &config).is_none());

        let reason = exclusion_reason(&images[0], &config).unwrap();
        assert!(reason.starts_with("swatch"));
    }

    #[test]
    fn other_documents_ignored() {
        let images = vec![img("doc2", 2, 800, 800, 0)];
        let index = ImageIndex::build(&images);
        assert!(select_image(&record("doc1", 1), &index, &ImageConfig::default()).is_none());
    }

    #[test]
    fn page_offset_applies() {
        let images = vec![img("doc1", 3, 400, 400, 0), img("doc1", 4, 600, 600, 1)];
        let index = ImageIndex::build(&images);
        let same_page = ImageConfig { page_offset: 0, ..ImageConfig::default() };
        let chosen = select_image(&record("doc1", 3), &index, &same_page).unwrap();
        assert_eq!(chosen.width, 400);

        let behind = ImageConfig { page_offset: -5, ..ImageConfig::default() };
        assert!(select_image(&record("doc1", 3), &index, &behind).is_none());
    }

    #[test]
    fn on_page_outlives_lookup_key() {
        let images = vec![img("doc1", 2, 300, 300, 1), img("doc1", 2, 400, 400, 0)];
        let index = ImageIndex::build(&images);
        let found: Vec<u32> = {
            let document = String::from("doc1");
            index.on_page(&document, 2).iter().map(|img| img.index).collect()
        };
        assert_eq!(found, vec![0, 1]);
        assert!(index.on_page("doc1", 3).is_empty());
    }

    #[test]
    fn record_without_page_has_no_candidates() {
        let images = vec![img("doc1", 1, 800, 800, 0)];
        let index = ImageIndex::build(&images);
        let rec = RawRecord::new("A-1", "doc1");
        assert!(candidates_for(&rec, &index, &ImageConfig::default()).is_empty());
    }

    #[test]
    fn tie_keeps_first() {
        let a = img("doc1", 2, 300, 300, 0);
        let b = img("doc2", 2, 300, 300, 0);
        let chosen = select_best([&a, &b]).unwrap();
        assert_eq!(chosen.source_document_id, "doc1");
    }

    #[test]
    fn probe_rejects_garbage() {
        assert!(probe_dimensions(b"not an image").is_err());
        assert!(Image::from_bytes("doc1", 1, 0, b"nope".to_vec()).is_err());
    }

    #[test]
    fn probe_reads_png_header() {
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 2))
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();
        let img = Image::from_bytes("doc1", 4, 2, png.into_inner()).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.index, 2);
        assert!(!img.bytes.is_empty());
    }
}
