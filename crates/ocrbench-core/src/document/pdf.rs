//! Rasterization of scanned single-page PDFs using lopdf.

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::PdfError;

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Largest rendered page side in pixels.
const MAX_RENDER_SIDE: u32 = 20_000;

/// Recovers the page image of a scanned PDF at a fixed DPI.
///
/// Scanned legal documents embed each page as one raster image; the page's
/// MediaBox gives its physical size, which fixes the output resolution.
pub struct PdfRasterizer {
    document: Document,
}

impl PdfRasterizer {
    /// Load a PDF from bytes.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        if document.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }

        Ok(Self { document })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Render a page (1-indexed) at the given DPI.
    pub fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage, PdfError> {
        let pages = self.document.get_pages();
        let page_id = *pages
            .get(&page)
            .ok_or_else(|| PdfError::ImageExtraction(format!("page {} does not exist", page)))?;

        let image = self
            .page_images(page_id)
            .into_iter()
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
            .ok_or_else(|| PdfError::ImageExtraction(format!("no decodable image on page {}", page)))?;

        let Some((width_pt, height_pt)) = self.media_size(page_id) else {
            debug!("Page {} has no MediaBox, keeping native resolution", page);
            return Ok(image);
        };

        let target_w = ((width_pt / POINTS_PER_INCH) * dpi as f32).round().max(1.0) as u32;
        let target_h = ((height_pt / POINTS_PER_INCH) * dpi as f32).round().max(1.0) as u32;
        if target_w > MAX_RENDER_SIDE || target_h > MAX_RENDER_SIDE {
            return Err(PdfError::ImageExtraction(format!(
                "page {} renders to {}x{} px, above the {} px limit",
                page, target_w, target_h, MAX_RENDER_SIDE
            )));
        }

        debug!(
            "Rasterizing page {} ({}x{} px source) to {}x{} at {} DPI",
            page,
            image.width(),
            image.height(),
            target_w,
            target_h,
            dpi
        );

        if (image.width(), image.height()) == (target_w, target_h) {
            return Ok(image);
        }
        Ok(image.resize_exact(target_w, target_h, FilterType::Triangle))
    }

    fn page_images(&self, page_id: ObjectId) -> Vec<DynamicImage> {
        let doc = &self.document;
        let mut images = Vec::new();

        let Some(resources) = self.inherited(page_id, b"Resources") else {
            return images;
        };
        let Ok((_, Object::Dictionary(resources))) = doc.dereference(&resources) else {
            return images;
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return images;
        };

        if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
            for (_name, obj_ref) in xobj_dict.iter() {
                if let Ok((_, obj)) = doc.dereference(obj_ref) {
                    if let Some(img) = decode_image_object(doc, obj) {
                        images.push(img);
                    }
                }
            }
        }

        trace!("Found {} images on page {:?}", images.len(), page_id);
        images
    }

    fn media_size(&self, page_id: ObjectId) -> Option<(f32, f32)> {
        let media_box = self.inherited(page_id, b"MediaBox")?;
        let (_, media_box) = self.document.dereference(&media_box).ok()?;
        let values: Vec<f32> = media_box
            .as_array()
            .ok()?
            .iter()
            .filter_map(|o| o.as_float().ok())
            .collect();

        if values.len() != 4 {
            return None;
        }

        let width = (values[2] - values[0]).abs();
        let height = (values[3] - values[1]).abs();
        (width > 0.0 && height > 0.0).then_some((width, height))
    }

    /// Look up a page attribute, walking up the page tree for inherited values.
    fn inherited(&self, node_id: ObjectId, key: &[u8]) -> Option<Object> {
        let node = self.document.get_object(node_id).ok()?;
        let Object::Dictionary(dict) = node else {
            return None;
        };

        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.inherited(*parent_id, key),
            _ => None,
        }
    }
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dimension(dict.get(b"Width").ok()?)?;
    let height = dimension(dict.get(b"Height").ok()?)?;

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    raw_to_image(&data, width, height, color_space)
}

/// Image width or height as a positive `u32`.
fn dimension(obj: &Object) -> Option<u32> {
    let value = obj.as_i64().ok()?;
    match u32::try_from(value) {
        Ok(v) if v > 0 => Some(v),
        _ => {
            trace!("Invalid image dimension: {}", value);
            None
        }
    }
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => {
            trace!("Unsupported colorspace {}", String::from_utf8_lossy(color_space));
            return None;
        }
    };

    // The stream must hold every sample before anything is allocated.
    let needed = pixels.checked_mul(channels)?;
    if data.len() < needed {
        trace!("Raw image too short: data_len={}, needed={}", data.len(), needed);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels.checked_mul(4)?);
    if channels == 3 {
        for chunk in data[..needed].chunks_exact(3) {
            rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
        }
    } else {
        for &gray in &data[..needed] {
            rgba.extend_from_slice(&[gray, gray, gray, 255]);
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    /// A one-page PDF whose page is a 2x2 gray raster on a 1x1 inch MediaBox.
    pub(crate) fn scanned_pdf() -> Vec<u8> {
        pdf_with_image(2, 2, 72)
    }

    /// One-page PDF with a gray raster of the declared size over 4 samples.
    pub(crate) fn pdf_with_image(width: i64, height: i64, media_side: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 255, 255, 0],
        );
        let image_id = doc.add_object(image);
        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q 72 0 0 72 0 0 cm /Im1 Do Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), media_side.into(), media_side.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_render_uses_inherited_media_box() {
        let rasterizer = PdfRasterizer::load(&scanned_pdf()).unwrap();
        assert_eq!(rasterizer.page_count(), 1);

        let image = rasterizer.render_page(1, 144).unwrap();
        assert_eq!((image.width(), image.height()), (144, 144));
    }

    #[test]
    fn test_missing_page() {
        let rasterizer = PdfRasterizer::load(&scanned_pdf()).unwrap();
        assert!(matches!(rasterizer.render_page(2, 300), Err(PdfError::ImageExtraction(_))));
    }

    #[test]
    fn test_negative_dimensions_are_rejected() {
        let rasterizer = PdfRasterizer::load(&pdf_with_image(-1, -1, 72)).unwrap();
        assert!(matches!(rasterizer.render_page(1, 72), Err(PdfError::ImageExtraction(_))));
    }

    #[test]
    fn test_dimensions_larger_than_stream_are_rejected() {
        let rasterizer = PdfRasterizer::load(&pdf_with_image(100_000, 100_000, 72)).unwrap();
        assert!(matches!(rasterizer.render_page(1, 72), Err(PdfError::ImageExtraction(_))));
    }

    #[test]
    fn test_oversized_media_box_is_rejected() {
        let rasterizer = PdfRasterizer::load(&pdf_with_image(2, 2, 1_000_000)).unwrap();
        assert!(matches!(rasterizer.render_page(1, 300), Err(PdfError::ImageExtraction(_))));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(PdfRasterizer::load(b"%PDF-1.5 nonsense"), Err(PdfError::Parse(_))));
    }
}
