//! PDF assembly: one stretched JPEG frame per A4 page

use crate::rasterizer::RasterFrame;
use crate::{Error, Result};
use lopdf::{dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream};

/// A4 in millimetres
pub const A4_MM: (f32, f32) = (210.0, 297.0);

const PT_PER_MM: f32 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

struct PageSlot {
    image: Option<(ObjectId, u32, u32)>,
}

/// Accumulates frames into an A4 PDF.
///
/// The document starts with one implicit page. Frames after the first must be
/// added with `is_first == false`, which opens a new page before placing the
/// frame, so every page holds exactly one frame.
pub struct DocumentAssembler {
    doc: LoDocument,
    pages: Vec<PageSlot>,
    page_size_mm: (f32, f32),
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    pub fn new() -> Self {
        Self {
            doc: LoDocument::with_version("1.5"),
            pages: vec![PageSlot { image: None }],
            page_size_mm: A4_MM,
        }
    }

    /// Width and height of every page, in millimetres.
    pub fn page_size_mm(&self) -> (f32, f32) {
        self.page_size_mm
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_page(&mut self) {
        self.pages.push(PageSlot { image: None });
    }

    /// Place `frame` stretched over the whole current page, opening a new page
    /// first unless `is_first`.
    pub fn add_frame(&mut self, frame: &RasterFrame, is_first: bool) -> Result<()> {
        if !is_first {
            self.add_page();
        }
        let index = self.pages.len() - 1;
        if self.pages[index].image.is_some() {
            return Err(Error::Document(format!("page {} already holds a frame", index)));
        }

        let jpeg = frame.jpeg_bytes()?;
        let image = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => frame.width as i64,
                "Height" => frame.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        // Already DCT-compressed.
        .with_compression(false);
        let image_id = self.doc.add_object(image);
        self.pages[index].image = Some((image_id, frame.width, frame.height));
        Ok(())
    }

    /// Serialize the document. Consumes the assembler.
    pub fn finalize(mut self) -> Result<Vec<u8>> {
        let (w_mm, h_mm) = self.page_size_mm;
        let (w_pt, h_pt) = (mm_to_pt(w_mm), mm_to_pt(h_mm));
        let pages_id = self.doc.new_object_id();
        let mut kids: Vec<LoObject> = Vec::with_capacity(self.pages.len());

        for (idx, slot) in self.pages.iter().enumerate() {
            let mut xobjects = lopdf::Dictionary::new();
            let content = match slot.image {
                Some((image_id, _, _)) => {
                    let name = format!("Im{}", idx + 1);
                    xobjects.set(name.clone(), image_id);
                    format!("q {:.4} 0 0 {:.4} 0 0 cm /{} Do Q\n", w_pt, h_pt, name).into_bytes()
                }
                None => Vec::new(),
            };
            let content_id = self.doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => xobjects,
                },
                "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
            });
            kids.push(LoObject::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            LoObject::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Bitmap, WHITE};
    use crate::rasterizer::encode_frame;
    use image::RgbImage;

    fn frame(w: u32, h: u32) -> RasterFrame {
        encode_frame(
            &Bitmap {
                pixels: RgbImage::from_pixel(w, h, WHITE),
            },
            0.8,
        )
        .unwrap()
    }

    fn media_box(doc: &LoDocument, page: ObjectId) -> Vec<f32> {
        doc.get_object(page)
            .and_then(LoObject::as_dict)
            .and_then(|d| d.get(b"MediaBox"))
            .and_then(LoObject::as_array)
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn every_frame_gets_its_own_uniform_page() {
        let mut asm = DocumentAssembler::new();
        asm.add_frame(&frame(40, 60), true).unwrap();
        asm.add_frame(&frame(80, 30), false).unwrap();
        asm.add_frame(&frame(10, 200), false).unwrap();
        assert_eq!(asm.page_count(), 3);
        let bytes = asm.finalize().unwrap();

        let doc = LoDocument::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        let boxes: Vec<Vec<f32>> = pages.values().map(|id| media_box(&doc, *id)).collect();
        for b in &boxes {
            assert!((b[2] - 595.2756).abs() < 0.01);
            assert!((b[3] - 841.8898).abs() < 0.01);
        }
    }

    #[test]
    fn frame_is_stretched_to_the_full_page() {
        let mut asm = DocumentAssembler::new();
        asm.add_frame(&frame(30, 20), true).unwrap();
        let bytes = asm.finalize().unwrap();
        let doc = LoDocument::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();
        assert!(content.contains("595.2756 0 0 841.8898 0 0 cm /Im1 Do"));
    }

    #[test]
    fn second_frame_on_same_page_is_rejected() {
        let mut asm = DocumentAssembler::new();
        asm.add_frame(&frame(10, 10), true).unwrap();
        let err = asm.add_frame(&frame(10, 10), true).unwrap_err();
        assert!(matches!(err, Error::Document(_)));
    }

    #[test]
    fn page_size_is_a4_millimetres() {
        let asm = DocumentAssembler::new();
        assert_eq!(asm.page_size_mm(), (210.0, 297.0));
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-4);
    }
}
