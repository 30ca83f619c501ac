//! In-memory PDF fixtures for the integration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use shrink_pdf::walker::{page_xobject_dict, XObjectKind};

/// Builds a small PDF page by page
pub struct PdfBuilder {
    pub doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Add a page drawing `content` with the given resources
    pub fn page(&mut self, resources: Dictionary, content: &[u8]) -> ObjectId {
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        page_id
    }

    /// Add a page that draws each named XObject full size
    pub fn image_page(&mut self, xobjects: Dictionary) -> ObjectId {
        let mut content = Vec::new();
        for (name, _) in xobjects.iter() {
            content.extend_from_slice(b"q 200 0 0 200 0 0 cm /");
            content.extend_from_slice(name);
            content.extend_from_slice(b" Do Q\n");
        }
        self.page(dictionary! { "XObject" => xobjects }, &content)
    }

    /// Add a page showing one line of text in Helvetica
    pub fn text_page(&mut self, font_id: ObjectId, text: &str) -> ObjectId {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        self.page(
            dictionary! { "Font" => dictionary! { "F1" => font_id } },
            content.as_bytes(),
        )
    }

    pub fn font(&mut self) -> ObjectId {
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        })
    }

    /// Form XObject drawing the given XObjects
    pub fn form(&mut self, xobjects: Dictionary) -> ObjectId {
        let mut content = Vec::new();
        for (name, _) in xobjects.iter() {
            content.extend_from_slice(b"/");
            content.extend_from_slice(name);
            content.extend_from_slice(b" Do\n");
        }
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Resources" => dictionary! { "XObject" => xobjects },
            },
            content,
        ))
    }

    /// Uncompressed 8-bit RGB image with photo-like content
    pub fn photo(&mut self, width: u32, height: u32) -> ObjectId {
        let pixels = photo_pixels(width, height).into_raw();
        self.doc.add_object(Stream::new(
            image_dict(width, height, "DeviceRGB"),
            pixels,
        ))
    }

    /// RGB image with a soft mask holding `alpha` everywhere
    pub fn translucent(&mut self, width: u32, height: u32, rgb: [u8; 3], alpha: u8) -> ObjectId {
        let pixels: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
        let smask_id = self.doc.add_object(Stream::new(
            image_dict(width, height, "DeviceGray"),
            vec![alpha; (width * height) as usize],
        ));
        let mut dict = image_dict(width, height, "DeviceRGB");
        dict.set("SMask", smask_id);
        self.doc.add_object(Stream::new(dict, pixels))
    }

    /// DCTDecode image, returned with its JPEG bytes
    pub fn jpeg(&mut self, width: u32, height: u32) -> (ObjectId, Vec<u8>) {
        let jpeg = encode_jpeg(&photo_pixels(width, height), 90);
        let mut dict = image_dict(width, height, "DeviceRGB");
        dict.set("Filter", "DCTDecode");
        let id = self.doc.add_object(Stream::new(dict, jpeg.clone()));
        (id, jpeg)
    }

    pub fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("save fixture");
        bytes
    }
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8,
    }
}

/// Smooth gradients with a little deterministic noise
pub fn photo_pixels(width: u32, height: u32) -> RgbImage {
    let mut seed: u32 = 0x2545_f491;
    RgbImage::from_fn(width, height, |x, y| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = seed >> 28;
        let r = (x * 255 / width.max(1) + noise) % 256;
        let g = (y * 255 / height.max(1) + noise) % 256;
        let b = ((x + y) * 127 / (width + height).max(1) + 64) % 256;
        image::Rgb([r as u8, g as u8, b as u8])
    })
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    jpeg_encoder::Encoder::new(&mut out, quality)
        .encode(
            img.as_raw(),
            img.width() as u16,
            img.height() as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .expect("encode jpeg fixture");
    out
}

pub fn decode_jpeg(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).expect("decode jpeg")
}

pub fn load(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("load output")
}

/// Image XObject named `name` on the page `page_number` (1-based)
pub fn page_image(doc: &Document, page_number: u32, name: &str) -> ObjectId {
    let page_id = doc.get_pages()[&page_number];
    let dict = page_xobject_dict(doc, page_id)
        .expect("resources")
        .expect("xobject dictionary");
    match dict.kind(doc, name.as_bytes()).expect("classify") {
        Some(XObjectKind::Image(id)) => id,
        other => panic!("expected image {}, got {:?}", name, other),
    }
}

pub fn stream<'a>(doc: &'a Document, id: ObjectId) -> &'a Stream {
    match doc.get_object(id) {
        Ok(Object::Stream(s)) => s,
        other => panic!("expected stream, got {:?}", other),
    }
}

pub fn name_entry(stream: &Stream, key: &[u8]) -> Option<Vec<u8>> {
    match stream.dict.get(key) {
        Ok(Object::Name(n)) => Some(n.clone()),
        _ => None,
    }
}

pub fn int_entry(stream: &Stream, key: &[u8]) -> i64 {
    stream
        .dict
        .get(key)
        .and_then(Object::as_i64)
        .expect("integer entry")
}

/// Every image XObject in the document
pub fn all_images(doc: &Document) -> Vec<&Stream> {
    doc.objects
        .values()
        .filter_map(|obj| match obj {
            Object::Stream(s) if name_entry(s, b"Subtype").as_deref() == Some(&b"Image"[..]) => Some(s),
            _ => None,
        })
        .collect()
}
