//! Small in-memory PDF builders shared by unit tests

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Empty document with a catalog and a page tree root
pub fn new_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

/// Append a page whose resources name the given XObjects
pub fn add_page(doc: &mut Document, pages_id: ObjectId, xobjects: Dictionary) -> ObjectId {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => xobjects },
    });

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .expect("page tree root");
    let mut kids = match pages.get(b"Kids") {
        Ok(Object::Array(kids)) => kids.clone(),
        _ => Vec::new(),
    };
    kids.push(page_id.into());
    let count = kids.len() as i64;
    pages.set("Kids", kids);
    pages.set("Count", count);
    page_id
}

/// Form XObject with its own XObject resources
pub fn add_form(doc: &mut Document, xobjects: Dictionary) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
            "Resources" => dictionary! { "XObject" => xobjects },
        },
        b"q Q".to_vec(),
    ))
}

/// Uncompressed 8-bit RGB image
pub fn add_rgb_image(doc: &mut Document, width: u32, height: u32) -> ObjectId {
    let pixels: Vec<u8> = (0..width * height * 3).map(|i| (i * 31 % 251) as u8).collect();
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        pixels,
    ))
}
