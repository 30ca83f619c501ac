//! Decoding of image XObjects into pixel buffers
//!
//! Produces the two views the transcoder works from: the full image, with an
//! alpha channel when the XObject carries a soft mask, stencil mask or colour
//! key mask, and the opaque image with that alpha composited onto white.

use crate::error::{Result, ShrinkError};
use image::{
    DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, LumaA, Rgb, RgbImage, Rgba,
};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// A decoded image XObject
#[derive(Debug, Clone)]
pub struct SourceImage {
    full: DynamicImage,
}

impl SourceImage {
    /// Decode the image XObject stored at `id`. `name` is only used for errors.
    pub fn load(doc: &Document, id: ObjectId, name: &str) -> Result<Self> {
        match doc.get_object(id) {
            Ok(Object::Stream(stream)) => Self::from_stream(doc, stream, name),
            Ok(_) => Err(ShrinkError::decode(name, "Object is not an image stream")),
            Err(e) => Err(ShrinkError::decode(name, e)),
        }
    }

    pub fn from_stream(doc: &Document, stream: &Stream, name: &str) -> Result<Self> {
        decode_image(doc, stream)
            .map(|full| SourceImage { full })
            .map_err(|e| ShrinkError::decode(name, e))
    }

    /// Wrap already decoded pixels
    pub fn from_pixels(full: DynamicImage) -> Self {
        SourceImage { full }
    }

    pub fn width(&self) -> u32 {
        self.full.width()
    }

    pub fn height(&self) -> u32 {
        self.full.height()
    }

    /// Decoded pixels including transparency, if any
    pub fn full(&self) -> &DynamicImage {
        &self.full
    }

    /// True when every pixel is fully opaque
    pub fn is_opaque(&self) -> bool {
        match &self.full {
            DynamicImage::ImageLumaA8(img) => img.pixels().all(|p| p.0[1] == u8::MAX),
            DynamicImage::ImageRgba8(img) => img.pixels().all(|p| p.0[3] == u8::MAX),
            DynamicImage::ImageLumaA16(img) => img.pixels().all(|p| p.0[1] == u16::MAX),
            DynamicImage::ImageRgba16(img) => img.pixels().all(|p| p.0[3] == u16::MAX),
            DynamicImage::ImageRgba32F(img) => img.pixels().all(|p| p.0[3] >= 1.0),
            _ => true,
        }
    }

    /// Pixels with any transparency composited onto a white background
    pub fn opaque(&self) -> DynamicImage {
        if self.is_opaque() {
            return self.full.clone();
        }
        flatten_onto_white(&self.full)
    }
}

fn blend_white(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((channel as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    if img.color().has_color() {
        let rgba = img.to_rgba8();
        let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let p = rgba.get_pixel(x, y).0;
            Rgb([
                blend_white(p[0], p[3]),
                blend_white(p[1], p[3]),
                blend_white(p[2], p[3]),
            ])
        });
        DynamicImage::ImageRgb8(rgb)
    } else {
        let la = img.to_luma_alpha8();
        let gray = GrayImage::from_fn(la.width(), la.height(), |x, y| {
            let p = la.get_pixel(x, y).0;
            Luma([blend_white(p[0], p[1])])
        });
        DynamicImage::ImageLuma8(gray)
    }
}

/// Colour model of the samples in an image stream
#[derive(Debug, Clone, PartialEq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorModel>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed { .. } => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    fn from_name(name: &[u8]) -> std::result::Result<Self, String> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorModel::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorModel::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
            other => Err(format!(
                "Unsupported color space: {}",
                String::from_utf8_lossy(other)
            )),
        }
    }

    fn parse(doc: &Document, obj: &Object) -> std::result::Result<Self, String> {
        match resolve(doc, obj)? {
            Object::Name(name) => Self::from_name(name),
            Object::Array(arr) => {
                let family = match arr.first().map(|f| resolve(doc, f)).transpose()? {
                    Some(Object::Name(n)) => n.as_slice(),
                    _ => return Err("Color space array has no family name".to_string()),
                };
                match family {
                    b"ICCBased" => {
                        let profile = arr
                            .get(1)
                            .ok_or("ICCBased color space without profile stream")?;
                        let n = match resolve(doc, profile)? {
                            Object::Stream(s) => dict_int(doc, &s.dict, b"N"),
                            _ => None,
                        };
                        match n {
                            Some(1) => Ok(ColorModel::Gray),
                            Some(3) => Ok(ColorModel::Rgb),
                            Some(4) => Ok(ColorModel::Cmyk),
                            other => Err(format!("Unsupported ICCBased component count: {:?}", other)),
                        }
                    }
                    b"Indexed" | b"I" => {
                        if arr.len() < 4 {
                            return Err("Indexed color space needs 4 entries".to_string());
                        }
                        let base = ColorModel::parse(doc, &arr[1])?;
                        if matches!(base, ColorModel::Indexed { .. }) {
                            return Err("Indexed color space cannot have an indexed base".to_string());
                        }
                        let hival = match resolve(doc, &arr[2])? {
                            Object::Integer(n) if (0..=255).contains(n) => *n as usize,
                            other => return Err(format!("Invalid Indexed hival: {:?}", other)),
                        };
                        let lookup = match resolve(doc, &arr[3])? {
                            Object::String(bytes, _) => bytes.clone(),
                            Object::Stream(s) => stream_bytes(doc, s)?,
                            other => return Err(format!("Invalid Indexed lookup: {:?}", other)),
                        };
                        Ok(ColorModel::Indexed {
                            base: Box::new(base),
                            hival,
                            lookup,
                        })
                    }
                    other => ColorModel::from_name(other),
                }
            }
            other => Err(format!("Invalid color space object: {:?}", other)),
        }
    }
}

/// Resolve a reference to get the actual object
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> std::result::Result<&'a Object, String> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(|e| format!("{:?}: {}", id, e)),
        _ => Ok(obj),
    }
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match resolve(doc, dict.get(key).ok()?).ok()? {
        Object::Integer(n) => Some(*n),
        Object::Real(n) => Some(*n as i64),
        _ => None,
    }
}

fn dict_bool(doc: &Document, dict: &Dictionary, key: &[u8]) -> bool {
    matches!(
        dict.get(key).ok().map(|o| resolve(doc, o)),
        Some(Ok(Object::Boolean(true)))
    )
}

fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> std::result::Result<u32, String> {
    match dict_int(doc, dict, key) {
        Some(n) if n > 0 && n <= u32::MAX as i64 => Ok(n as u32),
        other => Err(format!(
            "Invalid {}: {:?}",
            String::from_utf8_lossy(key),
            other
        )),
    }
}

/// Numbers of the /Decode array, if present and well formed
fn decode_array(doc: &Document, dict: &Dictionary) -> Option<Vec<f32>> {
    let arr = match resolve(doc, dict.get(b"Decode").ok()?).ok()? {
        Object::Array(arr) => arr,
        _ => return None,
    };
    arr.iter()
        .map(|o| match o {
            Object::Integer(n) => Some(*n as f32),
            Object::Real(n) => Some(*n),
            _ => None,
        })
        .collect()
}

/// Filter names of a stream, in decoding order
fn filter_names(doc: &Document, dict: &Dictionary) -> std::result::Result<Vec<String>, String> {
    let filter = match dict.get(b"Filter") {
        Ok(f) => resolve(doc, f)?,
        Err(_) => return Ok(Vec::new()),
    };
    match filter {
        Object::Name(n) => Ok(vec![String::from_utf8_lossy(n).to_string()]),
        Object::Array(arr) => arr
            .iter()
            .map(|f| match f {
                Object::Name(n) => Ok(String::from_utf8_lossy(n).to_string()),
                other => Err(format!("Invalid filter entry: {:?}", other)),
            })
            .collect(),
        Object::Null => Ok(Vec::new()),
        other => Err(format!("Invalid filter: {:?}", other)),
    }
}

fn stream_bytes(doc: &Document, stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    let filters = filter_names(doc, &stream.dict)?;
    apply_filters(doc, stream, &filters)
}

/// Stream data after removing all non-image filters
enum Payload {
    Jpeg(Vec<u8>),
    Raw(Vec<u8>),
}

fn read_payload(doc: &Document, stream: &Stream) -> std::result::Result<Payload, String> {
    let filters = filter_names(doc, &stream.dict)?;
    match filters.split_last() {
        None => Ok(Payload::Raw(stream.content.clone())),
        Some((last, earlier)) if matches!(last.as_str(), "DCTDecode" | "DCT") => {
            apply_filters(doc, stream, earlier).map(Payload::Jpeg)
        }
        Some((last, _)) if matches!(last.as_str(), "JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode" | "CCF") => {
            Err(format!("Unsupported filter: {}", last))
        }
        Some(_) => apply_filters(doc, stream, &filters).map(Payload::Raw),
    }
}

/// /DecodeParms entry for each filter, in filter order
fn decode_params(doc: &Document, dict: &Dictionary, count: usize) -> Vec<Option<Dictionary>> {
    let params = match dict.get(b"DecodeParms").ok().map(|p| resolve(doc, p)) {
        Some(Ok(Object::Dictionary(d))) => vec![Some(d.clone()); count],
        Some(Ok(Object::Array(arr))) => arr
            .iter()
            .map(|p| match resolve(doc, p) {
                Ok(Object::Dictionary(d)) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    params.into_iter().chain(std::iter::repeat(None)).take(count).collect()
}

/// Undo `filters` in order. Filters lopdf knows are decoded through it.
fn apply_filters(
    doc: &Document,
    stream: &Stream,
    filters: &[String],
) -> std::result::Result<Vec<u8>, String> {
    let params = decode_params(doc, &stream.dict, filters.len());
    let mut data = stream.content.clone();
    for (filter, params) in filters.iter().zip(params) {
        data = match filter.as_str() {
            "ASCIIHexDecode" | "AHx" => ascii_hex_decode(&data)?,
            "RunLengthDecode" | "RL" => run_length_decode(&data),
            "FlateDecode" | "Fl" | "LZWDecode" | "LZW" | "ASCII85Decode" | "A85" => {
                let full_name: &[u8] = match filter.as_str() {
                    "Fl" => b"FlateDecode",
                    "LZW" => b"LZWDecode",
                    "A85" => b"ASCII85Decode",
                    other => other.as_bytes(),
                };
                let mut dict = Dictionary::new();
                dict.set("Filter", Object::Name(full_name.to_vec()));
                if let Some(params) = params {
                    dict.set("DecodeParms", params);
                }
                Stream::new(dict, data)
                    .decompressed_content()
                    .map_err(|e| format!("Failed to decompress ({}): {}", filter, e))?
            }
            other => return Err(format!("Unsupported filter: {}", other)),
        };
    }
    Ok(data)
}

fn ascii_hex_decode(data: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &c in data {
        let digit = match c {
            b'>' => break,
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            c if c.is_ascii_whitespace() || c == 0 => continue,
            c => return Err(format!("Invalid character in ASCIIHexDecode data: {:#04x}", c)),
        };
        high = match high {
            None => Some(digit),
            Some(h) => {
                out.push(h << 4 | digit);
                None
            }
        };
    }
    // An odd final digit is followed by an implied 0
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let n = data[i] as usize;
        i += 1;
        match n {
            128 => break,
            0..=127 => {
                let end = (i + n + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&b) = data.get(i) {
                    out.extend(std::iter::repeat(b).take(257 - n));
                }
                i += 1;
            }
        }
    }
    out
}

/// Unpack packed samples into one value per component, rows padded to whole bytes
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits_per_component: u32,
) -> std::result::Result<Vec<u16>, String> {
    if !matches!(bits_per_component, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("Unsupported bits per component: {}", bits_per_component));
    }
    let too_large = || "Image dimensions too large".to_string();
    let per_row = (width as usize).checked_mul(components).ok_or_else(too_large)?;
    let row_bits = per_row
        .checked_mul(bits_per_component as usize)
        .ok_or_else(too_large)?;
    let row_bytes = row_bits / 8 + usize::from(row_bits % 8 != 0);
    let expected = row_bytes.checked_mul(height as usize).ok_or_else(too_large)?;
    if data.len() < expected {
        return Err(format!(
            "Image data size mismatch: got {} expected {}",
            data.len(),
            expected
        ));
    }

    let mut samples = Vec::with_capacity(per_row * height as usize);
    for row in data[..expected].chunks_exact(row_bytes) {
        match bits_per_component {
            8 => samples.extend(row[..per_row].iter().map(|&b| b as u16)),
            16 => samples.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|p| u16::from_be_bytes([p[0], p[1]])),
            ),
            bpc => {
                let bpc = bpc as usize;
                let per_byte = 8 / bpc;
                let mask = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let byte = row[i / per_byte] as u16;
                    let shift = 8 - bpc * (i % per_byte + 1);
                    samples.push((byte >> shift) & mask);
                }
            }
        }
    }
    Ok(samples)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let c = cmyk[0] as f32 / 255.0;
    let m = cmyk[1] as f32 / 255.0;
    let y = cmyk[2] as f32 / 255.0;
    let k = cmyk[3] as f32 / 255.0;
    [
        ((1.0 - c) * (1.0 - k) * 255.0).round() as u8,
        ((1.0 - m) * (1.0 - k) * 255.0).round() as u8,
        ((1.0 - y) * (1.0 - k) * 255.0).round() as u8,
    ]
}

/// Build 8-bit pixels of `model` from 8-bit component values
fn pixels_from_bytes(
    width: u32,
    height: u32,
    model: &ColorModel,
    bytes: Vec<u8>,
) -> std::result::Result<DynamicImage, String> {
    let img = match model {
        ColorModel::Gray => GrayImage::from_raw(width, height, bytes).map(DynamicImage::ImageLuma8),
        ColorModel::Rgb => RgbImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgb8),
        ColorModel::Cmyk => {
            let rgb: Vec<u8> = bytes.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        ColorModel::Indexed { .. } => None,
    };
    img.ok_or_else(|| "Failed to create image from raw data".to_string())
}

fn samples_to_image(
    samples: Vec<u16>,
    width: u32,
    height: u32,
    model: &ColorModel,
    bits_per_component: u32,
    decode: Option<&[f32]>,
) -> std::result::Result<DynamicImage, String> {
    if let ColorModel::Indexed {
        base,
        hival,
        lookup,
    } = model
    {
        let n = base.components();
        let mut bytes = Vec::with_capacity(samples.len() * n);
        for s in samples {
            let offset = (s as usize).min(*hival) * n;
            for c in 0..n {
                bytes.push(lookup.get(offset + c).copied().unwrap_or(0));
            }
        }
        return pixels_from_bytes(width, height, base, bytes);
    }

    let max = ((1u32 << bits_per_component) - 1) as f32;
    let components = model.components();
    let decode = decode.filter(|d| {
        d.len() >= components * 2
            && d.chunks_exact(2).take(components).any(|r| r[0] != 0.0 || r[1] != 1.0)
    });

    match (decode, bits_per_component, model) {
        (None, 16, ColorModel::Gray) => ImageBuffer::<Luma<u16>, _>::from_raw(width, height, samples)
            .map(DynamicImage::ImageLuma16)
            .ok_or_else(|| "Failed to create 16-bit grayscale image".to_string()),
        (None, 16, ColorModel::Rgb) => ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgb16)
            .ok_or_else(|| "Failed to create 16-bit RGB image".to_string()),
        (None, _, _) => {
            let bytes = samples
                .into_iter()
                .map(|s| (s as f32 * 255.0 / max).round() as u8)
                .collect();
            pixels_from_bytes(width, height, model, bytes)
        }
        (Some(ranges), _, _) => {
            let bytes = samples
                .into_iter()
                .enumerate()
                .map(|(i, s)| {
                    let c = i % components;
                    let (lo, hi) = (ranges[2 * c], ranges[2 * c + 1]);
                    let v = (lo + s as f32 / max * (hi - lo)).clamp(0.0, 1.0);
                    (v * 255.0).round() as u8
                })
                .collect();
            pixels_from_bytes(width, height, model, bytes)
        }
    }
}

/// Alpha of a stencil mask: sample 0 paints unless the /Decode array is inverted
fn stencil_alpha(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
) -> std::result::Result<GrayImage, String> {
    let data = match read_payload(doc, stream)? {
        Payload::Raw(data) => data,
        Payload::Jpeg(_) => return Err("Stencil mask cannot be DCT encoded".to_string()),
    };
    let inverted = decode_array(doc, &stream.dict)
        .and_then(|d| d.first().copied())
        .map_or(false, |first| first == 1.0);
    let samples = unpack_samples(&data, width, height, 1, 1)?;
    let alpha = samples
        .into_iter()
        .map(|s| if (s == 0) != inverted { u8::MAX } else { 0 })
        .collect();
    GrayImage::from_raw(width, height, alpha).ok_or_else(|| "Failed to create stencil mask".to_string())
}

/// Colour pixels of an image stream plus the alpha of a colour key mask, if any
fn decode_color(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
    forced: Option<ColorModel>,
) -> std::result::Result<(DynamicImage, Option<GrayImage>), String> {
    let dict = &stream.dict;
    let payload = read_payload(doc, stream)?;

    let data = match payload {
        Payload::Jpeg(bytes) => {
            let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                .map_err(|e| format!("Failed to decode JPEG image: {}", e))?;
            let img = match forced {
                Some(ColorModel::Gray) => DynamicImage::ImageLuma8(img.to_luma8()),
                _ => img,
            };
            return Ok((img, None));
        }
        Payload::Raw(data) => data,
    };

    let model = match forced {
        Some(model) => model,
        None => {
            let cs = dict.get(b"ColorSpace").map_err(|_| "Missing ColorSpace".to_string())?;
            ColorModel::parse(doc, cs)?
        }
    };
    let bits_per_component = dict_int(doc, dict, b"BitsPerComponent").unwrap_or(8) as u32;
    let samples = unpack_samples(&data, width, height, model.components(), bits_per_component)?;

    let key_alpha = match dict.get(b"Mask").ok().map(|m| resolve(doc, m)).transpose()? {
        Some(Object::Array(ranges)) => {
            let ranges: Vec<i64> = ranges
                .iter()
                .filter_map(|o| match o {
                    Object::Integer(n) => Some(*n),
                    _ => None,
                })
                .collect();
            color_key_alpha(&samples, model.components(), &ranges, width, height)
        }
        _ => None,
    };

    let decode = decode_array(doc, dict);
    let img = samples_to_image(
        samples,
        width,
        height,
        &model,
        bits_per_component,
        decode.as_deref(),
    )?;
    Ok((img, key_alpha))
}

/// Alpha of a colour key mask: pixels whose every component is in range are masked out
fn color_key_alpha(
    samples: &[u16],
    components: usize,
    ranges: &[i64],
    width: u32,
    height: u32,
) -> Option<GrayImage> {
    if ranges.len() < components * 2 {
        return None;
    }
    let alpha = samples
        .chunks_exact(components)
        .map(|px| {
            let masked = px
                .iter()
                .enumerate()
                .all(|(c, &s)| ranges[2 * c] <= s as i64 && s as i64 <= ranges[2 * c + 1]);
            if masked {
                0
            } else {
                u8::MAX
            }
        })
        .collect();
    GrayImage::from_raw(width, height, alpha)
}

/// Decode a soft mask stream into an alpha channel of the given size
fn decode_soft_mask(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
) -> std::result::Result<GrayImage, String> {
    let mask_width = dimension(doc, &stream.dict, b"Width")?;
    let mask_height = dimension(doc, &stream.dict, b"Height")?;
    let (mask, _) = decode_color(doc, stream, mask_width, mask_height, Some(ColorModel::Gray))?;
    let mask = mask.to_luma8();
    if mask.dimensions() == (width, height) {
        Ok(mask)
    } else {
        Ok(image::imageops::resize(
            &mask,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

/// Alpha channel from /SMask or an explicit /Mask stream
fn mask_alpha(
    doc: &Document,
    dict: &Dictionary,
    width: u32,
    height: u32,
) -> std::result::Result<Option<GrayImage>, String> {
    if let Ok(smask) = dict.get(b"SMask") {
        if let Object::Stream(s) = resolve(doc, smask)? {
            return decode_soft_mask(doc, s, width, height)
                .map(Some)
                .map_err(|e| format!("SMask: {}", e));
        }
    }
    if let Ok(mask) = dict.get(b"Mask") {
        if let Object::Stream(s) = resolve(doc, mask)? {
            let mask_width = dimension(doc, &s.dict, b"Width")?;
            let mask_height = dimension(doc, &s.dict, b"Height")?;
            let alpha = stencil_alpha(doc, s, mask_width, mask_height)
                .map_err(|e| format!("Mask: {}", e))?;
            if alpha.dimensions() == (width, height) {
                return Ok(Some(alpha));
            }
            return Ok(Some(image::imageops::resize(
                &alpha,
                width,
                height,
                image::imageops::FilterType::Nearest,
            )));
        }
    }
    Ok(None)
}

fn attach_alpha(color: DynamicImage, alpha: &GrayImage) -> DynamicImage {
    let (width, height) = (color.width(), color.height());
    match color {
        DynamicImage::ImageLuma16(gray) => {
            DynamicImage::ImageLumaA16(ImageBuffer::from_fn(width, height, |x, y| {
                let a = alpha.get_pixel(x, y).0[0] as u16 * 257;
                LumaA([gray.get_pixel(x, y).0[0], a])
            }))
        }
        DynamicImage::ImageRgb16(rgb) => {
            DynamicImage::ImageRgba16(ImageBuffer::from_fn(width, height, |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgba([r, g, b, alpha.get_pixel(x, y).0[0] as u16 * 257])
            }))
        }
        color if color.color().has_color() => {
            let rgb = color.to_rgb8();
            DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgba([r, g, b, alpha.get_pixel(x, y).0[0]])
            }))
        }
        color => {
            let gray = color.to_luma8();
            DynamicImage::ImageLumaA8(ImageBuffer::from_fn(width, height, |x, y| {
                LumaA([gray.get_pixel(x, y).0[0], alpha.get_pixel(x, y).0[0]])
            }))
        }
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> std::result::Result<DynamicImage, String> {
    let dict = &stream.dict;
    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;

    if dict_bool(doc, dict, b"ImageMask") {
        let alpha = stencil_alpha(doc, stream, width, height)?;
        let black = GrayImage::new(width, height);
        return Ok(attach_alpha(DynamicImage::ImageLuma8(black), &alpha));
    }

    let (color, key_alpha) = decode_color(doc, stream, width, height, None)?;
    if color.width() != width || color.height() != height {
        return Err(format!(
            "Decoded size {}x{} does not match {}x{}",
            color.width(),
            color.height(),
            width,
            height
        ));
    }

    match mask_alpha(doc, dict, width, height)?.or(key_alpha) {
        Some(alpha) => Ok(attach_alpha(color, &alpha)),
        None => Ok(color),
    }
}
