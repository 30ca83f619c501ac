//! Re-encoding of image XObjects under a transcoding policy

use crate::decode::SourceImage;
use crate::error::{Result, ShrinkError};
use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Quality used when none is given
pub const DEFAULT_QUALITY: f32 = 0.85;

/// JPEG encoder configured once per pass and reused for every image.
///
/// Each [`LossyEncoder::encode`] call attaches a fresh output buffer, writes
/// exactly one image and hands the buffer back. Taking `&mut self` keeps
/// those cycles from overlapping.
#[derive(Debug, Clone)]
pub struct LossyEncoder {
    quality: f32,
    jpeg_quality: u8,
    images_written: usize,
}

impl LossyEncoder {
    /// Create an encoder for a quality between 0 (smallest) and 1 (best)
    pub fn new(quality: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&quality) {
            return Err(ShrinkError::QualityOutOfRange(quality));
        }
        Ok(LossyEncoder {
            quality,
            jpeg_quality: (quality * 100.0).round().clamp(1.0, 100.0) as u8,
            images_written: 0,
        })
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Quality on the encoder's 1-100 scale
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn images_written(&self) -> usize {
        self.images_written
    }

    /// Encode opaque pixels as a JPEG image stream
    pub fn encode(&mut self, img: &DynamicImage) -> std::result::Result<Stream, String> {
        let (width, height) = (img.width(), img.height());
        let w = u16::try_from(width).map_err(|_| format!("Image too wide for JPEG: {}", width))?;
        let h = u16::try_from(height).map_err(|_| format!("Image too tall for JPEG: {}", height))?;

        let has_color = img.color().has_color();
        let (pixels, color_type, color_space) = if has_color {
            (img.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb, "DeviceRGB")
        } else {
            (img.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma, "DeviceGray")
        };

        let mut jpeg_bytes = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, self.jpeg_quality);
        if has_color {
            encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
        }
        encoder
            .encode(&pixels, w, h, color_type)
            .map_err(|e| format!("Failed to encode JPEG: {}", e))?;
        self.images_written += 1;

        let mut dict = image_dict(width, height, color_space, 8);
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        dict.set("Length", Object::Integer(jpeg_bytes.len() as i64));
        Ok(Stream::new(dict, jpeg_bytes))
    }
}

/// How images are re-encoded during a pass
#[derive(Debug, Clone)]
pub enum TranscodePolicy {
    /// JPEG at the encoder's quality; transparency is flattened
    Lossy(LossyEncoder),
    /// Flate-compressed samples with alpha kept as a soft mask
    Lossless,
}

impl TranscodePolicy {
    pub fn lossy(quality: f32) -> Result<Self> {
        LossyEncoder::new(quality).map(TranscodePolicy::Lossy)
    }

    pub fn lossless() -> Self {
        TranscodePolicy::Lossless
    }

    pub fn quality(&self) -> Option<f32> {
        match self {
            TranscodePolicy::Lossy(encoder) => Some(encoder.quality()),
            TranscodePolicy::Lossless => None,
        }
    }
}

fn image_dict(width: u32, height: u32, color_space: &str, bits_per_component: i64) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(bits_per_component));
    dict
}

/// Compress samples with FlateDecode and create an image stream
fn flate_image_stream(
    samples: &[u8],
    width: u32,
    height: u32,
    color_space: &str,
    bits_per_component: i64,
) -> std::result::Result<Stream, String> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder
        .write_all(samples)
        .map_err(|e| format!("Failed to compress image data: {}", e))?;
    let compressed = encoder
        .finish()
        .map_err(|e| format!("Failed to finish compression: {}", e))?;

    let mut dict = image_dict(width, height, color_space, bits_per_component);
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict.set("Length", Object::Integer(compressed.len() as i64));
    Ok(Stream::new(dict, compressed))
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

/// Split interleaved samples into colour and alpha planes
fn split_alpha<T: Copy>(raw: &[T], channels: usize) -> (Vec<T>, Vec<T>) {
    let mut color = Vec::with_capacity(raw.len() / channels * (channels - 1));
    let mut alpha = Vec::with_capacity(raw.len() / channels);
    for px in raw.chunks_exact(channels) {
        color.extend_from_slice(&px[..channels - 1]);
        alpha.push(px[channels - 1]);
    }
    (color, alpha)
}

/// Lossless image stream plus its soft mask, if the source is translucent
fn lossless_streams(source: &SourceImage) -> std::result::Result<(Stream, Option<Stream>), String> {
    let img = source.full();
    let (width, height) = (img.width(), img.height());
    let keep_alpha = !source.is_opaque();

    // (colour samples, alpha samples, colour space, bits per component)
    let (color, alpha, color_space, bpc) = match img {
        DynamicImage::ImageLuma8(i) => (i.as_raw().clone(), None, "DeviceGray", 8),
        DynamicImage::ImageRgb8(i) => (i.as_raw().clone(), None, "DeviceRGB", 8),
        DynamicImage::ImageLumaA8(i) => {
            let (c, a) = split_alpha(i.as_raw(), 2);
            (c, Some(a), "DeviceGray", 8)
        }
        DynamicImage::ImageRgba8(i) => {
            let (c, a) = split_alpha(i.as_raw(), 4);
            (c, Some(a), "DeviceRGB", 8)
        }
        DynamicImage::ImageLuma16(i) => (be_bytes(i.as_raw()), None, "DeviceGray", 16),
        DynamicImage::ImageRgb16(i) => (be_bytes(i.as_raw()), None, "DeviceRGB", 16),
        DynamicImage::ImageLumaA16(i) => {
            let (c, a) = split_alpha(i.as_raw(), 2);
            (be_bytes(&c), Some(be_bytes(&a)), "DeviceGray", 16)
        }
        DynamicImage::ImageRgba16(i) => {
            let (c, a) = split_alpha(i.as_raw(), 4);
            (be_bytes(&c), Some(be_bytes(&a)), "DeviceRGB", 16)
        }
        other if other.color().has_alpha() => {
            let (c, a) = split_alpha(other.to_rgba8().as_raw(), 4);
            (c, Some(a), "DeviceRGB", 8)
        }
        other => (other.to_rgb8().into_raw(), None, "DeviceRGB", 8),
    };

    let main = flate_image_stream(&color, width, height, color_space, bpc)?;
    let smask = match alpha {
        Some(alpha) if keep_alpha => Some(flate_image_stream(&alpha, width, height, "DeviceGray", bpc)?),
        _ => None,
    };
    Ok((main, smask))
}

/// Re-encode the image XObject at `source_id` and add the result to `doc`.
///
/// The returned object is not yet referenced from any resource dictionary.
pub fn transcode(
    doc: &mut Document,
    source_id: ObjectId,
    name: &str,
    policy: &mut TranscodePolicy,
) -> Result<ObjectId> {
    let source = SourceImage::load(doc, source_id, name)?;
    transcode_image(doc, &source, name, policy)
}

/// Re-encode already decoded pixels and add the result to `doc`
pub fn transcode_image(
    doc: &mut Document,
    source: &SourceImage,
    name: &str,
    policy: &mut TranscodePolicy,
) -> Result<ObjectId> {
    match policy {
        TranscodePolicy::Lossy(encoder) => {
            let pixels = source.opaque();
            let stream = encoder
                .encode(&pixels)
                .map_err(|e| ShrinkError::encode(name, e))?;
            Ok(doc.add_object(Object::Stream(stream)))
        }
        TranscodePolicy::Lossless => {
            let (mut stream, smask) =
                lossless_streams(source).map_err(|e| ShrinkError::encode(name, e))?;
            if let Some(smask) = smask {
                let smask_id = doc.add_object(Object::Stream(smask));
                stream.dict.set("SMask", Object::Reference(smask_id));
            }
            Ok(doc.add_object(Object::Stream(stream)))
        }
    }
}
