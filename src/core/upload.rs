use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::utils::is_accepted_image_name;

/// Image file extensions accepted by the upload control.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Why an upload could not be turned into an image.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Nothing was uploaded.
    #[error("image data is empty")]
    Empty,

    /// The file name does not look like a JPEG or PNG.
    #[error("unsupported file type `{0}` (accepted: jpg, jpeg, png)")]
    UnsupportedType(String),

    /// The image is bigger than the configured upload size.
    #[error("image is {size} bytes, larger than the {max} byte limit")]
    TooLarge {
        /// Size of the image file in bytes.
        size: usize,
        /// Configured limit in bytes.
        max: usize,
    },

    /// The bytes are not JPEG or PNG.
    #[error("unsupported image format (accepted: JPEG, PNG)")]
    UnsupportedFormat,

    /// The bytes claim a supported format but do not decode.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The hidden form copy of the image was mangled.
    #[error("invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// An uploaded JPEG or PNG decoded into an RGB pixel buffer.
///
/// The original bytes are kept so the page can preview the upload and carry it
/// to the next request without storing anything server-side.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    file_name: String,
    format: ImageFormat,
    bytes: Bytes,
    image: DynamicImage,
}

impl UploadedImage {
    /// Validate and decode raw upload bytes no larger than `max_bytes`.
    pub fn decode(
        file_name: Option<&str>,
        bytes: Bytes,
        max_bytes: usize,
    ) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                max: max_bytes,
            });
        }

        let file_name = file_name.unwrap_or("upload").to_string();
        if file_name.contains('.') && !is_accepted_image_name(&file_name) {
            return Err(DecodeError::UnsupportedType(file_name));
        }

        let format = match image::guess_format(&bytes) {
            Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
            _ => return Err(DecodeError::UnsupportedFormat),
        };

        let image = image::load_from_memory_with_format(&bytes, format)?;
        let image = DynamicImage::ImageRgb8(image.to_rgb8());

        log::debug!(
            "Decoded {} ({:?}, {}x{}, {} bytes)",
            file_name,
            format,
            image.width(),
            image.height(),
            bytes.len()
        );

        Ok(Self {
            file_name,
            format,
            bytes,
            image,
        })
    }

    /// Decode the base64 copy carried in a form field. The limit applies to
    /// the decoded bytes, not the encoded text.
    pub fn from_base64(
        file_name: Option<&str>,
        encoded: &str,
        max_bytes: usize,
    ) -> Result<Self, DecodeError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(DecodeError::Empty);
        }
        let bytes = STANDARD.decode(encoded)?;
        Self::decode(file_name, Bytes::from(bytes), max_bytes)
    }

    /// Decoded RGB pixels.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Name the browser reported for the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// MIME type of the original bytes.
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            _ => "image/jpeg",
        }
    }

    /// Original bytes as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL for an inline preview.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    const LIMIT: usize = 1024 * 1024;

    fn png_bytes() -> Bytes {
        let img = RgbImage::from_pixel(3, 2, Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn test_decode_png() {
        let upload = UploadedImage::decode(Some("apple.png"), png_bytes(), LIMIT).unwrap();

        assert_eq!(upload.width(), 3);
        assert_eq!(upload.height(), 2);
        assert_eq!(upload.mime_type(), "image/png");
        assert!(upload.data_url().starts_with("data:image/png;base64,"));
        assert_eq!(upload.image().as_rgb8().unwrap().get_pixel(0, 0), &Rgb([200, 10, 10]));
    }

    #[test]
    fn test_base64_round_trip_keeps_name() {
        let upload = UploadedImage::decode(Some("apple.png"), png_bytes(), LIMIT).unwrap();
        let again = UploadedImage::from_base64(Some(upload.file_name()), &upload.to_base64(), LIMIT).unwrap();

        assert_eq!(again.file_name(), "apple.png");
        assert_eq!(again.width(), 3);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            UploadedImage::decode(Some("a.png"), Bytes::new(), LIMIT),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn test_rejects_wrong_extension() {
        assert!(matches!(
            UploadedImage::decode(Some("notes.txt"), png_bytes(), LIMIT),
            Err(DecodeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let bytes = Bytes::from_static(b"definitely not an image");
        assert!(matches!(
            UploadedImage::decode(Some("photo.jpg"), bytes, LIMIT),
            Err(DecodeError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let bytes = png_bytes();
        let truncated = bytes.slice(..bytes.len() / 2);
        assert!(matches!(
            UploadedImage::decode(Some("photo.png"), truncated, LIMIT),
            Err(DecodeError::Decode(_))
        ));
    }

    #[test]
    fn test_rejects_bad_base64() {
        assert!(matches!(
            UploadedImage::from_base64(Some("a.png"), "%%%", LIMIT),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_limit_applies_to_decoded_bytes() {
        let bytes = png_bytes();
        let size = bytes.len();
        let encoded = STANDARD.encode(&bytes);

        // the base64 text is longer than the limit, the image itself is not
        assert!(encoded.len() > size);
        let upload = UploadedImage::from_base64(Some("apple.png"), &encoded, size).unwrap();
        assert_eq!(upload.width(), 3);

        assert!(matches!(
            UploadedImage::decode(Some("apple.png"), bytes, size - 1),
            Err(DecodeError::TooLarge { max, .. }) if max == size - 1
        ));
    }
}
