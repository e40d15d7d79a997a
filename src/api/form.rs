use axum::extract::Multipart;
use bytes::Bytes;

use crate::{
    core::{
        scoring::DESCRIPTION_COUNT,
        upload::{DecodeError, UploadedImage},
    },
    error::Result,
};

/// Fields posted by the upload and predict forms.
///
/// The image arrives either as a fresh file in `image` or as the base64 copy
/// the upload page embedded in `image_data`.
#[derive(Debug, Default)]
pub(crate) struct PredictForm {
    pub(crate) file: Option<(Option<String>, Bytes)>,
    pub(crate) image_data: Option<String>,
    pub(crate) image_name: Option<String>,
    pub(crate) descriptions: [String; DESCRIPTION_COUNT],
}

impl PredictForm {
    pub(crate) async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked
                    if !bytes.is_empty() {
                        form.file = Some((file_name, bytes));
                    }
                }
                "image_data" => form.image_data = Some(field.text().await?),
                "image_name" => form.image_name = Some(field.text().await?),
                other => match description_slot(other) {
                    Some(slot) => form.descriptions[slot] = field.text().await?,
                    None => log::debug!("Ignoring form field `{}`", other),
                },
            }
        }

        Ok(form)
    }

    /// Decode the fresh upload if there is one, else the carried copy.
    /// Either way the image may be at most `max_bytes` long.
    pub(crate) fn decode_image(
        &self,
        max_bytes: usize,
    ) -> Option<std::result::Result<UploadedImage, DecodeError>> {
        if let Some((file_name, bytes)) = &self.file {
            return Some(UploadedImage::decode(file_name.as_deref(), bytes.clone(), max_bytes));
        }

        self.image_data
            .as_deref()
            .filter(|data| !data.trim().is_empty())
            .map(|data| UploadedImage::from_base64(self.image_name.as_deref(), data, max_bytes))
    }
}

/// `description_1` → slot 0, up to `description_3`.
fn description_slot(field: &str) -> Option<usize> {
    field
        .strip_prefix("description_")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=DESCRIPTION_COUNT).contains(n))
        .map(|n| n - 1)
}
