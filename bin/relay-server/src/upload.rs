//! Multipart intake for conversion requests.
//!
//! The file part is streamed chunk by chunk into the staging area, so memory
//! use stays flat regardless of upload size. Anything that goes wrong before
//! the form is complete drops the partially written [`StagedUpload`], which
//! removes its temp file.
//!
//! [`StagedUpload`]: relay_core::StagedUpload

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use relay_core::{StagedFile, StagingArea};
use tracing::debug;

use crate::error::ServerError;

const FILE_FIELD: &str = "file";
const FORMAT_FIELDS: [&str; 2] = ["outputformat", "output_format"];

/// The parts of a conversion form the relay cares about.
#[derive(Debug, Default)]
pub struct ConversionForm {
    pub file: Option<StagedFile>,
    pub output_format: Option<String>,
}

/// Drain a multipart body, staging the first `file` part to disk.
pub async fn read_form(
    multipart: &mut Multipart,
    staging: &StagingArea,
) -> Result<ConversionForm, ServerError> {
    let mut form = ConversionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();

        if name == FILE_FIELD {
            if form.file.is_some() {
                debug!("ignoring additional file part");
                continue;
            }
            form.file = stage_field(field, staging).await?;
        } else if FORMAT_FIELDS.contains(&name.as_str()) {
            let value = field.text().await.map_err(multipart_error)?;
            let value = value.trim();
            if !value.is_empty() {
                form.output_format = Some(value.to_owned());
            }
        } else {
            debug!(field = %name, "ignoring unknown form field");
        }
    }

    Ok(form)
}

async fn stage_field(
    mut field: Field<'_>,
    staging: &StagingArea,
) -> Result<Option<StagedFile>, ServerError> {
    let declared = field.file_name().map(str::to_owned);
    let mut upload = staging.begin(declared.as_deref().unwrap_or_default())?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        upload.write_chunk(&chunk).await?;
    }

    // Browsers submit an empty, unnamed file part when nothing was selected.
    let unnamed = declared.as_deref().is_none_or(|n| n.trim().is_empty());
    if upload.written() == 0 && unnamed {
        return Ok(None);
    }

    let file = upload.finish().await?;
    debug!(filename = %file.filename(), size = file.size(), "upload staged");
    Ok(Some(file))
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge("File too large".into())
    } else {
        ServerError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}
