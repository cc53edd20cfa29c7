// Form data processing for RecoBattle
//
// Parses the multipart upload form: the provider name (`asr`), the client-side
// file name (`file_name`) and the audio bytes (`audio`).

use actix_multipart::{Field, Multipart};
use futures::{StreamExt, TryStreamExt};
use log::debug;

use crate::error::HandlerError;

/// Fields of an upload request
#[derive(Debug, Default)]
pub struct UploadForm {
    pub asr: String,
    pub file_name: String,
    pub audio: Vec<u8>,
}

/// Extract the upload form, enforcing `max_file_size` while streaming the audio
///
/// # Errors
///
/// * `MissingField` when `asr` or `file_name` is absent or blank
/// * `NoAudioFile` when no `audio` part was sent or it is empty
/// * `FileTooLarge` as soon as the audio exceeds the limit
pub async fn extract_upload_form(
    mut form: Multipart,
    max_file_size: usize,
) -> Result<UploadForm, HandlerError> {
    let mut upload = UploadForm::default();
    let mut has_audio = false;

    while let Some(mut field) = form
        .try_next()
        .await
        .map_err(|e| HandlerError::form_error(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|name| name.to_string()))
            .unwrap_or_default();

        match field_name.as_str() {
            "asr" => upload.asr = read_text(&mut field, "asr").await?,
            "file_name" => {
                upload.file_name = read_text(&mut field, "file_name").await?;
            }
            "audio" => {
                // the part's own filename is a fallback for an absent file_name field
                if upload.file_name.is_empty() {
                    if let Some(name) = field.content_disposition().and_then(|cd| cd.get_filename()) {
                        upload.file_name = name.trim().to_string();
                    }
                }

                let mut total_size = 0;
                while let Some(chunk) = field.next().await {
                    let data = chunk.map_err(|e| {
                        HandlerError::form_error(format!("Error processing file upload: {}", e))
                    })?;

                    total_size += data.len();
                    if total_size > max_file_size {
                        return Err(HandlerError::FileTooLarge(max_file_size));
                    }
                    upload.audio.extend_from_slice(&data);
                }
                has_audio = true;
            }
            _ => {
                debug!("Skipping unknown form field '{}'", field_name);
                while field.next().await.is_some() {}
            }
        }
    }

    if upload.asr.is_empty() {
        return Err(HandlerError::MissingField("asr"));
    }
    if upload.file_name.is_empty() {
        return Err(HandlerError::MissingField("file_name"));
    }
    if !has_audio || upload.audio.is_empty() {
        return Err(HandlerError::NoAudioFile);
    }

    Ok(upload)
}

/// Read a text field, trimmed
async fn read_text(field: &mut Field, name: &str) -> Result<String, HandlerError> {
    let mut value = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            HandlerError::form_error(format!("Error reading field {}: {}", name, e))
        })?;
        value.extend_from_slice(&chunk);
    }

    String::from_utf8(value)
        .map(|s| s.trim().to_string())
        .map_err(|_| HandlerError::form_error(format!("Field {} is not valid UTF-8", name)))
}
