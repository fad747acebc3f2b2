use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;

use crate::error::{GazeError, Result};

/// Where a frame comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// Raw base64 or a `data:` URL.
    Base64(String),
}

impl ImageSource {
    /// Short description for log lines, never the payload itself.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ImageSource::Base64(data) => format!("<base64, {} chars>", data.len()),
        }
    }

    pub fn load(&self) -> Result<RgbImage> {
        match self {
            ImageSource::Path(path) => {
                if !path.exists() {
                    return Err(GazeError::InvalidInput(format!(
                        "File not found at path: {}",
                        path.display()
                    )));
                }
                if !path.is_file() {
                    return Err(GazeError::InvalidInput(format!(
                        "Path is not a file: {}",
                        path.display()
                    )));
                }

                let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
                image::load_from_memory(&bytes)
                    .map(|image| image.to_rgb8())
                    .map_err(|_| {
                        GazeError::InvalidInput(format!(
                            "Could not read image file: {} (Invalid image format or corrupted file)",
                            path.display()
                        ))
                    })
            }
            ImageSource::Bytes(bytes) => decode_bytes(bytes),
            ImageSource::Base64(data) => decode_bytes(&decode_base64(data)?),
        }
    }
}

fn read_error(path: &Path, error: io::Error) -> GazeError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => GazeError::InvalidInput(format!(
            "No read permission for file: {}",
            path.display()
        )),
        _ => GazeError::Io(error),
    }
}

fn decode_bytes(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(GazeError::InvalidInput("empty image payload".into()));
    }
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Decode raw base64 or the payload of a `data:<mime>;base64,<payload>` URL.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let data = data.trim();
    let payload = if data.starts_with("data:") {
        data.split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| GazeError::InvalidInput("data URL has no payload".into()))?
    } else {
        data
    };

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(payload)?)
}
