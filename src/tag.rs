use std::path::Path;

use anyhow::Result;
use id3::TagLike;
use log::warn;

use crate::error::DecodeError;

const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Cover image format, decided by the blob's magic bytes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverMime {
    Jpeg,
    Png,
}

impl CoverMime {
    /// Classify a non-empty cover blob. Anything that is neither jpeg nor
    /// png is [`DecodeError::UnknownCoverFormat`], which callers treat as
    /// "decode fine, just drop the cover".
    pub fn detect(cover: &[u8]) -> Result<Self, DecodeError> {
        if cover.starts_with(&JPEG_MAGIC) {
            Ok(Self::Jpeg)
        } else if cover.starts_with(&PNG_MAGIC) {
            Ok(Self::Png)
        } else {
            Err(DecodeError::UnknownCoverFormat)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Embed the cover as the front-cover picture of the already written media
/// file. The tag flavor follows the container's `format` field: ID3v2.3 for
/// mp3, a FLAC picture block for flac.
pub fn embed_cover(path: &Path, format: &str, mime: CoverMime, cover: Vec<u8>) -> Result<()> {
    match format {
        "mp3" => {
            // Keep whatever tag the decrypted stream already carries.
            let mut tag = id3::Tag::read_from_path(path).unwrap_or_else(|_| id3::Tag::new());
            tag.remove_picture_by_type(id3::frame::PictureType::CoverFront);
            tag.add_frame(id3::frame::Picture {
                mime_type: mime.as_str().to_string(),
                picture_type: id3::frame::PictureType::CoverFront,
                description: "cover".to_string(),
                data: cover,
            });
            tag.write_to_path(path, id3::Version::Id3v23)?;
        }
        "flac" => {
            let mut tag = metaflac::Tag::read_from_path(path)?;
            tag.remove_picture_type(metaflac::block::PictureType::CoverFront);
            tag.add_picture(mime.as_str(), metaflac::block::PictureType::CoverFront, cover);
            tag.write_to_path(path)?;
        }
        other => warn!("no tag writer for format {:?}, cover not embedded", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_magic_is_classified_as_png() {
        let cover = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(CoverMime::detect(&cover), Ok(CoverMime::Png));
        assert_eq!(CoverMime::Png.as_str(), "image/png");
    }

    #[test]
    fn jpeg_magic_is_classified_as_jpeg() {
        let cover = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(CoverMime::detect(&cover), Ok(CoverMime::Jpeg));
        assert_eq!(CoverMime::Jpeg.as_str(), "image/jpeg");
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(
            CoverMime::detect(b"GIF89a"),
            Err(DecodeError::UnknownCoverFormat)
        );
        // A prefix of the png magic is not enough.
        assert_eq!(
            CoverMime::detect(&[0x89, 0x50]),
            Err(DecodeError::UnknownCoverFormat)
        );
    }
}
