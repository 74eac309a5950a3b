use base64ct::{Base64, Encoding};
use serde::Deserialize;

use crate::crypto;
use crate::cursor::Cursor;
use crate::error::DecodeError;

const MAGIC: &[u8; 8] = b"CTENFDAM";
/// Mask over the key blob.
const KEY_MASK: u8 = 0x64;
/// Mask over the metadata blob.
const META_MASK: u8 = 0x63;
/// "neteasecloudmusic", prepended to the decrypted per-file key.
const KEY_PREFIX_LEN: usize = 17;
/// "163 key(Don't modify):", prepended to the base64 metadata ciphertext.
const META_PREFIX_LEN: usize = 22;
/// "music:", prepended to the metadata json text.
const META_TEXT_PREFIX_LEN: usize = 6;

/// Ids show up as json numbers in some containers and as strings in others.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MetaId {
    Num(u64),
    Text(String),
}

/// The decrypted metadata record. Only `format` is guaranteed to be present;
/// real-world containers are inconsistent about everything else, so the rest
/// defaults to empty rather than failing the whole file.
#[allow(dead_code)]
#[derive(Deserialize, Debug, Clone)]
pub struct Music {
    #[serde(rename = "musicId", default)]
    pub music_id: Option<MetaId>,
    #[serde(rename = "musicName", default)]
    pub music_name: String,
    /// Pairs of artist name and id.
    #[serde(default)]
    pub artist: Vec<(String, MetaId)>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub bitrate: Option<MetaId>,
    #[serde(default)]
    pub duration: Option<MetaId>,
    /// "mp3" or "flac"; selects the tag writer and the output extension.
    pub format: String,
}

/// Everything recovered from one container. Owned by the caller; the decoder
/// keeps no state between calls.
pub struct DecodedContainer {
    pub metadata: Music,
    /// Raw cover image bytes; empty means the container ships no cover.
    pub cover: Vec<u8>,
    /// The decrypted media bytes, ready to be written verbatim.
    pub audio: Vec<u8>,
}

/// Decode one ncm container held in memory.
///
/// Layout: 8-byte magic, 2 skipped bytes, length-prefixed key blob,
/// length-prefixed metadata blob, 9 skipped bytes, length-prefixed cover
/// blob, then the encrypted audio payload up to the end of the input.
pub fn decode(data: &[u8]) -> Result<DecodedContainer, DecodeError> {
    let mut cursor = Cursor::new(data);
    if cursor.take(8)? != MAGIC {
        return Err(DecodeError::BadMagicHeader);
    }
    cursor.skip(2)?;

    let mut key_blob = cursor.read_segment()?;
    crypto::xor_mask(&mut key_blob, KEY_MASK);
    crypto::decrypt_core(&mut key_blob)?;
    if key_blob.len() <= KEY_PREFIX_LEN {
        return Err(DecodeError::InvalidPadding(key_blob.len()));
    }
    let keystream = crypto::build_keystream(&key_blob[KEY_PREFIX_LEN..]);

    let metadata = decode_metadata(cursor.read_segment()?)?;

    // CRC plus a gap byte block, unused.
    cursor.skip(9)?;
    let cover = cursor.read_segment()?;

    let mut audio = cursor.rest().to_vec();
    crypto::decrypt_audio(&mut audio, &keystream);

    Ok(DecodedContainer {
        metadata,
        cover,
        audio,
    })
}

/// Unmask, base64-decode and decrypt the metadata blob, then parse the json
/// record that follows the "music:" prefix.
fn decode_metadata(mut blob: Vec<u8>) -> Result<Music, DecodeError> {
    crypto::xor_mask(&mut blob, META_MASK);
    let encoded = blob
        .get(META_PREFIX_LEN..)
        .ok_or_else(|| metadata_err("blob shorter than its fixed prefix"))?;
    let encoded =
        std::str::from_utf8(encoded).map_err(|e| metadata_err(format_args!("bad base64 text: {e}")))?;
    let mut meta = Base64::decode_vec(encoded)
        .map_err(|e| metadata_err(format_args!("bad base64: {e}")))?;
    crypto::decrypt_meta(&mut meta)?;
    let text =
        std::str::from_utf8(&meta).map_err(|e| metadata_err(format_args!("not utf-8: {e}")))?;
    let json = text
        .get(META_TEXT_PREFIX_LEN..)
        .ok_or_else(|| metadata_err("text shorter than its fixed prefix"))?;
    serde_json::from_str(json).map_err(|e| metadata_err(format_args!("bad json: {e}")))
}

fn metadata_err(reason: impl std::fmt::Display) -> DecodeError {
    DecodeError::MetadataParse(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &[u8] = b"0123456789abcdef";

    /// Assemble a container the way the encoder would, from the layers out:
    /// encrypt then mask each blob, and XOR the audio with the keystream.
    fn build_container(key: &[u8], meta_json: &str, cover: &[u8], audio: &[u8]) -> Vec<u8> {
        let mut key_plain = b"neteasecloudmusic".to_vec();
        key_plain.extend_from_slice(key);
        let mut key_blob = crypto::encrypt_padded(&key_plain, &crypto::CORE_KEY);
        crypto::xor_mask(&mut key_blob, KEY_MASK);

        let meta_cipher =
            crypto::encrypt_padded(format!("music:{meta_json}").as_bytes(), &crypto::META_KEY);
        let mut meta_blob = b"163 key(Don't modify):".to_vec();
        meta_blob.extend_from_slice(Base64::encode_string(&meta_cipher).as_bytes());
        crypto::xor_mask(&mut meta_blob, META_MASK);

        let keystream = crypto::build_keystream(key);
        let mut audio_cipher = audio.to_vec();
        crypto::decrypt_audio(&mut audio_cipher, &keystream);

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[0x01, 0x70]);
        out.extend_from_slice(&(key_blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&key_blob);
        out.extend_from_slice(&(meta_blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&meta_blob);
        out.extend_from_slice(&[0u8; 9]);
        out.extend_from_slice(&(cover.len() as u32).to_le_bytes());
        out.extend_from_slice(cover);
        out.extend_from_slice(&audio_cipher);
        out
    }

    #[test]
    fn decodes_a_synthetic_container() {
        let audio: Vec<u8> = (0..4096).map(|i| (i * 7 % 256) as u8).collect();
        let meta = r#"{"format":"mp3","musicName":"Test Song","artist":[["Someone",42]]}"#;
        let container = build_container(TEST_KEY, meta, &[], &audio);

        let decoded = decode(&container).unwrap();
        assert_eq!(decoded.metadata.format, "mp3");
        assert_eq!(decoded.metadata.music_name, "Test Song");
        assert_eq!(
            decoded.metadata.artist,
            vec![("Someone".to_string(), MetaId::Num(42))]
        );
        assert!(decoded.cover.is_empty());
        assert_eq!(decoded.audio, audio);
    }

    #[test]
    fn string_ids_and_flac_format_are_accepted() {
        let meta = r#"{"format":"flac","musicId":"998","artist":[["A","1"]]}"#;
        let container = build_container(TEST_KEY, meta, &[], b"fLaC");
        let decoded = decode(&container).unwrap();
        assert_eq!(decoded.metadata.format, "flac");
        assert_eq!(decoded.metadata.music_id, Some(MetaId::Text("998".into())));
    }

    #[test]
    fn cover_bytes_pass_through_untouched() {
        let cover = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
        let container = build_container(TEST_KEY, r#"{"format":"mp3"}"#, &cover, b"audio");
        let decoded = decode(&container).unwrap();
        assert_eq!(decoded.cover, cover);
        assert_eq!(decoded.audio, b"audio");
    }

    #[test]
    fn flipped_magic_byte_is_rejected() {
        let mut container = build_container(TEST_KEY, r#"{"format":"mp3"}"#, &[], b"audio");
        container[0] ^= 0xff;
        assert!(matches!(
            decode(&container),
            Err(DecodeError::BadMagicHeader)
        ));
    }

    #[test]
    fn truncation_inside_key_length_prefix_is_detected() {
        let container = build_container(TEST_KEY, r#"{"format":"mp3"}"#, &[], b"audio");
        // Cut in the middle of the 4-byte key blob length at offset 10.
        assert!(matches!(
            decode(&container[..12]),
            Err(DecodeError::TruncatedInput {
                needed: 4,
                remaining: 2
            })
        ));
    }

    #[test]
    fn empty_audio_payload_is_valid() {
        let container = build_container(TEST_KEY, r#"{"format":"mp3"}"#, &[], &[]);
        assert!(decode(&container).unwrap().audio.is_empty());
    }

    #[test]
    fn garbage_metadata_text_is_a_parse_error() {
        let container = build_container(TEST_KEY, "definitely not json", &[], b"audio");
        assert!(matches!(
            decode(&container),
            Err(DecodeError::MetadataParse(_))
        ));
    }

    #[test]
    fn metadata_without_format_is_a_parse_error() {
        let container = build_container(TEST_KEY, r#"{"musicName":"x"}"#, &[], b"audio");
        assert!(matches!(
            decode(&container),
            Err(DecodeError::MetadataParse(_))
        ));
    }
}
