use std::sync::OnceLock;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::KeyInit;
use aes::Aes128;
use ecb::cipher::BlockDecryptMut;
use ecb::Decryptor;
use hex_literal::hex;

use crate::error::DecodeError;

// "hzHRAmso5kInbaxW" and "#14ljk_!\]&0U<'(", the two process-wide keys every
// ncm container is encrypted under.
pub(crate) const CORE_KEY: [u8; 16] = hex!("687A4852416D736F356B496E62617857");
pub(crate) const META_KEY: [u8; 16] = hex!("2331346C6A6B5F215C5D2630553C2728");

type Aes128EcbDec = Decryptor<Aes128>;

static CORE_CIPHER: OnceLock<Aes128EcbDec> = OnceLock::new();
static META_CIPHER: OnceLock<Aes128EcbDec> = OnceLock::new();

/// XOR every byte with a constant mask. Self-inverse.
pub fn xor_mask(data: &mut [u8], mask: u8) {
    for byte in data {
        *byte ^= mask;
    }
}

/// Decrypt the key blob in place with the core key.
pub fn decrypt_core(buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    let cipher = CORE_CIPHER
        .get_or_init(|| Aes128EcbDec::new((&CORE_KEY).into()))
        .clone();
    decrypt_in_place(cipher, buf)
}

/// Decrypt the metadata blob in place with the meta key.
pub fn decrypt_meta(buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    let cipher = META_CIPHER
        .get_or_init(|| Aes128EcbDec::new((&META_KEY).into()))
        .clone();
    decrypt_in_place(cipher, buf)
}

/// AES-128-ECB decryption followed by a lenient PKCS-style unpad: the last
/// plaintext byte is trusted as the pad length and that many trailing bytes
/// are dropped. The pad bytes' values are deliberately not checked, because
/// real-world containers do not always follow strict padding conventions.
fn decrypt_in_place(cipher: Aes128EcbDec, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    let len = buf.len();
    if len == 0 || len % 16 != 0 {
        return Err(DecodeError::InvalidCiphertextLength(len));
    }
    cipher
        .decrypt_padded_mut::<NoPadding>(buf.as_mut_slice())
        .map_err(|_| DecodeError::InvalidCiphertextLength(len))?;
    let pad = buf[len - 1] as usize;
    if pad == 0 || pad > len {
        return Err(DecodeError::InvalidPadding(pad));
    }
    buf.truncate(len - pad);
    Ok(())
}

/// Derive the 256-byte keystream from the per-file key.
///
/// First a plain RC4 key schedule builds the permutation box, then the
/// keystream is read out with ncm's double indexing in rotated source order:
/// output position 0 holds source index 1 and position 255 holds source
/// index 0. There is no per-byte PRGA state, the 256 bytes are final.
pub fn build_keystream(key: &[u8]) -> [u8; 256] {
    debug_assert!(!key.is_empty());
    let mut sbox: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0usize;
    for i in 0..256 {
        j = (sbox[i] as usize + j + key[i % key.len()] as usize) & 0xff;
        sbox.swap(i, j);
    }
    let mut keystream = [0u8; 256];
    for (pos, slot) in keystream.iter_mut().enumerate() {
        let i = (pos + 1) & 0xff;
        let a = sbox[i] as usize;
        let b = sbox[(i + a) & 0xff] as usize;
        *slot = sbox[(a + b) & 0xff];
    }
    keystream
}

/// XOR the tiled keystream over the audio payload in place.
///
/// Working in 256-byte chunks keeps the loop free of modular index math so
/// the compiler can vectorize it; this is the dominant cost for large files.
pub fn decrypt_audio(payload: &mut [u8], keystream: &[u8; 256]) {
    for chunk in payload.chunks_mut(256) {
        for (byte, key) in chunk.iter_mut().zip(keystream) {
            *byte ^= key;
        }
    }
}

#[cfg(test)]
pub(crate) fn encrypt_padded(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
    use aes::cipher::block_padding::Pkcs7;
    use ecb::cipher::BlockEncryptMut;
    let msg_len = data.len();
    let mut buf = data.to_vec();
    buf.resize(msg_len + 16, 0);
    ecb::Encryptor::<Aes128>::new(key.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, msg_len)
        .unwrap()
        .to_vec()
}

#[cfg(test)]
pub(crate) fn encrypt_blocks(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
    use ecb::cipher::BlockEncryptMut;
    assert_eq!(data.len() % 16, 0);
    let msg_len = data.len();
    let mut buf = data.to_vec();
    ecb::Encryptor::<Aes128>::new(key.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)
        .unwrap()
        .to_vec()
}
