//! Decrypting the per partition title key.
//!
//! Partition data is encrypted with a per partition title key, which is
//! itself stored encrypted under the AES common key burned into every
//! console. That key is well known but not shipped with this crate, callers
//! bring their own copy.

use aes::{
    cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit},
    Aes128,
};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// The 16 byte AES key shared by all Wii consoles.
#[derive(Clone)]
pub struct CommonKey([u8; 16]);

impl CommonKey {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Decrypts a partition's title key, the iv is the partition's title id
/// padded with 8 zero bytes. Both inputs come from
/// [`read_title_key_material`](crate::WbfsDisc::read_title_key_material).
pub fn decrypt_title_key(
    common_key: &CommonKey,
    encrypted_title_key: &[u8; 16],
    title_id: &[u8; 8],
) -> [u8; 16] {
    let mut iv = [0; 16];
    iv[..8].copy_from_slice(title_id);
    let mut title_key = *encrypted_title_key;
    Aes128CbcDec::new(common_key.as_bytes().into(), iv.as_ref().into())
        // a single full block, unpadding can't fail
        .decrypt_padded_mut::<NoPadding>(&mut title_key)
        .unwrap();
    title_key
}

#[cfg(test)]
mod test {
    use aes::cipher::BlockEncryptMut;

    use super::*;

    type Aes128CbcEnc = cbc::Encryptor<Aes128>;

    #[test]
    fn decrypts_what_was_encrypted_under_the_common_key() {
        let common_key = CommonKey::new([0x11; 16]);
        let title_id = [1, 2, 3, 4, 5, 6, 7, 8];
        let plain = *b"sixteen byte key";
        let mut iv = [0; 16];
        iv[..8].copy_from_slice(&title_id);
        let mut encrypted = plain;
        Aes128CbcEnc::new(common_key.as_bytes().into(), iv.as_ref().into())
            .encrypt_padded_mut::<NoPadding>(&mut encrypted, 16)
            .unwrap();
        assert_ne!(encrypted, plain);
        assert_eq!(decrypt_title_key(&common_key, &encrypted, &title_id), plain);
    }

    #[test]
    fn the_title_id_changes_the_result() {
        let common_key = CommonKey::new([0x22; 16]);
        let encrypted = [0x5A; 16];
        let a = decrypt_title_key(&common_key, &encrypted, &[0; 8]);
        let b = decrypt_title_key(&common_key, &encrypted, &[1; 8]);
        assert_ne!(a, b);
    }
}
