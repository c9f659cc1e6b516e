//! Tor-facing key material: onion addresses, the `hs_ed25519_*` file
//! envelopes, client authorization keys, and the offset arithmetic that
//! turns a search result back into a secret key.

use sha2::Sha512;
use sha3::{Digest, Sha3_256};
use zeroize::Zeroize;

use crate::constants;
use crate::errors::Error;
use crate::field::FieldElement;
use crate::prefix::Charset;

/// File name Tor expects for the hostname.
pub const HOSTNAME_FILE_NAME: &str = "hostname";
/// File name Tor expects for the public key envelope.
pub const PUBLIC_KEY_FILE_NAME: &str = "hs_ed25519_public_key";
/// File name Tor expects for the secret key envelope.
pub const SECRET_KEY_FILE_NAME: &str = "hs_ed25519_secret_key";

const PUBLIC_KEY_FILE_TAG: &[u8; 32] = b"== ed25519v1-public: type0 ==\x00\x00\x00";
const SECRET_KEY_FILE_TAG: &[u8; 32] = b"== ed25519v1-secret: type0 ==\x00\x00\x00";

/// Length of the `hs_ed25519_public_key` file: tag plus 32-byte key.
pub const PUBLIC_KEY_FILE_LEN: usize = 64;
/// Length of the `hs_ed25519_secret_key` file: tag plus 64-byte expanded key.
pub const SECRET_KEY_FILE_LEN: usize = 96;

/// Onion service address version.
const VERSION: u8 = 3;

/// Ed25519 scalar clamping: clear the low three bits of the first byte,
/// clear the top bit and set the second-to-top bit of the last byte.
fn clamp(scalar: &mut [u8; 32]) {
    scalar[0] &= 248;
    scalar[31] &= 63;
    scalar[31] |= 64;
}

/// The compressed Edwards public key for a 32-byte secret scalar.
///
/// The scalar is clamped before the basepoint multiplication, as in
/// Ed25519 key derivation.
pub fn public_key_for(secret_key: &[u8; 32]) -> [u8; 32] {
    let mut scalar = *secret_key;
    clamp(&mut scalar);
    let public = *constants::ED25519_BASEPOINT_POINT
        .vartime_mul(&scalar)
        .compress()
        .as_bytes();
    scalar.zeroize();
    public
}

/// The Montgomery-u public key for a 32-byte secret scalar, as printed
/// for Client Authorization.
pub fn client_public_key_for(secret_key: &[u8; 32]) -> [u8; 32] {
    let mut scalar = *secret_key;
    clamp(&mut scalar);
    let public = constants::ED25519_BASEPOINT_POINT
        .vartime_mul(&scalar)
        .to_montgomery_bytes();
    scalar.zeroize();
    public
}

/// The secret scalar at `offset` from `secret_key`: computes
/// `secret_key + 8 * offset` in the field, matching the search's walk in
/// multiples of the cofactor-cleared basepoint.
///
/// The result is deliberately *not* re-clamped: Tor's expanded secret
/// key format stores the scalar verbatim, and clamping happens only when
/// a public key is derived.
pub fn add_offset(secret_key: &[u8; 32], offset: &[u8; 32]) -> [u8; 32] {
    let s = FieldElement::from_bytes(secret_key);
    let off = FieldElement::from_bytes(offset);
    let off2 = &off + &off;
    let off4 = &off2 + &off2;
    let off8 = &off4 + &off4;
    (&s + &off8).as_bytes()
}

/// The `.onion` address for an ed25519 public key, as specified in
/// "6. Encoding onion addresses" of the v3 rendezvous spec
/// (`rend-spec-v3.txt`).
pub fn encode_onion_address(public_key: &[u8; 32]) -> String {
    // CHECKSUM = H(".onion checksum" | PUBKEY | VERSION)[:2]
    let mut h = Sha3_256::new();
    h.update(b".onion checksum");
    h.update(public_key);
    h.update([VERSION]);
    let checksum = h.finalize();

    // onion_address = base32(PUBKEY | CHECKSUM | VERSION) + ".onion"
    let mut address = [0u8; 35];
    address[..32].copy_from_slice(public_key);
    address[32..34].copy_from_slice(&checksum[..2]);
    address[34] = VERSION;

    format!("{}.onion", Charset::Onion.encode(&address))
}

/// The content of the `hs_ed25519_public_key` file.
pub fn encode_public_key_file(public_key: &[u8; 32]) -> [u8; PUBLIC_KEY_FILE_LEN] {
    let mut buf = [0u8; PUBLIC_KEY_FILE_LEN];
    buf[..32].copy_from_slice(PUBLIC_KEY_FILE_TAG);
    buf[32..].copy_from_slice(public_key);
    buf
}

/// The content of the `hs_ed25519_secret_key` file.
///
/// Tor stores secret keys in the 64-byte expanded form: the clamped
/// 32-byte scalar followed by 32 bytes used for nonce derivation.  The
/// second half is derived deterministically as `SHA-512(scalar)[32..]`.
pub fn encode_secret_key_file(secret_key: &[u8; 32]) -> [u8; SECRET_KEY_FILE_LEN] {
    let mut expanded = [0u8; 64];
    expanded.copy_from_slice(&Sha512::digest(secret_key));
    expanded[..32].copy_from_slice(secret_key);
    expanded[0] &= 248;
    expanded[31] &= 63;
    expanded[31] |= 64;

    let mut buf = [0u8; SECRET_KEY_FILE_LEN];
    buf[..32].copy_from_slice(SECRET_KEY_FILE_TAG);
    buf[32..].copy_from_slice(&expanded);
    expanded.zeroize();
    buf
}

/// Parse the content of an `hs_ed25519_public_key` file.
pub fn parse_public_key_file(bytes: &[u8]) -> Result<[u8; 32], Error> {
    let key = bytes
        .strip_prefix(PUBLIC_KEY_FILE_TAG.as_slice())
        .ok_or(Error::InvalidPublicKey)?;
    if key.len() != 32 {
        return Err(Error::InvalidPublicKey);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(key);
    Ok(out)
}

/// Parse the content of an `hs_ed25519_secret_key` file, returning the
/// 32-byte secret scalar.
pub fn parse_secret_key_file(bytes: &[u8]) -> Result<[u8; 32], Error> {
    let expanded = bytes
        .strip_prefix(SECRET_KEY_FILE_TAG.as_slice())
        .ok_or(Error::InvalidSecretKey)?;
    if expanded.len() != 64 {
        return Err(Error::InvalidSecretKey);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&expanded[..32]);
    Ok(out)
}

/// Encode a key in the base32 form used for Client Authorization files.
pub fn encode_client_key(key: &[u8; 32]) -> String {
    Charset::Client.encode(key)
}

/// Decode a base32 Client Authorization key.
pub fn decode_client_key(s: &str) -> Result<[u8; 32], Error> {
    let decoded = Charset::Client
        .decode(s.trim())
        .ok_or(Error::InvalidSecretKey)?;
    if decoded.len() != 32 {
        return Err(Error::InvalidSecretKey);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&decoded);
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    const FIXTURE_SK: &str = "7bd6z6w72afftbr7aybfbgstm7exdnndgm74cocbrnfkjegnifca";
    const FIXTURE_PK: &str = "onionjifniegtjbbifet65goa2siqubne6n2qfhiksryfvsbdhda";
    const FIXTURE_HOSTNAME: &str =
        "onionjifniegtjbbifet65goa2siqubne6n2qfhiksryfvsbdhdl5zid.onion";

    fn fixture_secret_key() -> [u8; 32] {
        Charset::Onion
            .decode(FIXTURE_SK)
            .unwrap()
            .try_into()
            .unwrap()
    }

    #[test]
    fn fixture_round_trip() {
        let sk = fixture_secret_key();
        let pk = public_key_for(&sk);
        assert_eq!(Charset::Onion.encode(&pk), FIXTURE_PK);
        assert_eq!(encode_onion_address(&pk), FIXTURE_HOSTNAME);
    }

    #[test]
    fn onion_address_shape() {
        let address = encode_onion_address(&[0u8; 32]);
        assert_eq!(address.len(), 56 + ".onion".len());
        assert!(address.ends_with(".onion"));
        assert!(address[..56]
            .chars()
            .all(|c| Charset::Onion.letters().contains(c)));
    }

    #[test]
    fn public_key_envelope_round_trip() {
        let sk = fixture_secret_key();
        let pk = public_key_for(&sk);
        let file = encode_public_key_file(&pk);
        assert_eq!(file.len(), PUBLIC_KEY_FILE_LEN);
        assert_eq!(parse_public_key_file(&file).unwrap(), pk);

        assert_eq!(parse_public_key_file(&file[..63]), Err(Error::InvalidPublicKey));
        assert_eq!(
            parse_public_key_file(&[0u8; PUBLIC_KEY_FILE_LEN]),
            Err(Error::InvalidPublicKey)
        );
    }

    #[test]
    fn secret_key_envelope_round_trip() {
        // The fixture scalar is already in clamped form, so it survives
        // the envelope unchanged.
        let sk = fixture_secret_key();
        let file = encode_secret_key_file(&sk);
        assert_eq!(file.len(), SECRET_KEY_FILE_LEN);
        assert_eq!(parse_secret_key_file(&file).unwrap(), sk);

        // The expanded form's second half is the SHA-512 tail.
        let expanded = Sha512::digest(sk);
        assert_eq!(&file[64..], &expanded[32..]);

        assert_eq!(parse_secret_key_file(&file[..95]), Err(Error::InvalidSecretKey));
    }

    #[test]
    fn add_offset_of_zero_is_identity() {
        let sk = fixture_secret_key();
        assert_eq!(add_offset(&sk, &[0u8; 32]), sk);
    }

    #[test]
    fn add_offset_is_not_clamped() {
        // Offsets shift the low bits freely; the stored scalar keeps them.
        let sk = fixture_secret_key();
        let mut offset = [0u8; 32];
        offset[0] = 1;
        let shifted = add_offset(&sk, &offset);
        assert_eq!(shifted[0], sk[0].wrapping_add(8));
    }

    #[test]
    fn client_key_round_trip() {
        let sk = fixture_secret_key();
        let pk = client_public_key_for(&sk);
        let encoded = encode_client_key(&pk);
        assert_eq!(encoded.len(), 52);
        assert_eq!(decode_client_key(&encoded).unwrap(), pk);
    }
}
