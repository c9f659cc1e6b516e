//! Compilation of textual base32 prefixes into bit-level predicates over
//! raw 32-byte public keys.
//!
//! An onion address is `base32(pk || checksum || version)`, so the public
//! key occupies the first 51.2 characters and a textual prefix of up to 51
//! characters maps exactly to a constraint on the leading `5·len` bits of
//! the key bytes.  The same holds for client authorization keys, which are
//! `base32(pk_montgomery)` in the uppercase alphabet.

use crate::errors::Error;

/// One of the two base32 alphabets Tor uses, both RFC 4648 without padding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Charset {
    /// Lowercase `a-z2-7`, used by Onion Service v3 hostnames.
    Onion,
    /// Uppercase `A-Z2-7`, used by Client Authorization keys.
    Client,
}

impl Charset {
    /// The 32 characters of this alphabet, in value order.
    pub const fn letters(&self) -> &'static str {
        match self {
            Charset::Onion => "abcdefghijklmnopqrstuvwxyz234567",
            Charset::Client => "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567",
        }
    }

    fn alphabet(&self) -> base32::Alphabet {
        match self {
            Charset::Onion => base32::Alphabet::Rfc4648Lower { padding: false },
            Charset::Client => base32::Alphabet::Rfc4648 { padding: false },
        }
    }

    /// The character encoding the value zero, used to pad prefixes to a
    /// full base32 quantum before decoding.
    fn zero_char(&self) -> char {
        match self {
            Charset::Onion => 'a',
            Charset::Client => 'A',
        }
    }

    /// Encode bytes in this alphabet, without padding.
    pub fn encode(&self, data: &[u8]) -> String {
        base32::encode(self.alphabet(), data)
    }

    /// Decode a string in this alphabet.
    pub fn decode(&self, s: &str) -> Option<Vec<u8>> {
        base32::decode(self.alphabet(), s)
    }

    /// Fold a user-supplied prefix into this alphabet's case.
    pub fn normalize(&self, prefix: &str) -> String {
        match self {
            Charset::Onion => prefix.to_ascii_lowercase(),
            Charset::Client => prefix.to_ascii_uppercase(),
        }
    }
}

/// Base32-decode a prefix, returning the decoded bytes and the number of
/// bits of them the prefix determines.
///
/// The prefix is padded on the right with the alphabet's zero character to
/// a whole number of base32 quantums (8 characters = 5 bytes), so the
/// returned vector's length is a multiple of 5 while `bits` is exactly
/// `5 * prefix.len()`.
pub fn decode_prefix_bits(prefix: &str, charset: Charset) -> Result<(Vec<u8>, usize), Error> {
    if prefix.is_empty() {
        return Err(Error::NoPrefixes);
    }
    if let Some(ch) = prefix.chars().find(|&c| !charset.letters().contains(c)) {
        return Err(Error::PrefixAlphabet {
            prefix: prefix.into(),
            ch,
        });
    }
    // 52 characters already constrain 260 bits, more than the 255 bits a
    // public key determines.
    if prefix.len() > 51 {
        return Err(Error::PrefixTooLong(prefix.len()));
    }

    let bits = 5 * prefix.len();
    let quantums = prefix.len().div_ceil(8);
    let mut padded = String::with_capacity(quantums * 8);
    padded.push_str(prefix);
    while padded.len() < quantums * 8 {
        padded.push(charset.zero_char());
    }

    let bytes = charset.decode(&padded).ok_or(Error::PrefixAlphabet {
        prefix: prefix.into(),
        ch: '?',
    })?;
    debug_assert_eq!(bytes.len(), quantums * 5);
    Ok((bytes, bits))
}

/// A single compiled prefix: a whole-byte comparison plus, when the bit
/// count is not a multiple of eight, a masked comparison of one trailing
/// byte.
#[derive(Clone, Debug)]
pub struct PrefixFilter {
    text: String,
    prefix: Vec<u8>,
    /// `(shift, value)`: the top `8 - shift` bits of the byte after
    /// `prefix` must equal `value`.
    tail: Option<(u8, u8)>,
}

impl PrefixFilter {
    /// Compile a textual prefix over the given alphabet.
    pub fn new(prefix: &str, charset: Charset) -> Result<PrefixFilter, Error> {
        let (bytes, bits) = decode_prefix_bits(prefix, charset)?;

        let whole_bytes = bits / 8;
        let tail = if bits % 8 == 0 {
            None
        } else {
            let shift = (8 - bits % 8) as u8;
            Some((shift, bytes[whole_bytes] >> shift))
        };

        Ok(PrefixFilter {
            text: prefix.into(),
            prefix: bytes[..whole_bytes].to_vec(),
            tail,
        })
    }

    /// The prefix this filter was compiled from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the candidate's leading bits spell this prefix.
    #[inline]
    pub fn matches(&self, candidate: &[u8; 32]) -> bool {
        // A prefix is at most 51 characters = 255 bits, so the whole-byte
        // part is at most 31 bytes and the tail byte is always in bounds.
        if candidate[..self.prefix.len()] != self.prefix[..] {
            return false;
        }
        match self.tail {
            Some((shift, value)) => candidate[self.prefix.len()] >> shift == value,
            None => true,
        }
    }
}

/// A disjunction of compiled prefixes over one alphabet.
#[derive(Clone, Debug)]
pub struct Matcher {
    charset: Charset,
    filters: Vec<PrefixFilter>,
}

impl Matcher {
    /// Compile a set of prefixes.  At least one is required.
    pub fn new<S: AsRef<str>>(prefixes: &[S], charset: Charset) -> Result<Matcher, Error> {
        if prefixes.is_empty() {
            return Err(Error::NoPrefixes);
        }
        let filters = prefixes
            .iter()
            .map(|p| PrefixFilter::new(p.as_ref(), charset))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Matcher { charset, filters })
    }

    /// The alphabet the prefixes were compiled over.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Whether any compiled prefix matches the candidate.
    #[inline]
    pub fn matches(&self, candidate: &[u8; 32]) -> bool {
        self.filters.iter().any(|f| f.matches(candidate))
    }

    /// The longest supplied prefix that is a textual prefix of `encoded`.
    /// Ties go to the first supplied prefix.
    pub fn longest_match(&self, encoded: &str) -> Option<&str> {
        let mut longest: Option<&str> = None;
        for f in &self.filters {
            if encoded.starts_with(f.text()) && longest.map_or(true, |l| f.text().len() > l.len()) {
                longest = Some(f.text());
            }
        }
        longest
    }
}
