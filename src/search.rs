//! The batch candidate generator.
//!
//! Candidate public keys are produced by walking the curve additively:
//! starting from a public point \\(P\\), one batch tests the
//! y-coordinates of
//! \\( \\{ P + B\_8, \ldots, P + \tfrac N2 B\_8, P - B\_8, \ldots,
//! P - \tfrac N2 B\_8 \\} \\)
//! together with the center \\(P\\) itself, then advances the center by
//! \\((N+1)·B\_8\\).  Here \\(B\_8 = 8B\\) is the cofactor-cleared
//! basepoint, so a candidate at offset \\(k\\) from a secret scalar
//! \\(s\\) corresponds to the scalar \\(s + 8k\\).
//!
//! Only y-coordinates are computed, via the affine addition formulas
//! (independent of \\(d\\)) for twisted Edwards curves from
//! [Hisil–Wong–Carter–Dawson 2008](https://eprint.iacr.org/2008/522):
//! each pair of symmetric candidates costs two multiplications and four
//! additions to set up a numerator/denominator pair, and the whole batch
//! is divided with a single inversion by [`vector_division`].  Amortized
//! per candidate this is five multiplications and two additions.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants;
use crate::edwards::{AffinePoint, CompressedEdwardsY, EdwardsPoint};
use crate::errors::Error;
use crate::field::FieldElement;

/// Which textual encoding the candidates are matched against.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyKind {
    /// Onion Service keys: candidates are Edwards y-coordinates, the
    /// compressed encoding with the x-sign bit cleared.
    Service,
    /// Client Authorization keys: candidates are Montgomery
    /// u-coordinates, mapped through \\(u = (1+y)/(1-y)\\) inside the
    /// batch division.
    Client,
}

/// Compute `u[i] = x[i] / y[i]` elementwise, using one inversion and
/// `4(n-1) + 1` multiplications.
///
/// This is Montgomery's trick extended to simultaneous divisions:
/// _Simultaneous field divisions: an extension of Montgomery's trick_,
/// David G. Harris, <https://eprint.iacr.org/2008/199>.
///
/// `u` must not alias `x` or `y` (the borrow checker enforces this).
/// All slices must have the same nonzero length, and no `y[i]` may be
/// zero: a single zero denominator collapses the running product and
/// corrupts every quotient in the batch.
pub fn vector_division(x: &[FieldElement], y: &[FieldElement], u: &mut [FieldElement]) {
    let n = x.len();
    debug_assert!(n > 0);
    debug_assert_eq!(y.len(), n);
    debug_assert_eq!(u.len(), n);

    // Forward pass: u[i] = x[i] * (y[0] * ... * y[i-1]), while py
    // accumulates y[0] * ... * y[i].
    let mut py = y[0];
    for i in 1..n {
        u[i] = &py * &x[i];
        py = &py * &y[i];
    }

    // The single inversion: 1 / (y[0] * ... * y[n-1]).
    let mut py_inv = py.invert();

    // Backward pass: multiplying u[i] = x[i] * prod_{k<i} y[k] by
    // py_inv = 1 / prod_{k<=i} y[k] leaves x[i] / y[i], after which
    // py_inv collapses to 1 / prod_{k<i} y[k] for the next step.
    for i in (1..n).rev() {
        u[i] = &py_inv * &u[i];
        py_inv = &py_inv * &y[i];
    }
    u[0] = &py_inv * &x[0];
}

/// Little-endian scalar encoding of an offset.
pub fn offset_to_bytes(offset: u128) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(&offset.to_le_bytes());
    bytes
}

/// Generate candidate public keys by adding batches of incrementing
/// offsets to the starting public key, until cancelled.
///
/// * `start_public_key` - compressed Edwards starting point
/// * `start_offset` - offset of the first batch's region, in units of `B₈`
/// * `batch_size` - candidates per batch, must be positive and even
/// * `kind` - whether candidates are Edwards-y or Montgomery-u encodings
/// * `cancel` - cooperative cancellation, polled once per batch
/// * `accept` - candidate predicate; runs for every candidate, so it must
///   be cheap and allocation-free
/// * `yield_candidate` - receives each accepted candidate and its offset;
///   the matching secret scalar is `start_secret + 8 * offset`
///
/// Returns the number of candidates examined.  Parameter validation
/// happens before the first batch; the loop itself cannot fail.
///
/// Candidate encodings always have the most significant bit clear: for
/// [`KeyKind::Service`] they carry no x-sign, so each candidate stands
/// for a point *or its negative*, and both are reachable because every
/// batch also contains the symmetric offset.  Derived public keys must
/// therefore be compared with the sign bit masked off.
pub fn search<A, Y>(
    start_public_key: &[u8; 32],
    start_offset: u128,
    batch_size: usize,
    kind: KeyKind,
    cancel: &AtomicBool,
    mut accept: A,
    mut yield_candidate: Y,
) -> Result<u64, Error>
where
    A: FnMut(&[u8; 32]) -> bool,
    Y: FnMut([u8; 32], u128),
{
    if batch_size == 0 || batch_size % 2 != 0 {
        return Err(Error::InvalidBatchSize(batch_size));
    }
    let p0 = CompressedEdwardsY(*start_public_key)
        .decompress()
        .ok_or(Error::InvalidPublicKey)?;

    let b8 = constants::ED25519_BASEPOINT_POINT.mul_by_cofactor();
    let b8_cached = b8.as_projective_niels();

    let mut p = &p0 + &b8.vartime_mul(&offset_to_bytes(start_offset));

    let half = batch_size / 2;

    // multiples[j] = (j+1) * B8, first in extended coordinates ...
    let mut multiples: Vec<EdwardsPoint> = Vec::with_capacity(half);
    let mut acc = b8;
    multiples.push(acc);
    for _ in 1..half {
        acc = (&acc + &b8_cached).as_extended();
        multiples.push(acc);
    }
    // ... then dehomogenized with a single shared inversion.
    let ones = vec![FieldElement::ONE; half];
    let zs: Vec<FieldElement> = multiples.iter().map(|m| m.Z).collect();
    let mut z_invs = vec![FieldElement::ZERO; half];
    vector_division(&ones, &zs, &mut z_invs);
    let offsets: Vec<AffinePoint> = multiples
        .iter()
        .zip(&z_invs)
        .map(|(m, z_inv)| AffinePoint::from_extended_with_z_inv(m, z_inv))
        .collect();

    // batch_offset = (batch_size + 1) * B8
    let top = multiples[half - 1]; // (batch_size / 2) * B8
    let batch_offset = &(&b8 + &top) + &top;
    let batch_offset_cached = batch_offset.as_projective_niels();

    // Shift by half of the batch size so that all table indices stay
    // positive while the batch still reaches symmetric negatives.
    p = &p + &top;

    drop(multiples);

    let slots = match kind {
        KeyKind::Service => batch_size + 1,
        KeyKind::Client => batch_size + 2,
    };
    let mut num = vec![FieldElement::ZERO; slots];
    let mut den = vec![FieldElement::ZERO; slots];
    let mut quo = vec![FieldElement::ZERO; slots];

    // Affine center point of the current batch.
    let mut pa = AffinePoint::from_extended(&p);

    let mut i = half as u64;
    loop {
        if cancel.load(Ordering::Acquire) {
            return Ok(i - half as u64);
        }

        // Affine addition formulas (independent of d) for twisted
        // Edwards curves:
        //
        //   y3 = (x1*y1 - x2*y2) / (x1*y2 - y1*x2)
        //
        // The symmetric point p2' = -p2 has y2' = y2 and x2' = -x2, so
        //
        //   y3' = (x1*y1 + x2*y2) / (x1*y2 + y1*x2)
        for (j, off) in offsets.iter().enumerate() {
            let x1y2 = &pa.x * &off.y;
            let y1x2 = &pa.y * &off.x;

            // p + (j+1)*B8
            let add_num = &pa.xy - &off.xy;
            let add_den = &x1y2 - &y1x2;
            // p - (j+1)*B8
            let sub_num = &pa.xy + &off.xy;
            let sub_den = &x1y2 + &y1x2;

            match kind {
                KeyKind::Service => {
                    num[j] = add_num;
                    den[j] = add_den;
                    num[half + j] = sub_num;
                    den[half + j] = sub_den;
                }
                KeyKind::Client => {
                    // u = (1+y)/(1-y), so y = n/d maps to u = (d+n)/(d-n).
                    num[j] = &add_den + &add_num;
                    den[j] = &add_den - &add_num;
                    num[half + j] = &sub_den + &sub_num;
                    den[half + j] = &sub_den - &sub_num;
                }
            }
        }

        // Advance the projective center to the next batch.
        p = (&p + &batch_offset_cached).as_extended();

        // Piggyback on the vector division to obtain 1/P.Z for the
        // affine refresh below, and in client mode the current center's
        // Montgomery u.
        num[batch_size] = FieldElement::ONE;
        den[batch_size] = p.Z;
        if kind == KeyKind::Client {
            num[batch_size + 1] = &FieldElement::ONE + &pa.y;
            den[batch_size + 1] = &FieldElement::ONE - &pa.y;
        }

        vector_division(&num, &den, &mut quo);
        let p_z_inv = quo[batch_size];

        // Check each candidate in the batch.
        for (j, q) in quo[..batch_size].iter().enumerate() {
            let candidate = q.as_bytes();
            if accept(&candidate) {
                let offset = if j < half {
                    start_offset + i as u128 + (j as u128 + 1)
                } else {
                    start_offset + i as u128 - (j - half + 1) as u128
                };
                yield_candidate(candidate, offset);
            }
        }

        // ... and the center point of the batch.
        let center = match kind {
            KeyKind::Service => pa.y.as_bytes(),
            KeyKind::Client => quo[batch_size + 1].as_bytes(),
        };
        if accept(&center) {
            yield_candidate(center, start_offset + i as u128);
        }

        // Refresh the affine center from the advanced projective point;
        // three multiplications, no inversion.
        pa = AffinePoint::from_extended_with_z_inv(&p, &p_z_inv);

        i += batch_size as u64 + 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prefix::{Charset, Matcher};
    use crate::tor;

    fn field_elements(n: usize) -> Vec<FieldElement> {
        (0..n)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0] = (i + 2) as u8;
                bytes[7] = 0xab;
                bytes[31] = (i % 97) as u8;
                FieldElement::from_bytes(&bytes)
            })
            .collect()
    }

    #[test]
    fn vector_division_matches_individual_division() {
        for n in [1, 2, 3, 8, 33] {
            let x = field_elements(n);
            let y: Vec<FieldElement> = field_elements(n + 1)[1..].to_vec();
            let mut u = vec![FieldElement::ZERO; n];
            vector_division(&x, &y, &mut u);
            for i in 0..n {
                assert_eq!(u[i], &x[i] * &y[i].invert(), "element {i} of {n}");
            }
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let cancel = AtomicBool::new(true);
        let pk = tor::public_key_for(&[42u8; 32]);
        for bad in [0usize, 3, 4095] {
            assert_eq!(
                search(&pk, 0, bad, KeyKind::Service, &cancel, |_| false, |_, _| {}),
                Err(Error::InvalidBatchSize(bad))
            );
        }
        // 2 is not a valid y-coordinate.
        let mut not_a_point = [0u8; 32];
        not_a_point[0] = 2;
        assert_eq!(
            search(&not_a_point, 0, 2, KeyKind::Service, &cancel, |_| false, |_, _| {}),
            Err(Error::InvalidPublicKey)
        );
    }

    #[test]
    fn counts_examined_candidates() {
        let pk = tor::public_key_for(&[7u8; 32]);
        let cancel = AtomicBool::new(false);
        let mut seen = 0u64;
        let batch_size = 8;
        let attempts = search(
            &pk,
            0,
            batch_size,
            KeyKind::Service,
            &cancel,
            |_| true,
            |_, _| {
                seen += 1;
                if seen >= 3 * (batch_size as u64 + 1) {
                    cancel.store(true, Ordering::Release);
                }
            },
        )
        .unwrap();
        assert_eq!(attempts, seen);
        assert_eq!(attempts % (batch_size as u64 + 1), 0);
    }

    /// Every yielded (candidate, offset) must re-derive from scratch:
    /// the scalar `start + 8*offset` produces a public key equal to the
    /// candidate up to the x-sign bit.
    #[test]
    fn yielded_offsets_reconstruct_candidates() {
        for batch_size in [2usize, 8] {
            for seed in 0u8..8 {
                let mut sk = [0u8; 32];
                sk[0] = 0xf0 | seed;
                sk[17] = seed.wrapping_mul(39);
                sk[31] = 0x41;
                let pk = tor::public_key_for(&sk);

                let start_offset = 0xffff_ffff_fff0u128 + seed as u128;
                let cancel = AtomicBool::new(false);
                let mut checked = 0;
                search(
                    &pk,
                    start_offset,
                    batch_size,
                    KeyKind::Service,
                    &cancel,
                    |_| true,
                    |candidate, offset| {
                        let vsk = tor::add_offset(&sk, &offset_to_bytes(offset));
                        let mut vpk = tor::public_key_for(&vsk);
                        vpk[31] &= 0x7f; // mask the x-sign bit
                        assert_eq!(vpk, candidate, "offset {offset}");
                        checked += 1;
                        if checked >= 40 {
                            cancel.store(true, Ordering::Release);
                        }
                    },
                )
                .unwrap();
                assert!(checked >= 40);
            }
        }
    }

    /// Client candidates are Montgomery u-coordinates, which carry no
    /// sign, so reconstruction matches exactly.
    #[test]
    fn client_candidates_are_montgomery_u() {
        let sk = [0x5au8; 32];
        let pk = tor::public_key_for(&sk);

        let cancel = AtomicBool::new(false);
        let mut checked = 0;
        search(
            &pk,
            99,
            8,
            KeyKind::Client,
            &cancel,
            |_| true,
            |candidate, offset| {
                let vsk = tor::add_offset(&sk, &offset_to_bytes(offset));
                let vpk = tor::client_public_key_for(&vsk);
                assert_eq!(vpk, candidate, "offset {offset}");
                checked += 1;
                if checked >= 30 {
                    cancel.store(true, Ordering::Release);
                }
            },
        )
        .unwrap();
        assert!(checked >= 30);
    }

    /// Searching for `ayay` from a known public key with the smallest
    /// batch yields an offset that reconstructs a key whose encoding has
    /// that prefix.
    #[test]
    fn finds_ayay_from_fixture_key() {
        const SK: &str = "7bd6z6w72afftbr7aybfbgstm7exdnndgm74cocbrnfkjegnifca";
        const PK: &str = "onionjifniegtjbbifet65goa2siqubne6n2qfhiksryfvsbdhda";

        let skb: [u8; 32] = Charset::Onion.decode(SK).unwrap().try_into().unwrap();
        let pkb: [u8; 32] = Charset::Onion.decode(PK).unwrap().try_into().unwrap();
        assert_eq!(tor::public_key_for(&skb), pkb);

        let matcher = Matcher::new(&["ayay"], Charset::Onion).unwrap();
        let cancel = AtomicBool::new(false);
        let mut found = None;
        search(
            &pkb,
            0,
            2,
            KeyKind::Service,
            &cancel,
            |candidate| matcher.matches(candidate),
            |candidate, offset| {
                if found.is_none() {
                    found = Some((candidate, offset));
                    cancel.store(true, Ordering::Release);
                }
            },
        )
        .unwrap();

        let (candidate, offset) = found.expect("a 20-bit prefix must appear");
        let vsk = tor::add_offset(&skb, &offset_to_bytes(offset));
        let mut vpk = tor::public_key_for(&vsk);
        assert!(Charset::Onion.encode(&vpk).starts_with("ayay"));
        vpk[31] &= 0x7f;
        assert_eq!(vpk, candidate);
    }
}
