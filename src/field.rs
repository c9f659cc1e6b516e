//! Field arithmetic modulo \\(p = 2\^{255} - 19\\), using 64-bit limbs
//! with 128-bit products.
//!
//! A [`FieldElement`] is represented in radix \\(2\^{51}\\) as five
//! `u64`s, the representation used by the `curve25519-dalek` serial
//! backend; the coefficients are allowed to grow up to \\(2\^{54}\\)
//! between reductions modulo \\(p\\).
//!
//! The search loop only ever adds, subtracts and multiplies, so those
//! operations are plain variable-time limb arithmetic.  Square roots and
//! inversion are built from the same multiplication via addition chains;
//! the conditional selection used by square-root extraction goes through
//! `subtle` so point decompression stays uniform.

use core::fmt::Debug;
use core::ops::{Add, Mul, Neg, Sub};

use subtle::Choice;
use subtle::ConditionallySelectable;
use subtle::ConstantTimeEq;

use crate::constants;

/// An element of the field \\( \mathbb Z / (2\^{255} - 19)\\).
#[derive(Copy, Clone)]
pub struct FieldElement(pub(crate) [u64; 5]);

pub(crate) const LOW_51_BIT_MASK: u64 = (1u64 << 51) - 1;

impl Debug for FieldElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FieldElement({:?})", &self.0[..])
    }
}

/// A 64x64 -> 128 bit product.
#[inline(always)]
fn wide(x: u64, y: u64) -> u128 {
    (x as u128) * (y as u128)
}

/// Read a little-endian u64 from the first eight bytes of a slice.
#[inline(always)]
fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

impl<'a, 'b> Add<&'b FieldElement> for &'a FieldElement {
    type Output = FieldElement;
    fn add(self, rhs: &'b FieldElement) -> FieldElement {
        let mut output = *self;
        for i in 0..5 {
            output.0[i] += rhs.0[i];
        }
        output
    }
}

impl<'a, 'b> Sub<&'b FieldElement> for &'a FieldElement {
    type Output = FieldElement;
    fn sub(self, rhs: &'b FieldElement) -> FieldElement {
        // To avoid underflow, first add a multiple of p.  16*p is
        // larger than any 54-bit limb:
        //   36028797018963664 = 2^55 - 304 = 16 * (2^51 - 19)
        //   36028797018963952 = 2^55 - 16  = 16 * (2^51 - 1)
        FieldElement::reduce([
            (self.0[0] + 36028797018963664u64) - rhs.0[0],
            (self.0[1] + 36028797018963952u64) - rhs.0[1],
            (self.0[2] + 36028797018963952u64) - rhs.0[2],
            (self.0[3] + 36028797018963952u64) - rhs.0[3],
            (self.0[4] + 36028797018963952u64) - rhs.0[4],
        ])
    }
}

impl<'a, 'b> Mul<&'b FieldElement> for &'a FieldElement {
    type Output = FieldElement;
    fn mul(self, rhs: &'b FieldElement) -> FieldElement {
        // Schoolbook multiplication over the limb columns.  A product
        // a[i]*b[j] lands in column i+j; columns five and above wrap
        // around to column i+j-5 scaled by 19, since 2^255 = 19 mod p.
        // Folding the 19 into a copy of the right operand keeps every
        // inner product a single 64x64 multiply.
        let a = &self.0;
        let b = &rhs.0;
        let b19 = rhs.0.map(|limb| limb * 19);

        debug_assert!(a.iter().all(|&limb| limb < (1 << 54)));
        debug_assert!(b.iter().all(|&limb| limb < (1 << 54)));

        let mut t = [0u128; 5];
        for i in 0..5 {
            for j in 0..5 {
                if i + j < 5 {
                    t[i + j] += wide(a[i], b[j]);
                } else {
                    t[i + j - 5] += wide(a[i], b19[j]);
                }
            }
        }

        FieldElement::fold_wide(t)
    }
}

impl<'a> Neg for &'a FieldElement {
    type Output = FieldElement;
    fn neg(self) -> FieldElement {
        // See the commentary in the Sub impl
        FieldElement::reduce([
            36028797018963664u64 - self.0[0],
            36028797018963952u64 - self.0[1],
            36028797018963952u64 - self.0[2],
            36028797018963952u64 - self.0[3],
            36028797018963952u64 - self.0[4],
        ])
    }
}

impl ConditionallySelectable for FieldElement {
    fn conditional_select(a: &FieldElement, b: &FieldElement, choice: Choice) -> FieldElement {
        FieldElement([
            u64::conditional_select(&a.0[0], &b.0[0], choice),
            u64::conditional_select(&a.0[1], &b.0[1], choice),
            u64::conditional_select(&a.0[2], &b.0[2], choice),
            u64::conditional_select(&a.0[3], &b.0[3], choice),
            u64::conditional_select(&a.0[4], &b.0[4], choice),
        ])
    }
}

impl ConstantTimeEq for FieldElement {
    /// The internal representation is not canonical, so field elements
    /// are normalized to wire format before comparison.
    fn ct_eq(&self, other: &FieldElement) -> Choice {
        self.as_bytes().ct_eq(&other.as_bytes())
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &FieldElement) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for FieldElement {}

impl FieldElement {
    /// The zero element.
    pub const ZERO: FieldElement = FieldElement([0, 0, 0, 0, 0]);
    /// The one element.
    pub const ONE: FieldElement = FieldElement([1, 0, 0, 0, 0]);

    /// Run one sweep of carries, bringing every limb back below
    /// 2\^(51 + epsilon).
    #[inline(always)]
    fn reduce(mut limbs: [u64; 5]) -> FieldElement {
        for k in 0..4 {
            let carry = limbs[k] >> 51;
            limbs[k] &= LOW_51_BIT_MASK;
            limbs[k + 1] += carry;
        }
        // The carry out of the top limb wraps to the bottom times 19.
        let carry = limbs[4] >> 51;
        limbs[4] &= LOW_51_BIT_MASK;
        limbs[0] += carry * 19;

        FieldElement(limbs)
    }

    /// Carry a set of 128-bit column sums down to 64-bit limbs.
    ///
    /// Column four never contains wrapped (19-scaled) products, so its
    /// carry is small enough that the final 19-fold cannot overflow.
    #[inline(always)]
    fn fold_wide(t: [u128; 5]) -> FieldElement {
        let mut limbs = [0u64; 5];
        let mut carry = 0u128;
        for k in 0..5 {
            let v = t[k] + carry;
            limbs[k] = (v as u64) & LOW_51_BIT_MASK;
            carry = v >> 51;
        }
        limbs[0] += (carry as u64) * 19;

        FieldElement::reduce(limbs)
    }

    /// Load a `FieldElement` from the low 255 bits of a 256-bit input.
    ///
    /// # Warning
    ///
    /// This function does not check that the input is canonical; it masks
    /// the high bit, but it will happily decode 2\^255 - 18 to 1.
    pub fn from_bytes(bytes: &[u8; 32]) -> FieldElement {
        // Limb k holds bits [51k, 51k + 51).  Read an eight-byte window
        // containing those bits and shift off the leading remainder; the
        // top limb's window is clamped to stay inside the array, at the
        // price of a larger shift.
        let mut limbs = [0u64; 5];
        for (k, limb) in limbs.iter_mut().enumerate() {
            let bit = 51 * k;
            let start = (bit / 8).min(24);
            *limb = (read_u64(&bytes[start..]) >> (bit - 8 * start)) & LOW_51_BIT_MASK;
        }
        FieldElement(limbs)
    }

    /// Serialize this `FieldElement` to a 32-byte array.  The encoding
    /// is canonical, so the high bit of the last byte is always zero.
    pub fn as_bytes(&self) -> [u8; 32] {
        // A carry sweep leaves h in [0, 2^255); to reach the canonical
        // range [0, p) we must also subtract p when h >= p.  Whether it
        // is follows from the carry bit of h + 19: h >= p iff
        // h + 19 >= 2^255.
        let mut limbs = FieldElement::reduce(self.0).0;

        let mut q = (limbs[0] + 19) >> 51;
        for limb in &limbs[1..] {
            q = (limb + q) >> 51;
        }

        // h mod p = h + 19q - 2^255 q: add 19q, carry, and drop the bit
        // that would land at 2^255.
        limbs[0] += 19 * q;
        for k in 0..4 {
            let carry = limbs[k] >> 51;
            limbs[k] &= LOW_51_BIT_MASK;
            limbs[k + 1] += carry;
        }
        limbs[4] &= LOW_51_BIT_MASK;

        // Lay the five 51-bit limbs down at their bit offsets, merging
        // the eight-byte windows where they overlap.
        let mut s = [0u8; 32];
        for (k, limb) in limbs.iter().enumerate() {
            let bit = 51 * k;
            let start = (bit / 8).min(24);
            let window = read_u64(&s[start..]) | (limb << (bit - 8 * start));
            s[start..start + 8].copy_from_slice(&window.to_le_bytes());
        }

        // High bit should be zero.
        debug_assert!((s[31] & 0b1000_0000u8) == 0u8);

        s
    }

    /// The 128-bit column sums of `self * self`.  Mixed products appear
    /// twice, so only the upper triangle is multiplied.
    #[inline(always)]
    fn square_terms(&self) -> [u128; 5] {
        let a = &self.0;
        let a19 = self.0.map(|limb| limb * 19);

        debug_assert!(a.iter().all(|&limb| limb < (1 << 54)));

        let mut t = [0u128; 5];
        for i in 0..5 {
            for j in i..5 {
                let term = if i + j < 5 {
                    wide(a[i], a[j])
                } else {
                    wide(a[i], a19[j])
                };
                t[(i + j) % 5] += if i == j { term } else { term + term };
            }
        }
        t
    }

    /// Compute `self^2`.
    pub fn square(&self) -> FieldElement {
        FieldElement::fold_wide(self.square_terms())
    }

    /// Compute `2 * self^2`.
    ///
    /// Doubling the column sums spends one bit of headroom, so the input
    /// limbs must stay below 2\^53; every caller squares a freshly
    /// reduced coordinate.
    pub fn square2(&self) -> FieldElement {
        let mut t = self.square_terms();
        for column in &mut t {
            *column *= 2;
        }
        FieldElement::fold_wide(t)
    }

    /// Compute `self^(2^k)` by `k` successive squarings.  Requires `k > 0`.
    pub(crate) fn pow2k(&self, k: u32) -> FieldElement {
        debug_assert!(k > 0);
        let mut z = self.square();
        for _ in 1..k {
            z = z.square();
        }
        z
    }

    /// Compute `self^(2^250 - 1)`, the all-ones-exponent power shared by
    /// the exponentiations for inversion and square-root extraction.
    fn pow_two250_minus_one(&self) -> FieldElement {
        // An all-ones exponent of width a+b is assembled from smaller
        // ones by shifting and filling the opened gap:
        //
        //   x^(2^(a+b) - 1) = (x^(2^a - 1))^(2^b) * x^(2^b - 1)
        //
        // Widths double where possible (2, 4, 10, 20, 40, 100, 200) with
        // odd steps inserted to reach 5, 50 and finally 250 = 200 + 50.
        let ones2 = &self.square() * self;
        let ones4 = &ones2.pow2k(2) * &ones2;
        let ones5 = &ones4.square() * self;
        let ones10 = &ones5.pow2k(5) * &ones5;
        let ones20 = &ones10.pow2k(10) * &ones10;
        let ones40 = &ones20.pow2k(20) * &ones20;
        let ones50 = &ones40.pow2k(10) * &ones10;
        let ones100 = &ones50.pow2k(50) * &ones50;
        let ones200 = &ones100.pow2k(100) * &ones100;
        &ones200.pow2k(50) * &ones50
    }

    /// Given a nonzero field element, compute its inverse, as the
    /// exponentiation `self^(p-2)`.
    ///
    /// This function returns zero on input zero.
    pub fn invert(&self) -> FieldElement {
        // p - 2 = 2^255 - 21 splits as (2^250 - 1) * 2^5 + 11: the
        // all-ones block followed by the low bits 01011.
        let ones250 = self.pow_two250_minus_one();
        let x3 = &self.square() * self;
        let x11 = &self.pow2k(3) * &x3;
        &ones250.pow2k(5) * &x11
    }

    /// Raise this field element to the power (p-5)/8 = 2^252 - 3.
    fn pow_p58(&self) -> FieldElement {
        // 2^252 - 3 = (2^250 - 1) * 4 + 1.
        &self.pow_two250_minus_one().pow2k(2) * self
    }

    /// Determine if this `FieldElement` is negative, in the sense used in
    /// the ed25519 paper: `x` is negative if the low bit of its canonical
    /// encoding is set.
    pub(crate) fn is_negative(&self) -> Choice {
        (self.as_bytes()[0] & 1).into()
    }

    /// Given `FieldElements` `u` and `v`, compute either `sqrt(u/v)` or
    /// `sqrt(i*u/v)`, always returning the nonnegative square root.
    ///
    /// # Return
    ///
    /// - `(Choice(1), +sqrt(u/v))  ` if `v` is nonzero and `u/v` is square;
    /// - `(Choice(1), zero)        ` if `u` is zero;
    /// - `(Choice(0), zero)        ` if `v` is zero and `u` is nonzero;
    /// - `(Choice(0), +sqrt(i*u/v))` if `u/v` is nonsquare (so `i*u/v` is square).
    pub(crate) fn sqrt_ratio_i(u: &FieldElement, v: &FieldElement) -> (Choice, FieldElement) {
        // The candidate root is r = (u v^3) (u v^7)^((p-5)/8), which is
        // (u/v)^((p+3)/8) with the division folded into the exponents.
        // Then v r^2 is one of u, -u, iu, -iu (or zero when v is, since
        // then r is zero too).
        let v3 = &v.square() * v;
        let v7 = &v3.square() * v;
        let uv3 = u * &v3;
        let uv7 = u * &v7;
        let mut r = &uv3 * &uv7.pow_p58();

        let check = v * &r.square();
        let neg_u = -u;
        let root_of_uv = check.ct_eq(u);
        let off_by_i = check.ct_eq(&neg_u);
        let off_by_minus_i = check.ct_eq(&(&neg_u * &constants::SQRT_M1));

        // In the -u and -iu cases the root is r*sqrt(-1): of u/v in the
        // former, of iu/v in the latter.
        let r_i = &r * &constants::SQRT_M1;
        r.conditional_assign(&r_i, off_by_i | off_by_minus_i);

        // Of the pair {r, -r}, hand back the nonnegative one.
        let r_is_negative = r.is_negative();
        let r_neg = -&r;
        r.conditional_assign(&r_neg, r_is_negative);

        (root_of_uv | off_by_i, r)
    }
}
