//! Group operations for Curve25519, in Edwards form.
//!
//! The arithmetic uses the “extended twisted coordinates” of Hisil, Wong,
//! Carter, and Dawson, with additions factored through the completion
//! \\(\mathbb P\^1 \times \mathbb P\^1 \\) as in the `ref10` reference
//! implementation: the output of an addition or doubling lands in
//! [`CompletedPoint`] and is converted to whichever model the caller
//! needs next.  Cached operands use the projective "Niels coordinates"
//! \\( (Y+X, Y-X, Z, 2dXY) \\).
//!
//! The batch search works on dehomogenized points, so this module also
//! carries [`AffinePoint`], which caches the product \\(x·y\\) alongside
//! the affine coordinates: the y-only addition formulas consume exactly
//! \\((x\_1, y\_1, x\_1 y\_1)\\).
//!
//! Only the operations the key search needs survive here; there are no
//! precomputed basepoint tables, and scalar multiplication is a plain
//! variable-time double-and-add that runs once per worker at startup,
//! never in the hot loop.  The point models and formulas are adapted
//! from the `curve25519-dalek` crate's serial backend.

// We allow non snake_case names because coordinates in projective space are
// traditionally denoted by the capitalisation of their respective
// counterparts in affine space.
#![allow(non_snake_case)]

use core::fmt::Debug;
use core::ops::Add;

use subtle::Choice;
use subtle::ConditionallyNegatable;
use subtle::ConstantTimeEq;

use crate::constants;
use crate::field::FieldElement;

// ------------------------------------------------------------------------
// Compressed points
// ------------------------------------------------------------------------

/// In "Edwards y" / "Ed25519" format, the curve point \\((x,y)\\) is
/// determined by the \\(y\\)-coordinate and the sign of \\(x\\).
///
/// The first 255 bits of a `CompressedEdwardsY` represent the
/// \\(y\\)-coordinate.  The high bit of the 32nd byte gives the sign of
/// \\(x\\).
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct CompressedEdwardsY(pub [u8; 32]);

impl Debug for CompressedEdwardsY {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CompressedEdwardsY: {:?}", self.as_bytes())
    }
}

impl CompressedEdwardsY {
    /// View this `CompressedEdwardsY` as an array of bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Attempt to decompress to an `EdwardsPoint`.
    ///
    /// Returns `None` if the input is not the \\(y\\)-coordinate of a
    /// curve point.
    pub fn decompress(&self) -> Option<EdwardsPoint> {
        let Y = FieldElement::from_bytes(self.as_bytes());
        let Z = FieldElement::ONE;
        let YY = Y.square();
        let u = &YY - &Z; // u =  y²-1
        let v = &(&YY * &constants::EDWARDS_D) + &Z; // v = dy²+1
        let (is_valid_y_coord, mut X) = FieldElement::sqrt_ratio_i(&u, &v);

        if !bool::from(is_valid_y_coord) {
            return None;
        }

        // sqrt_ratio_i always returns the nonnegative square root, so we
        // negate according to the supplied sign bit.
        let compressed_sign_bit = Choice::from(self.as_bytes()[31] >> 7);
        X.conditional_negate(compressed_sign_bit);

        Some(EdwardsPoint {
            X,
            Y,
            Z,
            T: &X * &Y,
        })
    }
}

// ------------------------------------------------------------------------
// Internal point representations
// ------------------------------------------------------------------------

/// An `EdwardsPoint` represents a point on the Edwards form of Curve25519,
/// in the extended \\(\mathbb P\^3\\) model \\((X:Y:Z:T)\\) with
/// \\(x = X/Z\\), \\(y = Y/Z\\), \\(xy = T/Z\\).
#[derive(Copy, Clone)]
#[allow(missing_docs)]
pub struct EdwardsPoint {
    pub(crate) X: FieldElement,
    pub(crate) Y: FieldElement,
    pub(crate) Z: FieldElement,
    pub(crate) T: FieldElement,
}

impl Debug for EdwardsPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "EdwardsPoint{{\n\tX: {:?},\n\tY: {:?},\n\tZ: {:?},\n\tT: {:?}\n}}",
            &self.X, &self.Y, &self.Z, &self.T
        )
    }
}

/// A point \\(((X:Z), (Y:T))\\) in \\(\mathbb P\^1 \times \mathbb P\^1\\),
/// the output of addition and doubling formulas.
pub(crate) struct CompletedPoint {
    X: FieldElement,
    Y: FieldElement,
    Z: FieldElement,
    T: FieldElement,
}

/// A point \\((X:Y:Z)\\) in the \\(\mathbb P\^2\\) model, which has the
/// cheapest doubling formula.
pub(crate) struct ProjectivePoint {
    X: FieldElement,
    Y: FieldElement,
    Z: FieldElement,
}

/// A pre-computed point in the \\(\mathbb P\^3\\) model, represented as
/// \\((Y+X, Y-X, Z, 2dXY)\\) in "Niels coordinates".
#[derive(Copy, Clone)]
pub(crate) struct ProjectiveNielsPoint {
    Y_plus_X: FieldElement,
    Y_minus_X: FieldElement,
    Z: FieldElement,
    T2d: FieldElement,
}

/// A dehomogenized point carrying the product of its coordinates, the
/// exact shape the y-only batch addition formulas consume.
#[derive(Copy, Clone)]
pub(crate) struct AffinePoint {
    pub(crate) x: FieldElement,
    pub(crate) y: FieldElement,
    pub(crate) xy: FieldElement,
}

// ------------------------------------------------------------------------
// Constructors and conversions
// ------------------------------------------------------------------------

impl EdwardsPoint {
    /// The neutral element of the group.
    pub(crate) fn identity() -> EdwardsPoint {
        EdwardsPoint {
            X: FieldElement::ZERO,
            Y: FieldElement::ONE,
            Z: FieldElement::ONE,
            T: FieldElement::ZERO,
        }
    }

    /// Convert to a ProjectiveNielsPoint
    pub(crate) fn as_projective_niels(&self) -> ProjectiveNielsPoint {
        ProjectiveNielsPoint {
            Y_plus_X: &self.Y + &self.X,
            Y_minus_X: &self.Y - &self.X,
            Z: self.Z,
            T2d: &self.T * &constants::EDWARDS_D2,
        }
    }

    /// Convert the representation of this point from extended
    /// coordinates to projective coordinates.
    ///
    /// Free.
    pub(crate) const fn as_projective(&self) -> ProjectivePoint {
        ProjectivePoint {
            X: self.X,
            Y: self.Y,
            Z: self.Z,
        }
    }

    /// Compress this point to `CompressedEdwardsY` format.
    pub fn compress(&self) -> CompressedEdwardsY {
        let recip = self.Z.invert();
        let x = &self.X * &recip;
        let y = &self.Y * &recip;
        let mut s = y.as_bytes();
        s[31] ^= x.is_negative().unwrap_u8() << 7;
        CompressedEdwardsY(s)
    }

    /// The affine \\(u\\)-coordinate of this point on the Montgomery form
    /// of the curve, via the birational map \\(u = (1+y)/(1-y)\\),
    /// computed projectively as \\((Z+Y)/(Z-Y)\\).
    pub(crate) fn to_montgomery_bytes(&self) -> [u8; 32] {
        let U = &self.Z + &self.Y;
        let W = &self.Z - &self.Y;
        (&U * &W.invert()).as_bytes()
    }
}

impl CompletedPoint {
    pub(crate) fn as_projective(&self) -> ProjectivePoint {
        ProjectivePoint {
            X: &self.X * &self.T,
            Y: &self.Y * &self.Z,
            Z: &self.Z * &self.T,
        }
    }

    pub(crate) fn as_extended(&self) -> EdwardsPoint {
        EdwardsPoint {
            X: &self.X * &self.T,
            Y: &self.Y * &self.Z,
            Z: &self.Z * &self.T,
            T: &self.X * &self.Y,
        }
    }
}

impl AffinePoint {
    /// Dehomogenize an extended point.  Costs an inversion.
    pub(crate) fn from_extended(p: &EdwardsPoint) -> AffinePoint {
        AffinePoint::from_extended_with_z_inv(p, &p.Z.invert())
    }

    /// Dehomogenize an extended point whose \\(1/Z\\) is already known.
    /// Three multiplications, no inversion.
    pub(crate) fn from_extended_with_z_inv(
        p: &EdwardsPoint,
        z_inv: &FieldElement,
    ) -> AffinePoint {
        let x = &p.X * z_inv;
        let y = &p.Y * z_inv;
        AffinePoint { x, y, xy: &x * &y }
    }
}

// ------------------------------------------------------------------------
// Equality
// ------------------------------------------------------------------------

impl ConstantTimeEq for EdwardsPoint {
    fn ct_eq(&self, other: &EdwardsPoint) -> Choice {
        // We would like to check that the point (X/Z, Y/Z) is equal to
        // the point (X'/Z', Y'/Z') without converting into affine
        // coordinates (x, y) and (x', y'), which requires two inversions.
        // We have that X = xZ and X' = x'Z'. Thus, x = x' is equivalent to
        // (xZ)Z' = (x'Z')Z, and similarly for the y-coordinate.
        (&self.X * &other.Z).ct_eq(&(&other.X * &self.Z))
            & (&self.Y * &other.Z).ct_eq(&(&other.Y * &self.Z))
    }
}

impl PartialEq for EdwardsPoint {
    fn eq(&self, other: &EdwardsPoint) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for EdwardsPoint {}

// ------------------------------------------------------------------------
// Doubling and addition
// ------------------------------------------------------------------------

impl ProjectivePoint {
    /// Double this point: return self + self
    pub(crate) fn double(&self) -> CompletedPoint {
        let XX = self.X.square();
        let YY = self.Y.square();
        let ZZ2 = self.Z.square2();
        let X_plus_Y = &self.X + &self.Y;
        let X_plus_Y_sq = X_plus_Y.square();
        let YY_plus_XX = &YY + &XX;
        let YY_minus_XX = &YY - &XX;

        CompletedPoint {
            X: &X_plus_Y_sq - &YY_plus_XX,
            Y: YY_plus_XX,
            Z: YY_minus_XX,
            T: &ZZ2 - &YY_minus_XX,
        }
    }
}

impl EdwardsPoint {
    /// Add this point to itself.
    pub(crate) fn double(&self) -> EdwardsPoint {
        self.as_projective().double().as_extended()
    }

    /// Compute \\([2\^k] P \\) by successive doublings. Requires \\( k > 0 \\).
    pub(crate) fn mul_by_pow_2(&self, k: u32) -> EdwardsPoint {
        debug_assert!(k > 0);
        let mut r: CompletedPoint;
        let mut s = self.as_projective();
        for _ in 0..(k - 1) {
            r = s.double();
            s = r.as_projective();
        }
        // Unroll last iteration so we can go directly as_extended()
        s.double().as_extended()
    }

    /// Multiply by the cofactor: return \\([8]P\\).
    pub(crate) fn mul_by_cofactor(&self) -> EdwardsPoint {
        self.mul_by_pow_2(3)
    }

    /// Variable-time scalar multiplication by a 255-bit little-endian
    /// integer (the top bit of the last byte is ignored).
    ///
    /// Double-and-add; only used outside the batch loop, where cost does
    /// not matter.
    pub(crate) fn vartime_mul(&self, scalar: &[u8; 32]) -> EdwardsPoint {
        let cached = self.as_projective_niels();
        let mut acc = EdwardsPoint::identity();
        for i in (0..255).rev() {
            acc = acc.double();
            if (scalar[i / 8] >> (i % 8)) & 1 == 1 {
                acc = (&acc + &cached).as_extended();
            }
        }
        acc
    }
}

impl<'a, 'b> Add<&'b ProjectiveNielsPoint> for &'a EdwardsPoint {
    type Output = CompletedPoint;

    fn add(self, other: &'b ProjectiveNielsPoint) -> CompletedPoint {
        let Y_plus_X = &self.Y + &self.X;
        let Y_minus_X = &self.Y - &self.X;
        let PP = &Y_plus_X * &other.Y_plus_X;
        let MM = &Y_minus_X * &other.Y_minus_X;
        let TT2d = &self.T * &other.T2d;
        let ZZ = &self.Z * &other.Z;
        let ZZ2 = &ZZ + &ZZ;

        CompletedPoint {
            X: &PP - &MM,
            Y: &PP + &MM,
            Z: &ZZ2 + &TT2d,
            T: &ZZ2 - &TT2d,
        }
    }
}

impl<'a, 'b> Add<&'b EdwardsPoint> for &'a EdwardsPoint {
    type Output = EdwardsPoint;
    fn add(self, other: &'b EdwardsPoint) -> EdwardsPoint {
        (self + &other.as_projective_niels()).as_extended()
    }
}
