//! secp128r1 arithmetic for the ECDH key exchange
//!
//! The curve is small enough that field elements fit in a `u128`, so the
//! arithmetic is done directly on native integers in affine coordinates.
//! Scalar multiplication is not constant time. The resulting key only ever
//! protects a zero-IV block cipher, so side channels are not the weak point.

use std::fmt;
use std::ops::Add;

use rand::{CryptoRng, RngCore};

use crate::{
    cipher::SessionKey,
    error::{Error, Result},
};

/// Field prime
pub const P: u128 = 0xFFFF_FFFD_FFFF_FFFF_FFFF_FFFF_FFFF_FFFF;

/// Curve coefficient a
pub const A: u128 = 0xFFFF_FFFD_FFFF_FFFF_FFFF_FFFF_FFFF_FFFC;

/// Curve coefficient b
pub const B: u128 = 0xE875_79C1_1079_F43D_D824_993C_2CEE_5ED3;

/// Generator x
pub const GX: u128 = 0x161F_F752_8B89_9B2D_0C28_607C_A52C_5B86;

/// Generator y
pub const GY: u128 = 0xCF5A_C839_5BAF_EB13_C02D_A292_DDED_7A83;

/// Group order
pub const N: u128 = 0xFFFF_FFFE_0000_0000_75A3_0D1B_9038_A115;

fn add_mod(a: u128, b: u128) -> u128 {
    let (sum, overflow) = a.overflowing_add(b);
    if overflow || sum >= P {
        sum.wrapping_sub(P)
    } else {
        sum
    }
}

fn sub_mod(a: u128, b: u128) -> u128 {
    if a >= b { a - b } else { a + (P - b) }
}

fn mul_mod(a: u128, b: u128) -> u128 {
    let mut acc = 0;
    for bit in (0..128).rev() {
        acc = add_mod(acc, acc);
        if (b >> bit) & 1 == 1 {
            acc = add_mod(acc, a);
        }
    }
    acc
}

fn pow_mod(base: u128, exp: u128) -> u128 {
    let mut acc = 1;
    for bit in (0..128).rev() {
        acc = mul_mod(acc, acc);
        if (exp >> bit) & 1 == 1 {
            acc = mul_mod(acc, base);
        }
    }
    acc
}

// P is prime, so a^(P-2) is the inverse of any non-zero a
fn inv_mod(a: u128) -> u128 {
    pow_mod(a, P - 2)
}

/// Curve point in affine coordinates
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: u128, y: u128 },
}

impl Point {
    /// Base point
    pub const GENERATOR: Self = Self::Affine { x: GX, y: GY };

    /// Create a validated point
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] if a coordinate is out of range or the
    /// point is not on the curve.
    pub fn new(x: u128, y: u128) -> Result<Self> {
        let point = Self::Affine { x, y };
        if x >= P || y >= P || !point.is_on_curve() {
            return Err(Error::InvalidPoint);
        }
        Ok(point)
    }

    /// Parse little-endian coordinates as sent over the air
    pub fn from_le_bytes(x: &[u8], y: &[u8]) -> Result<Self> {
        let x: [u8; 16] = x.try_into().map_err(|_| Error::KeyLength {
            expected: 16,
            actual: x.len(),
        })?;
        let y: [u8; 16] = y.try_into().map_err(|_| Error::KeyLength {
            expected: 16,
            actual: y.len(),
        })?;
        Self::new(u128::from_le_bytes(x), u128::from_le_bytes(y))
    }

    /// Little-endian coordinates, `None` for the point at infinity
    pub fn to_le_bytes(&self) -> Option<([u8; 16], [u8; 16])> {
        match *self {
            Self::Infinity => None,
            Self::Affine { x, y } => Some((x.to_le_bytes(), y.to_le_bytes())),
        }
    }

    /// Check y² = x³ + ax + b
    pub fn is_on_curve(&self) -> bool {
        match *self {
            Self::Infinity => true,
            Self::Affine { x, y } => {
                let lhs = mul_mod(y, y);
                let x3 = mul_mod(mul_mod(x, x), x);
                let rhs = add_mod(add_mod(x3, mul_mod(A, x)), B);
                lhs == rhs
            }
        }
    }

    /// Point doubling
    pub fn double(&self) -> Self {
        match *self {
            Self::Infinity => Self::Infinity,
            Self::Affine { y: 0, .. } => Self::Infinity,
            Self::Affine { x, y } => {
                let xx = mul_mod(x, x);
                let num = add_mod(add_mod(add_mod(xx, xx), xx), A);
                let lambda = mul_mod(num, inv_mod(add_mod(y, y)));

                let x3 = sub_mod(mul_mod(lambda, lambda), add_mod(x, x));
                let y3 = sub_mod(mul_mod(lambda, sub_mod(x, x3)), y);
                Self::Affine { x: x3, y: y3 }
            }
        }
    }

    /// Scalar multiplication, most significant bit first
    pub fn multiply(&self, k: u128) -> Self {
        let mut acc = Self::Infinity;
        for bit in (0..128).rev() {
            acc = acc.double();
            if (k >> bit) & 1 == 1 {
                acc = acc + *self;
            }
        }
        acc
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Infinity, q) => q,
            (p, Self::Infinity) => p,
            (Self::Affine { x: x1, y: y1 }, Self::Affine { x: x2, y: y2 }) => {
                if x1 == x2 {
                    return if y1 == y2 { self.double() } else { Self::Infinity };
                }

                let lambda = mul_mod(sub_mod(y2, y1), inv_mod(sub_mod(x2, x1)));
                let x3 = sub_mod(sub_mod(mul_mod(lambda, lambda), x1), x2);
                let y3 = sub_mod(mul_mod(lambda, sub_mod(x1, x3)), y1);
                Self::Affine { x: x3, y: y3 }
            }
        }
    }
}

/// Ephemeral private scalar for one key exchange
pub struct EphemeralSecret {
    scalar: u128,
}

impl EphemeralSecret {
    /// Draw a scalar in `[1, N)`
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 16];
            rng.fill_bytes(&mut bytes);
            let scalar = u128::from_le_bytes(bytes);
            if scalar != 0 && scalar < N {
                return Self { scalar };
            }
        }
    }

    /// Use a known scalar
    pub fn from_scalar(scalar: u128) -> Result<Self> {
        if scalar == 0 || scalar >= N {
            return Err(Error::InvalidScalar);
        }
        Ok(Self { scalar })
    }

    /// Public point to send to the peer
    pub fn public_key(&self) -> Point {
        Point::GENERATOR.multiply(self.scalar)
    }

    /// Shared session key: the x coordinate of the shared point, little-endian
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] if the peer point is off the curve or
    /// the shared point is the point at infinity.
    pub fn diffie_hellman(&self, peer: &Point) -> Result<SessionKey> {
        if !peer.is_on_curve() {
            return Err(Error::InvalidPoint);
        }

        match peer.multiply(self.scalar) {
            Point::Affine { x, .. } => Ok(SessionKey::new(x.to_le_bytes())),
            Point::Infinity => Err(Error::InvalidPoint),
        }
    }
}

impl fmt::Debug for EphemeralSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EphemeralSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generator_on_curve() {
        assert!(Point::GENERATOR.is_on_curve());
    }

    #[test]
    fn test_order_annihilates_generator() {
        assert_eq!(Point::GENERATOR.multiply(N), Point::Infinity);
    }

    #[test]
    fn test_double_generator() {
        let expected = Point::Affine {
            x: 0x8151_a0c6_b921_71db_199d_b84b_e753_a97e,
            y: 0x03d8_5355_9455_caae_8383_95a9_275b_7e95,
        };
        assert_eq!(Point::GENERATOR.double(), expected);
        assert_eq!(Point::GENERATOR + Point::GENERATOR, expected);
        assert_eq!(Point::GENERATOR.multiply(2), expected);
    }

    #[test]
    fn test_scalar_multiply() {
        let point = Point::GENERATOR.multiply(0x1234_5678_90ab_cdef);
        assert_eq!(
            point,
            Point::Affine {
                x: 0xad7e_833a_eda2_7345_97cd_9bf9_59c6_6644,
                y: 0x3967_e932_50b2_234b_1693_ba62_e367_bd5a,
            }
        );
        assert!(point.is_on_curve());
    }

    #[test]
    fn test_add_inverse_is_infinity() {
        let neg = Point::Affine { x: GX, y: P - GY };
        assert_eq!(Point::GENERATOR + neg, Point::Infinity);
    }

    #[test]
    fn test_shared_secret_agrees() {
        let alice = EphemeralSecret::from_scalar(0xDEAD_BEEF).unwrap();
        let bob = EphemeralSecret::from_scalar(0x0123_4567_89AB_CDEF_0011).unwrap();

        let k1 = alice.diffie_hellman(&bob.public_key()).unwrap();
        let k2 = bob.diffie_hellman(&alice.public_key()).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_point_validation() {
        assert!(Point::new(GX, GY).is_ok());
        assert!(matches!(Point::new(GX, GY ^ 1), Err(Error::InvalidPoint)));
        assert!(matches!(Point::new(P, 0), Err(Error::InvalidPoint)));
    }

    #[test]
    fn test_le_bytes() {
        let (x, y) = Point::GENERATOR.to_le_bytes().unwrap();
        assert_eq!(Point::from_le_bytes(&x, &y).unwrap(), Point::GENERATOR);
        assert_eq!(Point::Infinity.to_le_bytes(), None);
        assert!(Point::from_le_bytes(&x[..8], &y).is_err());
    }

    #[test]
    fn test_scalar_range() {
        assert!(EphemeralSecret::from_scalar(0).is_err());
        assert!(EphemeralSecret::from_scalar(N).is_err());

        let secret = EphemeralSecret::random(&mut rand::thread_rng());
        assert!(secret.public_key().is_on_curve());
    }
}
