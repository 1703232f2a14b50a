//! # Shamir Secret Sharing over GF(2⁸)
//!
//! Each byte of the secret is the constant term of its own random polynomial
//! of degree `t - 1`. Share `i` holds the evaluation of every polynomial at
//! `x = i`, so any `t` shares reconstruct the secret by Lagrange
//! interpolation at `x = 0`, and fewer than `t` reveal nothing.
//!
//! ```text
//! secret:   s0        s1        s2   ...
//!            │         │         │
//!            ▼         ▼         ▼
//! poly:   p0(x)     p1(x)     p2(x)        pk(0) = sk, other coeffs random
//!            │         │         │
//! share i: p0(i)     p1(i)     p2(i) ...   i = 1..=n
//! ```
//!
//! Field arithmetic uses the AES polynomial `x⁸ + x⁴ + x³ + x + 1` (0x11B).

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::utils::MAX_U8;

/// One evaluation point of the sharing polynomials
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Share {
    /// The x coordinate (1..=n)
    pub index: u8,
    /// One evaluation per secret byte
    pub bytes: Vec<u8>,
}

// ============================================================================
// FIELD ARITHMETIC
// ============================================================================

/// Carry-less multiplication reduced by 0x11B
#[inline]
pub(crate) fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 == 1 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

fn gf_pow(mut base: u8, mut exp: u32) -> u8 {
    let mut out = 1u8;
    while exp > 0 {
        if exp & 1 == 1 {
            out = gf_mul(out, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    out
}

/// Multiplicative inverse, `a⁻¹ = a²⁵⁴`. Zero maps to zero.
#[inline]
pub(crate) fn gf_inv(a: u8) -> u8 {
    gf_pow(a, 254)
}

/// Horner evaluation, coefficients in ascending order
fn eval_poly(coeffs: &[u8], x: u8) -> u8 {
    coeffs
        .iter()
        .rev()
        .fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

// ============================================================================
// SPLIT / COMBINE
// ============================================================================

/// Split `secret` into `total` shares, any `threshold` of which recombine it.
///
/// Requires `1 <= threshold <= total < 255`.
pub fn split(secret: &[u8], threshold: usize, total: usize) -> Result<Vec<Share>> {
    if threshold < 1 || total < threshold || total >= MAX_U8 {
        return Err(Error::InvalidThreshold(format!(
            "cannot split with threshold {} and {} shares",
            threshold, total
        )));
    }

    let mut shares: Vec<Share> = (1..=total)
        .map(|i| Share {
            index: i as u8,
            bytes: vec![0u8; secret.len()],
        })
        .collect();

    let mut coeffs = vec![0u8; threshold];
    for (pos, &byte) in secret.iter().enumerate() {
        coeffs[0] = byte;
        OsRng.fill_bytes(&mut coeffs[1..]);
        for share in shares.iter_mut() {
            share.bytes[pos] = eval_poly(&coeffs, share.index);
        }
    }
    coeffs.zeroize();

    Ok(shares)
}

/// Reconstruct the secret from a set of shares.
///
/// Uses every share given; callers pick the subset. Nothing checks that
/// more than `threshold` shares agree with each other.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>> {
    interpolate_at(shares, 0)
}

/// Evaluate the polynomials defined by `shares` at `x`.
///
/// `combine` is the special case `x = 0`. Evaluating at the index of a share
/// that was not part of the set tells whether it lies on the same polynomial.
pub fn interpolate_at(shares: &[Share], x: u8) -> Result<Vec<u8>> {
    let first = shares
        .first()
        .ok_or_else(|| Error::InvalidShares("no shares to combine".into()))?;
    let len = first.bytes.len();

    if shares.iter().any(|s| s.bytes.len() != len) {
        return Err(Error::InvalidShares("inconsistent share lengths".into()));
    }
    for (i, share) in shares.iter().enumerate() {
        if share.index == 0 {
            return Err(Error::InvalidShares("share index 0 is reserved".into()));
        }
        if shares[..i].iter().any(|s| s.index == share.index) {
            return Err(Error::InvalidShares(format!(
                "duplicate share index {}",
                share.index
            )));
        }
    }

    // Lagrange basis at x, independent of the byte position
    let basis: Vec<u8> = shares
        .iter()
        .enumerate()
        .map(|(i, si)| {
            let mut num = 1u8;
            let mut den = 1u8;
            for (j, sj) in shares.iter().enumerate() {
                if i == j {
                    continue;
                }
                num = gf_mul(num, x ^ sj.index);
                den = gf_mul(den, si.index ^ sj.index);
            }
            gf_mul(num, gf_inv(den))
        })
        .collect();

    let mut out = vec![0u8; len];
    for (pos, byte) in out.iter_mut().enumerate() {
        *byte = shares
            .iter()
            .zip(&basis)
            .fold(0u8, |acc, (share, &l)| acc ^ gf_mul(share.bytes[pos], l));
    }
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================
