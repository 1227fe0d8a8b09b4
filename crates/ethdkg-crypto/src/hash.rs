//! Keccak-256 hashing and the hash-to-G1 map
//!
//! `hash_to_g1` follows Fouque and Tibouchi's map for BN curves with the
//! `sign0` and single-inversion tweaks from Wahby and Boneh. The output is
//! bit-for-bit compatible with the on-chain verifier, so every constant and
//! the choice of square root below are fixed.

use ark_bn254::{Fq, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, LegendreSymbol, MontFp, One, PrimeField, Zero};
use sha3::{Digest, Keccak256};

use crate::error::{CryptoError, Result};

/// (-1 + sqrt(-3)) / 2
const HASH_CONST_1: Fq = MontFp!("2203960485148121921418603742825762020974279258880205651966");

/// sqrt(-3)
const HASH_CONST_2: Fq = MontFp!("4407920970296243842837207485651524041948558517760411303933");

/// 1 / 3
const HASH_CONST_3: Fq = MontFp!(
    "14592161914559516814830937163504850059130874104865215775126025263096817472389"
);

/// g(1) = 1 + b
const HASH_CONST_4: Fq = MontFp!("4");

/// Curve coefficient `b` in y^2 = x^3 + b
const CURVE_B: Fq = MontFp!("3");

/// 2^256 mod p, used to fold two hash outputs into one field element
const TWO_256_MOD_P: Fq = MontFp!(
    "6350874878119819312338956282401532409788428879151445726012394534686998597021"
);

/// (p + 1) / 4 as little-endian limbs; p = 3 mod 4 so this exponent takes square roots
const P_PLUS_1_OVER_4: [u64; 4] = [
    0x4f082305b61f3f52,
    0x65e05aa45a1c72a3,
    0x6e14116da0605617,
    0x0c19139cb84c680a,
];

/// Keccak-256 digest of `data`
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// Keccak-256 digest over several byte slices, hashed as their concatenation
pub fn keccak256_concat<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Map `msg` to a base field element using two domain separated hashes
///
/// The pair is read as the 512-bit value `s0 * 2^256 + s1` and reduced mod p,
/// which keeps the bias negligible without wide arithmetic.
pub fn hash_to_base(msg: &[u8], dsp0: u8, dsp1: u8) -> Fq {
    let h0 = keccak256_concat([&[dsp0][..], msg]);
    let h1 = keccak256_concat([&[dsp1][..], msg]);

    let s0 = Fq::from_be_bytes_mod_order(&h0);
    let s1 = Fq::from_be_bytes_mod_order(&h1);
    s0 * TWO_256_MOD_P + s1
}

/// Hash an arbitrary message into G1
///
/// Fails with [`CryptoError::DangerousPoint`] when the result is the
/// identity, the generator or the negated generator.
pub fn hash_to_g1(msg: &[u8]) -> Result<G1Affine> {
    let p0 = base_to_g1(&hash_to_base(msg, 0x00, 0x01))?;
    let p1 = base_to_g1(&hash_to_base(msg, 0x02, 0x03))?;

    let point = (p0.into_group() + p1).into_affine();
    if !is_safe_signing_point(&point) {
        return Err(CryptoError::DangerousPoint);
    }
    Ok(point)
}

/// Points we refuse to sign: the identity and +/- the generator
pub fn is_safe_signing_point(point: &G1Affine) -> bool {
    let generator = G1Affine::generator();
    !(point.is_zero() || *point == generator || *point == -generator)
}

/// Map a field element onto the curve
pub(crate) fn base_to_g1(t: &Fq) -> Result<G1Affine> {
    let t_squared = t.square();
    let g_one_plus_t_squared = t_squared + HASH_CONST_4;

    // Zero when t == 0; x1 is still a valid abscissa in that case.
    let alpha = (t_squared * g_one_plus_t_squared)
        .inverse()
        .unwrap_or_else(Fq::zero);
    let t_fourth = t_squared.square();
    let cubed = g_one_plus_t_squared.square() * g_one_plus_t_squared;

    let x1 = HASH_CONST_1 - HASH_CONST_2 * t_fourth * alpha;
    let x2 = -(x1 + Fq::one());
    let x3 = Fq::one() - HASH_CONST_3 * cubed * alpha;

    let residue1 = legendre(&curve_rhs(&x1));
    let residue2 = legendre(&curve_rhs(&x2));

    let x = match (residue1 - 1) * (residue2 - 3) / 4 + 1 {
        1 => x1,
        2 => x2,
        _ => x3,
    };

    let y = curve_rhs(&x).pow(P_PLUS_1_OVER_4);
    let y = if sign0(t) { y } else { -y };

    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() {
        return Err(CryptoError::InvalidPoint(
            "hash-to-curve output is not on the curve".to_string(),
        ));
    }
    Ok(point)
}

/// g(x) = x^3 + b
fn curve_rhs(x: &Fq) -> Fq {
    x.square() * x + CURVE_B
}

fn legendre(value: &Fq) -> i32 {
    match value.legendre() {
        LegendreSymbol::Zero => 0,
        LegendreSymbol::QuadraticResidue => 1,
        LegendreSymbol::QuadraticNonResidue => -1,
    }
}

/// `true` for the "positive" half of the field, i.e. t <= (p - 1) / 2
fn sign0(t: &Fq) -> bool {
    t.into_bigint() <= Fq::MODULUS_MINUS_ONE_DIV_TWO
}
