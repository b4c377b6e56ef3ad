//! GF(2^8) arithmetic over log/antilog tables

use crate::{CoreError, Result};
use std::sync::OnceLock;

/// Number of non-zero elements in the field (also the full RS codeword length)
pub const FIELD_ORDER: usize = 255;

/// Log-domain stand-in for the zero element, which has no logarithm
pub const LOG_ZERO: u8 = 255;

/// x^8 + x^4 + x^3 + x^2 + 1
pub const DEFAULT_POLY: u16 = 0x11d;

static STANDARD: OnceLock<Gf256> = OnceLock::new();

/// Reduce an exponent modulo the multiplicative group order.
#[inline]
pub fn modnn(x: usize) -> usize {
    x % FIELD_ORDER
}

/// Log/antilog tables for one GF(2^8) representation
#[derive(Debug, Clone)]
pub struct Gf256 {
    poly: u16,
    exp: [u8; 256],
    log: [u8; 256],
}

impl Gf256 {
    /// Build the field generated by `poly`, rejecting non-primitive polynomials
    pub fn new(poly: u16) -> Result<Self> {
        if !(0x100..=0x1ff).contains(&poly) {
            return Err(CoreError::NonPrimitivePolynomial { poly });
        }

        let field = Self::build(poly);

        // A primitive polynomial visits every non-zero element exactly once.
        let mut seen = [false; 256];
        for &element in &field.exp[..FIELD_ORDER] {
            if element == 0 || seen[element as usize] {
                return Err(CoreError::NonPrimitivePolynomial { poly });
            }
            seen[element as usize] = true;
        }

        Ok(field)
    }

    /// The field used by the container codec (polynomial 0x11d), built once
    pub fn standard() -> Result<&'static Gf256> {
        if let Some(field) = STANDARD.get() {
            return Ok(field);
        }
        let field = Self::new(DEFAULT_POLY)?;
        Ok(STANDARD.get_or_init(|| field))
    }

    fn build(poly: u16) -> Self {
        let mut exp = [0u8; 256];
        let mut log = [LOG_ZERO; 256];

        let mut sr: u16 = 1;
        for i in 0..FIELD_ORDER {
            exp[i] = sr as u8;
            log[sr as usize] = i as u8;
            sr <<= 1;
            if sr & 0x100 != 0 {
                sr ^= poly;
            }
            sr &= 0xff;
        }
        // exp[255] maps the zero marker back to the zero element
        exp[FIELD_ORDER] = 0;
        log[0] = LOG_ZERO;

        Self { poly, exp, log }
    }

    /// Generator polynomial of this field
    pub fn poly(&self) -> u16 {
        self.poly
    }

    /// alpha^power, with the power reduced modulo 255
    #[inline]
    pub fn exp(&self, power: usize) -> u8 {
        self.exp[modnn(power)]
    }

    /// Discrete logarithm; `LOG_ZERO` for zero
    #[inline]
    pub fn log(&self, x: u8) -> u8 {
        self.log[x as usize]
    }

    /// Field multiplication
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp(self.log(a) as usize + self.log(b) as usize)
    }

    /// Field division, `None` when dividing by zero
    pub fn div(&self, a: u8, b: u8) -> Option<u8> {
        if b == 0 {
            return None;
        }
        if a == 0 {
            return Some(0);
        }
        Some(self.exp(self.log(a) as usize + FIELD_ORDER - self.log(b) as usize))
    }
}
