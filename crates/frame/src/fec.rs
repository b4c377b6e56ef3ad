//! Forward Error Correction: shortened Reed-Solomon over GF(2^8)
//!
//! The code uses 8-bit symbols, field polynomial 0x11d, first consecutive
//! root alpha^1 and primitive element alpha, shortened by `pad` symbols. Parity
//! symbols are produced by the usual systematic LFSR division, so a codeword
//! is `data ‖ parity` with `data[0]` the highest-degree coefficient.

use crate::layout::compute_pad;
use crate::{FrameError, Result};
use rsct_core::gf256::{modnn, Gf256, FIELD_ORDER, LOG_ZERO};

const NN: usize = FIELD_ORDER;
const A0: usize = LOG_ZERO as usize;

/// Shape of a block code
pub trait FecCode {
    /// Data symbols per codeword
    fn data_symbols(&self) -> usize;

    /// Check symbols per codeword
    fn parity_symbols(&self) -> usize;

    /// Symbols per codeword
    fn codeword_len(&self) -> usize {
        self.data_symbols() + self.parity_symbols()
    }

    /// Get the code rate (k/n)
    fn code_rate(&self) -> f64 {
        self.data_symbols() as f64 / self.codeword_len() as f64
    }
}

/// Parity generation for one codeword
pub trait FecEncoder: FecCode {
    /// Fill `parity` with the check symbols for `data`
    fn encode_parity(&self, data: &[u8], parity: &mut [u8]) -> Result<()>;
}

/// Errors-and-erasures correction for one codeword
pub trait FecDecoder: FecCode {
    /// Correct `codeword` in place and return the number of symbols fixed.
    ///
    /// `erasures` are positions within the codeword known or suspected to be
    /// wrong. On failure the codeword is left exactly as it was passed in.
    fn decode(&self, codeword: &mut [u8], erasures: &[usize]) -> Result<usize>;
}

/// Reed-Solomon encoder/decoder
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    gf: &'static Gf256,
    data_len: usize,
    parity_len: usize,
    pad: usize,
    fcr: usize,
    prim: usize,
    iprim: usize,
    /// Generator polynomial coefficients in log form, lowest degree first
    genpoly: Vec<usize>,
}

impl ReedSolomon {
    /// First consecutive root of the generator polynomial (as a power of alpha)
    pub const FCR: usize = 1;
    /// Primitive element used to step between roots
    pub const PRIM: usize = 1;

    /// Create a code with `parity_len` check symbols shortened by `pad`
    pub fn new(parity_len: usize, pad: usize) -> Result<Self> {
        if parity_len == 0 || parity_len >= NN {
            return Err(FrameError::InvalidFecParameters {
                msg: format!("Invalid parity symbol count: {}", parity_len),
            });
        }
        if pad + parity_len >= NN {
            return Err(FrameError::InvalidFecParameters {
                msg: format!("No data symbols left: parity={} pad={}", parity_len, pad),
            });
        }

        let gf = Gf256::standard()?;
        let (fcr, prim) = (Self::FCR, Self::PRIM);

        // prim-th root of 1, index form
        let mut iprim = 1;
        while iprim % prim != 0 {
            iprim += NN;
        }
        let iprim = iprim / prim;

        // g(x) = (x - alpha^fcr)(x - alpha^(fcr+prim))...
        let mut poly = vec![0u8; parity_len + 1];
        poly[0] = 1;
        let mut root = fcr * prim;
        for i in 0..parity_len {
            poly[i + 1] = 1;
            for j in (1..=i).rev() {
                poly[j] = if poly[j] != 0 {
                    poly[j - 1] ^ gf.exp(gf.log(poly[j]) as usize + root)
                } else {
                    poly[j - 1]
                };
            }
            poly[0] = gf.exp(gf.log(poly[0]) as usize + root);
            root += prim;
        }
        let genpoly = poly.iter().map(|&c| gf.log(c) as usize).collect();

        Ok(Self {
            gf,
            data_len: NN - pad - parity_len,
            parity_len,
            pad,
            fcr,
            prim,
            iprim,
            genpoly,
        })
    }

    /// The code used by a container with redundancy `r`: RS(192 + r, 192)
    pub fn for_redundancy(r: u16) -> Result<Self> {
        let pad = compute_pad(r)?;
        Self::new(r as usize, pad as usize)
    }

    /// Shortening applied to the full 255-symbol code
    pub fn pad(&self) -> usize {
        self.pad
    }

    fn uncorrectable(msg: &str) -> FrameError {
        FrameError::FecDecodingFailed { msg: msg.to_string() }
    }
}

impl FecCode for ReedSolomon {
    fn data_symbols(&self) -> usize {
        self.data_len
    }

    fn parity_symbols(&self) -> usize {
        self.parity_len
    }
}

impl FecEncoder for ReedSolomon {
    fn encode_parity(&self, data: &[u8], parity: &mut [u8]) -> Result<()> {
        if data.len() != self.data_len {
            return Err(FrameError::SizeMismatch {
                expected: self.data_len,
                actual: data.len(),
            });
        }
        if parity.len() != self.parity_len {
            return Err(FrameError::SizeMismatch {
                expected: self.parity_len,
                actual: parity.len(),
            });
        }

        let gf = self.gf;
        let nroots = self.parity_len;
        parity.fill(0);

        for &symbol in data {
            let feedback = gf.log(symbol ^ parity[0]) as usize;
            if feedback != A0 {
                for j in 1..nroots {
                    let g = self.genpoly[nroots - j];
                    if g != A0 {
                        parity[j] ^= gf.exp(feedback + g);
                    }
                }
            }
            parity.copy_within(1.., 0);
            parity[nroots - 1] = if feedback != A0 && self.genpoly[0] != A0 {
                gf.exp(feedback + self.genpoly[0])
            } else {
                0
            };
        }

        Ok(())
    }
}

impl FecDecoder for ReedSolomon {
    fn decode(&self, codeword: &mut [u8], erasures: &[usize]) -> Result<usize> {
        let n = self.codeword_len();
        if codeword.len() != n {
            return Err(FrameError::SizeMismatch {
                expected: n,
                actual: codeword.len(),
            });
        }
        let nroots = self.parity_len;
        if erasures.len() > nroots {
            return Err(Self::uncorrectable("more erasures than parity symbols"));
        }
        if erasures.iter().any(|&pos| pos >= n) {
            return Err(FrameError::InvalidFecParameters {
                msg: format!("Erasure position outside codeword of {} symbols", n),
            });
        }

        let gf = self.gf;

        // Syndromes: the received polynomial evaluated at each generator root
        let mut syn = [0u8; NN];
        syn[..nroots].fill(codeword[0]);
        for &symbol in &codeword[1..] {
            for (i, s) in syn[..nroots].iter_mut().enumerate() {
                *s = if *s == 0 {
                    symbol
                } else {
                    symbol ^ gf.exp(gf.log(*s) as usize + (self.fcr + i) * self.prim)
                };
            }
        }
        if syn[..nroots].iter().all(|&s| s == 0) {
            return Ok(0);
        }
        let mut s = [A0; NN];
        for (dst, &src) in s.iter_mut().zip(&syn[..nroots]) {
            *dst = gf.log(src) as usize;
        }

        // Seed the locator with the erasure positions (full-length coordinates)
        let mut lambda = [0u8; NN + 1];
        lambda[0] = 1;
        if let Some((&first, rest)) = erasures.split_first() {
            lambda[1] = gf.exp(self.prim * (NN - 1 - (first + self.pad)));
            for (i, &pos) in rest.iter().enumerate() {
                let u = modnn(self.prim * (NN - 1 - (pos + self.pad)));
                for j in (1..=i + 2).rev() {
                    let tmp = gf.log(lambda[j - 1]) as usize;
                    if tmp != A0 {
                        lambda[j] ^= gf.exp(u + tmp);
                    }
                }
            }
        }

        // Berlekamp-Massey over the remaining syndromes
        let no_eras = erasures.len();
        let mut b = [A0; NN + 1];
        for i in 0..=nroots {
            b[i] = gf.log(lambda[i]) as usize;
        }
        let mut t = [0u8; NN + 1];
        let mut el = no_eras;
        for step in (no_eras + 1)..=nroots {
            let mut discr = 0u8;
            for i in 0..step {
                if lambda[i] != 0 && s[step - i - 1] != A0 {
                    discr ^= gf.exp(gf.log(lambda[i]) as usize + s[step - i - 1]);
                }
            }
            let discr = gf.log(discr) as usize;

            if discr == A0 {
                b.copy_within(0..nroots, 1);
                b[0] = A0;
                continue;
            }

            t[0] = lambda[0];
            for i in 0..nroots {
                t[i + 1] = if b[i] != A0 {
                    lambda[i + 1] ^ gf.exp(discr + b[i])
                } else {
                    lambda[i + 1]
                };
            }
            if 2 * el + 1 <= step + no_eras {
                el = step + no_eras - el;
                for i in 0..=nroots {
                    b[i] = if lambda[i] == 0 {
                        A0
                    } else {
                        modnn(gf.log(lambda[i]) as usize + NN - discr)
                    };
                }
            } else {
                b.copy_within(0..nroots, 1);
                b[0] = A0;
            }
            lambda[..=nroots].copy_from_slice(&t[..=nroots]);
        }

        let mut lambda_log = [A0; NN + 1];
        let mut deg_lambda = 0;
        for i in 0..=nroots {
            lambda_log[i] = gf.log(lambda[i]) as usize;
            if lambda_log[i] != A0 {
                deg_lambda = i;
            }
        }
        if deg_lambda == 0 {
            return Err(Self::uncorrectable("empty error locator"));
        }

        // Chien search for the locator roots
        let mut reg = lambda_log;
        let mut roots = [0usize; NN];
        let mut locs = [0usize; NN];
        let mut count = 0;
        let mut k = self.iprim - 1;
        for i in 1..=NN {
            let mut q = 1u8;
            for j in (1..=deg_lambda).rev() {
                if reg[j] != A0 {
                    reg[j] = modnn(reg[j] + j);
                    q ^= gf.exp(reg[j]);
                }
            }
            if q == 0 {
                roots[count] = i;
                locs[count] = k;
                count += 1;
                if count == deg_lambda {
                    break;
                }
            }
            k = modnn(k + self.iprim);
        }
        if count != deg_lambda {
            return Err(Self::uncorrectable("locator degree does not match its roots"));
        }

        // Evaluator omega(x) = s(x) * lambda(x) mod x^nroots
        let deg_omega = deg_lambda - 1;
        let mut omega = [A0; NN];
        for i in 0..=deg_omega {
            let mut tmp = 0u8;
            for j in (0..=i).rev() {
                if s[i - j] != A0 && lambda_log[j] != A0 {
                    tmp ^= gf.exp(s[i - j] + lambda_log[j]);
                }
            }
            omega[i] = gf.log(tmp) as usize;
        }

        // Forney: error magnitudes, collected before touching the codeword
        let mut fixes: Vec<(usize, u8)> = Vec::with_capacity(count);
        for j in (0..count).rev() {
            let mut num1 = 0u8;
            for i in (0..=deg_omega).rev() {
                if omega[i] != A0 {
                    num1 ^= gf.exp(omega[i] + i * roots[j]);
                }
            }
            let num2 = gf.exp(roots[j] * (self.fcr - 1) + NN);

            let mut den = 0u8;
            let top = deg_lambda.min(nroots - 1) & !1;
            for i in (0..=top).rev().step_by(2) {
                if lambda_log[i + 1] != A0 {
                    den ^= gf.exp(lambda_log[i + 1] + i * roots[j]);
                }
            }
            let magnitude = gf
                .div(gf.mul(num1, num2), den)
                .ok_or_else(|| Self::uncorrectable("zero derivative at error location"))?;

            if num1 != 0 {
                if locs[j] < self.pad {
                    return Err(Self::uncorrectable("error located in shortened region"));
                }
                fixes.push((locs[j] - self.pad, magnitude));
            }
        }

        for (pos, magnitude) in fixes {
            codeword[pos] ^= magnitude;
        }

        Ok(count)
    }
}
