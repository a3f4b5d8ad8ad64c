use super::gf::{eval_poly, G};
use crate::error::{DecodeError, DecodeResult};

pub const MAX_BLOCK_SIZE: usize = 256;

pub const MAX_EC_SIZE: usize = 64;

// Codeword block
//------------------------------------------------------------------------------

/// One error-correction block: data codewords followed by ecc codewords.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Block {
    pub data: [u8; MAX_BLOCK_SIZE],
    // Block length
    len: usize,
    // Data length
    dlen: usize,
}

impl Block {
    pub fn with_encoded(encoded: &[u8], dlen: usize) -> Self {
        let len = encoded.len();
        debug_assert!(len <= MAX_BLOCK_SIZE, "Block too long: {len}");
        debug_assert!(dlen <= len, "Data length exceeds block length");
        let mut data = [0u8; MAX_BLOCK_SIZE];
        data[..len].copy_from_slice(encoded);
        Self { data, len, dlen }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn ec_len(&self) -> usize {
        self.len - self.dlen
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn ecc(&self) -> &[u8] {
        &self.data[self.dlen..self.len]
    }

    #[cfg(test)]
    pub fn new(raw: &[u8], len: usize) -> Self {
        let dlen = raw.len();
        let mut data = [0u8; MAX_BLOCK_SIZE];
        data[..dlen].copy_from_slice(raw);
        let mut block = Self { data, len, dlen };
        block.compute_ecc();
        block
    }

    // Remainder of data * x^ec_len divided by the generator polynomial
    // Prod (x - alpha^i), i in 0..ec_len. Test-only: the library never
    // generates symbols, but corruption tests need valid blocks to corrupt
    #[cfg(test)]
    fn compute_ecc(&mut self) {
        let ec_len = self.ec_len();

        let mut gen = vec![G(1)];
        for i in 0..ec_len {
            let mut next = vec![G(0); gen.len() + 1];
            let root = G::gen_pow(i);
            for (j, &c) in gen.iter().enumerate() {
                next[j] += c * root;
                next[j + 1] += c;
            }
            gen = next;
        }

        let mut rem = vec![G(0); ec_len];
        for &b in self.data[..self.dlen].iter() {
            let factor = G(b) + rem[ec_len - 1];
            rem.rotate_right(1);
            rem[0] = G(0);
            for (j, r) in rem.iter_mut().enumerate() {
                *r += factor * gen[j];
            }
        }

        for (i, r) in rem.iter().rev().enumerate() {
            self.data[self.dlen + i] = r.0;
        }
    }
}

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Correct in-place and return the number of repaired codewords. Fails
    /// with `Uncorrectable` whenever the error count exceeds the guaranteed
    /// capacity of the block's code; a best guess is never returned.
    pub fn rectify(&mut self) -> DecodeResult<usize> {
        let synd = match self.syndromes() {
            Ok(()) => return Ok(0),
            Err(s) => s,
        };

        let capacity = self.ec_len() / 2;

        // Error locator polynomial
        let (sig, l) = self.berlekamp_massey(&synd);
        if l > capacity {
            return Err(DecodeError::Uncorrectable);
        }

        let (err_loc, roots) = self.chien_search(&sig);
        if roots != l {
            return Err(DecodeError::Uncorrectable);
        }

        // Sigma derivative; only odd-degree terms survive in a field of
        // characteristic 2
        let mut dsig = [G(0); MAX_EC_SIZE];
        for i in (1..MAX_EC_SIZE).step_by(2) {
            dsig[i - 1] = sig[i];
        }

        // Error evaluator
        let omg = self.omega(&synd, &sig);

        // Error magnitude
        let err_mag = self.forney(&omg, &dsig, &err_loc)?;

        for (i, &g) in err_mag.iter().take(self.len).enumerate() {
            self.data[i] = (G(self.data[i]) + g).into();
        }

        match self.syndromes() {
            Ok(()) => Ok(l),
            Err(_) => Err(DecodeError::Uncorrectable),
        }
    }

    fn syndromes(&self) -> Result<(), [G; MAX_EC_SIZE]> {
        let ec_len = self.ec_len();
        let mut synd = [G(0); MAX_EC_SIZE];

        let mut gdata = [G(0); MAX_BLOCK_SIZE];
        for (i, &b) in self.data.iter().take(self.len).enumerate() {
            gdata[i] = G(b);
        }
        for (i, e) in synd.iter_mut().take(ec_len).enumerate() {
            *e = eval_poly(gdata.iter().take(self.len).rev(), G::gen_pow(i));
        }

        if synd.iter().all(|&s| s.0 == 0) {
            Ok(())
        } else {
            Err(synd)
        }
    }

    // Sigma polynomial and its expected degree
    fn berlekamp_massey(&self, synd: &[G]) -> ([G; MAX_EC_SIZE], usize) {
        let mut l = 0usize;
        let mut m = 1usize;
        let mut b = G(1);
        let mut cx = [G(0); MAX_EC_SIZE];
        let mut bx = [G(0); MAX_EC_SIZE];
        let mut tx = [G(0); MAX_EC_SIZE];
        cx[0] = G(1);
        bx[0] = G(1);
        let deg = self.ec_len();

        for n in 0..deg {
            // Discrepancy
            let mut d = synd[n];
            for i in 1..=l.min(n) {
                d += cx[i] * synd[n - i];
            }

            if d.0 != 0 {
                tx.copy_from_slice(&cx);

                let scale = d / b;

                for i in 0..MAX_EC_SIZE - m {
                    cx[i + m] += scale * bx[i];
                }

                if 2 * l <= n {
                    bx.copy_from_slice(&tx);
                    l = n + 1 - l;
                    b = d;
                    m = 1;
                } else {
                    m += 1;
                }
            } else {
                m += 1;
            }
        }
        (cx, l)
    }

    // Marks erroneous codeword positions; also reports the root count so the
    // caller can reject a locator that doesn't fully factor
    fn chien_search(&self, sig: &[G; MAX_EC_SIZE]) -> ([bool; MAX_BLOCK_SIZE], usize) {
        let deg = self.ec_len();
        let mut err_loc = [false; MAX_BLOCK_SIZE];
        let mut roots = 0;
        for (i, e) in err_loc[..self.len].iter_mut().rev().enumerate() {
            if eval_poly(sig.iter().take(deg + 1), G::gen_pow(255 - i)).0 == 0 {
                *e = true;
                roots += 1;
            }
        }
        (err_loc, roots)
    }

    // Error evaluator polynomial
    fn omega(&self, synd: &[G; MAX_EC_SIZE], sig: &[G; MAX_EC_SIZE]) -> [G; MAX_EC_SIZE] {
        let t = self.ec_len() - 1;
        let mut omg = [G(0); MAX_EC_SIZE];
        for i in 0..t {
            let sy = synd[i + 1];
            for j in 0..t - i {
                omg[i + j] += sy * sig[j];
            }
        }
        omg
    }

    fn forney(
        &self,
        omg: &[G; MAX_EC_SIZE],
        dsig: &[G; MAX_EC_SIZE],
        err_loc: &[bool; MAX_BLOCK_SIZE],
    ) -> DecodeResult<[G; MAX_BLOCK_SIZE]> {
        let mut mag = [G(0); MAX_BLOCK_SIZE];
        for (i, &is_err) in err_loc.iter().take(self.len).rev().enumerate() {
            if !is_err {
                continue;
            }
            let xinv = G::gen_pow(255 - i);
            let omg_x = eval_poly(omg.iter(), xinv);
            let sig_x = eval_poly(dsig.iter(), xinv);
            if sig_x.0 == 0 {
                return Err(DecodeError::Uncorrectable);
            }
            mag[self.len - 1 - i] = omg_x / sig_x;
        }
        Ok(mag)
    }
}
