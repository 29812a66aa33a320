//! GF(256) arithmetic for the heavy rows of the check matrix.
//!
//! The field is defined by the generator polynomial 0x15F, chosen off-line
//! for the invertibility of random matrices over it. Multiplication and
//! division are branch-free table lookups: `LOG[0]` holds an out-of-range
//! sentinel and the tail of `EXP` is zero, so a zero operand falls through
//! to a zero product without testing for it.

use lazy_static::lazy_static;

/// Generator polynomial for the field.
pub const POLY: u32 = 0x15F;

const LOG_ZERO: u16 = 512;
const EXP_SIZE: usize = 512 * 2 + 1;

struct Tables {
    log: [u16; 256],
    exp: [u8; EXP_SIZE],
    inv: [u8; 256],
}

impl Tables {
    fn build() -> Tables {
        // One full multiplicative cycle of the generator element 2.
        let mut cycle = [0u8; 255];
        let mut x: u32 = 1;
        for c in cycle.iter_mut() {
            *c = x as u8;
            x <<= 1;
            if x >= 256 {
                x ^= POLY;
            }
        }

        let mut log = [LOG_ZERO; 256];
        for (i, &c) in cycle.iter().enumerate().skip(1) {
            log[c as usize] = i as u16;
        }
        // Exponent of 1 is stored as 255 so that every nonzero byte has a
        // log in 1..=255 and zero stays distinguishable via the sentinel.
        log[1] = 255;

        // EXP carries two cycles so that LOG[a] + LOG[b] never needs a
        // modulo; everything past index 510 stays zero, which is what a
        // sum involving LOG[0] lands on.
        let mut exp = [0u8; EXP_SIZE];
        for i in 0..=510 {
            exp[i] = cycle[i % 255];
        }

        let mut inv = [0u8; 256];
        for v in 1..256 {
            inv[v] = exp[(255 - log[v]) as usize];
        }

        Tables { log, exp, inv }
    }
}

lazy_static! {
    static ref TABLES: Tables = Tables::build();
}

/// Forces table construction and spot-checks the field laws.
///
/// Returns false if the tables are inconsistent, which would indicate
/// memory corruption or a broken build rather than a runtime condition.
pub fn self_check() -> bool {
    let t = &*TABLES;
    if t.exp[1] != 2 || t.exp[8] != 95 || t.exp[510] != 1 {
        return false;
    }
    for x in [1u8, 2, 3, 0x53, 0xCA, 0xFF] {
        if mul(x, t.inv[x as usize]) != 1 {
            return false;
        }
        for y in [1u8, 7, 0x8E, 0xFF] {
            if div(mul(x, y), y) != x || mul(div(x, y), y) != x {
                return false;
            }
        }
    }
    true
}

#[inline(always)]
pub fn mul(a: u8, b: u8) -> u8 {
    let t = &*TABLES;
    t.exp[(t.log[a as usize] + t.log[b as usize]) as usize]
}

/// Precondition: `b != 0`.
#[inline(always)]
pub fn div(a: u8, b: u8) -> u8 {
    debug_assert_ne!(b, 0);
    let t = &*TABLES;
    t.exp[(t.log[a as usize] + 255 - t.log[b as usize]) as usize]
}

#[inline(always)]
pub fn inv(a: u8) -> u8 {
    debug_assert_ne!(a, 0);
    TABLES.inv[a as usize]
}

/// `dst[i] ^= src[i] * k` over the byte blocks.
pub fn mem_mul_add(dst: &mut [u8], k: u8, src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    let t = &*TABLES;
    let log_k = t.log[k as usize];
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d ^= t.exp[(t.log[s as usize] + log_k) as usize];
    }
}

/// `buf[i] /= k` in place. Precondition: `k != 0`.
pub fn mem_div(buf: &mut [u8], k: u8) {
    debug_assert_ne!(k, 0);
    let t = &*TABLES;
    let log_k = 255 - t.log[k as usize];
    for b in buf.iter_mut() {
        *b = t.exp[(t.log[*b as usize] + log_k) as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_laws_exhaustive() {
        for x in 0..=255u8 {
            for y in 1..=255u8 {
                assert_eq!(div(mul(x, y), y), x, "x={} y={}", x, y);
                assert_eq!(mul(div(x, y), y), x, "x={} y={}", x, y);
            }
        }
    }

    #[test]
    fn zero_annihilates() {
        for x in 0..=255u8 {
            assert_eq!(mul(x, 0), 0);
            assert_eq!(mul(0, x), 0);
        }
    }

    #[test]
    fn known_cycle_values() {
        // 2^8 reduces through the polynomial to 0x5F.
        assert_eq!(mul(2, 128), 95);
        assert_eq!(mul(1, 1), 1);
        assert_eq!(inv(1), 1);
    }

    #[test]
    fn mem_kernels_match_scalar() {
        let src: Vec<u8> = (0..64).map(|i| (i * 7 + 3) as u8).collect();
        let mut dst: Vec<u8> = (0..64).map(|i| (i * 13 + 1) as u8).collect();
        let expect: Vec<u8> = dst
            .iter()
            .zip(src.iter())
            .map(|(&d, &s)| d ^ mul(s, 0x37))
            .collect();
        mem_mul_add(&mut dst, 0x37, &src);
        assert_eq!(dst, expect);

        let before = dst.clone();
        mem_div(&mut dst, 0x37);
        for (b, a) in before.iter().zip(dst.iter()) {
            assert_eq!(div(*b, 0x37), *a);
        }
    }

    #[test]
    fn self_check_passes() {
        assert!(self_check());
    }
}
