//! Deterministic sparse row generation.
//!
//! Every row of the check matrix is regenerable from `(id, p_seed)` alone:
//! a weight drawn from the truncated ideal-soliton distribution (with a
//! weight-1 spike), then Weyl-stepped column selections without replacement
//! over the peeling and mixing column ranges.

use crate::bitmat::BitMatrix;
use crate::prng::CodecRng;

/// Probability of a weight-1 row, as a fixed-point fraction of 2^32.
const P1: u32 = u32::MAX / 128;

/*
    Cumulative ideal-soliton distribution, PMF 1/(k(k-1)) for k >= 2,
    truncated at weight 64. The final entry saturates the sampler.
*/
static WEIGHT_DIST: [u32; 64] = [
    0x00000000, 0x80000000, 0xaaaaaaaa, 0xc0000000, 0xcccccccc, 0xd5555555, 0xdb6db6db, 0xe0000000,
    0xe38e38e3, 0xe6666666, 0xe8ba2e8b, 0xeaaaaaaa, 0xec4ec4ec, 0xedb6db6d, 0xeeeeeeee, 0xefffffff,
    0xf0f0f0f0, 0xf1c71c71, 0xf286bca1, 0xf3333333, 0xf3cf3cf3, 0xf45d1745, 0xf4de9bd3, 0xf5555555,
    0xf5c28f5c, 0xf6276276, 0xf684bda1, 0xf6db6db6, 0xf72c234f, 0xf7777777, 0xf7bdef7b, 0xf7ffffff,
    0xf83e0f83, 0xf8787878, 0xf8af8af8, 0xf8e38e38, 0xf914c1ba, 0xf9435e50, 0xf96f96f9, 0xf9999999,
    0xf9c18f9c, 0xf9e79e79, 0xfa0be82f, 0xfa2e8ba2, 0xfa4fa4fa, 0xfa6f4de9, 0xfa8d9df5, 0xfaaaaaaa,
    0xfac687d6, 0xfae147ae, 0xfafafafa, 0xfb13b13b, 0xfb2b78c1, 0xfb425ed0, 0xfb586fb5, 0xfb6db6db,
    0xfb823ee0, 0xfb9611a7, 0xfba93868, 0xfbbbbbbb, 0xfbcda3ac, 0xfbdef7bd, 0xfbefbefb, 0xffffffff,
];

/// Maps one uniform 32-bit draw to a row weight in 1..=64.
pub fn sample_weight(rv: u32) -> u16 {
    if rv < P1 {
        return 1;
    }
    let rv = rv - P1;

    // First two buckets unrolled, they dominate.
    if rv <= WEIGHT_DIST[1] {
        return 2;
    }
    if rv <= WEIGHT_DIST[2] {
        return 3;
    }
    let mut weight = 3;
    while rv > WEIGHT_DIST[weight] {
        weight += 1;
    }
    (weight + 1) as u16
}

/// Generator state words for one check matrix row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpec {
    pub peel_weight: u16,
    pub peel_a: u16,
    pub peel_x0: u16,
    pub mix_a: u16,
    pub mix_x0: u16,
}

/// Derives the generator state for row `id`.
pub fn generate_row(id: u32, p_seed: u32, peel_columns: u16, mix_columns: u16) -> RowSpec {
    let mut rng = CodecRng::with_seeds(id, p_seed);

    let weight = sample_weight(rng.next_u32());
    // Never touch more than half the columns from a single row.
    let max_weight = peel_columns / 2;
    let peel_weight = weight.min(max_weight);

    let rv = rng.next_u32();
    let peel_a = (rv as u16) % (peel_columns - 1) + 1;
    let peel_x0 = ((rv >> 16) as u16) % peel_columns;

    let rv = rng.next_u32();
    let mix_a = (rv as u16) % (mix_columns - 1) + 1;
    let mix_x0 = ((rv >> 16) as u16) % mix_columns;

    RowSpec {
        peel_weight,
        peel_a,
        peel_x0,
        mix_a,
        mix_x0,
    }
}

/// Loop-less sampler without replacement over `0..b`: a Weyl step modulo a
/// prime `p >= b`, folding out-of-range hits back under `b`.
#[inline]
pub fn next_column(x: u16, b: u16, p: u16, a: u16) -> u16 {
    let x = ((x as u32 + a as u32) % p as u32) as u16;
    if x < b {
        return x;
    }
    let distance = p - x;
    if a >= distance {
        a - distance
    } else {
        // the rare case
        ((((a as u32) << 16) - distance as u32) % a as u32) as u16
    }
}

/// Iterates the peeling (or mixing) columns of a row.
pub struct ColumnIter {
    x: u16,
    remaining: u16,
    b: u16,
    p: u16,
    a: u16,
}

impl ColumnIter {
    pub fn peel(spec: &RowSpec, block_count: u16, block_next_prime: u16) -> ColumnIter {
        ColumnIter {
            x: spec.peel_x0,
            remaining: spec.peel_weight,
            b: block_count,
            p: block_next_prime,
            a: spec.peel_a,
        }
    }

    pub fn mix(spec: &RowSpec, mix_count: u16, mix_next_prime: u16) -> ColumnIter {
        ColumnIter {
            x: spec.mix_x0,
            remaining: 3,
            b: mix_count,
            p: mix_next_prime,
            a: spec.mix_a,
        }
    }
}

impl Iterator for ColumnIter {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let out = self.x;
        if self.remaining > 0 {
            self.x = next_column(self.x, self.b, self.p, self.a);
        }
        Some(out)
    }
}

//// Deck shuffle

/// In-place shuffle producing a permutation of `0..deck.len()`.
///
/// Draws one generator output per four inserts for decks that fit 8-bit
/// moduli, one per two inserts above that. The exact consumption pattern
/// is part of the wire contract since the dense rows replay it.
pub fn shuffle_deck16(rng: &mut CodecRng, deck: &mut [u16]) {
    let count = deck.len() as u32;
    deck[0] = 0;

    #[inline]
    fn insert(deck: &mut [u16], ii: u32, r: u32) {
        let jj = (r % ii) as usize;
        deck[ii as usize] = deck[jj];
        deck[jj] = ii as u16;
    }

    if count <= 256 {
        let mut ii = 1u32;
        loop {
            let rv = rng.next_u32();
            match count - ii {
                0 => return,
                1 => {
                    insert(deck, ii, (rv >> 16) & 0xff);
                    return;
                }
                2 => {
                    insert(deck, ii, (rv >> 8) & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 16) & 0xff);
                    return;
                }
                3 => {
                    insert(deck, ii, rv & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 8) & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 16) & 0xff);
                    return;
                }
                _ => {
                    insert(deck, ii, rv & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 8) & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 16) & 0xff);
                    ii += 1;
                    insert(deck, ii, (rv >> 24) & 0xff);
                    ii += 1;
                }
            }
        }
    } else {
        let mut ii = 1u32;
        loop {
            let rv = rng.next_u32();
            match count - ii {
                0 => return,
                1 => {
                    insert(deck, ii, rv & 0xffff);
                    return;
                }
                _ => {
                    insert(deck, ii, rv & 0xffff);
                    ii += 1;
                    insert(deck, ii, (rv >> 16) & 0xffff);
                    ii += 1;
                }
            }
        }
    }
}

//// Invertible GF(2) overlay

/*
    Seeds that make the generated n x n GF(2) matrix invertible, indexed by
    n, for n < 512. Larger sizes fall back to adding the identity.
*/
static INVERTIBLE_MATRIX_SEEDS: [u8; 512] = [
    0x0, 0, 2, 2, 10, 5, 6, 1, 2, 0, 0, 3, 5, 0, 0, 1, 0, 0, 0, 3, 0, 1, 2, 3, 0, 1, 6, 6, 1, 6, 0, 0,
    0, 4, 2, 7, 0, 2, 4, 2, 1, 1, 0, 0, 2, 12, 11, 3, 3, 3, 2, 1, 1, 4, 4, 1, 13, 2, 2, 1, 3, 2, 1, 1,
    3, 1, 0, 0, 1, 0, 0, 10, 8, 6, 0, 7, 3, 0, 1, 1, 0, 2, 6, 3, 2, 2, 1, 0, 5, 2, 5, 1, 1, 2, 4, 1,
    2, 1, 0, 0, 0, 2, 0, 5, 9, 17, 5, 1, 2, 2, 5, 4, 4, 4, 4, 4, 1, 2, 2, 2, 1, 0, 1, 0, 3, 2, 2, 0,
    1, 4, 1, 3, 1, 17, 3, 0, 0, 0, 0, 2, 2, 0, 0, 0, 1, 11, 4, 2, 4, 2, 1, 8, 2, 1, 1, 2, 6, 3, 0, 4,
    3, 10, 5, 3, 3, 1, 0, 1, 2, 6, 10, 10, 6, 0, 0, 0, 0, 0, 0, 1, 4, 2, 1, 2, 2, 12, 2, 2, 4, 0, 0, 2,
    0, 7, 12, 1, 1, 1, 0, 6, 8, 0, 0, 0, 0, 2, 1, 8, 6, 2, 0, 5, 4, 2, 7, 2, 10, 4, 2, 6, 4, 6, 6, 1,
    0, 0, 0, 0, 3, 1, 0, 4, 2, 6, 1, 1, 4, 2, 5, 1, 4, 1, 0, 0, 1, 8, 0, 0, 6, 0, 17, 4, 9, 8, 4, 4,
    3, 0, 0, 3, 1, 4, 3, 3, 0, 0, 3, 0, 0, 0, 3, 4, 4, 4, 3, 0, 0, 12, 1, 1, 2, 5, 8, 4, 8, 6, 2, 2,
    0, 0, 0, 13, 0, 3, 4, 2, 2, 1, 6, 13, 3, 12, 0, 0, 3, 7, 8, 2, 2, 2, 0, 0, 4, 0, 0, 0, 2, 0, 3, 6,
    7, 1, 0, 2, 2, 4, 4, 3, 6, 3, 6, 4, 4, 1, 3, 7, 1, 0, 0, 0, 1, 3, 0, 5, 4, 4, 4, 3, 1, 1, 7, 13,
    4, 6, 1, 1, 2, 2, 2, 5, 7, 1, 0, 0, 2, 2, 1, 2, 1, 6, 6, 6, 2, 2, 2, 5, 3, 2, 0, 0, 0, 0, 0, 0,
    0, 0, 2, 3, 2, 2, 0, 4, 0, 0, 4, 2, 0, 0, 0, 2, 4, 1, 2, 3, 1, 1, 1, 1, 1, 1, 1, 1, 4, 0, 0, 0,
    1, 1, 0, 0, 0, 0, 0, 4, 3, 0, 0, 0, 0, 4, 0, 0, 4, 5, 2, 0, 1, 0, 0, 1, 7, 1, 0, 0, 0, 0, 1, 1,
    1, 6, 3, 0, 0, 1, 3, 2, 0, 3, 0, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0, 8, 0, 0, 6, 4, 1, 3, 5, 3, 0, 1,
    1, 6, 3, 3, 5, 2, 2, 9, 5, 1, 2, 2, 1, 1, 1, 1, 1, 1, 2, 2, 1, 3, 1, 0, 0, 4, 1, 7, 0, 0, 0, 0,
];

/// XORs a seeded invertible `n x n` GF(2) matrix into rows `0..n` of `m`,
/// starting at bit column `offset`. Existing bits are added to, never
/// overwritten, so the dense structure underneath survives.
pub fn add_invertible_gf2(m: &mut BitMatrix, offset: usize, n: usize) -> bool {
    if n == 0 {
        return false;
    }

    if n < 512 {
        let mut rng = CodecRng::with_seed(INVERTIBLE_MATRIX_SEEDS[n] as u32);
        for row in 0..n {
            let mut at = offset;
            let mut remaining = n;
            while remaining > 0 {
                let rv1 = rng.next_u32() as u64;
                let rv2 = rng.next_u32() as u64;
                let word = (rv2 << 32) | rv1;
                let take = remaining.min(64);
                m.xor_bits_at(row, at, word, take);
                at += take;
                remaining -= take;
            }
        }
    } else {
        for row in 0..n {
            m.flip_bit(row, offset + row);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_sampler_buckets() {
        assert_eq!(sample_weight(0), 1);
        assert_eq!(sample_weight(P1 - 1), 1);
        assert_eq!(sample_weight(P1), 2);
        assert_eq!(sample_weight(P1 + 0x80000000), 2);
        assert_eq!(sample_weight(P1 + 0x80000001), 3);
        assert_eq!(sample_weight(u32::MAX), 64);
    }

    #[test]
    fn column_walk_covers_without_replacement() {
        // With a = generator step and p prime, b consecutive iterates must
        // be distinct and in range.
        let (b, p) = (41u16, 41u16);
        for a in 1..b {
            let mut seen = [false; 41];
            let mut x = 7u16;
            for _ in 0..b {
                assert!(x < b);
                assert!(!seen[x as usize]);
                seen[x as usize] = true;
                x = next_column(x, b, p, a);
            }
        }
    }

    #[test]
    fn column_walk_folds_prime_gap() {
        let (b, p) = (40u16, 41u16);
        for a in 1..b {
            for x0 in 0..b {
                let mut x = x0;
                for _ in 0..200 {
                    x = next_column(x, b, p, a);
                    assert!(x < b);
                }
            }
        }
    }

    #[test]
    fn shuffle_is_permutation() {
        for &count in &[1usize, 2, 3, 4, 5, 8, 255, 256, 257, 500, 1024] {
            let mut rng = CodecRng::with_seed(count as u32);
            let mut deck = vec![0u16; count];
            shuffle_deck16(&mut rng, &mut deck);
            let mut seen = vec![false; count];
            for &d in &deck {
                assert!(!seen[d as usize]);
                seen[d as usize] = true;
            }
        }
    }

    #[test]
    fn row_spec_is_deterministic_and_bounded() {
        for id in 0..500u32 {
            let a = generate_row(id, 0xABCD, 1000, 41);
            let b = generate_row(id, 0xABCD, 1000, 41);
            assert_eq!(a, b);
            assert!(a.peel_weight >= 1 && a.peel_weight <= 500);
            assert!(a.peel_a >= 1 && a.peel_a < 1000);
            assert!(a.peel_x0 < 1000);
            assert!(a.mix_a >= 1 && a.mix_a < 41);
            assert!(a.mix_x0 < 41);
        }
    }

    #[test]
    fn overlay_only_touches_requested_window() {
        let mut m = BitMatrix::new(8, 200);
        assert!(add_invertible_gf2(&mut m, 67, 8));
        for r in 0..8 {
            for c in 0..67 {
                assert!(!m.bit(r, c));
            }
            for c in 75..200 {
                assert!(!m.bit(r, c));
            }
        }
        // Adding the same overlay twice cancels out.
        assert!(add_invertible_gf2(&mut m, 67, 8));
        for r in 0..8 {
            for c in 0..200 {
                assert!(!m.bit(r, c));
            }
        }
    }
}
