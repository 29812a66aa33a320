//! Deterministic generator driving all matrix randomness.
//!
//! Two multiply-with-carry streams combined per output. The 32-bit seeds
//! are avalanched through MurmurHash3-style finalizers before use so that
//! nearby seeds do not produce correlated low bits, and the first output
//! after seeding is discarded. Encoder and decoder must agree on every
//! output bit, so the recurrence is fixed for the life of the wire format.

const MWC_A: u64 = 0xfffd21a7;
const MWC_B: u64 = 0xfffd1361;

const AVALANCHE_C1: u64 = 0xff51afd7ed558ccd;
const AVALANCHE_C2: u64 = 0xc4ceb9fe1a85ec53;

fn avalanche(mut v: u64) -> u64 {
    v = v.wrapping_mul(AVALANCHE_C1);
    v ^= v >> 33;
    v = v.wrapping_mul(AVALANCHE_C2);
    v ^= v >> 33;
    v
}

#[derive(Clone)]
pub struct CodecRng {
    x: u64,
    y: u64,
}

impl CodecRng {
    pub fn with_seeds(x: u32, y: u32) -> CodecRng {
        let x = x.wrapping_add(y);
        let y = y.wrapping_add(x);

        let mut rng = CodecRng {
            x: avalanche(0x9368e53c2f6af274 ^ x as u64),
            y: avalanche(0x586dcd208f7cd3fd ^ y as u64),
        };
        rng.next_u32();
        rng
    }

    pub fn with_seed(seed: u32) -> CodecRng {
        CodecRng::with_seeds(seed, seed)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.x = MWC_A * (self.x as u32 as u64) + (self.x >> 32);
        self.y = MWC_B * (self.y as u32 as u64) + (self.y >> 32);
        (self.x as u32).rotate_left(7).wrapping_add(self.y as u32)
    }
}
