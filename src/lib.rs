// Riptide FEC
//
// A streaming forward-error-correction codec for the binary erasure
// channel: a systematic rateless block code built from a sparse peeling
// matrix, a dense GF(2) mixing submatrix and a small GF(256) heavy
// submatrix. A sender splits a message into N blocks and emits as many
// encoded blocks as the channel needs; a receiver that collects any
// N + epsilon of them (epsilon averaging well under one) recovers the
// message in roughly O(N) block XOR operations.
//
// The identifiers carry no secrecy and the blocks no integrity check;
// corrupted blocks decode to garbage without detection. Pair the codec
// with an authenticated transport when that matters.

pub mod bitmat;
pub mod blockbuf;
mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gf256;
pub mod params;
pub mod prng;
pub mod rowgen;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::Error;

/// Builds the GF(256) tables and verifies them. Called implicitly by
/// `Encoder::new` / `Decoder::new`; exposed for callers that want the
/// one-time cost at a chosen moment.
pub fn init() -> Result<(), Error> {
    if !gf256::self_check() {
        return Err(Error::BadInput);
    }
    Ok(())
}
