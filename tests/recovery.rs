use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use riptide_fec::{Decoder, Encoder};

fn pattern(total: usize, mul: usize, add: usize) -> Vec<u8> {
    (0..total).map(|i| ((i * mul + add) % 256) as u8).collect()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn feed(enc: &Encoder, dec: &mut Decoder, id: u32, block_bytes: usize) -> bool {
    let mut block = vec![0u8; block_bytes];
    enc.write(id, &mut block);
    dec.read(id, &block).unwrap()
}

/// A duplicated block makes the first N rows rank-deficient, forcing the
/// decoder through the resume path; the late rows meet already-solved
/// GF(256) pivots and get promoted on the fly.
#[test]
fn resume_after_duplicate_block() {
    init_logging();
    let message = pattern(64 * 2, 9, 5);
    let enc = Encoder::new(&message, 2).unwrap();

    let mut dec = Decoder::new(64 * 2, 2).unwrap();
    for id in 0..63u32 {
        assert!(!feed(&enc, &mut dec, id, 2));
    }
    assert!(!feed(&enc, &mut dec, 0, 2), "rank-deficient set must not solve");
    assert!(feed(&enc, &mut dec, 64, 2), "one extra block resolves it");

    let mut out = vec![0u8; 64 * 2];
    dec.reconstruct(&mut out).unwrap();
    assert_eq!(out, message);
}

#[test]
fn resume_after_repeated_duplicates() {
    let message = pattern(64 * 2, 9, 5);
    let enc = Encoder::new(&message, 2).unwrap();

    let mut dec = Decoder::new(64 * 2, 2).unwrap();
    for id in 0..60u32 {
        assert!(!feed(&enc, &mut dec, id, 2));
    }
    for _ in 0..4 {
        assert!(!feed(&enc, &mut dec, 1, 2));
    }
    // Four redundant rows need four fresh ones.
    assert!(!feed(&enc, &mut dec, 64, 2));
    assert!(!feed(&enc, &mut dec, 65, 2));
    assert!(!feed(&enc, &mut dec, 66, 2));
    assert!(feed(&enc, &mut dec, 67, 2));

    let mut out = vec![0u8; 64 * 2];
    dec.reconstruct(&mut out).unwrap();
    assert_eq!(out, message);
}

#[test]
fn hundredth_block_completes() {
    let message = pattern(100 * 4, 3, 11);
    let enc = Encoder::new(&message, 4).unwrap();

    let mut dec = Decoder::new(100 * 4, 4).unwrap();
    for id in 0..99u32 {
        assert!(!feed(&enc, &mut dec, id, 4));
        assert!(!dec.is_ready());
    }
    assert!(feed(&enc, &mut dec, 99, 4));
    assert!(dec.is_ready());

    let mut out = vec![0u8; 100 * 4];
    dec.reconstruct(&mut out).unwrap();
    assert_eq!(out, message);
}

/*
    This id set is one concrete N-sized sample that is rank-deficient for
    N=100, found by sweeping the generator; it stays deficient until id
    203 arrives. Pinning it keeps the resume path under test without any
    randomness.
*/
#[test]
fn deficient_subset_needs_specific_block() {
    const IDS: [u32; 100] = [
        1, 2, 3, 4, 5, 12, 14, 16, 18, 19, 20, 21, 23, 25, 27, 29, 30, 35, 36, 39,
        41, 42, 43, 46, 47, 50, 53, 54, 59, 61, 62, 63, 64, 65, 67, 75, 76, 78, 80,
        81, 82, 83, 84, 87, 88, 91, 94, 95, 96, 103, 107, 109, 112, 114, 115, 119,
        121, 123, 125, 126, 127, 134, 135, 136, 138, 140, 141, 142, 144, 145, 148,
        149, 153, 155, 156, 160, 162, 165, 166, 167, 168, 169, 170, 171, 172, 173,
        178, 179, 182, 184, 186, 187, 188, 190, 191, 192, 193, 194, 195, 199,
    ];
    let message = pattern(100 * 3, 5, 3);
    let enc = Encoder::new(&message, 3).unwrap();

    let mut dec = Decoder::new(100 * 3, 3).unwrap();
    for &id in IDS.iter() {
        assert!(!feed(&enc, &mut dec, id, 3));
    }
    assert!(feed(&enc, &mut dec, 203, 3));

    let mut out = vec![0u8; 100 * 3];
    dec.reconstruct(&mut out).unwrap();
    assert_eq!(out, message);
}

#[test]
fn random_loss_monte_carlo() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let (n, b) = (250usize, 13usize);
    let message = pattern(n * b, 29, 1);
    let enc = Encoder::new(&message, b).unwrap();

    let mut total_extra = 0usize;
    let trials = 50;
    for trial in 0..trials {
        // Keep each systematic block with probability 1/2, then top up
        // with parity blocks and shuffle the delivery order.
        let mut ids: Vec<u32> = (0..n as u32).filter(|_| rng.gen_bool(0.5)).collect();
        let mut next_id = n as u32;
        while ids.len() < n {
            ids.push(next_id);
            next_id += 1;
        }
        ids.shuffle(&mut rng);

        let mut dec = Decoder::new(n * b, b).unwrap();
        let mut done = false;
        for &id in &ids {
            done = feed(&enc, &mut dec, id, b);
            if done {
                break;
            }
        }
        let mut extra = 0;
        while !done {
            extra += 1;
            done = feed(&enc, &mut dec, next_id, b);
            next_id += 1;
        }
        total_extra += extra;

        let mut out = vec![0u8; n * b];
        dec.reconstruct(&mut out).unwrap();
        assert_eq!(out, message, "trial {} (extra={})", trial, extra);
    }

    // The deficiency rate sits in the low percent range; far below one
    // extra block per message on average.
    assert!(
        total_extra <= trials / 2,
        "unexpected overhead: {} extras over {} trials",
        total_extra,
        trials
    );
}

#[test]
fn large_block_count_roundtrip() {
    let (n, b) = (1000usize, 16usize);
    let message = pattern(n * b, 7, 13);
    let enc = Encoder::new(&message, b).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut ids: Vec<u32> = (0..n as u32).filter(|_| rng.gen_bool(0.5)).collect();
    let mut next_id = n as u32;
    while ids.len() < n {
        ids.push(next_id);
        next_id += 1;
    }
    ids.shuffle(&mut rng);

    let mut dec = Decoder::new(n * b, b).unwrap();
    let mut done = false;
    for &id in &ids {
        done = feed(&enc, &mut dec, id, b);
        if done {
            break;
        }
    }
    while !done {
        done = feed(&enc, &mut dec, next_id, b);
        next_id += 1;
    }

    let mut out = vec![0u8; n * b];
    dec.reconstruct(&mut out).unwrap();
    assert_eq!(out, message);
}
