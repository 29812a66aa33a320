use criterion::{black_box, criterion_group, criterion_main, Criterion};

use riptide_fec::gf256;
use riptide_fec::{Decoder, Encoder};

fn bench_gf_kernels(c: &mut Criterion) {
    riptide_fec::init().unwrap();
    let src: Vec<u8> = (0..1300).map(|i| (i * 31 + 7) as u8).collect();
    let mut dst: Vec<u8> = (0..1300).map(|i| (i * 17 + 3) as u8).collect();

    c.bench_function("gf256_mem_mul_add_1300", |b| {
        b.iter(|| {
            gf256::mem_mul_add(black_box(&mut dst), black_box(0x5B), black_box(&src));
        });
    });

    c.bench_function("gf256_mem_div_1300", |b| {
        b.iter(|| {
            gf256::mem_div(black_box(&mut dst), black_box(0x5B));
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    riptide_fec::init().unwrap();
    let message: Vec<u8> = (0..1000 * 1300).map(|i| (i % 256) as u8).collect();

    c.bench_function("encoder_setup_n1000", |b| {
        b.iter(|| Encoder::new(black_box(&message), 1300).unwrap());
    });

    let enc = Encoder::new(&message, 1300).unwrap();
    let mut block = vec![0u8; 1300];
    c.bench_function("encoder_write_parity", |b| {
        let mut id = 1000u32;
        b.iter(|| {
            enc.write(black_box(id), &mut block);
            id = id.wrapping_add(1).max(1000);
        });
    });
}

fn bench_decode(c: &mut Criterion) {
    riptide_fec::init().unwrap();
    let n = 1000usize;
    let message: Vec<u8> = (0..n * 1300).map(|i| (i % 256) as u8).collect();
    let enc = Encoder::new(&message, 1300).unwrap();

    // Even systematic ids plus parity blocks, as a 50% loss pattern.
    let mut feeds = Vec::new();
    let mut block = vec![0u8; 1300];
    for id in (0..n as u32).step_by(2).chain(n as u32..(n + n / 2) as u32) {
        enc.write(id, &mut block);
        feeds.push((id, block.clone()));
        if feeds.len() == n {
            break;
        }
    }

    c.bench_function("decoder_solve_n1000_half_loss", |b| {
        b.iter(|| {
            let mut dec = Decoder::new(n * 1300, 1300).unwrap();
            let mut done = false;
            for (id, data) in &feeds {
                done = dec.read(*id, data).unwrap();
                if done {
                    break;
                }
            }
            assert!(done);
        });
    });
}

criterion_group!(benches, bench_gf_kernels, bench_encode, bench_decode);
criterion_main!(benches);
