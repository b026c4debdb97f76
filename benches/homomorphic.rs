use criterion::{criterion_group, criterion_main, Criterion};
use hecrypt::prelude::*;

fn criterion_arithmetic(c: &mut Criterion) {
    let ctx = CryptoContext::new(SecurityLevel::Medium);
    let mut keys = KeyPair::new(&ctx);
    keys.generate().unwrap();
    keys.generate_relin_keys().unwrap();

    let a = HomomorphicInt::encrypt(6, &keys);
    let b = HomomorphicInt::encrypt(7, &keys);

    c.bench_function("encrypt", |bench| {
        bench.iter(|| HomomorphicInt::encrypt(42, &keys))
    });
    c.bench_function("add", |bench| bench.iter(|| &a + &b));
    c.bench_function("mul", |bench| bench.iter(|| &a * &b));
    c.bench_function("mul + relinearize", |bench| {
        bench.iter(|| (&a * &b).relinearize(&keys))
    });

    // Size-3 product, decrypted without relinearization
    let product = &a * &b;
    c.bench_function("decrypt after mul", |bench| {
        bench.iter(|| product.decrypt(&keys).unwrap())
    });
}

fn criterion_codec(c: &mut Criterion) {
    let ctx = CryptoContext::new(SecurityLevel::Medium);
    let mut keys = KeyPair::new(&ctx);
    keys.generate().unwrap();

    let data: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let encryptor = Encryptor::new(&ctx);
    let decryptor = Decryptor::new(&ctx);
    let encrypted = encryptor.encrypt_bytes(&data, &keys).unwrap();

    c.bench_function("encrypt 64 KiB", |bench| {
        bench.iter(|| encryptor.encrypt_bytes(&data, &keys).unwrap())
    });
    c.bench_function("decrypt 64 KiB", |bench| {
        bench.iter(|| decryptor.decrypt_bytes(&encrypted, &keys).unwrap())
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(core::time::Duration::from_secs(10));
    targets = criterion_arithmetic, criterion_codec
);
criterion_main!(benches);
