use hecrypt::prelude::*;

fn main() -> Result<(), Error> {
    // A small preset is enough for a few additions and one multiplication
    let ctx = CryptoContext::new(SecurityLevel::Low);
    let mut keys = KeyPair::new(&ctx);
    keys.generate()?;
    keys.generate_relin_keys()?;

    let prices = [1250, 899, 4300];
    let quantities = [3, 10, 1];

    // Only the key holder can read the individual values or the total
    let mut total = HomomorphicInt::encrypt(0, &keys);
    for (&price, &quantity) in prices.iter().zip(&quantities) {
        let line = HomomorphicInt::encrypt(price, &keys).mul_plain(quantity);
        total += &line;
    }
    let total = total.into_result()?;

    println!("noise budget left: {} bits", total.noise_budget(&keys));
    println!("ciphertext size: {}", total.size());

    // Results are computed modulo the plain modulus (65537), centered around 0
    let expected: i64 = prices.iter().zip(&quantities).map(|(p, q)| p * q).sum();
    let decrypted = total.decrypt(&keys)?;
    println!("total = {decrypted} (expected {expected})");
    assert_eq!(decrypted, expected);

    let discounted = total.sub_plain(1040);
    println!("after discount = {}", discounted.decrypt(&keys)?);

    // Squaring grows the ciphertext until it is relinearized
    let squared = HomomorphicInt::encrypt(-12, &keys).square();
    println!("size after square: {}", squared.size());
    let squared = squared.relinearize(&keys);
    println!("(-12)^2 = {} (size {})", squared.decrypt(&keys)?, squared.size());

    Ok(())
}
