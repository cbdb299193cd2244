#![no_main]

use libfuzzer_sys::fuzz_target;
use seedguard_shamir::{FieldElement, Point, PrimeField, SecretSharer};

fuzz_target!(|data: &[u8]| {
    // Arbitrary (possibly duplicate, zero or out-of-range) shares in a 32-bit field
    let field = PrimeField::from_hex("fffffffb").unwrap();
    let sharer = SecretSharer::new(field);

    let points: Vec<Point> = data
        .chunks_exact(8)
        .take(16)
        .map(|chunk| Point {
            x: FieldElement::from_bytes_be(&chunk[..4]),
            y: FieldElement::from_bytes_be(&chunk[4..]),
        })
        .collect();

    let _ = sharer.recover(&points);

    // Whatever was recovered must split and recover back to itself
    if let Ok(secret) = sharer.recover(&points) {
        let ids: Vec<FieldElement> = points.iter().map(|p| p.x.clone()).collect();
        if let Ok(shares) = sharer.split(&secret, ids.len(), &ids) {
            assert_eq!(sharer.recover(&shares).unwrap(), secret);
        }
    }
});
