use promptsub::Parameters;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Generate n random parameter sets to use in the benchmark. Every field is
/// left out now and then so all alternatives get exercised.
pub fn generate_random_parameters(n: usize) -> Vec<Parameters> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    let mut parameters = Vec::with_capacity(n);

    for _ in 0..n {
        let mut set = Parameters::new();
        if rng.random_bool(0.8) {
            set.insert("name", random_string(&mut rng, 5, 10));
        }
        if rng.random_bool(0.5) {
            set.insert("age", rng.random_range(18..80_i64));
        }
        if rng.random_bool(0.5) {
            set.insert("city", random_string(&mut rng, 4, 12));
        }
        set.insert("is_rainy", if rng.random_bool(0.3) { "true" } else { "false" });
        if rng.random_bool(0.6) {
            set.insert("topic", random_string(&mut rng, 3, 8));
        }
        parameters.push(set);
    }

    parameters
}

/// Generate a random string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(min_len..=max_len);

    (0..len)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}
