//! The memory-bound leaf workload: repeated random-index reads into a
//! fixed vector of short strings. Spawned and fully controlled by
//! `schedsim_host`.

use rand::Rng;

const VEC_LEN: usize = 4096;
const ITERATIONS: u32 = 1 << 15;
const READS_PER_ITERATION: usize = 16;

fn main() {
    let v: Vec<String> = vec!["01010".to_string(); VEC_LEN];
    let mut rng = rand::thread_rng();

    for _ in 0..ITERATIONS {
        for _ in 0..READS_PER_ITERATION {
            let idx = rng.gen_range(0..VEC_LEN);
            std::hint::black_box(&v[idx]);
        }
    }
}
