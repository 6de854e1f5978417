//! The CPU-bound leaf workload: repeated 16x16 matrix multiplication
//! against two random matrices. Spawned and fully controlled (stopped,
//! resumed, signalled) by `schedsim_host`; this binary itself does not
//! know it is being scheduled.

use rand::Rng;

const N: usize = 16;
const ITERATIONS: u32 = 1 << 15;

fn random_matrix(rng: &mut impl Rng) -> [[f32; N]; N] {
    let mut m = [[0.0f32; N]; N];
    for row in &mut m {
        for cell in row.iter_mut() {
            *cell = rng.gen_range(-1024.0..1024.0);
        }
    }
    m
}

fn main() {
    let mut rng = rand::thread_rng();
    let a = random_matrix(&mut rng);
    let b = random_matrix(&mut rng);

    for _ in 0..ITERATIONS {
        let mut c = [[0.0f32; N]; N];
        for i in 0..N {
            for k in 0..N {
                for j in 0..N {
                    c[i][j] += a[i][k] * b[k][j];
                }
            }
        }
        std::hint::black_box(&c);
    }
}
