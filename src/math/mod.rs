pub mod modular;
pub mod primes;
pub mod sampling;

pub use modular::{add_mod, center, mod_inverse, mod_pow, mul_mod, reduce_signed, sub_mod};
pub use primes::{chain_primes, get_first_prime_down, is_ntt_friendly_prime, is_prime};
pub use sampling::{
    gaussian_coefficients, random_unit_vector, ternary_coefficients, uniform_coefficients,
};
