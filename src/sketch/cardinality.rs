//! Probabilistic cardinality estimator for `SetAcc`, specified by contract
//! in spec.md §3/§9. No HyperLogLog crate exists in the teacher's stack or
//! the wider example pack, so this is a small self-contained dense HLL
//! hashing members with `siphasher` (a real crate already used elsewhere
//! in the example pack for content hashing).

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// Minimum/maximum precision (register-index bits) accepted by [`Hll::new`].
pub const MIN_PRECISION: u8 = 4;
pub const MAX_PRECISION: u8 = 16;

/// A dense HyperLogLog cardinality estimator.
pub struct Hll {
    registers: Vec<u8>,
    precision: u8,
}

impl Hll {
    /// Builds an estimator with `precision` register-index bits
    /// (clamped to `4..=16`), trading memory for accuracy: `2^precision`
    /// one-byte registers, standard error roughly `1.04 / sqrt(2^precision)`.
    #[must_use]
    pub fn new(precision: u8) -> Self {
        let precision = precision.clamp(MIN_PRECISION, MAX_PRECISION);
        let m = 1usize << precision;
        Self {
            registers: vec![0; m],
            precision,
        }
    }

    /// Folds one member into the sketch.
    pub fn add(&mut self, member: &[u8]) {
        let hash = Self::hash(member);
        let m_bits = self.precision;
        let idx = (hash & ((1u64 << m_bits) - 1)) as usize;
        let rest = hash >> m_bits;
        // number of leading zeros of `rest` within the remaining 64 - p
        // bits, plus one; an all-zero remainder saturates at the full
        // remaining width rather than overflowing.
        let remaining_bits = 64 - u32::from(m_bits);
        let rank = if rest == 0 {
            remaining_bits + 1
        } else {
            (rest.trailing_zeros() + 1).min(remaining_bits)
        };
        #[allow(clippy::cast_possible_truncation)]
        let rank = rank as u8;
        if rank > self.registers[idx] {
            self.registers[idx] = rank;
        }
    }

    fn hash(member: &[u8]) -> u64 {
        let mut hasher = SipHasher13::new();
        hasher.write(member);
        hasher.finish()
    }

    /// Estimated cardinality, rounded to the nearest integer.
    #[must_use]
    pub fn cardinality(&self) -> u64 {
        let m = self.registers.len() as f64;
        let alpha_m = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };

        let sum_inv: f64 = self
            .registers
            .iter()
            .map(|&r| 2f64.powi(-i32::from(r)))
            .sum();
        let raw_estimate = alpha_m * m * m / sum_inv;

        let zero_registers = self.registers.iter().filter(|&&r| r == 0).count();
        let estimate = if raw_estimate <= 2.5 * m && zero_registers > 0 {
            #[allow(clippy::cast_precision_loss)]
            let zeros = zero_registers as f64;
            m * (m / zeros).ln()
        } else {
            raw_estimate
        };

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        {
            estimate.round().max(0.0) as u64
        }
    }

}
