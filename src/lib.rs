//! Dense-mode HyperLogLog storage with 4 bits per register.
//!
//! This crate implements the HLL_4 register array used by the dense mode of a
//! HyperLogLog cardinality sketch. Each of the K = 2^lg_config_k registers
//! tracks the maximum value it has ever been offered, compressed into a single
//! nibble by subtracting a moving minimum (`cur_min`). Values that no longer
//! fit the 4-bit window relative to `cur_min` overflow into an open-addressed
//! auxiliary table ([`AuxTable`]).
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a
//! value (6 bits). The slot identifies which register to update, and the value
//! represents the number of leading zeros in the hash plus one.
//!
//! # Collaborators
//!
//! The surrounding sketch (mode promotion, sparse modes, union operators, the
//! composite estimator) lives outside this crate. The update path reports each
//! accepted register transition through an [`EstimatorHook`] so the enclosing
//! sketch can maintain its HIP / kxq accumulators; [`HipEstimator`] is a
//! ready-made implementation.

use std::hash::Hash;

mod array4;
mod aux_table;
mod error;
mod estimator;
mod serialization;

// Re-export public API
pub use array4::{Hll4Array, RegisterIter};
pub use aux_table::{AuxIter, AuxTable, FindResult};
pub use error::{Error, ErrorKind};
pub use estimator::{EstimatorHook, HipEstimator};
pub use serialization::HLL_BYTE_ARR_START;

/// Result type returned by fallible operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

// Constants
const RESIZE_NUMER: u32 = 3; // Resize at 3/4 = 75% load factor
const RESIZE_DENOM: u32 = 4;

/// Smallest supported register count exponent
pub const MIN_LG_K: u8 = 7;

/// Largest supported register count exponent
pub const MAX_LG_K: u8 = 21;

/// Starting aux table size exponent, indexed by lg_config_k
const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, // 0 - 9
    4, 4, 5, 5, 6, 7, 8, 9, 10, 11, // 10 - 19
    12, 13, // 20 - 21
];

/// Extract slot number (low 26 bits) from a coupon or pair word
#[inline]
pub fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from a coupon or pair word
#[inline]
pub fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
pub fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Hash an item into a coupon with the library-standard murmur3 seed.
pub fn coupon<H: Hash>(v: H) -> u32 {
    const DEFAULT_SEED: u32 = 9001;

    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_SEED);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();

    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    value << KEY_BITS_26 | addr26
}

#[inline]
fn lg_aux_arr_ints(lg_config_k: u8) -> u8 {
    LG_AUX_ARR_INTS[lg_config_k as usize]
}

/// Smallest aux table exponent that keeps `count` entries under the resize
/// threshold, floored at the starting size for this lg_config_k.
fn compute_lg_arr_ints(count: u32, lg_config_k: u8) -> u8 {
    let mut ceil_pwr2 = count.next_power_of_two();
    if RESIZE_DENOM * count > RESIZE_NUMER * ceil_pwr2 {
        ceil_pwr2 <<= 1;
    }
    let lg = ceil_pwr2.trailing_zeros() as u8;
    lg.max(lg_aux_arr_ints(lg_config_k))
}
