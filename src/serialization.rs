//! Binary serialization for the dense HLL_4 register array
//!
//! The wire image is the standard dense-mode HLL envelope: a 40-byte
//! preamble, the packed nibble array, then the aux image. The aux image has
//! two forms: compact (only the occupied pair words) and updatable (the
//! whole slot array, holes included). Pair words are little-endian.

use byteorder::{LE, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::array4::Hll4Array;
use crate::aux_table::{AuxTable, PAIR_EMPTY};
use crate::error::Error;
use crate::{
    MAX_LG_K, MIN_LG_K, Result, compute_lg_arr_ints, get_slot, get_value, lg_aux_arr_ints,
};

const PREAMBLE_INTS_BYTE: usize = 0;
const SER_VER_BYTE: usize = 1;
const FAMILY_BYTE: usize = 2;
const LG_K_BYTE: usize = 3;
const LG_ARR_BYTE: usize = 4;
const FLAGS_BYTE: usize = 5;
const HLL_CUR_MIN_BYTE: usize = 6;
const MODE_BYTE: usize = 7;
const NUM_AT_CUR_MIN_INT: usize = 32;
const AUX_COUNT_INT: usize = 36;

/// Offset of the packed nibble array within the dense-mode image
pub const HLL_BYTE_ARR_START: usize = 40;

const HLL_PREINTS: u8 = 10;
const SER_VER: u8 = 1;
const HLL_FAMILY_ID: u8 = 7;

/// Flag: aux image is in compact form
const COMPACT_FLAG_MASK: u8 = 8;

/// Mode byte: low 2 bits = HLL mode (2), bits 2-3 = HLL_4 target (0)
const MODE_HLL_HLL4: u8 = 2;

impl Hll4Array {
    /// Serialize to the dense-mode wire image.
    ///
    /// The accumulator doubles at bytes 8..32 belong to the enclosing sketch
    /// and are written as zero.
    pub fn serialize(&self, compact: bool) -> Vec<u8> {
        let num_bytes = self.hll_byte_arr_bytes();
        let aux_image_bytes = if compact {
            self.compact_aux_bytes()
        } else {
            self.updatable_aux_bytes()
        };
        let mut bytes = vec![0u8; HLL_BYTE_ARR_START + num_bytes + aux_image_bytes];

        bytes[PREAMBLE_INTS_BYTE] = HLL_PREINTS;
        bytes[SER_VER_BYTE] = SER_VER;
        bytes[FAMILY_BYTE] = HLL_FAMILY_ID;
        bytes[LG_K_BYTE] = self.lg_config_k();
        bytes[LG_ARR_BYTE] = self
            .aux()
            .map_or(lg_aux_arr_ints(self.lg_config_k()), AuxTable::lg_size);
        if compact {
            bytes[FLAGS_BYTE] |= COMPACT_FLAG_MASK;
        }
        bytes[HLL_CUR_MIN_BYTE] = self.cur_min();
        bytes[MODE_BYTE] = MODE_HLL_HLL4;

        bytes[NUM_AT_CUR_MIN_INT..NUM_AT_CUR_MIN_INT + 4]
            .copy_from_slice(&self.num_at_cur_min().to_le_bytes());
        let aux_count = self.aux().map_or(0, AuxTable::count);
        bytes[AUX_COUNT_INT..AUX_COUNT_INT + 4].copy_from_slice(&aux_count.to_le_bytes());

        bytes[HLL_BYTE_ARR_START..HLL_BYTE_ARR_START + num_bytes].copy_from_slice(self.raw_bytes());

        if let Some(aux) = self.aux() {
            let mut offset = HLL_BYTE_ARR_START + num_bytes;
            for &pair in aux.raw_slots() {
                if compact && pair == PAIR_EMPTY {
                    continue;
                }
                bytes[offset..offset + 4].copy_from_slice(&pair.to_le_bytes());
                offset += 4;
            }
        }

        bytes
    }

    /// Deserialize a dense-mode wire image produced by [`Hll4Array::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Hll4Array> {
        let make_error = |tag: &'static str| move |_| Error::insufficient_data(tag);
        let mut cursor = Cursor::new(bytes);

        let preamble_ints = cursor.read_u8().map_err(make_error("preamble_ints"))?;
        let ser_ver = cursor.read_u8().map_err(make_error("ser_ver"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let lg_config_k = cursor.read_u8().map_err(make_error("lg_config_k"))?;
        let lg_arr = cursor.read_u8().map_err(make_error("lg_arr"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let cur_min = cursor.read_u8().map_err(make_error("cur_min"))?;
        let mode = cursor.read_u8().map_err(make_error("mode"))?;

        if family_id != HLL_FAMILY_ID {
            return Err(Error::deserial(format!(
                "invalid family: expected {HLL_FAMILY_ID} (HLL), got {family_id}"
            )));
        }
        if ser_ver != SER_VER {
            return Err(Error::deserial(format!(
                "unsupported serial version: expected {SER_VER}, got {ser_ver}"
            )));
        }
        if preamble_ints != HLL_PREINTS {
            return Err(Error::deserial(format!(
                "invalid preamble ints: expected {HLL_PREINTS}, got {preamble_ints}"
            )));
        }
        if mode != MODE_HLL_HLL4 {
            return Err(Error::deserial(format!(
                "unsupported mode byte: expected {MODE_HLL_HLL4} (HLL/HLL_4), got {mode}"
            )));
        }
        if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
            return Err(Error::deserial(format!(
                "invalid lg_config_k: {lg_config_k}, must be in [{MIN_LG_K}, {MAX_LG_K}]"
            )));
        }

        // Accumulator doubles maintained by the enclosing sketch
        for tag in ["hip_accum", "kxq0", "kxq1"] {
            cursor.read_f64::<LE>().map_err(make_error(tag))?;
        }

        let num_at_cur_min = cursor
            .read_u32::<LE>()
            .map_err(make_error("num_at_cur_min"))?;
        let aux_count = cursor.read_u32::<LE>().map_err(make_error("aux_count"))?;

        let mut nibbles = vec![0u8; 1 << (lg_config_k - 1)];
        cursor
            .read_exact(&mut nibbles)
            .map_err(make_error("hll_byte_arr"))?;

        let aux = if aux_count > 0 {
            let aux_start = cursor.position() as usize;
            let src_compact = flags & COMPACT_FLAG_MASK != 0;
            Some(AuxTable::deserialize(
                &bytes[aux_start..],
                lg_config_k,
                aux_count,
                lg_arr,
                src_compact,
            )?)
        } else {
            None
        };

        Ok(Hll4Array::from_raw_parts(
            lg_config_k,
            nibbles.into_boxed_slice(),
            cur_min,
            num_at_cur_min,
            aux,
        ))
    }
}

impl AuxTable {
    /// Rebuild an aux table from its wire image.
    ///
    /// Compact images carry `aux_count` pair words and the table size is
    /// recomputed from the count; updatable images carry `1 << lg_aux_arr_ints`
    /// words, empties included.
    pub fn deserialize(
        bytes: &[u8],
        lg_config_k: u8,
        aux_count: u32,
        lg_aux_arr_ints: u8,
        src_compact: bool,
    ) -> Result<AuxTable> {
        // Early compact images did not record the array size, so recompute it
        let lg_arr_ints = if src_compact {
            compute_lg_arr_ints(aux_count, lg_config_k)
        } else {
            lg_aux_arr_ints
        };

        let mut aux = AuxTable::new(lg_arr_ints, lg_config_k);
        let config_k_mask = (1u32 << lg_config_k) - 1;
        let mut cursor = Cursor::new(bytes);

        if src_compact {
            if bytes.len() < aux_count as usize * 4 {
                return Err(Error::insufficient_data("compact aux image"));
            }
            for _ in 0..aux_count {
                let pair = cursor
                    .read_u32::<LE>()
                    .map_err(|_| Error::insufficient_data("compact aux image"))?;
                aux.must_add(get_slot(pair) & config_k_mask, get_value(pair))?;
            }
        } else {
            let items_to_read = 1usize << lg_aux_arr_ints;
            if bytes.len() < items_to_read * 4 {
                return Err(Error::insufficient_data("updatable aux image"));
            }
            for _ in 0..items_to_read {
                let pair = cursor
                    .read_u32::<LE>()
                    .map_err(|_| Error::insufficient_data("updatable aux image"))?;
                if pair == PAIR_EMPTY {
                    continue;
                }
                aux.must_add(get_slot(pair) & config_k_mask, get_value(pair))?;
            }
        }

        if aux.count() != aux_count {
            return Err(
                Error::corruption("deserialized aux table has wrong number of entries")
                    .with_context("expected", aux_count)
                    .with_context("actual", aux.count()),
            );
        }

        Ok(aux)
    }
}
