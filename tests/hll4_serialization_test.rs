use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use hll4_dense::{
    AuxTable, EstimatorHook, HLL_BYTE_ARR_START, Hll4Array, pack_coupon,
};

struct NoopHook;

impl EstimatorHook for NoopHook {
    fn on_value_change(&mut self, _old_value: u8, _new_value: u8) {}
}

fn register_pairs(arr: &Hll4Array) -> Vec<(u32, u8)> {
    arr.iter().collect()
}

fn sorted_aux_pairs(arr: &Hll4Array) -> Vec<(u32, u8)> {
    let mut pairs: Vec<(u32, u8)> = arr.aux_iter().collect();
    pairs.sort_unstable();
    pairs
}

fn assert_same_state(restored: &Hll4Array, original: &Hll4Array) {
    assert_eq!(restored.lg_config_k(), original.lg_config_k());
    assert_eq!(restored.cur_min(), original.cur_min());
    assert_eq!(restored.num_at_cur_min(), original.num_at_cur_min());
    assert_eq!(register_pairs(restored), register_pairs(original));
    assert_eq!(sorted_aux_pairs(restored), sorted_aux_pairs(original));
}

#[test]
fn test_round_trip_without_aux() {
    let mut arr = Hll4Array::new(7);
    for slot in 0..100 {
        arr.coupon_update(pack_coupon(slot, (slot % 13 + 1) as u8), &mut NoopHook)
            .unwrap();
    }
    assert!(arr.aux().is_none());

    for compact in [true, false] {
        let restored = Hll4Array::deserialize(&arr.serialize(compact)).unwrap();
        assert_same_state(&restored, &arr);
        assert!(restored.aux().is_none());
    }
}

#[test]
fn test_round_trip_with_grown_aux() {
    let mut arr = Hll4Array::new(7);
    // Ten exceptions push the aux table through its first doubling
    for i in 0..10u32 {
        arr.coupon_update(pack_coupon(i * 3, (20 + i) as u8), &mut NoopHook)
            .unwrap();
    }
    let aux = arr.aux().unwrap();
    assert_eq!(aux.count(), 10);
    assert_eq!(aux.lg_size(), 4);

    for compact in [true, false] {
        let bytes = arr.serialize(compact);
        let restored = Hll4Array::deserialize(&bytes).unwrap();
        assert_same_state(&restored, &arr);
        assert_eq!(restored.aux().unwrap().count(), 10);
    }
}

#[test]
fn test_serialized_sizes() {
    let mut arr = Hll4Array::new(7);
    for i in 0..5u32 {
        arr.coupon_update(pack_coupon(i * 7, (15 + i) as u8), &mut NoopHook)
            .unwrap();
    }

    let compact = arr.serialize(true);
    assert_eq!(
        compact.len(),
        HLL_BYTE_ARR_START + arr.hll_byte_arr_bytes() + 4 * 5
    );

    let updatable = arr.serialize(false);
    assert_eq!(updatable.len(), arr.updatable_serialization_bytes());
    assert_eq!(
        updatable.len(),
        HLL_BYTE_ARR_START
            + arr.hll_byte_arr_bytes()
            + arr.aux().unwrap().updatable_size_bytes()
    );
}

#[test]
fn test_randomized_round_trips() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    for lg_config_k in [7u8, 8, 10] {
        let k = 1u32 << lg_config_k;
        let mut arr = Hll4Array::new(lg_config_k);
        for _ in 0..(k * 20) {
            let c = pack_coupon(rng.random_range(0..k), rng.random_range(1..=63u8));
            arr.coupon_update(c, &mut NoopHook).unwrap();
        }

        for compact in [true, false] {
            let restored = Hll4Array::deserialize(&arr.serialize(compact)).unwrap();
            assert_same_state(&restored, &arr);
        }
    }
}

#[test]
fn test_aux_table_image_stands_alone() {
    // The aux image can be reloaded through the table-level entry point the
    // enclosing sketch uses
    let mut aux = AuxTable::new(3, 7);
    for slot in [4u32, 9, 77, 120] {
        aux.must_add(slot, 15 + (slot % 40) as u8).unwrap();
    }

    let mut compact_image = Vec::new();
    for (slot, value) in aux.iter() {
        compact_image.extend_from_slice(&pack_coupon(slot, value).to_le_bytes());
    }
    let restored =
        AuxTable::deserialize(&compact_image, 7, aux.count(), aux.lg_size(), true).unwrap();
    assert_eq!(restored.count(), aux.count());
    for (slot, value) in aux.iter() {
        assert_eq!(restored.must_find_value_for(slot).unwrap(), value);
    }

    // An updatable image may scatter its pairs anywhere; only non-empty
    // words count
    let mut updatable_image = vec![0u8; 16 * 4];
    for (i, (slot, value)) in aux.iter().enumerate() {
        let word = pack_coupon(slot, value).to_le_bytes();
        updatable_image[i * 20..i * 20 + 4].copy_from_slice(&word);
    }
    let restored = AuxTable::deserialize(&updatable_image, 7, aux.count(), 4, false).unwrap();
    assert_eq!(restored.count(), aux.count());
    for (slot, value) in aux.iter() {
        assert_eq!(restored.must_find_value_for(slot).unwrap(), value);
    }
}
