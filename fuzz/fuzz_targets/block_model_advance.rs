#![no_main]

use libfuzzer_sys::fuzz_target;

use wasim_core::block::{
    BlockConfig, BlockOccupancyModel, InitialDistribution, OccupancyBucket, VictimStrategy,
};
use wasim_core::buffer::{BufferConfig, BufferOccupancyModel, EvictionStrategy};

/// Input layout:
/// - byte 0: units per block (1..=32)
/// - byte 1: strategy bits (bit 0 block, bit 1 buffer)
/// - byte 2: advance count
/// - bytes 3..11: seed
/// - rest: one byte per physical block, occupancy modulo `U + 1`
fn block_config(data: &[u8]) -> Option<(BlockConfig, BufferConfig, usize)> {
    if data.len() < 12 {
        return None;
    }
    let units = usize::from(data[0] % 32) + 1;
    let seed = u64::from_le_bytes(data[3..11].try_into().ok()?);
    let occupancy: Vec<usize> = data[11..]
        .iter()
        .take(64)
        .map(|&b| usize::from(b) % (units + 1))
        .collect();

    let block = BlockConfig {
        units_per_block: units,
        physical_blocks: occupancy.len() as u64,
        strategy: if data[1] & 1 == 0 {
            VictimStrategy::LeastUsed
        } else {
            VictimStrategy::WeightedRandom
        },
        seed,
        warmup_iterations: 0,
        initial_distribution: InitialDistribution::Explicit {
            buckets: occupancy
                .iter()
                .map(|&used| OccupancyBucket { used, blocks: 1 })
                .collect(),
        },
    };
    let buffer = BufferConfig {
        candidates: occupancy.len() as u64,
        capacity: units as u64,
        max_size: units + 1,
        strategy: if data[1] & 2 == 0 {
            EvictionStrategy::GreedyLargest
        } else {
            EvictionStrategy::WeightedRandomNonzero
        },
        seed,
        warmup_iterations: 0,
    };
    Some((block, buffer, usize::from(data[2])))
}

fuzz_target!(|data: &[u8]| {
    let Some((block, buffer, steps)) = block_config(data) else {
        return;
    };

    // All-full layouts are rejected at construction; anything accepted must
    // run without tripping an invariant.
    if let Ok(mut model) = BlockOccupancyModel::new(&block) {
        let used = model.used_units();
        for _ in 0..steps {
            let outcome = model.advance();
            assert!(outcome.victim.is_some_and(|v| v < block.units_per_block));
        }
        assert!(model.check_invariants().is_ok());
        assert_eq!(model.blocks_by_used().weighted_sum(), used);
    }

    if let Ok(mut model) = BufferOccupancyModel::new(&buffer) {
        for _ in 0..steps {
            model.advance();
        }
        assert!(model.check_invariants().is_ok());
        assert_eq!(
            model.buffered_units() + model.free_capacity(),
            buffer.capacity
        );
    }
});
