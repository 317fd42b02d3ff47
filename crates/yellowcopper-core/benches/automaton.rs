//! Automaton throughput for the two scheduling strategies

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use yellowcopper_core::config::ScheduleStrategy;
use yellowcopper_core::world::{
    CHUNK_WIDTH, Cell, Chunk, ChunkCoord, ChunkMap, ChunkScheduler,
};
use yellowcopper_simulation::{MaterialId, MaterialTable};

/// Square of chunks with sand in the top half and water in the bottom quarter
fn mixed_chunks(radius: i32) -> ChunkMap {
    let mut chunks = ChunkMap::default();
    for coord in ChunkCoord::new(0, 0).square(radius) {
        let mut chunk = Chunk::new(coord);
        for y in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                let material = if y < CHUNK_WIDTH / 4 {
                    MaterialId::WATER
                } else if y >= CHUNK_WIDTH / 2 && (x + y) % 3 != 0 {
                    MaterialId::SAND
                } else {
                    continue;
                };
                chunk.set_cell(x, y, Cell::new(material, [200, 180, 90, 255]));
            }
        }
        chunks.insert(coord, chunk);
    }
    chunks
}

fn bench_scheduler(c: &mut Criterion) {
    let materials = MaterialTable::builtin();
    let mut group = c.benchmark_group("scheduler");
    group.sample_size(20);

    for strategy in [ScheduleStrategy::WorkSet, ScheduleStrategy::Checkerboard] {
        for threads in [1, 4] {
            let scheduler = ChunkScheduler::new(threads, strategy).unwrap();
            let id = BenchmarkId::new(format!("{strategy:?}"), threads);
            group.bench_function(id, |b| {
                let mut chunks = mixed_chunks(3);
                let active: Vec<ChunkCoord> = chunks.keys().copied().collect();
                let mut tick = 0u64;
                b.iter(|| {
                    tick += 1;
                    black_box(scheduler.run(&mut chunks, &active, &materials, tick))
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_scheduler);
criterion_main!(benches);
