use criterion::criterion_main;


criterion_main!(primitives::benches, sections::benches);
