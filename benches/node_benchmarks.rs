use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tonwerk::devices::MemoryDevice;
use tonwerk::{Engine, NodeKind, ParamName};

fn engine_with(block: usize) -> (Engine, MemoryDevice) {
    let device = MemoryDevice::new(block);
    let engine = Engine::new(48000).with_device(device.clone());
    (engine, device)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("Oscillator -> Gain -> Destination, 480 frames", |b| {
        let (mut engine, device) = engine_with(480);
        let osc = engine.create_node(NodeKind::Oscillator);
        let gain = engine.create_node(NodeKind::Gain);
        engine.oscillator_mut(osc).unwrap().start(0.0);
        engine.param_mut(gain, ParamName::Gain).unwrap().set_value(0.5);
        engine.connect(osc, gain).unwrap();
        engine.connect(gain, engine.destination()).unwrap();
        engine.resume().unwrap();

        b.iter(|| {
            engine.tick();
            black_box(device.take_recorded());
        })
    });

    c.bench_function("8 oscillators -> Biquad -> Panner, 512 frames", |b| {
        let (mut engine, device) = engine_with(512);
        let biquad = engine.create_node(NodeKind::Biquad);
        let panner = engine.create_node(NodeKind::Panner);
        let mix = engine.create_node(NodeKind::Gain);
        for i in 0..8 {
            let osc = engine.create_node(NodeKind::Oscillator);
            let o = engine.oscillator_mut(osc).unwrap();
            o.frequency_mut().set_value(110.0 * (i + 1) as f32);
            o.start(0.0);
            engine.connect(osc, engine.destination()).unwrap();
            if i == 0 {
                engine.connect(osc, mix).unwrap();
            }
        }
        engine.connect(mix, biquad).unwrap();
        engine.connect(biquad, panner).unwrap();
        engine.connect(panner, engine.destination()).unwrap();
        engine
            .param_mut(biquad, ParamName::Frequency)
            .unwrap()
            .linear_ramp_to_value_at_time(4000.0, 10.0);
        engine.resume().unwrap();

        b.iter(|| {
            engine.tick();
            black_box(device.take_recorded());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
