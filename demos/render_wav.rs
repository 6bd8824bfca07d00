//! Offline render: a short chord written to a WAV file
//!
//! Run with: cargo run --example render_wav [out.wav]

use tonwerk::devices::MemoryDevice;
use tonwerk::nodes::OscillatorType;
use tonwerk::{encode_wav, AudioBuffer, Engine, NodeKind, ParamName, WavEncoding};

const SAMPLE_RATE: u32 = 48000;
const SECONDS: f64 = 3.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "chord.wav".into());

    let device = MemoryDevice::new(512);
    let mut engine = Engine::new(SAMPLE_RATE).with_device(device.clone());

    let bus = engine.create_node(NodeKind::Gain);
    {
        let g = engine.param_mut(bus, ParamName::Gain).ok_or("not a gain")?;
        g.set_value_at_time(0.0, 0.0);
        g.linear_ramp_to_value_at_time(0.3, 0.05);
        g.set_target_at_time(0.0, 2.0, 0.25);
    }

    for (i, hz) in [261.63, 329.63, 392.0].into_iter().enumerate() {
        let osc = engine.create_node(NodeKind::Oscillator);
        let panner = engine.create_node(NodeKind::Panner);

        let o = engine.oscillator_mut(osc).ok_or("not an oscillator")?;
        o.set_type(OscillatorType::Triangle);
        o.frequency_mut().set_value(hz);
        o.start(0.0);

        engine
            .param_mut(panner, ParamName::PositionX)
            .ok_or("not a panner")?
            .set_value(i as f32 * 2.0 - 2.0);

        engine.connect(osc, panner)?;
        engine.connect(panner, bus)?;
        engine.release(osc)?;
        engine.release(panner)?;
    }
    engine.connect(bus, engine.destination())?;
    engine.resume()?;

    while engine.current_time() < SECONDS {
        engine.tick();
    }

    let rendered = AudioBuffer::from_interleaved(device.take_recorded(), engine.channels(), SAMPLE_RATE)?;
    std::fs::write(&path, encode_wav(&rendered, WavEncoding::Pcm16)?)?;
    println!("wrote {:.2}s to {}", rendered.duration(), path);

    engine.shutdown();
    Ok(())
}
