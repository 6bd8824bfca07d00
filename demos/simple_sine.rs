//! Simple example: play a sine wave on the default output device
//!
//! Run with: cargo run --example simple_sine --features cpal_sink
//!
//! Plays a 440Hz sine that fades in over two seconds while its pitch sweeps
//! slowly through a lowpass filter.

use std::thread::sleep;
use std::time::Duration;

use tonwerk::devices::CpalDevice;
use tonwerk::{Engine, NodeKind, ParamName};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    for device in CpalDevice::list_outputs() {
        println!("found output: {}", device.name());
    }
    let device = CpalDevice::default_output().ok_or("No audio device")?;
    println!("Using: {}", device.name());

    let mut engine = Engine::new(48000).with_device(device);

    let osc = engine.create_node(NodeKind::Oscillator);
    let filter = engine.create_node(NodeKind::Biquad);
    let gain = engine.create_node(NodeKind::Gain);

    {
        let o = engine.oscillator_mut(osc).ok_or("not an oscillator")?;
        o.frequency_mut().set_value_at_time(220.0, 0.0);
        o.frequency_mut().exponential_ramp_to_value_at_time(880.0, 8.0);
        o.start(0.0);
    }
    engine
        .param_mut(filter, ParamName::Frequency)
        .ok_or("not a filter")?
        .set_value(1200.0);
    {
        let g = engine.param_mut(gain, ParamName::Gain).ok_or("not a gain")?;
        g.set_value_at_time(0.0, 0.0);
        g.linear_ramp_to_value_at_time(0.25, 2.0);
    }

    engine.connect(osc, filter)?;
    engine.connect(filter, gain)?;
    engine.connect(gain, engine.destination())?;
    engine.resume()?;

    println!("Playing... Ctrl+C to stop");
    while engine.current_time() < 10.0 {
        engine.tick();
        sleep(Duration::from_micros(500));
    }

    engine.shutdown();
    Ok(())
}
