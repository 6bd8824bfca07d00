use std::f64::consts::TAU;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use tonwerk::devices::MemoryDevice;
use tonwerk::graph::MAX_INPUTS;
use tonwerk::nodes::{BiquadCoefficients, BiquadType, OscillatorType};
use tonwerk::param::MAX_EVENTS;
use tonwerk::{AudioBuffer, Engine, Error, NodeId, NodeKind, ParamName};

const RATE: u32 = 48000;

fn engine(block: usize) -> (Engine, MemoryDevice) {
    let device = MemoryDevice::new(block);
    let engine = Engine::new(RATE).with_channels(2).with_device(device.clone());
    (engine, device)
}

fn started_oscillator(engine: &mut Engine, hz: f32) -> NodeId {
    let osc = engine.create_node(NodeKind::Oscillator);
    let o = engine.oscillator_mut(osc).unwrap();
    o.frequency_mut().set_value(hz);
    o.start(0.0);
    osc
}

fn sample(recorded: &[f32], frame: usize, channel: usize) -> f32 {
    recorded[frame * 2 + channel]
}

fn refcount_sum(engine: &Engine) -> u32 {
    engine
        .graph()
        .ids()
        .map(|id| engine.refcount(id).unwrap())
        .sum()
}

#[test]
fn silent_graph() {
    let (mut engine, device) = engine(480);
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_eq!(out.len(), 480 * 2);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_abs_diff_eq!(engine.current_time(), 0.01, epsilon = 1e-12);
    assert_eq!(engine.generation(), 1);
}

#[test]
fn sine_through_gain() {
    let (mut engine, device) = engine(480);
    let osc = started_oscillator(&mut engine, 1000.0);
    let gain = engine.create_node(NodeKind::Gain);
    engine.param_mut(gain, ParamName::Gain).unwrap().set_value(0.5);

    engine.connect(osc, gain).unwrap();
    engine.connect(gain, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    for f in 0..480 {
        let expected = (0.5 * (TAU * 1000.0 * f as f64 / 48000.0).sin()) as f32;
        assert_abs_diff_eq!(sample(&out, f, 0), expected, epsilon = 1e-6);
        assert_eq!(sample(&out, f, 0), sample(&out, f, 1));
    }
}

#[test]
fn linear_ramp_on_gain() {
    let (mut engine, device) = engine(480);
    let osc = started_oscillator(&mut engine, 1000.0);
    let gain = engine.create_node(NodeKind::Gain);
    {
        let g = engine.param_mut(gain, ParamName::Gain).unwrap();
        g.set_value_at_time(0.0, 0.0);
        g.linear_ramp_to_value_at_time(1.0, 1.0);
        assert_abs_diff_eq!(g.value_at(0.5), 0.5, epsilon = 1e-6);
    }
    engine.connect(osc, gain).unwrap();
    engine.connect(gain, engine.destination()).unwrap();
    engine.resume().unwrap();

    for _ in 0..51 {
        engine.tick();
    }
    let out = device.recorded();
    assert_eq!(out.len(), 51 * 480 * 2);

    // a sine peak a quarter period past t = 0.5
    let f = 24000 + 12;
    let t = f as f64 / 48000.0;
    let gain_at = t as f32;
    assert_abs_diff_eq!(sample(&out, f, 0), gain_at, epsilon = 1e-4);
    // barely audible at the start of the ramp
    assert_abs_diff_eq!(sample(&out, 12, 0), 12.0 / 48000.0, epsilon = 1e-6);
}

#[test]
fn looping_buffer_playback() {
    let (mut engine, device) = engine(480);
    let ramp: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
    let buffer = Arc::new(AudioBuffer::from_interleaved(ramp, 1, RATE).unwrap());

    let src = engine.create_node(NodeKind::BufferSource);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.set_buffer(Some(buffer));
        s.set_loop(true);
        s.set_loop_region(0.0, 0.0);
        s.start(0.0, None, None);
    }
    engine.connect(src, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_abs_diff_eq!(sample(&out, 150, 0), 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 150, 1), 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 250, 0), 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 42, 0), 0.42, epsilon = 1e-5);
}

#[test]
fn biquad_lowpass_impulse_response() {
    let (mut engine, device) = engine(512);
    let mut impulse = vec![0.0f32; 1024];
    impulse[0] = 1.0;
    let buffer = Arc::new(AudioBuffer::from_interleaved(impulse, 1, RATE).unwrap());

    let src = engine.create_node(NodeKind::BufferSource);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.set_buffer(Some(buffer));
        s.start(0.0, None, None);
    }
    let filter = engine.create_node(NodeKind::Biquad);
    {
        let b = engine.biquad_mut(filter).unwrap();
        b.set_type(BiquadType::Lowpass);
        b.frequency_mut().set_value(1000.0);
        b.q_mut().set_value(0.707);
    }
    engine.connect(src, filter).unwrap();
    engine.connect(filter, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let c = BiquadCoefficients::design(BiquadType::Lowpass, 48000.0, 1000.0, 0.707f32 as f64, 0.0);
    assert_eq!(engine.biquad_mut(filter).unwrap().coefficients(), c);

    let out = device.recorded();
    let y0 = c.b0;
    let y1 = c.b1 - c.a1 * y0;
    let y2 = c.b2 - c.a1 * y1 - c.a2 * y0;
    assert_abs_diff_eq!(sample(&out, 0, 0), y0 as f32, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 1, 0), y1 as f32, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 2, 0), y2 as f32, epsilon = 1e-6);

    let energies: Vec<f32> = (0..8)
        .map(|w| (0..64).map(|i| sample(&out, w * 64 + i, 0).powi(2)).sum())
        .collect();
    for pair in energies[1..].windows(2) {
        assert!(pair[1] <= pair[0], "tail energy rose: {:?}", energies);
    }
}

#[test]
fn disconnect_releases_refs() {
    let (mut engine, _device) = engine(128);
    let osc = engine.create_node(NodeKind::Oscillator);
    let gain = engine.create_node(NodeKind::Gain);
    let dest = engine.destination();

    engine.connect(osc, gain).unwrap();
    engine.connect(gain, dest).unwrap();
    assert_eq!(engine.refcount(osc), Some(2));
    assert_eq!(engine.refcount(gain), Some(2));

    engine.disconnect(osc, gain).unwrap();
    engine.release(osc).unwrap();
    assert!(!engine.contains(osc));

    // still wired into the destination
    engine.release(gain).unwrap();
    assert!(engine.contains(gain));

    engine.disconnect(gain, dest).unwrap();
    assert!(!engine.contains(gain));
    assert_eq!(engine.node_count(), 1);
}

#[test]
fn releasing_a_script_reference_keeps_connected_nodes_alive() {
    let (mut engine, device) = engine(64);
    let osc = started_oscillator(&mut engine, 440.0);
    engine.connect(osc, engine.destination()).unwrap();
    engine.release(osc).unwrap();
    assert!(engine.contains(osc));

    engine.resume().unwrap();
    engine.tick();
    assert!(device.recorded().iter().any(|&s| s != 0.0));
}

#[test]
fn refcounts_are_conserved() {
    let (mut engine, _device) = engine(64);
    let nodes: Vec<_> = [
        NodeKind::Oscillator,
        NodeKind::Gain,
        NodeKind::Biquad,
        NodeKind::Analyser,
        NodeKind::Panner,
    ]
    .iter()
    .map(|&k| engine.create_node(k))
    .collect();
    let created = nodes.len() as u32 + 1;
    let dest = engine.destination();

    let edges = [
        (nodes[0], nodes[1]),
        (nodes[1], nodes[2]),
        (nodes[2], nodes[3]),
        (nodes[3], nodes[4]),
        (nodes[4], dest),
        (nodes[0], dest),
        (nodes[1], dest),
    ];
    for &(a, b) in &edges {
        engine.connect(a, b).unwrap();
    }
    assert_eq!(refcount_sum(&engine), created + edges.len() as u32);

    engine.disconnect(nodes[0], dest).unwrap();
    engine.disconnect(nodes[2], nodes[3]).unwrap();
    assert_eq!(refcount_sum(&engine), created + edges.len() as u32 - 2);
}

#[test]
fn shared_input_renders_once_per_tick() {
    let (mut engine, _device) = engine(128);
    let osc = started_oscillator(&mut engine, 220.0);
    let a = engine.create_node(NodeKind::Gain);
    let b = engine.create_node(NodeKind::Gain);
    let dest = engine.destination();
    engine.connect(osc, a).unwrap();
    engine.connect(osc, b).unwrap();
    engine.connect(a, dest).unwrap();
    engine.connect(b, dest).unwrap();
    engine.resume().unwrap();

    for n in 1..=3 {
        engine.tick();
        for id in [osc, a, b, dest] {
            let node = engine.node(id).unwrap();
            assert_eq!(node.render_count(), n);
            assert_eq!(node.last_rendered_generation(), engine.generation());
        }
    }
}

#[test]
fn cycles_render_each_node_once() {
    let (mut engine, _device) = engine(64);
    let a = engine.create_node(NodeKind::Gain);
    let b = engine.create_node(NodeKind::Gain);
    engine.connect(a, b).unwrap();
    engine.connect(b, a).unwrap();
    engine.connect(b, engine.destination()).unwrap();
    engine.resume().unwrap();

    engine.tick();
    engine.tick();
    assert_eq!(engine.node(a).unwrap().render_count(), 2);
    assert_eq!(engine.node(b).unwrap().render_count(), 2);
}

#[test]
fn capacity_bounds() {
    let (mut engine, _device) = engine(64);
    let dest = engine.destination();
    for _ in 0..MAX_INPUTS + 3 {
        let osc = engine.create_node(NodeKind::Oscillator);
        engine.connect(osc, dest).unwrap();
    }
    assert_eq!(engine.graph().input_count(dest), MAX_INPUTS);

    let gain = engine.create_node(NodeKind::Gain);
    let p = engine.param_mut(gain, ParamName::Gain).unwrap();
    for i in 0..MAX_EVENTS * 2 {
        p.linear_ramp_to_value_at_time(1.0, (MAX_EVENTS * 2 - i) as f64);
    }
    assert_eq!(p.events().len(), MAX_EVENTS);
    assert!(p.events().windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn transport_is_monotonic_and_output_is_bounded() {
    let (mut engine, device) = engine(300);
    let dest = engine.destination();
    for hz in [100.0, 250.0, 333.0, 1000.0] {
        let osc = started_oscillator(&mut engine, hz);
        engine.oscillator_mut(osc).unwrap().set_type(OscillatorType::Square);
        engine.connect(osc, dest).unwrap();
    }
    engine.resume().unwrap();

    let mut last = engine.current_time();
    for _ in 0..10 {
        engine.tick();
        assert!(engine.current_time() >= last);
        last = engine.current_time();
    }
    let out = device.recorded();
    assert!(out.iter().all(|s| s.abs() <= 1.0));
    assert!(out.iter().any(|&s| s == 1.0 || s == -1.0));
}

#[test]
fn oscillator_is_silent_before_start() {
    let (mut engine, device) = engine(480);
    let osc = engine.create_node(NodeKind::Oscillator);
    engine.oscillator_mut(osc).unwrap().set_type(OscillatorType::Square);
    engine.oscillator_mut(osc).unwrap().start(0.005);
    engine.connect(osc, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert!((0..240).all(|f| sample(&out, f, 0) == 0.0));
    assert_eq!(sample(&out, 240, 0), 1.0);
}

#[test]
fn oscillator_stops_at_stop_time() {
    let (mut engine, device) = engine(480);
    let osc = started_oscillator(&mut engine, 100.0);
    engine.oscillator_mut(osc).unwrap().set_type(OscillatorType::Square);
    engine.oscillator_mut(osc).unwrap().stop(0.005);
    engine.connect(osc, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_eq!(sample(&out, 0, 0), 1.0);
    assert!((240..480).all(|f| sample(&out, f, 0) == 0.0));
}

#[test]
fn zero_frame_buffer_is_silent() {
    let (mut engine, device) = engine(128);
    let src = engine.create_node(NodeKind::BufferSource);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.set_buffer(Some(Arc::new(AudioBuffer::new(2, RATE, 0).unwrap())));
        s.set_loop(true);
        s.start(0.0, None, None);
    }
    engine.connect(src, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();
    assert!(device.recorded().iter().all(|&s| s == 0.0));
}

#[test]
fn analyser_captures_time_domain_bytes() {
    let (mut engine, _device) = engine(256);
    let osc = started_oscillator(&mut engine, 1000.0);
    engine.oscillator_mut(osc).unwrap().set_type(OscillatorType::Square);
    let analyser = engine.create_node(NodeKind::Analyser);
    engine.analyser_mut(analyser).unwrap().set_fft_size(1000);
    assert_eq!(engine.analyser(analyser).unwrap().fft_size(), 2048);

    engine.analyser_mut(analyser).unwrap().set_fft_size(256);
    engine.connect(osc, analyser).unwrap();
    engine.connect(analyser, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let a = engine.analyser(analyser).unwrap();
    let mut bytes = vec![0u8; 256];
    a.get_byte_time_domain_data(&mut bytes);
    assert_eq!(bytes[0], 255);
    assert_eq!(bytes[30], 0);
    assert!(a.frequency_bytes().iter().all(|&b| b == 0));
    assert_eq!(a.frequency_bytes().len(), 128);
}

#[test]
fn panner_at_listener_is_centered() {
    let (mut engine, device) = engine(128);
    let src = engine.create_node(NodeKind::BufferSource);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.set_buffer(Some(Arc::new(AudioBuffer::from_interleaved(vec![1.0; 256], 1, RATE).unwrap())));
        s.start(0.0, None, None);
    }
    let panner = engine.create_node(NodeKind::Panner);
    engine.connect(src, panner).unwrap();
    engine.connect(panner, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.take_recorded();
    let centered = std::f32::consts::FRAC_1_SQRT_2;
    assert_abs_diff_eq!(sample(&out, 10, 0), centered, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 10, 1), centered, epsilon = 1e-6);

    // hard right at distance 5
    engine.param_mut(panner, ParamName::PositionX).unwrap().set_value(5.0);
    engine.tick();
    let out = device.take_recorded();
    assert_abs_diff_eq!(sample(&out, 10, 0), 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 10, 1), 1.0 / 6.0, epsilon = 1e-6);
}

#[test]
fn lifecycle() {
    let (mut engine, device) = engine(64);
    assert!(!engine.is_running());
    engine.tick();
    assert_eq!(device.pushes(), 0);

    engine.resume().unwrap();
    engine.tick();
    engine.suspend();
    engine.tick();
    assert_eq!(device.pushes(), 1);

    engine.resume().unwrap();
    device.set_valid(false);
    engine.tick();
    assert_eq!(device.pushes(), 1);
    assert_eq!(engine.generation(), 1);

    device.set_valid(true);
    device.set_block_frames(0);
    engine.tick();
    assert_eq!(device.pushes(), 1);

    engine.close();
    assert!(engine.is_closed());
    assert!(!engine.is_running());
    assert!(matches!(engine.resume(), Err(Error::Closed)));
    engine.shutdown();
}

#[test]
fn resume_adopts_device_configuration() {
    let device = MemoryDevice::new(441).with_sample_rate(44100);
    let mut engine = Engine::new(RATE).with_device(device.clone());
    engine.resume().unwrap();
    assert_eq!(engine.sample_rate(), 44100);

    engine.tick();
    assert_abs_diff_eq!(engine.current_time(), 0.01, epsilon = 1e-12);
}

#[test]
fn resume_fails_when_device_cannot_open() {
    let mut engine = Engine::new(RATE).with_device(MemoryDevice::unavailable(64));
    assert!(matches!(engine.resume(), Err(Error::DeviceUnavailable(_))));
    assert!(!engine.is_running());
}

#[test]
fn destination_cannot_be_released() {
    let (mut engine, _device) = engine(64);
    let dest = engine.destination();
    assert!(matches!(engine.release(dest), Err(Error::BadArgument(_))));
    assert!(engine.contains(dest));
}

#[test]
fn wrong_kind_accessors_are_none() {
    let (mut engine, _device) = engine(64);
    let gain = engine.create_node(NodeKind::Gain);
    assert!(engine.oscillator_mut(gain).is_none());
    assert!(engine.param_mut(gain, ParamName::Frequency).is_none());
    assert!(engine.param_mut(gain, ParamName::Gain).is_some());
}

#[test]
fn disconnect_all_removes_every_edge() {
    let (mut engine, _device) = engine(64);
    let osc = engine.create_node(NodeKind::Oscillator);
    let a = engine.create_node(NodeKind::Gain);
    let b = engine.create_node(NodeKind::Gain);
    engine.connect(osc, a).unwrap();
    engine.connect(osc, b).unwrap();
    assert_eq!(engine.refcount(osc), Some(3));

    engine.disconnect_all(osc).unwrap();
    assert_eq!(engine.refcount(osc), Some(1));
    assert!(engine.graph().inputs(a).is_empty());
    assert!(engine.graph().inputs(b).is_empty());
}

fn bound_source(engine: &mut Engine, samples: Vec<f32>) -> NodeId {
    let buffer = Arc::new(AudioBuffer::from_interleaved(samples, 1, RATE).unwrap());
    let src = engine.create_node(NodeKind::BufferSource);
    engine.buffer_source_mut(src).unwrap().set_buffer(Some(buffer));
    src
}

#[test]
fn buffer_source_offset_duration_and_rate() {
    let (mut engine, device) = engine(480);
    let ramp: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
    let src = bound_source(&mut engine, ramp);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.playback_rate_mut().set_value(2.0);
        // 48 frames in, for 96 frames of transport time
        s.start(0.0, Some(0.001), Some(0.002));
    }
    engine.connect(src, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_abs_diff_eq!(sample(&out, 0, 0), 0.048, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 10, 0), 0.068, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 10, 1), 0.068, epsilon = 1e-5);
    assert_abs_diff_eq!(sample(&out, 95, 0), 0.238, epsilon = 1e-5);
    assert!((96..480).all(|f| sample(&out, f, 0) == 0.0));
}

#[test]
fn buffer_source_stops_at_stop_time() {
    let (mut engine, device) = engine(480);
    let ramp: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
    let src = bound_source(&mut engine, ramp);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.start(0.0, None, None);
        s.stop(0.001);
    }
    engine.connect(src, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_abs_diff_eq!(sample(&out, 40, 0), 0.040, epsilon = 1e-5);
    assert!((48..480).all(|f| sample(&out, f, 0) == 0.0));
}

#[test]
fn last_buffer_frame_holds_instead_of_fading() {
    let (mut engine, device) = engine(16);
    let src = bound_source(&mut engine, vec![0.0, 1.0]);
    {
        let s = engine.buffer_source_mut(src).unwrap();
        s.playback_rate_mut().set_value(0.5);
        s.start(0.0, None, None);
    }
    engine.connect(src, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    let out = device.recorded();
    assert_abs_diff_eq!(sample(&out, 1, 0), 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 2, 0), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(sample(&out, 3, 0), 1.0, epsilon = 1e-6);
    assert!((6..16).all(|f| sample(&out, f, 0) == 0.0));
}

#[test]
fn biquad_state_carries_across_quanta() {
    let noise: Vec<f32> = (0..1024)
        .map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0)
        .collect();

    let render = |block: usize, ticks: usize| {
        let (mut engine, device) = engine(block);
        let src = bound_source(&mut engine, noise.clone());
        engine.buffer_source_mut(src).unwrap().start(0.0, None, None);
        let filter = engine.create_node(NodeKind::Biquad);
        {
            let b = engine.biquad_mut(filter).unwrap();
            b.set_type(BiquadType::Lowpass);
            b.frequency_mut().set_value(1000.0);
            b.q_mut().set_value(4.0);
        }
        engine.connect(src, filter).unwrap();
        engine.connect(filter, engine.destination()).unwrap();
        engine.resume().unwrap();
        for _ in 0..ticks {
            engine.tick();
        }
        device.take_recorded()
    };

    let whole = render(512, 1);
    let halves = render(256, 2);
    assert_eq!(whole.len(), halves.len());
    for (a, b) in whole.iter().zip(&halves) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn exponential_ramp_drives_gain_during_a_tick() {
    let (mut engine, device) = engine(480);
    let src = bound_source(&mut engine, vec![1.0; 2048]);
    engine.buffer_source_mut(src).unwrap().start(0.0, None, None);
    let gain = engine.create_node(NodeKind::Gain);
    {
        let g = engine.param_mut(gain, ParamName::Gain).unwrap();
        g.set_value_at_time(1.0, 0.0);
        g.exponential_ramp_to_value_at_time(0.25, 0.01);
    }
    engine.connect(src, gain).unwrap();
    engine.connect(gain, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();
    engine.tick();

    let out = device.recorded();
    for f in [0, 120, 240, 360, 479] {
        let expected = 0.25f32.powf(f as f32 / 480.0);
        assert_abs_diff_eq!(sample(&out, f, 0), expected, epsilon = 1e-5);
    }
    assert_abs_diff_eq!(sample(&out, 240, 1), 0.5, epsilon = 1e-5);
    // holds the end value once the ramp is over
    assert_abs_diff_eq!(sample(&out, 700, 0), 0.25, epsilon = 1e-6);
}

#[test]
fn unallocatable_quantum_is_a_no_op_tick() {
    let (mut engine, device) = engine(480);
    let osc = started_oscillator(&mut engine, 440.0);
    engine.connect(osc, engine.destination()).unwrap();
    engine.resume().unwrap();

    // too many bytes to ever reserve
    device.set_block_frames(usize::MAX / 4);
    engine.tick();
    // frames × channels overflows
    device.set_block_frames(usize::MAX);
    engine.tick();
    assert_eq!(device.pushes(), 0);
    assert_eq!(engine.current_time(), 0.0);
    assert_eq!(engine.generation(), 0);

    device.set_block_frames(480);
    engine.tick();
    assert_eq!(device.pushes(), 1);
    assert_abs_diff_eq!(engine.current_time(), 0.01, epsilon = 1e-12);
}

#[test]
fn destination_survives_losing_its_connection_reference() {
    let (mut engine, device) = engine(64);
    let dest = engine.destination();
    let gain = engine.create_node(NodeKind::Gain);

    engine.connect(dest, gain).unwrap();
    engine.release(dest).unwrap();
    engine.disconnect(dest, gain).unwrap();
    assert!(engine.contains(dest));
    assert_eq!(engine.refcount(dest), Some(1));
    assert!(matches!(engine.release(dest), Err(Error::BadArgument(_))));

    engine.resume().unwrap();
    engine.tick();
    assert_eq!(device.pushes(), 1);
    assert!(engine.current_time() > 0.0);
}

#[test]
fn engine_without_a_device_still_advances() {
    let mut engine = Engine::new(RATE);
    let osc = started_oscillator(&mut engine, 440.0);
    engine.connect(osc, engine.destination()).unwrap();
    engine.resume().unwrap();
    for _ in 0..3 {
        engine.tick();
    }
    assert_eq!(engine.generation(), 3);
    assert_abs_diff_eq!(engine.current_time(), 3.0 * 512.0 / 48000.0, epsilon = 1e-12);
}

#[test]
fn biquad_renders_at_tiny_sample_rates() {
    let device = MemoryDevice::new(8);
    let mut engine = Engine::new(20).with_device(device.clone());
    let osc = started_oscillator(&mut engine, 3.0);
    let filter = engine.create_node(NodeKind::Biquad);
    engine.connect(osc, filter).unwrap();
    engine.connect(filter, engine.destination()).unwrap();
    engine.resume().unwrap();
    engine.tick();

    assert_eq!(device.pushes(), 1);
    assert!(device.recorded().iter().all(|s| s.is_finite()));
}
