use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use rusty_soundlow::backend::MemoryBackend;
use rusty_soundlow::{
    ErrorKind, PcmParams, SoundDriver, StreamState, WaveOut, WaveSource, MAX_WAVE_SOURCES,
};

fn memory_driver(real: PcmParams) -> (SoundDriver, MemoryBackend) {
    let backend = MemoryBackend::new().with_playback_params(real);
    (SoundDriver::new(Box::new(backend.clone())), backend)
}

fn constant_mono16(value: i16) -> Box<dyn WaveSource> {
    Box::new(move |_rate: u16, buf: &mut [u8]| -> usize {
        for sample in buf.chunks_exact_mut(2) {
            sample.copy_from_slice(&value.to_le_bytes());
        }
        buf.len()
    })
}

fn samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|s| i16::from_le_bytes([s[0], s[1]]))
        .collect()
}

#[test]
fn mixed_sources_reach_the_device_in_real_format() {
    let (mut driver, backend) = memory_driver(PcmParams::new(22050, 16, 2));
    let waveout = driver.open_waveout("default");
    assert!(backend.is_playback_open());

    waveout.set_params(PcmParams::new(22050, 16, 1)).unwrap();
    waveout.register_source(constant_mono16(3000)).unwrap();
    waveout.register_source(constant_mono16(-1000)).unwrap();
    waveout.start().unwrap();

    waveout.output_period(64).unwrap();
    assert_eq!(samples(&backend.played()), vec![2000i16; 32]);
}

#[test]
fn fourth_source_is_rejected_with_capacity_error() {
    let (mut driver, _backend) = memory_driver(PcmParams::default());
    let waveout = driver.open_waveout("default");
    waveout.set_params(PcmParams::default()).unwrap();

    for _ in 0..MAX_WAVE_SOURCES {
        waveout.register_source(constant_mono16(0)).unwrap();
    }
    let err = waveout.register_source(constant_mono16(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);

    // No slot left for the packet queue either
    let err = waveout
        .send_wave_packet(&[0; 4], &PcmParams::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
}

#[test]
fn unregistered_source_leaves_the_mix() {
    let (mut driver, backend) = memory_driver(PcmParams::new(11025, 16, 1));
    let waveout = driver.open_waveout("default");
    waveout.set_params(PcmParams::new(11025, 16, 1)).unwrap();

    let keep = waveout.register_source(constant_mono16(100)).unwrap();
    let drop_me = waveout.register_source(constant_mono16(50)).unwrap();
    waveout.output_period(4).unwrap();
    waveout.unregister_source(drop_me);
    waveout.output_period(4).unwrap();
    waveout.unregister_source(keep);
    waveout.output_period(4).unwrap();

    assert_eq!(samples(&backend.played()), vec![150, 150, 100, 100, 0, 0]);
}

#[test]
fn upsampled_output_has_the_requested_length() {
    let (mut driver, backend) = memory_driver(PcmParams::new(44100, 16, 2));
    let waveout = driver.open_waveout("default");
    waveout.set_params(PcmParams::new(11025, 8, 1)).unwrap();
    waveout
        .register_source(Box::new(|_rate: u16, buf: &mut [u8]| -> usize {
            buf.fill(0x80);
            buf.len()
        }))
        .unwrap();

    let period = waveout.packet_size();
    waveout.output_period(period).unwrap();
    let played = backend.played();
    assert_eq!(played.len(), period);
    assert!(played.iter().all(|&b| b == 0));
}

#[test]
fn packets_pushed_from_another_thread_play_in_order() {
    let params = PcmParams::default();
    let (mut driver, backend) = memory_driver(params);
    let waveout: Arc<dyn WaveOut> = driver.open_waveout("default");
    waveout.set_params(params).unwrap();
    waveout.start().unwrap();

    let packets: Vec<Vec<u8>> = (0..40u8)
        .map(|n| {
            let value = 0x0101u16 * (n as u16 % 100 + 1);
            value.to_le_bytes().repeat(100)
        })
        .collect();
    let expected: Vec<u8> = packets.concat();

    let producer = {
        let waveout = Arc::clone(&waveout);
        let packets = packets.clone();
        thread::spawn(move || {
            for packet in &packets {
                waveout.send_wave_packet(packet, &params).unwrap();
                thread::yield_now();
            }
        })
    };
    let consumer = {
        let waveout = Arc::clone(&waveout);
        thread::spawn(move || {
            for _ in 0..50 {
                waveout.output_period(400).unwrap();
                thread::yield_now();
            }
        })
    };
    producer.join().unwrap();
    consumer.join().unwrap();

    for _ in 0..expected.len() / 400 + 1 {
        waveout.output_period(400).unwrap();
    }
    let audible: Vec<u8> = backend.played().into_iter().filter(|&b| b != 0).collect();
    assert_eq!(audible, expected);
    assert_eq!(waveout.state(), StreamState::Streaming);
}

#[test]
fn closed_output_fails_and_reopens() {
    let (mut driver, backend) = memory_driver(PcmParams::default());
    let waveout = driver.open_waveout("default");
    waveout.close();
    assert!(!backend.is_playback_open());

    let mut out = [0x55u8; 8];
    let err = waveout.pull_and_deliver(&mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(out, [0u8; 8]);

    waveout.open("default").unwrap();
    assert_eq!(waveout.state(), StreamState::Open);
}
