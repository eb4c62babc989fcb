use brook_audio::{MixError, Mixer};
use brook_pipe::{mock, Line, Pipe};

fn producer(limit: usize, value: f32) -> mock::Source {
    mock::Source {
        sample_rate: 44_100,
        channels: 1,
        limit,
        value,
    }
}

/// Runs `generators` through one mixer and returns the mixed channel.
fn mix(buffer_size: usize, generators: &[(usize, f32)]) -> Vec<f32> {
    let mixer = Mixer::default();
    let mut lines = Vec::new();
    for &(limit, value) in generators {
        lines.push(Line::new(producer(limit, value).source(), mixer.sink()));
    }
    let output = mock::Sink::new();
    lines.push(Line::new(mixer.source(), output.sink()));
    Pipe::new(buffer_size, lines)
        .expect("bind")
        .run()
        .wait()
        .expect("run");
    if output.messages() == 0 {
        Vec::new()
    } else {
        output.channel(0)
    }
}

#[test]
fn single_producer_is_identity() {
    assert_eq!(mix(2, &[(4, 0.7)]), vec![0.7; 4]);
}

#[test]
fn two_producers_same_length() {
    let mean = (0.7f32 + 0.5) / 2.0;
    assert_eq!(mix(2, &[(6, 0.7), (6, 0.5)]), vec![mean; 6]);
}

#[test]
fn longer_producer_keeps_streaming_after_flush() {
    let mean = (0.7f32 + 0.5) / 2.0;
    let mut expected = vec![mean; 12];
    expected.extend_from_slice(&[0.7; 4]);
    assert_eq!(mix(2, &[(16, 0.7), (12, 0.5)]), expected);
}

#[test]
fn full_frames_after_flush_divide_by_live_count() {
    let mean = (0.5f32 + 0.7) / 2.0;
    let mut expected = vec![mean; 8];
    expected.extend_from_slice(&[0.5, 0.5]);
    assert_eq!(mix(2, &[(10, 0.5), (8, 0.7)]), expected);
}

#[test]
fn tail_frame_after_flush() {
    let mean = (0.5f32 + 0.7) / 2.0;
    assert_eq!(mix(2, &[(5, 0.5), (4, 0.7)]), vec![mean, mean, mean, mean, 0.5]);
}

#[test]
fn producers_that_never_send_yield_empty_stream() {
    assert_eq!(mix(2, &[(0, 0.0), (0, 0.0)]), Vec::<f32>::new());
}

#[test]
fn hundred_producer_lines() {
    let mixer = Mixer::default();
    let mut lines = Vec::new();
    for index in 0..100 {
        lines.push(Line::new(
            producer(100 * 512, index as f32 / 100.0).source(),
            mixer.sink(),
        ));
    }
    let output = mock::Sink::discard();
    lines.push(Line::new(mixer.source(), output.sink()));
    Pipe::new(512, lines)
        .expect("bind")
        .run()
        .wait()
        .expect("run");
    assert_eq!(output.messages(), 100);
    assert_eq!(output.samples(), 100 * 512);
}

#[test]
fn rejects_different_sample_rates() {
    let mixer = Mixer::default();
    let clashing = mock::Source {
        sample_rate: 48_000,
        channels: 1,
        limit: 4,
        value: 0.1,
    };
    let err = Pipe::new(
        2,
        vec![
            Line::new(producer(4, 0.1).source(), mixer.sink()),
            Line::new(clashing.source(), mixer.sink()),
        ],
    )
    .expect_err("second sink must be rejected");
    assert!(matches!(
        err.downcast_ref::<MixError>(),
        Some(MixError::DifferentSampleRates)
    ));
}

#[test]
fn rejects_different_channel_counts() {
    let mixer = Mixer::default();
    let clashing = mock::Source {
        sample_rate: 44_100,
        channels: 2,
        limit: 4,
        value: 0.1,
    };
    let err = Pipe::new(
        2,
        vec![
            Line::new(producer(4, 0.1).source(), mixer.sink()),
            Line::new(clashing.source(), mixer.sink()),
        ],
    )
    .expect_err("second sink must be rejected");
    assert!(matches!(
        err.downcast_ref::<MixError>(),
        Some(MixError::DifferentChannels)
    ));
}

#[test]
fn rejects_source_bound_before_sink() {
    let mixer = Mixer::default();
    let output = mock::Sink::discard();
    let err = Pipe::new(2, vec![Line::new(mixer.source(), output.sink())])
        .expect_err("source must not bind first");
    assert!(matches!(
        err.downcast_ref::<MixError>(),
        Some(MixError::SourceBeforeSink)
    ));
}

#[test]
fn stereo_signals_mix_per_channel() {
    let mixer = Mixer::default();
    let stereo = |value: f32| mock::Source {
        sample_rate: 44_100,
        channels: 2,
        limit: 8,
        value,
    };
    let output = mock::Sink::new();
    Pipe::new(
        4,
        vec![
            Line::new(stereo(0.2).source(), mixer.sink()),
            Line::new(stereo(0.6).source(), mixer.sink()),
            Line::new(mixer.source(), output.sink()),
        ],
    )
    .expect("bind")
    .run()
    .wait()
    .expect("run");
    let mean = (0.2f32 + 0.6) / 2.0;
    assert_eq!(output.channel(0), vec![mean; 8]);
    assert_eq!(output.channel(1), vec![mean; 8]);
}
