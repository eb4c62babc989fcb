use brook_audio::{source, Asset, Track};
use brook_pipe::{mock, Line, Pipe};
use brook_signal::Audio;

#[test]
fn captures_a_line_into_memory() {
    let asset = Asset::default();
    Pipe::new(
        4,
        vec![Line::new(
            mock::Source {
                sample_rate: 48_000,
                channels: 2,
                limit: 10,
                value: 0.25,
            }
            .source(),
            asset.sink(),
        )],
    )
    .expect("bind")
    .run()
    .wait()
    .expect("run");

    assert_eq!(asset.sample_rate(), Some(48_000));
    let audio = asset.audio().expect("flush publishes the capture");
    assert_eq!(audio.channels(), 2);
    assert_eq!(audio.len(), 10);
    assert_eq!(audio.plane(1), vec![0.25; 10].as_slice());
}

#[test]
fn captured_audio_replays_through_a_source() {
    let ramp = Audio::from_planes(vec![(0..9).map(|v| v as f32).collect()]);
    let asset = Asset::default();
    Pipe::new(
        2,
        vec![Line::new(source(44_100, ramp.clone()), asset.sink())],
    )
    .expect("bind")
    .run()
    .wait()
    .expect("run");

    let captured = asset.audio().expect("flush publishes the capture");
    let replay = mock::Sink::new();
    Pipe::new(
        4,
        vec![Line::new(source(44_100, captured.slice(2, 7)), replay.sink())],
    )
    .expect("bind")
    .run()
    .wait()
    .expect("run");
    assert_eq!(replay.channel(0), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn captured_audio_feeds_a_track() {
    let asset = Asset::default();
    Pipe::new(
        4,
        vec![Line::new(
            mock::Source {
                sample_rate: 44_100,
                channels: 1,
                limit: 6,
                value: 0.5,
            }
            .source(),
            asset.sink(),
        )],
    )
    .expect("bind")
    .run()
    .wait()
    .expect("run");

    let captured = asset.audio().expect("flush publishes the capture");
    let mut track = Track::new(44_100, 1);
    track.add_clip(2, captured.slice(0, 3));

    let sink = mock::Sink::new();
    Pipe::new(2, vec![Line::new(track.source(0, 0), sink.sink())])
        .expect("bind")
        .run()
        .wait()
        .expect("run");
    assert_eq!(sink.channel(0), vec![0.0, 0.0, 0.5, 0.5, 0.5]);
}
