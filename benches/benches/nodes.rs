use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use brook_audio::{Mixer, Repeater};
use brook_pipe::{mock, Line, Pipe};

const BUFFER_SIZE: usize = 512;

fn mixer_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function("10_lines_100_frames", |b| {
        b.iter(|| {
            let mixer = Mixer::default();
            let mut lines = Vec::new();
            for index in 0..10 {
                lines.push(Line::new(
                    mock::Source {
                        sample_rate: 48_000,
                        channels: 1,
                        limit: 100 * BUFFER_SIZE,
                        value: index as f32 / 10.0,
                    }
                    .source(),
                    mixer.sink(),
                ));
            }
            lines.push(Line::new(mixer.source(), mock::Sink::discard().sink()));
            Pipe::new(BUFFER_SIZE, lines)
                .expect("bind")
                .run()
                .wait()
                .expect("run");
        });
    });

    group.finish();
}

fn repeater_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeater");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function("2_sinks_862_frames", |b| {
        b.iter(|| {
            let repeater = Repeater::default();
            let pipe = Pipe::new(
                BUFFER_SIZE,
                vec![
                    Line::new(
                        mock::Source {
                            sample_rate: 48_000,
                            channels: 2,
                            limit: 862 * BUFFER_SIZE,
                            value: 0.5,
                        }
                        .source(),
                        repeater.sink(),
                    ),
                    Line::new(repeater.source(), mock::Sink::discard().sink()),
                    Line::new(repeater.source(), mock::Sink::discard().sink()),
                ],
            )
            .expect("bind");
            pipe.run().wait().expect("run");
        });
    });

    group.finish();
}

criterion_group!(benches, mixer_fan_in, repeater_fan_out);
criterion_main!(benches);
