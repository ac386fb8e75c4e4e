use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mymusic_timeline::part::{ChannelChoice, ChannelFilter, Part};
use mymusic_timeline::project::{restore_part, store_part};
use mymusic_timeline::sequencer::note::{MAX_NOTE, MIN_NOTE};
use mymusic_timeline::{ChangeDispatcher, ControlType, SequencerPlayer, Song};

/// Add `n_notes` notes on a sixteenth grid, four voices deep
fn fill(part: &mut Part, n_notes: u32) {
    for i in 0..n_notes {
        let tick = (i / 4) * 96;
        part.insert_note(ChannelChoice::Auto, tick, 384, 36 + (i % 48) as i32, 0, 0.8)
            .unwrap();
        if i % 16 == 0 {
            part.insert_control(tick, ControlType::PitchBend, 0.5)
                .unwrap();
        }
    }
}

fn filled_part(n_notes: u32) -> Part {
    let mut part = Part::new(1, "bench", ChangeDispatcher::new());
    fill(&mut part, n_notes);
    part
}

/// Benchmark note insertion into a growing part
fn bench_insert_note(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_note");

    for n_notes in [100u32, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(n_notes),
            &n_notes,
            |b, &n| {
                b.iter(|| black_box(filled_part(n)));
            },
        );
    }
    group.finish();
}

/// Benchmark range queries (editor redraws)
fn bench_list_notes(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_notes");
    let part = filled_part(10_000);

    for crossing in [false, true] {
        group.bench_with_input(
            BenchmarkId::from_parameter(if crossing { "crossing" } else { "within" }),
            &crossing,
            |b, &crossing| {
                b.iter(|| {
                    black_box(part.list_notes(
                        ChannelFilter::All,
                        black_box(96_000),
                        1536,
                        MIN_NOTE,
                        MAX_NOTE,
                        crossing,
                    ))
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the player over a whole song in small blocks (real-time path)
fn bench_player_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("player_process");

    for block in [32u32, 128, 512] {
        let mut song = Song::new("bench", ChangeDispatcher::new());
        let part = song.create_part("loop");
        fill(song.get_part_mut(part).unwrap(), 256);
        let track = song.create_track("main");
        for bar in 0..8 {
            song.place_part(track, bar * 6144, part).unwrap();
        }
        let shared = song.track(track).unwrap().shared().clone();

        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &block| {
            let mut player = SequencerPlayer::new();
            b.iter(|| {
                let mut tick = 0;
                while tick < 8 * 6144 {
                    black_box(player.process(&shared, tick, block));
                    tick += block;
                }
                player.reset();
            });
        });
    }
    group.finish();
}

/// Benchmark event storage text generation and parsing
fn bench_storage(c: &mut Criterion) {
    let part = filled_part(2_000);
    let text = store_part(&part);

    c.bench_function("store_part_2000", |b| {
        b.iter(|| black_box(store_part(&part)));
    });

    c.bench_function("restore_part_2000", |b| {
        b.iter(|| {
            let mut target = Part::new(2, "restore", ChangeDispatcher::new());
            black_box(restore_part(&mut target, &text).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_insert_note,
    bench_list_notes,
    bench_player_process,
    bench_storage
);
criterion_main!(benches);
