// Integration test: Stability under concurrent playback
//
// An editor thread keeps rewriting a part while a player thread reads the
// same track through try_read only. Neither side may panic or see torn data.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use mymusic_timeline::part::ChannelChoice;
use mymusic_timeline::{ChangeDispatcher, PlaybackEvent, SequencerPlayer, Song};

const BLOCK_TICKS: u32 = 48;
const LOOP_TICKS: u32 = 1536;

/// Short stability test - suitable for CI
#[test]
fn test_stability_short() {
    run_stability_test(Duration::from_secs(2), "short (2 s)");
}

/// Long stability test - run manually for full validation
/// This test is marked as `#[ignore]` by default - run with: cargo test --test stability -- --ignored
#[test]
#[ignore]
fn test_stability_long() {
    run_stability_test(Duration::from_secs(60 * 5), "long (5 min)");
}

fn run_stability_test(duration: Duration, test_name: &str) {
    println!("\n=== Stability Test ({}) ===", test_name);

    let mut song = Song::new("stability", ChangeDispatcher::new());
    let part = song.create_part("loop");
    let track = song.create_track("main");
    song.place_part(track, 0, part).unwrap();
    song.place_part(track, LOOP_TICKS, part).unwrap();
    let shared = song.track(track).unwrap().shared().clone();

    let running = Arc::new(AtomicBool::new(true));
    let blocks = Arc::new(AtomicU64::new(0));

    let player_thread = {
        let running = Arc::clone(&running);
        let blocks = Arc::clone(&blocks);
        thread::spawn(move || {
            let mut player = SequencerPlayer::new();
            let mut tick = 0u32;
            let mut note_ons = 0u64;
            while running.load(Ordering::Relaxed) {
                let events = player.process(&shared, tick, BLOCK_TICKS);
                let mut last = 0;
                for event in &events {
                    assert!(event.tick() >= last, "events out of order");
                    last = event.tick();
                    if let PlaybackEvent::NoteOn { tick: on, .. } = event {
                        assert!((tick..tick + BLOCK_TICKS).contains(on));
                        note_ons += 1;
                    }
                }
                tick += BLOCK_TICKS;
                if tick >= 2 * LOOP_TICKS {
                    tick = 0;
                    player.stop_all_notes(tick);
                }
                blocks.fetch_add(1, Ordering::Relaxed);
            }
            note_ons
        })
    };

    let start_time = Instant::now();
    let mut edits = 0u64;
    let mut step = 0u32;
    while start_time.elapsed() < duration {
        let p = song.get_part_mut(part).unwrap();
        let tick = (step * 24) % LOOP_TICKS;
        let note = 48 + (step % 24) as i32;
        match p.insert_note(ChannelChoice::Auto, tick, 96, note, 0, 0.8) {
            Ok(id) => {
                if step % 3 == 0 {
                    p.delete_event(id).unwrap();
                }
            }
            Err(e) => panic!("insert failed: {}", e),
        }
        if step % 50 == 49 {
            for victim in p.list_notes_crossing(0, LOOP_TICKS) {
                p.delete_event(victim.id).unwrap();
            }
        }
        song.dispatcher().dispatch();
        edits += 1;
        step = step.wrapping_add(1);
    }

    running.store(false, Ordering::Relaxed);
    let note_ons = player_thread.join().expect("player thread panicked");

    println!("Edits: {}", edits);
    println!("Blocks processed: {}", blocks.load(Ordering::Relaxed));
    println!("Notes triggered: {}", note_ons);
    println!("Elapsed: {:?}", start_time.elapsed());

    assert!(edits > 0);
    assert!(blocks.load(Ordering::Relaxed) > 0);
    println!("✅ Stability test passed");
}
