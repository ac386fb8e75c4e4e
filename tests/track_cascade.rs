// Integration test: song, tracks and part destruction
//
// Placement lookups, the destroy cascade and what the player sees afterwards.

use mymusic_timeline::messaging::{Notification, RingSink, create_notification_channel};
use mymusic_timeline::part::ChannelChoice;
use mymusic_timeline::{ChangeDispatcher, PlaybackEvent, SequencerPlayer, Song};
use ringbuf::traits::Consumer;

fn two_part_song() -> (Song, u32, u32, u32) {
    let mut song = Song::new("cascade", ChangeDispatcher::new());
    let a = song.create_part("A");
    let b = song.create_part("B");
    song.get_part_mut(a)
        .unwrap()
        .insert_note(ChannelChoice::Auto, 0, 96, 60, 0, 1.0)
        .unwrap();
    song.get_part_mut(b)
        .unwrap()
        .insert_note(ChannelChoice::Auto, 0, 96, 67, 0, 1.0)
        .unwrap();
    let track = song.create_track("Lead");
    song.place_part(track, 0, a).unwrap();
    song.place_part(track, 384, b).unwrap();
    (song, track, a, b)
}

#[test]
fn test_lookup_falls_back_after_destroy() {
    let (mut song, track, a, b) = two_part_song();

    let found = song.track(track).unwrap().lookup_tick(500).unwrap();
    assert_eq!(found.part_id(), b);
    assert_eq!(found.tick, 384);

    song.destroy_part(b).unwrap();

    let found = song.track(track).unwrap().lookup_tick(500).unwrap();
    assert_eq!(found.part_id(), a);
    assert_eq!(found.tick, 0);
    assert_eq!(song.track(track).unwrap().len(), 1);
    assert!(song.list_part_links(b).is_empty());
    assert!(song.destroy_part(b).is_err());
}

#[test]
fn test_destroy_notifies_subscribers() {
    let (mut song, track, _a, b) = two_part_song();
    let (producer, mut consumer) = create_notification_channel(64);
    song.dispatcher().subscribe(RingSink::new(producer));
    song.dispatcher().dispatch();
    while consumer.try_pop().is_some() {}

    song.destroy_part(b).unwrap();
    song.dispatcher().dispatch();

    let mut received = Vec::new();
    while let Some(notification) = consumer.try_pop() {
        received.push(notification);
    }
    assert!(received.contains(&Notification::TrackChanged { track }));
    assert!(received.iter().all(|n| n.part() != Some(b)));
}

#[test]
fn test_player_follows_placements() {
    let (mut song, track, _a, b) = two_part_song();
    let shared = song.track(track).unwrap().shared().clone();

    let mut player = SequencerPlayer::new();
    let events = player.process(&shared, 0, 768);
    let notes: Vec<i32> = events
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::NoteOn { note, .. } => Some(*note),
            _ => None,
        })
        .collect();
    assert_eq!(notes, vec![60, 67]);

    song.destroy_part(b).unwrap();
    player.reset();

    let events = player.process(&shared, 0, 768);
    let on_ticks: Vec<u32> = events
        .iter()
        .filter(|event| matches!(event, PlaybackEvent::NoteOn { .. }))
        .map(PlaybackEvent::tick)
        .collect();
    assert_eq!(on_ticks, vec![0]);
}
