// Quick demonstration of the event store and project persistence
// Run with: cargo run --bin demo_project_persistence

use mymusic_timeline::command::{InsertNoteCommand, InsertPartCommand};
use mymusic_timeline::part::{ChannelChoice, ChannelFilter};
use mymusic_timeline::project::store_part;
use mymusic_timeline::sequencer::note::{MAX_NOTE, MIN_NOTE};
use mymusic_timeline::{
    ChangeDispatcher, CommandManager, ControlType, PlaybackEvent, ProjectManager,
    SequencerPlayer, Song, StoreConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎵 MyMusic Timeline - Event Store Demo");
    println!("======================================");

    let config = StoreConfig::default();
    let dispatcher = ChangeDispatcher::new();
    dispatcher.subscribe(|notification: &mymusic_timeline::Notification| {
        println!("   🔔 {:?}", notification);
    });
    let mut song = Song::from_config("Demo Song", &config, dispatcher);
    let mut history = CommandManager::from_config(&config);

    // A short riff, edited through undoable commands
    let riff = song.create_part("Riff");
    for (i, note) in [60, 64, 67, 72].iter().enumerate() {
        let command =
            InsertNoteCommand::new(riff, ChannelChoice::Auto, i as u32 * 192, 192, *note, 0, 0.8);
        history.execute(Box::new(command), &mut song)?;
    }
    song.get_part_mut(riff)?
        .insert_control(0, ControlType::Program, 0.1)?;

    let lead = song.create_track("Lead");
    history.execute(Box::new(InsertPartCommand::new(lead, 0, riff)), &mut song)?;
    history.execute(Box::new(InsertPartCommand::new(lead, 1536, riff)), &mut song)?;

    println!("\n✅ Created song: {}", song.name());
    let notes = song
        .get_part(riff)?
        .list_notes(ChannelFilter::All, 0, 1536, MIN_NOTE, MAX_NOTE, false);
    println!("   - Notes in riff: {}", notes.len());
    println!("   - Placements: {}", song.list_part_links(riff).len());
    println!("   - Undo steps: {}", history.undo_count());
    println!("\n📨 Notifications:");
    song.dispatcher().dispatch();

    println!("\n📝 Event storage of the riff:\n{}", store_part(song.get_part(riff)?));

    // Undo the second placement, then redo it
    println!("↩️  Undo: {}", history.undo(&mut song)?);
    println!("   - Placements: {}", song.list_part_links(riff).len());
    println!("↪️  Redo: {}", history.redo(&mut song)?);
    song.dispatcher().dispatch();

    // Play the first bar in 96-tick blocks
    println!("\n▶️  Playback of the first bar:");
    if let Some(track) = song.track(lead) {
        let mut player = SequencerPlayer::new();
        let mut tick = 0;
        while tick < 768 {
            for event in player.process(track.shared(), tick, 96) {
                if let PlaybackEvent::NoteOn {
                    tick,
                    note,
                    frequency,
                    ..
                } = event
                {
                    println!("   - tick {:>4}: note {} ({:.2} Hz)", tick, note, frequency);
                }
            }
            tick += 96;
        }
    }

    // Save and load back
    let manager = ProjectManager::new();
    let project_path = std::env::temp_dir().join("demo_timeline.mymusic");
    manager.save_project(&song, &project_path)?;
    println!("\n💾 Saved project to: {}", project_path.display());
    println!("   - File size: {} bytes", std::fs::metadata(&project_path)?.len());

    let loaded = manager.load_project(&project_path, ChangeDispatcher::new())?;
    println!("\n📂 Loaded project successfully:");
    println!("   - Name: {}", loaded.song.name());
    println!("   - Version: {}", loaded.manifest.version);
    println!("   - Notes: {}", loaded.report.notes);
    println!("   - Controls: {}", loaded.report.controls);
    println!("   - Placements: {}", loaded.report.parts);

    assert_eq!(
        store_part(song.get_part(riff)?),
        store_part(loaded.song.get_part(riff)?)
    );
    println!("\n✅ Data integrity verified - stored events match!");

    std::fs::remove_file(&project_path)?;
    println!("🧹 Cleaned up demo file");
    Ok(())
}
