// Event storage - text statements describing part events and track placements
//
// Parts are written as `(insert-notes <channel> (<tick> <duration> <note>
// [<fine_tune> [<velocity>]]) ...)` per channel plus one `(insert-controls
// (<tick> <type> <value>) ...)`. Tracks are written as `(insert-part <tick>
// :<part name>)`, quoted when the name is not a plain atom. Restoring parses
// the whole text first, then replays the statements through the normal
// insert operations.

use crate::part::{ChannelChoice, NoteEvent, Part};
use crate::sequencer::control::ControlType;
use crate::song::{Song, SongError};
use crate::track::{Track, TrackId};

/// Storage parse errors, with the 1-based line they were found on
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Line {line}: unbalanced parenthesis")]
    Unbalanced { line: usize },

    #[error("Line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error(transparent)]
    Song(#[from] SongError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// What a restore did with the statements it read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub notes: usize,
    pub controls: usize,
    pub parts: usize,
    /// Statements or items that were logged and ignored
    pub skipped: usize,
}

// Parsing

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Atom { text: String, line: usize },
    Str { text: String, line: usize },
    List { items: Vec<Expr>, line: usize },
}

impl Expr {
    fn line(&self) -> usize {
        match self {
            Self::Atom { line, .. } | Self::Str { line, .. } | Self::List { line, .. } => *line,
        }
    }
}

fn malformed(line: usize, message: impl Into<String>) -> StorageError {
    StorageError::Malformed {
        line,
        message: message.into(),
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    /// Skip whitespace and `;` comments
    fn skip_blank(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while self.chars.peek().is_some_and(|&c| c != '\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn read_all(&mut self) -> StorageResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        while let Some(expr) = self.read_expr()? {
            exprs.push(expr);
        }
        Ok(exprs)
    }

    fn read_expr(&mut self) -> StorageResult<Option<Expr>> {
        self.skip_blank();
        let line = self.line;
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };
        match c {
            '(' => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_blank();
                    match self.chars.peek() {
                        None => return Err(StorageError::Unbalanced { line }),
                        Some(')') => {
                            self.bump();
                            break;
                        }
                        Some(_) => items.extend(self.read_expr()?),
                    }
                }
                Ok(Some(Expr::List { items, line }))
            }
            ')' => Err(StorageError::Unbalanced { line }),
            '"' => {
                self.bump();
                let mut text = String::new();
                loop {
                    match self.bump() {
                        None => return Err(StorageError::UnterminatedString { line }),
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some(escaped) => text.push(escaped),
                            None => return Err(StorageError::UnterminatedString { line }),
                        },
                        Some(c) => text.push(c),
                    }
                }
                Ok(Some(Expr::Str { text, line }))
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                        break;
                    }
                    text.push(c);
                    self.bump();
                }
                Ok(Some(Expr::Atom { text, line }))
            }
        }
    }
}

fn atom<'e>(expr: &'e Expr, what: &str) -> StorageResult<&'e str> {
    match expr {
        Expr::Atom { text, .. } => Ok(text),
        other => Err(malformed(other.line(), format!("expected {}", what))),
    }
}

fn parse_u32(expr: &Expr, what: &str) -> StorageResult<u32> {
    let text = atom(expr, what)?;
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    };
    parsed.ok_or_else(|| malformed(expr.line(), format!("bad {} '{}'", what, text)))
}

fn parse_i32(expr: &Expr, what: &str) -> StorageResult<i32> {
    let text = atom(expr, what)?;
    text.parse()
        .map_err(|_| malformed(expr.line(), format!("bad {} '{}'", what, text)))
}

fn parse_f32(expr: &Expr, what: &str) -> StorageResult<f32> {
    let text = atom(expr, what)?;
    text.parse()
        .map_err(|_| malformed(expr.line(), format!("bad {} '{}'", what, text)))
}

/// Split a statement into its name and arguments
fn statement(expr: &Expr) -> StorageResult<(&str, &[Expr])> {
    match expr {
        Expr::List { items, line } => match items.split_first() {
            Some((head, args)) => Ok((atom(head, "statement name")?, args)),
            None => Err(malformed(*line, "empty statement")),
        },
        other => Err(malformed(other.line(), "expected a statement")),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NoteArgs {
    line: usize,
    tick: u32,
    duration: u32,
    note: i32,
    fine_tune: i32,
    velocity: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct ControlArgs {
    line: usize,
    tick: u32,
    name: String,
    value: f32,
}

#[derive(Debug, Clone, PartialEq)]
enum PartStatement {
    /// `None` channel places notes automatically
    Notes {
        channel: Option<usize>,
        notes: Vec<NoteArgs>,
    },
    Controls(Vec<ControlArgs>),
    Unknown {
        line: usize,
        name: String,
    },
}

fn note_args(line: usize, args: &[Expr]) -> StorageResult<NoteArgs> {
    if !(3..=5).contains(&args.len()) {
        return Err(malformed(line, "a note needs 3 to 5 values"));
    }
    Ok(NoteArgs {
        line,
        tick: parse_u32(&args[0], "tick")?,
        duration: parse_u32(&args[1], "duration")?,
        note: parse_i32(&args[2], "note")?,
        fine_tune: args.get(3).map_or(Ok(0), |e| parse_i32(e, "fine tune"))?,
        velocity: args.get(4).map_or(Ok(1.0), |e| parse_f32(e, "velocity"))?,
    })
}

fn control_args(line: usize, args: &[Expr]) -> StorageResult<ControlArgs> {
    if args.len() != 3 {
        return Err(malformed(line, "a control needs 3 values"));
    }
    Ok(ControlArgs {
        line,
        tick: parse_u32(&args[0], "tick")?,
        name: atom(&args[1], "control type")?.to_string(),
        value: parse_f32(&args[2], "control value")?,
    })
}

fn item_list(expr: &Expr) -> StorageResult<(usize, &[Expr])> {
    match expr {
        Expr::List { items, line } => Ok((*line, items)),
        other => Err(malformed(other.line(), "expected a parenthesized item")),
    }
}

fn parse_part(text: &str) -> StorageResult<Vec<PartStatement>> {
    let mut statements = Vec::new();
    for expr in Reader::new(text).read_all()? {
        let line = expr.line();
        let (name, args) = statement(&expr)?;
        let parsed = match name {
            "insert-notes" => {
                let (first, items) = args
                    .split_first()
                    .ok_or_else(|| malformed(line, "missing channel"))?;
                let channel = parse_u32(first, "channel")? as usize;
                let notes = items
                    .iter()
                    .map(|item| item_list(item).and_then(|(l, a)| note_args(l, a)))
                    .collect::<StorageResult<Vec<_>>>()?;
                PartStatement::Notes {
                    channel: Some(channel),
                    notes,
                }
            }
            "insert-note" => PartStatement::Notes {
                channel: None,
                notes: vec![note_args(line, args)?],
            },
            "insert-controls" => PartStatement::Controls(
                args.iter()
                    .map(|item| item_list(item).and_then(|(l, a)| control_args(l, a)))
                    .collect::<StorageResult<Vec<_>>>()?,
            ),
            "insert-control" => PartStatement::Controls(vec![control_args(line, args)?]),
            other => PartStatement::Unknown {
                line,
                name: other.to_string(),
            },
        };
        statements.push(parsed);
    }
    Ok(statements)
}

/// Control type from its storage name, or its raw number in legacy files
fn resolve_control(name: &str) -> Option<ControlType> {
    ControlType::from_name(name).or_else(|| name.parse().ok().and_then(ControlType::from_raw))
}

// Writing

fn write_note(out: &mut String, note: &NoteEvent) {
    out.push_str(&format!(
        "({:#07x} {:#05x} {}",
        note.tick, note.duration, note.note
    ));
    if note.fine_tune != 0 || note.velocity != 1.0 {
        out.push_str(&format!(" {}", note.fine_tune));
    }
    if note.velocity != 1.0 {
        out.push_str(&format!(" {}", note.velocity));
    }
    out.push(')');
}

/// Write every note and control of a part
pub fn store_part(part: &Part) -> String {
    let events = part.shared().events().read();
    let mut out = String::new();

    for (channel, lane) in events.channels().iter().enumerate() {
        if lane.is_empty() {
            continue;
        }
        out.push_str(&format!("(insert-notes {}", channel));
        for note in lane.notes() {
            out.push_str("\n  ");
            write_note(&mut out, note);
        }
        out.push_str(")\n");
    }

    let nodes = events.controls().nodes();
    if !nodes.is_empty() {
        out.push_str("(insert-controls");
        for node in nodes {
            for control in node.events() {
                out.push_str(&format!(
                    "\n  ({:#07x} {} {})",
                    node.tick, control.control_type, control.value
                ));
            }
        }
        out.push_str(")\n");
    }
    out
}

/// Replay stored statements into a part
///
/// Syntax errors fail the whole restore before anything is inserted. Notes or
/// controls the part refuses, unknown control types and unknown statements
/// are logged and skipped.
pub fn restore_part(part: &mut Part, text: &str) -> StorageResult<RestoreReport> {
    let statements = parse_part(text)?;
    let mut report = RestoreReport::default();

    for statement in statements {
        match statement {
            PartStatement::Notes { channel, notes } => {
                let choice = channel.map_or(ChannelChoice::Auto, ChannelChoice::Fixed);
                for args in notes {
                    match part.insert_note(
                        choice,
                        args.tick,
                        args.duration,
                        args.note,
                        args.fine_tune,
                        args.velocity,
                    ) {
                        Ok(_) => report.notes += 1,
                        Err(e) => {
                            log::warn!("Part {}: line {}: skipping note: {}", part.id(), args.line, e);
                            report.skipped += 1;
                        }
                    }
                }
            }
            PartStatement::Controls(controls) => {
                for args in controls {
                    let Some(control_type) = resolve_control(&args.name) else {
                        log::warn!(
                            "Part {}: line {}: unknown control type '{}'",
                            part.id(),
                            args.line,
                            args.name
                        );
                        report.skipped += 1;
                        continue;
                    };
                    let value = args.value.clamp(-1.0, 1.0);
                    match part.insert_control(args.tick, control_type, value) {
                        Ok(_) => report.controls += 1,
                        Err(e) => {
                            log::warn!(
                                "Part {}: line {}: skipping control: {}",
                                part.id(),
                                args.line,
                                e
                            );
                            report.skipped += 1;
                        }
                    }
                }
            }
            PartStatement::Unknown { line, name } => {
                log::warn!("Part {}: line {}: unknown statement '{}'", part.id(), line, name);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn part_name_token(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';' | '\\'));
    if plain {
        format!(":{}", name)
    } else {
        quote(name)
    }
}

/// Write the placements of a track, naming parts through the song
pub fn store_track(track: &Track, song: &Song) -> String {
    let entries = track.shared().entries().read();
    let mut out = String::new();
    for entry in entries.entries() {
        let Some(part) = song.part(entry.part_id()) else {
            log::warn!(
                "Track {}: placement at {} refers to missing part {}",
                track.id(),
                entry.tick,
                entry.part_id()
            );
            continue;
        };
        out.push_str(&format!(
            "(insert-part {:#07x} {})\n",
            entry.tick,
            part_name_token(part.name())
        ));
    }
    out
}

/// Replay stored placements into a track of `song`
///
/// Parts are found by name; `:name` atoms are accepted besides quoted names.
pub fn restore_track(song: &mut Song, track: TrackId, text: &str) -> StorageResult<RestoreReport> {
    if song.track(track).is_none() {
        return Err(SongError::NoSuchTrack(track).into());
    }

    let mut placements = Vec::new();
    let mut report = RestoreReport::default();
    for expr in Reader::new(text).read_all()? {
        let line = expr.line();
        let (name, args) = statement(&expr)?;
        if name != "insert-part" {
            log::warn!("Track {}: line {}: unknown statement '{}'", track, line, name);
            report.skipped += 1;
            continue;
        }
        if args.len() != 2 {
            return Err(malformed(line, "insert-part needs a tick and a part name"));
        }
        let tick = parse_u32(&args[0], "tick")?;
        let part_name = match &args[1] {
            Expr::Str { text, .. } => text.clone(),
            Expr::Atom { text, .. } => text.strip_prefix(':').unwrap_or(text).to_string(),
            Expr::List { line, .. } => return Err(malformed(*line, "expected a part name")),
        };
        placements.push((line, tick, part_name));
    }

    for (line, tick, part_name) in placements {
        let Some(part) = song.find_part_by_name(&part_name).map(Part::id) else {
            log::warn!("Track {}: line {}: no part named '{}'", track, line, part_name);
            report.skipped += 1;
            continue;
        };
        match song.place_part(track, tick, part) {
            Ok(_) => report.parts += 1,
            Err(e) => {
                log::warn!("Track {}: line {}: skipping placement: {}", track, line, e);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ChangeDispatcher;

    fn sample_part() -> Part {
        let mut part = Part::new(1, "sample", ChangeDispatcher::new());
        part.insert_note(ChannelChoice::Fixed(0), 0, 384, 60, 0, 1.0)
            .unwrap();
        part.insert_note(ChannelChoice::Fixed(0), 384, 192, 62, -10, 1.0)
            .unwrap();
        part.insert_note(ChannelChoice::Fixed(1), 0, 96, 64, 0, 0.5)
            .unwrap();
        part.insert_control(16, ControlType::PitchBend, 0.25)
            .unwrap();
        part
    }

    #[test]
    fn test_store_format() {
        let text = store_part(&sample_part());
        assert_eq!(
            text,
            "(insert-notes 0\n  (0x00000 0x180 60)\n  (0x00180 0x0c0 62 -10))\n\
             (insert-notes 1\n  (0x00000 0x060 64 0 0.5))\n\
             (insert-controls\n  (0x00010 pitch-bend 0.25))\n"
        );
    }

    #[test]
    fn test_restore_stored_part() {
        let original = sample_part();
        let mut copy = Part::new(2, "copy", ChangeDispatcher::new());
        let report = restore_part(&mut copy, &store_part(&original)).unwrap();

        assert_eq!(
            report,
            RestoreReport {
                notes: 3,
                controls: 1,
                parts: 0,
                skipped: 0
            }
        );
        assert_eq!(copy.n_channels(), 2);
        assert_eq!(store_part(&copy), store_part(&original));
    }

    #[test]
    fn test_restore_legacy_statements() {
        let mut part = Part::new(1, "legacy", ChangeDispatcher::new());
        let text = "; old single statements\n\
                    (insert-note 0 100 60)\n\
                    (insert-note 0 100 64 5 0.75)\n\
                    (insert-control 10 pitch-bend 0.5)\n\
                    (insert-control 20 3 -0.5)\n";
        let report = restore_part(&mut part, text).unwrap();
        assert_eq!((report.notes, report.controls, report.skipped), (2, 2, 0));
        assert_eq!(part.n_channels(), 2);
        assert_eq!(part.get_controls(20, ControlType::PitchBend).len(), 1);
    }

    #[test]
    fn test_restore_skips_and_clamps() {
        let mut part = Part::new(1, "skips", ChangeDispatcher::new());
        let text = "(insert-notes 0 (0 10 60) (0 10 62) (20 10 200))\n\
                    (insert-controls (0 wobble 0.5) (5 pressure 3.0))\n\
                    (set-tempo 120)\n";
        let report = restore_part(&mut part, text).unwrap();
        assert_eq!(report.notes, 1);
        assert_eq!(report.controls, 1);
        assert_eq!(report.skipped, 4);
        let pressure = part.get_controls(5, ControlType::Pressure);
        assert_eq!(pressure[0].value, 1.0);
    }

    #[test]
    fn test_syntax_errors_have_lines() {
        let mut part = Part::new(1, "errors", ChangeDispatcher::new());
        assert_eq!(
            restore_part(&mut part, "(insert-note 0 10 60)\n(insert-note 0 10"),
            Err(StorageError::Unbalanced { line: 2 })
        );
        assert!(matches!(
            restore_part(&mut part, "\n\n(insert-note zero 10 60)"),
            Err(StorageError::Malformed { line: 3, .. })
        ));
        assert_eq!(
            restore_part(&mut part, ")"),
            Err(StorageError::Unbalanced { line: 1 })
        );
        // nothing was inserted by the failed restores
        assert_eq!(part.last_tick(), 0);
    }

    #[test]
    fn test_track_round_trip() {
        let mut song = Song::new("song", ChangeDispatcher::new());
        let intro = song.create_part("Intro \"A\"");
        let verse = song.create_part("Verse");
        let track = song.create_track("Lead");
        song.place_part(track, 0, intro).unwrap();
        song.place_part(track, 1536, verse).unwrap();

        let text = store_track(song.track(track).unwrap(), &song);
        assert_eq!(
            text,
            "(insert-part 0x00000 \"Intro \\\"A\\\"\")\n(insert-part 0x00600 :Verse)\n"
        );

        let other = song.create_track("Copy");
        let report = restore_track(&mut song, other, &text).unwrap();
        assert_eq!(report.parts, 2);
        assert_eq!(song.track(other).unwrap().find_part(verse), Some(1536));
    }

    #[test]
    fn test_restore_track_by_atom_name() {
        let mut song = Song::new("song", ChangeDispatcher::new());
        let part = song.create_part("Drums");
        let track = song.create_track("Beat");

        let text = "(insert-part 0 :Drums)\n(insert-part 0 :Drums)\n(insert-part 10 :Bass)";
        let report = restore_track(&mut song, track, text).unwrap();
        assert_eq!((report.parts, report.skipped), (1, 2));
        assert_eq!(song.track(track).unwrap().find_part(part), Some(0));

        assert_eq!(
            restore_track(&mut song, 99, ""),
            Err(StorageError::Song(SongError::NoSuchTrack(99)))
        );
    }
}
