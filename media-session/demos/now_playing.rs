//! Drive a session from one controller and watch it from another
//!
//! Usage: cargo run -p media-session --example now_playing
//!
//! Set `MEDIA_SESSION_LOG_MODE=debug` to see the session and dispatch workers.

use std::time::Duration;

use media_session::dispatch::{EventsListener, Listener};
use media_session::model::{
    CapabilitySet, EventSet, FieldTag, MediaItem, PlayerCommand, RepeatMode, Snapshot, Timeline,
};
use media_session::{init_logging_from_env, Controller, Session};

/// Prints each field as it changes
struct FieldPrinter {
    name: &'static str,
}

impl Listener for FieldPrinter {
    fn on_current_item_changed(&mut self, index: Option<usize>, item: Option<&MediaItem>) {
        let title = item
            .and_then(|item| item.metadata.effective_title())
            .unwrap_or("-");
        println!("[{}] now playing #{:?}: {}", self.name, index, title);
    }

    fn on_play_when_ready_changed(&mut self, play_when_ready: bool) {
        println!("[{}] play when ready: {}", self.name, play_when_ready);
    }

    fn on_repeat_mode_changed(&mut self, mode: RepeatMode) {
        println!("[{}] repeat: {:?}", self.name, mode);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let session = Session::builder().build()?;
    session.update(|state| {
        state
            .timeline(Timeline::new(vec![
                MediaItem::titled("intro", "Intro"),
                MediaItem::titled("theme", "Main Theme"),
                MediaItem::titled("outro", "Outro"),
            ]))
            .current_index(Some(0))
    })?;

    let remote = Controller::connect(&session, "remote")?;
    let display = Controller::connect(&session, "display")?;

    // The display may read the current item but not the rest of the queue
    session.set_capabilities(
        display.id(),
        CapabilitySet::default_for_controller().without_player(PlayerCommand::GetTimeline),
    )?;

    display.add_listener(FieldPrinter { name: "display" })?;
    display.add_listener(EventsListener::new(|snapshot: &Snapshot, events: &EventSet| {
        if events.contains(FieldTag::Timeline) {
            println!("[display] sees {} item(s)", snapshot.timeline().len());
        }
    }))?;
    let cycles = display.iter()?;

    remote.play()?.wait();
    remote.seek_to_next()?.wait();
    remote.set_repeat_mode(RepeatMode::All)?.wait();
    remote.seek_to_next()?.wait();
    let wrapped = remote.seek_to_next()?.wait();
    println!("[remote] wrap-around result: {:?}", wrapped.result_code);

    for cycle in cycles.timeout_iter(Duration::from_millis(200)) {
        println!("[display] cycle v{}: {:?}", cycle.version, cycle.events);
    }

    println!(
        "legacy view:\n{}",
        serde_json::to_string_pretty(&session.legacy_state())?
    );

    remote.release();
    display.release();
    session.release();
    Ok(())
}
