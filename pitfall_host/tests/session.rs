use std::time::Duration;

use pitfall_earth::PlayerSignal;
use pitfall_engine::timeline::VoiceOwner;
use pitfall_engine::track::TrackKind;
use pitfall_engine::{MemoryLoader, MusicEvent};
use pitfall_host::autopilot::Autopilot;
use pitfall_host::Session;
use pitfall_shared::config::SpawnOdds;
use pitfall_shared::{GameConfig, Pickup};
use pretty_assertions::assert_eq;

const RATE: u32 = 1000;

fn config() -> GameConfig {
    let mut config = GameConfig::default();
    config.transport.sample_rate = RATE;
    config
}

fn started(config: GameConfig, seed: u64) -> Session {
    let mut s = Session::new(config, Box::new(MemoryLoader::silent(RATE)), seed).unwrap();
    s.engine.ctx.timeline.enable_journal();
    assert!(s.wait_ready(Duration::from_secs(1)));
    s.start().unwrap();
    s
}

fn run_for(s: &mut Session, seconds: f64) -> Vec<MusicEvent> {
    let until = s.engine.now() + seconds;
    let mut events = Vec::new();
    while s.engine.now() < until {
        events.extend(s.tick().unwrap().events);
    }
    events
}

#[test]
fn first_stage_loads_every_track_and_sound() {
    let s = Session::new(config(), Box::new(MemoryLoader::silent(RATE)), 1).unwrap();
    assert_eq!(s.engine.pending_assets(1), Some(11 + 6));
}

#[test]
fn intro_hands_over_to_verse_with_drums_on_the_downbeat() {
    let mut s = started(config(), 3);
    assert_eq!(s.engine.master_key(), Some("intro"));

    let intro_end = s.engine.music.track(1, "intro").unwrap().end_time.unwrap();
    let drums = s.engine.music.track(1, "drums1").unwrap();
    assert_eq!(drums.start_time, Some(intro_end));

    let remaining = intro_end - s.engine.now() + 0.1;
    let events = run_for(&mut s, remaining);
    assert_eq!(s.engine.master_key(), Some("verse1"));
    assert!(events.contains(&MusicEvent::MasterChanged { stage: 1, key: "verse1".to_string() }));
    let verse = s.engine.music.track(1, "verse1").unwrap();
    assert_eq!(verse.start_time, Some(intro_end));
}

#[test]
fn song_sections_follow_each_other_without_gaps() {
    let mut config = config();
    if let Some(level) = config.levels.get_mut(&1) {
        level.goal_depth = u32::MAX;
    }
    let mut s = started(config, 11);
    run_for(&mut s, 200.0);

    for kind in [TrackKind::Loop, TrackKind::Drum] {
        let mut passes: Vec<_> = s
            .engine
            .ctx
            .timeline
            .journal()
            .iter()
            .filter_map(|r| match r.owner {
                VoiceOwner::Deck { track, .. } => {
                    let t = s.engine.music.track_by_id(track)?;
                    (t.kind == kind && t.key != "pause").then_some(*r)
                }
                VoiceOwner::Sound(_) => None,
            })
            .collect();
        passes.sort_by(|a, b| a.start.total_cmp(&b.start));
        assert!(passes.len() > 4, "{kind:?} passes: {}", passes.len());
        for pair in passes.windows(2) {
            assert!(
                (pair[1].start - pair[0].natural_end).abs() < 1e-6,
                "{kind:?} gap between {} and {}",
                pair[0].natural_end,
                pair[1].start
            );
        }
    }
}

#[test]
fn bonus_pickup_switches_drums_to_double_time() {
    let mut config = config();
    if let Some(level) = config.levels.get_mut(&1) {
        level.spawn = SpawnOdds { special: 0.0, bonus: 1.0, health: 0.0, energy: 0.0 };
    }
    let mut s = started(config, 5);
    let intro_end = s.engine.music.track(1, "intro").unwrap().end_time.unwrap();
    run_for(&mut s, intro_end + 1.0);

    let row = s.earth.row(s.earth.generated_depth() - 1).unwrap().to_vec();
    let bonus = row
        .iter()
        .copied()
        .find(|&c| s.earth.cell(c).and_then(|c| c.pickup()) == Some(Pickup::Bonus))
        .expect("every gap cell holds a bonus");
    assert_eq!(s.player_hits(bonus), Some(PlayerSignal::DoubleTimeOn));
    assert_eq!(s.player_hits(bonus), None, "collected once");
    assert!(s.player.in_double_time());

    run_for(&mut s, 5.0);
    let drums2 = s.engine.music.track(1, "drums2").unwrap();
    assert!(drums2.is_scheduled() || s.engine.music.track(1, "drums3").unwrap().is_scheduled());
    assert!(!s.engine.music.track(1, "drums1").unwrap().is_scheduled());
}

#[test]
fn dying_starts_the_reversed_pause_loop() {
    let mut s = started(config(), 9);
    run_for(&mut s, 1.0);

    let mut died = false;
    'outer: for depth in (1..s.earth.generated_depth()).rev() {
        let cells = s.earth.row(depth).unwrap().to_vec();
        for cell in cells {
            if s.earth.cell(cell).is_some_and(|c| c.is_block()) {
                if s.player_hits(cell) == Some(PlayerSignal::Died) {
                    died = true;
                    break 'outer;
                }
            }
        }
    }
    assert!(died);
    assert!(!s.player.is_alive());
    assert_eq!(s.engine.master_key(), Some("pause"));
    assert!(s.engine.music.track(1, "pause").unwrap().reverse);

    s.restart().unwrap();
    assert!(s.player.is_alive());
    assert_eq!(s.engine.master_key(), Some("intro"));
    assert_eq!(s.earth.live_rows(), 0);
}

#[test]
fn bullets_break_rock_but_pass_pickups() {
    let mut s = started(config(), 2);
    run_for(&mut s, 1.0);
    let depth = s.earth.generated_depth() - 1;
    let cells = s.earth.row(depth).unwrap().to_vec();
    let rock = cells[0];
    assert!(s.bullet_hits(rock));
    assert!(!s.bullet_hits(rock), "already a gap");
    assert_eq!(s.earth.explosions().count(), 1);
}

#[test]
fn reaching_the_goal_moves_to_the_next_stage() {
    let mut config = config();
    if let Some(level) = config.levels.get_mut(&1) {
        level.goal_depth = 3;
    }
    let mut s = started(config, 4);
    let mut ready = false;
    for _ in 0..2000 {
        let report = s.tick().unwrap();
        if report.events.contains(&MusicEvent::StageReady(2)) {
            ready = true;
        }
        if s.engine.music.stage() == Some(2) {
            break;
        }
    }
    assert!(ready);
    assert_eq!(s.stage(), 2);
    assert_eq!(s.engine.master_key(), Some("intro"));
    assert_eq!(s.engine.music.stage(), Some(2));
}

#[test]
fn autopilot_survives_a_while() {
    let mut s = started(config(), 21);
    let mut pilot = Autopilot::new(&s);
    for _ in 0..600 {
        s.tick().unwrap();
        pilot.step(&mut s);
    }
    assert!(s.earth.depth() > 0);
}

#[test]
fn recording_captures_audible_music() {
    let mut s = Session::new(config(), Box::new(MemoryLoader::tones(RATE)), 1).unwrap();
    assert!(s.wait_ready(Duration::from_secs(1)));
    s.record();
    s.start().unwrap();
    run_for(&mut s, 1.0);
    let mix = s.take_recording().unwrap();
    assert!(mix.len() >= 2 * RATE as usize);
    assert!(mix.iter().any(|x| x.abs() > 0.01));
}
