//! Save states and audio delivery through a live session

mod common;

use common::{running, serial, session, Fixture, Recorder};
use gb_core::config::Config;
use gb_core::engine::null::{build_gba_rom, RomBuilder};
use gb_core::{Engine, NullEngine, RtcState, StateError};
use gb_integration::StateSnapshot;
use std::cell::Cell;

#[test]
fn test_state_round_trip() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = running(&fixture, &recorder, Config::default());

    session.engine_mut().write_save_data(0, b"SLOT");
    for _ in 0..120 {
        session.run_frame();
    }
    let saved_ram = session.engine().save_data().to_vec();
    let saved_rtc = session.engine().rtc();
    assert_eq!(saved_rtc.registers[0], 2);

    let state = fixture.path("slot1.state");
    let ok = Cell::new(false);
    session.save_state(&state, |result| ok.set(result.is_ok()));
    assert!(ok.get());

    session.engine_mut().write_save_data(0, b"GONE");
    for _ in 0..60 {
        session.run_frame();
    }
    assert_eq!(session.engine().frame_counter(), 180);
    assert_ne!(session.engine().rtc(), saved_rtc);

    ok.set(false);
    session.load_state(&state, |result| ok.set(result.is_ok()));
    assert!(ok.get());
    assert_eq!(session.engine().save_data(), &saved_ram[..]);
    assert_eq!(session.engine().rtc(), saved_rtc);
    // Only the two persisted sections are restored
    assert_eq!(session.engine().frame_counter(), 180);
}

#[test]
fn test_corrupt_state_leaves_engine_unchanged() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = running(&fixture, &recorder, Config::default());

    let state = fixture.path("slot1.state");
    session.save_state(&state, |result| result.unwrap());

    let mut bytes = std::fs::read(&state).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    std::fs::write(&state, bytes).unwrap();

    session.engine_mut().write_save_data(0, b"LIVE");
    for _ in 0..61 {
        session.run_frame();
    }
    let before_ram = session.engine().save_data().to_vec();
    let before_rtc = session.engine().rtc();

    let mut outcome = None;
    session.load_state(&state, |result| outcome = Some(result));
    assert!(matches!(outcome, Some(Err(StateError::ChecksumMismatch { .. }))));
    assert_eq!(session.engine().save_data(), &before_ram[..]);
    assert_eq!(session.engine().rtc(), before_rtc);
    assert_eq!(session.get_screen_rect().width, 160);
}

#[test]
fn test_state_with_out_of_range_clock_keeps_running() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = running(&fixture, &recorder, Config::default());

    let snapshot = StateSnapshot {
        save_data: session.engine().save_data().to_vec(),
        rtc: RtcState {
            registers: [255, 0, 0, 0, 0],
            ..RtcState::default()
        },
    };
    let state = fixture.path("odd_clock.state");
    std::fs::write(&state, snapshot.encode()).unwrap();

    let ok = Cell::new(false);
    session.load_state(&state, |result| ok.set(result.is_ok()));
    assert!(ok.get());

    for _ in 0..120 {
        session.run_frame();
    }
    assert_eq!(session.engine().rtc().registers[..3], [1, 0, 0]);
}

#[test]
fn test_state_callbacks_report_io_errors() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = running(&fixture, &recorder, Config::default());

    let mut outcome = None;
    session.load_state(fixture.path("missing.state"), |result| outcome = Some(result));
    assert!(matches!(outcome, Some(Err(StateError::Io(_)))));

    let mut outcome = None;
    let unwritable = fixture.path("no/such/dir/slot.state");
    session.save_state(&unwritable, |result| outcome = Some(result));
    assert!(matches!(outcome, Some(Err(StateError::Io(_)))));
}

#[test]
fn test_state_from_other_cartridge_rejected() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    // MBC1 with 8 KiB of RAM
    let small = fixture.path("small.gb");
    std::fs::write(&small, RomBuilder::new().cartridge_type(0x03, 2).build()).unwrap();
    let recorder = Recorder::default();

    let mut session = running(&fixture, &recorder, Config::default());
    let state = fixture.path("big.state");
    session.save_state(&state, |result| result.unwrap());
    session.stop();

    session.load(&[&small], fixture.path("small.sav")).unwrap();
    session.start();
    let mut outcome = None;
    session.load_state(&state, |result| outcome = Some(result));
    assert!(matches!(
        outcome,
        Some(Err(StateError::SectionSize {
            section: "SAVE_DATA",
            expected: 0x2000,
            actual: 0x8000,
        }))
    ));
}

#[test]
fn test_push_audio_reaches_sink() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = running(&fixture, &recorder, Config::default());

    for _ in 0..10 {
        session.run_frame();
    }

    // 548.625 frames of audio per video frame, delivered 512 at a time
    let audio = recorder.audio.lock();
    assert_eq!(audio.len(), 10);
    assert!(audio.iter().all(|&len| len == 1024));
    assert_eq!(session.audio_stats().frames_forwarded, 5120);
}

#[test]
fn test_pull_audio_reaches_sink() {
    let _guard = serial();
    let fixture = Fixture::new("game.gba", &build_gba_rom());
    let recorder = Recorder::default();
    let mut session = session(NullEngine::game_boy_advance(), &recorder, Config::default());
    session.load(&[&fixture.rom], &fixture.save).unwrap();
    session.start();

    for _ in 0..600 {
        session.run_frame();
    }

    let audio = recorder.audio.lock();
    assert_eq!(audio.len(), 600);
    assert!(audio.iter().all(|&len| len % 2 == 0 && len >= 2 * 548));

    let stats = session.audio_stats();
    assert_eq!(stats.idle_ticks, 0);
    // The engine never overflowed its ring
    assert_eq!(session.engine().null_audio().dropped(), 0);
    let produced: usize = audio.iter().sum::<usize>() / 2;
    assert_eq!(stats.frames_forwarded, produced as u64);
}

#[test]
fn test_nothing_plays_before_start() {
    let _guard = serial();
    let fixture = Fixture::new("game.gb", &RomBuilder::new().build());
    let recorder = Recorder::default();
    let mut session = session(NullEngine::game_boy(), &recorder, Config::default());
    session.load(&[&fixture.rom], &fixture.save).unwrap();

    assert!(recorder.audio.lock().is_empty());
    assert_eq!(session.engine().frame_counter(), 0);
    session.start();
    session.run_frame();
    assert_eq!(session.engine().frame_counter(), 1);
}
