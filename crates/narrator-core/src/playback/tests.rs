use super::*;
use crate::backend::scripted::ScriptedBackend;
use crate::backend::{BackendEvent, UtteranceEvent, UtteranceId};
use crate::clock::manual::ManualClock;
use crate::error::BackendError;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<PlaybackEvent>>>;
type TestController = SpeechController<ScriptedBackend, ManualClock>;

const FOUR_EQUAL: &str = "One two three four five. Six seven eight nine ten. \
    Eleven twelve thirteen fourteen fifteen. Sixteen seventeen eighteen nineteen twenty.";

fn build(backend: ScriptedBackend) -> (TestController, ManualClock, Log) {
    let clock = ManualClock::new();
    let mut controller =
        SpeechController::with_clock(backend, clock.clone(), &AppConfig::default());
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    controller.subscribe(move |event: &PlaybackEvent| sink.borrow_mut().push(event.clone()));
    (controller, clock, log)
}

fn deliver(controller: &mut TestController, event: UtteranceEvent) {
    let id = controller.backend().last_utterance();
    controller.handle_backend_event(BackendEvent::utterance(id, event));
}

fn highlights(log: &Log) -> Vec<usize> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::HighlightChanged { sentence_index } => Some(*sentence_index),
            _ => None,
        })
        .collect()
}

fn states(log: &Log) -> Vec<PlaybackState> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

fn errors(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn speak_submits_loaded_text_with_current_settings() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller
        .load_text("Hello.   World!\nTest?")
        .expect("text loads");
    controller.set_rate(1.5);

    controller.speak().expect("speak starts");

    let (_, request) = &controller.backend().submitted[0];
    assert_eq!(request.text, "Hello. World! Test?");
    assert!((request.settings.rate - 1.5).abs() < f32::EPSILON);
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
    assert_eq!(controller.highlight_mode(), Some(HighlightMode::Precise));
    assert_eq!(states(&log), vec![PlaybackState::Speaking]);
}

#[test]
fn empty_text_is_rejected_without_state_change() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());

    assert_eq!(controller.speak(), Err(PlaybackError::EmptyText));
    assert_eq!(
        controller.speak_text("  \n ", Vec::new()),
        Err(PlaybackError::EmptyText)
    );
    assert!(controller.load_text("\t").is_err());

    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert!(controller.backend().submitted.is_empty());
    assert_eq!(errors(&log).len(), 3);
    assert!(states(&log).is_empty());
}

#[test]
fn pause_and_resume_follow_backend_acknowledgments() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");
    controller.speak().expect("speak starts");

    controller.pause().expect("pause requested");
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
    assert_eq!(controller.backend().pauses.len(), 1);

    deliver(&mut controller, UtteranceEvent::PauseAck);
    assert_eq!(controller.playback_state(), PlaybackState::Paused);

    controller.resume().expect("resume requested");
    assert_eq!(controller.playback_state(), PlaybackState::Paused);
    deliver(&mut controller, UtteranceEvent::ResumeAck);
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);

    assert_eq!(
        states(&log),
        vec![
            PlaybackState::Speaking,
            PlaybackState::Paused,
            PlaybackState::Speaking
        ]
    );
}

#[test]
fn pause_and_resume_require_matching_state() {
    let (mut controller, _clock, _log) = build(ScriptedBackend::precise());
    assert_eq!(
        controller.pause(),
        Err(PlaybackError::InvalidTransition {
            command: "pause",
            state: PlaybackState::Idle,
        })
    );

    controller.load_text("Hello.").expect("text loads");
    controller.speak().expect("speak starts");
    assert!(matches!(
        controller.resume(),
        Err(PlaybackError::InvalidTransition {
            command: "resume",
            ..
        })
    ));
    assert!(controller.backend().resumes.is_empty());
}

#[test]
fn duplicate_and_out_of_order_acks_are_ignored() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");
    controller.speak().expect("speak starts");

    deliver(&mut controller, UtteranceEvent::ResumeAck);
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);

    deliver(&mut controller, UtteranceEvent::PauseAck);
    deliver(&mut controller, UtteranceEvent::PauseAck);
    assert_eq!(controller.playback_state(), PlaybackState::Paused);

    assert_eq!(
        states(&log),
        vec![PlaybackState::Speaking, PlaybackState::Paused]
    );
}

#[test]
fn toggle_play_pause_walks_the_cycle() {
    let (mut controller, _clock, _log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");

    controller.toggle_play_pause().expect("starts");
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
    controller.toggle_play_pause().expect("pause requested");
    assert_eq!(controller.backend().pauses.len(), 1);
    deliver(&mut controller, UtteranceEvent::PauseAck);
    controller.toggle_play_pause().expect("resume requested");
    assert_eq!(controller.backend().resumes.len(), 1);
}

#[test]
fn stop_returns_to_idle_from_every_state() {
    let (mut controller, _clock, _log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World! Test?").expect("text loads");

    // Idle, twice.
    controller.stop();
    controller.stop();
    assert_eq!(controller.playback_state(), PlaybackState::Idle);

    // Speaking, with a highlight in place.
    controller.speak().expect("speak starts");
    deliver(&mut controller, UtteranceEvent::Started);
    deliver(&mut controller, UtteranceEvent::Position { char_index: 7 });
    assert_eq!(controller.current_sentence_index(), 1);
    controller.stop();
    controller.stop();
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(controller.current_sentence_index(), 0);
    assert!(
        controller
            .sentence_marks()
            .iter()
            .all(|mark| *mark == SentenceMark::Pending)
    );
    assert_eq!(controller.backend().cancels.len(), 1);

    // Paused.
    controller.speak().expect("speak starts");
    controller.pause().expect("pause requested");
    deliver(&mut controller, UtteranceEvent::PauseAck);
    controller.stop();
    assert_eq!(controller.playback_state(), PlaybackState::Idle);

    // Errored.
    controller.speak().expect("speak starts");
    deliver(
        &mut controller,
        UtteranceEvent::Failed {
            reason: "engine crashed".into(),
        },
    );
    assert_eq!(controller.playback_state(), PlaybackState::Errored);
    controller.stop();
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(controller.current_sentence_index(), 0);
}

#[test]
fn position_on_end_char_keeps_that_sentence() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World! Test?").expect("text loads");
    let end_of_first = controller.sentences()[0].end_char;
    controller.speak().expect("speak starts");
    deliver(&mut controller, UtteranceEvent::Started);

    deliver(
        &mut controller,
        UtteranceEvent::Position {
            char_index: end_of_first,
        },
    );
    assert_eq!(controller.current_sentence_index(), 0);

    deliver(
        &mut controller,
        UtteranceEvent::Position {
            char_index: end_of_first + 1,
        },
    );
    assert_eq!(highlights(&log), vec![0, 1]);
    assert_eq!(
        controller.sentence_marks(),
        vec![
            SentenceMark::Spoken,
            SentenceMark::Active,
            SentenceMark::Pending
        ]
    );
}

#[test]
fn position_after_stop_has_no_effect() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World! Test?").expect("text loads");
    controller.speak().expect("speak starts");
    let utterance = controller.backend().last_utterance();
    deliver(&mut controller, UtteranceEvent::Started);
    controller.stop();
    let seen = log.borrow().len();

    controller.handle_backend_event(BackendEvent::utterance(
        utterance,
        UtteranceEvent::Position { char_index: 13 },
    ));
    controller.handle_backend_event(BackendEvent::utterance(utterance, UtteranceEvent::Ended));

    assert_eq!(log.borrow().len(), seen);
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
}

#[test]
fn new_speak_tears_down_the_previous_session() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World! Test?").expect("text loads");
    controller.speak().expect("first session");
    let first = controller.backend().last_utterance();
    deliver(&mut controller, UtteranceEvent::Started);
    deliver(&mut controller, UtteranceEvent::Position { char_index: 13 });
    assert_eq!(controller.current_sentence_index(), 2);

    controller.speak().expect("second session");
    let second = controller.backend().last_utterance();
    assert_ne!(first, second);
    assert_eq!(controller.backend().cancels, vec![first]);
    assert_eq!(controller.current_sentence_index(), 0);
    let seen = log.borrow().len();

    for event in [
        UtteranceEvent::Position { char_index: 14 },
        UtteranceEvent::PauseAck,
        UtteranceEvent::Failed {
            reason: "late".into(),
        },
        UtteranceEvent::Ended,
    ] {
        controller.handle_backend_event(BackendEvent::utterance(first, event));
    }
    assert_eq!(log.borrow().len(), seen);
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);

    controller.handle_backend_event(BackendEvent::utterance(second, UtteranceEvent::Started));
    assert_eq!(highlights(&log), vec![0, 2, 0]);
}

#[test]
fn natural_end_clears_the_session() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");
    controller.speak().expect("speak starts");
    deliver(&mut controller, UtteranceEvent::Started);
    deliver(&mut controller, UtteranceEvent::Position { char_index: 8 });
    deliver(&mut controller, UtteranceEvent::Ended);

    assert_eq!(controller.playback_state(), PlaybackState::Ended);
    assert_eq!(controller.current_sentence_index(), 0);
    assert_eq!(controller.session_id(), None);
    assert!(
        controller
            .sentence_marks()
            .iter()
            .all(|mark| *mark == SentenceMark::Pending)
    );
    assert!(matches!(
        log.borrow().last(),
        Some(PlaybackEvent::Progress {
            percent: Some(p),
            ..
        }) if (*p - 100.0).abs() < f64::EPSILON
    ));

    controller.speak().expect("a fresh session starts after the end");
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
}

#[test]
fn backend_failure_surfaces_reason() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");
    controller.speak().expect("speak starts");
    controller.pause().expect("pause requested");
    deliver(&mut controller, UtteranceEvent::PauseAck);
    deliver(
        &mut controller,
        UtteranceEvent::Failed {
            reason: "voice not installed".into(),
        },
    );

    assert_eq!(controller.playback_state(), PlaybackState::Errored);
    let errors = errors(&log);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("voice not installed"));

    controller.speak().expect("errored accepts new sessions");
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
}

#[test]
fn rejected_submit_moves_to_errored() {
    let mut backend = ScriptedBackend::precise();
    backend.reject_next = Some(BackendError::Unavailable("no audio device".into()));
    let (mut controller, _clock, log) = build(backend);
    controller.load_text("Hello.").expect("text loads");

    let result = controller.speak();

    assert!(matches!(result, Err(PlaybackError::Backend(_))));
    assert_eq!(controller.playback_state(), PlaybackState::Errored);
    assert_eq!(errors(&log).len(), 1);
    assert_eq!(controller.session_id(), None);
}

#[test]
fn estimated_mode_tracks_elapsed_time() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    controller.load_text(FOUR_EQUAL).expect("text loads");
    let session = controller.speak().expect("speak starts");
    assert_eq!(controller.highlight_mode(), Some(HighlightMode::Estimated));
    deliver(&mut controller, UtteranceEvent::Started);
    assert_eq!(
        controller.tick_interval(),
        Some((session, Duration::from_millis(500)))
    );

    // 20 words at 150 wpm is 8s; halfway lands on the third sentence.
    clock.advance(Duration::from_secs(4));
    controller.tick(session);

    assert_eq!(controller.current_sentence_index(), 2);
    assert_eq!(highlights(&log), vec![0, 2]);
    assert!(log.borrow().iter().any(|event| matches!(
        event,
        PlaybackEvent::Progress { percent: Some(p), .. } if (*p - 75.0).abs() < 1e-9
    )));
}

#[test]
fn estimate_waits_for_the_backend_to_start() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    controller.load_text(FOUR_EQUAL).expect("text loads");
    let session = controller.speak().expect("speak starts");
    assert_eq!(controller.tick_interval(), None);

    // Synthesis runs for most of the estimate before any audio plays.
    clock.advance(Duration::from_secs(7));
    controller.tick(session);
    assert!(highlights(&log).is_empty());

    deliver(&mut controller, UtteranceEvent::Started);
    assert_eq!(controller.current_sentence_index(), 0);
    controller.tick(session);
    assert_eq!(highlights(&log), vec![0]);

    clock.advance(Duration::from_secs(2));
    controller.tick(session);
    assert_eq!(highlights(&log), vec![0, 1]);
}

#[test]
fn paused_time_does_not_advance_the_estimate() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    controller.load_text(FOUR_EQUAL).expect("text loads");
    let session = controller.speak().expect("speak starts");
    deliver(&mut controller, UtteranceEvent::Started);

    clock.advance(Duration::from_secs(2));
    controller.tick(session);
    assert_eq!(controller.current_sentence_index(), 1);

    controller.pause().expect("pause requested");
    deliver(&mut controller, UtteranceEvent::PauseAck);
    assert_eq!(controller.tick_interval(), None);

    clock.advance(Duration::from_secs(10));
    controller.tick(session);
    controller.resume().expect("resume requested");
    deliver(&mut controller, UtteranceEvent::ResumeAck);
    controller.tick(session);

    assert_eq!(controller.current_sentence_index(), 1);
    assert_eq!(highlights(&log), vec![0, 1]);

    clock.advance(Duration::from_secs(2));
    controller.tick(session);
    assert_eq!(controller.current_sentence_index(), 2);
}

#[test]
fn ticks_for_an_old_session_are_ignored() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    controller.load_text(FOUR_EQUAL).expect("text loads");
    let first = controller.speak().expect("first session");
    let second = controller.speak().expect("second session");
    assert_ne!(first, second);
    deliver(&mut controller, UtteranceEvent::Started);

    clock.advance(Duration::from_secs(7));
    controller.tick(first);
    assert_eq!(highlights(&log), vec![0]);

    controller.tick(second);
    assert_eq!(highlights(&log), vec![0, 3]);
}

#[test]
fn stop_neutralizes_pending_ticks() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    controller.load_text(FOUR_EQUAL).expect("text loads");
    let session = controller.speak().expect("speak starts");
    deliver(&mut controller, UtteranceEvent::Started);
    assert!(controller.tick_interval().is_some());

    controller.stop();
    log.borrow_mut().clear();
    clock.advance(Duration::from_secs(5));
    controller.tick(session);

    assert!(log.borrow().is_empty());
    assert_eq!(controller.tick_interval(), None);
    assert_eq!(controller.current_sentence_index(), 0);
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
}

#[test]
fn speaking_while_paused_replaces_the_paused_session() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World! Test?").expect("text loads");
    let first = controller.speak().expect("first session");
    let paused_utterance = controller.backend().last_utterance();
    deliver(&mut controller, UtteranceEvent::Started);
    controller.pause().expect("pause requested");
    deliver(&mut controller, UtteranceEvent::PauseAck);
    assert_eq!(controller.playback_state(), PlaybackState::Paused);

    let second = controller.speak().expect("second session");

    assert_ne!(first, second);
    assert_eq!(controller.backend().cancels, vec![paused_utterance]);
    assert_eq!(controller.backend().submitted.len(), 2);
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
    assert_eq!(controller.current_sentence_index(), 0);
    assert!(controller
        .sentence_marks()
        .iter()
        .all(|mark| *mark == SentenceMark::Pending));

    // A late resume ack for the cancelled utterance changes nothing.
    controller.handle_backend_event(BackendEvent::utterance(
        paused_utterance,
        UtteranceEvent::ResumeAck,
    ));
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
    assert_eq!(
        states(&log),
        vec![
            PlaybackState::Speaking,
            PlaybackState::Paused,
            PlaybackState::Speaking
        ]
    );
}

#[test]
fn text_without_sentences_is_inert() {
    let (mut controller, clock, log) = build(ScriptedBackend::estimated());
    let session = controller
        .speak_text("...", Vec::new())
        .expect("non-blank text is accepted");

    assert_eq!(controller.tick_interval(), None);
    clock.advance(Duration::from_secs(30));
    controller.tick(session);
    deliver(&mut controller, UtteranceEvent::Started);

    assert!(highlights(&log).is_empty());
    assert_eq!(controller.playback_state(), PlaybackState::Speaking);
}

#[test]
fn catalog_changes_refresh_the_voice_list() {
    let (mut controller, _clock, _log) = build(ScriptedBackend::precise());
    assert!(controller.voices().is_empty());
    assert!(controller.settings().voice.is_none());

    controller.backend_mut().voices = vec![
        VoiceHandle::new("Alex", "en-US", true),
        VoiceHandle::new("Microsoft Aria Online (Natural)", "en-US", false),
    ];
    controller.handle_backend_event(BackendEvent::VoicesChanged);

    assert_eq!(controller.voices().len(), 2);
    assert_eq!(
        controller.settings().voice.as_ref().map(|v| v.name.as_str()),
        Some("Microsoft Aria Online (Natural)")
    );
    assert!(controller.set_voice_by_name("Alex"));
    assert!(!controller.set_voice_by_name("Nobody"));
    assert_eq!(
        controller.settings().voice.as_ref().map(|v| v.name.as_str()),
        Some("Alex")
    );
}

#[test]
fn loading_new_text_stops_the_running_session() {
    let (mut controller, _clock, _log) = build(ScriptedBackend::precise());
    controller.load_text("Hello. World!").expect("text loads");
    controller.speak().expect("speak starts");
    let utterance = controller.backend().last_utterance();

    let sentences = controller.load_text("Another. Text. Here.").expect("loads");
    assert_eq!(sentences.len(), 3);
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(controller.backend().cancels, vec![utterance]);

    controller.clear_text();
    assert!(controller.sentences().is_empty());
    assert!(controller.document().is_none());
}

#[test]
fn unknown_utterances_are_ignored_before_any_session() {
    let (mut controller, _clock, log) = build(ScriptedBackend::precise());
    controller.handle_backend_event(BackendEvent::utterance(
        UtteranceId(42),
        UtteranceEvent::Started,
    ));
    assert!(log.borrow().is_empty());
}
