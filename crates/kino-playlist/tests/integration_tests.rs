//! Integration tests for Kino Playlist

use kino_playlist::{
    CountdownEndReason, CountdownOptions, DefaultDelegate, MediaEntry, MediaSource, MessageBus,
    Player, PlayerEvent, Playlist, PlaylistConfig, PlaylistController, PlaylistDelegate,
    PlaylistEvent, PlaylistService, PluginConfig, StaticEntryLoader,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

// =============================================================================
// Helpers
// =============================================================================

struct MockPlayer {
    events: broadcast::Sender<PlayerEvent>,
    applied: Mutex<Vec<(String, Option<PluginConfig>)>>,
    duration: Mutex<f64>,
}

impl MockPlayer {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            applied: Mutex::new(Vec::new()),
            duration: Mutex::new(100.0),
        })
    }

    fn applied_ids(&self) -> Vec<String> {
        self.applied.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }
}

impl Player for MockPlayer {
    fn stop(&self) {}

    fn set_media_and_update_plugins(
        &self,
        entry: &MediaEntry,
        plugin_config: Option<&PluginConfig>,
    ) -> kino_playlist::Result<()> {
        self.applied
            .lock()
            .unwrap()
            .push((entry.id.clone(), plugin_config.cloned()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn duration(&self) -> f64 {
        *self.duration.lock().unwrap()
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn is_playing(&self) -> bool {
        true
    }

    fn rate(&self) -> f32 {
        1.0
    }
}

fn resolved(id: &str) -> MediaEntry {
    let url = Url::parse(&format!("https://cdn.example.com/{}/master.m3u8", id)).unwrap();
    MediaEntry::new(id).with_source(MediaSource::new(format!("{}-hls", id), url))
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("0_entry{}", i)).collect()
}

fn setup(
    n: usize,
    config: PlaylistConfig,
    loader: StaticEntryLoader,
) -> (PlaylistController, Arc<MockPlayer>, broadcast::Receiver<PlaylistEvent>) {
    let player = MockPlayer::new();
    let bus = MessageBus::new();
    let events = bus.subscribe();
    let playlist = Playlist::new("0_playlist", ids(n).into_iter().map(MediaEntry::new).collect());
    let controller = PlaylistController::new(
        playlist,
        config,
        player.clone(),
        Arc::new(loader),
        Arc::new(DefaultDelegate),
        bus,
    );
    (controller, player, events)
}

fn catalog(n: usize) -> StaticEntryLoader {
    StaticEntryLoader::from_entries(ids(n).iter().map(|id| resolved(id)))
}

fn drain(events: &mut broadcast::Receiver<PlaylistEvent>) -> Vec<PlaylistEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn count(events: &[PlaylistEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

// =============================================================================
// Navigation
// =============================================================================

#[tokio::test]
async fn test_play_next_visits_in_order() {
    let (mut controller, player, _events) = setup(4, PlaylistConfig::default(), catalog(4));

    for expected in 0..4 {
        controller.play_next().unwrap();
        controller.settle().await;
        assert_eq!(controller.current_index(), Some(expected));
    }

    assert_eq!(player.applied_ids(), ids(4));
}

#[tokio::test]
async fn test_loop_visits_0_1_0() {
    let config = PlaylistConfig {
        loop_enabled: true,
        ..Default::default()
    };
    let (mut controller, _player, _events) = setup(2, config, catalog(2));

    let mut visited = Vec::new();
    for _ in 0..3 {
        controller.play_next().unwrap();
        controller.settle().await;
        visited.push(controller.current_index().unwrap());
    }

    assert_eq!(visited, vec![0, 1, 0]);
}

#[tokio::test]
async fn test_loop_next_always_available() {
    let config = PlaylistConfig {
        loop_enabled: true,
        ..Default::default()
    };
    let (mut controller, _player, _events) = setup(3, config, catalog(3));

    assert!(controller.is_next_item_available());
    for _ in 0..5 {
        controller.play_next().unwrap();
        assert!(controller.is_next_item_available());
        assert!(controller.is_previous_item_available());
    }
}

#[tokio::test]
async fn test_replay_lands_on_first() {
    let (mut controller, _player, mut events) = setup(3, PlaylistConfig::default(), catalog(3));

    controller.play_item(2).unwrap();
    controller.settle().await;
    controller.replay().unwrap();
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(0));
    let events = drain(&mut events);
    assert_eq!(count(&events, "started"), 2);
}

#[tokio::test]
async fn test_end_without_loop_emits_ended() {
    let (mut controller, _player, mut events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_item(1).unwrap();
    controller.settle().await;
    drain(&mut events);

    controller.play_next().unwrap();
    assert_eq!(controller.current_index(), Some(1));
    assert!(!controller.is_next_item_available());

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![PlaylistEvent::Ended {
            playlist_id: "0_playlist".into()
        }]
    );
}

#[tokio::test]
async fn test_flag_events() {
    let (mut controller, _player, mut events) = setup(2, PlaylistConfig::default(), catalog(2));
    drain(&mut events);

    controller.set_loop(true);
    controller.set_loop(true);
    controller.set_auto_continue(false);

    assert_eq!(
        drain(&mut events),
        vec![
            PlaylistEvent::LoopStateChanged { enabled: true },
            PlaylistEvent::AutoContinueStateChanged { enabled: false },
        ]
    );

    controller.reset();
    assert!(!controller.is_loop_enabled());
    assert!(controller.is_auto_continue());
}

#[tokio::test]
async fn test_reset_restores_original_entries() {
    let (mut controller, _player, _events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.preload_next();
    controller.settle().await;
    assert!(controller.playlist().entries.iter().all(|e| e.has_sources()));

    controller.reset();
    assert_eq!(controller.current_index(), None);
    assert!(controller.playlist().entries.iter().all(|e| !e.has_sources()));
    assert!(controller.preloading_ids().is_empty());
}

// =============================================================================
// Player events
// =============================================================================

#[tokio::test]
async fn test_last_entry_end_emits_ended_once() {
    let (mut controller, _player, mut events) = setup(3, PlaylistConfig::default(), catalog(3));

    controller.play_item(2).unwrap();
    controller.settle().await;
    drain(&mut events);

    controller.handle_player_event(PlayerEvent::Ended);
    controller.handle_player_event(PlayerEvent::Ended);

    let events = drain(&mut events);
    assert_eq!(count(&events, "ended"), 1);
    assert_eq!(controller.current_index(), Some(2));
}

#[tokio::test]
async fn test_auto_continue_advances_on_end() {
    let (mut controller, player, _events) = setup(3, PlaylistConfig::default(), catalog(3));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::Ended);
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(1));
    assert_eq!(player.applied_ids().len(), 2);
}

#[tokio::test]
async fn test_no_auto_continue_stays() {
    let config = PlaylistConfig {
        auto_continue: false,
        ..Default::default()
    };
    let (mut controller, _player, mut events) = setup(3, config, catalog(3));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::Ended);

    assert_eq!(controller.current_index(), Some(0));
    assert_eq!(count(&drain(&mut events), "ended"), 0);
}

#[tokio::test]
async fn test_post_roll_defers_advance() {
    let (mut controller, _player, _events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;

    controller.handle_player_event(PlayerEvent::AdCuePointsUpdate { has_post_roll: true });
    controller.handle_player_event(PlayerEvent::Ended);
    assert_eq!(controller.current_index(), Some(0));

    controller.handle_player_event(PlayerEvent::AdStarted);
    controller.handle_player_event(PlayerEvent::AdCompleted);
    controller.handle_player_event(PlayerEvent::AllAdsCompleted);
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(1));
}

#[tokio::test]
async fn test_post_roll_ad_loaded_defers_advance() {
    let (mut controller, player, _events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;

    controller.handle_player_event(PlayerEvent::AdLoaded { is_post_roll: true });
    controller.handle_player_event(PlayerEvent::Ended);
    controller.settle().await;
    assert_eq!(controller.current_index(), Some(0));
    assert_eq!(player.applied_ids(), vec![ids(2)[0].clone()]);

    controller.handle_player_event(PlayerEvent::AllAdsCompleted);
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(1));
    assert_eq!(player.applied_ids(), ids(2));
}

#[tokio::test]
async fn test_player_error_recovers_forward() {
    let (mut controller, player, mut events) = setup(3, PlaylistConfig::default(), catalog(3));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::Error {
        code: "7000".into(),
        message: "decoder failed".into(),
    });
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(1));
    assert_eq!(player.applied_ids(), vec![ids(3)[0].clone(), ids(3)[1].clone()]);

    let error = drain(&mut events)
        .into_iter()
        .find(|e| e.name() == "load_media_error")
        .unwrap();
    match error {
        PlaylistEvent::LoadMediaError { entry_id, code, message } => {
            assert_eq!(entry_id, ids(3)[0]);
            assert_eq!(code, "PLAYBACK");
            assert!(message.contains("decoder failed"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// =============================================================================
// Loading and recovery
// =============================================================================

#[tokio::test]
async fn test_load_failure_recovers_forward() {
    let loader = catalog(3).with_failure(ids(3)[1].clone());
    let (mut controller, player, mut events) = setup(3, PlaylistConfig::default(), loader);

    controller.play_next().unwrap();
    controller.settle().await;
    controller.play_next().unwrap();
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(2));
    assert_eq!(player.applied_ids(), vec![ids(3)[0].clone(), ids(3)[2].clone()]);
    assert_eq!(count(&drain(&mut events), "load_media_error"), 1);
}

#[tokio::test]
async fn test_load_failure_recovers_backward() {
    let loader = catalog(3).with_failure(ids(3)[1].clone());
    let (mut controller, player, _events) = setup(3, PlaylistConfig::default(), loader);

    controller.play_item(2).unwrap();
    controller.settle().await;
    controller.play_prev().unwrap();
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(0));
    assert_eq!(player.applied_ids(), vec![ids(3)[2].clone(), ids(3)[0].clone()]);
}

#[tokio::test]
async fn test_load_failure_without_recovery_stays() {
    let config = PlaylistConfig {
        recover_on_error: false,
        ..Default::default()
    };
    let loader = catalog(2).with_failure(ids(2)[0].clone());
    let (mut controller, player, mut events) = setup(2, config, loader);

    controller.play_next().unwrap();
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(0));
    assert!(player.applied_ids().is_empty());
    assert_eq!(count(&drain(&mut events), "load_media_error"), 1);
}

#[tokio::test]
async fn test_concurrent_preload_single_load() {
    let loader = Arc::new(catalog(3).with_latency(Duration::from_millis(20)));
    let player = MockPlayer::new();
    let playlist = Playlist::new("0_playlist", ids(3).into_iter().map(MediaEntry::new).collect());
    let mut controller = PlaylistController::new(
        playlist,
        PlaylistConfig::default(),
        player,
        loader.clone(),
        Arc::new(DefaultDelegate),
        MessageBus::new(),
    );

    controller.play_next().unwrap();
    controller.settle().await;
    assert_eq!(loader.load_count(), 1);

    assert!(controller.preload_next());
    assert!(!controller.preload_next());
    assert_eq!(controller.preloading_ids(), vec![ids(3)[1].clone()]);

    controller.settle().await;
    assert_eq!(loader.load_count(), 2);
    assert!(controller.playlist().entries[1].has_sources());

    // Already resolved, nothing to preload
    assert!(!controller.preload_next());
}

#[tokio::test]
async fn test_stale_load_not_handed_to_player() {
    let loader = catalog(3).with_latency(Duration::from_millis(10));
    let (mut controller, player, _events) = setup(3, PlaylistConfig::default(), loader);

    controller.play_item(0).unwrap();
    controller.play_item(2).unwrap();
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(2));
    assert_eq!(player.applied_ids(), vec![ids(3)[2].clone()]);
    // Sources of the abandoned load are still kept
    assert!(controller.playlist().entries[0].has_sources());
}

// =============================================================================
// Countdown
// =============================================================================

#[tokio::test]
async fn test_countdown_start_once_and_elapse_advances() {
    let config = PlaylistConfig {
        countdown: CountdownOptions::new(10.0, 5.0),
        ..Default::default()
    };
    let (mut controller, _player, mut events) = setup(2, config, catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;
    drain(&mut events);

    for t in [80.0, 90.0, 91.0, 93.0] {
        controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: t });
    }
    controller.settle().await;

    let seen = drain(&mut events);
    assert_eq!(count(&seen, "countdown_start"), 1);
    assert_eq!(controller.current_index(), Some(0));

    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 95.0 });
    controller.settle().await;

    let seen = drain(&mut events);
    assert!(seen.contains(&PlaylistEvent::CountdownEnd {
        entry_id: ids(2)[0].clone(),
        reason: CountdownEndReason::Elapsed,
    }));
    assert_eq!(controller.current_index(), Some(1));
}

#[tokio::test]
async fn test_seek_back_cancels_countdown() {
    let (mut controller, _player, mut events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 92.0 });
    drain(&mut events);

    controller.handle_player_event(PlayerEvent::Seeking { target: 20.0 });

    assert_eq!(
        drain(&mut events),
        vec![PlaylistEvent::CountdownEnd {
            entry_id: ids(2)[0].clone(),
            reason: CountdownEndReason::Canceled,
        }]
    );
    assert!(!controller.countdown().unwrap().is_sent());
}

#[tokio::test]
async fn test_disable_countdown_emits_cancel() {
    let (mut controller, _player, mut events) = setup(2, PlaylistConfig::default(), catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 95.0 });
    drain(&mut events);

    controller.disable_countdown_for_current_item();
    controller.disable_countdown_for_current_item();

    assert_eq!(count(&drain(&mut events), "countdown_end"), 1);
    assert!(controller.countdown().is_none());

    // No countdown left to open
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 96.0 });
    assert_eq!(count(&drain(&mut events), "countdown_start"), 0);
}

#[tokio::test]
async fn test_end_after_countdown_elapse_does_not_skip() {
    let (mut controller, player, mut events) = setup(3, PlaylistConfig::default(), catalog(3));

    controller.play_next().unwrap();
    controller.settle().await;

    // Countdown opens and the next entry preloads
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 90.0 });
    controller.settle().await;
    assert!(controller.playlist().entries[1].has_sources());

    // Last playhead of the media elapses the countdown, then the engine reports its end
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 100.0 });
    controller.handle_player_event(PlayerEvent::Ended);
    controller.settle().await;

    assert_eq!(controller.current_index(), Some(1));
    assert_eq!(player.applied_ids(), ids(3)[..2].to_vec());
    let changes = drain(&mut events)
        .into_iter()
        .filter(|e| e.name() == "current_item_changed")
        .count();
    assert_eq!(changes, 2);

    // The new entry's own end still advances
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 10.0 });
    controller.handle_player_event(PlayerEvent::Ended);
    controller.settle().await;
    assert_eq!(controller.current_index(), Some(2));
}

#[tokio::test]
async fn test_seek_inside_window_restarts_elapse() {
    let config = PlaylistConfig {
        countdown: CountdownOptions::new(10.0, 5.0),
        ..Default::default()
    };
    let (mut controller, _player, mut events) = setup(2, config, catalog(2));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 91.0 });
    drain(&mut events);

    controller.handle_player_event(PlayerEvent::Seeking { target: 93.0 });
    assert!(drain(&mut events).is_empty());
    assert_eq!(controller.countdown().unwrap().sent_at(), Some(93.0));

    // Would have elapsed from the original start at 91
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 96.0 });
    assert_eq!(controller.current_index(), Some(0));
    assert!(drain(&mut events).is_empty());

    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 98.0 });
    controller.settle().await;

    let seen = drain(&mut events);
    assert_eq!(count(&seen, "countdown_start"), 0);
    assert!(seen.contains(&PlaylistEvent::CountdownEnd {
        entry_id: ids(2)[0].clone(),
        reason: CountdownEndReason::Elapsed,
    }));
    assert_eq!(controller.current_index(), Some(1));
}

#[tokio::test]
async fn test_end_without_advance_closes_countdown_as_elapsed() {
    let config = PlaylistConfig {
        auto_continue: false,
        ..Default::default()
    };
    let (mut controller, _player, mut events) = setup(3, config, catalog(3));

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 92.0 });
    drain(&mut events);

    controller.handle_player_event(PlayerEvent::Ended);

    assert_eq!(
        drain(&mut events),
        vec![PlaylistEvent::CountdownEnd {
            entry_id: ids(3)[0].clone(),
            reason: CountdownEndReason::Elapsed,
        }]
    );
    assert_eq!(controller.current_index(), Some(0));
}

struct PerEntryDelegate;

impl PlaylistDelegate for PerEntryDelegate {
    fn plugin_config(&self, entry: &MediaEntry, index: usize) -> Option<PluginConfig> {
        Some(PluginConfig::new().with_plugin(
            "ima",
            serde_json::json!({ "entry": entry.id, "position": index }),
        ))
    }

    fn countdown_options(&self, _entry: &MediaEntry, index: usize) -> Option<CountdownOptions> {
        (index == 0).then(CountdownOptions::disabled)
    }
}

#[tokio::test]
async fn test_delegate_overrides() {
    let player = MockPlayer::new();
    let bus = MessageBus::new();
    let mut events = bus.subscribe();
    let playlist = Playlist::new("0_playlist", ids(2).into_iter().map(MediaEntry::new).collect());
    let mut controller = PlaylistController::new(
        playlist,
        PlaylistConfig::default(),
        player.clone(),
        Arc::new(catalog(2)),
        Arc::new(PerEntryDelegate),
        bus,
    );

    controller.play_next().unwrap();
    controller.settle().await;
    controller.handle_player_event(PlayerEvent::PlayheadUpdate { current_time: 99.0 });
    assert_eq!(count(&drain(&mut events), "countdown_start"), 0);

    let applied = player.applied.lock().unwrap().clone();
    let config = applied[0].1.as_ref().unwrap();
    assert_eq!(config.plugins["ima"]["position"], 0);
}

// =============================================================================
// Service
// =============================================================================

#[tokio::test]
async fn test_service_drives_controller() {
    let (controller, player, _events) = setup(3, PlaylistConfig::default(), catalog(3));
    let (handle, _task) = PlaylistService::spawn(controller);
    let mut events = handle.subscribe();

    handle.play_next().await.unwrap();

    // Wait until the first entry is handed to the player
    loop {
        let snapshot = handle.snapshot().await.unwrap();
        if !snapshot.loading {
            assert_eq!(snapshot.current_index, Some(0));
            break;
        }
        tokio::task::yield_now().await;
    }

    player.emit(PlayerEvent::Ended);

    let changed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(PlaylistEvent::CurrentItemChanged { index, .. }) = events.recv().await {
                if index == 1 {
                    return index;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(changed, 1);

    handle.set_loop(true).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.loop_enabled);
    assert_eq!(snapshot.count, 3);

    let err = handle.play_item(9).await.unwrap_err();
    assert_eq!(err.error_code(), "INDEX_OUT_OF_RANGE");
}

#[tokio::test]
async fn test_service_stops_when_handles_dropped() {
    let (controller, _player, _events) = setup(1, PlaylistConfig::default(), catalog(1));
    let (handle, task) = PlaylistService::spawn(controller);

    drop(handle);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
