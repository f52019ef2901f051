//! Simulated media backend
//!
//! An in-memory `MediaBackend` for tests and demos. Nothing is decoded;
//! callers drive the timeline explicitly (probe completion, buffering,
//! stalls, end of item, host lifecycle) and inspect the recorded calls.
//!
//! `SimulatedBackend` is cheap to clone. Hand one clone to the core and keep
//! another to drive and inspect it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::backend::{
    BackendError, HostSignal, HostSink, MediaAsset, MediaBackend, MediaItem, MediaPlayer,
    ObservationSink, ObservedKey, ObservedValue, ProbeOutcome, ProbeSink,
};
use crate::types::{AssetKey, KeyStatus, ObjectId, Readiness, SubscriptionId, TimeRange, VideoRect, VideoSize};

/// Display surface identity; session objects are numbered from 1
pub const DISPLAY_ID: ObjectId = ObjectId(0);

/// A command the core issued to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateAsset(Url),
    LoadValues(ObjectId, Vec<AssetKey>),
    CancelLoading(ObjectId),
    CreateItem(ObjectId),
    CreatePlayer(ObjectId),
    Observe { object: ObjectId, key: ObservedKey },
    Unobserve { object: ObjectId, key: ObservedKey },
    Play(ObjectId),
    Pause(ObjectId),
    Seek(ObjectId, f64),
    CancelPendingSeeks(ObjectId),
    CancelPendingPrerolls(ObjectId),
    Bind(Option<ObjectId>),
    PreparePictureInPicture,
    SetVolume(ObjectId, f32),
    SetMuted(ObjectId, bool),
}

#[derive(Debug)]
struct SimState {
    next_object: u64,
    next_subscription: u64,
    calls: Vec<BackendCall>,

    /// Probes not yet completed, kept after cancellation to model late callbacks
    pending_probes: Vec<ProbeSink>,
    subscriptions: BTreeMap<SubscriptionId, ObservationSink>,
    retired: Vec<ObservationSink>,
    subscribe_count: usize,
    unsubscribe_count: usize,

    display_sinks: BTreeMap<SubscriptionId, ObservationSink>,
    lifecycle_sinks: BTreeMap<SubscriptionId, HostSink>,

    latest_asset: Option<ObjectId>,
    latest_item: Option<ObjectId>,
    latest_player: Option<ObjectId>,
    bound_player: Option<ObjectId>,

    duration: f64,
    current_time: f64,
    rate: f32,
    likely_to_keep_up: bool,
    natural_size: Option<VideoSize>,
    video_rect: VideoRect,
    ready_for_display: bool,

    picture_in_picture_supported: bool,
    fail_player_construction: bool,
    fail_cancellation: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            next_object: DISPLAY_ID.0 + 1,
            next_subscription: 1,
            calls: Vec::new(),
            pending_probes: Vec::new(),
            subscriptions: BTreeMap::new(),
            retired: Vec::new(),
            subscribe_count: 0,
            unsubscribe_count: 0,
            display_sinks: BTreeMap::new(),
            lifecycle_sinks: BTreeMap::new(),
            latest_asset: None,
            latest_item: None,
            latest_player: None,
            bound_player: None,
            duration: 60.0,
            current_time: 0.0,
            rate: 0.0,
            likely_to_keep_up: true,
            natural_size: Some(VideoSize::new(1920.0, 1080.0)),
            video_rect: VideoRect::new(0.0, 0.0, 1920.0, 1080.0),
            ready_for_display: false,
            picture_in_picture_supported: false,
            fail_player_construction: false,
            fail_cancellation: false,
        }
    }
}

impl SimState {
    fn next_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }

    fn next_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    fn cancellation(&self, what: &str) -> Result<(), BackendError> {
        if self.fail_cancellation {
            Err(BackendError::Cancellation(format!("simulated {what} failure")))
        } else {
            Ok(())
        }
    }

    fn observe(&mut self, sink: ObservationSink) -> SubscriptionId {
        let id = self.next_subscription();
        self.calls.push(BackendCall::Observe {
            object: sink.tag().object,
            key: sink.tag().key,
        });
        self.subscriptions.insert(id, sink);
        self.subscribe_count += 1;
        id
    }

    fn unobserve(&mut self, object: ObjectId, id: SubscriptionId) -> Result<(), BackendError> {
        match self.subscriptions.get(&id) {
            Some(sink) if sink.tag().object == object => {}
            _ => return Err(BackendError::UnknownSubscription(id)),
        }

        if let Some(sink) = self.subscriptions.remove(&id) {
            self.calls.push(BackendCall::Unobserve {
                object,
                key: sink.tag().key,
            });
            self.retired.push(sink);
            self.unsubscribe_count += 1;
        }
        Ok(())
    }

    /// Deliver to the active subscription on (object, key), falling back to
    /// a removed one to model a callback racing its own teardown
    fn emit(&self, object: ObjectId, key: ObservedKey, value: ObservedValue) -> bool {
        let matches = |sink: &&ObservationSink| sink.tag().object == object && sink.tag().key == key;

        if let Some(sink) = self.subscriptions.values().find(matches) {
            return sink.emit(value);
        }
        match self.retired.iter().rev().find(matches) {
            Some(sink) => sink.emit(value),
            None => false,
        }
    }

    fn set_rate(&mut self, player: ObjectId, rate: f32) {
        if self.rate != rate {
            self.rate = rate;
            self.emit(player, ObservedKey::Rate, ObservedValue::Rate(rate));
        }
    }
}

/// In-memory backend driven by tests
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- configuration --

    pub fn fail_player_construction(&self, fail: bool) {
        self.lock().fail_player_construction = fail;
    }

    pub fn fail_cancellation(&self, fail: bool) {
        self.lock().fail_cancellation = fail;
    }

    pub fn set_picture_in_picture_supported(&self, supported: bool) {
        self.lock().picture_in_picture_supported = supported;
    }

    pub fn set_duration(&self, seconds: f64) {
        self.lock().duration = seconds;
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.lock().current_time = seconds;
    }

    pub fn set_likely_to_keep_up(&self, likely: bool) {
        self.lock().likely_to_keep_up = likely;
    }

    pub fn set_natural_size(&self, size: Option<VideoSize>) {
        self.lock().natural_size = size;
    }

    // -- driving the timeline --

    /// Complete the most recent pending probe
    pub fn complete_probe(&self, outcome: ProbeOutcome) -> bool {
        let sink = self.lock().pending_probes.pop();
        sink.map(|sink| sink.complete(outcome)).unwrap_or(false)
    }

    /// Complete the pending probe of a specific asset
    pub fn complete_probe_for(&self, asset: ObjectId, outcome: ProbeOutcome) -> bool {
        let sink = {
            let mut state = self.lock();
            let position = state.pending_probes.iter().position(|sink| sink.asset() == asset);
            position.map(|index| state.pending_probes.remove(index))
        };
        sink.map(|sink| sink.complete(outcome)).unwrap_or(false)
    }

    /// Complete the most recent probe with every required key loaded
    pub fn resolve_probe(&self) -> bool {
        self.complete_probe(ProbeOutcome::Resolved(
            AssetKey::REQUIRED
                .iter()
                .map(|key| (*key, KeyStatus::Loaded))
                .collect(),
        ))
    }

    /// Deliver a raw observation for (object, key)
    pub fn emit(&self, object: ObjectId, key: ObservedKey, value: ObservedValue) -> bool {
        self.lock().emit(object, key, value)
    }

    pub fn report_readiness(&self, readiness: Readiness) -> bool {
        let state = self.lock();
        match state.latest_player {
            Some(player) => state.emit(player, ObservedKey::Status, ObservedValue::Readiness(readiness)),
            None => false,
        }
    }

    /// Set the transport rate of the latest player and report it
    pub fn report_rate(&self, rate: f32) -> bool {
        let mut state = self.lock();
        let Some(player) = state.latest_player else {
            return false;
        };
        state.rate = rate;
        state.emit(player, ObservedKey::Rate, ObservedValue::Rate(rate))
    }

    pub fn report_buffered(&self, ranges: Vec<TimeRange>) -> bool {
        self.report_item(ObservedKey::LoadedTimeRanges, ObservedValue::TimeRanges(ranges))
    }

    /// Item played to its end; the transport rate drops to zero first
    pub fn report_ended(&self) -> bool {
        let mut state = self.lock();
        state.current_time = state.duration;
        if let Some(player) = state.latest_player {
            state.set_rate(player, 0.0);
        }
        drop(state);
        self.report_item(ObservedKey::DidPlayToEnd, ObservedValue::Notified)
    }

    /// Playback ran out of buffer; the transport rate drops to zero first
    pub fn report_stalled(&self) -> bool {
        let mut state = self.lock();
        state.likely_to_keep_up = false;
        if let Some(player) = state.latest_player {
            state.set_rate(player, 0.0);
        }
        drop(state);
        self.report_item(ObservedKey::PlaybackStalled, ObservedValue::Notified)
    }

    fn report_item(&self, key: ObservedKey, value: ObservedValue) -> bool {
        let state = self.lock();
        match state.latest_item {
            Some(item) => state.emit(item, key, value),
            None => false,
        }
    }

    pub fn set_ready_for_display(&self, ready: bool) {
        let mut state = self.lock();
        state.ready_for_display = ready;
        for sink in state.display_sinks.values() {
            sink.emit(ObservedValue::Flag(ready));
        }
    }

    pub fn enter_background(&self) {
        self.signal(HostSignal::DidEnterBackground);
    }

    pub fn enter_foreground(&self) {
        self.signal(HostSignal::WillEnterForeground);
    }

    fn signal(&self, signal: HostSignal) {
        for sink in self.lock().lifecycle_sinks.values() {
            sink.signal(signal);
        }
    }

    // -- inspection --

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Item and player subscriptions ever accepted
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    /// Item and player subscriptions ever removed
    pub fn unsubscribe_count(&self) -> usize {
        self.lock().unsubscribe_count
    }

    /// Item and player subscriptions currently registered
    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Display and lifecycle subscriptions currently registered
    pub fn host_subscriptions(&self) -> usize {
        let state = self.lock();
        state.display_sinks.len() + state.lifecycle_sinks.len()
    }

    pub fn pending_probes(&self) -> usize {
        self.lock().pending_probes.len()
    }

    pub fn latest_asset(&self) -> Option<ObjectId> {
        self.lock().latest_asset
    }

    pub fn latest_item(&self) -> Option<ObjectId> {
        self.lock().latest_item
    }

    pub fn latest_player(&self) -> Option<ObjectId> {
        self.lock().latest_player
    }

    pub fn current_rate(&self) -> f32 {
        self.lock().rate
    }
}

impl MediaBackend for SimulatedBackend {
    type Asset = SimAsset;
    type Item = SimItem;
    type Player = SimPlayer;

    fn create_asset(&mut self, url: &Url) -> SimAsset {
        let mut state = self.lock();
        let id = state.next_object();
        state.calls.push(BackendCall::CreateAsset(url.clone()));
        state.latest_asset = Some(id);
        SimAsset {
            id,
            state: Arc::clone(&self.state),
        }
    }

    fn create_item(&mut self, asset: &SimAsset) -> Result<SimItem, BackendError> {
        let mut state = self.lock();
        let id = state.next_object();
        state.calls.push(BackendCall::CreateItem(asset.id));
        state.latest_item = Some(id);
        state.current_time = 0.0;
        state.rate = 0.0;
        Ok(SimItem {
            id,
            state: Arc::clone(&self.state),
        })
    }

    fn create_player(&mut self, item: &SimItem) -> Result<SimPlayer, BackendError> {
        let mut state = self.lock();
        if state.fail_player_construction {
            return Err(BackendError::Construction {
                what: "player",
                reason: format!("simulated failure for {}", item.id),
            });
        }

        let id = state.next_object();
        state.calls.push(BackendCall::CreatePlayer(item.id));
        state.latest_player = Some(id);
        Ok(SimPlayer {
            id,
            state: Arc::clone(&self.state),
        })
    }

    fn display_id(&self) -> ObjectId {
        DISPLAY_ID
    }

    fn bind_player(&mut self, player: Option<&SimPlayer>) {
        let mut state = self.lock();
        let id = player.map(|player| player.id);
        state.calls.push(BackendCall::Bind(id));
        state.bound_player = id;
    }

    fn bound_player(&self) -> Option<ObjectId> {
        self.lock().bound_player
    }

    fn is_ready_for_display(&self) -> bool {
        self.lock().ready_for_display
    }

    fn video_rect(&self) -> VideoRect {
        let state = self.lock();
        if state.bound_player.is_some() {
            state.video_rect
        } else {
            VideoRect::ZERO
        }
    }

    fn observe_display(&mut self, sink: ObservationSink) -> Result<SubscriptionId, BackendError> {
        let mut state = self.lock();
        let id = state.next_subscription();
        state.display_sinks.insert(id, sink);
        Ok(id)
    }

    fn unobserve_display(&mut self, subscription: SubscriptionId) -> Result<(), BackendError> {
        self.lock()
            .display_sinks
            .remove(&subscription)
            .map(|_| ())
            .ok_or(BackendError::UnknownSubscription(subscription))
    }

    fn supports_picture_in_picture(&self) -> bool {
        self.lock().picture_in_picture_supported
    }

    fn prepare_picture_in_picture(&mut self) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.picture_in_picture_supported {
            return Err(BackendError::Unavailable("picture-in-picture".to_string()));
        }
        state.calls.push(BackendCall::PreparePictureInPicture);
        Ok(())
    }

    fn observe_lifecycle(&mut self, sink: HostSink) -> Result<SubscriptionId, BackendError> {
        let mut state = self.lock();
        let id = state.next_subscription();
        state.lifecycle_sinks.insert(id, sink);
        Ok(id)
    }

    fn unobserve_lifecycle(&mut self, subscription: SubscriptionId) -> Result<(), BackendError> {
        self.lock()
            .lifecycle_sinks
            .remove(&subscription)
            .map(|_| ())
            .ok_or(BackendError::UnknownSubscription(subscription))
    }
}

/// Simulated asset handle
#[derive(Debug)]
pub struct SimAsset {
    id: ObjectId,
    state: Arc<Mutex<SimState>>,
}

impl SimAsset {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaAsset for SimAsset {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn load_values_async(&self, keys: &[AssetKey], completion: ProbeSink) {
        let mut state = self.lock();
        state.calls.push(BackendCall::LoadValues(self.id, keys.to_vec()));
        state.pending_probes.push(completion);
    }

    fn cancel_loading(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CancelLoading(self.id));
        state.cancellation("asset loading")
    }

    fn natural_size(&self) -> Option<VideoSize> {
        self.lock().natural_size
    }
}

/// Simulated item handle
#[derive(Debug)]
pub struct SimItem {
    id: ObjectId,
    state: Arc<Mutex<SimState>>,
}

impl SimItem {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaItem for SimItem {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn observe(&self, sink: ObservationSink) -> Result<SubscriptionId, BackendError> {
        Ok(self.lock().observe(sink))
    }

    fn unobserve(&self, subscription: SubscriptionId) -> Result<(), BackendError> {
        self.lock().unobserve(self.id, subscription)
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn is_playback_likely_to_keep_up(&self) -> bool {
        self.lock().likely_to_keep_up
    }

    fn cancel_pending_seeks(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CancelPendingSeeks(self.id));
        state.cancellation("pending seeks")
    }
}

/// Simulated player handle. Transport commands report their rate change
/// through the player's rate subscription.
#[derive(Debug)]
pub struct SimPlayer {
    id: ObjectId,
    state: Arc<Mutex<SimState>>,
}

impl SimPlayer {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaPlayer for SimPlayer {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn observe(&self, sink: ObservationSink) -> Result<SubscriptionId, BackendError> {
        Ok(self.lock().observe(sink))
    }

    fn unobserve(&self, subscription: SubscriptionId) -> Result<(), BackendError> {
        self.lock().unobserve(self.id, subscription)
    }

    fn play(&self) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Play(self.id));
        state.likely_to_keep_up = true;
        state.set_rate(self.id, 1.0);
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Pause(self.id));
        state.set_rate(self.id, 0.0);
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Seek(self.id, seconds));
        state.current_time = seconds;
    }

    fn cancel_pending_prerolls(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CancelPendingPrerolls(self.id));
        state.cancellation("pending prerolls")
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn rate(&self) -> f32 {
        self.lock().rate
    }

    fn set_volume(&self, volume: f32) {
        self.lock().calls.push(BackendCall::SetVolume(self.id, volume));
    }

    fn set_muted(&self, muted: bool) {
        self.lock().calls.push(BackendCall::SetMuted(self.id, muted));
    }
}
