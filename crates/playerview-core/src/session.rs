//! Session lifecycle - the asset -> item -> player pipeline of one `load()`
//!
//! Coordinates:
//! - Asset creation and asynchronous key probing
//! - Item and player construction once the probe succeeds
//! - Property subscriptions, keyed by (object, key) for symmetric teardown
//! - Best-effort cancellation of probes, seeks and prerolls

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{
    BackendError, MediaAsset, MediaBackend, MediaItem, MediaPlayer, ObservationSink,
    ObservationTag, ObservedKey, ProbeSink,
};
use crate::config::PlayerConfig;
use crate::events::{Envelope, EventOrigin};
use crate::types::{AssetKey, ObjectId, SessionToken, SubscriptionId};

/// Active subscriptions of one session
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: BTreeMap<(ObjectId, ObservedKey), SubscriptionId>,
}

impl Subscriptions {
    /// Record a subscription; returns the handle it replaced, if any
    fn insert(&mut self, object: ObjectId, key: ObservedKey, id: SubscriptionId) -> Option<SubscriptionId> {
        self.entries.insert((object, key), id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, object: ObjectId, key: ObservedKey) -> bool {
        self.entries.contains_key(&(object, key))
    }

    fn drain(&mut self) -> Vec<(ObjectId, ObservedKey, SubscriptionId)> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|((object, key), id)| (object, key, id))
            .collect()
    }
}

/// Where a session is in its setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Waiting for the asset probe
    Probing,
    /// Item and player are built and observed
    Active,
    /// Probe or construction failed
    Failed,
}

/// Counters from a session teardown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub cancelled: usize,
    pub unsubscribed: usize,
    pub failures: usize,
}

/// One load-to-clear playback session
pub struct Session<B: MediaBackend> {
    token: SessionToken,
    url: Url,
    stage: SessionStage,
    asset: B::Asset,
    item: Option<B::Item>,
    player: Option<B::Player>,
    subscriptions: Subscriptions,
}

impl<B: MediaBackend> Session<B> {
    /// Create the asset for `url` and start probing its required keys
    pub(crate) fn begin(backend: &mut B, url: Url, tx: &mpsc::UnboundedSender<Envelope>) -> Self {
        let token = SessionToken::new();
        let asset = backend.create_asset(&url);

        info!(session = %token, url = %url, asset = %asset.id(), "Probing asset");
        asset.load_values_async(
            &AssetKey::REQUIRED,
            ProbeSink::new(token, asset.id(), tx.clone()),
        );

        Self {
            token,
            url,
            stage: SessionStage::Probing,
            asset,
            item: None,
            player: None,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn asset(&self) -> &B::Asset {
        &self.asset
    }

    pub fn item(&self) -> Option<&B::Item> {
        self.item.as_ref()
    }

    pub fn player(&self) -> Option<&B::Player> {
        self.player.as_ref()
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub(crate) fn mark_failed(&mut self) {
        self.stage = SessionStage::Failed;
    }

    /// Build and observe the item and player after a successful probe.
    ///
    /// Objects are stored as soon as they exist so a failure halfway still
    /// leaves every created subscription reachable by `teardown`.
    pub(crate) fn build(
        &mut self,
        backend: &mut B,
        config: &PlayerConfig,
        tx: &mpsc::UnboundedSender<Envelope>,
    ) -> Result<(), BackendError> {
        let origin = EventOrigin::Session(self.token);

        let item = self.item.insert(backend.create_item(&self.asset)?);
        for key in ObservedKey::ITEM {
            let sink = ObservationSink::new(tag(origin, item.id(), key), tx.clone());
            let id = item.observe(sink)?;
            record(&mut self.subscriptions, item.id(), key, id);
        }

        let player = backend.create_player(item)?;
        player.set_volume(config.volume);
        player.set_muted(config.muted);

        let player = self.player.insert(player);
        for key in ObservedKey::PLAYER {
            let sink = ObservationSink::new(tag(origin, player.id(), key), tx.clone());
            let id = player.observe(sink)?;
            record(&mut self.subscriptions, player.id(), key, id);
        }

        self.stage = SessionStage::Active;
        debug!(
            session = %self.token,
            item = %item_id(&self.item),
            player = %player.id(),
            subscriptions = self.subscriptions.len(),
            "Session pipeline built"
        );

        Ok(())
    }

    /// Cancel pending work and remove every subscription.
    ///
    /// Each step is attempted even when an earlier one fails; failures are
    /// logged and counted, never propagated.
    pub(crate) fn teardown(mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let token = self.token;

        let attempt = |what: &'static str, result: Result<(), BackendError>, report: &mut TeardownReport| {
            match result {
                Ok(()) => report.cancelled += 1,
                Err(e) => {
                    warn!(session = %token, error = %e, "Failed to cancel {}", what);
                    report.failures += 1;
                }
            }
        };

        attempt("asset loading", self.asset.cancel_loading(), &mut report);
        if let Some(item) = &self.item {
            attempt("pending seeks", item.cancel_pending_seeks(), &mut report);
        }
        if let Some(player) = &self.player {
            attempt("pending prerolls", player.cancel_pending_prerolls(), &mut report);
        }

        for (object, key, id) in self.subscriptions.drain() {
            let result = match (&self.item, &self.player) {
                (Some(item), _) if item.id() == object => item.unobserve(id),
                (_, Some(player)) if player.id() == object => player.unobserve(id),
                _ => Err(BackendError::UnknownSubscription(id)),
            };

            match result {
                Ok(()) => report.unsubscribed += 1,
                Err(e) => {
                    warn!(session = %token, %object, %key, error = %e, "Failed to remove subscription");
                    report.failures += 1;
                }
            }
        }

        info!(
            session = %token,
            unsubscribed = report.unsubscribed,
            failures = report.failures,
            "Session torn down"
        );

        report
    }
}

fn tag(origin: EventOrigin, object: ObjectId, key: ObservedKey) -> ObservationTag {
    ObservationTag { origin, object, key }
}

fn record(subscriptions: &mut Subscriptions, object: ObjectId, key: ObservedKey, id: SubscriptionId) {
    if let Some(replaced) = subscriptions.insert(object, key, id) {
        warn!(%object, %key, %replaced, "Replaced an existing subscription");
    }
}

fn item_id<I: MediaItem>(item: &Option<I>) -> String {
    item.as_ref()
        .map(|item| item.id().to_string())
        .unwrap_or_else(|| "none".to_string())
}
