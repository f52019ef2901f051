//! Event normalizer
//!
//! Backend callbacks arrive as raw envelopes (an observation, a probe
//! completion or a host signal). This module reduces them into the
//! uniform `CoreEvent` vocabulary consumed by the state machine, checking
//! along the way that each observation comes from the object the core
//! actually subscribed to.

use crate::backend::{HostSignal, ObservationTag, ObservedKey, ObservedValue, ProbeOutcome};
use crate::error::InvariantViolation;
use crate::types::{AssetKey, ObjectId, Readiness, SessionToken, TimeRange};

/// Scope an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOrigin {
    /// Host-scoped sources that outlive sessions (display surface, app lifecycle)
    Host,
    /// Objects created for one session
    Session(SessionToken),
}

impl EventOrigin {
    pub fn scope_name(&self) -> &'static str {
        match self {
            EventOrigin::Host => "host",
            EventOrigin::Session(_) => "session",
        }
    }
}

/// Raw message queued by a backend sink for the owner context
#[derive(Debug, Clone)]
pub enum Envelope {
    Observation {
        tag: ObservationTag,
        value: ObservedValue,
    },
    ProbeCompleted {
        token: SessionToken,
        asset: ObjectId,
        outcome: ProbeOutcome,
    },
    Host(HostSignal),
}

/// Normalized event applied by the core
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    AssetProbeCompleted {
        succeeded: bool,
        failed_keys: Vec<AssetKey>,
    },
    /// Duration of the earliest buffered range, `None` when nothing is buffered
    BufferedRangeChanged { range_duration: Option<f64> },
    PlayerReadinessChanged { readiness: Readiness },
    RateChanged { rate: f32 },
    ItemEnded,
    PlaybackStalled,
    DisplayReady { ready: bool },
    AppBackgrounded,
    AppForegrounded,
}

impl CoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::AssetProbeCompleted { .. } => "asset_probe_completed",
            CoreEvent::BufferedRangeChanged { .. } => "buffered_range_changed",
            CoreEvent::PlayerReadinessChanged { .. } => "player_readiness_changed",
            CoreEvent::RateChanged { .. } => "rate_changed",
            CoreEvent::ItemEnded => "item_ended",
            CoreEvent::PlaybackStalled => "playback_stalled",
            CoreEvent::DisplayReady { .. } => "display_ready",
            CoreEvent::AppBackgrounded => "app_backgrounded",
            CoreEvent::AppForegrounded => "app_foregrounded",
        }
    }

    /// Events produced by sources that outlive sessions
    pub fn is_host_scoped(&self) -> bool {
        matches!(
            self,
            CoreEvent::DisplayReady { .. } | CoreEvent::AppBackgrounded | CoreEvent::AppForegrounded
        )
    }

    /// Reject events delivered in the wrong scope
    pub fn check_scope(&self, origin: EventOrigin) -> Result<(), InvariantViolation> {
        let host_origin = matches!(origin, EventOrigin::Host);
        if self.is_host_scoped() == host_origin {
            Ok(())
        } else {
            Err(InvariantViolation::WrongScope {
                event: self.name(),
                scope: origin.scope_name(),
            })
        }
    }
}

/// Objects the core currently holds subscriptions on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedObjects {
    pub session: Option<SessionToken>,
    pub asset: Option<ObjectId>,
    pub item: Option<ObjectId>,
    pub player: Option<ObjectId>,
    pub display: ObjectId,
}

impl TrackedObjects {
    fn is_current(&self, origin: EventOrigin) -> bool {
        match origin {
            EventOrigin::Host => true,
            EventOrigin::Session(token) => self.session == Some(token),
        }
    }

    fn expected_for(&self, key: ObservedKey) -> Option<ObjectId> {
        match key {
            ObservedKey::LoadedTimeRanges | ObservedKey::DidPlayToEnd | ObservedKey::PlaybackStalled => {
                self.item
            }
            ObservedKey::Status | ObservedKey::Rate => self.player,
            ObservedKey::ReadyForDisplay => Some(self.display),
        }
    }
}

/// Duration of the earliest buffered range
pub fn earliest_range_duration(ranges: &[TimeRange]) -> Option<f64> {
    ranges
        .iter()
        .min_by(|a, b| a.start.total_cmp(&b.start))
        .map(|range| range.duration)
}

/// Reduce an envelope into a scoped core event.
///
/// Object identity is only verified for the current session: observations
/// from a superseded session are mapped and left for the caller to drop.
pub fn normalize(
    envelope: Envelope,
    tracked: &TrackedObjects,
) -> Result<(EventOrigin, CoreEvent), InvariantViolation> {
    match envelope {
        Envelope::Host(HostSignal::DidEnterBackground) => {
            Ok((EventOrigin::Host, CoreEvent::AppBackgrounded))
        }
        Envelope::Host(HostSignal::WillEnterForeground) => {
            Ok((EventOrigin::Host, CoreEvent::AppForegrounded))
        }
        Envelope::ProbeCompleted {
            token,
            asset,
            outcome,
        } => {
            let origin = EventOrigin::Session(token);
            if tracked.is_current(origin) && tracked.asset != Some(asset) {
                return Err(InvariantViolation::UnexpectedObject {
                    subject: "probe",
                    object: asset,
                    expected: tracked.asset,
                });
            }

            let failed_keys = outcome.failed_keys();
            Ok((
                origin,
                CoreEvent::AssetProbeCompleted {
                    succeeded: failed_keys.is_empty(),
                    failed_keys,
                },
            ))
        }
        Envelope::Observation { tag, value } => {
            let event = map_observation(tag.key, value)?;
            event.check_scope(tag.origin)?;

            if tracked.is_current(tag.origin) {
                let expected = tracked.expected_for(tag.key);
                if expected != Some(tag.object) {
                    return Err(InvariantViolation::UnexpectedObject {
                        subject: tag.key.as_str(),
                        object: tag.object,
                        expected,
                    });
                }
            }

            Ok((tag.origin, event))
        }
    }
}

fn map_observation(key: ObservedKey, value: ObservedValue) -> Result<CoreEvent, InvariantViolation> {
    match (key, value) {
        (ObservedKey::LoadedTimeRanges, ObservedValue::TimeRanges(ranges)) => {
            Ok(CoreEvent::BufferedRangeChanged {
                range_duration: earliest_range_duration(&ranges),
            })
        }
        (ObservedKey::DidPlayToEnd, ObservedValue::Notified) => Ok(CoreEvent::ItemEnded),
        (ObservedKey::PlaybackStalled, ObservedValue::Notified) => Ok(CoreEvent::PlaybackStalled),
        (ObservedKey::Status, ObservedValue::Readiness(readiness)) => {
            Ok(CoreEvent::PlayerReadinessChanged { readiness })
        }
        (ObservedKey::Rate, ObservedValue::Rate(rate)) => Ok(CoreEvent::RateChanged { rate }),
        (ObservedKey::ReadyForDisplay, ObservedValue::Flag(ready)) => {
            Ok(CoreEvent::DisplayReady { ready })
        }
        (key, value) => Err(InvariantViolation::UnexpectedValue {
            key,
            value: value.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyStatus;

    fn tracked(session: SessionToken) -> TrackedObjects {
        TrackedObjects {
            session: Some(session),
            asset: Some(ObjectId(1)),
            item: Some(ObjectId(2)),
            player: Some(ObjectId(3)),
            display: ObjectId(0),
        }
    }

    fn observation(origin: EventOrigin, object: u64, key: ObservedKey, value: ObservedValue) -> Envelope {
        Envelope::Observation {
            tag: ObservationTag {
                origin,
                object: ObjectId(object),
                key,
            },
            value,
        }
    }

    #[test]
    fn test_rate_observation() {
        let token = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(token),
            3,
            ObservedKey::Rate,
            ObservedValue::Rate(1.0),
        );

        let (origin, event) = normalize(envelope, &tracked(token)).unwrap();
        assert_eq!(origin, EventOrigin::Session(token));
        assert_eq!(event, CoreEvent::RateChanged { rate: 1.0 });
    }

    #[test]
    fn test_buffered_range_uses_earliest_range() {
        let token = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(token),
            2,
            ObservedKey::LoadedTimeRanges,
            ObservedValue::TimeRanges(vec![TimeRange::new(30.0, 2.0), TimeRange::new(0.0, 6.0)]),
        );

        let (_, event) = normalize(envelope, &tracked(token)).unwrap();
        assert_eq!(
            event,
            CoreEvent::BufferedRangeChanged {
                range_duration: Some(6.0)
            }
        );

        assert_eq!(earliest_range_duration(&[]), None);
    }

    #[test]
    fn test_probe_completion() {
        let token = SessionToken::new();
        let envelope = Envelope::ProbeCompleted {
            token,
            asset: ObjectId(1),
            outcome: ProbeOutcome::Resolved(vec![
                (AssetKey::Playable, KeyStatus::Loaded),
                (AssetKey::Duration, KeyStatus::Failed),
            ]),
        };

        let (_, event) = normalize(envelope, &tracked(token)).unwrap();
        assert_eq!(
            event,
            CoreEvent::AssetProbeCompleted {
                succeeded: false,
                failed_keys: vec![AssetKey::Duration],
            }
        );
    }

    #[test]
    fn test_observation_from_untracked_object_is_violation() {
        let token = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(token),
            99,
            ObservedKey::Rate,
            ObservedValue::Rate(1.0),
        );

        let err = normalize(envelope, &tracked(token)).unwrap_err();
        assert!(matches!(err, InvariantViolation::UnexpectedObject { .. }));
    }

    #[test]
    fn test_superseded_observation_skips_identity_check() {
        let stale = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(stale),
            99,
            ObservedKey::Rate,
            ObservedValue::Rate(0.0),
        );

        let (origin, _) = normalize(envelope, &tracked(SessionToken::new())).unwrap();
        assert_eq!(origin, EventOrigin::Session(stale));
    }

    #[test]
    fn test_mismatched_value_is_violation() {
        let token = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(token),
            3,
            ObservedKey::Rate,
            ObservedValue::Flag(true),
        );

        assert_eq!(
            normalize(envelope, &tracked(token)).unwrap_err(),
            InvariantViolation::UnexpectedValue {
                key: ObservedKey::Rate,
                value: "flag",
            }
        );
    }

    #[test]
    fn test_display_readiness_must_be_host_scoped() {
        let token = SessionToken::new();
        let envelope = observation(
            EventOrigin::Session(token),
            0,
            ObservedKey::ReadyForDisplay,
            ObservedValue::Flag(true),
        );
        assert!(matches!(
            normalize(envelope, &tracked(token)),
            Err(InvariantViolation::WrongScope { .. })
        ));

        let envelope = observation(
            EventOrigin::Host,
            0,
            ObservedKey::ReadyForDisplay,
            ObservedValue::Flag(true),
        );
        let (origin, event) = normalize(envelope, &tracked(token)).unwrap();
        assert_eq!(origin, EventOrigin::Host);
        assert_eq!(event, CoreEvent::DisplayReady { ready: true });
    }

    #[test]
    fn test_host_signals() {
        let tracked = tracked(SessionToken::new());
        let (_, event) = normalize(Envelope::Host(HostSignal::DidEnterBackground), &tracked).unwrap();
        assert_eq!(event, CoreEvent::AppBackgrounded);
        let (_, event) = normalize(Envelope::Host(HostSignal::WillEnterForeground), &tracked).unwrap();
        assert_eq!(event, CoreEvent::AppForegrounded);
    }
}
