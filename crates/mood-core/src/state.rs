//! Observed state of a session.
//!
//! All locally held collections live in one [`Snapshot`] owned by a
//! [`SyncState`]. Mutations go through the state's methods only, and every
//! applied change bumps `version` and wakes subscribers. Readers never see a
//! half-applied update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use mood_types::models::{Mood, ReactionMap, UserProfile, Username};
use tokio::sync::watch;
use tracing::debug;

/// A locally held collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Caller's bounded "latest" timeline.
    OwnLatest,
    /// Partner's bounded "latest" timeline.
    PartnerLatest,
    /// Unbounded timeline of one uploader ("view all").
    Expanded,
    /// Unfiltered global feed.
    Feed,
    /// Caller's reaction cache.
    Reactions,
}

/// Upper bound on remembered deletions.
const MAX_TOMBSTONES: usize = 1024;

const TIMELINES: [View; 4] = [View::OwnLatest, View::PartnerLatest, View::Expanded, View::Feed];

/// Issued when a fetch starts. A completion only lands if no fetch issued
/// later for the same view has already landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub version: u64,
    pub profile: Option<UserProfile>,
    pub own_latest: Vec<Mood>,
    pub partner_latest: Vec<Mood>,
    pub expanded: Vec<Mood>,
    pub expanded_uploader: Option<Username>,
    pub feed: Vec<Mood>,
    pub reactions: ReactionMap,
    applied: HashMap<View, Ticket>,
    /// Deleted mood ids, each with the first ticket issued after its delete.
    /// Results from fetches issued earlier may still carry the mood.
    tombstones: HashMap<String, Ticket>,
}

impl Snapshot {
    pub fn moods(&self, view: View) -> &[Mood] {
        match view {
            View::OwnLatest => &self.own_latest,
            View::PartnerLatest => &self.partner_latest,
            View::Expanded => &self.expanded,
            View::Feed => &self.feed,
            View::Reactions => &[],
        }
    }

    fn moods_mut(&mut self, view: View) -> Option<&mut Vec<Mood>> {
        match view {
            View::OwnLatest => Some(&mut self.own_latest),
            View::PartnerLatest => Some(&mut self.partner_latest),
            View::Expanded => Some(&mut self.expanded),
            View::Feed => Some(&mut self.feed),
            View::Reactions => None,
        }
    }

    /// Whether any timeline view currently holds the mood.
    pub fn contains_mood(&self, id: &str) -> bool {
        TIMELINES
            .iter()
            .any(|v| self.moods(*v).iter().any(|m| m.id == id))
    }

    /// Cached media for one of the caller's emojis, in upload order.
    pub fn media(&self, emoji: &str) -> &[String] {
        self.reactions
            .get(emoji)
            .map(|r| r.media_urls.as_slice())
            .unwrap_or(&[])
    }

    /// The reaction gallery: each palette emoji with its media. Emojis without
    /// media come back with an empty slice.
    pub fn gallery<'a>(&'a self, palette: &'a [String]) -> Vec<(&'a str, &'a [String])> {
        palette
            .iter()
            .map(|emoji| (emoji.as_str(), self.media(emoji)))
            .collect()
    }

    fn is_stale(&self, view: View, ticket: Ticket) -> bool {
        self.applied.get(&view).is_some_and(|last| *last > ticket)
    }

    fn is_buried(&self, id: &str, ticket: Ticket) -> bool {
        self.tombstones.get(id).is_some_and(|after| ticket < *after)
    }

    /// Forget deletions no pending result can bring back: every timeline has
    /// applied a ticket issued after the delete. Beyond the cap the oldest
    /// deletions go first.
    fn prune_tombstones(&mut self) {
        let settled = TIMELINES
            .iter()
            .map(|v| self.applied.get(v).copied())
            .min()
            .flatten();
        if let Some(settled) = settled {
            self.tombstones.retain(|_, after| *after > settled);
        }
        while self.tombstones.len() > MAX_TOMBSTONES {
            let Some(oldest) = self
                .tombstones
                .iter()
                .min_by_key(|(_, after)| **after)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.tombstones.remove(&oldest);
        }
    }
}

/// Single owner of a session's [`Snapshot`].
pub struct SyncState {
    tx: watch::Sender<Snapshot>,
    next_ticket: AtomicU64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            tx,
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Read the current snapshot in place. Keep `f` short, it holds the
    /// read lock.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn set_profile(&self, profile: UserProfile) {
        self.tx.send_if_modified(|snap| {
            if snap.profile.as_ref() == Some(&profile) {
                return false;
            }
            snap.profile = Some(profile);
            snap.version += 1;
            true
        });
    }

    /// Replace a timeline view. Returns false when the result was stale.
    pub(crate) fn apply_moods(&self, view: View, ticket: Ticket, moods: Vec<Mood>) -> bool {
        self.apply_view(view, ticket, moods, |_| {})
    }

    pub(crate) fn apply_expanded(&self, ticket: Ticket, uploader: Username, moods: Vec<Mood>) -> bool {
        self.apply_view(View::Expanded, ticket, moods, |snap| {
            snap.expanded_uploader = Some(uploader)
        })
    }

    fn apply_view<F>(&self, view: View, ticket: Ticket, moods: Vec<Mood>, also: F) -> bool
    where
        F: FnOnce(&mut Snapshot),
    {
        self.tx.send_if_modified(|snap| {
            if snap.is_stale(view, ticket) {
                debug!("Dropping stale {:?} result ({:?})", view, ticket);
                return false;
            }
            let visible: Vec<Mood> = moods
                .into_iter()
                .filter(|m| !snap.is_buried(&m.id, ticket))
                .collect();
            let Some(slot) = snap.moods_mut(view) else {
                return false;
            };
            *slot = visible;
            also(snap);
            snap.applied.insert(view, ticket);
            snap.prune_tombstones();
            snap.version += 1;
            true
        })
    }

    pub(crate) fn apply_reactions(&self, ticket: Ticket, reactions: ReactionMap) -> bool {
        self.tx.send_if_modified(|snap| {
            if snap.is_stale(View::Reactions, ticket) {
                debug!("Dropping stale reactions result ({:?})", ticket);
                return false;
            }
            snap.reactions = reactions;
            snap.applied.insert(View::Reactions, ticket);
            snap.version += 1;
            true
        })
    }

    /// Drop a deleted mood from every view that holds it.
    pub(crate) fn remove_mood(&self, id: &str) -> bool {
        let after = Ticket(self.next_ticket.load(Ordering::Relaxed));
        self.tx.send_if_modified(|snap| {
            snap.tombstones.insert(id.to_string(), after);
            snap.prune_tombstones();
            let mut removed = false;
            for view in TIMELINES {
                if let Some(list) = snap.moods_mut(view) {
                    let before = list.len();
                    list.retain(|m| m.id != id);
                    removed |= list.len() != before;
                }
            }
            if removed {
                snap.version += 1;
            }
            removed
        })
    }
}
