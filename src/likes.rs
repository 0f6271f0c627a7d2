use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::ResolvedAsset;

/// Snapshot of an asset's like flag and visible counter.
///
/// The optimistic toggle applies [`LikeState::toggled()`] immediately,
/// issues the service call, and re-applies the pre-toggle snapshot if
/// the call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u32,
}

impl LikeState {
    /// Read the current like state off an asset.
    pub fn of(asset: &ResolvedAsset) -> Self {
        Self {
            liked: asset.liked,
            like_count: asset.like_count,
        }
    }

    /// The state after one toggle: flag flipped, counter adjusted.
    pub fn toggled(self) -> Self {
        Self {
            liked: !self.liked,
            like_count: if self.liked {
                self.like_count.saturating_sub(1)
            } else {
                self.like_count + 1
            },
        }
    }

    /// Write this state onto an asset.
    pub fn apply_to(&self, asset: &mut ResolvedAsset) {
        asset.liked = self.liked;
        asset.like_count = self.like_count;
    }
}

/// Per-asset in-flight guard for like calls.
///
/// A second toggle on the same asset while a service call is pending is
/// suppressed rather than raced; the caller treats the suppressed toggle
/// as a no-op, which keeps the client and the service from diverging.
#[derive(Debug, Default)]
pub struct LikeGate {
    in_flight: Mutex<HashSet<String>>,
}

impl LikeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the asset for one call. Returns `false` if a call for this
    /// asset is already pending.
    pub fn try_begin(&self, asset_id: &str) -> bool {
        match self.in_flight.lock() {
            Ok(mut set) => set.insert(asset_id.to_string()),
            Err(_) => false,
        }
    }

    /// Release the asset after the call settled, success or failure.
    pub fn finish(&self, asset_id: &str) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(asset_id);
        }
    }

    /// Whether a call for this asset is currently pending.
    pub fn is_in_flight(&self, asset_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(asset_id))
            .unwrap_or(false)
    }
}
