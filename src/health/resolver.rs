// src/health/resolver.rs
use crate::poller::PollResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Height reported by the leader-flagged backend with this url.
    Leader(String),
    /// Leader unreachable or absent; highest height seen across the fleet.
    FleetMax,
}

/// Height every node is judged against for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHeight {
    pub height: u64,
    pub source: ReferenceSource,
}

/// Pick the cycle's reference height.
///
/// The first leader-flagged result wins if it reported a height. Otherwise the
/// maximum observed height is used. `None` when nothing responded.
///
/// Multiple leaders are not rejected; only the first one in iteration order is
/// consulted.
pub fn resolve_reference_height(results: &[PollResult]) -> Option<ReferenceHeight> {
    let leader = results.iter().find(|r| r.is_leader);

    if let Some((url, height)) = leader.and_then(|l| l.height.map(|h| (&l.url, h))) {
        return Some(ReferenceHeight {
            height,
            source: ReferenceSource::Leader(url.clone()),
        });
    }

    results
        .iter()
        .filter_map(|r| r.height)
        .max()
        .map(|height| ReferenceHeight {
            height,
            source: ReferenceSource::FleetMax,
        })
}
