//! Hot-path profiling
//!
//! Tracks one counter per region and drives the promotion state machine.
//! Counters only increase. A region becomes hot when its counter strictly
//! exceeds the promotion mark, which starts at the configured threshold and
//! moves one threshold window past the counter after a failed compilation.

use crate::compiled::CompiledRegion;
use core_types::{PromotionState, RegionId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Profiling state of one region
#[derive(Debug, Clone)]
pub struct HotRegion {
    /// Region id
    pub id: RegionId,
    /// Executions observed
    pub count: u64,
    /// Promotion state
    pub state: PromotionState,
    /// Counter value that must be exceeded to promote
    pub promote_after: u64,
    /// Failed compilations
    pub failures: u32,
    /// Installed handle once compiled
    pub handle: Option<Arc<CompiledRegion>>,
}

impl HotRegion {
    fn new(id: RegionId, threshold: u64) -> Self {
        Self {
            id,
            count: 0,
            state: PromotionState::Unprofiled,
            promote_after: threshold,
            failures: 0,
            handle: None,
        }
    }

    fn transition(&mut self, next: PromotionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            warn!(region = %self.id, from = ?self.state, to = ?next, "rejected promotion transition");
            false
        }
    }
}

/// Serializable view of a region's profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProfile {
    /// Region id
    pub id: RegionId,
    /// Executions observed
    pub count: u64,
    /// Promotion state
    pub state: PromotionState,
    /// Failed compilations
    pub failures: u32,
}

/// What the caller should do for this execution
#[derive(Debug, Clone)]
pub enum ProfileDecision {
    /// Interpret
    Interpret,
    /// The region just became hot; compile it
    Promote,
    /// Use the installed handle
    Compiled(Arc<CompiledRegion>),
}

/// Per-region execution counters and promotion states
#[derive(Debug)]
pub struct HotPathProfiler {
    threshold: u64,
    regions: Mutex<HashMap<RegionId, HotRegion>>,
}

impl HotPathProfiler {
    /// Profiler promoting regions whose counter exceeds `threshold`
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            regions: Mutex::new(HashMap::new()),
        }
    }

    /// Promotion threshold
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Count one execution of `region` and decide how to run it
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::RegionId;
    /// use jit_compiler::{HotPathProfiler, ProfileDecision};
    ///
    /// let profiler = HotPathProfiler::new(2);
    /// let r = RegionId(1);
    /// assert!(matches!(profiler.record(r), ProfileDecision::Interpret));
    /// assert!(matches!(profiler.record(r), ProfileDecision::Interpret));
    /// assert!(matches!(profiler.record(r), ProfileDecision::Promote));
    /// ```
    pub fn record(&self, region: RegionId) -> ProfileDecision {
        let mut regions = self.regions.lock();
        let entry = regions
            .entry(region)
            .or_insert_with(|| HotRegion::new(region, self.threshold));
        entry.count = entry.count.saturating_add(1);

        match entry.state {
            PromotionState::Compiled => match &entry.handle {
                Some(handle) => ProfileDecision::Compiled(handle.clone()),
                None => ProfileDecision::Interpret,
            },
            PromotionState::Unprofiled if entry.count > entry.promote_after => {
                entry.transition(PromotionState::Hot);
                debug!(region = %region, count = entry.count, "region is hot");
                ProfileDecision::Promote
            }
            _ => ProfileDecision::Interpret,
        }
    }

    /// Promote a region regardless of its counter
    pub fn force_hot(&self, region: RegionId) -> bool {
        let mut regions = self.regions.lock();
        let entry = regions
            .entry(region)
            .or_insert_with(|| HotRegion::new(region, self.threshold));
        match entry.state {
            PromotionState::Hot => true,
            PromotionState::Unprofiled => entry.transition(PromotionState::Hot),
            _ => false,
        }
    }

    /// `Hot -> Compiling`; false if the region was not hot
    pub fn begin_compile(&self, region: RegionId) -> bool {
        self.regions
            .lock()
            .get_mut(&region)
            .is_some_and(|entry| entry.transition(PromotionState::Compiling))
    }

    /// `Compiling -> Compiled`, installing `handle`
    pub fn complete(&self, region: RegionId, handle: Arc<CompiledRegion>) -> bool {
        let mut regions = self.regions.lock();
        let Some(entry) = regions.get_mut(&region) else {
            return false;
        };
        if entry.transition(PromotionState::Compiled) {
            entry.handle = Some(handle);
            true
        } else {
            false
        }
    }

    /// `Compiling -> CompileFailed -> Unprofiled`, deferring the next
    /// promotion by one threshold window
    pub fn fail(&self, region: RegionId) {
        let mut regions = self.regions.lock();
        if let Some(entry) = regions.get_mut(&region) {
            if entry.transition(PromotionState::CompileFailed) {
                entry.failures += 1;
                entry.promote_after = entry.count.saturating_add(self.threshold);
                entry.transition(PromotionState::Unprofiled);
            }
        }
    }

    /// Executions observed for `region`
    pub fn count(&self, region: RegionId) -> u64 {
        self.regions.lock().get(&region).map_or(0, |e| e.count)
    }

    /// Promotion state; unseen regions are unprofiled
    pub fn state(&self, region: RegionId) -> PromotionState {
        self.regions
            .lock()
            .get(&region)
            .map_or(PromotionState::Unprofiled, |e| e.state)
    }

    /// Installed handle, if compiled
    pub fn handle(&self, region: RegionId) -> Option<Arc<CompiledRegion>> {
        self.regions.lock().get(&region).and_then(|e| e.handle.clone())
    }

    /// Full state of one region
    pub fn region(&self, region: RegionId) -> Option<HotRegion> {
        self.regions.lock().get(&region).cloned()
    }

    /// Profiles of every region seen, ordered by id
    pub fn snapshot(&self) -> Vec<RegionProfile> {
        let mut profiles: Vec<RegionProfile> = self
            .regions
            .lock()
            .values()
            .map(|e| RegionProfile {
                id: e.id,
                count: e.count,
                state: e.state,
                failures: e.failures,
            })
            .collect();
        profiles.sort_by_key(|p| p.id);
        profiles
    }
}
