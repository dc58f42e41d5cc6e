//! Domain counters behind the stage controllers.
//!
//! Tallies are cheap shared handles: cloning one yields another view of the
//! same counters. Stage predicates hold a clone, so the clock always sees the
//! latest counts without holding a reference into the controller.

use serde::{Deserialize, Serialize};
use std::{cell::Cell, rc::Rc};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Valid,
    Fake,
    Invalid,
}

// ── Collection ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CollectionCounts {
    valid: Cell<u32>,
    fake: Cell<u32>,
    invalid: Cell<u32>,
    collected: Cell<u32>,
    to_collect: Cell<u32>,
}

/// Transactions collected versus transactions spawned for the stage.
#[derive(Debug, Clone, Default)]
pub struct CollectionTally {
    counts: Rc<CollectionCounts>,
}

/// Persisted form of a `CollectionTally`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedCollection {
    pub valid: u32,
    pub fake: u32,
    pub invalid: u32,
    pub collected: u32,
    pub to_collect: u32,
}

impl CollectionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: TxKind) {
        let c = &self.counts;
        let slot = match kind {
            TxKind::Valid => &c.valid,
            TxKind::Fake => &c.fake,
            TxKind::Invalid => &c.invalid,
        };
        slot.set(slot.get().saturating_add(1));
        c.collected.set(c.collected.get().saturating_add(1));
    }

    /// Spawners report how many transactions became collectable.
    pub fn add_spawned(&self, count: u32) {
        let c = &self.counts;
        c.to_collect.set(c.to_collect.get().saturating_add(count));
    }

    pub fn reset(&self) {
        let c = &self.counts;
        for cell in [&c.valid, &c.fake, &c.invalid, &c.collected, &c.to_collect] {
            cell.set(0);
        }
    }

    pub fn collected(&self) -> u32 { self.counts.collected.get() }
    pub fn to_collect(&self) -> u32 { self.counts.to_collect.get() }

    pub fn count(&self, kind: TxKind) -> u32 {
        match kind {
            TxKind::Valid => self.counts.valid.get(),
            TxKind::Fake => self.counts.fake.get(),
            TxKind::Invalid => self.counts.invalid.get(),
        }
    }

    /// Collected everything that was spawned (and something was spawned).
    pub fn all_collected(&self) -> bool {
        let required = self.to_collect();
        required > 0 && self.collected() >= required
    }

    pub fn remaining(&self) -> u32 {
        self.to_collect().saturating_sub(self.collected())
    }

    pub fn save(&self) -> SavedCollection {
        SavedCollection {
            valid: self.count(TxKind::Valid),
            fake: self.count(TxKind::Fake),
            invalid: self.count(TxKind::Invalid),
            collected: self.collected(),
            to_collect: self.to_collect(),
        }
    }

    /// Restore saved counts. The total is recomputed from the breakdown
    /// when the two disagree.
    pub fn restore(&self, saved: &SavedCollection) {
        let c = &self.counts;
        c.valid.set(saved.valid);
        c.fake.set(saved.fake);
        c.invalid.set(saved.invalid);
        c.to_collect.set(saved.to_collect);

        let breakdown = saved
            .valid
            .saturating_add(saved.fake)
            .saturating_add(saved.invalid);
        if saved.collected != breakdown {
            log::warn!(
                "tally: saved total {} disagrees with breakdown {breakdown}, correcting",
                saved.collected
            );
        }
        c.collected.set(breakdown);
    }

    pub fn summary(&self) -> String {
        format!(
            "collected {} (valid {}, fake {}, invalid {}) of {}",
            self.collected(),
            self.count(TxKind::Valid),
            self.count(TxKind::Fake),
            self.count(TxKind::Invalid),
            self.to_collect()
        )
    }
}

// ── Verification ───────────────────────────────────────────────

#[derive(Debug)]
struct VerificationCounts {
    verified: Cell<u32>,
    required: Cell<u32>,
    slot_capacity: u32,
    complete: Cell<bool>,
}

/// Crates placed into verification slots versus crates required.
#[derive(Debug, Clone)]
pub struct VerificationTally {
    counts: Rc<VerificationCounts>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The crate took a slot; verification is still incomplete.
    Accepted,
    /// The crate took the last required slot.
    Completed,
    /// No free slot, or every required crate is already verified.
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedVerification {
    pub verified: u32,
    pub required: u32,
}

impl VerificationTally {
    pub fn new(required: u32, slot_capacity: u32) -> Self {
        Self {
            counts: Rc::new(VerificationCounts {
                verified: Cell::new(0),
                required: Cell::new(required),
                slot_capacity,
                complete: Cell::new(false),
            }),
        }
    }

    pub fn verify(&self) -> VerifyOutcome {
        let c = &self.counts;
        let verified = c.verified.get();
        if verified >= c.slot_capacity {
            log::warn!("verification: no more slots available ({})", c.slot_capacity);
            return VerifyOutcome::Rejected;
        }
        if verified >= c.required.get() {
            log::warn!("verification: already have all {} expected crates", c.required.get());
            return VerifyOutcome::Rejected;
        }

        c.verified.set(verified + 1);
        log::debug!("verification: {}/{}", verified + 1, c.required.get());

        if verified + 1 >= c.required.get() && !c.complete.get() {
            c.complete.set(true);
            VerifyOutcome::Completed
        } else {
            VerifyOutcome::Accepted
        }
    }

    pub fn reset(&self) {
        self.counts.verified.set(0);
        self.counts.complete.set(false);
    }

    pub fn verified(&self) -> u32 { self.counts.verified.get() }
    pub fn required(&self) -> u32 { self.counts.required.get() }
    pub fn slot_capacity(&self) -> u32 { self.counts.slot_capacity }
    pub fn is_complete(&self) -> bool { self.counts.complete.get() }

    pub fn save(&self) -> SavedVerification {
        SavedVerification {
            verified: self.verified(),
            required: self.required(),
        }
    }

    pub fn restore(&self, saved: &SavedVerification) {
        let c = &self.counts;
        c.required.set(saved.required);
        c.verified.set(saved.verified.min(c.slot_capacity));
        c.complete.set(saved.required > 0 && c.verified.get() >= saved.required);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counts() {
        let tally = CollectionTally::new();
        let view = tally.clone();
        tally.add_spawned(2);
        tally.record(TxKind::Valid);
        assert_eq!(view.collected(), 1);
        assert_eq!(view.remaining(), 1);
        assert!(!view.all_collected());
        tally.record(TxKind::Fake);
        assert!(view.all_collected());
    }

    #[test]
    fn nothing_spawned_is_never_all_collected() {
        let tally = CollectionTally::new();
        tally.record(TxKind::Invalid);
        assert!(!tally.all_collected());
    }

    #[test]
    fn restore_corrects_total_from_breakdown() {
        let tally = CollectionTally::new();
        tally.restore(&SavedCollection {
            valid: 3,
            fake: 1,
            invalid: 1,
            collected: 9,
            to_collect: 6,
        });
        assert_eq!(tally.collected(), 5);
        assert_eq!(tally.remaining(), 1);
    }

    #[test]
    fn verification_completes_once_and_rejects_extras() {
        let tally = VerificationTally::new(2, 4);
        assert_eq!(tally.verify(), VerifyOutcome::Accepted);
        assert_eq!(tally.verify(), VerifyOutcome::Completed);
        assert_eq!(tally.verify(), VerifyOutcome::Rejected);
        assert_eq!(tally.verified(), 2);
        assert!(tally.is_complete());

        tally.reset();
        assert_eq!(tally.verified(), 0);
        assert!(!tally.is_complete());
    }

    #[test]
    fn verification_respects_slot_capacity() {
        let tally = VerificationTally::new(5, 1);
        assert_eq!(tally.verify(), VerifyOutcome::Accepted);
        assert_eq!(tally.verify(), VerifyOutcome::Rejected);
    }
}
