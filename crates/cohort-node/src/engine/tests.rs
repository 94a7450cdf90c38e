use super::*;
use crate::clock::ManualClock;
use crate::models::{
    DealStatus, GroupStatus, MemberStatus, NewDeal, NotificationKind, Redemption,
    RedemptionStatus,
};
use crate::sweeper::Sweeper;
use cohort_tiers::{CountingPolicy, ReputationLevel, Tier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const T0: u64 = 1_700_000_000;
const HOUR: u64 = 3600;

struct Harness {
    _dir: TempDir,
    engine: Arc<Engine>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    harness_with_levels(HashMap::new())
}

fn harness_with_levels(levels: HashMap<String, ReputationLevel>) -> Harness {
    harness_with_lookup(Arc::new(levels))
}

fn harness_with_lookup(reputation: Arc<dyn ReputationLookup>) -> Harness {
    let dir = tempdir().unwrap();
    let storage = Arc::new(Storage::open(dir.path()).unwrap());
    let clock = Arc::new(ManualClock::new(T0));
    let engine = Engine::new(storage, reputation, clock.clone()).unwrap();
    Harness {
        _dir: dir,
        engine: Arc::new(engine),
        clock,
    }
}

/// Levels that can change mid-test, and a switch that makes every lookup fail.
#[derive(Default)]
struct SwitchableReputation {
    levels: Mutex<HashMap<String, ReputationLevel>>,
    unavailable: AtomicBool,
}

impl SwitchableReputation {
    fn set(&self, participants: &[&str], level: ReputationLevel) {
        let mut levels = self.levels.lock().unwrap();
        for p in participants {
            levels.insert(p.to_string(), level);
        }
    }

    fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ReputationLookup for SwitchableReputation {
    fn level(&self, participant_id: &str) -> Result<Option<ReputationLevel>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::TransientStore("reputation store busy".into()));
        }
        Ok(self.levels.lock().unwrap().get(participant_id).copied())
    }
}

/// 3.0 reaches rank 1; three contributors (3.15) reach rank 2.
fn reputation_sensitive_tiers() -> Vec<Tier> {
    vec![Tier::new(1, 3.0, 5.0), Tier::new(2, 3.1, 8.0)]
}

fn standard_tiers() -> Vec<Tier> {
    vec![
        Tier::new(1, 3.0, 5.0),
        Tier::new(2, 5.0, 12.0),
        Tier::new(3, 10.0, 20.0),
    ]
}

/// Deal with a 100 hour window starting at `T0`.
fn new_deal(policy: CountingPolicy, min_participants: u32, tiers: Vec<Tier>) -> NewDeal {
    NewDeal {
        title: "Sunset sail".into(),
        category: "travel".into(),
        merchant_id: "merchant-7".into(),
        base_price: 120.0,
        counting_policy: policy,
        min_participants,
        start_at: T0,
        end_at: T0 + 100 * HOUR,
        tiers,
    }
}

impl Harness {
    fn deal(&self, policy: CountingPolicy, min: u32, tiers: Vec<Tier>) -> u64 {
        self.engine.create_deal(new_deal(policy, min, tiers)).unwrap().id
    }

    fn group(&self, deal_id: u64) -> u64 {
        self.engine
            .create_group(deal_id, "host", T0 + 200 * HOUR)
            .unwrap()
            .id
    }

    fn join_all(&self, group_id: u64, participants: &[&str]) {
        for p in participants {
            self.engine.join(group_id, p, None).unwrap();
        }
    }

    fn status(&self, group_id: u64) -> GroupStatus {
        self.engine.storage().get_group(group_id).unwrap().unwrap().status
    }
}

// --- Membership ---

#[test]
fn repledge_updates_the_single_row() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByVolume, 2, standard_tiers()));

    h.engine.join(group, "alice", Some(1)).unwrap();
    let progress = h.engine.join(group, "alice", Some(4)).unwrap();

    let members = h.engine.storage().members(group).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].pledge_units, 4);
    assert_eq!(progress.participants_count, 1);
    assert_eq!(progress.total_pledged, 4);
    assert_eq!(progress.current_tier_rank, 1);
}

#[test]
fn join_failures_are_distinguishable() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 1, standard_tiers()));

    assert!(matches!(
        h.engine.join(999, "alice", None),
        Err(Error::GroupNotFound(_))
    ));
    assert!(matches!(
        h.engine.join(group, "alice", Some(0)),
        Err(Error::InvalidInput(_))
    ));

    h.engine.join(group, "alice", None).unwrap();
    h.engine.lock(group).unwrap();
    assert!(matches!(
        h.engine.join(group, "bob", None),
        Err(Error::GroupNotOpen {
            status: GroupStatus::Locked,
            ..
        })
    ));
    // failed join leaves the group untouched
    assert_eq!(h.engine.storage().members(group).unwrap().len(), 1);
}

#[test]
fn join_refreshes_cached_progress() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c"]);

    let cached = h.engine.storage().get_group(group).unwrap().unwrap().progress;
    assert_eq!(cached.participants_count, 3);
    assert_eq!(cached.current_tier_rank, 1);
    assert_eq!(cached.current_discount_percent, 5.0);
}

// --- Progress ---

#[test]
fn discount_never_decreases_as_members_join() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));

    let mut prev = 0.0;
    for i in 0..12 {
        let progress = h.engine.join(group, &format!("p{}", i), None).unwrap();
        assert!(progress.current_discount_percent >= prev);
        prev = progress.current_discount_percent;
    }
    assert_eq!(prev, 20.0);
}

#[test]
fn reputation_changes_count_tiers_but_not_volume_tiers() {
    let mut levels = HashMap::new();
    for p in ["c1", "c2", "c3"] {
        levels.insert(p.to_string(), ReputationLevel::Contributor);
    }
    let h = harness_with_levels(levels);
    let tiers = vec![Tier::new(1, 3.0, 5.0), Tier::new(2, 3.1, 8.0)];

    let by_count = h.deal(CountingPolicy::ByCount, 2, tiers.clone());
    let newbies = h.group(by_count);
    let contributors = h.group(by_count);
    h.join_all(newbies, &["n1", "n2", "n3"]);
    h.join_all(contributors, &["c1", "c2", "c3"]);

    let a = h.engine.group_status(newbies).unwrap().progress;
    let b = h.engine.group_status(contributors).unwrap().progress;
    assert_eq!(a.participants_count, b.participants_count);
    assert_eq!(a.current_tier_rank, 1);
    assert_eq!(b.current_tier_rank, 2);

    let by_volume = h.deal(CountingPolicy::ByVolume, 2, tiers);
    let newbies = h.group(by_volume);
    let contributors = h.group(by_volume);
    h.join_all(newbies, &["n1", "n2", "n3"]);
    h.join_all(contributors, &["c1", "c2", "c3"]);

    let a = h.engine.group_status(newbies).unwrap().progress;
    let b = h.engine.group_status(contributors).unwrap().progress;
    assert_eq!(a.current_tier_rank, b.current_tier_rank);
}

// --- Lock ---

#[test]
fn lock_requires_minimum_participants() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByVolume, 2, standard_tiers()));
    h.engine.join(group, "alice", Some(10)).unwrap();

    let err = h.engine.lock(group).unwrap_err();
    assert!(matches!(
        err,
        Error::MinimumParticipantsNotMet {
            required: 2,
            actual: 1
        }
    ));
    assert_eq!(err.kind(), crate::error::ErrorKind::PreconditionFailed);
    assert_eq!(h.status(group), GroupStatus::Open);
    assert!(h.engine.storage().get_settlement(group).unwrap().is_none());
    assert!(h.engine.redemptions(group).unwrap().is_empty());
}

#[test]
fn early_lock_bonus_boundary() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 1, vec![Tier::new(1, 1.0, 12.0)]);

    let early = h.group(deal);
    let late = h.group(deal);
    h.engine.join(early, "alice", None).unwrap();
    h.engine.join(late, "bob", None).unwrap();

    h.clock.set(T0 + 24 * HOUR);
    let outcome = h.engine.lock(early).unwrap();
    assert_eq!(outcome.final_discount_percent, 14.0);
    assert!(outcome.early_lock_bonus);

    h.clock.set(T0 + 26 * HOUR);
    let outcome = h.engine.lock(late).unwrap();
    assert_eq!(outcome.final_discount_percent, 12.0);
    assert!(!outcome.early_lock_bonus);
}

#[test]
fn lock_issues_redemptions_exactly_once() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c"]);

    let outcome = h.engine.lock(group).unwrap();
    assert_eq!(outcome.final_tier_rank, 1);
    assert_eq!(outcome.redemptions.len(), 3);
    for issued in &outcome.redemptions {
        assert!(issued
            .redemption_code
            .starts_with(&format!("GRP-{}-", group)));
    }

    let settlement = h.engine.storage().get_settlement(group).unwrap().unwrap();
    assert_eq!(settlement.final_tier_rank, 1);
    assert_eq!(settlement.final_discount_percent, outcome.final_discount_percent);

    let err = h.engine.lock(group).unwrap_err();
    assert!(matches!(
        err,
        Error::GroupNotOpen {
            status: GroupStatus::Locked,
            ..
        }
    ));
    assert_eq!(h.engine.redemptions(group).unwrap().len(), 3);
}

#[test]
fn lock_writes_notifications_and_activity() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 1, standard_tiers()));
    h.join_all(group, &["alice", "bob"]);
    h.engine.lock(group).unwrap();

    for p in ["alice", "bob"] {
        let notes = h.engine.notifications(p).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GroupLocked);
        assert_eq!(h.engine.activity(p).unwrap().len(), 1);
    }
    assert!(h.engine.notifications("host").unwrap().is_empty());
}

#[test]
fn lock_without_tier_settles_at_zero() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b"]);

    let outcome = h.engine.lock(group).unwrap();
    assert_eq!(outcome.final_tier_rank, 0);
    assert_eq!(outcome.final_discount_percent, 0.0);
    assert!(!outcome.early_lock_bonus);
}

#[test]
fn failed_reputation_lookup_aborts_lock() {
    let reputation = Arc::new(SwitchableReputation::default());
    let h = harness_with_lookup(reputation.clone());
    reputation.set(&["c1", "c2", "c3"], ReputationLevel::Contributor);
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, reputation_sensitive_tiers()));
    h.join_all(group, &["c1", "c2", "c3"]);

    reputation.set_unavailable(true);
    let err = h.engine.lock(group).unwrap_err();
    assert!(matches!(err, Error::TransientStore(_)));
    assert!(err.is_retryable());
    assert_eq!(h.status(group), GroupStatus::Open);
    assert!(h.engine.storage().get_settlement(group).unwrap().is_none());
    assert!(h.engine.redemptions(group).unwrap().is_empty());
    assert!(matches!(
        h.engine.join(group, "c4", None),
        Err(Error::TransientStore(_))
    ));
    assert_eq!(h.engine.storage().members(group).unwrap().len(), 3);

    reputation.set_unavailable(false);
    let outcome = h.engine.lock(group).unwrap();
    assert_eq!(outcome.final_tier_rank, 2);
}

#[test]
fn failed_lock_leaves_no_settlement_artifacts() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c"]);

    // take the code "b" would be issued, so the lock fails after "a" is staged
    let txn = h.engine.storage().transaction();
    txn.insert_redemption(&Redemption {
        group_id: 999,
        participant_id: "z".into(),
        redemption_code: h.engine.issuer().code(group, "b"),
        payload: String::new(),
        status: RedemptionStatus::Issued,
        issued_at: T0,
        redeemed_at: None,
    })
    .unwrap();
    txn.commit().unwrap();

    assert!(h.engine.lock(group).is_err());
    assert_eq!(h.status(group), GroupStatus::Open);
    assert!(h.engine.storage().get_settlement(group).unwrap().is_none());
    assert!(h.engine.redemptions(group).unwrap().is_empty());
    assert!(h.engine.notifications("a").unwrap().is_empty());
    assert!(h.engine.activity("a").unwrap().is_empty());
    let code_a = h.engine.issuer().code(group, "a");
    assert!(h.engine.storage().get_redemption(&code_a).unwrap().is_none());
    assert_eq!(h.engine.storage().open_group_ids().unwrap(), vec![group]);
}

// --- Cancel / expire ---

#[test]
fn cancel_before_expiry_and_expire_after() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 2, standard_tiers());
    let first = h.engine.create_group(deal, "host", T0 + 10 * HOUR).unwrap().id;
    let second = h.engine.create_group(deal, "host", T0 + 10 * HOUR).unwrap().id;
    h.join_all(first, &["a", "b"]);
    h.join_all(second, &["c"]);

    h.clock.set(T0 + HOUR);
    assert_eq!(h.engine.cancel_or_expire(first).unwrap(), GroupStatus::Cancelled);

    h.clock.set(T0 + 11 * HOUR);
    assert_eq!(h.engine.cancel_or_expire(second).unwrap(), GroupStatus::Expired);

    let members = h.engine.storage().members(first).unwrap();
    assert!(members.iter().all(|m| m.status == MemberStatus::Refunded));
    assert_eq!(
        h.engine.notifications("c").unwrap()[0].kind,
        NotificationKind::GroupExpired
    );

    assert!(matches!(
        h.engine.cancel_or_expire(first),
        Err(Error::GroupNotOpen {
            status: GroupStatus::Cancelled,
            ..
        })
    ));
    assert!(matches!(
        h.engine.lock(second),
        Err(Error::GroupNotOpen { .. })
    ));
}

// --- Registry ---

#[test]
fn group_status_reports_next_tier_and_time_left() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c", "d"]);

    h.clock.set(T0 + 50 * HOUR);
    let view = h.engine.group_status(group).unwrap();
    assert_eq!(view.members.len(), 4);
    assert_eq!(view.progress.current_tier_rank, 1);
    assert_eq!(view.next_tier.map(|t| t.rank), Some(2));
    assert_eq!(view.time_left_seconds, 150 * HOUR);
    assert_eq!(view.tiers.len(), 3);
    assert!(view.settlement.is_none());

    h.clock.set(T0 + 500 * HOUR);
    assert_eq!(h.engine.group_status(group).unwrap().time_left_seconds, 0);
}

#[test]
fn status_read_leaves_cached_progress_to_writers() {
    let reputation = Arc::new(SwitchableReputation::default());
    let h = harness_with_lookup(reputation.clone());
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, reputation_sensitive_tiers()));
    h.join_all(group, &["c1", "c2", "c3"]);
    let cached_rank = |h: &Harness| {
        let group = h.engine.storage().get_group(group).unwrap().unwrap();
        group.progress.current_tier_rank
    };

    reputation.set(&["c1", "c2", "c3"], ReputationLevel::Contributor);
    let view = h.engine.group_status(group).unwrap();
    assert_eq!(view.progress.current_tier_rank, 2);
    assert_eq!(view.group.progress.current_tier_rank, 1);
    assert_eq!(cached_rank(&h), 1);

    h.engine.refresh_progress(group).unwrap();
    assert_eq!(cached_rank(&h), 2);
}

#[test]
fn status_read_does_not_wait_for_the_group_lock() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c"]);

    let writer = h.engine.storage().transaction();
    writer.lock_group(group).unwrap();
    let view = h.engine.group_status(group).unwrap();
    assert_eq!(view.progress.participants_count, 3);
    drop(writer);
}

#[test]
fn invite_token_resolves_group() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 2, standard_tiers());
    let group = h.engine.create_group(deal, "host", T0 + HOUR).unwrap();

    let view = h.engine.group_by_invite(&group.invite_token).unwrap();
    assert_eq!(view.group.id, group.id);
    assert!(matches!(
        h.engine.group_by_invite("nope"),
        Err(Error::GroupNotFound(_))
    ));
}

// --- Catalog ---

#[test]
fn group_creation_checks_deal() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 2, standard_tiers());

    assert!(matches!(
        h.engine.create_group(77, "host", T0 + HOUR),
        Err(Error::DealNotFound(77))
    ));
    assert!(matches!(
        h.engine.create_group(deal, "host", T0),
        Err(Error::InvalidInput(_))
    ));

    h.engine.close_deal(deal).unwrap();
    assert!(matches!(
        h.engine.create_group(deal, "host", T0 + HOUR),
        Err(Error::DealNotActive(_))
    ));
}

#[test]
fn active_deals_respect_status_and_window() {
    let h = harness();
    let live = h.deal(CountingPolicy::ByCount, 2, standard_tiers());
    let closed = h.deal(CountingPolicy::ByCount, 2, standard_tiers());
    h.engine.close_deal(closed).unwrap();

    let mut future = new_deal(CountingPolicy::ByCount, 2, standard_tiers());
    future.start_at = T0 + 10 * HOUR;
    future.end_at = T0 + 20 * HOUR;
    h.engine.create_deal(future).unwrap();

    let active = h.engine.list_active_deals().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].deal.id, live);
    assert_eq!(active[0].tiers.len(), 3);

    let detail = h.engine.deal_detail(closed).unwrap();
    assert_eq!(detail.deal.status, DealStatus::Closed);
}

#[test]
fn deal_detail_lists_recent_groups_newest_first() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(Storage::open(dir.path()).unwrap());
    let levels: HashMap<String, ReputationLevel> = HashMap::new();
    let engine = Engine::new(storage, Arc::new(levels), Arc::new(ManualClock::new(T0)))
        .unwrap()
        .with_recent_groups_limit(2);

    let deal = engine
        .create_deal(new_deal(CountingPolicy::ByCount, 2, standard_tiers()))
        .unwrap()
        .id;
    let ids: Vec<u64> = (0..3)
        .map(|_| engine.create_group(deal, "host", T0 + HOUR).unwrap().id)
        .collect();

    let detail = engine.deal_detail(deal).unwrap();
    let recent: Vec<u64> = detail.recent_groups.iter().map(|g| g.id).collect();
    assert_eq!(recent, vec![ids[2], ids[1]]);
}

// --- Redemption ---

#[test]
fn redemption_can_be_claimed_once() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 1, standard_tiers()));
    h.engine.join(group, "alice", None).unwrap();
    let code = h.engine.lock(group).unwrap().redemptions[0]
        .redemption_code
        .clone();

    let view = h.engine.redemption(&code).unwrap();
    assert!(view.signature_valid);
    assert_eq!(view.redemption.participant_id, "alice");

    let redeemed = h.engine.redeem(&code).unwrap();
    assert!(redeemed.redeemed_at.is_some());
    assert!(matches!(
        h.engine.redeem(&code),
        Err(Error::AlreadyRedeemed(_))
    ));
    assert!(matches!(
        h.engine.redeem("GRP-0-00000000"),
        Err(Error::RedemptionNotFound(_))
    ));
}

// --- Concurrency ---

#[test]
fn concurrent_joins_lose_no_members() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));

    let threads = 12;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = Arc::clone(&h.engine);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                engine.join(group, &format!("p{}", i), None).unwrap();
                // re-pledge from the same participant must not duplicate
                engine.join(group, &format!("p{}", i), Some(2)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let view = h.engine.group_status(group).unwrap();
    assert_eq!(view.progress.participants_count, threads as u32);
    assert_eq!(view.progress.total_pledged, 2 * threads as u64);
    assert_eq!(view.group.progress, view.progress);
}

#[test]
fn concurrent_lock_and_cancel_settle_once() {
    let h = harness();
    let group = h.group(h.deal(CountingPolicy::ByCount, 2, standard_tiers()));
    h.join_all(group, &["a", "b", "c"]);

    let barrier = Arc::new(Barrier::new(2));
    let locker = {
        let engine = Arc::clone(&h.engine);
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            barrier.wait();
            engine.lock(group).map(|_| ())
        })
    };
    let canceller = {
        let engine = Arc::clone(&h.engine);
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            barrier.wait();
            engine.cancel_or_expire(group).map(|_| ())
        })
    };
    let results = [locker.join().unwrap(), canceller.join().unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::GroupNotOpen { .. }))));

    let redemptions = h.engine.redemptions(group).unwrap().len();
    match h.status(group) {
        GroupStatus::Locked => assert_eq!(redemptions, 3),
        GroupStatus::Cancelled => assert_eq!(redemptions, 0),
        other => panic!("unexpected status {}", other),
    }
}

// --- Sweep ---

#[test]
fn sweep_settles_overdue_groups_and_refreshes_live_ones() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 2, standard_tiers());
    let qualifying = h.engine.create_group(deal, "host", T0 + HOUR).unwrap().id;
    let short = h.engine.create_group(deal, "host", T0 + HOUR).unwrap().id;
    let live = h.engine.create_group(deal, "host", T0 + 50 * HOUR).unwrap().id;
    h.join_all(qualifying, &["a", "b", "c"]);
    h.join_all(short, &["d"]);
    h.join_all(live, &["e"]);

    h.clock.set(T0 + 2 * HOUR);
    let sweeper = Sweeper::new(Arc::clone(&h.engine), Duration::from_secs(60));
    let report = sweeper.sweep_once().unwrap();

    assert_eq!(report.locked, vec![qualifying]);
    assert_eq!(report.expired, vec![short]);
    assert_eq!(report.refreshed, 1);
    assert!(report.failed.is_empty());
    assert_eq!(h.status(live), GroupStatus::Open);

    // nothing left to settle on the next pass
    let report = sweeper.sweep_once().unwrap();
    assert!(report.is_quiet());
    assert_eq!(h.engine.redemptions(qualifying).unwrap().len(), 3);
}

#[test]
fn sweep_closes_overdue_group_below_minimum() {
    let mut levels = HashMap::new();
    levels.insert("legend".to_string(), ReputationLevel::Legend);
    let h = harness_with_levels(levels);
    // one legend reaches the 1.1 threshold alone, but the deal needs two members
    let deal = h.deal(CountingPolicy::ByCount, 2, vec![Tier::new(1, 1.1, 5.0)]);
    let group = h.engine.create_group(deal, "host", T0 + HOUR).unwrap().id;
    h.engine.join(group, "legend", None).unwrap();

    h.clock.set(T0 + 2 * HOUR);
    let report = Sweeper::new(Arc::clone(&h.engine), Duration::from_secs(60))
        .sweep_once()
        .unwrap();
    assert_eq!(report.expired, vec![group]);
    assert!(report.locked.is_empty());
}

#[test]
fn sweep_isolates_failing_groups() {
    let h = harness();
    let deal = h.deal(CountingPolicy::ByCount, 1, standard_tiers());
    let good = h.engine.create_group(deal, "host", T0 + HOUR).unwrap().id;

    // a group whose deal is missing cannot be evaluated
    let broken = crate::models::Group::new(900, 404, "host".into(), "tok".into(), T0 + HOUR, T0);
    let txn = h.engine.storage().transaction();
    txn.put_group(&broken).unwrap();
    txn.commit().unwrap();

    h.clock.set(T0 + 2 * HOUR);
    let report = Sweeper::new(Arc::clone(&h.engine), Duration::from_secs(60))
        .sweep_once()
        .unwrap();

    assert_eq!(report.expired, vec![good]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].group_id, 900);
    assert_eq!(h.status(900), GroupStatus::Open);
}
