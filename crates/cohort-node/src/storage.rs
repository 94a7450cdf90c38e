//! Persistent storage using RocksDB.
//!
//! Every relation gets its own key family with JSON values. Ids are
//! zero-padded so prefix scans come back in id order.
//!
//! Lifecycle mutations go through [`StoreTxn`], a pessimistic transaction.
//! [`StoreTxn::lock_group`] takes an exclusive lock on the group row that is
//! held until commit or drop; dropping without commit rolls back.

use crate::error::{Error, Result};
use crate::models::{
    ActivityRecord, Deal, Group, Member, Notification, Redemption, Settlement, TierRule,
};
use cohort_tiers::{ReputationLevel, TierLadder};
use ed25519_dalek::SigningKey;
use rocksdb::{Options, Transaction, TransactionDB, TransactionDBOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Default time a transaction waits for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

mod keys {
    pub const DEAL: &str = "deal:";
    pub const OPEN_GROUP: &str = "open_group:";

    pub fn deal(id: u64) -> String {
        format!("deal:{:020}", id)
    }

    pub fn tier(deal_id: u64, rank: u32) -> String {
        format!("tier:{:020}:{:010}", deal_id, rank)
    }

    pub fn tier_prefix(deal_id: u64) -> String {
        format!("tier:{:020}:", deal_id)
    }

    pub fn group(id: u64) -> String {
        format!("group:{:020}", id)
    }

    pub fn open_group(id: u64) -> String {
        format!("open_group:{:020}", id)
    }

    pub fn deal_group(deal_id: u64, group_id: u64) -> String {
        format!("deal_group:{:020}:{:020}", deal_id, group_id)
    }

    pub fn deal_group_prefix(deal_id: u64) -> String {
        format!("deal_group:{:020}:", deal_id)
    }

    pub fn invite(token: &str) -> String {
        format!("invite:{}", token)
    }

    pub fn member(group_id: u64, participant_id: &str) -> String {
        format!("member:{:020}:{}", group_id, participant_id)
    }

    pub fn member_prefix(group_id: u64) -> String {
        format!("member:{:020}:", group_id)
    }

    pub fn settlement(group_id: u64) -> String {
        format!("settlement:{:020}", group_id)
    }

    pub fn redemption(group_id: u64, participant_id: &str) -> String {
        format!("redemption:{:020}:{}", group_id, participant_id)
    }

    pub fn redemption_prefix(group_id: u64) -> String {
        format!("redemption:{:020}:", group_id)
    }

    pub fn redemption_code(code: &str) -> String {
        format!("redemption_code:{}", code)
    }

    pub fn notification(participant_id: &str, group_id: u64, kind: &str) -> String {
        format!("notification:{}:{:020}:{}", participant_id, group_id, kind)
    }

    pub fn notification_prefix(participant_id: &str) -> String {
        format!("notification:{}:", participant_id)
    }

    pub fn activity(participant_id: &str, group_id: u64, action: &str) -> String {
        format!("activity:{}:{:020}:{}", participant_id, group_id, action)
    }

    pub fn activity_prefix(participant_id: &str) -> String {
        format!("activity:{}:", participant_id)
    }

    pub fn reputation(participant_id: &str) -> String {
        format!("reputation:{}", participant_id)
    }

    pub fn counter(name: &str) -> String {
        format!("counter:{}", name)
    }

    pub const NODE_KEY: &[u8] = b"node:signing_key";
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

type RawItem = std::result::Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>;

/// Decode every value under `prefix`. The iterator must be positioned at it.
fn collect_prefix<T, I>(iter: I, prefix: &[u8]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    I: Iterator<Item = RawItem>,
{
    let mut items = Vec::new();
    for item in iter {
        let (key, value) = item?;
        if !key.starts_with(prefix) {
            break;
        }
        items.push(decode(&value)?);
    }
    Ok(items)
}

/// Storage backend for Cohort data.
pub struct Storage {
    db: TransactionDB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open with a custom row-lock wait. Waiting longer fails with
    /// [`Error::TransientStore`].
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let timeout_ms = lock_timeout.as_millis() as i64;
        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(timeout_ms);
        txn_opts.set_default_lock_timeout(timeout_ms);

        let db = TransactionDB::open(&opts, &txn_opts, path)?;
        Ok(Self { db })
    }

    /// Begin a pessimistic transaction.
    pub fn transaction(&self) -> StoreTxn<'_> {
        StoreTxn {
            txn: self.db.transaction(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        collect_prefix(self.db.prefix_iterator(prefix.as_bytes()), prefix.as_bytes())
    }

    // --- Catalog ---

    pub fn get_deal(&self, id: u64) -> Result<Option<Deal>> {
        self.get_json(&keys::deal(id))
    }

    pub fn list_deals(&self) -> Result<Vec<Deal>> {
        self.scan(keys::DEAL)
    }

    /// Tier rows of a deal in rank order.
    pub fn tiers(&self, deal_id: u64) -> Result<Vec<TierRule>> {
        self.scan(&keys::tier_prefix(deal_id))
    }

    pub fn ladder(&self, deal_id: u64) -> Result<TierLadder> {
        Ok(self.tiers(deal_id)?.into_iter().map(|rule| rule.tier).collect())
    }

    // --- Groups ---

    pub fn get_group(&self, id: u64) -> Result<Option<Group>> {
        self.get_json(&keys::group(id))
    }

    /// Ids of groups still `open`, oldest first.
    pub fn open_group_ids(&self) -> Result<Vec<u64>> {
        self.scan(keys::OPEN_GROUP)
    }

    /// Group ids of a deal, oldest first.
    pub fn group_ids_for_deal(&self, deal_id: u64) -> Result<Vec<u64>> {
        self.scan(&keys::deal_group_prefix(deal_id))
    }

    pub fn group_id_by_invite(&self, token: &str) -> Result<Option<u64>> {
        self.get_json(&keys::invite(token))
    }

    pub fn members(&self, group_id: u64) -> Result<Vec<Member>> {
        self.scan(&keys::member_prefix(group_id))
    }

    // --- Settlement artifacts ---

    pub fn get_settlement(&self, group_id: u64) -> Result<Option<Settlement>> {
        self.get_json(&keys::settlement(group_id))
    }

    pub fn redemptions(&self, group_id: u64) -> Result<Vec<Redemption>> {
        self.scan(&keys::redemption_prefix(group_id))
    }

    pub fn get_redemption(&self, code: &str) -> Result<Option<Redemption>> {
        match self.get_json::<(u64, String)>(&keys::redemption_code(code))? {
            Some((group_id, participant_id)) => {
                self.get_json(&keys::redemption(group_id, &participant_id))
            }
            None => Ok(None),
        }
    }

    pub fn notifications(&self, participant_id: &str) -> Result<Vec<Notification>> {
        self.scan(&keys::notification_prefix(participant_id))
    }

    pub fn activity(&self, participant_id: &str) -> Result<Vec<ActivityRecord>> {
        self.scan(&keys::activity_prefix(participant_id))
    }

    // --- Reputation ---

    pub fn get_reputation(&self, participant_id: &str) -> Result<Option<ReputationLevel>> {
        self.get_json(&keys::reputation(participant_id))
    }

    pub fn set_reputation(&self, participant_id: &str, level: ReputationLevel) -> Result<()> {
        self.db
            .put(keys::reputation(participant_id).as_bytes(), encode(&level)?)?;
        Ok(())
    }

    pub fn clear_reputation(&self, participant_id: &str) -> Result<()> {
        self.db.delete(keys::reputation(participant_id).as_bytes())?;
        Ok(())
    }

    // --- Node Identity ---

    /// Get or create the node's signing key (persistent identity).
    pub fn get_or_create_node_key(&self) -> Result<SigningKey> {
        if let Some(data) = self.db.get(keys::NODE_KEY)? {
            let bytes: [u8; 32] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::Storage("invalid stored node key".into()))?;
            Ok(SigningKey::from_bytes(&bytes))
        } else {
            let secret: [u8; 32] = rand::random();
            let signing_key = SigningKey::from_bytes(&secret);
            self.db.put(keys::NODE_KEY, signing_key.as_bytes())?;
            Ok(signing_key)
        }
    }
}

/// A pessimistic transaction over [`Storage`].
pub struct StoreTxn<'a> {
    txn: Transaction<'a, TransactionDB>,
}

impl StoreTxn<'_> {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.txn.get(key.as_bytes())? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn get_json_for_update<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.txn.get_for_update(key.as_bytes(), true)? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.txn.put(key.as_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Allocate the next id of a sequence, starting at 1.
    pub fn next_id(&self, sequence: &str) -> Result<u64> {
        let key = keys::counter(sequence);
        let next = self.get_json_for_update::<u64>(&key)?.unwrap_or(0) + 1;
        self.put_json(&key, &next)?;
        Ok(next)
    }

    // --- Catalog ---

    pub fn lock_deal(&self, id: u64) -> Result<Deal> {
        self.get_json_for_update(&keys::deal(id))?
            .ok_or(Error::DealNotFound(id))
    }

    pub fn put_deal(&self, deal: &Deal) -> Result<()> {
        self.put_json(&keys::deal(deal.id), deal)
    }

    pub fn put_tier(&self, rule: &TierRule) -> Result<()> {
        self.put_json(&keys::tier(rule.deal_id, rule.tier.rank), rule)
    }

    // --- Groups ---

    /// Read a group under an exclusive row lock.
    pub fn lock_group(&self, id: u64) -> Result<Group> {
        self.get_json_for_update(&keys::group(id))?
            .ok_or_else(|| Error::group_not_found(id))
    }

    /// Write a group and keep the open-group index in step with its status.
    pub fn put_group(&self, group: &Group) -> Result<()> {
        let open_key = keys::open_group(group.id);
        if group.is_open() {
            self.put_json(&open_key, &group.id)?;
        } else {
            self.txn.delete(open_key.as_bytes())?;
        }
        self.put_json(&keys::group(group.id), group)
    }

    /// Write the deal and invite indexes of a new group.
    pub fn index_group(&self, group: &Group) -> Result<()> {
        let invite = keys::invite(&group.invite_token);
        if self.get_json_for_update::<u64>(&invite)?.is_some() {
            return Err(Error::Storage(format!(
                "invite token collision for group {}",
                group.id
            )));
        }
        self.put_json(&invite, &group.id)?;
        self.put_json(&keys::deal_group(group.deal_id, group.id), &group.id)
    }

    pub fn get_member(&self, group_id: u64, participant_id: &str) -> Result<Option<Member>> {
        self.get_json(&keys::member(group_id, participant_id))
    }

    /// All members of a group, including writes made in this transaction.
    pub fn members(&self, group_id: u64) -> Result<Vec<Member>> {
        let prefix = keys::member_prefix(group_id);
        collect_prefix(self.txn.prefix_iterator(prefix.as_bytes()), prefix.as_bytes())
    }

    pub fn put_member(&self, member: &Member) -> Result<()> {
        self.put_json(&keys::member(member.group_id, &member.participant_id), member)
    }

    // --- Settlement artifacts ---

    pub fn put_settlement(&self, settlement: &Settlement) -> Result<()> {
        let key = keys::settlement(settlement.group_id);
        if self.get_json_for_update::<Settlement>(&key)?.is_some() {
            return Err(Error::Storage(format!(
                "settlement for group {} already exists",
                settlement.group_id
            )));
        }
        self.put_json(&key, settlement)
    }

    /// Insert a redemption and its unique code index entry.
    ///
    /// A code already present fails the whole transaction.
    pub fn insert_redemption(&self, redemption: &Redemption) -> Result<()> {
        let code_key = keys::redemption_code(&redemption.redemption_code);
        if self.get_json_for_update::<(u64, String)>(&code_key)?.is_some() {
            return Err(Error::Storage(format!(
                "redemption code collision: {}",
                redemption.redemption_code
            )));
        }
        self.put_json(
            &code_key,
            &(redemption.group_id, redemption.participant_id.as_str()),
        )?;
        self.put_redemption(redemption)
    }

    pub fn put_redemption(&self, redemption: &Redemption) -> Result<()> {
        self.put_json(
            &keys::redemption(redemption.group_id, &redemption.participant_id),
            redemption,
        )
    }

    /// Read a redemption by code under an exclusive lock.
    pub fn lock_redemption(&self, code: &str) -> Result<Redemption> {
        let not_found = || Error::RedemptionNotFound(code.to_string());
        let (group_id, participant_id) = self
            .get_json::<(u64, String)>(&keys::redemption_code(code))?
            .ok_or_else(not_found)?;
        self.get_json_for_update(&keys::redemption(group_id, &participant_id))?
            .ok_or_else(not_found)
    }

    pub fn put_notification(&self, notification: &Notification) -> Result<()> {
        let key = keys::notification(
            &notification.participant_id,
            notification.group_id,
            notification.kind.as_str(),
        );
        self.put_json(&key, notification)
    }

    pub fn put_activity(&self, record: &ActivityRecord) -> Result<()> {
        let key = keys::activity(&record.participant_id, record.group_id, record.action.as_str());
        self.put_json(&key, record)
    }

    /// Commit all staged writes and release locks.
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealStatus, GroupStatus, MemberStatus};
    use cohort_tiers::{CountingPolicy, Tier};
    use tempfile::tempdir;

    fn deal(id: u64) -> Deal {
        Deal {
            id,
            title: "Kayak tour".into(),
            category: "outdoors".into(),
            merchant_id: "m-1".into(),
            base_price: 60.0,
            counting_policy: CountingPolicy::ByCount,
            min_participants: 2,
            start_at: 0,
            end_at: 1_000,
            status: DealStatus::Active,
            created_at: 0,
        }
    }

    #[test]
    fn deal_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        txn.put_deal(&deal(1)).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_deal(1).unwrap(), Some(deal(1)));
        assert_eq!(storage.get_deal(2).unwrap(), None);
    }

    #[test]
    fn uncommitted_writes_are_discarded() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        {
            let txn = storage.transaction();
            txn.put_deal(&deal(1)).unwrap();
        }

        assert!(storage.get_deal(1).unwrap().is_none());
    }

    #[test]
    fn counters_start_at_one() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        assert_eq!(txn.next_id("group").unwrap(), 1);
        assert_eq!(txn.next_id("group").unwrap(), 2);
        assert_eq!(txn.next_id("deal").unwrap(), 1);
        txn.commit().unwrap();

        let txn = storage.transaction();
        assert_eq!(txn.next_id("group").unwrap(), 3);
    }

    #[test]
    fn tiers_scan_in_rank_order() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        for (rank, threshold) in [(10, 9.0), (2, 5.0), (1, 3.0)] {
            txn.put_tier(&TierRule {
                deal_id: 1,
                tier: Tier::new(rank, threshold, 5.0),
            })
            .unwrap();
        }
        // another deal's tiers must not leak into the scan
        txn.put_tier(&TierRule {
            deal_id: 2,
            tier: Tier::new(1, 1.0, 1.0),
        })
        .unwrap();
        txn.commit().unwrap();

        let ranks: Vec<u32> = storage.tiers(1).unwrap().iter().map(|r| r.tier.rank).collect();
        assert_eq!(ranks, vec![1, 2, 10]);
    }

    #[test]
    fn transaction_sees_its_own_members() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        txn.put_member(&Member::new(5, "alice".into(), 1, 0)).unwrap();
        txn.put_member(&Member::new(5, "bob".into(), 2, 0)).unwrap();
        txn.put_member(&Member::new(6, "carol".into(), 1, 0)).unwrap();

        let members = txn.members(5).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| m.status == MemberStatus::Pledged));
        txn.commit().unwrap();

        assert_eq!(storage.members(5).unwrap().len(), 2);
    }

    #[test]
    fn missing_group_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        assert!(matches!(txn.lock_group(42), Err(Error::GroupNotFound(_))));
    }

    #[test]
    fn open_group_index_follows_status() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.transaction();
        for id in [3, 1, 2] {
            txn.put_group(&Group::new(id, 1, "host".into(), format!("t{}", id), 100, 0))
                .unwrap();
        }
        txn.commit().unwrap();
        assert_eq!(storage.open_group_ids().unwrap(), vec![1, 2, 3]);

        let txn = storage.transaction();
        let mut group = txn.lock_group(2).unwrap();
        group.status = GroupStatus::Locked;
        txn.put_group(&group).unwrap();
        txn.commit().unwrap();
        assert_eq!(storage.open_group_ids().unwrap(), vec![1, 3]);

        // a rolled-back close leaves the index untouched
        {
            let txn = storage.transaction();
            let mut group = txn.lock_group(3).unwrap();
            group.status = GroupStatus::Cancelled;
            txn.put_group(&group).unwrap();
        }
        assert_eq!(storage.open_group_ids().unwrap(), vec![1, 3]);
    }

    #[test]
    fn node_key_persists() {
        let dir = tempdir().unwrap();
        let first = {
            let storage = Storage::open(dir.path()).unwrap();
            storage.get_or_create_node_key().unwrap()
        };
        let storage = Storage::open(dir.path()).unwrap();
        let second = storage.get_or_create_node_key().unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn reputation_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert_eq!(storage.get_reputation("alice").unwrap(), None);
        storage.set_reputation("alice", ReputationLevel::Expert).unwrap();
        assert_eq!(
            storage.get_reputation("alice").unwrap(),
            Some(ReputationLevel::Expert)
        );
        storage.clear_reputation("alice").unwrap();
        assert_eq!(storage.get_reputation("alice").unwrap(), None);
    }
}
