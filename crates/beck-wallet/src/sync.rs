//! Reconciliation of wallet state with the node's chain state.
//!
//! A wallet's view may lag the chain (missed applications) or lead it
//! (missed rollbacks). [`SyncContext::sync_wallets`] reconciles each
//! wallet with the current tip in up to two phases:
//!
//! 1. If the wallet is more than `security_param` blocks behind, the bulk
//!    of the catch-up runs *without* the node state lock, up to the header
//!    `security_param + 1` blocks below the tip. The chain cannot
//!    reorganize past that depth, so the computed modifier cannot be
//!    invalidated.
//! 2. The final, bounded-length stretch runs under the state lock at high
//!    priority, against a re-read tip.
//!
//! Each phase commits its whole accumulated modifier atomically together
//! with the new sync tip. A failure in one wallet is logged and does not
//! stop the others.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tracing::{debug, error, info, warn};

use beck_core::chain::{fold_up_while, ChainReader};
use beck_core::lock::{Priority, StateLock};
use beck_core::slotting::SlotClock;
use beck_core::types::{BlockHeader, TxIn};

use crate::creds::{credentials, DecryptionCredentials};
use crate::db::{AddressKind, WalletStore, WalletTip};
use crate::error::SyncError;
use crate::keys::RootSeed;
use crate::modifier::{PtxBlockInfo, WalletModifier};
use crate::tracker::{apply_txs, rollback_txs, BlockInfo, TrackedTx};

/// Sentinel flag for contexts that are never cancelled.
static NEVER_CANCELLED: AtomicBool = AtomicBool::new(false);

/// The collaborators the sync engine runs against.
///
/// All capabilities are explicit references; nothing global.
pub struct SyncContext<'a> {
    /// Chain read API.
    pub chain: &'a dyn ChainReader,
    /// Wallet persistence.
    pub store: &'a dyn WalletStore,
    /// Chain time.
    pub clock: &'a dyn SlotClock,
    /// The node state lock.
    pub lock: &'a StateLock,
    /// Maximum reorganization depth (the chain security parameter `k`).
    pub security_param: u64,
    /// Cooperative cancellation flag, checked at every block step.
    pub cancel: &'a AtomicBool,
}

impl<'a> SyncContext<'a> {
    /// Build a context that is never cancelled.
    pub fn new(
        chain: &'a dyn ChainReader,
        store: &'a dyn WalletStore,
        clock: &'a dyn SlotClock,
        lock: &'a StateLock,
        security_param: u64,
    ) -> Self {
        Self { chain, store, clock, lock, security_param, cancel: &NEVER_CANCELLED }
    }

    /// Use an external cancellation flag.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = cancel;
        self
    }

    /// Synchronize every wallet with the chain tip.
    ///
    /// Failures are per-wallet: an error is logged with the wallet id and
    /// the remaining wallets still run.
    pub fn sync_wallets(&self, roots: &[RootSeed]) {
        for root in roots {
            let creds = credentials(root);
            let wallet = creds.wallet();
            if let Err(e) = self.sync_wallet(&creds) {
                error!(%wallet, %e, "wallet sync failed");
            }
        }
    }

    /// Register and synchronize a freshly imported wallet.
    ///
    /// The wallet is marked not ready for the duration of the catch-up.
    pub fn sync_wallet_on_import(&self, root: &RootSeed) -> Result<(), SyncError> {
        let creds = credentials(root);
        let wallet = creds.wallet();
        self.store.register_wallet(wallet)?;
        self.store.set_wallet_ready(&wallet, false)?;
        info!(%wallet, "importing wallet");
        self.sync_wallet(&creds)
    }

    /// Reconcile one wallet with the chain tip.
    fn sync_wallet(&self, creds: &DecryptionCredentials) -> Result<(), SyncError> {
        let wallet = creds.wallet();
        let mut wallet_header = match self.store.sync_tip(&wallet)? {
            WalletTip::NotSynced => self.seed_from_genesis(creds)?,
            WalletTip::SyncedWith(hash) => self.chain.get_header(&hash)?.ok_or_else(|| {
                SyncError::Internal(format!(
                    "wallet {wallet} is synced with header {hash} unknown to the chain"
                ))
            })?,
        };

        let tip = self.chain.tip_header()?;
        debug!(
            %wallet,
            wallet_difficulty = wallet_header.difficulty,
            tip_difficulty = tip.difficulty,
            "reconciling wallet with chain tip",
        );

        // Phase 1: the lag exceeds the rollback horizon, so everything up
        // to `security_param + 1` blocks below the tip is immutable and
        // can be processed without the state lock.
        if tip.difficulty > wallet_header.difficulty + self.security_param {
            let headers = self
                .chain
                .load_headers_by_depth(self.security_param + 2, &tip.hash())?;
            let target = headers.0.last().cloned().ok_or_else(|| {
                SyncError::Internal(format!("no ancestor headers below tip {}", tip.hash()))
            })?;
            let modifier = self.reconcile(creds, &wallet_header, &target)?;
            self.store.apply_modifier(&wallet, target.hash(), &modifier)?;
            info!(%wallet, tip = %target.hash(), "bulk catch-up committed");
            wallet_header = target;
        }

        // Phase 2: bounded catch-up under the state lock, against a tip
        // re-read while holding it.
        let outcome = self.lock.with(Priority::High, || -> Result<(), SyncError> {
            let locked_tip = self.chain.tip_header()?;
            let modifier = self.reconcile(creds, &wallet_header, &locked_tip)?;
            self.store.apply_modifier(&wallet, locked_tip.hash(), &modifier)?;
            info!(%wallet, tip = %locked_tip.hash(), "wallet synced");
            Ok(())
        });
        outcome?;

        self.store.set_wallet_ready(&wallet, true)?;
        Ok(())
    }

    /// Seed a never-synced wallet with its genesis-owned UTXO subset and
    /// commit it against the genesis header.
    fn seed_from_genesis(
        &self,
        creds: &DecryptionCredentials,
    ) -> Result<BlockHeader, SyncError> {
        let wallet = creds.wallet();
        let genesis = self.chain.genesis_header()?;
        let genesis_utxo = self.chain.genesis_utxo()?;

        let mut modifier = WalletModifier::new();
        let own = creds.select_own(genesis_utxo, |(_, out)| &out.address);
        let owned = own.len();
        for ((input, out), meta) in own {
            modifier.utxo.insert(input, out);
            modifier.addresses.insert(meta);
        }
        self.store.apply_modifier(&wallet, genesis.hash(), &modifier)?;
        info!(%wallet, owned, "seeded wallet from genesis UTXO");
        Ok(genesis)
    }

    /// Compute the modifier reconciling `from` to `to`, choosing the
    /// direction by difficulty.
    fn reconcile(
        &self,
        creds: &DecryptionCredentials,
        from: &BlockHeader,
        to: &BlockHeader,
    ) -> Result<WalletModifier, SyncError> {
        let wallet = creds.wallet();
        let db_used = self.store.custom_addresses(&wallet, AddressKind::Used)?;
        let info = |header: &BlockHeader| self.block_info(header);

        match to.difficulty.cmp(&from.difficulty) {
            Ordering::Greater => fold_up_while::<WalletModifier, SyncError>(
                self.chain,
                from,
                &|header| header.difficulty <= to.difficulty,
                &mut |modifier, header| {
                    self.check_cancelled()?;
                    let txs = self.block_txs(header)?;
                    Ok(apply_txs(creds, &db_used, &info, modifier, &txs))
                },
                WalletModifier::new(),
            ),
            Ordering::Less => {
                let blunds = self
                    .chain
                    .load_blunds_while(&|header| header.difficulty > to.difficulty, &from.hash())?;
                let current_slot = self.clock.current_slot();
                let mut modifier = WalletModifier::new();
                for (block, undo) in blunds {
                    self.check_cancelled()?;
                    let txs = tracked_txs(&block.header, block.transactions, undo.tx_undos)
                        .map_err(SyncError::Internal)?;
                    let newest_first: Vec<TrackedTx> = txs.into_iter().rev().collect();
                    modifier = rollback_txs(
                        creds,
                        &db_used,
                        current_slot,
                        &info,
                        modifier,
                        &newest_first,
                    );
                }
                Ok(modifier)
            }
            Ordering::Equal => {
                if from.hash() != to.hash() {
                    warn!(
                        %wallet,
                        from = %from.hash(),
                        to = %to.hash(),
                        "wallet tip and chain tip at equal difficulty but different hashes",
                    );
                }
                Ok(WalletModifier::new())
            }
        }
    }

    /// Load the blund for a main-chain header and pair each transaction
    /// with its undo.
    fn block_txs(&self, header: &BlockHeader) -> Result<Vec<TrackedTx>, SyncError> {
        let hash = header.hash();
        let (block, undo) = self.chain.get_blund(&hash)?.ok_or_else(|| {
            SyncError::Internal(format!("main-chain header {hash} has no block data"))
        })?;
        tracked_txs(header, block.transactions, undo.tx_undos).map_err(SyncError::Internal)
    }

    /// Block context handed to the tracker for each header.
    fn block_info(&self, header: &BlockHeader) -> BlockInfo {
        let timestamp = self.clock.slot_start_of(header.slot);
        BlockInfo {
            difficulty: Some(header.difficulty),
            timestamp,
            ptx: Some(PtxBlockInfo {
                difficulty: header.difficulty,
                timestamp,
                header: header.hash(),
            }),
        }
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.load(AtomicOrdering::Relaxed) {
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }
}

/// Pair a block's transactions with their undo records and header.
fn tracked_txs(
    header: &BlockHeader,
    transactions: Vec<beck_core::types::TxAux>,
    tx_undos: Vec<Vec<Option<beck_core::types::TxOut>>>,
) -> Result<Vec<TrackedTx>, String> {
    if transactions.len() != tx_undos.len() {
        return Err(format!(
            "block {} has {} transactions but {} undo records",
            header.hash(),
            transactions.len(),
            tx_undos.len(),
        ));
    }
    Ok(transactions
        .into_iter()
        .zip(tx_undos)
        .map(|(aux, undo)| (aux, undo, header.clone()))
        .collect())
}

/// The set of inputs referenced by a collection of transactions.
///
/// Used to project the pending pool onto the input-selection policy.
pub fn referenced_inputs<'t>(
    txs: impl IntoIterator<Item = &'t beck_core::types::TxAux>,
) -> std::collections::BTreeSet<TxIn> {
    txs.into_iter()
        .flat_map(|aux| aux.tx.inputs.iter().cloned())
        .collect()
}
