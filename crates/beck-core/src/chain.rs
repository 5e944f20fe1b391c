//! Chain read API and an in-memory implementation.
//!
//! The wallet tracker consumes the chain through [`ChainReader`]: header
//! and blund lookups, the forward-link map over the main chain, and the
//! genesis data. [`MemoryChainStore`] is the test-side implementation; the
//! production node backs the same trait with its block database.
//!
//! Blocks passed to [`MemoryChainStore::connect_block`] must already be
//! validated. The store only performs sanity checks (tip linkage,
//! difficulty continuity, no duplicates).

use std::collections::HashMap;

use crate::error::ChainError;
use crate::genesis::GenesisConfig;
use crate::slotting::SlotId;
use crate::types::{
    body_hash, Block, BlockHeader, Blund, HeaderHash, TxAux, TxIn, TxUndo, Undo, Utxo,
};

/// A sequence ordered newest block first.
///
/// Wrapper making the ordering part of the type, since both orderings of
/// header lists occur near each other in sync code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewestFirst<T>(pub Vec<T>);

impl<T> NewestFirst<T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> IntoIterator for NewestFirst<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Read-only view of the block chain.
///
/// Implemented by the node's block database; [`MemoryChainStore`] provides
/// the in-memory version used in tests.
pub trait ChainReader: Send + Sync {
    /// Look up a header by its hash. Returns `None` if unknown.
    fn get_header(&self, hash: &HeaderHash) -> Result<Option<BlockHeader>, ChainError>;

    /// The current tip header of the main chain.
    fn tip_header(&self) -> Result<BlockHeader, ChainError>;

    /// Look up a block and its undo data. Returns `None` if unknown.
    ///
    /// The genesis header has no blund.
    fn get_blund(&self, hash: &HeaderHash) -> Result<Option<Blund>, ChainError>;

    /// The next main-chain header after `hash`, or `None` at the tip.
    fn resolve_forward_link(&self, hash: &HeaderHash) -> Result<Option<HeaderHash>, ChainError>;

    /// The genesis header.
    fn genesis_header(&self) -> Result<BlockHeader, ChainError>;

    /// The genesis UTXO distribution.
    fn genesis_utxo(&self) -> Result<Utxo, ChainError>;

    /// Load up to `count` headers newest-first, starting at `from`
    /// inclusive and following `prev_hash` links. Stops at genesis.
    fn load_headers_by_depth(
        &self,
        count: u64,
        from: &HeaderHash,
    ) -> Result<NewestFirst<BlockHeader>, ChainError> {
        let mut headers = Vec::new();
        let mut cursor = *from;
        while (headers.len() as u64) < count {
            let header = self
                .get_header(&cursor)?
                .ok_or_else(|| ChainError::HeaderNotFound(cursor.to_string()))?;
            let genesis = header.is_genesis();
            cursor = header.prev_hash;
            headers.push(header);
            if genesis {
                break;
            }
        }
        Ok(NewestFirst(headers))
    }

    /// Load blunds newest-first, starting at `from` inclusive and
    /// continuing down the chain while `pred` holds. Never includes the
    /// genesis header (which has no blund).
    fn load_blunds_while(
        &self,
        pred: &dyn Fn(&BlockHeader) -> bool,
        from: &HeaderHash,
    ) -> Result<NewestFirst<Blund>, ChainError> {
        let mut blunds = Vec::new();
        let mut cursor = *from;
        loop {
            let header = self
                .get_header(&cursor)?
                .ok_or_else(|| ChainError::HeaderNotFound(cursor.to_string()))?;
            if header.is_genesis() || !pred(&header) {
                break;
            }
            let blund = self
                .get_blund(&cursor)?
                .ok_or_else(|| ChainError::BlundNotFound(cursor.to_string()))?;
            cursor = header.prev_hash;
            blunds.push(blund);
        }
        Ok(NewestFirst(blunds))
    }
}

/// Fold forward along the main chain.
///
/// Starts at the forward link of `start` and folds `step` over successive
/// headers while `cond` holds. An explicit loop, not recursion: chains are
/// long. The error type is anything chain errors convert into, so callers
/// can abort the fold with their own errors.
pub fn fold_up_while<A, E: From<ChainError>>(
    chain: &dyn ChainReader,
    start: &BlockHeader,
    cond: &dyn Fn(&BlockHeader) -> bool,
    step: &mut dyn FnMut(A, &BlockHeader) -> Result<A, E>,
    seed: A,
) -> Result<A, E> {
    let mut acc = seed;
    let mut cursor = chain.resolve_forward_link(&start.hash())?;
    while let Some(hash) = cursor {
        let header = chain
            .get_header(&hash)?
            .ok_or_else(|| ChainError::BrokenForwardLink(hash.to_string()))?;
        if !cond(&header) {
            break;
        }
        acc = step(acc, &header)?;
        cursor = chain.resolve_forward_link(&hash)?;
    }
    Ok(acc)
}

/// In-memory chain storage for tests.
///
/// Maintains headers, blunds, the forward-link map, and the UTXO set in
/// `HashMap`s with no persistence. Not suitable for production use.
pub struct MemoryChainStore {
    headers: HashMap<HeaderHash, BlockHeader>,
    blunds: HashMap<HeaderHash, Blund>,
    forward: HashMap<HeaderHash, HeaderHash>,
    utxo: Utxo,
    genesis: BlockHeader,
    genesis_utxo: Utxo,
    tip: HeaderHash,
}

impl MemoryChainStore {
    /// Create a chain holding only the genesis data.
    pub fn new(config: &GenesisConfig) -> Self {
        let genesis = config.header();
        let genesis_hash = genesis.hash();
        let genesis_utxo = config.utxo();
        let mut headers = HashMap::new();
        headers.insert(genesis_hash, genesis.clone());
        Self {
            headers,
            blunds: HashMap::new(),
            forward: HashMap::new(),
            utxo: genesis_utxo.clone(),
            genesis,
            genesis_utxo,
            tip: genesis_hash,
        }
    }

    /// Current tip hash.
    pub fn tip_hash(&self) -> HeaderHash {
        self.tip
    }

    /// The full UTXO set.
    pub fn utxo(&self) -> &Utxo {
        &self.utxo
    }

    /// Build the next block on the tip from a transaction list.
    ///
    /// Fills in the header (version, linkage, body hash, difficulty) so
    /// tests only supply the slot and transactions.
    pub fn build_next_block(&self, slot: SlotId, transactions: Vec<TxAux>) -> Block {
        let tip = &self.headers[&self.tip];
        let txids: Vec<_> = transactions.iter().map(|aux| aux.tx.txid()).collect();
        Block {
            header: BlockHeader {
                version: tip.version,
                prev_hash: self.tip,
                body_hash: body_hash(&txids),
                slot,
                difficulty: tip.difficulty + 1,
            },
            transactions,
        }
    }

    /// Connect a validated block at the tip.
    ///
    /// Spends the block's inputs, creates its outputs, records the undo
    /// data, and extends the forward-link map.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotExtendingTip`] if `prev_hash` is not the tip
    /// - [`ChainError::DifficultyMismatch`] if the difficulty does not
    ///   increase by exactly one
    /// - [`ChainError::DuplicateBlock`] if the header hash already exists
    /// - [`ChainError::MissingUtxo`] if an input is not in the UTXO set
    pub fn connect_block(&mut self, block: Block) -> Result<HeaderHash, ChainError> {
        let hash = block.header.hash();
        if block.header.prev_hash != self.tip {
            return Err(ChainError::NotExtendingTip {
                got: block.header.prev_hash.to_string(),
                tip: self.tip.to_string(),
            });
        }
        let expected = self.headers[&self.tip].difficulty + 1;
        if block.header.difficulty != expected {
            return Err(ChainError::DifficultyMismatch {
                expected,
                got: block.header.difficulty,
            });
        }
        if self.headers.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash.to_string()));
        }

        // Work on a copy so a mid-block failure leaves the set untouched.
        let mut utxo = self.utxo.clone();
        let mut tx_undos = Vec::with_capacity(block.transactions.len());
        for aux in &block.transactions {
            let mut undo: TxUndo = Vec::with_capacity(aux.tx.inputs.len());
            for input in &aux.tx.inputs {
                match input {
                    TxIn::Utxo(_) => {
                        let spent = utxo.remove(input).ok_or_else(|| {
                            ChainError::MissingUtxo(input.to_string())
                        })?;
                        undo.push(Some(spent));
                    }
                    TxIn::Unknown { .. } => undo.push(None),
                }
            }
            let txid = aux.tx.txid();
            for (index, output) in aux.tx.outputs.iter().enumerate() {
                utxo.insert(
                    TxIn::Utxo(crate::types::OutPoint { txid, index: index as u32 }),
                    output.clone(),
                );
            }
            tx_undos.push(undo);
        }

        self.utxo = utxo;
        self.forward.insert(self.tip, hash);
        self.headers.insert(hash, block.header.clone());
        self.blunds.insert(hash, (block, Undo { tx_undos }));
        self.tip = hash;
        Ok(hash)
    }

    /// Disconnect the tip block, restoring spent UTXOs from its undo data.
    ///
    /// The block's header and blund stay readable (off the main chain):
    /// wallets that synced past the old tip roll back by re-reading them.
    /// Only the forward link and the UTXO effects are reverted.
    pub fn disconnect_tip(&mut self) -> Result<HeaderHash, ChainError> {
        let tip_header = self.headers[&self.tip].clone();
        if tip_header.is_genesis() {
            return Err(ChainError::EmptyChain);
        }
        let (block, undo) = self
            .blunds
            .get(&self.tip)
            .cloned()
            .ok_or_else(|| ChainError::BlundNotFound(self.tip.to_string()))?;
        if undo.tx_undos.len() != block.transactions.len() {
            return Err(ChainError::UndoMismatch(self.tip.to_string()));
        }

        for (aux, tx_undo) in block.transactions.iter().zip(&undo.tx_undos).rev() {
            let txid = aux.tx.txid();
            for index in 0..aux.tx.outputs.len() {
                self.utxo.remove(&TxIn::Utxo(crate::types::OutPoint {
                    txid,
                    index: index as u32,
                }));
            }
            for (input, spent) in aux.tx.inputs.iter().zip(tx_undo) {
                if let Some(out) = spent {
                    self.utxo.insert(input.clone(), out.clone());
                }
            }
        }

        self.forward.remove(&tip_header.prev_hash);
        self.tip = tip_header.prev_hash;
        Ok(self.tip)
    }
}

impl ChainReader for MemoryChainStore {
    fn get_header(&self, hash: &HeaderHash) -> Result<Option<BlockHeader>, ChainError> {
        Ok(self.headers.get(hash).cloned())
    }

    fn tip_header(&self) -> Result<BlockHeader, ChainError> {
        self.headers
            .get(&self.tip)
            .cloned()
            .ok_or_else(|| ChainError::HeaderNotFound(self.tip.to_string()))
    }

    fn get_blund(&self, hash: &HeaderHash) -> Result<Option<Blund>, ChainError> {
        Ok(self.blunds.get(hash).cloned())
    }

    fn resolve_forward_link(&self, hash: &HeaderHash) -> Result<Option<HeaderHash>, ChainError> {
        Ok(self.forward.get(hash).copied())
    }

    fn genesis_header(&self) -> Result<BlockHeader, ChainError> {
        Ok(self.genesis.clone())
    }

    fn genesis_utxo(&self) -> Result<Utxo, ChainError> {
        Ok(self.genesis_utxo.clone())
    }
}
