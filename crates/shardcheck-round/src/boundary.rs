use std::time::Instant;

use shardcheck_tensor::{ShardKey, Tensor};

use crate::TransferError;

/// The external store a run moves shards through.
///
/// Calls block until the store is done or `deadline` passes. `Ok(false)`
/// means the store declined the request; `Err` means the call itself
/// failed. Both fail the round.
pub trait TransferBoundary {
    /// Publish shard contents for `seq_id`. Producer side.
    fn multi_put(
        &mut self,
        seq_id: u64,
        shards: &[(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError>;

    /// Fill shard contents in place for `seq_id`. Consumer side.
    fn multi_get(
        &mut self,
        seq_id: u64,
        shards: &mut [(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError>;

    /// Release everything held for `seq_id`.
    fn complete(&mut self, seq_id: u64) -> Result<(), TransferError>;
}

impl<B: TransferBoundary + ?Sized> TransferBoundary for &mut B {
    fn multi_put(
        &mut self,
        seq_id: u64,
        shards: &[(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        (**self).multi_put(seq_id, shards, deadline)
    }

    fn multi_get(
        &mut self,
        seq_id: u64,
        shards: &mut [(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        (**self).multi_get(seq_id, shards, deadline)
    }

    fn complete(&mut self, seq_id: u64) -> Result<(), TransferError> { (**self).complete(seq_id) }
}

impl<B: TransferBoundary + ?Sized> TransferBoundary for Box<B> {
    fn multi_put(
        &mut self,
        seq_id: u64,
        shards: &[(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        (**self).multi_put(seq_id, shards, deadline)
    }

    fn multi_get(
        &mut self,
        seq_id: u64,
        shards: &mut [(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        (**self).multi_get(seq_id, shards, deadline)
    }

    fn complete(&mut self, seq_id: u64) -> Result<(), TransferError> { (**self).complete(seq_id) }
}
