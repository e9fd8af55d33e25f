//! File service
//!
//! Entry point for the three calls. Every call first takes a permit from
//! its pool, so a busy server refuses work before touching the store.

use std::sync::Arc;

use depot_common::protocol::FileMetadata;
use futures_util::Stream;

use crate::admission::{AdmissionError, AdmissionGate, Permit};
use crate::catalog;
use crate::constants::{
    DEFAULT_LIST_CAPACITY, DEFAULT_TRANSFER_CAPACITY, ERR_TOO_MANY_DOWNLOADS, ERR_TOO_MANY_LISTS,
    ERR_TOO_MANY_UPLOADS, LIST_POOL, TRANSFER_POOL,
};
use crate::context::CallContext;
use crate::error::CallError;
use crate::store::FileStore;
use crate::transfers::{self, ChunkStream, UploadFrame};

/// Pool sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Uploads and downloads in flight, combined
    pub transfer_capacity: usize,
    /// List calls in flight
    pub list_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            transfer_capacity: DEFAULT_TRANSFER_CAPACITY,
            list_capacity: DEFAULT_LIST_CAPACITY,
        }
    }
}

/// Upload, download and list over a [`FileStore`]
///
/// Cheap to clone; clones share the store and both pools.
#[derive(Debug, Clone)]
pub struct FileService {
    store: FileStore,
    transfers: Arc<AdmissionGate>,
    lists: Arc<AdmissionGate>,
}

impl FileService {
    pub fn new(store: FileStore, config: ServiceConfig) -> Self {
        Self {
            store,
            transfers: Arc::new(AdmissionGate::new(TRANSFER_POOL, config.transfer_capacity)),
            lists: Arc::new(AdmissionGate::new(LIST_POOL, config.list_capacity)),
        }
    }

    #[must_use]
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Pool shared by uploads and downloads
    #[must_use]
    pub fn transfer_gate(&self) -> &AdmissionGate {
        &self.transfers
    }

    #[must_use]
    pub fn list_gate(&self) -> &AdmissionGate {
        &self.lists
    }

    /// Receive an upload
    ///
    /// Returns the success message naming the stored file. The transfer
    /// permit is held until the upload has finished or been cleaned up.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the transfer pool is full, `Cancelled` when
    /// `ctx` finishes, otherwise whatever the upload session reports.
    pub async fn upload<S>(&self, ctx: &CallContext, frames: S) -> Result<String, CallError>
    where
        S: Stream<Item = Result<UploadFrame, CallError>>,
    {
        let _permit = admit(&self.transfers, ctx, ERR_TOO_MANY_UPLOADS)?;
        transfers::receive_upload(&self.store, ctx, frames).await
    }

    /// Start a download
    ///
    /// The returned stream owns the transfer permit and releases it when it
    /// ends or is dropped.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the transfer pool is full, `Cancelled` when
    /// `ctx` is already done, `InvalidArgument` or `NotFound` for a bad name.
    pub async fn download(&self, ctx: &CallContext, filename: &str) -> Result<ChunkStream, CallError> {
        let permit = admit(&self.transfers, ctx, ERR_TOO_MANY_DOWNLOADS)?;
        ctx.run(transfers::open_download(&self.store, filename, permit))
            .await
    }

    /// Describe every stored file
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the list pool is full, `Cancelled` when
    /// `ctx` finishes, `Internal` when the store cannot be read.
    pub async fn list(&self, ctx: &CallContext) -> Result<Vec<FileMetadata>, CallError> {
        let _permit = admit(&self.lists, ctx, ERR_TOO_MANY_LISTS)?;
        ctx.run(catalog::list_files(&self.store)).await
    }
}

/// Take a permit from `gate`, mapping refusal to a call error
fn admit(gate: &AdmissionGate, ctx: &CallContext, busy: &str) -> Result<Permit, CallError> {
    gate.try_acquire(ctx).map_err(|e| match e {
        AdmissionError::Denied => {
            tracing::debug!(pool = gate.name(), capacity = gate.capacity(), "admission denied");
            CallError::resource_exhausted(busy)
        }
        AdmissionError::Cancelled => ctx.err().unwrap_or_else(CallError::cancelled),
    })
}
