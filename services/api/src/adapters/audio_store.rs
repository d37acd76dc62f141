//! services/api/src/adapters/audio_store.rs
//!
//! This module contains the filesystem adapter for the `AudioStorageService`
//! port. Turn audio (learner uploads and synthesized replies) is written to
//! the configured upload directory and served back as static files.

use async_trait::async_trait;
use lingua_core::ports::{AudioStorageService, PortError, PortResult};
use std::path::PathBuf;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that stores audio artifacts on the local filesystem and builds
/// retrievable URLs under the public `/uploads` path.
#[derive(Clone)]
pub struct FsAudioStore {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl FsAudioStore {
    /// Creates a new `FsAudioStore`. The upload directory is created eagerly
    /// so the first turn of a conversation does not race directory creation.
    pub fn new(upload_dir: PathBuf, public_base_url: String) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self {
            upload_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

//=========================================================================================
// `AudioStorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AudioStorageService for FsAudioStore {
    async fn store_audio(&self, file_name: &str, bytes: &[u8]) -> PortResult<String> {
        // The callers generate UUID-based names; reject anything that could
        // escape the upload directory.
        if file_name.contains('/') || file_name.contains("..") {
            return Err(PortError::InvalidInput(format!(
                "Illegal audio file name: {}",
                file_name
            )));
        }

        let path = self.upload_dir.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Persistence(format!("Failed to write audio file: {}", e)))?;

        Ok(format!("{}/uploads/{}", self.public_base_url, file_name))
    }
}
