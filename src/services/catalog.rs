//! Media catalog: lookups and the availability flag.
//!
//! No business validation happens here; the loan ledger decides when the
//! flag flips.

use crate::{
    error::{AppError, AppResult},
    models::Media,
    repository::StoreTx,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaCatalog;

impl MediaCatalog {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_id(&self, tx: &mut dyn StoreTx, id: i32) -> AppResult<Option<Media>> {
        tx.fetch_media(id).await
    }

    /// Like [`find_by_id`](Self::find_by_id) but unknown ids are `NotFound`
    pub async fn get(&self, tx: &mut dyn StoreTx, id: i32) -> AppResult<Media> {
        self.find_by_id(tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media with id {} not found", id)))
    }

    /// Returns false when the media does not exist
    pub async fn set_available(
        &self,
        tx: &mut dyn StoreTx,
        id: i32,
        available: bool,
    ) -> AppResult<bool> {
        tx.update_media_availability(id, available).await
    }

    pub async fn is_available(&self, tx: &mut dyn StoreTx, id: i32) -> AppResult<bool> {
        Ok(self.get(tx, id).await?.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{MediaType, NewMedia},
        repository::{MemoryStore, Store},
    };

    #[tokio::test]
    async fn test_availability_flag() {
        let store = MemoryStore::new();
        let media = store
            .add_media(NewMedia::new("Kind of Blue", "Miles Davis", "0000", MediaType::Cd))
            .await;
        let catalog = MediaCatalog::new();

        let mut tx = store.begin().await.unwrap();
        assert!(catalog.is_available(tx.as_mut(), media.id).await.unwrap());
        assert!(catalog.set_available(tx.as_mut(), media.id, false).await.unwrap());
        assert!(!catalog.is_available(tx.as_mut(), media.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_media() {
        let store = MemoryStore::new();
        let catalog = MediaCatalog::new();

        let mut tx = store.begin().await.unwrap();
        assert!(catalog.find_by_id(tx.as_mut(), 42).await.unwrap().is_none());
        assert!(matches!(
            catalog.is_available(tx.as_mut(), 42).await,
            Err(AppError::NotFound(_))
        ));
        assert!(!catalog.set_available(tx.as_mut(), 42, true).await.unwrap());
    }
}
