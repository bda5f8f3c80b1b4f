use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::domain::{Order, OrderId, OrderStatus, Photo, PhotoId, PhotoTemplate, User};
use storage::{NewPhoto, Storage};
use tracing::info;

use crate::services::{
    AuthService, OrderService, PhotoService, PhotoUpload, SessionProvider, TemplateService,
};

/// Collaborators backed by the SQLite store, with the login session held in memory.
pub struct StorageServices {
    storage: Storage,
    session: RwLock<Option<User>>,
}

impl StorageServices {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            session: RwLock::new(None),
        }
    }

    fn set_session(&self, user: Option<User>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

#[async_trait]
impl OrderService for StorageServices {
    async fn get_order_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.storage.load_order(order_id).await
    }

    async fn complete_order(&self, order_id: OrderId) -> Result<bool> {
        self.storage
            .set_order_status(order_id, OrderStatus::Completed)
            .await
    }

    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool> {
        self.storage.set_order_status(order_id, status).await
    }
}

#[async_trait]
impl PhotoService for StorageServices {
    async fn upload_photo(&self, upload: PhotoUpload) -> Result<Photo> {
        let content = tokio::fs::read(&upload.file)
            .await
            .with_context(|| format!("failed to read photo file '{}'", upload.file.display()))?;
        let filename = upload
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("photo path '{}' has no file name", upload.file.display()))?;
        self.storage
            .insert_photo(NewPhoto {
                order_id: upload.order_id,
                template_id: upload.template_id,
                filename: &filename,
                content: &content,
                uploaded_by: upload.uploaded_by,
            })
            .await
    }

    async fn delete_photo(&self, photo_id: PhotoId) -> Result<bool> {
        self.storage.delete_photo(photo_id).await
    }

    async fn get_photo_by_id(&self, photo_id: PhotoId) -> Result<Option<Photo>> {
        self.storage.load_photo(photo_id).await
    }
}

#[async_trait]
impl TemplateService for StorageServices {
    async fn templates_for_order(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>> {
        self.storage.templates_for_order(order_id).await
    }

    async fn missing_templates(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>> {
        self.storage.missing_templates(order_id).await
    }
}

#[async_trait]
impl AuthService for StorageServices {
    async fn authenticate_with_nfc(&self, nfc_id: &str) -> Result<Option<User>> {
        let user = self.storage.user_for_nfc(nfc_id).await?;
        if let Some(user) = &user {
            info!(user_id = user.user_id.0, username = %user.username, "nfc login accepted");
            self.set_session(Some(user.clone()));
        }
        Ok(user)
    }

    fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }

    async fn logout(&self) -> Result<()> {
        self.set_session(None);
        Ok(())
    }
}

impl SessionProvider for StorageServices {
    fn current_user(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
