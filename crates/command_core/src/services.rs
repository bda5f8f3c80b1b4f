//! Collaborator interfaces the commands call, and the context that wires them.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{
    Order, OrderId, OrderStatus, Photo, PhotoId, PhotoTemplate, TemplateId, User, UserId,
};
use storage::Storage;

use crate::{
    backend::StorageServices,
    commands::{
        ApprovePhotosCommand, CapturePhotoCommand, FetchNextPhotoTemplateCommand, NfcLoginCommand,
        SubmitPhotosCommand,
    },
};

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn get_order_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;
    /// Moves the order to [`OrderStatus::Completed`]; `false` if the order does not exist.
    async fn complete_order(&self, order_id: OrderId) -> Result<bool>;
    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file: PathBuf,
    pub order_id: OrderId,
    pub template_id: TemplateId,
    pub uploaded_by: UserId,
}

#[async_trait]
pub trait PhotoService: Send + Sync {
    async fn upload_photo(&self, upload: PhotoUpload) -> Result<Photo>;
    /// `false` if no photo with that id existed.
    async fn delete_photo(&self, photo_id: PhotoId) -> Result<bool>;
    async fn get_photo_by_id(&self, photo_id: PhotoId) -> Result<Option<Photo>>;
}

#[async_trait]
pub trait TemplateService: Send + Sync {
    async fn templates_for_order(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>>;
    /// Required templates with no photo attached, in capture order.
    async fn missing_templates(&self, order_id: OrderId) -> Result<Vec<PhotoTemplate>>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate_with_nfc(&self, nfc_id: &str) -> Result<Option<User>>;
    fn is_logged_in(&self) -> bool;
    async fn logout(&self) -> Result<()>;
}

pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;
}

/// Composition root handing collaborators to commands at construction time.
#[derive(Clone)]
pub struct ServiceContext {
    pub orders: Arc<dyn OrderService>,
    pub photos: Arc<dyn PhotoService>,
    pub templates: Arc<dyn TemplateService>,
    pub auth: Arc<dyn AuthService>,
    pub session: Arc<dyn SessionProvider>,
}

impl ServiceContext {
    pub fn from_storage(storage: Storage) -> Self {
        let backend = Arc::new(StorageServices::new(storage));
        Self {
            orders: backend.clone(),
            photos: backend.clone(),
            templates: backend.clone(),
            auth: backend.clone(),
            session: backend,
        }
    }

    pub fn capture_photo(
        &self,
        file: impl Into<PathBuf>,
        order_id: OrderId,
        template: PhotoTemplate,
    ) -> CapturePhotoCommand {
        CapturePhotoCommand::new(
            self.photos.clone(),
            self.orders.clone(),
            self.session.clone(),
            file.into(),
            order_id,
            template,
        )
    }

    pub fn approve_photos(
        &self,
        order_id: OrderId,
        photo_ids: Vec<PhotoId>,
    ) -> ApprovePhotosCommand {
        ApprovePhotosCommand::new(
            self.orders.clone(),
            self.photos.clone(),
            self.templates.clone(),
            self.session.clone(),
            order_id,
            photo_ids,
        )
    }

    pub fn submit_photos(&self, order_id: OrderId) -> SubmitPhotosCommand {
        SubmitPhotosCommand::new(self.orders.clone(), self.session.clone(), order_id)
    }

    pub fn nfc_login(&self, nfc_id: impl Into<String>) -> NfcLoginCommand {
        NfcLoginCommand::new(self.auth.clone(), nfc_id.into())
    }

    pub fn fetch_next_template(&self, order_id: OrderId) -> FetchNextPhotoTemplateCommand {
        FetchNextPhotoTemplateCommand::new(self.orders.clone(), self.templates.clone(), order_id)
    }
}
