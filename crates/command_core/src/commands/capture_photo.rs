use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use shared::domain::{OrderId, Photo, PhotoId, PhotoTemplate};
use tracing::{info, warn};

use super::{require_user, validate_order_id};
use crate::{
    command::Command,
    error::CommandError,
    services::{OrderService, PhotoService, PhotoUpload, SessionProvider},
};

/// Uploads a photo for one template slot of an order; undo deletes it again.
pub struct CapturePhotoCommand {
    photos: Arc<dyn PhotoService>,
    orders: Arc<dyn OrderService>,
    session: Arc<dyn SessionProvider>,
    file: PathBuf,
    order_id: OrderId,
    template: PhotoTemplate,
    created_photo: Option<PhotoId>,
}

impl CapturePhotoCommand {
    pub fn new(
        photos: Arc<dyn PhotoService>,
        orders: Arc<dyn OrderService>,
        session: Arc<dyn SessionProvider>,
        file: PathBuf,
        order_id: OrderId,
        template: PhotoTemplate,
    ) -> Self {
        Self {
            photos,
            orders,
            session,
            file,
            order_id,
            template,
            created_photo: None,
        }
    }

    pub fn created_photo(&self) -> Option<PhotoId> {
        self.created_photo
    }

    fn validate(&self) -> Result<(), CommandError> {
        validate_order_id(self.order_id)?;
        if self.file.as_os_str().is_empty() {
            return Err(CommandError::InvalidInput(
                "photo file path must not be empty".into(),
            ));
        }
        if self.template.order_id != self.order_id {
            return Err(CommandError::InvalidInput(format!(
                "template '{}' belongs to order {}, not order {}",
                self.template.name, self.template.order_id, self.order_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Command for CapturePhotoCommand {
    /// `None` when the order does not exist.
    type Output = Option<Photo>;

    fn can_execute(&self) -> bool {
        self.session.current_user().is_some() && self.validate().is_ok()
    }

    async fn execute(&mut self) -> Result<Option<Photo>, CommandError> {
        self.validate()?;
        let user = require_user(self.session.as_ref(), self.description())?;

        let order = self
            .orders
            .get_order_by_id(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if order.is_none() {
            warn!(order_id = self.order_id.0, "capture skipped: order not found");
            return Ok(None);
        }

        let photo = self
            .photos
            .upload_photo(PhotoUpload {
                file: self.file.clone(),
                order_id: self.order_id,
                template_id: self.template.template_id,
                uploaded_by: user.user_id,
            })
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;

        self.created_photo = Some(photo.photo_id);
        info!(
            order_id = self.order_id.0,
            photo_id = photo.photo_id.0,
            template = %self.template.name,
            "photo captured"
        );
        Ok(Some(photo))
    }

    async fn undo(&mut self) -> Result<(), CommandError> {
        let Some(photo_id) = self.created_photo else {
            return Err(CommandError::UndoUnavailable {
                command: self.description(),
            });
        };

        let deleted = self
            .photos
            .delete_photo(photo_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if !deleted {
            warn!(photo_id = photo_id.0, "photo was already gone when undoing capture");
        }
        self.created_photo = None;
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.created_photo.is_some()
    }

    fn description(&self) -> String {
        format!(
            "Capture photo '{}' for order {} (template '{}')",
            self.file.display(),
            self.order_id,
            self.template.name
        )
    }
}
