use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{OrderId, OrderStatus, PhotoId};
use tracing::{info, warn};

use super::{require_user, validate_order_id};
use crate::{
    command::Command,
    error::CommandError,
    services::{OrderService, PhotoService, SessionProvider, TemplateService},
};

/// Approves the listed photos of an order. A completed order whose required
/// templates are all covered moves to [`OrderStatus::Approved`].
///
/// Undo restores the order status only; per-photo approval flags are left
/// untouched.
pub struct ApprovePhotosCommand {
    orders: Arc<dyn OrderService>,
    photos: Arc<dyn PhotoService>,
    templates: Arc<dyn TemplateService>,
    session: Arc<dyn SessionProvider>,
    order_id: OrderId,
    photo_ids: Vec<PhotoId>,
    previous_status: Option<OrderStatus>,
}

impl ApprovePhotosCommand {
    pub fn new(
        orders: Arc<dyn OrderService>,
        photos: Arc<dyn PhotoService>,
        templates: Arc<dyn TemplateService>,
        session: Arc<dyn SessionProvider>,
        order_id: OrderId,
        photo_ids: Vec<PhotoId>,
    ) -> Self {
        Self {
            orders,
            photos,
            templates,
            session,
            order_id,
            photo_ids,
            previous_status: None,
        }
    }

    pub fn previous_status(&self) -> Option<OrderStatus> {
        self.previous_status
    }

    fn validate(&self) -> Result<(), CommandError> {
        validate_order_id(self.order_id)?;
        if self.photo_ids.is_empty() {
            return Err(CommandError::InvalidInput(
                "at least one photo id is required for approval".into(),
            ));
        }
        Ok(())
    }

    /// Every listed photo must exist and belong to this order.
    async fn photos_belong_to_order(&self) -> Result<bool, CommandError> {
        for photo_id in &self.photo_ids {
            let photo = self
                .photos
                .get_photo_by_id(*photo_id)
                .await
                .map_err(|source| CommandError::execution(self.description(), source))?;
            match photo {
                Some(photo) if photo.order_id == self.order_id => {}
                Some(photo) => {
                    warn!(
                        photo_id = photo_id.0,
                        photo_order_id = photo.order_id.0,
                        order_id = self.order_id.0,
                        "approval skipped: photo belongs to another order"
                    );
                    return Ok(false);
                }
                None => {
                    warn!(photo_id = photo_id.0, "approval skipped: photo not found");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Command for ApprovePhotosCommand {
    /// `false` when the order or one of the photos does not exist.
    type Output = bool;

    fn can_execute(&self) -> bool {
        self.session.current_user().is_some() && self.validate().is_ok()
    }

    async fn execute(&mut self) -> Result<bool, CommandError> {
        self.validate()?;
        require_user(self.session.as_ref(), self.description())?;

        let order = self
            .orders
            .get_order_by_id(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        let Some(order) = order else {
            warn!(order_id = self.order_id.0, "approval skipped: order not found");
            return Ok(false);
        };

        if !self.photos_belong_to_order().await? {
            return Ok(false);
        }

        self.previous_status = Some(order.status);

        if order.status != OrderStatus::Completed {
            info!(
                order_id = self.order_id.0,
                status = %order.status,
                photos = self.photo_ids.len(),
                "photos approved; order is not completed yet"
            );
            return Ok(true);
        }

        let missing = self
            .templates
            .missing_templates(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if !missing.is_empty() {
            info!(
                order_id = self.order_id.0,
                missing = missing.len(),
                "photos approved; required templates still missing"
            );
            return Ok(true);
        }

        let updated = self
            .orders
            .update_order_status(self.order_id, OrderStatus::Approved)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if !updated {
            warn!(order_id = self.order_id.0, "order disappeared before approval");
            self.previous_status = None;
            return Ok(false);
        }

        info!(order_id = self.order_id.0, "order approved");
        Ok(true)
    }

    async fn undo(&mut self) -> Result<(), CommandError> {
        let Some(previous) = self.previous_status else {
            return Err(CommandError::UndoUnavailable {
                command: self.description(),
            });
        };

        let restored = self
            .orders
            .update_order_status(self.order_id, previous)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if !restored {
            return Err(CommandError::NotFound(format!("order {}", self.order_id)));
        }

        info!(order_id = self.order_id.0, status = %previous, "order approval reverted");
        self.previous_status = None;
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.previous_status.is_some()
    }

    fn description(&self) -> String {
        let ids = self
            .photo_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("Approve photos [{ids}] of order {}", self.order_id)
    }
}
