use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{OrderId, PhotoTemplate};
use tracing::debug;

use super::validate_order_id;
use crate::{
    command::Command,
    error::CommandError,
    services::{OrderService, TemplateService},
};

/// Read-only lookup of the next required template still lacking a photo.
pub struct FetchNextPhotoTemplateCommand {
    orders: Arc<dyn OrderService>,
    templates: Arc<dyn TemplateService>,
    order_id: OrderId,
}

impl FetchNextPhotoTemplateCommand {
    pub fn new(
        orders: Arc<dyn OrderService>,
        templates: Arc<dyn TemplateService>,
        order_id: OrderId,
    ) -> Self {
        Self {
            orders,
            templates,
            order_id,
        }
    }
}

#[async_trait]
impl Command for FetchNextPhotoTemplateCommand {
    /// `None` when the order does not exist or nothing is missing.
    type Output = Option<PhotoTemplate>;

    fn can_execute(&self) -> bool {
        validate_order_id(self.order_id).is_ok()
    }

    async fn execute(&mut self) -> Result<Option<PhotoTemplate>, CommandError> {
        validate_order_id(self.order_id)?;

        let order = self
            .orders
            .get_order_by_id(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if order.is_none() {
            debug!(order_id = self.order_id.0, "no templates: order not found");
            return Ok(None);
        }

        let missing = self
            .templates
            .missing_templates(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        let next = missing
            .into_iter()
            .min_by_key(|template| (template.sequence, template.template_id));
        debug!(
            order_id = self.order_id.0,
            next = next.as_ref().map(|t| t.name.as_str()),
            "next photo template resolved"
        );
        Ok(next)
    }

    async fn undo(&mut self) -> Result<(), CommandError> {
        Ok(())
    }

    fn can_undo(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        format!("Fetch next photo template for order {}", self.order_id)
    }
}
