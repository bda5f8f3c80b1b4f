use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{OrderId, OrderStatus};
use tracing::{info, warn};

use super::{require_user, validate_order_id};
use crate::{
    command::Command,
    error::CommandError,
    services::{OrderService, SessionProvider},
};

/// Marks an order's photo set as submitted, moving the order to
/// [`OrderStatus::Completed`].
pub struct SubmitPhotosCommand {
    orders: Arc<dyn OrderService>,
    session: Arc<dyn SessionProvider>,
    order_id: OrderId,
    previous_status: Option<OrderStatus>,
}

impl SubmitPhotosCommand {
    pub fn new(
        orders: Arc<dyn OrderService>,
        session: Arc<dyn SessionProvider>,
        order_id: OrderId,
    ) -> Self {
        Self {
            orders,
            session,
            order_id,
            previous_status: None,
        }
    }

    pub fn previous_status(&self) -> Option<OrderStatus> {
        self.previous_status
    }
}

#[async_trait]
impl Command for SubmitPhotosCommand {
    /// `false` when the order does not exist.
    type Output = bool;

    fn can_execute(&self) -> bool {
        self.session.current_user().is_some() && validate_order_id(self.order_id).is_ok()
    }

    async fn execute(&mut self) -> Result<bool, CommandError> {
        validate_order_id(self.order_id)?;
        require_user(self.session.as_ref(), self.description())?;

        let order = self
            .orders
            .get_order_by_id(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        let Some(order) = order else {
            warn!(order_id = self.order_id.0, "submit skipped: order not found");
            return Ok(false);
        };

        self.previous_status = Some(order.status);
        let completed = self
            .orders
            .complete_order(self.order_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        if !completed {
            warn!(order_id = self.order_id.0, "order disappeared before completion");
            self.previous_status = None;
            return Ok(false);
        }

        info!(order_id = self.order_id.0, from = %order.status, "order completed");
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

        info!(order_id = self.order_id.0, status = %previous, "order submission reverted");
        self.previous_status = None;
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.previous_status.is_some()
    }

    fn description(&self) -> String {
        format!("Submit photos of order {}", self.order_id)
    }
}
