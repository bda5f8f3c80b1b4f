//! Concrete commands funnelled through the [`CommandManager`](crate::CommandManager).

mod approve_photos;
mod capture_photo;
mod fetch_next_template;
mod nfc_login;
mod submit_photos;

pub use approve_photos::ApprovePhotosCommand;
pub use capture_photo::CapturePhotoCommand;
pub use fetch_next_template::FetchNextPhotoTemplateCommand;
pub use nfc_login::NfcLoginCommand;
pub use submit_photos::SubmitPhotosCommand;

use shared::domain::{OrderId, User};

use crate::{error::CommandError, services::SessionProvider};

fn require_user(session: &dyn SessionProvider, command: String) -> Result<User, CommandError> {
    session
        .current_user()
        .ok_or(CommandError::NotAuthenticated { command })
}

fn validate_order_id(order_id: OrderId) -> Result<(), CommandError> {
    if order_id.0 <= 0 {
        return Err(CommandError::InvalidInput(format!(
            "order id must be positive, got {order_id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/commands_tests.rs"]
mod tests;
