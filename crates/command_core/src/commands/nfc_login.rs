use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::User;
use tracing::{info, warn};

use crate::{command::Command, error::CommandError, services::AuthService};

/// Signs a user in with an NFC badge. Undo logs out whoever is signed in.
pub struct NfcLoginCommand {
    auth: Arc<dyn AuthService>,
    nfc_id: String,
}

impl NfcLoginCommand {
    pub fn new(auth: Arc<dyn AuthService>, nfc_id: String) -> Self {
        Self { auth, nfc_id }
    }
}

#[async_trait]
impl Command for NfcLoginCommand {
    /// `None` when the badge is not registered.
    type Output = Option<User>;

    fn can_execute(&self) -> bool {
        !self.nfc_id.trim().is_empty()
    }

    async fn execute(&mut self) -> Result<Option<User>, CommandError> {
        let nfc_id = self.nfc_id.trim();
        if nfc_id.is_empty() {
            return Err(CommandError::InvalidInput("nfc id must not be blank".into()));
        }

        let user = self
            .auth
            .authenticate_with_nfc(nfc_id)
            .await
            .map_err(|source| CommandError::execution(self.description(), source))?;
        match &user {
            Some(user) => info!(user_id = user.user_id.0, "nfc login succeeded"),
            None => warn!(nfc_id, "nfc badge not recognized"),
        }
        Ok(user)
    }

    async fn undo(&mut self) -> Result<(), CommandError> {
        if self.auth.is_logged_in() {
            self.auth
                .logout()
                .await
                .map_err(|source| CommandError::execution(self.description(), source))?;
            info!("nfc login reverted by logout");
        }
        Ok(())
    }

    fn can_undo(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("NFC login with badge {}", self.nfc_id.trim())
    }
}
