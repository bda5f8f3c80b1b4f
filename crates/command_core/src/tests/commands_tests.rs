use super::*;
use std::path::PathBuf;

use shared::domain::{OrderStatus, PhotoId, PhotoTemplate, TemplateId};
use storage::Storage;
use tempfile::TempDir;

use crate::{
    command::Command,
    services::{AuthService, ServiceContext},
};

struct Fixture {
    storage: Storage,
    ctx: ServiceContext,
    order: OrderId,
    front: PhotoTemplate,
    back: PhotoTemplate,
    photo_path: PathBuf,
    _dir: TempDir,
}

async fn template(storage: &Storage, id: TemplateId) -> PhotoTemplate {
    storage
        .load_template(id)
        .await
        .expect("load template")
        .expect("template exists")
}

async fn fixture() -> Fixture {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_user("inspector", Some("nfc-inspector"))
        .await
        .expect("user");
    let order = storage.create_order("QC-1").await.expect("order");
    let front = storage
        .create_template(order, "front", 1, true)
        .await
        .expect("front");
    let back = storage
        .create_template(order, "back", 2, true)
        .await
        .expect("back");

    let dir = tempfile::tempdir().expect("tempdir");
    let photo_path = dir.path().join("capture.jpg");
    std::fs::write(&photo_path, b"jpeg-bytes").expect("photo file");

    Fixture {
        ctx: ServiceContext::from_storage(storage.clone()),
        front: template(&storage, front).await,
        back: template(&storage, back).await,
        storage,
        order,
        photo_path,
        _dir: dir,
    }
}

impl Fixture {
    async fn login(&self) {
        let user = self
            .ctx
            .nfc_login("nfc-inspector")
            .execute()
            .await
            .expect("login");
        assert!(user.is_some());
    }

    async fn capture(&self, template: &PhotoTemplate) -> PhotoId {
        self.ctx
            .capture_photo(&self.photo_path, self.order, template.clone())
            .execute()
            .await
            .expect("capture")
            .expect("order exists")
            .photo_id
    }

    async fn status(&self) -> OrderStatus {
        self.storage
            .load_order(self.order)
            .await
            .expect("load")
            .expect("order exists")
            .status
    }
}

#[tokio::test]
async fn capture_requires_a_signed_in_user() {
    let f = fixture().await;
    let mut command = f
        .ctx
        .capture_photo(&f.photo_path, f.order, f.front.clone());

    assert!(!command.can_execute());
    let err = command.execute().await.expect_err("no session");
    assert!(matches!(err, CommandError::NotAuthenticated { .. }));
    assert!(!command.can_undo());
}

#[tokio::test]
async fn undoing_a_capture_deletes_the_created_photo() {
    let f = fixture().await;
    f.login().await;
    let mut command = f
        .ctx
        .capture_photo(&f.photo_path, f.order, f.front.clone());

    let photo = command
        .execute()
        .await
        .expect("capture")
        .expect("photo");
    assert_eq!(photo.filename, "capture.jpg");
    assert_eq!(command.created_photo(), Some(photo.photo_id));
    assert!(command.can_undo());

    command.undo().await.expect("undo");
    assert!(f
        .storage
        .load_photo(photo.photo_id)
        .await
        .expect("lookup")
        .is_none());
    assert!(!command.can_undo());

    let err = command.undo().await.expect_err("nothing captured");
    assert!(matches!(err, CommandError::UndoUnavailable { .. }));
}

#[tokio::test]
async fn capture_for_unknown_order_soft_fails() {
    let f = fixture().await;
    f.login().await;
    let mut stray = f.front.clone();
    stray.order_id = OrderId(404);
    let mut command = f.ctx.capture_photo(&f.photo_path, OrderId(404), stray);

    assert!(command.execute().await.expect("soft fail").is_none());
    assert!(!command.can_undo());
}

#[tokio::test]
async fn capture_rejects_template_of_another_order() {
    let f = fixture().await;
    f.login().await;
    let other = f.storage.create_order("QC-2").await.expect("order");
    let mut command = f.ctx.capture_photo(&f.photo_path, other, f.front.clone());

    assert!(!command.can_execute());
    let err = command.execute().await.expect_err("mismatch");
    assert!(matches!(err, CommandError::InvalidInput(_)));
}

#[tokio::test]
async fn capture_wraps_upload_failures_with_the_command_description() {
    let f = fixture().await;
    f.login().await;
    let missing = f.photo_path.with_file_name("missing.jpg");
    let mut command = f.ctx.capture_photo(&missing, f.order, f.front.clone());

    let err = command.execute().await.expect_err("unreadable file");
    let CommandError::ExecutionFailure { command: label, source } = &err else {
        panic!("unexpected error {err:?}");
    };
    assert!(label.contains("missing.jpg"));
    assert!(source.to_string().contains("failed to read photo file"));
    assert!(!command.can_undo());
}

#[tokio::test]
async fn approving_a_completed_order_approves_it_and_undo_restores_completed() {
    let f = fixture().await;
    f.login().await;
    let front = f.capture(&f.front).await;
    let back = f.capture(&f.back).await;
    f.storage
        .set_order_status(f.order, OrderStatus::Completed)
        .await
        .expect("complete");

    let mut command = f.ctx.approve_photos(f.order, vec![front, back]);
    assert!(command.can_execute());
    assert!(command.execute().await.expect("approve"));
    assert_eq!(f.status().await, OrderStatus::Approved);
    assert_eq!(command.previous_status(), Some(OrderStatus::Completed));

    command.undo().await.expect("undo");
    assert_eq!(f.status().await, OrderStatus::Completed);
    assert!(!command.can_undo());
}

#[tokio::test]
async fn approval_keeps_status_while_required_templates_are_missing() {
    let f = fixture().await;
    f.login().await;
    let front = f.capture(&f.front).await;
    f.storage
        .set_order_status(f.order, OrderStatus::Completed)
        .await
        .expect("complete");

    let mut command = f.ctx.approve_photos(f.order, vec![front]);
    assert!(command.execute().await.expect("approve"));
    assert_eq!(f.status().await, OrderStatus::Completed);
    assert!(command.can_undo());
}

#[tokio::test]
async fn approval_with_unknown_photo_soft_fails_without_capturing_state() {
    let f = fixture().await;
    f.login().await;

    let mut command = f.ctx.approve_photos(f.order, vec![PhotoId(999)]);
    assert!(!command.execute().await.expect("soft fail"));
    assert!(!command.can_undo());
    assert_eq!(f.status().await, OrderStatus::Open);
}

#[tokio::test]
async fn approval_needs_photo_ids() {
    let f = fixture().await;
    f.login().await;

    let mut command = f.ctx.approve_photos(f.order, Vec::new());
    assert!(!command.can_execute());
    let err = command.execute().await.expect_err("empty");
    assert!(matches!(err, CommandError::InvalidInput(_)));
}

#[tokio::test]
async fn submit_completes_order_and_undo_restores_previous_status() {
    let f = fixture().await;
    f.login().await;
    f.storage
        .set_order_status(f.order, OrderStatus::InProgress)
        .await
        .expect("in progress");

    let mut command = f.ctx.submit_photos(f.order);
    assert!(command.execute().await.expect("submit"));
    assert_eq!(f.status().await, OrderStatus::Completed);
    assert_eq!(command.previous_status(), Some(OrderStatus::InProgress));

    command.undo().await.expect("undo");
    assert_eq!(f.status().await, OrderStatus::InProgress);
}

#[tokio::test]
async fn submit_for_unknown_order_soft_fails() {
    let f = fixture().await;
    f.login().await;

    let mut command = f.ctx.submit_photos(OrderId(404));
    assert!(!command.execute().await.expect("soft fail"));
    assert!(!command.can_undo());
}

#[tokio::test]
async fn invalid_order_id_is_rejected_before_any_lookup() {
    let f = fixture().await;
    f.login().await;

    let mut command = f.ctx.submit_photos(OrderId(0));
    assert!(!command.can_execute());
    let err = command.execute().await.expect_err("invalid id");
    assert!(matches!(err, CommandError::InvalidInput(_)));
}

#[tokio::test]
async fn nfc_login_sets_session_and_undo_logs_out() {
    let f = fixture().await;
    let mut command = f.ctx.nfc_login(" nfc-inspector ");

    let user = command.execute().await.expect("login").expect("user");
    assert_eq!(user.username, "inspector");
    assert_eq!(f.ctx.session.current_user(), Some(user));
    assert!(f.ctx.auth.is_logged_in());

    command.undo().await.expect("logout");
    assert!(f.ctx.session.current_user().is_none());
    command.undo().await.expect("logout is idempotent");
}

#[tokio::test]
async fn unknown_badge_returns_no_user_but_stays_undoable() {
    let f = fixture().await;
    let mut command = f.ctx.nfc_login("stranger");

    assert!(command.execute().await.expect("login").is_none());
    assert!(command.can_undo());
    assert!(!f.ctx.auth.is_logged_in());
}

#[tokio::test]
async fn blank_badge_is_invalid_input() {
    let f = fixture().await;
    let mut command = f.ctx.nfc_login("   ");

    assert!(!command.can_execute());
    let err = command.execute().await.expect_err("blank");
    assert!(matches!(err, CommandError::InvalidInput(_)));
}

#[tokio::test]
async fn next_template_follows_capture_order_until_complete() {
    let f = fixture().await;
    f.login().await;
    let mut fetch = f.ctx.fetch_next_template(f.order);

    assert_eq!(fetch.execute().await.expect("next"), Some(f.front.clone()));
    f.capture(&f.front).await;
    assert_eq!(fetch.execute().await.expect("next"), Some(f.back.clone()));
    f.capture(&f.back).await;
    assert_eq!(fetch.execute().await.expect("next"), None);

    assert!(!fetch.can_undo());
    fetch.undo().await.expect("no-op undo");
}

#[tokio::test]
async fn next_template_for_unknown_order_is_empty() {
    let f = fixture().await;
    let mut fetch = f.ctx.fetch_next_template(OrderId(404));

    assert!(fetch.can_execute());
    assert_eq!(fetch.execute().await.expect("next"), None);
}
