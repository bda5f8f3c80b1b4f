use std::path::PathBuf;

use command_core::{
    services::{AuthService, SessionProvider},
    CommandError, CommandManager, HistoryOperation, ServiceContext,
};
use shared::domain::{OrderId, OrderStatus, Photo, PhotoTemplate, User};
use storage::Storage;
use tempfile::TempDir;

struct Station {
    storage: Storage,
    services: ServiceContext,
    manager: CommandManager,
    order: OrderId,
    photo: PathBuf,
    _dir: TempDir,
}

async fn station() -> Station {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_user("inspector", Some("badge-7"))
        .await
        .expect("user");
    let order = storage.create_order("QC-2041").await.expect("order");
    storage
        .create_template(order, "front", 1, true)
        .await
        .expect("front");
    storage
        .create_template(order, "label", 2, true)
        .await
        .expect("label");
    storage
        .create_template(order, "detail", 3, false)
        .await
        .expect("optional");

    let dir = tempfile::tempdir().expect("tempdir");
    let photo = dir.path().join("shot.jpg");
    std::fs::write(&photo, b"\xff\xd8\xff\xe0 jpeg").expect("photo");

    Station {
        services: ServiceContext::from_storage(storage.clone()),
        manager: CommandManager::new(),
        storage,
        order,
        photo,
        _dir: dir,
    }
}

impl Station {
    async fn next_template(&self) -> Option<PhotoTemplate> {
        self.manager
            .execute(self.services.fetch_next_template(self.order))
            .await
            .expect("fetch next template")
    }

    async fn capture_next(&self) -> Photo {
        let template = self.next_template().await.expect("template left");
        self.manager
            .execute(self.services.capture_photo(&self.photo, self.order, template))
            .await
            .expect("capture")
            .expect("order exists")
    }

    async fn status(&self) -> OrderStatus {
        self.storage
            .load_order(self.order)
            .await
            .expect("load order")
            .expect("order exists")
            .status
    }
}

#[tokio::test]
async fn full_inspection_can_be_rewound_and_replayed() {
    let s = station().await;
    s.manager
        .execute(s.services.nfc_login("badge-7"))
        .await
        .expect("login")
        .expect("known badge");

    let front = s.capture_next().await;
    let label = s.capture_next().await;
    assert!(s.next_template().await.is_none());

    assert!(s
        .manager
        .execute(s.services.submit_photos(s.order))
        .await
        .expect("submit"));
    assert_eq!(s.status().await, OrderStatus::Completed);

    assert!(s
        .manager
        .execute(
            s.services
                .approve_photos(s.order, vec![front.photo_id, label.photo_id])
        )
        .await
        .expect("approve"));
    assert_eq!(s.status().await, OrderStatus::Approved);
    assert_eq!(s.manager.undo_len(), 5);

    s.manager.undo().await.expect("undo approve");
    assert_eq!(s.status().await, OrderStatus::Completed);
    s.manager.undo().await.expect("undo submit");
    assert_eq!(s.status().await, OrderStatus::Open);
    assert_eq!(
        s.manager.redo_descriptions(),
        vec![
            format!("Submit photos of order {}", s.order),
            format!(
                "Approve photos [{}, {}] of order {}",
                front.photo_id, label.photo_id, s.order
            ),
        ]
    );

    s.manager.redo().await.expect("redo submit");
    assert_eq!(s.status().await, OrderStatus::Completed);
    let approved = s.manager.redo().await.expect("redo approve");
    assert_eq!(approved.downcast_ref::<bool>(), Some(&true));
    assert_eq!(s.status().await, OrderStatus::Approved);
    assert!(!s.manager.can_redo());
    assert_eq!(s.manager.undo_len(), 5);
}

#[tokio::test]
async fn undoing_a_capture_frees_the_template_slot() {
    let s = station().await;
    s.manager
        .execute(s.services.nfc_login("badge-7"))
        .await
        .expect("login");

    let photo = s.capture_next().await;
    s.manager.undo().await.expect("undo capture");
    assert!(s
        .storage
        .load_photo(photo.photo_id)
        .await
        .expect("lookup")
        .is_none());
    assert_eq!(
        s.next_template().await.map(|t| t.name),
        Some("front".to_string())
    );

    // The template lookup is not undoable, but any new execution drops the redo stack.
    assert!(!s.manager.can_redo());
}

#[tokio::test]
async fn redo_after_undo_restores_the_capture() {
    let s = station().await;
    s.manager
        .execute(s.services.nfc_login("badge-7"))
        .await
        .expect("login");
    let template = s.next_template().await.expect("template");

    let first = s
        .manager
        .execute(s.services.capture_photo(&s.photo, s.order, template))
        .await
        .expect("capture")
        .expect("photo");
    s.manager.undo().await.expect("undo");

    let redone = s.manager.redo().await.expect("redo");
    let second = (*redone.downcast::<Option<Photo>>().expect("capture output")).expect("photo");
    assert_ne!(first.photo_id, second.photo_id);
    assert_eq!(second.template_id, first.template_id);
    assert_eq!(
        s.storage
            .photos_for_order(s.order)
            .await
            .expect("photos")
            .len(),
        1
    );
}

#[tokio::test]
async fn logging_out_by_undo_blocks_further_captures() {
    let s = station().await;
    s.manager
        .execute(s.services.nfc_login("badge-7"))
        .await
        .expect("login");
    s.manager.undo().await.expect("undo login");
    assert!(!s.services.auth.is_logged_in());

    let template = s.next_template().await.expect("template");
    let err = s
        .manager
        .execute(s.services.capture_photo(&s.photo, s.order, template))
        .await
        .expect_err("signed out");
    assert!(matches!(err, CommandError::PreconditionFailed { .. }));
    assert_eq!(s.manager.undo_len(), 0);
    assert!(s
        .storage
        .photos_for_order(s.order)
        .await
        .expect("photos")
        .is_empty());
}

#[tokio::test]
async fn two_logins_undo_twice_then_redo_twice() {
    let s = station().await;
    s.storage
        .create_user("supervisor", Some("badge-9"))
        .await
        .expect("supervisor");

    s.manager
        .execute(s.services.nfc_login("badge-7"))
        .await
        .expect("first login");
    s.manager
        .execute(s.services.nfc_login("badge-9"))
        .await
        .expect("second login");

    s.manager.undo().await.expect("undo second");
    s.manager.undo().await.expect("undo first");
    let err = s.manager.undo().await.expect_err("empty");
    assert!(matches!(err, CommandError::HistoryEmpty(HistoryOperation::Undo)));

    s.manager.redo().await.expect("redo first");
    let user = s.manager.redo().await.expect("redo second");
    let user = (*user.downcast::<Option<User>>().expect("login output")).expect("user");
    assert_eq!(user.username, "supervisor");
    assert_eq!(
        s.services.session.current_user().map(|u| u.username),
        Some("supervisor".to_string())
    );
    assert_eq!(
        s.manager.undo_descriptions(),
        vec![
            "NFC login with badge badge-9".to_string(),
            "NFC login with badge badge-7".to_string(),
        ]
    );
}
