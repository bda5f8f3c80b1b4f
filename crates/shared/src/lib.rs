pub mod domain;
pub mod error;

#[cfg(test)]
mod tests {
    use super::domain::OrderStatus;
    use super::error::{CommandFailure, ErrorCode};

    #[test]
    fn order_status_round_trips_through_its_storage_name() {
        for status in [
            OrderStatus::Open,
            OrderStatus::InProgress,
            OrderStatus::Completed,
            OrderStatus::Approved,
            OrderStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn failure_serializes_with_snake_case_code() {
        let failure = CommandFailure::new(ErrorCode::HistoryEmpty, "nothing to undo");
        let json = serde_json::to_value(&failure).expect("json");
        assert_eq!(json["code"], "history_empty");
        assert!(!failure.requires_reauth());
        assert!(CommandFailure::new(ErrorCode::NotAuthenticated, "x").requires_reauth());
    }
}
