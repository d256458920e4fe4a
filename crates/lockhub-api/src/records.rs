use serde_json::json;

use crate::client::{Intent, LockApi, Route, Verb};
use crate::error::Error;
use crate::models::{LockId, RecordPage};

impl LockApi {
    /// One page of unlock history, newest first. Pages start at 1.
    pub async fn list_unlock_records(
        &self,
        lock_id: LockId,
        page_no: u32,
        page_size: u32,
    ) -> Result<RecordPage, Error> {
        if page_no == 0 || page_size == 0 {
            return Err(Error::Validation {
                message: "page number and page size must be at least 1".into(),
            });
        }

        self.call(
            Verb::Get,
            "lockRecord/list",
            json!({
                "lockId": lock_id,
                "pageNo": page_no,
                "pageSize": page_size,
            }),
            Intent::Read,
            Route::Direct,
        )
        .await
    }
}
