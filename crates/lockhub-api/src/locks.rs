// Lock endpoints
//
// Listing, detail, bolt state, lock/unlock commands and passage mode.
// Commands and the state query travel through the gateway.

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::client::{Intent, LockApi, Route, Verb};
use crate::error::Error;
use crate::models::{
    Lock, LockId, LockList, LockSummary, OpenState, OpenStateResponse, PassageModeConfig,
    connectable_ids,
};

impl LockApi {
    /// Every lock on the account, connectable or not.
    pub async fn list_locks(&self) -> Result<Vec<LockSummary>, Error> {
        let page: LockList = self
            .call(Verb::Get, "lock/list", Value::Null, Intent::Read, Route::Direct)
            .await?;
        debug!(count = page.list.len(), "listed locks");
        Ok(page.list)
    }

    /// IDs of locks reachable through a gateway or Wi-Fi.
    pub async fn connectable_lock_ids(&self) -> Result<Vec<LockId>, Error> {
        let locks = self.list_locks().await?;
        Ok(connectable_ids(&locks))
    }

    pub async fn lock_detail(&self, lock_id: LockId) -> Result<Lock, Error> {
        self.call(
            Verb::Get,
            "lock/detail",
            json!({ "lockId": lock_id }),
            Intent::Read,
            Route::Direct,
        )
        .await
    }

    /// Ask the lock (via its gateway) whether the bolt is thrown.
    pub async fn query_open_state(&self, lock_id: LockId) -> Result<OpenState, Error> {
        let resp: OpenStateResponse = self
            .call(
                Verb::Get,
                "lock/queryOpenState",
                json!({ "lockId": lock_id }),
                Intent::Read,
                Route::Gateway,
            )
            .await?;
        OpenState::try_from(resp.state)
    }

    pub async fn passage_mode_config(&self, lock_id: LockId) -> Result<PassageModeConfig, Error> {
        self.call(
            Verb::Get,
            "lock/getPassageModeConfig",
            json!({ "lockId": lock_id }),
            Intent::Read,
            Route::Direct,
        )
        .await
    }

    pub async fn lock(&self, lock_id: LockId) -> Result<(), Error> {
        self.command(lock_id, "lock/lock").await
    }

    pub async fn unlock(&self, lock_id: LockId) -> Result<(), Error> {
        self.command(lock_id, "lock/unlock").await
    }

    async fn command(&self, lock_id: LockId, path: &str) -> Result<(), Error> {
        let _: Value = self
            .call(
                Verb::Get,
                path,
                json!({ "lockId": lock_id }),
                Intent::Write,
                Route::Gateway,
            )
            .await?;
        info!(%lock_id, "{path} confirmed");
        Ok(())
    }

    /// Push a passage mode schedule to the lock through its gateway.
    pub async fn set_passage_mode(
        &self,
        lock_id: LockId,
        config: &PassageModeConfig,
    ) -> Result<(), Error> {
        config.validate()?;

        let mut params = config.to_params();
        params["lockId"] = json!(lock_id);
        params["type"] = json!(2);

        let _: Value = self
            .call(
                Verb::Post,
                "lock/configPassageMode",
                params,
                Intent::Write,
                Route::Gateway,
            )
            .await?;
        info!(%lock_id, enabled = config.enabled, "passage mode updated");
        Ok(())
    }
}
