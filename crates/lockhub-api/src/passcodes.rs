// Passcode endpoints
//
// Creation, listing, deletion and partial change. Every mutation is
// programmed onto the lock through the gateway.

use serde_json::{Value, json};
use tracing::info;

use crate::client::{Intent, LockApi, Route, Verb};
use crate::error::Error;
use crate::models::{
    CreatedPasscode, LockId, NewPasscode, Passcode, PasscodeChange, PasscodeId, PasscodeList,
};

impl LockApi {
    pub async fn add_passcode(
        &self,
        lock_id: LockId,
        passcode: &NewPasscode,
    ) -> Result<CreatedPasscode, Error> {
        let created: CreatedPasscode = self
            .call(
                Verb::Post,
                passcode.endpoint(),
                passcode.to_params(lock_id),
                Intent::Write,
                Route::Gateway,
            )
            .await?;
        info!(%lock_id, passcode_id = %created.id, name = %passcode.name, "passcode created");
        Ok(created)
    }

    pub async fn list_passcodes(&self, lock_id: LockId) -> Result<Vec<Passcode>, Error> {
        let page: PasscodeList = self
            .call(
                Verb::Get,
                "lock/listKeyboardPwd",
                json!({ "lockId": lock_id }),
                Intent::Read,
                Route::Direct,
            )
            .await?;
        Ok(page.list)
    }

    pub async fn delete_passcode(&self, lock_id: LockId, id: PasscodeId) -> Result<(), Error> {
        let _: Value = self
            .call(
                Verb::Post,
                "keyboardPwd/delete",
                json!({
                    "lockId": lock_id,
                    "keyboardPwdId": id,
                    "deleteType": 2,
                }),
                Intent::Write,
                Route::Gateway,
            )
            .await?;
        info!(%lock_id, passcode_id = %id, "passcode deleted");
        Ok(())
    }

    /// Apply a partial change. An empty change is rejected before any I/O.
    pub async fn change_passcode(
        &self,
        lock_id: LockId,
        id: PasscodeId,
        change: &PasscodeChange,
    ) -> Result<(), Error> {
        if change.is_empty() {
            return Err(Error::Validation {
                message: "New passcode or passcode name is required.".into(),
            });
        }

        let _: Value = self
            .call(
                Verb::Post,
                "keyboardPwd/change",
                change.to_params(lock_id, id),
                Intent::Write,
                Route::Gateway,
            )
            .await?;
        info!(%lock_id, passcode_id = %id, "passcode changed");
        Ok(())
    }
}
