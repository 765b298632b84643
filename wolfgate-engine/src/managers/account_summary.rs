//! Account summary snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::engine::Engine;
use crate::errors::{EngineError, Result};
use crate::manager::{Manager, ManagerContext, ManagerHooks, UpdateStatus};
use crate::message::{Reply, ReplyBody};
use crate::messages::{AccountValue, CancelAccountSummary, ReqAccountSummary};

/// Requests an account summary under its own id and collects
/// `(account, tag) → value` rows until `ACCOUNT_SUMMARY_END`.
///
/// A non-warning server error for that id fails the manager.
#[derive(Debug)]
pub struct AccountSummaryHooks {
    group: String,
    tags: Vec<String>,
    req_id: RwLock<Option<i64>>,
    values: RwLock<BTreeMap<(String, String), AccountValue>>,
}

impl AccountSummaryHooks {
    pub fn new(group: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            group: group.into(),
            tags,
            req_id: RwLock::new(None),
            values: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl ManagerHooks for AccountSummaryHooks {
    async fn pre_loop(&self, ctx: &ManagerContext) -> Result<()> {
        let req_id = ctx.next_request_id();
        *self.req_id.write() = Some(req_id);
        ctx.subscribe(req_id).await?;
        ctx.send(&ReqAccountSummary {
            req_id,
            group: self.group.clone(),
            tags: self.tags.clone(),
        })
        .await
    }

    async fn receive(&self, _ctx: &ManagerContext, reply: &Reply) -> Result<UpdateStatus> {
        match &reply.body {
            ReplyBody::AccountSummary(value) => {
                self.values.write().insert(
                    (value.account.clone(), value.tag.clone()),
                    value.clone(),
                );
                Ok(UpdateStatus::Updated)
            }
            ReplyBody::AccountSummaryEnd => Ok(UpdateStatus::Finished),
            ReplyBody::Error(err) if !err.is_warning() && reply.id == *self.req_id.read() => {
                Err(EngineError::Server {
                    id: err.id,
                    code: err.code,
                    message: err.message.clone(),
                })
            }
            _ => Ok(UpdateStatus::NoChange),
        }
    }

    async fn pre_destroy(&self, ctx: &ManagerContext) {
        let Some(req_id) = *self.req_id.read() else {
            return;
        };
        if let Err(e) = ctx.send(&CancelAccountSummary { req_id }).await {
            tracing::debug!(req_id, error = %e, "account summary cancel not sent");
        }
    }
}

pub struct AccountSummaryManager {
    manager: Manager<AccountSummaryHooks>,
}

impl AccountSummaryManager {
    pub async fn start(engine: &Engine, group: &str, tags: Vec<String>) -> Result<Self> {
        let manager = Manager::start(engine, AccountSummaryHooks::new(group, tags)).await?;
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &Manager<AccountSummaryHooks> {
        &self.manager
    }

    /// Request id, once the request was sent.
    pub fn req_id(&self) -> Option<i64> {
        *self.manager.hooks().req_id.read()
    }

    /// Copy of the values received so far, ordered by account then tag.
    pub fn values(&self) -> Vec<AccountValue> {
        self.manager.hooks().values.read().values().cloned().collect()
    }
}
