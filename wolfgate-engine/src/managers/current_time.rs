//! Server clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::engine::Engine;
use crate::errors::Result;
use crate::manager::{Manager, ManagerContext, ManagerHooks, UpdateStatus};
use crate::message::{Reply, ReplyBody};
use crate::messages::{ReqCurrentTime, ReqCurrentTimeInMillis};
use crate::protocol::server_version;

/// Asks for the server time once and finishes on the answer.
///
/// Uses millisecond precision when the server supports it.
#[derive(Debug, Default)]
pub struct CurrentTimeHooks {
    millis: RwLock<Option<i64>>,
}

#[async_trait]
impl ManagerHooks for CurrentTimeHooks {
    async fn pre_loop(&self, ctx: &ManagerContext) -> Result<()> {
        ctx.subscribe_unmatched().await?;
        if ctx.engine().server_version() >= server_version::CURRENT_TIME_IN_MILLIS {
            ctx.send(&ReqCurrentTimeInMillis).await
        } else {
            ctx.send(&ReqCurrentTime).await
        }
    }

    async fn receive(&self, _ctx: &ManagerContext, reply: &Reply) -> Result<UpdateStatus> {
        let millis = match reply.body {
            ReplyBody::CurrentTime { time } => time.saturating_mul(1000),
            ReplyBody::CurrentTimeInMillis { millis } => millis,
            _ => return Ok(UpdateStatus::NoChange),
        };
        *self.millis.write() = Some(millis);
        Ok(UpdateStatus::Finished)
    }
}

pub struct CurrentTimeManager {
    manager: Manager<CurrentTimeHooks>,
}

impl CurrentTimeManager {
    pub async fn start(engine: &Engine) -> Result<Self> {
        let manager = Manager::start(engine, CurrentTimeHooks::default()).await?;
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &Manager<CurrentTimeHooks> {
        &self.manager
    }

    /// Server time, once received.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let millis = (*self.manager.hooks().millis.read())?;
        DateTime::from_timestamp_millis(millis)
    }
}
