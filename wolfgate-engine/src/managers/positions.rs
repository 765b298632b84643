//! Account positions snapshot.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::engine::Engine;
use crate::errors::Result;
use crate::manager::{Manager, ManagerContext, ManagerHooks, UpdateStatus};
use crate::message::{Reply, ReplyBody};
use crate::messages::{CancelPositions, Position, ReqPositions};

/// Collects `POSITION_DATA` rows until `POSITION_END`.
///
/// A later row for the same `(account, con_id)` replaces the earlier one.
#[derive(Debug, Default)]
pub struct PositionsHooks {
    positions: RwLock<Vec<Position>>,
}

#[async_trait]
impl ManagerHooks for PositionsHooks {
    async fn pre_loop(&self, ctx: &ManagerContext) -> Result<()> {
        ctx.subscribe_unmatched().await?;
        ctx.send(&ReqPositions).await
    }

    async fn receive(&self, _ctx: &ManagerContext, reply: &Reply) -> Result<UpdateStatus> {
        match &reply.body {
            ReplyBody::Position(position) => {
                let mut positions = self.positions.write();
                match positions
                    .iter_mut()
                    .find(|p| p.account == position.account && p.con_id == position.con_id)
                {
                    Some(existing) => *existing = position.clone(),
                    None => positions.push(position.clone()),
                }
                Ok(UpdateStatus::Updated)
            }
            ReplyBody::PositionEnd => Ok(UpdateStatus::Finished),
            _ => Ok(UpdateStatus::NoChange),
        }
    }

    async fn pre_destroy(&self, ctx: &ManagerContext) {
        if let Err(e) = ctx.send(&CancelPositions).await {
            tracing::debug!(error = %e, "positions cancel not sent");
        }
    }
}

pub struct PositionsManager {
    manager: Manager<PositionsHooks>,
}

impl PositionsManager {
    pub async fn start(engine: &Engine) -> Result<Self> {
        let manager = Manager::start(engine, PositionsHooks::default()).await?;
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &Manager<PositionsHooks> {
        &self.manager
    }

    /// Copy of the positions received so far.
    pub fn positions(&self) -> Vec<Position> {
        self.manager.hooks().positions.read().clone()
    }
}
