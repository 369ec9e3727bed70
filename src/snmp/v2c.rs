use anyhow::{Context, Result};
use async_trait::async_trait;
use snmp2::AsyncSession;

use super::{ObjectId, Reconnect, RequestKind, RequestPolicy, VarBind, request};
use crate::config::settings::SnmpVersion;

/// Клиент с community-аутентификацией (SNMPv1 и SNMPv2c).
pub struct SnmpClientV2c {
    pub(crate) address: String,
    version: SnmpVersion,
    community: Vec<u8>,
    session: AsyncSession,
    policy: RequestPolicy,
}

async fn connect(target: &str, version: SnmpVersion, community: &[u8]) -> Result<AsyncSession> {
    match version {
        SnmpVersion::V1 => AsyncSession::new_v1(target, community, 2).await,
        _ => AsyncSession::new_v2c(target, community, 2).await,
    }
    .context("Не удалось создать SNMP сессию")
}

impl SnmpClientV2c {
    pub async fn new(
        target: &str,
        version: SnmpVersion,
        community: &[u8],
        policy: RequestPolicy,
    ) -> Result<Self> {
        let session = connect(target, version, community).await?;

        Ok(Self {
            address: target.to_string(),
            version,
            community: community.to_vec(),
            session,
            policy,
        })
    }

    pub async fn get(&mut self, oid: &ObjectId) -> crate::error::Result<VarBind> {
        let policy = self.policy;
        request(self, oid, RequestKind::Get, policy).await
    }

    pub async fn get_next(&mut self, oid: &ObjectId) -> crate::error::Result<VarBind> {
        let policy = self.policy;
        request(self, oid, RequestKind::GetNext, policy).await
    }
}

#[async_trait]
impl Reconnect for SnmpClientV2c {
    fn session(&mut self) -> &mut AsyncSession {
        &mut self.session
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.session = connect(&self.address, self.version, &self.community).await?;
        Ok(())
    }
}
