use anyhow::{Context, Result};
use async_trait::async_trait;
use snmp2::AsyncSession;
use snmp2::v3::{Auth, AuthProtocol, Cipher, Security};
use tokio::time::timeout;

use super::{ObjectId, Reconnect, RequestKind, RequestPolicy, VarBind, request};
use crate::config::settings::{AuthProtocolName, PrivProtocolName, SecurityLevel, UsmCredentials};

/// Клиент SNMPv3 (USM).
pub struct SnmpClientV3 {
    pub(crate) address: String,
    /// Параметры безопасности до engine discovery, из них собирается
    /// каждая новая сессия.
    security: Security,
    session: AsyncSession,
    policy: RequestPolicy,
}

/// Создает сессию и выполняет engine discovery.
async fn connect(target: &str, security: Security, policy: RequestPolicy) -> Result<AsyncSession> {
    let mut session = AsyncSession::new_v3(target, 0, security)
        .await
        .context("Не удалось создать SNMPv3 сессию")?;

    timeout(policy.timeout, session.init())
        .await
        .context("Таймаут engine discovery")?
        .context("Engine discovery не удался")?;

    Ok(session)
}

impl SnmpClientV3 {
    pub async fn new(target: &str, usm: &UsmCredentials, policy: RequestPolicy) -> Result<Self> {
        let security = Security::new(usm.user_name.as_bytes(), usm.auth_password.as_bytes())
            .with_auth_protocol(auth_protocol(usm.auth_protocol))
            .with_auth(auth_level(usm));

        let session = connect(target, security.clone(), policy).await?;

        Ok(Self {
            address: target.to_string(),
            security,
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
impl Reconnect for SnmpClientV3 {
    fn session(&mut self) -> &mut AsyncSession {
        &mut self.session
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.session = connect(&self.address, self.security.clone(), self.policy).await?;
        Ok(())
    }
}

fn auth_protocol(name: AuthProtocolName) -> AuthProtocol {
    match name {
        AuthProtocolName::Md5 => AuthProtocol::Md5,
        AuthProtocolName::Sha => AuthProtocol::Sha1,
    }
}

fn cipher(name: PrivProtocolName) -> Cipher {
    match name {
        PrivProtocolName::Des => Cipher::Des,
        PrivProtocolName::Aes => Cipher::Aes128,
    }
}

fn auth_level(usm: &UsmCredentials) -> Auth {
    match usm.security_level {
        SecurityLevel::NoAuthNoPriv => Auth::NoAuthNoPriv,
        SecurityLevel::AuthNoPriv => Auth::AuthNoPriv,
        SecurityLevel::AuthPriv => Auth::AuthPriv {
            cipher: cipher(usm.priv_protocol),
            privacy_password: usm.priv_password.as_bytes().to_vec(),
        },
    }
}
