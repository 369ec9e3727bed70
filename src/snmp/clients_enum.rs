use async_trait::async_trait;

use super::v2c::SnmpClientV2c;
use super::v3::SnmpClientV3;
use super::{ObjectId, SnmpHandle, VarBind};
use crate::error::{Error, Result};

pub enum SnmpClient {
    V2c(SnmpClientV2c),
    V3(SnmpClientV3),
    /// Сокет уже закрыт, запросы отклоняются.
    Closed { address: String },
}

#[async_trait]
impl SnmpHandle for SnmpClient {
    async fn get(&mut self, oid: &ObjectId) -> Result<VarBind> {
        match self {
            SnmpClient::V2c(client) => client.get(oid).await,
            SnmpClient::V3(client) => client.get(oid).await,
            SnmpClient::Closed { address } => Err(Error::SessionClosed {
                address: address.clone(),
            }),
        }
    }

    async fn get_next(&mut self, oid: &ObjectId) -> Result<VarBind> {
        match self {
            SnmpClient::V2c(client) => client.get_next(oid).await,
            SnmpClient::V3(client) => client.get_next(oid).await,
            SnmpClient::Closed { address } => Err(Error::SessionClosed {
                address: address.clone(),
            }),
        }
    }

    // Сокет закрывается при drop сессии.
    fn close(&mut self) {
        let address = match self {
            SnmpClient::V2c(client) => client.address.clone(),
            SnmpClient::V3(client) => client.address.clone(),
            SnmpClient::Closed { .. } => return,
        };
        *self = SnmpClient::Closed { address };
    }
}
