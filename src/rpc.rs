//! The JSON-RPC 2.0 method table. The transport framework (HTTP serving
//! itself) is provided by `jsonrpsee`; everything this module adds is the
//! thin binding from the five node methods to [`Engine`] operations, with
//! no business logic of its own. Failures never cross the RPC boundary as
//! exceptions: `receive_transaction` and `receive_block` format a caught
//! error into `"error: ..."`; `get_block` instead reports an empty chain
//! or an out-of-range height as `"error-empty blockchain"` /
//! `"error-invalid block height"`, matching the source's distinct
//! hyphenated convention for that one method.

use helium_core::{Block, Engine, Transaction};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use std::sync::Arc;

#[rpc(server)]
pub trait HeliumRpc {
    #[method(name = "receive_transaction")]
    async fn receive_transaction(&self, trx: Transaction) -> RpcResult<String>;

    #[method(name = "receive_block")]
    async fn receive_block(&self, block: Block) -> RpcResult<String>;

    #[method(name = "get_block")]
    async fn get_block(&self, height: u64) -> RpcResult<serde_json::Value>;

    #[method(name = "get_blockchain_height")]
    async fn get_blockchain_height(&self) -> RpcResult<i64>;

    #[method(name = "clear_blockchain")]
    async fn clear_blockchain(&self) -> RpcResult<String>;
}

pub struct HeliumRpcImpl {
    engine: Arc<Engine>,
}

impl HeliumRpcImpl {
    #[must_use]
    pub const fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl HeliumRpcServer for HeliumRpcImpl {
    async fn receive_transaction(&self, trx: Transaction) -> RpcResult<String> {
        Ok(match self.engine.receive_transaction(trx) {
            Ok(()) => "ok".to_string(),
            Err(err) => format!("error: {err}"),
        })
    }

    async fn receive_block(&self, block: Block) -> RpcResult<String> {
        Ok(match self.engine.receive_block(block) {
            Ok(()) => "ok".to_string(),
            Err(err) => format!("error: {err}"),
        })
    }

    async fn get_block(&self, height: u64) -> RpcResult<serde_json::Value> {
        Ok(match self.engine.get_block(height) {
            Some(block) => serde_json::to_value(block)
                .unwrap_or_else(|err| serde_json::Value::String(format!("error: {err}"))),
            None if self.engine.blockchain_height() < 0 => {
                serde_json::Value::String("error-empty blockchain".to_string())
            }
            None => serde_json::Value::String("error-invalid block height".to_string()),
        })
    }

    async fn get_blockchain_height(&self) -> RpcResult<i64> {
        Ok(self.engine.blockchain_height())
    }

    async fn clear_blockchain(&self) -> RpcResult<String> {
        self.engine.clear_blockchain();
        Ok("ok".to_string())
    }
}

/// Starts the JSON-RPC server bound to `addr`, dispatching into `engine`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server(addr: &str, engine: Arc<Engine>) -> shared::Result<ServerHandle> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|err| shared::BlockchainError::NetworkError(err.to_string()))?;
    Ok(server.start(HeliumRpcImpl::new(engine).into_rpc()))
}
