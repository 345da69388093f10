//! Node query endpoints (REST)

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::{Error, Result};
use crate::tx::Coin;

/// A transaction as resolved by the node after inclusion
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TxRecord {
    pub txhash: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

#[derive(Deserialize)]
struct TxQueryResponse {
    tx_response: TxRecord,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

/// Read access to a node's query surface
///
/// Implementations must be cheap to call repeatedly; they are used as
/// checks by [`crate::poll::Eventually`].
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Resolve a committed transaction; errors when unknown or failed on chain
    async fn tx_by_hash(&self, api: &str, hash: &str) -> Result<TxRecord>;

    /// Balance of `address` in `denom`
    async fn balance(&self, api: &str, address: &str, denom: &str) -> Result<Coin>;
}

pub fn tx_url(api: &str, hash: &str) -> String {
    format!("{}/cosmos/tx/v1beta1/txs/{}", api.trim_end_matches('/'), hash)
}

pub fn balance_url(api: &str, address: &str, denom: &str) -> String {
    format!(
        "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
        api.trim_end_matches('/'),
        address,
        denom
    )
}

/// Interpret a tx query body; non-zero codes are on-chain failures
pub fn parse_tx_response(body: &[u8]) -> Result<TxRecord> {
    let response: TxQueryResponse =
        serde_json::from_slice(body).map_err(|e| Error::decode("tx query response", e))?;
    let record = response.tx_response;
    if record.code != 0 {
        return Err(Error::ChainRejection {
            code: record.code,
            raw_log: record.raw_log,
        });
    }
    Ok(record)
}

/// Interpret a balance query body; a missing balance is zero
pub fn parse_balance_response(body: &[u8], denom: &str) -> Result<Coin> {
    let response: BalanceResponse =
        serde_json::from_slice(body).map_err(|e| Error::decode("balance query response", e))?;
    Ok(response.balance.unwrap_or_else(|| Coin::zero(denom)))
}

/// `ChainQuery` over HTTP
#[derive(Debug, Clone, Default)]
pub struct RestClient {
    client: reqwest::Client,
}

impl RestClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "ledger-e2e")
            .send()
            .await
            .map_err(|e| Error::query(url, e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::query(url, e))?;

        if !status.is_success() {
            return Err(Error::query(
                url,
                format!(
                    "status {}: {}",
                    status,
                    crate::common::truncate_output(&String::from_utf8_lossy(&body), 300)
                ),
            ));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ChainQuery for RestClient {
    async fn tx_by_hash(&self, api: &str, hash: &str) -> Result<TxRecord> {
        if hash.is_empty() {
            return Err(Error::query(api, "empty transaction hash"));
        }
        let url = tx_url(api, hash);
        let body = self.get(&url).await?;
        parse_tx_response(&body)
    }

    async fn balance(&self, api: &str, address: &str, denom: &str) -> Result<Coin> {
        let url = balance_url(api, address, denom);
        let body = self.get(&url).await?;
        parse_balance_response(&body, denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(
            tx_url("http://localhost:1317/", "ABCD"),
            "http://localhost:1317/cosmos/tx/v1beta1/txs/ABCD"
        );
        assert_eq!(
            balance_url("http://localhost:1317", "tori1abc", "utori"),
            "http://localhost:1317/cosmos/bank/v1beta1/balances/tori1abc/by_denom?denom=utori"
        );
    }

    #[test]
    fn test_parse_committed_tx() {
        let body = br#"{"tx":{},"tx_response":
            {"height":"42","txhash":"ABCD","code":0,"raw_log":""}}"#;
        let record = parse_tx_response(body).unwrap();
        assert_eq!(record.txhash, "ABCD");
        assert_eq!(record.height, "42");
    }

    #[test]
    fn test_parse_failed_tx_is_rejection() {
        let body = br#"{"tx_response":
            {"height":"42","txhash":"ABCD","code":5,"raw_log":"insufficient funds"}}"#;
        match parse_tx_response(body).unwrap_err() {
            Error::ChainRejection { code, raw_log } => {
                assert_eq!(code, 5);
                assert_eq!(raw_log, "insufficient funds");
            }
            other => panic!("Expected ChainRejection, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_balance() {
        let body = br#"{"balance":{"denom":"utori","amount":"1000"}}"#;
        assert_eq!(parse_balance_response(body, "utori").unwrap(), Coin::new(1000, "utori"));
        assert_eq!(
            parse_balance_response(br#"{"balance":null}"#, "utori").unwrap(),
            Coin::zero("utori")
        );
        assert!(parse_balance_response(b"<html>", "utori").is_err());
    }

    #[tokio::test]
    async fn test_empty_hash_does_not_hit_network() {
        let err = RestClient::new()
            .tx_by_hash("http://127.0.0.1:9", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }
}
