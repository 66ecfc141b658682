//! Thin reqwest wrapper over the three budgeting-service endpoints we use.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::SyncError;

pub const DEFAULT_BASE_URL: &str = "https://api.ynab.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct YnabClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CategoryGroupsData {
    category_groups: Vec<CategoryGroupDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryGroupDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionDto {
    pub id: String,
    pub date: String,
    pub amount: i64,
    pub account_id: String,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewTransactionBody {
    pub transaction: NewTransactionDto,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewTransactionDto {
    pub account_id: String,
    pub date: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub subtransactions: Vec<SubTransactionDto>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubTransactionDto {
    pub amount: i64,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl YnabClient {
    /// Builds a client talking to `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tandem/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn category_groups(
        &self,
        token: &str,
        budget_id: &str,
    ) -> Result<Vec<CategoryGroupDto>, SyncError> {
        let url = format!("{}/budgets/{budget_id}/categories", self.base_url);
        tracing::debug!(url = %url, "fetching category groups");
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Upstream {
                status: response.status().as_u16(),
            });
        }
        let body: Envelope<CategoryGroupsData> = response.json().await?;
        Ok(body.data.category_groups)
    }

    pub(crate) async fn transactions(
        &self,
        token: &str,
        budget_id: &str,
        account_id: &str,
    ) -> Result<Vec<TransactionDto>, SyncError> {
        let url = format!(
            "{}/budgets/{budget_id}/accounts/{account_id}/transactions",
            self.base_url
        );
        tracing::debug!(url = %url, "fetching account transactions");
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Upstream {
                status: response.status().as_u16(),
            });
        }
        let body: Envelope<TransactionsData> = response.json().await?;
        Ok(body.data.transactions)
    }

    /// Posts one transaction. Only 200 and 201 count as success.
    pub(crate) async fn create_transaction(
        &self,
        token: &str,
        budget_id: &str,
        body: &NewTransactionBody,
    ) -> Result<u16, SyncError> {
        let url = format!("{}/budgets/{budget_id}/transactions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        match response.status() {
            status @ (StatusCode::OK | StatusCode::CREATED) => Ok(status.as_u16()),
            status => Err(SyncError::Upstream {
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = YnabClient::new("http://localhost:9000/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/v1");
    }

    #[test]
    fn category_payload_tolerates_missing_flags() {
        let body: Envelope<CategoryGroupsData> = serde_json::from_str(
            r#"{"data": {"category_groups": [
                {"id": "g1", "name": "Bills", "categories": [{"id": "c1", "name": "Rent"}]},
                {"id": "g2", "name": "Old", "deleted": true}
            ]}}"#,
        )
        .unwrap();
        let groups = body.data.category_groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].categories[0].name, "Rent");
        assert!(!groups[0].deleted);
        assert!(groups[1].deleted);
        assert!(groups[1].categories.is_empty());
    }

    #[test]
    fn new_transaction_omits_absent_text() {
        let body = NewTransactionBody {
            transaction: NewTransactionDto {
                account_id: "a".to_string(),
                date: "2025-04-01".to_string(),
                amount: 42_000,
                payee_name: None,
                memo: None,
                subtransactions: vec![SubTransactionDto {
                    amount: 42_000,
                    category_id: "c".to_string(),
                    memo: None,
                }],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["transaction"].get("memo").is_none());
        assert_eq!(json["transaction"]["subtransactions"][0]["amount"], 42_000);
    }
}
