use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use boardsync_core::remote::{RemoteBoard, RemoteCard, RemoteCredential, RemoteLabel, RemoteList};

use crate::{require_credential, CardFields, ClientError, Operation, RemoteTracker, TrelloConfig};

const BOARD_FIELDS: &str = "id,name,desc,url";
const LIST_FIELDS: &str = "id,name,closed";
const CARD_FIELDS: &str = "id,name,desc,due,closed,labels,shortUrl,idList";
const LABEL_FIELDS: &str = "id,name,color";

/// Reads authenticate through the query string, writes through the body.
pub struct TrelloClient {
    base_url: String,
    client: Client,
}

/// Write body: credential fields next to the payload.
#[derive(Serialize)]
struct Authed<'a, T: Serialize> {
    key: &'a str,
    token: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct NoBody {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewLabel<'a> {
    name: &'a str,
    color: &'a str,
    id_board: &'a str,
}

impl TrelloClient {
    pub fn new(config: &TrelloConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Config("tracker base URL is empty".into()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("boardsync")
            .build()
            .map_err(|e| ClientError::Config(format!("HTTP client init: {e}")))?;
        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        cred: &RemoteCredential,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        require_credential(cred, operation)?;
        debug!(%operation, path, "tracker request");
        let builder = self
            .client
            .get(self.url(path))
            .query(&[("key", cred.key.as_str()), ("token", cred.token.as_str())])
            .query(query);
        let resp = send(operation, builder).await?;
        decode(operation, resp).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: Operation,
        builder: RequestBuilder,
        cred: &RemoteCredential,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.send_authed(operation, builder, cred, body).await?;
        decode(operation, resp).await
    }

    async fn send_authed<B: Serialize>(
        &self,
        operation: Operation,
        builder: RequestBuilder,
        cred: &RemoteCredential,
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        require_credential(cred, operation)?;
        debug!(%operation, "tracker request");
        let builder = builder.json(&Authed {
            key: &cred.key,
            token: &cred.token,
            body,
        });
        send(operation, builder).await
    }
}

async fn send(operation: Operation, builder: RequestBuilder) -> Result<reqwest::Response, ClientError> {
    let resp = builder.send().await.map_err(|e| ClientError::Transport {
        operation,
        message: e.to_string(),
    })?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(operation, status, body))
}

async fn decode<T: DeserializeOwned>(
    operation: Operation,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    resp.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            ClientError::Transport {
                operation,
                message: e.to_string(),
            }
        } else {
            ClientError::Remote {
                operation,
                status: status.as_u16(),
                message: format!("json decode: {e}"),
            }
        }
    })
}

fn classify_status(operation: Operation, status: StatusCode, body: String) -> ClientError {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no body").to_string()
    } else {
        body
    };
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ClientError::Auth { operation, message }
    } else {
        ClientError::Remote {
            operation,
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RemoteTracker for TrelloClient {
    async fn fetch_boards(&self, cred: &RemoteCredential) -> Result<Vec<RemoteBoard>, ClientError> {
        self.get_json(
            Operation::FetchBoards,
            cred,
            "/members/me/boards",
            &[("fields", BOARD_FIELDS), ("filter", "open")],
        )
        .await
    }

    async fn fetch_lists(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteList>, ClientError> {
        // closed lists are returned too; skipping them is the caller's policy
        self.get_json(
            Operation::FetchLists,
            cred,
            &format!("/boards/{board_id}/lists"),
            &[("fields", LIST_FIELDS), ("filter", "all")],
        )
        .await
    }

    async fn fetch_cards(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
    ) -> Result<Vec<RemoteCard>, ClientError> {
        self.get_json(
            Operation::FetchCards,
            cred,
            &format!("/lists/{list_id}/cards"),
            &[("fields", CARD_FIELDS), ("filter", "all")],
        )
        .await
    }

    async fn fetch_labels(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteLabel>, ClientError> {
        self.get_json(
            Operation::FetchLabels,
            cred,
            &format!("/boards/{board_id}/labels"),
            &[("fields", LABEL_FIELDS)],
        )
        .await
    }

    async fn create_card(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError> {
        let body = CardFields {
            id_list: Some(list_id.to_string()),
            ..fields.clone()
        };
        let builder = self.client.post(self.url("/cards"));
        self.send_json(Operation::CreateCard, builder, cred, &body)
            .await
    }

    async fn update_card(
        &self,
        cred: &RemoteCredential,
        card_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError> {
        let builder = self.client.put(self.url(&format!("/cards/{card_id}")));
        self.send_json(Operation::UpdateCard, builder, cred, fields)
            .await
    }

    async fn delete_card(&self, cred: &RemoteCredential, card_id: &str) -> Result<(), ClientError> {
        let builder = self.client.delete(self.url(&format!("/cards/{card_id}")));
        self.send_authed(Operation::DeleteCard, builder, cred, &NoBody {})
            .await?;
        Ok(())
    }

    async fn create_label(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
        name: &str,
        color: &str,
    ) -> Result<RemoteLabel, ClientError> {
        let builder = self.client.post(self.url("/labels"));
        let body = NewLabel {
            name,
            color,
            id_board: board_id,
        };
        self.send_json(Operation::CreateLabel, builder, cred, &body)
            .await
    }
}
