use crate::{
    config::CoreConfig,
    domain::{Board, Card, EntityId, List},
    error::{MartrelloError, Result},
    storage::{
        mapping::{
            board_from_record, boards_from_records, card_from_record, id_to_numeric,
            list_from_record,
        },
        wire::{
            ApiResponse, BoardPatch, BoardRecord, CardPatch, CardRecord, ListPatch, ListRecord,
        },
        BoardUpdate, CardUpdate, ListUpdate, Persistence,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

/// Client for the board REST API
pub struct HttpStorage {
    client: Client,
    base_url: String,
}

impl HttpStorage {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone())
    }

    /// Sends a request and unwraps the `{ success, data, error }` envelope
    ///
    /// Transport errors and undecodable bodies become persistence failures,
    /// the same as an explicit `success:false`.
    async fn request<T, B>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| MartrelloError::persistence(operation, err.to_string()))?;
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|err| MartrelloError::persistence(operation, err.to_string()))?;
        envelope.into_result(operation)
    }

    async fn get<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        self.request::<T, ()>(operation, Method::GET, path, None).await
    }
}

#[async_trait]
impl Persistence for HttpStorage {
    async fn get_all_boards(&self) -> Result<Vec<Board>> {
        let records: Vec<BoardRecord> = self.get("get all boards", "/api/boards").await?;
        Ok(boards_from_records(records))
    }

    async fn create_board(
        &self,
        title: &str,
        description: &str,
        background: &str,
    ) -> Result<Board> {
        let body = json!({
            "title": title,
            "description": description,
            "background": background,
        });
        let record: BoardRecord = self
            .request("create board", Method::POST, "/api/boards", Some(&body))
            .await?;
        Ok(board_from_record(record))
    }

    async fn update_board(&self, id: &EntityId, update: &BoardUpdate) -> Result<Board> {
        let path = format!("/api/boards/{}", id_to_numeric(id)?);
        let patch = BoardPatch {
            title: update.title.clone(),
            description: update.description.clone(),
            background: update.background.clone(),
        };
        let record: BoardRecord = self
            .request("update board", Method::PUT, &path, Some(&patch))
            .await?;
        Ok(board_from_record(record))
    }

    async fn delete_board(&self, id: &EntityId) -> Result<()> {
        let path = format!("/api/boards/{}", id_to_numeric(id)?);
        self.request::<serde_json::Value, ()>("delete board", Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    async fn create_list(
        &self,
        board_id: &EntityId,
        title: &str,
        position: usize,
    ) -> Result<List> {
        let body = json!({
            "board_id": id_to_numeric(board_id)?,
            "title": title,
            "position": position,
        });
        let record: ListRecord = self
            .request("create list", Method::POST, "/api/lists", Some(&body))
            .await?;
        Ok(list_from_record(record))
    }

    async fn update_list(&self, id: &EntityId, update: &ListUpdate) -> Result<List> {
        let path = format!("/api/lists/{}", id_to_numeric(id)?);
        let patch = ListPatch {
            title: update.title.clone(),
            position: update.position,
        };
        let record: ListRecord = self
            .request("update list", Method::PUT, &path, Some(&patch))
            .await?;
        Ok(list_from_record(record))
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        let path = format!("/api/lists/{}", id_to_numeric(id)?);
        self.request::<serde_json::Value, ()>("delete list", Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    async fn create_card(
        &self,
        list_id: &EntityId,
        title: &str,
        description: &str,
        position: usize,
    ) -> Result<Card> {
        let body = json!({
            "list_id": id_to_numeric(list_id)?,
            "title": title,
            "description": description,
            "position": position,
        });
        let record: CardRecord = self
            .request("create card", Method::POST, "/api/cards", Some(&body))
            .await?;
        Ok(card_from_record(record))
    }

    async fn update_card(&self, id: &EntityId, update: &CardUpdate) -> Result<Card> {
        let path = format!("/api/cards/{}", id_to_numeric(id)?);
        let patch = CardPatch {
            title: update.title.clone(),
            description: update.description.clone(),
            position: update.position,
            list_id: update.list_id.as_ref().map(id_to_numeric).transpose()?,
        };
        let record: CardRecord = self
            .request("update card", Method::PUT, &path, Some(&patch))
            .await?;
        Ok(card_from_record(record))
    }

    async fn move_card(&self, id: &EntityId, list_id: &EntityId, position: usize) -> Result<Card> {
        let path = format!("/api/cards/{}/move", id_to_numeric(id)?);
        let body = json!({ "list_id": id_to_numeric(list_id)?, "position": position });
        let record: CardRecord = self
            .request("move card", Method::PUT, &path, Some(&body))
            .await?;
        Ok(card_from_record(record))
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        let path = format!("/api/cards/{}", id_to_numeric(id)?);
        self.request::<serde_json::Value, ()>("delete card", Method::DELETE, &path, None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_get_all_boards_maps_numeric_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/boards");
                then.status(200).json_body(json!({
                    "success": true,
                    "data": [{
                        "id": 1,
                        "title": "Sprint",
                        "description": "",
                        "background": "#0079bf",
                        "created_at": "2024-03-01 09:30:00",
                        "lists": [{
                            "id": 2,
                            "board_id": 1,
                            "title": "To Do",
                            "position": 0,
                            "cards": [
                                { "id": 4, "list_id": 2, "title": "B", "description": "", "position": 1 },
                                { "id": 3, "list_id": 2, "title": "A", "description": "", "position": 0 }
                            ]
                        }]
                    }]
                }));
            })
            .await;

        let storage = HttpStorage::new(server.base_url()).unwrap();
        let boards = storage.get_all_boards().await.unwrap();

        mock.assert_async().await;
        assert_eq!(boards[0].id.as_str(), "1");
        let titles: Vec<&str> = boards[0].lists[0]
            .cards
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_move_card_sends_numeric_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/api/cards/3/move")
                    .json_body(json!({ "list_id": 5, "position": 0 }));
                then.status(200).json_body(json!({
                    "success": true,
                    "data": { "id": 3, "list_id": 5, "title": "A", "description": "", "position": 0 }
                }));
            })
            .await;

        let storage = HttpStorage::new(server.base_url()).unwrap();
        let card = storage
            .move_card(&EntityId::new("3"), &EntityId::new("5"), 0)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(card.list_id.as_str(), "5");
    }

    #[tokio::test]
    async fn test_not_found_response_is_persistence_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/lists/9");
                then.status(404)
                    .json_body(json!({ "success": false, "error": "List not found" }));
            })
            .await;

        let storage = HttpStorage::new(server.base_url()).unwrap();
        let err = storage
            .update_list(&EntityId::new("9"), &ListUpdate::position(1))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("List not found"));
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_rejected_before_sending() {
        let storage = HttpStorage::new("http://127.0.0.1:9").unwrap();
        let err = storage.delete_card(&EntityId::new("local-1")).await.unwrap_err();
        assert!(matches!(err, MartrelloError::InvalidEntityId(_)));
    }
}
