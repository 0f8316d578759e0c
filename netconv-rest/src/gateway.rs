//! Gateway over the manager's JSON API, one instance per object kind.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use netconv_core::{ApiFlavor, Gateway, ObjectKind, RemoteObject, Reply, Status, TransportError};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{ManagerClient, api_error, read_empty, read_reply, transport_error};

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    cursor: Option<String>,
}

pub struct RestGateway<K: ObjectKind> {
    client: Arc<ManagerClient>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ObjectKind> RestGateway<K> {
    pub fn new(client: Arc<ManagerClient>) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn collection_url(&self) -> String {
        self.client.collection_url(K::API, K::COLLECTION)
    }

    fn object_url(&self, id: &str) -> String {
        self.client.object_url(K::API, K::COLLECTION, id)
    }

    fn encode(payload: &RemoteObject<K::Attributes>) -> Result<Value, TransportError> {
        serde_json::to_value(payload).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn put(
        &self,
        id: &str,
        payload: &RemoteObject<K::Attributes>,
    ) -> Reply<RemoteObject<K::Attributes>> {
        let body = match Self::encode(payload) {
            Ok(body) => body,
            Err(e) => return Reply::failed(None, e),
        };
        let result = self
            .client
            .send(Method::PUT, &self.object_url(id), &[], Some(&body))
            .await;
        read_reply(result).await
    }

    async fn fetch_page(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ListPage<RemoteObject<K::Attributes>>, TransportError> {
        let response = self.client.send(Method::GET, url, query, None).await?;
        let status = Status(response.status().as_u16());
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl<K: ObjectKind> Gateway for RestGateway<K> {
    type Kind = K;

    async fn create(
        &self,
        payload: &RemoteObject<K::Attributes>,
    ) -> Reply<RemoteObject<K::Attributes>> {
        match K::API {
            ApiFlavor::Manager => {
                let body = match Self::encode(payload) {
                    Ok(body) => body,
                    Err(e) => return Reply::failed(None, e),
                };
                let result = self
                    .client
                    .send(Method::POST, &self.collection_url(), &[], Some(&body))
                    .await;
                read_reply(result).await
            }
            ApiFlavor::Policy => {
                // Policy objects are created under an id the client picks.
                let mut payload = payload.clone();
                if payload.id.is_empty() {
                    payload.id = uuid::Uuid::new_v4().to_string();
                }
                let id = payload.id.clone();
                self.put(&id, &payload).await
            }
        }
    }

    async fn get(&self, id: &str) -> Reply<RemoteObject<K::Attributes>> {
        let result = self
            .client
            .send(Method::GET, &self.object_url(id), &[], None)
            .await;
        read_reply(result).await
    }

    async fn list(
        &self,
        kind_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject<K::Attributes>>, TransportError> {
        let url = self.collection_url();
        let mut base_query = vec![("page_size", self.client.page_size().to_string())];
        if let (Some(param), Some(value)) = (K::FILTER_PARAM, kind_filter) {
            base_query.push((param, value.to_string()));
        }
        if K::API == ApiFlavor::Policy {
            base_query.push(("include_mark_for_delete_objects", "false".to_string()));
        }

        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = base_query.clone();
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let page = self.fetch_page(&url, &query).await?;
            objects.extend(page.results);
            match page.cursor {
                // A repeated cursor would page forever.
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }

        debug!("Listed {} {} objects", objects.len(), K::NAME);
        Ok(objects)
    }

    async fn update(
        &self,
        id: &str,
        payload: &RemoteObject<K::Attributes>,
    ) -> Reply<RemoteObject<K::Attributes>> {
        self.put(id, payload).await
    }

    async fn delete(&self, id: &str) -> Reply<()> {
        let result = self
            .client
            .send(Method::DELETE, &self.object_url(id), &[], None)
            .await;
        read_empty(result).await
    }
}
