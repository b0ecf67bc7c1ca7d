//! HTTP client for a running org-notes server: request/response calls on
//! the notes API plus the realtime note subscription.

mod sse;
pub mod watch;

use std::marker::PhantomData;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::{
    auth::SessionResponse,
    errors::ErrorResponse,
    members::DeletedMember,
    notes::{CreateNote, FindNotesResponse, Note, NoteId, Scope, UpdateNote},
    realtime::ChangeEvent,
    users::{User, UserId},
};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} ({status})")]
    Api { status: u16, message: String },
    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What a subscription delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T = Note> {
    Change(ChangeEvent<T>),
    /// Events were dropped server side; refetch the listing.
    Resync,
}

pub struct NotesClient {
    http: Client,
    base_url: String,
}

impl NotesClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().cookie_store(true).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionResponse> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        parse(response).await
    }

    pub async fn list_notes(&self, scope: Scope) -> Result<Vec<Note>> {
        let request = match scope {
            Scope::Public => self.http.get(self.url("/api/v1/notes/public")),
            scope => self
                .http
                .get(self.url("/api/v1/notes"))
                .query(&[("scope", scope.as_str())]),
        };

        let notes: FindNotesResponse = parse(request.send().await?).await?;
        Ok(notes.results)
    }

    pub async fn create(&self, note: &CreateNote) -> Result<Note> {
        let response = self.http.post(self.url("/api/v1/notes")).json(note).send().await?;
        parse(response).await
    }

    pub async fn update(&self, id: NoteId, changes: &UpdateNote) -> Result<Note> {
        let response = self
            .http
            .patch(self.url(&format!("/api/v1/notes/{id}")))
            .json(changes)
            .send()
            .await?;
        parse(response).await
    }

    pub async fn delete(&self, id: NoteId) -> Result<Note> {
        let response = self
            .http
            .delete(self.url(&format!("/api/v1/notes/{id}")))
            .send()
            .await?;
        parse(response).await
    }

    /// Removes a member of the signed-in admin's organization.
    pub async fn delete_member(&self, user_id: UserId) -> Result<DeletedMember> {
        let response = self
            .http
            .delete(self.url(&format!("/api/v1/members/{user_id}")))
            .send()
            .await?;
        parse(response).await
    }

    /// Opens the note event stream. The server is subscribed once this returns,
    /// so a listing fetched afterwards cannot miss an event.
    pub async fn subscribe(&self, scope: Scope) -> Result<Subscription<Note>> {
        let request = self
            .http
            .get(self.url("/api/v1/realtime/notes"))
            .query(&[("scope", scope.as_str())]);

        open(request).await
    }

    /// Member changes of the signed-in admin's organization.
    pub async fn subscribe_members(&self) -> Result<Subscription<User>> {
        open(self.http.get(self.url("/api/v1/realtime/users"))).await
    }
}

async fn open<T>(request: RequestBuilder) -> Result<Subscription<T>> {
    let response = request.header(header::ACCEPT, "text/event-stream").send().await?;

    Ok(Subscription {
        response: check(response).await?,
        decoder: sse::Decoder::default(),
        events: PhantomData,
    })
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message.unwrap_or(body.error),
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    Ok(check(response).await?.json::<T>().await?)
}

pub struct Subscription<T = Note> {
    response: Response,
    decoder: sse::Decoder,
    events: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    /// `None` once the server closes the stream.
    pub async fn next(&mut self) -> Result<Option<Message<T>>> {
        loop {
            while let Some(frame) = self.decoder.next_frame() {
                match frame.event.as_deref() {
                    Some("resync") => return Ok(Some(Message::Resync)),
                    Some("created" | "modified" | "removed") => {
                        let event = serde_json::from_str::<ChangeEvent<T>>(&frame.data)?;
                        return Ok(Some(Message::Change(event)));
                    }
                    Some("error") => {
                        return Err(ClientError::Api {
                            status: 500,
                            message: frame.data,
                        })
                    }
                    other => tracing::debug!(event = ?other, "ignoring event"),
                }
            }

            match self.response.chunk().await? {
                Some(chunk) => self.decoder.push(&chunk),
                None => return Ok(None),
            }
        }
    }
}
