use std::io::Write;

use clap::Args;

use crate::{
    notes::{Note, Scope},
    reconcile::NoteList,
};

use super::{Message, NotesClient, Result, Subscription};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Server base URL
    #[arg(long, env = "ORG_NOTES_URL", default_value = "http://127.0.0.1:4000")]
    pub url: String,
    /// Sign in as this user. Only the public board is readable without it.
    #[arg(long, env = "ORG_NOTES_EMAIL")]
    pub email: Option<String>,
    #[arg(long, env = "ORG_NOTES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// mine, organization or public
    #[arg(long, default_value = "organization")]
    pub scope: Scope,
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let client = NotesClient::new(&args.url)?;

    let scope = match (&args.email, &args.password) {
        (Some(email), Some(password)) => {
            let session = client.login(email, password).await?;
            tracing::info!(user_id = %session.user.id, "signed in");
            args.scope
        }
        _ => Scope::Public,
    };

    let mut subscription = client.subscribe(scope).await?;
    let mut list = NoteList::default();
    if !sync(&client, scope, &mut list, &mut subscription).await? {
        tracing::info!("server closed the subscription");
        return Ok(());
    }
    render(&list);

    loop {
        tokio::select! {
            message = subscription.next() => match message? {
                Some(message) => {
                    if !handle(&client, scope, &mut list, &mut subscription, message).await? {
                        tracing::info!("server closed the subscription");
                        break;
                    }
                    render(&list);
                }
                None => {
                    tracing::info!("server closed the subscription");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// `false` once the subscription has ended.
async fn handle(
    client: &NotesClient,
    scope: Scope,
    list: &mut NoteList,
    subscription: &mut Subscription,
    message: Message,
) -> Result<bool> {
    match message {
        Message::Change(event) => {
            list.apply(event);
            Ok(true)
        }
        Message::Resync => {
            tracing::warn!("fell behind the event stream, refetching");
            sync(client, scope, list, subscription).await
        }
    }
}

/// Refetches the listing while still reading `subscription`, so events that
/// race the fetch are buffered and replayed on the snapshot. The subscription
/// must already be open, otherwise events between the fetch and the
/// subscribe are lost. Falling behind during the fetch fetches again.
/// `false` once the subscription has ended.
async fn sync(client: &NotesClient, scope: Scope, list: &mut NoteList, subscription: &mut Subscription) -> Result<bool> {
    let mut open = true;

    loop {
        list.begin_sync();
        let mut lagged = false;

        let fetch = client.list_notes(scope);
        tokio::pin!(fetch);
        let snapshot = loop {
            tokio::select! {
                snapshot = &mut fetch => break snapshot?,
                message = subscription.next(), if open => match message? {
                    Some(Message::Change(event)) => list.apply(event),
                    Some(Message::Resync) => lagged = true,
                    None => open = false,
                },
            }
        };

        list.finish_sync(snapshot);
        if !lagged || !open {
            return Ok(open);
        }
        tracing::warn!("fell behind the event stream while refetching, refetching again");
    }
}

fn line(note: &Note) -> String {
    let visibility = if note.is_public { "public " } else { "private" };
    let edited = note
        .updated_at
        .map(|at| format!(" (edited {})", at.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    format!(
        "{}  {visibility}  {}{edited}",
        note.created_at.format("%Y-%m-%d %H:%M"),
        note.title
    )
}

fn render(list: &NoteList) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "\n{} note(s)", list.len());
    for note in list.notes() {
        let _ = writeln!(out, "  {}", line(note));
    }
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::{
        db::init_test_db,
        notes::CreateNote,
        tests::{create_member, spawn_server, PASSWORD},
        users::Role,
    };

    #[tokio::test]
    async fn notes_created_during_a_refetch_appear_once() {
        let db = init_test_db().await.unwrap();
        create_member(&db, "owner@acme.com", "acme", Role::Editor).await;
        let url = spawn_server(db).await;

        let client = NotesClient::new(url.as_str()).unwrap();
        client.login("owner@acme.com", PASSWORD).await.unwrap();
        let mut subscription = client.subscribe(Scope::Mine).await.unwrap();

        let writer = NotesClient::new(url.as_str()).unwrap();
        writer.login("owner@acme.com", PASSWORD).await.unwrap();
        let writes = tokio::spawn(async move {
            for n in 0..5 {
                let draft = CreateNote {
                    title: format!("note {n}"),
                    description: None,
                    content: None,
                    is_public: false,
                };
                writer.create(&draft).await.unwrap();
            }
        });

        let mut list = NoteList::default();
        assert!(sync(&client, Scope::Mine, &mut list, &mut subscription).await.unwrap());
        writes.await.unwrap();
        while let Ok(message) = tokio::time::timeout(Duration::from_millis(200), subscription.next()).await {
            match message.unwrap() {
                Some(Message::Change(event)) => list.apply(event),
                _ => break,
            }
        }

        assert!(!list.is_syncing());
        assert_eq!(list.notes(), client.list_notes(Scope::Mine).await.unwrap().as_slice());
    }

    #[test]
    fn lines_show_visibility_and_edits() {
        let mut note = Note {
            id: Uuid::now_v7(),
            user_id: None,
            organization_slug: "public-notes".into(),
            title: "Groceries".into(),
            description: None,
            content: None,
            is_public: true,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            updated_at: None,
        };
        assert_eq!(line(&note), "2024-03-01 09:30  public   Groceries");

        note.is_public = false;
        note.updated_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());
        assert_eq!(line(&note), "2024-03-01 09:30  private  Groceries (edited 2024-03-02 10:00)");
    }
}
