//! Tests for repository change subscriptions.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::entities::{Formulation, UpdateFormulation};
use crate::repositories::base::{EntityStore, Repository, RepositoryOptions};
use crate::repositories::tests::{generators, setup_test_db};
use crate::storage::changefeed::{ChangeEvent, ChangeKind};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn realtime_options() -> RepositoryOptions {
    RepositoryOptions {
        enable_realtime: true,
        ..Default::default()
    }
}

async fn next_event(
    events: &mut mpsc::UnboundedReceiver<ChangeEvent<Formulation>>,
) -> ChangeEvent<Formulation> {
    timeout(RECV_TIMEOUT, events.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn subscription_receives_crud_events() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, realtime_options());

    let (sender, mut events) = mpsc::unbounded_channel();
    let subscription = repo.subscribe_to_changes(move |event| {
        let _ = sender.send(event);
    });
    assert!(subscription.is_active());

    let created = repo.create(&generators::formulation("Watched")).await?;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.new.expect("insert carries the new row").id, created.id);
    assert!(event.old.is_none());

    repo.update(
        &created.id,
        &UpdateFormulation {
            title: Some("Watched Closely".to_owned()),
            ..Default::default()
        },
    )
    .await?;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(
        event.new.expect("update carries the new row").title,
        "Watched Closely"
    );

    repo.delete(&created.id).await?;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, ChangeKind::Delete);
    assert_eq!(event.old.expect("delete carries the old row").id, created.id);
    assert!(event.new.is_none());

    subscription.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn disabled_realtime_returns_inert_subscription() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let (sender, mut events) = mpsc::unbounded_channel();
    let subscription = repo.subscribe_to_changes(move |event: ChangeEvent<Formulation>| {
        let _ = sender.send(event);
    });
    assert!(!subscription.is_active());

    repo.create(&generators::formulation("Unwatched")).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err(), "no events are delivered");
    Ok(())
}

#[tokio::test]
async fn record_subscription_filters_other_rows() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, realtime_options());

    let watched = repo.create(&generators::formulation("Watched")).await?;
    let other = repo.create(&generators::formulation("Other")).await?;

    let (sender, mut events) = mpsc::unbounded_channel();
    let subscription = repo.subscribe_to_record(&watched.id, move |event| {
        let _ = sender.send(event);
    });

    // The unwatched row's update must not reach this subscription
    repo.update(
        &other.id,
        &UpdateFormulation {
            title: Some("Other Updated".to_owned()),
            ..Default::default()
        },
    )
    .await?;
    repo.update(
        &watched.id,
        &UpdateFormulation {
            title: Some("Watched Updated".to_owned()),
            ..Default::default()
        },
    )
    .await?;

    let event = next_event(&mut events).await;
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(
        event.new.expect("update carries the new row").id,
        watched.id
    );

    subscription.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn overlapping_subscriptions_each_receive_events() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, realtime_options());

    let (first_sender, mut first_events) = mpsc::unbounded_channel();
    let (second_sender, mut second_events) = mpsc::unbounded_channel();
    let first = repo.subscribe_to_changes(move |event| {
        let _ = first_sender.send(event);
    });
    let second = repo.subscribe_to_changes(move |event| {
        let _ = second_sender.send(event);
    });

    repo.create(&generators::formulation("Broadcast")).await?;

    assert_eq!(next_event(&mut first_events).await.kind, ChangeKind::Insert);
    assert_eq!(next_event(&mut second_events).await.kind, ChangeKind::Insert);

    first.unsubscribe();
    second.unsubscribe();
    Ok(())
}
