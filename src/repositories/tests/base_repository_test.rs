//! Tests for the generic base repository.

use chrono::Utc;

use crate::entities::{Formulation, FormulationIngredient, UpdateFormulation};
use crate::error::AppError;
use crate::repositories::base::{EntityStore, Repository, RepositoryOptions};
use crate::repositories::filter::{FilterMap, FilterValue, QueryOptions};
use crate::repositories::tests::{generators, setup_test_db};

#[tokio::test]
async fn create_stamps_timestamps() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let started = Utc::now();
    let created = repo.create(&generators::formulation("Lip Balm")).await?;

    assert_eq!(created.title, "Lip Balm");
    assert_eq!(created.user_id, "system");
    assert!(created.created_at >= started);
    assert!(created.updated_at.expect("updated_at is stamped") >= started);
    Ok(())
}

#[tokio::test]
async fn get_by_id_round_trips() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let created = repo.create(&generators::formulation("Soap Base")).await?;
    let fetched = repo.get_by_id(&created.id).await?.expect("row exists");

    assert_eq!(fetched, created);
    assert!(repo.exists(&created.id).await?);
    Ok(())
}

#[tokio::test]
async fn update_applies_only_set_fields() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let created = repo.create(&generators::formulation("Body Butter")).await?;
    let before_update = Utc::now();

    let patch = UpdateFormulation {
        title: Some("Whipped Body Butter".to_owned()),
        ..Default::default()
    };
    let updated = repo.update(&created.id, &patch).await?;

    assert_eq!(updated.title, "Whipped Body Butter");
    assert_eq!(updated.description, created.description);
    assert!(updated.updated_at.expect("updated_at is stamped") >= before_update);
    Ok(())
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let err = repo
        .update(
            &crate::entities::Id::generate(),
            &UpdateFormulation {
                title: Some("nope".to_owned()),
                ..Default::default()
            },
        )
        .await
        .expect_err("missing row");
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn delete_is_idempotent() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let created = repo.create(&generators::formulation("Toner")).await?;
    assert!(repo.delete(&created.id).await?);
    assert!(!repo.delete(&created.id).await?);
    assert!(repo.get_by_id(&created.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn get_all_orders_and_paginates() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    for title in ["alpha", "bravo", "charlie", "delta", "echo"] {
        repo.create(&generators::formulation(title)).await?;
    }

    let options = QueryOptions {
        order_by: Some("title".to_owned()),
        ascending: true,
        limit: Some(2),
        page: Some(2),
        ..Default::default()
    };
    let page = repo.get_all(&options).await?;

    let titles: Vec<&str> = page.iter().map(|row| row.title.as_str()).collect();
    assert_eq!(titles, ["charlie", "delta"]);
    Ok(())
}

#[tokio::test]
async fn ilike_filter_matches_substring_case_insensitively() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    repo.create(&generators::formulation("Rose Water Toner")).await?;
    repo.create(&generators::formulation("rosehip oil blend")).await?;
    repo.create(&generators::formulation("Aloe Gel")).await?;

    let mut filters = FilterMap::new();
    filters.insert("title:ilike".to_owned(), "ROSE".into());
    let matched = repo
        .get_all(&QueryOptions {
            filters,
            ..Default::default()
        })
        .await?;

    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|row| row.title.to_lowercase().contains("rose")));
    Ok(())
}

#[tokio::test]
async fn comparison_and_in_filters_apply() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<FormulationIngredient>::new(db, RepositoryOptions::default());

    let formulation_id = crate::entities::Id::generate();
    let ingredient_id = crate::entities::Id::generate();
    repo.create(&generators::link_row(&formulation_id, &ingredient_id, 10.0, "g")).await?;
    repo.create(&generators::link_row(&formulation_id, &ingredient_id, 20.0, "ml")).await?;
    repo.create(&generators::link_row(&formulation_id, &ingredient_id, 30.0, "drops")).await?;

    let mut filters = FilterMap::new();
    filters.insert("quantity:gt".to_owned(), 15.0.into());
    let heavier = repo
        .get_all(&QueryOptions {
            filters,
            ..Default::default()
        })
        .await?;
    assert_eq!(heavier.len(), 2);

    let mut filters = FilterMap::new();
    filters.insert(
        "unit:in".to_owned(),
        FilterValue::from(vec!["g", "ml"]),
    );
    let grams_or_ml = repo
        .get_all(&QueryOptions {
            filters,
            ..Default::default()
        })
        .await?;
    assert_eq!(grams_or_ml.len(), 2);

    assert_eq!(repo.count(&FilterMap::new()).await?, 3);
    Ok(())
}

#[tokio::test]
async fn failed_get_all_serves_fallback_data() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    sqlx::query("DROP TABLE recipes").execute(db.pool()).await?;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let offline = vec![
        generators::offline_formulation("Cached Salve"),
        generators::offline_formulation("Cached Balm"),
    ];
    repo.set_fallback_data(offline.clone()).await;

    let served = repo.get_all(&QueryOptions::default()).await?;
    assert_eq!(served, offline);
    Ok(())
}

#[tokio::test]
async fn failed_get_by_id_searches_fallback_data() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    sqlx::query("DROP TABLE recipes").execute(db.pool()).await?;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let offline = generators::offline_formulation("Cached Salve");
    repo.set_fallback_data(vec![offline.clone()]).await;

    let found = repo.get_by_id(&offline.id).await?;
    assert_eq!(found, Some(offline));

    let miss = repo.get_by_id(&crate::entities::Id::generate()).await;
    assert!(miss.is_err(), "unknown id should surface the backend error");
    Ok(())
}

#[tokio::test]
async fn fallback_disabled_surfaces_the_error() {
    let db = setup_test_db().await;
    sqlx::query("DROP TABLE recipes")
        .execute(db.pool())
        .await
        .expect("drop table");
    let repo = Repository::<Formulation>::new(
        db,
        RepositoryOptions {
            use_fallback_data: false,
            ..Default::default()
        },
    );
    repo.set_fallback_data(vec![generators::offline_formulation("Cached")]).await;

    let err = repo.get_all(&QueryOptions::default()).await.expect_err("no table");
    assert!(matches!(err, AppError::Sqlx(_)));
}

#[tokio::test]
async fn empty_fallback_surfaces_the_error() {
    let db = setup_test_db().await;
    sqlx::query("DROP TABLE recipes")
        .execute(db.pool())
        .await
        .expect("drop table");
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    assert!(repo.get_all(&QueryOptions::default()).await.is_err());
}

#[tokio::test]
async fn get_by_ids_fetches_only_requested_rows() -> crate::error::Result<()> {
    let db = setup_test_db().await;
    let repo = Repository::<Formulation>::new(db, RepositoryOptions::default());

    let first = repo.create(&generators::formulation("first")).await?;
    let second = repo.create(&generators::formulation("second")).await?;
    repo.create(&generators::formulation("third")).await?;

    let rows = repo
        .get_by_ids(&[first.id.clone(), second.id.clone()])
        .await?;
    assert_eq!(rows.len(), 2);
    assert!(repo.get_by_ids(&[]).await?.is_empty());
    Ok(())
}
