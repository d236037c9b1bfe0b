//! Behavior shared by every `BookRepository` backend.
//!
//! Each backend instantiates the suite with `generate_repository_tests!`,
//! passing an expression that yields a fresh, empty repository.

use std::collections::HashSet;

use super::{BookFilter, BookRepository};

async fn seed(repo: &impl BookRepository) -> Vec<String> {
    let mut ids = vec![];
    for (title, author) in [
        ("1984", "George Orwell"),
        ("Animal Farm", "George Orwell"),
        ("Brave New World", "Aldous Huxley"),
        ("Dune", "Frank Herbert"),
        ("Emma", "Jane Austen"),
    ] {
        ids.push(repo.create(title, author).await.unwrap().id);
    }
    ids
}

pub(crate) async fn test_create_assigns_distinct_ids(repo: impl BookRepository) {
    let ids = seed(&repo).await;
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(repo.list().await.unwrap().len(), ids.len());
}

pub(crate) async fn test_get_returns_stored_fields(repo: impl BookRepository) {
    let created = repo.create("Dune", "Frank Herbert").await.unwrap();
    let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(created, fetched);
    assert!(repo.get_by_id("missing").await.unwrap().is_none());
}

pub(crate) async fn test_update_replaces_fields(repo: impl BookRepository) {
    let created = repo.create("Dune", "Frank Herbert").await.unwrap();
    assert!(repo
        .update(&created.id, "Dune Messiah", "F. Herbert")
        .await
        .unwrap());
    let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Dune Messiah");
    assert_eq!(fetched.author, "F. Herbert");
}

pub(crate) async fn test_update_missing_creates_nothing(repo: impl BookRepository) {
    assert!(!repo.update("missing", "Dune", "Frank Herbert").await.unwrap());
    assert!(repo.list().await.unwrap().is_empty());
    assert!(repo.get_by_id("missing").await.unwrap().is_none());
}

pub(crate) async fn test_delete_removes_book(repo: impl BookRepository) {
    let created = repo.create("Dune", "Frank Herbert").await.unwrap();
    assert!(repo.delete(&created.id).await.unwrap());
    assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
    assert!(!repo.delete(&created.id).await.unwrap());
}

pub(crate) async fn test_pages_cover_every_book_once(repo: impl BookRepository) {
    let ids: HashSet<_> = seed(&repo).await.into_iter().collect();

    let mut seen = vec![];
    for page in 1..=3 {
        let filter = BookFilter::new(None, Some("title"), Some(page), Some(2));
        let books = repo.query(&filter).await.unwrap();
        assert!(books.len() <= 2);
        seen.extend(books.into_iter().map(|b| b.id));
    }
    assert_eq!(seen.len(), ids.len());
    assert_eq!(seen.iter().cloned().collect::<HashSet<_>>(), ids);

    let again = repo
        .query(&BookFilter::new(None, Some("title"), Some(1), Some(2)))
        .await
        .unwrap();
    let again: Vec<String> = again.into_iter().map(|b| b.id).collect();
    assert_eq!(again, seen[..2]);

    let past_end = BookFilter::new(None, None, Some(4), Some(2));
    assert!(repo.query(&past_end).await.unwrap().is_empty());
}

pub(crate) async fn test_filtered_pages_cover_matches_once(repo: impl BookRepository) {
    seed(&repo).await;

    let everything = repo
        .query(&BookFilter::new(Some("george"), Some("title"), Some(1), Some(100)))
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);

    let mut paged = vec![];
    for page in 1..=3 {
        let filter = BookFilter::new(Some("george"), Some("title"), Some(page), Some(1));
        paged.extend(repo.query(&filter).await.unwrap());
    }
    assert_eq!(paged, everything);
    assert_eq!(paged[0].title, "1984");
    assert_eq!(paged[1].title, "Animal Farm");
}

pub(crate) async fn test_huge_page_is_empty(repo: impl BookRepository) {
    seed(&repo).await;

    let filter = BookFilter::new(None, None, Some(i64::MAX), Some(i64::MAX));
    assert!(repo.query(&filter).await.unwrap().is_empty());

    let filter = BookFilter::new(Some("george"), Some("title"), Some(i64::MAX), Some(1));
    assert!(repo.query(&filter).await.unwrap().is_empty());
}

pub(crate) async fn test_search_matches_title_or_author(repo: impl BookRepository) {
    seed(&repo).await;

    let filter = BookFilter::new(Some("orwell"), None, None, None);
    let books = repo.query(&filter).await.unwrap();
    assert_eq!(books.len(), 2);
    assert!(books.iter().all(|b| b.author == "George Orwell"));

    let filter = BookFilter::new(Some("NEW"), None, None, None);
    let books = repo.query(&filter).await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Brave New World");
}

pub(crate) async fn test_sort_by_title_and_author(repo: impl BookRepository) {
    seed(&repo).await;

    let by_title = repo
        .query(&BookFilter::new(None, Some("title"), None, None))
        .await
        .unwrap();
    assert!(by_title.windows(2).all(|w| w[0].title <= w[1].title));

    let by_author = repo
        .query(&BookFilter::new(None, Some("AUTHOR"), None, None))
        .await
        .unwrap();
    assert!(by_author.windows(2).all(|w| w[0].author <= w[1].author));

    let by_id = repo.query(&BookFilter::default()).await.unwrap();
    assert!(by_id.windows(2).all(|w| w[0].id < w[1].id));
}

pub(crate) async fn test_count_ignores_paging(repo: impl BookRepository) {
    assert_eq!(repo.count(None).await.unwrap(), 0);
    seed(&repo).await;
    assert_eq!(repo.count(None).await.unwrap(), 5);
    assert_eq!(repo.count(Some("george")).await.unwrap(), 2);
    assert_eq!(repo.count(Some("nobody")).await.unwrap(), 0);
}

macro_rules! generate_repository_tests [
    ( @tests $setup:expr, $( $name:ident ),+ ) => {
        $(
            #[tokio::test]
            async fn $name() {
                $crate::modules::books::repository::tests::$name($setup).await;
            }
        )+
    };
    ( $setup:expr ) => {
        $crate::modules::books::repository::tests::generate_repository_tests!(
            @tests $setup,
            test_create_assigns_distinct_ids,
            test_get_returns_stored_fields,
            test_update_replaces_fields,
            test_update_missing_creates_nothing,
            test_delete_removes_book,
            test_pages_cover_every_book_once,
            test_filtered_pages_cover_matches_once,
            test_huge_page_is_empty,
            test_search_matches_title_or_author,
            test_sort_by_title_and_author,
            test_count_ignores_paging
        );
    };
];

pub(crate) use generate_repository_tests;
