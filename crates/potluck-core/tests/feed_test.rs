//! Feed assembly over published meals, dishes, and relationship edges.

mod common;

use uuid::Uuid;

use potluck_core::feed;
use potluck_core::grouping::FeedUnit;
use potluck_core::{ErrorKind, MealStore};
use potluck_db::models::{Course, PostKind, RelationshipKind};

use common::{Table, kind};

#[tokio::test]
async fn meal_and_its_dish_form_one_unit() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let (_, dish) = table.cooked(guest, Course::Main).await;
    let completion = table
        .engine
        .meals
        .complete(table.meal.id, table.host)
        .await
        .unwrap();
    let unrelated = table.dish(Uuid::new_v4()).await;

    let units = feed::assemble(table.engine.store(), 50).await.unwrap();
    assert_eq!(units.len(), 2);

    let grouped = units
        .iter()
        .find(|u| matches!(u, FeedUnit::Grouped { .. }))
        .expect("one grouped unit");
    let mut members: Vec<Uuid> = grouped.members().iter().map(|p| p.id).collect();
    members.sort();
    let mut expected = vec![completion.post.id, dish];
    expected.sort();
    assert_eq!(members, expected);
    // The dish was posted before the meal was completed.
    assert_eq!(grouped.anchor().id, dish);

    let single = units
        .iter()
        .find(|u| matches!(u, FeedUnit::Single { .. }))
        .expect("one single unit");
    assert_eq!(single.anchor().id, unrelated);
    // The unrelated post is the newest, so it leads the feed.
    assert_eq!(units[0].anchor().id, unrelated);
}

#[tokio::test]
async fn linked_post_outside_window_still_joins_its_group() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let (_, dish) = table.cooked(guest, Course::Main).await;
    let completion = table
        .engine
        .meals
        .complete(table.meal.id, table.host)
        .await
        .unwrap();
    let unrelated = table.dish(Uuid::new_v4()).await;

    // The window holds only the unrelated dish and the meal post.
    let units = feed::assemble(table.engine.store(), 2).await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].anchor().id, unrelated);

    let grouped = &units[1];
    assert!(matches!(grouped, FeedUnit::Grouped { .. }));
    let members: Vec<Uuid> = grouped.members().iter().map(|p| p.id).collect();
    assert_eq!(members, vec![dish, completion.post.id]);
}

#[tokio::test]
async fn slot_completed_after_meal_joins_its_group() {
    let table = Table::new().await;
    let guest = table.guest().await;
    let slot = table.slot(Course::Dessert).await;
    table.engine.items.claim(slot.id, guest).await.unwrap();
    let completion = table
        .engine
        .meals
        .complete(table.meal.id, table.host)
        .await
        .unwrap();

    let dish = table.dish(guest).await;
    table
        .engine
        .items
        .complete(slot.id, guest, dish)
        .await
        .unwrap();

    let units = feed::assemble(table.engine.store(), 10).await.unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].anchor().id, completion.post.id);
    assert_eq!(units[0].anchor().kind, PostKind::Meal);
    assert_eq!(units[0].members().len(), 2);
}

#[tokio::test]
async fn relate_and_unrelate_dishes() {
    let table = Table::new().await;
    let author = Uuid::new_v4();
    let wine = table.dish(author).await;
    let cheese = table.dish(Uuid::new_v4()).await;
    let store = table.engine.store();

    let edge = feed::relate(store, author, cheese, wine, RelationshipKind::PairedDish)
        .await
        .unwrap();
    assert!(edge.post_a < edge.post_b);
    let again = feed::relate(store, author, wine, cheese, RelationshipKind::PairedDish)
        .await
        .unwrap();
    assert_eq!(again.id, edge.id, "relating twice returns the same edge");

    let units = feed::assemble(store, 10).await.unwrap();
    assert_eq!(units.len(), 1);

    assert!(
        feed::unrelate(store, author, wine, cheese, RelationshipKind::PairedDish)
            .await
            .unwrap()
    );
    assert!(
        !feed::unrelate(store, author, wine, cheese, RelationshipKind::PairedDish)
            .await
            .unwrap()
    );
    assert_eq!(feed::assemble(store, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn relate_checks_posts_and_authorship() {
    let table = Table::new().await;
    let author = Uuid::new_v4();
    let mine = table.dish(author).await;
    let theirs = table.dish(Uuid::new_v4()).await;
    let other = table.dish(Uuid::new_v4()).await;
    let store = table.engine.store();

    assert_eq!(
        kind(feed::relate(store, author, mine, mine, RelationshipKind::PairedDish).await),
        ErrorKind::Validation
    );
    assert_eq!(
        kind(feed::relate(store, author, mine, Uuid::new_v4(), RelationshipKind::PairedDish).await),
        ErrorKind::NotFound
    );
    assert_eq!(
        kind(feed::relate(store, author, theirs, other, RelationshipKind::PairedDish).await),
        ErrorKind::PermissionDenied
    );
}

#[tokio::test]
async fn assemble_validates_limit() {
    let table = Table::new().await;
    let store = table.engine.store();
    assert_eq!(kind(feed::assemble(store, 0).await), ErrorKind::Validation);
    assert_eq!(
        kind(feed::assemble(store, feed::MAX_FEED_LIMIT + 1).await),
        ErrorKind::Validation
    );
}

#[tokio::test]
async fn assemble_honours_limit() {
    let table = Table::new().await;
    for _ in 0..5 {
        table.dish(Uuid::new_v4()).await;
    }
    let units = feed::assemble(table.engine.store(), 3).await.unwrap();
    assert_eq!(units.len(), 3);
    let recent = table.store.list_recent_posts(3).await.unwrap();
    let ids: Vec<Uuid> = units.iter().map(|u| u.anchor().id).collect();
    assert_eq!(ids, recent.iter().map(|p| p.id).collect::<Vec<_>>());
}
