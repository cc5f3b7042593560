// Contract tests run against both store backends: duplicate registration,
// session slot replay and ordering, and creature persistence.

use std::sync::Arc;

use bug_arena_backend::auth::hash_password;
use bug_arena_backend::creature::{Creature, CreatureProfile, StatBlock};
use bug_arena_backend::store::memory::MemoryStore;
use bug_arena_backend::store::sqlite::SqliteStore;
use bug_arena_backend::store::{Account, Store, StoreError};

fn account(id: &str, email: &str, password: &str) -> Account {
    Account {
        id: id.to_string(),
        email: email.to_string(),
        username: format!("user-{id}"),
        is_verified: false,
        password_hash: hash_password(password).unwrap(),
    }
}

fn creature(id: &str, owner: &str) -> Creature {
    Creature::recruit(
        id.to_string(),
        owner,
        owner,
        CreatureProfile {
            species: "Ladybird".into(),
            description: "Round and red".into(),
            stats: StatBlock {
                strength: 30,
                attack: 20,
                size: 10,
                willingness_to_live: 90,
                stamina: 50,
                agility: 70,
                quantity: 4,
            },
        },
        "img".into(),
        Some("Dot".into()),
    )
}

async fn backends() -> Vec<(&'static str, Arc<dyn Store>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new()) as Arc<dyn Store>),
        (
            "sqlite",
            Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap()) as Arc<dyn Store>,
        ),
    ]
}

#[tokio::test]
async fn test_duplicate_email_leaves_one_record() {
    for (name, store) in backends().await {
        store
            .register(account("u1", "bug@arena.io", "password1"))
            .await
            .unwrap();

        // Same email, different case: rejected, nothing written.
        let err = store
            .register(account("u2", "BUG@ARENA.IO", "password2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail), "backend {name}");

        assert!(store.get_account("u1").await.unwrap().is_some());
        assert!(store.get_account("u2").await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_session_replays_on_subscribe() {
    for (name, store) in backends().await {
        store
            .register(account("u1", "bug@arena.io", "password1"))
            .await
            .unwrap();

        // A receiver taken after the transition still sees the current value.
        let rx = store.observe_session();
        let current = rx.borrow().clone();
        assert_eq!(current.unwrap().id, "u1", "backend {name}");
    }
}

#[tokio::test]
async fn test_session_transitions_in_order() {
    for (name, store) in backends().await {
        let mut rx = store.observe_session();
        assert!(rx.borrow().is_none(), "backend {name}");

        store
            .register(account("u1", "bug@arena.io", "password1"))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().id, "u1");

        store.logout().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert!(store.current_session().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_authenticate_checks_password() {
    for (name, store) in backends().await {
        store
            .register(account("u1", "bug@arena.io", "password1"))
            .await
            .unwrap();
        store.logout().await.unwrap();

        let err = store
            .authenticate("bug@arena.io", "wrong-password")
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidCredentials),
            "backend {name}"
        );
        assert!(store.current_session().await.unwrap().is_none());

        let logged_in = store
            .authenticate("bug@arena.io", "password1")
            .await
            .unwrap();
        assert_eq!(logged_in.id, "u1");
        assert_eq!(store.current_session().await.unwrap().unwrap().id, "u1");
    }
}

#[tokio::test]
async fn test_creature_round_trip_and_update() {
    for (name, store) in backends().await {
        let c = creature("c1", "u1");
        store.create_creature(&c).await.unwrap();

        let fetched = store.get_creature("c1").await.unwrap().unwrap();
        assert_eq!(fetched.species, "Ladybird", "backend {name}");
        assert_eq!(fetched.nickname.as_deref(), Some("Dot"));
        assert_eq!(fetched.max_hp, fetched.current_hp);

        let mut updated = fetched.clone();
        updated.current_hp = 12.0;
        updated.wins = 3;
        store.update_creature(&updated).await.unwrap();

        let fetched = store.get_creature("c1").await.unwrap().unwrap();
        assert_eq!(fetched.current_hp, 12.0);
        assert_eq!(fetched.wins, 3);
        assert_eq!(fetched.max_hp, updated.max_hp);

        let all = store.list_creatures().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}

#[tokio::test]
async fn test_update_missing_creature_is_a_no_op() {
    for (name, store) in backends().await {
        let ghost = creature("nope", "u1");
        store.update_creature(&ghost).await.unwrap();
        assert!(
            store.get_creature("nope").await.unwrap().is_none(),
            "backend {name}"
        );
    }
}
