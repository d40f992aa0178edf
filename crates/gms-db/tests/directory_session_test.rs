//! Integration tests for the SurrealDB directory session and resolver.

use gms_core::config::DirectoryConfig;
use gms_core::directory::{
    Attribute, DirectoryConnector, DirectorySession, Dn, Filter, GROUP_OBJECT_CLASS, LOCKED,
    Modification, PrincipalResolver, attr,
};
use gms_core::error::GmsError;
use gms_core::models::user::{CreateUser, Principal};
use gms_core::repository::UserRepository;
use gms_db::SurrealDirectory;
use gms_db::repository::SurrealUserRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Helper: migrated in-memory directory with the users alice and bob.
async fn setup() -> SurrealDirectory<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    let directory = SurrealDirectory::migrated(db.clone(), DirectoryConfig::default())
        .await
        .unwrap();

    let users = SurrealUserRepository::new(db, DirectoryConfig::default());
    for username in ["alice", "bob"] {
        users
            .create(CreateUser {
                username: username.into(),
                display_name: Some(format!("{username} example")),
            })
            .await
            .unwrap();
    }

    directory
}

fn active_group() -> Filter {
    Filter::eq(attr::OBJECT_CLASS, GROUP_OBJECT_CLASS).active()
}

fn group_dn(id: &str) -> Dn {
    DirectoryConfig::default().group_dn(id).unwrap()
}

fn user_dn(username: &str) -> Dn {
    DirectoryConfig::default().user_dn(username).unwrap()
}

fn group_attributes(id: &str, owner: &Dn, members: &[&Dn]) -> Vec<Attribute> {
    vec![
        Attribute::single(attr::OBJECT_CLASS, GROUP_OBJECT_CLASS),
        Attribute::single(attr::CN, id),
        Attribute::single(attr::OWNER, owner.as_str()),
        Attribute::new(
            attr::UNIQUE_MEMBER,
            members.iter().map(|dn| dn.to_string()).collect(),
        ),
    ]
}

#[tokio::test]
async fn add_and_fetch_entry() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let dn = group_dn("data-team");

    session
        .add(
            &dn,
            group_attributes("data-team", &alice, &[&user_dn("bob")]),
            Some(&alice),
        )
        .await
        .unwrap();

    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert_eq!(entry.first(attr::CN), Some("data-team"));
    assert_eq!(entry.first(attr::OWNER), Some(alice.as_str()));
    assert_eq!(entry.values(attr::UNIQUE_MEMBER), ["uid=bob,ou=people,dc=gms"]);
    assert_eq!(entry.first(attr::CREATORS_NAME), Some(alice.as_str()));
    assert!(entry.first_datetime(attr::MODIFY_TIMESTAMP).is_some());
    assert!(entry.first(attr::ACCOUNT_LOCK).is_none());

    let projected = session
        .fetch_by_key(&dn, &[attr::CN])
        .await
        .unwrap()
        .unwrap();
    assert!(projected.first(attr::OWNER).is_none());

    assert!(
        session
            .fetch_by_key(&group_dn("missing"), &[])
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_add_is_rejected() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let dn = group_dn("dup");

    session
        .add(&dn, group_attributes("dup", &alice, &[]), Some(&alice))
        .await
        .unwrap();
    let result = session
        .add(&dn, group_attributes("dup", &alice, &[]), Some(&alice))
        .await;
    assert!(matches!(result, Err(GmsError::AlreadyExists { .. })));
}

#[tokio::test]
async fn add_outside_group_subtree_is_rejected() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");

    let result = session
        .add(
            &Dn::new("cn=x,ou=other,dc=gms"),
            group_attributes("x", &alice, &[]),
            Some(&alice),
        )
        .await;
    assert!(matches!(result, Err(GmsError::InvalidArgument { .. })));

    let result = session
        .add(
            &group_dn("y"),
            group_attributes("not-y", &alice, &[]),
            Some(&alice),
        )
        .await;
    assert!(matches!(result, Err(GmsError::InvalidArgument { .. })));
}

#[tokio::test]
async fn search_skips_locked_entries() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let bob = user_dn("bob");

    for (id, owner) in [("a", &alice), ("b", &bob), ("c", &alice)] {
        session
            .add(&group_dn(id), group_attributes(id, owner, &[]), Some(owner))
            .await
            .unwrap();
    }
    session
        .modify(
            &group_dn("c"),
            vec![Modification::add(attr::ACCOUNT_LOCK, vec![LOCKED.into()])],
            &active_group(),
            Some(&alice),
        )
        .await
        .unwrap();

    let base = DirectoryConfig::default().groups_base();
    let owned = session
        .search(
            &base,
            &Filter::eq(attr::OWNER, alice.as_str()).active(),
            &[attr::CN],
            Some(&alice),
        )
        .await
        .unwrap();
    let ids: Vec<_> = owned.iter().filter_map(|e| e.first(attr::CN)).collect();
    assert_eq!(ids, vec!["a"]);

    let locked = session
        .search(
            &base,
            &Filter::eq(attr::CN, "c").inactive(),
            &[],
            Some(&alice),
        )
        .await
        .unwrap();
    assert_eq!(locked.len(), 1);

    let elsewhere = session
        .search(
            &DirectoryConfig::default().users_base(),
            &Filter::present(attr::CN),
            &[],
            None,
        )
        .await
        .unwrap();
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn modify_applies_member_delta_and_acl_replace() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let bob = user_dn("bob");
    let dn = group_dn("team");

    session
        .add(&dn, group_attributes("team", &alice, &[&bob]), Some(&alice))
        .await
        .unwrap();

    session
        .modify(
            &dn,
            vec![
                Modification::delete(attr::UNIQUE_MEMBER, vec![bob.to_string()]),
                Modification::add(attr::UNIQUE_MEMBER, vec![alice.to_string()]),
                Modification::replace(attr::ACI, vec!["acl-1".into(), "acl-2".into()]),
                Modification::add(attr::DESCRIPTION, vec!["the team".into()]),
            ],
            &active_group(),
            Some(&bob),
        )
        .await
        .unwrap();

    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert_eq!(entry.values(attr::UNIQUE_MEMBER), [alice.to_string()]);
    assert_eq!(entry.values(attr::ACI).len(), 2);
    assert_eq!(entry.first(attr::DESCRIPTION), Some("the team"));
    assert_eq!(entry.first(attr::MODIFIERS_NAME), Some(bob.as_str()));

    session
        .modify(
            &dn,
            vec![
                Modification::delete_all(attr::ACI),
                Modification::delete_all(attr::DESCRIPTION),
            ],
            &active_group(),
            Some(&alice),
        )
        .await
        .unwrap();
    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert!(entry.values(attr::ACI).is_empty());
    assert!(entry.first(attr::DESCRIPTION).is_none());
}

#[tokio::test]
async fn modify_missing_entry_is_not_found() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();

    let result = session
        .modify(
            &group_dn("ghost"),
            vec![Modification::add(attr::DESCRIPTION, vec!["x".into()])],
            &active_group(),
            None,
        )
        .await;
    assert!(matches!(result, Err(ref e) if e.is_group_not_found()));
}

#[tokio::test]
async fn resolver_maps_principals_and_members() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let bob = user_dn("bob");

    assert_eq!(
        session
            .resolve_directory_key(&Principal::new("alice"))
            .await
            .unwrap(),
        alice
    );
    let err = session
        .resolve_directory_key(&Principal::new("nobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, GmsError::NotFound { ref entity, .. } if entity == "user"));

    let detailed = session.resolve_member(&bob, true).await.unwrap();
    assert_eq!(detailed.principal, Principal::new("bob"));
    assert!(detailed.display_name.is_some());
    let bare = session.resolve_member(&bob, false).await.unwrap();
    assert!(bare.display_name.is_none());

    for id in ["alpha", "beta"] {
        session
            .add(&group_dn(id), group_attributes(id, &alice, &[&bob]), Some(&alice))
            .await
            .unwrap();
    }
    session
        .modify(
            &group_dn("beta"),
            vec![Modification::add(attr::ACCOUNT_LOCK, vec![LOCKED.into()])],
            &active_group(),
            Some(&alice),
        )
        .await
        .unwrap();

    let bob_principal = Principal::new("bob");
    assert!(session.is_member(&bob_principal, "alpha").await.unwrap());
    assert!(!session.is_member(&bob_principal, "beta").await.unwrap());
    assert!(
        !session
            .is_member(&Principal::new("alice"), "alpha")
            .await
            .unwrap()
    );

    let groups = session.groups_containing(&bob_principal).await.unwrap();
    let ids: Vec<_> = groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha"]);
}

#[tokio::test]
async fn modify_leaves_entry_untouched_when_precondition_fails() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let bob = user_dn("bob");
    let dn = group_dn("locked");

    session
        .add(&dn, group_attributes("locked", &alice, &[]), Some(&alice))
        .await
        .unwrap();
    session
        .modify(
            &dn,
            vec![Modification::add(attr::ACCOUNT_LOCK, vec![LOCKED.into()])],
            &active_group(),
            Some(&alice),
        )
        .await
        .unwrap();

    let result = session
        .modify(
            &dn,
            vec![
                Modification::add(attr::DESCRIPTION, vec!["late write".into()]),
                Modification::add(attr::UNIQUE_MEMBER, vec![bob.to_string()]),
            ],
            &active_group(),
            Some(&bob),
        )
        .await;
    assert!(matches!(result, Err(ref e) if e.is_group_not_found()));

    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert_eq!(entry.first(attr::ACCOUNT_LOCK), Some(LOCKED));
    assert!(entry.first(attr::DESCRIPTION).is_none());
    assert!(entry.values(attr::UNIQUE_MEMBER).is_empty());
    assert_eq!(entry.first(attr::MODIFIERS_NAME), Some(alice.as_str()));

    let inactive = Filter::eq(attr::OBJECT_CLASS, GROUP_OBJECT_CLASS).inactive();
    session
        .modify(
            &dn,
            vec![Modification::delete_all(attr::ACCOUNT_LOCK)],
            &inactive,
            Some(&alice),
        )
        .await
        .unwrap();
    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert!(entry.first(attr::ACCOUNT_LOCK).is_none());
}

#[tokio::test]
async fn changes_to_one_attribute_apply_in_order() {
    let directory = setup().await;
    let session = directory.open().await.unwrap();
    let alice = user_dn("alice");
    let bob = user_dn("bob");
    let dn = group_dn("ordered");

    session
        .add(&dn, group_attributes("ordered", &alice, &[&bob]), Some(&alice))
        .await
        .unwrap();
    session
        .modify(
            &dn,
            vec![
                Modification::delete_all(attr::UNIQUE_MEMBER),
                Modification::add(attr::UNIQUE_MEMBER, vec![alice.to_string()]),
                Modification::add(attr::UNIQUE_MEMBER, vec![bob.to_string()]),
                Modification::delete(attr::UNIQUE_MEMBER, vec![alice.to_string()]),
            ],
            &active_group(),
            Some(&alice),
        )
        .await
        .unwrap();

    let entry = session.fetch_by_key(&dn, &[]).await.unwrap().unwrap();
    assert_eq!(entry.values(attr::UNIQUE_MEMBER), [bob.to_string()]);
}
