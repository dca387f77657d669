use courier_core::db::open_db_in_memory;
use courier_core::model::authorizable::AuthorizableKind;
use courier_core::model::content::Properties;
use courier_core::repo::directory_repo::{Directory, DirectoryError, SqliteDirectory};
use serde_json::json;

#[test]
fn resolves_users_and_groups_with_ordered_members() {
    let conn = open_db_in_memory().unwrap();
    let directory = SqliteDirectory::try_new(&conn).unwrap();

    let mut props = Properties::new();
    props.insert("firstName".to_string(), json!("Alice"));
    directory.create_user("alice", &props).unwrap();
    directory.create_group("team", &Properties::new()).unwrap();
    directory.add_member("team", "carol").unwrap();
    directory.add_member("team", "alice").unwrap();
    directory.add_member("team", "carol").unwrap();

    let alice = directory.find_authorizable("alice").unwrap().unwrap();
    assert_eq!(alice.kind, AuthorizableKind::User);
    assert_eq!(alice.string_property("firstName"), Some("Alice"));
    assert!(alice.members.is_empty());

    let team = directory.find_authorizable("team").unwrap().unwrap();
    assert!(team.is_group());
    assert_eq!(team.members, vec!["carol".to_string(), "alice".to_string()]);

    assert!(directory.find_authorizable("nobody").unwrap().is_none());
}

#[test]
fn add_member_requires_existing_group() {
    let conn = open_db_in_memory().unwrap();
    let directory = SqliteDirectory::try_new(&conn).unwrap();
    directory.create_user("alice", &Properties::new()).unwrap();

    assert!(matches!(
        directory.add_member("alice", "bob"),
        Err(DirectoryError::NotAGroup(_))
    ));
    assert!(matches!(
        directory.add_member("ghost", "bob"),
        Err(DirectoryError::NotFound(_))
    ));
}
