use std::sync::Arc;

use serde_json::{json, Value};

use devnote_moderation::{
    core::{ReactionKind, StorePath, SubjectType, UserId},
    infrastructure::{Identity, MemoryStore, RemoteStore, StaticAuthProvider},
    services::{build_tree_from_value, DeleteOutcome, ToggleOutcome},
    AdminConsole, AppError, Config,
};

fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

fn uid(raw: &str) -> UserId {
    UserId::new(raw).unwrap()
}

async fn start(config: Config, data: Value) -> (Arc<MemoryStore>, AdminConsole) {
    let store = Arc::new(MemoryStore::with_data(data).await.unwrap());
    let auth = Arc::new(StaticAuthProvider::admin(Identity::new(uid("root"), "root@devnote.io")));
    let console = AdminConsole::start(config, store.clone(), auth).await.unwrap();
    (store, console)
}

#[test]
fn test_nested_replies_build_expected_forest() {
    let comments = json!({
        "c1": {"text": "first", "replies": {"c2": {"text": "reply"}}},
        "c3": {"text": "second"}
    });
    let (forest, report) = build_tree_from_value(&path("posts/u1/p1/comments"), Some(&comments));

    assert!(report.is_clean());
    assert_eq!(forest.root_keys(), vec!["c1", "c3"]);
    assert_eq!(forest.child_keys("c1"), vec!["c2"]);
    assert!(forest.child_keys("c3").is_empty());

    let (again, _) = build_tree_from_value(&path("posts/u1/p1/comments"), Some(&comments));
    assert_eq!(forest, again);
}

#[tokio::test]
async fn test_like_toggle_twice() {
    let (_store, console) = start(Config::default(), json!({"posts": {"u1": {"p1": {"title": "t"}}}})).await;
    let post = path("posts/u1/p1");
    let user = uid("u2");
    let reactions = console.reactions();

    reactions.toggle(&post, ReactionKind::Like, &user).await.unwrap();
    assert_eq!(reactions.count(&post, ReactionKind::Like).await.unwrap(), 1);
    assert_eq!(reactions.count(&post, ReactionKind::Dislike).await.unwrap(), 0);

    let outcome = reactions.toggle(&post, ReactionKind::Like, &user).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Removed);
    assert_eq!(reactions.count(&post, ReactionKind::Like).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dislike_then_like_leaves_only_like() {
    let (_store, console) = start(Config::default(), json!({"posts": {"u1": {"p1": {"title": "t"}}}})).await;
    let post = path("posts/u1/p1");
    let user = uid("u2");

    console.reactions().toggle(&post, ReactionKind::Dislike, &user).await.unwrap();
    console.reactions().toggle(&post, ReactionKind::Like, &user).await.unwrap();

    let summary = console.reactions().summary(&post).await.unwrap();
    assert_eq!((summary.likes, summary.dislikes), (1, 0));
}

#[tokio::test]
async fn test_resolving_comment_report_keeps_comment() {
    let (store, console) = start(
        Config::default(),
        json!({
            "posts": {"u1": {"p1": {"title": "t", "comments": {"X": {"text": "flagged", "isPublished": true}}}}},
            "reports": {"comments": {"X": {"r1": {"reason": "spam", "reporter": "u2"}}}}
        }),
    )
    .await;
    let before = store.read_once(&path("posts/u1/p1/comments/X")).await.unwrap();

    let mut reports = console.open_reports().await.unwrap();
    assert_eq!(reports.current().items.len(), 1);

    let outcome = console
        .moderation()
        .resolve_report(SubjectType::Comment, "X")
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);

    reports.wait_until(|r| r.items.is_empty()).await.unwrap();
    assert_eq!(store.read_once(&path("posts/u1/p1/comments/X")).await.unwrap(), before);
}

#[tokio::test]
async fn test_toggle_publish_back_and_forth() {
    let (store, console) = start(
        Config::default(),
        json!({"posts": {"u1": {"p1": {"title": "t", "isPublished": false}}}}),
    )
    .await;
    let post = path("posts/u1/p1");
    let flag = path("posts/u1/p1/isPublished");

    let published = console.moderation().toggle_publish(&post, false).await.unwrap();
    assert!(published);
    assert_eq!(store.read_once(&flag).await.unwrap(), Some(json!(true)));

    let published = console.moderation().toggle_publish(&post, published).await.unwrap();
    assert!(!published);
    assert_eq!(store.read_once(&flag).await.unwrap(), Some(json!(false)));
}

#[tokio::test]
async fn test_suspension_reaches_every_rendered_thread() {
    let (_store, console) = start(
        Config::default(),
        json!({
            "users": {"u1": {"name": "Ada", "isSuspended": false}, "u2": {"name": "Bo"}},
            "posts": {
                "u2": {
                    "p1": {"title": "one", "comments": {
                        "c1": {"text": "hi", "user": {"id": "u1", "name": "Ada", "isSuspended": false}},
                        "c2": {"text": "yo", "userId": "u2", "parentId": "c1"}
                    }},
                    "p2": {"title": "two", "comments": {
                        "c9": {"text": "again", "userId": "u1",
                               "replies": {"c10": {"text": "nested", "user": {"id": "u1", "isSuspended": false}}}}
                    }}
                }
            }
        }),
    )
    .await;

    let mut first = console.open_comments(&path("posts/u2/p1/comments")).await.unwrap();
    let mut second = console.open_comments(&path("posts/u2/p2/comments")).await.unwrap();
    console.projection().wait_for_version(1).await;

    console.moderation().suspend_user(&uid("u1")).await.unwrap();

    let by_ada = |thread: &devnote_moderation::console::CommentThread| {
        thread
            .rendered
            .iter()
            .flat_map(|c| c.walk())
            .filter(|c| c.author_id.as_ref() == Some(&uid("u1")))
            .all(|c| c.author_suspended)
    };
    let first_thread = first.wait_until(by_ada).await.unwrap();
    let second_thread = second.wait_until(by_ada).await.unwrap();

    let walked: Vec<_> = second_thread.rendered.iter().flat_map(|c| c.walk()).collect();
    assert_eq!(walked.len(), 2);
    assert!(walked.iter().all(|c| c.author_suspended));

    let bo = first_thread.rendered[0].children[0].clone();
    assert_eq!(bo.author_name, "Bo");
    assert!(!bo.author_suspended);
}

#[tokio::test]
async fn test_subtree_delete_leaves_sibling() {
    let (store, console) = start(
        Config::default(),
        json!({"posts": {"u1": {"p1": {"title": "t", "comments": {
            "c1": {"text": "parent", "replies": {"c2": {"text": "child"}}},
            "c3": {"text": "sibling"}
        }}}}}),
    )
    .await;
    let collection = path("posts/u1/p1/comments");
    let mut comments = console.open_comments(&collection).await.unwrap();
    let c1 = comments.current().forest.get("c1").unwrap().store_path.clone();

    assert_eq!(console.moderation().delete_subtree(&c1).await.unwrap(), DeleteOutcome::Deleted);

    let thread = comments.wait_until(|t| t.forest.len() == 1).await.unwrap();
    assert_eq!(thread.forest.root_keys(), vec!["c3"]);
    assert_eq!(store.read_once(&path("posts/u1/p1/comments/c1/replies/c2")).await.unwrap(), None);
    assert_eq!(
        store.read_once(&path("posts/u1/p1/comments/c3")).await.unwrap(),
        Some(json!({"text": "sibling"}))
    );

    assert_eq!(
        console.moderation().delete_subtree(&c1).await.unwrap(),
        DeleteOutcome::AlreadyAbsent
    );
}

#[tokio::test]
async fn test_delete_from_legacy_comment_list_hits_listed_item() {
    // The store keeps list items under their positions and hands them back as a list
    let (store, console) = start(
        Config::default(),
        json!({"posts": {"u1": {"p1": {"title": "t", "comments": {
            "0": {"id": "7", "text": "first"},
            "1": {"id": "0", "text": "second"}
        }}}}}),
    )
    .await;
    let collection = path("posts/u1/p1/comments");
    let listed = json!([{"id": "7", "text": "first"}, {"id": "0", "text": "second"}]);
    let (forest, _) = build_tree_from_value(&collection, Some(&listed));

    let second = forest.get("0").unwrap();
    assert_eq!(second.comment.text, "second");
    assert_eq!(
        console.moderation().delete_subtree(&second.store_path).await.unwrap(),
        DeleteOutcome::Deleted
    );

    assert_eq!(
        store.read_once(&collection).await.unwrap(),
        Some(json!({"0": {"id": "7", "text": "first"}}))
    );
}

#[tokio::test]
async fn test_root_prefix_scopes_every_path() {
    let (store, console) = start(
        Config::default().with_root_prefix("devnote"),
        json!({"devnote": {"users": {"u1": {"name": "a", "email": "a@x.io"}}}}),
    )
    .await;

    let users = console.open_users().await.unwrap();
    let user = users.current().items[0].clone();
    let change = console.moderation().grant_admin(&user).await.unwrap();
    assert!(change.is_complete());

    assert_eq!(
        store.read_once(&path("devnote/users/u1/role")).await.unwrap(),
        Some(json!("admin"))
    );
    let list = store.read_once(&path("devnote/adminAllowList")).await.unwrap().unwrap();
    assert_eq!(list.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_admin_console_cannot_moderate() {
    let store = Arc::new(
        MemoryStore::with_data(json!({"users": {"u1": {"name": "a"}}}))
            .await
            .unwrap(),
    );
    let auth = Arc::new(StaticAuthProvider::non_admin(Identity::new(uid("u9"), "u9@x.io")));
    let console = AdminConsole::start(Config::default(), store, auth).await.unwrap();

    let result = console.moderation().suspend_user(&uid("u1")).await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}
