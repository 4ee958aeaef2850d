mod common;

use common::{ExportBuilder, Msg};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use threadgraph::error::IngestError;
use threadgraph::extract::ExtractOptions;
use threadgraph::graph;
use threadgraph::model::{Entity, Fact};
use threadgraph::pipeline::Pipeline;

fn options(self_id: Option<&str>) -> ExtractOptions {
    ExtractOptions::new(self_id.map(str::to_string))
}

fn run(files: &[PathBuf], self_id: Option<&str>) -> Vec<Result<Entity, IngestError>> {
    Pipeline::new(files.to_vec(), options(self_id))
        .entities()
        .collect()
}

/// Two people, one untitled 1:1 thread, three messages: one replies to a
/// message that only comes later, one replies to an earlier message, and one
/// is from a user missing from thread_users.
fn small_export(path: &Path) {
    ExportBuilder::create(path)
        .user("FACEBOOK:1", Some("Me"))
        .user("FACEBOOK:2", Some("Bob"))
        .participant("ONE_TO_ONE:2:1", "FACEBOOK:1")
        .participant("ONE_TO_ONE:2:1", "FACEBOOK:2")
        .thread("ONE_TO_ONE:2:1", None)
        .message(Msg::new("m_c", 1_600_000_003_000, "ONE_TO_ONE:2:1", "FACEBOOK:999"))
        .message(Msg::new("m_b", 1_600_000_002_000, "ONE_TO_ONE:2:1", "FACEBOOK:1").reply_to("m_a"))
        .message(Msg::new("m_a", 1_600_000_001_000, "ONE_TO_ONE:2:1", "FACEBOOK:2").reply_to("m_b"))
        .done();
}

#[test]
fn end_to_end_single_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    small_export(&path);

    let out = run(&[path.clone()], Some("1"));
    assert_eq!(out.len(), 6);

    let kinds: Vec<&str> = out
        .iter()
        .map(|item| match item {
            Ok(entity) => entity.kind(),
            Err(_) => "error",
        })
        .collect();
    assert_eq!(
        kinds,
        ["sender", "sender", "thread", "message", "message", "error"]
    );

    let Ok(Entity::Thread(thread)) = &out[2] else {
        panic!("expected thread, got {:?}", out[2]);
    };
    assert_eq!(thread.id, "2");
    assert_eq!(thread.name.as_deref(), Some("Bob"));

    let first = out[3].as_ref().unwrap().as_message().unwrap();
    assert_eq!(first.id, "m_a");
    assert_eq!(first.sender.name.as_deref(), Some("Bob"));
    assert!(first.reply_to.is_none());
    assert_eq!(
        first.timestamp.to_rfc3339(),
        "2020-09-13T12:26:41+00:00"
    );

    let second = out[4].as_ref().unwrap().as_message().unwrap();
    assert_eq!(second.id, "m_b");
    assert_eq!(second.reply_to_id(), Some("m_a"));
    assert!(std::rc::Rc::ptr_eq(second.reply_to.as_ref().unwrap(), first));
    assert!(std::rc::Rc::ptr_eq(&second.thread, thread));

    let err = out[5].as_ref().unwrap_err();
    assert_eq!(err.kind(), "unresolved_sender");
    assert_eq!(err.path(), path.as_path());
    assert!(err.to_string().contains("m_c"));
}

#[test]
fn without_self_id_both_participants_name_the_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    small_export(&path);

    let out = run(&[path], None);
    let Ok(Entity::Thread(thread)) = &out[2] else {
        panic!("expected thread");
    };
    assert_eq!(thread.name.as_deref(), Some("Me, Bob"));
}

#[test]
fn group_name_falls_back_to_ids_for_unnamed_users() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    ExportBuilder::create(&path)
        .user("FACEBOOK:11", Some("Alice"))
        .user("FACEBOOK:77", None)
        .participant("GROUP:5", "FACEBOOK:11")
        .participant("GROUP:5", "FACEBOOK:77")
        .thread("GROUP:5", None)
        .thread("GROUP:6", Some("Named group"))
        .done();

    let facts: Vec<Fact> = Pipeline::new(vec![path], options(None))
        .facts()
        .map(|item| item.unwrap().fact)
        .collect();
    let threads: Vec<_> = facts
        .iter()
        .filter_map(|fact| match fact {
            Fact::Thread(thread) => Some((thread.id.as_str(), thread.name.as_deref())),
            _ => None,
        })
        .collect();
    assert_eq!(
        threads,
        [("5", Some("Alice, 77")), ("6", Some("Named group"))]
    );
}

#[test]
fn filtered_rows_never_reach_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    ExportBuilder::create(&path)
        .user("FACEBOOK:1", Some("Ann"))
        .thread("GROUP:5", Some("g"))
        .thread("MONTAGE:8", Some("story"))
        .message(Msg::new("deleted", 1, "GROUP:5", "FACEBOOK:1").msg_type(-1))
        .message(Msg::new("left", 2, "GROUP:5", "FACEBOOK:404").msg_type(2))
        .message(Msg::new("kept", 3, "GROUP:5", "FACEBOOK:1"))
        .message(Msg::new("story_msg", 4, "MONTAGE:8", "FACEBOOK:1"))
        .done();

    let out = run(&[path], None);
    let threads: Vec<_> = out
        .iter()
        .filter_map(|item| match item {
            Ok(Entity::Thread(thread)) => Some(thread.name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(threads, [Some("g".to_string())]);

    let ids: Vec<_> = graph::messages(out)
        .map(|item| match item {
            Ok(message) => message.id.clone(),
            Err(err) => err.kind().to_string(),
        })
        .collect();
    // MONTAGE messages point at a thread that was skipped, so they fail to
    // resolve rather than vanish.
    assert_eq!(ids, ["kept", "unresolved_thread"]);
}

#[test]
fn messages_come_out_in_timestamp_order_across_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    let mut builder = ExportBuilder::create(&path)
        .user("FACEBOOK:1", Some("Ann"))
        .thread("GROUP:5", Some("g"));
    let stamps = [50_i64, 10, 40, 10, 30, 20, 60];
    let ids: Vec<String> = (0..stamps.len()).map(|i| format!("m{i}")).collect();
    for (id, ts) in ids.iter().zip(stamps) {
        builder = builder.message(Msg::new(id, ts, "GROUP:5", "FACEBOOK:1"));
    }
    builder.done();

    let mut opts = options(None);
    opts.page_size = 2;
    let stamps_out: Vec<i64> = graph::messages(Pipeline::new(vec![path], opts).entities())
        .map(|item| item.unwrap().timestamp.timestamp_millis())
        .collect();
    assert_eq!(stamps_out, [10, 10, 20, 30, 40, 50, 60]);
}

#[test]
fn same_export_twice_collapses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    small_export(&path);

    let once = run(&[path.clone()], Some("1"));
    let twice = Pipeline::new(vec![path.clone(), path.clone()], options(Some("1")));
    let mut entities = twice.entities();
    let doubled: Vec<_> = entities.by_ref().collect();

    let summarize = |items: &[Result<Entity, IngestError>]| -> HashSet<String> {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(|entity| format!("{:?}", entity.record()))
            .collect()
    };
    assert_eq!(summarize(&once), summarize(&doubled));
    assert_eq!(
        doubled.iter().filter(|item| item.is_ok()).count(),
        once.iter().filter(|item| item.is_ok()).count()
    );

    let stats = entities.stats();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.duplicates, 6);
    assert_eq!(stats.senders, 2);
    assert_eq!(stats.messages, 2);
    // The unresolved message is a duplicate fact too, so it only errors once.
    assert_eq!(stats.unresolved_senders, 1);
}

#[test]
fn renamed_thread_in_later_snapshot_updates_later_messages() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("2020-01-01.db");
    let new = dir.path().join("2021-01-01.db");
    ExportBuilder::create(&old)
        .user("FACEBOOK:1", Some("Ann"))
        .participant("GROUP:5", "FACEBOOK:1")
        .thread("GROUP:5", None)
        .message(Msg::new("m1", 1, "GROUP:5", "FACEBOOK:1"))
        .done();
    ExportBuilder::create(&new)
        .user("FACEBOOK:1", Some("Ann"))
        .thread("GROUP:5", Some("Climbing"))
        .message(Msg::new("m1", 1, "GROUP:5", "FACEBOOK:1"))
        .message(Msg::new("m2", 2, "GROUP:5", "FACEBOOK:1").reply_to("m1"))
        .done();

    let out = run(&[old, new], None);
    let messages: Vec<_> = graph::messages(out).map(Result::unwrap).collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].thread.name.as_deref(), Some("Ann"));
    assert_eq!(messages[1].thread.name.as_deref(), Some("Climbing"));
    assert!(std::rc::Rc::ptr_eq(messages[1].reply_to.as_ref().unwrap(), &messages[0]));
}

#[test]
fn corrupt_export_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.db");
    let broken = dir.path().join("b.db");
    let last = dir.path().join("c.db");
    small_export(&first);
    std::fs::write(&broken, b"this is not a database at all").unwrap();
    ExportBuilder::create(&last)
        .user("FACEBOOK:3", Some("Cat"))
        .thread("GROUP:9", Some("late"))
        .message(Msg::new("z", 9, "GROUP:9", "FACEBOOK:3"))
        .done();

    let out = run(&[first, broken.clone(), last], Some("1"));
    let file_errors: Vec<_> = out
        .iter()
        .filter_map(|item| item.as_ref().err())
        .filter(|err| err.kind() == "file")
        .collect();
    assert_eq!(file_errors.len(), 1);
    assert_eq!(file_errors[0].path(), broken.as_path());
    assert!(file_errors[0].to_string().starts_with("while processing"));

    let ids: Vec<_> = graph::messages(out)
        .filter_map(Result::ok)
        .map(|message| message.id.clone())
        .collect();
    assert_eq!(ids, ["m_a", "m_b", "z"]);
}

#[test]
fn facts_before_a_bad_key_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    ExportBuilder::create(&path)
        .user("FACEBOOK:1", Some("Ann"))
        .thread("GROUP:5", Some("g"))
        .message(Msg::new("ok", 1, "GROUP:5", "FACEBOOK:1"))
        .message(Msg::new("bad", 2, "GROUP:5", "INSTAGRAM:1"))
        .message(Msg::new("after", 3, "GROUP:5", "FACEBOOK:1"))
        .done();

    let out = run(&[path], None);
    let kinds: Vec<&str> = out
        .iter()
        .map(|item| match item {
            Ok(entity) => entity.kind(),
            Err(err) => err.kind(),
        })
        .collect();
    assert_eq!(kinds, ["sender", "thread", "message", "file"]);
    let err = out[3].as_ref().unwrap_err();
    assert!(err.describe().contains("INSTAGRAM:1"));
}

fn kinds(out: &[Result<Entity, IngestError>]) -> Vec<&'static str> {
    out.iter()
        .map(|item| match item {
            Ok(entity) => entity.kind(),
            Err(err) => err.kind(),
        })
        .collect()
}

#[test]
fn untimed_message_fails_the_file_after_head_facts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    ExportBuilder::create(&path)
        .user("FACEBOOK:1", Some("Ann"))
        .thread("GROUP:5", Some("g"))
        .message(Msg::new("ok", 1, "GROUP:5", "FACEBOOK:1"))
        .message(Msg::new("untimed", 0, "GROUP:5", "FACEBOOK:1").untimed())
        .done();

    let out = run(&[path.clone()], None);
    assert_eq!(kinds(&out), ["sender", "thread", "file"]);
    let err = out[2].as_ref().unwrap_err();
    assert_eq!(err.path(), path.as_path());
    assert!(err.describe().contains("1 messages have no timestamp_ms"));
}

#[test]
fn participant_missing_from_thread_users_fails_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("a.db");
    let good = dir.path().join("b.db");
    ExportBuilder::create(&bad)
        .user("FACEBOOK:11", Some("Alice"))
        .participant("GROUP:5", "FACEBOOK:11")
        .participant("GROUP:5", "FACEBOOK:404")
        .thread("GROUP:5", None)
        .message(Msg::new("m1", 1, "GROUP:5", "FACEBOOK:11"))
        .done();
    ExportBuilder::create(&good)
        .user("FACEBOOK:3", Some("Cat"))
        .thread("GROUP:9", Some("late"))
        .done();

    let out = run(&[bad, good], None);
    assert_eq!(kinds(&out), ["sender", "file", "sender", "thread"]);
    assert!(out[1].as_ref().unwrap_err().describe().contains("FACEBOOK:404"));
}

#[test]
fn unnamed_thread_without_participants_fails_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads_db2");
    ExportBuilder::create(&path)
        .user("FACEBOOK:1", Some("Me"))
        .participant("ONE_TO_ONE:1:1", "FACEBOOK:1")
        .thread("GROUP:5", Some("named"))
        .thread("ONE_TO_ONE:1:1", None)
        .done();

    let out = run(&[path], Some("1"));
    assert_eq!(kinds(&out), ["sender", "thread", "file"]);
    assert!(
        out[2]
            .as_ref()
            .unwrap_err()
            .describe()
            .contains("\"ONE_TO_ONE:1:1\" has no name")
    );
}

#[test]
fn pipeline_is_pull_driven() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.db");
    small_export(&first);
    let never_opened = dir.path().join("missing.db");

    let pipeline = Pipeline::new(vec![first, never_opened], options(None));
    let mut entities = pipeline.entities();
    assert!(entities.next().unwrap().is_ok());
    assert_eq!(entities.stats().files, 1);
    assert_eq!(entities.stats().file_errors, 0);
}
