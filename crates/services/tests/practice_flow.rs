use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{QuestionDraft, UserId};
use quiz_core::time::fixed_now;
use services::{AppServices, Clock, EngineConfig};
use tokio::sync::mpsc;

fn uid(raw: &str) -> UserId {
    UserId::new(raw).unwrap()
}

fn four_options(text: &str, correct: usize) -> QuestionDraft {
    QuestionDraft::new(
        text,
        vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct,
    )
}

async fn engine() -> AppServices {
    let config = EngineConfig {
        answer_retry_delay: Duration::from_millis(1),
        ..EngineConfig::default()
    };
    let app = AppServices::in_memory(Clock::fixed(fixed_now()), config);
    for (id, name) in [("amy", "Amy"), ("ben", "Ben")] {
        app.profiles()
            .ensure_profile(&uid(id), name, "")
            .await
            .expect("profile");
    }
    app
}

#[tokio::test]
async fn answer_flow_updates_question_and_learner() {
    let app = engine().await;
    let id = app
        .questions()
        .create_question(four_options("Pick C", 2), &uid("amy"))
        .await
        .expect("create");

    let batch = app
        .selection()
        .next_default_batch(&uid("ben"))
        .await
        .expect("batch");
    assert_eq!(batch.len(), 1);

    let record = app.answers().grade(&batch[0], 1, fixed_now());
    assert!(!record.is_correct);
    app.answers()
        .record_answer(&uid("ben"), &record)
        .await
        .expect("record");

    let question = app
        .questions()
        .list_all()
        .await
        .expect("list")
        .into_iter()
        .find(|q| q.id() == id)
        .expect("question kept");
    assert_eq!(question.times_answered(), 1);

    let ben = app.profiles().get_profile(&uid("ben")).await.unwrap().unwrap();
    assert_eq!(ben.total_answered(), 1);
    assert_eq!(ben.total_correct(), 0);
}

#[tokio::test]
async fn low_ratings_remove_question_from_practice() {
    let app = engine().await;
    let good = app
        .questions()
        .create_question(four_options("good", 0), &uid("amy"))
        .await
        .unwrap();
    let bad = app
        .questions()
        .create_question(four_options("bad", 0), &uid("amy"))
        .await
        .unwrap();

    for v in [5, 5, 4] {
        app.ratings().rate_question(good, v).await.unwrap();
    }
    let summary = app.ratings().rate_question(good, 2).await.unwrap().unwrap();
    assert_eq!(summary.average, 4.0);

    for _ in 0..3 {
        app.ratings().rate_question(bad, 2).await.unwrap();
    }

    let batch = app.selection().next_batch(&uid("ben"), 10).await.unwrap();
    let ids: Vec<_> = batch.iter().map(|q| q.id()).collect();
    assert_eq!(ids, [good]);
    assert_eq!(app.questions().list_visible().await.unwrap().len(), 1);
    assert_eq!(app.questions().count().await.unwrap(), 2);
}

#[tokio::test]
async fn submitted_answers_reach_the_live_leaderboard() {
    let app = engine().await;
    let id = app
        .questions()
        .create_question(four_options("Q", 0), &uid("amy"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = app.leaderboard().subscribe(move |entries| {
        let _ = tx.send(entries);
    });
    let first = rx.recv().await.expect("initial delivery");
    assert!(first.is_empty(), "nobody has answered yet");

    let question = app.questions().list_visible().await.unwrap().remove(0);
    assert_eq!(question.id(), id);
    let record = app.answers().grade(&question, 0, fixed_now());
    let committed = app.answers().submit(uid("ben"), record).await.unwrap();
    assert!(committed.is_some());

    let latest = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let entries = rx.recv().await.expect("feed open");
            if !entries.is_empty() {
                return entries;
            }
        }
    })
    .await
    .expect("update delivered");
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].uid, uid("ben"));
    assert_eq!(latest[0].display_name, "Ben");
    assert_eq!(latest[0].total_answered, 1);
}

#[tokio::test]
async fn reset_clears_statistics_and_empties_leaderboard() {
    let app = engine().await;
    let id = app
        .questions()
        .create_question(four_options("Q", 0), &uid("amy"))
        .await
        .unwrap();
    let question = app.questions().list_all().await.unwrap().remove(0);
    let record = app.answers().grade(&question, 0, fixed_now());
    app.answers().record_answer(&uid("ben"), &record).await.unwrap();
    app.ratings().rate_question(id, 1).await.unwrap();
    assert_eq!(app.leaderboard().snapshot().await.unwrap().len(), 1);

    let report = app.maintenance().reset_statistics().await.unwrap();
    assert_eq!(report.users, 2);
    assert_eq!(report.answers_deleted, 1);
    assert_eq!(report.questions, 1);

    assert!(app.leaderboard().snapshot().await.unwrap().is_empty());
    assert!(app.answers().answer_history(&uid("ben")).await.unwrap().is_empty());
    let question = app.questions().list_all().await.unwrap().remove(0);
    assert_eq!(question.times_answered(), 0);
    assert_eq!(question.avg_rating(), 5.0);

    let amy = app.profiles().get_profile(&uid("amy")).await.unwrap().unwrap();
    assert_eq!(amy.total_questions_added(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ratings_are_never_lost() {
    let app = Arc::new(engine().await);
    let id = app
        .questions()
        .create_question(four_options("Q", 0), &uid("amy"))
        .await
        .unwrap();

    let handles: Vec<_> = (0..20_i64)
        .map(|i| {
            let ratings = app.ratings();
            tokio::spawn(async move { ratings.rate_question(id, i % 5 + 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let question = app.questions().list_all().await.unwrap().remove(0);
    assert_eq!(question.ratings().len(), 20);
    assert_eq!(question.avg_rating(), 3.0);
}
