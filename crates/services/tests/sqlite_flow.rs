use std::sync::Arc;

use quiz_core::model::{QuestionDraft, UserId};
use quiz_core::time::fixed_now;
use services::{AppServices, Clock, EngineConfig, RatingServiceError};

fn uid(raw: &str) -> UserId {
    UserId::new(raw).unwrap()
}

#[tokio::test]
async fn sqlite_backed_engine_round_trip() {
    let app = AppServices::new_sqlite(
        "sqlite:file:memdb_services_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        EngineConfig::default(),
    )
    .await
    .expect("connect sqlite");

    app.profiles()
        .ensure_profile(&uid("amy"), "Amy", "amy@example.com")
        .await
        .unwrap();
    app.profiles()
        .ensure_profile(&uid("ben"), "", "")
        .await
        .expect_err("blank display name");

    let written = app
        .questions()
        .create_batch(
            vec![
                QuestionDraft::new("First", vec!["a".into(), "b".into()], 0),
                QuestionDraft::new("Second", vec!["a".into(), "b".into(), "c".into()], 2),
            ],
            &uid("amy"),
        )
        .await
        .unwrap();
    assert_eq!(written, 2);

    let batch = app.selection().next_batch(&uid("amy"), 5).await.unwrap();
    assert_eq!(batch.len(), 2);
    let first = &batch[0];
    let record = app.answers().grade(first, 0, fixed_now());
    app.answers().record_answer(&uid("amy"), &record).await.unwrap();

    // The answered question drops behind the unanswered one.
    let next = app.selection().next_batch(&uid("amy"), 5).await.unwrap();
    assert_eq!(next[1].id(), first.id());

    let err = app.ratings().rate_question(first.id(), 9).await.unwrap_err();
    assert!(matches!(err, RatingServiceError::InvalidRating(_)));
    let summary = app
        .ratings()
        .rate_question(first.id(), 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.average, 3.0);

    let board = app.leaderboard().snapshot().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].display_name, "Amy");

    let names = app.profiles().display_names(&[uid("amy")]).await.unwrap();
    assert_eq!(names[&uid("amy")], "Amy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_raters_are_all_kept() {
    let dir = std::env::temp_dir().join("quiz-services-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("raters-{}.db", std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    let app = Arc::new(
        AppServices::new_sqlite(
            &format!("sqlite://{}?mode=rwc", path.display()),
            Clock::fixed(fixed_now()),
            EngineConfig::default(),
        )
        .await
        .expect("connect sqlite"),
    );

    app.profiles()
        .ensure_profile(&uid("amy"), "Amy", "")
        .await
        .unwrap();
    let id = app
        .questions()
        .create_question(
            QuestionDraft::new("Rated", vec!["a".into(), "b".into()], 0),
            &uid("amy"),
        )
        .await
        .unwrap();

    let handles: Vec<_> = (0..32_i64)
        .map(|i| {
            let ratings = app.ratings();
            tokio::spawn(async move { ratings.rate_question(id, i % 5 + 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap().unwrap();
    }

    let question = app.questions().list_all().await.unwrap().remove(0);
    assert_eq!(question.ratings().len(), 32);
    // 93 / 32 = 2.906
    assert_eq!(question.avg_rating(), 2.9);
}
