//! Unit-of-work completion, cancellation and pool exhaustion.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tabula_core::entities::User;
use tabula_db::inputs::UserCreate;
use tabula_db::repos::UserRepository;
use tabula_db::{DatabaseError, Engine, PoolOptions, Repository, Session, SessionState, Statement};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

async fn engine_with(options: PoolOptions) -> (Engine, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("TABULA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("uow.db");
    let engine = Engine::open_local(path.to_str().unwrap(), options.pragma("busy_timeout", "5000"))
        .await
        .unwrap();
    engine.create_table::<User>().await.unwrap();
    (engine, dir)
}

async fn engine() -> (Engine, TempDir) {
    engine_with(PoolOptions {
        timeout: Duration::from_secs(2),
        ..PoolOptions::default()
    })
    .await
}

async fn exists(engine: &Engine, id: Uuid) -> bool {
    let mut session = engine.session();
    let found = Repository::<UserRepository>::new(&mut session)
        .unwrap()
        .get(id)
        .await
        .unwrap()
        .is_some();
    session.close().await.unwrap();
    found
}

#[derive(Debug)]
#[allow(dead_code)]
enum AppError {
    Db(DatabaseError),
    Rejected(Uuid),
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        Self::Db(e)
    }
}

#[tokio::test]
async fn clean_exit_commits() {
    let (engine, _dir) = engine().await;
    let user = engine
        .unit_of_work(async |session: &mut Session| -> Result<User, DatabaseError> {
            Repository::<UserRepository>::new(session)?
                .create(UserCreate::new("alice"))
                .await
        })
        .await
        .unwrap();
    assert!(exists(&engine, user.id).await);
    assert_eq!(engine.pool_status().checked_out, 0);
}

#[tokio::test]
async fn failure_rolls_back_and_keeps_caller_error() {
    let (engine, _dir) = engine().await;
    let err = engine
        .unit_of_work(async |session: &mut Session| -> Result<(), AppError> {
            let user = Repository::<UserRepository>::new(session)?
                .create(UserCreate::new("bob"))
                .await?;
            Err(AppError::Rejected(user.id))
        })
        .await
        .unwrap_err();
    let AppError::Rejected(id) = err else {
        panic!("expected caller error, got {err:?}");
    };
    assert!(!exists(&engine, id).await);
    assert_eq!(engine.pool_status().checked_out, 0);
}

#[tokio::test]
async fn cancelled_scope_rolls_back() {
    let (engine, _dir) = engine().await;
    let (tx, rx) = tokio::sync::oneshot::channel();

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        engine.unit_of_work(async |session: &mut Session| -> Result<(), DatabaseError> {
            let user = Repository::<UserRepository>::new(session)?
                .create(UserCreate::new("ghost"))
                .await?;
            let _ = tx.send(user.id);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }),
    )
    .await;
    assert!(outcome.is_err(), "scope should have been cancelled");

    let id = rx.await.unwrap();
    assert!(!exists(&engine, id).await);
    assert_eq!(engine.pool_status().checked_out, 0);
}

#[tokio::test]
async fn failed_commit_rolls_back_and_reraises() {
    let (engine, _dir) = engine().await;
    let mut setup = engine.session();
    setup
        .execute(Statement::new("CREATE TABLE parents (id INTEGER PRIMARY KEY)"))
        .await
        .unwrap();
    setup
        .execute(Statement::new(
            "CREATE TABLE children (parent_id INTEGER REFERENCES parents (id) \
             DEFERRABLE INITIALLY DEFERRED)",
        ))
        .await
        .unwrap();
    setup.complete(Ok::<_, DatabaseError>(())).await.unwrap();

    // The dangling reference is only detected at COMMIT.
    let err = engine
        .unit_of_work(async |session: &mut Session| -> Result<(), DatabaseError> {
            session
                .execute(Statement::new("INSERT INTO children (parent_id) VALUES (42)"))
                .await?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::LibSql(_)), "{err:?}");
    assert_eq!(engine.pool_status().checked_out, 0);

    let mut check = engine.session();
    let rows = check
        .query(Statement::new("SELECT count(*) FROM children"))
        .await
        .unwrap();
    check.close().await.unwrap();
    assert_eq!(rows[0].get(0), Some(&tabula_db::SqlValue::Integer(0)));
}

#[tokio::test]
async fn completed_session_is_closed() {
    let (engine, _dir) = engine().await;
    let mut session = engine.session();
    Repository::<UserRepository>::new(&mut session)
        .unwrap()
        .get_all()
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Active);
    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    let err = Repository::<UserRepository>::new(&mut session)
        .unwrap()
        .get_all()
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::SessionClosed));
}

#[tokio::test]
async fn pool_exhaustion_times_out() {
    let (engine, _dir) = engine_with(PoolOptions {
        size: 1,
        max_overflow: 0,
        timeout: Duration::from_millis(150),
        ..PoolOptions::default()
    })
    .await;

    let mut holder = engine.session();
    holder.query(Statement::new("SELECT 1")).await.unwrap();

    let mut waiter = engine.session();
    let err = Repository::<UserRepository>::new(&mut waiter)
        .unwrap()
        .get_all()
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::PoolTimeout(_)), "{err:?}");
    assert_eq!(err.status_code(), 503);

    holder.close().await.unwrap();
    assert!(
        Repository::<UserRepository>::new(&mut waiter)
            .unwrap()
            .get_all()
            .await
            .unwrap()
            .is_empty()
    );
    waiter.close().await.unwrap();
}

#[tokio::test]
async fn open_sessions_hold_separate_connections() {
    let (engine, _dir) = engine_with(PoolOptions {
        size: 2,
        max_overflow: 1,
        timeout: Duration::from_millis(150),
        ..PoolOptions::default()
    })
    .await;

    let mut sessions = Vec::new();
    for _ in 0..3 {
        let mut session = engine.session();
        session.query(Statement::new("SELECT 1")).await.unwrap();
        sessions.push(session);
    }
    assert_eq!(engine.pool_status().checked_out, 3);

    for mut session in sessions {
        session.close().await.unwrap();
    }
    let status = engine.pool_status();
    assert_eq!(status.checked_out, 0);
    // Overflow connections are closed on return
    assert_eq!(status.idle, 2);
}
