//! Identifier and timestamp codecs across dialects and through the store.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tabula_core::entities::User;
use tabula_core::{Column, ColumnType, Dialect, Value};
use tabula_db::codec::{decode_column, encode_column};
use tabula_db::inputs::UserCreate;
use tabula_db::repos::UserRepository;
use tabula_db::{
    DatabaseError, Engine, PoolOptions, Repository, Session, SqlValue, Statement, TimestampCodec,
    UuidCodec,
};
use tempfile::TempDir;
use uuid::Uuid;

async fn engine() -> (Engine, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("codecs.db");
    let engine = Engine::open_local(path.to_str().unwrap(), PoolOptions::default())
        .await
        .unwrap();
    engine.create_table::<User>().await.unwrap();
    (engine, dir)
}

#[rstest]
#[case::sqlite(Dialect::Sqlite)]
#[case::postgres(Dialect::Postgres)]
#[case::mysql(Dialect::MySql)]
fn uuid_survives_every_dialect(#[case] dialect: Dialect) {
    let ids = [Uuid::nil(), Uuid::from_u128(u128::MAX), Uuid::new_v4(), Uuid::new_v4()];
    for id in ids {
        let stored = UuidCodec::encode(Some(id), dialect);
        assert_eq!(UuidCodec::decode(stored, "id").unwrap(), Some(id));
    }
    assert_eq!(UuidCodec::decode(UuidCodec::encode(None, dialect), "id").unwrap(), None);
}

#[rstest]
#[case::sqlite(Dialect::Sqlite)]
#[case::postgres(Dialect::Postgres)]
#[case::mysql(Dialect::MySql)]
fn timestamp_instant_survives_every_dialect(#[case] dialect: Dialect) {
    let instants = [
        Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap(),
        Utc.with_ymd_and_hms(2026, 2, 9, 14, 30, 0).unwrap(),
        Utc::now(),
    ];
    for t in instants {
        let through_store: libsql::Value = TimestampCodec::encode(t, dialect).into();
        let decoded = TimestampCodec::decode(SqlValue::from(through_store), "created_at")
            .unwrap()
            .unwrap();
        assert_eq!(decoded, t);
    }
}

#[rstest]
#[case::sqlite(Dialect::Sqlite)]
#[case::postgres(Dialect::Postgres)]
fn typed_columns_route_through_codecs(#[case] dialect: Dialect) {
    let owner = Column::new("owner_id", ColumnType::Uuid);
    let seen = Column::new("seen_at", ColumnType::Timestamp).nullable();
    let id = Uuid::new_v4();
    let t = Utc::now();

    let stored = encode_column(&owner, Value::Uuid(id), dialect).unwrap();
    assert_eq!(decode_column(&owner, stored).unwrap(), Value::Uuid(id));

    let stored = encode_column(&seen, Value::Timestamp(t), dialect).unwrap();
    assert_eq!(decode_column(&seen, stored).unwrap(), Value::Timestamp(t));
    assert_eq!(
        encode_column(&seen, Value::Null, dialect).unwrap(),
        SqlValue::Null
    );
}

#[tokio::test]
async fn stored_timestamps_read_back_as_the_same_instant() {
    let (engine, _dir) = engine().await;
    let created = engine
        .unit_of_work(async |session: &mut Session| -> Result<User, DatabaseError> {
            Repository::<UserRepository>::new(session)?
                .create(UserCreate::new("tz"))
                .await
        })
        .await
        .unwrap();

    let mut session = engine.session();
    let loaded = Repository::<UserRepository>::new(&mut session)
        .unwrap()
        .get(created.id)
        .await
        .unwrap()
        .unwrap();
    session.close().await.unwrap();
    assert_eq!(loaded.timestamps.created_at, created.timestamps.created_at);
    assert_eq!(loaded.timestamps.created_at.timezone(), Utc);
}

#[tokio::test]
async fn naive_store_text_is_reinterpreted_as_utc() {
    let (engine, _dir) = engine().await;
    let id = Uuid::new_v4();
    let mut session = engine.session();
    session
        .execute(
            Statement::new(
                "INSERT INTO users (id, created_at, updated_at, name) VALUES (?1, ?2, ?3, 'legacy')",
            )
            .bind(SqlValue::Text(id.to_string()))
            .bind(SqlValue::Text("2026-02-09 14:30:00".into()))
            .bind(SqlValue::Text("2026-02-09T16:30:00+02:00".into())),
        )
        .await
        .unwrap();

    let user = Repository::<UserRepository>::new(&mut session)
        .unwrap()
        .get(id)
        .await
        .unwrap()
        .unwrap();
    session.close().await.unwrap();

    let expected = Utc.with_ymd_and_hms(2026, 2, 9, 14, 30, 0).unwrap();
    assert_eq!(user.timestamps.created_at, expected);
    assert_eq!(user.timestamps.updated_at, expected);
}
