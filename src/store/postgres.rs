//! PostgreSQL backend via sea-orm.
//!
//! Transitions are a single `UPDATE ... WHERE id = $1 AND status = $2
//! RETURNING *`, so the applied row comes back from the same statement. No
//! row back means the request is missing or some other writer got there
//! first, and a follow-up read tells which.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr, TransactionTrait,
};

use crate::accounts::{Account, AccountRole, AccountStore, NewAccount};
use crate::entities::{account, sell_request};
use crate::lifecycle::{
    AppendOutcome, NewSellRequest, Page, RequestSource, SellRequest, SellRequestFilter,
    SellRequestStatus, SellRequestStore, StatusTally, StoreError, Transition, TransitionOutcome,
};

#[cfg_attr(not(test), derive(Clone))]
pub struct PostgresStore {
    database: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl SellRequestStore for PostgresStore {
    async fn insert(&self, request: NewSellRequest) -> Result<SellRequest, StoreError> {
        let amount = i64::try_from(request.amount).map_err(|_| StoreError::Corrupt {
            id: 0,
            reason: format!("amount {} exceeds storage bounds", request.amount),
        })?;
        let row = sell_request::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(request.user_id),
            wallet_address: ActiveValue::Set(request.wallet_address),
            amount: ActiveValue::Set(amount),
            price: ActiveValue::Set(request.price),
            status: ActiveValue::Set(SellRequestStatus::Pending.as_str().to_string()),
            description: ActiveValue::Set(request.description),
            admin_notes: ActiveValue::Set(None),
            reviewed_by: ActiveValue::Set(None),
            review_date: ActiveValue::Set(None),
            completed_date: ActiveValue::Set(None),
            transaction_hash: ActiveValue::Set(None),
            source: ActiveValue::Set(request.source.as_str().to_string()),
            documents: ActiveValue::Set(serde_json::json!(request.documents)),
            submitted_date: ActiveValue::Set(request.submitted_date.fixed_offset()),
        };

        let model = row.insert(&self.database).await.map_err(map_db_err)?;
        request_from_model(model)
    }

    async fn find(&self, id: i64) -> Result<Option<SellRequest>, StoreError> {
        sell_request::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(request_from_model)
            .transpose()
    }

    async fn find_live(
        &self,
        user_id: i64,
        wallet_address: &str,
    ) -> Result<Option<SellRequest>, StoreError> {
        sell_request::Entity::find()
            .filter(sell_request::Column::UserId.eq(user_id))
            .filter(sell_request::Column::WalletAddress.eq(wallet_address))
            .filter(sell_request::Column::Status.is_in([
                SellRequestStatus::Pending.as_str(),
                SellRequestStatus::Approved.as_str(),
            ]))
            .order_by_desc(sell_request::Column::SubmittedDate)
            .one(&self.database)
            .await?
            .map(request_from_model)
            .transpose()
    }

    async fn transition(
        &self,
        id: i64,
        expected: SellRequestStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, StoreError> {
        let update = sell_request::Entity::update_many()
            .col_expr(
                sell_request::Column::Status,
                Expr::value(transition.target().as_str()),
            )
            .filter(sell_request::Column::Id.eq(id))
            .filter(sell_request::Column::Status.eq(expected.as_str()));

        let update = match transition {
            Transition::Reviewed {
                reviewed_by,
                admin_notes,
                at,
                ..
            } => update
                .col_expr(sell_request::Column::ReviewedBy, Expr::value(reviewed_by))
                .col_expr(sell_request::Column::ReviewDate, Expr::value(at.fixed_offset()))
                .col_expr(sell_request::Column::AdminNotes, Expr::value(admin_notes)),
            Transition::Settled {
                transaction_hash,
                at,
            } => update
                .col_expr(
                    sell_request::Column::TransactionHash,
                    Expr::value(transaction_hash),
                )
                .col_expr(
                    sell_request::Column::CompletedDate,
                    Expr::value(at.fixed_offset()),
                ),
        };

        let mut updated = update.exec_with_returning(&self.database).await?;
        assert!(updated.len() <= 1, "Transition touched multiple rows");
        if let Some(row) = updated.pop() {
            return Ok(TransitionOutcome::Applied(request_from_model(row)?));
        }

        let outcome = match SellRequestStore::find(self, id).await? {
            None => TransitionOutcome::Missing,
            Some(current) => TransitionOutcome::StatusMismatch(current.status),
        };
        Ok(outcome)
    }

    async fn append_document(
        &self,
        id: i64,
        reference: String,
        max_documents: usize,
    ) -> Result<AppendOutcome, StoreError> {
        let txn = self.database.begin().await?;
        let Some(row) = sell_request::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(AppendOutcome::Missing);
        };

        let status = parse_status(row.id, &row.status)?;
        if status.is_terminal() {
            return Ok(AppendOutcome::Terminal(status));
        }
        let mut documents = decode_documents(row.id, &row.documents)?;
        if documents.len() >= max_documents {
            return Ok(AppendOutcome::Full);
        }
        documents.push(reference);

        let mut active: sell_request::ActiveModel = row.into();
        active.documents = ActiveValue::Set(serde_json::json!(documents));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(AppendOutcome::Appended(request_from_model(updated)?))
    }

    async fn query(
        &self,
        filter: &SellRequestFilter,
        page: Page,
    ) -> Result<Vec<SellRequest>, StoreError> {
        let rows = page_select(filter, page).all(&self.database).await?;
        rows.into_iter().map(request_from_model).collect()
    }

    async fn tally(&self, filter: &SellRequestFilter) -> Result<Vec<StatusTally>, StoreError> {
        // SUM(bigint) is numeric in Postgres; cast back to int8 so it decodes as i64.
        let credits: SimpleExpr = Func::cast_as(
            Func::sum(Expr::col(sell_request::Column::Amount)),
            Alias::new("int8"),
        )
        .into();
        let rows = apply_filter(sell_request::Entity::find(), filter)
            .select_only()
            .column(sell_request::Column::Status)
            .column_as(sell_request::Column::Id.count(), "request_count")
            .column_as(credits, "credits")
            .group_by(sell_request::Column::Status)
            .into_model::<TallyRow>()
            .all(&self.database)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusTally {
                    status: parse_status(0, &row.status)?,
                    count: row.request_count.max(0) as u64,
                    credits: row.credits.unwrap_or(0).max(0) as u64,
                })
            })
            .collect()
    }

    async fn approved_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SellRequest>, StoreError> {
        let rows = sell_request::Entity::find()
            .filter(sell_request::Column::Status.eq(SellRequestStatus::Approved.as_str()))
            .filter(sell_request::Column::ReviewDate.lt(cutoff.fixed_offset()))
            .order_by_asc(sell_request::Column::ReviewDate)
            .order_by_asc(sell_request::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;
        rows.into_iter().map(request_from_model).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.database.ping().await?)
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let row = account::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(account.name),
            email: ActiveValue::Set(account.email),
            wallet_address: ActiveValue::Set(account.wallet_address),
            role: ActiveValue::Set(account.role.as_str().to_string()),
            created_at: ActiveValue::Set(account.created_at.fixed_offset()),
        };
        let model = row.insert(&self.database).await.map_err(map_db_err)?;
        account_from_model(model)
    }

    async fn find(&self, id: i64) -> Result<Option<Account>, StoreError> {
        account::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(account_from_model)
            .transpose()
    }
}

#[derive(Debug, FromQueryResult)]
struct TallyRow {
    status: String,
    request_count: i64,
    credits: Option<i64>,
}

/// Newest first; `id` breaks ties between requests submitted in the same instant.
fn page_select(filter: &SellRequestFilter, page: Page) -> Select<sell_request::Entity> {
    apply_filter(sell_request::Entity::find(), filter)
        .order_by_desc(sell_request::Column::SubmittedDate)
        .order_by_desc(sell_request::Column::Id)
        .limit(page.limit)
        .offset(page.offset)
}

fn apply_filter(
    mut select: Select<sell_request::Entity>,
    filter: &SellRequestFilter,
) -> Select<sell_request::Entity> {
    if let Some(user_id) = filter.user_id {
        select = select.filter(sell_request::Column::UserId.eq(user_id));
    }
    if let Some(wallet) = filter.wallet_address.as_deref() {
        select = select.filter(sell_request::Column::WalletAddress.eq(wallet));
    }
    if let Some(status) = filter.status {
        select = select.filter(sell_request::Column::Status.eq(status.as_str()));
    }
    select
}

fn map_db_err(err: DbErr) -> StoreError {
    let sql_err = err.sql_err();
    classify_db_err(err, sql_err)
}

fn classify_db_err(err: DbErr, sql_err: Option<SqlErr>) -> StoreError {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
        _ => StoreError::Database(err),
    }
}

fn parse_status(id: i64, raw: &str) -> Result<SellRequestStatus, StoreError> {
    raw.parse()
        .map_err(|reason| StoreError::Corrupt { id, reason })
}

fn decode_documents(id: i64, raw: &serde_json::Value) -> Result<Vec<String>, StoreError> {
    serde_json::from_value(raw.clone()).map_err(|err| StoreError::Corrupt {
        id,
        reason: format!("documents column is not a string array: {err}"),
    })
}

fn request_from_model(model: sell_request::Model) -> Result<SellRequest, StoreError> {
    let id = model.id;
    let amount = u64::try_from(model.amount).map_err(|_| StoreError::Corrupt {
        id,
        reason: format!("negative amount {}", model.amount),
    })?;
    let source: RequestSource = model
        .source
        .parse()
        .map_err(|reason| StoreError::Corrupt { id, reason })?;

    Ok(SellRequest {
        id,
        user_id: model.user_id,
        wallet_address: model.wallet_address,
        amount,
        price: model.price,
        status: parse_status(id, &model.status)?,
        description: model.description,
        admin_notes: model.admin_notes,
        reviewed_by: model.reviewed_by,
        review_date: model.review_date.map(|at| at.with_timezone(&Utc)),
        completed_date: model.completed_date.map(|at| at.with_timezone(&Utc)),
        transaction_hash: model.transaction_hash,
        source,
        documents: decode_documents(id, &model.documents)?,
        submitted_date: model.submitted_date.with_timezone(&Utc),
    })
}

fn account_from_model(model: account::Model) -> Result<Account, StoreError> {
    let role: AccountRole = model.role.parse().map_err(|reason| StoreError::Corrupt {
        id: model.id,
        reason,
    })?;
    Ok(Account {
        id: model.id,
        name: model.name,
        email: model.email,
        wallet_address: model.wallet_address,
        role,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait, Value};

    use super::*;

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn store(database: MockDatabase) -> PostgresStore {
        PostgresStore::new(database.into_connection())
    }

    fn with_status(status: &str) -> sell_request::Model {
        let mut row = model();
        row.status = status.to_string();
        row.reviewed_by = None;
        row.review_date = None;
        row
    }

    fn approve_at() -> Transition {
        Transition::Reviewed {
            status: SellRequestStatus::Approved,
            reviewed_by: 1,
            admin_notes: None,
            at: Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap(),
        }
    }

    fn model() -> sell_request::Model {
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap();
        sell_request::Model {
            id: 7,
            user_id: 3,
            wallet_address: "0x52908400098527886e0f7030069857d2e4169ee7".to_string(),
            amount: 500,
            price: 4.25,
            status: "approved".to_string(),
            description: Some("Peatland restoration".to_string()),
            admin_notes: None,
            reviewed_by: Some(1),
            review_date: Some(at.fixed_offset()),
            completed_date: None,
            transaction_hash: None,
            source: "blockchain-audit".to_string(),
            documents: serde_json::json!(["a.pdf", "b.pdf"]),
            submitted_date: at.fixed_offset(),
        }
    }

    #[test]
    fn model_converts_to_domain() {
        let request = request_from_model(model()).unwrap();
        assert_eq!(request.status, SellRequestStatus::Approved);
        assert_eq!(request.source, RequestSource::BlockchainAudit);
        assert_eq!(request.amount, 500);
        assert_eq!(request.documents, vec!["a.pdf", "b.pdf"]);
        assert!(request.metadata_consistent());
    }

    #[test]
    fn corrupt_rows_are_reported() {
        let mut bad_status = model();
        bad_status.status = "archived".to_string();
        assert!(matches!(
            request_from_model(bad_status),
            Err(StoreError::Corrupt { id: 7, .. })
        ));

        let mut bad_documents = model();
        bad_documents.documents = serde_json::json!({"file": "a.pdf"});
        assert!(matches!(
            request_from_model(bad_documents),
            Err(StoreError::Corrupt { id: 7, .. })
        ));

        let mut negative = model();
        negative.amount = -1;
        assert!(request_from_model(negative).is_err());
    }

    #[tokio::test]
    async fn transition_returns_the_updated_row() {
        let store = store(mock().append_query_results([vec![model()]]));
        let outcome = store
            .transition(7, SellRequestStatus::Pending, approve_at())
            .await
            .unwrap();
        let TransitionOutcome::Applied(updated) = outcome else {
            panic!("expected the transition to apply");
        };
        assert_eq!(updated.id, 7);
        assert_eq!(updated.status, SellRequestStatus::Approved);
    }

    #[tokio::test]
    async fn transition_reports_the_status_another_writer_left() {
        let store = store(mock().append_query_results([
            Vec::<sell_request::Model>::new(),
            vec![with_status("rejected")],
        ]));
        let outcome = store
            .transition(7, SellRequestStatus::Pending, approve_at())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::StatusMismatch(SellRequestStatus::Rejected)
        );
    }

    #[tokio::test]
    async fn transition_on_unknown_row_is_missing() {
        let store = store(mock().append_query_results([
            Vec::<sell_request::Model>::new(),
            Vec::new(),
        ]));
        let outcome = store
            .transition(
                99,
                SellRequestStatus::Approved,
                Transition::Settled {
                    transaction_hash: format!("0x{}", "ab".repeat(32)),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Missing);
    }

    #[tokio::test]
    async fn append_respects_terminal_status_and_cap() {
        let terminal = store(mock().append_query_results([vec![with_status("completed")]]));
        assert_eq!(
            terminal.append_document(7, "c.pdf".to_string(), 20).await.unwrap(),
            AppendOutcome::Terminal(SellRequestStatus::Completed)
        );

        let full = store(mock().append_query_results([vec![model()]]));
        assert_eq!(
            full.append_document(7, "c.pdf".to_string(), 2).await.unwrap(),
            AppendOutcome::Full
        );

        let mut appended_row = model();
        appended_row.documents = serde_json::json!(["a.pdf", "b.pdf", "c.pdf"]);
        let open = store(mock().append_query_results([vec![model()], vec![appended_row]]));
        let AppendOutcome::Appended(updated) =
            open.append_document(7, "c.pdf".to_string(), 3).await.unwrap()
        else {
            panic!("expected the document to be appended");
        };
        assert_eq!(updated.documents, vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[tokio::test]
    async fn find_live_decodes_the_match() {
        let store = store(mock().append_query_results([vec![with_status("pending")]]));
        let live = store
            .find_live(3, "0x52908400098527886e0f7030069857d2e4169ee7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.status, SellRequestStatus::Pending);
    }

    #[tokio::test]
    async fn tally_decodes_grouped_rows() {
        let rows = vec![
            BTreeMap::from([
                ("status", Value::from("pending")),
                ("request_count", Value::BigInt(Some(2))),
                ("credits", Value::BigInt(Some(150))),
            ]),
            BTreeMap::from([
                ("status", Value::from("rejected")),
                ("request_count", Value::BigInt(Some(1))),
                ("credits", Value::BigInt(None)),
            ]),
        ];
        let store = store(mock().append_query_results([rows]));
        let tallies = store.tally(&SellRequestFilter::default()).await.unwrap();
        assert_eq!(
            tallies,
            vec![
                StatusTally {
                    status: SellRequestStatus::Pending,
                    count: 2,
                    credits: 150,
                },
                StatusTally {
                    status: SellRequestStatus::Rejected,
                    count: 1,
                    credits: 0,
                },
            ]
        );
    }

    #[test]
    fn query_orders_newest_first_then_by_id() {
        let filter = SellRequestFilter {
            status: Some(SellRequestStatus::Pending),
            ..SellRequestFilter::default()
        };
        let sql = page_select(
            &filter,
            Page {
                limit: 5,
                offset: 10,
            },
        )
        .build(DatabaseBackend::Postgres)
        .to_string();
        assert!(sql.contains(r#""sell_requests"."status" = 'pending'"#));
        assert!(sql.contains(
            r#"ORDER BY "sell_requests"."submitted_date" DESC, "sell_requests"."id" DESC LIMIT 5 OFFSET 10"#
        ));
    }

    #[tokio::test]
    async fn insert_failures_surface_as_database_errors() {
        let store = store(
            mock().append_query_errors([DbErr::Custom("connection reset".to_string())]),
        );
        let draft = NewSellRequest {
            user_id: 3,
            wallet_address: "0x52908400098527886e0f7030069857d2e4169ee7".to_string(),
            amount: 10,
            price: 1.5,
            description: None,
            documents: Vec::new(),
            source: RequestSource::UserSubmission,
            submitted_date: Utc::now(),
        };
        assert!(matches!(
            SellRequestStore::insert(&store, draft).await,
            Err(StoreError::Database(_))
        ));
    }

    #[test]
    fn unique_violations_map_to_duplicate() {
        let err = classify_db_err(
            DbErr::Custom("duplicate key".to_string()),
            Some(SqlErr::UniqueConstraintViolation(
                "uq_sell_requests_live".to_string(),
            )),
        );
        assert!(matches!(err, StoreError::Duplicate(detail) if detail == "uq_sell_requests_live"));

        let err = classify_db_err(DbErr::Custom("timeout".to_string()), None);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
