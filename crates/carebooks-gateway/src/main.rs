use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use carebooks_core::{AccountingSettings, ClinicChart, SystemClock};
use carebooks_platform::{
    DateQuery, EnsureLedgerRequest, OpeningBalanceRequest, PgAccountingStore, PostingKind,
    PostingRequest, RangeQuery, ServiceConfig, apply_schema, connect_database,
};
use carebooks_posting::{PostingEngine, PostingError, PostingResponse, PostingResult, Summary};
use carebooks_reports::{
    BalanceSheet, BookKind, CashBankBook, DailyReport, Daybook, FinancialTrends, Insight,
    ProfitAndLoss, ReportEngine, ReportError,
};
use chrono::Datelike;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    posting: PostingEngine,
    reports: ReportEngine,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "carebooks_gateway=info,carebooks_posting=info,carebooks_reports=info".to_string()
        }))
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url, config.max_connections).await?;
    apply_schema(&pool).await?;

    let store = Arc::new(PgAccountingStore::new(pool));
    let clock = Arc::new(SystemClock);
    let posting = PostingEngine::new(
        store.clone(),
        store.clone(),
        Arc::new(ClinicChart),
        clock.clone(),
    )
    .with_day_offset(config.utc_offset);
    let reports = ReportEngine::new(store.clone(), store, clock, config.report_settings());

    let state = AppState { posting, reports };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/companies/{company_id}/ledger/ensure",
            post(ensure_company_ledger),
        )
        .route("/postings/opening-balances", post(post_opening_balance))
        .route("/postings/{kind}/{document_id}", post(post_document))
        .route("/journal-entries/{entry_id}/reverse", post(reverse_entry))
        .route("/companies/{company_id}/reports/daily", get(daily_report))
        .route(
            "/companies/{company_id}/reports/profit-and-loss",
            get(profit_and_loss),
        )
        .route(
            "/companies/{company_id}/reports/balance-sheet",
            get(balance_sheet),
        )
        .route("/companies/{company_id}/reports/trends", get(financial_trends))
        .route(
            "/companies/{company_id}/reports/insights",
            get(executive_insights),
        )
        .route("/companies/{company_id}/reports/daybook", get(daybook))
        .route("/companies/{company_id}/reports/cash-book", get(cash_book))
        .route("/companies/{company_id}/reports/bank-book", get(bank_book))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ensure_company_ledger(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<EnsureLedgerRequest>,
) -> Result<Json<AccountingSettings>, (StatusCode, String)> {
    state
        .posting
        .ensure_company_ledger_ready(company_id, payload.tenant_id)
        .await
        .map(Json)
        .map_err(|err| {
            log_posting_failure("ledger bootstrap", company_id, &err);
            (posting_status(&err), err.to_string())
        })
}

async fn post_document(
    State(state): State<AppState>,
    Path((kind, document_id)): Path<(String, Uuid)>,
    Query(request): Query<PostingRequest>,
) -> Response {
    let Some(kind) = PostingKind::parse(&kind) else {
        return (StatusCode::NOT_FOUND, format!("unknown posting kind: {kind}")).into_response();
    };
    let engine = &state.posting;
    let user_id = request.user_id.as_str();

    match kind {
        PostingKind::SalesInvoices => posting_reply(
            "sales invoice",
            document_id,
            engine.post_sales_invoice(document_id, user_id).await,
        ),
        PostingKind::Payments => posting_reply(
            "payment",
            document_id,
            engine.post_payment_entry(document_id, user_id).await,
        ),
        PostingKind::PurchaseInvoices => posting_reply(
            "purchase invoice",
            document_id,
            engine.post_purchase_invoice(document_id, user_id).await,
        ),
        PostingKind::PurchaseReceipts => posting_reply(
            "purchase receipt",
            document_id,
            engine.post_purchase_receipt(document_id, user_id).await,
        ),
        PostingKind::PurchaseReturns => posting_reply(
            "purchase return",
            document_id,
            engine.post_purchase_return(document_id, user_id).await,
        ),
        PostingKind::SalesReturns => posting_reply(
            "sales return",
            document_id,
            engine.post_sales_return(document_id, user_id).await,
        ),
        PostingKind::StockAdjustments => posting_reply(
            "stock adjustment",
            document_id,
            engine.post_stock_adjustment(document_id, user_id).await,
        ),
    }
}

async fn post_opening_balance(
    State(state): State<AppState>,
    Json(payload): Json<OpeningBalanceRequest>,
) -> Response {
    let result = state
        .posting
        .post_opening_balance(
            payload.entity_id,
            payload.entity_type,
            payload.amount,
            payload.date,
            &payload.user_id,
        )
        .await;
    posting_reply("opening balance", payload.entity_id, result)
}

async fn reverse_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Query(request): Query<PostingRequest>,
) -> Response {
    let result = state
        .posting
        .reverse_entry(entry_id, &request.user_id)
        .await;
    posting_reply("reversal", entry_id, result)
}

async fn daily_report(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DailyReport>, (StatusCode, String)> {
    let date = query.date.unwrap_or_else(|| state.reports.today());
    state
        .reports
        .daily_report(company_id, date)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn profit_and_loss(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ProfitAndLoss>, (StatusCode, String)> {
    let today = state.reports.today();
    let end = query.end.unwrap_or(today);
    let start = query
        .start
        .unwrap_or_else(|| end.with_day(1).unwrap_or(end));
    state
        .reports
        .profit_and_loss(company_id, start, end)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn balance_sheet(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<BalanceSheet>, (StatusCode, String)> {
    let as_of = query.date.unwrap_or_else(|| state.reports.today());
    state
        .reports
        .balance_sheet(company_id, as_of)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn financial_trends(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<FinancialTrends>, (StatusCode, String)> {
    state
        .reports
        .financial_trends(company_id)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn executive_insights(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<Insight>>, (StatusCode, String)> {
    state
        .reports
        .executive_insights(company_id)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn daybook(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Daybook>, (StatusCode, String)> {
    let date = query.date.unwrap_or_else(|| state.reports.today());
    state
        .reports
        .daybook(company_id, date)
        .await
        .map(Json)
        .map_err(report_error)
}

async fn cash_book(
    state: State<AppState>,
    company_id: Path<Uuid>,
    query: Query<DateQuery>,
) -> Result<Json<CashBankBook>, (StatusCode, String)> {
    book(state, company_id, query, BookKind::Cash).await
}

async fn bank_book(
    state: State<AppState>,
    company_id: Path<Uuid>,
    query: Query<DateQuery>,
) -> Result<Json<CashBankBook>, (StatusCode, String)> {
    book(state, company_id, query, BookKind::Bank).await
}

async fn book(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
    kind: BookKind,
) -> Result<Json<CashBankBook>, (StatusCode, String)> {
    let date = query.date.unwrap_or_else(|| state.reports.today());
    state
        .reports
        .cash_bank_book(company_id, kind, date)
        .await
        .map(Json)
        .map_err(report_error)
}

fn posting_reply<T: Summary + Serialize>(
    document: &str,
    id: Uuid,
    result: PostingResult<T>,
) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            log_posting_failure(document, id, err);
            posting_status(err)
        }
    };
    let body: PostingResponse<T> = result.into();
    (status, Json(body)).into_response()
}

fn posting_status(err: &PostingError) -> StatusCode {
    match err {
        PostingError::ConfigurationMissing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PostingError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
        PostingError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
        PostingError::Ledger(_) | PostingError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn log_posting_failure(document: &str, id: Uuid, err: &PostingError) {
    if posting_status(err).is_server_error() {
        error!(document, %id, kind = err.kind(), "posting failed: {err}");
    } else {
        warn!(document, %id, kind = err.kind(), "posting rejected: {err}");
    }
}

fn report_error(err: ReportError) -> (StatusCode, String) {
    match err {
        ReportError::InvalidRange { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ReportError::Persistence(_) => {
            error!("report failed: {err}");
            internal_error(err)
        }
    }
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use carebooks_core::{AccountRole, DocumentKind, StoreError};
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn posting_errors_map_to_client_or_server_statuses() {
        assert_eq!(
            posting_status(&PostingError::ConfigurationMissing(AccountRole::InputTax)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            posting_status(&PostingError::not_found(DocumentKind::Payment, Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            posting_status(&PostingError::UnsupportedOperation("customer".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            posting_status(&PostingError::Persistence(StoreError::Backend(
                "down".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn inverted_report_ranges_are_bad_requests() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let (status, message) = report_error(ReportError::InvalidRange { start, end });

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("2025-03-10"));
    }
}
