//! Full-lifecycle tests for the shift reconciliation flow: open, sell,
//! record drawer movements, pay commissions, close.
//!
//! Every test runs against an isolated in-memory database.

use chrono::Utc;
use uuid::Uuid;

use hidrocolon_core::{Bill, CashBreakdown, Coin, CoreError, Money, PaymentMethod, TenderMethod};
use hidrocolon_db::repository::commission::new_doctor;
use hidrocolon_db::repository::medication::new_medication;
use hidrocolon_db::repository::user::new_user;
use hidrocolon_db::{
    CloseShiftRequest, CreateSaleRequest, Database, DbConfig, DbError, SaleLineRequest,
    ShiftFilter, TenderRequest,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Clinic {
    db: Database,
    operator_id: String,
    authorizer_id: String,
    doctor_id: String,
    /// Q200.00 consultation, no commission.
    consult_id: String,
    /// Q1000.00 treatment, 10% doctor commission.
    treatment_id: String,
}

async fn clinic() -> Clinic {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let operator_id = Uuid::new_v4().to_string();
    let authorizer_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let consult_id = Uuid::new_v4().to_string();
    let treatment_id = Uuid::new_v4().to_string();

    db.users()
        .insert(&new_user(&operator_id, "cajero", "Cajero Turno", false))
        .await
        .unwrap();
    db.users()
        .insert(&new_user(&authorizer_id, "admin", "Administradora", true))
        .await
        .unwrap();
    db.commissions()
        .insert_doctor(&new_doctor(&doctor_id, "Dra. Estrada"))
        .await
        .unwrap();
    db.medications()
        .insert(&new_medication(&consult_id, "CONS-GEN", "Consulta general", 20_000, 0, 100))
        .await
        .unwrap();
    db.medications()
        .insert(&new_medication(
            &treatment_id,
            "HIDRO-SES",
            "Sesión de hidrocolon",
            100_000,
            1000,
            100,
        ))
        .await
        .unwrap();

    Clinic {
        db,
        operator_id,
        authorizer_id,
        doctor_id,
        consult_id,
        treatment_id,
    }
}

/// 5 x Q100 bills + 10 x Q1 coins = Q510.00
fn opening_drawer() -> CashBreakdown {
    CashBreakdown::new()
        .with_bill(Bill::Q100, 5)
        .with_coin(Coin::Q1, 10)
}

/// 7 x Q100 + 1 x Q10 = Q710.00
fn closing_drawer_q710() -> CashBreakdown {
    CashBreakdown::new()
        .with_bill(Bill::Q100, 7)
        .with_bill(Bill::Q10, 1)
}

fn cash_tender(centavos: i64) -> TenderRequest {
    TenderRequest {
        method: TenderMethod::Cash,
        amount: Money::from_centavos(centavos),
        reference: None,
    }
}

fn card_tender(centavos: i64, voucher: &str) -> TenderRequest {
    TenderRequest {
        method: TenderMethod::Card,
        amount: Money::from_centavos(centavos),
        reference: Some(voucher.to_string()),
    }
}

fn line(medication_id: &str, quantity: i64, doctor_id: Option<&str>) -> SaleLineRequest {
    SaleLineRequest {
        medication_id: medication_id.to_string(),
        quantity,
        doctor_id: doctor_id.map(str::to_string),
    }
}

fn close_request(shift_id: i64, closing: CashBreakdown) -> CloseShiftRequest {
    CloseShiftRequest {
        shift_id,
        closing,
        authorized_by: None,
        justification: None,
        observations: None,
    }
}

fn domain(err: &DbError) -> &CoreError {
    match err {
        DbError::Domain(core) => core,
        other => panic!("expected domain error, got {other:?}"),
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[tokio::test]
async fn end_to_end_balanced_close() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();
    assert_eq!(shift.opening_total_centavos, 51_000);
    assert!(shift.is_open());

    // One Q200.00 cash sale
    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None)],
            tenders: vec![cash_tender(20_000)],
            notes: None,
        })
        .await
        .unwrap();

    // One Q1000.00 card sale, voucher slip recorded with it
    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 1, Some(&c.doctor_id))],
            tenders: vec![card_tender(100_000, "V-0001")],
            notes: None,
        })
        .await
        .unwrap();

    // Live summary matches what close will compute
    let summary = c.db.shifts().summary(shift.id).await.unwrap();
    assert_eq!(summary.sales.count, 2);
    assert_eq!(summary.sales.cash.centavos(), 20_000);
    assert_eq!(summary.sales.card.centavos(), 100_000);
    assert_eq!(summary.expected_cash.centavos(), 71_000);
    assert_eq!(summary.amount_to_deposit.centavos(), 20_000);

    let closed = c
        .db
        .shifts()
        .close(close_request(shift.id, closing_drawer_q710()))
        .await
        .unwrap();

    assert_eq!(closed.closing_total_centavos, Some(71_000));
    assert_eq!(closed.expected_cash_centavos, Some(71_000));
    assert_eq!(closed.cash_variance_centavos, Some(0));
    assert_eq!(closed.voucher_variance_centavos, Some(0));
    assert!(!closed.requires_authorization);

    // Card double-deduction: commission Q60.00, tax Q150.40
    assert_eq!(closed.card_commission_centavos, Some(6_000));
    assert_eq!(closed.tax_card_centavos, Some(15_040));
    assert_eq!(closed.tax_cash_centavos, Some(3_200));

    // To deposit: 1200.00 − 1000.00 − 0 − 0 = Q200.00
    assert_eq!(closed.amount_to_deposit_centavos, Some(20_000));
    assert_eq!(closed.sales_total_centavos, Some(120_000));
    assert!(closed.closed_at.is_some());

    // Summary of the closed shift reproduces the frozen figures
    let after = c.db.shifts().summary(shift.id).await.unwrap();
    assert_eq!(after.expected_cash.centavos(), 71_000);
    assert_eq!(after.withholdings.tax_card.centavos(), 15_040);
}

// ============================================================================
// Single-open-shift invariant
// ============================================================================

#[tokio::test]
async fn second_open_fails_while_shift_is_open() {
    let c = clinic().await;

    c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    let err = c
        .db
        .shifts()
        .open(&c.operator_id, CashBreakdown::new())
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::ShiftAlreadyOpen));
}

#[tokio::test]
async fn concurrent_opens_exactly_one_succeeds() {
    let c = clinic().await;
    let shifts_a = c.db.shifts();
    let shifts_b = c.db.shifts();

    let (a, b) = tokio::join!(
        shifts_a.open(&c.operator_id, opening_drawer()),
        shifts_b.open(&c.operator_id, opening_drawer()),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);

    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(domain(&err), CoreError::ShiftAlreadyOpen));
        }
    }
}

#[tokio::test]
async fn open_again_after_close_succeeds() {
    let c = clinic().await;

    let first = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();
    c.db.shifts()
        .close(close_request(first.id, opening_drawer()))
        .await
        .unwrap();

    let second = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();
    assert_ne!(first.id, second.id);

    let active = c.db.shifts().get_active().await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
}

// ============================================================================
// Close gating
// ============================================================================

#[tokio::test]
async fn close_of_closed_shift_fails_without_mutation() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();
    let closed = c
        .db
        .shifts()
        .close(close_request(shift.id, opening_drawer()))
        .await
        .unwrap();

    let err = c
        .db
        .shifts()
        .close(close_request(shift.id, CashBreakdown::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::ShiftAlreadyClosed(id) if *id == shift.id
    ));

    // Nothing changed on the frozen row
    let still = c.db.shifts().get_by_id(shift.id).await.unwrap().unwrap();
    assert_eq!(still.closing_total_centavos, closed.closing_total_centavos);
    assert_eq!(still.closed_at, closed.closed_at);
}

#[tokio::test]
async fn close_of_unknown_shift_fails() {
    let c = clinic().await;

    let err = c
        .db
        .shifts()
        .close(close_request(999, CashBreakdown::new()))
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::ShiftNotFound(999)));
}

#[tokio::test]
async fn out_of_tolerance_close_requires_authorizer() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    // Drawer counted Q1.00 over: outside the Q0.50 band
    let over = CashBreakdown::new()
        .with_bill(Bill::Q100, 5)
        .with_coin(Coin::Q1, 11);

    let err = c
        .db
        .shifts()
        .close(close_request(shift.id, over.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::AuthorizationRequired {
            cash_variance_centavos: 100,
            ..
        }
    ));

    // The rejection left the shift open and untouched
    let still_open = c.db.shifts().get_active().await.unwrap().unwrap();
    assert_eq!(still_open.id, shift.id);

    // An operator without the grant cannot sign off
    let err = c
        .db
        .shifts()
        .close(CloseShiftRequest {
            shift_id: shift.id,
            closing: over.clone(),
            authorized_by: Some(c.operator_id.clone()),
            justification: Some("Moneda extra encontrada".to_string()),
            observations: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::NotAnAuthorizer { .. }));

    // With a real authorizer and justification the close lands
    let closed = c
        .db
        .shifts()
        .close(CloseShiftRequest {
            shift_id: shift.id,
            closing: over,
            authorized_by: Some(c.authorizer_id.clone()),
            justification: Some("Moneda extra encontrada".to_string()),
            observations: Some("Conteo doble verificado".to_string()),
        })
        .await
        .unwrap();

    assert!(closed.requires_authorization);
    assert_eq!(closed.cash_variance_centavos, Some(100));
    assert_eq!(closed.authorized_by.as_deref(), Some(c.authorizer_id.as_str()));
    assert!(closed.authorized_at.is_some());
}

#[tokio::test]
async fn half_quetzal_variance_closes_without_authorization() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    // Exactly Q0.50 over: the boundary itself passes
    let boundary = CashBreakdown::new()
        .with_bill(Bill::Q100, 5)
        .with_coin(Coin::Q1, 10)
        .with_coin(Coin::C50, 1);

    let closed = c
        .db
        .shifts()
        .close(close_request(shift.id, boundary))
        .await
        .unwrap();

    assert_eq!(closed.cash_variance_centavos, Some(50));
    assert!(!closed.requires_authorization);
    assert!(closed.authorized_by.is_none());
}

// ============================================================================
// Sales: mixed decomposition, void exclusion, stock rollback
// ============================================================================

#[tokio::test]
async fn mixed_sale_decomposes_without_double_counting() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    // Q1000.00 treatment paid Q300.00 cash + Q700.00 card
    let sale = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 1, None)],
            tenders: vec![cash_tender(30_000), card_tender(70_000, "V-0100")],
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(sale.method, PaymentMethod::Mixed);

    let summary = c.db.shifts().summary(shift.id).await.unwrap();
    assert_eq!(summary.sales.count, 1);
    assert_eq!(summary.sales.cash.centavos(), 30_000);
    assert_eq!(summary.sales.card.centavos(), 70_000);
    assert_eq!(summary.sales.total().centavos(), 100_000);
}

#[tokio::test]
async fn tender_mismatch_rejects_sale() {
    let c = clinic().await;

    c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    let err = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None)],
            tenders: vec![cash_tender(19_000)],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::TenderMismatch {
            total_centavos: 20_000,
            tendered_centavos: 19_000,
        }
    ));
}

#[tokio::test]
async fn sale_without_open_shift_fails() {
    let c = clinic().await;

    let err = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None)],
            tenders: vec![cash_tender(20_000)],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::NoOpenShift));
}

#[tokio::test]
async fn voided_sale_vanishes_from_every_aggregate() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None)],
            tenders: vec![cash_tender(20_000)],
            notes: None,
        })
        .await
        .unwrap();
    let doomed = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 1, Some(&c.doctor_id))],
            tenders: vec![card_tender(100_000, "V-0200")],
            notes: None,
        })
        .await
        .unwrap();

    let voided = c
        .db
        .sales()
        .void(&doomed.id, &c.operator_id, "Paciente canceló el tratamiento")
        .await
        .unwrap();
    assert!(voided.is_voided());
    assert_eq!(voided.voided_by.as_deref(), Some(c.operator_id.as_str()));
    assert!(voided.voided_at.is_some());

    // Aggregation is idempotent and excludes the voided sale every time
    for _ in 0..2 {
        let summary = c.db.shifts().summary(shift.id).await.unwrap();
        assert_eq!(summary.sales.count, 1);
        assert_eq!(summary.sales.cash.centavos(), 20_000);
        assert_eq!(summary.sales.card.centavos(), 0);
    }

    // Voiding twice fails
    let err = c
        .db
        .sales()
        .void(&doomed.id, &c.operator_id, "Repetido")
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::SaleAlreadyVoided(_)));

    // The void returned the stock
    let med = c.db.medications().get_by_id(&c.treatment_id).await.unwrap().unwrap();
    assert_eq!(med.stock, 100);

    // The voided card sale no longer backs its recorded voucher, so the
    // voucher variance trips the authorization gate
    let err = c
        .db
        .shifts()
        .close(close_request(shift.id, closing_drawer_q710()))
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::AuthorizationRequired { .. }));
}

#[tokio::test]
async fn insufficient_stock_rolls_back_whole_sale() {
    let c = clinic().await;

    c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    let scarce_id = Uuid::new_v4().to_string();
    c.db.medications()
        .insert(&new_medication(&scarce_id, "SUERO-IV", "Suero intravenoso", 5_000, 0, 2))
        .await
        .unwrap();

    // First line is fine, second asks for 3 of the 2 in stock
    let err = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None), line(&scarce_id, 3, None)],
            tenders: vec![cash_tender(20_000 + 15_000)],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        domain(&err),
        CoreError::InsufficientStock {
            available: 2,
            requested: 3,
            ..
        }
    ));

    // The rollback restored the first line's stock and left no sale rows
    let consult = c.db.medications().get_by_id(&c.consult_id).await.unwrap().unwrap();
    assert_eq!(consult.stock, 100);
    let shift = c.db.shifts().get_active().await.unwrap().unwrap();
    assert!(c.db.sales().list_for_shift(shift.id).await.unwrap().is_empty());
}

// ============================================================================
// Expenses and commissions in reconciliation
// ============================================================================

#[tokio::test]
async fn outflows_reduce_expected_cash_and_deposit() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    // Q200.00 cash sale, then Q50.00 expense and a commission payout
    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.consult_id, 1, None)],
            tenders: vec![cash_tender(20_000)],
            notes: None,
        })
        .await
        .unwrap();
    // Q1000.00 treatment: accrues Q100.00 commission for the doctor
    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 1, Some(&c.doctor_id))],
            tenders: vec![cash_tender(100_000)],
            notes: None,
        })
        .await
        .unwrap();

    c.db.drawer()
        .record_expense(shift.id, Money::from_centavos(5_000), "Garrafón de agua")
        .await
        .unwrap();

    let payment = c
        .db
        .commissions()
        .pay(&c.doctor_id, Utc::now().date_naive(), Some(shift.id))
        .await
        .unwrap();
    assert_eq!(payment.total_centavos, 10_000);
    assert_eq!(payment.line_count, 1);

    // Expected cash: 510.00 + 1200.00 − 50.00 − 100.00 = Q1560.00
    let expected = 51_000 + 120_000 - 5_000 - 10_000;
    let closing = CashBreakdown::new().with_bill(Bill::Q20, expected / 2_000);
    assert_eq!(closing.total().centavos(), expected);

    let closed = c
        .db
        .shifts()
        .close(close_request(shift.id, closing))
        .await
        .unwrap();

    assert_eq!(closed.expenses_total_centavos, Some(5_000));
    assert_eq!(closed.commissions_paid_centavos, Some(10_000));
    assert_eq!(closed.expected_cash_centavos, Some(expected));
    assert_eq!(closed.cash_variance_centavos, Some(0));
    // All-cash day: deposit everything minus the outflows
    assert_eq!(closed.amount_to_deposit_centavos, Some(120_000 - 15_000));
    assert!(!closed.requires_authorization);
}

#[tokio::test]
async fn commission_payout_settles_lines_exactly_once() {
    let c = clinic().await;

    let shift = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    c.db.sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 2, Some(&c.doctor_id))],
            tenders: vec![cash_tender(200_000)],
            notes: None,
        })
        .await
        .unwrap();

    let cutoff = Utc::now().date_naive();

    let unpaid = c.db.commissions().unpaid_lines(&c.doctor_id, cutoff).await.unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].amount_centavos, 20_000);

    let payment = c
        .db
        .commissions()
        .pay(&c.doctor_id, cutoff, Some(shift.id))
        .await
        .unwrap();
    assert_eq!(payment.total_centavos, 20_000);

    // Settled lines never aggregate again
    assert!(c.db.commissions().unpaid_lines(&c.doctor_id, cutoff).await.unwrap().is_empty());
    let err = c
        .db
        .commissions()
        .pay(&c.doctor_id, cutoff, Some(shift.id))
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::NoUnpaidCommissions { .. }));
}

#[tokio::test]
async fn voided_sale_commissions_are_never_paid() {
    let c = clinic().await;

    c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    let sale = c
        .db
        .sales()
        .create(CreateSaleRequest {
            items: vec![line(&c.treatment_id, 1, Some(&c.doctor_id))],
            tenders: vec![cash_tender(100_000)],
            notes: None,
        })
        .await
        .unwrap();
    c.db.sales()
        .void(&sale.id, &c.operator_id, "Cobro duplicado")
        .await
        .unwrap();

    let err = c
        .db
        .commissions()
        .pay(&c.doctor_id, Utc::now().date_naive(), None)
        .await
        .unwrap_err();
    assert!(matches!(domain(&err), CoreError::NoUnpaidCommissions { .. }));
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn list_filters_by_status_and_operator() {
    let c = clinic().await;

    let first = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();
    c.db.shifts()
        .close(close_request(first.id, opening_drawer()))
        .await
        .unwrap();
    let second = c.db.shifts().open(&c.operator_id, opening_drawer()).await.unwrap();

    let all = c.db.shifts().list(&ShiftFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let open_only = c
        .db
        .shifts()
        .list(&ShiftFilter {
            status: Some(hidrocolon_core::ShiftStatus::Open),
            ..ShiftFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(open_only.len(), 1);
    assert_eq!(open_only[0].id, second.id);

    let nobody = c
        .db
        .shifts()
        .list(&ShiftFilter {
            operator_id: Some(Uuid::new_v4().to_string()),
            ..ShiftFilter::default()
        })
        .await
        .unwrap();
    assert!(nobody.is_empty());

    let paged = c
        .db
        .shifts()
        .list(&ShiftFilter {
            limit: 1,
            ..ShiftFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
}
