mod common;

use chrono::Duration;
use common::{USER, count_by_type, harness};
use course_billing::domain::course::CourseType;
use course_billing::domain::transaction::TransactionType;
use course_billing::error::BillingError;
use mockable::Clock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn payments(h: &common::Harness, email: &str) -> usize {
    let account = h
        .stores
        .accounts
        .find_by_email(email)
        .await
        .unwrap()
        .unwrap();
    let history = h.stores.transactions.for_account(account.id).await.unwrap();
    count_by_type(&history, TransactionType::Payment)
}

#[tokio::test]
async fn test_buy_twice_debits_once() {
    let h = harness().await;
    let identity = h.identity(USER);

    let first = h.engine.pay(Some(&identity), "molecularphysics").await.unwrap();
    let second = h.engine.pay(Some(&identity), "molecularphysics").await.unwrap();

    assert_eq!(first.amount_charged, dec!(20));
    assert_eq!(second.amount_charged, Decimal::ZERO);
    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(second.expires_at, None);
    assert_eq!(h.balance(USER).await, dec!(980));
    assert_eq!(payments(&h, USER).await, 1);
}

#[tokio::test]
async fn test_rent_lifecycle() {
    let h = harness().await;
    let identity = h.identity(USER);
    let paid_at = h.clock.utc();

    let first = h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    let expires = first.expires_at.unwrap();
    let expected = paid_at + Duration::days(7);
    assert!((expires - expected).num_seconds().abs() <= 10);
    assert_eq!(first.amount_charged, dec!(10));
    assert_eq!(h.balance(USER).await, dec!(990));

    // Still inside the window: nothing charged, expiry unchanged.
    h.clock.advance(Duration::days(3));
    let second = h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    assert_eq!(second.amount_charged, Decimal::ZERO);
    assert_eq!(second.expires_at, Some(expires));
    assert_eq!(h.balance(USER).await, dec!(990));

    // Window closed: charged again with a fresh expiry.
    h.clock.advance(Duration::days(5));
    let renewed_at = h.clock.utc();
    let third = h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    assert_eq!(third.amount_charged, dec!(10));
    let new_expiry = third.expires_at.unwrap();
    assert!((new_expiry - (renewed_at + Duration::days(7))).num_seconds().abs() <= 10);
    assert!(new_expiry > expires);
    assert_eq!(h.balance(USER).await, dec!(980));
    assert_eq!(payments(&h, USER).await, 2);
}

#[tokio::test]
async fn test_rent_expiring_exactly_now_is_not_held() {
    let h = harness().await;
    let identity = h.identity(USER);

    h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    h.clock.advance(Duration::days(7));
    let outcome = h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    assert_eq!(outcome.amount_charged, dec!(10));
}

#[tokio::test]
async fn test_free_never_debits() {
    let h = harness().await;
    let identity = h.identity(USER);

    for _ in 0..3 {
        let outcome = h.engine.pay(Some(&identity), "nympydata").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.course_type, CourseType::Free);
        assert_eq!(outcome.amount_charged, Decimal::ZERO);
        assert_eq!(outcome.expires_at, None);
    }
    assert_eq!(h.balance(USER).await, dec!(1000));
    assert_eq!(payments(&h, USER).await, 1);
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let h = harness().await;
    h.add_account("poor@example.com", dec!(5)).await;
    let identity = h.identity("poor@example.com");

    let result = h.engine.pay(Some(&identity), "molecularphysics").await;
    match result {
        Err(BillingError::InsufficientFunds {
            required,
            available,
        }) => {
            assert_eq!(required, dec!(20));
            assert_eq!(available, dec!(5));
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    assert_eq!(h.balance("poor@example.com").await, dec!(5));
    assert_eq!(payments(&h, "poor@example.com").await, 0);
}

#[tokio::test]
async fn test_deposit_then_buy_scenario() {
    let h = harness().await;
    h.add_course("python", CourseType::Buy, Some(dec!(300.32)))
        .await;
    let identity = h.identity(USER);

    h.engine.deposit(Some(&identity), dec!(90.45)).await.unwrap();
    assert_eq!(h.balance(USER).await, dec!(1090.45));

    let outcome = h.engine.pay(Some(&identity), "python").await.unwrap();
    assert_eq!(outcome.balance.value(), dec!(790.13));
    assert_eq!(h.balance(USER).await, dec!(790.13));

    let account = h.stores.accounts.find_by_email(USER).await.unwrap().unwrap();
    let history = h.stores.transactions.for_account(account.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.id, outcome.transaction_id);
    assert_eq!(last.r#type, TransactionType::Payment);
    assert_eq!(last.amount, dec!(300.32));
    assert_eq!(last.expires_at, None);
}

#[tokio::test]
async fn test_entitlement_with_one_expired_rental() {
    let h = harness().await;
    h.add_course("sql", CourseType::Rent, Some(dec!(15))).await;
    h.add_course("rust", CourseType::Rent, Some(dec!(25))).await;
    let identity = h.identity(USER);

    h.engine.pay(Some(&identity), "figmadesign").await.unwrap();
    h.clock.advance(Duration::days(8));
    h.engine.pay(Some(&identity), "sql").await.unwrap();
    h.engine.pay(Some(&identity), "rust").await.unwrap();

    let account = h.stores.accounts.find_by_email(USER).await.unwrap().unwrap();
    let now = h.clock.utc();
    for (code, held) in [("figmadesign", false), ("sql", true), ("rust", true)] {
        let course = h.stores.courses.find_by_code(code).await.unwrap().unwrap();
        let active = h
            .engine
            .resolver()
            .has_active_entitlement(account.id, course.id, course.course_type, now)
            .await
            .unwrap();
        assert_eq!(active, held, "entitlement for {code}");
    }
}

#[tokio::test]
async fn test_unknown_account_and_anonymous_caller() {
    let h = harness().await;

    let unknown = h.identity("ghost@example.com");
    assert!(matches!(
        h.engine.pay(Some(&unknown), "nympydata").await,
        Err(BillingError::AccountNotFound(_))
    ));
    assert!(matches!(
        h.engine.deposit(None, dec!(1)).await,
        Err(BillingError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_negative_deposit_rejected() {
    let h = harness().await;
    let result = h.engine.deposit(Some(&h.identity(USER)), dec!(-3)).await;
    assert!(matches!(result, Err(BillingError::ValidationError(_))));
    assert_eq!(h.balance(USER).await, dec!(1000));
}

#[tokio::test]
async fn test_overflowing_deposit_is_rejected() {
    let h = harness().await;
    let identity = h.identity(USER);

    let result = h.engine.deposit(Some(&identity), Decimal::MAX).await;
    assert!(matches!(result, Err(BillingError::ValidationError(_))));
    assert_eq!(h.balance(USER).await, dec!(1000));

    let account = h.stores.accounts.find_by_email(USER).await.unwrap().unwrap();
    let history = h.stores.transactions.for_account(account.id).await.unwrap();
    assert_eq!(count_by_type(&history, TransactionType::Deposit), 1);
}
